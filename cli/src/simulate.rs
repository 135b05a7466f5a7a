//! `chainsync simulate` — concurrent producers feeding one dispatcher.

use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use chainsync_core::{ChainInfo, ChainOrigin, Dispatcher, DispatcherConfig, DispatcherStats, TipsetKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Parameters for one simulation run.
#[derive(Debug, Clone)]
pub struct SimulateParams {
    pub producers: usize,
    pub targets: usize,
    /// Probability that an announcement repeats a head already announced.
    pub duplicate_rate: f64,
    pub max_height: u64,
    pub seed: u64,
}

/// Result of a simulation run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub stats: DispatcherStats,
    pub rejected_pushes: usize,
    /// Heights in the order they were popped.
    pub popped_heights: Vec<u64>,
    /// `true` if `popped_heights` never increases.
    pub ordered: bool,
}

pub fn run(config: DispatcherConfig, params: &SimulateParams) -> Result<SimulationReport> {
    if params.producers == 0 {
        return Err(anyhow!("at least one producer is required"));
    }
    if !(0.0..=1.0).contains(&params.duplicate_rate) {
        return Err(anyhow!("duplicate rate must be within 0.0..=1.0"));
    }

    let dispatcher = Arc::new(Dispatcher::with_config(config));
    let per_producer = params.targets.div_ceil(params.producers);

    let handles: Vec<_> = (0..params.producers)
        .map(|p| {
            let dispatcher = Arc::clone(&dispatcher);
            let params = params.clone();
            let count = per_producer.min(params.targets.saturating_sub(p * per_producer));
            thread::spawn(move || produce(&dispatcher, p, count, &params))
        })
        .collect();

    let mut rejected_pushes = 0;
    for handle in handles {
        rejected_pushes += handle
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))?;
    }

    let popped_heights: Vec<u64> = dispatcher.drain().iter().map(|t| t.height()).collect();
    let ordered = popped_heights.windows(2).all(|w| w[0] >= w[1]);
    tracing::info!(popped = popped_heights.len(), ordered, "Simulation drained");

    Ok(SimulationReport {
        stats: dispatcher.stats(),
        rejected_pushes,
        popped_heights,
        ordered,
    })
}

/// Announce `count` heads from producer `p`, rotating through the three
/// entry points. Returns the number of rejected pushes.
fn produce(dispatcher: &Dispatcher, p: usize, count: usize, params: &SimulateParams) -> usize {
    let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(p as u64));
    let mut rejected = 0;

    for i in 0..count {
        let cid = if i > 0 && rng.gen_bool(params.duplicate_rate) {
            format!("bafy-{p}-{}", rng.gen_range(0..i))
        } else {
            format!("bafy-{p}-{i}")
        };
        let height = rng.gen_range(0..=params.max_height);
        let origin = match i % 3 {
            0 => ChainOrigin::Hello,
            1 => ChainOrigin::OwnBlock,
            _ => ChainOrigin::Gossip,
        };
        let mut info = ChainInfo::new(TipsetKey::single(cid), height, origin);
        if origin != ChainOrigin::OwnBlock {
            info = info.with_peer(format!("peer-{p}"));
        }

        let result = match origin {
            ChainOrigin::Hello => dispatcher.receive_hello(info),
            ChainOrigin::OwnBlock => dispatcher.receive_own_block(info),
            ChainOrigin::Gossip => dispatcher.receive_gossip_block(info),
        };
        if let Err(e) = result {
            tracing::debug!(producer = p, error = %e, "Announcement rejected");
            rejected += 1;
        }
    }
    rejected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(producers: usize, targets: usize, duplicate_rate: f64) -> SimulateParams {
        SimulateParams {
            producers,
            targets,
            duplicate_rate,
            max_height: 1_000,
            seed: 7,
        }
    }

    #[test]
    fn distinct_heads_all_popped_in_order() {
        let report = run(DispatcherConfig::default(), &params(4, 100, 0.0)).unwrap();
        assert_eq!(report.popped_heights.len(), 100);
        assert_eq!(report.stats.accepted, 100);
        assert!(report.ordered);
    }

    #[test]
    fn duplicates_are_dropped() {
        let report = run(DispatcherConfig::default(), &params(2, 200, 0.5)).unwrap();
        let stats = &report.stats;
        assert_eq!(stats.accepted + stats.duplicates, 200);
        assert_eq!(report.popped_heights.len() as u64, stats.accepted);
        assert!(report.ordered);
    }

    #[test]
    fn bounded_queue_reports_rejections() {
        let config = DispatcherConfig {
            initial_capacity: 8,
            max_queued: Some(10),
        };
        let report = run(config, &params(3, 30, 0.0)).unwrap();
        assert_eq!(report.popped_heights.len(), 10);
        assert_eq!(report.rejected_pushes, 20);
        assert_eq!(report.stats.rejected, 20);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(run(DispatcherConfig::default(), &params(0, 10, 0.0)).is_err());
        assert!(run(DispatcherConfig::default(), &params(1, 10, 1.5)).is_err());
    }
}
