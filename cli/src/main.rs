//! chainsync CLI — inspect dispatcher defaults and exercise concurrent intake.
//!
//! Usage:
//! ```bash
//! chainsync info
//! chainsync simulate --producers 4 --targets 1000 --duplicate-rate 0.2
//! chainsync --config chainsync.yaml simulate --json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chainsync_core::{ChainsyncConfig, Dispatcher};
use clap::{Parser, Subcommand};

mod logging;
mod simulate;

#[derive(Parser)]
#[command(
    name = "chainsync",
    about = "Height-prioritized sync target dispatcher — ChainSync CLI",
    version
)]
struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version and effective configuration
    Info,

    /// Feed random chain heads from concurrent producers, then drain the queue
    Simulate {
        /// Number of producer threads
        #[arg(long, default_value_t = 3)]
        producers: usize,
        /// Total announcements across all producers
        #[arg(long, default_value_t = 100)]
        targets: usize,
        /// Probability that an announcement repeats an earlier head
        #[arg(long, default_value_t = 0.1)]
        duplicate_rate: f64,
        /// Highest claimed chain height
        #[arg(long, default_value_t = 10_000)]
        max_height: u64,
        /// RNG seed
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ChainsyncConfig::default(),
    };
    if cli.verbose {
        config.log.level = "debug".into();
    }
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Info => cmd_info(&config),
        Commands::Simulate {
            producers,
            targets,
            duplicate_rate,
            max_height,
            seed,
            json,
        } => {
            let params = simulate::SimulateParams {
                producers,
                targets,
                duplicate_rate,
                max_height,
                seed,
            };
            cmd_simulate(&config, &params, json)
        }
    }
}

fn load_config(path: &Path) -> Result<ChainsyncConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let config: ChainsyncConfig = if is_json {
        serde_json::from_str(&raw).with_context(|| format!("parsing JSON config {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("parsing YAML config {}", path.display()))?
    };
    Ok(config)
}

fn cmd_info(config: &ChainsyncConfig) -> Result<()> {
    println!("ChainSync v{}", env!("CARGO_PKG_VERSION"));
    println!("  Ordering: highest claimed height first, earliest accepted on ties");
    println!("  Dedup: first announcement of a tipset wins until completed");
    let dispatcher = Dispatcher::with_config(config.dispatcher.clone());
    let effective = dispatcher.config();
    println!("  Initial capacity: {}", effective.initial_capacity);
    match effective.max_queued {
        Some(max) => println!("  Max queued targets: {max}"),
        None => println!("  Max queued targets: unbounded"),
    }
    println!("  Log level: {}", config.log.directives());
    Ok(())
}

fn cmd_simulate(config: &ChainsyncConfig, params: &simulate::SimulateParams, json: bool) -> Result<()> {
    let report = simulate::run(config.dispatcher.clone(), params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let stats = &report.stats;
    println!("Accepted:   {}", stats.accepted);
    println!(
        "  hello: {}  own-block: {}  gossip: {}",
        stats.accepted_by_origin.hello, stats.accepted_by_origin.own_block, stats.accepted_by_origin.gossip
    );
    println!("Duplicates: {}", stats.duplicates);
    println!("Rejected:   {}", stats.rejected);
    println!("Popped:     {}", stats.popped);
    let preview: Vec<String> = report.popped_heights.iter().take(10).map(u64::to_string).collect();
    println!("First heights: [{}]", preview.join(", "));
    println!("Order: {}", if report.ordered { "non-increasing ✓" } else { "VIOLATED ✗" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_yaml_config_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "chainsync.yaml",
            "dispatcher:\n  max_queued: 256\nlog:\n  json: true\n",
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.dispatcher.max_queued, Some(256));
        assert_eq!(config.dispatcher.initial_capacity, 64);
        assert!(config.log.json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn load_json_config_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "chainsync.json",
            r#"{"dispatcher":{"initial_capacity":8},"log":{"components":{"chainsync-core":"trace"}}}"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.dispatcher.initial_capacity, 8);
        assert_eq!(config.dispatcher.max_queued, None);
        assert_eq!(config.log.directives(), "info,chainsync_core=trace");
    }

    #[test]
    fn json_content_in_yml_file_parses_as_yaml() {
        // YAML is a superset of JSON, so a `.yml` file holding JSON still loads.
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "chainsync.yml", r#"{"dispatcher":{"max_queued":3}}"#);
        assert_eq!(load_config(&path).unwrap().dispatcher.max_queued, Some(3));
    }

    #[test]
    fn malformed_json_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.json", "dispatcher: {}");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(&dir.path().join("absent.yaml")).is_err());
    }
}
