//! Shared types for the sync dispatcher.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── TipsetKey ────────────────────────────────────────────────────────────────

/// Identifier of a candidate chain tip: the CIDs of the blocks in the tipset.
///
/// Two keys are equal when they list the same CIDs in the same order. The
/// canonical string form (`{cid1,cid2}`) is what the dispatcher dedups on.
///
/// CIDs must be non-empty and must not contain `,`; otherwise distinct keys
/// could share a canonical form. [`TipsetKey::is_well_formed`] checks this and
/// the target queue rejects keys that fail it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TipsetKey(Vec<String>);

impl TipsetKey {
    /// Build a key from block CIDs (see the type docs for the CID format).
    pub fn new<I, S>(cids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(cids.into_iter().map(Into::into).collect())
    }

    /// Key for a single-block tipset.
    pub fn single(cid: impl Into<String>) -> Self {
        Self(vec![cid.into()])
    }

    /// The block CIDs making up this key.
    pub fn cids(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` if the key names no blocks.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the key names at least one block and every CID is
    /// non-empty and comma-free.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|cid| !cid.is_empty() && !cid.contains(','))
    }
}

impl fmt::Display for TipsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(","))
    }
}

// ─── ChainOrigin ──────────────────────────────────────────────────────────────

/// Where a chain head announcement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainOrigin {
    /// Hello handshake with a bootstrap peer.
    Hello,
    /// Block produced by this node's own mining.
    OwnBlock,
    /// Block propagated over gossip.
    Gossip,
}

impl fmt::Display for ChainOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hello => write!(f, "hello"),
            Self::OwnBlock => write!(f, "own-block"),
            Self::Gossip => write!(f, "gossip"),
        }
    }
}

// ─── ChainInfo ────────────────────────────────────────────────────────────────

/// A chain head candidate as announced by a peer, gossip or the local miner.
///
/// Validated upstream; the dispatcher never inspects chain linkage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Tipset at the head of the announced chain.
    pub head: TipsetKey,
    /// Claimed height of `head`.
    pub height: u64,
    /// Provenance of the announcement.
    pub origin: ChainOrigin,
    /// Announcing peer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

impl ChainInfo {
    pub fn new(head: TipsetKey, height: u64, origin: ChainOrigin) -> Self {
        Self {
            head,
            height,
            origin,
            peer: None,
        }
    }

    /// Attach the announcing peer id.
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }
}

// ─── SyncTarget ───────────────────────────────────────────────────────────────

/// One unit of pending sync work, created when the dispatcher accepts a
/// [`ChainInfo`] for a head it is not already tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Snapshot of the accepted announcement.
    pub chain_info: ChainInfo,
    /// Unix timestamp (milliseconds) at which the target was accepted.
    pub accepted_at: i64,
}

impl SyncTarget {
    /// Wrap `chain_info`, stamping it with the current time.
    pub fn new(chain_info: ChainInfo) -> Self {
        Self {
            chain_info,
            accepted_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn head(&self) -> &TipsetKey {
        &self.chain_info.head
    }

    pub fn height(&self) -> u64 {
        self.chain_info.height
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tipset_key_canonical_string() {
        let key = TipsetKey::new(["bafy1", "bafy2"]);
        assert_eq!(key.to_string(), "{bafy1,bafy2}");
        assert_eq!(TipsetKey::single("bafy1").to_string(), "{bafy1}");
        assert_eq!(TipsetKey::default().to_string(), "{}");
    }

    #[test]
    fn tipset_key_order_matters() {
        let a = TipsetKey::new(["x", "y"]);
        let b = TipsetKey::new(["y", "x"]);
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn tipset_key_well_formed() {
        assert!(TipsetKey::new(["bafy1", "bafy2"]).is_well_formed());
        assert!(!TipsetKey::default().is_well_formed());
        assert!(!TipsetKey::single("").is_well_formed());
        // Would collide with TipsetKey::new(["a", "b"]) in canonical form.
        assert!(!TipsetKey::single("a,b").is_well_formed());
        assert_eq!(TipsetKey::single("a,b").to_string(), TipsetKey::new(["a", "b"]).to_string());
    }

    #[test]
    fn origin_display() {
        assert_eq!(ChainOrigin::Hello.to_string(), "hello");
        assert_eq!(ChainOrigin::OwnBlock.to_string(), "own-block");
        assert_eq!(ChainOrigin::Gossip.to_string(), "gossip");
    }

    #[test]
    fn chain_info_serde() {
        let ci = ChainInfo::new(TipsetKey::single("bafyA"), 42, ChainOrigin::Gossip)
            .with_peer("12D3KooWpeer");
        let json = serde_json::to_string(&ci).unwrap();
        assert!(json.contains("\"origin\":\"gossip\""));
        let back: ChainInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ci);
    }

    #[test]
    fn sync_target_accessors() {
        let target = SyncTarget::new(ChainInfo::new(TipsetKey::single("a"), 7, ChainOrigin::Hello));
        assert_eq!(target.height(), 7);
        assert_eq!(target.head(), &TipsetKey::single("a"));
        assert!(target.accepted_at > 0);
    }
}
