use dashmap::DashSet;

/// Process-local set of peers believed to be offline.
///
/// This is a cache that lets idle reports skip a storage lookup. The durable
/// `online` flag is the source of truth; losing the tracker only costs extra
/// lookups.
#[derive(Debug, Default)]
pub struct OfflineTracker {
    peers: DashSet<String>,
}

impl OfflineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pub_key: &str) -> bool {
        self.peers.contains(pub_key)
    }

    /// Returns true if the peer was not tracked before
    pub fn insert(&self, pub_key: impl Into<String>) -> bool {
        self.peers.insert(pub_key.into())
    }

    /// Returns true if the peer was tracked
    pub fn remove(&self, pub_key: &str) -> bool {
        self.peers.remove(pub_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
