use arbor_core::{Asset, Checksum};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Session-scoped map of deserialized assets.
///
/// Entries are never replaced or evicted: once a checksum is cached, every
/// reader sees the same node for the rest of the session.
#[derive(Default)]
pub struct AssetCache {
    assets: RwLock<HashMap<Checksum, Arc<Asset>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, checksum: &Checksum) -> Option<Arc<Asset>> {
        self.assets.read().get(checksum).cloned()
    }

    pub fn contains(&self, checksum: &Checksum) -> bool {
        self.assets.read().contains_key(checksum)
    }

    /// Insert `asset` under its own checksum unless an entry already exists.
    /// Returns the cached entry either way.
    pub fn insert_if_absent(&self, asset: Asset) -> Arc<Asset> {
        let checksum = asset.checksum();
        if let Some(existing) = self.get(&checksum) {
            return existing;
        }
        self.assets
            .write()
            .entry(checksum)
            .or_insert_with(|| Arc::new(asset))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}
