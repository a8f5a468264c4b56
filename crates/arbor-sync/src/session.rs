use arbor_assets::{AssetProvider, AssetSource, StreamAssetSource};
use arbor_config::{ArborConfig, StorageConfig};
use arbor_storage::{PersistentStorage, StorageLocation};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::gate::SyncGate;
use crate::synchronizer::ChecksumSynchronizer;

/// Open the per-solution database described by `config`.
///
/// Storage is an optimization: when it is disabled or cannot be opened the
/// session runs without it.
pub fn open_persistent_storage(
    config: &StorageConfig,
    solution_path: &Path,
) -> Option<Arc<PersistentStorage>> {
    if !config.enabled {
        return None;
    }
    let location = match &config.root {
        Some(root) => StorageLocation::with_root(root),
        None => StorageLocation::from_env(),
    };
    match PersistentStorage::open_for_solution(&location, solution_path) {
        Ok(storage) => Some(Arc::new(storage)),
        Err(err) => {
            tracing::warn!(
                target = "arbor.sync",
                solution = %solution_path.display(),
                error = %err,
                "persistent storage unavailable; continuing without it"
            );
            None
        }
    }
}

/// One synchronization session: a provider over a remote source, optionally
/// backed by durable storage, and the synchronizer that drives it.
pub struct SyncSession {
    provider: Arc<AssetProvider>,
    synchronizer: ChecksumSynchronizer,
}

impl SyncSession {
    pub fn new(source: Arc<dyn AssetSource>, storage: Option<Arc<PersistentStorage>>) -> Self {
        Self::with_gate(source, storage, SyncGate::new())
    }

    /// Like [`SyncSession::new`], sharing `gate` with other sessions.
    pub fn with_gate(
        source: Arc<dyn AssetSource>,
        storage: Option<Arc<PersistentStorage>>,
        gate: SyncGate,
    ) -> Self {
        let provider = Arc::new(match storage {
            Some(storage) => AssetProvider::with_storage(source, storage),
            None => AssetProvider::new(source),
        });
        let synchronizer = ChecksumSynchronizer::with_gate(Arc::clone(&provider), gate);
        Self {
            provider,
            synchronizer,
        }
    }

    pub fn from_config(
        config: &ArborConfig,
        source: Arc<dyn AssetSource>,
        solution_path: &Path,
    ) -> Self {
        let storage = open_persistent_storage(&config.storage, solution_path);
        Self::new(source, storage)
    }

    /// Session whose source is a host reachable over `stream`.
    pub fn connect<S>(config: &ArborConfig, stream: S, solution_path: &Path) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let source = StreamAssetSource::new(stream, config.sync.effective_max_frame_len());
        Self::from_config(config, Arc::new(source), solution_path)
    }

    pub fn provider(&self) -> &Arc<AssetProvider> {
        &self.provider
    }

    pub fn synchronizer(&self) -> &ChecksumSynchronizer {
        &self.synchronizer
    }
}
