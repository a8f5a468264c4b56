use arbor_core::codec::decode_asset;
use arbor_core::{Asset, Checksum, FromAsset};
use arbor_remote_proto::AssetPayload;
use arbor_storage::{Accessor, AssetData, PersistentStorage, StorageError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::AssetCache;
use crate::error::AssetError;
use crate::source::AssetSource;

/// Resolves checksums to assets for one synchronization session.
///
/// Lookups go to the in-process cache first, then to durable storage (leaf
/// payloads only), and finally to the remote [`AssetSource`]. Everything fetched
/// is verified against the checksum it was requested under before it is cached.
pub struct AssetProvider {
    source: Arc<dyn AssetSource>,
    cache: AssetCache,
    storage: Option<Arc<PersistentStorage>>,
    asset_data: Option<Accessor<AssetData>>,
}

impl AssetProvider {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            cache: AssetCache::new(),
            storage: None,
            asset_data: None,
        }
    }

    /// Like [`AssetProvider::new`], with leaf payloads persisted to `storage`.
    pub fn with_storage(source: Arc<dyn AssetSource>, storage: Arc<PersistentStorage>) -> Self {
        let asset_data = storage.asset_data();
        Self {
            source,
            cache: AssetCache::new(),
            storage: Some(storage),
            asset_data: Some(asset_data),
        }
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn storage(&self) -> Option<&Arc<PersistentStorage>> {
        self.storage.as_ref()
    }

    /// Return the asset for `checksum`, fetching it on its own if it is not
    /// available locally.
    pub async fn get_asset<T: FromAsset>(
        &self,
        checksum: Checksum,
        cancel: &CancellationToken,
    ) -> Result<T, AssetError> {
        if checksum.is_null() {
            return Err(AssetError::NullChecksum);
        }
        if cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }

        if self.cache.contains(&checksum)
            || self.load_stored(vec![checksum], cancel).await?.is_empty()
        {
            return self.get_required_asset(checksum);
        }

        tracing::debug!(target = "arbor.assets", checksum = ?checksum, "fetching single asset");
        let payload = with_cancel(cancel, self.source.fetch_asset(checksum, cancel.clone()))
            .await?
            .ok_or(AssetError::MissingFromRemote { checksum })?;
        if payload.checksum != checksum {
            return Err(AssetError::ChecksumMismatch {
                expected: checksum,
                actual: payload.checksum,
            });
        }
        let asset = verify_payload(&payload)?;

        let asset = self.cache.insert_if_absent(asset);
        if asset.is_leaf() {
            self.persist_leaves(vec![payload], cancel).await?;
        }
        typed(checksum, &asset)
    }

    /// Return the cached asset for `checksum`.
    ///
    /// Only valid after the checksum has been synchronized; a miss or a node of
    /// the wrong kind is an error.
    pub fn get_required_asset<T: FromAsset>(&self, checksum: Checksum) -> Result<T, AssetError> {
        let asset = self
            .cache
            .get(&checksum)
            .ok_or(AssetError::NotCached { checksum })?;
        typed(checksum, &asset)
    }

    /// Local-only existence check: true if `checksum` is cached, or durable
    /// storage holds a valid payload for it (which is then loaded into the cache).
    /// Never contacts the remote.
    pub fn ensure_cache_entry_if_exists(
        &self,
        checksum: Checksum,
        cancel: &CancellationToken,
    ) -> Result<bool, AssetError> {
        if checksum.is_null() {
            return Ok(false);
        }
        if self.cache.contains(&checksum) {
            return Ok(true);
        }
        let Some(asset_data) = &self.asset_data else {
            return Ok(false);
        };

        match asset_data.read_stream(checksum, Some(checksum), cancel) {
            Ok(Some(bytes)) => Ok(self.admit_stored(checksum, &bytes)),
            Ok(None) => Ok(false),
            Err(err) => Err(storage_error(err)),
        }
    }

    /// Load whatever durable storage holds for `checksums` into the cache and
    /// return the checksums that are still missing.
    ///
    /// The SQLite reads run on the blocking pool.
    async fn load_stored(
        &self,
        checksums: Vec<Checksum>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Checksum>, AssetError> {
        let Some(asset_data) = self.asset_data.clone() else {
            return Ok(checksums);
        };
        if checksums.is_empty() {
            return Ok(checksums);
        }

        let keys = checksums.clone();
        let token = cancel.clone();
        let stored = tokio::task::spawn_blocking(move || {
            let mut hits = Vec::new();
            for checksum in keys {
                if let Some(bytes) = asset_data.read_stream(checksum, Some(checksum), &token)? {
                    hits.push((checksum, bytes));
                }
            }
            Ok::<_, StorageError>(hits)
        })
        .await;

        let hits = match stored {
            Ok(Ok(hits)) => hits,
            Ok(Err(err)) => return Err(storage_error(err)),
            Err(err) => {
                tracing::warn!(
                    target = "arbor.assets",
                    error = %err,
                    "stored asset lookup failed; treating as misses"
                );
                Vec::new()
            }
        };
        for (checksum, bytes) in hits {
            self.admit_stored(checksum, &bytes);
        }
        Ok(checksums
            .into_iter()
            .filter(|checksum| !self.cache.contains(checksum))
            .collect())
    }

    /// Decode a stored payload and cache it if it really is `checksum`.
    fn admit_stored(&self, checksum: Checksum, bytes: &[u8]) -> bool {
        match decode_asset(bytes) {
            Ok(asset) if asset.checksum() == checksum && asset.is_consistent() => {
                self.cache.insert_if_absent(asset);
                true
            }
            Ok(asset) => {
                tracing::debug!(
                    target = "arbor.assets",
                    checksum = ?checksum,
                    actual = ?asset.compute_checksum(),
                    "stored asset failed verification; treating as a miss"
                );
                false
            }
            Err(err) => {
                tracing::debug!(
                    target = "arbor.assets",
                    checksum = ?checksum,
                    error = %err,
                    "stored asset failed to decode; treating as a miss"
                );
                false
            }
        }
    }

    /// Make every checksum in `checksums` locally resolvable with at most one
    /// remote call.
    ///
    /// Checksums already cached (or durably stored) are skipped; if nothing
    /// remains the remote is not contacted. The response is verified in full
    /// before anything is cached.
    pub async fn synchronize_assets(
        &self,
        checksums: &HashSet<Checksum>,
        cancel: &CancellationToken,
    ) -> Result<(), AssetError> {
        if cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }

        let uncached = checksums
            .iter()
            .copied()
            .filter(|checksum| !checksum.is_null() && !self.cache.contains(checksum))
            .collect();
        let mut missing = self.load_stored(uncached, cancel).await?;
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();

        tracing::debug!(
            target = "arbor.assets",
            requested = checksums.len(),
            missing = missing.len(),
            "fetching assets"
        );
        let payloads =
            with_cancel(cancel, self.source.fetch_assets(missing.clone(), cancel.clone())).await?;

        let mut received: HashMap<Checksum, (AssetPayload, Asset)> =
            HashMap::with_capacity(payloads.len());
        for payload in payloads {
            let asset = verify_payload(&payload)?;
            received.insert(payload.checksum, (payload, asset));
        }
        for checksum in &missing {
            if !received.contains_key(checksum) {
                return Err(AssetError::MissingFromRemote {
                    checksum: *checksum,
                });
            }
        }

        let mut leaves = Vec::new();
        for checksum in &missing {
            if let Some((payload, asset)) = received.remove(checksum) {
                if self.cache.insert_if_absent(asset).is_leaf() {
                    leaves.push(payload);
                }
            }
        }
        if !received.is_empty() {
            tracing::debug!(
                target = "arbor.assets",
                unrequested = received.len(),
                "ignoring assets that were not requested"
            );
        }
        self.persist_leaves(leaves, cancel).await
    }

    /// Persist fetched leaf payloads on the blocking pool.
    async fn persist_leaves(
        &self,
        leaves: Vec<AssetPayload>,
        cancel: &CancellationToken,
    ) -> Result<(), AssetError> {
        let Some(asset_data) = self.asset_data.clone() else {
            return Ok(());
        };
        if leaves.is_empty() {
            return Ok(());
        }

        let token = cancel.clone();
        let written = tokio::task::spawn_blocking(move || {
            for payload in &leaves {
                let checksum = payload.checksum;
                if !asset_data.write_stream(checksum, &payload.data, Some(checksum), &token)? {
                    tracing::debug!(
                        target = "arbor.assets",
                        checksum = ?checksum,
                        "leaf asset was not persisted"
                    );
                }
            }
            Ok::<_, StorageError>(())
        })
        .await;

        match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(storage_error(err)),
            Err(err) => {
                tracing::warn!(
                    target = "arbor.assets",
                    error = %err,
                    "persisting leaf assets failed"
                );
                Ok(())
            }
        }
    }
}

/// Decode a payload and check it really is the asset it claims to be.
fn verify_payload(payload: &AssetPayload) -> Result<Asset, AssetError> {
    let asset = decode_asset(&payload.data).map_err(|source| AssetError::Decode {
        checksum: payload.checksum,
        source,
    })?;
    let actual = asset.compute_checksum();
    if actual != payload.checksum || asset.checksum() != payload.checksum {
        return Err(AssetError::ChecksumMismatch {
            expected: payload.checksum,
            actual,
        });
    }
    Ok(asset)
}

fn typed<T: FromAsset>(checksum: Checksum, asset: &Asset) -> Result<T, AssetError> {
    T::from_asset(asset).ok_or(AssetError::UnexpectedKind {
        checksum,
        expected: T::KIND,
        found: asset.kind(),
    })
}

fn storage_error(err: StorageError) -> AssetError {
    match err {
        StorageError::Cancelled => AssetError::Cancelled,
        other => AssetError::Storage(other),
    }
}

async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, AssetError>>,
) -> Result<T, AssetError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AssetError::Cancelled),
        res = fut => res,
    }
}
