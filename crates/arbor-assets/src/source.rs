use arbor_core::Checksum;
use arbor_remote_proto::AssetPayload;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AssetError;

/// The remote side of asset synchronization.
///
/// Both calls are idempotent. Checksums the remote cannot resolve are omitted
/// from the result rather than reported as errors; the caller decides whether
/// that is fatal.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch every checksum in `checksums` in a single round trip.
    async fn fetch_assets(
        &self,
        checksums: Vec<Checksum>,
        cancel: CancellationToken,
    ) -> Result<Vec<AssetPayload>, AssetError>;

    async fn fetch_asset(
        &self,
        checksum: Checksum,
        cancel: CancellationToken,
    ) -> Result<Option<AssetPayload>, AssetError> {
        let assets = self.fetch_assets(vec![checksum], cancel).await?;
        Ok(assets.into_iter().find(|asset| asset.checksum == checksum))
    }
}
