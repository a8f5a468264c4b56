use arbor_assets::{AssetError, AssetHost, AssetProvider, AssetSource};
use arbor_core::codec::encode_asset;
use arbor_core::{
    Asset, Checksum, DocumentStateChecksums, LeafAsset, LeafKind, ProjectStateChecksums,
};
use arbor_remote_proto::AssetPayload;
use arbor_storage::PersistentStorage;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Serves from an [`AssetHost`] and records every batch it was asked for.
#[derive(Default)]
struct CountingSource {
    host: AssetHost,
    calls: Mutex<Vec<Vec<Checksum>>>,
}

impl CountingSource {
    fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AssetSource for CountingSource {
    async fn fetch_assets(
        &self,
        checksums: Vec<Checksum>,
        _cancel: CancellationToken,
    ) -> Result<Vec<AssetPayload>, AssetError> {
        self.calls.lock().push(checksums.clone());
        Ok(self.host.resolve(&checksums))
    }
}

/// Answers every request with a payload whose content does not match.
struct TamperingSource;

#[async_trait]
impl AssetSource for TamperingSource {
    async fn fetch_assets(
        &self,
        checksums: Vec<Checksum>,
        _cancel: CancellationToken,
    ) -> Result<Vec<AssetPayload>, AssetError> {
        let forged = encode_asset(&Asset::from(LeafAsset::new(
            LeafKind::SourceText,
            &b"forged"[..],
        )))
        .unwrap();
        Ok(checksums
            .into_iter()
            .map(|checksum| AssetPayload {
                checksum,
                data: forged.clone().into(),
            })
            .collect())
    }
}

fn document(host: &AssetHost, name: &str) -> (Checksum, Checksum, Checksum) {
    let info = host
        .insert_leaf(LeafKind::DocumentInfo, name.as_bytes().to_vec())
        .unwrap();
    let text = host
        .insert_leaf(LeafKind::SourceText, format!("// {name}").into_bytes())
        .unwrap();
    let node = host.insert(DocumentStateChecksums::new(info, text)).unwrap();
    (node, info, text)
}

#[tokio::test]
async fn batch_fetch_is_one_call_and_skips_cached() {
    let source = Arc::new(CountingSource::default());
    let (_, info, text) = document(&source.host, "a.rs");
    let provider = AssetProvider::new(source.clone());
    let cancel = CancellationToken::new();

    let batch: HashSet<_> = [info, text, Checksum::NULL].into_iter().collect();
    provider.synchronize_assets(&batch, &cancel).await.unwrap();
    assert_eq!(source.calls(), 1);
    assert_eq!(source.calls.lock()[0].len(), 2);

    provider.synchronize_assets(&batch, &cancel).await.unwrap();
    assert_eq!(source.calls(), 1);

    let leaf: LeafAsset = provider.get_required_asset(text).unwrap();
    assert_eq!(leaf.data().as_ref(), b"// a.rs");
}

#[tokio::test]
async fn get_asset_fetches_once_then_serves_from_cache() {
    let source = Arc::new(CountingSource::default());
    let (node, info, text) = document(&source.host, "b.rs");
    let provider = AssetProvider::new(source.clone());
    let cancel = CancellationToken::new();

    let doc: DocumentStateChecksums = provider.get_asset(node, &cancel).await.unwrap();
    assert_eq!((doc.info(), doc.text()), (info, text));
    let again: DocumentStateChecksums = provider.get_asset(node, &cancel).await.unwrap();
    assert_eq!(again, doc);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn wrong_kind_and_uncached_lookups_fail() {
    let source = Arc::new(CountingSource::default());
    let (node, _, _) = document(&source.host, "c.rs");
    let provider = AssetProvider::new(source);
    let cancel = CancellationToken::new();

    assert!(matches!(
        provider.get_required_asset::<DocumentStateChecksums>(node),
        Err(AssetError::NotCached { .. })
    ));

    let err = provider
        .get_asset::<ProjectStateChecksums>(node, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::UnexpectedKind { expected: "project", .. }));

    assert!(matches!(
        provider.get_asset::<Asset>(Checksum::NULL, &cancel).await,
        Err(AssetError::NullChecksum)
    ));
}

#[tokio::test]
async fn unresolvable_checksum_is_a_hard_failure() {
    let source = Arc::new(CountingSource::default());
    let (_, info, _) = document(&source.host, "d.rs");
    let provider = AssetProvider::new(source);
    let cancel = CancellationToken::new();

    let unknown = Checksum::from_bytes(b"nobody has this");
    let batch: HashSet<_> = [info, unknown].into_iter().collect();
    let err = provider.synchronize_assets(&batch, &cancel).await.unwrap_err();
    assert!(matches!(err, AssetError::MissingFromRemote { checksum } if checksum == unknown));

    // Nothing from a failed batch is cached.
    assert!(provider.cache().is_empty());
}

#[tokio::test]
async fn tampered_payloads_are_rejected() {
    let provider = AssetProvider::new(Arc::new(TamperingSource));
    let cancel = CancellationToken::new();
    let wanted = LeafAsset::new(LeafKind::SourceText, &b"genuine"[..]).checksum();

    let batch: HashSet<_> = [wanted].into_iter().collect();
    let err = provider.synchronize_assets(&batch, &cancel).await.unwrap_err();
    assert!(matches!(err, AssetError::ChecksumMismatch { expected, .. } if expected == wanted));
    assert!(provider.cache().is_empty());
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let source = Arc::new(CountingSource::default());
    let (node, _, _) = document(&source.host, "e.rs");
    let provider = AssetProvider::new(source.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = provider.get_asset::<Asset>(node, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn leaves_are_persisted_and_reused_by_a_later_session() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = Arc::new(PersistentStorage::open(tmp.path().join("storage.sqlite")).unwrap());
    let source = Arc::new(CountingSource::default());
    let (node, info, text) = document(&source.host, "f.rs");
    let cancel = CancellationToken::new();

    {
        let provider = AssetProvider::with_storage(source.clone(), storage.clone());
        let batch: HashSet<_> = [node, info, text].into_iter().collect();
        provider.synchronize_assets(&batch, &cancel).await.unwrap();
    }
    assert_eq!(source.calls(), 1);

    // A fresh session finds the leaves on disk but not the composite node.
    let provider = AssetProvider::with_storage(source.clone(), storage);
    assert!(provider.ensure_cache_entry_if_exists(info, &cancel).unwrap());
    assert!(provider.ensure_cache_entry_if_exists(text, &cancel).unwrap());
    assert!(!provider.ensure_cache_entry_if_exists(node, &cancel).unwrap());
    assert_eq!(source.calls(), 1);

    let batch: HashSet<_> = [node, info, text].into_iter().collect();
    provider.synchronize_assets(&batch, &cancel).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(source.calls.lock()[1], vec![node]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stored_batch_is_loaded_without_remote_calls() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = Arc::new(PersistentStorage::open(tmp.path().join("storage.sqlite")).unwrap());
    let source = Arc::new(CountingSource::default());
    let leaves: HashSet<_> = (0..300)
        .map(|i| {
            source
                .host
                .insert_leaf(LeafKind::SourceText, format!("// file {i}").into_bytes())
                .unwrap()
        })
        .collect();
    let cancel = CancellationToken::new();

    let warm = AssetProvider::with_storage(source.clone(), storage.clone());
    warm.synchronize_assets(&leaves, &cancel).await.unwrap();
    assert_eq!(source.calls(), 1);

    let cold = AssetProvider::with_storage(source.clone(), storage);
    cold.synchronize_assets(&leaves, &cancel).await.unwrap();
    assert_eq!(source.calls(), 1);
    assert_eq!(cold.cache().len(), leaves.len());

    let any = *leaves.iter().next().unwrap();
    let fresh = AssetProvider::with_storage(source.clone(), cold.storage().unwrap().clone());
    let leaf: LeafAsset = fresh.get_asset(any, &cancel).await.unwrap();
    assert_eq!(leaf.checksum(), any);
    assert_eq!(source.calls(), 1);
}
