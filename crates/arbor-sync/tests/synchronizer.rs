use arbor_assets::{AssetError, AssetHost, AssetProvider, AssetSource};
use arbor_core::codec::decode_asset;
use arbor_core::{Checksum, ProjectStateChecksums};
use arbor_remote_proto::AssetPayload;
use arbor_sync::{ChecksumSynchronizer, SyncGate};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Serves from an [`AssetHost`], records every batch, and optionally cancels
/// the caller's token once a number of calls have been answered.
#[derive(Default)]
struct CountingSource {
    host: AssetHost,
    calls: Mutex<Vec<Vec<Checksum>>>,
    cancel_after: Option<usize>,
}

impl CountingSource {
    fn cancelling_after(calls: usize) -> Self {
        Self {
            cancel_after: Some(calls),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    fn requested(&self) -> Vec<Checksum> {
        self.calls.lock().iter().flatten().copied().collect()
    }
}

#[async_trait]
impl AssetSource for CountingSource {
    async fn fetch_assets(
        &self,
        checksums: Vec<Checksum>,
        cancel: CancellationToken,
    ) -> Result<Vec<AssetPayload>, AssetError> {
        let count = {
            let mut calls = self.calls.lock();
            calls.push(checksums.clone());
            calls.len()
        };
        if self.cancel_after == Some(count) {
            cancel.cancel();
        }
        Ok(self.host.resolve(&checksums))
    }
}

/// Two projects: `core` with two documents and `app` with one.
fn two_project_solution(host: &AssetHost) -> Checksum {
    let core = host
        .project()
        .info(&b"core"[..])
        .unwrap()
        .document(&b"core/lib.rs"[..], &b"pub fn core() {}"[..])
        .unwrap()
        .document(&b"core/util.rs"[..], &b"pub fn util() {}"[..])
        .unwrap()
        .build()
        .unwrap();
    let app = host
        .project()
        .info(&b"app"[..])
        .unwrap()
        .document(&b"app/main.rs"[..], &b"fn main() {}"[..])
        .unwrap()
        .build()
        .unwrap();
    host.solution()
        .attributes(&b"workspace"[..])
        .unwrap()
        .project(core)
        .project(app)
        .build()
        .unwrap()
}

fn synchronizer(source: Arc<CountingSource>) -> ChecksumSynchronizer {
    ChecksumSynchronizer::new(Arc::new(AssetProvider::new(source)))
}

fn assert_fully_cached(host: &AssetHost, provider: &AssetProvider, root: Checksum) {
    let mut pending = vec![root];
    while let Some(checksum) = pending.pop() {
        let asset = provider
            .cache()
            .get(&checksum)
            .unwrap_or_else(|| panic!("{checksum:?} not cached"));
        assert!(host.contains(&checksum));
        pending.extend(asset.children());
    }
}

#[tokio::test]
async fn solution_sync_costs_two_calls_per_project() {
    let source = Arc::new(CountingSource::default());
    let root = two_project_solution(&source.host);
    let sync = synchronizer(source.clone());
    let cancel = CancellationToken::new();

    sync.synchronize_solution_assets(root, &cancel).await.unwrap();
    assert_eq!(source.calls(), 2 + 2 * 2);
    assert_fully_cached(&source.host, sync.provider(), root);

    let requested = source.requested();
    let unique: HashSet<_> = requested.iter().copied().collect();
    assert_eq!(requested.len(), unique.len());
    assert_eq!(unique.len(), source.host.len());

    // Nothing left to fetch.
    sync.synchronize_solution_assets(root, &cancel).await.unwrap();
    assert_eq!(source.calls(), 6);
}

#[tokio::test]
async fn project_sync_is_independent_of_document_count() {
    let source = Arc::new(CountingSource::default());
    let mut builder = source.host.project();
    builder
        .info(&b"big"[..])
        .unwrap()
        .compilation_options(&b"opt-level=3"[..])
        .unwrap()
        .parse_options(&b"edition=2021"[..])
        .unwrap()
        .metadata_reference(&b"std"[..])
        .unwrap()
        .additional_document(&b"README.md"[..], &b"# big"[..])
        .unwrap();
    for i in 0..50 {
        builder
            .document(format!("src/m{i}.rs").into_bytes(), format!("pub fn f{i}() {{}}").into_bytes())
            .unwrap();
    }
    let project = builder.build().unwrap();

    let sync = synchronizer(source.clone());
    let cancel = CancellationToken::new();
    let node: ProjectStateChecksums = sync.provider().get_asset(project, &cancel).await.unwrap();
    assert_eq!(source.calls(), 1);

    sync.synchronize_project_assets(&node, &cancel).await.unwrap();
    assert_eq!(source.calls(), 3);
    assert_fully_cached(&source.host, sync.provider(), project);

    let calls = source.calls.lock();
    // info + two options + one reference + 51 documents
    assert_eq!(calls[1].len(), 3 + 1 + 51);
    assert_eq!(calls[2].len(), 2 * 51);
}

#[tokio::test]
async fn shared_gate_serializes_overlapping_syncs() {
    let source = Arc::new(CountingSource::default());
    let root = two_project_solution(&source.host);
    let provider = Arc::new(AssetProvider::new(source.clone()));
    let gate = SyncGate::new();
    let first = ChecksumSynchronizer::with_gate(Arc::clone(&provider), gate.clone());
    let second = ChecksumSynchronizer::with_gate(Arc::clone(&provider), gate.clone());
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        first.synchronize_solution_assets(root, &cancel),
        second.synchronize_solution_assets(root, &cancel),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(source.calls(), 6);
    let requested = source.requested();
    let unique: HashSet<_> = requested.iter().copied().collect();
    assert_eq!(requested.len(), unique.len());
    assert!(!gate.is_locked());
}

#[tokio::test]
async fn cancelled_sync_keeps_progress_and_resumes() {
    let source = Arc::new(CountingSource::cancelling_after(3));
    let root = two_project_solution(&source.host);
    let sync = synchronizer(source.clone());

    let cancel = CancellationToken::new();
    let err = sync
        .synchronize_solution_assets(root, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(source.calls(), 3);
    assert!(!sync.gate().is_locked());

    let cancel = CancellationToken::new();
    sync.synchronize_solution_assets(root, &cancel).await.unwrap();
    assert_eq!(source.calls(), 6);
    assert_fully_cached(&source.host, sync.provider(), root);
}

#[tokio::test]
async fn cancelled_before_start_contacts_nobody() {
    let source = Arc::new(CountingSource::default());
    let root = two_project_solution(&source.host);
    let sync = synchronizer(source.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = sync
        .synchronize_solution_assets(root, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::Cancelled));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn subtree_sync_fetches_one_level_per_call() {
    let source = Arc::new(CountingSource::default());
    let root = two_project_solution(&source.host);
    let sync = synchronizer(source.clone());
    let cancel = CancellationToken::new();

    // solution, projects + attributes, project children, document leaves
    sync.synchronize_subtree(root, &cancel).await.unwrap();
    assert_eq!(source.calls(), 4);
    assert_fully_cached(&source.host, sync.provider(), root);

    sync.synchronize_subtree(root, &cancel).await.unwrap();
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn subtree_sync_of_a_leaf_is_one_call() {
    let source = Arc::new(CountingSource::default());
    let leaf = source
        .host
        .insert_leaf(arbor_core::LeafKind::SourceText, &b"fn lone() {}"[..])
        .unwrap();
    let sync = synchronizer(source.clone());
    let cancel = CancellationToken::new();

    sync.synchronize_subtree(leaf, &cancel).await.unwrap();
    assert_eq!(source.calls(), 1);
    assert!(decode_asset(&source.host.get(&leaf).unwrap()).unwrap().is_leaf());

    let err = sync
        .synchronize_subtree(Checksum::NULL, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::NullChecksum));
}

#[tokio::test]
async fn unknown_root_is_a_hard_failure() {
    let source = Arc::new(CountingSource::default());
    let sync = synchronizer(source.clone());
    let cancel = CancellationToken::new();
    let missing = Checksum::from_bytes(b"not on the host");

    let err = sync
        .synchronize_solution_assets(missing, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::MissingFromRemote { checksum } if checksum == missing));
    assert!(sync.provider().cache().is_empty());
}
