use arbor_assets::{serve_assets, AssetError, AssetHost, AssetSource};
use arbor_config::ArborConfig;
use arbor_core::codec::decode_asset;
use arbor_core::Checksum;
use arbor_remote_proto::AssetPayload;
use arbor_sync::{open_persistent_storage, SyncSession};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingSource {
    host: AssetHost,
    calls: Mutex<Vec<Vec<Checksum>>>,
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

fn build_solution(host: &AssetHost) -> Checksum {
    let lib = host
        .project()
        .info(&b"lib"[..])
        .unwrap()
        .document(&b"lib.rs"[..], &b"pub mod a;"[..])
        .unwrap()
        .document(&b"a.rs"[..], &b"pub fn a() {}"[..])
        .unwrap()
        .build()
        .unwrap();
    let bin = host
        .project()
        .info(&b"bin"[..])
        .unwrap()
        .document(&b"main.rs"[..], &b"fn main() { lib::a::a() }"[..])
        .unwrap()
        .build()
        .unwrap();
    host.solution()
        .attributes(&b"solution"[..])
        .unwrap()
        .project(lib)
        .project(bin)
        .build()
        .unwrap()
}

fn config_with_root(root: &Path) -> ArborConfig {
    let mut config = ArborConfig::default();
    config.storage.root = Some(root.to_path_buf());
    config
}

#[tokio::test]
async fn second_session_starts_warm_from_storage() {
    let cache_root = tempfile::tempdir().unwrap();
    let config = config_with_root(cache_root.path());
    let solution_path = Path::new("/work/solution");
    let source = Arc::new(CountingSource::default());
    let root = build_solution(&source.host);
    let cancel = CancellationToken::new();

    {
        let session = SyncSession::from_config(&config, source.clone(), solution_path);
        assert!(session.provider().storage().is_some());
        session
            .synchronizer()
            .synchronize_solution_assets(root, &cancel)
            .await
            .unwrap();
        assert_eq!(source.calls.lock().len(), 6);
    }

    source.calls.lock().clear();
    let session = SyncSession::from_config(&config, source.clone(), solution_path);
    session
        .synchronizer()
        .synchronize_solution_assets(root, &cancel)
        .await
        .unwrap();

    // Composite nodes are refetched; every leaf comes from storage.
    let calls = source.calls.lock();
    assert_eq!(calls.len(), 4);
    for checksum in calls.iter().flatten() {
        let bytes = source.host.get(checksum).unwrap();
        assert!(!decode_asset(&bytes).unwrap().is_leaf());
    }
}

#[tokio::test]
async fn disabled_storage_runs_without_a_database() {
    let cache_root = tempfile::tempdir().unwrap();
    let mut config = config_with_root(cache_root.path());
    config.storage.enabled = false;

    assert!(open_persistent_storage(&config.storage, Path::new("/work/solution")).is_none());

    let source = Arc::new(CountingSource::default());
    let session = SyncSession::from_config(&config, source, Path::new("/work/solution"));
    assert!(session.provider().storage().is_none());
}

#[tokio::test]
async fn connected_session_syncs_over_a_stream() -> anyhow::Result<()> {
    let host = AssetHost::new();
    let root = build_solution(&host);
    let mut config = ArborConfig::default();
    config.storage.enabled = false;

    let (client, server) = tokio::io::duplex(64 * 1024);
    let max_frame_len = config.sync.effective_max_frame_len();
    let server = tokio::spawn(serve_assets(server, host.clone(), max_frame_len));

    let session = SyncSession::connect(&config, client, Path::new("/work/solution"));
    let cancel = CancellationToken::new();
    session
        .synchronizer()
        .synchronize_solution_assets(root, &cancel)
        .await?;
    assert_eq!(session.provider().cache().len(), host.len());

    drop(session);
    server.await??;
    Ok(())
}
