use arbor_core::{AssetKind, Checksum, CodecError};
use arbor_remote_proto::{ProtoError, RemoteError};
use arbor_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset request cancelled")]
    Cancelled,

    #[error("asset transport error: {0}")]
    Transport(#[from] ProtoError),

    #[error("remote host error: {0}")]
    Remote(#[from] RemoteError),

    #[error("remote host could not resolve asset {checksum}")]
    MissingFromRemote { checksum: Checksum },

    #[error("asset checksum mismatch: requested {expected}, received {actual}")]
    ChecksumMismatch { expected: Checksum, actual: Checksum },

    #[error("asset {checksum} is not in the local cache")]
    NotCached { checksum: Checksum },

    #[error("asset {checksum} is a {found} node, expected {expected}")]
    UnexpectedKind {
        checksum: Checksum,
        expected: &'static str,
        found: AssetKind,
    },

    #[error("failed to decode asset {checksum}: {source}")]
    Decode {
        checksum: Checksum,
        #[source]
        source: CodecError,
    },

    #[error("persistent storage error: {0}")]
    Storage(StorageError),

    #[error("the null checksum does not name an asset")]
    NullChecksum,
}

impl AssetError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AssetError::Cancelled)
    }
}
