//! Wire messages for fetching assets from a remote host.
//!
//! The transport is lockstep: the client writes one [`Request`] frame and
//! reads the response back before sending the next one. A response is zero or
//! more [`Response::Partial`] frames followed by one [`Response::Assets`] or
//! [`Response::Error`] frame. Frames are a u32 little-endian length followed by
//! a bincode payload (see [`framing`]).

use arbor_core::codec::{encoded_len, PAYLOAD_LIMIT_BYTES};
use arbor_core::Checksum;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

mod error;
pub mod framing;

pub use error::ProtoError;

/// Hard limits enforced on untrusted network payloads.
///
/// Maximum size of a single payload (not including the 4-byte length prefix).
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024; // 64 MiB

/// Maximum number of checksums in one `FetchAssets` request.
pub const MAX_ASSETS_PER_MESSAGE: usize = 100_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Request {
    /// Fetch every listed asset in one round trip.
    FetchAssets { checksums: Vec<Checksum> },
    FetchAsset { checksum: Checksum },
    Shutdown,
}

impl Request {
    /// Reject requests the host should not attempt to answer.
    pub fn validate(&self) -> Result<(), RemoteError> {
        match self {
            Request::FetchAssets { checksums } if checksums.len() > MAX_ASSETS_PER_MESSAGE => {
                Err(RemoteError::new(
                    RemoteErrorCode::TooLarge,
                    format!(
                        "request names {} assets (max {MAX_ASSETS_PER_MESSAGE})",
                        checksums.len()
                    ),
                ))
            }
            Request::FetchAssets { checksums } if checksums.iter().any(Checksum::is_null) => Err(
                RemoteError::new(RemoteErrorCode::InvalidRequest, "null checksum requested"),
            ),
            Request::FetchAsset { checksum } if checksum.is_null() => Err(RemoteError::new(
                RemoteErrorCode::InvalidRequest,
                "null checksum requested",
            )),
            _ => Ok(()),
        }
    }
}

/// One serialized asset, keyed by the checksum it was requested under.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetPayload {
    pub checksum: Checksum,
    pub data: Bytes,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Response {
    /// Assets the host could resolve. Checksums it does not know are omitted.
    Assets { assets: Vec<AssetPayload> },
    /// A non-empty slice of the answer; more frames follow for the same request.
    Partial { assets: Vec<AssetPayload> },
    Error { error: RemoteError },
}

impl Response {
    /// Split `assets` into frames that each encode to at most `max_frame_len`
    /// bytes: `Partial` frames followed by a final `Assets` frame.
    ///
    /// An asset that cannot fit a frame on its own makes the whole answer a
    /// `TooLarge` error.
    pub fn pack_assets(
        assets: Vec<AssetPayload>,
        max_frame_len: u32,
    ) -> Result<Vec<Response>, RemoteError> {
        let budget = (max_frame_len as u64).min(PAYLOAD_LIMIT_BYTES as u64);
        let overhead = encoded_len(&Response::Assets { assets: Vec::new() }).map_err(internal)?;

        let mut sizes = Vec::with_capacity(assets.len());
        for asset in &assets {
            let size = encoded_len(asset).map_err(internal)?;
            if overhead + size > budget {
                return Err(RemoteError::new(
                    RemoteErrorCode::TooLarge,
                    format!(
                        "asset {} needs {} bytes, frame limit is {budget}",
                        asset.checksum,
                        overhead + size
                    ),
                ));
            }
            sizes.push(size);
        }

        let mut frames = Vec::new();
        let mut current = Vec::new();
        let mut current_len = overhead;
        for (asset, size) in assets.into_iter().zip(sizes) {
            if !current.is_empty() && current_len + size > budget {
                frames.push(Response::Partial {
                    assets: std::mem::take(&mut current),
                });
                current_len = overhead;
            }
            current_len += size;
            current.push(asset);
        }
        frames.push(Response::Assets { assets: current });
        Ok(frames)
    }
}

fn internal(err: arbor_core::CodecError) -> RemoteError {
    RemoteError::new(RemoteErrorCode::Internal, err.to_string())
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RemoteErrorCode {
    NotFound,
    TooLarge,
    InvalidRequest,
    Internal,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl RemoteError {
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: matches!(code, RemoteErrorCode::Internal),
        }
    }
}
