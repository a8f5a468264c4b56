//! Asset transport over a byte stream (socket, pipe, in-memory duplex).

use arbor_core::Checksum;
use arbor_remote_proto::framing::{recv_message, send_message};
use arbor_remote_proto::{
    AssetPayload, ProtoError, RemoteError, RemoteErrorCode, Request, Response,
    MAX_ASSETS_PER_MESSAGE,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::AssetError;
use crate::host::AssetHost;
use crate::source::AssetSource;

/// Lockstep client: one request out, its complete response back, then the next.
///
/// Each exchange runs on its own task, so a caller that stops waiting does not
/// interrupt a request that is already on the wire and the stream stays in
/// step for the next call. Only a transport failure part way through an
/// exchange leaves the stream unusable; later calls then fail with
/// [`ProtoError::ConnectionClosed`].
pub struct StreamAssetSource<S> {
    stream: Arc<Mutex<S>>,
    max_frame_len: u32,
    broken: Arc<AtomicBool>,
}

impl<S> StreamAssetSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: S, max_frame_len: u32) -> Self {
        Self {
            stream: Arc::new(Mutex::new(stream)),
            max_frame_len,
            broken: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn round_trip(
        &self,
        request: Request,
        requested: usize,
    ) -> Result<Vec<AssetPayload>, AssetError> {
        let mut stream = Arc::clone(&self.stream).lock_owned().await;
        let broken = Arc::clone(&self.broken);
        let max_frame_len = self.max_frame_len;

        let task = tokio::spawn(async move {
            if broken.load(Ordering::SeqCst) {
                return Err(ProtoError::ConnectionClosed.into());
            }
            // Stays set if the exchange fails part way through.
            broken.store(true, Ordering::SeqCst);
            let result = exchange(&mut *stream, max_frame_len, &request, requested).await;
            if !matches!(result, Err(AssetError::Transport(_))) {
                broken.store(false, Ordering::SeqCst);
            }
            result
        });

        match task.await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(target = "arbor.remote", error = %err, "asset exchange task failed");
                Err(ProtoError::ConnectionClosed.into())
            }
        }
    }

    /// Ask the host loop to stop. No response is expected.
    pub async fn shutdown(&self) -> Result<(), AssetError> {
        let mut stream = self.stream.lock().await;
        self.broken.store(true, Ordering::SeqCst);
        send_message(&mut *stream, self.max_frame_len, &Request::Shutdown).await?;
        Ok(())
    }
}

/// Send `request` and collect every frame of its response.
async fn exchange<S>(
    stream: &mut S,
    max_frame_len: u32,
    request: &Request,
    requested: usize,
) -> Result<Vec<AssetPayload>, AssetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_message(&mut *stream, max_frame_len, request).await?;
    let mut assets = Vec::new();
    loop {
        match recv_message(&mut *stream, max_frame_len).await? {
            Response::Partial { assets: part } => {
                if part.is_empty() || assets.len() + part.len() > requested {
                    return Err(ProtoError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "host sent more partial frames than assets were requested",
                    ))
                    .into());
                }
                assets.extend(part);
            }
            Response::Assets { assets: last } => {
                assets.extend(last);
                return Ok(assets);
            }
            Response::Error { error } => return Err(AssetError::Remote(error)),
        }
    }
}

#[async_trait]
impl<S> AssetSource for StreamAssetSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn fetch_assets(
        &self,
        checksums: Vec<Checksum>,
        cancel: CancellationToken,
    ) -> Result<Vec<AssetPayload>, AssetError> {
        let mut out = Vec::with_capacity(checksums.len());
        for chunk in checksums.chunks(MAX_ASSETS_PER_MESSAGE) {
            if cancel.is_cancelled() {
                return Err(AssetError::Cancelled);
            }
            let request = Request::FetchAssets {
                checksums: chunk.to_vec(),
            };
            out.extend(self.round_trip(request, chunk.len()).await?);
        }
        Ok(out)
    }

    async fn fetch_asset(
        &self,
        checksum: Checksum,
        cancel: CancellationToken,
    ) -> Result<Option<AssetPayload>, AssetError> {
        if cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }
        let assets = self.round_trip(Request::FetchAsset { checksum }, 1).await?;
        Ok(assets.into_iter().find(|asset| asset.checksum == checksum))
    }
}

/// Answer asset requests from `host` until the peer disconnects or sends
/// [`Request::Shutdown`].
///
/// Answers larger than one frame are split across several frames. An asset
/// that cannot fit a frame on its own is answered with a `TooLarge` error.
pub async fn serve_assets<S>(
    mut stream: S,
    host: AssetHost,
    max_frame_len: u32,
) -> Result<(), ProtoError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let request: Request = match recv_message(&mut stream, max_frame_len).await {
            Ok(request) => request,
            Err(ProtoError::ConnectionClosed) => {
                tracing::debug!(target = "arbor.remote", "asset client disconnected");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let frames = match request.validate() {
            Err(error) => vec![Response::Error { error }],
            Ok(()) => {
                let assets = match request {
                    Request::FetchAssets { checksums } => host.resolve(&checksums),
                    Request::FetchAsset { checksum } => host.resolve(&[checksum]),
                    Request::Shutdown => {
                        tracing::debug!(target = "arbor.remote", "asset host shutting down");
                        return Ok(());
                    }
                };
                match Response::pack_assets(assets, max_frame_len) {
                    Ok(frames) => frames,
                    Err(error) => {
                        tracing::warn!(
                            target = "arbor.remote",
                            max = max_frame_len,
                            error = %error,
                            "asset response exceeds frame limit"
                        );
                        vec![Response::Error { error }]
                    }
                }
            }
        };

        for frame in &frames {
            match send_message(&mut stream, max_frame_len, frame).await {
                Ok(()) => {}
                // Both fail before anything is written, so the stream is still in step.
                Err(err @ (ProtoError::Codec(_) | ProtoError::FrameTooLarge { .. })) => {
                    tracing::warn!(
                        target = "arbor.remote",
                        error = %err,
                        "asset response frame could not be encoded"
                    );
                    let error = Response::Error {
                        error: RemoteError::new(RemoteErrorCode::TooLarge, err.to_string()),
                    };
                    send_message(&mut stream, max_frame_len, &error).await?;
                    break;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
