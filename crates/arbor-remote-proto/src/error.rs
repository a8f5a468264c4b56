use arbor_core::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: u64, max: u32 },

    #[error("allocation failed: {message}")]
    AllocationFailed { message: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("connection closed")]
    ConnectionClosed,
}
