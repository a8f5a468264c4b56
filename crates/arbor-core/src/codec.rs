//! Binary encoding for assets crossing the process boundary or landing on disk.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

use crate::asset::Asset;

/// Hard upper bound for any bincode payload we will attempt to decode.
///
/// A corrupted or hostile length prefix should fail decoding, not request an
/// enormous allocation.
pub const PAYLOAD_LIMIT_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

pub fn bincode_options_limited() -> impl bincode::Options + Copy {
    bincode_options().with_limit(PAYLOAD_LIMIT_BYTES as u64)
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(bincode_options_limited().serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(bincode_options_limited().deserialize(bytes)?)
}

/// Exact encoded size of `value`, computed without serializing it.
pub fn encoded_len<T: Serialize>(value: &T) -> Result<u64, CodecError> {
    Ok(bincode_options().serialized_size(value)?)
}

pub fn encode_asset(asset: &Asset) -> Result<Vec<u8>, CodecError> {
    encode(asset)
}

/// Decode an asset. The result is not verified; callers compare
/// [`Asset::compute_checksum`] against the checksum they asked for.
pub fn decode_asset(bytes: &[u8]) -> Result<Asset, CodecError> {
    decode(bytes)
}
