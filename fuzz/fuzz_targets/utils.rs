pub const MAX_INPUT_SIZE: usize = 256 * 1024;

/// `data` capped to `MAX_INPUT_SIZE`, so length prefixes inside the input can
/// claim more than is actually there.
#[inline]
pub fn capped(data: &[u8]) -> &[u8] {
    &data[..data.len().min(MAX_INPUT_SIZE)]
}
