use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Width of a [`Checksum`] in bytes.
pub const CHECKSUM_LEN: usize = 32;

/// A fixed-width SHA-256 content checksum.
///
/// Every addressable node of the workspace tree (and every leaf payload) is
/// identified by one of these. [`Checksum::NULL`] is reserved to mean "absent"
/// and is never produced by hashing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// The reserved "absent" checksum. It never resolves to a stored node.
    pub const NULL: Checksum = Checksum([0; CHECKSUM_LEN]);

    /// Hash an arbitrary byte slice.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self::finish(hasher)
    }

    /// Hash a tagged byte payload. The tag keeps payloads of different kinds
    /// from colliding when their bytes happen to be equal.
    pub fn from_tagged_bytes(tag: &[u8], bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        update_tag(&mut hasher, tag);
        hasher.update(bytes.as_ref());
        Self::finish(hasher)
    }

    /// Derive a composite checksum from a tag and an ordered list of child checksums.
    ///
    /// This is a pure function of its inputs, so identical child layouts always
    /// collapse to the same parent checksum.
    pub fn from_parts<I>(tag: &[u8], children: I) -> Self
    where
        I: IntoIterator<Item = Checksum>,
    {
        let mut hasher = Sha256::new();
        update_tag(&mut hasher, tag);
        for child in children {
            hasher.update(child.0);
        }
        Self::finish(hasher)
    }

    /// Rebuild a checksum from a stored blob. Returns `None` if the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; CHECKSUM_LEN] = bytes.try_into().ok()?;
        Some(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn finish(hasher: Sha256) -> Self {
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&hasher.finalize());
        if out == Self::NULL.0 {
            // Keep the sentinel out of the hash codomain.
            out[0] = 1;
        }
        Self(out)
    }
}

fn update_tag(hasher: &mut Sha256, tag: &[u8]) {
    let len = u32::try_from(tag.len()).unwrap_or(u32::MAX);
    hasher.update(len.to_le_bytes());
    hasher.update(tag);
}

impl Default for Checksum {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Checksum(null)");
        }
        let hex = self.to_hex();
        write!(f, "Checksum({})", hex.get(..16).unwrap_or(&hex))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
