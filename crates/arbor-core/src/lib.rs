//! Core data model for Arbor: content checksums, the composite state nodes of a
//! workspace tree, and the closed set of assets that can be synchronized.
//!
//! The tree is Merkle-shaped: solution → projects → documents/options/references
//! → leaf payloads. Every node is addressed by a [`Checksum`] derived from its
//! children, so identical subtrees collapse to the same identity.

mod asset;
mod checksum;
mod collection;
pub mod codec;
mod state;

pub use asset::{Asset, AssetKind, FromAsset};
pub use checksum::{Checksum, CHECKSUM_LEN};
pub use codec::CodecError;
pub use collection::ChecksumCollection;
pub use state::{
    DocumentStateChecksums, LeafAsset, LeafKind, ProjectStateChecksums, ProjectStateParts,
    SolutionStateChecksums,
};

/// Arbor version string.
pub const ARBOR_VERSION: &str = env!("CARGO_PKG_VERSION");
