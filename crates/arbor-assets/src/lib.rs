//! Asset resolution for Arbor synchronization sessions.
//!
//! [`AssetProvider`] is the remote-fetch boundary: it batches missing checksums
//! into single calls on an [`AssetSource`], verifies what comes back, caches it
//! for the session in an [`AssetCache`], and persists leaf payloads so a later
//! session can start warm.

mod cache;
mod error;
mod host;
mod provider;
pub mod remote;
mod source;

pub use cache::AssetCache;
pub use error::AssetError;
pub use host::{AssetHost, ProjectBuilder, SolutionBuilder};
pub use provider::AssetProvider;
pub use remote::{serve_assets, StreamAssetSource};
pub use source::AssetSource;
