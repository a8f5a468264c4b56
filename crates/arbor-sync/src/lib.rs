//! Checksum-tree synchronization.
//!
//! A [`ChecksumSynchronizer`] walks a solution tree top-down and batches every
//! checksum of one level into a single remote request, so a full solution costs
//! `2 + 2 * projects` round trips regardless of document count. Bulk operations
//! are serialized through a [`SyncGate`].

mod gate;
mod session;
mod synchronizer;

pub use gate::{SyncGate, SyncGateGuard};
pub use session::{open_persistent_storage, SyncSession};
pub use synchronizer::ChecksumSynchronizer;
