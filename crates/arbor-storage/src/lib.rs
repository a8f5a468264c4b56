//! Content-addressed persistent storage for Arbor.
//!
//! A single SQLite database per solution holds `(checksum, payload)` rows under
//! application-defined composite keys. String components of those keys are
//! interned into small integer ids. Every read can be gated on the checksum the
//! caller expects, so a stale row behaves like a miss.
//!
//! ## On-disk layout
//!
//! `<storage root>/<sha256 of solution path>/storage.sqlite`, with the root
//! defaulting to `~/.arbor/cache` (or `ARBOR_CACHE_DIR`).
//!
//! Tables: `string_table`, `solution_data`, `project_data`, `document_data`,
//! `asset_data`. The schema version lives in `PRAGMA user_version`.

mod accessor;
mod error;
mod intern;
mod keys;
mod location;
mod pool;
mod schema;
mod storage;

pub use accessor::Accessor;
pub use error::{Result, StorageError};
pub use intern::StringTable;
pub use keys::{
    AssetData, DocumentData, DocumentDataId, DocumentKey, KeyShape, ProjectData, ProjectDataId,
    ProjectId, ProjectKey, SolutionData,
};
pub use location::{solution_fingerprint, StorageLocation, DATABASE_FILE_NAME};
pub use storage::PersistentStorage;
