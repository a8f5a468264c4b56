use arbor_core::ARBOR_VERSION;
use parking_lot::RwLock;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::accessor::Accessor;
use crate::error::Result;
use crate::intern::StringTable;
use crate::keys::{AssetData, DocumentData, ProjectData, SolutionData};
use crate::location::StorageLocation;
use crate::pool::{open_connection, ConnectionPool};
use crate::schema::{self, SCHEMA_VERSION};

/// State shared by every accessor of one database.
///
/// The `RwLock` around the pool is the storage lock: writers (and id
/// allocation) take it exclusively, readers share it. `None` means closed.
pub(crate) struct StorageShared {
    pub(crate) pool: RwLock<Option<ConnectionPool>>,
    pub(crate) strings: StringTable,
}

/// A process-wide SQLite database of checksum-validated payloads.
pub struct PersistentStorage {
    path: PathBuf,
    shared: Arc<StorageShared>,
}

impl PersistentStorage {
    /// Open (or create) the database at `path`.
    ///
    /// A database stamped with another schema version is discarded. A database
    /// that cannot be opened at all is deleted and recreated once.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = match open_current_schema(path) {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!(
                    target = "arbor.storage",
                    path = %path.display(),
                    error = %err,
                    "failed to open persistent storage; recreating"
                );
                remove_database_files(path);
                open_current_schema(path)?
            }
        };

        tracing::debug!(
            target = "arbor.storage",
            path = %path.display(),
            schema_version = SCHEMA_VERSION,
            arbor_version = ARBOR_VERSION,
            "opened persistent storage"
        );

        Ok(Self {
            path: path.to_path_buf(),
            shared: Arc::new(StorageShared {
                pool: RwLock::new(Some(ConnectionPool::with_connection(path, conn))),
                strings: StringTable::new(),
            }),
        })
    }

    /// Open the database for `solution_path` under `location`.
    pub fn open_for_solution(location: &StorageLocation, solution_path: &Path) -> Result<Self> {
        Self::open(location.database_path(solution_path)?)
    }

    pub fn database_path(&self) -> &Path {
        &self.path
    }

    pub fn solution_data(&self) -> Accessor<SolutionData> {
        Accessor::new(Arc::clone(&self.shared))
    }

    pub fn project_data(&self) -> Accessor<ProjectData> {
        Accessor::new(Arc::clone(&self.shared))
    }

    pub fn document_data(&self) -> Accessor<DocumentData> {
        Accessor::new(Arc::clone(&self.shared))
    }

    pub fn asset_data(&self) -> Accessor<AssetData> {
        Accessor::new(Arc::clone(&self.shared))
    }

    /// Drop every pooled connection. Later operations on any accessor report
    /// absent / not written.
    pub fn close(&self) {
        if self.shared.pool.write().take().is_some() {
            tracing::debug!(
                target = "arbor.storage",
                path = %self.path.display(),
                "closed persistent storage"
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.pool.read().is_none()
    }
}

impl std::fmt::Debug for PersistentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStorage")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn open_current_schema(path: &Path) -> rusqlite::Result<Connection> {
    let conn = open_connection(path)?;
    let found = schema::user_version(&conn)?;
    if found == SCHEMA_VERSION {
        return Ok(conn);
    }

    if found != 0 {
        tracing::debug!(
            target = "arbor.storage",
            path = %path.display(),
            expected = SCHEMA_VERSION,
            found,
            "storage schema version mismatch; recreating"
        );
        drop(conn);
        remove_database_files(path);
        let conn = open_connection(path)?;
        schema::create(&conn)?;
        return Ok(conn);
    }

    schema::create(&conn)?;
    Ok(conn)
}

fn remove_database_files(path: &Path) {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        candidates.push(PathBuf::from(name));
    }

    for candidate in candidates {
        match std::fs::remove_file(&candidate) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::debug!(
                    target = "arbor.storage",
                    path = %candidate.display(),
                    error = %err,
                    "failed to remove storage file"
                );
            }
        }
    }
}
