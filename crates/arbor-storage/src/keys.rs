//! Composite key shapes understood by [`Accessor`](crate::Accessor).
//!
//! Each shape pairs an application key with the integer (or checksum) id its
//! row is stored under, and names the table and primary-key columns.

use arbor_core::Checksum;
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::intern::StringTable;

pub trait KeyShape: Send + Sync + 'static {
    type Key<'a>: Copy;
    type Id;

    const TABLE: &'static str;
    const ID_COLUMNS: &'static [&'static str];

    /// Resolve a key to the id its row is stored under.
    ///
    /// `Ok(None)` means the key has no row (and, with `allow_write = false`,
    /// that nothing was allocated to find that out).
    fn resolve_id(
        strings: &StringTable,
        conn: &Connection,
        key: Self::Key<'_>,
        allow_write: bool,
    ) -> rusqlite::Result<Option<Self::Id>>;

    /// Parameter values for [`Self::ID_COLUMNS`], in order.
    fn bind_id(id: &Self::Id) -> Vec<Value>;
}

/// Identity of a project within a solution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectKey {
    pub path: String,
    pub name: String,
}

impl ProjectKey {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// Identity of a document within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub project: ProjectKey,
    pub path: String,
    pub name: String,
}

impl DocumentKey {
    pub fn new(project: ProjectKey, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project,
            path: path.into(),
            name: name.into(),
        }
    }
}

/// Solution-wide data, keyed by data name.
pub enum SolutionData {}

/// Per-project data, keyed by project and data name.
pub enum ProjectData {}

/// Per-document data, keyed by document and data name.
pub enum DocumentData {}

/// Content-addressed payloads, keyed by their own checksum.
pub enum AssetData {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectId {
    pub path_id: i64,
    pub name_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectDataId {
    pub project: ProjectId,
    pub data_name_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentDataId {
    pub project: ProjectId,
    pub document_path_id: i64,
    pub document_name_id: i64,
    pub data_name_id: i64,
}

fn resolve_project(
    strings: &StringTable,
    conn: &Connection,
    key: &ProjectKey,
    allow_write: bool,
) -> rusqlite::Result<Option<ProjectId>> {
    let Some(path_id) = strings.resolve(conn, &key.path, allow_write)? else {
        return Ok(None);
    };
    let Some(name_id) = strings.resolve(conn, &key.name, allow_write)? else {
        return Ok(None);
    };
    Ok(Some(ProjectId { path_id, name_id }))
}

impl KeyShape for SolutionData {
    type Key<'a> = &'a str;
    type Id = i64;

    const TABLE: &'static str = "solution_data";
    const ID_COLUMNS: &'static [&'static str] = &["data_name_id"];

    fn resolve_id(
        strings: &StringTable,
        conn: &Connection,
        name: Self::Key<'_>,
        allow_write: bool,
    ) -> rusqlite::Result<Option<i64>> {
        strings.resolve(conn, name, allow_write)
    }

    fn bind_id(id: &i64) -> Vec<Value> {
        vec![Value::Integer(*id)]
    }
}

impl KeyShape for ProjectData {
    type Key<'a> = (&'a ProjectKey, &'a str);
    type Id = ProjectDataId;

    const TABLE: &'static str = "project_data";
    const ID_COLUMNS: &'static [&'static str] =
        &["project_path_id", "project_name_id", "data_name_id"];

    fn resolve_id(
        strings: &StringTable,
        conn: &Connection,
        key: Self::Key<'_>,
        allow_write: bool,
    ) -> rusqlite::Result<Option<ProjectDataId>> {
        let (project, name) = key;
        let Some(project) = resolve_project(strings, conn, project, allow_write)? else {
            return Ok(None);
        };
        let Some(data_name_id) = strings.resolve(conn, name, allow_write)? else {
            return Ok(None);
        };
        Ok(Some(ProjectDataId {
            project,
            data_name_id,
        }))
    }

    fn bind_id(id: &ProjectDataId) -> Vec<Value> {
        vec![
            Value::Integer(id.project.path_id),
            Value::Integer(id.project.name_id),
            Value::Integer(id.data_name_id),
        ]
    }
}

impl KeyShape for DocumentData {
    type Key<'a> = (&'a DocumentKey, &'a str);
    type Id = DocumentDataId;

    const TABLE: &'static str = "document_data";
    const ID_COLUMNS: &'static [&'static str] = &[
        "project_path_id",
        "project_name_id",
        "document_path_id",
        "document_name_id",
        "data_name_id",
    ];

    fn resolve_id(
        strings: &StringTable,
        conn: &Connection,
        key: Self::Key<'_>,
        allow_write: bool,
    ) -> rusqlite::Result<Option<DocumentDataId>> {
        let (document, name) = key;
        let Some(project) = resolve_project(strings, conn, &document.project, allow_write)? else {
            return Ok(None);
        };
        let Some(document_path_id) = strings.resolve(conn, &document.path, allow_write)? else {
            return Ok(None);
        };
        let Some(document_name_id) = strings.resolve(conn, &document.name, allow_write)? else {
            return Ok(None);
        };
        let Some(data_name_id) = strings.resolve(conn, name, allow_write)? else {
            return Ok(None);
        };
        Ok(Some(DocumentDataId {
            project,
            document_path_id,
            document_name_id,
            data_name_id,
        }))
    }

    fn bind_id(id: &DocumentDataId) -> Vec<Value> {
        vec![
            Value::Integer(id.project.path_id),
            Value::Integer(id.project.name_id),
            Value::Integer(id.document_path_id),
            Value::Integer(id.document_name_id),
            Value::Integer(id.data_name_id),
        ]
    }
}

impl KeyShape for AssetData {
    type Key<'a> = Checksum;
    type Id = Checksum;

    const TABLE: &'static str = "asset_data";
    const ID_COLUMNS: &'static [&'static str] = &["checksum_key"];

    fn resolve_id(
        _strings: &StringTable,
        _conn: &Connection,
        key: Self::Key<'_>,
        _allow_write: bool,
    ) -> rusqlite::Result<Option<Checksum>> {
        // The null checksum never names a stored payload.
        Ok((!key.is_null()).then_some(key))
    }

    fn bind_id(id: &Checksum) -> Vec<Value> {
        vec![Value::Blob(id.as_bytes().to_vec())]
    }
}
