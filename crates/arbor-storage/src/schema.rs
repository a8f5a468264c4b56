use rusqlite::Connection;

/// Bumped whenever a table layout changes. Databases stamped with a different
/// `user_version` are discarded and rebuilt.
pub(crate) const SCHEMA_VERSION: i64 = 1;

pub(crate) fn user_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

pub(crate) fn create(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        BEGIN;
        CREATE TABLE IF NOT EXISTS string_table (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            value TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS solution_data (
            data_name_id INTEGER NOT NULL PRIMARY KEY,
            checksum BLOB,
            data BLOB NOT NULL
        );
        CREATE TABLE IF NOT EXISTS project_data (
            project_path_id INTEGER NOT NULL,
            project_name_id INTEGER NOT NULL,
            data_name_id INTEGER NOT NULL,
            checksum BLOB,
            data BLOB NOT NULL,
            PRIMARY KEY (project_path_id, project_name_id, data_name_id)
        );
        CREATE TABLE IF NOT EXISTS document_data (
            project_path_id INTEGER NOT NULL,
            project_name_id INTEGER NOT NULL,
            document_path_id INTEGER NOT NULL,
            document_name_id INTEGER NOT NULL,
            data_name_id INTEGER NOT NULL,
            checksum BLOB,
            data BLOB NOT NULL,
            PRIMARY KEY (
                project_path_id,
                project_name_id,
                document_path_id,
                document_name_id,
                data_name_id
            )
        );
        CREATE TABLE IF NOT EXISTS asset_data (
            checksum_key BLOB NOT NULL PRIMARY KEY,
            checksum BLOB,
            data BLOB NOT NULL
        );
        COMMIT;
        "#,
    )?;
    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
}
