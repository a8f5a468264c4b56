use parking_lot::RwLock;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;

/// Maps composite-key string components to small integer ids.
///
/// Ids live in the `string_table` of the database; this type caches the ones
/// already seen. Allocation uses `INSERT OR IGNORE` against a `UNIQUE` column
/// followed by a `SELECT`, so writers racing on the same value converge on one id.
#[derive(Default)]
pub struct StringTable {
    ids: RwLock<HashMap<String, i64>>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `value` to its id.
    ///
    /// With `allow_write = false` the database is never mutated and an unseen
    /// value yields `None`. With `allow_write = true` an id is allocated on first
    /// use; callers must hold the storage write lock.
    pub fn resolve(
        &self,
        conn: &Connection,
        value: &str,
        allow_write: bool,
    ) -> rusqlite::Result<Option<i64>> {
        if let Some(id) = self.ids.read().get(value) {
            return Ok(Some(*id));
        }

        let id = match select_id(conn, value)? {
            Some(id) => id,
            None if !allow_write => return Ok(None),
            None => {
                conn.execute(
                    "INSERT OR IGNORE INTO string_table(value) VALUES (?1)",
                    [value],
                )?;
                match select_id(conn, value)? {
                    Some(id) => id,
                    None => return Err(rusqlite::Error::QueryReturnedNoRows),
                }
            }
        };

        self.ids.write().insert(value.to_owned(), id);
        Ok(Some(id))
    }

    pub fn cached_len(&self) -> usize {
        self.ids.read().len()
    }
}

fn select_id(conn: &Connection, value: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM string_table WHERE value = ?1",
        [value],
        |row| row.get(0),
    )
    .optional()
}
