use arbor_core::Checksum;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, OptionalExtension, TransactionBehavior};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StorageError};
use crate::keys::KeyShape;
use crate::storage::StorageShared;

/// Checksum-gated reads and writes of binary payloads for one key shape.
///
/// Database failures degrade to "absent" / "not written" and are logged; only
/// cancellation surfaces as an error.
pub struct Accessor<S: KeyShape> {
    shared: Arc<StorageShared>,
    select_checksum: String,
    select_row: String,
    upsert: String,
    _shape: PhantomData<fn() -> S>,
}

impl<S: KeyShape> Accessor<S> {
    pub(crate) fn new(shared: Arc<StorageShared>) -> Self {
        let predicate = S::ID_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, column)| format!("{column} = ?{}", idx + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        let columns = S::ID_COLUMNS.join(", ");
        let placeholders = (1..=S::ID_COLUMNS.len() + 2)
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            shared,
            select_checksum: format!("SELECT checksum FROM {} WHERE {predicate}", S::TABLE),
            select_row: format!("SELECT checksum, data FROM {} WHERE {predicate}", S::TABLE),
            upsert: format!(
                "INSERT OR REPLACE INTO {} ({columns}, checksum, data) VALUES ({placeholders})",
                S::TABLE
            ),
            _shape: PhantomData,
        }
    }

    /// True iff a row exists for `key` and its stored checksum equals `expected`.
    ///
    /// Never allocates ids and never reads the payload.
    pub fn checksum_matches(
        &self,
        key: S::Key<'_>,
        expected: Checksum,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        check_cancelled(cancel)?;

        let guard = self.shared.pool.read();
        let Some(pool) = guard.as_ref() else {
            return Ok(closed(S::TABLE, "checksum_matches", false));
        };
        let conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => return Ok(degraded(S::TABLE, "checksum_matches", &err, false)),
        };

        let id = match S::resolve_id(&self.shared.strings, &conn, key, false) {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(false),
            Err(err) => return Ok(degraded(S::TABLE, "checksum_matches", &err, false)),
        };

        let stored = conn
            .query_row(
                &self.select_checksum,
                params_from_iter(S::bind_id(&id)),
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional();
        match stored {
            Ok(Some(Some(bytes))) => Ok(Checksum::from_slice(&bytes) == Some(expected)),
            Ok(_) => Ok(false),
            Err(err) => Ok(degraded(S::TABLE, "checksum_matches", &err, false)),
        }
    }

    /// Read the payload stored under `key`.
    ///
    /// With `expected = Some(c)` the payload is returned only if the stored
    /// checksum equals `c`; with `None` it is returned unconditionally.
    pub fn read_stream(
        &self,
        key: S::Key<'_>,
        expected: Option<Checksum>,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        check_cancelled(cancel)?;

        let guard = self.shared.pool.read();
        let Some(pool) = guard.as_ref() else {
            return Ok(closed(S::TABLE, "read_stream", None));
        };
        let conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => return Ok(degraded(S::TABLE, "read_stream", &err, None)),
        };

        let id = match S::resolve_id(&self.shared.strings, &conn, key, false) {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(None),
            Err(err) => return Ok(degraded(S::TABLE, "read_stream", &err, None)),
        };

        let row = conn
            .query_row(&self.select_row, params_from_iter(S::bind_id(&id)), |row| {
                Ok((
                    row.get::<_, Option<Vec<u8>>>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                ))
            })
            .optional();
        let (stored, data) = match row {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(err) => return Ok(degraded(S::TABLE, "read_stream", &err, None)),
        };

        if let Some(expected) = expected {
            let stored = stored.as_deref().and_then(Checksum::from_slice);
            if stored != Some(expected) {
                tracing::trace!(
                    target = "arbor.storage",
                    table = S::TABLE,
                    expected = %expected,
                    "stored checksum does not match; treating as a miss"
                );
                return Ok(None);
            }
        }

        Ok(Some(data))
    }

    /// Store `data` (and its checksum) under `key`, replacing any previous row.
    ///
    /// Returns `Ok(false)` when the row was not written; callers may retry.
    /// Checksum and payload are committed in one transaction: a cancelled write
    /// leaves the previous row intact.
    pub fn write_stream(
        &self,
        key: S::Key<'_>,
        data: &[u8],
        checksum: Option<Checksum>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        check_cancelled(cancel)?;

        let guard = self.shared.pool.write();
        let Some(pool) = guard.as_ref() else {
            return Ok(closed(S::TABLE, "write_stream", false));
        };
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => return Ok(degraded(S::TABLE, "write_stream", &err, false)),
        };

        // Ids are allocated in autocommit mode so a rolled-back write never
        // leaves a cached id pointing at a row that does not exist.
        let id = match S::resolve_id(&self.shared.strings, &conn, key, true) {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(false),
            Err(err) => return Ok(degraded(S::TABLE, "write_stream", &err, false)),
        };

        check_cancelled(cancel)?;

        let mut params = S::bind_id(&id);
        params.push(match checksum {
            Some(checksum) => Value::Blob(checksum.as_bytes().to_vec()),
            None => Value::Null,
        });
        params.push(Value::Blob(data.to_vec()));

        let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
            Ok(tx) => tx,
            Err(err) => return Ok(degraded(S::TABLE, "write_stream", &err, false)),
        };
        if let Err(err) = tx.execute(&self.upsert, params_from_iter(params)) {
            return Ok(degraded(S::TABLE, "write_stream", &err, false));
        }
        if cancel.is_cancelled() {
            // Dropping the transaction rolls it back.
            drop(tx);
            return Err(StorageError::Cancelled);
        }
        match tx.commit() {
            Ok(()) => Ok(true),
            Err(err) => Ok(degraded(S::TABLE, "write_stream", &err, false)),
        }
    }
}

impl<S: KeyShape> Clone for Accessor<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            select_checksum: self.select_checksum.clone(),
            select_row: self.select_row.clone(),
            upsert: self.upsert.clone(),
            _shape: PhantomData,
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(StorageError::Cancelled)
    } else {
        Ok(())
    }
}

fn degraded<T>(table: &'static str, op: &'static str, err: &rusqlite::Error, fallback: T) -> T {
    tracing::warn!(
        target = "arbor.storage",
        table,
        op,
        error = %err,
        "storage operation failed; continuing without persisted data"
    );
    fallback
}

fn closed<T>(table: &'static str, op: &'static str, fallback: T) -> T {
    tracing::debug!(target = "arbor.storage", table, op, "storage is closed");
    fallback
}
