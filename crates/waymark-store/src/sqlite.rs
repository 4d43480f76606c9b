//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the Waymark registry. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use waymark_access::{EnvelopeNonce, EphemeralPublicKey, KeyEnvelope};
use waymark_core::{
    AccountId, Checkpoint, CheckpointId, Digest, EntitlementPolicy, StreamId, StreamRecord,
    TagShift,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AppendResult, InsertOutcome, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations run on the blocking
/// thread pool to avoid stalling the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read-only closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }

    /// Run a closure that needs mutable access (transactions) on the
    /// blocking pool.
    async fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// Map a 32-byte blob column, rejecting any other width.
fn blob32(bytes: Vec<u8>, idx: usize, name: &str) -> rusqlite::Result<[u8; 32]> {
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Blob)
    })
}

// Helper to convert a row to a Checkpoint
fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Checkpoint> {
    let id_bytes: Vec<u8> = row.get("checkpoint_id")?;
    let stream_id_bytes: Vec<u8> = row.get("stream_id")?;
    let prev_bytes: Option<Vec<u8>> = row.get("prev")?;
    let state_bytes: Vec<u8> = row.get("state_commitment")?;
    let cipher_bytes: Vec<u8> = row.get("ciphertext_hash")?;
    let manifest_bytes: Vec<u8> = row.get("manifest_hash")?;

    let prev = match prev_bytes {
        Some(bytes) => Some(CheckpointId::from_bytes(blob32(bytes, 3, "prev")?)),
        None => None,
    };

    Ok(Checkpoint {
        id: CheckpointId::from_bytes(blob32(id_bytes, 0, "checkpoint_id")?),
        stream_id: StreamId::from_bytes(blob32(stream_id_bytes, 1, "stream_id")?),
        seq: row.get::<_, i64>("seq")? as u64,
        prev,
        state_commitment: Digest::from_bytes(blob32(state_bytes, 4, "state_commitment")?),
        ciphertext_hash: Digest::from_bytes(blob32(cipher_bytes, 5, "ciphertext_hash")?),
        ciphertext_pointer: row.get("ciphertext_pointer")?,
        manifest_hash: Digest::from_bytes(blob32(manifest_bytes, 7, "manifest_hash")?),
        timestamp: row.get("timestamp")?,
        sequence: row.get::<_, i64>("sequence")? as u64,
    })
}

// Two-sided clear-then-set for one tag pairing. Caller owns the transaction
// and has verified the checkpoint belongs to the stream.
fn assign_tag_tx(
    conn: &Connection,
    stream_id: &StreamId,
    checkpoint_id: &CheckpointId,
    tag: &str,
) -> Result<TagShift> {
    let mut shift = TagShift::default();

    let holder: Option<Vec<u8>> = conn
        .query_row(
            "SELECT checkpoint_id FROM tags WHERE stream_id = ?1 AND tag = ?2",
            params![stream_id.as_bytes().as_slice(), tag],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(holder_bytes) = holder {
        let holder_id = CheckpointId::try_from(holder_bytes.as_slice())
            .map_err(|_| StoreError::InvalidData("tag holder column width".to_string()))?;
        if holder_id == *checkpoint_id {
            return Ok(shift);
        }
        shift.untagged = Some(holder_id);
    }

    let old_tag: Option<String> = conn
        .query_row(
            "SELECT tag FROM tags WHERE stream_id = ?1 AND checkpoint_id = ?2",
            params![
                stream_id.as_bytes().as_slice(),
                checkpoint_id.as_bytes().as_slice()
            ],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(old) = old_tag {
        if old != tag {
            shift.unbound = Some(old);
        }
    }

    conn.execute(
        "DELETE FROM tags WHERE stream_id = ?1 AND tag = ?2",
        params![stream_id.as_bytes().as_slice(), tag],
    )?;
    conn.execute(
        "DELETE FROM tags WHERE stream_id = ?1 AND checkpoint_id = ?2",
        params![
            stream_id.as_bytes().as_slice(),
            checkpoint_id.as_bytes().as_slice()
        ],
    )?;
    conn.execute(
        "INSERT INTO tags (stream_id, tag, checkpoint_id) VALUES (?1, ?2, ?3)",
        params![
            stream_id.as_bytes().as_slice(),
            tag,
            checkpoint_id.as_bytes().as_slice()
        ],
    )?;

    Ok(shift)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_stream(
        &self,
        record: &StreamRecord,
        next_nonce: u64,
    ) -> Result<InsertOutcome> {
        let record = record.clone();

        self.with_conn_mut(move |conn| {
            let policy_bytes = record
                .policy
                .to_bytes()
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM streams WHERE stream_id = ?1)",
                params![record.stream_id.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(InsertOutcome::Exists);
            }

            tx.execute(
                "INSERT INTO streams (
                    stream_id, publisher, name, policy, head, count,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.stream_id.as_bytes().as_slice(),
                    record.publisher.as_bytes().as_slice(),
                    &record.name,
                    policy_bytes,
                    record.head.as_ref().map(|id| id.0.as_slice()),
                    record.count as i64,
                    record.created_at,
                    record.updated_at,
                ],
            )?;

            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('stream_nonce', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![next_nonce as i64],
            )?;

            tx.commit()?;
            Ok(InsertOutcome::Inserted)
        })
        .await
    }

    async fn update_publisher(
        &self,
        stream_id: &StreamId,
        new_publisher: &AccountId,
        at: i64,
    ) -> Result<()> {
        let stream_id = *stream_id;
        let new_publisher = *new_publisher;

        self.with_conn(move |conn| {
            let affected = conn.execute(
                "UPDATE streams SET publisher = ?2, updated_at = ?3 WHERE stream_id = ?1",
                params![
                    stream_id.as_bytes().as_slice(),
                    new_publisher.as_bytes().as_slice(),
                    at,
                ],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound(format!("stream {}", stream_id)));
            }
            Ok(())
        })
        .await
    }

    async fn get_stream(&self, stream_id: &StreamId) -> Result<Option<StreamRecord>> {
        let stream_id = *stream_id;

        self.with_conn(move |conn| {
            let row: Option<(Vec<u8>, String, Vec<u8>, Option<Vec<u8>>, i64, i64, i64)> = conn
                .query_row(
                    "SELECT publisher, name, policy, head, count, created_at, updated_at
                     FROM streams WHERE stream_id = ?1",
                    params![stream_id.as_bytes().as_slice()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    },
                )
                .optional()?;

            let Some((publisher, name, policy_bytes, head, count, created_at, updated_at)) = row
            else {
                return Ok(None);
            };

            let policy = EntitlementPolicy::from_bytes(&policy_bytes)
                .map_err(|e| StoreError::InvalidData(format!("stream policy: {}", e)))?;

            let publisher = AccountId::try_from(publisher.as_slice())
                .map_err(|_| StoreError::InvalidData("publisher column width".to_string()))?;
            let head = match head {
                Some(bytes) => Some(
                    CheckpointId::try_from(bytes.as_slice())
                        .map_err(|_| StoreError::InvalidData("head column width".to_string()))?,
                ),
                None => None,
            };

            Ok(Some(StreamRecord {
                stream_id,
                publisher,
                name,
                policy,
                head,
                count: count as u64,
                created_at,
                updated_at,
            }))
        })
        .await
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>> {
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT stream_id FROM streams ORDER BY created_at, stream_id")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|bytes| {
                    StreamId::try_from(bytes.as_slice()).map_err(|_| {
                        StoreError::InvalidData("stream_id column width".to_string())
                    })
                })
                .collect()
        })
        .await
    }

    async fn append_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        label: Option<&str>,
    ) -> Result<AppendResult> {
        let checkpoint = checkpoint.clone();
        let label = label.map(str::to_string);

        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM checkpoints WHERE checkpoint_id = ?1)",
                params![checkpoint.id.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(AppendResult::IdExists);
            }

            tx.execute(
                "INSERT INTO checkpoints (
                    checkpoint_id, stream_id, seq, prev, state_commitment,
                    ciphertext_hash, ciphertext_pointer, manifest_hash,
                    timestamp, sequence
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    checkpoint.id.as_bytes().as_slice(),
                    checkpoint.stream_id.as_bytes().as_slice(),
                    checkpoint.seq as i64,
                    checkpoint.prev.as_ref().map(|id| id.0.as_slice()),
                    checkpoint.state_commitment.as_bytes().as_slice(),
                    checkpoint.ciphertext_hash.as_bytes().as_slice(),
                    &checkpoint.ciphertext_pointer,
                    checkpoint.manifest_hash.as_bytes().as_slice(),
                    checkpoint.timestamp,
                    checkpoint.sequence as i64,
                ],
            )?;

            tx.execute(
                "UPDATE streams SET head = ?2, count = count + 1, updated_at = ?3
                 WHERE stream_id = ?1",
                params![
                    checkpoint.stream_id.as_bytes().as_slice(),
                    checkpoint.id.as_bytes().as_slice(),
                    checkpoint.timestamp,
                ],
            )?;

            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('publish_sequence', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![checkpoint.sequence as i64],
            )?;

            let shift = match label.as_deref() {
                Some(tag) => Some(assign_tag_tx(
                    &tx,
                    &checkpoint.stream_id,
                    &checkpoint.id,
                    tag,
                )?),
                None => None,
            };

            tx.commit()?;
            Ok(AppendResult::Appended { shift })
        })
        .await
    }

    async fn update_pointer(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
        pointer: &str,
    ) -> Result<Option<String>> {
        let stream_id = *stream_id;
        let id = *id;
        let pointer = pointer.to_string();

        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;

            let old: Option<String> = tx
                .query_row(
                    "SELECT ciphertext_pointer FROM checkpoints
                     WHERE checkpoint_id = ?1 AND stream_id = ?2",
                    params![id.as_bytes().as_slice(), stream_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(old) = old else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE checkpoints SET ciphertext_pointer = ?3
                 WHERE checkpoint_id = ?1 AND stream_id = ?2",
                params![
                    id.as_bytes().as_slice(),
                    stream_id.as_bytes().as_slice(),
                    pointer,
                ],
            )?;

            tx.commit()?;
            Ok(Some(old))
        })
        .await
    }

    async fn get_checkpoint(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
    ) -> Result<Option<Checkpoint>> {
        let stream_id = *stream_id;
        let id = *id;

        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT checkpoint_id, stream_id, seq, prev, state_commitment,
                        ciphertext_hash, ciphertext_pointer, manifest_hash,
                        timestamp, sequence
                 FROM checkpoints WHERE checkpoint_id = ?1 AND stream_id = ?2",
                params![id.as_bytes().as_slice(), stream_id.as_bytes().as_slice()],
                row_to_checkpoint,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn checkpoint_at(
        &self,
        stream_id: &StreamId,
        index: u64,
    ) -> Result<Option<Checkpoint>> {
        let stream_id = *stream_id;

        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT checkpoint_id, stream_id, seq, prev, state_commitment,
                        ciphertext_hash, ciphertext_pointer, manifest_hash,
                        timestamp, sequence
                 FROM checkpoints WHERE stream_id = ?1 AND seq = ?2",
                params![stream_id.as_bytes().as_slice(), index as i64],
                row_to_checkpoint,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn assign_tag(
        &self,
        stream_id: &StreamId,
        id: &CheckpointId,
        tag: &str,
    ) -> Result<Option<TagShift>> {
        let stream_id = *stream_id;
        let id = *id;
        let tag = tag.to_string();

        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;

            let belongs: bool = tx.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM checkpoints WHERE checkpoint_id = ?1 AND stream_id = ?2
                 )",
                params![id.as_bytes().as_slice(), stream_id.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            if !belongs {
                return Ok(None);
            }

            let shift = assign_tag_tx(&tx, &stream_id, &id, &tag)?;
            tx.commit()?;
            Ok(Some(shift))
        })
        .await
    }

    async fn resolve_tag(&self, stream_id: &StreamId, tag: &str) -> Result<Option<CheckpointId>> {
        let stream_id = *stream_id;
        let tag = tag.to_string();

        self.with_conn(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT checkpoint_id FROM tags WHERE stream_id = ?1 AND tag = ?2",
                    params![stream_id.as_bytes().as_slice(), tag],
                    |row| row.get(0),
                )
                .optional()?;

            match bytes {
                Some(bytes) => Ok(Some(CheckpointId::try_from(bytes.as_slice()).map_err(
                    |_| StoreError::InvalidData("checkpoint_id column width".to_string()),
                )?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn tag_of(&self, stream_id: &StreamId, id: &CheckpointId) -> Result<Option<String>> {
        let stream_id = *stream_id;
        let id = *id;

        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT tag FROM tags WHERE stream_id = ?1 AND checkpoint_id = ?2",
                params![stream_id.as_bytes().as_slice(), id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn record_consumption(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
        scope: &CheckpointId,
        at: i64,
    ) -> Result<bool> {
        let stream_id = *stream_id;
        let account = *account;
        let scope = *scope;

        self.with_conn(move |conn| {
            let affected = conn.execute(
                "INSERT OR IGNORE INTO consumptions (stream_id, account, scope, consumed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    stream_id.as_bytes().as_slice(),
                    account.as_bytes().as_slice(),
                    scope.as_bytes().as_slice(),
                    at,
                ],
            )?;
            Ok(affected > 0)
        })
        .await
    }

    async fn has_consumed(
        &self,
        stream_id: &StreamId,
        account: &AccountId,
        scope: &CheckpointId,
    ) -> Result<bool> {
        let stream_id = *stream_id;
        let account = *account;
        let scope = *scope;

        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM consumptions
                    WHERE stream_id = ?1 AND account = ?2 AND scope = ?3
                 )",
                params![
                    stream_id.as_bytes().as_slice(),
                    account.as_bytes().as_slice(),
                    scope.as_bytes().as_slice(),
                ],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn roster_add(
        &self,
        stream_id: &StreamId,
        accounts: &[AccountId],
        at: i64,
    ) -> Result<usize> {
        let stream_id = *stream_id;
        let accounts = accounts.to_vec();

        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            let mut added = 0usize;
            for account in &accounts {
                added += tx.execute(
                    "INSERT OR IGNORE INTO roster (stream_id, account, added_at)
                     VALUES (?1, ?2, ?3)",
                    params![
                        stream_id.as_bytes().as_slice(),
                        account.as_bytes().as_slice(),
                        at,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(added)
        })
        .await
    }

    async fn roster_remove(&self, stream_id: &StreamId, account: &AccountId) -> Result<bool> {
        let stream_id = *stream_id;
        let account = *account;

        self.with_conn(move |conn| {
            let affected = conn.execute(
                "DELETE FROM roster WHERE stream_id = ?1 AND account = ?2",
                params![
                    stream_id.as_bytes().as_slice(),
                    account.as_bytes().as_slice(),
                ],
            )?;
            Ok(affected > 0)
        })
        .await
    }

    async fn roster_contains(&self, stream_id: &StreamId, account: &AccountId) -> Result<bool> {
        let stream_id = *stream_id;
        let account = *account;

        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM roster WHERE stream_id = ?1 AND account = ?2
                 )",
                params![
                    stream_id.as_bytes().as_slice(),
                    account.as_bytes().as_slice(),
                ],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn insert_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
        envelope: &KeyEnvelope,
    ) -> Result<bool> {
        let stream_id = *stream_id;
        let consumer = *consumer;
        let id = *id;
        let envelope = envelope.clone();

        self.with_conn(move |conn| {
            let affected = conn.execute(
                "INSERT OR IGNORE INTO envelopes (
                    stream_id, consumer, checkpoint_id, wrapped_key, nonce,
                    sender_public, delivered_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    stream_id.as_bytes().as_slice(),
                    consumer.as_bytes().as_slice(),
                    id.as_bytes().as_slice(),
                    envelope.wrapped_key.as_ref(),
                    envelope.nonce.as_bytes().as_slice(),
                    envelope.sender_public.as_bytes().as_slice(),
                    envelope.delivered_at,
                ],
            )?;
            Ok(affected > 0)
        })
        .await
    }

    async fn get_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
    ) -> Result<Option<KeyEnvelope>> {
        let stream_id = *stream_id;
        let consumer = *consumer;
        let id = *id;

        self.with_conn(move |conn| {
            let row: Option<(Vec<u8>, Vec<u8>, Vec<u8>, i64)> = conn
                .query_row(
                    "SELECT wrapped_key, nonce, sender_public, delivered_at
                     FROM envelopes
                     WHERE stream_id = ?1 AND consumer = ?2 AND checkpoint_id = ?3",
                    params![
                        stream_id.as_bytes().as_slice(),
                        consumer.as_bytes().as_slice(),
                        id.as_bytes().as_slice(),
                    ],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let Some((wrapped_key, nonce, sender_public, delivered_at)) = row else {
                return Ok(None);
            };

            let nonce = EnvelopeNonce::try_from(nonce.as_slice())
                .map_err(|_| StoreError::InvalidData("nonce column width".to_string()))?;
            let sender_public = EphemeralPublicKey::try_from(sender_public.as_slice())
                .map_err(|_| StoreError::InvalidData("sender_public column width".to_string()))?;

            Ok(Some(KeyEnvelope {
                wrapped_key: Bytes::from(wrapped_key),
                nonce,
                sender_public,
                delivered_at,
            }))
        })
        .await
    }

    async fn has_envelope(
        &self,
        stream_id: &StreamId,
        consumer: &AccountId,
        id: &CheckpointId,
    ) -> Result<bool> {
        let stream_id = *stream_id;
        let consumer = *consumer;
        let id = *id;

        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM envelopes
                    WHERE stream_id = ?1 AND consumer = ?2 AND checkpoint_id = ?3
                 )",
                params![
                    stream_id.as_bytes().as_slice(),
                    consumer.as_bytes().as_slice(),
                    id.as_bytes().as_slice(),
                ],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn stream_nonce(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = 'stream_nonce'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.unwrap_or(0) as u64)
        })
        .await
    }

    async fn publish_sequence(&self) -> Result<u64> {
        self.with_conn(move |conn| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = 'publish_sequence'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.unwrap_or(0) as u64)
        })
        .await
    }
}
