//! Versioned SQLite schema migrations.
//!
//! Each migration is one SQL batch stepping the schema from version N to
//! N+1; applied versions are recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Schema version this build expects.
pub const CURRENT_VERSION: u32 = 1;

/// Bring the database up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Streams: one row per checkpoint chain
        CREATE TABLE streams (
            stream_id BLOB PRIMARY KEY,       -- 32 bytes, derived from (creator, nonce)
            publisher BLOB NOT NULL,          -- 32 bytes, current write authority
            name TEXT NOT NULL,
            policy BLOB NOT NULL,             -- CBOR EntitlementPolicy, fixed at creation
            head BLOB,                        -- 32 bytes, nullable while the chain is empty
            count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,      -- Unix ms
            updated_at INTEGER NOT NULL
        );

        -- Checkpoints: the chains themselves. Keyed by id registry-wide so
        -- the append-time collision check is one primary-key probe.
        CREATE TABLE checkpoints (
            checkpoint_id BLOB PRIMARY KEY,   -- 32 bytes, Blake3 over the canonical preimage
            stream_id BLOB NOT NULL,
            seq INTEGER NOT NULL,             -- zero-based position within the stream
            prev BLOB,                        -- 32 bytes, NULL for the first checkpoint
            state_commitment BLOB NOT NULL,   -- 32 bytes
            ciphertext_hash BLOB NOT NULL,    -- 32 bytes
            ciphertext_pointer TEXT NOT NULL, -- the only mutable column
            manifest_hash BLOB NOT NULL,      -- 32 bytes
            timestamp INTEGER NOT NULL,       -- commit time, Unix ms
            sequence INTEGER NOT NULL,        -- registry-wide publish marker

            UNIQUE(stream_id, seq)
        );

        -- Tags: one row per live pairing; both uniqueness constraints
        -- together enforce the bidirectional invariant at rest.
        CREATE TABLE tags (
            stream_id BLOB NOT NULL,
            tag TEXT NOT NULL,
            checkpoint_id BLOB NOT NULL,
            PRIMARY KEY (stream_id, tag),
            UNIQUE (stream_id, checkpoint_id)
        );

        -- Consumptions: write-once rows; scope is a checkpoint id or the
        -- zero sentinel for stream-wide consumption.
        CREATE TABLE consumptions (
            stream_id BLOB NOT NULL,
            account BLOB NOT NULL,
            scope BLOB NOT NULL,
            consumed_at INTEGER NOT NULL,
            PRIMARY KEY (stream_id, account, scope)
        );

        -- Allowlist rosters
        CREATE TABLE roster (
            stream_id BLOB NOT NULL,
            account BLOB NOT NULL,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (stream_id, account)
        );

        -- Key envelopes: write-once per (consumer, checkpoint)
        CREATE TABLE envelopes (
            stream_id BLOB NOT NULL,
            consumer BLOB NOT NULL,
            checkpoint_id BLOB NOT NULL,
            wrapped_key BLOB NOT NULL,        -- opaque, stored verbatim
            nonce BLOB NOT NULL,              -- 12 bytes
            sender_public BLOB NOT NULL,      -- 32 bytes
            delivered_at INTEGER NOT NULL,
            PRIMARY KEY (stream_id, consumer, checkpoint_id)
        );

        -- Registry counters (stream_nonce, publish_sequence)
        CREATE TABLE meta (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        -- Indexes for common queries
        CREATE INDEX idx_checkpoints_stream_seq ON checkpoints(stream_id, seq);
        CREATE INDEX idx_checkpoints_timestamp ON checkpoints(timestamp);
        CREATE INDEX idx_streams_publisher ON streams(publisher);
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
