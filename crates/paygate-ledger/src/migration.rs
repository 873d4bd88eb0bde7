//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration transforms the
//! schema from version N to N+1 inside one transaction.

use rusqlite::Connection;

use paygate_core::now_millis;

use crate::error::{LedgerError, Result};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(LedgerError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "ledger schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(LedgerError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per paid (content, requester) pair. Never deleted.
        CREATE TABLE payments (
            content_id BLOB NOT NULL,         -- opaque content reference
            requester BLOB NOT NULL,          -- opaque requester identity
            PRIMARY KEY (content_id, requester)
        ) WITHOUT ROWID;

        -- Single-row aggregate of retained fees
        CREATE TABLE treasury (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            collected INTEGER NOT NULL
        );
        INSERT INTO treasury (id, collected) VALUES (0, 0);

        CREATE INDEX idx_payments_requester ON payments(requester);
        "#,
    )?;

    Ok(())
}
