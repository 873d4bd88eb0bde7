//! SQLite implementation of the PaymentLedger trait.
//!
//! The primary, durable ledger backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use paygate_core::{Amount, ContentId, RequesterId};

use crate::error::{LedgerError, Result};
use crate::migration;
use crate::traits::{PaymentLedger, RecordOutcome};

/// SQLite-based ledger implementation.
///
/// Thread-safe via internal Mutex. Every operation runs on the blocking
/// pool so the async runtime never waits on disk.
pub struct SqliteLedger {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a SQLite ledger at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())?;
        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.as_ref().display(), "opened sqlite ledger");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite ledger.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| LedgerError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| LedgerError::Task(e.to_string()))?
    }
}

#[async_trait]
impl PaymentLedger for SqliteLedger {
    async fn has_payment(&self, content: &ContentId, requester: &RequesterId) -> Result<bool> {
        let content = content.as_bytes().to_vec();
        let requester = requester.as_bytes().to_vec();

        self.run(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM payments WHERE content_id = ?1 AND requester = ?2",
                    params![content, requester],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn record_payment(
        &self,
        content: &ContentId,
        requester: &RequesterId,
        fee: Amount,
    ) -> Result<RecordOutcome> {
        let content = content.as_bytes().to_vec();
        let requester = requester.as_bytes().to_vec();
        let fee = i64::try_from(fee.units())
            .map_err(|_| LedgerError::InvalidData(format!("fee {} exceeds i64", fee)))?;

        self.run(move |conn| {
            // IMMEDIATE takes the write lock up front so the insert and the
            // treasury credit commit together or not at all.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO payments (content_id, requester) VALUES (?1, ?2)",
                params![content, requester],
            )?;

            if inserted == 0 {
                return Ok(RecordOutcome::AlreadyPaid);
            }

            tx.execute(
                "UPDATE treasury SET collected = CASE
                    WHEN collected > 9223372036854775807 - ?1 THEN 9223372036854775807
                    ELSE collected + ?1
                 END
                 WHERE id = 0",
                params![fee],
            )?;

            tx.commit()?;
            Ok(RecordOutcome::Recorded)
        })
        .await
    }

    async fn payment_count(&self) -> Result<u64> {
        self.run(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn payers_of(&self, content: &ContentId) -> Result<Vec<RequesterId>> {
        let content = content.as_bytes().to_vec();

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT requester FROM payments WHERE content_id = ?1 ORDER BY requester",
            )?;
            let payers = stmt
                .query_map(params![content], |row| {
                    let bytes: Vec<u8> = row.get(0)?;
                    Ok(RequesterId::from_bytes(bytes))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(payers)
        })
        .await
    }

    async fn collected(&self) -> Result<Amount> {
        self.run(|conn| {
            let collected: i64 =
                conn.query_row("SELECT collected FROM treasury WHERE id = 0", [], |row| {
                    row.get(0)
                })?;
            let units = u64::try_from(collected)
                .map_err(|_| LedgerError::InvalidData(format!("negative treasury {}", collected)))?;
            Ok(Amount(units))
        })
        .await
    }
}
