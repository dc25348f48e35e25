//! Retrying transaction runner.
//!
//! Every unit of work runs inside [`Gateway::run`]: a fresh connection, a
//! deferred transaction, commit on success and rollback on error. Lock
//! contention restarts the whole cycle; once the retries are spent a single
//! exclusive attempt decides the outcome.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deferred attempts before escalating to an exclusive transaction.
    pub attempts: u32,
    /// Sleep after attempt `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayOptions {
    /// How long SQLite itself waits on a lock before reporting busy.
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    Standard,
    Exclusive,
}

/// An open transaction handed to an operation.
///
/// Derefs to the underlying connection so nested operations take
/// `&Connection` and compose freely.
pub struct Tx<'c> {
    inner: Transaction<'c>,
    mode: TxMode,
}

impl Tx<'_> {
    pub fn mode(&self) -> TxMode {
        self.mode
    }
}

impl Deref for Tx<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.inner
    }
}

#[derive(Debug, Clone)]
pub struct Gateway {
    path: PathBuf,
    options: GatewayOptions,
}

impl Gateway {
    pub fn new(path: impl Into<PathBuf>, options: GatewayOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Run `op` in a transaction, retrying on lock contention.
    ///
    /// `op` may run several times and must not have side effects outside
    /// the transaction it is given.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(&Tx<'_>) -> Result<T, StoreError>,
    {
        let retry = self.options.retry;
        for attempt in 1..=retry.attempts {
            match self.attempt(TransactionBehavior::Deferred, TxMode::Standard, &mut op) {
                Err(e) if e.is_busy() => {
                    tracing::warn!(attempt, of = retry.attempts, error = %e, "database busy, retrying");
                    thread::sleep(retry.backoff * attempt);
                }
                other => return other,
            }
        }

        tracing::warn!(attempts = retry.attempts, "retries exhausted, escalating to exclusive transaction");
        self.attempt(TransactionBehavior::Exclusive, TxMode::Exclusive, &mut op)
            .map_err(|e| match e {
                StoreError::Sqlite(source) => StoreError::Escalation {
                    attempts: retry.attempts,
                    source,
                },
                other => other,
            })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(|source| StoreError::Open {
            path: self.path.clone(),
            source,
        })?;
        conn.busy_timeout(self.options.busy_timeout)?;
        Ok(conn)
    }

    fn attempt<T, F>(&self, behavior: TransactionBehavior, mode: TxMode, op: &mut F) -> Result<T, StoreError>
    where
        F: FnMut(&Tx<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.connect()?;
        let result = transact(&mut conn, behavior, mode, op);
        release(conn);
        result
    }
}

fn transact<T, F>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    mode: TxMode,
    op: &mut F,
) -> Result<T, StoreError>
where
    F: FnMut(&Tx<'_>) -> Result<T, StoreError>,
{
    let tx = Tx {
        inner: conn.transaction_with_behavior(behavior)?,
        mode,
    };
    match op(&tx) {
        Ok(value) => {
            tx.inner.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.inner.rollback() {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Close a connection. A connection that cannot be closed leaves the
/// database in an unknown state, so the process stops.
fn release(conn: Connection) {
    if let Err((_conn, e)) = conn.close() {
        tracing::error!(error = %e, "failed to close database connection");
        std::process::abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;
    use tempfile::TempDir;

    fn quick(dir: &TempDir, attempts: u32) -> Gateway {
        Gateway::new(
            dir.path().join("test.db"),
            GatewayOptions {
                busy_timeout: Duration::ZERO,
                retry: RetryPolicy {
                    attempts,
                    backoff: Duration::from_millis(1),
                },
            },
        )
    }

    fn busy() -> StoreError {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None))
    }

    #[test]
    fn commits_on_success() {
        let dir = TempDir::new().unwrap();
        let gw = quick(&dir, 5);
        gw.run(|tx| {
            tx.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")?;
            Ok(())
        })
        .unwrap();
        let n: i64 = gw.run(|tx| Ok(tx.query_row("SELECT count(*) FROM t", [], |r| r.get(0))?)).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let gw = quick(&dir, 5);
        gw.run(|tx| Ok(tx.execute_batch("CREATE TABLE t (x INTEGER)")?)).unwrap();
        let err = gw
            .run(|tx| -> Result<(), StoreError> {
                tx.execute("INSERT INTO t VALUES (1)", [])?;
                Err(StoreError::MissingTable("nope".into()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingTable(_)));
        let n: i64 = gw.run(|tx| Ok(tx.query_row("SELECT count(*) FROM t", [], |r| r.get(0))?)).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn busy_retries_then_escalates_to_exclusive() {
        let dir = TempDir::new().unwrap();
        let gw = quick(&dir, 5);
        gw.run(|tx| Ok(tx.execute_batch("CREATE TABLE t (x INTEGER)")?)).unwrap();

        let mut calls = 0;
        let mode = gw
            .run(|tx| {
                calls += 1;
                tx.execute("INSERT INTO t VALUES (?1)", [calls])?;
                if tx.mode() == TxMode::Standard {
                    return Err(busy());
                }
                Ok(tx.mode())
            })
            .unwrap();

        assert_eq!(calls, 6);
        assert_eq!(mode, TxMode::Exclusive);
        // Only the exclusive attempt committed.
        let rows: Vec<i64> = gw
            .run(|tx| {
                let mut stmt = tx.prepare("SELECT x FROM t")?;
                let rows = stmt.query_map([], |r| r.get(0))?.collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .unwrap();
        assert_eq!(rows, vec![6]);
    }

    #[test]
    fn non_busy_errors_are_not_retried() {
        let dir = TempDir::new().unwrap();
        let gw = quick(&dir, 5);
        let mut calls = 0;
        let err = gw
            .run(|_| -> Result<(), StoreError> {
                calls += 1;
                Err(StoreError::MissingTable("listings".into()))
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(err.is_fatal());
    }

    #[test]
    fn held_lock_exhausts_retries() {
        let dir = TempDir::new().unwrap();
        let gw = quick(&dir, 2);
        gw.run(|tx| Ok(tx.execute_batch("CREATE TABLE t (x INTEGER)")?)).unwrap();

        let holder = Connection::open(gw.path()).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = gw
            .run(|tx| Ok(tx.execute("INSERT INTO t VALUES (1)", [])?))
            .unwrap_err();
        assert!(err.is_busy(), "{err}");
        assert!(matches!(err, StoreError::Escalation { attempts: 2, .. }));

        holder.execute_batch("ROLLBACK").unwrap();
    }
}
