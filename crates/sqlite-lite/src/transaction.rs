//! Transaction guard and scoped execution.

use crate::connection::Connection;
use sqlite_lite_core::Error;
use std::ops::Deref;

/// Locking behavior for `BEGIN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionBehavior {
    /// Locks are taken on first read or write.
    #[default]
    Deferred,
    /// A write lock is taken immediately.
    Immediate,
    /// Like `Immediate`; in non-WAL modes readers are kept out too.
    Exclusive,
}

impl TransactionBehavior {
    pub(crate) const fn begin_sql(self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// An open transaction.
///
/// Consume it with [`commit`](Self::commit) or [`rollback`](Self::rollback);
/// dropping it unfinished (including during a panic) rolls back. Derefs to
/// the [`Connection`] so work can be issued through the guard.
#[derive(Debug)]
#[must_use = "dropping a transaction rolls it back"]
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    finished: bool,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn begin(
        conn: &'conn Connection,
        behavior: TransactionBehavior,
    ) -> Result<Self, Error> {
        conn.begin_with(behavior)?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Commit the transaction.
    ///
    /// If the engine refuses (for example a busy database) and leaves the
    /// transaction open, it is rolled back before the commit error is
    /// returned.
    pub fn commit(mut self) -> Result<(), Error> {
        self.finished = true;
        let result = self.conn.commit();
        if let Err(err) = &result {
            if self.conn.in_transaction() {
                tracing::warn!(error = %err, "commit failed; rolling back");
                if let Err(rollback_err) = self.conn.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
                }
            }
        }
        result
    }

    /// Roll the transaction back.
    ///
    /// A transaction the engine already ended on its own (some I/O and
    /// constraint failures abort it) counts as rolled back.
    pub fn rollback(mut self) -> Result<(), Error> {
        self.finished = true;
        if !self.conn.in_transaction() {
            tracing::debug!("transaction already ended by the engine");
            return Ok(());
        }
        self.conn.rollback()
    }
}

impl Deref for Transaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished || !self.conn.in_transaction() {
            return;
        }
        if std::thread::panicking() {
            tracing::debug!("rolling back transaction during panic");
        }
        if let Err(e) = self.conn.rollback() {
            tracing::warn!(error = %e, "failed to roll back dropped transaction");
        }
    }
}

/// Run `work` inside a deferred transaction.
///
/// Commits when `work` returns `Ok`, and returns the commit error if that
/// fails. Rolls back when `work` returns `Err` or panics; a rollback failure
/// on that path is logged and the original error (or panic) wins. Exactly one
/// of commit or rollback is issued per call.
///
/// ```
/// use sqlite_lite::{Connection, Error, params, run_in_transaction};
///
/// let conn = Connection::open_memory().unwrap();
/// conn.exec("CREATE TABLE t (x INTEGER)").unwrap();
///
/// let result: Result<(), Error> = run_in_transaction(&conn, |conn| {
///     conn.prepare("INSERT INTO t VALUES (?)", params![1])?.exec(params![1])?;
///     conn.exec("INSERT INTO missing VALUES (1)")
/// });
/// assert!(result.is_err());
///
/// let mut count = conn.prepare("SELECT count(*) FROM t", params![]).unwrap();
/// count.step().unwrap();
/// assert_eq!(count.column::<i64>(0).unwrap(), 0);
/// ```
pub fn run_in_transaction<T, E, F>(conn: &Connection, work: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<Error>,
{
    let tx = Transaction::begin(conn, TransactionBehavior::Deferred)?;
    match work(tx.connection()) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::warn!(error = %rollback_err, "rollback failed; returning the original error");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn counter() -> Connection {
        let conn = Connection::open_memory().unwrap();
        conn.exec("CREATE TABLE t (x INTEGER)").unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        let mut stmt = conn.prepare("SELECT count(*) FROM t", &[]).unwrap();
        stmt.step().unwrap();
        stmt.column(0).unwrap()
    }

    #[test]
    fn test_begin_sql() {
        assert_eq!(TransactionBehavior::default().begin_sql(), "BEGIN DEFERRED");
        assert_eq!(TransactionBehavior::Immediate.begin_sql(), "BEGIN IMMEDIATE");
        assert_eq!(TransactionBehavior::Exclusive.begin_sql(), "BEGIN EXCLUSIVE");
    }

    #[test]
    fn test_guard_commit() {
        let conn = counter();
        let tx = conn.transaction().unwrap();
        tx.exec("INSERT INTO t VALUES (1)").unwrap();
        assert!(tx.in_transaction());
        tx.commit().unwrap();
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_guard_drop_rolls_back() {
        let conn = counter();
        {
            let tx = conn
                .transaction_with(TransactionBehavior::Immediate)
                .unwrap();
            tx.exec("INSERT INTO t VALUES (1)").unwrap();
        }
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_guard_explicit_rollback() {
        let conn = counter();
        let tx = conn.transaction().unwrap();
        tx.exec("INSERT INTO t VALUES (1)").unwrap();
        tx.rollback().unwrap();
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_guard_does_not_nest() {
        let conn = counter();
        let _tx = conn.transaction().unwrap();
        assert!(conn.transaction().is_err());
    }

    #[test]
    fn test_rollback_after_manual_end_is_ok() {
        let conn = counter();
        let tx = conn.transaction().unwrap();
        conn.exec("ROLLBACK").unwrap();
        tx.rollback().unwrap();
    }

    #[test]
    fn test_helper_commits_on_success() {
        let conn = counter();
        let value = run_in_transaction(&conn, |conn| -> Result<i64, Error> {
            let mut insert = conn.prepare("INSERT INTO t VALUES (?)", &[])?;
            for x in 0..3 {
                insert.exec(params![x])?;
            }
            Ok(42)
        })
        .unwrap();
        assert_eq!(value, 42);
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 3);
    }

    #[test]
    fn test_helper_rolls_back_on_error() {
        let conn = counter();
        let err = conn
            .with_transaction(|conn| -> Result<(), Error> {
                conn.exec("INSERT INTO t VALUES (1)")?;
                conn.exec("INSERT INTO nowhere VALUES (1)")
            })
            .unwrap_err();
        assert!(matches!(err, Error::Exec(_)));
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 0);
    }

    #[derive(Debug)]
    enum AppError {
        Db(Error),
        Invalid(&'static str),
    }

    impl From<Error> for AppError {
        fn from(err: Error) -> Self {
            AppError::Db(err)
        }
    }

    #[test]
    fn test_helper_with_caller_error_type() {
        let conn = counter();
        let err = run_in_transaction(&conn, |conn| -> Result<(), AppError> {
            conn.exec("INSERT INTO t VALUES (1)")?;
            Err(AppError::Invalid("business rule"))
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Invalid("business rule")));
        assert_eq!(count(&conn), 0);

        // A failed BEGIN surfaces through From<Error>
        conn.begin().unwrap();
        let err = run_in_transaction(&conn, |_| Ok::<(), AppError>(())).unwrap_err();
        assert!(matches!(err, AppError::Db(Error::Transaction(_))));
        conn.rollback().unwrap();
    }
}
