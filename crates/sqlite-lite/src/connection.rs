//! SQLite connection implementation.
//!
//! A [`Connection`] owns one engine handle. Statements borrow the connection
//! they were prepared on, so the borrow checker keeps them from outliving it;
//! the connection additionally counts its open statements so that an
//! explicit [`Connection::close`] can refuse to run while any remain.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers
#![allow(clippy::result_large_err)]

use crate::config::{ArityPolicy, ConnectionConfig};
use crate::ffi;
use crate::statement::Statement;
use crate::transaction::{self, Transaction, TransactionBehavior};
use sqlite_lite_core::{
    CloseError, CloseErrorKind, Coercion, ConfigError, EngineError, Error, OpenError, Operation,
    StatementError, TransactionError, TransactionErrorKind, Value,
};
use std::cell::Cell;
use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;

const CLOSED: &str = "connection is closed";

/// Query used to make the engine read page 1 right after opening.
const VERIFY_SQL: &str = "SELECT count(*) FROM sqlite_master";

/// A connection to a SQLite database.
///
/// Connections are single-owner: they may move between threads but are not
/// shared (`Send`, not `Sync`).
pub struct Connection {
    /// Null once the connection has been closed.
    db: Cell<*mut ffi::sqlite3>,
    path: String,
    coercion: Coercion,
    arity: ArityPolicy,
    open_statements: Cell<usize>,
}

// SAFETY: the bundled library is built thread-safe (SQLITE_THREADSAFE=1) and
// Connection is not Sync, so only one thread uses the handle at a time.
// Statements borrow the connection, which pins it to their thread.
unsafe impl Send for Connection {}

impl Connection {
    /// Open a new SQLite connection with the given configuration.
    #[tracing::instrument(level = "debug", skip(config), fields(path = %config.path))]
    pub fn open(config: &ConnectionConfig) -> Result<Self, Error> {
        config.validate()?;
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Open(OpenError {
                path: config.path.clone(),
                message: "path contains a null byte".to_string(),
                engine: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let engine = engine_error(db, rc);
            if !db.is_null() {
                // SAFETY: a handle is allocated even when open fails
                unsafe { ffi::sqlite3_close(db) };
            }
            tracing::debug!(code = %engine.code, message = %engine.message, "open failed");
            return Err(Error::from_engine(
                Operation::Open,
                Some(config.path.as_str()),
                engine,
            ));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid; validate() bounded the timeout to c_int
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        if config.verify_on_open {
            if let Err(engine) = exec_raw(db, VERIFY_SQL) {
                // SAFETY: db is valid and has no statements yet
                unsafe { ffi::sqlite3_close(db) };
                tracing::debug!(code = %engine.code, "database failed verification");
                return Err(Error::from_engine(
                    Operation::Open,
                    Some(config.path.as_str()),
                    engine,
                ));
            }
        }

        tracing::debug!("opened database");
        Ok(Self {
            db: Cell::new(db),
            path: config.path.clone(),
            coercion: config.coercion,
            arity: config.arity,
            open_statements: Cell::new(0),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&ConnectionConfig::memory())
    }

    /// Open a file-based database, creating it if needed.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&ConnectionConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.db.get().is_null()
    }

    /// Number of statements prepared on this connection and not yet closed.
    pub fn open_statements(&self) -> usize {
        self.open_statements.get()
    }

    /// Scan coercion policy handed to statements prepared here.
    pub fn coercion(&self) -> Coercion {
        self.coercion
    }

    /// Bind arity policy handed to statements prepared here.
    pub fn arity(&self) -> ArityPolicy {
        self.arity
    }

    /// Run one or more `;`-separated statements, discarding any rows.
    ///
    /// Intended for schema changes and other parameterless SQL.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn exec(&self, sql: &str) -> Result<(), Error> {
        let db = self.handle(Operation::Exec, Some(sql))?;
        exec_raw(db, sql).map_err(|engine| Error::from_engine(Operation::Exec, Some(sql), engine))
    }

    /// Compile `sql` into a statement.
    ///
    /// `sql` must hold exactly one statement. When `args` is non-empty they
    /// are bound immediately, in order, under the connection's arity policy.
    ///
    /// ```
    /// use sqlite_lite::{Connection, params};
    ///
    /// let conn = Connection::open_memory().unwrap();
    /// let mut stmt = conn.prepare("SELECT ? + 1", params![41]).unwrap();
    /// assert!(stmt.step().unwrap());
    /// let (answer,): (i64,) = stmt.scan().unwrap();
    /// assert_eq!(answer, 42);
    /// ```
    pub fn prepare<'conn>(
        &'conn self,
        sql: &str,
        args: &[Value],
    ) -> Result<Statement<'conn>, Error> {
        let mut stmt = Statement::new(self, sql)?;
        if !args.is_empty() {
            stmt.bind(args)?;
        }
        Ok(stmt)
    }

    /// Is a transaction open?
    ///
    /// Reads the engine's autocommit flag, so transactions begun or ended
    /// through [`exec`](Self::exec) are reflected too.
    pub fn in_transaction(&self) -> bool {
        let db = self.db.get();
        if db.is_null() {
            return false;
        }
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_get_autocommit(db) == 0 }
    }

    /// Begin a deferred transaction.
    pub fn begin(&self) -> Result<(), Error> {
        self.begin_with(TransactionBehavior::Deferred)
    }

    /// Begin a transaction with the given locking behavior.
    ///
    /// Transactions do not nest; beginning while one is open is an error.
    pub fn begin_with(&self, behavior: TransactionBehavior) -> Result<(), Error> {
        let db = self.handle(Operation::Transaction, None)?;
        if self.in_transaction() {
            return Err(tx_error(
                TransactionErrorKind::AlreadyActive,
                "a transaction is already active",
            ));
        }
        exec_raw(db, behavior.begin_sql())
            .map_err(|engine| Error::from_engine(Operation::Transaction, None, engine))?;
        tracing::debug!(?behavior, "BEGIN");
        Ok(())
    }

    /// Commit the open transaction.
    pub fn commit(&self) -> Result<(), Error> {
        self.finish_transaction("COMMIT")
    }

    /// Roll back the open transaction.
    pub fn rollback(&self) -> Result<(), Error> {
        self.finish_transaction("ROLLBACK")
    }

    fn finish_transaction(&self, sql: &'static str) -> Result<(), Error> {
        let db = self.handle(Operation::Transaction, None)?;
        if !self.in_transaction() {
            return Err(tx_error(
                TransactionErrorKind::NotActive,
                format!("cannot {}: no transaction is active", sql),
            ));
        }
        exec_raw(db, sql)
            .map_err(|engine| Error::from_engine(Operation::Transaction, None, engine))?;
        tracing::debug!("{}", sql);
        Ok(())
    }

    /// Begin a deferred transaction guarded by a [`Transaction`].
    ///
    /// Dropping the guard without committing rolls the transaction back.
    pub fn transaction(&self) -> Result<Transaction<'_>, Error> {
        Transaction::begin(self, TransactionBehavior::Deferred)
    }

    pub fn transaction_with(
        &self,
        behavior: TransactionBehavior,
    ) -> Result<Transaction<'_>, Error> {
        Transaction::begin(self, behavior)
    }

    /// Run `work` inside a transaction; see [`run_in_transaction`](transaction::run_in_transaction).
    pub fn with_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<Error>,
    {
        transaction::run_in_transaction(self, work)
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> u64 {
        let db = self.db.get();
        if db.is_null() {
            return 0;
        }
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_changes(db) as u64 }
    }

    /// Rows changed since the connection was opened.
    pub fn total_changes(&self) -> u64 {
        let db = self.db.get();
        if db.is_null() {
            return 0;
        }
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_total_changes(db) as u64 }
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        let db = self.db.get();
        if db.is_null() {
            return 0;
        }
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(db) }
    }

    /// Change how long the engine waits on a locked database. 0 disables
    /// waiting.
    pub fn set_busy_timeout(&self, ms: u32) -> Result<(), Error> {
        let db = self.handle(Operation::Config, None)?;
        let ms = c_int::try_from(ms).map_err(|_| {
            Error::Config(ConfigError {
                message: format!("busy timeout {}ms exceeds {}", ms, c_int::MAX),
                source: None,
            })
        })?;
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_busy_timeout(db, ms) };
        Ok(())
    }

    /// Close the connection.
    ///
    /// Fails while statements prepared on this connection are still open;
    /// close or drop them first. Closing an already-closed connection is a
    /// no-op. An open transaction is rolled back by the engine.
    pub fn close(&self) -> Result<(), Error> {
        let db = self.db.get();
        if db.is_null() {
            tracing::trace!(path = %self.path, "close on closed connection");
            return Ok(());
        }

        let open = self.open_statements.get();
        if open > 0 {
            return Err(Error::Close(CloseError {
                kind: CloseErrorKind::OpenStatements(open),
                message: format!("{} statement(s) still open", open),
                engine: None,
            }));
        }

        if self.in_transaction() {
            tracing::debug!(path = %self.path, "closing with an open transaction; it will be rolled back");
        }

        // SAFETY: db is valid and every statement has been finalized
        let rc = unsafe { ffi::sqlite3_close(db) };
        if rc != ffi::SQLITE_OK {
            return Err(Error::from_engine(
                Operation::Close,
                None,
                engine_error(db, rc),
            ));
        }

        self.db.set(ptr::null_mut());
        tracing::debug!(path = %self.path, "closed database");
        Ok(())
    }

    /// The live handle, or the operation's "connection is closed" error.
    pub(crate) fn handle(
        &self,
        op: Operation,
        sql: Option<&str>,
    ) -> Result<*mut ffi::sqlite3, Error> {
        let db = self.db.get();
        if db.is_null() {
            Err(closed_error(op, sql))
        } else {
            Ok(db)
        }
    }

    pub(crate) fn statement_opened(&self) {
        self.open_statements.set(self.open_statements.get() + 1);
    }

    pub(crate) fn statement_closed(&self) {
        self.open_statements
            .set(self.open_statements.get().saturating_sub(1));
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .field("open_statements", &self.open_statements.get())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let db = self.db.get();
        if db.is_null() {
            return;
        }
        // SAFETY: db is valid; close_v2 defers release if statements leaked
        let rc = unsafe { ffi::sqlite3_close_v2(db) };
        if rc != ffi::SQLITE_OK {
            tracing::warn!(path = %self.path, code = rc, "failed to close connection on drop");
        }
    }
}

/// Build an [`EngineError`] for a failing status `rc`.
///
/// The connection's extended code and message are used when they describe
/// the same failure; otherwise the generic text for `rc` is used.
pub(crate) fn engine_error(db: *mut ffi::sqlite3, rc: c_int) -> EngineError {
    if db.is_null() {
        return EngineError::new(rc, ffi::error_string(rc));
    }
    // SAFETY: db is valid; errmsg returns a valid C string
    let (extended, message) = unsafe {
        let extended = ffi::sqlite3_extended_errcode(db);
        let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
            .to_string_lossy()
            .into_owned();
        (extended, msg)
    };
    if extended & 0xff == rc & 0xff {
        EngineError::new(extended, message)
    } else {
        EngineError::new(rc, ffi::error_string(rc))
    }
}

/// Run `sql` through `sqlite3_exec`, discarding rows.
fn exec_raw(db: *mut ffi::sqlite3, sql: &str) -> Result<(), EngineError> {
    let c_sql = CString::new(sql)
        .map_err(|_| EngineError::new(ffi::SQLITE_MISUSE, "SQL contains null byte"))?;

    let mut errmsg: *mut c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

    if rc != ffi::SQLITE_OK {
        let mut engine = engine_error(db, rc);
        if !errmsg.is_null() {
            // SAFETY: errmsg is valid and owned by us until freed
            engine.message = unsafe { CStr::from_ptr(errmsg).to_string_lossy().into_owned() };
            unsafe { ffi::sqlite3_free(errmsg.cast()) };
        }
        return Err(engine);
    }

    Ok(())
}

fn closed_error(op: Operation, sql: Option<&str>) -> Error {
    match op {
        Operation::Prepare => Error::Prepare(StatementError::new(sql, CLOSED)),
        Operation::Exec => Error::Exec(StatementError::new(sql, CLOSED)),
        Operation::Transaction => tx_error(TransactionErrorKind::ConnectionClosed, CLOSED),
        Operation::Config => Error::Config(ConfigError {
            message: CLOSED.to_string(),
            source: None,
        }),
        _ => Error::Engine(EngineError::new(ffi::SQLITE_MISUSE, CLOSED)),
    }
}

fn tx_error(kind: TransactionErrorKind, message: impl Into<String>) -> Error {
    Error::Transaction(TransactionError {
        kind,
        message: message.into(),
        engine: None,
    })
}
