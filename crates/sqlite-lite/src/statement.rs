//! Prepared statements.
//!
//! A [`Statement`] moves through four states:
//!
//! ```text
//!            bind / clear_bindings
//!              ┌───┐
//!              ▼   │    step: row          step: row
//!   prepare ─► Ready ─────────────► Row ◄──────────┐
//!              ▲  │                  │  └──────────┘
//!              │  │ step: done       │ step: done / error
//!              │  ▼                  ▼
//!              └─ reset ◄──────── Done
//!
//!   close (from any state) ─► Closed
//! ```
//!
//! Bindings survive `reset`; column values are only readable in `Row`.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers
#![allow(clippy::result_large_err)]

use crate::config::ArityPolicy;
use crate::connection::{Connection, engine_error};
use crate::ffi;
use crate::types;
use sqlite_lite_core::{
    BindError, BindErrorKind, CloseError, CloseErrorKind, ColumnInfo, Error, FromRow, FromValue,
    Operation, Row, ScanError, ScanErrorKind, StatementError, Value,
};
use std::ffi::{CString, c_char, c_int};
use std::ptr;
use std::sync::Arc;

/// Cursor state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Freshly prepared or reset; parameters may be bound.
    Ready,
    /// The last step produced a row.
    Row,
    /// Execution finished (or failed); reset before stepping again.
    Done,
    /// Engine resources released.
    Closed,
}

/// A compiled SQL statement borrowed from its [`Connection`].
pub struct Statement<'conn> {
    conn: &'conn Connection,
    /// Null once closed.
    stmt: *mut ffi::sqlite3_stmt,
    sql: String,
    columns: Arc<ColumnInfo>,
    state: StatementState,
    /// The engine replays a failed step's error from reset and finalize.
    last_step_failed: bool,
    /// Set once parameters have been bound or explicitly cleared.
    bound: bool,
}

impl<'conn> Statement<'conn> {
    #[tracing::instrument(level = "trace", skip(conn))]
    pub(crate) fn new(conn: &'conn Connection, sql: &str) -> Result<Self, Error> {
        let db = conn.handle(Operation::Prepare, Some(sql))?;
        let stmt = prepare_stmt(db, sql)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt) };
        let mut names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            let name =
                unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{}", i));
            names.push(name);
        }

        conn.statement_opened();
        Ok(Self {
            conn,
            stmt,
            sql: sql.to_string(),
            columns: Arc::new(ColumnInfo::new(names)),
            state: StatementState::Ready,
            last_step_failed: false,
            bound: false,
        })
    }

    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StatementState::Closed
    }

    /// Number of placeholders in the statement.
    pub fn parameter_count(&self) -> usize {
        if self.stmt.is_null() {
            return 0;
        }
        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_bind_parameter_count(self.stmt) as usize }
    }

    /// Name of the 1-based parameter `index`, including its prefix
    /// (`:id`, `@id`, `$id`, `?3`). Anonymous `?` placeholders have no name.
    pub fn parameter_name(&self, index: usize) -> Option<String> {
        if self.stmt.is_null() {
            return None;
        }
        let index = c_int::try_from(index).ok()?;
        // SAFETY: stmt is valid; out-of-range indexes yield null
        unsafe { types::parameter_name(self.stmt, index) }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.name_at(index)
    }

    /// Bind `args` to the placeholders in order.
    ///
    /// Only valid in the `Ready` state. The connection's [`ArityPolicy`]
    /// decides whether a short argument list is an error or padded with NULL;
    /// extra arguments are always an error.
    #[tracing::instrument(level = "trace", skip(self, args), fields(sql = %self.sql, args = args.len()))]
    pub fn bind(&mut self, args: &[Value]) -> Result<(), Error> {
        self.check_bindable()?;

        let expected = self.parameter_count();
        let arity_ok = match self.conn.arity() {
            ArityPolicy::Strict => args.len() == expected,
            ArityPolicy::PadWithNull => args.len() <= expected,
        };
        if !arity_ok {
            return Err(self.arity_error(expected, args.len()));
        }

        // A partial bind leaves the statement unbound
        self.bound = false;
        for i in 0..expected {
            let value = args.get(i).unwrap_or(&Value::Null);
            // SAFETY: stmt is valid, index is 1-based and <= parameter count
            let rc = unsafe { types::bind_value(self.stmt, (i + 1) as c_int, value) };
            if rc != ffi::SQLITE_OK {
                let engine = engine_error(self.raw_db(), rc);
                return Err(Error::Bind(BindError {
                    kind: BindErrorKind::Rejected,
                    sql: Some(self.sql.clone()),
                    index: Some(i + 1),
                    message: format!("cannot bind {}: {}", value.type_name(), engine.message),
                    engine: Some(engine),
                }));
            }
        }
        self.bound = true;
        Ok(())
    }

    /// Reset every parameter to NULL. Valid wherever [`bind`](Self::bind) is.
    pub fn clear_bindings(&mut self) -> Result<(), Error> {
        self.check_bindable()?;
        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_clear_bindings(self.stmt) };
        if rc != ffi::SQLITE_OK {
            return Err(Error::from_engine(
                Operation::Bind,
                Some(self.sql.as_str()),
                engine_error(self.raw_db(), rc),
            ));
        }
        self.bound = true;
        Ok(())
    }

    /// Advance execution.
    ///
    /// Returns `true` when a row is available and `false` once execution has
    /// completed. Stepping again after `false` requires a [`reset`](Self::reset).
    /// A failed step leaves the statement `Done`.
    ///
    /// Under [`ArityPolicy::Strict`] a statement with placeholders must have
    /// been bound (or explicitly cleared) before its first step.
    pub fn step(&mut self) -> Result<bool, Error> {
        match self.state {
            StatementState::Closed => {
                return Err(Error::Step(StatementError::new(
                    Some(self.sql.as_str()),
                    "statement is closed",
                )));
            }
            StatementState::Done => {
                return Err(Error::Step(StatementError::new(
                    Some(self.sql.as_str()),
                    "statement is done; reset it before stepping again",
                )));
            }
            StatementState::Ready => {
                let expected = self.parameter_count();
                if !self.bound && expected > 0 && self.conn.arity() == ArityPolicy::Strict {
                    return Err(self.arity_error(expected, 0));
                }
            }
            StatementState::Row => {}
        }

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(self.stmt) };
        match rc {
            ffi::SQLITE_ROW => {
                self.state = StatementState::Row;
                tracing::trace!(sql = %self.sql, "step: row");
                Ok(true)
            }
            ffi::SQLITE_DONE => {
                self.state = StatementState::Done;
                tracing::trace!(sql = %self.sql, "step: done");
                Ok(false)
            }
            _ => {
                self.state = StatementState::Done;
                self.last_step_failed = true;
                let engine = engine_error(self.raw_db(), rc);
                tracing::trace!(sql = %self.sql, code = %engine.code, "step failed");
                Err(Error::from_engine(Operation::Step, Some(self.sql.as_str()), engine))
            }
        }
    }

    /// Return to `Ready` so the statement can be re-bound and re-run.
    ///
    /// Bindings are kept. The statement is `Ready` afterwards even when an
    /// error is returned.
    pub fn reset(&mut self) -> Result<(), Error> {
        if self.state == StatementState::Closed {
            return Err(Error::Reset(StatementError::new(
                Some(self.sql.as_str()),
                "statement is closed",
            )));
        }

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_reset(self.stmt) };
        let replayed = std::mem::take(&mut self.last_step_failed);
        self.state = StatementState::Ready;
        tracing::trace!(sql = %self.sql, "reset");

        if rc != ffi::SQLITE_OK && !replayed {
            return Err(Error::from_engine(
                Operation::Reset,
                Some(self.sql.as_str()),
                engine_error(self.raw_db(), rc),
            ));
        }
        Ok(())
    }

    /// Read the current row into `T`, column by column in declared order.
    ///
    /// Only valid after [`step`](Self::step) returned `true`. Tuples must
    /// have exactly as many elements as the row has columns.
    ///
    /// ```
    /// use sqlite_lite::{Connection, params};
    ///
    /// let conn = Connection::open_memory().unwrap();
    /// let mut stmt = conn.prepare("SELECT 'Tom', 18", params![]).unwrap();
    /// assert!(stmt.scan::<(String, i64)>().is_err()); // no row yet
    /// stmt.step().unwrap();
    /// let (name, age): (String, i64) = stmt.scan().unwrap();
    /// assert_eq!((name.as_str(), age), ("Tom", 18));
    /// ```
    pub fn scan<T: FromRow>(&self) -> Result<T, Error> {
        self.check_row()?;
        let count = self.column_count();
        if let Some(expected) = T::arity() {
            if expected != count {
                return Err(self.scan_error(ScanErrorKind::ColumnCount {
                    expected,
                    actual: count,
                }));
            }
        }

        let values = (0..count)
            // SAFETY: stmt is valid and positioned on a row; index < column count
            .map(|i| unsafe { types::read_column(self.stmt, i as c_int) })
            .collect();
        T::from_row(&self.columns, values, self.conn.coercion())
            .map_err(|e| Error::Scan(ScanError::from_type(e, Some(self.sql.as_str()))))
    }

    /// An owned copy of the current row.
    pub fn row(&self) -> Result<Row, Error> {
        self.scan()
    }

    /// Read one column of the current row as a [`Value`].
    pub fn column_value(&self, index: usize) -> Result<Value, Error> {
        self.check_column(index)?;
        // SAFETY: stmt is valid and positioned on a row; index checked above
        Ok(unsafe { types::read_column(self.stmt, index as c_int) })
    }

    /// Read one column of the current row, converted under the connection's
    /// coercion policy.
    pub fn column<T: FromValue>(&self, index: usize) -> Result<T, Error> {
        let value = self.column_value(index)?;
        T::from_value(value, self.conn.coercion()).map_err(|e| {
            Error::Scan(ScanError::from_type(e.at_column(index), Some(self.sql.as_str())))
        })
    }

    /// Storage class of a column in the current row (`"INTEGER"`, `"TEXT"`, ...).
    pub fn column_type(&self, index: usize) -> Result<&'static str, Error> {
        self.check_column(index)?;
        // SAFETY: stmt is valid and positioned on a row; index checked above
        let col_type = unsafe { ffi::sqlite3_column_type(self.stmt, index as c_int) };
        Ok(types::storage_class_name(col_type))
    }

    /// Bind `args`, run to completion discarding rows, then reset.
    ///
    /// The reset happens whatever the outcome, so the statement is `Ready`
    /// afterwards. The first error encountered is returned.
    #[tracing::instrument(level = "trace", skip(self, args), fields(sql = %self.sql))]
    pub fn exec(&mut self, args: &[Value]) -> Result<(), Error> {
        let run = self.bind(args).and_then(|()| {
            while self.step()? {}
            Ok(())
        });
        let reset = self.reset();
        run.and(reset)
    }

    /// Release the engine statement.
    ///
    /// Valid from any state. Closing an already-closed statement is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.state == StatementState::Closed {
            return Ok(());
        }

        let db = self.raw_db();
        // SAFETY: stmt is valid; it is never used again after finalize
        let rc = unsafe { ffi::sqlite3_finalize(self.stmt) };
        self.stmt = ptr::null_mut();
        self.state = StatementState::Closed;
        self.conn.statement_closed();
        let replayed = std::mem::take(&mut self.last_step_failed);
        tracing::trace!(sql = %self.sql, "closed statement");

        if rc != ffi::SQLITE_OK && !replayed {
            let engine = engine_error(db, rc);
            return Err(Error::Close(CloseError {
                kind: CloseErrorKind::Engine,
                message: engine.message.clone(),
                engine: Some(engine),
            }));
        }
        Ok(())
    }

    fn raw_db(&self) -> *mut ffi::sqlite3 {
        // Statements never outlive an open connection: close() refuses while
        // any are open.
        self.conn
            .handle(Operation::Engine, None)
            .unwrap_or(ptr::null_mut())
    }

    fn check_bindable(&self) -> Result<(), Error> {
        let message = match self.state {
            StatementState::Ready => return Ok(()),
            StatementState::Row | StatementState::Done => {
                "statement has been stepped; reset it before binding"
            }
            StatementState::Closed => "statement is closed",
        };
        Err(Error::Bind(BindError {
            kind: BindErrorKind::InvalidState,
            sql: Some(self.sql.clone()),
            index: None,
            message: message.to_string(),
            engine: None,
        }))
    }

    fn arity_error(&self, expected: usize, actual: usize) -> Error {
        Error::Bind(BindError {
            kind: BindErrorKind::Arity { expected, actual },
            sql: Some(self.sql.clone()),
            index: None,
            message: format!(
                "statement has {} parameter(s) but {} argument(s) were given",
                expected, actual
            ),
            engine: None,
        })
    }

    fn check_row(&self) -> Result<(), Error> {
        if self.state == StatementState::Row {
            Ok(())
        } else {
            Err(self.scan_error(ScanErrorKind::NoRow))
        }
    }

    fn check_column(&self, index: usize) -> Result<(), Error> {
        self.check_row()?;
        let count = self.column_count();
        if index >= count {
            return Err(self.scan_error(ScanErrorKind::ColumnIndex { index, count }));
        }
        Ok(())
    }

    fn scan_error(&self, kind: ScanErrorKind) -> Error {
        Error::Scan(ScanError::new(kind, Some(self.sql.as_str())))
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("columns", &self.columns.names())
            .finish_non_exhaustive()
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(sql = %self.sql, error = %e, "failed to close statement on drop");
        }
    }
}

/// Compile exactly one statement from `sql`.
///
/// Anything after the first statement other than whitespace, `;` or
/// comments is rejected, as is SQL with no statement at all.
fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<*mut ffi::sqlite3_stmt, Error> {
    let c_sql = CString::new(sql).map_err(|_| {
        Error::Prepare(StatementError::new(Some(sql), "SQL contains null byte"))
    })?;

    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
    let mut tail: *const c_char = ptr::null();

    // SAFETY: All pointers are valid; -1 reads up to the terminator
    let rc = unsafe { ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), -1, &mut stmt, &mut tail) };

    if rc != ffi::SQLITE_OK {
        return Err(Error::from_engine(
            Operation::Prepare,
            Some(sql),
            engine_error(db, rc),
        ));
    }
    if stmt.is_null() {
        return Err(Error::Prepare(StatementError::new(
            Some(sql),
            "SQL contains no statement",
        )));
    }

    if !tail.is_null() && has_trailing_statement(db, tail) {
        // SAFETY: stmt is valid and unused
        unsafe { ffi::sqlite3_finalize(stmt) };
        return Err(Error::Prepare(StatementError::new(
            Some(sql),
            "SQL contains more than one statement",
        )));
    }

    tracing::trace!(sql, "prepared statement");
    Ok(stmt)
}

/// Does the text at `tail` compile to another statement?
fn has_trailing_statement(db: *mut ffi::sqlite3, tail: *const c_char) -> bool {
    let mut next: *mut ffi::sqlite3_stmt = ptr::null_mut();
    // SAFETY: tail points into the caller's NUL-terminated buffer
    let rc = unsafe { ffi::sqlite3_prepare_v2(db, tail, -1, &mut next, ptr::null_mut()) };
    if !next.is_null() {
        // SAFETY: next is valid and unused
        unsafe { ffi::sqlite3_finalize(next) };
        return true;
    }
    // Unparseable leftovers count as a trailing statement
    rc != ffi::SQLITE_OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionConfig, params};
    use sqlite_lite_core::Coercion;

    fn people() -> Connection {
        let conn = Connection::open_memory().unwrap();
        conn.exec(
            "CREATE TABLE people (name TEXT, age INTEGER, score REAL, photo BLOB);
             INSERT INTO people VALUES ('Tom', 18, 91.5, x'0102');
             INSERT INTO people VALUES ('Ann', NULL, NULL, NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_state_transitions() {
        let conn = people();
        let mut stmt = conn.prepare("SELECT name FROM people", &[]).unwrap();
        assert_eq!(stmt.state(), StatementState::Ready);

        assert!(stmt.step().unwrap());
        assert_eq!(stmt.state(), StatementState::Row);
        assert!(stmt.step().unwrap());
        assert!(!stmt.step().unwrap());
        assert_eq!(stmt.state(), StatementState::Done);

        let err = stmt.step().unwrap_err();
        assert!(matches!(err, Error::Step(_)));
        assert!(err.to_string().contains("reset"));

        stmt.reset().unwrap();
        assert_eq!(stmt.state(), StatementState::Ready);
        assert!(stmt.step().unwrap());

        stmt.close().unwrap();
        assert_eq!(stmt.state(), StatementState::Closed);
        assert!(stmt.step().is_err());
        assert!(stmt.reset().is_err());
    }

    #[test]
    fn test_scan_before_step() {
        let conn = people();
        let stmt = conn.prepare("SELECT name FROM people", &[]).unwrap();
        let err = stmt.scan::<(String,)>().unwrap_err();
        assert!(matches!(
            err,
            Error::Scan(ScanError {
                kind: ScanErrorKind::NoRow,
                ..
            })
        ));
        assert!(stmt.column_value(0).is_err());
    }

    #[test]
    fn test_scan_after_done() {
        let conn = people();
        let mut stmt = conn
            .prepare("SELECT name FROM people WHERE age > ?", params![100])
            .unwrap();
        assert!(!stmt.step().unwrap());
        assert!(stmt.scan::<(String,)>().is_err());
    }

    #[test]
    fn test_scan_column_count_mismatch() {
        let conn = people();
        let mut stmt = conn.prepare("SELECT name, age FROM people", &[]).unwrap();
        stmt.step().unwrap();
        let err = stmt.scan::<(String,)>().unwrap_err();
        assert!(matches!(
            err,
            Error::Scan(ScanError {
                kind: ScanErrorKind::ColumnCount {
                    expected: 1,
                    actual: 2
                },
                ..
            })
        ));
    }

    #[test]
    fn test_scan_all_storage_classes() {
        let conn = people();
        let mut stmt = conn
            .prepare("SELECT name, age, score, photo FROM people WHERE name = ?", params!["Tom"])
            .unwrap();
        assert!(stmt.step().unwrap());
        let (name, age, score, photo): (String, i64, f64, Vec<u8>) = stmt.scan().unwrap();
        assert_eq!(name, "Tom");
        assert_eq!(age, 18);
        assert!((score - 91.5).abs() < f64::EPSILON);
        assert_eq!(photo, vec![1, 2]);

        assert_eq!(stmt.column_type(0).unwrap(), "TEXT");
        assert_eq!(stmt.column_type(1).unwrap(), "INTEGER");
        assert_eq!(stmt.column_type(2).unwrap(), "REAL");
        assert_eq!(stmt.column_type(3).unwrap(), "BLOB");
    }

    #[test]
    fn test_scan_nulls() {
        let conn = people();
        let mut stmt = conn
            .prepare("SELECT name, age FROM people WHERE name = 'Ann'", &[])
            .unwrap();
        stmt.step().unwrap();

        let (_, age): (String, Option<i64>) = stmt.scan().unwrap();
        assert_eq!(age, None);

        // NULL into a non-optional destination is a strict-mode mismatch
        let err = stmt.scan::<(String, i64)>().unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(stmt.column_type(1).unwrap(), "NULL");
    }

    #[test]
    fn test_invalid_utf8_text_keeps_bytes() {
        let conn = people();
        let mut stmt = conn
            .prepare("SELECT CAST(x'ff61' AS TEXT)", params![])
            .unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.column_type(0).unwrap(), "TEXT");
        assert_eq!(stmt.column_value(0).unwrap(), Value::Blob(vec![0xff, 0x61]));

        let err = stmt.scan::<(String,)>().unwrap_err();
        assert!(matches!(err, Error::Scan(_)));
        let (bytes,): (Vec<u8>,) = stmt.scan().unwrap();
        assert_eq!(bytes, vec![0xff, 0x61]);
    }

    #[test]
    fn test_lenient_scan() {
        let conn = Connection::open(&ConnectionConfig::memory().coercion(Coercion::Lenient)).unwrap();
        let mut stmt = conn.prepare("SELECT '42', 3.9, NULL", &[]).unwrap();
        stmt.step().unwrap();
        let (text, real, null): (i64, i64, i64) = stmt.scan().unwrap();
        assert_eq!((text, real, null), (42, 3, 0));
    }

    #[test]
    fn test_column_access() {
        let conn = people();
        let mut stmt = conn
            .prepare("SELECT name AS who, age FROM people ORDER BY name", &[])
            .unwrap();
        assert_eq!(stmt.column_count(), 2);
        assert_eq!(stmt.column_names(), ["who".to_string(), "age".to_string()]);
        assert_eq!(stmt.column_name(0), Some("who"));
        assert_eq!(stmt.column_name(2), None);

        stmt.step().unwrap();
        assert_eq!(stmt.column::<String>(0).unwrap(), "Ann");
        assert_eq!(stmt.column_value(1).unwrap(), Value::Null);
        let err = stmt.column_value(2).unwrap_err();
        assert!(matches!(
            err,
            Error::Scan(ScanError {
                kind: ScanErrorKind::ColumnIndex { index: 2, count: 2 },
                ..
            })
        ));
        let err = stmt.column::<i64>(0).unwrap_err();
        match err {
            Error::Scan(scan) => assert_eq!(scan.source.unwrap().column, Some(0)),
            other => panic!("expected scan error, got {other:?}"),
        }
    }

    #[test]
    fn test_row_snapshot_outlives_step() {
        let conn = people();
        let mut stmt = conn
            .prepare("SELECT name, age FROM people ORDER BY rowid", &[])
            .unwrap();
        stmt.step().unwrap();
        let first = stmt.row().unwrap();
        stmt.step().unwrap();
        stmt.reset().unwrap();
        assert_eq!(first.get_named::<String>("name").unwrap(), "Tom");
        assert_eq!(first.get::<i64>(1).unwrap(), 18);
    }

    #[test]
    fn test_bind_arity_strict() {
        let conn = people();
        let mut stmt = conn
            .prepare("SELECT * FROM people WHERE name = ? AND age = ?", &[])
            .unwrap();
        assert_eq!(stmt.parameter_count(), 2);

        let err = stmt.bind(params!["Tom"]).unwrap_err();
        assert!(matches!(
            err,
            Error::Bind(BindError {
                kind: BindErrorKind::Arity {
                    expected: 2,
                    actual: 1
                },
                ..
            })
        ));
        assert!(stmt.bind(params!["Tom", 18, 1]).is_err());
        stmt.bind(params!["Tom", 18]).unwrap();
        assert!(stmt.step().unwrap());
    }

    #[test]
    fn test_step_unbound_strict() {
        let conn = people();
        let mut stmt = conn.prepare("SELECT ?, ?", params![]).unwrap();
        let err = stmt.step().unwrap_err();
        assert!(matches!(
            err,
            Error::Bind(BindError {
                kind: BindErrorKind::Arity {
                    expected: 2,
                    actual: 0
                },
                ..
            })
        ));
        assert_eq!(stmt.state(), StatementState::Ready);

        // A rejected bind does not count as bound
        assert!(stmt.bind(params![1]).is_err());
        assert!(stmt.step().is_err());

        stmt.bind(params![1, 2]).unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.scan::<(i64, i64)>().unwrap(), (1, 2));

        // Explicitly cleared parameters are NULL by request
        let mut cleared = conn.prepare("SELECT ?", params![]).unwrap();
        cleared.clear_bindings().unwrap();
        assert!(cleared.step().unwrap());
        assert_eq!(cleared.column_value(0).unwrap(), Value::Null);

        // Parameterless statements need no binding
        let mut plain = conn.prepare("SELECT 1", params![]).unwrap();
        assert!(plain.step().unwrap());
    }

    #[test]
    fn test_step_unbound_pads_with_null() {
        let config = ConnectionConfig::memory().arity(crate::ArityPolicy::PadWithNull);
        let conn = Connection::open(&config).unwrap();
        let mut stmt = conn.prepare("SELECT ?", params![]).unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.column_value(0).unwrap(), Value::Null);
    }

    #[test]
    fn test_prepare_with_bad_arity_releases_statement() {
        let conn = people();
        let err = conn
            .prepare("SELECT * FROM people WHERE age = ?", params![1, 2])
            .unwrap_err();
        assert!(matches!(err, Error::Bind(_)));
        assert_eq!(conn.open_statements(), 0);
    }

    #[test]
    fn test_bind_pad_with_null() {
        let config = ConnectionConfig::memory().arity(crate::ArityPolicy::PadWithNull);
        let conn = Connection::open(&config).unwrap();
        let mut stmt = conn.prepare("SELECT ?, ?", params![7]).unwrap();
        stmt.step().unwrap();
        let (a, b): (i64, Option<i64>) = stmt.scan().unwrap();
        assert_eq!((a, b), (7, None));
        stmt.reset().unwrap();
        assert!(stmt.bind(params![1, 2, 3]).is_err());
    }

    #[test]
    fn test_bind_requires_ready() {
        let conn = people();
        let mut stmt = conn.prepare("SELECT ?", params![1]).unwrap();
        stmt.step().unwrap();
        let err = stmt.bind(params![2]).unwrap_err();
        assert!(matches!(
            err,
            Error::Bind(BindError {
                kind: BindErrorKind::InvalidState,
                ..
            })
        ));
        assert!(stmt.clear_bindings().is_err());

        stmt.reset().unwrap();
        stmt.bind(params![2]).unwrap();
        stmt.step().unwrap();
        assert_eq!(stmt.column::<i64>(0).unwrap(), 2);
    }

    #[test]
    fn test_bindings_survive_reset_until_cleared() {
        let conn = people();
        let mut stmt = conn.prepare("SELECT ?", params!["kept"]).unwrap();
        stmt.step().unwrap();
        stmt.reset().unwrap();
        stmt.step().unwrap();
        assert_eq!(stmt.column::<String>(0).unwrap(), "kept");

        stmt.reset().unwrap();
        stmt.clear_bindings().unwrap();
        stmt.step().unwrap();
        assert_eq!(stmt.column_value(0).unwrap(), Value::Null);
    }

    #[test]
    fn test_parameter_names() {
        let conn = people();
        let stmt = conn
            .prepare("SELECT * FROM people WHERE name = :name AND age = ?", &[])
            .unwrap();
        assert_eq!(stmt.parameter_name(1).as_deref(), Some(":name"));
        assert_eq!(stmt.parameter_name(2), None);
        assert_eq!(stmt.parameter_name(3), None);
    }

    #[test]
    fn test_failed_step_then_reset() {
        let conn = Connection::open_memory().unwrap();
        conn.exec("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        conn.exec("INSERT INTO t VALUES (1)").unwrap();

        let mut stmt = conn.prepare("INSERT INTO t VALUES (?)", params![1]).unwrap();
        let err = stmt.step().unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(stmt.state(), StatementState::Done);

        // The failure was already reported by step
        stmt.reset().unwrap();
        stmt.bind(params![2]).unwrap();
        assert!(!stmt.step().unwrap());
    }

    #[test]
    fn test_exec_reports_first_error_and_resets() {
        let conn = Connection::open_memory().unwrap();
        conn.exec("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();
        let mut stmt = conn.prepare("INSERT INTO t VALUES (?)", &[]).unwrap();

        stmt.exec(params![1]).unwrap();
        assert_eq!(stmt.state(), StatementState::Ready);

        let err = stmt.exec(params![1]).unwrap_err();
        assert!(matches!(err, Error::Step(_)));
        assert_eq!(stmt.state(), StatementState::Ready);

        let err = stmt.exec(params![]).unwrap_err();
        assert!(matches!(err, Error::Bind(_)));
        assert_eq!(stmt.state(), StatementState::Ready);

        stmt.exec(params![2]).unwrap();
        assert_eq!(conn.last_insert_rowid(), 2);
    }

    #[test]
    fn test_close_idempotent_and_counted() {
        let conn = people();
        let mut a = conn.prepare("SELECT 1", &[]).unwrap();
        let b = conn.prepare("SELECT 2", &[]).unwrap();
        assert_eq!(conn.open_statements(), 2);

        a.close().unwrap();
        a.close().unwrap();
        assert!(a.is_closed());
        assert_eq!(conn.open_statements(), 1);
        assert_eq!(a.parameter_count(), 0);

        drop(b);
        assert_eq!(conn.open_statements(), 0);
    }
}
