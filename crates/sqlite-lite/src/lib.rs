//! A small synchronous SQLite client.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate wraps libsqlite3 (built from the bundled amalgamation) with
//! connections, transactions, and prepared statements that follow an
//! explicit bind → step → scan → reset cycle.
//!
//! # Features
//!
//! - In-memory and file-based databases with configurable open flags
//! - Prepared statements with positional binding and typed row scanning
//! - Transaction control, an RAII [`Transaction`] guard, and
//!   [`run_in_transaction`] for scoped commit-or-rollback
//! - Every failure tagged with the operation that produced it and the
//!   engine's result code
//!
//! # Example
//!
//! ```rust
//! use sqlite_lite::{Connection, params};
//!
//! let conn = Connection::open_memory().unwrap();
//! conn.exec("CREATE TABLE student (name STRING, age INTEGER)").unwrap();
//!
//! conn.with_transaction(|conn| -> Result<(), sqlite_lite::Error> {
//!     let mut insert = conn.prepare("INSERT INTO student VALUES (?, ?)", params![])?;
//!     insert.exec(params!["Tom", 18])?;
//!     insert.exec(params!["John", 19])?;
//!     insert.exec(params!["Bob", 18])?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let mut query = conn
//!     .prepare("SELECT * FROM student WHERE age = ?", params![18])
//!     .unwrap();
//! let mut names = Vec::new();
//! while query.step().unwrap() {
//!     let (name, _age): (String, i64) = query.scan().unwrap();
//!     names.push(name);
//! }
//! assert_eq!(names, ["Tom", "Bob"]);
//! ```
//!
//! # Type Mapping
//!
//! | Rust Type | SQLite Type |
//! |-----------|-------------|
//! | `bool` | INTEGER (0/1) |
//! | `i8`..`i64`, `u8`..`u32` | INTEGER |
//! | `f32`, `f64` | REAL |
//! | `String`, `&str` | TEXT |
//! | `Vec<u8>`, `&[u8]` | BLOB |
//! | `Option<T>` | NULL or T |
//!
//! `u64` binds through `Value::try_from` since values above `i64::MAX` do
//! not fit. How column values are read back depends on the connection's
//! [`Coercion`] policy.
//!
//! # Thread Safety
//!
//! [`Connection`] is `Send` but not `Sync`. Statements borrow their
//! connection and stay on its thread.

pub mod config;
pub mod connection;
pub mod ffi;
pub mod statement;
pub mod transaction;
pub mod types;

pub use config::{ArityPolicy, ConnectionConfig, MEMORY_PATH, OpenFlags};
pub use connection::Connection;
pub use statement::{Statement, StatementState};
pub use transaction::{Transaction, TransactionBehavior, run_in_transaction};

pub use sqlite_lite_core::{
    BindError, BindErrorKind, CloseError, CloseErrorKind, Coercion, ColumnInfo, ConfigError,
    EngineError, Error, FromRow, FromValue, OpenError, Operation, Result, ResultCode, Row,
    ScanError, ScanErrorKind, StatementError, TransactionError, TransactionErrorKind, TypeError,
    Value, params,
};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
