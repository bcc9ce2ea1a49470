//! Engine-independent vocabulary for sqlite-lite.
//!
//! - [`Value`] and the [`FromValue`] codec with its [`Coercion`] policy
//! - [`Row`] snapshots and [`FromRow`] for scanning whole rows into tuples
//! - [`Error`], the operation-tagged error taxonomy, and [`ResultCode`],
//!   the total mapping of engine status codes

pub mod error;
pub mod row;
pub mod value;

pub use error::{
    BindError, BindErrorKind, CloseError, CloseErrorKind, ConfigError, EngineError, Error,
    OpenError, Operation, Result, ResultCode, ScanError, ScanErrorKind, StatementError,
    TransactionError, TransactionErrorKind, TypeError,
};
pub use row::{ColumnInfo, FromRow, Row};
pub use value::{Coercion, FromValue, Value};
