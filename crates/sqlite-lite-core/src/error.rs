//! Error types for sqlite-lite operations.
//!
//! Every failure names the operation that produced it (open, prepare, bind,
//! step, scan, reset, exec, transaction control, close) and, when the engine
//! reported it, carries the engine's result code and message as an
//! [`EngineError`].

use std::fmt;

/// The primary error type for all sqlite-lite operations.
#[derive(Debug)]
pub enum Error {
    /// The engine could not open or create the database.
    Open(OpenError),
    /// SQL text could not be compiled into a statement.
    Prepare(StatementError),
    /// Parameters could not be bound.
    Bind(BindError),
    /// Advancing a statement failed.
    Step(StatementError),
    /// Reading the current row failed.
    Scan(ScanError),
    /// Returning a statement to its ready state failed.
    Reset(StatementError),
    /// A parameterless script or a bind-step-reset cycle failed.
    Exec(StatementError),
    /// Transaction control was misused or rejected by the engine.
    Transaction(TransactionError),
    /// A connection or statement could not be released.
    Close(CloseError),
    /// A value could not be converted to the requested type.
    TypeMismatch(TypeError),
    /// The engine reported a status code outside the known taxonomy.
    Engine(EngineError),
    /// Invalid connection configuration.
    Config(ConfigError),
}

/// The operation an [`Error`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Prepare,
    Bind,
    Step,
    Scan,
    Reset,
    Exec,
    Transaction,
    Close,
    Convert,
    Engine,
    Config,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Prepare => "prepare",
            Operation::Bind => "bind",
            Operation::Step => "step",
            Operation::Scan => "scan",
            Operation::Reset => "reset",
            Operation::Exec => "exec",
            Operation::Transaction => "transaction",
            Operation::Close => "close",
            Operation::Convert => "convert",
            Operation::Engine => "engine",
            Operation::Config => "config",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary SQLite result codes.
///
/// The mapping from raw status codes is total: extended codes are reduced to
/// their primary byte, and anything unrecognised becomes `Unknown` with the
/// raw value preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Generic error (SQL logic error, missing table, ...)
    Error,
    /// Internal logic error in the engine
    Internal,
    /// Access permission denied
    Perm,
    /// Callback requested an abort
    Abort,
    /// The database file is locked
    Busy,
    /// A table in the database is locked
    Locked,
    /// Out of memory
    NoMem,
    /// Attempt to write a read-only database
    ReadOnly,
    /// Interrupted
    Interrupt,
    /// Disk I/O error
    IoErr,
    /// The database disk image is malformed
    Corrupt,
    /// Unknown opcode or file control
    NotFound,
    /// Database or disk is full
    Full,
    /// Unable to open the database file
    CantOpen,
    /// Locking protocol error
    Protocol,
    /// Internal use only
    Empty,
    /// The schema changed
    Schema,
    /// String or blob exceeds size limit
    TooBig,
    /// Constraint violation
    Constraint,
    /// Data type mismatch
    Mismatch,
    /// Library used incorrectly
    Misuse,
    /// Large file support unavailable
    NoLfs,
    /// Authorization denied
    Auth,
    /// Not used
    Format,
    /// Bind or column index out of range
    Range,
    /// File is not a database
    NotADb,
    /// Notification from the logger
    Notice,
    /// Warning from the logger
    Warning,
    /// A status code this library does not know about
    Unknown(i32),
}

impl ResultCode {
    /// Map a raw (possibly extended) status code.
    pub const fn from_raw(code: i32) -> Self {
        match code & 0xff {
            1 => ResultCode::Error,
            2 => ResultCode::Internal,
            3 => ResultCode::Perm,
            4 => ResultCode::Abort,
            5 => ResultCode::Busy,
            6 => ResultCode::Locked,
            7 => ResultCode::NoMem,
            8 => ResultCode::ReadOnly,
            9 => ResultCode::Interrupt,
            10 => ResultCode::IoErr,
            11 => ResultCode::Corrupt,
            12 => ResultCode::NotFound,
            13 => ResultCode::Full,
            14 => ResultCode::CantOpen,
            15 => ResultCode::Protocol,
            16 => ResultCode::Empty,
            17 => ResultCode::Schema,
            18 => ResultCode::TooBig,
            19 => ResultCode::Constraint,
            20 => ResultCode::Mismatch,
            21 => ResultCode::Misuse,
            22 => ResultCode::NoLfs,
            23 => ResultCode::Auth,
            24 => ResultCode::Format,
            25 => ResultCode::Range,
            26 => ResultCode::NotADb,
            27 => ResultCode::Notice,
            28 => ResultCode::Warning,
            _ => ResultCode::Unknown(code),
        }
    }

    /// The primary status code this variant stands for.
    pub const fn raw(self) -> i32 {
        match self {
            ResultCode::Error => 1,
            ResultCode::Internal => 2,
            ResultCode::Perm => 3,
            ResultCode::Abort => 4,
            ResultCode::Busy => 5,
            ResultCode::Locked => 6,
            ResultCode::NoMem => 7,
            ResultCode::ReadOnly => 8,
            ResultCode::Interrupt => 9,
            ResultCode::IoErr => 10,
            ResultCode::Corrupt => 11,
            ResultCode::NotFound => 12,
            ResultCode::Full => 13,
            ResultCode::CantOpen => 14,
            ResultCode::Protocol => 15,
            ResultCode::Empty => 16,
            ResultCode::Schema => 17,
            ResultCode::TooBig => 18,
            ResultCode::Constraint => 19,
            ResultCode::Mismatch => 20,
            ResultCode::Misuse => 21,
            ResultCode::NoLfs => 22,
            ResultCode::Auth => 23,
            ResultCode::Format => 24,
            ResultCode::Range => 25,
            ResultCode::NotADb => 26,
            ResultCode::Notice => 27,
            ResultCode::Warning => 28,
            ResultCode::Unknown(code) => code,
        }
    }

    pub const fn is_unknown(self) -> bool {
        matches!(self, ResultCode::Unknown(_))
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Unknown(code) => write!(f, "unknown result code {}", code),
            other => write!(f, "{:?} ({})", other, other.raw()),
        }
    }
}

/// A failure reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Primary result code.
    pub code: ResultCode,
    /// Raw status, including extended-code bits.
    pub extended_code: i32,
    /// Engine message (from `sqlite3_errmsg` when available).
    pub message: String,
}

impl EngineError {
    pub fn new(extended_code: i32, message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::from_raw(extended_code),
            extended_code,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct OpenError {
    pub path: String,
    pub message: String,
    pub engine: Option<EngineError>,
}

/// Context for prepare, step, reset and exec failures.
#[derive(Debug)]
pub struct StatementError {
    pub sql: Option<String>,
    pub message: String,
    pub engine: Option<EngineError>,
}

impl StatementError {
    pub fn new(sql: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            sql: sql.map(str::to_string),
            message: message.into(),
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: EngineError) -> Self {
        self.engine = Some(engine);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindErrorKind {
    /// Argument count does not match the placeholder count.
    Arity { expected: usize, actual: usize },
    /// The statement is stepped and must be reset before rebinding.
    InvalidState,
    /// The engine rejected a value (index out of range, too big, ...).
    Rejected,
}

#[derive(Debug)]
pub struct BindError {
    pub kind: BindErrorKind,
    pub sql: Option<String>,
    /// 1-based parameter index, when a specific parameter failed.
    pub index: Option<usize>,
    pub message: String,
    pub engine: Option<EngineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// The statement is not positioned on a row.
    NoRow,
    /// Destination count differs from the row's column count.
    ColumnCount { expected: usize, actual: usize },
    /// A column index past the end of the row.
    ColumnIndex { index: usize, count: usize },
    /// A column value could not be coerced to its destination.
    Type,
}

#[derive(Debug)]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<TypeError>,
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, sql: Option<&str>) -> Self {
        let message = match kind {
            ScanErrorKind::NoRow => "no row available; step must return a row first".to_string(),
            ScanErrorKind::ColumnCount { expected, actual } => format!(
                "scan expects {} column(s) but the row has {}",
                expected, actual
            ),
            ScanErrorKind::ColumnIndex { index, count } => {
                format!("column index {} out of range (row has {})", index, count)
            }
            ScanErrorKind::Type => "column value has an incompatible type".to_string(),
        };
        Self {
            kind,
            sql: sql.map(str::to_string),
            message,
            source: None,
        }
    }

    pub fn from_type(err: TypeError, sql: Option<&str>) -> Self {
        Self {
            kind: ScanErrorKind::Type,
            sql: sql.map(str::to_string),
            message: err.to_string(),
            source: Some(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Begin while a transaction is already open (no nesting).
    AlreadyActive,
    /// Commit or rollback with no open transaction.
    NotActive,
    /// The connection has already been closed.
    ConnectionClosed,
    /// The engine rejected BEGIN, COMMIT or ROLLBACK.
    Engine,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
    pub engine: Option<EngineError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseErrorKind {
    /// Statements created by the connection are still open.
    OpenStatements(usize),
    /// The engine refused to release the handle.
    Engine,
}

#[derive(Debug)]
pub struct CloseError {
    pub kind: CloseErrorKind,
    pub message: String,
    pub engine: Option<EngineError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    /// 0-based column index, when converting a row.
    pub column: Option<usize>,
}

impl TypeError {
    pub fn new(expected: &'static str, actual: impl Into<String>) -> Self {
        Self {
            expected,
            actual: actual.into(),
            column: None,
        }
    }

    #[must_use]
    pub fn at_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Build the error for an engine failure during `op`.
    ///
    /// Codes outside the known taxonomy become [`Error::Engine`] whatever the
    /// operation was.
    pub fn from_engine(op: Operation, sql: Option<&str>, engine: EngineError) -> Self {
        if engine.code.is_unknown() {
            return Error::Engine(engine);
        }
        let message = engine.message.clone();
        match op {
            Operation::Open => Error::Open(OpenError {
                path: sql.unwrap_or_default().to_string(),
                message,
                engine: Some(engine),
            }),
            Operation::Prepare => {
                Error::Prepare(StatementError::new(sql, message).with_engine(engine))
            }
            Operation::Bind => Error::Bind(BindError {
                kind: BindErrorKind::Rejected,
                sql: sql.map(str::to_string),
                index: None,
                message,
                engine: Some(engine),
            }),
            Operation::Step => Error::Step(StatementError::new(sql, message).with_engine(engine)),
            Operation::Reset => {
                Error::Reset(StatementError::new(sql, message).with_engine(engine))
            }
            Operation::Exec => Error::Exec(StatementError::new(sql, message).with_engine(engine)),
            Operation::Transaction => Error::Transaction(TransactionError {
                kind: TransactionErrorKind::Engine,
                message,
                engine: Some(engine),
            }),
            Operation::Close => Error::Close(CloseError {
                kind: CloseErrorKind::Engine,
                message,
                engine: Some(engine),
            }),
            Operation::Scan | Operation::Convert | Operation::Engine | Operation::Config => {
                Error::Engine(engine)
            }
        }
    }

    /// The operation this error originated from.
    pub fn operation(&self) -> Operation {
        match self {
            Error::Open(_) => Operation::Open,
            Error::Prepare(_) => Operation::Prepare,
            Error::Bind(_) => Operation::Bind,
            Error::Step(_) => Operation::Step,
            Error::Scan(_) => Operation::Scan,
            Error::Reset(_) => Operation::Reset,
            Error::Exec(_) => Operation::Exec,
            Error::Transaction(_) => Operation::Transaction,
            Error::Close(_) => Operation::Close,
            Error::TypeMismatch(_) => Operation::Convert,
            Error::Engine(_) => Operation::Engine,
            Error::Config(_) => Operation::Config,
        }
    }

    /// The engine failure behind this error, if any.
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            Error::Open(e) => e.engine.as_ref(),
            Error::Prepare(e) | Error::Step(e) | Error::Reset(e) | Error::Exec(e) => {
                e.engine.as_ref()
            }
            Error::Bind(e) => e.engine.as_ref(),
            Error::Transaction(e) => e.engine.as_ref(),
            Error::Close(e) => e.engine.as_ref(),
            Error::Engine(e) => Some(e),
            Error::Scan(_) | Error::TypeMismatch(_) | Error::Config(_) => None,
        }
    }

    /// Engine result code, if the engine reported this failure.
    pub fn code(&self) -> Option<ResultCode> {
        self.engine().map(|e| e.code)
    }

    /// The SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Prepare(e) | Error::Step(e) | Error::Reset(e) | Error::Exec(e) => {
                e.sql.as_deref()
            }
            Error::Bind(e) => e.sql.as_deref(),
            Error::Scan(e) => e.sql.as_deref(),
            _ => None,
        }
    }

    /// Did the engine give up waiting for a lock?
    pub fn is_busy(&self) -> bool {
        matches!(self.code(), Some(ResultCode::Busy | ResultCode::Locked))
    }

    pub fn is_constraint_violation(&self) -> bool {
        self.code() == Some(ResultCode::Constraint)
    }

    /// Is this a value coercion failure, either directly or while scanning?
    pub fn is_type_mismatch(&self) -> bool {
        match self {
            Error::TypeMismatch(_) => true,
            Error::Scan(e) => e.kind == ScanErrorKind::Type,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Open(e) => write!(f, "Open error: {}", e),
            Error::Prepare(e) => write!(f, "Prepare error: {}", e),
            Error::Bind(e) => write!(f, "Bind error: {}", e),
            Error::Step(e) => write!(f, "Step error: {}", e),
            Error::Scan(e) => write!(f, "Scan error: {}", e),
            Error::Reset(e) => write!(f, "Reset error: {}", e),
            Error::Exec(e) => write!(f, "Exec error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e),
            Error::Close(e) => write!(f, "Close error: {}", e),
            Error::TypeMismatch(e) => write!(f, "Type error: {}", e),
            Error::Engine(e) => write!(f, "Engine error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Scan(e) => e
                .source
                .as_ref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Engine(_) => None,
            other => other
                .engine()
                .map(|err| err as &(dyn std::error::Error + 'static)),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.code)
    }
}

impl std::error::Error for EngineError {}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot open '{}': {}", self.path, self.message)?;
        if let Some(engine) = &self.engine {
            write!(f, " [{}]", engine.code)?;
        }
        Ok(())
    }
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(engine) = &self.engine {
            write!(f, " [{}]", engine.code)?;
        }
        if let Some(sql) = &self.sql {
            write!(f, " (sql: {})", sql)?;
        }
        Ok(())
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.index {
            write!(f, "parameter {}: {}", index, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(engine) = &self.engine {
            write!(f, " [{}]", engine.code)?;
        }
        Ok(())
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = self.column {
            write!(
                f,
                "expected {} for column {}, found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl std::error::Error for TypeError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Error::Engine(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::TypeMismatch(err)
    }
}

impl From<BindError> for Error {
    fn from(err: BindError) -> Self {
        Error::Bind(err)
    }
}

impl From<ScanError> for Error {
    fn from(err: ScanError) -> Self {
        Error::Scan(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<CloseError> for Error {
    fn from(err: CloseError) -> Self {
        Error::Close(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for sqlite-lite operations.
pub type Result<T> = std::result::Result<T, Error>;
