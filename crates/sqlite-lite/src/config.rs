//! Connection configuration.

use crate::ffi;
use serde::{Deserialize, Serialize};
use sqlite_lite_core::{Coercion, ConfigError, Error};
use std::ffi::c_int;

/// Path that opens a private, in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Configuration for opening SQLite connections.
///
/// Every field has a default, so a JSON document only needs the fields it
/// wants to change:
///
/// ```
/// use sqlite_lite::{ArityPolicy, ConnectionConfig};
///
/// let config = ConnectionConfig::from_json(r#"{"path": "app.db", "arity": "pad_with_null"}"#)
///     .unwrap();
/// assert_eq!(config.path, "app.db");
/// assert_eq!(config.arity, ArityPolicy::PadWithNull);
/// assert_eq!(config.busy_timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds; 0 disables waiting on locks.
    pub busy_timeout_ms: u32,
    /// How scanned column values are converted into host types.
    pub coercion: Coercion,
    /// How a bind with the wrong number of arguments is treated.
    pub arity: ArityPolicy,
    /// Read the schema right after opening so a corrupt file or a
    /// non-database fails at open time.
    pub verify_on_open: bool,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode (connections not shared between threads).
    pub no_mutex: bool,
    /// Open in serialized mode (connections can be shared).
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
}

/// Policy for binding a different number of arguments than the statement
/// has placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArityPolicy {
    /// The argument count must equal the placeholder count.
    #[default]
    Strict,
    /// Missing trailing arguments are bound as NULL. Extra arguments are
    /// still an error.
    PadWithNull,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    pub(crate) fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.private_cache {
            flags |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }

    /// The engine accepts exactly three access modes: read-only,
    /// read-write, and read-write with create.
    fn validate(self) -> Result<(), ConfigError> {
        if self.read_only && (self.read_write || self.create) {
            return Err(config_error(
                "read_only cannot be combined with read_write or create",
            ));
        }
        if self.no_mutex && self.full_mutex {
            return Err(config_error("no_mutex and full_mutex are exclusive"));
        }
        if self.shared_cache && self.private_cache {
            return Err(config_error(
                "shared_cache and private_cache are exclusive",
            ));
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            path: MEMORY_PATH.to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
            coercion: Coercion::Strict,
            arity: ArityPolicy::Strict,
            verify_on_open: true,
        }
    }
}

impl ConnectionConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Load a config from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError {
            message: format!("invalid connection config: {}", e),
            source: Some(Box::new(e)),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    pub fn arity(mut self, arity: ArityPolicy) -> Self {
        self.arity = arity;
        self
    }

    pub fn verify_on_open(mut self, verify: bool) -> Self {
        self.verify_on_open = verify;
        self
    }

    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Check the config for values the engine would reject or misread.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            // An empty filename silently opens a private temporary database
            return Err(config_error("path must not be empty; use \":memory:\""));
        }
        if self.path.contains('\0') {
            return Err(config_error("path contains a null byte"));
        }
        if c_int::try_from(self.busy_timeout_ms).is_err() {
            return Err(config_error(format!(
                "busy_timeout_ms {} exceeds {}",
                self.busy_timeout_ms,
                c_int::MAX
            )));
        }
        self.flags.validate()
    }
}

fn config_error(message: impl Into<String>) -> ConfigError {
    ConfigError {
        message: message.into(),
        source: None,
    }
}
