//! Moving values across the engine boundary.
//!
//! SQLite has five storage classes and so does [`Value`], so both directions
//! are a direct match. Text and blobs are bound with `SQLITE_TRANSIENT`,
//! which makes the engine take its own copy before the call returns.

use crate::ffi;
use sqlite_lite_core::Value;
use std::ffi::{CStr, c_int};

/// Bind a Value to a prepared statement parameter.
///
/// Returns the engine status code. Payloads longer than `c_int::MAX` bytes
/// are refused with `SQLITE_TOOBIG` without calling into the engine.
///
/// # Safety
/// - `stmt` must be a valid, non-null prepared statement handle
/// - `index` is 1-based; the engine reports `SQLITE_RANGE` if it is out of range
pub unsafe fn bind_value(stmt: *mut ffi::sqlite3_stmt, index: c_int, value: &Value) -> c_int {
    match value {
        Value::Null => unsafe { ffi::sqlite3_bind_null(stmt, index) },

        Value::Integer(v) => unsafe { ffi::sqlite3_bind_int64(stmt, index, *v) },

        Value::Real(v) => unsafe { ffi::sqlite3_bind_double(stmt, index, *v) },

        Value::Text(s) => {
            let bytes = s.as_bytes();
            let Ok(len) = c_int::try_from(bytes.len()) else {
                return ffi::SQLITE_TOOBIG;
            };
            unsafe {
                ffi::sqlite3_bind_text(
                    stmt,
                    index,
                    bytes.as_ptr().cast(),
                    len,
                    ffi::SQLITE_TRANSIENT,
                )
            }
        }

        Value::Blob(b) => {
            let Ok(len) = c_int::try_from(b.len()) else {
                return ffi::SQLITE_TOOBIG;
            };
            unsafe {
                ffi::sqlite3_bind_blob(stmt, index, b.as_ptr().cast(), len, ffi::SQLITE_TRANSIENT)
            }
        }
    }
}

/// Read a column value from the current row.
///
/// TEXT that is not valid UTF-8 comes back as [`Value::Blob`] holding the
/// stored bytes unchanged.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that has just returned SQLITE_ROW
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    let col_type = unsafe { ffi::sqlite3_column_type(stmt, index) };

    match col_type {
        ffi::SQLITE_NULL => Value::Null,

        ffi::SQLITE_INTEGER => Value::Integer(unsafe { ffi::sqlite3_column_int64(stmt, index) }),

        ffi::SQLITE_FLOAT => Value::Real(unsafe { ffi::sqlite3_column_double(stmt, index) }),

        ffi::SQLITE_TEXT => {
            // Fetch the pointer before the length so the byte count refers to
            // the text encoding we actually read.
            let ptr = unsafe { ffi::sqlite3_column_text(stmt, index) };
            let len = unsafe { ffi::sqlite3_column_bytes(stmt, index) };
            if ptr.is_null() {
                // Only happens on OOM while converting encodings
                Value::Null
            } else {
                let slice = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize) };
                match std::str::from_utf8(slice) {
                    Ok(text) => Value::Text(text.to_owned()),
                    Err(_) => Value::Blob(slice.to_vec()),
                }
            }
        }

        ffi::SQLITE_BLOB => {
            let ptr = unsafe { ffi::sqlite3_column_blob(stmt, index) };
            let len = unsafe { ffi::sqlite3_column_bytes(stmt, index) };
            if ptr.is_null() || len == 0 {
                // Zero-length blobs come back as a null pointer
                Value::Blob(Vec::new())
            } else {
                let slice = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize) };
                Value::Blob(slice.to_vec())
            }
        }

        _ => Value::Null,
    }
}

/// Get the column name from a result.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    let ptr = unsafe { ffi::sqlite3_column_name(stmt, index) };
    if ptr.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .ok()
            .map(String::from)
    }
}

/// Get the name of a bound parameter (`?NNN`, `:name`, `@name` or `$name`).
///
/// Returns `None` for anonymous `?` placeholders.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
pub unsafe fn parameter_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    let ptr = unsafe { ffi::sqlite3_bind_parameter_name(stmt, index) };
    if ptr.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .ok()
            .map(String::from)
    }
}

/// Storage class name for a `sqlite3_column_type` result.
pub fn storage_class_name(col_type: c_int) -> &'static str {
    match col_type {
        ffi::SQLITE_INTEGER => "INTEGER",
        ffi::SQLITE_FLOAT => "REAL",
        ffi::SQLITE_TEXT => "TEXT",
        ffi::SQLITE_BLOB => "BLOB",
        _ => "NULL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_class_name() {
        assert_eq!(storage_class_name(ffi::SQLITE_INTEGER), "INTEGER");
        assert_eq!(storage_class_name(ffi::SQLITE_FLOAT), "REAL");
        assert_eq!(storage_class_name(ffi::SQLITE_TEXT), "TEXT");
        assert_eq!(storage_class_name(ffi::SQLITE_BLOB), "BLOB");
        assert_eq!(storage_class_name(ffi::SQLITE_NULL), "NULL");
        assert_eq!(storage_class_name(42), "NULL");
    }

    #[test]
    fn test_storage_class_matches_value_type_name() {
        let pairs = [
            (ffi::SQLITE_INTEGER, Value::Integer(1)),
            (ffi::SQLITE_FLOAT, Value::Real(1.5)),
            (ffi::SQLITE_TEXT, Value::Text("x".into())),
            (ffi::SQLITE_BLOB, Value::Blob(vec![1])),
            (ffi::SQLITE_NULL, Value::Null),
        ];
        for (code, value) in pairs {
            assert_eq!(storage_class_name(code), value.type_name());
        }
    }
}
