//! Dynamic column values and their conversions.
//!
//! The engine stores every value in one of five storage classes. [`Value`]
//! mirrors them one-to-one; host types go in through `From` and come back out
//! through [`FromValue`], governed by a [`Coercion`] policy.

use serde::{Deserialize, Serialize};

use crate::error::{Error, TypeError};

/// A dynamically-typed column value.
///
/// Used both for parameter binding and for reading result columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit IEEE floating point
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
}

/// How strictly column values are converted into host types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// Only lossless conversions; everything else is a type mismatch.
    #[default]
    Strict,
    /// Also truncate reals, parse text, format numbers and read NULL as the
    /// zero value.
    Lenient,
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The storage class name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> TypeError {
        TypeError::new(expected, self.type_name())
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

/// SQLite integers are signed, so values above `i64::MAX` are rejected.
impl TryFrom<u64> for Value {
    type Error = Error;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        i64::try_from(v).map(Value::Integer).map_err(|_| {
            Error::TypeMismatch(TypeError::new(
                "u64 <= i64::MAX",
                format!("u64 value {} exceeds i64::MAX", v),
            ))
        })
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Build an ordered parameter list.
///
/// ```
/// use sqlite_lite_core::{params, Value};
///
/// let args: &[Value] = params!["Tom", 18];
/// assert_eq!(args, &[Value::Text("Tom".into()), Value::Integer(18)]);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        &[][..]
    };
    ($($val:expr),+ $(,)?) => {
        &[$($crate::Value::from($val)),+][..]
    };
}

/// Conversion from a column value into a host type.
pub trait FromValue: Sized {
    /// Name used in type mismatch messages.
    const EXPECTED: &'static str;

    fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError>;
}

/// Largest integer magnitude an f64 holds exactly: 2^53.
const F64_MAX_EXACT_INT: u64 = 1 << 53;

/// Largest integer magnitude an f32 holds exactly: 2^24.
const F32_MAX_EXACT_INT: u64 = 1 << 24;

/// 2^63 as an f64; truncated reals in `[-2^63, 2^63)` fit in an i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Truncate a finite real toward zero, refusing values outside i64.
#[allow(clippy::cast_possible_truncation)]
fn truncate_real(v: f64, expected: &'static str) -> Result<i64, TypeError> {
    let t = v.trunc();
    if t >= -I64_BOUND && t < I64_BOUND {
        Ok(t as i64)
    } else {
        Err(TypeError::new(expected, format!("REAL {} out of range", v)))
    }
}

/// Integer view of a value under the given policy.
fn integer_of(value: &Value, coercion: Coercion, expected: &'static str) -> Result<i64, TypeError> {
    match (value, coercion) {
        (Value::Integer(v), _) => Ok(*v),
        (Value::Null, Coercion::Lenient) => Ok(0),
        (Value::Real(v), Coercion::Lenient) if v.is_finite() => {
            if v.fract() != 0.0 {
                tracing::debug!(value = v, target_type = expected, "truncating REAL to integer");
            }
            truncate_real(*v, expected)
        }
        (Value::Text(s), Coercion::Lenient) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().or_else(|_| {
                let f = trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| TypeError::new(expected, format!("TEXT '{}'", s)))?;
                truncate_real(f, expected)
                    .map_err(|_| TypeError::new(expected, format!("TEXT '{}' out of range", s)))
            })
        }
        (other, _) => Err(other.mismatch(expected)),
    }
}

macro_rules! from_value_int {
    ($($t:ty => $name:literal),*) => {
        $(
            impl FromValue for $t {
                const EXPECTED: &'static str = $name;

                fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError> {
                    let v = integer_of(&value, coercion, Self::EXPECTED)?;
                    <$t>::try_from(v).map_err(|_| {
                        TypeError::new(Self::EXPECTED, format!("INTEGER {} out of range", v))
                    })
                }
            }
        )*
    };
}

from_value_int!(
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64"
);

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError> {
        match (integer_of(&value, coercion, Self::EXPECTED)?, coercion) {
            (0, _) => Ok(false),
            (1, _) => Ok(true),
            (_, Coercion::Lenient) => Ok(true),
            (v, Coercion::Strict) => Err(TypeError::new(
                Self::EXPECTED,
                format!("INTEGER {} is not 0 or 1", v),
            )),
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError> {
        match (value, coercion) {
            (Value::Real(v), _) => Ok(v),
            (Value::Integer(v), Coercion::Strict) => {
                if v.unsigned_abs() > F64_MAX_EXACT_INT {
                    return Err(TypeError::new(
                        Self::EXPECTED,
                        format!("INTEGER {} exceeds f64 exact integer range", v),
                    ));
                }
                Ok(v as f64)
            }
            (Value::Integer(v), Coercion::Lenient) => Ok(v as f64),
            (Value::Null, Coercion::Lenient) => Ok(0.0),
            (Value::Text(s), Coercion::Lenient) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| TypeError::new(Self::EXPECTED, format!("TEXT '{}'", s))),
            (other, _) => Err(other.mismatch(Self::EXPECTED)),
        }
    }
}

impl FromValue for f32 {
    const EXPECTED: &'static str = "f32";

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError> {
        match (value, coercion) {
            (Value::Real(v), Coercion::Strict) => {
                let converted = v as f32;
                if f64::from(converted) != v && !v.is_nan() {
                    return Err(TypeError::new(
                        Self::EXPECTED,
                        format!("REAL {} loses precision as f32", v),
                    ));
                }
                Ok(converted)
            }
            (Value::Integer(v), Coercion::Strict) => {
                if v.unsigned_abs() > F32_MAX_EXACT_INT {
                    return Err(TypeError::new(
                        Self::EXPECTED,
                        format!("INTEGER {} exceeds f32 exact integer range", v),
                    ));
                }
                Ok(v as f32)
            }
            (other, Coercion::Lenient) => f64::from_value(other, Coercion::Lenient)
                .map(|v| v as f32)
                .map_err(|e| TypeError::new(Self::EXPECTED, e.actual)),
            (other, Coercion::Strict) => Err(other.mismatch(Self::EXPECTED)),
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "String";

    fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError> {
        match (value, coercion) {
            (Value::Text(s), _) => Ok(s),
            (Value::Null, Coercion::Lenient) => Ok(String::new()),
            (Value::Integer(v), Coercion::Lenient) => Ok(v.to_string()),
            (Value::Real(v), Coercion::Lenient) => Ok(v.to_string()),
            (Value::Blob(b), Coercion::Lenient) => Ok(String::from_utf8_lossy(&b).into_owned()),
            (other, _) => Err(other.mismatch(Self::EXPECTED)),
        }
    }
}

impl FromValue for Vec<u8> {
    const EXPECTED: &'static str = "Vec<u8>";

    fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError> {
        match (value, coercion) {
            (Value::Blob(b), _) => Ok(b),
            (Value::Text(s), _) => Ok(s.into_bytes()),
            (Value::Null, Coercion::Lenient) => Ok(Vec::new()),
            (other, _) => Err(other.mismatch(Self::EXPECTED)),
        }
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "Value";

    fn from_value(value: Value, _coercion: Coercion) -> Result<Self, TypeError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: Value, coercion: Coercion) -> Result<Self, TypeError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, coercion).map(Some),
        }
    }
}

// Strict extraction via TryFrom, for callers holding a bare Value.
macro_rules! try_from_value {
    ($($t:ty),*) => {
        $(
            impl TryFrom<Value> for $t {
                type Error = Error;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    <$t as FromValue>::from_value(value, Coercion::Strict)
                        .map_err(Error::TypeMismatch)
                }
            }
        )*
    };
}

try_from_value!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, Vec<u8>);
