//! Dynamically typed SQL values.
//!
//! [`Value`] is used both for bound parameters and for row cells. Typed
//! fields read out of a `Value` through [`FromValue`]; the dialect gets a
//! chance to normalize a cell first (see
//! [`DialectProvider::convert_scalar`](crate::dialect::DialectProvider::convert_scalar)).

mod drivers;

#[cfg(feature = "tokio-postgres")]
pub use drivers::decode_column;

use core::fmt;
use core::hash::{Hash, Hasher};
use thiserror::Error;

//------------------------------------------------------------------------------
// Value Definition
//------------------------------------------------------------------------------

/// A single SQL value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (i64)
    Integer(i64),
    /// Real value (f64)
    Real(f64),
    /// Text value
    Text(String),
    /// Blob value
    Blob(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer value if this is an INTEGER.
    #[inline]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text value if this is TEXT.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Name of the stored variant, used in conversion messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    /// Loosely coerces this value into the storage class of `target`.
    ///
    /// NULL passes through untouched. Lossy conversions (fractional reals to
    /// integers, unparsable text) are errors.
    pub fn coerce(self, target: SqlType) -> Result<Value, ValueError> {
        let mismatch = |found: &Value| ValueError::Mismatch {
            expected: target,
            found: found.kind(),
        };

        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (value, SqlType::Any) => Ok(value),

            (v @ Value::Bool(_), SqlType::Bool) => Ok(v),
            (Value::Integer(i), SqlType::Bool) => Ok(Value::Bool(i != 0)),
            (Value::Text(s), SqlType::Bool) => match s.as_str() {
                "t" | "true" | "TRUE" | "1" => Ok(Value::Bool(true)),
                "f" | "false" | "FALSE" | "0" => Ok(Value::Bool(false)),
                _ => Err(ValueError::Parse {
                    value: s,
                    target: SqlType::Bool,
                }),
            },

            (v @ Value::Integer(_), SqlType::Integer) => Ok(v),
            (Value::Bool(b), SqlType::Integer) => Ok(Value::Integer(i64::from(b))),
            (Value::Real(r), SqlType::Integer) if r.fract() == 0.0 && I64_RANGE.contains(&r) => {
                Ok(Value::Integer(r as i64))
            }
            (Value::Text(s), SqlType::Integer) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::Integer(i)),
                Err(_) => Err(ValueError::Parse {
                    value: s,
                    target: SqlType::Integer,
                }),
            },

            (v @ Value::Real(_), SqlType::Real) => Ok(v),
            (Value::Integer(i), SqlType::Real) => Ok(Value::Real(i as f64)),
            (Value::Text(s), SqlType::Real) => match s.trim().parse::<f64>() {
                Ok(r) => Ok(Value::Real(r)),
                Err(_) => Err(ValueError::Parse {
                    value: s,
                    target: SqlType::Real,
                }),
            },

            (v @ Value::Text(_), SqlType::Text) => Ok(v),
            (v @ Value::Blob(_), SqlType::Blob) => Ok(v),
            (Value::Text(s), SqlType::Blob) => Ok(Value::Blob(s.into_bytes())),

            (other, _) => Err(mismatch(&other)),
        }
    }
}

/// Reals that convert to `i64` without saturating.
const I64_RANGE: core::ops::Range<f64> = -9.223_372_036_854_776e18..9.223_372_036_854_776e18;

// Reals compare by bit pattern so that `Value` can key a hash map.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Real(r) => r.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Blob(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

//------------------------------------------------------------------------------
// SqlType
//------------------------------------------------------------------------------

/// Semantic type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bool,
    Integer,
    Real,
    Text,
    Blob,
    /// Accepts any storage class unchanged
    Any,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlType::Bool => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
            SqlType::Any => "ANY",
        })
    }
}

//------------------------------------------------------------------------------
// Conversion errors
//------------------------------------------------------------------------------

/// Failure converting a [`Value`] into a typed field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: SqlType,
        found: &'static str,
    },
    #[error("cannot parse {value:?} as {target}")]
    Parse { value: String, target: SqlType },
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },
    #[error("{0} does not fit in a signed 64-bit integer")]
    IntegerOverflow(u64),
    #[error("unexpected NULL")]
    UnexpectedNull,
    #[error("no field at index {0}")]
    UnknownField(usize),
}

//------------------------------------------------------------------------------
// FromValue
//------------------------------------------------------------------------------

/// Reads a Rust value out of a [`Value`].
///
/// Implementations are strict about storage class; dialect-level coercion
/// happens before `from_value` is called.
pub trait FromValue: Sized {
    /// Storage class this type expects.
    const SQL_TYPE: SqlType;

    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for Value {
    const SQL_TYPE: SqlType = SqlType::Any;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for bool {
    const SQL_TYPE: SqlType = SqlType::Bool;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::Mismatch {
                expected: Self::SQL_TYPE,
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for i64 {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(i) => Ok(i),
            Value::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::Mismatch {
                expected: Self::SQL_TYPE,
                found: other.kind(),
            }),
        }
    }
}

macro_rules! impl_from_value_narrow_int {
    ($($ty:ty),* $(,)?) => { $(
        impl FromValue for $ty {
            const SQL_TYPE: SqlType = SqlType::Integer;

            fn from_value(value: Value) -> Result<Self, ValueError> {
                let wide = i64::from_value(value)?;
                <$ty>::try_from(wide).map_err(|_| ValueError::OutOfRange {
                    value: wide,
                    target: stringify!($ty),
                })
            }
        }
    )* };
}

impl_from_value_narrow_int!(i8, i16, i32, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    const SQL_TYPE: SqlType = SqlType::Real;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Real(r) => Ok(r),
            Value::Integer(i) => Ok(i as f64),
            Value::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::Mismatch {
                expected: Self::SQL_TYPE,
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for f32 {
    const SQL_TYPE: SqlType = SqlType::Real;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        f64::from_value(value).map(|r| r as f32)
    }
}

impl FromValue for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::Mismatch {
                expected: Self::SQL_TYPE,
                found: other.kind(),
            }),
        }
    }
}

impl FromValue for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Blob;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Blob(b) => Ok(b),
            Value::Null => Err(ValueError::UnexpectedNull),
            other => Err(ValueError::Mismatch {
                expected: Self::SQL_TYPE,
                found: other.kind(),
            }),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

//------------------------------------------------------------------------------
// Into Value
//------------------------------------------------------------------------------

macro_rules! impl_value_from {
    ($variant:ident: $($ty:ty),* $(,)?) => { $(
        impl From<$ty> for Value {
            #[inline]
            fn from(value: $ty) -> Self {
                Value::$variant(value.into())
            }
        }
    )* };
}

impl_value_from!(Bool: bool);
impl_value_from!(Integer: i8, i16, i32, i64, u8, u16, u32);
impl_value_from!(Real: f32, f64);
impl_value_from!(Text: String, &str);
impl_value_from!(Blob: Vec<u8>, &[u8]);

impl TryFrom<u64> for Value {
    type Error = ValueError;

    fn try_from(value: u64) -> Result<Self, ValueError> {
        i64::try_from(value)
            .map(Value::Integer)
            .map_err(|_| ValueError::IntegerOverflow(value))
    }
}

impl TryFrom<usize> for Value {
    type Error = ValueError;

    fn try_from(value: usize) -> Result<Self, ValueError> {
        Value::try_from(value as u64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
