//! Database driver implementations for Value
//!
//! Contains implementations for rusqlite and tokio-postgres.

#[cfg(any(feature = "rusqlite", feature = "tokio-postgres"))]
use super::Value;

//------------------------------------------------------------------------------
// rusqlite implementations
//------------------------------------------------------------------------------

#[cfg(feature = "rusqlite")]
impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqliteValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqliteValue::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

#[cfg(feature = "rusqlite")]
impl<'a> From<rusqlite::types::ValueRef<'a>> for Value {
    fn from(value: rusqlite::types::ValueRef<'a>) -> Self {
        use rusqlite::types::ValueRef;

        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            // SQLite does not validate TEXT; keep invalid UTF-8 as raw bytes
            // so text fields reject it instead of reading replacement chars.
            ValueRef::Text(items) => match core::str::from_utf8(items) {
                Ok(text) => Value::Text(text.to_owned()),
                Err(_) => Value::Blob(items.to_vec()),
            },
            ValueRef::Blob(items) => Value::Blob(items.to_vec()),
        }
    }
}


//------------------------------------------------------------------------------
// tokio-postgres implementations
//------------------------------------------------------------------------------

#[cfg(feature = "tokio-postgres")]
mod postgres_impl {
    use super::Value;
    use bytes::BytesMut;
    use tokio_postgres::Row;
    use tokio_postgres::types::{IsNull, ToSql, Type};

    type BoxError = Box<dyn std::error::Error + Sync + Send>;

    impl ToSql for Value {
        fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
            match self {
                Value::Null => Ok(IsNull::Yes),
                Value::Bool(b) => b.to_sql(ty, out),
                Value::Integer(i) => match *ty {
                    Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                    Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                    Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                    Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                    Type::BOOL => (*i != 0).to_sql(ty, out),
                    _ => i.to_sql(ty, out),
                },
                Value::Real(r) => match *ty {
                    Type::FLOAT4 => (*r as f32).to_sql(ty, out),
                    _ => r.to_sql(ty, out),
                },
                Value::Text(s) => s.as_str().to_sql(ty, out),
                Value::Blob(b) => b.as_slice().to_sql(ty, out),
            }
        }

        fn accepts(_ty: &Type) -> bool {
            // Accept all types - conversion is decided per value in to_sql
            true
        }

        tokio_postgres::types::to_sql_checked!();
    }

    /// Decodes column `idx` of a postgres row by its wire type.
    pub fn decode_column(row: &Row, idx: usize) -> Result<Value, tokio_postgres::Error> {
        let ty = row.columns()[idx].type_().clone();
        let value = match ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
            Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
            Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
            Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Integer),
            Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::from),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Real),
            Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Blob),
            _ => row.try_get::<_, Option<String>>(idx)?.map(Value::Text),
        };
        Ok(value.unwrap_or(Value::Null))
    }
}

#[cfg(feature = "tokio-postgres")]
pub use postgres_impl::decode_column;
