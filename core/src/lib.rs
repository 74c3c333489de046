#[macro_use]
mod tuple;

pub mod compose;
pub mod connection;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod expr;
pub mod materialize;
pub mod query;
pub mod row;
pub mod sql;
pub mod statement;
pub mod value;

// Re-export key types and traits
pub use compose::{ColumnGroup, GroupLayout, MultiSelect, alias_tag, compose};
pub use connection::{BufferedCursor, Connection, RowCursor};
pub use dialect::{Dialect, DialectProvider};
pub use entity::{Entity, EntityShape, FieldDef, field_allowed};
pub use error::{DriverError, Result, TesseraError};
pub use expr::{Expr, IntoExpr, OrderBy};
pub use materialize::{EntityTuple, RowMapper};
pub use query::{JoinKind, SqlExpression};
pub use row::Row;
pub use sql::{SQL, SQLChunk, Token};
pub use statement::Statement;
pub use value::{FromValue, SqlType, Value, ValueError};
