//! # Tessera
//!
//! Typed read queries compiled to parameterized SQL, executed against an
//! async connection and materialized back into Rust types, under a
//! cancellation token.
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera::expr::{col, gt};
//! use tessera::sqlite::SqliteConnection;
//! use tessera::{CancellationToken, Db, Dialect};
//!
//! tessera::entity! {
//!     #[derive(Debug)]
//!     pub struct User in "users" {
//!         pub id: i64,
//!         pub name: String,
//!         pub age: i64,
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tessera::Result<()> {
//! let conn = SqliteConnection::open_in_memory()?;
//! conn.execute_batch(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);
//!      INSERT INTO users (name, age) VALUES ('ann', 34), ('bob', 19);",
//! )?;
//! let db = Db::new(conn, Dialect::SQLite);
//! let cx = CancellationToken::new();
//!
//! let q = db.from::<User>().r#where(gt(col("age"), 21))?;
//! let adults = db.select(&q, &cx).await?;
//! assert_eq!(adults.len(), 1);
//! assert_eq!(db.count(&q, &cx).await?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Database Support
//!
//! | Database   | Driver         | Feature Flag     |
//! |------------|----------------|------------------|
//! | SQLite     | rusqlite       | `rusqlite`       |
//! | PostgreSQL | tokio-postgres | `tokio-postgres` |
//!
//! Any other backend plugs in through [`Connection`] and [`RowCursor`].

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod logging;

pub mod config;
mod db;
pub mod load;

#[cfg(feature = "tokio-postgres")]
pub mod postgres;
#[cfg(feature = "rusqlite")]
pub mod sqlite;

// =============================================================================
// Root-level exports
// =============================================================================

pub use config::Config;
pub use db::Db;

/// Cancellation signal accepted by every operation
pub use tokio_util::sync::CancellationToken;

/// Result type for tessera operations
pub use tessera_core::error::Result;

/// Error types
pub mod error {
    pub use tessera_core::error::{DriverError, TesseraError};
    pub use tessera_core::value::ValueError;
}

pub use tessera_core::{
    BufferedCursor, Connection, Dialect, DialectProvider, Entity, EntityShape, EntityTuple,
    FieldDef, FromValue, OrderBy, Row, RowCursor, SqlExpression, SqlType, Statement, TesseraError,
    Value, entity,
};

/// Expressions for `where`, `select`, `order_by` and `group_by`.
///
/// Includes comparisons (`eq`, `ne`, `gt`, `gte`, `lt`, `lte`), logical
/// operators (`and`, `or`, `not`), null tests, `in_list`, `like` and the
/// aggregates (`count`, `sum`, `avg`, `min`, `max`).
pub use tessera_core::expr;

/// Lower-level building blocks: SQL fragments, composer and materializer.
pub mod core {
    pub use tessera_core::compose::{ColumnGroup, GroupLayout, MultiSelect, alias_tag, compose};
    pub use tessera_core::materialize::{RowMapper, scalar};
    pub use tessera_core::query::JoinKind;
    pub use tessera_core::row::column_names;
    pub use tessera_core::{SQL, SQLChunk, Token, field_allowed};
}
