//! PostgreSQL driver over [`tokio_postgres`].
//!
//! Rows are streamed with `query_raw`, so a cursor holds at most the rows
//! the server has already sent.
//!
//! ```no_run
//! use tessera::postgres::PostgresConnection;
//! use tessera::{CancellationToken, Db, Dialect};
//! use tokio_postgres::NoTls;
//!
//! tessera::entity! {
//!     pub struct User in "users" {
//!         pub id: i64,
//!         pub name: String,
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> tessera::Result<()> {
//!     let (client, connection) =
//!         tokio_postgres::connect("host=localhost user=postgres", NoTls).await?;
//!     tokio::spawn(connection);
//!
//!     let db = Db::new(PostgresConnection::new(client), Dialect::PostgreSQL);
//!     let cx = CancellationToken::new();
//!     let users: Vec<User> = db.select(&db.from::<User>(), &cx).await?;
//!     println!("{} users", users.len());
//!     Ok(())
//! }
//! ```

use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use tessera_core::row::column_names;
use tessera_core::value::decode_column;
use tessera_core::{Connection, Result, Row, RowCursor, Statement, TesseraError};
use tokio_postgres::{Client, RowStream};

/// A tokio-postgres client usable as a [`Connection`].
#[derive(Debug)]
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    #[inline]
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_inner(self) -> Client {
        self.client
    }

    /// Runs a single data-modifying statement and returns the changed row count.
    pub async fn execute(&self, stmt: &Statement) -> Result<u64> {
        let params: Vec<_> = stmt
            .params()
            .iter()
            .map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();
        Ok(self.client.execute(stmt.sql(), &params[..]).await?)
    }
}

impl From<Client> for PostgresConnection {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

/// Streaming cursor over a `query_raw` result.
pub struct PgCursor {
    columns: Arc<[String]>,
    stream: Option<Pin<Box<RowStream>>>,
}

impl std::fmt::Debug for PgCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCursor")
            .field("columns", &self.columns)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl RowCursor for PgCursor {
    fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    async fn next(&mut self) -> Result<Option<Row>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(row)) => {
                let values = (0..row.len())
                    .map(|idx| decode_column(&row, idx))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Some(Row::new(Arc::clone(&self.columns), values)))
            }
            Some(Err(e)) => {
                self.stream = None;
                Err(TesseraError::from(e))
            }
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream = None;
        Ok(())
    }
}

impl Connection for PostgresConnection {
    type Cursor = PgCursor;

    async fn open(&self, stmt: &Statement) -> Result<PgCursor> {
        let prepared = self.client.prepare(stmt.sql()).await?;
        let columns = column_names(prepared.columns().iter().map(|c| c.name()));
        let params = stmt
            .params()
            .iter()
            .map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync));
        let stream = self.client.query_raw(&prepared, params).await?;
        Ok(PgCursor {
            columns,
            stream: Some(Box::pin(stream)),
        })
    }
}
