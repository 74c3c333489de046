//! Driver seam: connections open cursors, cursors yield rows.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::row::Row;
use crate::statement::Statement;

/// A forward-only sequence of rows for one executed statement.
///
/// A cursor is owned by exactly one call and must be closed on every exit
/// path. `close` is idempotent.
pub trait RowCursor: Send {
    /// Column names of the result set.
    fn columns(&self) -> &Arc<[String]>;

    /// Fetches the next row, or `None` once the result set is exhausted.
    fn next(&mut self) -> impl Future<Output = Result<Option<Row>>> + Send;

    /// Releases the underlying result set.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// A caller-supplied database connection.
///
/// The core never pools, locks or retries a connection.
pub trait Connection: Send + Sync {
    type Cursor: RowCursor;

    /// Executes `statement` and returns a cursor over its rows.
    fn open(&self, statement: &Statement) -> impl Future<Output = Result<Self::Cursor>> + Send;
}

/// Cursor over rows that were already fetched.
///
/// Used by drivers whose row handles cannot outlive the call that produced
/// them.
#[derive(Debug, Clone)]
pub struct BufferedCursor {
    columns: Arc<[String]>,
    rows: VecDeque<Row>,
    closed: bool,
}

impl BufferedCursor {
    pub fn new(columns: Arc<[String]>, rows: impl Into<VecDeque<Row>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            closed: false,
        }
    }

    /// Rows not yet handed out.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RowCursor for BufferedCursor {
    fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    async fn next(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }
}
