//! Execution pipeline.
//!
//! [`Db`] runs compiled statements over a caller-supplied [`Connection`] and
//! materializes the rows. Every operation takes a [`CancellationToken`]; it
//! is checked before the cursor is opened and raced against every row
//! fetch. A cursor is closed on every exit path, and when both the operation
//! and the close fail the operation's error is the one reported.

use std::sync::Arc;

use futures_util::Stream;
use futures_util::stream;
use tessera_core::expr::Expr;
use tessera_core::materialize;
use tessera_core::{
    Connection, DialectProvider, Entity, EntityTuple, FromValue, Result, Row, RowCursor,
    RowMapper, SqlExpression, Statement, TesseraError,
};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// A connection paired with the dialect its statements are rendered for.
#[derive(Debug)]
pub struct Db<C> {
    conn: C,
    dialect: Arc<dyn DialectProvider>,
    log_statements: bool,
}

impl<C> Db<C> {
    pub fn new(conn: C, dialect: impl DialectProvider + 'static) -> Self {
        Self::with_dialect(conn, Arc::new(dialect))
    }

    pub fn with_dialect(conn: C, dialect: Arc<dyn DialectProvider>) -> Self {
        Self {
            conn,
            dialect,
            log_statements: true,
        }
    }

    pub fn with_config(conn: C, config: &Config) -> Self {
        Self {
            conn,
            dialect: Arc::new(config.dialect),
            log_statements: config.log_statements,
        }
    }

    #[inline]
    pub fn connection(&self) -> &C {
        &self.conn
    }

    #[inline]
    pub fn dialect(&self) -> &Arc<dyn DialectProvider> {
        &self.dialect
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Starts a query over `T`'s table in this database's dialect.
    pub fn from<T: Entity>(&self) -> SqlExpression<T> {
        SqlExpression::new(Arc::clone(&self.dialect))
    }
}

impl<C: Connection> Db<C> {
    // ==================== cursor plumbing ====================

    pub(crate) async fn open(
        &self,
        stmt: &Statement,
        cx: &CancellationToken,
    ) -> Result<C::Cursor> {
        if cx.is_cancelled() {
            tessera_trace_cancel!("open");
            return Err(TesseraError::Cancelled);
        }
        if self.log_statements {
            tessera_trace_query!(stmt.sql(), stmt.params().len());
        }
        tokio::select! {
            biased;
            _ = cx.cancelled() => {
                tessera_trace_cancel!("open");
                Err(TesseraError::Cancelled)
            }
            cursor = self.conn.open(stmt) => cursor,
        }
    }

    async fn fetch(cursor: &mut C::Cursor, cx: &CancellationToken) -> Result<Option<Row>> {
        if cx.is_cancelled() {
            tessera_trace_cancel!("fetch");
            return Err(TesseraError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cx.cancelled() => {
                tessera_trace_cancel!("fetch");
                Err(TesseraError::Cancelled)
            }
            row = cursor.next() => row,
        }
    }

    /// Runs `stmt` and feeds up to `max_rows` rows to `on_row`, in cursor
    /// order. The cursor is closed before returning.
    pub(crate) async fn drain<F>(
        &self,
        stmt: &Statement,
        cx: &CancellationToken,
        max_rows: Option<usize>,
        mut on_row: F,
    ) -> Result<()>
    where
        F: FnMut(&Arc<[String]>, Row) -> Result<()>,
    {
        let mut cursor = self.open(stmt, cx).await?;

        let mut seen = 0usize;
        let outcome = loop {
            if max_rows.is_some_and(|max| seen >= max) {
                break Ok(());
            }
            match Self::fetch(&mut cursor, cx).await {
                Ok(Some(row)) => {
                    seen += 1;
                    if let Err(e) = on_row(cursor.columns(), row) {
                        break Err(e);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let closed = cursor.close().await;
        if outcome.is_err()
            && let Err(e) = &closed
        {
            tessera_trace_close!(e);
        }
        outcome.and(closed)
    }

    pub(crate) async fn collect<T: Entity>(
        &self,
        stmt: &Statement,
        only: Option<&[String]>,
        cx: &CancellationToken,
        max_rows: Option<usize>,
    ) -> Result<Vec<T>> {
        let dialect = self.dialect.as_ref();
        let mut mapper: Option<RowMapper> = None;
        let mut out = Vec::new();
        self.drain(stmt, cx, max_rows, |columns, mut row| {
            let mapper = mapper.get_or_insert_with(|| RowMapper::new(T::shape(), columns, only));
            out.push(mapper.materialize::<T>(&mut row, dialect)?);
            Ok(())
        })
        .await?;
        Ok(out)
    }

    // ==================== select ====================

    /// All rows of `query`, materialized as `T`.
    ///
    /// On any error, cancellation included, the rows read so far are
    /// discarded.
    pub async fn select<T: Entity>(
        &self,
        query: &SqlExpression<T>,
        cx: &CancellationToken,
    ) -> Result<Vec<T>> {
        let stmt = query.to_select_statement();
        self.collect(&stmt, query.only_fields(), cx, None).await
    }

    /// All rows of `query`, projected onto and materialized as `R`.
    pub async fn select_into<R: Entity, T>(
        &self,
        query: &SqlExpression<T>,
        cx: &CancellationToken,
    ) -> Result<Vec<R>> {
        let stmt = query.select_into::<R>()?;
        self.collect(&stmt, query.only_fields(), cx, None).await
    }

    /// All `T` rows matching `predicate`.
    pub async fn select_where<T: Entity>(
        &self,
        predicate: Expr,
        cx: &CancellationToken,
    ) -> Result<Vec<T>> {
        let query = self.from::<T>().r#where(predicate)?;
        self.select(&query, cx).await
    }

    /// One tuple per row, each element hydrated from its column group.
    ///
    /// Every tuple element must be the query's root table or a joined one.
    pub async fn select_multi<Tup: EntityTuple, T>(
        &self,
        query: &SqlExpression<T>,
        cx: &CancellationToken,
    ) -> Result<Vec<Tup>> {
        let (stmt, layout) = query.to_multi_select_for::<Tup>()?;
        let mappers = RowMapper::for_layout(&layout);
        let dialect = self.dialect.as_ref();
        let width = layout.width();

        let mut out = Vec::new();
        self.drain(&stmt, cx, None, |_, mut row| {
            if row.len() < width {
                return Err(TesseraError::execution(format!(
                    "row has {} columns, multi-select expects {width}",
                    row.len()
                )));
            }
            out.push(Tup::from_row(&mut row, &mappers, dialect)?);
            Ok(())
        })
        .await?;
        Ok(out)
    }

    // ==================== single ====================

    /// The first row of `query`, or `None` when nothing matches.
    ///
    /// `LIMIT 1` is pushed into the statement and at most one row is read.
    pub async fn single<T: Entity>(
        &self,
        query: &SqlExpression<T>,
        cx: &CancellationToken,
    ) -> Result<Option<T>> {
        let limited = query.clone().limit(1);
        let stmt = limited.to_select_statement();
        let rows = self.collect(&stmt, query.only_fields(), cx, Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// The first `T` matching `predicate`.
    pub async fn single_where<T: Entity>(
        &self,
        predicate: Expr,
        cx: &CancellationToken,
    ) -> Result<Option<T>> {
        let query = self.from::<T>().r#where(predicate)?;
        self.single(&query, cx).await
    }

    // ==================== scalar ====================

    /// First column of the first row of `SELECT field FROM T [WHERE ..]`.
    ///
    /// `None` when there are no rows or the value is NULL.
    pub async fn scalar<T: Entity, K: FromValue>(
        &self,
        field: Expr,
        predicate: Option<Expr>,
        cx: &CancellationToken,
    ) -> Result<Option<K>> {
        let mut query = self.from::<T>().select([field])?;
        if let Some(predicate) = predicate {
            query = query.r#where(predicate)?;
        }
        self.scalar_query(&query, cx).await
    }

    /// First column of the first row of `query`.
    pub async fn scalar_query<K: FromValue, T>(
        &self,
        query: &SqlExpression<T>,
        cx: &CancellationToken,
    ) -> Result<Option<K>> {
        let stmt = query.to_select_statement();
        self.scalar_statement(&stmt, cx).await
    }

    async fn scalar_statement<K: FromValue>(
        &self,
        stmt: &Statement,
        cx: &CancellationToken,
    ) -> Result<Option<K>> {
        let dialect = self.dialect.as_ref();
        let mut value = None;
        self.drain(stmt, cx, Some(1), |_, mut row| {
            value = materialize::scalar::<Option<K>>(&mut row, dialect)?.flatten();
            Ok(())
        })
        .await?;
        Ok(value)
    }

    // ==================== count ====================

    /// Number of rows `query` matches.
    ///
    /// Sums the count column over every returned row, so grouped counts add
    /// up. No rows counts as 0.
    pub async fn count<T>(&self, query: &SqlExpression<T>, cx: &CancellationToken) -> Result<i64> {
        let stmt = query.to_count_statement();
        self.count_statement(&stmt, cx).await
    }

    pub async fn count_where<T: Entity>(
        &self,
        predicate: Expr,
        cx: &CancellationToken,
    ) -> Result<i64> {
        let query = self.from::<T>().r#where(predicate)?;
        self.count(&query, cx).await
    }

    pub async fn count_all<T: Entity>(&self, cx: &CancellationToken) -> Result<i64> {
        let query = self.from::<T>();
        self.count(&query, cx).await
    }

    /// Sums the first column of every row of `stmt`. NULL counts as 0.
    pub async fn count_statement(&self, stmt: &Statement, cx: &CancellationToken) -> Result<i64> {
        let dialect = self.dialect.as_ref();
        let mut total = 0i64;
        self.drain(stmt, cx, None, |_, mut row| {
            let n = materialize::scalar::<Option<i64>>(&mut row, dialect)?.flatten().unwrap_or(0);
            total = total
                .checked_add(n)
                .ok_or_else(|| TesseraError::execution("row count overflowed i64"))?;
            Ok(())
        })
        .await?;
        Ok(total)
    }

    /// Number of rows the full select of `query` returns, paging included.
    pub async fn row_count<T>(&self, query: &SqlExpression<T>, cx: &CancellationToken) -> Result<i64> {
        let stmt = query.to_row_count_statement();
        self.count_statement(&stmt, cx).await
    }

    /// Number of rows an arbitrary statement returns, counted by wrapping it
    /// in a `SELECT COUNT(*)` subquery.
    pub async fn row_count_sql(
        &self,
        stmt: impl Into<Statement>,
        cx: &CancellationToken,
    ) -> Result<i64> {
        let stmt = stmt.into().into_row_count(self.dialect.as_ref());
        self.count_statement(&stmt, cx).await
    }

    // ==================== streaming ====================

    /// Streams the rows of `query` as they are fetched.
    ///
    /// Items yielded before an error or cancellation stay valid. The stream
    /// ends after the first error. Dropping the stream early drops the
    /// cursor, which releases it without the async `close`.
    pub fn stream<'a, T: Entity>(
        &'a self,
        query: &SqlExpression<T>,
        cx: &'a CancellationToken,
    ) -> impl Stream<Item = Result<T>> + use<'a, T, C> {
        let state = StreamState::Pending {
            stmt: query.to_select_statement(),
            only: query.only_fields().map(<[String]>::to_vec),
        };

        stream::unfold(state, move |state| async move {
            let (mut cursor, mut mapper, only) = match state {
                StreamState::Done => return None,
                StreamState::Pending { stmt, only } => match self.open(&stmt, cx).await {
                    Ok(cursor) => (cursor, None, only),
                    Err(e) => return Some((Err(e), StreamState::Done)),
                },
                StreamState::Open {
                    cursor,
                    mapper,
                    only,
                } => (cursor, mapper, only),
            };

            let fetched = Self::fetch(&mut cursor, cx).await;
            let item = match fetched {
                Ok(Some(mut row)) => {
                    let m = mapper.get_or_insert_with(|| {
                        RowMapper::new(T::shape(), cursor.columns(), only.as_deref())
                    });
                    m.materialize::<T>(&mut row, self.dialect.as_ref())
                }
                Ok(None) => {
                    return match cursor.close().await {
                        Ok(()) => None,
                        Err(e) => Some((Err(e), StreamState::Done)),
                    };
                }
                Err(e) => Err(e),
            };

            if item.is_err() {
                // The item's error is reported; a close failure is only traced.
                if let Err(e) = cursor.close().await {
                    tessera_trace_close!(e);
                }
                return Some((item, StreamState::Done));
            }
            Some((
                item,
                StreamState::Open {
                    cursor,
                    mapper,
                    only,
                },
            ))
        })
    }
}

enum StreamState<Cur> {
    Pending {
        stmt: Statement,
        only: Option<Vec<String>>,
    },
    Open {
        cursor: Cur,
        mapper: Option<RowMapper>,
        only: Option<Vec<String>>,
    },
    Done,
}
