//! The query model.
//!
//! [`SqlExpression<T>`] describes one logical read query rooted at entity
//! `T`. Fluent calls compile their expressions immediately, so an invalid
//! predicate fails at the call site and never reaches a connection. Compiled
//! fragments carry their bound values inline; emitting a statement renders
//! the text and collects parameters in one pass and never mutates the model.
//!
//! ```
//! use std::sync::Arc;
//! use tessera_core::expr::{col, eq, gt};
//! use tessera_core::{Dialect, OrderBy, SqlExpression};
//!
//! tessera_core::entity! {
//!     pub struct User in "users" {
//!         pub id: i64,
//!         pub name: String,
//!         pub age: i64,
//!     }
//! }
//!
//! let q = SqlExpression::<User>::new(Arc::new(Dialect::PostgreSQL))
//!     .r#where(gt(col("age"), 21))?
//!     .r#where(eq(col("name"), "ann"))?
//!     .order_by(col("id"), OrderBy::Desc)?
//!     .limit(10);
//!
//! let stmt = q.to_select_statement();
//! assert_eq!(
//!     stmt.sql(),
//!     r#"SELECT "users"."id", "users"."name", "users"."age" FROM "users" WHERE "users"."age" > $1 AND "users"."name" = $2 ORDER BY "users"."id" DESC LIMIT 10"#
//! );
//! assert_eq!(stmt.params().len(), 2);
//! # Ok::<(), tessera_core::TesseraError>(())
//! ```

use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use crate::compose::{GroupLayout, compose};
use crate::dialect::DialectProvider;
use crate::entity::{Entity, EntityShape, field_allowed};
use crate::error::{Result, TesseraError};
use crate::expr::{ColumnRef, Expr, OrderBy, Scope};
use crate::materialize::EntityTuple;
use crate::sql::{SQL, SQLChunk, Token};
use crate::statement::Statement;
use crate::value::Value;

/// Column and derived-table names used by [`SqlExpression::key_subquery`].
const KEY_COLUMN: &str = "parent_key";
const KEY_ROWS: &str = "parents";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    shape: &'static EntityShape,
    on: SQL,
}

/// Accumulated `WHERE` clause and its top-level connective.
#[derive(Debug, Clone)]
struct Filter {
    sql: SQL,
    connective: Option<Token>,
}

impl Filter {
    fn combine(self, piece: SQL, piece_connective: Option<Token>, connective: Token) -> Filter {
        let lhs = match self.connective {
            Some(c) if c != connective => self.sql.parens(),
            _ => self.sql,
        };
        let rhs = match piece_connective {
            Some(c) if c != connective => piece.parens(),
            _ => piece,
        };
        Filter {
            sql: lhs.push(connective).append(rhs),
            connective: Some(connective),
        }
    }
}

fn top_connective(expr: &Expr) -> Option<Token> {
    match expr {
        Expr::And(items) if items.len() > 1 => Some(Token::AND),
        Expr::Or(items) if items.len() > 1 => Some(Token::OR),
        _ => None,
    }
}

/// A read query rooted at entity `T`.
pub struct SqlExpression<T> {
    dialect: Arc<dyn DialectProvider>,
    /// Root table first, then joined tables in join order
    tables: Vec<&'static EntityShape>,
    joins: Vec<Join>,
    select: Option<SQL>,
    filter: Option<Filter>,
    order_by: Vec<SQL>,
    group_by: Vec<SQL>,
    limit: Option<u64>,
    offset: Option<u64>,
    only: Option<Vec<String>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SqlExpression<T> {
    fn clone(&self) -> Self {
        Self {
            dialect: Arc::clone(&self.dialect),
            tables: self.tables.clone(),
            joins: self.joins.clone(),
            select: self.select.clone(),
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            group_by: self.group_by.clone(),
            limit: self.limit,
            offset: self.offset,
            only: self.only.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SqlExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlExpression")
            .field("table", &self.tables[0].table())
            .field("dialect", &self.dialect)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("only", &self.only)
            .finish_non_exhaustive()
    }
}

impl<T: Entity> SqlExpression<T> {
    /// An unfiltered query over `T`'s table.
    pub fn new(dialect: Arc<dyn DialectProvider>) -> Self {
        Self {
            dialect,
            tables: vec![T::shape()],
            joins: Vec::new(),
            select: None,
            filter: None,
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
            only: None,
            _marker: PhantomData,
        }
    }
}

impl<T> SqlExpression<T> {
    // ==================== accessors ====================

    #[inline]
    pub fn dialect(&self) -> &Arc<dyn DialectProvider> {
        &self.dialect
    }

    /// Shape of the root table.
    #[inline]
    pub fn root(&self) -> &'static EntityShape {
        self.tables[0]
    }

    /// Root table first, then joined tables.
    #[inline]
    pub fn tables(&self) -> &[&'static EntityShape] {
        &self.tables
    }

    #[inline]
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    #[inline]
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// The field-restriction set, if any.
    #[inline]
    pub fn only_fields(&self) -> Option<&[String]> {
        self.only.as_deref()
    }

    #[inline]
    pub fn has_custom_select(&self) -> bool {
        self.select.is_some()
    }

    fn scope(&self) -> Scope<'_> {
        Scope::new(&self.tables)
    }

    // ==================== fluent builders ====================

    /// Replaces the projection with the compiled expressions.
    pub fn select(mut self, projection: impl IntoIterator<Item = Expr>) -> Result<Self> {
        let scope = self.scope();
        let items = projection
            .into_iter()
            .map(|expr| expr.compile_projection(&scope))
            .collect::<Result<Vec<_>>>()?;
        if items.is_empty() {
            return Err(TesseraError::compilation("empty projection"));
        }
        self.select = Some(SQL::join(items, Token::COMMA));
        Ok(self)
    }

    /// Replaces the projection with an already-built fragment.
    pub fn select_sql(mut self, projection: SQL) -> Self {
        self.select = Some(projection);
        self
    }

    /// ANDs `predicate` onto the filter.
    pub fn r#where(self, predicate: Expr) -> Result<Self> {
        self.push_filter(predicate, Token::AND)
    }

    /// Alias of [`r#where`](Self::r#where).
    pub fn and_where(self, predicate: Expr) -> Result<Self> {
        self.push_filter(predicate, Token::AND)
    }

    /// ORs `predicate` with the existing filter.
    pub fn or_where(self, predicate: Expr) -> Result<Self> {
        self.push_filter(predicate, Token::OR)
    }

    fn push_filter(mut self, predicate: Expr, connective: Token) -> Result<Self> {
        let sql = predicate.compile(&self.scope())?;
        let piece_connective = top_connective(&predicate);
        self.filter = Some(match self.filter.take() {
            None => Filter {
                sql,
                connective: piece_connective,
            },
            Some(prev) => prev.combine(sql, piece_connective, connective),
        });
        Ok(self)
    }

    /// `INNER JOIN` entity `J`'s table on `on`.
    pub fn join<J: Entity>(self, on: Expr) -> Result<Self> {
        self.push_join(JoinKind::Inner, J::shape(), on)
    }

    /// `LEFT JOIN` entity `J`'s table on `on`.
    pub fn left_join<J: Entity>(self, on: Expr) -> Result<Self> {
        self.push_join(JoinKind::Left, J::shape(), on)
    }

    fn push_join(mut self, kind: JoinKind, shape: &'static EntityShape, on: Expr) -> Result<Self> {
        if self.tables.iter().any(|t| t.table() == shape.table()) {
            return Err(TesseraError::compilation(format!(
                "table `{}` is already part of this query",
                shape.table()
            )));
        }
        self.tables.push(shape);
        let on = on.compile(&self.scope())?;
        self.joins.push(Join { kind, shape, on });
        Ok(self)
    }

    pub fn order_by(mut self, expr: Expr, direction: OrderBy) -> Result<Self> {
        let sql = expr.compile(&self.scope())?.push(direction.token());
        self.order_by.push(sql);
        Ok(self)
    }

    pub fn group_by(mut self, expr: Expr) -> Result<Self> {
        let sql = expr.compile(&self.scope())?;
        self.group_by.push(sql);
        Ok(self)
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Restricts projection and materialization to the named fields.
    pub fn only<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.only = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    // ==================== emitters ====================

    /// Bound parameters of the select statement, in placeholder order.
    pub fn params(&self) -> Vec<Value> {
        self.to_select_statement().into_parts().1
    }

    /// The full select statement.
    pub fn to_select_statement(&self) -> Statement {
        let projection = self.select.clone().unwrap_or_else(|| self.default_projection());
        self.select_with(projection).build(self.dialect.as_ref())
    }

    /// `SELECT COUNT(*)` over the same tables, filter and grouping.
    ///
    /// Ordering and paging are dropped. With a `GROUP BY` the statement
    /// returns one count per group.
    pub fn to_count_statement(&self) -> Statement {
        let mut sql = SQL::token(Token::SELECT)
            .append(SQL::func("COUNT", SQL::token(Token::STAR)))
            .append(self.from_clause());
        self.push_filter_and_grouping(&mut sql);
        sql.build(self.dialect.as_ref())
    }

    /// The select statement wrapped as a counting subquery.
    pub fn to_row_count_statement(&self) -> Statement {
        self.to_select_statement()
            .into_row_count(self.dialect.as_ref())
    }

    /// Select statement projecting exactly the fields of `R` that resolve
    /// against this query's tables, narrowed by the restriction set.
    ///
    /// A custom projection set through [`select`](Self::select) wins.
    pub fn select_into<R: Entity>(&self) -> Result<Statement> {
        let projection = match &self.select {
            Some(custom) => custom.clone(),
            None => self.projection_for(R::shape())?,
        };
        Ok(self.select_with(projection).build(self.dialect.as_ref()))
    }

    /// Multi-entity select statement and its column layout.
    ///
    /// Every shape must be the root table or a joined table.
    pub fn to_multi_select_statement(
        &self,
        shapes: &[&'static EntityShape],
    ) -> Result<(Statement, GroupLayout)> {
        for shape in shapes {
            if !self.tables.iter().any(|t| t.table() == shape.table()) {
                return Err(TesseraError::compilation(format!(
                    "table `{}` is not part of this query; join it first",
                    shape.table()
                )));
            }
        }
        let multi = compose(shapes, self.only_fields())?;
        let stmt = self.select_with(multi.projection).build(self.dialect.as_ref());
        Ok((stmt, multi.layout))
    }

    /// [`to_multi_select_statement`](Self::to_multi_select_statement) for a
    /// typed tuple.
    pub fn to_multi_select_for<Tup: EntityTuple>(&self) -> Result<(Statement, GroupLayout)> {
        self.to_multi_select_statement(&Tup::shapes())
    }

    /// `SELECT "parents"."parent_key" FROM (SELECT <key> AS "parent_key" ..) AS "parents"`
    ///
    /// Keeps this query's tables, filter, grouping, ordering and paging, so
    /// it yields the key of every row the select statement returns. The
    /// derived table is accepted inside `IN (..)` even where `LIMIT` is not.
    pub fn key_subquery(&self, key: &'static str) -> Result<SQL> {
        let (table, column) = self.scope().resolve(&ColumnRef {
            table: None,
            name: key.into(),
        })?;
        let inner = self.select_with(SQL::qualified(table, column).alias(KEY_COLUMN));
        Ok(SQL::token(Token::SELECT)
            .append(SQL::qualified(KEY_ROWS, KEY_COLUMN))
            .push(Token::FROM)
            .append(inner.parens())
            .alias(KEY_ROWS))
    }

    // ==================== rendering ====================

    fn default_projection(&self) -> SQL {
        let root = self.root();
        let columns: Vec<SQL> = root
            .fields()
            .iter()
            .filter(|field| field_allowed(self.only_fields(), field))
            .map(|field| SQL::qualified(root.table(), field.column))
            .collect();
        if columns.is_empty() {
            SQL::token(Token::STAR)
        } else {
            SQL::join(columns, Token::COMMA)
        }
    }

    fn projection_for(&self, target: &'static EntityShape) -> Result<SQL> {
        let scope = self.scope();
        let mut columns = Vec::with_capacity(target.len());
        for field in target.fields() {
            if !field_allowed(self.only_fields(), field) {
                continue;
            }
            let by_column = ColumnRef {
                table: None,
                name: field.column.into(),
            };
            let by_name = ColumnRef {
                table: None,
                name: field.name.into(),
            };
            let Ok((table, column)) = scope.resolve(&by_column).or_else(|_| scope.resolve(&by_name))
            else {
                continue;
            };
            let sql = SQL::qualified(table, column);
            columns.push(if column.eq_ignore_ascii_case(field.column) {
                sql
            } else {
                sql.alias(field.column)
            });
        }
        if columns.is_empty() {
            return Err(TesseraError::compilation(format!(
                "no field of `{}` resolves against this query",
                target.table()
            )));
        }
        Ok(SQL::join(columns, Token::COMMA))
    }

    fn from_clause(&self) -> SQL {
        let mut sql = SQL::token(Token::FROM).append(SQL::ident(self.root().table()));
        for join in &self.joins {
            if join.kind == JoinKind::Left {
                sql.push_mut(Token::LEFT);
            } else {
                sql.push_mut(Token::INNER);
            }
            sql.push_mut(Token::JOIN);
            sql.push_mut(SQLChunk::Ident(join.shape.table().into()));
            sql.push_mut(Token::ON);
            sql.append_mut(join.on.clone());
        }
        sql
    }

    fn push_filter_and_grouping(&self, sql: &mut SQL) {
        if let Some(filter) = &self.filter {
            sql.push_mut(Token::WHERE);
            sql.append_mut(filter.sql.clone());
        }
        if !self.group_by.is_empty() {
            sql.push_mut(Token::GROUP);
            sql.push_mut(Token::BY);
            sql.append_mut(SQL::join(self.group_by.iter().cloned(), Token::COMMA));
        }
    }

    fn select_with(&self, projection: SQL) -> SQL {
        let mut sql = SQL::token(Token::SELECT)
            .append(projection)
            .append(self.from_clause());
        self.push_filter_and_grouping(&mut sql);
        if !self.order_by.is_empty() {
            sql.push_mut(Token::ORDER);
            sql.push_mut(Token::BY);
            sql.append_mut(SQL::join(self.order_by.iter().cloned(), Token::COMMA));
        }
        if let Some(paging) = self.dialect.paging_clause(self.limit, self.offset) {
            sql.push_mut(SQLChunk::Raw(paging.into()));
        }
        sql
    }
}
