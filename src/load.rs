//! Reference loading.
//!
//! After the parent rows are read, every included relation costs exactly one
//! more round trip: `SELECT .. FROM child WHERE child.key IN (SELECT ..)`,
//! where the subquery re-selects the parent keys with the parent query's own
//! filter and parameters. No parent key is bound individually, so the size
//! of the parent set never runs into a driver's parameter limit. Children
//! are merged onto their parents by key afterwards.
//!
//! ```
//! use tessera::load::{HasMany, HasRelations, Relation};
//!
//! tessera::entity! {
//!     #[derive(Debug, Clone)]
//!     pub struct Order in "orders" {
//!         pub id: i64,
//!         pub customer_id: i64,
//!     }
//! }
//!
//! tessera::entity! {
//!     #[derive(Debug, Clone)]
//!     pub struct Customer in "customers" {
//!         pub id: i64,
//!         pub name: String,
//!     }
//!     with {
//!         pub orders: Vec<Order>,
//!     }
//! }
//!
//! static ORDERS: HasMany<Customer, Order> =
//!     HasMany::new("orders", "id", "customer_id", |c: &mut Customer, orders| {
//!         c.orders = orders
//!     });
//!
//! impl HasRelations for Customer {
//!     fn relations() -> &'static [&'static dyn Relation<Self>] {
//!         static ALL: [&dyn Relation<Customer>; 1] = [&ORDERS];
//!         &ALL
//!     }
//! }
//! ```

use std::sync::Arc;

use hashbrown::HashMap;
use tessera_core::expr::Expr;
use tessera_core::{
    Connection, DialectProvider, Entity, EntityShape, Result, Row, RowMapper, SQL, SqlExpression,
    Statement, TesseraError, Token, Value,
};
use tokio_util::sync::CancellationToken;

use crate::db::Db;

/// One named relation of parent entity `P`.
pub trait Relation<P>: Send + Sync {
    /// Name used in include lists.
    fn name(&self) -> &'static str;

    fn child_shape(&self) -> &'static EntityShape;

    /// Field of `P` whose values are looked up.
    fn parent_key(&self) -> &'static str;

    /// Field of the child matched against the parent key.
    fn child_key(&self) -> &'static str;

    /// Materializes `rows` and assigns the children to their parents.
    fn attach(
        &self,
        parents: &mut [P],
        columns: &[String],
        rows: Vec<Row>,
        dialect: &dyn DialectProvider,
    ) -> Result<()>;
}

/// An entity with declared relations.
pub trait HasRelations: Entity {
    fn relations() -> &'static [&'static dyn Relation<Self>];
}

/// Parent owns any number of children.
pub struct HasMany<P, C> {
    name: &'static str,
    parent_key: &'static str,
    child_key: &'static str,
    assign: fn(&mut P, Vec<C>),
}

impl<P, C> HasMany<P, C> {
    pub const fn new(
        name: &'static str,
        parent_key: &'static str,
        child_key: &'static str,
        assign: fn(&mut P, Vec<C>),
    ) -> Self {
        Self {
            name,
            parent_key,
            child_key,
            assign,
        }
    }
}

/// Parent refers to at most one child. Covers both foreign-key directions:
/// the key pair decides which side holds the reference.
pub struct HasOne<P, C> {
    name: &'static str,
    parent_key: &'static str,
    child_key: &'static str,
    assign: fn(&mut P, Option<C>),
}

impl<P, C> HasOne<P, C> {
    pub const fn new(
        name: &'static str,
        parent_key: &'static str,
        child_key: &'static str,
        assign: fn(&mut P, Option<C>),
    ) -> Self {
        Self {
            name,
            parent_key,
            child_key,
            assign,
        }
    }
}

/// Materializes child rows grouped by their key value, in row order.
fn group_children<C: Entity>(
    child_key: &'static str,
    columns: &[String],
    rows: Vec<Row>,
    dialect: &dyn DialectProvider,
) -> Result<HashMap<Value, Vec<C>>> {
    let key_idx = field_index(C::shape(), child_key)?;
    let mapper = RowMapper::new(C::shape(), columns, None);
    let mut grouped: HashMap<Value, Vec<C>> = HashMap::new();
    for mut row in rows {
        let child: C = mapper.materialize(&mut row, dialect)?;
        let key = child.get(key_idx);
        grouped.entry(key).or_default().push(child);
    }
    Ok(grouped)
}

impl<P: Entity, C: Entity + Clone> Relation<P> for HasMany<P, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn child_shape(&self) -> &'static EntityShape {
        C::shape()
    }

    fn parent_key(&self) -> &'static str {
        self.parent_key
    }

    fn child_key(&self) -> &'static str {
        self.child_key
    }

    fn attach(
        &self,
        parents: &mut [P],
        columns: &[String],
        rows: Vec<Row>,
        dialect: &dyn DialectProvider,
    ) -> Result<()> {
        let grouped = group_children::<C>(self.child_key, columns, rows, dialect)?;
        let parent_idx = field_index(P::shape(), self.parent_key)?;
        for parent in parents.iter_mut() {
            let children = grouped
                .get(&parent.get(parent_idx))
                .cloned()
                .unwrap_or_default();
            (self.assign)(parent, children);
        }
        Ok(())
    }
}

impl<P: Entity, C: Entity + Clone> Relation<P> for HasOne<P, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn child_shape(&self) -> &'static EntityShape {
        C::shape()
    }

    fn parent_key(&self) -> &'static str {
        self.parent_key
    }

    fn child_key(&self) -> &'static str {
        self.child_key
    }

    fn attach(
        &self,
        parents: &mut [P],
        columns: &[String],
        rows: Vec<Row>,
        dialect: &dyn DialectProvider,
    ) -> Result<()> {
        let grouped = group_children::<C>(self.child_key, columns, rows, dialect)?;
        let parent_idx = field_index(P::shape(), self.parent_key)?;
        for parent in parents.iter_mut() {
            let child = grouped
                .get(&parent.get(parent_idx))
                .and_then(|children| children.first())
                .cloned();
            (self.assign)(parent, child);
        }
        Ok(())
    }
}

fn field_index(shape: &EntityShape, name: &str) -> Result<usize> {
    shape.find(name).ok_or_else(|| {
        TesseraError::compilation(format!(
            "unknown field `{name}` on `{}`",
            shape.table()
        ))
    })
}

/// Picks the relations named in `include`, all of them when it is empty.
///
/// Unknown names and unresolvable keys fail here, before any I/O.
pub fn resolve_relations<P: HasRelations>(
    include: &[&str],
) -> Result<Vec<&'static dyn Relation<P>>> {
    let declared = P::relations();
    let selected: Vec<&'static dyn Relation<P>> = if include.is_empty() {
        declared.to_vec()
    } else {
        include
            .iter()
            .map(|name| {
                declared
                    .iter()
                    .copied()
                    .find(|r| r.name().eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        TesseraError::compilation(format!(
                            "`{}` has no relation named `{name}`",
                            P::shape().table()
                        ))
                    })
            })
            .collect::<Result<_>>()?
    };

    for relation in &selected {
        field_index(P::shape(), relation.parent_key())?;
        field_index(relation.child_shape(), relation.child_key())?;
    }
    Ok(selected)
}

/// `SELECT <child columns> FROM child WHERE child.key IN (<parent keys>)`
fn child_statement(
    shape: &'static EntityShape,
    child_key: &'static str,
    parent_keys: SQL,
    dialect: &dyn DialectProvider,
) -> Result<Statement> {
    let key = shape.field(field_index(shape, child_key)?).column;
    let columns = shape
        .fields()
        .iter()
        .map(|field| SQL::qualified(shape.table(), field.column));

    Ok(SQL::token(Token::SELECT)
        .append(SQL::join(columns, Token::COMMA))
        .push(Token::FROM)
        .append(SQL::ident(shape.table()))
        .push(Token::WHERE)
        .append(SQL::qualified(shape.table(), key))
        .push(Token::IN)
        .append(parent_keys.parens())
        .build(dialect))
}

impl<C: Connection> Db<C> {
    /// Loads `relations` onto `parents`, one query per relation.
    ///
    /// `parents` must be the rows `query` selected; the child queries
    /// re-select their keys through it.
    pub async fn load_references<P: Entity, T>(
        &self,
        parents: &mut [P],
        query: &SqlExpression<T>,
        relations: &[&'static dyn Relation<P>],
        cx: &CancellationToken,
    ) -> Result<()> {
        if parents.is_empty() {
            return Ok(());
        }

        for relation in relations {
            if cx.is_cancelled() {
                tessera_trace_cancel!("load");
                return Err(TesseraError::Cancelled);
            }

            let parent_idx = field_index(P::shape(), relation.parent_key())?;
            if parents.iter().all(|p| p.get(parent_idx).is_null()) {
                continue;
            }

            let field = P::shape().field(parent_idx);
            let parent_keys = query
                .key_subquery(field.column)
                .or_else(|_| query.key_subquery(field.name))?;
            tessera_trace_relation!(relation.name(), parents.len());
            let stmt = child_statement(
                relation.child_shape(),
                relation.child_key(),
                parent_keys,
                self.dialect().as_ref(),
            )?;

            let mut columns: Option<Arc<[String]>> = None;
            let mut rows = Vec::new();
            self.drain(&stmt, cx, None, |cols, row| {
                if columns.is_none() {
                    columns = Some(Arc::clone(cols));
                }
                rows.push(row);
                Ok(())
            })
            .await?;

            let columns = columns.unwrap_or_else(|| Arc::from(Vec::new()));
            relation.attach(parents, &columns, rows, self.dialect().as_ref())?;
        }
        Ok(())
    }

    /// Selects `query` and loads the included relations onto the results.
    ///
    /// An empty `include` loads every declared relation.
    pub async fn load_select<T: HasRelations>(
        &self,
        query: &SqlExpression<T>,
        include: &[&str],
        cx: &CancellationToken,
    ) -> Result<Vec<T>> {
        let relations = resolve_relations::<T>(include)?;
        let mut parents = self.select(query, cx).await?;
        self.load_references(&mut parents, query, &relations, cx).await?;
        Ok(parents)
    }

    /// [`load_select`](Self::load_select) projected onto `R`.
    pub async fn load_select_into<R: HasRelations, T>(
        &self,
        query: &SqlExpression<T>,
        include: &[&str],
        cx: &CancellationToken,
    ) -> Result<Vec<R>> {
        let relations = resolve_relations::<R>(include)?;
        let mut parents = self.select_into::<R, T>(query, cx).await?;
        self.load_references(&mut parents, query, &relations, cx).await?;
        Ok(parents)
    }

    /// [`load_select`](Self::load_select) over the `T` rows matching
    /// `predicate`.
    pub async fn load_select_where<T: HasRelations>(
        &self,
        predicate: Expr,
        include: &[&str],
        cx: &CancellationToken,
    ) -> Result<Vec<T>> {
        let query = self.from::<T>().r#where(predicate)?;
        self.load_select(&query, include, cx).await
    }
}
