//! Query expressions.
//!
//! An [`Expr`] is an untyped tree built with the free functions in this
//! module and compiled to a [`SQL`](crate::SQL) fragment against the tables
//! of a query (see [`compile`]). Literal values only ever become bound
//! parameters.
//!
//! ```
//! use tessera_core::expr::{and, col, eq, gt, is_null};
//!
//! let filter = and([eq(col("name"), "alice"), gt(col("age"), 30)]);
//! let either = eq(col("id"), 1) | is_null(col("email"));
//! # let _ = (filter, either);
//! ```

mod compile;

pub use compile::Scope;

use core::ops::{BitAnd, BitOr, Not};
use std::borrow::Cow;

use crate::entity::Entity;
use crate::sql::Token;
use crate::value::Value;

/// Reference to a column by field or column name, optionally pinned to a
/// table of the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<&'static str>,
    pub name: Cow<'static, str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub const fn token(self) -> Token {
        match self {
            BinaryOp::Eq => Token::EQ,
            BinaryOp::Ne => Token::NE,
            BinaryOp::Lt => Token::LT,
            BinaryOp::Le => Token::LE,
            BinaryOp::Gt => Token::GT,
            BinaryOp::Ge => Token::GE,
            BinaryOp::Add => Token::PLUS,
            BinaryOp::Sub => Token::MINUS,
            BinaryOp::Mul => Token::MUL,
            BinaryOp::Div => Token::DIV,
        }
    }
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    pub const fn token(self) -> Token {
        match self {
            OrderBy::Asc => Token::ASC,
            OrderBy::Desc => Token::DESC,
        }
    }
}

/// An uncompiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Value(Value),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    /// Function call, checked against the supported function list at
    /// compile time.
    Func {
        name: Cow<'static, str>,
        args: Vec<Expr>,
    },
    /// `COUNT(*)`
    CountStar,
    /// `expr AS "name"`, only valid in a projection.
    Alias(Box<Expr>, Cow<'static, str>),
}

/// Conversion into an expression operand.
///
/// Rust values become bound literals; [`Expr`] and [`ColumnRef`] pass
/// through.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    #[inline]
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for ColumnRef {
    #[inline]
    fn into_expr(self) -> Expr {
        Expr::Column(self)
    }
}

impl IntoExpr for Value {
    #[inline]
    fn into_expr(self) -> Expr {
        Expr::Value(self)
    }
}

macro_rules! impl_into_expr_literal {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl IntoExpr for $ty {
                #[inline]
                fn into_expr(self) -> Expr {
                    Expr::Value(Value::from(self))
                }
            }
        )+
    };
}

impl_into_expr_literal!(
    bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, String, &str, Vec<u8>, &[u8]
);

impl<T: Into<Value>> IntoExpr for Option<T> {
    #[inline]
    fn into_expr(self) -> Expr {
        Expr::Value(self.map_or(Value::Null, Into::into))
    }
}

// =============================================================================
// Columns and literals
// =============================================================================

/// A column of the query, resolved by field or column name.
pub fn col(name: impl Into<Cow<'static, str>>) -> Expr {
    Expr::Column(ColumnRef {
        table: None,
        name: name.into(),
    })
}

/// A column of entity `E`'s table. Use when joined tables share names.
pub fn col_of<E: Entity>(name: impl Into<Cow<'static, str>>) -> Expr {
    Expr::Column(ColumnRef {
        table: Some(E::shape().table()),
        name: name.into(),
    })
}

/// A bound literal.
pub fn val(value: impl Into<Value>) -> Expr {
    Expr::Value(value.into())
}

// =============================================================================
// Comparisons
// =============================================================================

fn binary(op: BinaryOp, lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs.into_expr()),
        rhs: Box::new(rhs.into_expr()),
    }
}

/// `lhs = rhs`; comparing with `NULL` compiles to `IS NULL`.
pub fn eq(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Eq, lhs, rhs)
}

/// `lhs <> rhs`; comparing with `NULL` compiles to `IS NOT NULL`.
pub fn ne(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Ne, lhs, rhs)
}

pub fn lt(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Lt, lhs, rhs)
}

pub fn lte(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Le, lhs, rhs)
}

pub fn gt(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Gt, lhs, rhs)
}

pub fn gte(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Ge, lhs, rhs)
}

pub fn add(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Add, lhs, rhs)
}

pub fn sub(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Sub, lhs, rhs)
}

pub fn mul(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Mul, lhs, rhs)
}

pub fn div(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    binary(BinaryOp::Div, lhs, rhs)
}

pub fn like(expr: impl IntoExpr, pattern: impl IntoExpr) -> Expr {
    Expr::Like {
        expr: Box::new(expr.into_expr()),
        pattern: Box::new(pattern.into_expr()),
        negated: false,
    }
}

pub fn not_like(expr: impl IntoExpr, pattern: impl IntoExpr) -> Expr {
    Expr::Like {
        expr: Box::new(expr.into_expr()),
        pattern: Box::new(pattern.into_expr()),
        negated: true,
    }
}

/// `expr IN (...)`. An empty list compiles to a predicate that matches
/// nothing.
pub fn in_list<I>(expr: impl IntoExpr, values: I) -> Expr
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    Expr::In {
        expr: Box::new(expr.into_expr()),
        list: values.into_iter().map(IntoExpr::into_expr).collect(),
        negated: false,
    }
}

/// `expr NOT IN (...)`. An empty list compiles to a predicate that matches
/// everything.
pub fn not_in_list<I>(expr: impl IntoExpr, values: I) -> Expr
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    Expr::In {
        expr: Box::new(expr.into_expr()),
        list: values.into_iter().map(IntoExpr::into_expr).collect(),
        negated: true,
    }
}

pub fn is_null(expr: impl IntoExpr) -> Expr {
    Expr::IsNull(Box::new(expr.into_expr()))
}

pub fn is_not_null(expr: impl IntoExpr) -> Expr {
    Expr::IsNotNull(Box::new(expr.into_expr()))
}

// =============================================================================
// Boolean combinators
// =============================================================================

/// Conjunction of all conditions. An empty list fails to compile.
pub fn and(conditions: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::And(conditions.into_iter().collect())
}

/// Disjunction of all conditions. An empty list fails to compile.
pub fn or(conditions: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Or(conditions.into_iter().collect())
}

pub fn not(condition: Expr) -> Expr {
    Expr::Not(Box::new(condition))
}

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        match self {
            Expr::And(mut items) => {
                items.push(rhs);
                Expr::And(items)
            }
            lhs => Expr::And(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        match self {
            Expr::Or(mut items) => {
                items.push(rhs);
                Expr::Or(items)
            }
            lhs => Expr::Or(vec![lhs, rhs]),
        }
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        not(self)
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Generic function call. Unsupported names fail to compile.
pub fn func(name: impl Into<Cow<'static, str>>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Func {
        name: name.into(),
        args: args.into_iter().collect(),
    }
}

/// `COUNT(*)`
pub fn count_star() -> Expr {
    Expr::CountStar
}

pub fn count(expr: impl IntoExpr) -> Expr {
    func("COUNT", [expr.into_expr()])
}

pub fn sum(expr: impl IntoExpr) -> Expr {
    func("SUM", [expr.into_expr()])
}

pub fn avg(expr: impl IntoExpr) -> Expr {
    func("AVG", [expr.into_expr()])
}

pub fn min(expr: impl IntoExpr) -> Expr {
    func("MIN", [expr.into_expr()])
}

pub fn max(expr: impl IntoExpr) -> Expr {
    func("MAX", [expr.into_expr()])
}

pub fn lower(expr: impl IntoExpr) -> Expr {
    func("LOWER", [expr.into_expr()])
}

pub fn upper(expr: impl IntoExpr) -> Expr {
    func("UPPER", [expr.into_expr()])
}

pub fn length(expr: impl IntoExpr) -> Expr {
    func("LENGTH", [expr.into_expr()])
}

pub fn abs(expr: impl IntoExpr) -> Expr {
    func("ABS", [expr.into_expr()])
}

pub fn coalesce(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    func("COALESCE", exprs)
}

/// `expr AS "name"` for projections.
pub fn alias(expr: impl IntoExpr, name: impl Into<Cow<'static, str>>) -> Expr {
    Expr::Alias(Box::new(expr.into_expr()), name.into())
}
