use crate::entity::EntityShape;
use crate::error::{Result, TesseraError};
use crate::sql::{SQL, SQLChunk, Token};
use crate::value::Value;

use super::{BinaryOp, ColumnRef, Expr};

/// Functions an expression may call, with their accepted argument counts.
const FUNCTIONS: &[(&str, usize, usize)] = &[
    ("COUNT", 1, 1),
    ("SUM", 1, 1),
    ("AVG", 1, 1),
    ("MIN", 1, 1),
    ("MAX", 1, 1),
    ("LOWER", 1, 1),
    ("UPPER", 1, 1),
    ("LENGTH", 1, 1),
    ("ABS", 1, 1),
    ("COALESCE", 1, usize::MAX),
];

/// The tables an expression may reference: the root table first, then the
/// joined ones in join order.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    tables: &'a [&'static EntityShape],
}

impl<'a> Scope<'a> {
    pub fn new(tables: &'a [&'static EntityShape]) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &'a [&'static EntityShape] {
        self.tables
    }

    /// Resolves a column reference to `(table, column)`.
    ///
    /// Unqualified names are looked up in the root table first.
    pub fn resolve(&self, column: &ColumnRef) -> Result<(&'static str, &'static str)> {
        let candidates = self
            .tables
            .iter()
            .filter(|shape| column.table.is_none_or(|t| t == shape.table()));

        let mut any_table = false;
        for shape in candidates {
            any_table = true;
            if let Some(idx) = shape.find(&column.name) {
                return Ok((shape.table(), shape.field(idx).column));
            }
        }

        match column.table {
            Some(table) if !any_table => Err(TesseraError::compilation(format!(
                "table `{table}` is not part of this query"
            ))),
            Some(table) => Err(TesseraError::compilation(format!(
                "unknown column `{}` on `{table}`",
                column.name
            ))),
            None => Err(TesseraError::compilation(format!(
                "unknown column `{}`",
                column.name
            ))),
        }
    }
}

impl Expr {
    /// Compiles a predicate or scalar expression.
    pub fn compile(&self, scope: &Scope<'_>) -> Result<SQL> {
        self.to_sql(scope, false)
    }

    /// Compiles one projection item; `alias(..)` is allowed at the top.
    pub fn compile_projection(&self, scope: &Scope<'_>) -> Result<SQL> {
        self.to_sql(scope, true)
    }

    fn to_sql(&self, scope: &Scope<'_>, top_level_alias: bool) -> Result<SQL> {
        match self {
            Expr::Column(column) => {
                let (table, name) = scope.resolve(column)?;
                Ok(SQL::qualified(table, name))
            }
            Expr::Value(value) => Ok(SQL::param(value.clone())),
            Expr::Binary { op, lhs, rhs } => compile_binary(*op, lhs, rhs, scope),
            Expr::And(items) => compile_group(items, Token::AND, scope),
            Expr::Or(items) => compile_group(items, Token::OR, scope),
            Expr::Not(inner) => Ok(SQL::token(Token::NOT).append(inner.operand(scope)?)),
            Expr::IsNull(inner) => Ok(inner
                .operand(scope)?
                .push(Token::IS)
                .push(Token::NULL)),
            Expr::IsNotNull(inner) => Ok(inner
                .operand(scope)?
                .push(Token::IS)
                .push(Token::NOT)
                .push(Token::NULL)),
            Expr::In {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    // Nothing is IN an empty set.
                    let rhs = if *negated { 1 } else { 0 };
                    return Ok(SQL::from_iter([
                        SQLChunk::Number(1),
                        SQLChunk::Token(Token::EQ),
                        SQLChunk::Number(rhs),
                    ]));
                }
                let mut sql = expr.operand(scope)?;
                if *negated {
                    sql.push_mut(Token::NOT);
                }
                sql.push_mut(Token::IN);
                let items = list
                    .iter()
                    .map(|item| item.to_sql(scope, false))
                    .collect::<Result<Vec<_>>>()?;
                Ok(sql.append(SQL::join(items, Token::COMMA).parens()))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let mut sql = expr.operand(scope)?;
                if *negated {
                    sql.push_mut(Token::NOT);
                }
                Ok(sql.push(Token::LIKE).append(pattern.operand(scope)?))
            }
            Expr::Func { name, args } => {
                let upper = name.to_ascii_uppercase();
                let Some(&(canonical, min, max)) =
                    FUNCTIONS.iter().find(|(f, _, _)| *f == upper)
                else {
                    return Err(TesseraError::compilation(format!(
                        "unsupported function `{name}`"
                    )));
                };
                if args.len() < min || args.len() > max {
                    return Err(TesseraError::compilation(format!(
                        "function `{canonical}` called with {} arguments",
                        args.len()
                    )));
                }
                let args = args
                    .iter()
                    .map(|arg| arg.to_sql(scope, false))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SQL::func(canonical, SQL::join(args, Token::COMMA)))
            }
            Expr::CountStar => Ok(SQL::func("COUNT", SQL::token(Token::STAR))),
            Expr::Alias(inner, name) => {
                if !top_level_alias {
                    return Err(TesseraError::compilation(format!(
                        "alias `{name}` is only allowed in a projection"
                    )));
                }
                Ok(inner.to_sql(scope, false)?.alias(name.clone()))
            }
        }
    }

    /// Compiles `self` as an operand of a larger expression, parenthesized
    /// when it is compound.
    fn operand(&self, scope: &Scope<'_>) -> Result<SQL> {
        let sql = self.to_sql(scope, false)?;
        Ok(if self.is_compound() { sql.parens() } else { sql })
    }

    fn is_compound(&self) -> bool {
        matches!(
            self,
            Expr::Binary { .. }
                | Expr::And(_)
                | Expr::Or(_)
                | Expr::Not(_)
                | Expr::IsNull(_)
                | Expr::IsNotNull(_)
                | Expr::In { .. }
                | Expr::Like { .. }
        )
    }
}

fn compile_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: &Scope<'_>) -> Result<SQL> {
    let null_test = match op {
        BinaryOp::Eq => Some(false),
        BinaryOp::Ne => Some(true),
        _ => None,
    };
    if let Some(negated) = null_test {
        let other = match (lhs, rhs) {
            (other, Expr::Value(Value::Null)) | (Expr::Value(Value::Null), other) => Some(other),
            _ => None,
        };
        if let Some(other) = other {
            let sql = other.operand(scope)?.push(Token::IS);
            let sql = if negated { sql.push(Token::NOT) } else { sql };
            return Ok(sql.push(Token::NULL));
        }
    }

    Ok(lhs
        .operand(scope)?
        .push(op.token())
        .append(rhs.operand(scope)?))
}

fn compile_group(items: &[Expr], separator: Token, scope: &Scope<'_>) -> Result<SQL> {
    if items.is_empty() {
        return Err(TesseraError::compilation(format!(
            "empty {separator} group"
        )));
    }
    let parts = items
        .iter()
        .map(|item| match item {
            Expr::And(_) | Expr::Or(_) => Ok(item.to_sql(scope, false)?.parens()),
            _ => item.to_sql(scope, false),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SQL::join(parts, separator))
}
