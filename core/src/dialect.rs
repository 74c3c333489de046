//! Dialect contract consumed by the compiler, composer and materializer.
//!
//! Everything dialect-specific (identifier quoting, placeholder syntax,
//! paging syntax, scalar normalization) is routed through
//! [`DialectProvider`]. [`Dialect`] provides the stock PostgreSQL, SQLite and
//! MySQL renderings.

use std::borrow::Cow;
use std::fmt::{self, Write};

use crate::value::{SqlType, Value, ValueError};

/// Database-specific syntax rules.
pub trait DialectProvider: fmt::Debug + Send + Sync {
    /// Writes `ident` as a quoted identifier.
    fn write_quoted(&self, buf: &mut String, ident: &str);

    /// Renders the placeholder for the given 1-based parameter index.
    fn placeholder(&self, index: usize) -> Cow<'static, str>;

    /// Renders a paging clause, or `None` when neither bound is set.
    fn paging_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String>;

    /// Normalizes a cell returned by the driver into the storage class of
    /// `target` before it reaches a typed field.
    fn convert_scalar(&self, value: Value, target: SqlType) -> Result<Value, ValueError> {
        value.coerce(target)
    }

    /// Quotes an identifier into a fresh string.
    fn quote(&self, ident: &str) -> String {
        let mut buf = String::with_capacity(ident.len() + 2);
        self.write_quoted(&mut buf, ident);
        buf
    }
}

/// SQL dialect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "postgres", alias = "pg"))]
    PostgreSQL,
    SQLite,
    MySQL,
}

impl Dialect {
    const fn quote_char(self) -> char {
        match self {
            Dialect::PostgreSQL | Dialect::SQLite => '"',
            Dialect::MySQL => '`',
        }
    }
}

impl DialectProvider for Dialect {
    fn write_quoted(&self, buf: &mut String, ident: &str) {
        let q = self.quote_char();
        buf.push(q);
        for c in ident.chars() {
            if c == q {
                buf.push(q);
            }
            buf.push(c);
        }
        buf.push(q);
    }

    /// - PostgreSQL: `$1`, `$2`, `$3`
    /// - SQLite/MySQL: `?`
    #[inline]
    fn placeholder(&self, index: usize) -> Cow<'static, str> {
        match self {
            Dialect::PostgreSQL => Cow::Owned(format!("${index}")),
            Dialect::SQLite | Dialect::MySQL => Cow::Borrowed("?"),
        }
    }

    fn paging_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        let mut buf = String::new();
        match (self, limit, offset) {
            (_, None, None) => return None,
            (Dialect::MySQL, Some(limit), Some(offset)) => {
                let _ = write!(buf, "LIMIT {offset}, {limit}");
            }
            // MySQL and SQLite cannot express OFFSET without LIMIT
            (Dialect::MySQL, None, Some(offset)) => {
                let _ = write!(buf, "LIMIT {offset}, {}", u64::MAX);
            }
            (Dialect::SQLite, None, Some(offset)) => {
                let _ = write!(buf, "LIMIT -1 OFFSET {offset}");
            }
            (Dialect::PostgreSQL, None, Some(offset)) => {
                let _ = write!(buf, "OFFSET {offset}");
            }
            (_, Some(limit), None) => {
                let _ = write!(buf, "LIMIT {limit}");
            }
            (_, Some(limit), Some(offset)) => {
                let _ = write!(buf, "LIMIT {limit} OFFSET {offset}");
            }
        }
        Some(buf)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::PostgreSQL => "postgresql",
            Dialect::SQLite => "sqlite",
            Dialect::MySQL => "mysql",
        })
    }
}
