use core::fmt;

use crate::dialect::DialectProvider;
use crate::value::Value;

/// A compiled statement: SQL text and the values for its placeholders.
///
/// The `n`-th placeholder in `sql` corresponds to `params[n]`. Statements
/// are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[inline]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    /// Wraps this statement as `SELECT COUNT(*) FROM (<sql>) AS "count"`.
    ///
    /// Parameters are carried over unchanged; the wrapper adds none.
    pub fn into_row_count(self, dialect: &dyn DialectProvider) -> Statement {
        let sql = format!(
            "SELECT COUNT(*) FROM ({}) AS {}",
            self.sql,
            dialect.quote("count")
        );
        Statement {
            sql,
            params: self.params,
        }
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql, Vec::new())
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql, Vec::new())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"sql: "{}", params: {:?}"#, self.sql, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn row_count_wraps_raw_sql() {
        let stmt = Statement::from("SELECT * FROM t WHERE x=1").into_row_count(&Dialect::SQLite);
        assert_eq!(
            stmt.sql(),
            r#"SELECT COUNT(*) FROM (SELECT * FROM t WHERE x=1) AS "count""#
        );
        assert!(stmt.params().is_empty());
    }
}
