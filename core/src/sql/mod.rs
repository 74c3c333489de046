mod chunk;
mod tokens;

pub use chunk::*;
pub use tokens::*;

use std::borrow::Cow;

use smallvec::SmallVec;

use crate::dialect::DialectProvider;
use crate::statement::Statement;
use crate::value::Value;

/// SQL fragment builder with flat chunk storage.
///
/// Bound values live inside the chunk list next to the text they belong to,
/// so rendering writes each placeholder and collects its value in the same
/// pass. Placeholder order and parameter order cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SQL {
    pub chunks: SmallVec<[SQLChunk; 8]>,
}

impl SQL {
    // ==================== constructors ====================

    /// Creates an empty SQL fragment
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates SQL with a single token
    #[inline]
    pub fn token(t: Token) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Token(t)],
        }
    }

    /// Creates SQL with a quoted identifier
    #[inline]
    pub fn ident(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Ident(name.into())],
        }
    }

    /// Creates SQL with raw text (unquoted)
    #[inline]
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Raw(text.into())],
        }
    }

    /// Creates SQL with a single bound parameter
    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Param(value.into())],
        }
    }

    /// Creates `"table"."column"`
    pub fn qualified(
        table: impl Into<Cow<'static, str>>,
        column: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            chunks: smallvec::smallvec![
                SQLChunk::Ident(table.into()),
                SQLChunk::Token(Token::DOT),
                SQLChunk::Ident(column.into()),
            ],
        }
    }

    /// Creates SQL for a function call: NAME(args)
    #[inline]
    pub fn func(name: impl Into<Cow<'static, str>>, args: SQL) -> Self {
        SQL::raw(name)
            .push(Token::LPAREN)
            .append(args)
            .push(Token::RPAREN)
    }

    // ==================== builder methods ====================

    /// Append another SQL fragment (flat extend)
    #[inline]
    pub fn append(mut self, other: impl Into<SQL>) -> Self {
        self.append_mut(other);
        self
    }

    #[inline]
    pub fn append_mut(&mut self, other: impl Into<SQL>) {
        let other = other.into();

        if self.chunks.is_empty() {
            self.chunks = other.chunks;
            return;
        }
        self.chunks.extend(other.chunks);
    }

    /// Push a single chunk
    #[inline]
    pub fn push(mut self, chunk: impl Into<SQLChunk>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    #[inline]
    pub fn push_mut(&mut self, chunk: impl Into<SQLChunk>) {
        self.chunks.push(chunk.into());
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    // ==================== combinators ====================

    /// Joins multiple SQL fragments with a separator
    pub fn join(sqls: impl IntoIterator<Item = SQL>, separator: Token) -> SQL {
        let mut iter = sqls.into_iter();
        let Some(mut result) = iter.next() else {
            return SQL::empty();
        };

        for item in iter {
            result.chunks.push(SQLChunk::Token(separator));
            result.chunks.extend(item.chunks);
        }
        result
    }

    /// Wrap in parentheses: (self)
    #[inline]
    pub fn parens(self) -> Self {
        SQL::token(Token::LPAREN).append(self).push(Token::RPAREN)
    }

    /// Creates an aliased version: self AS "name"
    pub fn alias(self, name: impl Into<Cow<'static, str>>) -> SQL {
        self.push(Token::AS).push(SQLChunk::Ident(name.into()))
    }

    // ==================== output methods ====================

    /// Renders SQL text for `dialect` without collecting parameters.
    pub fn sql(&self, dialect: &dyn DialectProvider) -> String {
        self.render(dialect, |_| {})
    }

    /// Renders the SQL text and collects parameters in a single pass.
    ///
    /// This is the only path that produces a [`Statement`], which is what
    /// keeps placeholders and values aligned.
    pub fn build(&self, dialect: &dyn DialectProvider) -> Statement {
        let mut params = Vec::with_capacity(self.chunks.len() / 4);
        let sql = self.render(dialect, |value| params.push(value.clone()));
        Statement::new(sql, params)
    }

    fn render(&self, dialect: &dyn DialectProvider, mut on_param: impl FnMut(&Value)) -> String {
        let mut buf = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        let mut param_index = 1usize;

        for (i, chunk) in self.chunks.iter().enumerate() {
            match chunk {
                SQLChunk::Param(value) => {
                    buf.push_str(&dialect.placeholder(param_index));
                    param_index += 1;
                    on_param(value);
                }
                _ => chunk.write(&mut buf, dialect),
            }

            if let Some(next) = self.chunks.get(i + 1)
                && chunk_needs_space(chunk, next)
            {
                buf.push(' ');
            }
        }
        buf
    }
}

// ==================== trait implementations ====================

impl From<Token> for SQL {
    fn from(value: Token) -> Self {
        SQL::token(value)
    }
}

impl From<SQLChunk> for SQL {
    fn from(value: SQLChunk) -> Self {
        Self {
            chunks: smallvec::smallvec![value],
        }
    }
}

impl FromIterator<SQLChunk> for SQL {
    fn from_iter<I: IntoIterator<Item = SQLChunk>>(iter: I) -> Self {
        Self {
            chunks: SmallVec::from_iter(iter),
        }
    }
}

impl IntoIterator for SQL {
    type Item = SQLChunk;
    type IntoIter = smallvec::IntoIter<[SQLChunk; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn renders_function_and_operators() {
        let sql = SQL::token(Token::SELECT)
            .append(SQL::func("COUNT", SQL::token(Token::STAR)))
            .push(Token::FROM)
            .append(SQL::ident("users"))
            .push(Token::WHERE)
            .append(SQL::qualified("users", "age"))
            .push(Token::GT)
            .append(SQL::param(18));

        assert_eq!(
            sql.sql(&Dialect::PostgreSQL),
            r#"SELECT COUNT(*) FROM "users" WHERE "users"."age" > $1"#
        );
    }

    #[test]
    fn build_numbers_placeholders_in_order() {
        let sql = SQL::ident("id")
            .push(Token::IN)
            .append(SQL::join([1, 2, 3].map(SQL::param), Token::COMMA).parens());

        let stmt = sql.build(&Dialect::PostgreSQL);
        assert_eq!(stmt.sql(), r#""id" IN ($1, $2, $3)"#);
        assert_eq!(
            stmt.params(),
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn join_with_separator() {
        let sql = SQL::join([SQL::ident("a"), SQL::ident("b")], Token::COMMA);
        assert_eq!(sql.sql(&Dialect::SQLite), r#""a", "b""#);
    }
}
