use std::borrow::Cow;

use crate::dialect::DialectProvider;
use crate::sql::tokens::Token;
use crate::value::Value;

/// A SQL chunk represents a part of an SQL statement.
///
/// - `Token` - SQL keywords and operators (SELECT, FROM, =, etc.)
/// - `Ident` - Identifiers, quoted by the dialect at render time
/// - `Raw` - Unquoted raw SQL text (function names, dialect-rendered clauses)
/// - `Number` - Unsigned integer literal that is not user data (`1 = 0`)
/// - `Param` - A bound value, rendered as the dialect's placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SQLChunk {
    /// SQL keywords and operators: SELECT, FROM, WHERE, =, AND, etc.
    Token(Token),

    /// Identifier for table, column and alias names
    /// Renders as: "name" (quoting decided by the dialect)
    Ident(Cow<'static, str>),

    /// Raw SQL text (unquoted) for function names and clauses
    /// Renders as: text (no quotes, as-is)
    Raw(Cow<'static, str>),

    /// Structural integer literal
    Number(u64),

    /// Bound parameter value
    /// Renders as: ? or $1 depending on the dialect
    Param(Value),
}

impl SQLChunk {
    /// Write chunk content to buffer. Parameters are handled by the caller
    /// since their rendering depends on their position.
    pub(crate) fn write(&self, buf: &mut String, dialect: &dyn DialectProvider) {
        match self {
            SQLChunk::Token(token) => buf.push_str(token.as_str()),
            SQLChunk::Ident(name) => dialect.write_quoted(buf, name),
            SQLChunk::Raw(text) => buf.push_str(text),
            SQLChunk::Number(n) => {
                use core::fmt::Write;
                let _ = write!(buf, "{n}");
            }
            SQLChunk::Param(_) => buf.push('?'),
        }
    }

    pub(crate) fn is_word_like(&self) -> bool {
        match self {
            SQLChunk::Token(t) => t.is_word_like(),
            SQLChunk::Ident(_) | SQLChunk::Raw(_) | SQLChunk::Number(_) | SQLChunk::Param(_) => {
                true
            }
        }
    }
}

impl From<Token> for SQLChunk {
    fn from(value: Token) -> Self {
        SQLChunk::Token(value)
    }
}

impl From<Value> for SQLChunk {
    fn from(value: Value) -> Self {
        SQLChunk::Param(value)
    }
}

/// Canonical spacing logic for SQL chunk rendering.
pub(crate) fn chunk_needs_space(current: &SQLChunk, next: &SQLChunk) -> bool {
    // No space if current raw text ends with space
    if let SQLChunk::Raw(text) = current
        && text.ends_with(' ')
    {
        return false;
    }

    // No space if next raw text starts with space
    if let SQLChunk::Raw(text) = next
        && text.starts_with(' ')
    {
        return false;
    }

    match (current, next) {
        // No space before closing/separator punctuation
        (_, SQLChunk::Token(Token::RPAREN | Token::COMMA | Token::DOT)) => false,
        // No space after opening punctuation
        (SQLChunk::Token(Token::LPAREN | Token::DOT), _) => false,
        // Space after comma
        (SQLChunk::Token(Token::COMMA), _) => true,
        // Space around comparison/arithmetic operators
        (SQLChunk::Token(t), _) if t.is_operator() => true,
        (_, SQLChunk::Token(t)) if t.is_operator() => true,
        // Space after closing paren if next is word-like (e.g., ") FROM")
        (SQLChunk::Token(Token::RPAREN), next) => next.is_word_like(),
        // Function calls: COUNT(, "t"(
        (SQLChunk::Raw(_) | SQLChunk::Ident(_), SQLChunk::Token(Token::LPAREN)) => false,
        // Keyword before opening paren: IN (, FROM (
        (current, SQLChunk::Token(Token::LPAREN)) => current.is_word_like(),
        // Space between all word-like chunks
        _ => current.is_word_like() && next.is_word_like(),
    }
}
