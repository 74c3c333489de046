/// SQL keywords and punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // keywords
    SELECT,
    FROM,
    WHERE,
    AND,
    OR,
    NOT,
    AS,
    ON,
    INNER,
    LEFT,
    JOIN,
    ORDER,
    GROUP,
    BY,
    ASC,
    DESC,
    IS,
    NULL,
    IN,
    LIKE,

    // punctuation
    STAR,
    COMMA,
    DOT,
    LPAREN,
    RPAREN,

    // operators
    EQ,
    NE,
    LT,
    LE,
    GT,
    GE,
    PLUS,
    MINUS,
    MUL,
    DIV,
}

impl Token {
    pub const fn as_str(self) -> &'static str {
        match self {
            Token::SELECT => "SELECT",
            Token::FROM => "FROM",
            Token::WHERE => "WHERE",
            Token::AND => "AND",
            Token::OR => "OR",
            Token::NOT => "NOT",
            Token::AS => "AS",
            Token::ON => "ON",
            Token::INNER => "INNER",
            Token::LEFT => "LEFT",
            Token::JOIN => "JOIN",
            Token::ORDER => "ORDER",
            Token::GROUP => "GROUP",
            Token::BY => "BY",
            Token::ASC => "ASC",
            Token::DESC => "DESC",
            Token::IS => "IS",
            Token::NULL => "NULL",
            Token::IN => "IN",
            Token::LIKE => "LIKE",
            Token::STAR | Token::MUL => "*",
            Token::COMMA => ",",
            Token::DOT => ".",
            Token::LPAREN => "(",
            Token::RPAREN => ")",
            Token::EQ => "=",
            Token::NE => "<>",
            Token::LT => "<",
            Token::LE => "<=",
            Token::GT => ">",
            Token::GE => ">=",
            Token::PLUS => "+",
            Token::MINUS => "-",
            Token::DIV => "/",
        }
    }

    /// Comparison and arithmetic operators, rendered with surrounding spaces.
    pub const fn is_operator(self) -> bool {
        matches!(
            self,
            Token::EQ
                | Token::NE
                | Token::LT
                | Token::LE
                | Token::GT
                | Token::GE
                | Token::PLUS
                | Token::MINUS
                | Token::MUL
                | Token::DIV
        )
    }

    /// Keywords and `*` behave like words for spacing purposes.
    pub const fn is_word_like(self) -> bool {
        !self.is_operator()
            && !matches!(
                self,
                Token::COMMA | Token::DOT | Token::LPAREN | Token::RPAREN
            )
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
