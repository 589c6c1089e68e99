use super::diag::Pos;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Declaration keywords
    Package,
    Import,
    Option,
    Enum,
    Entity,
    Query,
    Service,
    Rpc,
    Returns,
    Stream,
    Where,
    OrderBy,
    Limit,

    // SQL operator keywords (exact case, as written in queries)
    And,
    Or,
    Not,
    In,
    Like,
    Is,
    Null,
    Asc,
    Desc,

    // Built-in type names
    TypeString,
    TypeInt32,
    TypeInt64,
    TypeFloat,
    TypeDouble,
    TypeBool,
    TypeBytes,
    TypeTimestamp,

    // Boolean literals
    True,
    False,

    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Colon,
    Comma,
    Dot,
    At,
    Question,

    // Operators
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Concat,

    // Special
    Error(String),
    Eof,
}

impl TokenKind {
    /// Source spelling for keywords that the grammar also accepts as plain
    /// identifiers (e.g. a query parameter literally named `limit`).
    pub fn ident_spelling(&self) -> Option<&'static str> {
        match self {
            TokenKind::Limit => Some("limit"),
            TokenKind::Where => Some("where"),
            TokenKind::OrderBy => Some("order_by"),
            TokenKind::Query => Some("query"),
            TokenKind::Asc => Some("ASC"),
            TokenKind::Desc => Some("DESC"),
            TokenKind::And => Some("AND"),
            TokenKind::Or => Some("OR"),
            TokenKind::Not => Some("NOT"),
            TokenKind::In => Some("IN"),
            TokenKind::Like => Some("LIKE"),
            TokenKind::Is => Some("IS"),
            TokenKind::Null => Some("NULL"),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::Package => "package",
            TokenKind::Import => "import",
            TokenKind::Option => "option",
            TokenKind::Enum => "enum",
            TokenKind::Entity => "entity",
            TokenKind::Query => "query",
            TokenKind::Service => "service",
            TokenKind::Rpc => "rpc",
            TokenKind::Returns => "returns",
            TokenKind::Stream => "stream",
            TokenKind::Where => "where",
            TokenKind::OrderBy => "order_by",
            TokenKind::Limit => "limit",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::In => "IN",
            TokenKind::Like => "LIKE",
            TokenKind::Is => "IS",
            TokenKind::Null => "NULL",
            TokenKind::Asc => "ASC",
            TokenKind::Desc => "DESC",
            TokenKind::TypeString => "string",
            TokenKind::TypeInt32 => "int32",
            TokenKind::TypeInt64 => "int64",
            TokenKind::TypeFloat => "float",
            TokenKind::TypeDouble => "double",
            TokenKind::TypeBool => "bool",
            TokenKind::TypeBytes => "bytes",
            TokenKind::TypeTimestamp => "timestamp",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Int(_) => "integer literal",
            TokenKind::Float(_) => "float literal",
            TokenKind::Str(_) => "string literal",
            TokenKind::Ident(name) => return write!(f, "'{}'", name),
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::At => "'@'",
            TokenKind::Question => "'?'",
            TokenKind::Eq => "'='",
            TokenKind::NotEq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Concat => "'||'",
            TokenKind::Error(msg) => return write!(f, "invalid token ({})", msg),
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

/// A fatal tokenization failure, produced only by [`Lexer::tokenize`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{pos}: {message}")]
pub struct LexError {
    pub pos: Pos,
    pub message: String,
}

/// Tokenizer for DataProto schema source.
///
/// `next_token` never fails; lexical problems surface as
/// [`TokenKind::Error`] tokens so the parser can record them as diagnostics
/// and keep scanning. Once the input is exhausted, every further call
/// returns [`TokenKind::Eof`].
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Tokenizes the whole buffer, treating the first error token as fatal.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            match token.kind {
                TokenKind::Error(message) => {
                    return Err(LexError {
                        pos: token.pos,
                        message,
                    })
                }
                TokenKind::Eof => {
                    tokens.push(token);
                    return Ok(tokens);
                }
                _ => tokens.push(token),
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let pos = self.current_pos();
        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '(' => self.take(TokenKind::LParen),
                ')' => self.take(TokenKind::RParen),
                '{' => self.take(TokenKind::LBrace),
                '}' => self.take(TokenKind::RBrace),
                '[' => self.take(TokenKind::LBracket),
                ']' => self.take(TokenKind::RBracket),
                ';' => self.take(TokenKind::Semicolon),
                ':' => self.take(TokenKind::Colon),
                ',' => self.take(TokenKind::Comma),
                '.' => self.take(TokenKind::Dot),
                '@' => self.take(TokenKind::At),
                '?' => self.take(TokenKind::Question),
                '+' => self.take(TokenKind::Plus),
                '*' => self.take(TokenKind::Star),
                '/' => self.take(TokenKind::Slash),
                '%' => self.take(TokenKind::Percent),
                '=' => self.take(TokenKind::Eq),
                '-' => {
                    // A '-' directly followed by a digit is absorbed into the
                    // number literal; `a - 1` and `a -1` tokenize differently.
                    if self.peek2().is_some_and(|c| c.is_ascii_digit()) {
                        self.read_number()
                    } else {
                        self.take(TokenKind::Minus)
                    }
                }
                '!' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.take(TokenKind::NotEq)
                    } else {
                        TokenKind::Error("unexpected character '!'".to_string())
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.take(TokenKind::LtEq)
                    } else {
                        TokenKind::Lt
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.take(TokenKind::GtEq)
                    } else {
                        TokenKind::Gt
                    }
                }
                '|' => {
                    self.advance();
                    if self.peek() == Some('|') {
                        self.take(TokenKind::Concat)
                    } else {
                        TokenKind::Error("unexpected character '|'".to_string())
                    }
                }
                '"' => self.read_string(),
                c if c.is_ascii_digit() => self.read_number(),
                c if c.is_alphabetic() || c == '_' => self.read_identifier(),
                c => {
                    self.advance();
                    TokenKind::Error(format!("unexpected character '{}'", c))
                }
            },
        };

        Token::new(kind, pos)
    }

    fn current_pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: (self.pos - self.line_start + 1) as u32,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    /// Consumes the current character and returns `kind`.
    fn take(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn skip_trivia(&mut self) {
        loop {
            while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
                self.advance();
            }

            if self.peek() == Some('/') {
                match self.peek2() {
                    Some('/') => {
                        self.skip_line_comment();
                        continue;
                    }
                    Some('*') => {
                        self.skip_block_comment();
                        continue;
                    }
                    _ => {}
                }
            }

            break;
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance(); // '/'
        self.advance(); // '*'
        while let Some(c) = self.advance() {
            if c == '*' && self.peek() == Some('/') {
                self.advance();
                return;
            }
        }
        // An unterminated block comment simply runs to end of input.
    }

    fn read_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        lookup_keyword(&self.input[start..self.pos])
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.pos;
        let mut is_float = false;

        if self.peek() == Some('-') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // The dot is only part of the number when a digit follows it, so
        // `1.foo` stays an integer followed by '.' and an identifier.
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(value) => TokenKind::Float(value),
                Err(_) => TokenKind::Error(format!("invalid float literal '{}'", text)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => TokenKind::Int(value),
                Err(_) => TokenKind::Error(format!("integer literal out of range '{}'", text)),
            }
        }
    }

    fn read_string(&mut self) -> TokenKind {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return TokenKind::Error("unterminated string".to_string()),
                Some('"') => return TokenKind::Str(value),
                Some('\\') => match self.advance() {
                    None => return TokenKind::Error("unterminated string".to_string()),
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('x') => {
                        let hi = self.advance().map_or(0, hex_value);
                        let lo = self.advance().map_or(0, hex_value);
                        if let Some(c) = char::from_u32(hi * 16 + lo) {
                            value.push(c);
                        }
                    }
                    // Covers \" and \\; any other escaped character is kept
                    // verbatim.
                    Some(c) => value.push(c),
                },
                Some(c) => value.push(c),
            }
        }
    }
}

fn lookup_keyword(ident: &str) -> TokenKind {
    match ident {
        "package" => TokenKind::Package,
        "import" => TokenKind::Import,
        "option" => TokenKind::Option,
        "enum" => TokenKind::Enum,
        "entity" => TokenKind::Entity,
        "query" => TokenKind::Query,
        "service" => TokenKind::Service,
        "rpc" => TokenKind::Rpc,
        "returns" => TokenKind::Returns,
        "stream" => TokenKind::Stream,
        "where" => TokenKind::Where,
        "order_by" => TokenKind::OrderBy,
        "limit" => TokenKind::Limit,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "IN" => TokenKind::In,
        "LIKE" => TokenKind::Like,
        "IS" => TokenKind::Is,
        "NULL" => TokenKind::Null,
        "ASC" => TokenKind::Asc,
        "DESC" => TokenKind::Desc,
        "string" => TokenKind::TypeString,
        "int32" => TokenKind::TypeInt32,
        "int64" => TokenKind::TypeInt64,
        "float" => TokenKind::TypeFloat,
        "double" => TokenKind::TypeDouble,
        "bool" => TokenKind::TypeBool,
        "bytes" => TokenKind::TypeBytes,
        "timestamp" => TokenKind::TypeTimestamp,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => TokenKind::Ident(ident.to_string()),
    }
}

fn hex_value(c: char) -> u32 {
    match c {
        '0'..='9' => c as u32 - '0' as u32,
        'a'..='f' => c as u32 - 'a' as u32 + 10,
        'A'..='F' => c as u32 - 'A' as u32 + 10,
        _ => 0,
    }
}
