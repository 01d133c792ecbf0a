use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Integer,
    Float,
    Identifier,

    // Operators and punctuation
    Assign,
    Semicolon,
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Mul,
    Div,

    // Keywords
    Print,
    Var,

    EndOfInput,

    /// Text the tokenizer rejected. Never returned by [`Tokenizer::token`],
    /// only by [`Tokenizer::recover`].
    Invalid,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Integer => "INTEGER",
            TokenKind::Float => "FLOAT",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Assign => "ASSIGN",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::LeftParen => "LPAREN",
            TokenKind::RightParen => "RPAREN",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Mul => "MUL",
            TokenKind::Div => "DIV",
            TokenKind::Print => "PRINT",
            TokenKind::Var => "VAR",
            TokenKind::EndOfInput => "END_OF_INPUT",
            TokenKind::Invalid => "INVALID",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub position: Position,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, lexeme: &'a str, position: Position) -> Self {
        Self {
            kind,
            lexeme,
            position,
        }
    }
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::EndOfInput => write!(f, "{}", self.kind),
            kind => write!(f, "{} '{}'", kind, self.lexeme),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexicalError {
    #[error("Lexical Error: unexpected character '{character}' at {position}")]
    UnexpectedCharacter { character: char, position: Position },
    #[error("Lexical Error: expected ':=' but found '{found}' at {position}")]
    IncompleteAssign { found: String, position: Position },
}

/// Produces tokens one at a time, on demand.
///
/// Once the end of the source is reached every further call to
/// [`Tokenizer::token`] yields an `EndOfInput` token. A lexical error leaves
/// the cursor on the offending character; the caller decides whether to
/// [`Tokenizer::recover`] past it.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    source: &'a str,
    offset: usize,
    current: Option<char>,
    position: Position,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            current: source.chars().next(),
            position: Position::start(),
        }
    }

    pub fn token(&mut self) -> Result<Token<'a>, LexicalError> {
        self.advance_while(char::is_whitespace);

        let start = self.offset;
        let position = self.position;
        let Some(c) = self.current else {
            return Ok(Token::new(TokenKind::EndOfInput, "", position));
        };

        let kind = match c {
            c if c.is_alphabetic() || c == '_' => self.word(),
            c if c.is_ascii_digit() => self.number(),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Mul),
            '/' => self.single(TokenKind::Div),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            ';' => self.single(TokenKind::Semicolon),
            ':' => self.assign()?,
            character => {
                return Err(LexicalError::UnexpectedCharacter {
                    character,
                    position,
                })
            }
        };

        let token = Token::new(kind, &self.source[start..self.offset], position);
        tracing::trace!(kind = %token.kind, lexeme = token.lexeme, %position, "scanned token");
        Ok(token)
    }

    /// Skips the character a lexical error stopped on and returns it as an
    /// `Invalid` token.
    pub fn recover(&mut self) -> Token<'a> {
        let start = self.offset;
        let position = self.position;
        self.advance();
        Token::new(TokenKind::Invalid, &self.source[start..self.offset], position)
    }

    fn advance(&mut self) {
        if let Some(c) = self.current {
            self.offset += c.len_utf8();
            if c == '\n' {
                self.position.line += 1;
                self.position.column = 1;
            } else {
                self.position.column += 1;
            }
            self.current = self.source[self.offset..].chars().next();
        }
    }

    fn advance_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.current.is_some_and(&predicate) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().nth(1)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn word(&mut self) -> TokenKind {
        let start = self.offset;
        self.advance_while(|c| c.is_alphanumeric() || c == '_');
        let word = &self.source[start..self.offset];
        if word.eq_ignore_ascii_case("print") {
            TokenKind::Print
        } else if word.eq_ignore_ascii_case("var") {
            TokenKind::Var
        } else {
            TokenKind::Identifier
        }
    }

    fn number(&mut self) -> TokenKind {
        self.advance_while(|c| c.is_ascii_digit());
        if self.current == Some('.') {
            self.advance();
            self.advance_while(|c| c.is_ascii_digit());
            TokenKind::Float
        } else {
            TokenKind::Integer
        }
    }

    fn assign(&mut self) -> Result<TokenKind, LexicalError> {
        match self.peek() {
            Some('=') => {
                self.advance();
                self.advance();
                Ok(TokenKind::Assign)
            }
            next => Err(LexicalError::IncompleteAssign {
                found: next.map_or_else(|| ":".to_string(), |c| format!(":{c}")),
                position: self.position,
            }),
        }
    }
}

/// Tokenizes the whole source, stopping at the first lexical error.
pub fn tokens(source: &str) -> Result<Vec<Token<'_>>, LexicalError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.token()?;
        let done = token.kind == TokenKind::EndOfInput;
        tokens.push(token);
        if done {
            break;
        }
    }

    Ok(tokens)
}
