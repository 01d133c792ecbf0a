use crate::{
    ast::{Expression, InfixOperator, Literal, Program, Statement, UnaryOperator},
    position::Position,
    tokenizer::{LexicalError, Token, TokenKind, Tokenizer},
    trace::TraceEvent,
};

/// Tokens a statement may start with, plus the statement separator and the
/// end of input.
const STATEMENT_BOUNDARY: &[TokenKind] = &[
    TokenKind::Semicolon,
    TokenKind::EndOfInput,
    TokenKind::Var,
    TokenKind::Print,
    TokenKind::Identifier,
];

/// Deepest expression nesting accepted, counting parentheses, unary
/// operators and chained infix operators.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error("Syntax Error: expected {expected} but found {found} at {position}")]
    Expected {
        expected: TokenKind,
        found: String,
        position: Position,
    },
    #[error("Syntax Error: unexpected {found} at the start of a statement at {position}")]
    UnexpectedStatement { found: String, position: Position },
    #[error("Expression Error: expected an operand but found {found} at {position}")]
    ExpectedOperand { found: String, position: Position },
    #[error("Syntax Error: number '{lexeme}' is out of range at {position}")]
    InvalidNumber { lexeme: String, position: Position },
    #[error("Syntax Error: expression is nested deeper than {limit} levels at {position}")]
    TooDeep { limit: usize, position: Position },
}

pub fn program(source: &str) -> (Program, Vec<TraceEvent>) {
    Parser::new(source).parse()
}

/// Recursive descent parser with panic-mode recovery.
///
/// Errors never abort the parse: each one is pushed to the event list, the
/// parser discards tokens up to the next statement boundary and carries on.
/// The returned program holds every statement that parsed cleanly.
pub struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token<'a>,
    events: Vec<TraceEvent>,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut parser = Self {
            tokenizer: Tokenizer::new(source),
            current: Token::new(TokenKind::EndOfInput, "", Position::start()),
            events: Vec::new(),
            depth: 0,
        };
        parser.advance();
        parser
    }

    pub fn parse(mut self) -> (Program, Vec<TraceEvent>) {
        let mut statements = Vec::new();

        while self.current.kind != TokenKind::EndOfInput {
            if self.current.kind == TokenKind::Semicolon {
                self.advance();
                statements.push(Statement::NoOp);
                continue;
            }

            match self.statement() {
                Ok(statement) => {
                    if self.end_statement() {
                        statements.push(statement);
                    }
                }
                Err(error) => {
                    let unrecognized = matches!(error, ParseError::UnexpectedStatement { .. });
                    self.report(error);
                    self.synchronize(STATEMENT_BOUNDARY);
                    if unrecognized
                        && matches!(
                            self.current.kind,
                            TokenKind::Semicolon | TokenKind::EndOfInput
                        )
                    {
                        statements.push(Statement::NoOp);
                    }
                    self.skip_semicolon();
                }
            }
        }

        (Program(statements), self.events)
    }

    fn advance(&mut self) {
        self.current = match self.tokenizer.token() {
            Ok(token) => token,
            Err(error) => {
                tracing::debug!(%error, "skipping rejected input");
                self.events.push(TraceEvent::Parse(error.into()));
                self.tokenizer.recover()
            }
        };
    }

    fn eat(&mut self, kind: TokenKind) -> Result<Token<'a>, ParseError> {
        if self.current.kind == kind {
            let token = self.current;
            self.advance();
            Ok(token)
        } else {
            Err(self.expected(kind))
        }
    }

    fn expected(&self, kind: TokenKind) -> ParseError {
        ParseError::Expected {
            expected: kind,
            found: self.current.to_string(),
            position: self.current.position,
        }
    }

    fn report(&mut self, error: ParseError) {
        // Already reported as a lexical error when it was scanned.
        if self.current.kind == TokenKind::Invalid {
            return;
        }
        tracing::debug!(%error, "parse error");
        self.events.push(TraceEvent::Parse(error));
    }

    fn synchronize(&mut self, targets: &[TokenKind]) {
        let mut skipped = 0;
        while self.current.kind != TokenKind::EndOfInput && !targets.contains(&self.current.kind) {
            self.advance();
            skipped += 1;
        }

        tracing::debug!(skipped, resumed_at = %self.current.kind, "synchronized");
        self.events.push(TraceEvent::Recovered {
            skipped,
            resumed_at: self.current.kind,
            position: self.current.position,
        });
    }

    fn skip_semicolon(&mut self) {
        if self.current.kind == TokenKind::Semicolon {
            self.advance();
        }
    }

    /// Consumes the separator after a parsed statement. Returns whether the
    /// statement is kept: after a missing semicolon, only when the next token
    /// starts another statement.
    fn end_statement(&mut self) -> bool {
        match self.current.kind {
            TokenKind::Semicolon => {
                self.advance();
                true
            }
            TokenKind::EndOfInput => true,
            kind => {
                let error = self.expected(TokenKind::Semicolon);
                self.report(error);
                self.synchronize(STATEMENT_BOUNDARY);
                self.skip_semicolon();
                matches!(
                    kind,
                    TokenKind::Var | TokenKind::Print | TokenKind::Identifier
                )
            }
        }
    }

    /// Runs `parse` and restores the nesting depth afterwards, whether or
    /// not it succeeded.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let depth = self.depth;
        let result = parse(self);
        self.depth = depth;
        result
    }

    fn deeper(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_DEPTH,
                position: self.current.position,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        match self.current.kind {
            TokenKind::Var => self.declaration(),
            TokenKind::Identifier => self.assignment(),
            TokenKind::Print => self.print_statement(),
            _ => Err(ParseError::UnexpectedStatement {
                found: self.current.to_string(),
                position: self.current.position,
            }),
        }
    }

    fn declaration(&mut self) -> Result<Statement, ParseError> {
        self.eat(TokenKind::Var)?;
        let name = self.eat(TokenKind::Identifier)?;
        Ok(Statement::VarDeclaration {
            name: name.lexeme.to_string(),
            position: name.position,
        })
    }

    fn assignment(&mut self) -> Result<Statement, ParseError> {
        let name = self.eat(TokenKind::Identifier)?;
        let operator = self.eat(TokenKind::Assign)?;
        let value = self.expression()?;
        Ok(Statement::Assign {
            name: name.lexeme.to_string(),
            operator: operator.position,
            value,
        })
    }

    fn print_statement(&mut self) -> Result<Statement, ParseError> {
        self.eat(TokenKind::Print)?;
        let value = self.expression()?;
        Ok(Statement::Print(value))
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        self.binary(Self::term, |kind| match kind {
            TokenKind::Plus => Some(InfixOperator::Plus),
            TokenKind::Minus => Some(InfixOperator::Minus),
            _ => None,
        })
    }

    fn term(&mut self) -> Result<Expression, ParseError> {
        self.binary(Self::factor, |kind| match kind {
            TokenKind::Mul => Some(InfixOperator::Multiply),
            TokenKind::Div => Some(InfixOperator::Divide),
            _ => None,
        })
    }

    fn binary(
        &mut self,
        operand: fn(&mut Self) -> Result<Expression, ParseError>,
        operator: fn(TokenKind) -> Option<InfixOperator>,
    ) -> Result<Expression, ParseError> {
        self.nested(|parser| {
            let mut expr = operand(parser)?;

            while let Some(op) = operator(parser.current.kind) {
                parser.deeper()?;
                let position = parser.current.position;
                parser.advance();
                let right = operand(parser)?;
                expr = Expression::Binary {
                    left: Box::new(expr),
                    operator: op,
                    right: Box::new(right),
                    position,
                };
            }

            Ok(expr)
        })
    }

    fn factor(&mut self) -> Result<Expression, ParseError> {
        let token = self.current;
        match token.kind {
            TokenKind::Plus | TokenKind::Minus => self.nested(|parser| {
                parser.deeper()?;
                let operator = if token.kind == TokenKind::Plus {
                    UnaryOperator::Plus
                } else {
                    UnaryOperator::Negate
                };
                parser.advance();
                let operand = parser.factor()?;
                Ok(Expression::Unary(operator, Box::new(operand)))
            }),
            TokenKind::Integer => {
                let value = token
                    .lexeme
                    .parse::<i64>()
                    .map_err(|_| invalid_number(&token))?;
                self.advance();
                Ok(Expression::Literal(Literal::Integer(value)))
            }
            TokenKind::Float => {
                let value = token
                    .lexeme
                    .parse::<f64>()
                    .map_err(|_| invalid_number(&token))?;
                self.advance();
                Ok(Expression::Literal(Literal::Float(value)))
            }
            TokenKind::LeftParen => self.nested(|parser| {
                parser.deeper()?;
                parser.advance();
                let expr = parser.expression()?;
                parser.eat(TokenKind::RightParen)?;
                Ok(expr)
            }),
            TokenKind::Identifier => {
                self.advance();
                Ok(Expression::Variable {
                    name: token.lexeme.to_string(),
                    position: token.position,
                })
            }
            _ => Err(ParseError::ExpectedOperand {
                found: token.to_string(),
                position: token.position,
            }),
        }
    }
}

fn invalid_number(token: &Token<'_>) -> ParseError {
    ParseError::InvalidNumber {
        lexeme: token.lexeme.to_string(),
        position: token.position,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn errors(events: &[TraceEvent]) -> Vec<&ParseError> {
        events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Parse(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_program() {
        let (program, events) = program("VAR x; x := 1 + 2 * 3; PRINT x;");
        assert!(events.is_empty());
        assert_eq!(
            program.to_string(),
            "var x;\nx := (+ 1 (* 2 3));\nprint x;\n"
        );
    }

    #[test]
    fn test_precedence_and_grouping() {
        let (program, events) = program("PRINT (1 + 2) * -3 - 4 / 2.5;");
        assert!(events.is_empty());
        assert_eq!(
            program.to_string(),
            "print (- (* (+ 1 2) (- 3)) (/ 4 2.5));\n"
        );
    }

    #[test]
    fn test_whole_floats_keep_fraction() {
        let (program, _) = program("PRINT 5.0 * 7.;");
        assert_eq!(program.to_string(), "print (* 5.0 7.0);\n");
    }

    #[test]
    fn test_last_semicolon_is_optional() {
        let (program, events) = program("VAR x; PRINT +x");
        assert!(events.is_empty());
        assert_eq!(program.to_string(), "var x;\nprint (+ x);\n");
    }

    #[test]
    fn test_missing_semicolon_recovers_at_next_statement() {
        let (program, events) = program("VAR a; a := 10; VAR b a := a + 1; PRINT a;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::Expected {
                expected: TokenKind::Semicolon,
                position: Position { line: 1, column: 23 },
                ..
            }
        ));
        assert!(events.contains(&TraceEvent::Recovered {
            skipped: 0,
            resumed_at: TokenKind::Identifier,
            position: Position::new(1, 23),
        }));
        assert_eq!(
            program.to_string(),
            "var a;\na := 10;\nvar b;\na := (+ a 1);\nprint a;\n"
        );
    }

    #[test]
    fn test_malformed_factor_drops_statement() {
        let (program, events) = program("VAR x; x := 5 + * 6; PRINT x;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::ExpectedOperand { .. }));
        assert!(events.contains(&TraceEvent::Recovered {
            skipped: 2,
            resumed_at: TokenKind::Semicolon,
            position: Position::new(1, 20),
        }));
        assert_eq!(program.to_string(), "var x;\nprint x;\n");
    }

    #[test]
    fn test_missing_identifier_after_var() {
        let (program, events) = program("VAR ; PRINT 1;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::Expected {
                expected: TokenKind::Identifier,
                ..
            }
        ));
        assert_eq!(program.to_string(), "print 1;\n");
    }

    #[test]
    fn test_missing_assign_operator() {
        let (program, events) = program("VAR x; x 5; PRINT 2;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::Expected {
                expected: TokenKind::Assign,
                ..
            }
        ));
        assert_eq!(program.to_string(), "var x;\nprint 2;\n");
    }

    #[test]
    fn test_unrecognized_statement_start() {
        let (program, events) = program("5; PRINT 1;");
        assert!(matches!(
            errors(&events)[0],
            ParseError::UnexpectedStatement { .. }
        ));
        assert_eq!(program.0, vec![Statement::NoOp, print_one()]);

        let (program, events) = super::program(") PRINT 1;");
        assert_eq!(errors(&events).len(), 1);
        assert_eq!(program.0, vec![print_one()]);

        let (program, events) = super::program("PRINT 1; 5 6");
        assert_eq!(errors(&events).len(), 1);
        assert!(events.contains(&TraceEvent::Recovered {
            skipped: 2,
            resumed_at: TokenKind::EndOfInput,
            position: Position::new(1, 13),
        }));
        assert_eq!(program.0, vec![print_one(), Statement::NoOp]);
    }

    #[test]
    fn test_missing_semicolon_before_non_statement_drops_statement() {
        let (program, events) = program("PRINT 1 2; PRINT 3;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::Expected {
                expected: TokenKind::Semicolon,
                ..
            }
        ));
        assert_eq!(program.to_string(), "print 3;\n");
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| {
            format!("PRINT {}1{}; PRINT 2;", "(".repeat(depth), ")".repeat(depth))
        };

        let (program, events) = program(&nested(MAX_DEPTH));
        assert!(events.is_empty());
        assert_eq!(program.0.len(), 2);

        let (program, events) = super::program(&nested(MAX_DEPTH + 1));
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            &ParseError::TooDeep {
                limit: MAX_DEPTH,
                position: Position::new(1, 7 + MAX_DEPTH),
            }
        );
        assert_eq!(program.to_string(), "print 2;\n");
    }

    #[test]
    fn test_deep_unary_and_chains_are_rejected() {
        let source = format!("PRINT {}1; PRINT 3;", "-".repeat(100_000));
        let (program, events) = program(&source);
        assert!(matches!(errors(&events)[..], [ParseError::TooDeep { .. }]));
        assert_eq!(program.to_string(), "print 3;\n");

        let source = format!("PRINT 1{}; PRINT 3;", " + 1".repeat(10_000));
        let (program, events) = super::program(&source);
        assert!(matches!(errors(&events)[..], [ParseError::TooDeep { .. }]));
        assert_eq!(program.to_string(), "print 3;\n");

        let (_, events) = super::program(&format!("PRINT 1{};", " + 1".repeat(MAX_DEPTH)));
        assert!(events.is_empty());
    }

    #[test]
    fn test_empty_statements() {
        let (program, events) = program(";; PRINT 1");
        assert!(events.is_empty());
        assert_eq!(program.0, vec![Statement::NoOp, Statement::NoOp, print_one()]);
    }

    #[test]
    fn test_missing_right_paren() {
        let (program, events) = program("PRINT (1 + 2; PRINT 3;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::Expected {
                expected: TokenKind::RightParen,
                ..
            }
        ));
        assert_eq!(program.to_string(), "print 3;\n");
    }

    #[test]
    fn test_lexical_error_is_reported_once() {
        let (program, events) = program("VAR x; x := 1 @ 2; PRINT x;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::Lexical(LexicalError::UnexpectedCharacter { character: '@', .. })
        ));
        assert_eq!(program.to_string(), "var x;\nprint x;\n");
    }

    #[test]
    fn test_incomplete_assign_inside_statement() {
        let (program, events) = program("VAR x; x : 1; PRINT 2;");
        let errors = errors(&events);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ParseError::Lexical(LexicalError::IncompleteAssign { .. })
        ));
        assert_eq!(program.to_string(), "var x;\nprint 2;\n");
    }

    #[test]
    fn test_integer_out_of_range() {
        let (program, events) = program("PRINT 99999999999999999999;");
        assert!(matches!(
            errors(&events)[0],
            ParseError::InvalidNumber { .. }
        ));
        assert!(program.0.is_empty());
    }

    #[test]
    fn test_multiple_errors_in_one_pass() {
        let (program, events) = program("VAR 1; x := ; PRINT 2; VAR y");
        assert_eq!(errors(&events).len(), 2);
        assert_eq!(program.to_string(), "print 2;\nvar y;\n");
    }

    fn print_one() -> Statement {
        Statement::Print(Expression::Literal(Literal::Integer(1)))
    }
}
