use std::fmt::Display;

use crate::{
    parser::ParseError,
    position::Position,
    tokenizer::TokenKind,
    tree_walk_interpreter::{ExecutionError, Value},
};

/// One line of the run trace, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Parse(ParseError),
    Recovered {
        skipped: usize,
        resumed_at: TokenKind,
        position: Position,
    },
    Declared(String),
    Redeclared(String),
    Output(Value),
    Runtime(ExecutionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Lexical,
    Syntax,
    Semantic,
    Execution,
}

impl TraceEvent {
    pub fn phase(&self) -> Phase {
        match self {
            TraceEvent::Parse(ParseError::Lexical(_)) => Phase::Lexical,
            TraceEvent::Parse(_) | TraceEvent::Recovered { .. } => Phase::Syntax,
            TraceEvent::Declared(_) | TraceEvent::Redeclared(_) => Phase::Semantic,
            TraceEvent::Runtime(error) if error.kind.is_name_error() => Phase::Semantic,
            TraceEvent::Output(_) | TraceEvent::Runtime(_) => Phase::Execution,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TraceEvent::Parse(_) | TraceEvent::Runtime(_))
    }
}

impl Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEvent::Parse(error) => write!(f, "{}", error),
            TraceEvent::Recovered {
                skipped,
                resumed_at,
                position,
            } => write!(
                f,
                "Recovered after skipping {} token(s), resuming at {} ({})",
                skipped, resumed_at, position
            ),
            TraceEvent::Declared(name) => write!(f, "Declared variable '{}'", name),
            TraceEvent::Redeclared(name) => write!(
                f,
                "Warning: variable '{}' is already declared, keeping its current value",
                name
            ),
            TraceEvent::Output(value) => write!(f, "{}", value),
            TraceEvent::Runtime(error) => write!(f, "{}", error),
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Lexical => write!(f, "Lexical Analysis"),
            Phase::Syntax => write!(f, "Syntax Analysis"),
            Phase::Semantic => write!(f, "Semantic Analysis (Symbol Table)"),
            Phase::Execution => write!(f, "Execution"),
        }
    }
}
