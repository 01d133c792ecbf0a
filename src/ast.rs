use std::fmt::Display;

use crate::{position::Position, tree_walk_interpreter::Value};

/// The compound root: statements in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    VarDeclaration {
        name: String,
        position: Position,
    },
    Assign {
        name: String,
        operator: Position,
        value: Expression,
    },
    Print(Expression),
    NoOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Variable {
        name: String,
        position: Position,
    },
    Binary {
        left: Box<Expression>,
        operator: InfixOperator,
        right: Box<Expression>,
        position: Position,
    },
    Unary(UnaryOperator, Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::VarDeclaration { name, .. } => write!(f, "var {};", name),
            Statement::Assign { name, value, .. } => write!(f, "{} := {};", name, value),
            Statement::Print(expr) => write!(f, "print {};", expr),
            Statement::NoOp => write!(f, ";"),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Variable { name, .. } => write!(f, "{}", name),
            Expression::Binary {
                left,
                operator,
                right,
                ..
            } => write!(f, "({} {} {})", operator, left, right),
            Expression::Unary(op, operand) => write!(f, "({} {})", op, operand),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::from(*self))
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}
