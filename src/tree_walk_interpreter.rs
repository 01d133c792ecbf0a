mod scope;

use std::fmt::Display;

use crate::{
    ast::{Expression, InfixOperator, Literal, Program, Statement, UnaryOperator},
    position::Position,
    trace::TraceEvent,
};

pub use self::scope::Globals;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Integer(n) => n as f64,
            Value::Float(n) => n,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Value::Integer(n) => n == 0,
            Value::Float(n) => n == 0.0,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Value::Integer(_) => "INT",
            Value::Float(_) => "FLOAT",
        }
    }

    fn negate(self) -> Value {
        match self {
            Value::Integer(n) => n
                .checked_neg()
                .map(Value::Integer)
                .unwrap_or(Value::Float(-(n as f64))),
            Value::Float(n) => Value::Float(-n),
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Integer(n) => Value::Integer(n),
            Literal::Float(n) => Value::Float(n),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{:.1}", n),
            Value::Float(n) => write!(f, "{}", n),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Runtime Error: {kind} (in `{statement}`)")]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub statement: Statement,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("Name Error: cannot assign to undeclared variable '{name}' at {position}")]
    UndeclaredAssignment { name: String, position: Position },
    #[error("Name Error: variable '{name}' is not defined at {position}")]
    UndefinedVariable { name: String, position: Position },
    #[error("Name Error: variable '{name}' is used before it is assigned at {position}")]
    UnassignedVariable { name: String, position: Position },
    #[error("Division By Zero: right operand of '/' is zero at {position}")]
    DivisionByZero { position: Position },
}

impl ExecutionErrorKind {
    pub fn is_name_error(&self) -> bool {
        !matches!(self, ExecutionErrorKind::DivisionByZero { .. })
    }
}

/// Walks a parsed program statement by statement.
///
/// Declarations, printed values and warnings are collected as trace events.
/// The first runtime error stops the walk; whatever was executed before it
/// stays visible through [`Interpreter::globals`] and [`Interpreter::events`].
#[derive(Debug, Default)]
pub struct Interpreter {
    globals: Globals,
    events: Vec<TraceEvent>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interpret(&mut self, program: &Program) -> Result<(), ExecutionError> {
        for stmt in program.0.iter() {
            tracing::debug!(statement = %stmt, "executing");
            if let Err(kind) = self.execute(stmt) {
                let error = ExecutionError {
                    kind,
                    statement: stmt.clone(),
                };
                tracing::warn!(%error, "execution stopped");
                return Err(error);
            }
        }

        Ok(())
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn finish(self) -> (Vec<TraceEvent>, Globals) {
        (self.events, self.globals)
    }

    fn execute(&mut self, stmt: &Statement) -> Result<(), ExecutionErrorKind> {
        match stmt {
            Statement::VarDeclaration { name, .. } => {
                let event = if self.globals.declare(name) {
                    TraceEvent::Declared(name.clone())
                } else {
                    TraceEvent::Redeclared(name.clone())
                };
                self.events.push(event);
            }
            Statement::Assign {
                name,
                operator,
                value,
            } => {
                if !self.globals.is_declared(name) {
                    return Err(ExecutionErrorKind::UndeclaredAssignment {
                        name: name.clone(),
                        position: *operator,
                    });
                }
                let value = self.evaluate(value)?;
                self.globals.assign(name, value);
            }
            Statement::Print(expression) => {
                let value = self.evaluate(expression)?;
                self.events.push(TraceEvent::Output(value));
            }
            Statement::NoOp => {}
        }

        Ok(())
    }

    fn evaluate(&self, expression: &Expression) -> Result<Value, ExecutionErrorKind> {
        match expression {
            Expression::Literal(literal) => Ok(Value::from(*literal)),
            Expression::Variable { name, position } => self.globals.get(name, *position),
            Expression::Unary(op, operand) => {
                let operand = self.evaluate(operand)?;
                match op {
                    UnaryOperator::Plus => Ok(operand),
                    UnaryOperator::Negate => Ok(operand.negate()),
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
                position,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                match operator {
                    InfixOperator::Plus => {
                        Ok(arithmetic(left, right, i64::checked_add, |a, b| a + b))
                    }
                    InfixOperator::Minus => {
                        Ok(arithmetic(left, right, i64::checked_sub, |a, b| a - b))
                    }
                    InfixOperator::Multiply => {
                        Ok(arithmetic(left, right, i64::checked_mul, |a, b| a * b))
                    }
                    InfixOperator::Divide => {
                        if right.is_zero() {
                            return Err(ExecutionErrorKind::DivisionByZero {
                                position: *position,
                            });
                        }
                        Ok(Value::Float(left.as_f64() / right.as_f64()))
                    }
                }
            }
        }
    }
}

/// Integer arithmetic while both sides are integers and the result fits,
/// float arithmetic otherwise.
fn arithmetic(
    left: Value,
    right: Value,
    integer: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Value {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => integer(a, b)
            .map(Value::Integer)
            .unwrap_or_else(|| Value::Float(float(a as f64, b as f64))),
        (a, b) => Value::Float(float(a.as_f64(), b.as_f64())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn interpret(source: &str) -> (Interpreter, Result<(), ExecutionError>) {
        let (program, _) = crate::parser::program(source);
        let mut interpreter = Interpreter::new();
        let result = interpreter.interpret(&program);
        (interpreter, result)
    }

    fn outputs(interpreter: &Interpreter) -> Vec<String> {
        interpreter
            .events()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Output(value) => Some(value.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_integer_arithmetic() {
        let (interpreter, result) = interpret("VAR x; x := 2 + 3 * 4 - -1; PRINT x;");
        assert!(result.is_ok());
        assert_eq!(outputs(&interpreter), vec!["15"]);
    }

    #[test]
    fn test_division_yields_float() {
        let (interpreter, result) = interpret("PRINT 10 / 4; PRINT 10 / 2; PRINT 1.5 * 2;");
        assert!(result.is_ok());
        assert_eq!(outputs(&interpreter), vec!["2.5", "5.0", "3.0"]);
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        let (interpreter, result) = interpret("PRINT 9223372036854775807 + 1;");
        assert!(result.is_ok());
        assert_eq!(
            interpreter.events(),
            &[TraceEvent::Output(Value::Float(9223372036854775808.0))]
        );
    }

    #[test]
    fn test_declaration_events() {
        let (interpreter, result) = interpret("VAR x; x := 3; VAR x; PRINT x;");
        assert!(result.is_ok());
        assert_eq!(
            interpreter.events(),
            &[
                TraceEvent::Declared("x".to_string()),
                TraceEvent::Redeclared("x".to_string()),
                TraceEvent::Output(Value::Integer(3)),
            ]
        );
    }

    #[test]
    fn test_undefined_variable_stops_execution() {
        let (interpreter, result) = interpret("PRINT 1; PRINT y; PRINT 2;");
        let error = result.unwrap_err();
        assert!(matches!(
            error.kind,
            ExecutionErrorKind::UndefinedVariable { ref name, .. } if name == "y"
        ));
        assert_eq!(outputs(&interpreter), vec!["1"]);
    }

    #[test]
    fn test_assign_to_undeclared_variable() {
        let (interpreter, result) = interpret("y := 1 / 0;");
        assert!(matches!(
            result.unwrap_err().kind,
            ExecutionErrorKind::UndeclaredAssignment { .. }
        ));
        assert!(interpreter.globals().is_empty());
    }

    #[test]
    fn test_division_by_zero_keeps_state() {
        let (interpreter, result) = interpret("VAR x; x := 1; x := x / 0.0;");
        let error = result.unwrap_err();
        assert!(matches!(
            error.kind,
            ExecutionErrorKind::DivisionByZero { .. }
        ));
        assert_eq!(
            interpreter.globals().values().get("x"),
            Some(&Value::Integer(1))
        );
    }

    #[test]
    fn test_error_message() {
        let (_, result) = interpret("VAR x;\nPRINT x;");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Runtime Error: Name Error: variable 'x' is used before it is assigned at line 2, column 7 (in `print x;`)"
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Integer(-4).to_string(), "-4");
        assert_eq!(Value::Float(0.1 + 0.2).to_string(), "0.30000000000000004");
        assert_eq!(Value::Float(-2.0).to_string(), "-2.0");
    }
}
