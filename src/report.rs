use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    parser,
    trace::{Phase, TraceEvent},
    tree_walk_interpreter::{Interpreter, Value},
};

/// Everything one run produced.
///
/// `trace` is the rendered form of `events` followed by a final-state line.
/// It is kept even when the run stopped on a runtime error, together with the
/// variables as they were at that point.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub trace: String,
    pub variables: BTreeMap<String, Value>,
    pub fatal_error: Option<String>,
    #[serde(skip)]
    pub events: Vec<TraceEvent>,
}

/// Scans, parses and runs one program from scratch.
pub fn parse_and_run(source: &str) -> Report {
    let (program, mut events) = parser::program(source);
    tracing::info!(
        statements = program.0.len(),
        errors = events.iter().filter(|event| event.is_error()).count(),
        "parsed program"
    );

    let mut interpreter = Interpreter::new();
    let result = interpreter.interpret(&program);
    let (run_events, globals) = interpreter.finish();
    events.extend(run_events);

    let fatal_error = match result {
        Ok(()) => None,
        Err(error) => {
            let message = error.to_string();
            events.push(TraceEvent::Runtime(error));
            Some(message)
        }
    };

    Report::new(events, globals.values(), fatal_error)
}

impl Report {
    fn new(
        events: Vec<TraceEvent>,
        variables: BTreeMap<String, Value>,
        fatal_error: Option<String>,
    ) -> Self {
        let trace = events
            .iter()
            .map(ToString::to_string)
            .chain(std::iter::once(final_state(&variables)))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            trace,
            variables,
            fatal_error,
            events,
        }
    }

    pub fn error_count(&self) -> usize {
        self.events.iter().filter(|event| event.is_error()).count()
    }

    /// The events grouped under one heading per compiler phase, with the
    /// symbol table listed in the semantic section.
    pub fn phases(&self) -> String {
        let mut sections = Vec::new();

        for phase in [
            Phase::Lexical,
            Phase::Syntax,
            Phase::Semantic,
            Phase::Execution,
        ] {
            let mut lines: Vec<String> = self
                .events
                .iter()
                .filter(|event| event.phase() == phase)
                .map(ToString::to_string)
                .collect();

            if phase == Phase::Semantic {
                lines.extend(self.variables.iter().map(|(name, value)| {
                    format!("ID: {}, Type: {}, Value: {}", name, value.type_name(), value)
                }));
            }

            if lines.is_empty() {
                lines.push(empty_section(phase).to_string());
            }

            sections.push(format!("--- {} ---\n{}", phase, lines.join("\n")));
        }

        sections.join("\n")
    }
}

fn final_state(variables: &BTreeMap<String, Value>) -> String {
    if variables.is_empty() {
        return "Final state: (no variables)".to_string();
    }

    let bindings = variables
        .iter()
        .map(|(name, value)| format!("{} = {}", name, value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Final state: {}", bindings)
}

fn empty_section(phase: Phase) -> &'static str {
    match phase {
        Phase::Lexical => "No lexical errors",
        Phase::Syntax => "No syntax errors",
        Phase::Semantic => "No variables declared",
        Phase::Execution => "No output",
    }
}
