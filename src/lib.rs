pub mod ast;
pub mod parser;
pub mod position;
pub mod report;
pub mod tokenizer;
pub mod trace;
pub mod tree_walk_interpreter;

pub use report::{parse_and_run, Report};
