//! A GROQ subset sufficient for the marketplace's document queries.
//!
//! Queries are parsed once and evaluated against an in-memory [`Dataset`].
//! Parameters are always passed as a JSON object and never spliced into
//! query text.

pub mod ast;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::Expr;
pub use eval::{evaluate, Dataset, EvalError};
pub use parser::{parse, ParseError};

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum GroqError {
    #[error("invalid query: {0}")]
    Parse(#[from] ParseError),
    #[error("query evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// Parse and evaluate `source` in one step.
pub fn query(source: &str, dataset: &Dataset, params: &Value) -> Result<Value, GroqError> {
    let expr = parse(source)?;
    tracing::trace!(documents = dataset.len(), "evaluating groq query");
    Ok(evaluate(&expr, dataset, params)?)
}
