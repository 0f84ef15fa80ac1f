//! The `${{ … }}` expression sub-language: lexer, parser, evaluator,
//! built-in functions and template interpolation.

pub mod ast;
pub mod context;
mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

use thiserror::Error;

pub use context::{
    EvalContext, GithubContext, JobContext, JobsContextEntry, NeedsContext, RunnerContext,
    StepsContextEntry, StrategyContext,
};
pub use eval::Evaluator;
pub use functions::{cast_to_string, Functions};
pub use value::{JsObject, JsValue, PathSegment};

/// Errors produced while lexing, parsing, or evaluating an expression.
#[derive(Debug, Error)]
pub enum ExprError {
    /// Lex or parse error with a 1-based line/column and byte offset.
    #[error("{line}:{column}:{offset}: {message}")]
    Parse {
        line: usize,
        column: usize,
        offset: usize,
        message: String,
    },

    /// An access path hit a value that cannot be indexed.
    #[error(transparent)]
    Access(#[from] value::AccessError),

    /// A host value could not be projected into the dynamic model.
    #[error(transparent)]
    Convert(#[from] value::ConvertError),

    /// Arrays and objects have no string form.
    #[error("cannot convert {0} to string")]
    Cast(value::JsType),

    /// A `${{` span with no matching `}}`.
    #[error("no matching '}}}}' for '${{{{' at offset {offset}")]
    UnterminatedExpression { offset: usize },

    /// Any other evaluation failure.
    #[error("{0}")]
    Eval(String),
}
