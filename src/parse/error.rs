use thiserror::Error;

use crate::{ast::error::ContextError, context::Sort, grammar::GrammarError};

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("syntax error at {line}:{column}: expected {expected}")]
    Syntax {
        line: usize,
        column: usize,
        expected: String,
    },
    #[error("malformed {0}")]
    Malformed(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("undeclared symbol {0}")]
    Undeclared(String),
    #[error("unknown sort {0}")]
    UnknownSort(String),
    #[error("expected {expected}, found {found} in {term}")]
    SortMismatch {
        term: String,
        expected: Sort,
        found: Sort,
    },
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The benchmark cannot be solved with the supported theories.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("no logic set")]
    NoLogic,
    #[error("more than one logic set: {0} and {1}")]
    MultipleLogics(String, String),
    #[error("unsupported logic {0}")]
    UnsupportedLogic(String),
    #[error("no function to synthesize")]
    NoTargets,
}
