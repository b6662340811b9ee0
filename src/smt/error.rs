use std::io;

use thiserror::Error;

/// Errors raised while asking an oracle for a model.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("I/O error while talking to the solver: {0}")]
    Io(#[from] io::Error),
    #[error("solver returned an error: {0}")]
    Solver(String),
    #[error("solver could not decide the query: {0}")]
    Unknown(String),
    #[error("could not read model: {0}")]
    Model(String),
}
