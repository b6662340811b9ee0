use thiserror::Error;

use crate::{smt::OracleError, spec::SpecError};

/// Errors that end a synthesis run.
#[derive(Debug, Error)]
pub enum SynthError {
    /// The grammar has no more terms within the size limit.
    #[error("search space exhausted")]
    Exhausted,
    #[error("no solution after {0} rounds")]
    RoundLimit(usize),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Spec(#[from] SpecError),
    /// The verifier reported a point that does not refute the candidate.
    #[error("spurious counterexample: {0}")]
    SpuriousCounterexample(String),
    /// A point at which none of the candidate terms satisfies the specification.
    #[error("no candidate term covers {0}")]
    Uncovered(String),
    #[error("internal error: {0}")]
    Internal(String),
}
