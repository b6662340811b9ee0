use thiserror::Error;

use crate::{
    grammar::GrammarError,
    parse::{ConfigError, ParseError},
    solver::SynthError,
    spec::SpecError,
};

#[derive(Error, Debug)]
#[error(transparent)]
pub struct PublicError(#[from] pub ErrorRepr);

#[derive(Debug, Error)]
pub enum ErrorRepr {
    #[error("failed to read the benchmark: {0}")]
    Io(std::io::Error),

    /// An error that occured while reading the benchmark.
    #[error("failed to parse the benchmark: {0}")]
    ParseError(ParseError),

    #[error("invalid benchmark: {0}")]
    ConfigError(ConfigError),

    #[error("invalid grammar: {0}")]
    GrammarError(GrammarError),

    #[error("invalid specification: {0}")]
    SpecError(SpecError),

    /// An error that occured during synthesis.
    #[error("synthesis failed: {0}")]
    SynthError(SynthError),
}

// Resolve transitive conversion

impl From<std::io::Error> for PublicError {
    fn from(err: std::io::Error) -> Self {
        PublicError(ErrorRepr::Io(err))
    }
}

impl From<ParseError> for PublicError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Config(e) => PublicError(ErrorRepr::ConfigError(e)),
            e => PublicError(ErrorRepr::ParseError(e)),
        }
    }
}

impl From<ConfigError> for PublicError {
    fn from(err: ConfigError) -> Self {
        PublicError(ErrorRepr::ConfigError(err))
    }
}

impl From<GrammarError> for PublicError {
    fn from(err: GrammarError) -> Self {
        PublicError(ErrorRepr::GrammarError(err))
    }
}

impl From<SpecError> for PublicError {
    fn from(err: SpecError) -> Self {
        PublicError(ErrorRepr::SpecError(err))
    }
}

impl From<SynthError> for PublicError {
    fn from(err: SynthError) -> Self {
        match err {
            SynthError::Spec(e) => PublicError(ErrorRepr::SpecError(e)),
            e => PublicError(ErrorRepr::SynthError(e)),
        }
    }
}

impl PublicError {
    pub fn kind(&self) -> &ErrorRepr {
        &self.0
    }
}
