use crate::context::Sort;

/// The error type that can occur when declaring symbols or building nodes
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
    #[error("Symbol {0} already declared")]
    AlreadyDeclared(String),

    #[error("Ill-sorted application of {0} to arguments of sorts ({})", .1.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", "))]
    SortMismatch(String, Vec<Sort>),

    #[error("Unknown symbol {0}")]
    Unknown(String),
}
