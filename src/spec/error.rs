use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SpecError {
    /// A symbol in the specification was not created by the context.
    #[error("Expression {0} is not bound to the synthesis context")]
    Binding(String),
    /// The specification refers to formal parameters.
    #[error("Specification contains the formal parameter {0}")]
    MalformedSpec(String),
    /// The clauses of the specification invoke the targets with more than one argument tuple.
    #[error("Specification is not single-invocation: {0}")]
    NotSingleInvocation(String),
}
