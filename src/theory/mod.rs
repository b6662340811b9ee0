//! Background theories: concrete values, evaluation, and the theory of a SyGuS logic.

mod eval;
mod value;

use std::fmt::Display;

pub use eval::{apply_op, EvalError, Evaluator, Interpretation};
pub use value::{bv_mask, Value};

/// The background theories the synthesizer supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theory {
    /// Linear integer arithmetic
    Lia,
    /// Fixed-width bit-vectors
    Bv,
    /// Strings with linear integer arithmetic
    Slia,
}

impl Theory {
    /// Resolves a `set-logic` name to its theory.
    /// Quantifier-free prefixes and the `N` (non-linear) marker are accepted.
    pub fn from_logic(logic: &str) -> Option<Theory> {
        let core = logic.trim_start_matches("QF_");
        match core {
            "LIA" | "NIA" | "ALL" => Some(Theory::Lia),
            "BV" | "UFBV" => Some(Theory::Bv),
            "SLIA" | "S" | "UFSLIA" => Some(Theory::Slia),
            "UFLIA" => Some(Theory::Lia),
            _ => None,
        }
    }
}

impl Display for Theory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theory::Lia => write!(f, "LIA"),
            Theory::Bv => write!(f, "BV"),
            Theory::Slia => write!(f, "SLIA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logics_resolve() {
        assert_eq!(Theory::from_logic("LIA"), Some(Theory::Lia));
        assert_eq!(Theory::from_logic("QF_UFLIA"), Some(Theory::Lia));
        assert_eq!(Theory::from_logic("BV"), Some(Theory::Bv));
        assert_eq!(Theory::from_logic("SLIA"), Some(Theory::Slia));
        assert_eq!(Theory::from_logic("LRA"), None);
    }
}
