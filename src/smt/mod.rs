//! Satisfiability oracles used to find counterexamples to candidate solutions.

/// Errors raised by oracles.
mod error;

/// Oracle backed by an external SMT solver process.
mod proc;

mod sample;

/// SMT-LIB commands and rendering of expressions.
mod script;

use std::rc::Rc;

use indexmap::IndexSet;

pub use error::OracleError;
pub use proc::SmtOracle;
pub use sample::SampleOracle;
pub(crate) use script::escape_smt_identifier_name;
pub use script::{Command, Script, ToSmt};

use crate::{ast::Node, context::Variable, spec::Point};

/// Decides satisfiability of ground formulas over the specification variables.
pub trait Oracle {
    /// Returns a point satisfying `formula`, or `None` if the formula is unsatisfiable.
    /// The point holds one value for every variable in `vars`, in order.
    fn find_model(
        &mut self,
        formula: &Node,
        vars: &IndexSet<Rc<Variable>>,
    ) -> Result<Option<Point>, OracleError>;
}
