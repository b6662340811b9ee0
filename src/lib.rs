pub mod ast;
pub mod context;
mod engine;
mod error;
pub mod grammar;
mod options;
pub mod parse;
mod rewrite;
pub mod sexp;
pub mod smt;
pub mod solver;
pub mod spec;
pub mod theory;
pub mod verify;

use std::io::Read;

pub use context::Context;
pub use engine::{massage_constraints, Engine, Strategy};
pub use error::{ErrorRepr, PublicError as Error};
pub use options::{OracleKind, SynthOptions};
pub use parse::{parse_benchmark, Benchmark};
pub use rewrite::{format_definition, rewrite_solution};

/// Reads a SyGuS benchmark and synthesizes its targets.
/// Returns one `define-fun` per target, in declaration order.
pub fn synthesize(mut input: impl Read, options: SynthOptions) -> Result<Vec<String>, Error> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    let mut ctx = Context::default();
    let benchmark = parse_benchmark(&text, &mut ctx)?;
    let engine = Engine::with_options(options);
    let bodies = engine.solve(&benchmark, &mut ctx)?;
    Ok(benchmark
        .targets
        .iter()
        .zip(&bodies)
        .map(|(t, b)| format_definition(t, b))
        .collect())
}
