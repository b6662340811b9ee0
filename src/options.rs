const DEFAULT_MAX_SIZE: usize = 16;
const DEFAULT_MAX_ROUNDS: usize = 1000;
const DEFAULT_SAMPLE_BOUND: i64 = 4;
const DEFAULT_SOLVER_CMD: &str = "z3 -in";
const DEFAULT_PRED_BUDGET: usize = 512;

/// How candidates are checked for counterexamples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OracleKind {
    /// An SMT solver process speaking SMT-LIB on its standard input
    Smt,
    /// Exhaustive evaluation over small values
    Sample,
}

#[derive(Debug, Clone)]
pub struct SynthOptions {
    /// The largest term size the enumerators produce.
    /// Once every term up to this size was tried, the search gives up.
    pub max_size: usize,
    /// The maximum number of verification rounds per strategy before giving up.
    pub max_rounds: usize,
    /// The oracle used for verification.
    pub oracle: OracleKind,
    /// The command line that starts the SMT solver.
    /// The solver must read SMT-LIB from its standard input.
    pub solver_cmd: String,
    /// Largest absolute value of an integer (and of a bit-vector) tried by the sample oracle.
    pub sample_bound: i64,
    /// The number of predicates the decision-tree unifier may enumerate per attempt before asking for more terms.
    pub pred_budget: usize,
    /// Prints the classified specification before solving.
    pub print_spec: bool,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_rounds: DEFAULT_MAX_ROUNDS,
            oracle: OracleKind::Smt,
            solver_cmd: DEFAULT_SOLVER_CMD.to_string(),
            sample_bound: DEFAULT_SAMPLE_BOUND,
            pred_budget: DEFAULT_PRED_BUDGET,
            print_spec: false,
        }
    }
}

impl SynthOptions {
    /// Options that verify with the sample oracle, without an external solver.
    pub fn sampling(bound: i64) -> Self {
        Self {
            oracle: OracleKind::Sample,
            sample_bound: bound,
            ..Default::default()
        }
    }
}
