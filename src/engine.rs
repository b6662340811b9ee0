use std::{fmt::Display, rc::Rc, time::Instant};

use crate::{
    ast::{
        transform::{ackermann_reduce, flatten_lets, inline_macros, rewrite_ite},
        FunctionInfo, Node,
    },
    context::Context,
    grammar::{default_grammar, merge_grammars, Grammar, ReverseMapping},
    options::{OracleKind, SynthOptions},
    parse::Benchmark,
    rewrite::rewrite_solution,
    smt::{Oracle, SampleOracle, SmtOracle},
    solver::{
        CegisOptions, DecisionTreeUnifier, GeneratorFactory, LiaTermSolver, LiaUnifier,
        NullUnifier, PointDistinctTermSolver, PointlessTermSolver, Solutions, SynthError,
        TermSolver, Unifier,
    },
    spec::{make_specification, Specification},
    theory::Theory,
    verify::Verifier,
};

use crate::error::PublicError as Error;

/// The algorithms a benchmark can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Terms read off linear integer constraints, combined by their preconditions
    Lia,
    /// Enumerated terms combined by a decision tree over enumerated predicates
    Unification,
    /// Enumeration of whole solutions, pruning terms that agree on all points
    Classic,
    /// Enumeration of whole solutions without pruning
    Memoryless,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Lia => write!(f, "LIA unification"),
            Strategy::Unification => write!(f, "decision-tree unification"),
            Strategy::Classic => write!(f, "classic enumeration"),
            Strategy::Memoryless => write!(f, "memoryless enumeration"),
        }
    }
}

/// Instantiates macros, flattens lets, eliminates uninterpreted functions, and makes conditionals explicit.
pub fn massage_constraints(constraints: &[Node], ctx: &mut Context) -> Vec<Node> {
    let t = Instant::now();
    let flat: Vec<Node> = constraints
        .iter()
        .map(|c| {
            let inlined = inline_macros(c, ctx);
            flatten_lets(&inlined, ctx)
        })
        .collect();
    let reduced = ackermann_reduce(&flat, ctx);
    let res: Vec<Node> = reduced.iter().map(|c| rewrite_ite(c, ctx)).collect();
    log::debug!("Massaged {} constraints in {:?}", res.len(), t.elapsed());
    res
}

/// The main engine.
/// It classifies the specification of a benchmark, picks a strategy, and runs the synthesis loop.
pub struct Engine {
    options: SynthOptions,
}

impl Engine {
    pub fn with_options(options: SynthOptions) -> Self {
        Self { options }
    }

    /// Synthesizes one body per target of the benchmark, in declaration order.
    /// The bodies refer to the targets' named parameters.
    pub fn solve(&self, benchmark: &Benchmark, ctx: &mut Context) -> Result<Vec<Node>, Error> {
        let constraints = massage_constraints(&benchmark.constraints, ctx);
        let targets = benchmark.targets.clone();

        let mut grammars = Vec::with_capacity(targets.len());
        for (target, grammar) in targets.iter().zip(&benchmark.grammars) {
            let grammar = match grammar {
                Some(g) => g.clone(),
                None => default_grammar(benchmark.theory, target, ctx)?,
            };
            log::debug!("Grammar of {}:\n{}", target, grammar);
            grammars.push((target.clone(), grammar));
        }

        let spec = make_specification(&constraints, &targets, ctx)?;
        log::info!("Using a {} specification", spec.kind_name());
        if self.options.print_spec {
            print!("{}", spec);
        }

        let (solution, reverse_mapping) = if !matches!(spec, Specification::MultiPoint(_)) {
            self.solve_single_invocation(benchmark.theory, &spec, &grammars, ctx)?
        } else {
            let grammar = joint_grammar(&grammars);
            let solution = self.run(Strategy::Memoryless, &spec, grammar, None, ctx)?;
            (solution, vec![])
        };
        log::debug!("Solution: {}", solution);
        Ok(rewrite_solution(&targets, &solution, &reverse_mapping, ctx)?)
    }

    fn solve_single_invocation(
        &self,
        theory: Theory,
        spec: &Specification,
        grammars: &[(Rc<FunctionInfo>, Grammar)],
        ctx: &mut Context,
    ) -> Result<(Node, Vec<ReverseMapping>), SynthError> {
        let lia_default = theory == Theory::Lia
            && grammars
                .iter()
                .all(|(t, g)| g.is_default() && t.range().is_int());
        if lia_default {
            match self.solve_lia(spec, ctx) {
                Ok(Some(solution)) => return Ok((solution, vec![])),
                Ok(None) => log::info!("Constraints do not have the shape required by {}", Strategy::Lia),
                Err(e @ (SynthError::Uncovered(_) | SynthError::Exhausted)) => {
                    log::info!("{} failed ({}), falling back", Strategy::Lia, e)
                }
                Err(e) => return Err(e),
            }
        }

        if grammars.len() > 1 {
            let grammar = joint_grammar(grammars);
            let solution = self.run(Strategy::Classic, spec, grammar, None, ctx)?;
            return Ok((solution, vec![]));
        }
        let grammar = grammars[0].1.clone();
        match grammar.decompose(ctx) {
            Some(d) if has_unique_args(spec) => {
                let solution = self.run(
                    Strategy::Unification,
                    spec,
                    d.term_grammar,
                    Some(d.pred_grammar),
                    ctx,
                )?;
                Ok((solution, d.reverse_mapping))
            }
            Some(_) => {
                log::info!("Targets are not applied to a unique argument tuple");
                Ok((self.run(Strategy::Classic, spec, grammar, None, ctx)?, vec![]))
            }
            None => {
                log::info!("Grammar is not decomposable");
                Ok((self.run(Strategy::Classic, spec, grammar, None, ctx)?, vec![]))
            }
        }
    }

    fn solve_lia(&self, spec: &Specification, ctx: &mut Context) -> Result<Option<Node>, SynthError> {
        let (Some(term_solver), Some(unifier)) =
            (LiaTermSolver::new(spec, ctx), LiaUnifier::new(spec, ctx))
        else {
            return Ok(None);
        };
        log::info!("Using {}", Strategy::Lia);
        let options = CegisOptions {
            max_rounds: self.options.max_rounds,
            verify_term_solve: true,
        };
        self.first_solution(spec, ctx, Box::new(term_solver), Box::new(unifier), options)
            .map(Some)
    }

    /// Runs one of the enumerative strategies.
    /// `pred_grammar` is required for [`Strategy::Unification`].
    fn run(
        &self,
        strategy: Strategy,
        spec: &Specification,
        grammar: Grammar,
        pred_grammar: Option<Grammar>,
        ctx: &mut Context,
    ) -> Result<Node, SynthError> {
        log::info!("Using {}", strategy);
        let max_size = self.options.max_size;
        let (factory, one_term, verify_term_solve) = match strategy {
            Strategy::Unification => (GeneratorFactory::Recursive, false, true),
            Strategy::Classic => (GeneratorFactory::PointDistinct, true, false),
            Strategy::Memoryless => (GeneratorFactory::Recursive, true, false),
            Strategy::Lia => {
                return Err(SynthError::Internal(
                    "LIA strategy does not enumerate".to_string(),
                ))
            }
        };
        let enumerator = factory
            .generator(grammar, max_size)
            .ok_or_else(|| SynthError::Internal(format!("no generator for {}", strategy)))?;
        let term_solver: Box<dyn TermSolver> = match factory {
            GeneratorFactory::PointDistinct => {
                Box::new(PointDistinctTermSolver::new(enumerator, one_term))
            }
            _ => Box::new(PointlessTermSolver::new(enumerator, one_term)),
        };
        let unifier: Box<dyn Unifier> = match (strategy, pred_grammar) {
            (Strategy::Unification, Some(pg)) => Box::new(DecisionTreeUnifier::new(
                pg,
                max_size,
                self.options.pred_budget,
            )),
            (Strategy::Unification, None) => {
                return Err(SynthError::Internal(
                    "decision-tree unification needs a predicate grammar".to_string(),
                ))
            }
            _ => Box::new(NullUnifier),
        };
        let options = CegisOptions {
            max_rounds: self.options.max_rounds,
            verify_term_solve,
        };
        self.first_solution(spec, ctx, term_solver, unifier, options)
    }

    fn first_solution(
        &self,
        spec: &Specification,
        ctx: &mut Context,
        term_solver: Box<dyn TermSolver>,
        unifier: Box<dyn Unifier>,
        options: CegisOptions,
    ) -> Result<Node, SynthError> {
        let t = Instant::now();
        let verifier = Verifier::for_spec(spec, self.oracle()?);
        let mut solutions = Solutions::new(
            spec,
            ctx,
            term_solver,
            unifier,
            Box::new(verifier),
            options,
        );
        let res = solutions.next().unwrap_or(Err(SynthError::Exhausted));
        log::info!(
            "Synthesis took {} rounds over {} points ({:?})",
            solutions.rounds(),
            solutions.points().len(),
            t.elapsed()
        );
        res
    }

    fn oracle(&self) -> Result<Box<dyn Oracle>, SynthError> {
        Ok(match self.options.oracle {
            OracleKind::Smt => Box::new(SmtOracle::new(&self.options.solver_cmd)?),
            OracleKind::Sample => Box::new(SampleOracle::new(self.options.sample_bound)),
        })
    }
}

/// Returns true if the predicates of a decision tree can be evaluated on the target's arguments at every point.
fn has_unique_args(spec: &Specification) -> bool {
    match spec {
        Specification::Pbe(_) => true,
        Specification::Standard(s) => s.targets.len() == 1 && s.canonical.common_args().is_some(),
        Specification::MultiPoint(_) => false,
    }
}

/// The grammar of a single target, or the merged grammar of several.
fn joint_grammar(grammars: &[(Rc<FunctionInfo>, Grammar)]) -> Grammar {
    match grammars {
        [(_, g)] => g.clone(),
        _ => merge_grammars(grammars),
    }
}
