//! The counterexample-guided synthesis loop and its components.
//!
//! A run alternates between proposing a candidate and verifying it.
//! Candidates are built by a [`TermSolver`], which enumerates terms until every known point is
//! satisfied by some term, and a [`Unifier`], which combines these terms into a single expression
//! that is correct on all known points. Each counterexample returned by the verifier becomes a new point.

mod dt;
mod error;
mod lia;
mod termsolver;
mod unifier;

use std::collections::HashSet;

pub use error::SynthError;
pub use lia::{LiaTermSolver, LiaUnifier};
pub use termsolver::{PointDistinctTermSolver, PointlessTermSolver};
pub use unifier::{DecisionTreeUnifier, NullUnifier};

use crate::{
    ast::Node,
    context::Context,
    grammar::{Enumerator, Grammar},
    spec::{Point, Signature, Specification},
    verify::{Verdict, Verify},
};

/// How term generators are built from grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorFactory {
    /// No generator; the term solver produces its terms itself.
    Null,
    /// Plain enumeration in order of increasing size.
    Recursive,
    /// Enumeration that skips terms equal on all known points.
    PointDistinct,
}

impl GeneratorFactory {
    pub fn generator(&self, grammar: Grammar, max_size: usize) -> Option<Enumerator> {
        match self {
            GeneratorFactory::Null => None,
            GeneratorFactory::Recursive => Some(Enumerator::new(grammar, max_size)),
            GeneratorFactory::PointDistinct => Some(Enumerator::point_distinct(grammar, max_size)),
        }
    }
}

/// Produces candidate terms together with the points each of them satisfies.
pub trait TermSolver {
    /// Notifies the solver that the last element of `points` is new.
    fn add_point(&mut self, spec: &Specification, points: &[Point]) -> Result<(), SynthError>;

    /// Generates terms until every point is satisfied by some term.
    /// Returns false if the terms ran out first.
    fn solve(
        &mut self,
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<bool, SynthError>;

    /// Generates terms until the set of terms returned by [`TermSolver::terms`] changes.
    /// Returns false if the terms ran out first.
    fn generate_more_terms(
        &mut self,
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<bool, SynthError>;

    /// The current terms with their signatures over all points.
    fn terms(&self) -> &[(Node, Signature)];
}

/// Result of a unification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unification {
    Candidate(Node),
    /// The terms cannot be combined with the predicates generated so far.
    NeedMoreTerms,
}

/// Combines terms into an expression that is correct on all points.
pub trait Unifier {
    fn add_point(&mut self, spec: &Specification, points: &[Point]) -> Result<(), SynthError>;

    fn unify(
        &mut self,
        terms: &[(Node, Signature)],
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<Unification, SynthError>;

    /// Returns true if asking again without new terms cannot give a different answer.
    fn is_exhausted(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CegisOptions {
    /// Number of verification rounds before giving up
    pub max_rounds: usize,
    /// Verify a single term that satisfies all points before unifying
    pub verify_term_solve: bool,
}

/// The candidates of a synthesis run that passed verification, in the order they were found.
///
/// Iteration ends after an error or when the search space is exhausted after at least one solution.
pub struct Solutions<'a> {
    spec: &'a Specification,
    ctx: &'a mut Context,
    term_solver: Box<dyn TermSolver + 'a>,
    unifier: Box<dyn Unifier + 'a>,
    verifier: Box<dyn Verify + 'a>,
    options: CegisOptions,

    points: Vec<Point>,
    found: HashSet<Node>,
    rounds: usize,
    /// Set after a solution was returned; the next solution must come from new terms
    pending_more: bool,
    done: bool,
}

impl<'a> Solutions<'a> {
    pub fn new(
        spec: &'a Specification,
        ctx: &'a mut Context,
        term_solver: Box<dyn TermSolver + 'a>,
        unifier: Box<dyn Unifier + 'a>,
        verifier: Box<dyn Verify + 'a>,
        options: CegisOptions,
    ) -> Self {
        Self {
            spec,
            ctx,
            term_solver,
            unifier,
            verifier,
            options,
            points: Vec::new(),
            found: HashSet::new(),
            rounds: 0,
            pending_more: false,
            done: false,
        }
    }

    /// The counterexamples collected so far.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Proposes a candidate that was not returned before, or `None` if the terms ran out.
    fn candidate(&mut self) -> Result<Option<Node>, SynthError> {
        if self.pending_more {
            self.pending_more = false;
            if !self
                .term_solver
                .generate_more_terms(self.spec, &self.points, self.ctx)?
            {
                return Ok(None);
            }
        }
        loop {
            if !self.term_solver.solve(self.spec, &self.points, self.ctx)? {
                return Ok(None);
            }
            if self.options.verify_term_solve {
                let single = self
                    .term_solver
                    .terms()
                    .iter()
                    .find(|(t, sig)| sig.is_full() && !self.found.contains(t));
                if let Some((t, _)) = single {
                    log::debug!("Term {} satisfies all {} points", t, self.points.len());
                    return Ok(Some(t.clone()));
                }
            }
            let unified = self.unifier.unify(
                self.term_solver.terms(),
                self.spec,
                &self.points,
                self.ctx,
            )?;
            match unified {
                Unification::Candidate(c) if !self.found.contains(&c) => return Ok(Some(c)),
                _ => {
                    let more = self
                        .term_solver
                        .generate_more_terms(self.spec, &self.points, self.ctx)?;
                    if !more && self.unifier.is_exhausted() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn round(&mut self) -> Result<Option<Node>, SynthError> {
        loop {
            if self.rounds >= self.options.max_rounds {
                return Err(SynthError::RoundLimit(self.rounds));
            }
            self.rounds += 1;
            let candidate = match self.candidate()? {
                Some(c) => c,
                None if self.found.is_empty() => return Err(SynthError::Exhausted),
                None => return Ok(None),
            };
            log::debug!("Round {}: verifying {}", self.rounds, candidate);
            match self.verifier.verify(self.spec, &candidate, self.ctx)? {
                Verdict::Valid => {
                    log::info!(
                        "Found solution after {} rounds and {} points",
                        self.rounds,
                        self.points.len()
                    );
                    self.found.insert(candidate.clone());
                    self.pending_more = true;
                    return Ok(Some(candidate));
                }
                Verdict::Counterexample(point) => {
                    if self.points.contains(&point) {
                        return Err(SynthError::SpuriousCounterexample(format!(
                            "{:?} was already known when verifying {}",
                            point, candidate
                        )));
                    }
                    self.points.push(point);
                    self.term_solver.add_point(self.spec, &self.points)?;
                    self.unifier.add_point(self.spec, &self.points)?;
                }
            }
        }
    }
}

impl Iterator for Solutions<'_> {
    type Item = Result<Node, SynthError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.round() {
            Ok(Some(solution)) => Some(Ok(solution)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        ast::{FunctionInfo, FunctionKind},
        context::Sort,
        spec::make_specification,
        theory::Value,
    };

    use super::*;

    /// Offers a fixed list of terms, one more on every request.
    struct ListTermSolver {
        pending: Vec<Node>,
        terms: Vec<(Node, Signature)>,
        points_seen: Rc<std::cell::Cell<usize>>,
        pulls: Rc<std::cell::Cell<usize>>,
    }

    impl ListTermSolver {
        fn new(mut terms: Vec<Node>) -> Self {
            terms.reverse();
            Self {
                pending: terms,
                terms: vec![],
                points_seen: Rc::default(),
                pulls: Rc::default(),
            }
        }

        fn counted(mut self, pulls: &Rc<std::cell::Cell<usize>>) -> Self {
            self.pulls = pulls.clone();
            self
        }

        fn observed(mut self, seen: &Rc<std::cell::Cell<usize>>) -> Self {
            self.points_seen = seen.clone();
            self
        }
    }

    impl TermSolver for ListTermSolver {
        fn add_point(&mut self, spec: &Specification, points: &[Point]) -> Result<(), SynthError> {
            self.points_seen.set(points.len());
            for (t, sig) in self.terms.iter_mut() {
                *sig = spec.term_signature(t, points);
            }
            Ok(())
        }

        fn solve(
            &mut self,
            spec: &Specification,
            points: &[Point],
            ctx: &mut Context,
        ) -> Result<bool, SynthError> {
            while !self.terms.iter().any(|(_, s)| s.is_full()) {
                if !self.generate_more_terms(spec, points, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        fn generate_more_terms(
            &mut self,
            spec: &Specification,
            points: &[Point],
            _: &mut Context,
        ) -> Result<bool, SynthError> {
            match self.pending.pop() {
                Some(t) => {
                    self.pulls.set(self.pulls.get() + 1);
                    let sig = spec.term_signature(&t, points);
                    self.terms.push((t, sig));
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn terms(&self) -> &[(Node, Signature)] {
            &self.terms
        }
    }

    /// Rejects the first `reject` candidates with made-up points.
    struct ScriptedVerifier {
        reject: usize,
        calls: Rc<std::cell::Cell<usize>>,
    }

    impl Verify for ScriptedVerifier {
        fn verify(
            &mut self,
            _: &Specification,
            _: &Node,
            _: &mut Context,
        ) -> Result<Verdict, SynthError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n < self.reject {
                Ok(Verdict::Counterexample(vec![Value::Int(n as i64)]))
            } else {
                Ok(Verdict::Valid)
            }
        }
    }

    fn setup(ctx: &mut Context) -> (Specification, Rc<FunctionInfo>) {
        let id = ctx.reserve_function_id();
        let a = ctx.local_var("a", Sort::Int);
        let f = ctx
            .declare_function(id, "f", vec![Sort::Int], Sort::Int, FunctionKind::Unknown(vec![a]))
            .unwrap();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let x = ctx.ast().variable(x);
        let fx = ctx.ast().call(&f, vec![x.clone()]).unwrap();
        let c = ctx.ast().ge(fx, x);
        (make_specification(&[c], &[f.clone()], ctx).unwrap(), f)
    }

    fn options() -> CegisOptions {
        CegisOptions {
            max_rounds: 100,
            verify_term_solve: false,
        }
    }

    #[test]
    fn accepted_first_candidate_takes_one_round() {
        let mut ctx = Context::default();
        let (spec, f) = setup(&mut ctx);
        let p = ctx.ast().param(f.params()[0].clone());
        let calls = Rc::new(std::cell::Cell::new(0));
        let verifier = ScriptedVerifier {
            reject: 0,
            calls: calls.clone(),
        };
        let mut solutions = Solutions::new(
            &spec,
            &mut ctx,
            Box::new(ListTermSolver::new(vec![p.clone()])),
            Box::new(NullUnifier::default()),
            Box::new(verifier),
            options(),
        );
        assert_eq!(solutions.next().unwrap().unwrap(), p);
        assert_eq!(solutions.rounds(), 1);
        assert!(solutions.points().is_empty());
        assert_eq!(calls.get(), 1);
        // the only term was returned already
        assert!(solutions.next().is_none());
    }

    #[test]
    fn accepted_first_candidate_pulls_one_term() {
        let mut ctx = Context::default();
        let (spec, f) = setup(&mut ctx);
        let p = ctx.ast().param(f.params()[0].clone());
        let one = ctx.ast().int(1);
        let two = ctx.ast().int(2);
        let p1 = ctx.ast().add(vec![p.clone(), one]);
        let p2 = ctx.ast().add(vec![p.clone(), two]);
        let pulls = Rc::new(std::cell::Cell::new(0));
        let verifier = ScriptedVerifier {
            reject: 0,
            calls: Rc::default(),
        };
        let mut solutions = Solutions::new(
            &spec,
            &mut ctx,
            Box::new(ListTermSolver::new(vec![p.clone(), p1, p2]).counted(&pulls)),
            Box::new(NullUnifier::default()),
            Box::new(verifier),
            options(),
        );
        assert_eq!(solutions.next().unwrap().unwrap(), p);
        assert_eq!(pulls.get(), 1);
    }

    #[test]
    fn every_rejection_adds_a_point() {
        let mut ctx = Context::default();
        let (spec, f) = setup(&mut ctx);
        let p = ctx.ast().param(f.params()[0].clone());
        let one = ctx.ast().int(1);
        let two = ctx.ast().int(2);
        let p1 = ctx.ast().add(vec![p.clone(), one]);
        let p2 = ctx.ast().add(vec![p.clone(), two]);
        let calls = Rc::new(std::cell::Cell::new(0));
        let seen = Rc::new(std::cell::Cell::new(0));
        let verifier = ScriptedVerifier {
            reject: 2,
            calls: calls.clone(),
        };
        let mut solutions = Solutions::new(
            &spec,
            &mut ctx,
            Box::new(ListTermSolver::new(vec![p.clone(), p1.clone(), p2.clone()]).observed(&seen)),
            Box::new(NullUnifier::default()),
            Box::new(verifier),
            options(),
        );
        let first = solutions.next().unwrap().unwrap();
        assert_eq!(solutions.points().len(), 2);
        assert_eq!(solutions.rounds(), 3);
        assert_eq!(calls.get(), 3);
        assert_eq!(seen.get(), 2);
        // the made-up points do not refute the first term, so it is offered again
        assert_eq!(first, p);
        // the next solution comes from a new term
        assert_eq!(solutions.next().unwrap().unwrap(), p1);
        assert_ne!(p1, p2);
    }

    #[test]
    fn repeated_counterexample_is_spurious() {
        struct SamePoint;
        impl Verify for SamePoint {
            fn verify(
                &mut self,
                _: &Specification,
                _: &Node,
                _: &mut Context,
            ) -> Result<Verdict, SynthError> {
                Ok(Verdict::Counterexample(vec![Value::Int(0)]))
            }
        }
        let mut ctx = Context::default();
        let (spec, f) = setup(&mut ctx);
        let p = ctx.ast().param(f.params()[0].clone());
        let one = ctx.ast().int(1);
        let p1 = ctx.ast().add(vec![p.clone(), one]);
        let mut solutions = Solutions::new(
            &spec,
            &mut ctx,
            Box::new(ListTermSolver::new(vec![p, p1])),
            Box::new(NullUnifier::default()),
            Box::new(SamePoint),
            options(),
        );
        assert!(matches!(
            solutions.next(),
            Some(Err(SynthError::SpuriousCounterexample(_)))
        ));
        assert!(solutions.next().is_none());
    }

    #[test]
    fn empty_search_space_is_exhausted() {
        let mut ctx = Context::default();
        let (spec, _) = setup(&mut ctx);
        let calls = Rc::new(std::cell::Cell::new(0));
        let mut solutions = Solutions::new(
            &spec,
            &mut ctx,
            Box::new(ListTermSolver::new(vec![])),
            Box::new(NullUnifier::default()),
            Box::new(ScriptedVerifier { reject: 0, calls }),
            options(),
        );
        assert!(matches!(solutions.next(), Some(Err(SynthError::Exhausted))));
    }

    #[test]
    fn round_limit_is_reported() {
        let mut ctx = Context::default();
        let (spec, f) = setup(&mut ctx);
        let p = ctx.ast().param(f.params()[0].clone());
        let terms: Vec<Node> = (0..10)
            .map(|i| {
                let c = ctx.ast().int(i);
                ctx.ast().add(vec![p.clone(), c])
            })
            .collect();
        let calls = Rc::new(std::cell::Cell::new(0));
        let mut solutions = Solutions::new(
            &spec,
            &mut ctx,
            Box::new(ListTermSolver::new(terms)),
            Box::new(NullUnifier::default()),
            Box::new(ScriptedVerifier { reject: 100, calls }),
            CegisOptions {
                max_rounds: 3,
                verify_term_solve: false,
            },
        );
        assert!(matches!(
            solutions.next(),
            Some(Err(SynthError::RoundLimit(3)))
        ));
    }
}
