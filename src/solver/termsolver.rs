use crate::{
    ast::Node,
    context::Context,
    grammar::Enumerator,
    spec::{Point, Signature, Specification},
};

use super::{SynthError, TermSolver};

/// Terms generated so far and the subset offered to the unifier.
struct TermStore {
    /// Every kept term, with its signature
    all: Vec<(Node, Signature)>,
    /// The first term of every distinct signature, in generation order
    representatives: Vec<(Node, Signature)>,
    /// Only keep terms that satisfy every point
    one_term: bool,
}

impl TermStore {
    fn new(one_term: bool) -> Self {
        Self {
            all: Vec::new(),
            representatives: Vec::new(),
            one_term,
        }
    }

    /// Adds a term. Returns true if the representatives changed.
    fn insert(&mut self, term: Node, sig: Signature) -> bool {
        if self.one_term {
            // a term failing a point never recovers
            if !sig.is_full() {
                return false;
            }
            self.all.push((term.clone(), sig.clone()));
            self.representatives.push((term, sig));
            return true;
        }
        self.all.push((term.clone(), sig.clone()));
        if !sig.is_empty() && sig.is_zero() {
            return false;
        }
        if self.representatives.iter().any(|(_, s)| s == &sig) {
            return false;
        }
        self.representatives.push((term, sig));
        true
    }

    /// Extends every signature by the last point.
    fn extend(&mut self, spec: &Specification, points: &[Point]) {
        let Some(point) = points.last() else {
            return;
        };
        let terms = std::mem::take(&mut self.all);
        self.representatives.clear();
        for (t, mut sig) in terms {
            sig.push(spec.check_at(&t, point));
            self.insert(t, sig);
        }
    }

    fn clear(&mut self) {
        self.all.clear();
        self.representatives.clear();
    }

    fn is_covering(&self, n_points: usize) -> bool {
        if self.one_term {
            return self.representatives.iter().any(|(_, s)| s.is_full());
        }
        if self.representatives.is_empty() {
            return false;
        }
        let mut union = Signature::new(n_points);
        for (_, s) in &self.representatives {
            union.union_with(s);
        }
        union.is_full()
    }
}

/// Pulls terms from an enumerator into a store.
struct Generation {
    enumerator: Enumerator,
    store: TermStore,
    generated: usize,
}

impl Generation {
    fn new(enumerator: Enumerator, one_term: bool) -> Self {
        Self {
            enumerator,
            store: TermStore::new(one_term),
            generated: 0,
        }
    }

    /// Adds the next term. Returns `None` if the enumerator is exhausted.
    fn pull(
        &mut self,
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Option<bool> {
        let term = self.enumerator.next_term(ctx)?;
        self.generated += 1;
        let sig = spec.term_signature(&term, points);
        log::trace!("Term {} has signature {}", term, sig);
        Some(self.store.insert(term, sig))
    }

    fn solve(&mut self, spec: &Specification, points: &[Point], ctx: &mut Context) -> bool {
        while !self.store.is_covering(points.len()) {
            if self.pull(spec, points, ctx).is_none() {
                log::debug!(
                    "Terms ran out after {} terms up to size {}",
                    self.generated,
                    self.enumerator.current_size()
                );
                return false;
            }
        }
        true
    }

    fn generate_more(&mut self, spec: &Specification, points: &[Point], ctx: &mut Context) -> bool {
        loop {
            match self.pull(spec, points, ctx) {
                Some(true) => return true,
                Some(false) => continue,
                None => return false,
            }
        }
    }
}

/// A term solver that keeps its terms across points and extends their signatures.
pub struct PointlessTermSolver {
    inner: Generation,
}

impl PointlessTermSolver {
    /// With `one_term_coverage`, the solver looks for a single term satisfying all points.
    pub fn new(enumerator: Enumerator, one_term_coverage: bool) -> Self {
        Self {
            inner: Generation::new(enumerator, one_term_coverage),
        }
    }
}

impl TermSolver for PointlessTermSolver {
    fn add_point(&mut self, spec: &Specification, points: &[Point]) -> Result<(), SynthError> {
        self.inner.store.extend(spec, points);
        Ok(())
    }

    fn solve(
        &mut self,
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<bool, SynthError> {
        Ok(self.inner.solve(spec, points, ctx))
    }

    fn generate_more_terms(
        &mut self,
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<bool, SynthError> {
        Ok(self.inner.generate_more(spec, points, ctx))
    }

    fn terms(&self) -> &[(Node, Signature)] {
        &self.inner.store.representatives
    }
}

/// A term solver that starts over with every new point, enumerating only terms that differ on the known points.
pub struct PointDistinctTermSolver {
    inner: Generation,
}

impl PointDistinctTermSolver {
    pub fn new(enumerator: Enumerator, one_term_coverage: bool) -> Self {
        Self {
            inner: Generation::new(enumerator, one_term_coverage),
        }
    }
}

impl TermSolver for PointDistinctTermSolver {
    fn add_point(&mut self, spec: &Specification, points: &[Point]) -> Result<(), SynthError> {
        self.inner.store.clear();
        self.inner.enumerator.restart(spec.param_points(points));
        Ok(())
    }

    fn solve(
        &mut self,
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<bool, SynthError> {
        Ok(self.inner.solve(spec, points, ctx))
    }

    fn generate_more_terms(
        &mut self,
        spec: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<bool, SynthError> {
        Ok(self.inner.generate_more(spec, points, ctx))
    }

    fn terms(&self) -> &[(Node, Signature)] {
        &self.inner.store.representatives
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        ast::{FunctionInfo, FunctionKind},
        context::Sort,
        grammar::default_grammar,
        spec::make_specification,
        theory::{Theory, Value},
    };

    use super::*;

    /// max2: f(x, y) >= x, f(x, y) >= y, f(x, y) = x or f(x, y) = y
    fn max2(ctx: &mut Context) -> (Specification, Rc<FunctionInfo>) {
        let id = ctx.reserve_function_id();
        let a = ctx.local_var("a", Sort::Int);
        let b = ctx.local_var("b", Sort::Int);
        let f = ctx
            .declare_function(
                id,
                "max2",
                vec![Sort::Int, Sort::Int],
                Sort::Int,
                FunctionKind::Unknown(vec![a, b]),
            )
            .unwrap();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let y = ctx.declare_var("y", Sort::Int).unwrap();
        let x = ctx.ast().variable(x);
        let y = ctx.ast().variable(y);
        let app = ctx.ast().call(&f, vec![x.clone(), y.clone()]).unwrap();
        let c1 = ctx.ast().ge(app.clone(), x.clone());
        let c2 = ctx.ast().ge(app.clone(), y.clone());
        let e1 = ctx.ast().eq(app.clone(), x);
        let e2 = ctx.ast().eq(app, y);
        let c3 = ctx.ast().or(vec![e1, e2]);
        (make_specification(&[c1, c2, c3], &[f.clone()], ctx).unwrap(), f)
    }

    #[test]
    fn one_term_coverage_needs_a_full_term() {
        let mut ctx = Context::default();
        let (spec, f) = max2(&mut ctx);
        let g = default_grammar(Theory::Lia, &f, &mut ctx).unwrap();
        // no term of size 3 is the maximum at both points
        let points = vec![vec![Value::Int(1), Value::Int(2)], vec![Value::Int(3), Value::Int(0)]];
        let mut ts = PointlessTermSolver::new(Enumerator::new(g.clone(), 3), true);
        assert!(!ts.solve(&spec, &points, &mut ctx).unwrap());
        assert!(ts.terms().is_empty());

        let mut ts = PointlessTermSolver::new(Enumerator::new(g, 3), true);
        assert!(ts.solve(&spec, &points[..1], &mut ctx).unwrap());
        assert!(ts.terms().iter().all(|(_, s)| s.is_full()));
    }

    #[test]
    fn terms_jointly_cover_points() {
        let mut ctx = Context::default();
        let (spec, f) = max2(&mut ctx);
        let g = default_grammar(Theory::Lia, &f, &mut ctx).unwrap();
        let mut ts = PointlessTermSolver::new(Enumerator::new(g, 3), false);
        let mut points = vec![vec![Value::Int(1), Value::Int(2)]];
        assert!(ts.solve(&spec, &points, &mut ctx).unwrap());
        points.push(vec![Value::Int(3), Value::Int(0)]);
        ts.add_point(&spec, &points).unwrap();
        assert!(ts.solve(&spec, &points, &mut ctx).unwrap());
        let mut union = Signature::new(2);
        for (_, s) in ts.terms() {
            assert_eq!(s.len(), 2);
            assert!(!s.is_zero());
            union.union_with(s);
        }
        assert!(union.is_full());
        // one representative per signature
        let distinct: std::collections::HashSet<_> = ts.terms().iter().map(|(_, s)| s).collect();
        assert_eq!(distinct.len(), ts.terms().len());
    }

    #[test]
    fn point_distinct_restarts_on_new_points() {
        let mut ctx = Context::default();
        let (spec, f) = max2(&mut ctx);
        let g = default_grammar(Theory::Lia, &f, &mut ctx).unwrap();
        let mut ts = PointDistinctTermSolver::new(Enumerator::point_distinct(g, 3), true);
        assert!(ts.solve(&spec, &[], &mut ctx).unwrap());
        let first = ts.terms()[0].0.clone();

        let points = vec![vec![Value::Int(5), Value::Int(9)]];
        ts.add_point(&spec, &points).unwrap();
        assert!(ts.solve(&spec, &points, &mut ctx).unwrap());
        let (t, sig) = ts.terms().last().unwrap();
        assert!(sig.is_full());
        assert!(spec.check_at(t, &points[0]));
        assert_ne!(t, &first);
    }
}
