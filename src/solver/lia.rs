//! Term solving and unification that read candidate terms directly off linear integer constraints.
//!
//! Applies to single-invocation specifications over one Int-valued target whose arguments are
//! distinct variables. Every atom comparing the target application with another expression
//! `e` suggests the terms `e`, `e + 1` and `e - 1` over the target's parameters.

use indexmap::IndexSet;

use crate::{
    ast::{FunctionInfo, Node, NodeSubstitution, Op},
    context::{Context, Sorted},
    spec::{Point, Signature, Specification, StandardSpec},
};

use super::{SynthError, TermSolver, Unification, Unifier};

/// Maps the specification variables passed to the target to the target's parameters.
fn params_for_vars(spec: &StandardSpec, ctx: &mut Context) -> Option<(NodeSubstitution, Node)> {
    if spec.targets.len() != 1 {
        return None;
    }
    let target = &spec.targets[0];
    let args = spec.canonical.common_args()?;
    let distinct: IndexSet<&Node> = args.iter().collect();
    if distinct.len() != args.len() || !args.iter().all(|a| a.is_var()) {
        return None;
    }
    let mut subs = NodeSubstitution::default();
    for (arg, param) in args.iter().zip(target.params()) {
        let param = ctx.ast().param(param);
        subs.insert(arg.clone(), param);
    }
    let app = ctx.ast().call(target, args.to_vec()).ok()?;
    Some((subs, app))
}

/// Right-hand sides of atoms `app op e` and `e op app`.
fn compared_terms(node: &Node, app: &Node, target: &FunctionInfo, out: &mut IndexSet<Node>) {
    let comparison = matches!(
        node.as_op(),
        Some(Op::Eq | Op::Le | Op::Lt | Op::Ge | Op::Gt)
    );
    if comparison && node.children().len() == 2 {
        let (l, r) = (&node[0], &node[1]);
        let calls_target = |n: &Node| n.calls(&|f: &FunctionInfo| f.id() == target.id());
        if l == app && !calls_target(r) {
            out.insert(r.clone());
        } else if r == app && !calls_target(l) {
            out.insert(l.clone());
        }
    }
    for c in node.children() {
        compared_terms(c, app, target, out);
    }
}

/// Offers the terms suggested by the constraints, and fails when a point is satisfied by none of them.
pub struct LiaTermSolver {
    candidates: Vec<Node>,
    terms: Vec<(Node, Signature)>,
}

impl LiaTermSolver {
    /// Returns `None` if the specification does not have the required shape.
    pub fn new(spec: &Specification, ctx: &mut Context) -> Option<Self> {
        let Specification::Standard(s) = spec else {
            return None;
        };
        let (subs, app) = params_for_vars(s, ctx)?;
        let target = s.targets[0].clone();
        if !target.range().is_int() {
            return None;
        }
        let mut rhs = IndexSet::new();
        for clause in &s.canonical.clauses {
            compared_terms(clause, &app, &target, &mut rhs);
        }
        let mut candidates: IndexSet<Node> = IndexSet::new();
        for e in rhs.iter().filter(|e| e.sort().is_int()) {
            let e = subs.apply(e, ctx);
            // all variables must be arguments of the target
            if !e.variables().is_empty() {
                continue;
            }
            let one = ctx.ast().int(1);
            candidates.insert(e.clone());
            candidates.insert(ctx.ast().add(vec![e.clone(), one.clone()]));
            candidates.insert(ctx.ast().sub(e, one));
        }
        for p in target.params() {
            candidates.insert(ctx.ast().param(p));
        }
        candidates.insert(ctx.ast().int(0));
        candidates.insert(ctx.ast().int(1));
        log::debug!("{} candidate terms from the constraints", candidates.len());
        let candidates: Vec<Node> = candidates.into_iter().collect();
        let terms = candidates
            .iter()
            .map(|t| (t.clone(), Signature::new(0)))
            .collect();
        Some(Self { candidates, terms })
    }
}

impl TermSolver for LiaTermSolver {
    fn add_point(&mut self, spec: &Specification, points: &[Point]) -> Result<(), SynthError> {
        self.terms = self
            .candidates
            .iter()
            .map(|t| (t.clone(), spec.term_signature(t, points)))
            .filter(|(_, s)| !s.is_zero())
            .collect();
        Ok(())
    }

    fn solve(&mut self, _: &Specification, points: &[Point], _: &mut Context) -> Result<bool, SynthError> {
        let mut union = Signature::new(points.len());
        for (_, s) in &self.terms {
            union.union_with(s);
        }
        match (0..points.len()).find(|i| !union.get(*i)) {
            Some(i) => Err(SynthError::Uncovered(format!("{:?}", points[i]))),
            None => Ok(!self.terms.is_empty()),
        }
    }

    fn generate_more_terms(
        &mut self,
        _: &Specification,
        _: &[Point],
        _: &mut Context,
    ) -> Result<bool, SynthError> {
        Ok(false)
    }

    fn terms(&self) -> &[(Node, Signature)] {
        &self.terms
    }
}

/// Chains the terms with their preconditions: the first term whose precondition holds is selected.
///
/// The precondition of a term is the specification with the term in place of the target application.
pub struct LiaUnifier {
    subs: NodeSubstitution,
    app: Node,
    expr: Node,
}

impl LiaUnifier {
    pub fn new(spec: &Specification, ctx: &mut Context) -> Option<Self> {
        let Specification::Standard(s) = spec else {
            return None;
        };
        let (subs, app) = params_for_vars(s, ctx)?;
        Some(Self {
            subs,
            app,
            expr: s.canonical.expr.clone(),
        })
    }

    fn precondition(&self, term: &Node, ctx: &mut Context) -> Node {
        let mut subs = self.subs.clone();
        subs.insert(self.app.clone(), term.clone());
        let pre = subs.apply(&self.expr, ctx);
        fold_reflexive(&pre, ctx)
    }
}

/// Replaces comparisons of a term with itself by their truth value and simplifies the connectives above them.
fn fold_reflexive(node: &Node, ctx: &mut Context) -> Node {
    match node.as_op() {
        Some(op @ (Op::And | Op::Or | Op::Not)) => {
            let children: Vec<Node> = node.children().iter().map(|c| fold_reflexive(c, ctx)).collect();
            match op {
                Op::And => ctx.ast().and(children),
                Op::Or => ctx.ast().or(children),
                _ => ctx.ast().not(children[0].clone()),
            }
        }
        Some(op @ (Op::Eq | Op::Le | Op::Ge | Op::Lt | Op::Gt))
            if node.children().len() == 2 && node[0] == node[1] =>
        {
            ctx.ast().bool(matches!(op, Op::Eq | Op::Le | Op::Ge))
        }
        _ => node.clone(),
    }
}

impl Unifier for LiaUnifier {
    fn add_point(&mut self, _: &Specification, _: &[Point]) -> Result<(), SynthError> {
        Ok(())
    }

    fn unify(
        &mut self,
        terms: &[(Node, Signature)],
        _: &Specification,
        _: &[Point],
        ctx: &mut Context,
    ) -> Result<Unification, SynthError> {
        let Some(((last, _), rest)) = terms.split_last() else {
            return Ok(Unification::NeedMoreTerms);
        };
        let mut chain = last.clone();
        for (t, _) in rest.iter().rev() {
            let pre = self.precondition(t, ctx);
            if pre.is_true() {
                chain = t.clone();
            } else if !pre.is_false() {
                chain = ctx.ast().ite(pre, t.clone(), chain);
            }
        }
        Ok(Unification::Candidate(chain))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        ast::FunctionKind,
        context::Sort,
        smt::SampleOracle,
        solver::{CegisOptions, Solutions},
        spec::make_specification,
        theory::Value,
        verify::Verifier,
    };

    use super::*;

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
    fn candidates_come_from_atoms() {
        let mut ctx = Context::default();
        let (spec, f) = max2(&mut ctx);
        let ts = LiaTermSolver::new(&spec, &mut ctx).unwrap();
        let a = ctx.ast().param(f.params()[0].clone());
        let b = ctx.ast().param(f.params()[1].clone());
        assert!(ts.candidates.contains(&a));
        assert!(ts.candidates.contains(&b));
        assert!(ts.candidates.iter().all(|c| c.variables().is_empty()));
    }

    #[test]
    fn uncovered_point_is_an_error() {
        let mut ctx = Context::default();
        let (spec, _) = max2(&mut ctx);
        let mut ts = LiaTermSolver::new(&spec, &mut ctx).unwrap();
        ts.candidates.retain(|c| c.as_param().map_or(false, |p| p.position() == 0));
        assert_eq!(ts.candidates.len(), 1);
        let points = vec![vec![Value::Int(0), Value::Int(5)]];
        ts.add_point(&spec, &points).unwrap();
        assert!(matches!(
            ts.solve(&spec, &points, &mut ctx),
            Err(SynthError::Uncovered(_))
        ));
    }

    #[test]
    fn solves_max2() {
        let mut ctx = Context::default();
        let (spec, _) = max2(&mut ctx);
        let ts = LiaTermSolver::new(&spec, &mut ctx).unwrap();
        let unifier = LiaUnifier::new(&spec, &mut ctx).unwrap();
        let verifier = Verifier::for_spec(&spec, Box::new(SampleOracle::new(3)));
        let mut solutions = Solutions::new(
            &spec,
            &mut ctx,
            Box::new(ts),
            Box::new(unifier),
            Box::new(verifier),
            CegisOptions {
                max_rounds: 50,
                verify_term_solve: true,
            },
        );
        let solution = solutions.next().unwrap().unwrap();
        for (x, y) in [(1, 2), (2, 1), (-3, -3), (7, -2)] {
            assert!(spec.check_at(&solution, &vec![Value::Int(x), Value::Int(y)]));
        }
    }

    #[test]
    fn preconditions_drop_reflexive_atoms() {
        let mut ctx = Context::default();
        let (spec, f) = max2(&mut ctx);
        let mut unifier = LiaUnifier::new(&spec, &mut ctx).unwrap();
        let a = ctx.ast().param(f.params()[0].clone());
        let b = ctx.ast().param(f.params()[1].clone());
        let pre = unifier.precondition(&a, &mut ctx);
        assert_eq!(pre, ctx.ast().ge(a.clone(), b.clone()));

        let sig = Signature::new(0);
        let Unification::Candidate(c) = unifier
            .unify(&[(a.clone(), sig.clone()), (b.clone(), sig)], &spec, &[], &mut ctx)
            .unwrap()
        else {
            panic!("expected a candidate");
        };
        let expected = ctx.ast().ite(pre, a, b);
        assert_eq!(c, expected);
    }
}
