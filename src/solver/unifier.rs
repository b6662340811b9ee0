use std::collections::HashSet;

use indexmap::IndexSet;

use crate::{
    ast::Node,
    context::Context,
    grammar::{Enumerator, Grammar},
    spec::{Point, Signature, Specification},
    theory::{Evaluator, Interpretation, Value},
};

use super::{
    dt::{self, DecisionTree},
    SynthError, Unification, Unifier,
};

/// Picks the most recent term that satisfies every point.
#[derive(Debug, Default)]
pub struct NullUnifier;

impl Unifier for NullUnifier {
    fn add_point(&mut self, _: &Specification, _: &[Point]) -> Result<(), SynthError> {
        Ok(())
    }

    fn unify(
        &mut self,
        terms: &[(Node, Signature)],
        _: &Specification,
        _: &[Point],
        _: &mut Context,
    ) -> Result<Unification, SynthError> {
        Ok(terms
            .iter()
            .rev()
            .find(|(_, sig)| sig.is_full())
            .map_or(Unification::NeedMoreTerms, |(t, _)| {
                Unification::Candidate(t.clone())
            }))
    }
}

/// Combines terms with a decision tree whose conditions come from a predicate grammar.
///
/// Predicates are evaluated on the target's argument valuation at each point.
pub struct DecisionTreeUnifier {
    enumerator: Enumerator,
    preds: Vec<(Node, Signature)>,
    valuations: Vec<Vec<Value>>,
    /// Predicates pulled per unification attempt
    budget: usize,
    exhausted: bool,
}

impl DecisionTreeUnifier {
    pub fn new(pred_grammar: Grammar, max_size: usize, budget: usize) -> Self {
        Self {
            enumerator: Enumerator::new(pred_grammar, max_size),
            preds: Vec::new(),
            valuations: Vec::new(),
            budget: budget.max(1),
            exhausted: false,
        }
    }

    fn holds(pred: &Node, args: &[Value]) -> bool {
        let (vars, interp) = (IndexSet::new(), Interpretation::new());
        Evaluator::new(&vars, &interp)
            .eval_with(pred, &[], args)
            .map_or(false, |v| v == Value::Bool(true))
    }

    fn signature(&self, pred: &Node) -> Signature {
        let mut sig = Signature::new(0);
        for args in &self.valuations {
            sig.push(Self::holds(pred, args));
        }
        sig
    }

    /// Indices of the predicates with pairwise distinct, non-constant signatures.
    fn distinct_preds(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        (0..self.preds.len())
            .filter(|i| {
                let sig = &self.preds[*i].1;
                !sig.is_full() && !sig.is_zero() && seen.insert(sig)
            })
            .collect()
    }

    fn to_expr(&self, tree: &DecisionTree, terms: &[(Node, Signature)], view: &[usize], ctx: &mut Context) -> Node {
        match tree {
            DecisionTree::Leaf(t) => terms[*t].0.clone(),
            DecisionTree::Split { pred, yes, no } => {
                let cond = self.preds[view[*pred]].0.clone();
                let yes = self.to_expr(yes, terms, view, ctx);
                let no = self.to_expr(no, terms, view, ctx);
                ctx.ast().ite(cond, yes, no)
            }
        }
    }
}

impl Unifier for DecisionTreeUnifier {
    fn add_point(&mut self, spec: &Specification, points: &[Point]) -> Result<(), SynthError> {
        let Some(point) = points.last() else {
            return Ok(());
        };
        let args = spec.param_valuation(point).ok_or_else(|| {
            SynthError::Internal(format!("no argument valuation for point {:?}", point))
        })?;
        for (pred, sig) in self.preds.iter_mut() {
            sig.push(Self::holds(pred, &args));
        }
        self.valuations.push(args);
        Ok(())
    }

    fn unify(
        &mut self,
        terms: &[(Node, Signature)],
        _: &Specification,
        points: &[Point],
        ctx: &mut Context,
    ) -> Result<Unification, SynthError> {
        if terms.is_empty() {
            return Ok(Unification::NeedMoreTerms);
        }
        if points.is_empty() {
            return Ok(Unification::Candidate(terms[0].0.clone()));
        }
        let term_sigs: Vec<&Signature> = terms.iter().map(|(_, s)| s).collect();
        let mut pulled = 0;
        loop {
            let view = self.distinct_preds();
            let pred_sigs: Vec<&Signature> = view.iter().map(|i| &self.preds[*i].1).collect();
            if let Some(tree) = dt::learn(&term_sigs, &pred_sigs, points.len()) {
                log::debug!(
                    "Decision tree with {} splits over {} terms and {} predicates",
                    tree.splits(),
                    terms.len(),
                    view.len()
                );
                return Ok(Unification::Candidate(self.to_expr(&tree, terms, &view, ctx)));
            }
            // pull predicates until one separates points in a new way
            let known: HashSet<Signature> = view.iter().map(|i| self.preds[*i].1.clone()).collect();
            loop {
                if self.exhausted || pulled >= self.budget {
                    return Ok(Unification::NeedMoreTerms);
                }
                let Some(pred) = self.enumerator.next_term(ctx) else {
                    log::debug!("Predicates ran out after {} predicates", self.preds.len());
                    self.exhausted = true;
                    continue;
                };
                pulled += 1;
                let sig = self.signature(&pred);
                let useful = !sig.is_full() && !sig.is_zero() && !known.contains(&sig);
                self.preds.push((pred, sig));
                if useful {
                    break;
                }
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
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
        theory::Theory,
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
    fn null_unifier_prefers_latest_full_term() {
        let mut ctx = Context::default();
        let (spec, f) = max2(&mut ctx);
        let a = ctx.ast().param(f.params()[0].clone());
        let b = ctx.ast().param(f.params()[1].clone());
        let mut full = Signature::new(0);
        full.push(true);
        let mut none = Signature::new(0);
        none.push(false);
        let terms = vec![(a.clone(), full.clone()), (b.clone(), none), (a.clone(), full)];
        let points = vec![vec![Value::Int(0), Value::Int(0)]];
        assert_eq!(
            NullUnifier.unify(&terms[..2], &spec, &points, &mut ctx).unwrap(),
            Unification::Candidate(a)
        );
        assert_eq!(
            NullUnifier.unify(&terms[1..2], &spec, &points, &mut ctx).unwrap(),
            Unification::NeedMoreTerms
        );
    }

    #[test]
    fn tree_selects_maximum() {
        let mut ctx = Context::default();
        let (spec, f) = max2(&mut ctx);
        let g = default_grammar(Theory::Lia, &f, &mut ctx).unwrap();
        let d = g.decompose(&mut ctx).unwrap();
        let mut unifier = DecisionTreeUnifier::new(d.pred_grammar, 4, 64);

        let a = ctx.ast().param(f.params()[0].clone());
        let b = ctx.ast().param(f.params()[1].clone());
        let mut points = vec![];
        for p in [vec![Value::Int(1), Value::Int(2)], vec![Value::Int(3), Value::Int(0)]] {
            points.push(p);
            unifier.add_point(&spec, &points).unwrap();
        }
        let terms: Vec<(Node, Signature)> = [a, b]
            .into_iter()
            .map(|t| {
                let sig = spec.term_signature(&t, &points);
                (t, sig)
            })
            .collect();
        let Unification::Candidate(c) = unifier.unify(&terms, &spec, &points, &mut ctx).unwrap() else {
            panic!("expected a candidate");
        };
        for p in &points {
            assert!(spec.check_at(&c, p), "{} fails at {:?}", c, p);
        }
    }
}
