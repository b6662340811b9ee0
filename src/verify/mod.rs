//! Checking candidate solutions against a specification.

use crate::{
    ast::{transform::inline_functions, Node},
    context::Context,
    smt::Oracle,
    solver::SynthError,
    spec::{PbeSpec, Point, Specification},
    theory::{Evaluator, Interpretation},
};

/// The outcome of checking a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The candidate satisfies the specification
    Valid,
    /// A point at which the candidate violates the specification
    Counterexample(Point),
}

pub trait Verify {
    /// Checks `candidate`, a body for the single target or a tuple of bodies, one per target.
    fn verify(
        &mut self,
        spec: &Specification,
        candidate: &Node,
        ctx: &mut Context,
    ) -> Result<Verdict, SynthError>;
}

/// The verifier matching a specification's kind.
pub enum Verifier {
    /// Negates each clause with the candidate inlined and asks the oracle for a model.
    Standard(Box<dyn Oracle>),
    /// Evaluates the candidate on every example.
    Pbe,
    /// Negates the whole specification with the candidate inlined.
    MultiPoint(Box<dyn Oracle>),
}

impl Verifier {
    pub fn for_spec(spec: &Specification, oracle: Box<dyn Oracle>) -> Self {
        match spec {
            Specification::Standard(_) => Verifier::Standard(oracle),
            Specification::Pbe(_) => Verifier::Pbe,
            Specification::MultiPoint(_) => Verifier::MultiPoint(oracle),
        }
    }
}

impl Verify for Verifier {
    fn verify(
        &mut self,
        spec: &Specification,
        candidate: &Node,
        ctx: &mut Context,
    ) -> Result<Verdict, SynthError> {
        let interp = spec.interpretation(candidate);
        let verdict = match (self, spec) {
            (Verifier::Pbe, Specification::Pbe(pbe)) => verify_examples(pbe, candidate),
            (Verifier::Standard(oracle), Specification::Standard(s)) => {
                let mut verdict = Verdict::Valid;
                for clause in &s.canonical.clauses {
                    let inlined = inline_functions(clause, &interp, ctx);
                    let negated = ctx.ast().not(inlined);
                    if negated.is_false() {
                        continue;
                    }
                    if let Some(cex) = oracle.find_model(&negated, &s.canonical.vars)? {
                        verdict = Verdict::Counterexample(cex);
                        break;
                    }
                }
                verdict
            }
            (Verifier::MultiPoint(oracle), Specification::MultiPoint(s)) => {
                let inlined = inline_functions(&s.expr, &interp, ctx);
                let negated = ctx.ast().not(inlined);
                match oracle.find_model(&negated, &s.vars)? {
                    Some(cex) => Verdict::Counterexample(cex),
                    None => Verdict::Valid,
                }
            }
            (_, spec) => {
                return Err(SynthError::Internal(format!(
                    "verifier does not match {} specification",
                    spec.kind_name()
                )))
            }
        };
        if let Verdict::Counterexample(point) = &verdict {
            // the oracle and the evaluator must agree on the point
            if spec.check_at(candidate, point) {
                return Err(SynthError::SpuriousCounterexample(format!(
                    "{} satisfies the specification at {:?}",
                    candidate, point
                )));
            }
            log::debug!("Counterexample for {}: {:?}", candidate, point);
        }
        Ok(verdict)
    }
}

/// The first example the candidate gets wrong.
fn verify_examples(spec: &PbeSpec, candidate: &Node) -> Verdict {
    let (vars, interp) = (Default::default(), Interpretation::new());
    let eval = Evaluator::new(&vars, &interp);
    spec.examples
        .iter()
        .find(|(input, output)| {
            eval.eval_with(candidate, &[], input)
                .map_or(true, |v| &v != output)
        })
        .map_or(Verdict::Valid, |(input, _)| {
            Verdict::Counterexample(input.clone())
        })
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        ast::{FunctionInfo, FunctionKind},
        context::Sort,
        smt::SampleOracle,
        spec::make_specification,
        theory::Value,
    };

    use super::*;

    fn target(ctx: &mut Context) -> Rc<FunctionInfo> {
        let id = ctx.reserve_function_id();
        let a = ctx.local_var("a", Sort::Int);
        ctx.declare_function(id, "f", vec![Sort::Int], Sort::Int, FunctionKind::Unknown(vec![a]))
            .unwrap()
    }

    /// f(x) = x + 1 for all x
    fn successor_spec(ctx: &mut Context) -> (Specification, Rc<FunctionInfo>) {
        let f = target(ctx);
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let x = ctx.ast().variable(x);
        let one = ctx.ast().int(1);
        let fx = ctx.ast().call(&f, vec![x.clone()]).unwrap();
        let succ = ctx.ast().add(vec![x, one]);
        let c = ctx.ast().eq(fx, succ);
        (make_specification(&[c], &[f.clone()], ctx).unwrap(), f)
    }

    #[test]
    fn correct_candidate_is_valid() {
        let mut ctx = Context::default();
        let (spec, f) = successor_spec(&mut ctx);
        let p = ctx.ast().param(f.params()[0].clone());
        let one = ctx.ast().int(1);
        let body = ctx.ast().add(vec![p, one]);
        let mut verifier = Verifier::for_spec(&spec, Box::new(SampleOracle::new(4)));
        assert_eq!(verifier.verify(&spec, &body, &mut ctx).unwrap(), Verdict::Valid);
    }

    #[test]
    fn wrong_candidate_has_counterexample() {
        let mut ctx = Context::default();
        let (spec, f) = successor_spec(&mut ctx);
        let p = ctx.ast().param(f.params()[0].clone());
        let mut verifier = Verifier::for_spec(&spec, Box::new(SampleOracle::new(4)));
        match verifier.verify(&spec, &p, &mut ctx).unwrap() {
            Verdict::Counterexample(point) => assert!(!spec.check_at(&p, &point)),
            Verdict::Valid => panic!("identity is not the successor"),
        }
    }

    #[test]
    fn examples_report_first_failure() {
        let mut ctx = Context::default();
        let f = target(&mut ctx);
        let mut constraints = vec![];
        for (i, o) in [(1, 1), (2, 4), (3, 9)] {
            let i = ctx.ast().int(i);
            let o = ctx.ast().int(o);
            let app = ctx.ast().call(&f, vec![i]).unwrap();
            constraints.push(ctx.ast().eq(app, o));
        }
        let spec = make_specification(&constraints, &[f.clone()], &mut ctx).unwrap();
        let p = ctx.ast().param(f.params()[0].clone());
        let mut verifier = Verifier::for_spec(&spec, Box::new(SampleOracle::new(1)));
        assert!(matches!(verifier, Verifier::Pbe));
        assert_eq!(
            verifier.verify(&spec, &p, &mut ctx).unwrap(),
            Verdict::Counterexample(vec![Value::Int(2)])
        );
    }
}
