//! Specifications and their classification.
//!
//! A benchmark's constraints become one of three kinds of specification:
//! - [`Specification::MultiPoint`] whenever the constraints are not single-invocation,
//! - [`Specification::Pbe`] if they are ground input/output examples of a single target,
//! - [`Specification::Standard`] otherwise.

mod classify;
mod error;
mod signature;

use std::{fmt::Display, rc::Rc};

use indexmap::IndexSet;

pub use classify::{
    canonicalize_specification, check_binding, check_single_invocation, gather_unknown_functions,
    gather_variables, is_single_invocation, CanonicalSpec,
};
pub use error::SpecError;
pub use signature::Signature;

use crate::{
    ast::{FunctionInfo, Node, Op},
    context::{Context, Variable},
    grammar::ParamPoints,
    theory::{Evaluator, Interpretation, Value},
};

/// A valuation of the specification's variables, or the inputs of an example.
pub type Point = Vec<Value>;

/// A general single-invocation specification.
#[derive(Debug, Clone)]
pub struct StandardSpec {
    pub canonical: CanonicalSpec,
    pub targets: Vec<Rc<FunctionInfo>>,
}

/// A specification given by input/output examples of one target.
#[derive(Debug, Clone)]
pub struct PbeSpec {
    pub target: Rc<FunctionInfo>,
    pub examples: Vec<(Vec<Value>, Value)>,
}

/// A specification checked as a whole at every point.
#[derive(Debug, Clone)]
pub struct MultiPointSpec {
    pub expr: Node,
    /// The variables of the specification, sorted by name
    pub vars: IndexSet<Rc<Variable>>,
    pub targets: Vec<Rc<FunctionInfo>>,
}

#[derive(Debug, Clone)]
pub enum Specification {
    Standard(StandardSpec),
    Pbe(PbeSpec),
    MultiPoint(MultiPointSpec),
}

impl Specification {
    /// The functions to synthesize, in declaration order.
    pub fn targets(&self) -> &[Rc<FunctionInfo>] {
        match self {
            Specification::Standard(s) => &s.targets,
            Specification::Pbe(s) => std::slice::from_ref(&s.target),
            Specification::MultiPoint(s) => &s.targets,
        }
    }

    /// The variables that a point assigns. Empty for example-based specifications.
    pub fn vars(&self) -> IndexSet<Rc<Variable>> {
        match self {
            Specification::Standard(s) => s.canonical.vars.clone(),
            Specification::Pbe(_) => IndexSet::new(),
            Specification::MultiPoint(s) => s.vars.clone(),
        }
    }

    /// Reads a candidate as bodies for the targets.
    /// A candidate for several targets is a tuple with one component per target.
    pub fn interpretation(&self, term: &Node) -> Interpretation {
        let targets = self.targets();
        if targets.len() == 1 {
            return [(targets[0].id(), term.clone())].into_iter().collect();
        }
        targets
            .iter()
            .zip(term.children())
            .map(|(t, c)| (t.id(), c.clone()))
            .collect()
    }

    /// Returns true if the candidate satisfies the specification at the point.
    /// A candidate whose evaluation fails does not satisfy it.
    pub fn check_at(&self, term: &Node, point: &Point) -> bool {
        match self {
            Specification::Pbe(s) => s
                .examples
                .iter()
                .filter(|(input, _)| input == point)
                .all(|(input, output)| {
                    let (vars, interp) = (IndexSet::new(), Interpretation::new());
                    Evaluator::new(&vars, &interp)
                        .eval_with(term, &[], input)
                        .map_or(false, |v| &v == output)
                }),
            Specification::Standard(StandardSpec { canonical, .. }) => {
                self.holds(&canonical.expr, &canonical.vars, term, point)
            }
            Specification::MultiPoint(s) => self.holds(&s.expr, &s.vars, term, point),
        }
    }

    fn holds(&self, expr: &Node, vars: &IndexSet<Rc<Variable>>, term: &Node, point: &Point) -> bool {
        let interp = self.interpretation(term);
        Evaluator::new(vars, &interp)
            .holds(expr, point)
            .unwrap_or(false)
    }

    /// The points at which the candidate satisfies the specification.
    pub fn term_signature(&self, term: &Node, points: &[Point]) -> Signature {
        let mut sig = Signature::new(points.len());
        for (i, p) in points.iter().enumerate() {
            if self.check_at(term, p) {
                sig.set(i, true);
            }
        }
        sig
    }

    /// The arguments of the target at a point, if the target is always applied to the same arguments.
    pub fn param_valuation(&self, point: &Point) -> Option<Vec<Value>> {
        match self {
            Specification::Pbe(_) => Some(point.clone()),
            Specification::Standard(s) if s.targets.len() == 1 => {
                let args = s.canonical.common_args()?;
                let interp = Interpretation::new();
                let eval = Evaluator::new(&s.canonical.vars, &interp);
                args.iter().map(|a| eval.eval(a, point).ok()).collect()
            }
            _ => None,
        }
    }

    /// For every target, the argument valuations with which it is applied at the given points.
    /// Applications whose arguments involve a target are skipped.
    pub fn param_points(&self, points: &[Point]) -> ParamPoints {
        let mut out = ParamPoints::new();
        let (expr, vars) = match self {
            Specification::Pbe(s) => {
                out.insert(s.target.id(), points.to_vec());
                return out;
            }
            Specification::Standard(s) => (&s.canonical.expr, &s.canonical.vars),
            Specification::MultiPoint(s) => (&s.expr, &s.vars),
        };
        let mut apps: IndexSet<Node> = IndexSet::new();
        collect_target_apps(expr, &mut apps);
        let interp = Interpretation::new();
        let eval = Evaluator::new(vars, &interp);
        for target in self.targets() {
            let mut valuations: IndexSet<Vec<Value>> = IndexSet::new();
            for app in apps.iter().filter(|a| a.is_app_of(target)) {
                for p in points {
                    let args: Option<Vec<Value>> =
                        app.children().iter().map(|c| eval.eval(c, p).ok()).collect();
                    if let Some(args) = args {
                        valuations.insert(args);
                    }
                }
            }
            out.insert(target.id(), valuations.into_iter().collect());
        }
        out
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Specification::Standard(_) => "standard",
            Specification::Pbe(_) => "pbe",
            Specification::MultiPoint(_) => "multi-point",
        }
    }
}

fn collect_target_apps(node: &Node, out: &mut IndexSet<Node>) {
    if node.as_app().map_or(false, |f| f.is_unknown()) {
        out.insert(node.clone());
    }
    node.children().iter().for_each(|c| collect_target_apps(c, out));
}

impl Display for Specification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Specification::Standard(s) => {
                writeln!(f, "; standard specification")?;
                for c in &s.canonical.clauses {
                    writeln!(f, "(constraint {})", c)?;
                }
                Ok(())
            }
            Specification::Pbe(s) => {
                writeln!(f, "; {} examples for {}", s.examples.len(), s.target)?;
                for (input, output) in &s.examples {
                    write!(f, "(constraint (= ({}", s.target)?;
                    for v in input {
                        write!(f, " {}", v)?;
                    }
                    writeln!(f, ") {}))", output)?;
                }
                Ok(())
            }
            Specification::MultiPoint(s) => {
                writeln!(f, "; multi-point specification")?;
                writeln!(f, "(constraint {})", s.expr)
            }
        }
    }
}

/// Reads the constraints as input/output examples of `target`.
///
/// Every constraint must be an equality without variables between an application of the target
/// and a term that does not apply it. Returns `None` otherwise.
pub fn get_pbe_valuations(constraints: &[Node], target: &FunctionInfo) -> Option<Vec<(Vec<Value>, Value)>> {
    let (vars, interp) = (IndexSet::new(), Interpretation::new());
    let eval = Evaluator::new(&vars, &interp);
    let mut examples = Vec::with_capacity(constraints.len());
    for c in constraints {
        if !(c.is_op(Op::Eq) || c.is_op(Op::Iff)) || !c.variables().is_empty() {
            return None;
        }
        let (app, other) = match (c[0].is_app_of(target), c[1].is_app_of(target)) {
            (true, false) => (&c[0], &c[1]),
            (false, true) => (&c[1], &c[0]),
            _ => return None,
        };
        let input: Vec<Value> = app
            .children()
            .iter()
            .map(|a| eval.eval(a, &[]).ok())
            .collect::<Option<_>>()?;
        let output = eval.eval(other, &[]).ok()?;
        examples.push((input, output));
    }
    Some(examples)
}

/// Classifies the constraints and builds the matching specification.
pub fn make_specification(
    constraints: &[Node],
    targets: &[Rc<FunctionInfo>],
    ctx: &mut Context,
) -> Result<Specification, SpecError> {
    let conjunction = ctx.ast().and(constraints.to_vec());
    check_binding(&conjunction, ctx)?;

    if !is_single_invocation(constraints, ctx) {
        log::info!("Specification is not single-invocation");
        return Ok(multi_point(conjunction, targets));
    }
    if targets.len() == 1 {
        if let Some(examples) = get_pbe_valuations(constraints, &targets[0]) {
            log::info!("Specification consists of {} examples", examples.len());
            return Ok(Specification::Pbe(PbeSpec {
                target: targets[0].clone(),
                examples,
            }));
        }
    }

    let expr = match constraints {
        [single] => single.clone(),
        _ => conjunction.clone(),
    };
    match canonicalize_specification(&expr, ctx) {
        Ok(canonical) => {
            log::info!("Specification is single-invocation");
            Ok(Specification::Standard(StandardSpec {
                canonical,
                targets: targets.to_vec(),
            }))
        }
        Err(SpecError::NotSingleInvocation(e)) => {
            log::warn!("Clauses are not single-invocation, treating as multi-point: {}", e);
            Ok(multi_point(conjunction, targets))
        }
        Err(e) => Err(e),
    }
}

fn multi_point(expr: Node, targets: &[Rc<FunctionInfo>]) -> Specification {
    let mut vars: Vec<Rc<Variable>> = gather_variables(&expr).into_iter().collect();
    vars.sort_by(|a, b| a.name().cmp(b.name()));
    Specification::MultiPoint(MultiPointSpec {
        expr,
        vars: vars.into_iter().collect(),
        targets: targets.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use crate::{ast::FunctionKind, context::Sort};

    use super::*;

    fn target(ctx: &mut Context, arity: usize) -> Rc<FunctionInfo> {
        let id = ctx.reserve_function_id();
        let params = (0..arity).map(|i| ctx.local_var(&format!("a{}", i), Sort::Int)).collect();
        ctx.declare_function(id, "f", vec![Sort::Int; arity], Sort::Int, FunctionKind::Unknown(params))
            .unwrap()
    }

    #[test]
    fn ground_equalities_are_examples() {
        let mut ctx = Context::default();
        let f = target(&mut ctx, 1);
        let mut constraints = vec![];
        for (i, o) in [(2, 3), (5, 6)] {
            let i = ctx.ast().int(i);
            let o = ctx.ast().int(o);
            let app = ctx.ast().call(&f, vec![i]).unwrap();
            constraints.push(ctx.ast().eq(app, o));
        }
        let spec = make_specification(&constraints, &[f.clone()], &mut ctx).unwrap();
        let Specification::Pbe(pbe) = &spec else {
            panic!("expected examples, got {}", spec.kind_name());
        };
        assert_eq!(pbe.examples.len(), 2);
        assert_eq!(pbe.examples[0], (vec![Value::Int(2)], Value::Int(3)));

        let p = ctx.ast().param(f.params()[0].clone());
        let one = ctx.ast().int(1);
        let succ = ctx.ast().add(vec![p.clone(), one]);
        let points = vec![vec![Value::Int(2)], vec![Value::Int(5)]];
        assert!(spec.term_signature(&succ, &points).is_full());
        assert!(spec.term_signature(&p, &points).is_zero());
    }

    #[test]
    fn equality_with_variables_is_standard() {
        let mut ctx = Context::default();
        let f = target(&mut ctx, 1);
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let x = ctx.ast().variable(x);
        let one = ctx.ast().int(1);
        let app = ctx.ast().call(&f, vec![x.clone()]).unwrap();
        let succ = ctx.ast().add(vec![x, one]);
        let c = ctx.ast().eq(app, succ);
        let spec = make_specification(&[c], &[f.clone()], &mut ctx).unwrap();
        assert!(matches!(spec, Specification::Standard(_)));
        assert_eq!(spec.param_valuation(&vec![Value::Int(4)]), Some(vec![Value::Int(4)]));
    }

    #[test]
    fn two_tuples_in_one_constraint_is_multi_point() {
        let mut ctx = Context::default();
        let f = target(&mut ctx, 1);
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let y = ctx.declare_var("y", Sort::Int).unwrap();
        let x = ctx.ast().variable(x);
        let y = ctx.ast().variable(y);
        let fx = ctx.ast().call(&f, vec![x]).unwrap();
        let fy = ctx.ast().call(&f, vec![y]).unwrap();
        let c = ctx.ast().eq(fx, fy);
        let spec = make_specification(&[c], &[f.clone()], &mut ctx).unwrap();
        assert!(matches!(spec, Specification::MultiPoint(_)));

        let points = vec![vec![Value::Int(1), Value::Int(2)]];
        let pp = spec.param_points(&points);
        assert_eq!(pp[&f.id()].len(), 2);
        assert!(spec.param_valuation(&points[0]).is_none());
    }

    #[test]
    fn conjunction_of_invocations_is_standard() {
        let mut ctx = Context::default();
        let f = target(&mut ctx, 1);
        let one = ctx.ast().int(1);
        let mut conjuncts = vec![];
        for name in ["x", "y"] {
            let v = ctx.declare_var(name, Sort::Int).unwrap();
            let v = ctx.ast().variable(v);
            let app = ctx.ast().call(&f, vec![v.clone()]).unwrap();
            let succ = ctx.ast().add(vec![v, one.clone()]);
            conjuncts.push(ctx.ast().eq(app, succ));
        }
        let separate = make_specification(&conjuncts, &[f.clone()], &mut ctx).unwrap();
        assert!(matches!(separate, Specification::Standard(_)));

        let joined = ctx.ast().and(conjuncts);
        let spec = make_specification(&[joined], &[f.clone()], &mut ctx).unwrap();
        let Specification::Standard(standard) = &spec else {
            panic!("expected a standard specification, got {}", spec.kind_name());
        };
        assert_eq!(standard.canonical.clauses.len(), 2);
        assert!(standard.canonical.common_args().is_none());
    }
}
