//! Single-invocation analysis and canonicalization of specifications.

use std::rc::Rc;

use indexmap::IndexSet;

use crate::{
    ast::{normal::to_cnf, FunctionInfo, Node, NodeKind},
    context::{Context, Variable},
};

use super::SpecError;

/// Collects the variables occurring in `node`.
pub fn gather_variables(node: &Node) -> IndexSet<Rc<Variable>> {
    node.variables()
}

/// Collects the synthesis targets applied in `node`.
pub fn gather_unknown_functions(node: &Node) -> IndexSet<Rc<FunctionInfo>> {
    fn go(node: &Node, out: &mut IndexSet<Rc<FunctionInfo>>) {
        if let Some(f) = node.as_app() {
            if f.is_unknown() {
                out.insert(f.clone());
            }
        }
        node.children().iter().for_each(|c| go(c, out));
    }
    let mut out = IndexSet::new();
    go(node, &mut out);
    out
}

/// The distinct argument tuples with which targets are applied in `node`.
fn invocation_args(node: &Node) -> IndexSet<Vec<Node>> {
    fn go(node: &Node, out: &mut IndexSet<Vec<Node>>) {
        if node.as_app().map_or(false, |f| f.is_unknown()) {
            out.insert(node.children().to_vec());
        }
        node.children().iter().for_each(|c| go(c, out));
    }
    let mut out = IndexSet::new();
    go(node, &mut out);
    out
}

/// Checks that every node, variable and function in `node` was created by `ctx`.
pub fn check_binding(node: &Node, ctx: &Context) -> Result<(), SpecError> {
    if !ctx.owns_node(node) {
        return Err(SpecError::Binding(node.to_string()));
    }
    match node.kind() {
        NodeKind::Variable(v) if !ctx.owns_variable(v) => {
            return Err(SpecError::Binding(v.name().to_string()))
        }
        NodeKind::App(f) if !ctx.owns_function(f) => {
            return Err(SpecError::Binding(f.name().to_string()))
        }
        _ => {}
    }
    node.children()
        .iter()
        .try_for_each(|c| check_binding(c, ctx))
}

/// Returns true if at most one target occurs in all clauses together and no clause applies it to more than one argument tuple.
pub fn check_single_invocation(clauses: &[Node]) -> bool {
    let mut functions = IndexSet::new();
    for clause in clauses {
        functions.extend(gather_unknown_functions(clause));
        if functions.len() > 1 || invocation_args(clause).len() > 1 {
            return false;
        }
    }
    true
}

/// The single-invocation test over the CNF clauses of every constraint.
pub fn is_single_invocation(constraints: &[Node], ctx: &mut Context) -> bool {
    let mut clauses = Vec::with_capacity(constraints.len());
    for c in constraints {
        clauses.extend(to_cnf(c, ctx).0);
    }
    check_single_invocation(&clauses)
}

/// A single-invocation specification in conjunctive normal form.
#[derive(Debug, Clone)]
pub struct CanonicalSpec {
    /// The variables of the specification, sorted by name. A variable's index is its evaluation offset.
    pub vars: IndexSet<Rc<Variable>>,
    /// The targets of the specification, sorted by name. A target's index is its canonical id.
    pub functions: Vec<Rc<FunctionInfo>>,
    pub clauses: Vec<Node>,
    pub negated_clauses: Vec<Node>,
    /// For every clause, the arguments of the target application in it, or nothing if the clause does not apply the target
    pub clause_args: Vec<Vec<Node>>,
    /// The conjunction of the clauses
    pub expr: Node,
}

impl CanonicalSpec {
    /// The argument tuple shared by all clauses that apply the target, if there is exactly one.
    pub fn common_args(&self) -> Option<&[Node]> {
        let mut tuples = self.clause_args.iter().filter(|a| !a.is_empty());
        let first = tuples.next()?;
        if tuples.all(|t| t == first) {
            Some(first)
        } else {
            None
        }
    }
}

/// Validates a specification and brings it into canonical single-invocation form.
pub fn canonicalize_specification(expr: &Node, ctx: &mut Context) -> Result<CanonicalSpec, SpecError> {
    check_binding(expr, ctx)?;
    if let Some(p) = find_param(expr) {
        return Err(SpecError::MalformedSpec(p.to_string()));
    }

    let mut vars: Vec<Rc<Variable>> = gather_variables(expr).into_iter().collect();
    vars.sort_by(|a, b| a.name().cmp(b.name()));
    let mut functions: Vec<Rc<FunctionInfo>> = gather_unknown_functions(expr).into_iter().collect();
    functions.sort_by(|a, b| a.name().cmp(b.name()));

    let (clauses, cnf) = to_cnf(expr, ctx);
    let negated_clauses = clauses.iter().map(|c| ctx.ast().not(c.clone())).collect();
    if !check_single_invocation(&clauses) {
        return Err(SpecError::NotSingleInvocation(expr.to_string()));
    }
    let clause_args = clauses
        .iter()
        .map(|c| invocation_args(c).into_iter().next().unwrap_or_default())
        .collect();
    log::debug!(
        "Canonical specification has {} variables and {} clauses",
        vars.len(),
        clauses.len()
    );

    Ok(CanonicalSpec {
        vars: vars.into_iter().collect(),
        functions,
        clauses,
        negated_clauses,
        clause_args,
        expr: cnf,
    })
}

fn find_param(node: &Node) -> Option<Node> {
    if node.as_param().is_some() {
        return Some(node.clone());
    }
    node.children().iter().find_map(find_param)
}
