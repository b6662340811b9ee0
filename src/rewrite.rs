//! Turns a verified candidate into one definition per target.

use std::rc::Rc;

use crate::{
    ast::{
        find_application, match_template, parent_of, transform::bind_params, FunctionInfo, Node,
        NodeSubstitution, Op,
    },
    context::Context,
    grammar::ReverseMapping,
    smt::{escape_smt_identifier_name, ToSmt},
    solver::SynthError,
};

/// Maps `candidate` back onto the targets' declarations.
///
/// Conditionals over marked predicates are turned back into the productions they were decomposed from,
/// a tuple candidate is split into one body per target, and formal parameters are replaced by
/// the parameter names of each target's `synth-fun`.
pub fn rewrite_solution(
    targets: &[Rc<FunctionInfo>],
    candidate: &Node,
    reverse_mapping: &[ReverseMapping],
    ctx: &mut Context,
) -> Result<Vec<Node>, SynthError> {
    let mut solution = candidate.clone();
    for mapping in reverse_mapping {
        let marker = mapping.marker.id();
        while let Some(app) = find_application(&solution, &|f: &FunctionInfo| f.id() == marker) {
            let parent = parent_of(&solution, &app)
                .filter(|p| p.is_op(Op::Ite) && p[0] == app)
                .ok_or_else(|| {
                    SynthError::Internal(format!("{} is not the condition of a conditional", app))
                })?;
            let stripped = ctx
                .ast()
                .ite(app[0].clone(), parent[1].clone(), parent[2].clone());
            let bindings = match_template(&mapping.template, &stripped, &mapping.holes)
                .ok_or_else(|| {
                    SynthError::Internal(format!("{} does not match {}", stripped, mapping.template))
                })?;
            let holes: NodeSubstitution = bindings
                .into_iter()
                .map(|(v, n)| (ctx.ast().variable(v), n))
                .collect();
            let original = holes.apply(&mapping.original, ctx);
            let replace: NodeSubstitution = [(parent, original)].into_iter().collect();
            solution = replace.apply(&solution, ctx);
        }
    }

    let bodies = if targets.len() > 1 {
        if !solution.is_op(Op::Tuple) || solution.children().len() != targets.len() {
            return Err(SynthError::Internal(format!(
                "expected a tuple of {} bodies, got {}",
                targets.len(),
                solution
            )));
        }
        solution.children().to_vec()
    } else {
        vec![solution]
    };

    targets
        .iter()
        .zip(bodies)
        .map(|(target, body)| {
            let named = target.named_params().ok_or_else(|| {
                SynthError::Internal(format!("{} is not a synthesis target", target))
            })?;
            let args: Vec<Node> = named.iter().map(|v| ctx.ast().variable(v.clone())).collect();
            Ok(bind_params(&body, &args, ctx))
        })
        .collect()
}

/// Prints a target's solution as `(define-fun NAME ((p T) ...) R\n     BODY)`.
pub fn format_definition(target: &FunctionInfo, body: &Node) -> String {
    let params: Vec<String> = target
        .named_params()
        .unwrap_or_default()
        .iter()
        .zip(target.domain())
        .map(|(p, s)| format!("({} {})", escape_smt_identifier_name(p.name()), s.to_smt()))
        .collect();
    format!(
        "(define-fun {} ({}) {}\n     {})",
        escape_smt_identifier_name(target.name()),
        params.join(" "),
        target.range().to_smt(),
        body.to_smt()
    )
}
