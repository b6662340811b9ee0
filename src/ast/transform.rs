//! Rewritings applied to the constraints before classification.

use std::{collections::HashMap, rc::Rc};

use indexmap::IndexMap;

use crate::{
    context::{Context, Sorted, Variable},
    theory::Interpretation,
};

use super::{FunctionInfo, FunctionKind, Node, NodeKind, NodeSubstitution, Op};

/// Replaces every formal parameter in `body` by the argument at its position.
pub fn bind_params(body: &Node, args: &[Node], ctx: &mut Context) -> Node {
    match body.kind() {
        NodeKind::Param(p) => args.get(p.position()).cloned().unwrap_or_else(|| body.clone()),
        _ if body.children().is_empty() => body.clone(),
        _ => {
            let children = body
                .children()
                .iter()
                .map(|c| bind_params(c, args, ctx))
                .collect();
            ctx.ast().rebuild(body, children)
        }
    }
}

/// Expands applications of macros, of targets that have a body in `interpretation`, and of markers.
/// Applications of other functions are kept.
pub fn inline_functions(node: &Node, interpretation: &Interpretation, ctx: &mut Context) -> Node {
    let mut cache = HashMap::new();
    inline_cached(node, interpretation, ctx, &mut cache)
}

fn inline_cached(
    node: &Node,
    interpretation: &Interpretation,
    ctx: &mut Context,
    cache: &mut HashMap<Node, Node>,
) -> Node {
    if node.children().is_empty() && node.as_app().is_none() {
        return node.clone();
    }
    if let Some(done) = cache.get(node) {
        return done.clone();
    }
    let children: Vec<Node> = node
        .children()
        .iter()
        .map(|c| inline_cached(c, interpretation, ctx, cache))
        .collect();
    let res = match node.kind() {
        NodeKind::App(f) => {
            let body = match f.kind() {
                FunctionKind::Macro(body) => Some(body.clone()),
                FunctionKind::Unknown(_) => interpretation.get(&f.id()).cloned(),
                _ => None,
            };
            if let Some(body) = body {
                let bound = bind_params(&body, &children, ctx);
                // bodies may call other macros
                inline_cached(&bound, interpretation, ctx, cache)
            } else if f.is_marker() {
                children[0].clone()
            } else {
                ctx.ast().rebuild(node, children)
            }
        }
        _ => ctx.ast().rebuild(node, children),
    };
    cache.insert(node.clone(), res.clone());
    res
}

/// Instantiates all user macros.
pub fn inline_macros(node: &Node, ctx: &mut Context) -> Node {
    inline_functions(node, &Interpretation::new(), ctx)
}

/// Eliminates let-bindings by substituting the bound values.
/// Bindings are parallel: the values of one `let` are evaluated in the enclosing scope.
pub fn flatten_lets(node: &Node, ctx: &mut Context) -> Node {
    flatten_with(node, &IndexMap::new(), ctx)
}

fn flatten_with(node: &Node, env: &IndexMap<Rc<Variable>, Node>, ctx: &mut Context) -> Node {
    if let Some(v) = node.as_variable() {
        return env.get(v).cloned().unwrap_or_else(|| node.clone());
    }
    if node.children().is_empty() {
        return node.clone();
    }
    if node.is_op(Op::Let) {
        let ch = node.children();
        let n = ch.len() / 2;
        let mut inner = env.clone();
        for i in 0..n {
            if let Some(v) = ch[2 * i].as_variable() {
                let value = flatten_with(&ch[2 * i + 1], env, ctx);
                inner.insert(v.clone(), value);
            }
        }
        return flatten_with(&ch[2 * n], &inner, ctx);
    }
    let children = node
        .children()
        .iter()
        .map(|c| flatten_with(c, env, ctx))
        .collect();
    ctx.ast().rebuild(node, children)
}

/// Makes the Boolean structure around conditionals explicit.
///
/// A Bool-sorted `ite(c, a, b)` becomes `(¬c ∨ a) ∧ (c ∨ b)`.
/// A non-Bool `ite` inside the arguments of an atom is lifted above the atom and expanded the same way.
/// The result contains no `ite`.
pub fn rewrite_ite(node: &Node, ctx: &mut Context) -> Node {
    if node.children().is_empty() {
        return node.clone();
    }
    let children: Vec<Node> = node.children().iter().map(|c| rewrite_ite(c, ctx)).collect();
    let node = ctx.ast().rebuild(node, children);

    if node.is_op(Op::Ite) && node.sort().is_bool() {
        return expand_bool_ite(node[0].clone(), node[1].clone(), node[2].clone(), ctx);
    }
    let is_atom = node.sort().is_bool() && !node.as_op().map_or(false, |op| op.is_connective());
    if is_atom {
        if let Some(ite) = find_term_ite(&node) {
            let (c, a, b) = (ite[0].clone(), ite[1].clone(), ite[2].clone());
            let mut then_subs = NodeSubstitution::default();
            then_subs.insert(ite.clone(), a);
            let mut else_subs = NodeSubstitution::default();
            else_subs.insert(ite, b);
            let then_atom = then_subs.apply(&node, ctx);
            let else_atom = else_subs.apply(&node, ctx);
            let then_atom = rewrite_ite(&then_atom, ctx);
            let else_atom = rewrite_ite(&else_atom, ctx);
            return expand_bool_ite(c, then_atom, else_atom, ctx);
        }
    }
    node
}

fn expand_bool_ite(c: Node, a: Node, b: Node, ctx: &mut Context) -> Node {
    let not_c = ctx.ast().not(c.clone());
    let l = ctx.ast().or(vec![not_c, a]);
    let r = ctx.ast().or(vec![c, b]);
    ctx.ast().and(vec![l, r])
}

/// Finds a non-Bool `ite` among the term arguments of an atom, without descending into formulas.
fn find_term_ite(atom: &Node) -> Option<Node> {
    for child in atom.children() {
        if child.sort().is_bool() {
            continue;
        }
        if child.is_op(Op::Ite) {
            return Some(child.clone());
        }
        if let Some(found) = find_term_ite(child) {
            return Some(found);
        }
    }
    None
}

/// Replaces applications of uninterpreted functions by fresh variables.
///
/// For every two applications of the same function, the condition "equal arguments imply equal results"
/// is added as an assumption to every constraint.
pub fn ackermann_reduce(constraints: &[Node], ctx: &mut Context) -> Vec<Node> {
    let mut apps: Vec<(Rc<FunctionInfo>, Vec<Node>, Node)> = Vec::new();
    let mut seen: HashMap<Node, Node> = HashMap::new();
    let reduced: Vec<Node> = constraints
        .iter()
        .map(|c| reduce_apps(c, ctx, &mut apps, &mut seen))
        .collect();

    let mut conditions = Vec::new();
    for (i, (f, args_i, v_i)) in apps.iter().enumerate() {
        for (g, args_j, v_j) in apps.iter().skip(i + 1) {
            if f != g {
                continue;
            }
            let arg_eqs: Vec<Node> = args_i
                .iter()
                .zip(args_j)
                .map(|(a, b)| ctx.ast().eq(a.clone(), b.clone()))
                .collect();
            let premise = ctx.ast().and(arg_eqs);
            let conclusion = ctx.ast().eq(v_i.clone(), v_j.clone());
            conditions.push(ctx.ast().imp(premise, conclusion));
        }
    }
    if conditions.is_empty() {
        return reduced;
    }
    log::debug!(
        "Ackermann reduction introduced {} variables and {} consistency conditions",
        apps.len(),
        conditions.len()
    );
    let consistency = ctx.ast().and(conditions);
    reduced
        .into_iter()
        .map(|c| ctx.ast().imp(consistency.clone(), c))
        .collect()
}

fn reduce_apps(
    node: &Node,
    ctx: &mut Context,
    apps: &mut Vec<(Rc<FunctionInfo>, Vec<Node>, Node)>,
    seen: &mut HashMap<Node, Node>,
) -> Node {
    if node.children().is_empty() {
        return node.clone();
    }
    let children: Vec<Node> = node
        .children()
        .iter()
        .map(|c| reduce_apps(c, ctx, apps, seen))
        .collect();
    let node = ctx.ast().rebuild(node, children);
    match node.as_app() {
        Some(f) if f.is_uninterpreted() => {
            if let Some(v) = seen.get(&node) {
                return v.clone();
            }
            let var = ctx.fresh_var(&format!("ack_{}", f.name()), f.range().clone());
            let var = ctx.ast().variable(var);
            apps.push((f.clone(), node.children().to_vec(), var.clone()));
            seen.insert(node.clone(), var.clone());
            var
        }
        _ => node,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::Param,
        context::Sort,
        theory::{Evaluator, Value},
    };

    use super::*;

    #[test]
    fn macros_are_inlined() {
        let mut ctx = Context::default();
        // (define-fun inc ((a Int)) Int (+ a 1))
        let id = ctx.reserve_function_id();
        let a = ctx.ast().param(Param::new(id, 0, Sort::Int));
        let one = ctx.ast().int(1);
        let body = ctx.ast().add(vec![a, one.clone()]);
        let inc = ctx
            .declare_function(id, "inc", vec![Sort::Int], Sort::Int, FunctionKind::Macro(body))
            .unwrap();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let x = ctx.ast().variable(x);
        let app = ctx.ast().call(&inc, vec![x.clone()]).unwrap();
        let app2 = ctx.ast().call(&inc, vec![app]).unwrap();

        let got = inline_macros(&app2, &mut ctx);
        let inner = ctx.ast().add(vec![x, one.clone()]);
        let expected = ctx.ast().add(vec![inner, one]);
        assert_eq!(got, expected, "\nExpected: {}\nGot: {}", expected, got);
    }

    #[test]
    fn lets_are_parallel() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let y = ctx.declare_var("y", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let yn = ctx.ast().variable(y.clone());
        // (let ((x y) (y x)) (<= x y)) is (<= y x)
        let lx = ctx.local_var("x", Sort::Int);
        let ly = ctx.local_var("y", Sort::Int);
        let lxn = ctx.ast().variable(lx);
        let lyn = ctx.ast().variable(ly);
        let body = ctx.ast().le(lxn.clone(), lyn.clone());
        let let_node = ctx
            .ast()
            .op(Op::Let, vec![lxn, yn.clone(), lyn, xn.clone(), body])
            .unwrap();
        let got = flatten_lets(&let_node, &mut ctx);
        let expected = ctx.ast().le(yn, xn);
        assert_eq!(got, expected, "\nExpected: {}\nGot: {}", expected, got);
    }

    #[test]
    fn term_ite_is_lifted() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let y = ctx.declare_var("y", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x.clone());
        let yn = ctx.ast().variable(y.clone());
        let cond = ctx.ast().le(xn.clone(), yn.clone());
        let max = ctx.ast().ite(cond, yn.clone(), xn.clone());
        let one = ctx.ast().int(1);
        let plus = ctx.ast().add(vec![max, one]);
        let atom = ctx.ast().ge(plus, xn);

        let got = rewrite_ite(&atom, &mut ctx);
        assert!(!format!("{}", got).contains("ite"), "{}", got);

        let vars = [x, y].into_iter().collect();
        let interp = Interpretation::new();
        let eval = Evaluator::new(&vars, &interp);
        for (a, b) in [(0, 5), (5, 0), (-3, -3)] {
            let p = [Value::Int(a), Value::Int(b)];
            assert_eq!(eval.holds(&atom, &p), eval.holds(&got, &p));
        }
    }

    #[test]
    fn ackermann_adds_consistency() {
        let mut ctx = Context::default();
        let id = ctx.reserve_function_id();
        let g = ctx
            .declare_function(id, "g", vec![Sort::Int], Sort::Int, FunctionKind::Uninterpreted)
            .unwrap();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let y = ctx.declare_var("y", Sort::Int).unwrap();
        let xn = ctx.ast().variable(x);
        let yn = ctx.ast().variable(y);
        let gx = ctx.ast().call(&g, vec![xn]).unwrap();
        let gy = ctx.ast().call(&g, vec![yn]).unwrap();
        let c = ctx.ast().eq(gx, gy);

        let reduced = ackermann_reduce(&[c], &mut ctx);
        assert_eq!(reduced.len(), 1);
        assert!(reduced[0].is_op(Op::Implies));
        assert!(!reduced[0].calls(&|f: &FunctionInfo| f.is_uninterpreted()));
    }
}
