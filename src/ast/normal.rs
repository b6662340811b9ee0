use indexmap::IndexSet;
use itertools::Itertools;

use crate::context::Context;

use super::{Node, Op};

/// Converts a node to *Boolean Normal Form* (BNF).
/// A node is in BNF if the only Boolean connectives are `or`, `and`, and `not`.
pub fn to_bnf(node: &Node, ctx: &mut Context) -> Node {
    let op = match node.as_op() {
        Some(op) if op.is_connective() => op,
        // Base case: if the node is not a Boolean connective, return it unchanged
        _ => return node.clone(),
    };
    let children: Vec<Node> = node.children().iter().map(|c| to_bnf(c, ctx)).collect();
    match op {
        Op::Or => ctx.ast().or(children),
        Op::And => ctx.ast().and(children),
        Op::Not => ctx.ast().not(children[0].clone()),
        Op::Implies => {
            // a -> b is transformed into ¬a ∨ b
            let left_not = ctx.ast().not(children[0].clone());
            ctx.ast().or(vec![left_not, children[1].clone()])
        }
        Op::Iff | Op::Xor => {
            // a <-> b is transformed into (¬a ∨ b) ∧ (a ∨ ¬b)
            // a xor b is transformed into (a ∨ b) ∧ (¬a ∨ ¬b)
            let (l, r) = (children[0].clone(), children[1].clone());
            let nl = ctx.ast().not(l.clone());
            let nr = ctx.ast().not(r.clone());
            let (c1, c2) = if op == Op::Iff {
                (ctx.ast().or(vec![nl, r]), ctx.ast().or(vec![l, nr]))
            } else {
                (ctx.ast().or(vec![l, r]), ctx.ast().or(vec![nl, nr]))
            };
            ctx.ast().and(vec![c1, c2])
        }
        _ => unreachable!("not a connective: {}", op),
    }
}

/// Converts a node to *Negation Normal Form* (NNF).
/// A node is in NNF if it is in BNF and negations only occur in front of atoms.
/// If the node is not in BNF, it is first converted to BNF.
pub fn to_nnf(node: &Node, ctx: &mut Context) -> Node {
    let bnf = to_bnf(node, ctx);
    push_negations(&bnf, true, ctx)
}

/// Pushes negations inwards. `polarity` is false if the node occurs under an odd number of negations.
fn push_negations(node: &Node, polarity: bool, ctx: &mut Context) -> Node {
    match node.as_op() {
        Some(Op::Not) => push_negations(&node[0], !polarity, ctx),
        Some(op @ (Op::And | Op::Or)) => {
            let children: Vec<Node> = node
                .children()
                .iter()
                .map(|c| push_negations(c, polarity, ctx))
                .collect();
            // De Morgan: the connective flips under negative polarity
            if (op == Op::And) == polarity {
                ctx.ast().and(children)
            } else {
                ctx.ast().or(children)
            }
        }
        _ if polarity => node.clone(),
        _ => ctx.ast().not(node.clone()),
    }
}

/// Converts a node to *Conjunctive Normal Form* (CNF).
/// Returns the list of clauses and their conjunction.
/// Disjunctions are distributed over conjunctions, which can be exponential in the size of the input.
pub fn to_cnf(node: &Node, ctx: &mut Context) -> (Vec<Node>, Node) {
    let nnf = to_nnf(node, ctx);
    let clauses: IndexSet<Node> = cnf_clauses(&nnf, ctx)
        .into_iter()
        .map(|lits| ctx.ast().or(lits))
        .collect();
    let clauses: Vec<Node> = clauses.into_iter().collect();
    let conj = ctx.ast().and(clauses.clone());
    (clauses, conj)
}

/// Computes the clauses of a formula in NNF, each clause as its list of literals.
fn cnf_clauses(node: &Node, ctx: &mut Context) -> Vec<Vec<Node>> {
    match node.as_op() {
        Some(Op::And) => node
            .children()
            .iter()
            .flat_map(|c| cnf_clauses(c, ctx))
            .collect(),
        Some(Op::Or) => {
            let per_child: Vec<Vec<Vec<Node>>> =
                node.children().iter().map(|c| cnf_clauses(c, ctx)).collect();
            per_child
                .into_iter()
                .multi_cartesian_product()
                .map(|combination| combination.into_iter().flatten().collect())
                .collect()
        }
        _ => vec![vec![node.clone()]],
    }
}

/// Returns true if the node is in negation normal form.
pub fn is_nnf(node: &Node) -> bool {
    match node.as_op() {
        Some(Op::And | Op::Or) => node.children().iter().all(is_nnf),
        Some(Op::Not) => node[0].is_atomic(),
        Some(op) if op.is_connective() => false,
        _ => true,
    }
}
