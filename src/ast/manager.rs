use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::{
    context::{Sort, Sorted, Variable},
    theory::Value,
};

use super::{error::ContextError, FunctionInfo, Node, NodeKind, Op, OwnedNode, Param, Symbol};

/// The type we use for hash-consing nodes
type NodeKey = (NodeKind, Vec<Node>);

const INITIAL_GC_THRESHOLD: usize = 1 << 12;

/// Creates and interns nodes.
///
/// Structurally equal nodes built through the same builder are the same `Rc`.
/// Interning never reorders or flattens children, so that a term built from grammar rules
/// is still derivable from the grammar after interning.
/// The Boolean helpers ([`AstBuilder::and`], [`AstBuilder::or`], [`AstBuilder::not`]) do simplify;
/// use [`AstBuilder::apply`] to build a node exactly as given.
pub struct AstBuilder {
    /// Counter for unique identifiers
    next_id: usize,

    /// Registry of nodes
    node_registry: IndexMap<NodeKey, Node>,

    /// Registry size at which the next garbage collection runs
    gc_threshold: usize,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self {
            next_id: 0,
            node_registry: IndexMap::new(),
            gc_threshold: INITIAL_GC_THRESHOLD,
        }
    }
}

impl AstBuilder {
    pub(crate) fn intern_node(&mut self, kind: NodeKind, children: Vec<Node>, sort: Sort) -> Node {
        let key = (kind, children);
        if let Some(rc_node) = self.node_registry.get(&key) {
            return rc_node.clone();
        }
        let node = OwnedNode::new(self.next_id, key.0.clone(), key.1.clone(), sort);
        let rc_node = Rc::new(node);
        self.node_registry.insert(key, rc_node.clone());
        self.next_id += 1;

        if self.node_registry.len() >= self.gc_threshold {
            self.gc();
        }
        rc_node
    }

    /// Delete all nodes that are only referenced by the registry
    fn gc(&mut self) {
        let before = self.node_registry.len();
        // Parents hold references to their children, so sweep until nothing changes.
        loop {
            let len = self.node_registry.len();
            self.node_registry
                .retain(|_, rc_node| Rc::strong_count(rc_node) > 1);
            if self.node_registry.len() == len {
                break;
            }
        }
        log::trace!(
            "GC: Removed {} nodes",
            before - self.node_registry.len()
        );
        self.gc_threshold = (self.node_registry.len() * 2).max(INITIAL_GC_THRESHOLD);
    }

    /// Number of live interned nodes.
    pub fn size(&self) -> usize {
        self.node_registry.len()
    }

    /// Returns true if the node was interned by this builder.
    pub fn owns(&self, node: &Node) -> bool {
        let key = (node.kind().clone(), node.children().to_vec());
        self.node_registry
            .get(&key)
            .map_or(false, |known| Rc::ptr_eq(known, node))
    }

    /* Leaves */

    pub fn constant(&mut self, value: Value) -> Node {
        let sort = value.sort();
        self.intern_node(NodeKind::Const(value), vec![], sort)
    }

    pub fn int(&mut self, i: i64) -> Node {
        self.constant(Value::Int(i))
    }

    pub fn bool(&mut self, b: bool) -> Node {
        self.constant(Value::Bool(b))
    }

    /// The Boolean constant `true`
    pub fn ttrue(&mut self) -> Node {
        self.bool(true)
    }

    /// The Boolean constant `false`
    pub fn ffalse(&mut self) -> Node {
        self.bool(false)
    }

    /// A variable
    pub fn variable(&mut self, var: Rc<Variable>) -> Node {
        let sort = var.sort();
        self.intern_node(NodeKind::Variable(var), vec![], sort)
    }

    /// A formal parameter
    pub fn param(&mut self, param: Param) -> Node {
        let sort = param.sort();
        self.intern_node(NodeKind::Param(param), vec![], sort)
    }

    /* Checked applications */

    /// Applies an operator after checking the argument sorts.
    pub fn op(&mut self, op: Op, args: Vec<Node>) -> Result<Node, ContextError> {
        let sorts: Vec<Sort> = args.iter().map(|a| a.sort()).collect();
        match op.range(&sorts) {
            Some(sort) => Ok(self.intern_node(NodeKind::Op(op), args, sort)),
            None => Err(ContextError::SortMismatch(op.name().to_string(), sorts)),
        }
    }

    /// Applies a user function after checking the argument sorts.
    pub fn call(&mut self, f: &Rc<FunctionInfo>, args: Vec<Node>) -> Result<Node, ContextError> {
        let sorts: Vec<Sort> = args.iter().map(|a| a.sort()).collect();
        if sorts != f.domain() {
            return Err(ContextError::SortMismatch(f.name().to_string(), sorts));
        }
        let sort = f.range().clone();
        Ok(self.intern_node(NodeKind::App(f.clone()), args, sort))
    }

    /// Applies an operator or user function after checking the argument sorts.
    pub fn apply(&mut self, sym: &Symbol, args: Vec<Node>) -> Result<Node, ContextError> {
        match sym {
            Symbol::Builtin(op) => self.op(*op, args),
            Symbol::User(f) => self.call(f, args),
        }
    }

    /// Rebuilds `node` with new children, keeping its kind.
    /// The children must have the same sorts as the original children.
    pub fn rebuild(&mut self, node: &Node, children: Vec<Node>) -> Node {
        if children.iter().zip(node.children()).all(|(a, b)| a == b) {
            return node.clone();
        }
        let sort = match node.kind() {
            NodeKind::Op(op) => {
                let sorts: Vec<Sort> = children.iter().map(|c| c.sort()).collect();
                op.range(&sorts).unwrap_or_else(|| node.sort())
            }
            _ => node.sort(),
        };
        self.intern_node(node.kind().clone(), children, sort)
    }

    /* Boolean Functions */

    /// Boolean conjunction.
    ///
    /// ## Simplifications
    /// - Removes all duplicates
    /// - Remove all `true` node
    /// - Return `false` upon `false` node
    /// - Return `false` if conjunction contains node and its negation
    /// - Flattens nested conjunctions
    /// - Returns `true` if the (simplified) arguments are empty
    pub fn and(&mut self, rs: Vec<Node>) -> Node {
        let mut simped = IndexSet::with_capacity(rs.len());
        for r in rs {
            if r.is_false() {
                return self.ffalse();
            } else if r.is_true() {
                continue;
            } else if r.is_op(Op::And) {
                simped.extend(r.children().iter().cloned())
            } else {
                let negated = self.not(r.clone());
                if simped.contains(&negated) {
                    return self.ffalse();
                }
                simped.insert(r);
            }
        }
        match simped.len() {
            0 => self.ttrue(),
            1 => simped[0].clone(),
            _ => self.intern_node(NodeKind::Op(Op::And), simped.into_iter().collect(), Sort::Bool),
        }
    }

    /// Boolean disjunction.
    ///
    /// ## Simplifications
    /// - Removes all duplicates
    /// - Remove all `false` node
    /// - Return `true` upon `true` node
    /// - Return `true` if disjunction contains node and its negation
    /// - Flattens nested disjunctions
    /// - Returns `false` if the (simplified) arguments are empty
    pub fn or(&mut self, rs: Vec<Node>) -> Node {
        let mut simped = IndexSet::with_capacity(rs.len());
        for r in rs {
            if r.is_true() {
                return self.ttrue();
            } else if r.is_false() {
                continue;
            } else if r.is_op(Op::Or) {
                simped.extend(r.children().iter().cloned())
            } else {
                let negated = self.not(r.clone());
                if simped.contains(&negated) {
                    return self.ttrue();
                }
                simped.insert(r);
            }
        }
        match simped.len() {
            0 => self.ffalse(),
            1 => simped[0].clone(),
            _ => self.intern_node(NodeKind::Op(Op::Or), simped.into_iter().collect(), Sort::Bool),
        }
    }

    /// Boolean negation
    ///
    /// ## Simplifications
    /// - Returns `false` if node is `true`
    /// - Returns `true` if node is `false`
    /// - Eliminates double-negations
    pub fn not(&mut self, r: Node) -> Node {
        debug_assert!(r.sort().is_bool());
        if r.is_true() {
            self.ffalse()
        } else if r.is_false() {
            self.ttrue()
        } else if r.is_op(Op::Not) {
            r[0].clone()
        } else {
            self.intern_node(NodeKind::Op(Op::Not), vec![r], Sort::Bool)
        }
    }

    /// Implication
    pub fn imp(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Op(Op::Implies), vec![l, r], Sort::Bool)
    }

    /// Equality of Boolean terms
    pub fn iff(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Op(Op::Iff), vec![l, r], Sort::Bool)
    }

    /// Exclusive or
    pub fn xor(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Op(Op::Xor), vec![l, r], Sort::Bool)
    }

    /// Equality. Bool-sorted arguments produce [`Op::Iff`].
    pub fn eq(&mut self, l: Node, r: Node) -> Node {
        debug_assert_eq!(l.sort(), r.sort());
        if l.sort().is_bool() {
            self.iff(l, r)
        } else {
            self.intern_node(NodeKind::Op(Op::Eq), vec![l, r], Sort::Bool)
        }
    }

    /// If-then-else
    pub fn ite(&mut self, i: Node, t: Node, e: Node) -> Node {
        debug_assert!(i.sort().is_bool());
        debug_assert_eq!(t.sort(), e.sort());
        let sort = t.sort();
        self.intern_node(NodeKind::Op(Op::Ite), vec![i, t, e], sort)
    }

    /* Integer Functions */

    pub fn add(&mut self, rs: Vec<Node>) -> Node {
        self.intern_node(NodeKind::Op(Op::Add), rs, Sort::Int)
    }

    pub fn sub(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Op(Op::Sub), vec![l, r], Sort::Int)
    }

    pub fn le(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Op(Op::Le), vec![l, r], Sort::Bool)
    }

    pub fn ge(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Op(Op::Ge), vec![l, r], Sort::Bool)
    }

    pub fn lt(&mut self, l: Node, r: Node) -> Node {
        self.intern_node(NodeKind::Op(Op::Lt), vec![l, r], Sort::Bool)
    }

    /* Structural */

    /// Tuple of the given components.
    pub fn tuple(&mut self, rs: Vec<Node>) -> Node {
        let sorts: Vec<Sort> = rs.iter().map(|r| r.sort()).collect();
        self.intern_node(NodeKind::Op(Op::Tuple), rs, Sort::Tuple(Rc::from(sorts)))
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;

    use super::*;

    #[test]
    fn structurally_equal_nodes_are_shared() {
        let mut ctx = Context::default();
        let x = ctx.temp_var(Sort::Int);
        let a = ctx.ast().variable(x.clone());
        let b = ctx.ast().variable(x);
        let one = ctx.ast().int(1);
        let s1 = ctx.ast().add(vec![a.clone(), one.clone()]);
        let s2 = ctx.ast().add(vec![b, one.clone()]);
        assert!(Rc::ptr_eq(&s1, &s2));
        // no reordering
        let s3 = ctx.ast().add(vec![one, a]);
        assert_ne!(s1, s3);
    }

    #[test]
    fn and_simplifies() {
        let mut ctx = Context::default();
        let p = ctx.temp_var(Sort::Bool);
        let p = ctx.ast().variable(p);
        let np = ctx.ast().not(p.clone());
        let t = ctx.ast().ttrue();
        assert_eq!(ctx.ast().and(vec![p.clone(), t]), p);
        assert!(ctx.ast().and(vec![p.clone(), np]).is_false());
        assert!(ctx.ast().and(vec![]).is_true());
    }

    #[test]
    fn checked_op_rejects_ill_sorted() {
        let mut ctx = Context::default();
        let one = ctx.ast().int(1);
        let t = ctx.ast().ttrue();
        assert!(ctx.ast().op(Op::Add, vec![one.clone(), t]).is_err());
        assert!(ctx.ast().op(Op::Add, vec![one.clone(), one]).is_ok());
    }

    #[test]
    fn gc_keeps_live_nodes() {
        let mut ctx = Context::default();
        let x = ctx.temp_var(Sort::Int);
        let x = ctx.ast().variable(x);
        let keep = ctx.ast().add(vec![x.clone(), x.clone()]);
        for i in 0..(INITIAL_GC_THRESHOLD as i64 * 2) {
            ctx.ast().int(i);
        }
        let again = ctx.ast().add(vec![x.clone(), x]);
        assert!(Rc::ptr_eq(&keep, &again));
    }
}
