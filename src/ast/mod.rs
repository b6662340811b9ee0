use std::{
    fmt::{Debug, Display},
    hash::Hash,
    ops::Index,
    rc::Rc,
};

pub mod error;
mod function;
mod manager;
pub mod normal;
mod op;
mod subs;
pub mod transform;

use indexmap::IndexSet;
pub use function::{FunctionInfo, FunctionKind, Param, Symbol};
pub use manager::AstBuilder;
pub use op::Op;
pub use subs::{find_application, match_template, parent_of, NodeSubstitution};

use crate::{
    context::{Sort, Sorted, Variable},
    theory::Value,
};

pub type Id = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A literal value
    Const(Value),
    /// A universally quantified, let-bound or named-parameter variable
    Variable(Rc<Variable>),
    /// A formal parameter of a macro or target function body
    Param(Param),
    /// Application of a theory operator
    Op(Op),
    /// Application of a user function (macro, target, uninterpreted function or marker)
    App(Rc<FunctionInfo>),
}

impl NodeKind {
    /// Returns true if the node is an atomic formula.
    /// An atomic formula is a Bool-sorted node that is not a Boolean connective.
    pub fn is_atom(&self) -> bool {
        match self {
            NodeKind::Const(v) => v.sort().is_bool(),
            NodeKind::Variable(v) => v.sort().is_bool(),
            NodeKind::Param(p) => p.sort().is_bool(),
            NodeKind::Op(op) => op.is_predicate(),
            NodeKind::App(f) => f.range().is_bool(),
        }
    }

    /// If this node is a variable, returns a reference to the variable.
    /// Otherwise, returns None.
    pub fn as_variable(&self) -> Option<&Rc<Variable>> {
        match self {
            NodeKind::Variable(v) => Some(v),
            _ => None,
        }
    }
}

pub type Node = Rc<OwnedNode>;

#[derive(Debug, Clone)]
pub struct OwnedNode {
    /// Unique identifier
    id: usize,

    /// Type of node
    kind: NodeKind,

    /// List of children
    children: Vec<Node>,

    /// Cached sort, computed once when the node is interned
    sort: Sort,
}

impl OwnedNode {
    pub(super) fn new(id: usize, kind: NodeKind, children: Vec<Node>, sort: Sort) -> Self {
        OwnedNode {
            id,
            kind,
            children,
            sort,
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns [`NodeKind`] of the node
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the children of the node
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Returns true if the node is a constant boolean with value `true`
    pub fn is_true(&self) -> bool {
        matches!(self.kind, NodeKind::Const(Value::Bool(true)))
    }

    /// Returns true if the node is a constant boolean with value `false`
    pub fn is_false(&self) -> bool {
        matches!(self.kind, NodeKind::Const(Value::Bool(false)))
    }

    /// Returns true if the node is a variable.
    pub fn is_var(&self) -> bool {
        matches!(self.kind, NodeKind::Variable(_))
    }

    /// Returns the operator if this node applies one.
    pub fn as_op(&self) -> Option<Op> {
        match self.kind {
            NodeKind::Op(op) => Some(op),
            _ => None,
        }
    }

    /// Returns true if the node applies the given operator.
    pub fn is_op(&self, op: Op) -> bool {
        self.as_op() == Some(op)
    }

    /// Returns the user function if this node applies one.
    pub fn as_app(&self) -> Option<&Rc<FunctionInfo>> {
        match &self.kind {
            NodeKind::App(f) => Some(f),
            _ => None,
        }
    }

    /// Returns true if this node applies the given user function.
    pub fn is_app_of(&self, f: &FunctionInfo) -> bool {
        self.as_app().map_or(false, |g| g.id() == f.id())
    }

    pub fn as_const(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Const(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Rc<Variable>> {
        self.kind.as_variable()
    }

    pub fn as_param(&self) -> Option<&Param> {
        match &self.kind {
            NodeKind::Param(p) => Some(p),
            _ => None,
        }
    }

    /// Returns true if the node is an atomic proposition within the theory.
    pub fn is_atomic(&self) -> bool {
        self.kind.is_atom()
    }

    /// Returns the set of variables occurring in the node.
    pub fn variables(&self) -> IndexSet<Rc<Variable>> {
        let mut vars = IndexSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut IndexSet<Rc<Variable>>) {
        if let NodeKind::Variable(v) = self.kind() {
            vars.insert(v.clone());
        }
        for child in self.children() {
            child.collect_variables(vars);
        }
    }

    /// Returns true if any formal parameter occurs in the node.
    pub fn has_params(&self) -> bool {
        self.as_param().is_some() || self.children().iter().any(|c| c.has_params())
    }

    /// Returns true if this node contains the given node as a sub-node.
    pub fn contains(&self, other: &Node) -> bool {
        if self == other.as_ref() {
            return true;
        }
        self.children().iter().any(|c| c.contains(other))
    }

    /// Returns true if an application of a function satisfying `pred` occurs in the node.
    pub fn calls(&self, pred: &impl Fn(&FunctionInfo) -> bool) -> bool {
        if let NodeKind::App(f) = self.kind() {
            if pred(f) {
                return true;
            }
        }
        self.children().iter().any(|c| c.calls(pred))
    }

    /// Returns an iterator over the children of the node
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    /// Returns the size of the node.
    /// The size of a node is the number of nodes in the tree rooted at this node.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }
}

impl Hash for OwnedNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for OwnedNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OwnedNode {}

impl Index<usize> for OwnedNode {
    type Output = Node;

    /// Returns the child at the given index or panics if the index is out of bounds.
    fn index(&self, index: usize) -> &Self::Output {
        &self.children[index]
    }
}

/// Collects every sub-term that is a literal value, in order of first occurrence.
pub fn get_constants(node: &Node) -> IndexSet<Value> {
    let mut consts = IndexSet::new();
    fn collect(node: &Node, consts: &mut IndexSet<Value>) {
        if let NodeKind::Const(v) = node.kind() {
            consts.insert(v.clone());
        }
        for c in node.children() {
            collect(c, consts);
        }
    }
    collect(node, &mut consts);
    consts
}

/* Sorting */

impl Sorted for OwnedNode {
    fn sort(&self) -> Sort {
        self.sort.clone()
    }
}

/* Pretty */

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Const(v) => write!(f, "{}", v),
            NodeKind::Variable(v) => write!(f, "{}", v),
            NodeKind::Param(p) => write!(f, "{}", p),
            NodeKind::Op(op) => write!(f, "{}", op),
            NodeKind::App(func) => write!(f, "{}", func.name()),
        }
    }
}

impl Display for OwnedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_op(Op::Let) {
            // (let ((v e) ...) body)
            let n = self.children.len() / 2;
            write!(f, "(let (")?;
            for i in 0..n {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "({} {})", self.children[2 * i], self.children[2 * i + 1])?;
            }
            return write!(f, ") {})", self.children[2 * n]);
        }
        if self.children().is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "({}", self.kind)?;
            for child in &self.children {
                write!(f, " {}", child)?;
            }
            write!(f, ")")
        }
    }
}
