use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    rc::Rc,
};

use indexmap::{IndexMap, IndexSet};

use crate::context::{Context, Variable};

use super::{FunctionInfo, Node, NodeKind};

/// A substitution that maps nodes to other nodes.
///
/// Applying the substitution replaces every maximal sub-node that is a key by its value.
/// Values are not substituted again, so a substitution whose values mention its keys terminates.
#[derive(Debug, Clone, Default)]
pub struct NodeSubstitution {
    map: IndexMap<Node, Node>,
}

impl NodeSubstitution {
    pub fn insert(&mut self, key: Node, value: Node) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &Node) -> Option<&Node> {
        self.map.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Apply the substitution to the given node.
    pub fn apply(&self, node: &Node, ctx: &mut Context) -> Node {
        let mut cache = HashMap::new();
        self.apply_cached(node, ctx, &mut cache)
    }

    fn apply_cached(&self, node: &Node, ctx: &mut Context, cache: &mut HashMap<Node, Node>) -> Node {
        if let Some(value) = self.map.get(node) {
            return value.clone();
        }
        if node.children().is_empty() {
            return node.clone();
        }
        if let Some(done) = cache.get(node) {
            return done.clone();
        }
        let children = node
            .children()
            .iter()
            .map(|child| self.apply_cached(child, ctx, cache))
            .collect();
        let res = ctx.ast().rebuild(node, children);
        cache.insert(node.clone(), res.clone());
        res
    }
}

impl FromIterator<(Node, Node)> for NodeSubstitution {
    fn from_iter<T: IntoIterator<Item = (Node, Node)>>(iter: T) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

impl Display for NodeSubstitution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} -> {}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// Returns the first application (in pre-order) of a function satisfying `pred`.
pub fn find_application(node: &Node, pred: &impl Fn(&FunctionInfo) -> bool) -> Option<Node> {
    if let NodeKind::App(f) = node.kind() {
        if pred(f) {
            return Some(node.clone());
        }
    }
    node.children()
        .iter()
        .find_map(|c| find_application(c, pred))
}

/// Returns the first node (in pre-order) below `root` that has `child` as a direct child.
pub fn parent_of(root: &Node, child: &Node) -> Option<Node> {
    if root.children().iter().any(|c| c == child) {
        return Some(root.clone());
    }
    root.children().iter().find_map(|c| parent_of(c, child))
}

/// Matches `node` against `template`, where the variables in `holes` match any sub-node of the same sort.
/// Returns the bindings of the holes, or `None` if the node does not have the template's shape.
pub fn match_template(
    template: &Node,
    node: &Node,
    holes: &IndexSet<Rc<Variable>>,
) -> Option<IndexMap<Rc<Variable>, Node>> {
    fn go(
        template: &Node,
        node: &Node,
        holes: &IndexSet<Rc<Variable>>,
        bindings: &mut IndexMap<Rc<Variable>, Node>,
    ) -> bool {
        use crate::context::Sorted;
        if let Some(v) = template.as_variable() {
            if holes.contains(v) {
                if v.sort() != node.sort() {
                    return false;
                }
                return match bindings.get(v) {
                    Some(bound) => bound == node,
                    None => {
                        bindings.insert(v.clone(), node.clone());
                        true
                    }
                };
            }
        }
        template.kind() == node.kind()
            && template.children().len() == node.children().len()
            && template
                .children()
                .iter()
                .zip(node.children())
                .all(|(t, n)| go(t, n, holes, bindings))
    }

    let mut bindings = IndexMap::new();
    if go(template, node, holes, &mut bindings) {
        Some(bindings)
    } else {
        None
    }
}
