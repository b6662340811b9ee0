use std::{
    fmt::Display,
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::context::{Sort, Sorted, Variable};

use super::{Node, Op};

/// What a declared function stands for.
#[derive(Debug, Clone)]
pub enum FunctionKind {
    /// A `define-fun` macro whose body refers to its arguments through [`Param`] nodes.
    Macro(Node),
    /// A synthesis target, with the parameter names from its `synth-fun` declaration.
    Unknown(Vec<Rc<Variable>>),
    /// A `declare-fun` with arguments. Eliminated by Ackermann reduction.
    Uninterpreted,
    /// A unary identity function that tags conditions produced by grammar decomposition.
    Marker,
}

/// A user function symbol.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    id: usize,
    name: String,
    domain: Vec<Sort>,
    range: Sort,
    kind: FunctionKind,
}

impl FunctionInfo {
    pub(crate) fn new(
        id: usize,
        name: String,
        domain: Vec<Sort>,
        range: Sort,
        kind: FunctionKind,
    ) -> Self {
        Self {
            id,
            name,
            domain,
            range,
            kind,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &[Sort] {
        &self.domain
    }

    pub fn range(&self) -> &Sort {
        &self.range
    }

    pub fn arity(&self) -> usize {
        self.domain.len()
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, FunctionKind::Unknown(_))
    }

    pub fn is_uninterpreted(&self) -> bool {
        matches!(self.kind, FunctionKind::Uninterpreted)
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.kind, FunctionKind::Marker)
    }

    /// The body of a macro.
    pub fn macro_body(&self) -> Option<&Node> {
        match &self.kind {
            FunctionKind::Macro(body) => Some(body),
            _ => None,
        }
    }

    /// The named parameters of a synthesis target.
    pub fn named_params(&self) -> Option<&[Rc<Variable>]> {
        match &self.kind {
            FunctionKind::Unknown(params) => Some(params),
            _ => None,
        }
    }

    /// The formal parameters of this function, in order.
    pub fn params(&self) -> Vec<Param> {
        self.domain
            .iter()
            .enumerate()
            .map(|(i, s)| Param::new(self.id, i, s.clone()))
            .collect()
    }
}

impl PartialEq for FunctionInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for FunctionInfo {}

impl Hash for FunctionInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for FunctionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A formal parameter: the `position`-th argument of the function with id `func`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    func: usize,
    position: usize,
    sort: Sort,
}

impl Param {
    pub fn new(func: usize, position: usize, sort: Sort) -> Self {
        Self {
            func,
            position,
            sort,
        }
    }

    /// Id of the function this parameter belongs to.
    pub fn func(&self) -> usize {
        self.func
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Sorted for Param {
    fn sort(&self) -> Sort {
        self.sort.clone()
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "_arg_{}", self.position)
    }
}

/// The head of an application: a theory operator or a user function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Builtin(Op),
    User(Rc<FunctionInfo>),
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Builtin(op) => write!(f, "{}", op),
            Symbol::User(func) => write!(f, "{}", func),
        }
    }
}
