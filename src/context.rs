use std::{
    fmt::Display,
    hash::{Hash, Hasher},
    rc::Rc,
    sync::atomic::{AtomicUsize, Ordering},
};

use indexmap::{IndexMap, IndexSet};

use crate::ast::{error::ContextError, AstBuilder, FunctionInfo, FunctionKind};

/// Source of unique context identifiers, used to tell contexts apart in diagnostics.
static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// The sorts supported by the synthesizer.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum Sort {
    Bool,
    Int,
    String,
    /// Fixed-width bit-vectors of at most 64 bits.
    BitVec(u32),
    /// Tuples only appear as the sort of the synthetic start symbol of merged grammars.
    Tuple(Rc<[Sort]>),
}

impl Sort {
    /// Returns true if the sort is Bool.
    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::Bool)
    }

    /// Returns true if the sort is Int.
    pub fn is_int(&self) -> bool {
        matches!(self, Sort::Int)
    }

    /// Returns true if the sort is String.
    pub fn is_string(&self) -> bool {
        matches!(self, Sort::String)
    }

    /// Returns the width if this is a bit-vector sort.
    pub fn bv_width(&self) -> Option<u32> {
        match self {
            Sort::BitVec(w) => Some(*w),
            _ => None,
        }
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::String => write!(f, "String"),
            Sort::BitVec(w) => write!(f, "(BitVec {})", w),
            Sort::Tuple(sorts) => {
                write!(f, "(Tuple")?;
                for s in sorts.iter() {
                    write!(f, " {}", s)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub trait Sorted {
    fn sort(&self) -> Sort;
}

/// A named symbol with a sort.
/// Variables are identified by their id, which is unique within the context that created them.
#[derive(Debug, Clone)]
pub struct Variable {
    id: usize,
    name: String,
    sort: Sort,
}

impl Variable {
    pub(crate) fn new(id: usize, name: String, sort: Sort) -> Self {
        Self { id, name, sort }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Sorted for Variable {
    fn sort(&self) -> Sort {
        self.sort.clone()
    }
}

/// Owns every expression node and symbol declaration of one benchmark.
///
/// The context is created once per benchmark and passed by reference to all normalization,
/// classification and search calls. Expressions built by one context must not be mixed with
/// another context; [`Context::owns_variable`] and [`Context::owns_function`] detect such mixing.
pub struct Context {
    id: usize,
    ast: AstBuilder,

    /// Universally quantified variables, indexed by name
    variables: IndexMap<String, Rc<Variable>>,
    /// Let-bound names, synth-fun parameter names and pattern placeholders
    locals: IndexSet<Rc<Variable>>,

    /// User-declared functions (macros, targets, uninterpreted functions, markers), indexed by name
    functions: IndexMap<String, Rc<FunctionInfo>>,

    next_var_id: usize,
    next_fn_id: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            ast: AstBuilder::default(),
            variables: IndexMap::new(),
            locals: IndexSet::new(),
            functions: IndexMap::new(),
            next_var_id: 0,
            next_fn_id: 0,
        }
    }
}

impl Context {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the builder that interns all nodes of this context.
    pub fn ast(&mut self) -> &mut AstBuilder {
        &mut self.ast
    }

    /// Returns true if the node was built by this context.
    pub fn owns_node(&self, node: &crate::ast::Node) -> bool {
        self.ast.owns(node)
    }

    /* Variables */

    /// Declares a universally quantified variable.
    /// Re-declaring a variable with the same sort returns the existing variable.
    pub fn declare_var(&mut self, name: &str, sort: Sort) -> Result<Rc<Variable>, ContextError> {
        if let Some(v) = self.variables.get(name) {
            if v.sort != sort {
                return Err(ContextError::AlreadyDeclared(name.to_string()));
            }
            return Ok(v.clone());
        }
        if self.functions.contains_key(name) {
            return Err(ContextError::AlreadyDeclared(name.to_string()));
        }
        let v = Rc::new(Variable::new(self.next_var_id, name.to_string(), sort));
        self.next_var_id += 1;
        self.variables.insert(name.to_string(), v.clone());
        Ok(v)
    }

    /// Creates a fresh universally quantified variable whose name starts with `prefix`.
    pub fn fresh_var(&mut self, prefix: &str, sort: Sort) -> Rc<Variable> {
        let mut n = self.variables.len();
        loop {
            let name = format!("__{}_{}", prefix, n);
            if !self.variables.contains_key(&name) {
                let v = Rc::new(Variable::new(self.next_var_id, name.clone(), sort));
                self.next_var_id += 1;
                self.variables.insert(name, v.clone());
                return v;
            }
            n += 1;
        }
    }

    /// Creates a variable that is not universally quantified, e.g. a let-bound name or a named parameter.
    pub fn local_var(&mut self, name: &str, sort: Sort) -> Rc<Variable> {
        let v = Rc::new(Variable::new(self.next_var_id, name.to_string(), sort));
        self.next_var_id += 1;
        self.locals.insert(v.clone());
        v
    }

    /// Creates a fresh variable for tests.
    #[cfg(test)]
    pub fn temp_var(&mut self, sort: Sort) -> Rc<Variable> {
        self.fresh_var("tmp", sort)
    }

    pub fn get_var(&self, name: &str) -> Option<Rc<Variable>> {
        self.variables.get(name).cloned()
    }

    /// Returns an iterator over all universally quantified variables, in declaration order.
    pub fn vars(&self) -> impl Iterator<Item = &Rc<Variable>> + '_ {
        self.variables.values()
    }

    /// Returns true if the variable was created by this context.
    pub fn owns_variable(&self, v: &Rc<Variable>) -> bool {
        match self.variables.get(v.name()) {
            Some(known) if Rc::ptr_eq(known, v) => true,
            _ => self.locals.get(v).map_or(false, |l| Rc::ptr_eq(l, v)),
        }
    }

    /* Functions */

    /// Reserves an identifier for a function that is declared later.
    /// Macro and target bodies refer to their own parameters by function id before the function is declared.
    pub fn reserve_function_id(&mut self) -> usize {
        self.next_fn_id += 1;
        self.next_fn_id - 1
    }

    /// Declares a user function.
    pub fn declare_function(
        &mut self,
        id: usize,
        name: &str,
        domain: Vec<Sort>,
        range: Sort,
        kind: FunctionKind,
    ) -> Result<Rc<FunctionInfo>, ContextError> {
        if self.functions.contains_key(name) || self.variables.contains_key(name) {
            return Err(ContextError::AlreadyDeclared(name.to_string()));
        }
        let f = Rc::new(FunctionInfo::new(id, name.to_string(), domain, range, kind));
        self.functions.insert(name.to_string(), f.clone());
        Ok(f)
    }

    /// Declares a marker function with a name derived from `prefix` that is not yet taken.
    pub fn fresh_marker(&mut self, prefix: &str, sort: Sort) -> Rc<FunctionInfo> {
        let mut n = 0;
        let name = loop {
            let name = format!("__{}_{}", prefix, n);
            if !self.functions.contains_key(&name) {
                break name;
            }
            n += 1;
        };
        let id = self.reserve_function_id();
        let f = Rc::new(FunctionInfo::new(
            id,
            name.clone(),
            vec![sort.clone()],
            sort,
            FunctionKind::Marker,
        ));
        self.functions.insert(name, f.clone());
        f
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<FunctionInfo>> {
        self.functions.get(name).cloned()
    }

    /// Returns true if the function was created by this context.
    pub fn owns_function(&self, f: &Rc<FunctionInfo>) -> bool {
        self.functions
            .get(f.name())
            .map_or(false, |known| Rc::ptr_eq(known, f))
    }

    /// Returns all declared functions, in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &Rc<FunctionInfo>> + '_ {
        self.functions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclare_same_sort_returns_same_var() {
        let mut ctx = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        let x2 = ctx.declare_var("x", Sort::Int).unwrap();
        assert!(Rc::ptr_eq(&x, &x2));
    }

    #[test]
    fn redeclare_different_sort_fails() {
        let mut ctx = Context::default();
        ctx.declare_var("x", Sort::Int).unwrap();
        assert!(ctx.declare_var("x", Sort::Bool).is_err());
    }

    #[test]
    fn foreign_variable_not_owned() {
        let mut ctx = Context::default();
        let mut other = Context::default();
        let x = ctx.declare_var("x", Sort::Int).unwrap();
        other.declare_var("x", Sort::Int).unwrap();
        assert!(ctx.owns_variable(&x));
        assert!(!other.owns_variable(&x));
    }

    #[test]
    fn fresh_vars_are_distinct() {
        let mut ctx = Context::default();
        let a = ctx.fresh_var("ack", Sort::Int);
        let b = ctx.fresh_var("ack", Sort::Int);
        assert_ne!(a.name(), b.name());
        assert!(ctx.owns_variable(&a));
    }
}
