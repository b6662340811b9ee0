use crate::{
    ast::{Node, Op},
    context::{Context, Sort, Sorted},
    sexp::{Atom, Sexp},
    theory::Value,
};

use super::ParseError;

/// Reads a sort: `Bool`, `Int`, `String`, `(BitVec w)` or `(_ BitVec w)`.
pub(super) fn sort(sexp: &Sexp) -> Result<Sort, ParseError> {
    match sexp {
        Sexp::Atom(Atom::Symbol(s)) => match s.as_str() {
            "Bool" => Ok(Sort::Bool),
            "Int" => Ok(Sort::Int),
            "String" => Ok(Sort::String),
            _ => Err(ParseError::UnknownSort(s.clone())),
        },
        Sexp::List(items) => match items.as_slice() {
            [bv, w] if bv.symbol() == Some("BitVec") => bv_sort(w, sexp),
            [us, bv, w] if us.symbol() == Some("_") && bv.symbol() == Some("BitVec") => {
                bv_sort(w, sexp)
            }
            _ => Err(ParseError::UnknownSort(sexp.to_string())),
        },
        _ => Err(ParseError::UnknownSort(sexp.to_string())),
    }
}

fn bv_sort(width: &Sexp, sexp: &Sexp) -> Result<Sort, ParseError> {
    match width.int() {
        Some(w @ 1..=64) => Ok(Sort::BitVec(w as u32)),
        _ => Err(ParseError::Unsupported(format!("sort {}", sexp))),
    }
}

/// Reads a parameter list `((x Int) (y Int))`.
pub(super) fn sorted_vars(sexp: &Sexp) -> Result<Vec<(String, Sort)>, ParseError> {
    let items = sexp
        .list()
        .ok_or_else(|| ParseError::Malformed(format!("parameter list {}", sexp)))?;
    items
        .iter()
        .map(|item| match item.list() {
            Some([name, s]) => {
                let name = name
                    .symbol()
                    .ok_or_else(|| ParseError::Malformed(format!("parameter {}", item)))?;
                Ok((name.to_string(), sort(s)?))
            }
            _ => Err(ParseError::Malformed(format!("parameter {}", item))),
        })
        .collect()
}

/// Resolves an operator name for arguments of the given sorts.
/// `=` over Bool is equivalence and unary `-` is negation.
pub(super) fn resolve_op(name: &str, sorts: &[Sort]) -> Option<Op> {
    match (name, sorts) {
        ("=", [Sort::Bool, Sort::Bool]) => Some(Op::Iff),
        ("-", [_]) => Some(Op::Neg),
        _ => Op::from_name(name),
    }
}

/// Converts terms into nodes of a context.
///
/// Names bound by `let` and by the parameter list of the enclosing definition shadow declared symbols.
pub(super) struct Converter<'a> {
    ctx: &'a mut Context,
    /// Bound names, innermost last
    bindings: Vec<(String, Node)>,
}

impl<'a> Converter<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        Self::with_bindings(ctx, vec![])
    }

    pub fn with_bindings(ctx: &'a mut Context, bindings: Vec<(String, Node)>) -> Self {
        Self { ctx, bindings }
    }

    pub fn term(&mut self, sexp: &Sexp) -> Result<Node, ParseError> {
        if let Some(v) = Value::from_sexp(sexp) {
            return Ok(self.ctx.ast().constant(v));
        }
        match sexp {
            Sexp::Atom(Atom::Symbol(name)) => self.symbol(name),
            Sexp::Atom(_) => Err(ParseError::Malformed(format!("literal {}", sexp))),
            Sexp::List(items) => match items.as_slice() {
                [head, bindings, body] if head.symbol() == Some("let") => {
                    self.let_term(bindings, body)
                }
                [head, args @ ..] if !args.is_empty() => {
                    let name = head
                        .symbol()
                        .ok_or_else(|| ParseError::Unsupported(format!("term {}", sexp)))?;
                    let args = args
                        .iter()
                        .map(|a| self.term(a))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.apply(name, args)
                }
                _ => Err(ParseError::Malformed(format!("term {}", sexp))),
            },
        }
    }

    /// Converts a term that must have the given sort.
    pub fn sorted_term(&mut self, sexp: &Sexp, expected: &Sort) -> Result<Node, ParseError> {
        let t = self.term(sexp)?;
        if &t.sort() != expected {
            return Err(ParseError::SortMismatch {
                term: sexp.to_string(),
                expected: expected.clone(),
                found: t.sort(),
            });
        }
        Ok(t)
    }

    fn symbol(&mut self, name: &str) -> Result<Node, ParseError> {
        if let Some((_, n)) = self.bindings.iter().rev().find(|(b, _)| b == name) {
            return Ok(n.clone());
        }
        if let Some(v) = self.ctx.get_var(name) {
            return Ok(self.ctx.ast().variable(v));
        }
        match self.ctx.get_function(name) {
            Some(f) if f.arity() == 0 => Ok(self.ctx.ast().call(&f, vec![])?),
            _ => Err(ParseError::Undeclared(name.to_string())),
        }
    }

    fn let_term(&mut self, bindings: &Sexp, body: &Sexp) -> Result<Node, ParseError> {
        let pairs = bindings
            .list()
            .ok_or_else(|| ParseError::Malformed(format!("let bindings {}", bindings)))?;
        let mut children = Vec::with_capacity(2 * pairs.len() + 1);
        let mut scope = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (name, value) = match pair.list() {
                Some([name, value]) => match name.symbol() {
                    Some(name) => (name, value),
                    None => return Err(ParseError::Malformed(format!("let binding {}", pair))),
                },
                _ => return Err(ParseError::Malformed(format!("let binding {}", pair))),
            };
            // values are read in the enclosing scope
            let value = self.term(value)?;
            let var = self.ctx.local_var(name, value.sort());
            let var = self.ctx.ast().variable(var);
            children.push(var.clone());
            children.push(value);
            scope.push((name.to_string(), var));
        }
        let depth = self.bindings.len();
        self.bindings.extend(scope);
        let body = self.term(body);
        self.bindings.truncate(depth);
        children.push(body?);
        Ok(self.ctx.ast().op(Op::Let, children)?)
    }

    /// Applies a user function or a theory operator.
    fn apply(&mut self, name: &str, args: Vec<Node>) -> Result<Node, ParseError> {
        if let Some(f) = self.ctx.get_function(name) {
            return Ok(self.ctx.ast().call(&f, args)?);
        }
        if name == "distinct" {
            let eq = self.apply("=", args)?;
            return Ok(self.ctx.ast().not(eq));
        }
        let sorts: Vec<Sort> = args.iter().map(|a| a.sort()).collect();
        let op = resolve_op(name, &sorts).ok_or_else(|| ParseError::Undeclared(name.to_string()))?;
        Ok(self.ctx.ast().op(op, args)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::sexp::parse;

    use super::*;

    fn read(ctx: &mut Context, s: &str) -> Result<Node, ParseError> {
        Converter::new(ctx).term(&parse(s).unwrap())
    }

    #[test]
    fn bool_equality_is_equivalence() {
        let mut ctx = Context::default();
        ctx.declare_var("p", Sort::Bool).unwrap();
        ctx.declare_var("x", Sort::Int).unwrap();
        assert!(read(&mut ctx, "(= p (< x 1))").unwrap().is_op(Op::Iff));
        assert!(read(&mut ctx, "(= x 1)").unwrap().is_op(Op::Eq));
        assert!(read(&mut ctx, "(- x)").unwrap().is_op(Op::Neg));
        assert_eq!(read(&mut ctx, "(- 3)").unwrap().as_const(), Some(&Value::Int(-3)));
    }

    #[test]
    fn let_bindings_are_parallel_and_scoped() {
        let mut ctx = Context::default();
        ctx.declare_var("x", Sort::Int).unwrap();
        let t = read(&mut ctx, "(let ((x 1) (y x)) (+ x y))").unwrap();
        assert!(t.is_op(Op::Let));
        // y is bound to the outer x
        assert!(t[3].is_var());
        assert_eq!(t[3].as_variable().unwrap().name(), "x");
        assert!(ctx.owns_variable(t[3].as_variable().unwrap()));
        assert!(matches!(
            read(&mut ctx, "(+ (let ((y 1)) y) y)"),
            Err(ParseError::Undeclared(_))
        ));
    }

    #[test]
    fn ill_sorted_terms_are_rejected() {
        let mut ctx = Context::default();
        ctx.declare_var("x", Sort::Int).unwrap();
        assert!(matches!(
            read(&mut ctx, "(and x true)"),
            Err(ParseError::Context(_))
        ));
        assert!(matches!(
            Converter::new(&mut ctx).sorted_term(&parse("(+ x 1)").unwrap(), &Sort::Bool),
            Err(ParseError::SortMismatch { .. })
        ));
    }

    #[test]
    fn sorts() {
        assert_eq!(sort(&parse("(_ BitVec 8)").unwrap()).unwrap(), Sort::BitVec(8));
        assert_eq!(sort(&parse("(BitVec 32)").unwrap()).unwrap(), Sort::BitVec(32));
        assert!(sort(&parse("(_ BitVec 128)").unwrap()).is_err());
        assert!(sort(&parse("Real").unwrap()).is_err());
    }
}
