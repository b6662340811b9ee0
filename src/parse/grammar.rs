//! Reading the grammar of a `synth-fun`.

use indexmap::{IndexMap, IndexSet};

use crate::{
    ast::{Node, Symbol},
    context::{Context, Sort, Sorted},
    grammar::{Grammar, Rewrite},
    sexp::{Atom, Sexp},
    theory::Value,
};

use super::{term::resolve_op, term::sort, ParseError};

/// Reads a grammar in the SyGuS v1 form `((N S (rules)) ...)`
/// or in the v2 form `((N S) ...) ((N S (rules)) ...)`.
///
/// `params` binds the target's parameter names to its formal parameters.
/// `(Constant T)` stands for the literals of sort `T` in `constants` and a few defaults.
pub(super) fn read_grammar(
    spec: &[Sexp],
    params: &[(String, Node)],
    constants: &IndexSet<Value>,
    ctx: &mut Context,
) -> Result<Grammar, ParseError> {
    let (decls, groups) = match spec {
        [groups] => (None, groups),
        [decls, groups] => (Some(decls), groups),
        _ => {
            return Err(ParseError::Malformed(format!(
                "grammar with {} parts",
                spec.len()
            )))
        }
    };
    let groups = groups
        .list()
        .ok_or_else(|| ParseError::Malformed(format!("grammar {}", groups)))?;

    let mut non_terminals = IndexMap::new();
    let mut bodies = Vec::with_capacity(groups.len());
    for group in groups {
        match group.list() {
            Some([name, s, rules]) => {
                let name = name
                    .symbol()
                    .ok_or_else(|| ParseError::Malformed(format!("nonterminal {}", name)))?;
                non_terminals.insert(name.to_string(), sort(s)?);
                bodies.push((name.to_string(), rules));
            }
            _ => return Err(ParseError::Malformed(format!("grammar rule {}", group))),
        }
    }

    let start = match decls.and_then(|d| d.list()).and_then(|d| d.first()) {
        Some(first) => first
            .list()
            .and_then(|l| l.first())
            .and_then(|n| n.symbol())
            .ok_or_else(|| ParseError::Malformed(format!("nonterminal declaration {}", first)))?
            .to_string(),
        None if non_terminals.contains_key("Start") => "Start".to_string(),
        None => non_terminals
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| ParseError::Malformed("empty grammar".to_string()))?,
    };

    let mut reader = RuleReader {
        ctx,
        non_terminals: &non_terminals,
        params,
        constants,
    };
    let mut rules: IndexMap<String, Vec<Rewrite>> = IndexMap::new();
    for (name, body) in bodies {
        let items = body
            .list()
            .ok_or_else(|| ParseError::Malformed(format!("rules of {}", name)))?;
        let mut productions = Vec::with_capacity(items.len());
        for item in items {
            productions.extend(reader.rules(item)?);
        }
        rules.entry(name).or_default().extend(productions);
    }
    Ok(Grammar::new(&start, non_terminals, rules)?)
}

struct RuleReader<'a> {
    ctx: &'a mut Context,
    non_terminals: &'a IndexMap<String, Sort>,
    params: &'a [(String, Node)],
    constants: &'a IndexSet<Value>,
}

impl RuleReader<'_> {
    /// The productions denoted by one rule; `(Constant T)` and `(Variable T)` denote several.
    fn rules(&mut self, sexp: &Sexp) -> Result<Vec<Rewrite>, ParseError> {
        if let Some((head, [s])) = sexp.app() {
            match head {
                "Constant" => {
                    let s = sort(s)?;
                    return Ok(self
                        .constants_of(&s)
                        .into_iter()
                        .map(|v| Rewrite::Const(self.ctx.ast().constant(v)))
                        .collect());
                }
                "Variable" | "InputVariable" => {
                    let s = sort(s)?;
                    return Ok(self
                        .params
                        .iter()
                        .filter(|(_, p)| p.sort() == s)
                        .map(|(_, p)| Rewrite::Expr(p.clone()))
                        .collect());
                }
                "LocalVariable" => {
                    return Err(ParseError::Unsupported(format!("grammar rule {}", sexp)))
                }
                _ => {}
            }
        }
        Ok(vec![self.rewrite(sexp)?])
    }

    fn constants_of(&self, sort: &Sort) -> IndexSet<Value> {
        let mut values = IndexSet::new();
        match sort {
            Sort::Bool => {
                values.insert(Value::Bool(true));
                values.insert(Value::Bool(false));
            }
            Sort::Int => {
                values.insert(Value::Int(0));
                values.insert(Value::Int(1));
            }
            Sort::BitVec(w) => {
                values.insert(Value::bv(0, *w));
                values.insert(Value::bv(1, *w));
            }
            Sort::String => {
                values.insert(Value::string(""));
            }
            Sort::Tuple(_) => {}
        }
        values.extend(self.constants.iter().filter(|c| &c.sort() == sort).cloned());
        values
    }

    fn rewrite(&mut self, sexp: &Sexp) -> Result<Rewrite, ParseError> {
        if let Some(v) = Value::from_sexp(sexp) {
            return Ok(Rewrite::Const(self.ctx.ast().constant(v)));
        }
        match sexp {
            Sexp::Atom(Atom::Symbol(name)) => {
                if let Some(s) = self.non_terminals.get(name) {
                    return Ok(Rewrite::NonTerminal(name.clone(), s.clone()));
                }
                if let Some((_, p)) = self.params.iter().find(|(n, _)| n == name) {
                    return Ok(Rewrite::Expr(p.clone()));
                }
                match self.ctx.get_function(name) {
                    Some(f) if f.arity() == 0 => Ok(Rewrite::Expr(self.ctx.ast().call(&f, vec![])?)),
                    _ => Err(ParseError::Undeclared(name.clone())),
                }
            }
            Sexp::List(items) => match items.as_slice() {
                [head, args @ ..] if !args.is_empty() => {
                    let name = head
                        .symbol()
                        .ok_or_else(|| ParseError::Malformed(format!("grammar rule {}", sexp)))?;
                    let children = args
                        .iter()
                        .map(|a| self.rewrite(a))
                        .collect::<Result<Vec<_>, _>>()?;
                    let sym = match self.ctx.get_function(name) {
                        Some(f) => Symbol::User(f),
                        None => {
                            let sorts: Vec<Sort> = children.iter().map(|c| c.sort()).collect();
                            Symbol::Builtin(
                                resolve_op(name, &sorts)
                                    .ok_or_else(|| ParseError::Undeclared(name.to_string()))?,
                            )
                        }
                    };
                    Rewrite::function(sym, children)
                        .ok_or_else(|| ParseError::Malformed(format!("ill-sorted grammar rule {}", sexp)))
                }
                _ => Err(ParseError::Malformed(format!("grammar rule {}", sexp))),
            },
            Sexp::Atom(_) => Err(ParseError::Malformed(format!("grammar rule {}", sexp))),
        }
    }
}
