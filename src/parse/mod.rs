//! Reading SyGuS benchmarks.

mod error;
mod grammar;
mod term;

use std::rc::Rc;

use indexmap::IndexSet;

pub use error::{ConfigError, ParseError};

use crate::{
    ast::{get_constants, FunctionInfo, FunctionKind, Node, Param},
    context::{Context, Sort, Sorted},
    grammar::Grammar,
    sexp::{self, Sexp},
    theory::{Theory, Value},
};

use term::{sort, sorted_vars, Converter};

/// A synthesis problem.
#[derive(Debug, Clone)]
pub struct Benchmark {
    pub logic: String,
    pub theory: Theory,
    /// The functions to synthesize, in declaration order
    pub targets: Vec<Rc<FunctionInfo>>,
    /// The grammar of each target, if its declaration has one
    pub grammars: Vec<Option<Grammar>>,
    pub constraints: Vec<Node>,
}

/// Reads a SyGuS benchmark, declaring its symbols in the context.
/// Commands after `check-synth` are ignored.
pub fn parse_benchmark(input: &str, ctx: &mut Context) -> Result<Benchmark, ParseError> {
    let commands = sexp::parse_many(input).map_err(|e| ParseError::Syntax {
        line: e.location.line,
        column: e.location.column,
        expected: e.expected.to_string(),
    })?;
    let mut reader = BenchmarkReader::new(ctx);
    for cmd in &commands {
        if !reader.command(cmd)? {
            break;
        }
    }
    reader.finish()
}

struct BenchmarkReader<'a> {
    ctx: &'a mut Context,
    logic: Option<String>,
    targets: Vec<Rc<FunctionInfo>>,
    /// Grammars are read last, so that `(Constant T)` can refer to the literals of the constraints
    pending: Vec<Option<Vec<Sexp>>>,
    constraints: Vec<Node>,
}

impl<'a> BenchmarkReader<'a> {
    fn new(ctx: &'a mut Context) -> Self {
        Self {
            ctx,
            logic: None,
            targets: vec![],
            pending: vec![],
            constraints: vec![],
        }
    }

    /// Processes one command. Returns false once `check-synth` is reached.
    fn command(&mut self, cmd: &Sexp) -> Result<bool, ParseError> {
        let (head, args) = cmd
            .app()
            .ok_or_else(|| ParseError::Malformed(format!("command {}", cmd)))?;
        match (head, args) {
            ("set-logic", [logic]) => {
                let logic = logic
                    .symbol()
                    .ok_or_else(|| ParseError::Malformed(format!("command {}", cmd)))?;
                if let Some(prev) = &self.logic {
                    return Err(ConfigError::MultipleLogics(prev.clone(), logic.to_string()).into());
                }
                self.logic = Some(logic.to_string());
            }
            ("set-option" | "set-info" | "set-feature", _) => {
                log::warn!("Ignoring {}", cmd);
            }
            ("declare-var", [name, s]) => {
                let name = symbol(name, cmd)?;
                self.ctx.declare_var(name, sort(s)?)?;
            }
            ("declare-fun", [name, params, s]) => {
                let name = symbol(name, cmd)?;
                let domain = params
                    .list()
                    .ok_or_else(|| ParseError::Malformed(format!("command {}", cmd)))?
                    .iter()
                    .map(sort)
                    .collect::<Result<Vec<_>, _>>()?;
                if domain.is_empty() {
                    self.ctx.declare_var(name, sort(s)?)?;
                } else {
                    let id = self.ctx.reserve_function_id();
                    self.ctx
                        .declare_function(id, name, domain, sort(s)?, FunctionKind::Uninterpreted)?;
                }
            }
            ("define-fun", [name, params, s, body]) => {
                let name = symbol(name, cmd)?;
                let params = sorted_vars(params)?;
                let range = sort(s)?;
                let id = self.ctx.reserve_function_id();
                let bindings = self.param_bindings(id, &params);
                let body = Converter::with_bindings(self.ctx, bindings).sorted_term(body, &range)?;
                let domain = params.into_iter().map(|(_, s)| s).collect();
                self.ctx
                    .declare_function(id, name, domain, range, FunctionKind::Macro(body))?;
            }
            ("synth-fun", [name, params, s, grammar @ ..]) => {
                let name = symbol(name, cmd)?;
                let params = sorted_vars(params)?;
                let id = self.ctx.reserve_function_id();
                let named = params
                    .iter()
                    .map(|(n, s)| self.ctx.local_var(n, s.clone()))
                    .collect();
                let domain = params.into_iter().map(|(_, s)| s).collect();
                let f = self.ctx.declare_function(
                    id,
                    name,
                    domain,
                    sort(s)?,
                    FunctionKind::Unknown(named),
                )?;
                self.targets.push(f);
                self.pending
                    .push((!grammar.is_empty()).then(|| grammar.to_vec()));
            }
            ("constraint", [t]) => {
                let c = Converter::new(self.ctx).sorted_term(t, &Sort::Bool)?;
                self.constraints.push(c);
            }
            ("check-synth", []) => return Ok(false),
            ("synth-inv" | "inv-constraint" | "declare-primed-var", _) => {
                return Err(ParseError::Unsupported("invariant synthesis".to_string()))
            }
            _ => return Err(ParseError::Unsupported(format!("command {}", cmd))),
        }
        Ok(true)
    }

    /// Binds parameter names to the formal parameters of the function with the given id.
    fn param_bindings(&mut self, id: usize, params: &[(String, Sort)]) -> Vec<(String, Node)> {
        params
            .iter()
            .enumerate()
            .map(|(i, (n, s))| (n.clone(), self.ctx.ast().param(Param::new(id, i, s.clone()))))
            .collect()
    }

    fn finish(mut self) -> Result<Benchmark, ParseError> {
        let logic = self.logic.take().ok_or(ConfigError::NoLogic)?;
        let theory =
            Theory::from_logic(&logic).ok_or_else(|| ConfigError::UnsupportedLogic(logic.clone()))?;
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets.into());
        }

        let mut constants: IndexSet<Value> = IndexSet::new();
        for c in &self.constraints {
            constants.extend(get_constants(c));
        }
        let pending = std::mem::take(&mut self.pending);
        let targets = std::mem::take(&mut self.targets);
        let mut grammars = Vec::with_capacity(targets.len());
        for (target, pending) in targets.iter().zip(&pending) {
            let grammar = match pending {
                Some(spec) => {
                    let names: Vec<(String, Sort)> = target
                        .named_params()
                        .unwrap_or_default()
                        .iter()
                        .map(|v| (v.name().to_string(), v.sort()))
                        .collect();
                    let bindings = self.param_bindings(target.id(), &names);
                    Some(grammar::read_grammar(spec, &bindings, &constants, self.ctx)?)
                }
                None => None,
            };
            grammars.push(grammar);
        }
        log::debug!(
            "Read {} targets and {} constraints in logic {}",
            targets.len(),
            self.constraints.len(),
            logic
        );
        Ok(Benchmark {
            logic,
            theory,
            targets,
            grammars,
            constraints: self.constraints,
        })
    }
}

fn symbol<'s>(sexp: &'s Sexp, cmd: &Sexp) -> Result<&'s str, ParseError> {
    sexp.symbol()
        .ok_or_else(|| ParseError::Malformed(format!("command {}", cmd)))
}

#[cfg(test)]
mod tests {
    use crate::{ast::Op, grammar::Rewrite};

    use super::*;

    const MAX2: &str = r#"
        (set-logic LIA)
        (synth-fun max2 ((x Int) (y Int)) Int
            ((Start Int (x y 0 1 (+ Start Start) (ite StartBool Start Start)))
             (StartBool Bool ((<= Start Start) (and StartBool StartBool)))))
        (declare-var a Int)
        (declare-var b Int)
        (constraint (>= (max2 a b) a))
        (constraint (>= (max2 a b) b))
        (constraint (or (= a (max2 a b)) (= b (max2 a b))))
        (check-synth)
    "#;

    #[test]
    fn reads_max2() {
        let mut ctx = Context::default();
        let b = parse_benchmark(MAX2, &mut ctx).unwrap();
        assert_eq!(b.theory, Theory::Lia);
        assert_eq!(b.targets.len(), 1);
        assert_eq!(b.targets[0].name(), "max2");
        assert_eq!(b.constraints.len(), 3);
        let g = b.grammars[0].as_ref().unwrap();
        assert_eq!(g.start(), "Start");
        assert_eq!(g.rules("Start").len(), 6);
        assert!(g
            .rules("Start")
            .iter()
            .any(|r| matches!(r, Rewrite::Expr(p) if p.as_param().map(|p| p.position()) == Some(1))));
        assert!(b.constraints[0].is_op(Op::Ge));
    }

    #[test]
    fn reads_v2_grammar_with_constants() {
        let src = r#"
            (set-logic LIA)
            (synth-fun f ((x Int)) Int
                ((S Int) (B Bool))
                ((S Int ((Variable Int) (Constant Int) (+ S S)))
                 (B Bool ((<= S S)))))
            (declare-var y Int)
            (constraint (= (f y) (+ y 7)))
            (check-synth)
        "#;
        let mut ctx = Context::default();
        let b = parse_benchmark(src, &mut ctx).unwrap();
        let g = b.grammars[0].as_ref().unwrap();
        assert_eq!(g.start(), "S");
        let consts: Vec<Value> = g
            .rules("S")
            .iter()
            .filter_map(|r| match r {
                Rewrite::Const(c) => c.as_const().cloned(),
                _ => None,
            })
            .collect();
        assert_eq!(consts, vec![Value::Int(0), Value::Int(1), Value::Int(7)]);
    }

    #[test]
    fn macros_refer_to_their_parameters() {
        let src = r#"
            (set-logic LIA)
            (define-fun inc ((x Int)) Int (+ x 1))
            (synth-fun f ((x Int)) Int)
            (declare-var x Int)
            (constraint (= (f x) (inc x)))
        "#;
        let mut ctx = Context::default();
        let b = parse_benchmark(src, &mut ctx).unwrap();
        let inc = ctx.get_function("inc").unwrap();
        assert!(inc.macro_body().unwrap().has_params());
        assert!(b.grammars[0].is_none());
    }

    #[test]
    fn logic_errors() {
        let mut ctx = Context::default();
        assert!(matches!(
            parse_benchmark("(synth-fun f ((x Int)) Int)", &mut ctx),
            Err(ParseError::Config(ConfigError::NoLogic))
        ));
        let mut ctx = Context::default();
        assert!(matches!(
            parse_benchmark("(set-logic LIA) (set-logic BV)", &mut ctx),
            Err(ParseError::Config(ConfigError::MultipleLogics(_, _)))
        ));
        let mut ctx = Context::default();
        assert!(matches!(
            parse_benchmark("(set-logic LRA) (synth-fun f ((x Int)) Int)", &mut ctx),
            Err(ParseError::Config(ConfigError::UnsupportedLogic(_)))
        ));
    }

    #[test]
    fn invariant_synthesis_is_unsupported() {
        let mut ctx = Context::default();
        assert!(matches!(
            parse_benchmark("(set-logic LIA) (synth-inv inv ((x Int)))", &mut ctx),
            Err(ParseError::Unsupported(_))
        ));
    }
}
