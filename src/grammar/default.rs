use indexmap::IndexMap;

use crate::{
    ast::{FunctionInfo, Op, Symbol},
    context::{Context, Sort, Sorted},
    theory::{Theory, Value},
};

use super::{Grammar, GrammarError, Rewrite};

/// Incrementally collects the nonterminals and productions of a default grammar.
struct Builder {
    nts: IndexMap<String, Sort>,
    rules: IndexMap<String, Vec<Rewrite>>,
}

impl Builder {
    fn new() -> Self {
        Self {
            nts: IndexMap::new(),
            rules: IndexMap::new(),
        }
    }

    fn declare(&mut self, name: &str, sort: Sort) -> Rewrite {
        self.nts.insert(name.to_string(), sort.clone());
        self.rules.entry(name.to_string()).or_default();
        Rewrite::NonTerminal(name.to_string(), sort)
    }

    fn add(&mut self, nt: &Rewrite, rule: Rewrite) {
        if let Rewrite::NonTerminal(name, _) = nt {
            self.rules.entry(name.clone()).or_default().push(rule);
        }
    }

    fn op(&mut self, nt: &Rewrite, op: Op, args: &[&Rewrite]) {
        let args = args.iter().map(|a| (*a).clone()).collect();
        if let Some(r) = Rewrite::function(Symbol::Builtin(op), args) {
            self.add(nt, r);
        }
    }

    /// Adds the target's parameters of the nonterminal's sort.
    fn params(&mut self, nt: &Rewrite, target: &FunctionInfo, ctx: &mut Context) {
        let sort = nt.sort();
        for p in target.params() {
            if p.sort() == sort {
                let n = ctx.ast().param(p);
                self.add(nt, Rewrite::Expr(n));
            }
        }
    }

    fn constant(&mut self, nt: &Rewrite, v: Value, ctx: &mut Context) {
        let n = ctx.ast().constant(v);
        self.add(nt, Rewrite::Const(n));
    }
}

fn nt_name(range: &Sort, sort: &Sort, fallback: &str) -> String {
    if range == sort {
        "Start".to_string()
    } else {
        fallback.to_string()
    }
}

/// Builds the grammar used for a target whose `synth-fun` has no grammar.
pub fn default_grammar(
    theory: Theory,
    target: &FunctionInfo,
    ctx: &mut Context,
) -> Result<Grammar, GrammarError> {
    let range = target.range().clone();
    let mut b = Builder::new();
    let bool_nt = b.declare(&nt_name(&range, &Sort::Bool, "StartBool"), Sort::Bool);
    b.params(&bool_nt, target, ctx);

    match theory {
        Theory::Lia => {
            if !(range.is_int() || range.is_bool()) {
                return Err(GrammarError::NoDefault(range, theory));
            }
            let i = b.declare(&nt_name(&range, &Sort::Int, "StartInt"), Sort::Int);
            lia_rules(&mut b, &i, &bool_nt, target, ctx);
        }
        Theory::Bv => {
            let width = range
                .bv_width()
                .or_else(|| target.domain().iter().find_map(|s| s.bv_width()))
                .unwrap_or(32);
            let sort = Sort::BitVec(width);
            if !(range == sort || range.is_bool()) {
                return Err(GrammarError::NoDefault(range, theory));
            }
            let v = b.declare(&nt_name(&range, &sort, "StartBV"), sort);
            b.params(&v, target, ctx);
            b.constant(&v, Value::bv(0, width), ctx);
            b.constant(&v, Value::bv(1, width), ctx);
            for op in [Op::BvNot, Op::BvNeg] {
                b.op(&v, op, &[&v]);
            }
            for op in [
                Op::BvAnd,
                Op::BvOr,
                Op::BvXor,
                Op::BvAdd,
                Op::BvSub,
                Op::BvShl,
                Op::BvLshr,
            ] {
                b.op(&v, op, &[&v, &v]);
            }
            b.op(&v, Op::Ite, &[&bool_nt, &v, &v]);
            for op in [Op::BvUle, Op::BvUlt, Op::Eq] {
                b.op(&bool_nt, op, &[&v, &v]);
            }
            bool_connectives(&mut b, &bool_nt);
        }
        Theory::Slia => {
            if !(range.is_string() || range.is_int() || range.is_bool()) {
                return Err(GrammarError::NoDefault(range, theory));
            }
            let s = b.declare(&nt_name(&range, &Sort::String, "StartStr"), Sort::String);
            let i = b.declare(&nt_name(&range, &Sort::Int, "StartInt"), Sort::Int);
            b.params(&s, target, ctx);
            b.params(&i, target, ctx);
            b.constant(&s, Value::string(""), ctx);
            b.constant(&s, Value::string(" "), ctx);
            b.op(&s, Op::Concat, &[&s, &s]);
            b.op(&s, Op::At, &[&s, &i]);
            b.op(&s, Op::Substr, &[&s, &i, &i]);
            b.op(&s, Op::Replace, &[&s, &s, &s]);
            b.op(&s, Op::FromInt, &[&i]);
            b.op(&s, Op::Ite, &[&bool_nt, &s, &s]);
            b.constant(&i, Value::Int(0), ctx);
            b.constant(&i, Value::Int(1), ctx);
            b.op(&i, Op::Add, &[&i, &i]);
            b.op(&i, Op::Sub, &[&i, &i]);
            b.op(&i, Op::Length, &[&s]);
            b.op(&i, Op::IndexOf, &[&s, &s, &i]);
            b.op(&i, Op::ToInt, &[&s]);
            b.op(&i, Op::Ite, &[&bool_nt, &i, &i]);
            for op in [Op::Eq, Op::PrefixOf, Op::SuffixOf, Op::Contains] {
                b.op(&bool_nt, op, &[&s, &s]);
            }
            b.op(&bool_nt, Op::Le, &[&i, &i]);
            b.op(&bool_nt, Op::Eq, &[&i, &i]);
            bool_connectives(&mut b, &bool_nt);
        }
    }

    Ok(Grammar::new("Start", b.nts, b.rules)?.mark_default())
}

fn lia_rules(b: &mut Builder, i: &Rewrite, bool_nt: &Rewrite, target: &FunctionInfo, ctx: &mut Context) {
    b.params(i, target, ctx);
    b.constant(i, Value::Int(0), ctx);
    b.constant(i, Value::Int(1), ctx);
    b.op(i, Op::Add, &[i, i]);
    b.op(i, Op::Sub, &[i, i]);
    b.op(i, Op::Ite, &[bool_nt, i, i]);
    for op in [Op::Le, Op::Eq, Op::Ge] {
        b.op(bool_nt, op, &[i, i]);
    }
    bool_connectives(b, bool_nt);
}

fn bool_connectives(b: &mut Builder, bool_nt: &Rewrite) {
    b.op(bool_nt, Op::And, &[bool_nt, bool_nt]);
    b.op(bool_nt, Op::Or, &[bool_nt, bool_nt]);
    b.op(bool_nt, Op::Not, &[bool_nt]);
}

#[cfg(test)]
mod tests {
    use crate::ast::FunctionKind;

    use super::*;

    #[test]
    fn bv_default_has_parameters_and_constants() {
        let mut ctx = Context::default();
        let id = ctx.reserve_function_id();
        let x = ctx.local_var("x", Sort::BitVec(8));
        let f = ctx
            .declare_function(
                id,
                "f",
                vec![Sort::BitVec(8)],
                Sort::BitVec(8),
                FunctionKind::Unknown(vec![x]),
            )
            .unwrap();
        let g = default_grammar(Theory::Bv, &f, &mut ctx).unwrap();
        assert!(g.is_default());
        assert_eq!(g.start_sort(), Sort::BitVec(8));
        let leaves = g
            .rules("Start")
            .iter()
            .filter(|r| matches!(r, Rewrite::Expr(_) | Rewrite::Const(_)))
            .count();
        assert_eq!(leaves, 3);
    }

    #[test]
    fn lia_default_rejects_string_range() {
        let mut ctx = Context::default();
        let id = ctx.reserve_function_id();
        let f = ctx
            .declare_function(id, "f", vec![], Sort::String, FunctionKind::Unknown(vec![]))
            .unwrap();
        assert!(default_grammar(Theory::Lia, &f, &mut ctx).is_err());
    }
}
