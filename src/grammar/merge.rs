use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    ast::{FunctionInfo, Op, Symbol},
    context::Sort,
};

use super::{Grammar, Rewrite};

/// Name of the start symbol of a merged grammar.
pub const MERGED_START: &str = "MergedStart";

/// Combines the grammars of several targets into one grammar deriving tuples.
///
/// Every nonterminal of a target's grammar is prefixed with the target's name.
/// The only production of the new start symbol builds the tuple of the renamed start symbols, in target order.
pub fn merge_grammars(targets: &[(Rc<FunctionInfo>, Grammar)]) -> Grammar {
    let mut non_terminals = IndexMap::new();
    let mut rules = IndexMap::new();
    let mut components = Vec::with_capacity(targets.len());
    let mut from_default = true;

    for (target, grammar) in targets {
        let mut prefix = target.name().to_string();
        let mut renamed = grammar.add_prefix(&prefix);
        while renamed
            .non_terminals
            .keys()
            .any(|n| non_terminals.contains_key(n))
        {
            prefix.push('_');
            renamed = grammar.add_prefix(&prefix);
        }
        components.push(Rewrite::NonTerminal(
            renamed.start().to_string(),
            renamed.start_sort(),
        ));
        from_default &= renamed.is_default();
        non_terminals.extend(renamed.non_terminals.into_iter());
        rules.extend(renamed.rules.into_iter());
    }

    let sorts: Vec<Sort> = components.iter().map(|c| c.sort()).collect();
    let tuple_sort = Sort::Tuple(Rc::from(sorts));
    let mut start = MERGED_START.to_string();
    while non_terminals.contains_key(&start) {
        start.push('_');
    }
    non_terminals.insert(start.clone(), tuple_sort.clone());
    rules.insert(
        start.clone(),
        vec![Rewrite::Function(
            Symbol::Builtin(Op::Tuple),
            components,
            tuple_sort,
        )],
    );
    log::debug!(
        "Merged the grammars of {} targets into {} nonterminals",
        targets.len(),
        non_terminals.len()
    );

    Grammar {
        start,
        non_terminals,
        rules,
        from_default,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::FunctionKind,
        context::{Context, Sorted},
        grammar::{default_grammar, Enumerator},
        theory::Theory,
    };

    use super::*;

    fn declare(ctx: &mut Context, name: &str, range: Sort) -> Rc<FunctionInfo> {
        let id = ctx.reserve_function_id();
        let x = ctx.local_var("x", Sort::Int);
        ctx.declare_function(id, name, vec![Sort::Int], range, FunctionKind::Unknown(vec![x]))
            .unwrap()
    }

    #[test]
    fn merged_terms_split_into_typed_components() {
        let mut ctx = Context::default();
        let f = declare(&mut ctx, "f", Sort::Int);
        let g = declare(&mut ctx, "g", Sort::Bool);
        let h = declare(&mut ctx, "h", Sort::Int);
        let targets: Vec<(Rc<FunctionInfo>, Grammar)> = [f, g, h]
            .into_iter()
            .map(|t| {
                let gr = default_grammar(Theory::Lia, &t, &mut ctx).unwrap();
                (t, gr)
            })
            .collect();
        let merged = merge_grammars(&targets);
        assert_eq!(merged.start(), MERGED_START);
        assert!(merged.sort_of("f_Start").is_some());
        assert!(merged.sort_of("g_Start").is_some());

        let mut gen = Enumerator::new(merged, 8);
        let mut seen = 0;
        while let Some(term) = gen.next_term(&mut ctx) {
            assert!(term.is_op(Op::Tuple));
            assert_eq!(term.children().len(), 3);
            for ((t, _), c) in targets.iter().zip(term.children()) {
                assert_eq!(&c.sort(), t.range());
            }
            seen += 1;
            if seen > 50 {
                break;
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn clashing_prefixes_are_extended() {
        let mut ctx = Context::default();
        let f = declare(&mut ctx, "f", Sort::Int);
        let fa = declare(&mut ctx, "f_A", Sort::Int);
        // `f` + `A_Start` and `f_A` + `Start` name the same nonterminal
        let gf = default_grammar(Theory::Lia, &f, &mut ctx).unwrap().add_prefix("A");
        let gfa = default_grammar(Theory::Lia, &fa, &mut ctx).unwrap();
        let sizes = gf.non_terminals.len() + gfa.non_terminals.len();

        let merged = merge_grammars(&[(f.clone(), gf), (fa.clone(), gfa)]);
        assert!(merged.sort_of("f_A_Start").is_some());
        assert!(merged.sort_of("f_A__Start").is_some());
        assert_eq!(merged.non_terminals.len(), sizes + 1);

        let mut gen = Enumerator::new(merged, 3);
        let mut params = vec![];
        while let Some(term) = gen.next_term(&mut ctx) {
            if let (Some(a), Some(b)) = (term[0].as_param(), term[1].as_param()) {
                params.push((a.func(), b.func()));
            }
        }
        assert_eq!(params, vec![(f.id(), fa.id())]);
    }
}
