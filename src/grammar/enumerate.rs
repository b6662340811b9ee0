use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use crate::{
    ast::Node,
    context::{Context, Sort, Variable},
    theory::{Evaluator, Interpretation, Value},
};

use super::{Grammar, Rewrite};

/// Argument valuations per function id, used to detect observationally equivalent terms.
pub type ParamPoints = IndexMap<usize, Vec<Vec<Value>>>;

/// Observational-equivalence pruning state.
#[derive(Default)]
struct Pruning {
    points: ParamPoints,
    /// Evaluation signatures already produced, per nonterminal
    seen: HashMap<String, HashSet<Vec<Value>>>,
}

/// Enumerates the terms of a grammar in order of increasing size.
///
/// The size of a term is the number of productions used to derive it.
/// With pruning enabled, a term is dropped when a term of the same nonterminal with the
/// same values at all known argument valuations was produced before.
pub struct Enumerator {
    grammar: Grammar,
    max_size: usize,
    owners: IndexMap<String, Option<usize>>,
    pruning: Option<Pruning>,

    cache: HashMap<(String, usize), Rc<Vec<Node>>>,
    in_progress: HashSet<(String, usize)>,

    size: usize,
    current: Rc<Vec<Node>>,
    cursor: usize,
    emitted: HashSet<Node>,

    no_vars: IndexSet<Rc<Variable>>,
    no_interpretation: Interpretation,
}

impl Enumerator {
    /// An enumerator without pruning.
    pub fn new(grammar: Grammar, max_size: usize) -> Self {
        let owners = grammar.param_owners();
        Self {
            grammar,
            max_size,
            owners,
            pruning: None,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
            size: 0,
            current: Rc::new(Vec::new()),
            cursor: 0,
            emitted: HashSet::new(),
            no_vars: IndexSet::new(),
            no_interpretation: Interpretation::new(),
        }
    }

    /// An enumerator that prunes observationally equivalent terms.
    pub fn point_distinct(grammar: Grammar, max_size: usize) -> Self {
        let mut e = Self::new(grammar, max_size);
        e.pruning = Some(Pruning::default());
        e
    }

    /// Size of the terms currently being produced.
    pub fn current_size(&self) -> usize {
        self.size
    }

    /// Starts over from the smallest terms, distinguishing terms by the given valuations.
    pub fn restart(&mut self, points: ParamPoints) {
        log::trace!("Restarting enumeration of {}", self.grammar.start());
        if let Some(p) = &mut self.pruning {
            p.points = points;
            p.seen.clear();
        }
        self.cache.clear();
        self.in_progress.clear();
        self.size = 0;
        self.current = Rc::new(Vec::new());
        self.cursor = 0;
        self.emitted.clear();
    }

    /// Returns the next term, or `None` when all terms up to the maximum size were produced.
    pub fn next_term(&mut self, ctx: &mut Context) -> Option<Node> {
        loop {
            while self.cursor < self.current.len() {
                let t = self.current[self.cursor].clone();
                self.cursor += 1;
                if self.emitted.insert(t.clone()) {
                    return Some(t);
                }
            }
            if self.size >= self.max_size {
                return None;
            }
            self.size += 1;
            let start = self.grammar.start().to_string();
            self.current = self.terms(ctx, &start, self.size);
            self.cursor = 0;
            log::trace!(
                "Enumerating {} terms of size {} from {}",
                self.current.len(),
                self.size,
                start
            );
        }
    }

    /// All terms of a nonterminal with exactly the given size.
    fn terms(&mut self, ctx: &mut Context, nt: &str, size: usize) -> Rc<Vec<Node>> {
        let key = (nt.to_string(), size);
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        // unit cycles between nonterminals
        if !self.in_progress.insert(key.clone()) {
            return Rc::new(Vec::new());
        }
        let rules = self.grammar.rules(nt).to_vec();
        let mut out = IndexSet::new();
        for rule in &rules {
            out.extend(self.expand(ctx, rule, size));
        }
        let out: Vec<Node> = out
            .into_iter()
            .filter(|t| self.is_new(nt, t))
            .collect();
        self.in_progress.remove(&key);
        let out = Rc::new(out);
        self.cache.insert(key, out.clone());
        out
    }

    /// Derivations of a single production with exactly the given size.
    fn expand(&mut self, ctx: &mut Context, rule: &Rewrite, size: usize) -> Vec<Node> {
        match rule {
            Rewrite::Const(n) | Rewrite::Expr(n) => {
                if size == 1 {
                    vec![n.clone()]
                } else {
                    vec![]
                }
            }
            Rewrite::NonTerminal(m, _) => self.terms(ctx, m, size).to_vec(),
            Rewrite::Function(sym, children, _) => {
                if children.is_empty() {
                    return if size == 1 {
                        ctx.ast().apply(sym, vec![]).into_iter().collect()
                    } else {
                        vec![]
                    };
                }
                if size < 1 + children.len() {
                    return vec![];
                }
                let mut out = Vec::new();
                for split in compositions(size - 1, children.len()) {
                    let mut lists = Vec::with_capacity(children.len());
                    for (c, s) in children.iter().zip(split) {
                        let l = self.expand(ctx, c, s);
                        if l.is_empty() {
                            break;
                        }
                        lists.push(l);
                    }
                    if lists.len() < children.len() {
                        continue;
                    }
                    for args in lists.into_iter().multi_cartesian_product() {
                        if let Ok(t) = ctx.ast().apply(sym, args) {
                            out.push(t);
                        }
                    }
                }
                out
            }
        }
    }

    /// Records the term's evaluation signature and returns false if it was seen before.
    fn is_new(&mut self, nt: &str, term: &Node) -> bool {
        let pruning = match &mut self.pruning {
            Some(p) => p,
            None => return true,
        };
        if matches!(self.grammar.sort_of(nt), Some(Sort::Tuple(_)) | None) {
            return true;
        }
        let eval = Evaluator::new(&self.no_vars, &self.no_interpretation);
        let key: Option<Vec<Value>> = match self.owners.get(nt).copied().flatten() {
            Some(owner) => match pruning.points.get(&owner) {
                Some(points) if !points.is_empty() => points
                    .iter()
                    .map(|p| eval.eval_with(term, &[], p).ok())
                    .collect(),
                _ => None,
            },
            None => eval.eval_with(term, &[], &[]).ok().map(|v| vec![v]),
        };
        match key {
            Some(key) => pruning.seen.entry(nt.to_string()).or_default().insert(key),
            None => true,
        }
    }
}

/// All ways to write `total` as an ordered sum of `parts` positive integers.
fn compositions(total: usize, parts: usize) -> Vec<Vec<usize>> {
    if parts == 0 {
        return if total == 0 { vec![vec![]] } else { vec![] };
    }
    if total < parts {
        return vec![];
    }
    let mut out = Vec::new();
    for first in 1..=(total - parts + 1) {
        for mut rest in compositions(total - first, parts - 1) {
            rest.insert(0, first);
            out.push(rest);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{FunctionInfo, FunctionKind},
        grammar::default_grammar,
        theory::Theory,
    };

    use super::*;

    fn unary_target(ctx: &mut Context) -> Rc<FunctionInfo> {
        let id = ctx.reserve_function_id();
        let x = ctx.local_var("x", Sort::Int);
        ctx.declare_function(id, "f", vec![Sort::Int], Sort::Int, FunctionKind::Unknown(vec![x]))
            .unwrap()
    }

    #[test]
    fn compositions_are_complete() {
        assert_eq!(compositions(3, 2), vec![vec![1, 2], vec![2, 1]]);
        assert_eq!(compositions(2, 3), Vec::<Vec<usize>>::new());
    }

    #[test]
    fn terms_come_in_size_order() {
        let mut ctx = Context::default();
        let f = unary_target(&mut ctx);
        let g = default_grammar(Theory::Lia, &f, &mut ctx).unwrap();
        let mut e = Enumerator::new(g, 3);
        let first: Vec<String> = (0..3)
            .map(|_| e.next_term(&mut ctx).unwrap().to_string())
            .collect();
        assert_eq!(first, vec!["_arg_0", "0", "1"]);
        let mut last = 0;
        while let Some(t) = e.next_term(&mut ctx) {
            assert!(t.size() >= last);
            last = t.size();
        }
        assert!(e.next_term(&mut ctx).is_none());
    }

    #[test]
    fn point_distinct_prunes_equivalent_terms() {
        let mut ctx = Context::default();
        let f = unary_target(&mut ctx);
        let g = default_grammar(Theory::Lia, &f, &mut ctx).unwrap();

        let mut plain = Enumerator::new(g.clone(), 3);
        let mut plain_count = 0;
        while plain.next_term(&mut ctx).is_some() {
            plain_count += 1;
        }

        let mut pruned = Enumerator::point_distinct(g, 3);
        let mut points = ParamPoints::new();
        points.insert(f.id(), vec![vec![Value::Int(3)]]);
        pruned.restart(points);
        let mut values = HashSet::new();
        let mut pruned_count = 0;
        let no_vars = IndexSet::new();
        let interp = Interpretation::new();
        let eval = Evaluator::new(&no_vars, &interp);
        while let Some(t) = pruned.next_term(&mut ctx) {
            assert!(values.insert(eval.eval_with(&t, &[], &[Value::Int(3)]).unwrap()));
            pruned_count += 1;
        }
        assert!(pruned_count < plain_count);
    }
}
