//! Grammars describing the search space of each synthesis target.

mod default;
mod enumerate;
mod merge;

use std::{fmt::Display, rc::Rc};

use indexmap::{IndexMap, IndexSet};

pub use default::default_grammar;
pub use enumerate::{Enumerator, ParamPoints};
pub use merge::{merge_grammars, MERGED_START};

use crate::{
    ast::{FunctionInfo, Node, Op, Symbol},
    context::{Context, Sort, Sorted, Variable},
    theory::Theory,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum GrammarError {
    #[error("Nonterminal {0} is not declared")]
    UndeclaredNonTerminal(String),
    #[error("Rule {rule} of nonterminal {nt} has sort {found}, expected {expected}")]
    RuleSort {
        nt: String,
        rule: String,
        found: Sort,
        expected: Sort,
    },
    #[error("No default grammar for functions returning {0} in theory {1}")]
    NoDefault(Sort, Theory),
}

/// The right-hand side of a production.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rewrite {
    /// A literal
    Const(Node),
    /// A formal parameter or a nullary application
    Expr(Node),
    NonTerminal(String, Sort),
    /// Application of an operator or function to sub-rewrites, with the result sort
    Function(Symbol, Vec<Rewrite>, Sort),
}

impl Rewrite {
    pub fn sort(&self) -> Sort {
        match self {
            Rewrite::Const(n) | Rewrite::Expr(n) => n.sort(),
            Rewrite::NonTerminal(_, s) | Rewrite::Function(_, _, s) => s.clone(),
        }
    }

    /// Builds a function rewrite, checking the argument sorts.
    pub fn function(sym: Symbol, children: Vec<Rewrite>) -> Option<Rewrite> {
        let sorts: Vec<Sort> = children.iter().map(|c| c.sort()).collect();
        let range = match &sym {
            Symbol::Builtin(op) => op.range(&sorts)?,
            Symbol::User(f) if f.domain() == sorts.as_slice() => f.range().clone(),
            Symbol::User(_) => return None,
        };
        Some(Rewrite::Function(sym, children, range))
    }

    fn is_ite(&self) -> bool {
        matches!(self, Rewrite::Function(Symbol::Builtin(Op::Ite), _, _))
    }

    fn rename(&self, rename: &impl Fn(&str) -> String) -> Rewrite {
        match self {
            Rewrite::NonTerminal(n, s) => Rewrite::NonTerminal(rename(n), s.clone()),
            Rewrite::Function(f, ch, s) => Rewrite::Function(
                f.clone(),
                ch.iter().map(|c| c.rename(rename)).collect(),
                s.clone(),
            ),
            _ => self.clone(),
        }
    }

    fn non_terminals(&self, out: &mut Vec<(String, Sort)>) {
        match self {
            Rewrite::NonTerminal(n, s) => out.push((n.clone(), s.clone())),
            Rewrite::Function(_, ch, _) => ch.iter().for_each(|c| c.non_terminals(out)),
            _ => {}
        }
    }
}

impl Display for Rewrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rewrite::Const(n) | Rewrite::Expr(n) => write!(f, "{}", n),
            Rewrite::NonTerminal(n, _) => write!(f, "{}", n),
            Rewrite::Function(sym, ch, _) => {
                write!(f, "({}", sym)?;
                for c in ch {
                    write!(f, " {}", c)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A context-free grammar over expressions.
#[derive(Debug, Clone)]
pub struct Grammar {
    start: String,
    /// Nonterminals in declaration order, with their sorts
    non_terminals: IndexMap<String, Sort>,
    rules: IndexMap<String, Vec<Rewrite>>,
    /// True if this grammar was built as the default of a theory
    from_default: bool,
}

impl Grammar {
    /// Creates a grammar, checking that every referenced nonterminal is declared and that rules have the sort of their nonterminal.
    pub fn new(
        start: &str,
        non_terminals: IndexMap<String, Sort>,
        rules: IndexMap<String, Vec<Rewrite>>,
    ) -> Result<Self, GrammarError> {
        if !non_terminals.contains_key(start) {
            return Err(GrammarError::UndeclaredNonTerminal(start.to_string()));
        }
        for (nt, rs) in &rules {
            let expected = non_terminals
                .get(nt)
                .ok_or_else(|| GrammarError::UndeclaredNonTerminal(nt.clone()))?;
            for r in rs {
                if &r.sort() != expected {
                    return Err(GrammarError::RuleSort {
                        nt: nt.clone(),
                        rule: r.to_string(),
                        found: r.sort(),
                        expected: expected.clone(),
                    });
                }
                let mut refs = Vec::new();
                r.non_terminals(&mut refs);
                for (m, s) in refs {
                    match non_terminals.get(&m) {
                        Some(ms) if ms == &s => {}
                        Some(ms) => {
                            return Err(GrammarError::RuleSort {
                                nt: m,
                                rule: r.to_string(),
                                found: s,
                                expected: ms.clone(),
                            })
                        }
                        None => return Err(GrammarError::UndeclaredNonTerminal(m)),
                    }
                }
            }
        }
        Ok(Self {
            start: start.to_string(),
            non_terminals,
            rules,
            from_default: false,
        })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn start_sort(&self) -> Sort {
        self.sort_of(&self.start).cloned().unwrap_or(Sort::Bool)
    }

    pub fn non_terminals(&self) -> impl Iterator<Item = (&String, &Sort)> + '_ {
        self.non_terminals.iter()
    }

    pub fn sort_of(&self, nt: &str) -> Option<&Sort> {
        self.non_terminals.get(nt)
    }

    /// The productions of a nonterminal.
    pub fn rules(&self, nt: &str) -> &[Rewrite] {
        self.rules.get(nt).map_or(&[], |r| r.as_slice())
    }

    pub fn is_default(&self) -> bool {
        self.from_default
    }

    pub(crate) fn mark_default(mut self) -> Self {
        self.from_default = true;
        self
    }

    /// Renames every nonterminal `N` to `prefix_N`.
    pub fn add_prefix(&self, prefix: &str) -> Grammar {
        let rename = |n: &str| format!("{}_{}", prefix, n);
        Grammar {
            start: rename(&self.start),
            non_terminals: self
                .non_terminals
                .iter()
                .map(|(n, s)| (rename(n), s.clone()))
                .collect(),
            rules: self
                .rules
                .iter()
                .map(|(n, rs)| (rename(n), rs.iter().map(|r| r.rename(&rename)).collect()))
                .collect(),
            from_default: self.from_default,
        }
    }

    /// Determines, for every nonterminal, the function whose formal parameters its terms use.
    /// Nonterminals that only derive parameter-free terms map to `None`.
    pub fn param_owners(&self) -> IndexMap<String, Option<usize>> {
        fn rule_owner(r: &Rewrite, owners: &IndexMap<String, Option<usize>>) -> Option<usize> {
            match r {
                Rewrite::Const(_) => None,
                Rewrite::Expr(n) => first_param_owner(n),
                Rewrite::NonTerminal(m, _) => owners.get(m).copied().flatten(),
                Rewrite::Function(_, ch, _) => ch.iter().find_map(|c| rule_owner(c, owners)),
            }
        }
        let mut owners: IndexMap<String, Option<usize>> =
            self.non_terminals.keys().map(|n| (n.clone(), None)).collect();
        loop {
            let mut changed = false;
            for nt in self.non_terminals.keys() {
                if owners[nt].is_some() {
                    continue;
                }
                if let Some(o) = self.rules(nt).iter().find_map(|r| rule_owner(r, &owners)) {
                    owners.insert(nt.clone(), Some(o));
                    changed = true;
                }
            }
            if !changed {
                return owners;
            }
        }
    }

    /// Splits the grammar into a term grammar and a predicate grammar for decision-tree unification.
    ///
    /// This succeeds if the start symbol is not Bool-sorted and every conditional production of the start symbol
    /// has the form `(ite C Start Start)`. The term grammar is the grammar without these productions.
    /// The predicate grammar derives `marker_k(c)` for every `c` derivable from the condition `C_k`
    /// of the k-th conditional production; a condition of the form `(not C)` contributes `C`.
    /// Returns `None` if the grammar does not have this shape.
    pub fn decompose(&self, ctx: &mut Context) -> Option<Decomposition> {
        let start_sort = self.start_sort();
        if start_sort.is_bool() {
            return None;
        }
        let (ites, terms): (Vec<&Rewrite>, Vec<&Rewrite>) =
            self.rules(&self.start).iter().partition(|r| r.is_ite());
        if ites.is_empty() || terms.is_empty() {
            return None;
        }

        let c_hole = ctx.local_var("?c", Sort::Bool);
        let t_hole = ctx.local_var("?t", start_sort.clone());
        let e_hole = ctx.local_var("?e", start_sort.clone());
        let holes: IndexSet<Rc<Variable>> = [c_hole.clone(), t_hole.clone(), e_hole.clone()]
            .into_iter()
            .collect();
        let c = ctx.ast().variable(c_hole);
        let t = ctx.ast().variable(t_hole);
        let e = ctx.ast().variable(e_hole);
        let template = ctx.ast().ite(c.clone(), t.clone(), e.clone());

        let pred_start = {
            let mut name = "PredStart".to_string();
            while self.non_terminals.contains_key(&name) {
                name.push('_');
            }
            name
        };
        let mut pred_rules = Vec::new();
        let mut reverse_mapping = Vec::new();
        for ite in ites {
            let (cond, original) = match ite {
                Rewrite::Function(_, ch, _)
                    if ch.len() == 3
                        && matches!(&ch[1], Rewrite::NonTerminal(n, _) if n == &self.start)
                        && matches!(&ch[2], Rewrite::NonTerminal(n, _) if n == &self.start) =>
                {
                    match &ch[0] {
                        Rewrite::Function(Symbol::Builtin(Op::Not), inner, _) if inner.len() == 1 => {
                            let not_c = ctx.ast().not(c.clone());
                            let original = ctx.ast().ite(not_c, e.clone(), t.clone());
                            (inner[0].clone(), original)
                        }
                        cond => (cond.clone(), template.clone()),
                    }
                }
                _ => return None,
            };
            let marker = ctx.fresh_marker("eu_cond", Sort::Bool);
            pred_rules.push(Rewrite::Function(
                Symbol::User(marker.clone()),
                vec![cond],
                Sort::Bool,
            ));
            reverse_mapping.push(ReverseMapping {
                marker,
                template: template.clone(),
                original,
                holes: holes.clone(),
            });
        }

        let mut term_rules = self.rules.clone();
        term_rules.insert(self.start.clone(), terms.into_iter().cloned().collect());
        let term_grammar = Grammar {
            start: self.start.clone(),
            non_terminals: self.non_terminals.clone(),
            rules: term_rules,
            from_default: self.from_default,
        };

        let mut pred_nts = self.non_terminals.clone();
        pred_nts.insert(pred_start.clone(), Sort::Bool);
        let mut all_rules = self.rules.clone();
        all_rules.insert(pred_start.clone(), pred_rules);
        let pred_grammar = Grammar {
            start: pred_start,
            non_terminals: pred_nts,
            rules: all_rules,
            from_default: self.from_default,
        };

        Some(Decomposition {
            term_grammar,
            pred_grammar,
            reverse_mapping,
        })
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (nt, sort) in &self.non_terminals {
            write!(f, "({} {} (", nt, sort)?;
            for (i, r) in self.rules(nt).iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", r)?;
            }
            writeln!(f, "))")?;
        }
        Ok(())
    }
}

fn first_param_owner(node: &Node) -> Option<usize> {
    if let Some(p) = node.as_param() {
        return Some(p.func());
    }
    node.children().iter().find_map(first_param_owner)
}

/// The result of splitting a grammar for decision-tree unification.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub term_grammar: Grammar,
    pub pred_grammar: Grammar,
    pub reverse_mapping: Vec<ReverseMapping>,
}

/// How to turn a decision-tree conditional over a marked predicate back into a production of the original grammar.
#[derive(Debug, Clone)]
pub struct ReverseMapping {
    /// The marker wrapping predicates derived from this production's condition
    pub marker: Rc<FunctionInfo>,
    /// The generic conditional `(ite ?c ?t ?e)`
    pub template: Node,
    /// The production's shape over the same holes
    pub original: Node,
    pub holes: IndexSet<Rc<Variable>>,
}
