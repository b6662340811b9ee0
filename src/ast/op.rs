use std::{fmt::Display, rc::Rc};

use crate::context::Sort;

/// The built-in operators of the supported theories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /* Core */
    And,
    Or,
    Not,
    Implies,
    /// Boolean equality
    Iff,
    Xor,
    Ite,
    /// Equality between two non-Bool terms of the same sort
    Eq,

    /* Integers */
    Add,
    Sub,
    Neg,
    Mul,
    Div,
    Mod,
    Abs,
    Lt,
    Le,
    Gt,
    Ge,

    /* Bit-vectors */
    BvNot,
    BvAnd,
    BvOr,
    BvXor,
    BvNeg,
    BvAdd,
    BvSub,
    BvMul,
    BvUdiv,
    BvUrem,
    BvShl,
    BvLshr,
    BvAshr,
    BvUlt,
    BvUle,
    BvUgt,
    BvUge,
    BvSlt,
    BvSle,
    BvSgt,
    BvSge,

    /* Strings */
    Concat,
    Length,
    At,
    Substr,
    IndexOf,
    Replace,
    PrefixOf,
    SuffixOf,
    Contains,
    ToInt,
    FromInt,

    /* Structural */
    /// Tuple constructor, only used by merged grammars
    Tuple,
    /// `(let ((v e) ...) body)`, children are `[v1, e1, ..., vn, en, body]`
    Let,
}

impl Op {
    /// Resolves an SMT-LIB operator name.
    /// `=` is resolved to [`Op::Eq`]; callers turn it into [`Op::Iff`] for Bool arguments.
    pub fn from_name(name: &str) -> Option<Op> {
        let op = match name {
            "and" => Op::And,
            "or" => Op::Or,
            "not" => Op::Not,
            "=>" | "implies" => Op::Implies,
            "iff" => Op::Iff,
            "xor" => Op::Xor,
            "ite" => Op::Ite,
            "=" => Op::Eq,
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "div" => Op::Div,
            "mod" => Op::Mod,
            "abs" => Op::Abs,
            "<" => Op::Lt,
            "<=" => Op::Le,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "bvnot" => Op::BvNot,
            "bvand" => Op::BvAnd,
            "bvor" => Op::BvOr,
            "bvxor" => Op::BvXor,
            "bvneg" => Op::BvNeg,
            "bvadd" => Op::BvAdd,
            "bvsub" => Op::BvSub,
            "bvmul" => Op::BvMul,
            "bvudiv" => Op::BvUdiv,
            "bvurem" => Op::BvUrem,
            "bvshl" => Op::BvShl,
            "bvlshr" => Op::BvLshr,
            "bvashr" => Op::BvAshr,
            "bvult" => Op::BvUlt,
            "bvule" => Op::BvUle,
            "bvugt" => Op::BvUgt,
            "bvuge" => Op::BvUge,
            "bvslt" => Op::BvSlt,
            "bvsle" => Op::BvSle,
            "bvsgt" => Op::BvSgt,
            "bvsge" => Op::BvSge,
            "str.++" => Op::Concat,
            "str.len" => Op::Length,
            "str.at" => Op::At,
            "str.substr" => Op::Substr,
            "str.indexof" => Op::IndexOf,
            "str.replace" => Op::Replace,
            "str.prefixof" => Op::PrefixOf,
            "str.suffixof" => Op::SuffixOf,
            "str.contains" => Op::Contains,
            "str.to.int" | "str.to_int" => Op::ToInt,
            "int.to.str" | "str.from_int" => Op::FromInt,
            _ => return None,
        };
        Some(op)
    }

    /// The SMT-LIB name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            Op::And => "and",
            Op::Or => "or",
            Op::Not => "not",
            Op::Implies => "=>",
            Op::Iff | Op::Eq => "=",
            Op::Xor => "xor",
            Op::Ite => "ite",
            Op::Add => "+",
            Op::Sub | Op::Neg => "-",
            Op::Mul => "*",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Abs => "abs",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::BvNot => "bvnot",
            Op::BvAnd => "bvand",
            Op::BvOr => "bvor",
            Op::BvXor => "bvxor",
            Op::BvNeg => "bvneg",
            Op::BvAdd => "bvadd",
            Op::BvSub => "bvsub",
            Op::BvMul => "bvmul",
            Op::BvUdiv => "bvudiv",
            Op::BvUrem => "bvurem",
            Op::BvShl => "bvshl",
            Op::BvLshr => "bvlshr",
            Op::BvAshr => "bvashr",
            Op::BvUlt => "bvult",
            Op::BvUle => "bvule",
            Op::BvUgt => "bvugt",
            Op::BvUge => "bvuge",
            Op::BvSlt => "bvslt",
            Op::BvSle => "bvsle",
            Op::BvSgt => "bvsgt",
            Op::BvSge => "bvsge",
            Op::Concat => "str.++",
            Op::Length => "str.len",
            Op::At => "str.at",
            Op::Substr => "str.substr",
            Op::IndexOf => "str.indexof",
            Op::Replace => "str.replace",
            Op::PrefixOf => "str.prefixof",
            Op::SuffixOf => "str.suffixof",
            Op::Contains => "str.contains",
            Op::ToInt => "str.to.int",
            Op::FromInt => "int.to.str",
            Op::Tuple => "tuple",
            Op::Let => "let",
        }
    }

    /// Returns true for the Boolean connectives handled by the normal form conversions.
    pub fn is_connective(&self) -> bool {
        matches!(
            self,
            Op::And | Op::Or | Op::Not | Op::Implies | Op::Iff | Op::Xor
        )
    }

    /// Returns true if the operator is a predicate of a theory, i.e., it builds atomic formulas.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Op::Eq
                | Op::Lt
                | Op::Le
                | Op::Gt
                | Op::Ge
                | Op::BvUlt
                | Op::BvUle
                | Op::BvUgt
                | Op::BvUge
                | Op::BvSlt
                | Op::BvSle
                | Op::BvSgt
                | Op::BvSge
                | Op::PrefixOf
                | Op::SuffixOf
                | Op::Contains
        )
    }

    /// Computes the result sort of applying the operator to arguments of the given sorts.
    /// Returns `None` if the application is ill-sorted.
    pub fn range(&self, args: &[Sort]) -> Option<Sort> {
        let all = |s: &Sort| args.iter().all(|a| a == s);
        let same_bv = || match args.first() {
            Some(Sort::BitVec(w)) if all(&Sort::BitVec(*w)) => Some(Sort::BitVec(*w)),
            _ => None,
        };
        match self {
            Op::And | Op::Or if !args.is_empty() && all(&Sort::Bool) => Some(Sort::Bool),
            Op::Not if args.len() == 1 && all(&Sort::Bool) => Some(Sort::Bool),
            Op::Implies | Op::Iff | Op::Xor if args.len() == 2 && all(&Sort::Bool) => {
                Some(Sort::Bool)
            }
            Op::Ite if args.len() == 3 && args[0].is_bool() && args[1] == args[2] => {
                Some(args[1].clone())
            }
            Op::Eq if args.len() == 2 && args[0] == args[1] => Some(Sort::Bool),
            Op::Add | Op::Mul | Op::Sub if !args.is_empty() && all(&Sort::Int) => Some(Sort::Int),
            Op::Neg | Op::Abs if args.len() == 1 && all(&Sort::Int) => Some(Sort::Int),
            Op::Div | Op::Mod if args.len() == 2 && all(&Sort::Int) => Some(Sort::Int),
            Op::Lt | Op::Le | Op::Gt | Op::Ge if args.len() == 2 && all(&Sort::Int) => {
                Some(Sort::Bool)
            }
            Op::BvNot | Op::BvNeg if args.len() == 1 => same_bv(),
            Op::BvAnd | Op::BvOr | Op::BvXor | Op::BvAdd | Op::BvMul if args.len() >= 2 => {
                same_bv()
            }
            Op::BvSub | Op::BvUdiv | Op::BvUrem | Op::BvShl | Op::BvLshr | Op::BvAshr
                if args.len() == 2 =>
            {
                same_bv()
            }
            Op::BvUlt
            | Op::BvUle
            | Op::BvUgt
            | Op::BvUge
            | Op::BvSlt
            | Op::BvSle
            | Op::BvSgt
            | Op::BvSge
                if args.len() == 2 =>
            {
                same_bv().map(|_| Sort::Bool)
            }
            Op::Concat if args.len() >= 2 && all(&Sort::String) => Some(Sort::String),
            Op::Length | Op::ToInt if args.len() == 1 && all(&Sort::String) => Some(Sort::Int),
            Op::At if args == [Sort::String, Sort::Int] => Some(Sort::String),
            Op::Substr if args == [Sort::String, Sort::Int, Sort::Int] => Some(Sort::String),
            Op::IndexOf if args == [Sort::String, Sort::String, Sort::Int] => Some(Sort::Int),
            Op::Replace if args.len() == 3 && all(&Sort::String) => Some(Sort::String),
            Op::PrefixOf | Op::SuffixOf | Op::Contains if args.len() == 2 && all(&Sort::String) => {
                Some(Sort::Bool)
            }
            Op::FromInt if args == [Sort::Int] => Some(Sort::String),
            Op::Tuple if !args.is_empty() => Some(Sort::Tuple(Rc::from(args))),
            Op::Let if args.len() % 2 == 1 => args.last().cloned(),
            _ => None,
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
