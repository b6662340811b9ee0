use indexmap::{IndexMap, IndexSet};
use smt_str::SmtString;
use std::rc::Rc;

use crate::{
    ast::{FunctionKind, Node, NodeKind, Op},
    context::Variable,
};

use super::value::{bv_mask, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow")]
    Overflow,
    #[error("Variable {0} has no value")]
    Unbound(String),
    #[error("Function {0} has no interpretation")]
    Uninterpreted(String),
    #[error("Cannot evaluate {0}")]
    Unsupported(String),
    #[error("Ill-sorted operands for {0}")]
    IllSorted(String),
}

/// Bodies for the synthesis targets, keyed by function id.
/// A body refers to the target's arguments through formal parameters.
pub type Interpretation = IndexMap<usize, Node>;

/// Evaluates expressions under an assignment to the specification variables.
///
/// Variables are looked up by their offset in `vars`; a point holds one value per offset.
/// Applications of targets are evaluated using the bodies in the interpretation.
pub struct Evaluator<'a> {
    vars: &'a IndexSet<Rc<Variable>>,
    interpretation: &'a Interpretation,
}

impl<'a> Evaluator<'a> {
    pub fn new(vars: &'a IndexSet<Rc<Variable>>, interpretation: &'a Interpretation) -> Self {
        Self {
            vars,
            interpretation,
        }
    }

    /// Evaluates `node` at `point`.
    pub fn eval(&self, node: &Node, point: &[Value]) -> Result<Value, EvalError> {
        self.eval_with(node, point, &[])
    }

    /// Evaluates a Bool-sorted `node` at `point`.
    pub fn holds(&self, node: &Node, point: &[Value]) -> Result<bool, EvalError> {
        match self.eval(node, point)? {
            Value::Bool(b) => Ok(b),
            _ => Err(EvalError::IllSorted(node.to_string())),
        }
    }

    /// Evaluates a function body, binding formal parameters to `args`.
    pub fn eval_with(&self, node: &Node, point: &[Value], args: &[Value]) -> Result<Value, EvalError> {
        match node.kind() {
            NodeKind::Const(v) => Ok(v.clone()),
            NodeKind::Variable(v) => self
                .vars
                .get_index_of(v)
                .and_then(|i| point.get(i))
                .cloned()
                .ok_or_else(|| EvalError::Unbound(v.name().to_string())),
            NodeKind::Param(p) => args
                .get(p.position())
                .cloned()
                .ok_or_else(|| EvalError::Unbound(p.to_string())),
            NodeKind::App(f) => {
                let actuals = node
                    .children()
                    .iter()
                    .map(|c| self.eval_with(c, point, args))
                    .collect::<Result<Vec<_>, _>>()?;
                match f.kind() {
                    FunctionKind::Marker => actuals
                        .into_iter()
                        .next()
                        .ok_or_else(|| EvalError::Unsupported(node.to_string())),
                    FunctionKind::Macro(body) => self.eval_with(body, point, &actuals),
                    FunctionKind::Unknown(_) => match self.interpretation.get(&f.id()) {
                        Some(body) => self.eval_with(body, point, &actuals),
                        None => Err(EvalError::Uninterpreted(f.name().to_string())),
                    },
                    FunctionKind::Uninterpreted => {
                        Err(EvalError::Uninterpreted(f.name().to_string()))
                    }
                }
            }
            NodeKind::Op(op) => self.eval_op(*op, node, point, args),
        }
    }

    fn eval_op(&self, op: Op, node: &Node, point: &[Value], args: &[Value]) -> Result<Value, EvalError> {
        let ch = node.children();
        match op {
            // Lazy operators
            Op::Ite => {
                let c = self.eval_bool(&ch[0], point, args)?;
                self.eval_with(&ch[if c { 1 } else { 2 }], point, args)
            }
            Op::And => {
                for c in ch {
                    if !self.eval_bool(c, point, args)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Op::Or => {
                for c in ch {
                    if self.eval_bool(c, point, args)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Op::Implies => {
                if !self.eval_bool(&ch[0], point, args)? {
                    return Ok(Value::Bool(true));
                }
                self.eval_with(&ch[1], point, args)
            }
            Op::Let => Err(EvalError::Unsupported(node.to_string())),
            _ => {
                let vals = ch
                    .iter()
                    .map(|c| self.eval_with(c, point, args))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_op(op, &vals)
            }
        }
    }

    fn eval_bool(&self, node: &Node, point: &[Value], args: &[Value]) -> Result<bool, EvalError> {
        match self.eval_with(node, point, args)? {
            Value::Bool(b) => Ok(b),
            _ => Err(EvalError::IllSorted(node.to_string())),
        }
    }
}

fn ill(op: Op) -> EvalError {
    EvalError::IllSorted(op.name().to_string())
}

fn ints(op: Op, vals: &[Value]) -> Result<Vec<i64>, EvalError> {
    vals.iter().map(|v| v.as_int().ok_or_else(|| ill(op))).collect()
}

fn bvs(op: Op, vals: &[Value]) -> Result<(Vec<u64>, u32), EvalError> {
    let mut width = None;
    let mut out = Vec::with_capacity(vals.len());
    for v in vals {
        match v {
            Value::BitVec { bits, width: w } if width.map_or(true, |x| x == *w) => {
                width = Some(*w);
                out.push(*bits);
            }
            _ => return Err(ill(op)),
        }
    }
    Ok((out, width.ok_or_else(|| ill(op))?))
}

fn strs(op: Op, vals: &[Value]) -> Result<Vec<SmtString>, EvalError> {
    vals.iter()
        .map(|v| match v {
            Value::String(s) => Ok(s.clone()),
            _ => Err(ill(op)),
        })
        .collect()
}

/// Interprets a bit-vector as a two's complement signed integer.
fn signed(bits: u64, width: u32) -> i64 {
    if width >= 64 {
        bits as i64
    } else if bits >> (width - 1) & 1 == 1 {
        (bits | !bv_mask(width)) as i64
    } else {
        bits as i64
    }
}

/// Index of the first occurrence of `t` in `s` at or after `from`, SMT-LIB semantics.
fn index_of(s: &SmtString, t: &SmtString, from: i64) -> i64 {
    let n = s.len() as i64;
    if from < 0 || from > n {
        return -1;
    }
    for k in from..=n {
        if s.drop(k as usize).starts_with(t) {
            return k;
        }
    }
    -1
}

fn str_to_int(s: &SmtString) -> Result<i64, EvalError> {
    let s = s.to_string();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Ok(-1);
    }
    s.parse::<i64>().map_err(|_| EvalError::Overflow)
}

/// Applies a strict operator to evaluated arguments.
pub fn apply_op(op: Op, vals: &[Value]) -> Result<Value, EvalError> {
    use Value::*;
    let v = match op {
        Op::Not => Bool(!vals[0].as_bool().ok_or_else(|| ill(op))?),
        Op::And | Op::Or | Op::Implies | Op::Iff | Op::Xor => {
            let bs = vals
                .iter()
                .map(|v| v.as_bool().ok_or_else(|| ill(op)))
                .collect::<Result<Vec<_>, _>>()?;
            Bool(match op {
                Op::And => bs.iter().all(|b| *b),
                Op::Or => bs.iter().any(|b| *b),
                Op::Implies => !bs[0] || bs[1],
                Op::Iff => bs[0] == bs[1],
                _ => bs[0] != bs[1],
            })
        }
        Op::Ite => match vals[0] {
            Bool(true) => vals[1].clone(),
            Bool(false) => vals[2].clone(),
            _ => return Err(ill(op)),
        },
        Op::Eq => Bool(vals[0] == vals[1]),

        Op::Add => {
            let is = ints(op, vals)?;
            Int(is
                .iter()
                .try_fold(0i64, |acc, i| acc.checked_add(*i))
                .ok_or(EvalError::Overflow)?)
        }
        Op::Mul => {
            let is = ints(op, vals)?;
            Int(is
                .iter()
                .try_fold(1i64, |acc, i| acc.checked_mul(*i))
                .ok_or(EvalError::Overflow)?)
        }
        Op::Sub => {
            let is = ints(op, vals)?;
            if is.len() == 1 {
                Int(is[0].checked_neg().ok_or(EvalError::Overflow)?)
            } else {
                Int(is[1..]
                    .iter()
                    .try_fold(is[0], |acc, i| acc.checked_sub(*i))
                    .ok_or(EvalError::Overflow)?)
            }
        }
        Op::Neg => Int(ints(op, vals)?[0].checked_neg().ok_or(EvalError::Overflow)?),
        Op::Abs => Int(ints(op, vals)?[0].checked_abs().ok_or(EvalError::Overflow)?),
        Op::Div | Op::Mod => {
            let is = ints(op, vals)?;
            if is[1] == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = if op == Op::Div {
                is[0].checked_div_euclid(is[1])
            } else {
                is[0].checked_rem_euclid(is[1])
            };
            Int(r.ok_or(EvalError::Overflow)?)
        }
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let is = ints(op, vals)?;
            Bool(match op {
                Op::Lt => is[0] < is[1],
                Op::Le => is[0] <= is[1],
                Op::Gt => is[0] > is[1],
                _ => is[0] >= is[1],
            })
        }

        Op::BvNot | Op::BvNeg => {
            let (bs, w) = bvs(op, vals)?;
            if op == Op::BvNot {
                Value::bv(!bs[0], w)
            } else {
                Value::bv(bs[0].wrapping_neg(), w)
            }
        }
        Op::BvAnd | Op::BvOr | Op::BvXor | Op::BvAdd | Op::BvMul => {
            let (bs, w) = bvs(op, vals)?;
            let f = |a: u64, b: u64| match op {
                Op::BvAnd => a & b,
                Op::BvOr => a | b,
                Op::BvXor => a ^ b,
                Op::BvAdd => a.wrapping_add(b),
                _ => a.wrapping_mul(b),
            };
            let first = bs[0];
            Value::bv(bs[1..].iter().fold(first, |acc, b| f(acc, *b) & bv_mask(w)), w)
        }
        Op::BvSub | Op::BvUdiv | Op::BvUrem | Op::BvShl | Op::BvLshr | Op::BvAshr => {
            let (bs, w) = bvs(op, vals)?;
            let (a, b) = (bs[0], bs[1]);
            let r = match op {
                Op::BvSub => a.wrapping_sub(b),
                Op::BvUdiv => a.checked_div(b).unwrap_or(bv_mask(w)),
                Op::BvUrem => a.checked_rem(b).unwrap_or(a),
                Op::BvShl if b >= w as u64 => 0,
                Op::BvShl => a << b,
                Op::BvLshr if b >= w as u64 => 0,
                Op::BvLshr => a >> b,
                _ => {
                    let sa = signed(a, w);
                    let shift = b.min(63);
                    (sa >> shift) as u64
                }
            };
            Value::bv(r, w)
        }
        Op::BvUlt | Op::BvUle | Op::BvUgt | Op::BvUge => {
            let (bs, _) = bvs(op, vals)?;
            let (a, b) = (bs[0], bs[1]);
            Bool(match op {
                Op::BvUlt => a < b,
                Op::BvUle => a <= b,
                Op::BvUgt => a > b,
                _ => a >= b,
            })
        }
        Op::BvSlt | Op::BvSle | Op::BvSgt | Op::BvSge => {
            let (bs, w) = bvs(op, vals)?;
            let (a, b) = (signed(bs[0], w), signed(bs[1], w));
            Bool(match op {
                Op::BvSlt => a < b,
                Op::BvSle => a <= b,
                Op::BvSgt => a > b,
                _ => a >= b,
            })
        }

        Op::Concat => {
            let mut res = SmtString::empty();
            for s in strs(op, vals)? {
                res.append(&s);
            }
            String(res)
        }
        Op::Length => Int(strs(op, vals)?[0].len() as i64),
        Op::At => {
            let s = strs(op, &vals[..1])?.remove(0);
            let i = ints(op, &vals[1..])?[0];
            if 0 <= i && (i as usize) < s.len() {
                String(s.drop(i as usize).take(1))
            } else {
                String(SmtString::empty())
            }
        }
        Op::Substr => {
            let s = strs(op, &vals[..1])?.remove(0);
            let is = ints(op, &vals[1..])?;
            let (i, n) = (is[0], is[1]);
            if 0 <= i && (i as usize) < s.len() && n > 0 {
                String(s.drop(i as usize).take(n as usize))
            } else {
                String(SmtString::empty())
            }
        }
        Op::IndexOf => {
            let ss = strs(op, &vals[..2])?;
            let i = ints(op, &vals[2..])?[0];
            Int(index_of(&ss[0], &ss[1], i))
        }
        Op::Replace => {
            let ss = strs(op, vals)?;
            String(ss[0].replace(&ss[1], &ss[2]))
        }
        Op::PrefixOf | Op::SuffixOf | Op::Contains => {
            let ss = strs(op, vals)?;
            Bool(match op {
                Op::PrefixOf => ss[1].starts_with(&ss[0]),
                Op::SuffixOf => ss[1].ends_with(&ss[0]),
                _ => ss[0].contains(&ss[1]),
            })
        }
        Op::ToInt => Int(str_to_int(&strs(op, vals)?[0])?),
        Op::FromInt => {
            let i = ints(op, vals)?[0];
            if i < 0 {
                String(SmtString::empty())
            } else {
                String(SmtString::parse(&i.to_string()))
            }
        }

        Op::Tuple => Tuple(vals.iter().cloned().collect()),
        Op::Let => return Err(EvalError::Unsupported(op.name().to_string())),
    };
    Ok(v)
}
