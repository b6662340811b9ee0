use std::{fmt::Display, rc::Rc};

use smt_str::SmtString;

use crate::{
    context::{Sort, Sorted},
    sexp::{Atom, Sexp},
};

/// A concrete value of one of the supported sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    /// A bit-vector of `width` bits; bits above `width` are always zero.
    BitVec { bits: u64, width: u32 },
    String(SmtString),
    Tuple(Rc<[Value]>),
}

/// The mask selecting the low `width` bits.
pub fn bv_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl Value {
    /// Creates a bit-vector value, truncating `bits` to `width`.
    pub fn bv(bits: u64, width: u32) -> Self {
        Value::BitVec {
            bits: bits & bv_mask(width),
            width,
        }
    }

    pub fn string(s: &str) -> Self {
        Value::String(SmtString::parse(s))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Reads an SMT-LIB literal: a numeral, `-3`, `(- 3)`, `true`/`false`, `#x..`, `#b..`, `(_ bvN w)` or a string.
    pub fn from_sexp(sexp: &Sexp) -> Option<Value> {
        match sexp {
            Sexp::Atom(Atom::Int(i)) => i64::try_from(*i).ok().map(Value::Int),
            Sexp::Atom(Atom::Str(s)) => Some(Value::string(s)),
            Sexp::Atom(Atom::Symbol(s)) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ if s.starts_with("#x") => {
                    let digits = &s[2..];
                    let bits = u64::from_str_radix(digits, 16).ok()?;
                    Some(Value::bv(bits, (digits.len() * 4) as u32))
                }
                _ if s.starts_with("#b") => {
                    let digits = &s[2..];
                    let bits = u64::from_str_radix(digits, 2).ok()?;
                    Some(Value::bv(bits, digits.len() as u32))
                }
                _ if s.starts_with('-') => s.parse::<i64>().ok().map(Value::Int),
                _ => None,
            },
            Sexp::List(items) => match items.as_slice() {
                [minus, n] if minus.symbol() == Some("-") => match Value::from_sexp(n)? {
                    Value::Int(i) => i.checked_neg().map(Value::Int),
                    _ => None,
                },
                [us, bv, w] if us.symbol() == Some("_") => {
                    let bits = bv.symbol()?.strip_prefix("bv")?.parse::<u64>().ok()?;
                    let width = u32::try_from(w.int()?).ok()?;
                    Some(Value::bv(bits, width))
                }
                _ => None,
            },
        }
    }

    /// Magnitude used to order sample values, smallest first.
    pub(crate) fn magnitude(&self) -> u64 {
        match self {
            Value::Bool(b) => *b as u64,
            Value::Int(i) => i.unsigned_abs() * 2 + (*i < 0) as u64,
            Value::BitVec { bits, .. } => *bits,
            Value::String(s) => s.len() as u64,
            Value::Tuple(vs) => vs.iter().map(|v| v.magnitude()).sum(),
        }
    }
}

impl Sorted for Value {
    fn sort(&self) -> Sort {
        match self {
            Value::Bool(_) => Sort::Bool,
            Value::Int(_) => Sort::Int,
            Value::BitVec { width, .. } => Sort::BitVec(*width),
            Value::String(_) => Sort::String,
            Value::Tuple(vs) => Sort::Tuple(vs.iter().map(|v| v.sort()).collect()),
        }
    }
}

/// SMT-LIB literal syntax.
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) if *i < 0 => write!(f, "(- {})", i.unsigned_abs()),
            Value::Int(i) => write!(f, "{}", i),
            Value::BitVec { bits, width } => {
                if width % 4 == 0 {
                    write!(f, "#x{:0w$x}", bits, w = (*width / 4) as usize)
                } else {
                    write!(f, "#b{:0w$b}", bits, w = *width as usize)
                }
            }
            Value::String(s) => write!(f, "\"{}\"", s.to_string().replace('"', "\"\"")),
            Value::Tuple(vs) => {
                write!(f, "(tuple")?;
                for v in vs.iter() {
                    write!(f, " {}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_literals() {
        assert_eq!(Value::Int(-3).to_string(), "(- 3)");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::bv(0xab, 8).to_string(), "#xab");
        assert_eq!(Value::bv(0b101, 3).to_string(), "#b101");
        assert_eq!(Value::string("ab").to_string(), "\"ab\"");
    }

    #[test]
    fn literals_from_sexp() {
        let read = |s: &str| Value::from_sexp(&crate::sexp::parse(s).unwrap());
        assert_eq!(read("42"), Some(Value::Int(42)));
        assert_eq!(read("(- 3)"), Some(Value::Int(-3)));
        assert_eq!(read("-3"), Some(Value::Int(-3)));
        assert_eq!(read("#x0f"), Some(Value::bv(15, 8)));
        assert_eq!(read("#b101"), Some(Value::bv(5, 3)));
        assert_eq!(read("(_ bv5 8)"), Some(Value::bv(5, 8)));
        assert_eq!(read("\"hi\""), Some(Value::string("hi")));
        assert_eq!(read("x"), None);
    }

    #[test]
    fn bv_truncates() {
        assert_eq!(Value::bv(0x1ff, 8), Value::BitVec { bits: 0xff, width: 8 });
        assert_eq!(bv_mask(64), u64::MAX);
    }
}
