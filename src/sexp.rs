//! S-expressions and their parser.
//!
//! Comments are skipped as whitespace. String literals are kept apart from symbols so that
//! `"x"` and `x` can be told apart when reading terms.

use peg::str::LineCol;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// A numeral
    Int(u64),
    /// A symbol, keyword, or `#x`/`#b` literal
    Symbol(String),
    /// A string literal, with `""` already unescaped
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    Atom(Atom),
    List(Vec<Sexp>),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(i) => write!(f, "{i}"),
            Atom::Symbol(s) => write!(f, "{s}"),
            Atom::Str(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
        }
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Atom(a) => write!(f, "{a}"),
            Sexp::List(ss) => {
                write!(f, "(")?;
                for (i, s) in ss.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Sexp {
    /// Return the inner elements if self is a Sexp::List
    pub fn list(&self) -> Option<&[Sexp]> {
        if let Sexp::List(ss) = self {
            Some(ss)
        } else {
            None
        }
    }

    /// Return the inner string if self is a symbol.
    pub fn symbol(&self) -> Option<&str> {
        if let Sexp::Atom(Atom::Symbol(s)) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Return the inner integer if self is a numeral.
    pub fn int(&self) -> Option<u64> {
        if let Sexp::Atom(Atom::Int(i)) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Return the head and tail if self is of the form `(head rest..)` with a symbol head.
    pub fn app(&self) -> Option<(&str, &[Sexp])> {
        self.list().and_then(|ss| {
            let head = ss.first()?.symbol()?;
            Some((head, &ss[1..]))
        })
    }
}

peg::parser! {
grammar parser() for str {
  rule ident_start() = ['a'..='z' | 'A'..='Z' | '_' | '\'' | '<' | '>' | ':' | '=' | '$' | '@' | '+' | '-' | '*' | '/' | '.' | '?' | '!' | '~' | '&' | '^' | '%' | '#']
  rule ident_char() = ident_start() / ['0'..='9']
  rule ident() = quiet! { ident_start() ident_char()* } / expected!("atom")

  rule whitespace() = [' ' | '\t' | '\n' | '\r']
  rule comment() = ";" [^'\n']* ("\n" / ![_])
  rule _ = (whitespace() / comment())*

  rule string_atom() -> Atom
  = "\"" s:$(([^'"'] / "\"\"")*) "\"" { Atom::Str(s.replace("\"\"", "\"")) }

  rule pipe_quoted_atom() -> Atom
  = "|" s:$([^'|']*) "|" { Atom::Symbol(s.to_string()) }

  rule unquoted_atom() -> Atom
  = s:$(ident()) { Atom::Symbol(s.to_string()) }

  rule int_atom() -> Atom
  = i:$(['0'..='9']+) {? i.parse().map(Atom::Int).or(Err("numeral")) }

  rule atom() -> Sexp
  = s:(string_atom() /
       pipe_quoted_atom() /
       unquoted_atom() /
       int_atom()) { Sexp::Atom(s) }

  rule list() -> Sexp
  = "(" _ ss:(sexp() ** _) _ ")" { Sexp::List(ss) }

  rule sexp() -> Sexp
  = atom() / list()

  /// Parse an sexp but be tolerant to whitespace around it.
  pub(super) rule sexp_whitespace() -> Sexp
  = _ s:sexp() _ { s }

  /// Parse a sequence of sexps.
  pub(super) rule sexps() -> Vec<Sexp>
  = _ ss:(sexp() ** _) _ { ss }
}
}

/// Parse an sexp.
///
/// Allows whitespace before or after.
pub fn parse(s: &str) -> Result<Sexp, peg::error::ParseError<LineCol>> {
    parser::sexp_whitespace(s)
}

/// Parse a sequence of sexps, separated by whitespace.
pub fn parse_many(s: &str) -> Result<Vec<Sexp>, peg::error::ParseError<LineCol>> {
    parser::sexps(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atoms() {
        assert_eq!(parse("x").unwrap(), Sexp::Atom(Atom::Symbol("x".into())));
        assert_eq!(parse("42").unwrap(), Sexp::Atom(Atom::Int(42)));
        assert_eq!(parse("#x0f").unwrap(), Sexp::Atom(Atom::Symbol("#x0f".into())));
        assert_eq!(parse("-3").unwrap(), Sexp::Atom(Atom::Symbol("-3".into())));
        assert_eq!(
            parse("\"a\"\"b\"").unwrap(),
            Sexp::Atom(Atom::Str("a\"b".into()))
        );
    }

    #[test]
    fn test_parse_skips_comments() {
        let sexps = parse_many("; header\n(set-logic LIA) ; trailing\n(check-synth)").unwrap();
        assert_eq!(sexps.len(), 2);
        assert_eq!(sexps[0].app().unwrap().0, "set-logic");
    }

    #[test]
    fn test_display_round_trip() {
        let s = "(constraint (= (f x) (+ x 1)))";
        assert_eq!(parse(s).unwrap().to_string(), s);
    }

    #[test]
    fn test_unbalanced_fails() {
        assert!(parse("(a (b)").is_err());
    }
}
