// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A custom s-expression data type and parsing.
//!
//! This implementation supports comments as part of the grammar, so SMT-LIB
//! scripts (including the templates stored in the benchmark) can be parsed
//! without preprocessing. String literals are kept distinct from symbols so
//! that string constraints are sent back to the solver unchanged.

use peg::str::LineCol;
use std::fmt;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    /// A numeral that fits in a `usize`.
    I(usize),
    /// A symbol, keyword or any other literal token.
    S(String),
    /// A string literal, stored unescaped.
    Str(String),
}

impl Atom {
    /// Return the string value of self, if it is a symbol.
    pub fn s(&self) -> Option<&str> {
        if let Self::S(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

/// An s-expression which also tracks comments.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sexp {
    Atom(Atom),
    Comment(String),
    List(Vec<Sexp>),
}

/// Construct an sexp atom from a string.
pub fn atom_s<S: AsRef<str>>(s: S) -> Sexp {
    Sexp::Atom(Atom::S(s.as_ref().to_string()))
}

/// Construct an sexp atom from an integer.
pub fn atom_i(i: usize) -> Sexp {
    Sexp::Atom(Atom::I(i))
}

/// Construct an sexp string literal.
pub fn atom_str<S: AsRef<str>>(s: S) -> Sexp {
    Sexp::Atom(Atom::Str(s.as_ref().to_string()))
}

/// Construct an sexp list from an iteratable.
pub fn sexp_l<I>(i: I) -> Sexp
where
    I: IntoIterator<Item = Sexp>,
{
    Sexp::List(i.into_iter().collect())
}

/// Construct an sexp list with a string atom as its "head" element, followed by
/// an iterable of remaining arguments.
pub fn app<I>(head: &str, args: I) -> Sexp
where
    I: IntoIterator<Item = Sexp>,
{
    let mut ss = vec![atom_s(head)];
    ss.extend(args);
    Sexp::List(ss)
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/:'#".contains(c)
}

/// Tokens that start with a digit or `#` only print unquoted if they lex back
/// as the same literal.
fn is_literal_token(s: &str) -> bool {
    let numeral = |t: &str| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit());
    if let Some(rest) = s.strip_prefix("#x") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(rest) = s.strip_prefix("#b") {
        return !rest.is_empty() && rest.chars().all(|c| c == '0' || c == '1');
    }
    match s.split_once('.') {
        Some((int, frac)) => numeral(int) && numeral(frac),
        None => numeral(s),
    }
}

fn needs_quotes(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };
    if !s.chars().all(is_symbol_char) {
        return true;
    }
    if first.is_ascii_digit() || first == '#' {
        return !is_literal_token(s);
    }
    false
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::I(i) => write!(f, "{i}"),
            Atom::S(s) => {
                if needs_quotes(s) {
                    write!(f, "|{s}|")
                } else {
                    write!(f, "{s}")
                }
            }
            Atom::Str(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
        }
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Atom(s) => write!(f, "{s}"),
            Sexp::Comment(s) => write!(f, ";{s}"),
            Sexp::List(ss) => {
                write!(f, "(")?;
                let mut iter = ss.iter().peekable();
                while let Some(s) = iter.next() {
                    if let Sexp::Comment(_) = s {
                        // comments take a line of their own
                        writeln!(f, "\n{s}")?;
                        continue;
                    }
                    write!(f, "{s}")?;
                    if matches!(iter.peek(), Some(next) if !matches!(next, Sexp::Comment(_))) {
                        write!(f, " ")?;
                    }
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

    /// Return the inner string if self is a symbol atom.
    pub fn atom_s(&self) -> Option<&str> {
        if let Sexp::Atom(Atom::S(s)) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Return the inner integer if self is an integer atom.
    pub fn atom_i(&self) -> Option<usize> {
        if let Sexp::Atom(Atom::I(i)) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Return the contents if self is a string literal.
    pub fn atom_str(&self) -> Option<&str> {
        if let Sexp::Atom(Atom::Str(s)) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Return the head and tail if self is of the form `(head rest..)`.
    pub fn app(&self) -> Option<(&str, &[Sexp])> {
        self.list().and_then(|ss| {
            if !ss.is_empty() {
                if let Some(head) = ss[0].atom_s() {
                    return Some((head, &ss[1..]));
                }
            }
            None
        })
    }

    /// Whether this is an application with the given head symbol.
    pub fn is_app(&self, head: &str) -> bool {
        matches!(self.app(), Some((h, _)) if h == head)
    }
}

peg::parser! {
grammar parser() for str {
  rule ident_start() = ['a'..='z' | 'A'..='Z' | '_' | '\'' | '<' | '>' | ':' | '=' | '$' | '@' | '+' | '-' | '*'
                        | '~' | '!' | '%' | '^' | '&' | '.' | '?' | '/']
  rule ident_char() = ident_start() / ['0'..='9' | '#']
  rule ident() = quiet! { ident_start() ident_char()* } / expected!("atom")

  rule whitespace() = [' ' | '\t' | '\n' | '\r']
  rule _ = whitespace()*

  rule string_literal() -> Atom
  = "\"" s:$(([^'"'] / "\"\"")*) "\"" { Atom::Str(s.replace("\"\"", "\"")) }

  rule pipe_quoted_atom() -> Atom
  = "|" s:$([^'|']*) "|" { Atom::S(s.to_string()) }

  rule unquoted_atom() -> Atom
  = s:$(ident()) { Atom::S(s.to_string()) }

  rule binary_atom() -> Atom
  = s:$("#x" ['0'..='9' | 'a'..='f' | 'A'..='F']+ / "#b" ['0' | '1']+) { Atom::S(s.to_string()) }

  rule decimal_atom() -> Atom
  = s:$(['0'..='9']+ "." ['0'..='9']+) { Atom::S(s.to_string()) }

  // numerals too large for a usize are kept as their text
  rule int_atom() -> Atom
  = i:$(['0'..='9']+) { i.parse().map(Atom::I).unwrap_or_else(|_| Atom::S(i.to_string())) }

  rule atom() -> Sexp
  = s:(string_literal() /
       pipe_quoted_atom() /
       unquoted_atom() /
       binary_atom() /
       decimal_atom() /
       int_atom()) { Sexp::Atom(s) }

  rule comment() -> Sexp
  = ";" s:$(([^'\n']*)) (['\n'] / ![_]) { Sexp::Comment(s.to_string()) }

  rule list() -> Sexp
  = "(" _ ss:(sexp() ** _) _ ")" { Sexp::List(ss) }

  rule sexp() -> Sexp
  = atom() / comment() / list()

  /// Parse an sexp but be tolerant to whitespace around it.
  pub(super) rule sexp_whitespace() -> Sexp
  = _ s:sexp() _ { s }

  /// Parse a sequence of sexps.
  pub(super) rule sexps() -> Vec<Sexp>
  = _ ss:(sexp() ** _) _ { ss }
}
}

/// Error from parsing s-expressions.
pub type ParseError = peg::error::ParseError<LineCol>;

/// Parse an sexp.
///
/// Allows whitespace before or after.
pub fn parse(s: &str) -> Result<Sexp, ParseError> {
    parser::sexp_whitespace(s)
}

/// Parse a sequence of sexps, separated by whitespace.
pub fn parse_many(s: &str) -> Result<Vec<Sexp>, ParseError> {
    parser::sexps(s)
}
