//! Parsing of parenthesized inline invocations such as
//! `(+target/art --flag=value --other="a b")`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::scan::{Class, Scanner, Unterminated};
use super::{ArgError, SyntaxErrorKind};

/// A target reference plus its literal argument tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
  /// The first token, naming the target to invoke.
  pub target: String,
  /// Remaining tokens in their original order.
  pub args: Vec<String>,
}

impl Invocation {
  /// Parse a parenthesized invocation.
  ///
  /// Whitespace at depth one (outside quotes) separates tokens. Backslashes
  /// escape the next character and are kept in the token text. Nested parens
  /// and quoted sections are kept intact inside a single token.
  ///
  /// # Errors
  ///
  /// Returns [`ArgError::Syntax`] if the text does not start with `(`, the
  /// parens or quotes are left open, anything follows the closing `)`, or no
  /// target reference is present.
  ///
  /// # Example
  ///
  /// ```
  /// use fanout_lib::args::Invocation;
  ///
  /// let inv = Invocation::parse("(+build --VERSION=1.2 --name=\"my app\")").unwrap();
  /// assert_eq!(inv.target, "+build");
  /// assert_eq!(inv.args, vec!["--VERSION=1.2", "--name=\"my app\""]);
  /// ```
  pub fn parse(text: &str) -> Result<Self, ArgError> {
    let syntax = |kind| ArgError::Syntax {
      text: text.to_string(),
      kind,
    };

    let body = text
      .strip_prefix('(')
      .ok_or_else(|| syntax(SyntaxErrorKind::MissingOpenParen))?;

    let mut scanner = Scanner::new(1);
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut close_end = None;

    for (pos, ch) in body.char_indices() {
      match scanner.step(ch) {
        Class::Close if scanner.depth() == 0 => {
          close_end = Some(pos + ch.len_utf8());
          break;
        }
        Class::Whitespace if scanner.depth() == 1 => {
          if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
          }
        }
        _ => current.push(ch),
      }
    }

    let Some(end) = close_end else {
      let kind = match scanner.unterminated() {
        Some(Unterminated::Quote(_)) => SyntaxErrorKind::UnterminatedQuote,
        _ => SyntaxErrorKind::Unbalanced,
      };
      return Err(syntax(kind));
    };

    if end != body.len() {
      return Err(syntax(SyntaxErrorKind::TrailingContent));
    }

    if !current.is_empty() {
      tokens.push(current);
    }

    let mut tokens = tokens.into_iter();
    let target = tokens.next().ok_or_else(|| syntax(SyntaxErrorKind::MissingTarget))?;

    Ok(Self {
      target,
      args: tokens.collect(),
    })
  }
}

impl FromStr for Invocation {
  type Err = ArgError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}", self.target)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    write!(f, ")")
  }
}
