//! Character-class scanner shared by invocation parsing and token rejoining.
//!
//! The scanner tracks three pieces of state while text is fed through it one
//! character at a time:
//!
//! - paren nesting depth (quoted and escaped parens do not count)
//! - the currently open quote, if any (`'` or `"`)
//! - a pending backslash escape, which makes the next character literal
//!
//! It never decides what a character *means* for its caller. The invocation
//! parser stops at the close that returns depth to zero and splits on
//! whitespace at depth one; the rejoiner only asks whether the accumulated
//! text is balanced.

/// Classification of a single character fed to the [`Scanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Class {
  /// A character consumed literally because of a preceding backslash.
  Escaped,
  /// A backslash that escapes the next character.
  Escape,
  /// A quote character that opened or closed a quoted section.
  Quote,
  /// An unquoted `(`; depth has already been incremented.
  Open,
  /// An unquoted `)`; depth has already been decremented.
  Close,
  /// Unquoted whitespace.
  Whitespace,
  /// Anything else, including whitespace and parens inside quotes.
  Plain,
}

/// State left open when the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unterminated {
  /// A quote was never closed.
  Quote(char),
  /// Parens did not return to depth zero.
  Depth(i64),
}

#[derive(Debug, Clone)]
pub(crate) struct Scanner {
  depth: i64,
  quote: Option<char>,
  escaped: bool,
}

impl Scanner {
  /// Create a scanner starting at the given nesting depth.
  ///
  /// The invocation parser starts at 1 because it has already consumed the
  /// leading `(`; the rejoiner starts at 0.
  pub(crate) fn new(depth: i64) -> Self {
    Self {
      depth,
      quote: None,
      escaped: false,
    }
  }

  /// Feed one character and update the state.
  pub(crate) fn step(&mut self, ch: char) -> Class {
    if self.escaped {
      self.escaped = false;
      return Class::Escaped;
    }

    match ch {
      '\\' => {
        self.escaped = true;
        Class::Escape
      }
      '"' | '\'' => match self.quote {
        Some(open) if open == ch => {
          self.quote = None;
          Class::Quote
        }
        None => {
          self.quote = Some(ch);
          Class::Quote
        }
        // The other quote kind is plain content inside a quoted section.
        Some(_) => Class::Plain,
      },
      _ if self.quote.is_some() => Class::Plain,
      '(' => {
        self.depth += 1;
        Class::Open
      }
      ')' => {
        self.depth -= 1;
        Class::Close
      }
      c if c.is_whitespace() => Class::Whitespace,
      _ => Class::Plain,
    }
  }

  /// Feed every character of `text`.
  pub(crate) fn feed(&mut self, text: &str) {
    for ch in text.chars() {
      self.step(ch);
    }
  }

  pub(crate) fn depth(&self) -> i64 {
    self.depth
  }

  /// True when no quote is open and depth is back at zero.
  pub(crate) fn is_balanced(&self) -> bool {
    self.depth == 0 && self.quote.is_none()
  }

  /// Report what is still open, if anything.
  ///
  /// An open quote takes precedence over an unbalanced depth since parens
  /// inside the quote were never counted.
  pub(crate) fn unterminated(&self) -> Option<Unterminated> {
    if let Some(q) = self.quote {
      return Some(Unterminated::Quote(q));
    }
    if self.depth != 0 {
      return Some(Unterminated::Depth(self.depth));
    }
    None
  }
}
