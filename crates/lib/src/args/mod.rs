//! Build-argument handling for fanned-out statements.
//!
//! - [`Invocation`] parses `(+target --flag=value ...)` inline invocations
//! - [`rejoin`] repairs tokens split inside parens or quotes
//! - [`expand`] turns repeated `key=value` arguments into an [`ArgMatrix`]
//!
//! All three are pure. Errors are returned to the statement interpreter,
//! which reports the offending text as a build-definition error.

pub mod invocation;
pub mod matrix;
pub mod rejoin;
mod scan;

use thiserror::Error;

pub use invocation::Invocation;
pub use matrix::{ArgAssignment, ArgCombination, ArgMatrix, expand};
pub use rejoin::rejoin;

/// Errors from parsing invocations and build arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
  /// A build argument without an `=`.
  #[error("malformed build argument '{0}': expected KEY=VALUE")]
  Malformed(String),

  /// The invocation text could not be parsed.
  #[error("syntax error in '{text}': {kind}")]
  Syntax { text: String, kind: SyntaxErrorKind },
}

/// What was wrong with an invocation's syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
  #[error("invocation must start with '('")]
  MissingOpenParen,

  #[error("unbalanced parentheses")]
  Unbalanced,

  #[error("unterminated quote")]
  UnterminatedQuote,

  #[error("unexpected content after closing ')'")]
  TrailingContent,

  #[error("missing target reference")]
  MissingTarget,
}

/// Parse an inline invocation and expand its arguments into a matrix.
///
/// The argument tokens are passed through [`rejoin`] before expansion so the
/// same path handles text that was tokenized upstream.
pub fn expand_invocation(text: &str) -> Result<(Invocation, ArgMatrix), ArgError> {
  let mut invocation = Invocation::parse(text)?;
  invocation.args = rejoin(&invocation.args);
  let matrix = expand(&invocation.args)?;
  Ok((invocation, matrix))
}
