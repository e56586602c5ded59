//! Repair of argument lists produced by a naive whitespace tokenizer.
//!
//! A statement such as `BUILD --load=(+img --name=foo) +target` may reach us
//! already split on every space: `["--load=(+img", "--name=foo)", "+target"]`.
//! [`rejoin`] glues neighbouring tokens back together until parens and quotes
//! balance again.

use super::scan::Scanner;

/// Rejoin tokens that were split inside parens or quotes.
///
/// Tokens are accumulated into a group, joined by a single space, for as long
/// as the group has an open quote or a non-zero paren depth. Once the group
/// balances it is emitted and the next token starts a new group.
///
/// This never fails. A group still unbalanced when the input runs out is
/// emitted as-is and left for [`Invocation::parse`](super::Invocation::parse)
/// to reject. A stray `)` drives the depth negative and is simply carried
/// forward into the following tokens.
pub fn rejoin<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
  let mut out = Vec::with_capacity(tokens.len());
  let mut group: Option<(String, Scanner)> = None;

  for token in tokens {
    let token = token.as_ref();
    let fresh = group.is_none();

    let (text, scanner) = group.get_or_insert_with(|| (String::new(), Scanner::new(0)));
    if !fresh {
      text.push(' ');
      scanner.step(' ');
    }
    text.push_str(token);
    scanner.feed(token);

    if scanner.is_balanced()
      && let Some((text, _)) = group.take()
    {
      out.push(text);
    }
  }

  if let Some((text, _)) = group {
    out.push(text);
  }

  out
}
