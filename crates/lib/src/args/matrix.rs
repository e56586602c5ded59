//! Build-argument matrix expansion.
//!
//! A statement given `a=1 b=2 a=3 b=4` runs once per combination of values:
//!
//! ```text
//! a=1 b=2
//! a=1 b=4
//! a=3 b=2
//! a=3 b=4
//! ```
//!
//! Keys are ordered by first appearance, values within a key by occurrence,
//! and the first key varies slowest. Callers rely on this exact row order.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::ArgError;

/// A single `key=value` build argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArgAssignment {
  key: String,
  value: String,
  raw: String,
}

impl ArgAssignment {
  /// Split a token at its first `=`.
  ///
  /// Everything after the first `=` is the value, so `a=b=c` has value `b=c`
  /// and `a=` has an empty value.
  pub fn parse(token: &str) -> Result<Self, ArgError> {
    let (key, value) = token
      .split_once('=')
      .ok_or_else(|| ArgError::Malformed(token.to_string()))?;
    Ok(Self {
      key: key.to_string(),
      value: value.to_string(),
      raw: token.to_string(),
    })
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn value(&self) -> &str {
    &self.value
  }

  /// The original `key=value` token.
  pub fn raw(&self) -> &str {
    &self.raw
  }
}

impl fmt::Display for ArgAssignment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

/// One row of the matrix: exactly one assignment per distinct key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArgCombination {
  assignments: Vec<ArgAssignment>,
}

impl ArgCombination {
  pub fn assignments(&self) -> &[ArgAssignment] {
    &self.assignments
  }

  /// Look up the value assigned to `key` in this combination.
  pub fn get(&self, key: &str) -> Option<&str> {
    self.assignments.iter().find(|a| a.key == key).map(|a| a.value.as_str())
  }

  /// The original tokens of this row, in column order.
  pub fn to_tokens(&self) -> Vec<String> {
    self.assignments.iter().map(|a| a.raw.clone()).collect()
  }

  pub fn len(&self) -> usize {
    self.assignments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assignments.is_empty()
  }
}

impl fmt::Display for ArgCombination {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, a) in self.assignments.iter().enumerate() {
      if i > 0 {
        f.write_str(" ")?;
      }
      write!(f, "{}", a)?;
    }
    Ok(())
  }
}

/// Every combination of build-argument values, in contract order.
///
/// Never empty: with no arguments the matrix holds one empty combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArgMatrix {
  rows: Vec<ArgCombination>,
}

impl ArgMatrix {
  pub fn rows(&self) -> &[ArgCombination] {
    &self.rows
  }

  pub fn iter(&self) -> std::slice::Iter<'_, ArgCombination> {
    self.rows.iter()
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// The matrix as raw tokens, row by row.
  pub fn to_tokens(&self) -> Vec<Vec<String>> {
    self.rows.iter().map(ArgCombination::to_tokens).collect()
  }
}

impl IntoIterator for ArgMatrix {
  type Item = ArgCombination;
  type IntoIter = std::vec::IntoIter<ArgCombination>;

  fn into_iter(self) -> Self::IntoIter {
    self.rows.into_iter()
  }
}

impl<'a> IntoIterator for &'a ArgMatrix {
  type Item = &'a ArgCombination;
  type IntoIter = std::slice::Iter<'a, ArgCombination>;

  fn into_iter(self) -> Self::IntoIter {
    self.rows.iter()
  }
}

/// Expand `key=value` tokens into the cartesian product of their values.
///
/// Repeated identical tokens are kept and produce repeated rows.
///
/// # Errors
///
/// Returns [`ArgError::Malformed`] for the first token without an `=`.
///
/// # Example
///
/// ```
/// use fanout_lib::args::expand;
///
/// let matrix = expand(&["a=1", "b=2", "a=3"]).unwrap();
/// assert_eq!(matrix.to_tokens(), vec![vec!["a=1", "b=2"], vec!["a=3", "b=2"]]);
/// ```
pub fn expand<S: AsRef<str>>(tokens: &[S]) -> Result<ArgMatrix, ArgError> {
  let mut groups: Vec<Vec<ArgAssignment>> = Vec::new();
  let mut index: HashMap<String, usize> = HashMap::new();

  for token in tokens {
    let assignment = ArgAssignment::parse(token.as_ref())?;
    match index.get(&assignment.key) {
      Some(&i) => groups[i].push(assignment),
      None => {
        index.insert(assignment.key.clone(), groups.len());
        groups.push(vec![assignment]);
      }
    }
  }

  // Extending every existing row by each value of the next group keeps the
  // first group slowest and the last group fastest.
  let mut rows = vec![ArgCombination::default()];
  for group in &groups {
    let mut next = Vec::with_capacity(rows.len() * group.len());
    for row in &rows {
      for assignment in group {
        let mut assignments = Vec::with_capacity(row.assignments.len() + 1);
        assignments.extend(row.assignments.iter().cloned());
        assignments.push(assignment.clone());
        next.push(ArgCombination { assignments });
      }
    }
    rows = next;
  }

  Ok(ArgMatrix { rows })
}
