//! Implementation of the `fanout matrix` command.

use anyhow::{Context, Result};
use fanout_lib::args::{expand, rejoin};

use crate::output::{OutputFormat, print_info, print_json, print_row};

/// Rejoin `tokens` and print every combination of their values.
///
/// Tokens split by the shell inside quotes or parentheses are rejoined first,
/// so `--CMD=$(echo hi)` passed unquoted still counts as one argument.
pub fn cmd_matrix(tokens: &[String], output: OutputFormat) -> Result<()> {
  let tokens = rejoin(tokens);
  let matrix = expand(&tokens).context("Failed to expand arguments")?;

  if output.is_json() {
    return print_json(&matrix);
  }

  print_info(&format!("{} combination(s)", matrix.len()));
  for (index, row) in matrix.iter().enumerate() {
    print_row(index, row);
  }
  Ok(())
}
