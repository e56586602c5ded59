//! Implementation of the `fanout invoke` command.

use anyhow::{Context, Result};
use fanout_lib::args::{ArgMatrix, Invocation, expand_invocation};
use serde::Serialize;

use crate::output::{OutputFormat, print_info, print_json, print_row, print_stat};

#[derive(Debug, Serialize)]
struct InvokeOutput<'a> {
  target: &'a str,
  args: &'a [String],
  matrix: &'a ArgMatrix,
}

pub fn cmd_invoke(text: &str, output: OutputFormat) -> Result<()> {
  let (invocation, matrix): (Invocation, ArgMatrix) =
    expand_invocation(text).with_context(|| format!("Invalid invocation {text}"))?;

  if output.is_json() {
    return print_json(&InvokeOutput {
      target: &invocation.target,
      args: &invocation.args,
      matrix: &matrix,
    });
  }

  print_stat("Target", &invocation.target);
  print_stat("Args", &invocation.args.join(" "));
  println!();
  print_info(&format!("{} combination(s)", matrix.len()));
  for (index, row) in matrix.iter().enumerate() {
    print_row(index, row);
  }
  Ok(())
}
