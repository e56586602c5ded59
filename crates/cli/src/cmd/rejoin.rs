use anyhow::Result;
use fanout_lib::args::rejoin;

use crate::output::{OutputFormat, print_json};

/// Print the repaired tokens, one per line.
pub fn cmd_rejoin(tokens: &[String], output: OutputFormat) -> Result<()> {
  let joined = rejoin(tokens);

  if output.is_json() {
    return print_json(&joined);
  }

  for token in &joined {
    println!("{}", token);
  }
  Ok(())
}
