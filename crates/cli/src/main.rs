mod cmd;
mod engine;
mod output;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{cmd_info, cmd_invoke, cmd_matrix, cmd_rejoin, cmd_run};
use output::OutputFormat;

/// Expand build arguments into combinations and join their side effects
#[derive(Parser)]
#[command(name = "fanout")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging (overridden by RUST_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Expand key=value tokens into every combination of their values
  Matrix {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Argument tokens, e.g. --VERSION=1 --VERSION=2 --ARCH=amd64
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
  },

  /// Parse a parenthesized invocation and expand its arguments
  Invoke {
    /// Invocation text, e.g. "(+build --VERSION=1 --VERSION=2)"
    #[arg(allow_hyphen_values = true)]
    text: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Rejoin tokens that were split inside quotes or parentheses
  Rejoin {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Tokens as split by whitespace
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
  },

  /// Fan an invocation out against a dry-run engine and print its requests
  Run {
    /// Invocation text, e.g. "(+build --VERSION=1 --VERSION=2)"
    #[arg(allow_hyphen_values = true)]
    text: String,

    /// Push one image per combination; `{NAME}` is replaced by the value of NAME
    #[arg(long, value_name = "TAG")]
    push: Option<String>,

    /// Import cached layers from this image (repeatable)
    #[arg(long, value_name = "IMAGE")]
    cache_from: Vec<String>,

    /// Ignore every cache and re-run all steps
    #[arg(long)]
    no_cache: bool,

    /// Maximum branches running at once [env: FANOUT_PARALLELISM]
    #[arg(short = 'j', long)]
    parallelism: Option<usize>,

    /// Bound on resolving side effects, e.g. "30s", "5m" [env: FANOUT_WAIT_TIMEOUT_SECS]
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show version, native platform, and effective configuration
  Info {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Matrix { tokens, output } => cmd_matrix(&tokens, output),
    Commands::Invoke { text, output } => cmd_invoke(&text, output),
    Commands::Rejoin { tokens, output } => cmd_rejoin(&tokens, output),
    Commands::Run {
      text,
      push,
      cache_from,
      no_cache,
      parallelism,
      timeout,
      output,
    } => cmd_run(
      &text,
      push.as_deref(),
      &cache_from,
      no_cache,
      parallelism,
      timeout,
      output,
    ),
    Commands::Info { output } => cmd_info(output),
  }
}
