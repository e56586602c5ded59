//! Types for fan-out execution.
//!
//! Error, result, and configuration types for running the branches of one
//! statement and draining its wait block.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::consts::{ENV_PARALLELISM, ENV_WAIT_TIMEOUT_SECS};
use crate::wait::{WaitConfig, WaitError, WaitSummary};

/// Errors that can occur while fanning out a statement.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// A branch returned an error. Only the lowest-indexed failure is reported.
  #[error("branch {index} ({args}) failed: {source}")]
  Branch {
    index: usize,
    args: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// A branch task panicked or was cancelled.
  #[error("branch task panicked: {0}")]
  Panicked(String),

  /// The branches succeeded but their side effects did not.
  #[error(transparent)]
  Wait(#[from] WaitError),
}

/// Errors reading configuration from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{var} must be a positive integer, got {value:?}")]
  InvalidParallelism { var: &'static str, value: String },

  #[error("{var} must be a whole number of seconds, got {value:?}")]
  InvalidTimeout { var: &'static str, value: String },
}

/// Outcome of a successful [`fan_out`](super::fan_out).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutResult {
  /// Branches run, one per argument combination.
  pub branches: usize,
  /// Queued side effects resolved when the wait block was drained.
  pub items: usize,
  pub commands: usize,
  pub images: usize,
}

impl FanOutResult {
  pub(crate) fn new(branches: usize, summary: WaitSummary) -> Self {
    Self {
      branches,
      items: summary.items,
      commands: summary.commands,
      images: summary.images,
    }
  }
}

/// Configuration for fan-out execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteConfig {
  /// Maximum number of branches running at once.
  pub parallelism: usize,

  pub wait: WaitConfig,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: num_cpus(),
      wait: WaitConfig::default(),
    }
  }
}

impl ExecuteConfig {
  /// Defaults, overridden by `FANOUT_PARALLELISM` and
  /// `FANOUT_WAIT_TIMEOUT_SECS` when set.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Some(value) = env_var(ENV_PARALLELISM) {
      config.parallelism = match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
          return Err(ConfigError::InvalidParallelism {
            var: ENV_PARALLELISM,
            value,
          });
        }
      };
    }

    if let Some(value) = env_var(ENV_WAIT_TIMEOUT_SECS) {
      let secs = value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
        var: ENV_WAIT_TIMEOUT_SECS,
        value: value.clone(),
      })?;
      config.wait.timeout = Some(Duration::from_secs(secs));
    }

    Ok(config)
  }
}

/// Unset and empty variables are treated alike.
fn env_var(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
