//! Fan-out execution.
//!
//! Runs one build branch per argument combination and then drains the wait
//! block the branches enqueued their side effects into. Branches run in
//! parallel up to [`ExecuteConfig::parallelism`]; side effects are resolved
//! afterwards, in enqueue order.

pub mod types;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::args::{ArgCombination, ArgMatrix};
use crate::wait::{BuildResolver, WaitBlock};

pub use types::{ConfigError, ExecuteConfig, ExecuteError, FanOutResult};

/// Run `branch_fn` once per row of `matrix`, then drain `wait_block`.
///
/// `branch_fn` receives the row index, the row, and the shared wait block it
/// may enqueue side effects into. Every branch is run to completion even when
/// another fails. If any branch fails, the lowest-indexed failure is returned
/// and the wait block is left undrained.
///
/// # Errors
///
/// - [`ExecuteError::Branch`] for the first failing branch in matrix order
/// - [`ExecuteError::Panicked`] if a branch task panicked and none failed
/// - [`ExecuteError::Wait`] if draining the wait block failed
pub async fn fan_out<R, F, Fut, E>(
  matrix: &ArgMatrix,
  wait_block: Arc<WaitBlock<R>>,
  config: &ExecuteConfig,
  branch_fn: F,
) -> Result<FanOutResult, ExecuteError>
where
  R: BuildResolver,
  F: Fn(usize, ArgCombination, Arc<WaitBlock<R>>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<(), E>> + Send + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  let branches = matrix.len();
  info!(
    branches,
    parallelism = config.parallelism,
    "starting fan-out"
  );

  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
  let branch_fn = Arc::new(branch_fn);
  let mut join_set = JoinSet::new();

  for (index, combination) in matrix.iter().cloned().enumerate() {
    let semaphore = semaphore.clone();
    let branch_fn = branch_fn.clone();
    let wait_block = wait_block.clone();

    join_set.spawn(async move {
      // Held until the branch finishes. The semaphore is never closed.
      let _permit = semaphore.acquire_owned().await.ok();

      let args = combination.to_string();
      debug!(branch = index, args = %args, "running branch");

      let result = branch_fn(index, combination, wait_block)
        .await
        .map_err(|e| ExecuteError::Branch {
          index,
          args,
          source: Box::new(e),
        });

      (index, result)
    });
  }

  let mut failures: Vec<(usize, ExecuteError)> = Vec::new();
  let mut panicked: Option<String> = None;

  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok((index, Ok(()))) => debug!(branch = index, "branch complete"),
      Ok((index, Err(e))) => {
        error!(branch = index, error = %e, "branch failed");
        failures.push((index, e));
      }
      Err(e) => {
        error!(error = %e, "branch task panicked");
        panicked.get_or_insert_with(|| e.to_string());
      }
    }
  }

  if let Some((_, first)) = failures.into_iter().min_by_key(|(index, _)| *index) {
    warn!(pending = wait_block.len(), "not draining wait block after branch failure");
    return Err(first);
  }
  if let Some(message) = panicked {
    warn!(pending = wait_block.len(), "not draining wait block after branch panic");
    return Err(ExecuteError::Panicked(message));
  }

  let summary = wait_block.wait(&config.wait).await?;

  info!(branches, items = summary.items, "fan-out complete");
  Ok(FanOutResult::new(branches, summary))
}
