//! Implementation of the `fanout run` command.
//!
//! Fans an invocation out against [`DryRunEngine`]: each combination either
//! runs the target or, with `--push`, saves one image. The engine requests
//! issued while draining the wait block are printed in order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fanout_lib::args::{ArgCombination, expand_invocation};
use fanout_lib::execute::{ExecuteConfig, FanOutResult, fan_out};
use fanout_lib::image::SaveImage;
use fanout_lib::platform::Platform;
use fanout_lib::wait::{Branch, WaitBlock};
use serde::Serialize;
use tracing::info;

use crate::engine::{DryRunEngine, Request};
use crate::output::{OutputFormat, format_duration, print_error, print_info, print_json, print_request, print_success};

#[derive(Debug, Serialize)]
struct RunOutput {
  #[serde(flatten)]
  result: FanOutResult,
  requests: Vec<Request>,
}

pub fn cmd_run(
  text: &str,
  push: Option<&str>,
  cache_from: &[String],
  no_cache: bool,
  parallelism: Option<usize>,
  timeout: Option<Duration>,
  output: OutputFormat,
) -> Result<()> {
  let (invocation, matrix) = expand_invocation(text).with_context(|| format!("Invalid invocation {text}"))?;

  let mut config = ExecuteConfig::from_env().context("Invalid configuration")?;
  if let Some(n) = parallelism {
    config.parallelism = n.max(1);
  }
  if timeout.is_some() {
    config.wait.timeout = timeout;
  }

  // Platforms are parsed up front so branches only fail on wait block errors.
  let images = match push {
    Some(template) => Some(
      matrix
        .iter()
        .map(|row| -> Result<(String, Option<Platform>)> { Ok((render_tag(template, row), row_platform(row)?)) })
        .collect::<Result<Vec<_>>>()?,
    ),
    None => None,
  };

  let engine = Arc::new(DryRunEngine::default());
  let template = Branch::new(engine.clone())
    .with_cache_imports(cache_from.iter().cloned())
    .with_no_cache(no_cache);

  info!(
    target = %invocation.target,
    branches = matrix.len(),
    parallelism = config.parallelism,
    no_cache = template.no_cache(),
    cache_imports = template.cache_imports().len(),
    "running invocation"
  );

  let wait_block = Arc::new(WaitBlock::<DryRunEngine>::new());
  let images = Arc::new(images);
  let target = invocation.target.clone();

  let branch_fn = move |index: usize, row: ArgCombination, wait: Arc<WaitBlock<DryRunEngine>>| {
    let branch = Arc::new(template.clone());
    let state = if row.is_empty() {
      target.clone()
    } else {
      format!("{} {}", target, row)
    };
    let image = images.as_ref().as_ref().and_then(|all| all.get(index).cloned());
    async move {
      match image {
        Some((tag, platform)) => {
          let mut image = SaveImage::new(state, tag);
          if let Some(platform) = platform {
            image = image.with_platform(platform);
          }
          wait.enqueue_save_image(image, branch)
        }
        None => wait.enqueue_run(state, branch),
      }
    }
  };

  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let result = rt.block_on(fan_out(&matrix, wait_block, &config, branch_fn));
  let elapsed = started.elapsed();

  let requests = engine.requests();
  let result = match result {
    Ok(result) => result,
    Err(e) => {
      if !output.is_json() {
        for request in &requests {
          print_request(&request.to_string());
        }
      }
      print_error(&format!("Run failed: {}", e));
      return Err(e).context("Run failed");
    }
  };

  if output.is_json() {
    return print_json(&RunOutput { result, requests });
  }

  print_info(&format!("{} ({} combination(s))", invocation.target, result.branches));
  for request in &requests {
    print_request(&request.to_string());
  }
  print_success(&format!(
    "{} side effect(s) resolved in {}",
    result.items,
    format_duration(elapsed)
  ));
  Ok(())
}

/// Replace `{NAME}` in `template` with the value of the argument `NAME`,
/// ignoring leading dashes on argument keys.
fn render_tag(template: &str, row: &ArgCombination) -> String {
  row.assignments().iter().fold(template.to_string(), |tag, a| {
    tag.replace(&format!("{{{}}}", a.key().trim_start_matches('-')), a.value())
  })
}

/// The image platform requested by a `platform` argument, if any.
fn row_platform(row: &ArgCombination) -> Result<Option<Platform>> {
  let Some(value) = row.get("--platform").or_else(|| row.get("platform")) else {
    return Ok(None);
  };
  let platform = value.parse().with_context(|| format!("Invalid platform argument {value}"))?;
  Ok(Some(platform))
}
