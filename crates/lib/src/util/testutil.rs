//! Test utilities for fanout-lib.
//!
//! [`FakeResolver`] stands in for the build engine: graph states and
//! references are plain strings, every call is recorded, and failures can be
//! injected per call kind.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::wait::{BuildResolver, ResolverError, SolveOptions};

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  Solve {
    state: String,
    opts: SolveOptions,
  },
  ReadAll {
    reference: String,
    path: String,
  },
  Push {
    refs: BTreeMap<String, String>,
    metadata: BTreeMap<String, Vec<u8>>,
  },
}

#[derive(Debug, Default)]
pub struct FakeResolver {
  calls: Mutex<Vec<Call>>,
  failing_states: HashSet<String>,
  fail_read: bool,
  fail_push: bool,
  delay: Option<Duration>,
}

impl FakeResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fail every solve of `state`.
  pub fn fail_solve(mut self, state: &str) -> Self {
    self.failing_states.insert(state.to_string());
    self
  }

  pub fn fail_read(mut self) -> Self {
    self.fail_read = true;
    self
  }

  pub fn fail_push(mut self) -> Self {
    self.fail_push = true;
    self
  }

  /// Sleep this long inside every solve.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  /// The `(refs, metadata)` of every push call, in order.
  pub fn pushes(&self) -> Vec<(BTreeMap<String, String>, BTreeMap<String, Vec<u8>>)> {
    self
      .calls()
      .into_iter()
      .filter_map(|c| match c {
        Call::Push { refs, metadata } => Some((refs, metadata)),
        _ => None,
      })
      .collect()
  }

  fn record(&self, call: Call) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl BuildResolver for FakeResolver {
  type State = String;
  type Reference = String;

  async fn solve(&self, state: &String, opts: &SolveOptions) -> Result<String, ResolverError> {
    self.record(Call::Solve {
      state: state.clone(),
      opts: opts.clone(),
    });
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.failing_states.contains(state) {
      return Err(ResolverError::new(format!("solve failed for {state}")));
    }
    Ok(format!("ref:{state}"))
  }

  async fn read_all(&self, reference: &String, path: &str) -> Result<Vec<u8>, ResolverError> {
    self.record(Call::ReadAll {
      reference: reference.clone(),
      path: path.to_string(),
    });
    if self.fail_read {
      return Err(ResolverError::new("process exited with code 1"));
    }
    Ok(Vec::new())
  }

  async fn push_images(
    &self,
    refs: BTreeMap<String, String>,
    metadata: BTreeMap<String, Vec<u8>>,
  ) -> Result<(), ResolverError> {
    self.record(Call::Push { refs, metadata });
    if self.fail_push {
      return Err(ResolverError::new("registry rejected push"));
    }
    Ok(())
  }
}
