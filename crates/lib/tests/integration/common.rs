//! Shared helpers for fanout-lib integration tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fanout_lib::wait::{BuildResolver, ResolverError, SolveOptions};

/// A graph step; solving fails when `broken` is set.
#[derive(Debug, Clone)]
pub struct Step {
  pub name: String,
  pub broken: bool,
}

pub fn step(name: &str) -> Step {
  Step {
    name: name.to_string(),
    broken: false,
  }
}

pub fn broken(name: &str) -> Step {
  Step {
    name: name.to_string(),
    broken: true,
  }
}

/// Engine double that hands out numbered references and logs every call as a
/// line of text.
#[derive(Debug, Default)]
pub struct RecordingEngine {
  next_ref: AtomicU64,
  log: Mutex<Vec<String>>,
  pushed: Mutex<Vec<(BTreeMap<String, u64>, BTreeMap<String, Vec<u8>>)>>,
}

impl RecordingEngine {
  pub fn log(&self) -> Vec<String> {
    self.log.lock().unwrap().clone()
  }

  pub fn pushed(&self) -> Vec<(BTreeMap<String, u64>, BTreeMap<String, Vec<u8>>)> {
    self.pushed.lock().unwrap().clone()
  }

  fn record(&self, line: String) {
    self.log.lock().unwrap().push(line);
  }
}

#[async_trait]
impl BuildResolver for RecordingEngine {
  type State = Step;
  type Reference = u64;

  async fn solve(&self, state: &Step, opts: &SolveOptions) -> Result<u64, ResolverError> {
    self.record(format!("solve {} {}", state.name, opts.platform));
    if state.broken {
      return Err(ResolverError::new(format!("{} does not build", state.name)));
    }
    Ok(self.next_ref.fetch_add(1, Ordering::SeqCst))
  }

  async fn read_all(&self, reference: &u64, path: &str) -> Result<Vec<u8>, ResolverError> {
    self.record(format!("read #{reference} {path}"));
    Ok(Vec::new())
  }

  async fn push_images(
    &self,
    refs: BTreeMap<String, u64>,
    metadata: BTreeMap<String, Vec<u8>>,
  ) -> Result<(), ResolverError> {
    let keys: Vec<&str> = refs.keys().map(String::as_str).collect();
    self.record(format!("push {}", keys.join(",")));
    self.pushed.lock().unwrap().push((refs, metadata));
    Ok(())
  }
}

/// Metadata value as text.
pub fn meta<'a>(metadata: &'a BTreeMap<String, Vec<u8>>, key: &str) -> Option<&'a str> {
  metadata.get(key).and_then(|v| std::str::from_utf8(v).ok())
}
