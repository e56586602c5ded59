//! A build engine that performs nothing and records what it was asked to do.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use fanout_lib::consts::{META_IMAGE_NAME, META_PLATFORM, META_REF_PREFIX};
use fanout_lib::wait::{BuildResolver, ResolverError, SolveOptions};
use serde::Serialize;
use tracing::debug;

/// A request received by [`DryRunEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
  Solve {
    state: String,
    platform: String,
    reference: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    no_cache: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cache_from: Vec<String>,
  },
  Read {
    reference: String,
    path: String,
  },
  Push {
    /// `name [platform]` per pushed reference, in key order.
    images: Vec<String>,
  },
}

impl std::fmt::Display for Request {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Request::Solve {
        state,
        platform,
        reference,
        no_cache,
        cache_from,
      } => {
        write!(f, "solve {} ({}) as {}", state, platform, reference)?;
        if *no_cache {
          write!(f, " no-cache")?;
        }
        if !cache_from.is_empty() {
          write!(f, " cache-from {}", cache_from.join(","))?;
        }
        Ok(())
      }
      Request::Read { reference, path } => write!(f, "read {} from {}", path, reference),
      Request::Push { images } => write!(f, "push {}", images.join(", ")),
    }
  }
}

#[derive(Debug, Default)]
pub struct DryRunEngine {
  next_ref: AtomicUsize,
  requests: Mutex<Vec<Request>>,
}

impl DryRunEngine {
  pub fn requests(&self) -> Vec<Request> {
    self.lock().clone()
  }

  fn lock(&self) -> MutexGuard<'_, Vec<Request>> {
    self.requests.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn record(&self, request: Request) {
    debug!(request = %request, "dry-run request");
    self.lock().push(request);
  }
}

#[async_trait]
impl BuildResolver for DryRunEngine {
  type State = String;
  type Reference = String;

  async fn solve(&self, state: &String, opts: &SolveOptions) -> Result<String, ResolverError> {
    let reference = format!("ref-{}", self.next_ref.fetch_add(1, Ordering::SeqCst));
    self.record(Request::Solve {
      state: state.clone(),
      platform: opts.platform.to_string(),
      reference: reference.clone(),
      no_cache: opts.no_cache,
      cache_from: opts.cache_imports.iter().cloned().collect(),
    });
    Ok(reference)
  }

  async fn read_all(&self, reference: &String, path: &str) -> Result<Vec<u8>, ResolverError> {
    self.record(Request::Read {
      reference: reference.clone(),
      path: path.to_string(),
    });
    Ok(Vec::new())
  }

  async fn push_images(
    &self,
    refs: BTreeMap<String, String>,
    metadata: BTreeMap<String, Vec<u8>>,
  ) -> Result<(), ResolverError> {
    let field = |key: &str, name: &str| {
      metadata
        .get(&format!("{META_REF_PREFIX}{key}/{name}"))
        .map(|v| String::from_utf8_lossy(v).into_owned())
    };

    let images = refs
      .keys()
      .map(|key| {
        let name = field(key, META_IMAGE_NAME).unwrap_or_else(|| key.clone());
        match field(key, META_PLATFORM) {
          Some(platform) => format!("{} [{}]", name, platform),
          None => name,
        }
      })
      .collect();

    self.record(Request::Push { images });
    Ok(())
  }
}
