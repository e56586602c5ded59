//! The build engine as seen from the wait block.
//!
//! [`BuildResolver`] is the engine client: it turns graph state into solved
//! references, reads from them, and pushes images. [`Branch`] is the
//! per-variant context a side effect was enqueued from; it decides how that
//! side effect is solved (cache imports, no-cache, platform).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::platform::{Platform, PlatformResolver};

/// An error reported by the build engine, passed through unchanged.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ResolverError {
  message: String,
}

impl ResolverError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// How a graph state should be solved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOptions {
  /// Remote caches to import layers from.
  pub cache_imports: BTreeSet<String>,
  /// Ignore every cache and re-run all steps.
  pub no_cache: bool,
  /// Platform the state is solved for.
  pub platform: Platform,
}

/// Client of the build engine.
///
/// `State` is an unmaterialized graph node; `Reference` is the handle to its
/// solved content. Both are opaque to this crate.
#[async_trait]
pub trait BuildResolver: Send + Sync + 'static {
  type State: Clone + fmt::Debug + Send + Sync + 'static;
  type Reference: Clone + fmt::Debug + Send + Sync + 'static;

  /// Solve `state` into a reference.
  async fn solve(&self, state: &Self::State, opts: &SolveOptions) -> Result<Self::Reference, ResolverError>;

  /// Read `path` from a solved reference.
  async fn read_all(&self, reference: &Self::Reference, path: &str) -> Result<Vec<u8>, ResolverError>;

  /// Push every reference in `refs` in a single request.
  ///
  /// `metadata` keys are `ref/<key>/<field>` for the keys of `refs`.
  async fn push_images(
    &self,
    refs: BTreeMap<String, Self::Reference>,
    metadata: BTreeMap<String, Vec<u8>>,
  ) -> Result<(), ResolverError>;
}

/// Interpretation context of one fanned-out build branch.
pub struct Branch<R: BuildResolver> {
  resolver: Arc<R>,
  cache_imports: BTreeSet<String>,
  no_cache: bool,
  platforms: PlatformResolver,
}

impl<R: BuildResolver> Branch<R> {
  pub fn new(resolver: Arc<R>) -> Self {
    Self {
      resolver,
      cache_imports: BTreeSet::new(),
      no_cache: false,
      platforms: PlatformResolver::default(),
    }
  }

  pub fn with_cache_imports<I, S>(mut self, imports: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.cache_imports = imports.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_no_cache(mut self, no_cache: bool) -> Self {
    self.no_cache = no_cache;
    self
  }

  pub fn with_platforms(mut self, platforms: PlatformResolver) -> Self {
    self.platforms = platforms;
    self
  }

  pub fn resolver(&self) -> &R {
    &self.resolver
  }

  pub fn cache_imports(&self) -> &BTreeSet<String> {
    &self.cache_imports
  }

  pub fn no_cache(&self) -> bool {
    self.no_cache
  }

  pub fn platforms(&self) -> &PlatformResolver {
    &self.platforms
  }

  /// Solve options for this branch, for `platform` or the native platform.
  pub fn solve_options(&self, platform: Option<&Platform>) -> SolveOptions {
    SolveOptions {
      cache_imports: self.cache_imports.clone(),
      no_cache: self.no_cache,
      platform: self.platforms.resolve(platform),
    }
  }
}

impl<R: BuildResolver> Clone for Branch<R> {
  fn clone(&self) -> Self {
    Self {
      resolver: Arc::clone(&self.resolver),
      cache_imports: self.cache_imports.clone(),
      no_cache: self.no_cache,
      platforms: self.platforms.clone(),
    }
  }
}

impl<R: BuildResolver> fmt::Debug for Branch<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Branch")
      .field("cache_imports", &self.cache_imports)
      .field("no_cache", &self.no_cache)
      .field("platforms", &self.platforms)
      .finish_non_exhaustive()
  }
}
