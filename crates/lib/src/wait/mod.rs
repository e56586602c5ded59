//! Wait blocks: the join point for side effects of fanned-out branches.
//!
//! While a statement is interpreted, each of its branches enqueues the side
//! effects it produces (RUN commands that must execute, images that must be
//! pushed) into the statement's [`WaitBlock`]. Once every branch is done the
//! statement calls [`WaitBlock::wait`], which resolves the queue in order
//! against the build engine. The statement is complete only when `wait`
//! returns.
//!
//! Consecutive image pushes are coalesced into a single item so per-platform
//! branches of one statement end up in one multi-platform manifest list.
//! A RUN enqueued between two pushes splits them into separate items.
//!
//! # States
//!
//! A block is `Open` while branches enqueue into it, `Draining` while `wait`
//! runs and `Done` afterwards. Work can only be enqueued while it is open,
//! and it can only be waited on once.

pub mod item;
pub mod resolver;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::image::SaveImage;
use crate::platform::PlatformError;

pub use item::{RunCommandItem, SaveImagesItem, WaitItem, WaitItemKind};
pub use resolver::{Branch, BuildResolver, ResolverError, SolveOptions};

use item::Resolved;

/// Errors from enqueueing into or draining a wait block.
#[derive(Debug, Error)]
pub enum WaitError {
  /// The block has already been waited on.
  #[error("wait block is {0} and no longer accepts work")]
  Closed(WaitState),

  /// One tag was saved both with and without `--no-manifest-list`.
  #[error("cannot save image {tag} defined multiple times, but declared as SAVE IMAGE --no-manifest-list")]
  ConflictingManifestMode { tag: String },

  /// Two images resolve to the same tag and platform.
  #[error("image {tag} is defined multiple times for the same platform ({platform_image})")]
  DuplicatePlatformImage { tag: String, platform_image: String },

  /// The platform-qualified name of an image could not be computed.
  #[error("cannot compute platform image name for {tag}: {source}")]
  Platform {
    tag: String,
    #[source]
    source: PlatformError,
  },

  /// Solving the content of an image failed.
  #[error("failed to solve image required for {tag}: {source}")]
  SolveImage {
    tag: String,
    #[source]
    source: ResolverError,
  },

  /// The image config could not be serialized.
  #[error("marshal save image config for {tag}: {source}")]
  ImageConfig {
    tag: String,
    #[source]
    source: serde_json::Error,
  },

  /// The push request was rejected by the engine.
  #[error("failed to SAVE IMAGE: {0}")]
  SaveImageFailed(#[source] ResolverError),

  /// A RUN command could not be solved or did not complete.
  #[error("failed to {stage}: {source}")]
  RunResolutionFailed {
    stage: &'static str,
    #[source]
    source: ResolverError,
  },

  /// The configured wait timeout elapsed.
  #[error("timed out after {0:?} waiting for side effects")]
  TimedOut(Duration),
}

/// Lifecycle of a wait block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
  Open,
  Draining,
  Done { failed: bool },
}

impl fmt::Display for WaitState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WaitState::Open => write!(f, "open"),
      WaitState::Draining => write!(f, "draining"),
      WaitState::Done { failed: false } => write!(f, "done"),
      WaitState::Done { failed: true } => write!(f, "failed"),
    }
  }
}

/// Configuration for draining a wait block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitConfig {
  /// Upper bound on the whole drain. `None` waits indefinitely.
  pub timeout: Option<Duration>,
}

/// Outcome of a successful [`WaitBlock::wait`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitSummary {
  /// Number of queued items resolved.
  pub items: usize,
  /// RUN commands forced to completion.
  pub commands: usize,
  /// Images pushed, across all push requests.
  pub images: usize,
}

struct Inner<R: BuildResolver> {
  state: WaitState,
  items: Vec<WaitItem<R>>,
}

/// Ordered queue of side effects shared by the branches of one statement.
pub struct WaitBlock<R: BuildResolver> {
  inner: Mutex<Inner<R>>,
}

impl<R: BuildResolver> Default for WaitBlock<R> {
  fn default() -> Self {
    Self::new()
  }
}

impl<R: BuildResolver> WaitBlock<R> {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: WaitState::Open,
        items: Vec::new(),
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Inner<R>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn lock_open(&self) -> Result<MutexGuard<'_, Inner<R>>, WaitError> {
    let inner = self.lock();
    let state = inner.state;
    if state == WaitState::Open {
      Ok(inner)
    } else {
      Err(WaitError::Closed(state))
    }
  }

  /// Queue a RUN command whose effect must complete before the statement does.
  pub fn enqueue_run(&self, state: R::State, branch: Arc<Branch<R>>) -> Result<(), WaitError> {
    let mut inner = self.lock_open()?;
    inner.items.push(WaitItem::RunCommand(RunCommandItem { state, branch }));
    Ok(())
  }

  /// Queue an image push.
  ///
  /// Joins the last queued item when that item is also an image push;
  /// otherwise starts a new push item.
  pub fn enqueue_save_image(&self, image: SaveImage<R::State>, branch: Arc<Branch<R>>) -> Result<(), WaitError> {
    let mut guard = self.lock_open()?;
    let items = &mut guard.items;
    if let Some(WaitItem::SaveImages(item)) = items.last_mut() {
      item.images.push((branch, image));
    } else {
      items.push(WaitItem::SaveImages(SaveImagesItem {
        images: vec![(branch, image)],
      }));
    }
    Ok(())
  }

  pub fn state(&self) -> WaitState {
    self.lock().state
  }

  /// Number of queued items (coalesced pushes count once).
  pub fn len(&self) -> usize {
    self.lock().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().items.is_empty()
  }

  /// Kinds of the queued items, in queue order.
  pub fn item_kinds(&self) -> Vec<WaitItemKind> {
    self.lock().items.iter().map(WaitItem::kind).collect()
  }

  /// Resolve every queued item in order.
  ///
  /// The first failure stops the drain and is returned; nothing is retried.
  /// Dropping the returned future abandons the drain and leaves the block
  /// `Draining`.
  pub async fn wait(&self, config: &WaitConfig) -> Result<WaitSummary, WaitError> {
    let items = {
      let mut inner = self.lock_open()?;
      inner.state = WaitState::Draining;
      std::mem::take(&mut inner.items)
    };

    info!(items = items.len(), "waiting for side effects");

    let result = match config.timeout {
      Some(limit) => match tokio::time::timeout(limit, drain(&items)).await {
        Ok(result) => result,
        Err(_) => Err(WaitError::TimedOut(limit)),
      },
      None => drain(&items).await,
    };

    self.lock().state = WaitState::Done {
      failed: result.is_err(),
    };

    match &result {
      Ok(summary) => info!(
        items = summary.items,
        commands = summary.commands,
        images = summary.images,
        "side effects complete"
      ),
      Err(e) => error!(error = %e, "wait block failed"),
    }

    result
  }
}

async fn drain<R: BuildResolver>(items: &[WaitItem<R>]) -> Result<WaitSummary, WaitError> {
  let mut summary = WaitSummary::default();

  for (index, item) in items.iter().enumerate() {
    debug!(item = index, kind = ?item.kind(), "resolving wait item");
    match item.resolve().await? {
      Resolved::Ran => summary.commands += 1,
      Resolved::Pushed(n) => summary.images += n,
    }
    summary.items += 1;
  }

  Ok(summary)
}
