//! Queued side effects and how each one is resolved.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::consts::{
  IMAGE_REF_KEY_PREFIX, META_EXPORT_PUSH, META_IMAGE_CONFIG, META_IMAGE_NAME, META_INSECURE_PUSH, META_PLATFORM,
  META_REF_PREFIX, META_TRUE, RUN_FORCE_READ_PATH,
};
use crate::image::{SaveImage, config_digest};

use super::WaitError;
use super::resolver::{Branch, BuildResolver};

/// Kind of a queued item, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitItemKind {
  RunCommand,
  /// A coalesced push of this many images.
  SaveImages(usize),
}

/// A side effect waiting to be resolved against the build engine.
pub enum WaitItem<R: BuildResolver> {
  RunCommand(RunCommandItem<R>),
  SaveImages(SaveImagesItem<R>),
}

/// A `RUN` whose effect must happen before the statement completes.
pub struct RunCommandItem<R: BuildResolver> {
  pub(crate) state: R::State,
  pub(crate) branch: Arc<Branch<R>>,
}

/// Consecutive `SAVE IMAGE --push` requests, pushed together.
pub struct SaveImagesItem<R: BuildResolver> {
  pub(crate) images: Vec<(Arc<Branch<R>>, SaveImage<R::State>)>,
}

/// What resolving one item did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolved {
  Ran,
  Pushed(usize),
}

impl<R: BuildResolver> WaitItem<R> {
  pub fn kind(&self) -> WaitItemKind {
    match self {
      WaitItem::RunCommand(_) => WaitItemKind::RunCommand,
      WaitItem::SaveImages(item) => WaitItemKind::SaveImages(item.images.len()),
    }
  }

  pub(crate) async fn resolve(&self) -> Result<Resolved, WaitError> {
    match self {
      WaitItem::RunCommand(item) => item.resolve().await.map(|_| Resolved::Ran),
      WaitItem::SaveImages(item) => item.resolve().await.map(Resolved::Pushed),
    }
  }
}

impl<R: BuildResolver> RunCommandItem<R> {
  async fn resolve(&self) -> Result<(), WaitError> {
    let resolver = self.branch.resolver();
    let opts = self.branch.solve_options(None);

    let reference = resolver
      .solve(&self.state, &opts)
      .await
      .map_err(|source| WaitError::RunResolutionFailed {
        stage: "solve RUN state",
        source,
      })?;

    // Solving only produces the reference; reading from it is what makes the
    // engine actually execute the command.
    resolver
      .read_all(&reference, RUN_FORCE_READ_PATH)
      .await
      .map_err(|source| WaitError::RunResolutionFailed {
        stage: "wait for RUN command to complete",
        source,
      })?;

    debug!(reference = ?reference, "RUN command completed");
    Ok(())
  }
}

impl<R: BuildResolver> SaveImagesItem<R> {
  /// Tags pushed as part of a manifest list, after checking that no tag is
  /// requested both with and without one.
  fn manifest_list_tags(&self) -> Result<HashSet<&str>, WaitError> {
    let mut multi_platform = HashSet::new();
    let mut no_manifest_list = HashSet::new();

    for (_, image) in &self.images {
      let tag = image.tag.as_str();
      if image.no_manifest_list {
        no_manifest_list.insert(tag);
      } else {
        multi_platform.insert(tag);
      }
      if multi_platform.contains(tag) && no_manifest_list.contains(tag) {
        return Err(WaitError::ConflictingManifestMode { tag: tag.to_string() });
      }
    }

    Ok(multi_platform)
  }

  /// Reject two manifest-list images that resolve to the same tag and
  /// platform. Single-manifest tags are not checked.
  fn check_duplicates(&self, multi_platform: &HashSet<&str>) -> Result<(), WaitError> {
    let mut seen: HashSet<(&str, String)> = HashSet::new();

    for (branch, image) in &self.images {
      if !image.check_duplicate || image.tag.is_empty() || !multi_platform.contains(image.tag.as_str()) {
        continue;
      }
      let platform_image = branch
        .platforms()
        .image_name(&image.tag, image.platform.as_ref())
        .map_err(|source| WaitError::Platform {
          tag: image.tag.clone(),
          source,
        })?;
      if !seen.insert((image.tag.as_str(), platform_image.clone())) {
        return Err(WaitError::DuplicatePlatformImage {
          tag: image.tag.clone(),
          platform_image,
        });
      }
    }

    Ok(())
  }

  /// Solve every image and push them all in one request.
  ///
  /// Both validations run before the first engine call, so a rejected item
  /// never solves or pushes anything.
  async fn resolve(&self) -> Result<usize, WaitError> {
    let Some((first_branch, _)) = self.images.first() else {
      return Ok(0);
    };

    let multi_platform = self.manifest_list_tags()?;
    self.check_duplicates(&multi_platform)?;

    let mut refs = BTreeMap::new();
    let mut metadata = BTreeMap::new();

    for (index, (branch, image)) in self.images.iter().enumerate() {
      let opts = branch.solve_options(image.platform.as_ref());
      let reference = branch
        .resolver()
        .solve(&image.state, &opts)
        .await
        .map_err(|source| WaitError::SolveImage {
          tag: image.tag.clone(),
          source,
        })?;

      let config = image.config.to_json().map_err(|source| WaitError::ImageConfig {
        tag: image.tag.clone(),
        source,
      })?;

      let ref_key = format!("{IMAGE_REF_KEY_PREFIX}{index}");
      let prefix = format!("{META_REF_PREFIX}{ref_key}");

      debug!(
        key = %ref_key,
        tag = %image.tag,
        platform = %opts.platform,
        config_digest = %config_digest(&config),
        "solved image"
      );

      metadata.insert(format!("{prefix}/{META_IMAGE_NAME}"), image.tag.as_bytes().to_vec());
      metadata.insert(format!("{prefix}/{META_EXPORT_PUSH}"), META_TRUE.to_vec());
      if image.insecure_push {
        metadata.insert(format!("{prefix}/{META_INSECURE_PUSH}"), META_TRUE.to_vec());
      }
      metadata.insert(format!("{prefix}/{META_IMAGE_CONFIG}"), config);
      if multi_platform.contains(image.tag.as_str()) {
        metadata.insert(
          format!("{prefix}/{META_PLATFORM}"),
          opts.platform.to_string().into_bytes(),
        );
      }

      refs.insert(ref_key, reference);
    }

    let count = refs.len();
    info!(images = count, "pushing images");

    // Every branch talks to the same engine, so any branch's resolver will do.
    first_branch
      .resolver()
      .push_images(refs, metadata)
      .await
      .map_err(WaitError::SaveImageFailed)?;

    Ok(count)
  }
}
