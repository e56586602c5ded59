//! Wait block behavior against an engine double.

use std::sync::Arc;

use fanout_lib::image::SaveImage;
use fanout_lib::platform::{Platform, PlatformResolver};
use fanout_lib::wait::{Branch, WaitBlock, WaitConfig, WaitError, WaitItemKind, WaitState};

use super::common::{RecordingEngine, broken, meta, step};

fn platform(s: &str) -> Platform {
  s.parse().unwrap()
}

fn branch(engine: &Arc<RecordingEngine>) -> Arc<Branch<RecordingEngine>> {
  Arc::new(Branch::new(engine.clone()).with_platforms(PlatformResolver::new(platform("linux/amd64"))))
}

#[tokio::test]
async fn run_commands_are_solved_then_read() {
  let engine = Arc::new(RecordingEngine::default());
  let block = WaitBlock::new();

  block.enqueue_run(step("migrate"), branch(&engine)).unwrap();
  block.enqueue_run(step("seed"), branch(&engine)).unwrap();

  let summary = block.wait(&WaitConfig::default()).await.unwrap();

  assert_eq!(summary.commands, 2);
  assert_eq!(
    engine.log(),
    vec![
      "solve migrate linux/amd64",
      "read #0 /",
      "solve seed linux/amd64",
      "read #1 /",
    ]
  );
}

#[tokio::test]
async fn run_splits_image_pushes() {
  let engine = Arc::new(RecordingEngine::default());
  let block = WaitBlock::new();
  let b = branch(&engine);

  block.enqueue_save_image(SaveImage::new(step("a"), "reg/a:1"), b.clone()).unwrap();
  block.enqueue_save_image(SaveImage::new(step("b"), "reg/b:1"), b.clone()).unwrap();
  block.enqueue_run(step("smoke"), b.clone()).unwrap();
  block.enqueue_save_image(SaveImage::new(step("c"), "reg/c:1"), b.clone()).unwrap();

  assert_eq!(
    block.item_kinds(),
    vec![
      WaitItemKind::SaveImages(2),
      WaitItemKind::RunCommand,
      WaitItemKind::SaveImages(1),
    ]
  );

  let summary = block.wait(&WaitConfig::default()).await.unwrap();
  assert_eq!(summary.items, 3);
  assert_eq!(summary.images, 3);

  let pushes: Vec<String> = engine.log().into_iter().filter(|l| l.starts_with("push")).collect();
  assert_eq!(pushes, vec!["push image-0,image-1", "push image-0"]);
}

#[tokio::test]
async fn manifest_list_images_carry_platform() {
  let engine = Arc::new(RecordingEngine::default());
  let block = WaitBlock::new();
  let b = branch(&engine);

  block
    .enqueue_save_image(
      SaveImage::new(step("amd"), "reg/app:1").with_platform(platform("linux/amd64")),
      b.clone(),
    )
    .unwrap();
  block
    .enqueue_save_image(
      SaveImage::new(step("arm"), "reg/app:1").with_platform(platform("linux/arm64")),
      b.clone(),
    )
    .unwrap();
  block
    .enqueue_save_image(
      SaveImage::new(step("tool"), "reg/tool:1").no_manifest_list().insecure(),
      b.clone(),
    )
    .unwrap();

  block.wait(&WaitConfig::default()).await.unwrap();

  let pushed = engine.pushed();
  assert_eq!(pushed.len(), 1);
  let (refs, metadata) = &pushed[0];
  assert_eq!(refs.len(), 3);

  assert_eq!(meta(metadata, "ref/image-0/image.name"), Some("reg/app:1"));
  assert_eq!(meta(metadata, "ref/image-0/platform"), Some("linux/amd64"));
  assert_eq!(meta(metadata, "ref/image-1/platform"), Some("linux/arm64"));
  assert_eq!(meta(metadata, "ref/image-1/export-image-push"), Some("true"));
  assert!(meta(metadata, "ref/image-1/insecure-push").is_none());

  assert_eq!(meta(metadata, "ref/image-2/image.name"), Some("reg/tool:1"));
  assert_eq!(meta(metadata, "ref/image-2/insecure-push"), Some("true"));
  assert!(meta(metadata, "ref/image-2/platform").is_none());
  assert!(metadata.contains_key("ref/image-2/containerimage.config"));
}

#[tokio::test]
async fn conflicting_manifest_mode_fails_before_engine_calls() {
  let engine = Arc::new(RecordingEngine::default());
  let block = WaitBlock::new();
  let b = branch(&engine);

  block
    .enqueue_save_image(
      SaveImage::new(step("amd"), "reg/app:1").with_platform(platform("linux/amd64")),
      b.clone(),
    )
    .unwrap();
  block
    .enqueue_save_image(
      SaveImage::new(step("arm"), "reg/app:1")
        .with_platform(platform("linux/arm64"))
        .no_manifest_list(),
      b.clone(),
    )
    .unwrap();

  let err = block.wait(&WaitConfig::default()).await.unwrap_err();

  assert!(matches!(err, WaitError::ConflictingManifestMode { ref tag } if tag == "reg/app:1"));
  assert!(engine.log().is_empty());
  assert_eq!(block.state(), WaitState::Done { failed: true });
}

#[tokio::test]
async fn duplicate_platform_image_is_rejected() {
  let engine = Arc::new(RecordingEngine::default());
  let block = WaitBlock::new();
  let b = branch(&engine);

  block.enqueue_save_image(SaveImage::new(step("one"), "reg/app:1"), b.clone()).unwrap();
  block.enqueue_save_image(SaveImage::new(step("two"), "reg/app:1"), b.clone()).unwrap();

  let err = block.wait(&WaitConfig::default()).await.unwrap_err();

  match err {
    WaitError::DuplicatePlatformImage { tag, platform_image } => {
      assert_eq!(tag, "reg/app:1");
      assert_eq!(platform_image, "reg/app:1_linux_amd64");
    }
    other => panic!("unexpected error: {other:?}"),
  }
  assert!(engine.log().is_empty());
}

#[tokio::test]
async fn first_failure_stops_the_drain() {
  let engine = Arc::new(RecordingEngine::default());
  let block = WaitBlock::new();
  let b = branch(&engine);

  block.enqueue_run(step("ok"), b.clone()).unwrap();
  block.enqueue_run(broken("bad"), b.clone()).unwrap();
  block.enqueue_run(step("never"), b.clone()).unwrap();

  let err = block.wait(&WaitConfig::default()).await.unwrap_err();

  assert!(matches!(err, WaitError::RunResolutionFailed { .. }));
  assert_eq!(err.to_string(), "failed to solve RUN state: bad does not build");
  assert!(!engine.log().iter().any(|l| l.contains("never")));
}

#[tokio::test]
async fn waited_block_rejects_new_work() {
  let engine = Arc::new(RecordingEngine::default());
  let block = WaitBlock::new();

  block.wait(&WaitConfig::default()).await.unwrap();

  assert!(matches!(
    block.enqueue_run(step("late"), branch(&engine)),
    Err(WaitError::Closed(WaitState::Done { failed: false }))
  ));
  assert!(matches!(
    block.wait(&WaitConfig::default()).await,
    Err(WaitError::Closed(_))
  ));
}
