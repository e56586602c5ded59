//! End-to-end fan-out: invocation text to pushed images.

use std::io;
use std::sync::Arc;

use fanout_lib::args::{expand, expand_invocation, rejoin};
use fanout_lib::execute::{ExecuteConfig, ExecuteError, fan_out};
use fanout_lib::image::{ImageConfig, SaveImage};
use fanout_lib::platform::{Platform, PlatformResolver};
use fanout_lib::wait::{Branch, WaitBlock, WaitError, WaitState};

use super::common::{RecordingEngine, broken, meta, step};

fn config() -> ExecuteConfig {
  ExecuteConfig {
    parallelism: 2,
    ..Default::default()
  }
}

#[tokio::test]
async fn invocation_fans_out_to_one_push() {
  let (invocation, matrix) = expand_invocation("(+image --VERSION=1 --VERSION=2 --ARCH=amd64 --ARCH=arm64)").unwrap();
  assert_eq!(invocation.target, "+image");
  assert_eq!(matrix.len(), 4);

  let engine = Arc::new(RecordingEngine::default());
  let wait_block = Arc::new(WaitBlock::<RecordingEngine>::new());

  let e = engine.clone();
  let result = fan_out(&matrix, wait_block.clone(), &config(), move |_, combo, wait| {
    let branch = Arc::new(
      Branch::new(e.clone()).with_platforms(PlatformResolver::new("linux/amd64".parse::<Platform>().unwrap())),
    );
    async move {
      let version = combo.get("--VERSION").unwrap_or_default();
      let arch = combo.get("--ARCH").unwrap_or_default();
      let platform: Platform = format!("linux/{arch}").parse().unwrap();
      let image = SaveImage::new(step(&format!("build {version} {arch}")), format!("reg/app:{version}"))
        .with_config(ImageConfig::for_platform(&platform))
        .with_platform(platform);
      wait.enqueue_save_image(image, branch)
    }
  })
  .await
  .unwrap();

  assert_eq!(result.branches, 4);
  assert_eq!(result.items, 1);
  assert_eq!(result.images, 4);
  assert_eq!(wait_block.state(), WaitState::Done { failed: false });

  let pushed = engine.pushed();
  assert_eq!(pushed.len(), 1);
  let (refs, metadata) = &pushed[0];
  assert_eq!(refs.len(), 4);

  let mut named: Vec<(String, String)> = (0..4)
    .map(|i| {
      (
        meta(metadata, &format!("ref/image-{i}/image.name")).unwrap().to_string(),
        meta(metadata, &format!("ref/image-{i}/platform")).unwrap().to_string(),
      )
    })
    .collect();
  named.sort();
  assert_eq!(
    named,
    vec![
      ("reg/app:1".to_string(), "linux/amd64".to_string()),
      ("reg/app:1".to_string(), "linux/arm64".to_string()),
      ("reg/app:2".to_string(), "linux/amd64".to_string()),
      ("reg/app:2".to_string(), "linux/arm64".to_string()),
    ]
  );
}

#[test]
fn nested_parens_stay_one_argument() {
  let (invocation, matrix) = expand_invocation("(+test --CMD=$(echo hi) --CMD=true)").unwrap();

  assert_eq!(invocation.args, vec!["--CMD=$(echo hi)", "--CMD=true"]);
  assert_eq!(matrix.to_tokens(), vec![vec!["--CMD=$(echo hi)"], vec!["--CMD=true"]]);
}

#[test]
fn shell_split_tokens_are_rejoined_before_expansion() {
  let tokens = rejoin(&["--CMD=$(echo", "hi)", "--CMD=true"]);
  let matrix = expand(&tokens).unwrap();

  assert_eq!(matrix.to_tokens(), vec![vec!["--CMD=$(echo hi)"], vec!["--CMD=true"]]);
}

#[tokio::test]
async fn failing_branch_leaves_side_effects_unresolved() {
  let (_, matrix) = expand_invocation("(+deploy --ENV=staging --ENV=prod)").unwrap();
  let engine = Arc::new(RecordingEngine::default());
  let wait_block = Arc::new(WaitBlock::<RecordingEngine>::new());

  let e = engine.clone();
  let err = fan_out(&matrix, wait_block.clone(), &config(), move |_, combo, wait| {
    let branch = Arc::new(Branch::new(e.clone()));
    async move {
      let env = combo.get("--ENV").unwrap_or_default().to_string();
      wait
        .enqueue_run(step(&format!("deploy {env}")), branch)
        .map_err(io::Error::other)?;
      if env == "prod" {
        return Err(io::Error::other("prod is frozen"));
      }
      Ok::<(), io::Error>(())
    }
  })
  .await
  .unwrap_err();

  assert!(matches!(err, ExecuteError::Branch { index: 1, .. }));
  assert!(engine.log().is_empty());
  assert_eq!(wait_block.len(), 2);
}

#[tokio::test]
async fn side_effect_failure_surfaces_as_wait_error() {
  let (_, matrix) = expand_invocation("(+build --N=1 --N=2)").unwrap();
  let engine = Arc::new(RecordingEngine::default());

  let e = engine.clone();
  let err = fan_out(
    &matrix,
    Arc::new(WaitBlock::<RecordingEngine>::new()),
    &config(),
    move |index, _, wait| {
      let branch = Arc::new(Branch::new(e.clone()));
      async move {
        let state = if index == 1 { broken("n2") } else { step("n1") };
        wait.enqueue_run(state, branch)
      }
    },
  )
  .await
  .unwrap_err();

  assert!(matches!(
    err,
    ExecuteError::Wait(WaitError::RunResolutionFailed { .. })
  ));
}
