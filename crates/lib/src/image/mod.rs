//! Image descriptors handed to the wait block by `SAVE IMAGE --push`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::platform::Platform;

/// Runtime configuration of an image, serialized into the push metadata.
///
/// Field names follow the OCI image config so the engine can use the JSON
/// as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub architecture: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub os: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub variant: Option<String>,

  #[serde(default)]
  pub config: ContainerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub entrypoint: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cmd: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub working_dir: Option<String>,

  /// Keys are `port/proto`, e.g. `8080/tcp`.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub exposed_ports: BTreeMap<String, Empty>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,
}

/// Serializes as `{}`; OCI uses it as the value of set-like maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

impl ImageConfig {
  /// An empty config stamped with `platform`.
  pub fn for_platform(platform: &Platform) -> Self {
    Self {
      architecture: Some(platform.arch.to_string()),
      os: Some(platform.os.to_string()),
      variant: platform.variant.clone(),
      config: ContainerConfig::default(),
    }
  }

  pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(self)
  }

  pub fn expose(&mut self, port: u16, proto: &str) {
    self.config.exposed_ports.insert(format!("{port}/{proto}"), Empty {});
  }

  /// Digest of the serialized config.
  pub fn digest(&self) -> Result<String, serde_json::Error> {
    self.to_json().map(|bytes| config_digest(&bytes))
  }
}

/// `sha256:<hex>` digest of serialized config bytes.
pub fn config_digest(bytes: &[u8]) -> String {
  format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// One `SAVE IMAGE --push` request produced by a build branch.
///
/// `S` is the resolver's graph-state type: the unmaterialized image content.
#[derive(Debug, Clone)]
pub struct SaveImage<S> {
  pub state: S,

  /// Image name and tag to push to. May be empty for images that are only
  /// exported locally by other means.
  pub tag: String,

  /// Requested platform; the branch's native platform when `None`.
  pub platform: Option<Platform>,

  pub config: ImageConfig,

  /// Push this tag as a plain image instead of joining a manifest list.
  pub no_manifest_list: bool,

  /// Allow pushing to an insecure (plain HTTP or self-signed) registry.
  pub insecure_push: bool,

  /// Reject a second image for the same tag and platform.
  pub check_duplicate: bool,
}

impl<S> SaveImage<S> {
  /// A manifest-list push of `state` under `tag`, with duplicate checking on.
  pub fn new(state: S, tag: impl Into<String>) -> Self {
    Self {
      state,
      tag: tag.into(),
      platform: None,
      config: ImageConfig::default(),
      no_manifest_list: false,
      insecure_push: false,
      check_duplicate: true,
    }
  }

  pub fn with_platform(mut self, platform: Platform) -> Self {
    self.platform = Some(platform);
    self
  }

  pub fn with_config(mut self, config: ImageConfig) -> Self {
    self.config = config;
    self
  }

  pub fn no_manifest_list(mut self) -> Self {
    self.no_manifest_list = true;
    self
  }

  pub fn insecure(mut self) -> Self {
    self.insecure_push = true;
    self
  }

  pub fn allow_duplicates(mut self) -> Self {
    self.check_duplicate = false;
    self
  }
}
