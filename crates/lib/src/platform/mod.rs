//! Target platforms for image builds.
//!
//! Platforms are written `os/arch[/variant]` (e.g. `linux/amd64`,
//! `linux/arm/v7`), the same form used in image indexes. Each build branch
//! carries a [`PlatformResolver`] that fills in the native platform when an
//! image does not name one.

pub mod arch;
pub mod os;

use std::fmt;
use std::str::FromStr;

pub use arch::Arch;
pub use os::Os;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
  #[error("invalid platform '{0}': expected os/arch[/variant]")]
  Invalid(String),

  #[error("unknown operating system '{0}'")]
  UnknownOs(String),

  #[error("unknown architecture '{0}'")]
  UnknownArch(String),

  #[error("invalid image name '{0}'")]
  InvalidImageName(String),

  #[error("image '{0}' is pinned by digest and cannot carry a platform tag")]
  DigestReference(String),
}

/// Platform identifier combining OS, architecture and optional variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
  pub variant: Option<String>,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch, variant: None }
  }

  pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
    self.variant = Some(variant.into());
    self
  }

  /// Detect the platform of the running host, as a Linux image platform.
  ///
  /// Images are built for Linux regardless of the host OS, so only the
  /// architecture is taken from the host. Returns `None` on unsupported
  /// architectures.
  pub fn native() -> Option<Self> {
    Some(Self::new(Os::Linux, Arch::current()?))
  }

  /// The platform with `/` replaced by `_`, suitable for use inside a tag
  pub fn tag_suffix(&self) -> String {
    self.to_string().replace('/', "_")
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)?;
    if let Some(variant) = &self.variant {
      write!(f, "/{}", variant)?;
    }
    Ok(())
  }
}

impl FromStr for Platform {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    let (os, arch, variant) = match parts.as_slice() {
      [os, arch] => (*os, *arch, None),
      [os, arch, variant] if !variant.is_empty() => (*os, *arch, Some(variant.to_string())),
      _ => return Err(PlatformError::Invalid(s.to_string())),
    };

    Ok(Self {
      os: Os::parse(os).ok_or_else(|| PlatformError::UnknownOs(os.to_string()))?,
      arch: Arch::parse(arch).ok_or_else(|| PlatformError::UnknownArch(arch.to_string()))?,
      variant,
    })
  }
}

impl TryFrom<String> for Platform {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Platform> for String {
  fn from(p: Platform) -> Self {
    p.to_string()
  }
}

/// Resolves the effective platform for images built in one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformResolver {
  native: Platform,
}

impl PlatformResolver {
  pub fn new(native: Platform) -> Self {
    Self { native }
  }

  /// Resolver for the running host, falling back to `linux/amd64` on
  /// architectures we do not know about.
  pub fn host() -> Self {
    Self::new(Platform::native().unwrap_or_else(|| Platform::new(Os::Linux, Arch::Amd64)))
  }

  pub fn native(&self) -> &Platform {
    &self.native
  }

  /// The requested platform, or the native one when none was requested.
  pub fn resolve(&self, requested: Option<&Platform>) -> Platform {
    requested.cloned().unwrap_or_else(|| self.native.clone())
  }

  /// The platform-qualified name for `image` built for `requested`.
  pub fn image_name(&self, image: &str, requested: Option<&Platform>) -> Result<String, PlatformError> {
    platform_image_name(image, &self.resolve(requested))
  }
}

impl Default for PlatformResolver {
  fn default() -> Self {
    Self::host()
  }
}

/// Qualify an image name with a platform-specific tag.
///
/// `registry:5000/app:1.0` built for `linux/arm64` becomes
/// `registry:5000/app:1.0_linux_arm64`. A missing tag defaults to `latest`.
pub fn platform_image_name(image: &str, platform: &Platform) -> Result<String, PlatformError> {
  if image.contains('@') {
    return Err(PlatformError::DigestReference(image.to_string()));
  }

  // Only a ':' in the last path segment separates the tag; earlier ones are
  // registry ports.
  let segment_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
  let (name, tag) = match image[segment_start..].rfind(':') {
    Some(i) => (&image[..segment_start + i], &image[segment_start + i + 1..]),
    None => (image, "latest"),
  };

  if name.is_empty() || name.ends_with('/') || tag.is_empty() {
    return Err(PlatformError::InvalidImageName(image.to_string()));
  }

  Ok(format!("{}:{}_{}", name, tag, platform.tag_suffix()))
}
