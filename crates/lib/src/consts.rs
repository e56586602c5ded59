//! Shared constants, mostly the metadata keys understood by the build engine's
//! image exporter.

pub const APP_NAME: &str = "fanout";

/// Prefix of the per-image reference keys in a push request (`image-0`, ...).
pub const IMAGE_REF_KEY_PREFIX: &str = "image-";

/// Prefix of every metadata key belonging to one reference (`ref/image-0/...`).
pub const META_REF_PREFIX: &str = "ref/";

pub const META_IMAGE_NAME: &str = "image.name";
pub const META_EXPORT_PUSH: &str = "export-image-push";
pub const META_INSECURE_PUSH: &str = "insecure-push";
pub const META_IMAGE_CONFIG: &str = "containerimage.config";
pub const META_PLATFORM: &str = "platform";

pub const META_TRUE: &[u8] = b"true";

/// Path read back from a solved RUN reference to force the command to run.
pub const RUN_FORCE_READ_PATH: &str = "/";

/// Environment variable overriding the fan-out parallelism.
pub const ENV_PARALLELISM: &str = "FANOUT_PARALLELISM";

/// Environment variable bounding a wait block drain, in seconds.
pub const ENV_WAIT_TIMEOUT_SECS: &str = "FANOUT_WAIT_TIMEOUT_SECS";
