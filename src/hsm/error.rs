use std::path::PathBuf;

use thiserror::Error;

pub type HsmResult<T> = Result<T, HsmError>;

/// Failures that must stop the host from dumping a filesystem or a file's
/// attributes. Files that merely do not qualify for offline treatment are not
/// errors; see [`crate::hsm::Classification`].
#[derive(Error, Debug)]
pub enum HsmError {
    #[error("Unsupported HSM API version: {requested} (supported: {supported})")]
    UnsupportedApiVersion { requested: u32, supported: u32 },

    #[error("Cannot resolve {} to a filesystem id: {source}", .mount_point.display())]
    MountResolution {
        mount_point: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Corrupt attribute {name}: {size} bytes (min {minimum})")]
    CorruptAttribute { name: String, size: u32, minimum: usize },

    #[error("Extent map too short: {0} slots (min 2)")]
    ExtentMapTooShort(usize),
}
