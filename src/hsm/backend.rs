use std::path::Path;

use anyhow::Result;
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use super::types::AttrNamespace;

/// Filesystem identifier a mount point resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct FsId(pub [u8; 8]);

/// Opaque handle naming one inode on a filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle(pub Vec<u8>);

/// Filesystem services the HSM layer consumes.
///
/// Implementations must be shareable: one backend serves every dump stream
/// of a filesystem.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait DmapiBackend: Send + Sync {
    /// Resolve a mount point to the id of the filesystem mounted there.
    fn path_to_fsid(&self, mount_point: &Path) -> Result<FsId>;

    /// Build a handle for inode `ino` of generation `generation`.
    fn make_handle(&self, fsid: &FsId, ino: u64, generation: u32) -> Result<FileHandle>;

    /// Read attribute `name` of the file behind `handle` into `value`.
    ///
    /// Returns the attribute's length. A missing attribute is an error.
    fn get_attr(
        &self,
        handle: &FileHandle,
        name: &str,
        namespace: AttrNamespace,
        value: &mut [u8],
    ) -> Result<usize>;
}
