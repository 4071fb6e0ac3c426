//! Filesystem and per-file HSM contexts.
//!
//! A [`FilesystemContext`] is built once per dumped filesystem and shared by
//! every dump stream. Each stream owns one [`FileContext`] which it reuses for
//! every file it dumps.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::backend::{DmapiBackend, FsId};
use super::classify::Disqualification;
use super::error::{HsmError, HsmResult};
use crate::attr::{AttrBuffer, AttributeView};

/// The only HSM API version this library speaks.
pub const HSM_API_VERSION_1: u32 = 1;

/// Read-only filesystem state. Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct FilesystemContext {
    api_version: u32,
    fsid: FsId,
    backend: Arc<dyn DmapiBackend>,
}

impl FilesystemContext {
    /// Initialize a context for the filesystem mounted at `mount_point`.
    ///
    /// Fails if the host was built against another API version or if the
    /// mount point does not resolve to a filesystem id, in which case the
    /// filesystem must not be dumped with HSM support.
    pub fn init(
        mount_point: impl AsRef<Path>,
        api_version: u32,
        backend: Arc<dyn DmapiBackend>,
    ) -> HsmResult<Self> {
        let mount_point = mount_point.as_ref();

        if api_version != HSM_API_VERSION_1 {
            return Err(HsmError::UnsupportedApiVersion {
                requested: api_version,
                supported: HSM_API_VERSION_1,
            });
        }

        let fsid = backend.path_to_fsid(mount_point).map_err(|source| {
            HsmError::MountResolution { mount_point: mount_point.to_path_buf(), source }
        })?;

        info!(mount_point = %mount_point.display(), fsid = ?fsid, "HSM filesystem context ready");

        Ok(Self { api_version, fsid, backend })
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn fsid(&self) -> &FsId {
        &self.fsid
    }

    pub fn backend(&self) -> &dyn DmapiBackend {
        self.backend.as_ref()
    }

    /// Allocate a file context for one dump stream.
    pub fn allocate_file_context(&self) -> FileContext {
        FileContext::new(self)
    }
}

impl std::fmt::Debug for FilesystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemContext")
            .field("api_version", &self.api_version)
            .field("fsid", &self.fsid)
            .finish_non_exhaustive()
    }
}

/// Where a file context stands for the file it last classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Unclassified,
    Rejected(Disqualification),
    /// The file will be dumped as if fully offline.
    Candidate { file_size: i64, view: AttributeView },
}

/// Mutable per-stream state, reinitialized by every `classify` call.
#[derive(Debug)]
pub struct FileContext {
    pub(super) fs: FilesystemContext,
    pub(super) state: FileState,
    pub(super) attr: AttrBuffer,
}

impl FileContext {
    pub fn new(fs: &FilesystemContext) -> Self {
        debug!(fsid = ?fs.fsid, "allocated HSM file context");
        Self { fs: fs.clone(), state: FileState::Unclassified, attr: AttrBuffer::new() }
    }

    pub fn filesystem(&self) -> &FilesystemContext {
        &self.fs
    }

    pub fn state(&self) -> &FileState {
        &self.state
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self.state, FileState::Candidate { .. })
    }

    /// Logical size cached for a candidate.
    pub fn file_size(&self) -> Option<i64> {
        match self.state {
            FileState::Candidate { file_size, .. } => Some(file_size),
            _ => None,
        }
    }

    /// Raw bytes of the most recently fetched attribute.
    pub fn raw_attr(&self) -> &[u8] {
        self.attr.as_bytes()
    }

    pub(super) fn candidate_view(&self) -> Option<(i64, &AttributeView)> {
        match &self.state {
            FileState::Candidate { file_size, view } => Some((*file_size, view)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hsm::backend::MockDmapiBackend;

    const FSID: FsId = FsId([1, 2, 3, 4, 5, 6, 7, 8]);

    fn resolving_backend() -> MockDmapiBackend {
        let mut backend = MockDmapiBackend::new();
        backend
            .expect_path_to_fsid()
            .withf(|path| path.to_str() == Some("/mnt/dmf"))
            .returning(|_| Ok(FSID));
        backend
    }

    #[test]
    fn test_init_resolves_fsid() {
        let ctx =
            FilesystemContext::init("/mnt/dmf", HSM_API_VERSION_1, Arc::new(resolving_backend()))
                .unwrap();
        assert_eq!(ctx.fsid(), &FSID);
        assert_eq!(ctx.api_version(), HSM_API_VERSION_1);
    }

    #[test]
    fn test_init_rejects_other_api_version() {
        let mut backend = MockDmapiBackend::new();
        backend.expect_path_to_fsid().never();

        let err = FilesystemContext::init("/mnt/dmf", 2, Arc::new(backend)).unwrap_err();
        assert!(matches!(err, HsmError::UnsupportedApiVersion { requested: 2, supported: 1 }));
    }

    #[test]
    fn test_init_resolution_failure() {
        let mut backend = MockDmapiBackend::new();
        backend
            .expect_path_to_fsid()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("not mounted")));

        let err =
            FilesystemContext::init("/nowhere", HSM_API_VERSION_1, Arc::new(backend)).unwrap_err();
        match err {
            HsmError::MountResolution { mount_point, .. } => {
                assert_eq!(mount_point, Path::new("/nowhere"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_allocate_file_context_starts_unclassified() {
        let fs =
            FilesystemContext::init("/mnt/dmf", HSM_API_VERSION_1, Arc::new(resolving_backend()))
                .unwrap();
        let file = fs.allocate_file_context();
        assert_eq!(file.state(), &FileState::Unclassified);
        assert!(!file.is_candidate());
        assert_eq!(file.file_size(), None);
        assert!(file.raw_attr().is_empty());
        assert_eq!(file.filesystem().fsid(), &FSID);
    }

    #[test]
    fn test_filesystem_context_debug_hides_backend() {
        let fs =
            FilesystemContext::init("/mnt/dmf", HSM_API_VERSION_1, Arc::new(resolving_backend()))
                .unwrap();
        let debug = format!("{:?}", fs);
        assert!(debug.contains("api_version: 1"));
        assert!(!debug.contains("backend"));
    }
}
