//! HSM support for dumping DMF-managed XFS filesystems.
//!
//! Dual-residency files (data both online and in the DMF archive) are dumped
//! as if they were offline: their extent map becomes a single hole and their
//! DMF attribute is rewritten to describe an offline file. The host calls, in
//! order:
//! - [`FilesystemContext::init`] once per filesystem
//! - [`FilesystemContext::allocate_file_context`] once per dump stream
//! - per file: [`FileContext::classify`], then the estimate and projection
//!   operations

mod backend;
mod classify;
mod context;
mod error;
mod estimate;
mod project;
mod types;

#[cfg(any(test, feature = "mockall"))]
pub use backend::MockDmapiBackend;
pub use backend::{DmapiBackend, FileHandle, FsId};
pub use classify::{Classification, Disqualification};
pub use context::{FileContext, FileState, FilesystemContext, HSM_API_VERSION_1};
pub use error::{HsmError, HsmResult};
pub use project::{AttrFilter, NewAttribute};
pub use types::{
    AttrNamespace, Bstat, DM_EVENT_DESTROY, DM_EVENT_READ, DM_EVENT_TRUNCATE, DM_EVENT_WRITE,
    DMF_EV_BITS, FileKind, Getbmapx, HOLE_BLOCK, XFS_XFLAG_HASATTR, btobb,
};
