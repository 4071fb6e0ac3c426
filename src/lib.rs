//! HSM support for backing up DMF-managed XFS filesystems.
//!
//! Files whose data lives both online and in the DMF archive are presented to
//! the dump as if they were offline, so the archive copy is not duplicated in
//! the backup.

pub mod attr;
pub mod config;
pub mod hsm;
#[cfg(target_os = "linux")]
pub mod xfs;
