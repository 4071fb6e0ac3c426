//! [`DmapiBackend`](crate::hsm::DmapiBackend) for XFS on Linux, built on the
//! XFS handle ioctls.

mod backend;
mod ioctl;

pub use backend::XfsBackend;
