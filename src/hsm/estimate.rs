//! Size estimates for dump stream balancing.
//!
//! `None` means "no estimate, use the default heuristic". `Some(0)` is a real
//! estimate of zero bytes.

use tracing::trace;

use super::classify::quick_reject;
use super::context::{FileContext, FilesystemContext};
use super::types::Bstat;

impl FilesystemContext {
    /// Bytes needed to dump the file if all dual-residency data is dumped as
    /// holes.
    ///
    /// Only the bulk-stat record is consulted. Any file with DMF event bits is
    /// assumed to end up offline, so files in the middle of migrating make
    /// the estimate run a little low.
    pub fn estimate_file_space(&self, stat: &Bstat) -> Option<i64> {
        match quick_reject(stat) {
            Some(reason) => {
                trace!(ino = stat.ino, %reason, "no HSM space estimate");
                None
            }
            None => Some(0),
        }
    }

    /// Offset within the file preceded by `byte_count` bytes of dumped data.
    ///
    /// A candidate is dumped as one hole, so every byte count maps to the end
    /// of the file.
    pub fn estimate_file_offset(&self, stat: &Bstat, byte_count: i64) -> Option<i64> {
        let mut scratch = FileContext::new(self);
        if scratch.classify(stat).is_candidate() {
            trace!(ino = stat.ino, byte_count, offset = stat.size, "HSM offset estimate");
            Some(stat.size)
        } else {
            None
        }
    }
}
