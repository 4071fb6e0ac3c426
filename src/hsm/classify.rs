//! Deciding whether a file can be dumped as if it were offline.

use tracing::{debug, trace};

use super::context::{FileContext, FileState};
use super::types::{AttrNamespace, Bstat, FileKind};
use crate::attr::{AttributeView, DMF_ATTR_NAME, DmfState, FORMAT0_LEN, FSYS_TYPE_XFS, LayoutError};

/// Why a file is dumped normally instead of as offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disqualification {
    NotRegularFile,
    NoAttributeFork,
    NoDmfEvents,
    HandleUnavailable,
    AttributeUnavailable,
    AttributeTooLarge(usize),
    ForeignFilesystem(u8),
    Layout(LayoutError),
    StateNotProjectable(u16),
}

impl std::fmt::Display for Disqualification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disqualification::NotRegularFile => write!(f, "not a regular file"),
            Disqualification::NoAttributeFork => write!(f, "no attribute fork"),
            Disqualification::NoDmfEvents => write!(f, "no DMF event bits set"),
            Disqualification::HandleUnavailable => write!(f, "cannot build file handle"),
            Disqualification::AttributeUnavailable => write!(f, "no DMF attribute"),
            Disqualification::AttributeTooLarge(len) => {
                write!(f, "attribute of {} bytes does not fit", len)
            }
            Disqualification::ForeignFilesystem(fsys) => {
                write!(f, "unsupported filesystem type {}", fsys)
            }
            Disqualification::Layout(err) => write!(f, "{}", err),
            Disqualification::StateNotProjectable(state) => {
                write!(f, "DMF state {} cannot be dumped offline", state)
            }
        }
    }
}

/// Outcome of [`FileContext::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Candidate { file_size: i64 },
    Rejected(Disqualification),
}

impl Classification {
    pub fn is_candidate(&self) -> bool {
        matches!(self, Classification::Candidate { .. })
    }
}

/// Checks that need only the bulk-stat record.
pub(super) fn quick_reject(stat: &Bstat) -> Option<Disqualification> {
    if stat.kind() != FileKind::RegularFile {
        return Some(Disqualification::NotRegularFile);
    }
    if !stat.has_attr_fork() {
        return Some(Disqualification::NoAttributeFork);
    }
    if !stat.has_dmf_events() {
        return Some(Disqualification::NoDmfEvents);
    }
    None
}

impl FileContext {
    /// Classify the file described by `stat`, replacing whatever the context
    /// held for the previous file.
    ///
    /// The DMF attribute is fetched only if the bulk-stat record allows the
    /// file to be a DMF file at all. Calling this again with the same inputs
    /// gives the same result.
    pub fn classify(&mut self, stat: &Bstat) -> Classification {
        self.state = FileState::Unclassified;
        self.attr.clear();

        match self.evaluate(stat) {
            Ok(view) => {
                debug!(ino = stat.ino, size = stat.size, "dual-residency file will be dumped offline");
                self.state = FileState::Candidate { file_size: stat.size, view };
                Classification::Candidate { file_size: stat.size }
            }
            Err(reason) => {
                trace!(ino = stat.ino, %reason, "file dumped normally");
                self.state = FileState::Rejected(reason.clone());
                Classification::Rejected(reason)
            }
        }
    }

    fn evaluate(&mut self, stat: &Bstat) -> Result<AttributeView, Disqualification> {
        if let Some(reason) = quick_reject(stat) {
            return Err(reason);
        }

        // Likely a DMF file; pay for the attribute lookup.
        let backend = self.fs.backend();
        let handle = backend.make_handle(self.fs.fsid(), stat.ino, stat.generation).map_err(
            |err| {
                trace!(ino = stat.ino, error = %err, "make_handle failed");
                Disqualification::HandleUnavailable
            },
        )?;

        let fetched = self
            .attr
            .fill_with(|value| backend.get_attr(&handle, DMF_ATTR_NAME, AttrNamespace::Root, value))
            .map_err(|err| {
                trace!(ino = stat.ino, error = %err, "DMF attribute not read");
                Disqualification::AttributeUnavailable
            })?;
        if let Err(overflow) = fetched {
            return Err(Disqualification::AttributeTooLarge(overflow.length));
        }

        let raw = self.attr.as_bytes();
        match raw.first() {
            Some(&FSYS_TYPE_XFS) => {}
            Some(&other) => return Err(Disqualification::ForeignFilesystem(other)),
            None => {
                return Err(Disqualification::Layout(LayoutError::TooShort {
                    len: 0,
                    needed: FORMAT0_LEN,
                }));
            }
        }

        let view = AttributeView::decode(raw).map_err(Disqualification::Layout)?;
        let state = view.header().state;
        match DmfState::from_raw(state) {
            Some(_) => Ok(view),
            None => Err(Disqualification::StateNotProjectable(state)),
        }
    }
}
