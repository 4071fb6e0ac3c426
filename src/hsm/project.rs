//! Rewriting a candidate's bulk-stat record, extent map and DMF attribute so
//! the dump sees a fully offline file.

use tracing::{debug, trace, warn};

use super::context::FileContext;
use super::error::{HsmError, HsmResult};
use super::types::{AttrNamespace, Bstat, DMF_EV_BITS, Getbmapx, HOLE_BLOCK, btobb};
use crate::attr::{DMF_ATTR_NAME, FORMAT0_LEN};

/// What the dump should do with an existing attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrFilter {
    Keep,
    /// Leave it out; a replacement comes from [`FileContext::add_new_attribute`].
    Skip,
}

/// An attribute to add to a file's dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttribute {
    pub name: &'static str,
    pub namespace: AttrNamespace,
    pub value: Vec<u8>,
}

impl NewAttribute {
    pub fn value_size(&self) -> u32 {
        self.value.len() as u32
    }
}

impl FileContext {
    /// Give a candidate the event mask of an offline file.
    pub fn project_metadata(&self, stat: &mut Bstat) {
        if self.is_candidate() {
            stat.dmevmask = DMF_EV_BITS;
        }
    }

    /// Collapse one page of a candidate's extent map into a single hole from
    /// the current offset to end of file.
    ///
    /// `map[0]` is the header and `map[1]` the first extent at or after the
    /// dump's current offset; its offset is left as is. A header with no
    /// entries means the caller is already at end of file.
    pub fn project_extents(&self, map: &mut [Getbmapx]) -> HsmResult<()> {
        if map.len() < 2 {
            return Err(HsmError::ExtentMapTooShort(map.len()));
        }
        if map[0].entries <= 0 {
            return Ok(());
        }
        let Some(file_size) = self.file_size() else {
            return Ok(());
        };

        let remaining = btobb(file_size).saturating_sub(map[1].offset);
        if remaining > 0 {
            map[0].entries = 1;
            map[1].block = HOLE_BLOCK;
            map[1].length = remaining;
            trace!(offset = map[1].offset, length = remaining, "extent map projected as hole");
        } else {
            map[0].entries = 0;
        }
        Ok(())
    }

    /// Decide whether an existing attribute goes into the dump.
    ///
    /// Only a candidate's DMF attribute is dropped. A DMF attribute too short
    /// to hold a header is an error; the file's attributes should not be
    /// dumped. The answer is the same however often it is asked.
    pub fn filter_existing_attribute(
        &self,
        name: &str,
        value_size: u32,
        namespace: AttrNamespace,
    ) -> HsmResult<AttrFilter> {
        if !self.is_candidate() || namespace != AttrNamespace::Root || name != DMF_ATTR_NAME {
            return Ok(AttrFilter::Keep);
        }

        if (value_size as usize) < FORMAT0_LEN {
            warn!(name, value_size, "corrupt DMF attribute");
            return Err(HsmError::CorruptAttribute {
                name: name.to_string(),
                size: value_size,
                minimum: FORMAT0_LEN,
            });
        }

        Ok(AttrFilter::Skip)
    }

    /// Attribute number `cursor` to add to the dump, if any.
    ///
    /// A candidate gets exactly one: its DMF attribute rewritten to describe a
    /// file that is entirely offline. The same cursor always yields the same
    /// value.
    pub fn add_new_attribute(&self, cursor: u32, namespace: AttrNamespace) -> Option<NewAttribute> {
        if namespace != AttrNamespace::Root || cursor > 0 {
            return None;
        }
        let (file_size, view) = self.candidate_view()?;

        let value = view.offline_replacement(file_size).encode();
        debug!(size = file_size, len = value.len(), "replacement DMF attribute");

        Some(NewAttribute { name: DMF_ATTR_NAME, namespace, value })
    }
}
