//! Wire layout of the DMF managed attribute.
//!
//! Two encodings exist. Format 0 is a fixed 22-byte header. Format 1 adds a
//! site tag and a region count, followed by one or more 20-byte region
//! descriptors. All integers are big-endian.

use serde::Serialize;
use thiserror::Error;

use super::msb;

/// Name of the attribute DMF stores in the root namespace.
pub const DMF_ATTR_NAME: &str = "SGI_DMI_DMFATTR";

/// XFS DMAPI without multiple managed regions.
pub const FSYS_TYPE_XFS: u8 = 1;

pub const DMF_ATTR_FORMAT_0: u8 = 0;
pub const DMF_ATTR_FORMAT_1: u8 = 1;

/// Size of a format 0 value.
pub const FORMAT0_LEN: usize = 22;
/// Size of the format 1 header, excluding regions.
pub const FORMAT1_HEADER_LEN: usize = 28;
pub const REGION_LEN: usize = 20;
/// A format 1 value must carry at least one region.
pub const MIN_FORMAT1_LEN: usize = FORMAT1_HEADER_LEN + REGION_LEN;

/// Event bits of a region that is fully offline.
pub const DMF_MR_FLAGS: u8 = 0x1 | 0x2 | 0x4;

// Field offsets shared by both formats.
const OFF_FSYS: usize = 0;
const OFF_VERSION: usize = 1;
const OFF_STATE: usize = 2;
const OFF_FLAGS: usize = 4;
const OFF_BFID: usize = 6;
const OFF_SITETAG: usize = 22;
const OFF_REGCNT: usize = 26;

/// DMF residency states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum DmfState {
    /// Backed up, data still online.
    DualState = 2,
    /// Backed up, no online data.
    Offline = 3,
    /// Data is being staged back in.
    Unmigrating = 4,
    /// Backed up, parts of the data online.
    Partial = 6,
}

impl DmfState {
    /// Map a raw state value to one of the states that can be dumped as
    /// offline. Every other value is `None`.
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            2 => Some(DmfState::DualState),
            3 => Some(DmfState::Offline),
            4 => Some(DmfState::Unmigrating),
            6 => Some(DmfState::Partial),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        self as u16
    }
}

impl std::fmt::Display for DmfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DmfState::DualState => write!(f, "DUL"),
            DmfState::Offline => write!(f, "OFL"),
            DmfState::Unmigrating => write!(f, "UNM"),
            DmfState::Partial => write!(f, "PAR"),
        }
    }
}

/// Reasons a byte sequence is not a usable attribute value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("attribute value too short: {len} bytes (need {needed})")]
    TooShort { len: usize, needed: usize },

    #[error("unsupported attribute format version: {0}")]
    UnsupportedFormat(u8),

    #[error("bad length {len} for attribute format {format}")]
    BadLength { format: u8, len: usize },
}

/// Fields common to both formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttrHeader {
    pub fsys: u8,
    pub version: u8,
    pub state: u16,
    pub flags: u16,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub bfid: [u8; 16],
}

impl AttrHeader {
    fn decode(raw: &[u8]) -> Self {
        let mut bfid = [0u8; 16];
        bfid.copy_from_slice(&raw[OFF_BFID..OFF_BFID + 16]);
        Self {
            fsys: raw[OFF_FSYS],
            version: raw[OFF_VERSION],
            state: msb::load(&raw[OFF_STATE..OFF_STATE + 2]) as u16,
            flags: msb::load(&raw[OFF_FLAGS..OFF_FLAGS + 2]) as u16,
            bfid,
        }
    }

    fn encode_into(&self, out: &mut [u8]) {
        out[OFF_FSYS] = self.fsys;
        out[OFF_VERSION] = self.version;
        msb::store(&mut out[OFF_STATE..OFF_STATE + 2], u64::from(self.state));
        msb::store(&mut out[OFF_FLAGS..OFF_FLAGS + 2], u64::from(self.flags));
        out[OFF_BFID..OFF_BFID + 16].copy_from_slice(&self.bfid);
    }
}

/// One managed region of a format 1 value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub offset: u64,
    pub size: u64,
    pub state: u16,
    pub event_flags: u8,
    pub flag_bits: u8,
}

impl Region {
    fn decode(raw: &[u8]) -> Self {
        Self {
            offset: msb::load(&raw[0..8]),
            size: msb::load(&raw[8..16]),
            state: msb::load(&raw[16..18]) as u16,
            event_flags: raw[18],
            flag_bits: raw[19],
        }
    }

    fn encode_into(&self, out: &mut [u8]) {
        msb::store(&mut out[0..8], self.offset);
        msb::store(&mut out[8..16], self.size);
        msb::store(&mut out[16..18], u64::from(self.state));
        out[18] = self.event_flags;
        out[19] = self.flag_bits;
    }
}

/// Format 1 header: the common fields plus site tag and region count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiRegionHeader {
    #[serde(flatten)]
    pub header: AttrHeader,
    pub site_tag: u32,
    pub region_count: u16,
}

/// A validated, decoded attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format")]
pub enum AttributeView {
    #[serde(rename = "0")]
    Format0(AttrHeader),
    #[serde(rename = "1")]
    Format1 { header: MultiRegionHeader, regions: Vec<Region> },
}

impl AttributeView {
    /// Decode and validate a raw value.
    ///
    /// Format 0 must be exactly [`FORMAT0_LEN`] bytes and format 1 at least
    /// [`MIN_FORMAT1_LEN`]. Format 1 regions are read up to the stored region
    /// count or the last complete descriptor, whichever comes first.
    pub fn decode(raw: &[u8]) -> Result<Self, LayoutError> {
        if raw.len() <= OFF_VERSION {
            return Err(LayoutError::TooShort { len: raw.len(), needed: FORMAT0_LEN });
        }

        match raw[OFF_VERSION] {
            DMF_ATTR_FORMAT_0 => {
                if raw.len() != FORMAT0_LEN {
                    return Err(LayoutError::BadLength {
                        format: DMF_ATTR_FORMAT_0,
                        len: raw.len(),
                    });
                }
                Ok(AttributeView::Format0(AttrHeader::decode(raw)))
            }
            DMF_ATTR_FORMAT_1 => {
                if raw.len() < MIN_FORMAT1_LEN {
                    return Err(LayoutError::BadLength {
                        format: DMF_ATTR_FORMAT_1,
                        len: raw.len(),
                    });
                }
                let header = MultiRegionHeader {
                    header: AttrHeader::decode(raw),
                    site_tag: msb::load(&raw[OFF_SITETAG..OFF_SITETAG + 4]) as u32,
                    region_count: msb::load(&raw[OFF_REGCNT..OFF_REGCNT + 2]) as u16,
                };
                let regions = raw[FORMAT1_HEADER_LEN..]
                    .chunks_exact(REGION_LEN)
                    .take(usize::from(header.region_count))
                    .map(Region::decode)
                    .collect();
                Ok(AttributeView::Format1 { header, regions })
            }
            other => Err(LayoutError::UnsupportedFormat(other)),
        }
    }

    pub fn header(&self) -> &AttrHeader {
        match self {
            AttributeView::Format0(header) => header,
            AttributeView::Format1 { header, .. } => &header.header,
        }
    }

    /// Encoded size of this value.
    pub fn encoded_len(&self) -> usize {
        match self {
            AttributeView::Format0(_) => FORMAT0_LEN,
            AttributeView::Format1 { regions, .. } => FORMAT1_HEADER_LEN + regions.len() * REGION_LEN,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.encoded_len()];
        match self {
            AttributeView::Format0(header) => header.encode_into(&mut out),
            AttributeView::Format1 { header, regions } => {
                header.header.encode_into(&mut out);
                msb::store(&mut out[OFF_SITETAG..OFF_SITETAG + 4], u64::from(header.site_tag));
                msb::store(&mut out[OFF_REGCNT..OFF_REGCNT + 2], u64::from(header.region_count));
                for (region, slot) in
                    regions.iter().zip(out[FORMAT1_HEADER_LEN..].chunks_exact_mut(REGION_LEN))
                {
                    region.encode_into(slot);
                }
            }
        }
        out
    }

    /// Build the value a fully offline copy of this file would carry.
    ///
    /// DMF only writes format 1 for files with several regions or a non-zero
    /// site tag. The replacement has a single region, so format 1 is kept only
    /// when the site tag is set. The global state is always offline.
    pub fn offline_replacement(&self, file_size: i64) -> AttributeView {
        match self {
            AttributeView::Format1 { header, .. } if header.site_tag != 0 => {
                let mut header = header.clone();
                header.header.state = DmfState::Offline.raw();
                header.region_count = 1;
                AttributeView::Format1 {
                    header,
                    regions: vec![Region {
                        offset: 0,
                        size: file_size as u64,
                        state: DmfState::Offline.raw(),
                        event_flags: DMF_MR_FLAGS,
                        flag_bits: 0,
                    }],
                }
            }
            _ => {
                let mut header = self.header().clone();
                header.version = DMF_ATTR_FORMAT_0;
                header.state = DmfState::Offline.raw();
                AttributeView::Format0(header)
            }
        }
    }
}
