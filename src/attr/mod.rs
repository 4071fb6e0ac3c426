//! The DMF managed attribute: byte codec, wire layout and fetch buffer.

pub mod buffer;
pub mod layout;
pub mod msb;

pub use buffer::{ATTR_BUFFER_CAPACITY, AttrBuffer, BufferOverflow};
pub use layout::{
    AttrHeader, AttributeView, DMF_ATTR_FORMAT_0, DMF_ATTR_FORMAT_1, DMF_ATTR_NAME, DMF_MR_FLAGS,
    DmfState, FORMAT0_LEN, FORMAT1_HEADER_LEN, FSYS_TYPE_XFS, LayoutError, MIN_FORMAT1_LEN,
    MultiRegionHeader, REGION_LEN, Region,
};
