//! Structures the dump host hands in: bulk-stat records and extent maps.

use serde::Serialize;

/// XFS inode flag: the inode has an attribute fork.
pub const XFS_XFLAG_HASATTR: u32 = 0x8000_0000;

// XFS DMAPI event numbers.
pub const DM_EVENT_READ: u32 = 16;
pub const DM_EVENT_WRITE: u32 = 17;
pub const DM_EVENT_TRUNCATE: u32 = 18;
pub const DM_EVENT_DESTROY: u32 = 20;

/// Event mask carried by offline, unmigrating and partial DMF files.
/// Dual-state files have all of these except read.
pub const DMF_EV_BITS: u32 = (1 << DM_EVENT_DESTROY)
    | (1 << DM_EVENT_READ)
    | (1 << DM_EVENT_WRITE)
    | (1 << DM_EVENT_TRUNCATE);

/// Extent map block number of a hole.
pub const HOLE_BLOCK: i64 = -1;

const BBSHIFT: u32 = 9;

/// Bytes to 512-byte basic blocks, rounding up. Defined for every `i64`,
/// including sizes up to `i64::MAX`.
pub fn btobb(bytes: i64) -> i64 {
    let rem = bytes & ((1 << BBSHIFT) - 1);
    (bytes >> BBSHIFT) + i64::from(rem != 0)
}

/// File type derived from a stat mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileKind {
    RegularFile,
    Directory,
    Symlink,
    Other,
}

impl FileKind {
    pub fn from_mode(mode: u32) -> Self {
        match mode & libc::S_IFMT as u32 {
            m if m == libc::S_IFREG as u32 => FileKind::RegularFile,
            m if m == libc::S_IFDIR as u32 => FileKind::Directory,
            m if m == libc::S_IFLNK as u32 => FileKind::Symlink,
            _ => FileKind::Other,
        }
    }
}

/// The subset of an XFS bulk-stat record the HSM layer reads or rewrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bstat {
    pub ino: u64,
    pub generation: u32,
    pub mode: u32,
    /// Extended inode flags (`XFS_XFLAG_*`).
    pub xflags: u32,
    /// DMAPI event mask.
    pub dmevmask: u32,
    /// Logical size in bytes.
    pub size: i64,
}

impl Bstat {
    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    pub fn has_attr_fork(&self) -> bool {
        self.xflags & XFS_XFLAG_HASATTR != 0
    }

    pub fn has_dmf_events(&self) -> bool {
        self.dmevmask & DMF_EV_BITS != 0
    }
}

/// One `getbmapx` record. Offsets and lengths are in basic blocks.
///
/// In an extent map page, slot 0 is the header whose `entries` field counts
/// the records that follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[repr(C)]
pub struct Getbmapx {
    pub offset: i64,
    pub block: i64,
    pub length: i64,
    pub count: i32,
    pub entries: i32,
    pub iflags: i32,
    pub oflags: i32,
    #[serde(skip)]
    unused: [i32; 2],
}

impl Getbmapx {
    pub fn new(offset: i64, block: i64, length: i64) -> Self {
        Self { offset, block, length, ..Default::default() }
    }

    /// Header slot announcing `entries` records.
    pub fn header(count: i32, entries: i32) -> Self {
        Self { count, entries, ..Default::default() }
    }

    pub fn is_hole(&self) -> bool {
        self.block == HOLE_BLOCK
    }
}

/// Attribute namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttrNamespace {
    User,
    /// The privileged namespace DMF keeps its attribute in.
    Root,
    Secure,
}
