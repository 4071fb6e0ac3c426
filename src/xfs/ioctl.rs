//! XFS handle ioctl ABI.

use libc::c_void;

pub const ATTR_OP_GET: u32 = 1;

pub const ATTR_ROOT: u32 = 0x0002;
pub const ATTR_SECURE: u32 = 0x0008;

/// Largest handle the kernel hands out.
pub const MAXHANSIZ: usize = 64;

/// `xfs_fsid_t`
pub const FSID_LEN: usize = 8;
/// `xfs_fid_t` minus its length field.
pub const FID_LEN: u16 = 14;

#[repr(C)]
pub struct XfsFsopHandlereq {
    pub fd: u32,
    pub path: *mut c_void,
    pub oflags: u32,
    pub ihandle: *mut c_void,
    pub ihandlen: u32,
    pub ohandle: *mut c_void,
    pub ohandlen: *mut u32,
}

impl XfsFsopHandlereq {
    pub fn empty() -> Self {
        Self {
            fd: 0,
            path: std::ptr::null_mut(),
            oflags: 0,
            ihandle: std::ptr::null_mut(),
            ihandlen: 0,
            ohandle: std::ptr::null_mut(),
            ohandlen: std::ptr::null_mut(),
        }
    }
}

#[repr(C)]
pub struct XfsAttrMultiop {
    pub am_opcode: u32,
    pub am_error: i32,
    pub am_attrname: *mut c_void,
    pub am_attrvalue: *mut c_void,
    pub am_length: u32,
    pub am_flags: u32,
}

#[repr(C)]
pub struct XfsFsopAttrmultiHandlereq {
    pub hreq: XfsFsopHandlereq,
    pub opcount: u32,
    pub ops: *mut XfsAttrMultiop,
}

#[repr(C)]
pub struct XfsFsopBulkreq {
    pub lastip: *mut u64,
    pub icount: i32,
    pub ubuffer: *mut c_void,
    pub ocount: *mut i32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct XfsBstime {
    pub tv_sec: libc::c_long,
    pub tv_nsec: i32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct XfsBstat {
    pub bs_ino: u64,
    pub bs_mode: u16,
    pub bs_nlink: u16,
    pub bs_uid: u32,
    pub bs_gid: u32,
    pub bs_rdev: u32,
    pub bs_blksize: i32,
    pub bs_size: i64,
    pub bs_atime: XfsBstime,
    pub bs_mtime: XfsBstime,
    pub bs_ctime: XfsBstime,
    pub bs_blocks: i64,
    pub bs_xflags: u32,
    pub bs_extsize: i32,
    pub bs_extents: i32,
    pub bs_gen: u32,
    pub bs_projid_lo: u16,
    pub bs_forkoff: u16,
    pub bs_projid_hi: u16,
    pub bs_sick: u16,
    pub bs_checked: u16,
    pub bs_pad: [u8; 2],
    pub bs_cowextsize: u32,
    pub bs_dmevmask: u32,
    pub bs_dmstate: u16,
    pub bs_aextents: u16,
}

nix::ioctl_readwrite!(xfs_fsbulkstat_single, b'X', 102, XfsFsopBulkreq);
nix::ioctl_readwrite!(xfs_path_to_fshandle, b'X', 104, XfsFsopHandlereq);
nix::ioctl_write_ptr!(xfs_attrmulti_by_handle, b'X', 123, XfsFsopAttrmultiHandlereq);
