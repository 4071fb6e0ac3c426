use std::ffi::CString;
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use libc::c_void;
use tracing::debug;

use super::ioctl::{
    ATTR_OP_GET, ATTR_ROOT, ATTR_SECURE, FID_LEN, FSID_LEN, MAXHANSIZ, XfsAttrMultiop, XfsBstat,
    XfsFsopAttrmultiHandlereq, XfsFsopBulkreq, XfsFsopHandlereq, xfs_attrmulti_by_handle,
    xfs_fsbulkstat_single, xfs_path_to_fshandle,
};
use crate::hsm::{AttrNamespace, Bstat, DmapiBackend, FileHandle, FsId};

/// XFS backend bound to one mounted filesystem.
///
/// Every ioctl is issued on the descriptor opened here. Handle operations
/// need `CAP_SYS_ADMIN`.
pub struct XfsBackend {
    mount: File,
}

impl XfsBackend {
    pub fn open(mount_point: impl AsRef<Path>) -> Result<Self> {
        let mount_point = mount_point.as_ref();
        let mount = File::open(mount_point)
            .with_context(|| format!("Failed to open mount point {}", mount_point.display()))?;
        Ok(Self { mount })
    }

    /// Bulk-stat a single inode.
    pub fn bulkstat_single(&self, ino: u64) -> Result<Bstat> {
        let mut lastip = ino;
        let mut stat = XfsBstat::default();
        let mut ocount: i32 = 0;
        let mut req = XfsFsopBulkreq {
            lastip: &mut lastip,
            icount: 1,
            ubuffer: (&mut stat as *mut XfsBstat).cast::<c_void>(),
            ocount: &mut ocount,
        };

        // SAFETY: every pointer in `req` refers to a live local of the size
        // the kernel expects.
        unsafe { xfs_fsbulkstat_single(self.mount.as_raw_fd(), &mut req) }
            .with_context(|| format!("XFS_IOC_FSBULKSTAT_SINGLE failed for inode {}", ino))?;

        Ok(Bstat {
            ino: stat.bs_ino,
            generation: stat.bs_gen,
            mode: u32::from(stat.bs_mode),
            xflags: stat.bs_xflags,
            dmevmask: stat.bs_dmevmask,
            size: stat.bs_size,
        })
    }
}

fn namespace_flags(namespace: AttrNamespace) -> u32 {
    match namespace {
        AttrNamespace::User => 0,
        AttrNamespace::Root => ATTR_ROOT,
        AttrNamespace::Secure => ATTR_SECURE,
    }
}

impl DmapiBackend for XfsBackend {
    fn path_to_fsid(&self, mount_point: &Path) -> Result<FsId> {
        let path = CString::new(mount_point.as_os_str().as_bytes())?;
        let mut handle = [0u8; MAXHANSIZ];
        let mut handle_len: u32 = 0;

        let mut req = XfsFsopHandlereq {
            fd: self.mount.as_raw_fd() as u32,
            path: path.as_ptr() as *mut c_void,
            oflags: libc::O_LARGEFILE as u32,
            ohandle: handle.as_mut_ptr().cast::<c_void>(),
            ohandlen: &mut handle_len,
            ..XfsFsopHandlereq::empty()
        };

        // SAFETY: `path`, `handle` and `handle_len` outlive the call and the
        // output buffer is MAXHANSIZ bytes.
        unsafe { xfs_path_to_fshandle(self.mount.as_raw_fd(), &mut req) }.with_context(|| {
            format!("XFS_IOC_PATH_TO_FSHANDLE failed for {}", mount_point.display())
        })?;

        if (handle_len as usize) < FSID_LEN {
            bail!("filesystem handle of {} bytes is too short", handle_len);
        }
        let mut fsid = [0u8; FSID_LEN];
        fsid.copy_from_slice(&handle[..FSID_LEN]);
        debug!(mount_point = %mount_point.display(), "resolved XFS filesystem handle");
        Ok(FsId(fsid))
    }

    fn make_handle(&self, fsid: &FsId, ino: u64, generation: u32) -> Result<FileHandle> {
        let mut handle = Vec::with_capacity(24);
        handle.extend_from_slice(&fsid.0);
        handle.extend_from_slice(&FID_LEN.to_ne_bytes());
        handle.extend_from_slice(&0u16.to_ne_bytes());
        handle.extend_from_slice(&generation.to_ne_bytes());
        handle.extend_from_slice(&ino.to_ne_bytes());
        Ok(FileHandle(handle))
    }

    fn get_attr(
        &self,
        handle: &FileHandle,
        name: &str,
        namespace: AttrNamespace,
        value: &mut [u8],
    ) -> Result<usize> {
        let name = CString::new(name)?;
        let mut handle_bytes = handle.0.clone();

        let mut op = XfsAttrMultiop {
            am_opcode: ATTR_OP_GET,
            am_error: 0,
            am_attrname: name.as_ptr() as *mut c_void,
            am_attrvalue: value.as_mut_ptr().cast::<c_void>(),
            am_length: value.len() as u32,
            am_flags: namespace_flags(namespace),
        };

        let mut hreq = XfsFsopHandlereq::empty();
        hreq.ihandle = handle_bytes.as_mut_ptr().cast::<c_void>();
        hreq.ihandlen = handle_bytes.len() as u32;
        let req = XfsFsopAttrmultiHandlereq { hreq, opcount: 1, ops: &mut op };

        // SAFETY: the handle, name and value buffers outlive the call;
        // `am_length` is the size of `value`.
        unsafe { xfs_attrmulti_by_handle(self.mount.as_raw_fd(), &req) }
            .context("XFS_IOC_ATTRMULTI_BY_HANDLE failed")?;

        if op.am_error != 0 {
            return Err(anyhow!(std::io::Error::from_raw_os_error(op.am_error.abs())))
                .context("attribute get failed");
        }
        Ok(op.am_length as usize)
    }
}
