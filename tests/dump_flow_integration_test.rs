// Integration tests for the dump-time HSM call sequence
//
// A dump host initializes a filesystem context, allocates a file context per
// stream and then, for every file, classifies it and asks for the projected
// bulk-stat record, attributes and extent map. These tests drive that
// sequence against an in-memory DMF filesystem.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hsmdump::attr::{
    AttrHeader, AttributeView, DMF_ATTR_NAME, DmfState, FSYS_TYPE_XFS, MultiRegionHeader, Region,
};
use hsmdump::hsm::{
    AttrFilter, AttrNamespace, Bstat, DM_EVENT_DESTROY, DM_EVENT_READ, DM_EVENT_TRUNCATE,
    DM_EVENT_WRITE, DMF_EV_BITS, DmapiBackend, FileHandle, FilesystemContext, FsId, Getbmapx,
    HSM_API_VERSION_1, HsmError, XFS_XFLAG_HASATTR, btobb,
};

const FSID: FsId = FsId(*b"dmf-fs01");

/// DMF attributes keyed by inode number.
#[derive(Default)]
struct FakeDmf {
    attrs: HashMap<u64, Vec<u8>>,
    fetches: AtomicUsize,
}

impl FakeDmf {
    fn with_attr(mut self, ino: u64, raw: Vec<u8>) -> Self {
        self.attrs.insert(ino, raw);
        self
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DmapiBackend for FakeDmf {
    fn path_to_fsid(&self, mount_point: &Path) -> anyhow::Result<FsId> {
        if mount_point == Path::new("/dmf") {
            Ok(FSID)
        } else {
            anyhow::bail!("{} is not a DMF filesystem", mount_point.display())
        }
    }

    fn make_handle(&self, fsid: &FsId, ino: u64, _generation: u32) -> anyhow::Result<FileHandle> {
        let mut handle = fsid.0.to_vec();
        handle.extend_from_slice(&ino.to_le_bytes());
        Ok(FileHandle(handle))
    }

    fn get_attr(
        &self,
        handle: &FileHandle,
        name: &str,
        namespace: AttrNamespace,
        value: &mut [u8],
    ) -> anyhow::Result<usize> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        assert_eq!(name, DMF_ATTR_NAME);
        assert_eq!(namespace, AttrNamespace::Root);

        let ino = u64::from_le_bytes(handle.0[8..16].try_into()?);
        let raw = self.attrs.get(&ino).ok_or_else(|| anyhow::anyhow!("ENOATTR"))?;
        value[..raw.len()].copy_from_slice(raw);
        Ok(raw.len())
    }
}

fn header(version: u8, state: DmfState) -> AttrHeader {
    AttrHeader { fsys: FSYS_TYPE_XFS, version, state: state.raw(), flags: 0, bfid: [0xb1; 16] }
}

fn format0(state: DmfState) -> Vec<u8> {
    AttributeView::Format0(header(0, state)).encode()
}

fn format1(state: DmfState, site_tag: u32) -> Vec<u8> {
    AttributeView::Format1 {
        header: MultiRegionHeader { header: header(1, state), site_tag, region_count: 1 },
        regions: vec![Region { offset: 0, size: 65536, state: 2, event_flags: 0x6, flag_bits: 0 }],
    }
    .encode()
}

fn dmf_stat(ino: u64, size: i64, dmevmask: u32) -> Bstat {
    Bstat { ino, generation: 1, mode: 0o100644, xflags: XFS_XFLAG_HASATTR, dmevmask, size }
}

fn dual_state_mask() -> u32 {
    (1 << DM_EVENT_DESTROY) | (1 << DM_EVENT_WRITE) | (1 << DM_EVENT_TRUNCATE)
}

#[test]
fn test_offline_format0_dumps_as_single_hole() {
    let size = 3 * 1024 * 1024 + 100;
    let backend = Arc::new(FakeDmf::default().with_attr(10, format0(DmfState::Offline)));
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend).unwrap();
    let mut file = fs.allocate_file_context();

    let stat = dmf_stat(10, size, DMF_EV_BITS);
    assert!(file.classify(&stat).is_candidate());

    let mut map = [Getbmapx::header(3, 2), Getbmapx::new(0, 1024, 4000), Getbmapx::new(4000, 9000, 2145)];
    file.project_extents(&mut map).unwrap();

    assert_eq!(map[0].entries, 1);
    assert!(map[1].is_hole());
    assert_eq!(map[1].offset, 0);
    assert_eq!(map[1].length, btobb(size));
}

#[test]
fn test_dual_state_format1_full_sequence() {
    let size = 65536;
    let backend = Arc::new(FakeDmf::default().with_attr(20, format1(DmfState::DualState, 0x77)));
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend.clone()).unwrap();
    let mut file = fs.allocate_file_context();
    let mut stat = dmf_stat(20, size, dual_state_mask());

    assert!(file.classify(&stat).is_candidate());
    assert_eq!(fs.estimate_file_space(&stat), Some(0));
    assert_eq!(fs.estimate_file_offset(&stat, 4096), Some(size));

    file.project_metadata(&mut stat);
    assert_eq!(stat.dmevmask, DMF_EV_BITS);

    assert_eq!(
        file.filter_existing_attribute(DMF_ATTR_NAME, 48, AttrNamespace::Root).unwrap(),
        AttrFilter::Skip
    );
    assert_eq!(
        file.filter_existing_attribute("SGI_ACL_FILE", 28, AttrNamespace::Root).unwrap(),
        AttrFilter::Keep
    );

    let attr = file.add_new_attribute(0, AttrNamespace::Root).unwrap();
    assert_eq!(attr.name, DMF_ATTR_NAME);
    match AttributeView::decode(&attr.value).unwrap() {
        AttributeView::Format1 { header, regions } => {
            assert_eq!(header.header.state, DmfState::Offline.raw());
            assert_eq!(header.site_tag, 0x77);
            assert_eq!(regions.len(), 1);
            assert_eq!(regions[0].size, size as u64);
            assert_eq!(regions[0].state, DmfState::Offline.raw());
        }
        other => panic!("expected format 1, got {:?}", other),
    }
    assert!(file.add_new_attribute(1, AttrNamespace::Root).is_none());

    // Second extent page, already past end of file.
    let mut map = [Getbmapx::header(2, 1), Getbmapx::new(btobb(size), 0, 8)];
    file.project_extents(&mut map).unwrap();
    assert_eq!(map[0].entries, 0);
}

#[test]
fn test_non_dmf_files_skip_attribute_fetch() {
    let backend = Arc::new(FakeDmf::default().with_attr(30, format0(DmfState::Offline)));
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend.clone()).unwrap();
    let mut file = fs.allocate_file_context();

    let stats = [
        Bstat { mode: 0o040755, ..dmf_stat(30, 0, DMF_EV_BITS) },
        Bstat { xflags: 0, ..dmf_stat(30, 10, DMF_EV_BITS) },
        dmf_stat(30, 10, 1 << 5),
    ];
    for stat in &stats {
        assert!(!file.classify(stat).is_candidate());
        assert_eq!(fs.estimate_file_space(stat), None);
        assert_eq!(fs.estimate_file_offset(stat, 0), None);
    }
    assert_eq!(backend.fetches(), 0);
}

#[test]
fn test_space_estimate_never_fetches() {
    let backend = Arc::new(FakeDmf::default().with_attr(31, format0(DmfState::DualState)));
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend.clone()).unwrap();

    assert_eq!(fs.estimate_file_space(&dmf_stat(31, 1 << 30, 1 << DM_EVENT_READ)), Some(0));
    assert_eq!(backend.fetches(), 0);
}

#[test]
fn test_missing_attribute_is_not_candidate() {
    let backend = Arc::new(FakeDmf::default());
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend.clone()).unwrap();
    let mut file = fs.allocate_file_context();

    let mut stat = dmf_stat(40, 100, DMF_EV_BITS);
    assert!(!file.classify(&stat).is_candidate());
    assert_eq!(backend.fetches(), 1);

    let before = stat.clone();
    file.project_metadata(&mut stat);
    assert_eq!(stat, before);
    assert!(file.add_new_attribute(0, AttrNamespace::Root).is_none());
}

#[test]
fn test_corrupt_attribute_aborts_attribute_dump() {
    let backend = Arc::new(FakeDmf::default().with_attr(50, format0(DmfState::Partial)));
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend).unwrap();
    let mut file = fs.allocate_file_context();
    file.classify(&dmf_stat(50, 100, DMF_EV_BITS));

    let err = file.filter_existing_attribute(DMF_ATTR_NAME, 10, AttrNamespace::Root).unwrap_err();
    assert!(matches!(err, HsmError::CorruptAttribute { .. }));
}

#[test]
fn test_context_reused_across_files() {
    let backend = Arc::new(
        FakeDmf::default()
            .with_attr(60, format0(DmfState::Offline))
            .with_attr(61, format0(DmfState::Unmigrating))
            .with_attr(62, {
                let mut raw = format0(DmfState::Offline);
                raw[3] = 1;
                raw
            }),
    );
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend).unwrap();
    let mut file = fs.allocate_file_context();

    assert!(file.classify(&dmf_stat(60, 1000, DMF_EV_BITS)).is_candidate());
    assert_eq!(file.file_size(), Some(1000));
    assert!(file.classify(&dmf_stat(61, 2000, DMF_EV_BITS)).is_candidate());
    assert_eq!(file.file_size(), Some(2000));
    assert!(!file.classify(&dmf_stat(62, 3000, DMF_EV_BITS)).is_candidate());
    assert_eq!(file.file_size(), None);
}

#[test]
fn test_streams_share_filesystem_context() {
    let backend = Arc::new(
        FakeDmf::default()
            .with_attr(70, format0(DmfState::Offline))
            .with_attr(71, format0(DmfState::DualState)),
    );
    let fs = FilesystemContext::init("/dmf", HSM_API_VERSION_1, backend).unwrap();

    let handles: Vec<_> = [70u64, 71]
        .into_iter()
        .map(|ino| {
            let fs = fs.clone();
            std::thread::spawn(move || {
                let mut file = fs.allocate_file_context();
                file.classify(&dmf_stat(ino, 512, DMF_EV_BITS)).is_candidate()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn test_unresolvable_mount_point() {
    let err = FilesystemContext::init("/home", HSM_API_VERSION_1, Arc::new(FakeDmf::default()))
        .unwrap_err();
    assert!(matches!(err, HsmError::MountResolution { .. }));
    assert!(err.to_string().contains("/home is not a DMF filesystem"));
}
