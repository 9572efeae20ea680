//! Physical-block extent query (spec §6.4). The reader uses only the first
//! extent's starting block per file; unsupported platforms and filesystems
//! return `None`, in which case the read-list falls back to inode ordering.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// First physical block of `path`'s first extent, or `None` if the query is
/// unsupported or the file has no mapped extents (e.g. a hole at offset 0,
/// or a filesystem that doesn't implement `FIEMAP`).
#[cfg(target_os = "linux")]
pub fn first_extent_block(path: &Path) -> Option<u64> {
    // FIEMAP ioctl: ask for exactly one extent starting at offset 0.
    #[repr(C)]
    struct FiemapExtent {
        fe_logical: u64,
        fe_physical: u64,
        fe_length: u64,
        fe_reserved64: [u64; 2],
        fe_flags: u32,
        fe_reserved: [u32; 3],
    }

    #[repr(C)]
    struct Fiemap {
        fm_start: u64,
        fm_length: u64,
        fm_flags: u32,
        fm_mapped_extents: u32,
        fm_extent_count: u32,
        fm_reserved: u32,
        fm_extents: [FiemapExtent; 1],
    }

    const FS_IOC_FIEMAP: libc::c_ulong = 0xC020660B;

    let file = File::open(path).ok()?;
    let fd = file.as_raw_fd();

    let mut req = Fiemap {
        fm_start: 0,
        fm_length: u64::MAX,
        fm_flags: 0,
        fm_mapped_extents: 0,
        fm_extent_count: 1,
        fm_reserved: 0,
        fm_extents: [FiemapExtent {
            fe_logical: 0,
            fe_physical: 0,
            fe_length: 0,
            fe_reserved64: [0, 0],
            fe_flags: 0,
            fe_reserved: [0, 0, 0],
        }],
    };

    let rc = unsafe { libc::ioctl(fd, FS_IOC_FIEMAP, &mut req as *mut Fiemap) };
    if rc != 0 || req.fm_mapped_extents == 0 {
        return None;
    }
    // Convert byte offset to a coarse block number (512-byte sectors);
    // only relative ordering matters to the scheduler, not the unit.
    Some(req.fm_extents[0].fe_physical / 512)
}

#[cfg(not(target_os = "linux"))]
pub fn first_extent_block(_path: &Path) -> Option<u64> {
    None
}
