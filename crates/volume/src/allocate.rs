//! Disk space pre-allocation
//!
//! New slice files reserve their expected size up front, so the file system
//! can lay them out contiguously and a full disk is noticed on open rather
//! than in the middle of a write.

use std::fs::File;
use std::io;

/// Reserves disk space for an open file
pub trait Allocator: Send + Sync {
    /// Reserve `size` bytes without changing the file size
    ///
    /// Returns `false` if the platform or file system has no support.
    fn allocate(&self, file: &File, size: u64) -> io::Result<bool>;
}

/// `fallocate` with `FALLOC_FL_KEEP_SIZE` on Linux, a no-op elsewhere
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl Allocator for DefaultAllocator {
    #[cfg(target_os = "linux")]
    fn allocate(&self, file: &File, size: u64) -> io::Result<bool> {
        use std::os::fd::AsRawFd;

        if size == 0 {
            return Ok(true);
        }
        let len = libc::off_t::try_from(size).map_err(io::Error::other)?;

        // SAFETY: the descriptor is owned by `file`, which outlives the call
        let ret = unsafe { libc::fallocate(file.as_raw_fd(), libc::FALLOC_FL_KEEP_SIZE, 0, len) };
        if ret == 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EOPNOTSUPP) | Some(libc::ENOSYS) => Ok(false),
            _ => Err(err),
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn allocate(&self, _file: &File, _size: u64) -> io::Result<bool> {
        Ok(false)
    }
}
