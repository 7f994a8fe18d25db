//! Abstractions for host-metrics access to enable testing and mocking.
//!
//! The `FileSystem` trait lets the collector read the real `/proc`
//! filesystem and statvfs on Linux, or an in-memory mock in tests.

use std::io;
use std::path::Path;

use crate::model::DiskUsage;

/// Abstraction over the host-metrics provider.
///
/// Covers the two ways the collector reaches the OS: reading virtual files
/// under `/proc` and querying filesystem usage for a path. Any failure
/// surfaces as an I/O error and aborts the whole collection cycle.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Returns disk usage for the filesystem containing `path`.
    fn disk_usage(&self, path: &Path) -> io::Result<DiskUsage>;
}

/// Real filesystem implementation backed by `std::fs` and statvfs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    #[cfg(unix)]
    fn disk_usage(&self, path: &Path) -> io::Result<DiskUsage> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        // f_frsize is the fragment size actually used for block counts;
        // fall back to f_bsize when the filesystem reports zero.
        let frsize = if stat.f_frsize > 0 {
            stat.f_frsize as u64
        } else {
            stat.f_bsize as u64
        };

        let total = stat.f_blocks as u64 * frsize;
        let free_all = stat.f_bfree as u64 * frsize;
        let avail = stat.f_bavail as u64 * frsize;
        let used = total.saturating_sub(free_all);

        Ok(DiskUsage::new(total, used, avail))
    }

    #[cfg(not(unix))]
    fn disk_usage(&self, _path: &Path) -> io::Result<DiskUsage> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "disk usage is only supported on unix",
        ))
    }
}
