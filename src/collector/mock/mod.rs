//! In-memory mock filesystem for testing collectors without real `/proc`.
//!
//! `MockFs` keeps file contents and per-path disk usage in shared state, so
//! clones handed to a collector observe files rewritten by the test between
//! cycles. This is how multi-cycle scenarios are driven.

mod scenarios;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::collector::traits::FileSystem;
use crate::model::DiskUsage;

#[derive(Debug, Default)]
struct Inner {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Map from path to mocked statvfs results.
    usages: HashMap<PathBuf, DiskUsage>,
}

/// In-memory filesystem for testing.
///
/// Clones share state: a test can keep one handle, give a clone to the
/// collector, and rewrite counters between `collect()` calls.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    inner: Arc<RwLock<Inner>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file with the given content.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.inner
            .write()
            .expect("mock fs lock poisoned")
            .files
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Removes a file, making subsequent reads fail.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.inner
            .write()
            .expect("mock fs lock poisoned")
            .files
            .remove(path.as_ref());
    }

    /// Sets the disk usage reported for a path.
    pub fn add_usage(&self, path: impl AsRef<Path>, usage: DiskUsage) {
        self.inner
            .write()
            .expect("mock fs lock poisoned")
            .usages
            .insert(path.as_ref().to_path_buf(), usage);
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner
            .read()
            .expect("mock fs lock poisoned")
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("mock file not found: {}", path.display()),
                )
            })
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.inner.read().expect("mock fs lock poisoned");
        inner.files.contains_key(path) || inner.usages.contains_key(path)
    }

    fn disk_usage(&self, path: &Path) -> io::Result<DiskUsage> {
        self.inner
            .read()
            .expect("mock fs lock poisoned")
            .usages
            .get(path)
            .copied()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("mock usage not configured: {}", path.display()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_overwrite_file() {
        let fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 1 kB\n");
        assert!(fs.exists(Path::new("/proc/meminfo")));

        fs.add_file("/proc/meminfo", "MemTotal: 2 kB\n");
        let content = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert!(content.contains("MemTotal: 2"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let fs = MockFs::new();
        let err = fs.read_to_string(Path::new("/proc/nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn clones_share_state() {
        let fs = MockFs::new();
        let clone = fs.clone();
        fs.add_file("/proc/stat", "cpu  0 0 0 0 0 0 0 0 0 0\n");
        assert!(clone.exists(Path::new("/proc/stat")));
    }

    #[test]
    fn configured_usage_is_returned() {
        let fs = MockFs::new();
        fs.add_usage("/", DiskUsage::new(1000, 500, 400));
        let usage = fs.disk_usage(Path::new("/")).unwrap();
        assert_eq!(usage.used, 500);
        assert!(fs.disk_usage(Path::new("/var")).is_err());
    }
}
