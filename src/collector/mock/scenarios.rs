//! Pre-built mock filesystem scenarios for testing.
//!
//! Realistic `/proc` states plus mocked disk usage for the mounts the
//! sampler tests monitor.

use super::MockFs;
use crate::model::DiskUsage;

impl MockFs {
    /// Creates a typical idle host.
    ///
    /// Two network interfaces (lo, eth0), three block devices (sda, sda1,
    /// nvme0n1), ~2 GB of available memory, and usage mocked for `/` and
    /// `/var`.
    pub fn typical_host() -> Self {
        let fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 0 0 0
cpu0 2500 125 750 20000 250 50 25 0 0 0
cpu1 2500 125 750 20000 250 50 25 0 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:    2048000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        3072000 kB
Dirty:              1024 kB
Writeback:             0 kB
",
        );

        fs.add_file(
            "/proc/vmstat",
            "\
pgpgin 123456
pgpgout 654321
pswpin 100
pswpout 200
pgfault 999999
pgmajfault 1234
oom_kill 0
",
        );

        fs.add_file(
            "/proc/net/dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987654321   654321    5   10    0     0          0       100 123456789   456789    2    5    0     0       0          0
",
        );

        fs.add_file(
            "/proc/diskstats",
            "\
   8       0 sda 12345 100 987654 5000 6789 50 456789 3000 0 4000 8000 0 0 0 0
   8       1 sda1 10000 80 800000 4000 5000 40 400000 2500 0 3500 6500 0 0 0 0
 259       0 nvme0n1 50000 200 2000000 10000 30000 150 1500000 8000 5 15000 18000 0 0 0 0
",
        );

        fs.add_usage("/", DiskUsage::new(100_000_000_000, 40_000_000_000, 55_000_000_000));
        fs.add_usage(
            "/var",
            DiskUsage::new(500_000_000_000, 100_000_000_000, 375_000_000_000),
        );

        fs
    }

    /// Creates a host under memory pressure: roughly 500 MB available,
    /// below the default out-of-memory threshold.
    pub fn low_memory_host() -> Self {
        let fs = Self::typical_host();

        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:          256000 kB
MemAvailable:     488281 kB
Buffers:           64000 kB
Cached:           256000 kB
SwapCached:       128000 kB
Active:         12000000 kB
Inactive:        3000000 kB
SwapTotal:       4096000 kB
SwapFree:        1024000 kB
",
        );

        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::FileSystem;
    use std::path::Path;

    #[test]
    fn typical_host_has_required_files() {
        let fs = MockFs::typical_host();
        assert!(fs.exists(Path::new("/proc/stat")));
        assert!(fs.exists(Path::new("/proc/meminfo")));
        assert!(fs.exists(Path::new("/proc/vmstat")));
        assert!(fs.exists(Path::new("/proc/net/dev")));
        assert!(fs.exists(Path::new("/proc/diskstats")));
        assert!(fs.disk_usage(Path::new("/")).is_ok());
        assert!(fs.disk_usage(Path::new("/var")).is_ok());
    }

    #[test]
    fn low_memory_host_reports_under_threshold_available() {
        let fs = MockFs::low_memory_host();
        let meminfo = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert!(meminfo.contains("MemAvailable:     488281 kB"));
    }
}
