//! Counter snapshot collector.
//!
//! One `collect()` call per sampling cycle reads every monitored resource
//! through the [`FileSystem`] trait and freezes the readings into a
//! [`Snapshot`]. Collection is all-or-nothing: if any resource cannot be
//! read the whole call fails and the cycle is aborted by the caller.

use std::path::Path;

use chrono::Utc;
use tracing::debug;

use crate::collector::parser::{
    CpuTimes, ParseError, parse_cpu_times, parse_diskstats, parse_meminfo, parse_net_dev,
    parse_vmstat,
};
use crate::collector::traits::FileSystem;
use crate::config::MountSpec;
use crate::meter::ewma;
use crate::model::{DiskIoInfo, MemSwapInfo, MemVirtualInfo, MountUsageInfo, NetIoInfo, Snapshot};

/// Bytes per sector in `/proc/diskstats` counters.
const SECTOR_SIZE: u64 = 512;

/// Bytes per page for `pswpin`/`pswpout` conversion.
const PAGE_SIZE: u64 = 4096;

/// Error from a collection cycle.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading a metrics source.
    Io(std::io::Error),
    /// Malformed content in a metrics source.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e.message)
    }
}

/// Collects one frozen snapshot of host metrics per cycle.
///
/// Owns the CPU running state: the previous jiffies reading used to derive
/// an instantaneous percent without blocking, and the exponential moving
/// average that smooths it before it reaches the meter layer.
pub struct Collector<F: FileSystem> {
    fs: F,
    proc_path: String,
    mounts: Vec<MountSpec>,
    prev_cpu: Option<CpuTimes>,
    cpu_smoothed: f64,
}

impl<F: FileSystem> Collector<F> {
    /// Creates a new collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `mounts` - Mount points monitored for disk usage
    pub fn new(fs: F, proc_path: impl Into<String>, mounts: Vec<MountSpec>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            mounts,
            prev_cpu: None,
            cpu_smoothed: 0.0,
        }
    }

    /// Returns the smoothed CPU percent from the last collection.
    pub fn cpu_smoothed(&self) -> f64 {
        self.cpu_smoothed
    }

    /// Collects a complete host snapshot.
    ///
    /// Reads CPU, memory, swap, per-interface network counters, per-device
    /// disk counters, and usage for every configured mount. No partial
    /// snapshots: the first failed read aborts the call and leaves the CPU
    /// running state untouched.
    pub fn collect(&mut self) -> Result<Snapshot, CollectError> {
        let timestamp = Utc::now().timestamp();

        let stat_content = self.read_proc("stat")?;
        let mem_content = self.read_proc("meminfo")?;
        let vmstat_content = self.read_proc("vmstat")?;
        let net_content = self.read_proc("net/dev")?;
        let disk_content = self.read_proc("diskstats")?;

        let mut mounts = Vec::with_capacity(self.mounts.len());
        for spec in &self.mounts {
            let usage = self.fs.disk_usage(Path::new(&spec.path))?;
            mounts.push(MountUsageInfo {
                alias: spec.alias.clone(),
                path: spec.path.clone(),
                total: usage.total,
                used: usage.used,
                free: usage.free,
                percent: usage.percent,
            });
        }

        // All reads succeeded; now it is safe to advance the CPU state.
        let cpu_percent = self.update_cpu(parse_cpu_times(&stat_content)?);

        let mem_raw = parse_meminfo(&mem_content)?;
        let swap_raw = parse_vmstat(&vmstat_content)?;
        let (mem, swap) = build_memory(&mem_raw, &swap_raw);

        let nets = parse_net_dev(&net_content)?
            .into_iter()
            .map(|dev| NetIoInfo {
                name: dev.interface,
                bytes_sent: dev.tx_bytes,
                bytes_recv: dev.rx_bytes,
                packets_sent: dev.tx_packets,
                packets_recv: dev.rx_packets,
                errin: dev.rx_errs,
                errout: dev.tx_errs,
                dropin: dev.rx_drop,
                dropout: dev.tx_drop,
            })
            .collect::<Vec<_>>();

        let disks = parse_diskstats(&disk_content)?
            .into_iter()
            .map(|disk| DiskIoInfo {
                device: disk.device,
                read_count: disk.reads,
                write_count: disk.writes,
                read_bytes: disk.read_sectors * SECTOR_SIZE,
                write_bytes: disk.write_sectors * SECTOR_SIZE,
                read_time: disk.read_time,
                write_time: disk.write_time,
            })
            .collect::<Vec<_>>();

        debug!(
            interfaces = nets.len(),
            disks = disks.len(),
            mounts = mounts.len(),
            cpu_percent,
            "collected host snapshot"
        );

        Ok(Snapshot {
            timestamp,
            cpu_percent,
            mem,
            swap,
            nets,
            disks,
            mounts,
        })
    }

    fn read_proc(&self, name: &str) -> Result<String, CollectError> {
        let path = format!("{}/{}", self.proc_path, name);
        Ok(self.fs.read_to_string(Path::new(&path))?)
    }

    /// Derives an instantaneous CPU percent from jiffies deltas against the
    /// previous reading (0.0 on the first call) and folds it into the
    /// running average.
    fn update_cpu(&mut self, times: CpuTimes) -> f64 {
        let instant = match self.prev_cpu {
            Some(prev) => {
                let busy = times.busy().saturating_sub(prev.busy());
                let total = times.total().saturating_sub(prev.total());
                if total == 0 {
                    0.0
                } else {
                    busy as f64 / total as f64 * 100.0
                }
            }
            None => 0.0,
        };
        self.prev_cpu = Some(times);
        self.cpu_smoothed = ewma(self.cpu_smoothed, instant);
        self.cpu_smoothed
    }
}

/// Converts raw meminfo kilobytes and vmstat pages into byte-valued stats.
fn build_memory(
    mem: &crate::collector::parser::MemInfo,
    swap: &crate::collector::parser::SwapActivity,
) -> (MemVirtualInfo, MemSwapInfo) {
    let kb = 1024u64;

    let total = mem.mem_total * kb;
    let free = mem.mem_free * kb;
    let available = mem.mem_available * kb;
    let buffers = mem.buffers * kb;
    let cached = mem.cached * kb;
    let used = total.saturating_sub(free + buffers + cached);
    let percent = if total == 0 {
        0.0
    } else {
        (total - available.min(total)) as f64 / total as f64 * 100.0
    };

    let virt = MemVirtualInfo {
        total,
        available,
        used,
        free,
        active: mem.active * kb,
        inactive: mem.inactive * kb,
        percent,
    };

    let swap_total = mem.swap_total * kb;
    let swap_free = mem.swap_free * kb;
    let swap_used = swap_total.saturating_sub(swap_free);
    let swap_percent = if swap_total == 0 {
        0.0
    } else {
        swap_used as f64 / swap_total as f64 * 100.0
    };

    let swap_info = MemSwapInfo {
        total: swap_total,
        used: swap_used,
        free: swap_free,
        percent: swap_percent,
        sin: swap.pswpin * PAGE_SIZE,
        sout: swap.pswpout * PAGE_SIZE,
    };

    (virt, swap_info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    fn stat_line(user: u64, idle: u64) -> String {
        format!("cpu  {} 0 0 {} 0 0 0 0 0 0\nctxt 500000\n", user, idle)
    }

    #[test]
    fn collect_produces_full_snapshot() {
        let fs = MockFs::typical_host();
        let mut collector = Collector::new(
            fs,
            "/proc",
            vec![MountSpec::new("rootfs", "/"), MountSpec::new("data", "/var")],
        );

        let snapshot = collector.collect().unwrap();

        assert_eq!(snapshot.nets.len(), 2);
        assert_eq!(snapshot.disks.len(), 3);
        assert_eq!(snapshot.mounts.len(), 2);
        assert_eq!(snapshot.mounts[0].alias, "rootfs");
        assert!(snapshot.mem.total > 0);
        assert!(snapshot.timestamp > 0);
    }

    #[test]
    fn meminfo_kilobytes_become_bytes() {
        let fs = MockFs::typical_host();
        let mut collector = Collector::new(fs, "/proc", Vec::new());

        let snapshot = collector.collect().unwrap();
        // typical_host reports MemTotal: 16384000 kB
        assert_eq!(snapshot.mem.total, 16384000 * 1024);
        assert_eq!(snapshot.mem.available, 2048000 * 1024);
    }

    #[test]
    fn swap_activity_counts_pages_as_bytes() {
        let fs = MockFs::typical_host();
        let mut collector = Collector::new(fs, "/proc", Vec::new());

        let snapshot = collector.collect().unwrap();
        // typical_host reports pswpin 100 / pswpout 200
        assert_eq!(snapshot.swap.sin, 100 * 4096);
        assert_eq!(snapshot.swap.sout, 200 * 4096);
    }

    #[test]
    fn disk_bytes_are_sectors_times_512() {
        let fs = MockFs::typical_host();
        let mut collector = Collector::new(fs, "/proc", Vec::new());

        let snapshot = collector.collect().unwrap();
        let sda = snapshot.disks.iter().find(|d| d.device == "sda").unwrap();
        assert_eq!(sda.read_bytes, 987654 * 512);
        assert_eq!(sda.write_bytes, 456789 * 512);
    }

    #[test]
    fn first_cycle_cpu_is_zero() {
        let fs = MockFs::typical_host();
        let mut collector = Collector::new(fs, "/proc", Vec::new());

        let snapshot = collector.collect().unwrap();
        assert_eq!(snapshot.cpu_percent, 0.0);
    }

    #[test]
    fn cpu_percent_follows_jiffies_delta_with_smoothing() {
        let fs = MockFs::typical_host();
        fs.add_file("/proc/stat", stat_line(1000, 9000));
        let mut collector = Collector::new(fs.clone(), "/proc", Vec::new());

        collector.collect().unwrap();

        // 500 busy of 1000 new jiffies: instantaneous 50%, smoothed 15%.
        fs.add_file("/proc/stat", stat_line(1500, 9500));
        let snapshot = collector.collect().unwrap();
        assert!((snapshot.cpu_percent - 15.0).abs() < 1e-9);
    }

    #[test]
    fn unchanged_jiffies_yield_zero_cpu() {
        let fs = MockFs::typical_host();
        let mut collector = Collector::new(fs, "/proc", Vec::new());

        collector.collect().unwrap();
        let snapshot = collector.collect().unwrap();
        assert_eq!(snapshot.cpu_percent, 0.0);
    }

    #[test]
    fn missing_resource_fails_whole_collection() {
        let fs = MockFs::typical_host();
        fs.remove_file("/proc/meminfo");
        let mut collector = Collector::new(fs, "/proc", Vec::new());

        let err = collector.collect().unwrap_err();
        assert!(matches!(err, CollectError::Io(_)));
    }

    #[test]
    fn unreadable_mount_fails_whole_collection() {
        let fs = MockFs::typical_host();
        let mut collector = Collector::new(
            fs,
            "/proc",
            vec![MountSpec::new("ghost", "/not/mounted/here")],
        );

        assert!(collector.collect().is_err());
    }

    #[test]
    fn failed_collection_leaves_cpu_state_untouched() {
        let fs = MockFs::typical_host();
        fs.add_file("/proc/stat", stat_line(1000, 9000));
        let mut collector = Collector::new(fs.clone(), "/proc", Vec::new());
        collector.collect().unwrap();

        fs.remove_file("/proc/meminfo");
        fs.add_file("/proc/stat", stat_line(2000, 9000));
        assert!(collector.collect().is_err());

        // The failed cycle must not have consumed the jiffies delta.
        fs.add_file(
            "/proc/meminfo",
            "MemTotal: 16384000 kB\nMemFree: 8192000 kB\nMemAvailable: 2048000 kB\n",
        );
        let snapshot = collector.collect().unwrap();
        // 1000 busy of 1000 new jiffies: instantaneous 100%, smoothed 30%.
        assert!((snapshot.cpu_percent - 30.0).abs() < 1e-9);
    }
}
