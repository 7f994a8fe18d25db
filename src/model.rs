//! Data model for collected snapshots and processed cycle results.
//!
//! A [`Snapshot`] is one cycle's immutable bundle of raw OS readings. A
//! [`CycleLoad`] mirrors its shape after processing: cumulative counters are
//! replaced by per-cycle deltas, gauges pass through unchanged, and the
//! aggregate health classification and utilization score are attached.

use serde::{Deserialize, Serialize};

/// Virtual memory statistics.
///
/// All sizes in bytes. `used = total - free - buffers - cached`,
/// `percent = (total - available) / total * 100`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MemVirtualInfo {
    /// Total physical memory.
    pub total: u64,
    /// Memory available for starting new applications.
    pub available: u64,
    /// Memory in use.
    pub used: u64,
    /// Completely unused memory.
    pub free: u64,
    /// Recently used memory.
    pub active: u64,
    /// Memory not recently used, reclaimable first.
    pub inactive: u64,
    /// Usage percent derived from `available`.
    pub percent: f64,
}

/// Swap statistics.
///
/// `sin`/`sout` are cumulative bytes swapped in/out since boot
/// (`pswpin`/`pswpout` pages times the page size).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MemSwapInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    /// Bytes swapped in from disk.
    pub sin: u64,
    /// Bytes swapped out to disk.
    pub sout: u64,
}

/// Per-interface network I/O counters.
///
/// Raw values in a [`Snapshot`] are cumulative since boot; in a
/// [`CycleLoad`] every field holds the per-cycle delta instead.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct NetIoInfo {
    /// Interface name (eth0, lo, ...).
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    /// Inbound errors.
    pub errin: u64,
    /// Outbound errors.
    pub errout: u64,
    /// Inbound drops.
    pub dropin: u64,
    /// Outbound drops.
    pub dropout: u64,
}

/// Per-device disk I/O counters.
///
/// Raw values are cumulative since boot; in a [`CycleLoad`] every field
/// holds the per-cycle delta. Byte counts are sector counts times 512.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct DiskIoInfo {
    /// Device name (sda, nvme0n1, ...).
    pub device: String,
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    /// Time spent reading, milliseconds.
    pub read_time: u64,
    /// Time spent writing, milliseconds.
    pub write_time: u64,
}

/// Disk usage for one monitored mount point, keyed by its configured alias.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MountUsageInfo {
    /// Caller-supplied alias for this mount.
    pub alias: String,
    /// Filesystem path that was measured.
    pub path: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

/// Raw usage numbers for a filesystem path, as returned by statvfs.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    /// Bytes available to unprivileged users.
    pub free: u64,
    pub percent: f64,
}

impl DiskUsage {
    /// Builds a usage record, deriving the percent from `used` against the
    /// space visible to unprivileged users (`used + free`).
    pub fn new(total: u64, used: u64, free: u64) -> Self {
        let visible = used + free;
        let percent = if visible == 0 {
            0.0
        } else {
            used as f64 / visible as f64 * 100.0
        };
        Self {
            total,
            used,
            free,
            percent,
        }
    }
}

/// One cycle's frozen bundle of raw OS metric readings.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Snapshot {
    /// Collection time, seconds since epoch.
    pub timestamp: i64,
    /// CPU utilization percent, already smoothed by the collector's EWMA.
    pub cpu_percent: f64,
    pub mem: MemVirtualInfo,
    pub swap: MemSwapInfo,
    /// One entry per network interface.
    pub nets: Vec<NetIoInfo>,
    /// One entry per block device.
    pub disks: Vec<DiskIoInfo>,
    /// One entry per configured mount alias.
    pub mounts: Vec<MountUsageInfo>,
}

/// Host health classification.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    #[default]
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Health::Healthy => write!(f, "healthy"),
            Health::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// The per-cycle result handed to the surrounding agent.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct HealthReport {
    pub health: Health,
    /// Aggregate utilization score: max of smoothed CPU percent and smoothed
    /// network utilization percent.
    pub use_rate: f64,
}

/// Grouped per-cycle load, mirroring the snapshot shape.
///
/// Counter groups (`nets`, `disks`) hold per-cycle deltas; gauge groups hold
/// the pass-through values. Logged at debug level each cycle; the agent only
/// consumes the embedded health and use_rate.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CycleLoad {
    /// Smoothed CPU percent.
    pub cpu: f64,
    pub mem: MemVirtualInfo,
    pub swap: MemSwapInfo,
    pub nets: Vec<NetIoInfo>,
    pub disks: Vec<DiskIoInfo>,
    pub mounts: Vec<MountUsageInfo>,
    pub health: Health,
    pub use_rate: f64,
}

impl CycleLoad {
    /// Extracts the caller-facing report.
    pub fn report(&self) -> HealthReport {
        HealthReport {
            health: self.health,
            use_rate: self.use_rate,
        }
    }
}
