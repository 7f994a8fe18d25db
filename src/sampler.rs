//! Health sampler: registration, per-cycle processing, and the `run()`
//! entry point.
//!
//! The sampler owns the meter store and the smoothed network utilization.
//! Cycles are strictly sequential: one `run()` at a time per instance, no
//! internal scheduling, no retries. The hosting agent drives the interval.

use tracing::{debug, error, info};

use crate::collector::{CollectError, Collector, FileSystem};
use crate::config::{ConfigError, SamplerConfig};
use crate::meter::{Meter, MeterStore, UnknownMetric, ewma};
use crate::model::{
    CycleLoad, DiskIoInfo, Health, HealthReport, MemSwapInfo, MemVirtualInfo, MountUsageInfo,
    NetIoInfo, Snapshot,
};

/// Error from a sampling cycle.
#[derive(Debug)]
pub enum SampleError {
    /// The snapshot could not be collected; the cycle was aborted.
    Collect(CollectError),
    /// A raw value had no registered meter.
    UnknownMetric(String),
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::Collect(e) => write!(f, "collection failed: {}", e),
            SampleError::UnknownMetric(key) => write!(f, "unknown metric key: {}", key),
        }
    }
}

impl std::error::Error for SampleError {}

impl From<CollectError> for SampleError {
    fn from(e: CollectError) -> Self {
        SampleError::Collect(e)
    }
}

impl From<UnknownMetric> for SampleError {
    fn from(e: UnknownMetric) -> Self {
        SampleError::UnknownMetric(e.key)
    }
}

/// Periodic host-health sampler.
///
/// Wraps a [`Collector`] and a [`MeterStore`]: each cycle collects a frozen
/// snapshot, feeds every raw value through its meter, and derives the
/// health classification and aggregate use rate handed to the caller.
pub struct HealthSampler<F: FileSystem> {
    config: SamplerConfig,
    collector: Collector<F>,
    meters: MeterStore,
    /// Smoothed network utilization percent, seeded at 0.0.
    net_smoothed: f64,
}

impl<F: FileSystem> HealthSampler<F> {
    /// Creates a sampler over the given metrics provider.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    /// * `config` - Sampling configuration, validated here
    pub fn new(
        fs: F,
        proc_path: impl Into<String>,
        config: SamplerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let collector = Collector::new(fs, proc_path, config.mounts.clone());
        Ok(Self {
            config,
            collector,
            meters: MeterStore::new(),
            net_smoothed: 0.0,
        })
    }

    /// Runs one sampling cycle and returns the health report.
    ///
    /// A failed cycle is logged at error severity and yields `None`: the
    /// cycle is skipped, no meter is mutated, and the caller is expected to
    /// tolerate the missing result.
    pub fn run(&mut self) -> Option<HealthReport> {
        debug!("starting collection cycle");
        match self.sample() {
            Ok(load) => {
                debug!(health = %load.health, use_rate = load.use_rate, "cycle complete");
                Some(load.report())
            }
            Err(e) => {
                error!(error = %e, "sampling cycle failed, skipping");
                None
            }
        }
    }

    /// Collects and processes one cycle, registering the metric key space
    /// on the first successful collection.
    pub fn sample(&mut self) -> Result<CycleLoad, SampleError> {
        let snapshot = self.collector.collect()?;
        if self.meters.is_empty() {
            self.register(&snapshot);
        }
        self.process(&snapshot)
    }

    /// Builds one meter per metric discovered in the snapshot, seeded with
    /// the first observed value.
    ///
    /// Called exactly once per sampler lifetime, before the first
    /// [`process`](Self::process). Calling it again would re-seed every
    /// delta meter and must not happen within a run.
    pub fn register(&mut self, snapshot: &Snapshot) {
        let m = &mut self.meters;

        m.insert("cpu", Meter::float_gauge(snapshot.cpu_percent));

        m.insert("mem.virtual.total", Meter::int_gauge(snapshot.mem.total));
        m.insert(
            "mem.virtual.available",
            Meter::int_gauge(snapshot.mem.available),
        );
        m.insert("mem.virtual.used", Meter::int_gauge(snapshot.mem.used));
        m.insert("mem.virtual.free", Meter::int_gauge(snapshot.mem.free));
        m.insert("mem.virtual.active", Meter::int_gauge(snapshot.mem.active));
        m.insert(
            "mem.virtual.inactive",
            Meter::int_gauge(snapshot.mem.inactive),
        );
        m.insert(
            "mem.virtual.percent",
            Meter::float_gauge(snapshot.mem.percent),
        );

        m.insert("mem.swap.total", Meter::int_gauge(snapshot.swap.total));
        m.insert("mem.swap.used", Meter::int_gauge(snapshot.swap.used));
        m.insert("mem.swap.free", Meter::int_gauge(snapshot.swap.free));
        m.insert("mem.swap.percent", Meter::float_gauge(snapshot.swap.percent));
        m.insert("mem.swap.sin", Meter::int_gauge(snapshot.swap.sin));
        m.insert("mem.swap.sout", Meter::int_gauge(snapshot.swap.sout));

        for net in &snapshot.nets {
            let ns = &net.name;
            m.insert(format!("{ns}.bytes_sent"), Meter::delta(net.bytes_sent));
            m.insert(format!("{ns}.bytes_recv"), Meter::delta(net.bytes_recv));
            m.insert(format!("{ns}.packets_sent"), Meter::delta(net.packets_sent));
            m.insert(format!("{ns}.packets_recv"), Meter::delta(net.packets_recv));
            m.insert(format!("{ns}.errin"), Meter::delta(net.errin));
            m.insert(format!("{ns}.errout"), Meter::delta(net.errout));
            m.insert(format!("{ns}.dropin"), Meter::delta(net.dropin));
            m.insert(format!("{ns}.dropout"), Meter::delta(net.dropout));
        }

        for disk in &snapshot.disks {
            let ns = &disk.device;
            m.insert(format!("{ns}.read_count"), Meter::delta(disk.read_count));
            m.insert(format!("{ns}.write_count"), Meter::delta(disk.write_count));
            m.insert(format!("{ns}.read_bytes"), Meter::delta(disk.read_bytes));
            m.insert(format!("{ns}.write_bytes"), Meter::delta(disk.write_bytes));
            m.insert(format!("{ns}.read_time"), Meter::delta(disk.read_time));
            m.insert(format!("{ns}.write_time"), Meter::delta(disk.write_time));
        }

        for mount in &snapshot.mounts {
            let ns = &mount.alias;
            m.insert(format!("{ns}.total"), Meter::int_gauge(mount.total));
            m.insert(format!("{ns}.used"), Meter::int_gauge(mount.used));
            m.insert(format!("{ns}.free"), Meter::int_gauge(mount.free));
            m.insert(format!("{ns}.percent"), Meter::float_gauge(mount.percent));
        }

        debug!(meters = m.len(), "registered metric key space");
    }

    /// Feeds every raw value through its meter and derives the cycle load.
    ///
    /// Fails with a lookup error when a fixed key (cpu, memory, swap,
    /// configured mounts) is unregistered. Interfaces and disks that appear
    /// after registration are skipped: the dynamic key space is fixed at
    /// first observation, and meters of devices that disappear simply go
    /// stale.
    pub fn process(&mut self, snapshot: &Snapshot) -> Result<CycleLoad, SampleError> {
        let m = &mut self.meters;

        let cpu = m.update_f64("cpu", snapshot.cpu_percent)?;

        let mem = MemVirtualInfo {
            total: m.update_u64("mem.virtual.total", snapshot.mem.total)?,
            available: m.update_u64("mem.virtual.available", snapshot.mem.available)?,
            used: m.update_u64("mem.virtual.used", snapshot.mem.used)?,
            free: m.update_u64("mem.virtual.free", snapshot.mem.free)?,
            active: m.update_u64("mem.virtual.active", snapshot.mem.active)?,
            inactive: m.update_u64("mem.virtual.inactive", snapshot.mem.inactive)?,
            percent: m.update_f64("mem.virtual.percent", snapshot.mem.percent)?,
        };

        let swap = MemSwapInfo {
            total: m.update_u64("mem.swap.total", snapshot.swap.total)?,
            used: m.update_u64("mem.swap.used", snapshot.swap.used)?,
            free: m.update_u64("mem.swap.free", snapshot.swap.free)?,
            percent: m.update_f64("mem.swap.percent", snapshot.swap.percent)?,
            sin: m.update_u64("mem.swap.sin", snapshot.swap.sin)?,
            sout: m.update_u64("mem.swap.sout", snapshot.swap.sout)?,
        };

        let mut nets = Vec::with_capacity(snapshot.nets.len());
        for raw in &snapshot.nets {
            let ns = &raw.name;
            if !m.contains(&format!("{ns}.bytes_sent")) {
                debug!(interface = %ns, "skipping interface not present at registration");
                continue;
            }
            nets.push(NetIoInfo {
                name: raw.name.clone(),
                bytes_sent: m.update_u64(&format!("{ns}.bytes_sent"), raw.bytes_sent)?,
                bytes_recv: m.update_u64(&format!("{ns}.bytes_recv"), raw.bytes_recv)?,
                packets_sent: m.update_u64(&format!("{ns}.packets_sent"), raw.packets_sent)?,
                packets_recv: m.update_u64(&format!("{ns}.packets_recv"), raw.packets_recv)?,
                errin: m.update_u64(&format!("{ns}.errin"), raw.errin)?,
                errout: m.update_u64(&format!("{ns}.errout"), raw.errout)?,
                dropin: m.update_u64(&format!("{ns}.dropin"), raw.dropin)?,
                dropout: m.update_u64(&format!("{ns}.dropout"), raw.dropout)?,
            });
        }

        let mut disks = Vec::with_capacity(snapshot.disks.len());
        for raw in &snapshot.disks {
            let ns = &raw.device;
            if !m.contains(&format!("{ns}.read_count")) {
                debug!(device = %ns, "skipping device not present at registration");
                continue;
            }
            disks.push(DiskIoInfo {
                device: raw.device.clone(),
                read_count: m.update_u64(&format!("{ns}.read_count"), raw.read_count)?,
                write_count: m.update_u64(&format!("{ns}.write_count"), raw.write_count)?,
                read_bytes: m.update_u64(&format!("{ns}.read_bytes"), raw.read_bytes)?,
                write_bytes: m.update_u64(&format!("{ns}.write_bytes"), raw.write_bytes)?,
                read_time: m.update_u64(&format!("{ns}.read_time"), raw.read_time)?,
                write_time: m.update_u64(&format!("{ns}.write_time"), raw.write_time)?,
            });
        }

        let mut mounts = Vec::with_capacity(snapshot.mounts.len());
        for raw in &snapshot.mounts {
            let ns = &raw.alias;
            mounts.push(MountUsageInfo {
                alias: raw.alias.clone(),
                path: raw.path.clone(),
                total: m.update_u64(&format!("{ns}.total"), raw.total)?,
                used: m.update_u64(&format!("{ns}.used"), raw.used)?,
                free: m.update_u64(&format!("{ns}.free"), raw.free)?,
                percent: m.update_f64(&format!("{ns}.percent"), raw.percent)?,
            });
        }

        let health = if mem.available < self.config.oom_threshold_bytes {
            error!(
                available = mem.available,
                threshold = self.config.oom_threshold_bytes,
                "available memory below out-of-memory threshold"
            );
            Health::Unhealthy
        } else {
            Health::Healthy
        };

        let net_instant = self.net_utilization(&nets);
        if let Some(instant) = net_instant {
            self.net_smoothed = ewma(self.net_smoothed, instant);
        }
        let use_rate = cpu.max(self.net_smoothed);

        if cpu > self.config.load_threshold_percent {
            info!(
                cpu,
                threshold = self.config.load_threshold_percent,
                "cpu utilization above threshold"
            );
        }
        if let Some(instant) = net_instant
            && instant > self.config.load_threshold_percent
        {
            info!(
                utilization = instant,
                threshold = self.config.load_threshold_percent,
                "network utilization above threshold"
            );
        }

        Ok(CycleLoad {
            cpu,
            mem,
            swap,
            nets,
            disks,
            mounts,
            health,
            use_rate,
        })
    }

    /// Instantaneous send utilization of the monitored interface as a
    /// percentage of its nominal capacity over the sampling interval.
    ///
    /// `None` when no interface is configured or the interface is absent
    /// from this cycle; the smoothed value is then left untouched.
    fn net_utilization(&self, nets: &[NetIoInfo]) -> Option<f64> {
        let name = self.config.interface.as_deref()?;
        let net = nets.iter().find(|n| n.name == name)?;
        Some(
            net.bytes_sent as f64 * 100.0 * 8.0
                / self.config.interval_secs as f64
                / self.config.interface_speed_bits as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;
    use crate::config::MountSpec;
    use crate::model::DiskUsage;

    /// MemAvailable of `MockFs::typical_host()`, in bytes.
    const TYPICAL_AVAILABLE: u64 = 2048000 * 1024;

    fn net_dev(eth0_tx_bytes: u64) -> String {
        format!(
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 12345678     9876    0    0    0     0          0         0 12345678     9876    0    0    0     0       0          0
  eth0: 987654321   654321    5   10    0     0          0       100 {eth0_tx_bytes}   456789    2    5    0     0       0          0
"
        )
    }

    fn sampler(fs: MockFs, config: SamplerConfig) -> HealthSampler<MockFs> {
        HealthSampler::new(fs, "/proc", config).unwrap()
    }

    #[test]
    fn construction_validates_config() {
        let cfg = SamplerConfig {
            interface: Some("eth0".to_string()),
            ..Default::default()
        };
        assert!(HealthSampler::new(MockFs::typical_host(), "/proc", cfg).is_err());
    }

    #[test]
    fn first_cycle_registers_and_reports_zero_deltas() {
        let cfg = SamplerConfig {
            mounts: vec![MountSpec::new("rootfs", "/")],
            ..Default::default()
        };
        let mut s = sampler(MockFs::typical_host(), cfg);

        let load = s.sample().unwrap();
        assert_eq!(load.health, Health::Healthy);
        assert_eq!(load.use_rate, 0.0);

        // Counters were registered and processed from the same snapshot.
        let eth0 = load.nets.iter().find(|n| n.name == "eth0").unwrap();
        assert_eq!(eth0.bytes_sent, 0);
        assert_eq!(eth0.packets_recv, 0);
        let sda = load.disks.iter().find(|d| d.device == "sda").unwrap();
        assert_eq!(sda.read_count, 0);

        // Gauges pass through the observed values.
        assert_eq!(load.mem.available, TYPICAL_AVAILABLE);
        assert_eq!(load.mounts[0].alias, "rootfs");
        assert_eq!(load.mounts[0].used, 40_000_000_000);
    }

    #[test]
    fn identical_snapshots_keep_deltas_at_zero() {
        let mut s = sampler(MockFs::typical_host(), SamplerConfig::default());

        let first = s.sample().unwrap();
        let second = s.sample().unwrap();

        for net in &second.nets {
            assert_eq!(net.bytes_sent, 0);
            assert_eq!(net.bytes_recv, 0);
            assert_eq!(net.errin, 0);
        }
        for disk in &second.disks {
            assert_eq!(disk.read_bytes, 0);
            assert_eq!(disk.write_time, 0);
        }
        assert_eq!(second.mem, first.mem);
        assert_eq!(second.swap, first.swap);
    }

    #[test]
    fn process_before_registration_fails_with_lookup_error() {
        let mut s = sampler(MockFs::typical_host(), SamplerConfig::default());

        let err = s.process(&Snapshot::default()).unwrap_err();
        match err {
            SampleError::UnknownMetric(key) => assert_eq!(key, "cpu"),
            other => panic!("expected UnknownMetric, got {:?}", other),
        }
    }

    #[test]
    fn use_rate_without_interface_tracks_cpu() {
        let fs = MockFs::typical_host();
        fs.add_file("/proc/stat", "cpu  1000 0 0 9000 0 0 0 0 0 0\n");
        let mut s = sampler(fs.clone(), SamplerConfig::default());

        s.sample().unwrap();

        fs.add_file("/proc/stat", "cpu  1800 0 0 9200 0 0 0 0 0 0\n");
        let load = s.sample().unwrap();

        assert!(load.cpu > 0.0);
        assert_eq!(load.use_rate, load.cpu);
    }

    #[test]
    fn network_utilization_end_to_end() {
        let base_tx: u64 = 123456789;
        let fs = MockFs::typical_host();
        let cfg = SamplerConfig {
            interface: Some("eth0".to_string()),
            interface_speed_bits: 1_000_000_000,
            interval_secs: 5,
            ..Default::default()
        };
        let mut s = sampler(fs.clone(), cfg);

        s.sample().unwrap();

        // 6_250_000 B over 5 s on a 1 Gbit link: instantaneous 1.0%.
        fs.add_file("/proc/net/dev", net_dev(base_tx + 6_250_000));
        let load = s.sample().unwrap();

        let eth0 = load.nets.iter().find(|n| n.name == "eth0").unwrap();
        assert_eq!(eth0.bytes_sent, 6_250_000);
        // Smoothing seeded at 0: 0.7 * 0 + 0.3 * 1.0 = 0.3%.
        assert!((load.use_rate - 0.3).abs() < 1e-9);
        assert_eq!(load.health, Health::Healthy);
    }

    #[test]
    fn configured_interface_absent_from_snapshot_leaves_cpu_only_rate() {
        let cfg = SamplerConfig {
            interface: Some("eth9".to_string()),
            interface_speed_bits: 1_000_000_000,
            ..Default::default()
        };
        let mut s = sampler(MockFs::typical_host(), cfg);

        let load = s.sample().unwrap();
        assert_eq!(load.use_rate, load.cpu);
    }

    #[test]
    fn low_available_memory_is_unhealthy() {
        let mut s = sampler(MockFs::low_memory_host(), SamplerConfig::default());

        let load = s.sample().unwrap();
        assert_eq!(load.health, Health::Unhealthy);
        assert_eq!(load.report().health, Health::Unhealthy);
    }

    #[test]
    fn health_threshold_is_strict_less_than() {
        // Available exactly at the threshold stays healthy.
        let cfg = SamplerConfig {
            oom_threshold_bytes: TYPICAL_AVAILABLE,
            ..Default::default()
        };
        let mut s = sampler(MockFs::typical_host(), cfg);
        assert_eq!(s.sample().unwrap().health, Health::Healthy);

        // One byte below the threshold flips to unhealthy.
        let cfg = SamplerConfig {
            oom_threshold_bytes: TYPICAL_AVAILABLE + 1,
            ..Default::default()
        };
        let mut s = sampler(MockFs::typical_host(), cfg);
        assert_eq!(s.sample().unwrap().health, Health::Unhealthy);
    }

    #[test]
    fn collection_failure_skips_cycle() {
        let fs = MockFs::typical_host();
        fs.remove_file("/proc/meminfo");
        let mut s = sampler(fs.clone(), SamplerConfig::default());

        assert!(s.run().is_none());

        fs.add_file(
            "/proc/meminfo",
            "MemTotal: 16384000 kB\nMemFree: 8192000 kB\nMemAvailable: 2048000 kB\n",
        );
        let report = s.run().unwrap();
        assert_eq!(report.health, Health::Healthy);
    }

    #[test]
    fn interface_appearing_after_registration_is_skipped() {
        let fs = MockFs::typical_host();
        let mut s = sampler(fs.clone(), SamplerConfig::default());

        s.sample().unwrap();

        let with_eth1 = format!(
            "{}  eth1: 1000 10 0 0 0 0 0 0 2000 20 0 0 0 0 0 0\n",
            net_dev(123456789)
        );
        fs.add_file("/proc/net/dev", with_eth1);

        let load = s.sample().unwrap();
        assert!(load.nets.iter().all(|n| n.name != "eth1"));
        assert_eq!(load.nets.len(), 2);
    }

    #[test]
    fn mount_gauges_follow_usage_changes() {
        let fs = MockFs::typical_host();
        let cfg = SamplerConfig {
            mounts: vec![MountSpec::new("rootfs", "/")],
            ..Default::default()
        };
        let mut s = sampler(fs.clone(), cfg);

        s.sample().unwrap();

        fs.add_usage("/", DiskUsage::new(100_000_000_000, 90_000_000_000, 5_000_000_000));
        let load = s.sample().unwrap();
        assert_eq!(load.mounts[0].used, 90_000_000_000);
        assert!((load.mounts[0].percent - 90_000.0 / 95_000.0 * 100.0).abs() < 1e-9);
    }
}
