//! Periodic host-health sampling for Linux.
//!
//! `hostbeat` turns raw `/proc` counters into per-cycle health reports. Each
//! cycle the [`HealthSampler`] collects a frozen [`Snapshot`] of CPU, memory,
//! swap, network, disk I/O, and mount usage readings, feeds every value
//! through a registered meter (delta for cumulative counters, typed gauge for
//! instantaneous ones), and derives two outputs for the hosting agent: a
//! [`Health`] classification driven by available memory, and a `use_rate`
//! score combining smoothed CPU and network utilization.
//!
//! The sampler never schedules itself. The caller invokes
//! [`HealthSampler::run`] at its own interval; a failed cycle is logged and
//! skipped, never retried.
//!
//! ```ignore
//! use hostbeat::{HealthSampler, RealFs, SamplerConfig};
//!
//! let mut sampler = HealthSampler::new(RealFs::new(), "/proc", SamplerConfig::default())?;
//! if let Some(report) = sampler.run() {
//!     println!("{} use_rate={:.1}", report.health, report.use_rate);
//! }
//! ```

pub mod collector;
pub mod config;
pub mod meter;
pub mod model;
pub mod sampler;

pub use collector::{CollectError, Collector, FileSystem, MockFs, RealFs};
pub use config::{ConfigError, MountSpec, SamplerConfig};
pub use model::{CycleLoad, Health, HealthReport, Snapshot};
pub use sampler::{HealthSampler, SampleError};
