//! Host metrics collection for Linux.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                      Collector                        │
//! │   - /proc/stat (cpu percent + EWMA)                   │
//! │   - /proc/meminfo, /proc/vmstat                       │
//! │   - /proc/net/dev, /proc/diskstats                    │
//! │   - disk usage per configured mount                   │
//! │                    ┌──────▼──────┐                    │
//! │                    │  FileSystem │ (trait)            │
//! │                    └──────┬──────┘                    │
//! └───────────────────────────┼───────────────────────────┘
//!                  ┌──────────┴──────────┐
//!           ┌──────▼──────┐       ┌──────▼──────┐
//!           │   RealFs    │       │   MockFs    │
//!           │ (Linux)     │       │ (testing)   │
//!           └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hostbeat::collector::{Collector, RealFs};
//!
//! let mut collector = Collector::new(RealFs::new(), "/proc", Vec::new());
//! let snapshot = collector.collect()?;
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod parser;
pub mod traits;

pub use collector::{CollectError, Collector};
pub use mock::MockFs;
pub use parser::ParseError;
pub use traits::{FileSystem, RealFs};
