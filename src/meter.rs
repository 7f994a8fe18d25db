//! Per-metric smoothing state.
//!
//! Two kinds of meters cover every metric the sampler tracks:
//! - `Delta` converts a monotonically increasing OS counter into a per-cycle
//!   increment.
//! - `IntGauge` / `FloatGauge` store an instantaneous reading cast to the
//!   declared type and return it unchanged.
//!
//! Meters are keyed by dotted names (`eth0.bytes_sent`, `mem.virtual.used`)
//! in a [`MeterStore`] owned exclusively by the sampler.

use std::collections::HashMap;

use chrono::Utc;

/// Weight of the previous value in the exponential moving average.
pub const EWMA_PREV_WEIGHT: f64 = 0.7;
/// Weight of the new reading in the exponential moving average.
pub const EWMA_NEW_WEIGHT: f64 = 0.3;

/// Folds a new reading into a running exponential moving average.
///
/// Used for the smoothed CPU percent (in the collector) and the smoothed
/// network utilization (in the sampler), both seeded at 0.0.
pub fn ewma(prev: f64, new: f64) -> f64 {
    prev * EWMA_PREV_WEIGHT + new * EWMA_NEW_WEIGHT
}

/// A raw metric reading, either integral or floating-point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(u64),
    Float(f64),
}

impl Value {
    /// Coerces the reading to u64, truncating a float.
    pub fn as_u64(self) -> u64 {
        match self {
            Value::Int(v) => v,
            Value::Float(v) => v as u64,
        }
    }

    /// Coerces the reading to f64.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }
}

/// Per-key tracker state.
#[derive(Debug, Clone)]
pub enum Meter {
    /// Delta meter for cumulative counters.
    Delta { last: u64, last_update: i64 },
    /// Typed pass-through for integral gauges.
    IntGauge { last: u64, last_update: i64 },
    /// Typed pass-through for floating-point gauges.
    FloatGauge { last: f64, last_update: i64 },
}

impl Meter {
    /// Creates a delta meter seeded with the first observed counter value.
    pub fn delta(seed: u64) -> Self {
        Meter::Delta {
            last: seed,
            last_update: now_ms(),
        }
    }

    /// Creates an integer gauge seeded with the first observed value.
    pub fn int_gauge(seed: u64) -> Self {
        Meter::IntGauge {
            last: seed,
            last_update: now_ms(),
        }
    }

    /// Creates a floating-point gauge seeded with the first observed value.
    pub fn float_gauge(seed: f64) -> Self {
        Meter::FloatGauge {
            last: seed,
            last_update: now_ms(),
        }
    }

    /// Feeds a new raw reading and returns the derived value.
    ///
    /// Delta meters return `|new - last|`. A counter reset or wraparound is
    /// therefore reported as one large positive delta, not a corrected short
    /// one; this masking is inherited behavior, kept as-is.
    pub fn update(&mut self, value: Value) -> Value {
        let ts = now_ms();
        match self {
            Meter::Delta { last, last_update } => {
                let v = value.as_u64();
                let delta = last.abs_diff(v);
                *last = v;
                *last_update = ts;
                Value::Int(delta)
            }
            Meter::IntGauge { last, last_update } => {
                let v = value.as_u64();
                *last = v;
                *last_update = ts;
                Value::Int(v)
            }
            Meter::FloatGauge { last, last_update } => {
                let v = value.as_f64();
                *last = v;
                *last_update = ts;
                Value::Float(v)
            }
        }
    }

    /// Returns the stored value without updating it.
    pub fn last(&self) -> Value {
        match self {
            Meter::Delta { last, .. } | Meter::IntGauge { last, .. } => Value::Int(*last),
            Meter::FloatGauge { last, .. } => Value::Float(*last),
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Error returned when updating a key that was never registered.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownMetric {
    pub key: String,
}

impl std::fmt::Display for UnknownMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown metric key: {}", self.key)
    }
}

impl std::error::Error for UnknownMetric {}

/// Mapping from dotted metric keys to their meters.
///
/// One instance per sampler; registration inserts, processing updates.
/// Keys are fixed after registration: entries are never added or removed
/// within a run.
#[derive(Debug, Default)]
pub struct MeterStore {
    meters: HashMap<String, Meter>,
}

impl MeterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a meter under the given key.
    pub fn insert(&mut self, key: impl Into<String>, meter: Meter) {
        self.meters.insert(key.into(), meter);
    }

    /// Returns true if the key has a registered meter.
    pub fn contains(&self, key: &str) -> bool {
        self.meters.contains_key(key)
    }

    /// Returns the meter for a key, if registered.
    pub fn get(&self, key: &str) -> Option<&Meter> {
        self.meters.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    /// Feeds a raw reading through the meter registered for `key`.
    ///
    /// Fails with [`UnknownMetric`] for unregistered keys; values are never
    /// silently defaulted.
    pub fn update(&mut self, key: &str, value: Value) -> Result<Value, UnknownMetric> {
        match self.meters.get_mut(key) {
            Some(meter) => Ok(meter.update(value)),
            None => Err(UnknownMetric {
                key: key.to_string(),
            }),
        }
    }

    /// Updates an integer-valued meter and returns the derived u64.
    pub fn update_u64(&mut self, key: &str, value: u64) -> Result<u64, UnknownMetric> {
        Ok(self.update(key, Value::Int(value))?.as_u64())
    }

    /// Updates a float-valued meter and returns the derived f64.
    pub fn update_f64(&mut self, key: &str, value: f64) -> Result<f64, UnknownMetric> {
        Ok(self.update(key, Value::Float(value))?.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_meter_returns_absolute_increment() {
        let mut m = Meter::delta(100);
        assert_eq!(m.update(Value::Int(150)), Value::Int(50));
        assert_eq!(m.last(), Value::Int(150));
        assert_eq!(m.update(Value::Int(175)), Value::Int(25));
        assert_eq!(m.last(), Value::Int(175));
    }

    #[test]
    fn delta_meter_identical_reading_yields_zero() {
        let mut m = Meter::delta(42);
        assert_eq!(m.update(Value::Int(42)), Value::Int(0));
        assert_eq!(m.update(Value::Int(42)), Value::Int(0));
    }

    #[test]
    fn delta_meter_masks_counter_reset() {
        // A counter restarting near zero produces one large positive delta,
        // not a corrected short one. Documented inherited behavior.
        let mut m = Meter::delta(1_000_000);
        assert_eq!(m.update(Value::Int(10)), Value::Int(999_990));
        assert_eq!(m.update(Value::Int(20)), Value::Int(10));
    }

    #[test]
    fn int_gauge_passes_value_through() {
        let mut m = Meter::int_gauge(5);
        assert_eq!(m.update(Value::Int(9)), Value::Int(9));
        // No memory of the seed, no smoothing.
        assert_eq!(m.update(Value::Int(3)), Value::Int(3));
    }

    #[test]
    fn int_gauge_truncates_float_input() {
        let mut m = Meter::int_gauge(0);
        assert_eq!(m.update(Value::Float(7.9)), Value::Int(7));
    }

    #[test]
    fn float_gauge_widens_int_input() {
        let mut m = Meter::float_gauge(0.0);
        assert_eq!(m.update(Value::Int(12)), Value::Float(12.0));
        assert_eq!(m.update(Value::Float(3.25)), Value::Float(3.25));
    }

    #[test]
    fn store_update_fails_for_unregistered_key() {
        let mut store = MeterStore::new();
        store.insert("cpu", Meter::float_gauge(0.0));

        assert!(store.update_f64("cpu", 1.0).is_ok());
        let err = store.update_u64("eth0.bytes_sent", 10).unwrap_err();
        assert_eq!(err.key, "eth0.bytes_sent");
    }

    #[test]
    fn ewma_converges_monotonically_under_constant_input() {
        let target = 80.0;
        let mut smoothed = 0.0;
        let mut prev = smoothed;
        for _ in 0..50 {
            smoothed = ewma(smoothed, target);
            // Monotone approach, bounded by [previous, target].
            assert!(smoothed > prev);
            assert!(smoothed <= target);
            prev = smoothed;
        }
        assert!((target - smoothed) < 1e-5);
    }

    #[test]
    fn ewma_single_deviation_stays_within_bounds() {
        let smoothed = ewma(50.0, 10.0);
        assert!(smoothed >= 10.0 && smoothed <= 50.0);
        assert!((smoothed - 38.0).abs() < 1e-9);
    }
}
