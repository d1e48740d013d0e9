//! fperf Metrics
//!
//! Append-only, thread-safe log of named timing samples.
//!
//! Every sample is kept for the lifetime of the store: there is no
//! retention limit, aggregation or downsampling. Readers always get a full
//! copy taken under the same lock writers append under, so a snapshot never
//! contains a half-written entry.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// One recorded sample
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Sample name, not unique
    pub name: String,
    pub value: f64,
    /// Monotonic clock reading taken when the sample was recorded
    pub timestamp: Instant,
}

/// Wire form of a [`Metric`]
///
/// `Instant` has no absolute meaning outside the process, so the timestamp is
/// exported as an offset from the store's creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    /// Milliseconds between store creation and the sample
    pub elapsed_ms: f64,
}

/// Thread-safe sample log
#[derive(Debug)]
pub struct MetricsStore {
    samples: Mutex<Vec<Metric>>,
    epoch: Instant,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            epoch: Instant::now(),
        }
    }

    /// Append a sample stamped with the current monotonic time
    pub fn record(&self, name: impl Into<String>, value: f64) {
        let metric = Metric {
            name: name.into(),
            value,
            timestamp: Instant::now(),
        };
        self.lock().push(metric);
    }

    /// Full copy of every sample, in recording order
    pub fn snapshot(&self) -> Vec<Metric> {
        self.lock().clone()
    }

    /// Copy of the samples with the given name, in recording order
    pub fn samples_named(&self, name: &str) -> Vec<Metric> {
        self.lock()
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot converted to [`MetricSample`]s
    pub fn export(&self) -> Vec<MetricSample> {
        self.lock()
            .iter()
            .map(|m| MetricSample {
                name: m.name.clone(),
                value: m.value,
                elapsed_ms: m.timestamp.saturating_duration_since(self.epoch).as_secs_f64() * 1000.0,
            })
            .collect()
    }

    /// Instant the store was created; exported offsets are relative to it
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    // A push cannot leave the vector half-updated, so a poisoned lock still
    // guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<Metric>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}
