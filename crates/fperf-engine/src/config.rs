//! Engine Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Engine configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of pipeline worker threads
    pub worker_count: usize,

    /// Task queue bound and saturation behavior
    pub queue: QueueConfig,

    /// Maximum stored pages; the oldest page is evicted past this.
    /// `None` keeps every page for the engine's lifetime.
    pub max_pages: Option<usize>,

    /// Durations of the simulated render stages
    pub stages: StageDurations,
}

impl Config {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_stages(mut self, stages: StageDurations) -> Self {
        self.stages = stages;
        self
    }

    /// Reject values that would leave the engine unable to make progress
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.worker_count == 0 {
            return Err(EngineError::InvalidConfig("worker_count must be at least 1".into()));
        }
        if self.queue.capacity == Some(0) {
            return Err(EngineError::InvalidConfig("queue.capacity must be at least 1".into()));
        }
        if self.max_pages == Some(0) {
            return Err(EngineError::InvalidConfig("max_pages must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue: QueueConfig::default(),
            max_pages: None,
            stages: StageDurations::default(),
        }
    }
}

/// Available hardware parallelism, at least 1
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Task queue bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum queued (not yet started) tasks; `None` is unbounded
    pub capacity: Option<usize>,
    /// What `enqueue` does when the queue is at capacity
    pub on_saturation: SaturationPolicy,
}

impl QueueConfig {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize, on_saturation: SaturationPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            on_saturation,
        }
    }
}

/// Behavior of a full bounded queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationPolicy {
    /// Wait until a worker frees a slot
    #[default]
    Block,
    /// Fail with `SchedulerError::QueueFull`
    Reject,
}

/// Simulated stage durations in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageDurations {
    pub parse_ms: u64,
    pub layout_ms: u64,
    pub paint_ms: u64,
    pub composite_ms: u64,
}

impl StageDurations {
    /// All stages take no time
    pub fn zero() -> Self {
        Self {
            parse_ms: 0,
            layout_ms: 0,
            paint_ms: 0,
            composite_ms: 0,
        }
    }

    pub fn parse(&self) -> Duration {
        Duration::from_millis(self.parse_ms)
    }

    pub fn layout(&self) -> Duration {
        Duration::from_millis(self.layout_ms)
    }

    pub fn paint(&self) -> Duration {
        Duration::from_millis(self.paint_ms)
    }

    pub fn composite(&self) -> Duration {
        Duration::from_millis(self.composite_ms)
    }
}

impl Default for StageDurations {
    fn default() -> Self {
        Self {
            parse_ms: 1,
            layout_ms: 1,
            paint_ms: 1,
            composite_ms: 2,
        }
    }
}
