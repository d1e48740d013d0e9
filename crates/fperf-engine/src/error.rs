//! Engine errors

use crate::pipeline::StageKind;

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Page already submitted: {0}")]
    DuplicatePage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Task scheduler error
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler already started")]
    AlreadyStarted,

    #[error("Scheduler is stopped")]
    Stopped,

    #[error("Task queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Render pipeline error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: StageKind, reason: String },

    #[error("{stage} stage panicked: {message}")]
    StagePanicked { stage: StageKind, message: String },
}
