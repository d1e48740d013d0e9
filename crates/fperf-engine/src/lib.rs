//! fperf Engine
//!
//! Page store, render pipeline scheduler and accessibility scans.
//!
//! # Components
//! - [`TaskScheduler`]: fixed pool of worker threads over a FIFO queue
//! - [`RenderPipeline`]: parse, layout, paint and composite stages, timed
//! - [`Engine`]: page table, pipeline orchestration, metrics
//! - [`EngineEndpoint`]: the surface a transport layer talks to
//!
//! # Example
//! ```rust,ignore
//! use fperf_engine::{Config, Engine, dom::{Node, Page}};
//!
//! let engine = Engine::new(Config::default())?;
//! engine.start()?;
//!
//! let page = Page::new("https://example.com").with_root(Node::new("img").with_id("hero"));
//! let id = engine.submit_page(page)?;
//! engine.run_render_pipeline(&id)?;
//! let issues = engine.analyze_accessibility(&id)?;
//!
//! engine.stop();
//! let samples = engine.metrics();
//! ```

mod config;
mod endpoint;
mod engine;
mod error;
pub mod pipeline;
pub mod scheduler;

pub use config::{Config, QueueConfig, SaturationPolicy, StageDurations, default_worker_count};
pub use endpoint::EngineEndpoint;
pub use engine::Engine;
pub use error::{EngineError, PipelineError, SchedulerError};
pub use pipeline::{PipelineTiming, RenderPipeline, RenderStage, SimulatedStage, StageKind, StageResult};
pub use scheduler::{QueueDepthProbe, SchedulerState, SchedulerStats, Task, TaskScheduler};

// Re-export component crates
pub use fperf_a11y as a11y;
pub use fperf_dom as dom;
pub use fperf_metrics as metrics;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
