//! Render Pipeline
//!
//! Four ordered stages - parse, layout, paint, composite - each timed with
//! the monotonic clock. Stages are opaque: the engine ships
//! [`SimulatedStage`]s that only take time, and real implementations can be
//! swapped in through [`RenderStage`] without changing the metric names.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use fperf_dom::Page;
use fperf_metrics::MetricsStore;

use crate::config::StageDurations;
use crate::error::PipelineError;
use crate::scheduler::panic_message;

/// End-to-end latency of one pipeline run
pub const RENDER_PIPELINE_LATENCY_MS: &str = "render_pipeline_latency_ms";
/// Scheduler queue depth, sampled after each run
pub const TASK_QUEUE_DEPTH: &str = "task_queue_depth";
/// Recorded once per failed run instead of the timing samples
pub const RENDER_PIPELINE_FAILURES: &str = "render_pipeline_failures";

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Parse,
    Layout,
    Paint,
    Composite,
}

impl StageKind {
    /// Execution order
    pub const ALL: [StageKind; 4] = [Self::Parse, Self::Layout, Self::Paint, Self::Composite];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Layout => "layout",
            Self::Paint => "paint",
            Self::Composite => "composite",
        }
    }

    /// Name of the per-stage duration sample
    pub fn metric_name(&self) -> &'static str {
        match self {
            Self::Parse => "parse_ms",
            Self::Layout => "layout_ms",
            Self::Paint => "paint_ms",
            Self::Composite => "composite_ms",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Parse => 0,
            Self::Layout => 1,
            Self::Paint => 2,
            Self::Composite => 3,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one stage
pub type StageResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// One unit of pipeline work
pub trait RenderStage: Send + Sync {
    fn run(&self, page: &Page) -> StageResult;
}

impl<F> RenderStage for F
where
    F: Fn(&Page) -> StageResult + Send + Sync,
{
    fn run(&self, page: &Page) -> StageResult {
        self(page)
    }
}

/// Placeholder stage that sleeps for a fixed duration
#[derive(Debug, Clone, Copy)]
pub struct SimulatedStage {
    duration: Duration,
}

impl SimulatedStage {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl RenderStage for SimulatedStage {
    fn run(&self, _page: &Page) -> StageResult {
        if !self.duration.is_zero() {
            thread::sleep(self.duration);
        }
        Ok(())
    }
}

/// The four stages in execution order
pub struct RenderPipeline {
    stages: [(StageKind, Box<dyn RenderStage>); 4],
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("stages", &StageKind::ALL)
            .finish()
    }
}

impl RenderPipeline {
    pub fn new(
        parse: impl RenderStage + 'static,
        layout: impl RenderStage + 'static,
        paint: impl RenderStage + 'static,
        composite: impl RenderStage + 'static,
    ) -> Self {
        Self {
            stages: [
                (StageKind::Parse, Box::new(parse) as Box<dyn RenderStage>),
                (StageKind::Layout, Box::new(layout) as Box<dyn RenderStage>),
                (StageKind::Paint, Box::new(paint) as Box<dyn RenderStage>),
                (StageKind::Composite, Box::new(composite) as Box<dyn RenderStage>),
            ],
        }
    }

    /// Pipeline of [`SimulatedStage`]s
    pub fn simulated(durations: &StageDurations) -> Self {
        Self::new(
            SimulatedStage::new(durations.parse()),
            SimulatedStage::new(durations.layout()),
            SimulatedStage::new(durations.paint()),
            SimulatedStage::new(durations.composite()),
        )
    }

    /// Run every stage in order on the calling thread
    ///
    /// Each stage is timed from the end of the previous one, so the total
    /// is exactly the sum of the stage durations. The first failing or
    /// panicking stage aborts the run.
    pub fn run(&self, page: &Page) -> Result<PipelineTiming, PipelineError> {
        let started = Instant::now();
        let mut last = started;
        let mut stages = [Duration::ZERO; 4];

        for (slot, (kind, stage)) in stages.iter_mut().zip(&self.stages) {
            let _span = tracing::trace_span!("stage", stage = kind.name()).entered();

            match panic::catch_unwind(AssertUnwindSafe(|| stage.run(page))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    return Err(PipelineError::StageFailed {
                        stage: *kind,
                        reason: err.to_string(),
                    });
                }
                Err(payload) => {
                    return Err(PipelineError::StagePanicked {
                        stage: *kind,
                        message: panic_message(&*payload),
                    });
                }
            }

            let now = Instant::now();
            *slot = now - last;
            last = now;
        }

        Ok(PipelineTiming {
            stages,
            total: last - started,
        })
    }
}

/// Durations measured by one successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineTiming {
    stages: [Duration; 4],
    total: Duration,
}

impl PipelineTiming {
    pub fn stage(&self, kind: StageKind) -> Duration {
        self.stages[kind.index()]
    }

    /// End-to-end duration
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn stage_sum(&self) -> Duration {
        self.stages.iter().sum()
    }

    /// Record the four stage samples, then the end-to-end sample
    pub fn record_into(&self, metrics: &MetricsStore) {
        for kind in StageKind::ALL {
            metrics.record(kind.metric_name(), as_millis_f64(self.stage(kind)));
        }
        metrics.record(RENDER_PIPELINE_LATENCY_MS, as_millis_f64(self.total));
    }
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
