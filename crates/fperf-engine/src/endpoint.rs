//! Engine endpoint
//!
//! Transport-facing surface of the engine. An RPC or IPC layer holds a
//! `dyn EngineEndpoint` and never touches the engine internals.
//!
//! Unknown pages degrade silently here: a render request becomes a no-op and
//! an accessibility scan returns no issues. Callers that need to tell "no
//! issues" from "no such page" use the inherent [`Engine`] methods instead.

use fperf_a11y::AccessibilityIssue;
use fperf_dom::Page;
use fperf_metrics::Metric;

use crate::{Engine, EngineError};

/// Operations exposed to remote callers
pub trait EngineEndpoint: Send + Sync {
    /// Store a page; returns the identifier it was stored under
    fn submit_page(&self, page: Page) -> Result<String, EngineError>;

    /// Queue a render pipeline run (fire-and-forget)
    fn run_render_pipeline(&self, page_id: &str);

    /// Accessibility issues of a stored page
    fn analyze_accessibility(&self, page_id: &str) -> Vec<AccessibilityIssue>;

    /// Every sample recorded so far
    fn get_metrics(&self) -> Vec<Metric>;
}

impl EngineEndpoint for Engine {
    fn submit_page(&self, page: Page) -> Result<String, EngineError> {
        Engine::submit_page(self, page)
    }

    fn run_render_pipeline(&self, page_id: &str) {
        match Engine::run_render_pipeline(self, page_id) {
            Ok(()) => {}
            Err(EngineError::PageNotFound(_)) => {
                tracing::debug!(page_id, "render requested for unknown page");
            }
            Err(err) => {
                tracing::warn!(page_id, error = %err, "render request dropped");
            }
        }
    }

    fn analyze_accessibility(&self, page_id: &str) -> Vec<AccessibilityIssue> {
        Engine::analyze_accessibility(self, page_id).unwrap_or_default()
    }

    fn get_metrics(&self) -> Vec<Metric> {
        self.metrics()
    }
}
