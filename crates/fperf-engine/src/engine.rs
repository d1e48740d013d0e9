//! Engine - Main entry point
//!
//! Owns the page table, the metrics store and the task scheduler. The page
//! table, the metrics log and the task queue each sit behind their own lock,
//! and no lock is held while calling into another component: pages leave
//! the table as `Arc` clones before any work runs on them.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fperf_a11y::{AccessibilityAnalyzer, AccessibilityIssue};
use fperf_dom::Page;
use fperf_metrics::{Metric, MetricSample, MetricsStore};

use crate::pipeline::{RENDER_PIPELINE_FAILURES, RenderPipeline, TASK_QUEUE_DEPTH};
use crate::scheduler::{QueueDepthProbe, SchedulerStats, TaskScheduler};
use crate::{Config, EngineError};

/// Stored pages plus their submission order for eviction
#[derive(Debug, Default)]
struct PageTable {
    pages: HashMap<String, Arc<Page>>,
    order: VecDeque<String>,
}

impl PageTable {
    /// Insert a page, then evict the oldest pages beyond `max_pages`
    fn insert(&mut self, page: Arc<Page>, max_pages: Option<usize>) -> Vec<String> {
        self.order.push_back(page.id.clone());
        self.pages.insert(page.id.clone(), page);

        let mut evicted = Vec::new();
        if let Some(max) = max_pages {
            while self.pages.len() > max {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.pages.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    fn remove(&mut self, id: &str) -> Option<Arc<Page>> {
        let page = self.pages.remove(id)?;
        self.order.retain(|stored| stored != id);
        Some(page)
    }
}

/// The fperf engine
#[derive(Debug)]
pub struct Engine {
    config: Config,
    pages: Mutex<PageTable>,
    next_page_id: AtomicU64,
    metrics: Arc<MetricsStore>,
    analyzer: AccessibilityAnalyzer,
    pipeline: Arc<RenderPipeline>,
    scheduler: TaskScheduler,
}

impl Engine {
    /// Create an engine running simulated render stages
    pub fn new(config: Config) -> Result<Self, EngineError> {
        let pipeline = RenderPipeline::simulated(&config.stages);
        Self::with_pipeline(config, pipeline)
    }

    /// Create an engine with custom render stages
    pub fn with_pipeline(config: Config, pipeline: RenderPipeline) -> Result<Self, EngineError> {
        config.validate()?;
        tracing::info!("fperf Engine {} initialized", crate::VERSION);

        Ok(Self {
            scheduler: TaskScheduler::new(config.worker_count, config.queue),
            config,
            pages: Mutex::new(PageTable::default()),
            next_page_id: AtomicU64::new(0),
            metrics: Arc::new(MetricsStore::new()),
            analyzer: AccessibilityAnalyzer::new(),
            pipeline: Arc::new(pipeline),
        })
    }

    /// Start the pipeline workers
    pub fn start(&self) -> Result<(), EngineError> {
        self.scheduler.start()?;
        Ok(())
    }

    /// Finish every queued pipeline run and stop the workers
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Store a page and return its identifier
    ///
    /// A page without an identifier gets the next free `page-<n>`. Submitting
    /// an identifier that is already stored fails with
    /// [`EngineError::DuplicatePage`].
    pub fn submit_page(&self, mut page: Page) -> Result<String, EngineError> {
        let mut table = self.lock_pages();

        if !page.has_id() {
            // Skip numbers already claimed by caller-chosen identifiers
            page.id = loop {
                let n = self.next_page_id.fetch_add(1, Ordering::Relaxed);
                let candidate = format!("page-{n}");
                if !table.pages.contains_key(&candidate) {
                    break candidate;
                }
            };
        } else if table.pages.contains_key(&page.id) {
            return Err(EngineError::DuplicatePage(page.id));
        }

        let id = page.id.clone();
        let evicted = table.insert(Arc::new(page), self.config.max_pages);
        drop(table);

        for old in &evicted {
            tracing::debug!(page_id = %old, "page evicted");
        }
        tracing::debug!(page_id = %id, "page submitted");
        Ok(id)
    }

    /// Queue one render pipeline run for a stored page
    ///
    /// Returns as soon as the run is queued. The run records one sample per
    /// stage, `render_pipeline_latency_ms`, and `task_queue_depth`.
    pub fn run_render_pipeline(&self, page_id: &str) -> Result<(), EngineError> {
        let page = self.require_page(page_id)?;
        let pipeline = Arc::clone(&self.pipeline);
        let metrics = Arc::clone(&self.metrics);
        let depth = self.scheduler.depth_probe();

        self.scheduler
            .enqueue(move || run_pipeline_task(&pipeline, &page, &metrics, &depth))?;

        tracing::debug!(page_id, "render pipeline queued");
        Ok(())
    }

    /// Scan a stored page for accessibility issues on the calling thread
    pub fn analyze_accessibility(&self, page_id: &str) -> Result<Vec<AccessibilityIssue>, EngineError> {
        let page = self.require_page(page_id)?;
        let issues = self.analyzer.analyze(&page);
        tracing::debug!(page_id, issues = issues.len(), "accessibility scan finished");
        Ok(issues)
    }

    /// Copy of every sample recorded so far
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.snapshot()
    }

    /// Samples with the given name, in recording order
    pub fn metrics_named(&self, name: &str) -> Vec<Metric> {
        self.metrics.samples_named(name)
    }

    /// Samples in wire form
    pub fn export_metrics(&self) -> Vec<MetricSample> {
        self.metrics.export()
    }

    /// Stored copy of a page
    pub fn page(&self, page_id: &str) -> Option<Arc<Page>> {
        self.lock_pages().pages.get(page_id).cloned()
    }

    /// Stored identifiers, oldest first
    pub fn page_ids(&self) -> Vec<String> {
        self.lock_pages().order.iter().cloned().collect()
    }

    pub fn page_count(&self) -> usize {
        self.lock_pages().pages.len()
    }

    /// Drop a stored page; queued runs keep their own copy
    pub fn remove_page(&self, page_id: &str) -> Result<Arc<Page>, EngineError> {
        self.lock_pages()
            .remove(page_id)
            .ok_or_else(|| EngineError::PageNotFound(page_id.to_string()))
    }

    /// Pipeline runs waiting for a worker
    pub fn queue_depth(&self) -> usize {
        self.scheduler.queue_depth()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn require_page(&self, page_id: &str) -> Result<Arc<Page>, EngineError> {
        self.page(page_id)
            .ok_or_else(|| EngineError::PageNotFound(page_id.to_string()))
    }

    fn lock_pages(&self) -> MutexGuard<'_, PageTable> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body of one queued pipeline run
fn run_pipeline_task(pipeline: &RenderPipeline, page: &Page, metrics: &MetricsStore, depth: &QueueDepthProbe) {
    match pipeline.run(page) {
        Ok(timing) => {
            timing.record_into(metrics);
            tracing::debug!(
                page_id = %page.id,
                latency_us = timing.total().as_micros() as u64,
                "render pipeline finished"
            );
        }
        Err(err) => {
            tracing::warn!(page_id = %page.id, error = %err, "render pipeline failed");
            metrics.record(RENDER_PIPELINE_FAILURES, 1.0);
        }
    }

    metrics.record(TASK_QUEUE_DEPTH, depth.get() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: &str) -> Arc<Page> {
        Arc::new(Page::new("https://example.com").with_id(id))
    }

    #[test]
    fn test_page_table_unbounded() {
        let mut table = PageTable::default();
        for i in 0..100 {
            assert!(table.insert(page(&format!("p{i}")), None).is_empty());
        }
        assert_eq!(table.pages.len(), 100);
        assert_eq!(table.order.front().map(String::as_str), Some("p0"));
    }

    #[test]
    fn test_page_table_evicts_oldest() {
        let mut table = PageTable::default();
        table.insert(page("a"), Some(2));
        table.insert(page("b"), Some(2));
        let evicted = table.insert(page("c"), Some(2));

        assert_eq!(evicted, ["a"]);
        assert!(!table.pages.contains_key("a"));
        assert_eq!(table.order, ["b", "c"]);
    }

    #[test]
    fn test_page_table_remove_keeps_order_in_sync() {
        let mut table = PageTable::default();
        table.insert(page("a"), Some(2));
        table.insert(page("b"), Some(2));
        assert!(table.remove("a").is_some());
        assert!(table.remove("a").is_none());

        // "b" is now the oldest and goes first
        let evicted = table.insert(page("c"), Some(1));
        assert_eq!(evicted, ["b"]);
        assert_eq!(table.order, ["c"]);
    }
}
