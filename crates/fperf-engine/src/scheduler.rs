//! Task Scheduler
//!
//! Fixed-size pool of worker threads draining one shared FIFO queue.
//!
//! - Workers are spawned by [`TaskScheduler::start`] and joined by
//!   [`TaskScheduler::stop`], which lets them finish every queued task first.
//! - A task that panics is caught on the worker, logged and counted; the
//!   worker moves on to the next task.
//! - The queue is unbounded unless a capacity is configured, in which case
//!   [`SaturationPolicy`] decides between waiting and rejecting. A task never
//!   waits on its own scheduler's full queue; it gets `QueueFull` instead.

use std::any::Any;
use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::config::{QueueConfig, SaturationPolicy};
use crate::error::SchedulerError;

/// Task function type
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler lifecycle
///
/// `Created -> Running -> Stopping -> Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Accepting tasks, no workers yet
    Created,
    /// Workers are executing tasks
    Running,
    /// Draining the queue, no longer accepting tasks
    Stopping,
    /// All workers have exited
    Stopped,
}

/// Scheduler statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub worker_count: usize,
    /// Tasks waiting to start
    pub queued: usize,
    /// Tasks that ran to completion
    pub completed: u64,
    /// Tasks that panicked
    pub panicked: u64,
}

struct QueueState {
    tasks: VecDeque<Task>,
    state: SchedulerState,
}

/// State shared between the scheduler handle and its workers
struct Shared {
    queue: Mutex<QueueState>,
    /// Signaled when a task is pushed or shutdown begins
    task_ready: Condvar,
    /// Signaled when a worker takes a task off a bounded queue
    slot_free: Condvar,
    /// Mirror of `queue.tasks.len()` readable without the lock
    depth: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a task is available; `None` once the queue is drained and
    /// the scheduler is shutting down
    fn next_task(&self) -> Option<Task> {
        let mut queue = self.lock();

        loop {
            if let Some(task) = queue.tasks.pop_front() {
                self.depth.store(queue.tasks.len(), Ordering::Relaxed);
                self.slot_free.notify_one();
                return Some(task);
            }

            if queue.state != SchedulerState::Running {
                return None;
            }

            queue = self
                .task_ready
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

thread_local! {
    /// Address of the `Shared` owned by the pool this thread works for, 0 elsewhere
    static OWNING_POOL: Cell<usize> = const { Cell::new(0) };
}

struct Worker {
    id: usize,
    thread: JoinHandle<()>,
}

fn run_worker(id: usize, shared: Arc<Shared>) {
    OWNING_POOL.with(|pool| pool.set(Arc::as_ptr(&shared) as usize));
    tracing::debug!(worker = id, "worker started");

    while let Some(task) = shared.next_task() {
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                shared.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!(worker = id, "task panicked: {}", panic_message(&*payload));
            }
        }
    }

    tracing::debug!(worker = id, "worker exiting");
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Worker pool with a shared FIFO queue
///
/// All methods take `&self` so the scheduler can be shared between request
/// threads. Calling [`stop`](Self::stop) from inside a task deadlocks: the
/// worker would wait on itself. For the same reason a task that enqueues on
/// its own full [`SaturationPolicy::Block`] queue does not wait for a slot
/// and gets [`SchedulerError::QueueFull`].
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Mutex<Vec<Worker>>,
    worker_count: usize,
    queue_config: QueueConfig,
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("worker_count", &self.worker_count)
            .field("queue_config", &self.queue_config)
            .field("state", &self.state())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}

impl TaskScheduler {
    /// Create a scheduler; no threads are spawned until [`start`](Self::start).
    /// A worker count of 0 is raised to 1.
    pub fn new(worker_count: usize, queue_config: QueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    tasks: VecDeque::new(),
                    state: SchedulerState::Created,
                }),
                task_ready: Condvar::new(),
                slot_free: Condvar::new(),
                depth: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
            }),
            workers: Mutex::new(Vec::new()),
            worker_count: worker_count.max(1),
            queue_config,
        }
    }

    /// Spawn the workers
    pub fn start(&self) -> Result<(), SchedulerError> {
        // Worker list before queue, same order as `stop`
        let mut workers = self.lock_workers();

        {
            let mut queue = self.shared.lock();
            match queue.state {
                SchedulerState::Created => queue.state = SchedulerState::Running,
                SchedulerState::Running => return Err(SchedulerError::AlreadyStarted),
                SchedulerState::Stopping | SchedulerState::Stopped => {
                    return Err(SchedulerError::Stopped);
                }
            }
        }

        for id in 0..self.worker_count {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("fperf-worker-{id}"))
                .spawn(move || run_worker(id, shared));

            match spawned {
                Ok(thread) => workers.push(Worker { id, thread }),
                Err(err) => {
                    tracing::error!(worker = id, error = %err, "failed to spawn worker");
                    self.shutdown_workers(&mut workers);
                    return Err(SchedulerError::Spawn(err));
                }
            }
        }

        tracing::info!(workers = self.worker_count, "task scheduler started");
        Ok(())
    }

    /// Queue a task at the tail
    ///
    /// Tasks queued before `start` run once workers exist. With a bounded
    /// queue at capacity, `Block` waits for a free slot and `Reject` fails
    /// with [`SchedulerError::QueueFull`]. Called from one of this
    /// scheduler's own workers, `Block` fails like `Reject`.
    pub fn enqueue<F>(&self, task: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.lock();

        loop {
            if matches!(queue.state, SchedulerState::Stopping | SchedulerState::Stopped) {
                return Err(SchedulerError::Stopped);
            }

            match self.queue_config.capacity {
                Some(capacity) if queue.tasks.len() >= capacity => {
                    match self.queue_config.on_saturation {
                        SaturationPolicy::Reject => {
                            return Err(SchedulerError::QueueFull { capacity });
                        }
                        SaturationPolicy::Block if self.on_own_worker() => {
                            tracing::warn!(capacity, "task enqueued on its own full queue");
                            return Err(SchedulerError::QueueFull { capacity });
                        }
                        SaturationPolicy::Block => {
                            queue = self
                                .shared
                                .slot_free
                                .wait(queue)
                                .unwrap_or_else(PoisonError::into_inner);
                        }
                    }
                }
                _ => break,
            }
        }

        queue.tasks.push_back(Box::new(task));
        self.shared.depth.store(queue.tasks.len(), Ordering::Relaxed);
        drop(queue);

        self.shared.task_ready.notify_one();
        Ok(())
    }

    /// Drain the queue and join every worker
    ///
    /// Returns once no worker thread remains. Tasks already running finish
    /// normally. Stopping a scheduler that never started discards its queue.
    pub fn stop(&self) {
        let mut workers = self.lock_workers();

        {
            let mut queue = self.shared.lock();
            match queue.state {
                SchedulerState::Stopped => return,
                SchedulerState::Created => {
                    queue.state = SchedulerState::Stopped;
                    self.shared.depth.store(0, Ordering::Relaxed);
                    let discarded = std::mem::take(&mut queue.tasks);
                    drop(queue);

                    if !discarded.is_empty() {
                        tracing::warn!(
                            tasks = discarded.len(),
                            "scheduler stopped before start, discarding queued tasks"
                        );
                    }
                    self.shared.slot_free.notify_all();
                    return;
                }
                SchedulerState::Running | SchedulerState::Stopping => {
                    queue.state = SchedulerState::Stopping;
                }
            }
        }

        self.shutdown_workers(&mut workers);

        tracing::info!(
            completed = self.shared.completed.load(Ordering::Relaxed),
            panicked = self.shared.panicked.load(Ordering::Relaxed),
            "task scheduler stopped"
        );
    }

    /// Tasks waiting to start; may be stale by the time it is read
    pub fn queue_depth(&self) -> usize {
        self.shared.depth.load(Ordering::Relaxed)
    }

    /// Handle for reading the queue depth from inside a task
    pub fn depth_probe(&self) -> QueueDepthProbe {
        QueueDepthProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.lock().state
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            worker_count: self.worker_count,
            queued: self.queue_depth(),
            completed: self.shared.completed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
        }
    }

    fn on_own_worker(&self) -> bool {
        OWNING_POOL.with(Cell::get) == Arc::as_ptr(&self.shared) as usize
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake everyone, join the given workers and mark the scheduler stopped
    fn shutdown_workers(&self, workers: &mut Vec<Worker>) {
        {
            let mut queue = self.shared.lock();
            if queue.state == SchedulerState::Running {
                queue.state = SchedulerState::Stopping;
            }
        }
        self.shared.task_ready.notify_all();
        self.shared.slot_free.notify_all();

        for worker in workers.drain(..) {
            if worker.thread.join().is_err() {
                tracing::error!(worker = worker.id, "worker thread terminated abnormally");
            }
        }

        self.shared.lock().state = SchedulerState::Stopped;
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read-only view of a scheduler's queue depth
#[derive(Clone)]
pub struct QueueDepthProbe {
    shared: Arc<Shared>,
}

impl QueueDepthProbe {
    pub fn get(&self) -> usize {
        self.shared.depth.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for QueueDepthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueDepthProbe").field("depth", &self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_scheduler_runs_tasks() {
        let scheduler = TaskScheduler::new(2, QueueConfig::unbounded());
        scheduler.start().unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            scheduler
                .enqueue(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        scheduler.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_stop_drains_queue() {
        let scheduler = TaskScheduler::new(3, QueueConfig::unbounded());
        scheduler.start().unwrap();
        let runs: Arc<Vec<AtomicU32>> = Arc::new((0..500).map(|_| AtomicU32::new(0)).collect());

        for i in 0..500 {
            let runs = Arc::clone(&runs);
            scheduler
                .enqueue(move || {
                    runs[i].fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        scheduler.stop();

        // Every task ran exactly once
        assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
        assert_eq!(scheduler.stats().completed, 500);
        assert_eq!(scheduler.queue_depth(), 0);
    }

    #[test]
    fn test_single_worker_is_fifo() {
        let scheduler = TaskScheduler::new(1, QueueConfig::unbounded());
        let order = Arc::new(Mutex::new(Vec::new()));

        // Queued before start on purpose
        for i in 0..50 {
            let order = Arc::clone(&order);
            scheduler.enqueue(move || order.lock().unwrap().push(i)).unwrap();
        }
        assert_eq!(scheduler.queue_depth(), 50);

        scheduler.start().unwrap();
        scheduler.stop();

        let order = order.lock().unwrap();
        assert_eq!(*order, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let scheduler = TaskScheduler::new(1, QueueConfig::unbounded());
        scheduler.start().unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        scheduler.enqueue(|| panic!("stage exploded")).unwrap();
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            scheduler
                .enqueue(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        scheduler.stop();

        assert_eq!(counter.load(Ordering::SeqCst), 5);
        let stats = scheduler.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 5);
    }

    #[test]
    fn test_lifecycle_errors() {
        let scheduler = TaskScheduler::new(1, QueueConfig::unbounded());
        assert_eq!(scheduler.state(), SchedulerState::Created);

        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyStarted)));

        scheduler.stop();
        scheduler.stop();
        assert!(matches!(scheduler.enqueue(|| {}), Err(SchedulerError::Stopped)));
        assert!(matches!(scheduler.start(), Err(SchedulerError::Stopped)));
    }

    #[test]
    fn test_stop_before_start_discards() {
        let scheduler = TaskScheduler::new(2, QueueConfig::unbounded());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        scheduler.enqueue(move || flag.store(true, Ordering::SeqCst)).unwrap();

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(scheduler.queue_depth(), 0);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reject_when_full() {
        let scheduler = TaskScheduler::new(1, QueueConfig::bounded(2, SaturationPolicy::Reject));
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let counter = Arc::clone(&counter);
            scheduler
                .enqueue(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        assert!(matches!(
            scheduler.enqueue(|| {}),
            Err(SchedulerError::QueueFull { capacity: 2 })
        ));

        scheduler.start().unwrap();
        scheduler.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_block_when_full() {
        let scheduler = Arc::new(TaskScheduler::new(1, QueueConfig::bounded(1, SaturationPolicy::Block)));
        scheduler.start().unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        // Occupy the only worker until the gate opens
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        scheduler
            .enqueue(move || {
                let _ = gate_rx.recv();
            })
            .unwrap();
        wait_until(|| scheduler.queue_depth() == 0);

        // Fill the single slot
        let c = Arc::clone(&counter);
        scheduler
            .enqueue(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let blocked_done = Arc::new(AtomicBool::new(false));
        let producer = {
            let scheduler = Arc::clone(&scheduler);
            let counter = Arc::clone(&counter);
            let blocked_done = Arc::clone(&blocked_done);
            thread::spawn(move || {
                scheduler
                    .enqueue(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
                blocked_done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!blocked_done.load(Ordering::SeqCst));

        gate_tx.send(()).unwrap();
        producer.join().unwrap();
        scheduler.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_task_enqueue_on_own_full_queue_fails_fast() {
        let scheduler = Arc::new(TaskScheduler::new(1, QueueConfig::bounded(1, SaturationPolicy::Block)));
        scheduler.start().unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        let (result_tx, result_rx) = mpsc::channel();

        let inner = Arc::clone(&scheduler);
        let c = Arc::clone(&counter);
        scheduler
            .enqueue(move || {
                // Takes the only slot; nothing can free it while this task runs
                let first = inner.enqueue(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                });
                let second = inner.enqueue(|| {});
                let _ = result_tx.send((first, second));
            })
            .unwrap();

        let (first, second) = result_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(first.is_ok());
        assert!(matches!(second, Err(SchedulerError::QueueFull { capacity: 1 })));

        scheduler.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_other_pool_worker_still_blocks() {
        let outer = TaskScheduler::new(1, QueueConfig::unbounded());
        let target = Arc::new(TaskScheduler::new(1, QueueConfig::bounded(1, SaturationPolicy::Block)));
        target.enqueue(|| {}).unwrap();

        // A worker of another pool waits for the slot like any other thread
        let (done_tx, done_rx) = mpsc::channel();
        let t = Arc::clone(&target);
        outer.start().unwrap();
        outer
            .enqueue(move || {
                let _ = done_tx.send(t.enqueue(|| {}));
            })
            .unwrap();

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        target.start().unwrap();
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());

        outer.stop();
        target.stop();
        assert_eq!(target.stats().completed, 2);
    }

    #[test]
    fn test_worker_count_at_least_one() {
        let scheduler = TaskScheduler::new(0, QueueConfig::unbounded());
        assert_eq!(scheduler.worker_count(), 1);
    }

    #[test]
    fn test_depth_probe_tracks_queue() {
        let scheduler = TaskScheduler::new(1, QueueConfig::unbounded());
        let probe = scheduler.depth_probe();
        for _ in 0..3 {
            scheduler.enqueue(|| {}).unwrap();
        }
        assert_eq!(probe.get(), 3);

        scheduler.start().unwrap();
        scheduler.stop();
        assert_eq!(probe.get(), 0);
    }

    fn payload_of(f: impl FnOnce() + panic::UnwindSafe) -> Box<dyn Any + Send> {
        panic::catch_unwind(f).unwrap_err()
    }

    #[test]
    fn test_panic_message() {
        let payload = payload_of(|| panic!("static message"));
        assert_eq!(panic_message(&*payload), "static message");

        let payload = payload_of(|| panic!("formatted {}", 42));
        assert_eq!(panic_message(&*payload), "formatted 42");

        let payload = payload_of(|| panic::panic_any(7_u32));
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }
}
