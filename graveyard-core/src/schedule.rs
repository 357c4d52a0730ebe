//! Scheduling port: "run later" without tying the core to a host runtime.
//!
//! The discovery scanner needs a recurring pass and the cooldown manager
//! needs one-shot expiry timers. Both go through [`Scheduler`], so the
//! logic runs identically on the tokio runtime in production
//! ([`TokioScheduler`]) and on a fake clock in tests ([`ManualScheduler`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

/// A one-shot task.
pub type Task = Box<dyn FnOnce() + Send>;

/// A recurring task.
pub type RepeatingTask = Arc<dyn Fn() + Send + Sync>;

/// Port for deferred and periodic execution.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`. The returned handle cancels the
    /// task if it has not fired yet.
    fn schedule_once(&self, delay: Duration, task: Task) -> ScheduleHandle;

    /// Run `task` every `interval`, starting one interval from now, until
    /// the returned handle is cancelled. `interval` must be non-zero.
    fn schedule_every(&self, interval: Duration, task: RepeatingTask) -> ScheduleHandle;
}

/// Cancellation handle for a scheduled task.
///
/// Cancellation is a flag check on the execution side: a task that
/// already started is not interrupted, and cancelling twice is harmless.
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    cancelled: Arc<AtomicBool>,
}

impl ScheduleHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Prevent the task from firing (again).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether this handle has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tokio implementation
// ---------------------------------------------------------------------------

/// [`Scheduler`] backed by the tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Use the runtime the caller is currently inside of.
    ///
    /// # Panics
    /// Panics (in tokio) if called outside a runtime context; use
    /// [`TokioScheduler::from_handle`] from synchronous code.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }

    /// Use an explicit runtime handle.
    #[must_use]
    pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        let cancelled = Arc::clone(&handle.cancelled);
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !cancelled.load(Ordering::SeqCst) {
                task();
            }
        });
        handle
    }

    fn schedule_every(&self, interval: Duration, task: RepeatingTask) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        let cancelled = Arc::clone(&handle.cancelled);
        self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first pass lands one interval from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                task();
            }
        });
        handle
    }
}

// ---------------------------------------------------------------------------
// Manual (fake clock) implementation
// ---------------------------------------------------------------------------

/// Deterministic [`Scheduler`] driven by an explicit clock.
///
/// Nothing fires until [`ManualScheduler::advance`] moves the clock past a
/// task's due time; tasks then run on the advancing thread, in due-time
/// order. Used by tests and by single-threaded hosts that pump the
/// scheduler from their own tick loop.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualInner>>,
}

#[derive(Default)]
struct ManualInner {
    now: Duration,
    next_seq: u64,
    entries: Vec<Entry>,
}

struct Entry {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    job: Job,
}

enum Job {
    Once(Option<Task>),
    Every {
        interval: Duration,
        task: RepeatingTask,
    },
}

impl ManualScheduler {
    /// Create a scheduler with the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current fake-clock reading.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Number of pending (not yet fired, not cancelled) tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move the clock forward by `delta`, firing every due task in
    /// due-time order. Tasks scheduled by a firing task are honored
    /// within the same call if they fall inside the window.
    pub fn advance(&self, delta: Duration) {
        let target = self.inner.lock().now + delta;
        loop {
            let next = {
                let mut inner = self.inner.lock();
                inner.entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
                let idx = inner
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.due <= target)
                    .min_by_key(|(_, e)| (e.due, e.seq))
                    .map(|(i, _)| i);
                match idx {
                    Some(i) => {
                        let entry = inner.entries.swap_remove(i);
                        inner.now = inner.now.max(entry.due);
                        Some(entry)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };
            // Run outside the lock: a task may schedule or cancel.
            let Some(mut entry) = next else { break };
            match entry.job {
                Job::Once(ref mut task) => {
                    if let Some(task) = task.take() {
                        task();
                    }
                }
                Job::Every { interval, ref task } => {
                    task();
                    entry.due += interval;
                    self.inner.lock().entries.push(entry);
                }
            }
        }
    }

    fn push(&self, due: Duration, cancelled: Arc<AtomicBool>, job: Job) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push(Entry {
            due,
            seq,
            cancelled,
            job,
        });
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        let due = self.inner.lock().now + delay;
        self.push(due, Arc::clone(&handle.cancelled), Job::Once(Some(task)));
        handle
    }

    fn schedule_every(&self, interval: Duration, task: RepeatingTask) -> ScheduleHandle {
        debug_assert!(!interval.is_zero(), "repeating interval must be non-zero");
        let handle = ScheduleHandle::new();
        let due = self.inner.lock().now + interval;
        self.push(
            due,
            Arc::clone(&handle.cancelled),
            Job::Every { interval, task },
        );
        handle
    }
}
