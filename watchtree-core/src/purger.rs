//! Periodic removal of stale incremental samples.
//!
//! Keyed accumulators installed by [`Monitor::sample_increment`] live until
//! someone stops them. [`IncrementalPurger`] drops the ones nobody touched
//! during the last period.
//!
//! [`Monitor::sample_increment`]: crate::monitor::Monitor::sample_increment

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::PurgerError;
use crate::manager::Manager;

/// Work run once per period.
pub type Job = Box<dyn FnMut() + Send + 'static>;

/// Runs a job periodically until the returned task is cancelled.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Runs `job` every `period`, first one `period` from now.
    fn schedule(&self, period: Duration, job: Job) -> Box<dyn ScheduledTask>;
}

/// Handle to a scheduled job.
pub trait ScheduledTask: Send {
    /// Stops the job. A run in progress is allowed to finish.
    fn cancel(self: Box<Self>);
}

static THREAD_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Runs each job on its own named thread (`watchtree-purger-N`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        Self
    }
}

struct Stop {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

struct ThreadTask {
    stop: Arc<Stop>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, period: Duration, mut job: Job) -> Box<dyn ScheduledTask> {
        let stop = Arc::new(Stop {
            cancelled: Mutex::new(false),
            wake: Condvar::new(),
        });
        let n = THREAD_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
        let worker_stop = stop.clone();
        let spawned = thread::Builder::new()
            .name(format!("watchtree-purger-{}", n))
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                loop {
                    {
                        let mut cancelled = worker_stop.cancelled.lock();
                        while !*cancelled && Instant::now() < deadline {
                            worker_stop.wake.wait_until(&mut cancelled, deadline);
                        }
                        if *cancelled {
                            return;
                        }
                    }
                    job();
                    deadline += period;
                }
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn purger thread");
                None
            }
        };
        Box::new(ThreadTask { stop, handle })
    }
}

impl ScheduledTask for ThreadTask {
    fn cancel(mut self: Box<Self>) {
        *self.stop.cancelled.lock() = true;
        self.stop.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            // The job itself may drop the last purger reference.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(feature = "tokio")]
pub use self::tokio_scheduler::TokioScheduler;

#[cfg(feature = "tokio")]
mod tokio_scheduler {
    use std::time::Duration;

    use tokio::runtime::Handle;
    use tokio::sync::watch;

    use super::{Job, ScheduledTask, Scheduler};

    /// Runs jobs as tasks on a tokio runtime.
    #[derive(Debug, Clone)]
    pub struct TokioScheduler {
        handle: Handle,
    }

    impl TokioScheduler {
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Scheduler on the runtime of the calling context, if any.
        pub fn current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    struct TokioTask {
        stop_tx: watch::Sender<bool>,
    }

    impl Scheduler for TokioScheduler {
        fn schedule(&self, period: Duration, mut job: Job) -> Box<dyn ScheduledTask> {
            let (stop_tx, mut stop_rx) = watch::channel(false);
            self.handle.spawn(async move {
                let start = tokio::time::Instant::now() + period;
                let mut ticks = tokio::time::interval_at(start, period);
                loop {
                    tokio::select! {
                        biased;
                        changed = stop_rx.changed() => {
                            if changed.is_err() || *stop_rx.borrow() {
                                break;
                            }
                        }
                        _ = ticks.tick() => job(),
                    }
                }
            });
            Box::new(TokioTask { stop_tx })
        }
    }

    impl ScheduledTask for TokioTask {
        fn cancel(self: Box<Self>) {
            let _ = self.stop_tx.send(true);
        }
    }
}

/// Periodically calls
/// [`Manager::purge_incrementals_older_than`] with the start of the
/// previous period, so accumulators untouched for a whole period go away.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use watchtree_core::{EnabledManager, IncrementalPurger};
///
/// let manager = Arc::new(EnabledManager::new());
/// let purger = IncrementalPurger::new(manager);
/// purger.start(Duration::from_secs(60)).unwrap();
/// ```
pub struct IncrementalPurger {
    manager: Arc<dyn Manager>,
    scheduler: Arc<dyn Scheduler>,
    task: Mutex<Option<Box<dyn ScheduledTask>>>,
}

impl IncrementalPurger {
    /// A purger running on a [`ThreadScheduler`].
    pub fn new(manager: Arc<dyn Manager>) -> Self {
        Self::with_scheduler(manager, Arc::new(ThreadScheduler::new()))
    }

    pub fn with_scheduler(manager: Arc<dyn Manager>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            manager,
            scheduler,
            task: Mutex::new(None),
        }
    }

    /// Starts purging every `period`.
    pub fn start(&self, period: Duration) -> Result<(), PurgerError> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(PurgerError::AlreadyStarted);
        }

        let manager = self.manager.clone();
        let mut period_start = manager.milli_time();
        let job: Job = Box::new(move || {
            let purged = manager.purge_incrementals_older_than(period_start);
            tracing::debug!(purged, threshold = period_start, "Purged stale incremental samples");
            period_start = manager.milli_time();
        });
        *task = Some(self.scheduler.schedule(period, job));
        tracing::debug!(period_ms = period.as_millis() as u64, "Incremental purger started");
        Ok(())
    }

    /// Stops purging. The purger can be started again afterwards.
    pub fn cancel(&self) -> Result<(), PurgerError> {
        let task = self.task.lock().take().ok_or(PurgerError::NotStarted)?;
        task.cancel();
        tracing::debug!("Incremental purger cancelled");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.task.lock().is_some()
    }
}

impl fmt::Debug for IncrementalPurger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalPurger")
            .field("scheduler", &self.scheduler)
            .field("started", &self.is_started())
            .finish()
    }
}

impl Drop for IncrementalPurger {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel();
        }
    }
}
