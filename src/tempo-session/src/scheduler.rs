//! Repeating timers for position sampling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub type TickCallback = Box<dyn Fn() + Send + Sync>;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Live timer. Cancelling (or dropping) it stops further ticks.
pub trait TimerGuard: Send {
    fn cancel(self: Box<Self>);
}

pub trait Scheduler: Send + Sync {
    /// First tick fires one `interval` after the call.
    fn start_repeating(&self, interval: Duration, on_tick: TickCallback) -> Box<dyn TimerGuard>;
}

/// Runs timers as tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Uses the runtime the caller is running on, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

struct TokioTimer {
    task: JoinHandle<()>,
}

impl TimerGuard for TokioTimer {
    fn cancel(self: Box<Self>) {
        self.task.abort();
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Scheduler for TokioScheduler {
    fn start_repeating(&self, interval: Duration, on_tick: TickCallback) -> Box<dyn TimerGuard> {
        // `interval_at` panics on a zero period.
        let interval = interval.max(MIN_PERIOD);
        let task = self.runtime.spawn(async move {
            let mut ticks = time::interval_at(time::Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                on_tick();
            }
        });
        Box::new(TokioTimer { task })
    }
}

struct ManualTimer {
    interval: Duration,
    on_tick: Arc<TickCallback>,
    cancelled: Arc<AtomicBool>,
}

/// Scheduler whose timers only fire through [`fire`](Self::fire).
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timers: Arc<Mutex<Vec<ManualTimer>>>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("started", &self.started())
            .field("active", &self.active())
            .finish()
    }
}

struct ManualGuard {
    cancelled: Arc<AtomicBool>,
}

impl TimerGuard for ManualGuard {
    fn cancel(self: Box<Self>) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Drop for ManualGuard {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn timers(&self) -> MutexGuard<'_, Vec<ManualTimer>> {
        self.timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ticks every live timer once. Returns how many fired.
    pub fn fire(&self) -> usize {
        let live: Vec<Arc<TickCallback>> = self
            .timers()
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| timer.on_tick.clone())
            .collect();
        for on_tick in &live {
            on_tick();
        }
        live.len()
    }

    /// Timers started over the scheduler's lifetime.
    pub fn started(&self) -> usize {
        self.timers().len()
    }

    pub fn active(&self) -> usize {
        self.timers()
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn intervals(&self) -> Vec<Duration> {
        self.timers().iter().map(|timer| timer.interval).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn start_repeating(&self, interval: Duration, on_tick: TickCallback) -> Box<dyn TimerGuard> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.timers().push(ManualTimer {
            interval,
            on_tick: Arc::new(on_tick),
            cancelled: cancelled.clone(),
        });
        Box::new(ManualGuard { cancelled })
    }
}
