use std::sync::{Arc, RwLock};

use time::{Duration, OffsetDateTime};

/// Wall-clock source. The record store and scheduler take this as an
/// injected dependency so tests can advance virtual time instead of
/// sleeping on real timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub struct ManualClock {
    now: RwLock<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.write().unwrap() += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        *self.now.write().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read().unwrap()
    }
}

struct Task {
    name: String,
    interval: Duration,
    last_run: OffsetDateTime,
    action: Box<dyn FnMut() + Send>,
}

/// Explicit periodic task queue. The host drives it by calling `run_due`
/// from its event loop; there is no background thread and no lock beyond
/// the clock, so ordering is exactly call order.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tasks: Vec::new(),
        }
    }

    /// Registers a task that fires once per `interval`, first firing one
    /// full interval after registration.
    pub fn every(&mut self, name: impl Into<String>, interval: Duration, action: impl FnMut() + Send + 'static) {
        self.tasks.push(Task {
            name: name.into(),
            interval,
            last_run: self.clock.now(),
            action: Box::new(action),
        });
    }

    /// Runs every task whose interval has elapsed. Returns the number of
    /// tasks fired.
    pub fn run_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        for task in &mut self.tasks {
            if now - task.last_run >= task.interval {
                tracing::debug!(task = %task.name, "running scheduled task");
                (task.action)();
                task.last_run = now;
                fired += 1;
            }
        }
        fired
    }
}
