//! Virtual-clock task scheduler.
//!
//! Every response delivery and every `wait` goes through a [`Scheduler`]
//! instead of a wall-clock timer. Time only moves when a test advances it
//! (directly, or by awaiting a [`Deferred`] handle), so the order in which
//! deferred work fires is fully deterministic.
//!
//! Tasks fire in `(deadline, registration order)` order. Tasks scheduled while
//! another task is firing are honored within the same advance if they fall
//! due before its target time.

mod deferred;

pub use deferred::{Deferred, Delivery, Wait};

use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

type Task = Box<dyn FnOnce() + Send>;

/// Identifier of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Inspection record kept for every timer ever scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRecord {
    pub id: TimerId,
    pub delay: Duration,
    pub scheduled_at: Duration,
    pub deadline: Duration,
}

struct ScheduledTask {
    deadline: Duration,
    id: TimerId,
    task: Task,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed for min-heap behavior (earliest deadline, then oldest id)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

struct SchedulerState {
    now: Duration,
    next_id: u64,
    default_delay: Duration,
    queue: BinaryHeap<ScheduledTask>,
    history: Vec<TimerRecord>,
}

/// Deterministic task queue on a virtual clock starting at zero.
///
/// Clones share the same clock and queue.
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                now: Duration::ZERO,
                next_id: 0,
                default_delay,
                queue: BinaryHeap::new(),
                history: Vec::new(),
            })),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    pub fn default_delay(&self) -> Duration {
        self.state.lock().default_delay
    }

    pub fn set_default_delay(&self, delay: Duration) {
        self.state.lock().default_delay = delay;
    }

    /// Queue `task` to run once virtual time reaches `now + delay`.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> TimerRecord
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;

        let record = TimerRecord {
            id,
            delay,
            scheduled_at: state.now,
            deadline: state.now + delay,
        };
        state.queue.push(ScheduledTask {
            deadline: record.deadline,
            id,
            task: Box::new(task),
        });
        state.history.push(record);
        trace!(timer = id.0, delay_ms = delay.as_millis() as u64, "timer scheduled");
        record
    }

    /// Number of timers that have not fired yet
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Every timer scheduled so far, in scheduling order
    pub fn timers(&self) -> Vec<TimerRecord> {
        self.state.lock().history.clone()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.state.lock().queue.peek().map(|task| task.deadline)
    }

    /// Move time forward by `duration`, firing everything that falls due.
    /// Returns the number of tasks fired.
    pub fn advance(&self, duration: Duration) -> usize {
        let target = self.now() + duration;
        self.advance_to(target)
    }

    /// Move time forward to `target`. Never moves the clock backwards.
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        while self.fire_next(target) {
            fired += 1;
        }
        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
        fired
    }

    /// Fire every queued task, advancing time to each deadline in turn.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        while self.fire_next(Duration::MAX) {
            fired += 1;
        }
        fired
    }

    /// Pop and run the earliest task due at or before `limit`. The lock is
    /// released before the task runs so tasks may schedule more work.
    fn fire_next(&self, limit: Duration) -> bool {
        let next = {
            let mut state = self.state.lock();
            let due = state
                .queue
                .peek()
                .is_some_and(|task| task.deadline <= limit);
            if due {
                let task = state.queue.pop();
                if let Some(task) = &task {
                    if state.now < task.deadline {
                        state.now = task.deadline;
                    }
                }
                task
            } else {
                None
            }
        };

        match next {
            Some(scheduled) => {
                trace!(timer = scheduled.id.0, "timer fired");
                (scheduled.task)();
                true
            }
            None => false,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scheduler")
            .field("now", &state.now)
            .field("default_delay", &state.default_delay)
            .field("pending", &state.queue.len())
            .finish()
    }
}
