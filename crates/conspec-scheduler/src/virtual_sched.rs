//! Virtual-time scheduler.
//!
//! A [`VirtualScheduler`] never executes work on its own: queued work only
//! runs when the test advances virtual time. Due work executes in timestamp
//! order, ties broken by scheduling order, which makes time-dependent
//! pipelines fully deterministic.

use crate::{Scheduler, Work};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Virtual time in nanoseconds since the scheduler was created.
pub type VirtualTime = u64;

struct QueuedWork {
    due: VirtualTime,
    seq: u64,
    work: Work,
}

// Min-heap on (due, seq): earliest due time first, FIFO within a timestamp.
impl Ord for QueuedWork {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl PartialOrd for QueuedWork {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedWork {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for QueuedWork {}

struct Timeline {
    now: VirtualTime,
    next_seq: u64,
    queue: BinaryHeap<QueuedWork>,
}

/// A deterministic scheduler driven by explicit time advancement.
///
/// Cloning shares the timeline; two schedulers obtained from different
/// [`crate::VirtualSchedulerContext`] slots never share one.
#[derive(Clone)]
pub struct VirtualScheduler {
    timeline: Arc<Mutex<Timeline>>,
}

impl VirtualScheduler {
    /// Create a scheduler with virtual time at zero and an empty queue.
    pub fn new() -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline {
                now: 0,
                next_seq: 0,
                queue: BinaryHeap::new(),
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.timeline.lock().now
    }

    /// Number of queued work items not yet due.
    pub fn pending(&self) -> usize {
        self.timeline.lock().queue.len()
    }

    /// Schedule `work` at an explicit offset from the current virtual time.
    pub fn schedule_at(&self, offset: Duration, work: Work) {
        let mut timeline = self.timeline.lock();
        let due = timeline
            .now
            .saturating_add(u64::try_from(offset.as_nanos()).unwrap_or(u64::MAX));
        let seq = timeline.next_seq;
        timeline.next_seq += 1;
        trace!(due, seq, "virtual scheduler queued work");
        timeline.queue.push(QueuedWork { due, seq, work });
    }

    /// Advance virtual time by `duration`, executing all due work.
    ///
    /// Work executes in increasing due-time order, ties broken by scheduling
    /// order. Work that schedules further work at a due time within the
    /// advancement window also executes. While a work item runs, `now()`
    /// reports that item's due time.
    pub fn advance_by(&self, duration: Duration) {
        let target = {
            let timeline = self.timeline.lock();
            timeline
                .now
                .saturating_add(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
        };
        self.advance_to(target);
    }

    /// Advance virtual time to an absolute instant, executing all due work.
    ///
    /// Advancing to an instant at or before `now()` executes nothing.
    pub fn advance_to(&self, target: VirtualTime) {
        loop {
            // Pop one due item under the lock, run it outside so the work
            // can schedule more work on this scheduler.
            let next = {
                let mut timeline = self.timeline.lock();
                let due_next = timeline.queue.peek().map(|queued| queued.due);
                match due_next {
                    Some(due) if due <= target => {
                        let queued = timeline.queue.pop();
                        timeline.now = timeline.now.max(due);
                        queued
                    }
                    _ => {
                        timeline.now = timeline.now.max(target);
                        None
                    }
                }
            };
            match next {
                Some(queued) => {
                    trace!(due = queued.due, seq = queued.seq, "virtual scheduler running work");
                    (queued.work)();
                }
                None => return,
            }
        }
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule_after(&self, delay: Duration, work: Work) {
        self.schedule_at(delay, work);
    }

    fn is_virtual(&self) -> bool {
        true
    }
}
