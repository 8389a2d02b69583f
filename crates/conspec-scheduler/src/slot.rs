//! The closed set of scheduler kinds production code can resolve.

use serde::{Deserialize, Serialize};

/// One of the fixed scheduler kinds used by code under test.
///
/// The set is closed by design: the registry pre-populates a resolver for
/// every slot, and an override replaces all of them at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchedulerSlot {
    /// Queues work on the thread that scheduled it
    CurrentThread,
    /// The UI/message-loop dispatcher
    Dispatcher,
    /// Runs work inline, immediately
    Immediate,
    /// Spawns a dedicated thread per unit of work
    NewThread,
    /// The task pool
    TaskPool,
    /// The shared thread pool
    ThreadPool,
}

impl SchedulerSlot {
    /// All slots, in a stable order.
    pub const ALL: [SchedulerSlot; 6] = [
        SchedulerSlot::CurrentThread,
        SchedulerSlot::Dispatcher,
        SchedulerSlot::Immediate,
        SchedulerSlot::NewThread,
        SchedulerSlot::TaskPool,
        SchedulerSlot::ThreadPool,
    ];

    /// Stable name for logging and reports.
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerSlot::CurrentThread => "current_thread",
            SchedulerSlot::Dispatcher => "dispatcher",
            SchedulerSlot::Immediate => "immediate",
            SchedulerSlot::NewThread => "new_thread",
            SchedulerSlot::TaskPool => "task_pool",
            SchedulerSlot::ThreadPool => "thread_pool",
        }
    }
}

impl std::fmt::Display for SchedulerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_slots_have_distinct_names() {
        let mut names: Vec<&str> = SchedulerSlot::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SchedulerSlot::ALL.len());
    }
}
