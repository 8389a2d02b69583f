//! Per-test ownership of virtual-time schedulers.

use crate::{SchedulerSlot, VirtualScheduler};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Owns the virtual-time schedulers for one test context.
///
/// Schedulers are created on first access and reused for every subsequent
/// access within the context's lifetime, at most one per slot. Schedulers
/// for different slots have independent timelines.
pub struct VirtualSchedulerContext {
    schedulers: Mutex<HashMap<SchedulerSlot, VirtualScheduler>>,
}

impl VirtualSchedulerContext {
    /// Create an empty context; no schedulers exist until first access.
    pub fn new() -> Self {
        Self {
            schedulers: Mutex::new(HashMap::new()),
        }
    }

    /// The virtual scheduler for `slot`, created on first call.
    pub fn get(&self, slot: SchedulerSlot) -> VirtualScheduler {
        let mut schedulers = self.schedulers.lock();
        schedulers
            .entry(slot)
            .or_insert_with(|| {
                debug!(slot = %slot, "creating virtual scheduler");
                VirtualScheduler::new()
            })
            .clone()
    }

    /// Number of schedulers instantiated so far.
    pub fn instantiated(&self) -> usize {
        self.schedulers.lock().len()
    }
}

impl Default for VirtualSchedulerContext {
    fn default() -> Self {
        Self::new()
    }
}
