//! Scheduler substitution for deterministic testing.
//!
//! Production code under test resolves "which scheduler do I run on" through
//! the [`registry`] instead of naming a concrete scheduler. During a test an
//! RAII override swaps every [`SchedulerSlot`] to a lazily-created
//! virtual-time scheduler, so time-dependent pipelines can be driven
//! synchronously by advancing virtual time. Dropping the override restores
//! the production resolvers unconditionally.
//!
//! The registry view is thread-local: two tests running on different threads
//! never observe each other's virtual schedulers.

pub mod registry;
pub mod slot;
pub mod virtual_ctx;
pub mod virtual_sched;

pub use registry::{resolve, SchedulerOverride, SchedulerResolver};
pub use slot::SchedulerSlot;
pub use virtual_ctx::VirtualSchedulerContext;
pub use virtual_sched::{VirtualScheduler, VirtualTime};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Errors raised by the scheduler registry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, thiserror::Error)]
pub enum SchedulerError {
    /// A scheduler override was installed while another is still active on
    /// this thread. Nested installation would let one test's virtual
    /// schedulers leak into another.
    #[error("Scheduler override already installed: {detail}")]
    AlreadyInstalled {
        /// Description of the conflicting installation
        detail: String,
    },
}

impl SchedulerError {
    /// Create an already-installed error
    pub fn already_installed(detail: impl Into<String>) -> Self {
        Self::AlreadyInstalled {
            detail: detail.into(),
        }
    }
}

/// A unit of deferred work.
pub type Work = Box<dyn FnOnce() + Send>;

/// The scheduler interface production code resolves through the registry.
///
/// Implementations are either real (execute work on actual threads / actual
/// delays) or virtual (queue work until virtual time is advanced).
pub trait Scheduler: Send + Sync {
    /// Schedule `work` to run after `delay`.
    fn schedule_after(&self, delay: Duration, work: Work);

    /// Schedule `work` to run as soon as possible.
    fn schedule(&self, work: Work) {
        self.schedule_after(Duration::ZERO, work);
    }

    /// Whether this scheduler runs on virtual time.
    fn is_virtual(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("virtual", &self.is_virtual())
            .finish()
    }
}

/// Shared handle to a scheduler resolved from the registry.
pub type SchedulerHandle = Arc<dyn Scheduler>;
