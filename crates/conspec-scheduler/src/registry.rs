//! Per-thread scheduler registry.
//!
//! The registry is the indirection point between code under test and the
//! concurrency schedulers it runs on: callers ask for a [`SchedulerSlot`]
//! and get whatever resolver is currently installed. Out of the box every
//! slot resolves to a production scheduler. A test installs a
//! [`SchedulerOverride`] to redirect all slots to one
//! [`VirtualSchedulerContext`]; dropping the override restores the previous
//! resolvers on every exit path.
//!
//! Each thread owns an independent registry view, so concurrently running
//! tests cannot observe each other's overrides.

use crate::{Scheduler, SchedulerError, SchedulerHandle, SchedulerSlot, VirtualSchedulerContext, Work};
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolver producing the scheduler currently bound to a slot.
pub type SchedulerResolver = Arc<dyn Fn() -> SchedulerHandle + Send + Sync>;

/// Production scheduler that runs work inline on the calling thread.
struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn schedule_after(&self, delay: Duration, work: Work) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        work();
    }
}

/// Production scheduler that runs each unit of work on a fresh thread.
struct SpawnScheduler;

impl Scheduler for SpawnScheduler {
    fn schedule_after(&self, delay: Duration, work: Work) {
        std::thread::spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            work();
        });
    }
}

static INLINE: Lazy<SchedulerHandle> = Lazy::new(|| Arc::new(InlineScheduler));
static SPAWN: Lazy<SchedulerHandle> = Lazy::new(|| Arc::new(SpawnScheduler));

fn production_resolver(slot: SchedulerSlot) -> SchedulerResolver {
    match slot {
        SchedulerSlot::CurrentThread | SchedulerSlot::Dispatcher | SchedulerSlot::Immediate => {
            Arc::new(|| Arc::clone(&INLINE))
        }
        SchedulerSlot::NewThread | SchedulerSlot::TaskPool | SchedulerSlot::ThreadPool => {
            Arc::new(|| Arc::clone(&SPAWN))
        }
    }
}

struct RegistryView {
    resolvers: HashMap<SchedulerSlot, SchedulerResolver>,
    override_active: bool,
}

impl RegistryView {
    fn production_defaults() -> Self {
        let resolvers = SchedulerSlot::ALL
            .iter()
            .map(|&slot| (slot, production_resolver(slot)))
            .collect();
        Self {
            resolvers,
            override_active: false,
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<RegistryView> = RefCell::new(RegistryView::production_defaults());
}

/// Resolve the scheduler currently bound to `slot` on this thread.
pub fn resolve(slot: SchedulerSlot) -> SchedulerHandle {
    let resolver = REGISTRY.with(|registry| {
        let registry = registry.borrow();
        registry
            .resolvers
            .get(&slot)
            .map(Arc::clone)
            .unwrap_or_else(|| production_resolver(slot))
    });
    resolver()
}

/// Whether a scheduler override is active on this thread.
pub fn override_active() -> bool {
    REGISTRY.with(|registry| registry.borrow().override_active)
}

/// RAII redirection of every scheduler slot to one virtual context.
///
/// While the override lives, [`resolve`] returns the context's lazily
/// created virtual schedulers. Dropping it restores the resolvers that were
/// installed before, unconditionally. The override is deliberately not
/// `Send`: it belongs to the thread whose registry view it patched.
pub struct SchedulerOverride {
    saved: Option<HashMap<SchedulerSlot, SchedulerResolver>>,
    context: Arc<VirtualSchedulerContext>,
    _not_send: PhantomData<*const ()>,
}

impl SchedulerOverride {
    /// Redirect all slots on this thread to `context`.
    ///
    /// Fails if another override is already active on this thread: nested
    /// installation would let one test's schedulers leak into another.
    pub fn install(context: Arc<VirtualSchedulerContext>) -> Result<Self, SchedulerError> {
        REGISTRY.with(|registry| {
            let mut registry = registry.borrow_mut();
            if registry.override_active {
                return Err(SchedulerError::already_installed(
                    "a scheduler override is already active on this thread",
                ));
            }

            let replacement: HashMap<SchedulerSlot, SchedulerResolver> = SchedulerSlot::ALL
                .iter()
                .map(|&slot| {
                    let ctx = Arc::clone(&context);
                    let resolver: SchedulerResolver =
                        Arc::new(move || Arc::new(ctx.get(slot)) as SchedulerHandle);
                    (slot, resolver)
                })
                .collect();

            let saved = std::mem::replace(&mut registry.resolvers, replacement);
            registry.override_active = true;
            debug!("scheduler override installed");

            Ok(Self {
                saved: Some(saved),
                context,
                _not_send: PhantomData,
            })
        })
    }

    /// The virtual context this override resolves to.
    pub fn context(&self) -> &Arc<VirtualSchedulerContext> {
        &self.context
    }
}

impl fmt::Debug for SchedulerOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerOverride").finish_non_exhaustive()
    }
}

impl Drop for SchedulerOverride {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            REGISTRY.with(|registry| {
                let mut registry = registry.borrow_mut();
                registry.resolvers = saved;
                registry.override_active = false;
            });
            debug!("scheduler override restored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_resolve_to_production_schedulers() {
        for slot in SchedulerSlot::ALL {
            assert!(!resolve(slot).is_virtual(), "slot {slot} should be real");
        }
        assert!(!override_active());
    }

    #[test]
    #[serial]
    fn override_redirects_every_slot() {
        let ctx = Arc::new(VirtualSchedulerContext::new());
        let guard = SchedulerOverride::install(ctx).expect("no override active");

        for slot in SchedulerSlot::ALL {
            assert!(resolve(slot).is_virtual(), "slot {slot} should be virtual");
        }
        assert!(override_active());
        drop(guard);
    }

    #[test]
    #[serial]
    fn drop_restores_prior_resolvers() {
        {
            let ctx = Arc::new(VirtualSchedulerContext::new());
            let _guard = SchedulerOverride::install(ctx).expect("no override active");
            assert!(resolve(SchedulerSlot::TaskPool).is_virtual());
        }
        assert!(!resolve(SchedulerSlot::TaskPool).is_virtual());
        assert!(!override_active());
    }

    #[test]
    #[serial]
    fn nested_install_is_rejected() {
        let first = Arc::new(VirtualSchedulerContext::new());
        let guard = SchedulerOverride::install(first).expect("no override active");

        let second = Arc::new(VirtualSchedulerContext::new());
        assert_matches!(
            SchedulerOverride::install(second),
            Err(SchedulerError::AlreadyInstalled { .. })
        );

        // The failed install must not have clobbered the active override.
        assert!(resolve(SchedulerSlot::Immediate).is_virtual());
        drop(guard);
        assert!(!resolve(SchedulerSlot::Immediate).is_virtual());
    }

    #[test]
    #[serial]
    fn resolved_virtual_scheduler_shares_the_context_timeline() {
        let ctx = Arc::new(VirtualSchedulerContext::new());
        let guard = SchedulerOverride::install(Arc::clone(&ctx)).expect("no override active");

        let resolved = resolve(SchedulerSlot::Dispatcher);
        resolved.schedule(Box::new(|| {}));

        // Work queued through the registry is visible on the context's own
        // handle for the same slot.
        assert_eq!(ctx.get(SchedulerSlot::Dispatcher).pending(), 1);
        drop(guard);
    }
}
