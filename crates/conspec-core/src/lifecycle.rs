//! Context lifecycle engine.
//!
//! One [`ContextInstance`] exists per built suite and is shared by every
//! assertion case attached to that suite. The phase machine guarantees the
//! establish and act steps run exactly once, in order, no matter how many
//! cases are evaluated, and that an installed scheduler override is
//! restored on every exit path.

use crate::context::{ActCompletion, AssertionCase, ContextNode, ContextState};
use crate::error::ConspecError;
use crate::outcome::CaseOutcome;
use conspec_scheduler::{SchedulerOverride, VirtualSchedulerContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle phase of a context instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Created; nothing has run
    Uninitialized,
    /// Establish steps completed
    ContextEstablished,
    /// The act step ran but its asynchronous work has not resolved
    SubjectActed,
    /// The act completed; assertions may evaluate
    Ready,
    /// Disposed; terminal
    Disposed,
}

/// One instantiation of a context node for a test run.
pub struct ContextInstance {
    node: Arc<ContextNode>,
    phase: Phase,
    state: ContextState,
    act_ran: bool,
    scheduler_override: Option<SchedulerOverride>,
}

impl ContextInstance {
    /// Create an instance in the `Uninitialized` phase.
    pub fn new(node: Arc<ContextNode>) -> Self {
        Self {
            node,
            phase: Phase::Uninitialized,
            state: ContextState::new(),
            act_ran: false,
            scheduler_override: None,
        }
    }

    /// The node this instance runs.
    pub fn node(&self) -> &Arc<ContextNode> {
        &self.node
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The shared post-establish/post-act state.
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    /// The virtual schedulers installed for this instance, if the context
    /// opted into virtual time.
    pub fn virtual_schedulers(&self) -> Option<&Arc<VirtualSchedulerContext>> {
        self.scheduler_override.as_ref().map(|o| o.context())
    }

    /// Run the establish steps of the whole chain, root first.
    ///
    /// If the node opts into virtual time, a [`VirtualSchedulerContext`] is
    /// created and installed into the registry before any step runs, so
    /// establish and act code resolving schedulers already sees the virtual
    /// ones.
    pub fn establish(&mut self) -> Result<(), ConspecError> {
        if self.phase != Phase::Uninitialized {
            return Err(ConspecError::setup_order(
                self.node.name(),
                format!("establish() invoked in phase {:?}", self.phase),
            ));
        }

        if self.node.uses_virtual_time() {
            let ctx = Arc::new(VirtualSchedulerContext::new());
            self.scheduler_override = Some(SchedulerOverride::install(ctx)?);
        }

        for node in self.node.chain() {
            if let Some(step) = node.establish_step() {
                debug!(context = node.name(), "running establish step");
                step(&mut self.state)?;
            }
        }

        self.phase = Phase::ContextEstablished;
        Ok(())
    }

    /// Run the act step owned by this chain, exactly once.
    ///
    /// A second invocation is a programming error and fails loudly: the
    /// action under test may be genuinely non-idempotent.
    pub fn act(&mut self) -> Result<(), ConspecError> {
        if self.act_ran {
            return Err(ConspecError::setup_order(
                self.node.name(),
                "act() invoked twice; the action under test must fire exactly once",
            ));
        }
        if self.phase != Phase::ContextEstablished {
            return Err(ConspecError::setup_order(
                self.node.name(),
                format!("act() invoked in phase {:?}", self.phase),
            ));
        }
        self.act_ran = true;

        let completion = match self.node.act_owner() {
            Some(owner) => {
                debug!(context = self.node.name(), owner = owner.name(), "running act step");
                let step = owner
                    .act_step()
                    .cloned()
                    .ok_or_else(|| {
                        ConspecError::setup_order(self.node.name(), "act owner lost its step")
                    })?;
                step(&mut self.state)?
            }
            // A context without an act is pure arrangement; assertions check
            // the established state directly.
            None => ActCompletion::Done,
        };

        self.phase = match completion {
            ActCompletion::Done => Phase::Ready,
            ActCompletion::InFlight => Phase::SubjectActed,
        };
        Ok(())
    }

    /// Mark an in-flight act as completed (e.g. after advancing a virtual
    /// scheduler drained the triggered work).
    pub fn complete_act(&mut self) -> Result<(), ConspecError> {
        if self.phase != Phase::SubjectActed {
            return Err(ConspecError::setup_order(
                self.node.name(),
                format!("complete_act() invoked in phase {:?}", self.phase),
            ));
        }
        self.phase = Phase::Ready;
        Ok(())
    }

    /// Whether the establish/act prerequisite is still running.
    pub fn is_prerequisite_running(&self) -> bool {
        !matches!(self.phase, Phase::Ready)
    }

    /// Evaluate one assertion case.
    ///
    /// Only a `Ready` instance evaluates the check; any earlier phase
    /// reports `Pending` so ordering artifacts of the host runner never
    /// surface as false failures. Evaluating against a `Disposed` instance
    /// is a sequencing bug in the host, not a timing artifact, and fails
    /// with a setup-order error.
    pub fn assert_case(&self, case: &AssertionCase) -> Result<CaseOutcome, ConspecError> {
        if self.phase == Phase::Disposed {
            return Err(ConspecError::setup_order(
                self.node.name(),
                format!("assertion '{}' evaluated after dispose()", case.name()),
            ));
        }
        if self.phase != Phase::Ready {
            debug!(
                context = self.node.name(),
                case = case.name(),
                phase = ?self.phase,
                "assertion evaluated before act completed; reporting pending"
            );
            return Ok(CaseOutcome::Pending);
        }
        Ok(match case.check(self.state()) {
            Ok(()) => CaseOutcome::Passed,
            Err(message) => {
                warn!(context = self.node.name(), case = case.name(), %message, "assertion failed");
                CaseOutcome::Failed { message }
            }
        })
    }

    /// Tear the instance down, restoring any installed scheduler override.
    ///
    /// Idempotent; further calls are no-ops. Dropping an undisposed
    /// instance restores the override as well.
    pub fn dispose(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        // Dropping the guard restores the previous resolvers.
        self.scheduler_override = None;
        self.phase = Phase::Disposed;
        debug!(context = self.node.name(), "context instance disposed");
    }
}
