//! Unified error type for conspec.

use conspec_scheduler::SchedulerError;
use serde::{Deserialize, Serialize};

/// Error type for lifecycle and suite-construction failures.
///
/// These are configuration or sequencing bugs in the test code itself, not
/// outcomes of the code under test; they are fatal to the affected context
/// or suite and are never retried or swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ConspecError {
    /// A lifecycle method was invoked out of sequence
    #[error("Setup order violation in context '{context}': {detail}")]
    SetupOrder {
        /// The offending context's name
        context: String,
        /// What was invoked, and in which phase
        detail: String,
    },

    /// Suite construction was attempted on a node that cannot be a suite
    #[error("Ambiguous suite for context '{context}': {detail}")]
    AmbiguousSuite {
        /// The offending context's name
        context: String,
        /// Why construction is invalid
        detail: String,
    },

    /// The scheduler registry was left in, or would be put into, a state
    /// that leaks one test's schedulers into another
    #[error("Scheduler leak: {detail}")]
    SchedulerLeak {
        /// Description of the leak hazard
        detail: String,
    },
}

impl ConspecError {
    /// Create a setup-order error
    pub fn setup_order(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SetupOrder {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Create an ambiguous-suite error
    pub fn ambiguous_suite(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::AmbiguousSuite {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Create a scheduler-leak error
    pub fn scheduler_leak(detail: impl Into<String>) -> Self {
        Self::SchedulerLeak {
            detail: detail.into(),
        }
    }
}

impl From<SchedulerError> for ConspecError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyInstalled { detail } => Self::SchedulerLeak { detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_the_offending_context() {
        let err = ConspecError::setup_order("when_account_is_created", "act() invoked twice");
        assert!(err.to_string().contains("when_account_is_created"));
        assert!(err.to_string().contains("act() invoked twice"));
    }

    #[test]
    fn scheduler_errors_map_to_the_leak_variant() {
        let err: ConspecError = SchedulerError::already_installed("nested install").into();
        assert!(matches!(err, ConspecError::SchedulerLeak { .. }));
    }

    #[test]
    fn errors_serialize() {
        let err = ConspecError::ambiguous_suite("base", "abstract node reached build");
        let json = serde_json::to_string(&err).expect("serializable");
        assert!(json.contains("AmbiguousSuite"));
    }
}
