//! Tri-state assertion outcomes.

use serde::{Deserialize, Serialize};

/// The result of evaluating one assertion case.
///
/// `Pending` is a recognized inconclusive outcome, not a failure: it means
/// the case was evaluated before the context's act phase completed (for
/// example while asynchronous work triggered by the act is still in
/// flight). Separating it from `Failed` keeps timing artifacts of the host
/// runner from producing false negatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseOutcome {
    /// The context's prerequisite (establish + act) has not completed yet
    Pending,
    /// The assertion held
    Passed,
    /// The assertion did not hold
    Failed {
        /// The assertion's failure message
        message: String,
    },
}

impl CaseOutcome {
    /// Create a failed outcome
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Whether the case passed.
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Whether the case was inconclusive.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the case failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One assertion case's name and outcome, for run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    /// The assertion case's name
    pub name: String,
    /// How it evaluated
    pub outcome: CaseOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_predicates() {
        assert!(CaseOutcome::Passed.is_passed());
        assert!(CaseOutcome::Pending.is_pending());
        let failed = CaseOutcome::failed("balance was 0, expected 100");
        assert!(failed.is_failed());
        assert!(!failed.is_passed());
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = CaseReport {
            name: "balance_is_100".into(),
            outcome: CaseOutcome::failed("balance was 0"),
        };
        let json = serde_json::to_string(&report).expect("serializable");
        let back: CaseReport = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(report, back);
    }
}
