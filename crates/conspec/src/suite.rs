//! Suite decision and construction.
//!
//! A [`Taxonomy`] holds every declared context node for a run. For each
//! node it decides whether the node is a runnable leaf suite or a reusable
//! ancestor, and builds runnable suites whose assertion cases all share one
//! context instance.

use conspec_core::{
    AssertionCase, CaseOutcome, CaseReport, ConspecError, ContextId, ContextInstance, ContextNode,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// The declared context nodes of a run.
#[derive(Default)]
pub struct Taxonomy {
    nodes: HashMap<ContextId, Arc<ContextNode>>,
    // Registration order, for stable iteration.
    order: Vec<ContextId>,
}

impl Taxonomy {
    /// Create an empty taxonomy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declared node. Registering the same node twice is a no-op.
    pub fn register(&mut self, node: Arc<ContextNode>) {
        let id = node.id().clone();
        if self.nodes.insert(id.clone(), node).is_none() {
            self.order.push(id);
        }
    }

    /// Build a taxonomy from declared nodes.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Arc<ContextNode>>) -> Self {
        let mut taxonomy = Self::new();
        for node in nodes {
            taxonomy.register(node);
        }
        taxonomy
    }

    /// Look up a registered node.
    pub fn get(&self, id: &ContextId) -> Option<&Arc<ContextNode>> {
        self.nodes.get(id)
    }

    /// Registered nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<ContextNode>> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    fn has_concrete_descendant(&self, id: &ContextId) -> bool {
        self.nodes
            .values()
            .any(|node| !node.is_abstract() && node.descends_from(id))
    }

    /// Whether `id` should be materialized as a runnable suite.
    ///
    /// A node is a suite iff it is concrete, some node in its parent chain
    /// (itself included) carries the suite marker, and no concrete
    /// descendant is registered. The last condition keeps a concrete
    /// mid-chain node from being built alongside its own concrete
    /// descendant, which would execute the shared establish/act under two
    /// suite identities.
    pub fn decide(&self, id: &ContextId) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if node.is_abstract() {
            return false;
        }
        let marker_reachable = node.chain().iter().any(|n| n.has_suite_marker());
        let decision = marker_reachable && !self.has_concrete_descendant(id);
        debug!(context = node.name(), decision, "suite decision");
        decision
    }

    /// Construct the runnable suite for `id`.
    ///
    /// The suite's case list is the union of assertion cases declared on
    /// the node and all of its ancestors, root first, each wired to the
    /// same single [`ContextInstance`]. Building an abstract node is a
    /// configuration bug; a node with zero cases builds an empty-but-valid
    /// suite.
    pub fn build(&self, id: &ContextId) -> Result<Suite, ConspecError> {
        let node = self.nodes.get(id).ok_or_else(|| {
            ConspecError::ambiguous_suite(id.name(), "context is not registered in the taxonomy")
        })?;
        if node.is_abstract() {
            error!(context = node.name(), "abstract context reached build");
            return Err(ConspecError::ambiguous_suite(
                node.name(),
                "abstract contexts are never directly run",
            ));
        }

        let cases: Vec<AssertionCase> = node
            .chain()
            .iter()
            .flat_map(|n| n.cases().iter().cloned())
            .collect();
        debug!(context = node.name(), cases = cases.len(), "building suite");

        Ok(Suite {
            instance: ContextInstance::new(Arc::clone(node)),
            cases,
        })
    }

    /// All nodes that decide as buildable suites, in registration order.
    pub fn buildable(&self) -> Vec<&Arc<ContextNode>> {
        self.nodes().filter(|n| self.decide(n.id())).collect()
    }
}

/// A runnable suite: one shared context instance plus the assertion cases
/// attached to it.
pub struct Suite {
    instance: ContextInstance,
    cases: Vec<AssertionCase>,
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name())
            .field("cases", &self.cases.len())
            .finish_non_exhaustive()
    }
}

impl Suite {
    /// The suite's context name.
    pub fn name(&self) -> &str {
        self.instance.node().name()
    }

    /// The assertion cases, ancestors' first.
    pub fn cases(&self) -> &[AssertionCase] {
        &self.cases
    }

    /// The shared context instance.
    pub fn instance(&self) -> &ContextInstance {
        &self.instance
    }

    /// Mutable access to the shared instance, for driving in-flight acts
    /// (`complete_act`) from the host runner.
    pub fn instance_mut(&mut self) -> &mut ContextInstance {
        &mut self.instance
    }

    /// Host setup hook: establish, then act, exactly once for the suite.
    pub fn setup(&mut self) -> Result<(), ConspecError> {
        self.instance.establish()?;
        self.instance.act()
    }

    /// Host per-case hook: evaluate the case at `index`.
    ///
    /// Returns `Ok(None)` for an out-of-range index; evaluating against a
    /// disposed instance surfaces the underlying setup-order error.
    pub fn run_case(&self, index: usize) -> Result<Option<CaseReport>, ConspecError> {
        let Some(case) = self.cases.get(index) else {
            return Ok(None);
        };
        Ok(Some(CaseReport {
            name: case.name().to_owned(),
            outcome: self.instance.assert_case(case)?,
        }))
    }

    /// Host teardown hook: dispose the shared instance and restore any
    /// installed scheduler override.
    pub fn teardown(&mut self) {
        self.instance.dispose();
    }

    /// Drive the whole suite: setup, every case, teardown.
    ///
    /// Teardown runs on every path, including a failed setup; a failed
    /// setup marks all cases pending and records the error.
    pub fn run_all(&mut self) -> SuiteReport {
        let mut report = SuiteReport {
            suite: self.name().to_owned(),
            error: None,
            cases: Vec::with_capacity(self.cases.len()),
        };

        match self.setup() {
            Ok(()) => {
                for index in 0..self.cases.len() {
                    match self.run_case(index) {
                        Ok(Some(case)) => report.cases.push(case),
                        Ok(None) => {}
                        Err(err) => {
                            error!(suite = %report.suite, %err, "case evaluation failed");
                            report.error = Some(err.to_string());
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                error!(suite = %report.suite, %err, "suite setup failed");
                report.error = Some(err.to_string());
                for case in &self.cases {
                    report.cases.push(CaseReport {
                        name: case.name().to_owned(),
                        outcome: CaseOutcome::Pending,
                    });
                }
            }
        }

        self.teardown();
        report
    }
}

/// Summary of one suite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// The suite's context name
    pub suite: String,
    /// Fatal setup error, if the establish/act phase failed
    pub error: Option<String>,
    /// Per-case outcomes
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    /// Number of passed cases.
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_passed()).count()
    }

    /// Number of failed cases.
    pub fn failed(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_failed()).count()
    }

    /// Number of inconclusive cases.
    pub fn pending(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_pending()).count()
    }

    /// Whether the run had no setup error and no failed case.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.failed() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use conspec_core::ActCompletion;

    fn marked_chain() -> (Taxonomy, ContextId, ContextId, ContextId) {
        let root = ContextNode::builder("abstract_base")
            .abstract_node()
            .establish(|state| {
                state.insert("base", true);
                Ok(())
            })
            .build();
        let mid = ContextNode::builder("concrete_mid")
            .parent(Arc::clone(&root))
            .suite()
            .act(|_| Ok(ActCompletion::Done))
            .case("mid_case", |_| Ok(()))
            .build();
        let leaf = ContextNode::builder("concrete_leaf")
            .parent(Arc::clone(&mid))
            .case("leaf_case", |_| Ok(()))
            .build();

        let root_id = root.id().clone();
        let mid_id = mid.id().clone();
        let leaf_id = leaf.id().clone();
        let taxonomy = Taxonomy::from_nodes([root, mid, leaf]);
        (taxonomy, root_id, mid_id, leaf_id)
    }

    #[test]
    fn abstract_nodes_never_decide_true() {
        let (taxonomy, root_id, _, _) = marked_chain();
        assert!(!taxonomy.decide(&root_id));
    }

    #[test]
    fn only_the_leaf_most_qualifying_node_builds() {
        let (taxonomy, _, mid_id, leaf_id) = marked_chain();
        // The mid node qualifies through its own marker but has a concrete
        // descendant, so only the leaf materializes.
        assert!(!taxonomy.decide(&mid_id));
        assert!(taxonomy.decide(&leaf_id));
        assert_eq!(taxonomy.buildable().len(), 1);
    }

    #[test]
    fn a_lone_marked_concrete_node_builds() {
        let node = ContextNode::builder("lone").suite().case("c", |_| Ok(())).build();
        let id = node.id().clone();
        let taxonomy = Taxonomy::from_nodes([node]);
        assert!(taxonomy.decide(&id));
    }

    #[test]
    fn unmarked_chains_never_build() {
        let root = ContextNode::builder("plain_root").build();
        let leaf = ContextNode::builder("plain_leaf").parent(Arc::clone(&root)).build();
        let leaf_id = leaf.id().clone();
        let taxonomy = Taxonomy::from_nodes([root, leaf]);
        assert!(!taxonomy.decide(&leaf_id));
    }

    #[test]
    fn built_suite_unions_ancestor_cases_root_first() {
        let (taxonomy, _, _, leaf_id) = marked_chain();
        let suite = taxonomy.build(&leaf_id).expect("buildable");
        let names: Vec<&str> = suite.cases().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["mid_case", "leaf_case"]);
    }

    #[test]
    fn building_an_abstract_node_is_an_error() {
        let (taxonomy, root_id, _, _) = marked_chain();
        assert_matches!(
            taxonomy.build(&root_id),
            Err(ConspecError::AmbiguousSuite { .. })
        );
    }

    #[test]
    fn zero_case_suites_are_valid() {
        let node = ContextNode::builder("caseless").suite().build();
        let id = node.id().clone();
        let taxonomy = Taxonomy::from_nodes([node]);

        let mut suite = taxonomy.build(&id).expect("buildable");
        let report = suite.run_all();
        assert!(report.is_success());
        assert!(report.cases.is_empty());
    }

    #[test]
    fn failed_setup_marks_cases_pending_and_records_the_error() {
        let node = ContextNode::builder("broken")
            .suite()
            .establish(|_| Err(ConspecError::setup_order("broken", "arrange blew up")))
            .case("never_evaluated", |_| Ok(()))
            .build();
        let id = node.id().clone();
        let taxonomy = Taxonomy::from_nodes([node]);

        let mut suite = taxonomy.build(&id).expect("buildable");
        let report = suite.run_all();
        assert!(!report.is_success());
        assert_eq!(report.pending(), 1);
        assert_eq!(report.failed(), 0);
        assert!(report.error.as_deref().is_some_and(|e| e.contains("arrange blew up")));
    }
}
