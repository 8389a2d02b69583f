//! Specification-style test authoring.
//!
//! A test is a tree of contexts: each context establishes preconditions,
//! optionally performs one shared action, and attaches many independent
//! assertion cases evaluated against the shared post-action state. The
//! framework guarantees establish/act run exactly once per context, and can
//! substitute virtual-time schedulers so time-dependent code is verified
//! synchronously.
//!
//! ```rust
//! use conspec::prelude::*;
//!
//! let when_account_is_created = ContextNode::builder("when_account_is_created")
//!     .suite()
//!     .establish(|state| {
//!         state.insert("balance", 0u64);
//!         Ok(())
//!     })
//!     .act(|state| {
//!         state.insert("balance", 100u64);
//!         Ok(ActCompletion::Done)
//!     })
//!     .case("balance_is_100", |state| {
//!         match state.get::<u64>("balance") {
//!             Some(&100) => Ok(()),
//!             other => Err(format!("expected 100, saw {other:?}")),
//!         }
//!     })
//!     .build();
//!
//! let taxonomy = Taxonomy::from_nodes([when_account_is_created.clone()]);
//! let mut suite = taxonomy.build(when_account_is_created.id()).unwrap();
//! let report = suite.run_all();
//! assert!(report.is_success());
//! ```

pub mod runner;
pub mod suite;

pub use conspec_core::{
    ActCompletion, AssertionCase, CaseOutcome, CaseReport, ConspecError, ContextId,
    ContextInstance, ContextNode, ContextNodeBuilder, ContextState, Phase,
};
pub use conspec_scheduler::{
    registry, Scheduler, SchedulerHandle, SchedulerOverride, SchedulerSlot, VirtualScheduler,
    VirtualSchedulerContext,
};
pub use runner::{BasicExtensionHost, ExtensionHost, SuiteSource, TaxonomySuiteSource};
pub use suite::{Suite, SuiteReport, Taxonomy};

/// The authoring surface, for glob import in test modules.
pub mod prelude {
    pub use crate::runner::{BasicExtensionHost, ExtensionHost, SuiteSource, TaxonomySuiteSource};
    pub use crate::suite::{Suite, SuiteReport, Taxonomy};
    pub use conspec_core::{
        ActCompletion, AssertionCase, CaseOutcome, CaseReport, ConspecError, ContextId,
        ContextInstance, ContextNode, ContextNodeBuilder, ContextState, Phase,
    };
    pub use conspec_scheduler::{
        registry, Scheduler, SchedulerHandle, SchedulerSlot, VirtualSchedulerContext,
    };
}

/// Initialize tracing output for tests. Safe to call from every test; only
/// the first call installs the subscriber.
pub fn init_test_logging() {
    static INIT: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
