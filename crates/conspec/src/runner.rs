//! Host-runner extension contract.
//!
//! The external test runner discovers declared contexts and talks to the
//! framework through this narrow seam: [`SuiteSource`] answers "is this a
//! suite" and constructs suites; [`ExtensionHost`] is the runner's
//! registration point the source installs itself into.

use crate::suite::{Suite, Taxonomy};
use conspec_core::{ConspecError, ContextId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// The suite-construction surface consumed by the host runner.
pub trait SuiteSource: Send + Sync {
    /// Whether `id` should be materialized as a runnable suite.
    fn can_build_from(&self, id: &ContextId) -> bool;

    /// Construct the suite for `id`. Only called after [`Self::can_build_from`]
    /// returned true.
    fn build_from(&self, id: &ContextId) -> Result<Suite, ConspecError>;
}

/// The host runner's suite-builder extension point.
pub trait ExtensionHost {
    /// Register a suite source under `name`. Returns false if a source with
    /// that name is already registered.
    fn register_suite_source(&mut self, name: &str, source: Arc<dyn SuiteSource>) -> bool;
}

/// [`SuiteSource`] backed by a declared [`Taxonomy`].
pub struct TaxonomySuiteSource {
    taxonomy: Taxonomy,
    installed: AtomicBool,
}

impl TaxonomySuiteSource {
    /// Source name used at registration.
    pub const NAME: &'static str = "conspec";

    /// Wrap a taxonomy.
    pub fn new(taxonomy: Taxonomy) -> Arc<Self> {
        Arc::new(Self {
            taxonomy,
            installed: AtomicBool::new(false),
        })
    }

    /// The wrapped taxonomy.
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// One-time registration into the host's extension point.
    ///
    /// The first successful registration returns true and latches the
    /// source; later calls return false without re-registering. A host
    /// that rejects the name leaves the source uninstalled, so it can
    /// still be installed into another host.
    pub fn install(self: &Arc<Self>, host: &mut dyn ExtensionHost) -> bool {
        if self.installed.load(Ordering::SeqCst) {
            return false;
        }
        let registered = host.register_suite_source(Self::NAME, Arc::clone(self) as Arc<dyn SuiteSource>);
        if registered {
            self.installed.store(true, Ordering::SeqCst);
        }
        info!(registered, "conspec suite source installed");
        registered
    }
}

impl SuiteSource for TaxonomySuiteSource {
    fn can_build_from(&self, id: &ContextId) -> bool {
        self.taxonomy.decide(id)
    }

    fn build_from(&self, id: &ContextId) -> Result<Suite, ConspecError> {
        self.taxonomy.build(id)
    }
}

/// A minimal in-process [`ExtensionHost`] for embedders and tests.
#[derive(Default)]
pub struct BasicExtensionHost {
    sources: HashMap<String, Arc<dyn SuiteSource>>,
}

impl BasicExtensionHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// The source registered under `name`, if any.
    pub fn source(&self, name: &str) -> Option<&Arc<dyn SuiteSource>> {
        self.sources.get(name)
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ExtensionHost for BasicExtensionHost {
    fn register_suite_source(&mut self, name: &str, source: Arc<dyn SuiteSource>) -> bool {
        if self.sources.contains_key(name) {
            return false;
        }
        self.sources.insert(name.to_owned(), source);
        true
    }
}
