//! Context declarations.
//!
//! A context is declared as a value, not inherited: a [`ContextNode`] holds
//! its own establish step, optional act step, and assertion cases, plus an
//! optional parent node whose establish steps run first. Nodes are built
//! with [`ContextNodeBuilder`] and are immutable for the duration of a run.

use crate::error::ConspecError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a declared context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId {
    name: String,
    id: Uuid,
}

impl ContextId {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
        }
    }

    /// The declared context name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Shared state written by establish/act steps and read by assertion cases.
///
/// A typed bag keyed by name; values are owned by the context instance and
/// live until disposal.
#[derive(Default)]
pub struct ContextState {
    values: HashMap<String, Box<dyn Any + Send>>,
}

impl ContextState {
    /// Create an empty state bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under `key`, replacing any previous value.
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// A shared reference to the value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// A mutable reference to the value under `key`, if present and of type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl fmt::Debug for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextState")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// How an act step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActCompletion {
    /// The action completed synchronously; assertions may run.
    Done,
    /// The action triggered asynchronous work that has not resolved yet.
    /// Assertions report `Pending` until completion is observed externally
    /// (typically by advancing a virtual scheduler).
    InFlight,
}

/// An establish (arrange) step.
pub type EstablishFn = Arc<dyn Fn(&mut ContextState) -> Result<(), ConspecError> + Send + Sync>;

/// An act step.
pub type ActFn =
    Arc<dyn Fn(&mut ContextState) -> Result<ActCompletion, ConspecError> + Send + Sync>;

/// An assertion check against post-act state. `Err` carries the failure
/// message.
pub type CheckFn = Arc<dyn Fn(&ContextState) -> Result<(), String> + Send + Sync>;

/// One independent assertion case declared on a context.
#[derive(Clone)]
pub struct AssertionCase {
    name: String,
    check: CheckFn,
}

impl AssertionCase {
    /// The case's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the check against `state`.
    pub fn check(&self, state: &ContextState) -> Result<(), String> {
        (self.check)(state)
    }
}

impl fmt::Debug for AssertionCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssertionCase")
            .field("name", &self.name)
            .finish()
    }
}

/// One node in the declared context taxonomy.
pub struct ContextNode {
    id: ContextId,
    parent: Option<Arc<ContextNode>>,
    establish: Option<EstablishFn>,
    act: Option<ActFn>,
    cases: Vec<AssertionCase>,
    abstract_node: bool,
    suite_marker: bool,
    virtual_time: bool,
}

impl ContextNode {
    /// Start declaring a context named `name`.
    pub fn builder(name: impl Into<String>) -> ContextNodeBuilder {
        ContextNodeBuilder::new(name)
    }

    /// The node's identity.
    pub fn id(&self) -> &ContextId {
        &self.id
    }

    /// The declared context name.
    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// The parent node, if any.
    pub fn parent(&self) -> Option<&Arc<ContextNode>> {
        self.parent.as_ref()
    }

    /// The node's own establish step, if declared.
    pub fn establish_step(&self) -> Option<&EstablishFn> {
        self.establish.as_ref()
    }

    /// The node's own act step, if declared.
    pub fn act_step(&self) -> Option<&ActFn> {
        self.act.as_ref()
    }

    /// Assertion cases declared directly on this node.
    pub fn cases(&self) -> &[AssertionCase] {
        &self.cases
    }

    /// Whether the node is abstract (reusable, never directly runnable).
    pub fn is_abstract(&self) -> bool {
        self.abstract_node
    }

    /// Whether the node carries the suite-eligibility marker.
    pub fn has_suite_marker(&self) -> bool {
        self.suite_marker
    }

    /// Whether instances of this context substitute virtual schedulers.
    pub fn uses_virtual_time(&self) -> bool {
        self.virtual_time
    }

    /// The chain from the root ancestor down to this node, root first.
    pub fn chain(&self) -> Vec<&ContextNode> {
        let mut chain = vec![self];
        let mut current = self.parent.as_deref();
        while let Some(node) = current {
            chain.push(node);
            current = node.parent.as_deref();
        }
        chain.reverse();
        chain
    }

    /// The node owning the act for this chain: this node's own act step if
    /// declared, else the nearest ancestor's.
    pub fn act_owner(&self) -> Option<&ContextNode> {
        let mut current = Some(self);
        while let Some(node) = current {
            if node.act.is_some() {
                return Some(node);
            }
            current = node.parent.as_deref();
        }
        None
    }

    /// Whether `ancestor` appears in this node's parent chain (the node
    /// itself excluded).
    pub fn descends_from(&self, ancestor: &ContextId) -> bool {
        let mut current = self.parent.as_deref();
        while let Some(node) = current {
            if node.id() == ancestor {
                return true;
            }
            current = node.parent.as_deref();
        }
        false
    }
}

impl fmt::Debug for ContextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextNode")
            .field("name", &self.id.name())
            .field("abstract", &self.abstract_node)
            .field("suite_marker", &self.suite_marker)
            .field("cases", &self.cases.len())
            .finish()
    }
}

/// Fluent construction of a [`ContextNode`].
pub struct ContextNodeBuilder {
    id: ContextId,
    parent: Option<Arc<ContextNode>>,
    establish: Option<EstablishFn>,
    act: Option<ActFn>,
    cases: Vec<AssertionCase>,
    abstract_node: bool,
    suite_marker: bool,
    virtual_time: bool,
}

impl ContextNodeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            id: ContextId::new(name),
            parent: None,
            establish: None,
            act: None,
            cases: Vec::new(),
            abstract_node: false,
            suite_marker: false,
            virtual_time: false,
        }
    }

    /// Compose on top of `parent`: its establish steps run before this
    /// node's, and its act is inherited unless this node declares one.
    pub fn parent(mut self, parent: Arc<ContextNode>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Declare the establish (arrange) step.
    pub fn establish<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ContextState) -> Result<(), ConspecError> + Send + Sync + 'static,
    {
        self.establish = Some(Arc::new(f));
        self
    }

    /// Declare the act step.
    pub fn act<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ContextState) -> Result<ActCompletion, ConspecError> + Send + Sync + 'static,
    {
        self.act = Some(Arc::new(f));
        self
    }

    /// Declare an assertion case.
    pub fn case<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ContextState) -> Result<(), String> + Send + Sync + 'static,
    {
        self.cases.push(AssertionCase {
            name: name.into(),
            check: Arc::new(check),
        });
        self
    }

    /// Mark the node abstract: reusable as a parent, never directly run.
    pub fn abstract_node(mut self) -> Self {
        self.abstract_node = true;
        self
    }

    /// Carry the suite-eligibility marker.
    pub fn suite(mut self) -> Self {
        self.suite_marker = true;
        self
    }

    /// Opt instances of this context into virtual-scheduler substitution.
    pub fn with_virtual_time(mut self) -> Self {
        self.virtual_time = true;
        self
    }

    /// Finish the declaration.
    pub fn build(self) -> Arc<ContextNode> {
        Arc::new(ContextNode {
            id: self.id,
            parent: self.parent,
            establish: self.establish,
            act: self.act,
            cases: self.cases,
            abstract_node: self.abstract_node,
            suite_marker: self.suite_marker,
            virtual_time: self.virtual_time,
        })
    }
}
