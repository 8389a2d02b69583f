//! Context model and lifecycle engine for the conspec test framework.
//!
//! A test is declared as a tree of contexts: each [`context::ContextNode`]
//! arranges preconditions, optionally performs one shared action, and
//! attaches independent assertion cases. A [`lifecycle::ContextInstance`]
//! runs one node's chain with exactly-once establish/act semantics and
//! tri-state assertion outcomes.

pub mod context;
pub mod error;
pub mod lifecycle;
pub mod outcome;

pub use context::{
    ActCompletion, AssertionCase, ContextId, ContextNode, ContextNodeBuilder, ContextState,
};
pub use error::ConspecError;
pub use lifecycle::{ContextInstance, Phase};
pub use outcome::{CaseOutcome, CaseReport};
