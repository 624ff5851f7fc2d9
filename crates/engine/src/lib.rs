//! Rule matching and notification dispatch engine.
//!
//! This crate provides:
//! - Content extraction into an origin-tagged corpus
//! - Overlap-free literal/regex pattern matching
//! - Scope-gated rule evaluation and action/severity escalation
//! - Bounded dedup and per-keyword notification throttling
//! - A dispatcher producing forwards, deletes, and fallback alerts
//! - A YAML rule loader with hot-reload and a background cleanup task

pub mod cleanup;
pub mod dispatch;
pub mod escalator;
pub mod evaluator;
pub mod extract;
pub mod loader;
pub mod matcher;
pub mod pipeline;
pub mod store;

pub use dispatch::{DispatchReport, Dispatcher};
pub use escalator::{escalate, DispatchGroup, Escalation};
pub use evaluator::RuleEvaluator;
pub use loader::RuleLoader;
pub use matcher::{CorpusEntry, MatchSpan};
pub use pipeline::{Engine, InMemoryRuleStore, RuleStore};
pub use store::GateStore;
