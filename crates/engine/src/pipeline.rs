//! End-to-end event pipeline: dedup gate, evaluation, escalation,
//! dispatch.

use std::sync::{Arc, Mutex};

use sieve_core::{EngineConfig, Event, Rule};
use sieve_notify::{DeleteSink, NotificationSink};
use tracing::{debug, info};

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::escalator::escalate;
use crate::evaluator::RuleEvaluator;
use crate::extract::extract_corpus;
use crate::store::GateStore;

/// Source of the active rule set.
///
/// Implementations return a snapshot; the engine never caches between
/// events, so hot-reloaded rules take effect on the next event.
pub trait RuleStore: Send + Sync {
    fn active_rules(&self) -> Vec<Rule>;
}

/// Fixed rule set, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: Mutex<Vec<Rule>>,
}

impl InMemoryRuleStore {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    pub fn replace(&self, rules: Vec<Rule>) {
        *self.rules.lock().expect("rule store lock poisoned") = rules;
    }
}

impl RuleStore for InMemoryRuleStore {
    fn active_rules(&self) -> Vec<Rule> {
        self.rules.lock().expect("rule store lock poisoned").clone()
    }
}

/// The assembled engine.
pub struct Engine {
    rules: Arc<dyn RuleStore>,
    evaluator: RuleEvaluator,
    dispatcher: Dispatcher,
    store: Arc<GateStore>,
    default_destination: Option<String>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        rules: Arc<dyn RuleStore>,
        notifier: Arc<dyn NotificationSink>,
        deleter: Arc<dyn DeleteSink>,
    ) -> Self {
        let store = Arc::new(GateStore::new(&config));
        let default_destination = config.default_destination.clone();
        let dispatcher = Dispatcher::new(config, notifier, deleter, store.clone());
        Self {
            rules,
            evaluator: RuleEvaluator::new(),
            dispatcher,
            store,
            default_destination,
        }
    }

    /// Shared gate store, for wiring the cleanup task.
    pub fn gate_store(&self) -> Arc<GateStore> {
        self.store.clone()
    }

    /// Process one event through the full pipeline.
    ///
    /// Returns `None` when the event was a duplicate or matched no
    /// rule; re-delivering such an event is a no-op.
    pub async fn process(&self, event: &Event) -> Option<DispatchReport> {
        if !self.store.check_and_mark(&event.id) {
            debug!(event_id = %event.id, "duplicate event ignored");
            return None;
        }

        let corpus = extract_corpus(event);
        if corpus.is_empty() {
            debug!(event_id = %event.id, "event has no matchable content");
            return None;
        }

        let rules = self.rules.active_rules();
        let matched = self.evaluator.evaluate_corpus(event, &corpus, &rules);
        if matched.is_empty() {
            return None;
        }

        let matched_ids: Vec<String> = matched.keys().cloned().collect();
        let escalation = escalate(&matched_ids, &rules, self.default_destination.as_deref());
        info!(
            event_id = %event.id,
            matched = ?matched_ids,
            action = escalation.effective_action.as_str(),
            severity = escalation.effective_severity.as_str(),
            "event matched"
        );

        Some(
            self.dispatcher
                .dispatch(event, &matched, &rules, &escalation)
                .await,
        )
    }
}
