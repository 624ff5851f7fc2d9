//! Rule evaluation: scope gating plus pattern matching per rule.
//!
//! Each enabled rule is checked independently; a rule whose scope does
//! not admit the event's source is skipped before any pattern work.
//! The result maps rule id to the spans that rule produced, in a
//! deterministic order.

use std::collections::BTreeMap;

use sieve_core::{Event, Rule};
use tracing::debug;

use crate::extract::extract_corpus;
use crate::matcher::{find_matches, CorpusEntry, MatchSpan};

#[derive(Debug, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every rule against one event.
    ///
    /// Returns only rules that matched; an empty map means the event
    /// passes through untouched.
    pub fn evaluate(&self, event: &Event, rules: &[Rule]) -> BTreeMap<String, Vec<MatchSpan>> {
        let corpus = extract_corpus(event);
        self.evaluate_corpus(event, &corpus, rules)
    }

    /// Evaluate against an already-extracted corpus.
    pub fn evaluate_corpus(
        &self,
        event: &Event,
        corpus: &[CorpusEntry],
        rules: &[Rule],
    ) -> BTreeMap<String, Vec<MatchSpan>> {
        let mut matched = BTreeMap::new();
        if corpus.is_empty() {
            return matched;
        }

        for rule in rules {
            if !rule.enabled || rule.patterns.is_empty() {
                continue;
            }
            if !rule
                .scope
                .admits(&event.source_item_id, event.source_coarse_id.as_deref())
            {
                continue;
            }

            let spans = find_matches(&rule.id, corpus, &rule.patterns);
            if !spans.is_empty() {
                debug!(
                    rule_id = %rule.id,
                    event_id = %event.id,
                    span_count = spans.len(),
                    "rule matched"
                );
                matched.insert(rule.id.clone(), spans);
            }
        }

        matched
    }
}
