//! Escalation: combine all matched rules for one event into an overall
//! action/severity and per-destination dispatch groups.
//!
//! Actions and severities are totally ordered; the effective value is
//! always the maximum across matched rules, both overall and within
//! each destination group. A rule with no destination (and no
//! configured default) still raises the maxima but joins no group.

use std::collections::BTreeMap;

use sieve_core::{Rule, RuleAction, Severity};
use tracing::warn;

/// Rules routed to one destination, with that group's own maxima.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchGroup {
    pub destination: String,
    pub rule_ids: Vec<String>,
    pub effective_action: RuleAction,
    pub effective_severity: Severity,
}

/// Overall escalation result for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub effective_action: RuleAction,
    pub effective_severity: Severity,
    pub groups: Vec<DispatchGroup>,
}

/// Combine matched rules into an [`Escalation`].
///
/// `matched_rule_ids` must be the ids reported by the evaluator;
/// ids without a corresponding rule are ignored.
pub fn escalate(
    matched_rule_ids: &[String],
    rules: &[Rule],
    default_destination: Option<&str>,
) -> Escalation {
    let mut effective_action = RuleAction::Log;
    let mut effective_severity = Severity::Low;
    let mut groups: BTreeMap<String, DispatchGroup> = BTreeMap::new();

    for id in matched_rule_ids {
        let Some(rule) = rules.iter().find(|r| &r.id == id) else {
            continue;
        };

        effective_action = effective_action.max(rule.action);
        effective_severity = effective_severity.max(rule.severity);

        let destination = rule
            .destination
            .as_deref()
            .or(default_destination)
            .map(str::to_string);
        let Some(destination) = destination else {
            warn!(rule_id = %rule.id, "rule matched but has no destination");
            continue;
        };

        let group = groups
            .entry(destination.clone())
            .or_insert_with(|| DispatchGroup {
                destination,
                rule_ids: Vec::new(),
                effective_action: RuleAction::Log,
                effective_severity: Severity::Low,
            });
        group.rule_ids.push(rule.id.clone());
        group.effective_action = group.effective_action.max(rule.action);
        group.effective_severity = group.effective_severity.max(rule.severity);
    }

    Escalation {
        effective_action,
        effective_severity,
        groups: groups.into_values().collect(),
    }
}
