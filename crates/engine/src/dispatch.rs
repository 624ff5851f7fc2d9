//! Dispatch: turn an escalation result into deliveries.
//!
//! Order of operations for one matched event:
//! 1. Self-loop guard: drop any group whose destination is the event's
//!    own source when the event is self-authored.
//! 2. Forward the rebuilt artifact parts to every remaining group.
//! 3. Delete the original when the effective action demands it (and
//!    dry run is off).
//! 4. Fallback notification to the default destination when nothing
//!    was forwarded, throttled per `(author, keyword)` pair.
//!
//! A failing destination never aborts the remaining ones; failures are
//! collected into the report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use sieve_core::{EngineConfig, Event, Rule, RuleAction};
use sieve_notify::{
    build_forward_parts, build_summary, flatten_section, Artifact, DeleteSink, MatchedRuleLine,
    NotificationSink,
};
use tracing::{debug, info, warn};

use crate::escalator::Escalation;
use crate::matcher::MatchSpan;
use crate::store::GateStore;

/// Delivery outcome for one destination group.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub destination: String,
    pub parts_sent: usize,
    pub parts_failed: usize,
    /// True when the self-loop guard dropped the group entirely.
    pub skipped_self_loop: bool,
}

/// What dispatch did for one event.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// At least one part reached at least one destination.
    pub forwarded: bool,
    pub groups: Vec<GroupOutcome>,
    pub deleted: bool,
    pub fallback_sent: bool,
    /// Human-readable descriptions of per-destination failures.
    pub failures: Vec<String>,
}

pub struct Dispatcher {
    config: EngineConfig,
    notifier: Arc<dyn NotificationSink>,
    deleter: Arc<dyn DeleteSink>,
    store: Arc<GateStore>,
}

impl Dispatcher {
    pub fn new(
        config: EngineConfig,
        notifier: Arc<dyn NotificationSink>,
        deleter: Arc<dyn DeleteSink>,
        store: Arc<GateStore>,
    ) -> Self {
        Self {
            config,
            notifier,
            deleter,
            store,
        }
    }

    /// Execute the escalation result for one event.
    pub async fn dispatch(
        &self,
        event: &Event,
        matched: &BTreeMap<String, Vec<MatchSpan>>,
        rules: &[Rule],
        escalation: &Escalation,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        let parts = build_forward_parts(
            event,
            self.config.max_text_part_size,
            self.config.max_inline_attachment_bytes,
        );

        for group in &escalation.groups {
            if event.is_self_authored && group.destination == event.source_item_id {
                warn!(
                    event_id = %event.id,
                    destination = %group.destination,
                    "self-loop guard: not forwarding event back to its own source"
                );
                report.groups.push(GroupOutcome {
                    destination: group.destination.clone(),
                    parts_sent: 0,
                    parts_failed: 0,
                    skipped_self_loop: true,
                });
                continue;
            }

            let mut sent = 0;
            let mut failed = 0;
            for part in &parts {
                if self
                    .send_part(&group.destination, part, &mut report.failures)
                    .await
                {
                    sent += 1;
                } else {
                    failed += 1;
                }
            }

            debug!(
                event_id = %event.id,
                destination = %group.destination,
                rule_ids = ?group.rule_ids,
                sent,
                failed,
                "group dispatched"
            );
            if sent > 0 {
                report.forwarded = true;
            }
            report.groups.push(GroupOutcome {
                destination: group.destination.clone(),
                parts_sent: sent,
                parts_failed: failed,
                skipped_self_loop: false,
            });
        }

        // When the self-loop guard dropped every group and no fallback
        // path exists, the event terminates with no side effects.
        let guard_emptied_all = !escalation.groups.is_empty()
            && report.groups.iter().all(|g| g.skipped_self_loop);
        let fallback_available =
            self.config.notify_filtered && self.config.default_destination.is_some();
        if guard_emptied_all && !fallback_available {
            debug!(
                event_id = %event.id,
                "self-loop guard emptied all groups, terminating without side effects"
            );
            return report;
        }

        if escalation.effective_action == RuleAction::Delete {
            if self.config.dry_run {
                info!(event_id = %event.id, "dry run: delete suppressed");
            } else {
                match self.deleter.delete(&event.id).await {
                    Ok(()) => {
                        info!(event_id = %event.id, "event deleted");
                        report.deleted = true;
                    }
                    Err(e) => {
                        warn!(event_id = %event.id, error = %e, "delete failed");
                        report.failures.push(format!("delete {}: {e}", event.id));
                    }
                }
            }
        }

        let wants_fallback = self.config.notify_filtered
            && !report.forwarded
            && (escalation.effective_action >= RuleAction::Notify || self.config.dry_run);
        if wants_fallback {
            report.fallback_sent = self
                .send_fallback(event, matched, rules, escalation, &mut report.failures)
                .await;
        }

        report
    }

    /// Deliver one artifact, retrying a rejected section as flat text.
    async fn send_part(
        &self,
        destination: &str,
        part: &Artifact,
        failures: &mut Vec<String>,
    ) -> bool {
        match self.notifier.send(destination, part).await {
            Ok(()) => true,
            Err(first_err) => {
                if let Artifact::Section { section } = part {
                    let fallback = Artifact::Text {
                        body: flatten_section(section),
                    };
                    match self.notifier.send(destination, &fallback).await {
                        Ok(()) => {
                            debug!(%destination, "section rejected, delivered as flat text");
                            return true;
                        }
                        Err(e) => {
                            failures.push(format!("send to {destination}: {e}"));
                            return false;
                        }
                    }
                }
                failures.push(format!("send to {destination}: {first_err}"));
                false
            }
        }
    }

    /// Send the generic fallback alert, throttled per `(author, keyword)`.
    ///
    /// The alert goes out when at least one pair is outside its
    /// cool-down window; only the pairs that were open get recorded,
    /// and only after a successful send.
    async fn send_fallback(
        &self,
        event: &Event,
        matched: &BTreeMap<String, Vec<MatchSpan>>,
        rules: &[Rule],
        escalation: &Escalation,
        failures: &mut Vec<String>,
    ) -> bool {
        let Some(destination) = self.config.default_destination.as_deref() else {
            warn!(event_id = %event.id, "fallback wanted but no default destination configured");
            return false;
        };

        let keywords: BTreeSet<&str> = matched
            .values()
            .flatten()
            .map(|s| s.pattern.as_str())
            .collect();
        let open_keywords: Vec<&str> = keywords
            .iter()
            .copied()
            .filter(|k| !self.store.should_suppress(&event.author_id, k))
            .collect();
        if open_keywords.is_empty() {
            debug!(
                event_id = %event.id,
                author_id = %event.author_id,
                "fallback suppressed: all matched keywords within cool-down"
            );
            return false;
        }

        let lines: Vec<MatchedRuleLine> = matched
            .iter()
            .map(|(rule_id, spans)| {
                let (name, severity) = rules
                    .iter()
                    .find(|r| &r.id == rule_id)
                    .map(|r| (r.display_name().to_string(), r.severity.as_str()))
                    .unwrap_or_else(|| (rule_id.clone(), "medium"));
                let texts = spans.iter().map(|s| s.matched_text.clone()).collect();
                MatchedRuleLine::new(name, severity, texts)
            })
            .collect();

        let mut action_note = format!("action: {}", escalation.effective_action.as_str());
        if self.config.dry_run {
            action_note.push_str(" (dry run - no destructive action taken)");
        }
        let summary = build_summary(
            event,
            lines,
            escalation.effective_severity.as_str(),
            action_note,
        );

        match self.notifier.send(destination, &summary).await {
            Ok(()) => {
                for keyword in open_keywords {
                    self.store.record(&event.author_id, keyword);
                }
                info!(event_id = %event.id, %destination, "fallback notification sent");
                true
            }
            Err(e) => {
                warn!(event_id = %event.id, %destination, error = %e, "fallback send failed");
                failures.push(format!("fallback to {destination}: {e}"));
                false
            }
        }
    }
}
