//! End-to-end pipeline tests: events in, deliveries out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use sieve_core::{
    Attachment, EngineConfig, Event, Rule, RuleAction, RuleScope, Severity,
};
use sieve_engine::{Engine, InMemoryRuleStore, RuleLoader, RuleStore};
use sieve_notify::{Artifact, DeleteSink, NotificationSink, NotifyError};

// ── Test sink ───────────────────────────────────────────────────────

#[derive(Default)]
struct TestSink {
    sends: Mutex<Vec<(String, Artifact)>>,
    deletes: AtomicUsize,
    fail_destinations: Vec<String>,
}

impl TestSink {
    fn sent(&self) -> Vec<(String, Artifact)> {
        self.sends.lock().unwrap().clone()
    }

    fn sent_to(&self, destination: &str) -> usize {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == destination)
            .count()
    }
}

#[async_trait::async_trait]
impl NotificationSink for TestSink {
    async fn send(&self, destination: &str, artifact: &Artifact) -> Result<(), NotifyError> {
        if self.fail_destinations.iter().any(|d| d == destination) {
            return Err(NotifyError::Transport("unreachable".to_string()));
        }
        self.sends
            .lock()
            .unwrap()
            .push((destination.to_string(), artifact.clone()));
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "test"
    }
}

#[async_trait::async_trait]
impl DeleteSink for TestSink {
    async fn delete(&self, _event_id: &str) -> Result<(), NotifyError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn event(id: &str, text: &str) -> Event {
    Event {
        id: id.to_string(),
        timestamp: Utc::now(),
        source_item_id: "chan-1".to_string(),
        source_coarse_id: Some("cat-1".to_string()),
        author_id: "u1".to_string(),
        is_self_authored: false,
        text: Some(text.to_string()),
        sections: Vec::new(),
        attachments: Vec::new(),
    }
}

fn rule(id: &str, pattern: &str, action: RuleAction, destination: Option<&str>) -> Rule {
    Rule {
        id: id.to_string(),
        name: None,
        enabled: true,
        scope: RuleScope {
            allowed_items: ["chan-1".to_string()].into_iter().collect(),
            ..Default::default()
        },
        patterns: vec![pattern.to_string()],
        action,
        severity: Severity::Medium,
        destination: destination.map(str::to_string),
    }
}

fn engine_with(config: EngineConfig, rules: Vec<Rule>, sink: Arc<TestSink>) -> Engine {
    Engine::new(
        config,
        Arc::new(InMemoryRuleStore::new(rules)),
        sink.clone(),
        sink,
    )
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn matched_event_forwards_to_rule_destination() {
    let sink = Arc::new(TestSink::default());
    let engine = engine_with(
        EngineConfig::default(),
        vec![rule("scam", "free nitro", RuleAction::Notify, Some("alerts"))],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "claim your free nitro now"))
        .await
        .expect("event should match");
    assert!(report.forwarded);
    assert_eq!(sink.sent_to("alerts"), 1);
    match &sink.sent()[0].1 {
        Artifact::Text { body } => assert_eq!(body, "claim your free nitro now"),
        other => panic!("expected text part, got: {other:?}"),
    }
}

#[tokio::test]
async fn redelivered_event_dispatches_once() {
    let sink = Arc::new(TestSink::default());
    let engine = engine_with(
        EngineConfig::default(),
        vec![rule("scam", "nitro", RuleAction::Notify, Some("alerts"))],
        sink.clone(),
    );

    let e = event("e1", "free nitro");
    assert!(engine.process(&e).await.is_some());
    assert!(engine.process(&e).await.is_none());
    assert!(engine.process(&e).await.is_none());
    assert_eq!(sink.sent_to("alerts"), 1);
}

#[tokio::test]
async fn dry_run_never_deletes() {
    let sink = Arc::new(TestSink::default());
    let engine = engine_with(
        EngineConfig::default(), // dry_run defaults on
        vec![rule("bad", "malware", RuleAction::Delete, Some("mod-log"))],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "malware link"))
        .await
        .expect("event should match");
    assert!(!report.deleted);
    assert_eq!(sink.deletes.load(Ordering::SeqCst), 0);
    // Forwarding still happened.
    assert!(report.forwarded);
}

#[tokio::test]
async fn live_mode_deletes_on_delete_action() {
    let sink = Arc::new(TestSink::default());
    let config = EngineConfig {
        dry_run: false,
        ..Default::default()
    };
    let engine = engine_with(
        config,
        vec![rule("bad", "malware", RuleAction::Delete, Some("mod-log"))],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "malware link"))
        .await
        .expect("event should match");
    assert!(report.deleted);
    assert_eq!(sink.deletes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn self_authored_event_never_loops_back() {
    let sink = Arc::new(TestSink::default());
    let config = EngineConfig {
        notify_filtered: false,
        ..Default::default()
    };
    let engine = engine_with(
        config,
        vec![rule("echo", "nitro", RuleAction::Notify, Some("chan-1"))],
        sink.clone(),
    );

    let mut e = event("e1", "free nitro");
    e.is_self_authored = true;
    let report = engine.process(&e).await.expect("event should match");
    assert!(!report.forwarded);
    assert!(report.groups[0].skipped_self_loop);
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn same_destination_rules_forward_once() {
    let sink = Arc::new(TestSink::default());
    let engine = engine_with(
        EngineConfig::default(),
        vec![
            rule("a", "nitro", RuleAction::Notify, Some("alerts")),
            rule("b", "giveaway", RuleAction::Notify, Some("alerts")),
        ],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "nitro giveaway"))
        .await
        .expect("event should match");
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].destination, "alerts");
    assert_eq!(sink.sent_to("alerts"), 1);
}

#[tokio::test]
async fn distinct_destinations_each_receive_a_copy() {
    let sink = Arc::new(TestSink::default());
    let engine = engine_with(
        EngineConfig::default(),
        vec![
            rule("a", "nitro", RuleAction::Notify, Some("alerts")),
            rule("b", "giveaway", RuleAction::Notify, Some("mod-log")),
        ],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "nitro giveaway"))
        .await
        .expect("event should match");
    assert_eq!(report.groups.len(), 2);
    assert_eq!(sink.sent_to("alerts"), 1);
    assert_eq!(sink.sent_to("mod-log"), 1);
}

#[tokio::test]
async fn invalid_regex_does_not_disable_other_patterns() {
    let sink = Arc::new(TestSink::default());
    let mut bad = rule("mixed", "nitro", RuleAction::Notify, Some("alerts"));
    bad.patterns = vec!["(unclosed".to_string(), "nitro".to_string()];
    let engine = engine_with(EngineConfig::default(), vec![bad], sink.clone());

    let report = engine.process(&event("e1", "free nitro")).await;
    assert!(report.is_some_and(|r| r.forwarded));
}

#[tokio::test]
async fn failed_destination_is_reported_not_fatal() {
    let sink = Arc::new(TestSink {
        fail_destinations: vec!["broken".to_string()],
        ..Default::default()
    });
    let config = EngineConfig {
        notify_filtered: false,
        ..Default::default()
    };
    let engine = engine_with(
        config,
        vec![
            rule("a", "nitro", RuleAction::Notify, Some("broken")),
            rule("b", "nitro", RuleAction::Notify, Some("alerts")),
        ],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "free nitro"))
        .await
        .expect("event should match");
    assert!(report.forwarded);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(sink.sent_to("alerts"), 1);
}

#[tokio::test]
async fn default_destination_fills_destinationless_rule() {
    let sink = Arc::new(TestSink::default());
    let config = EngineConfig {
        default_destination: Some("ops".to_string()),
        ..Default::default()
    };
    let mut r = rule("quiet", "nitro", RuleAction::Notify, None);
    r.severity = Severity::High;
    let engine = engine_with(config, vec![r], sink.clone());

    let first = engine
        .process(&event("e1", "free nitro"))
        .await
        .expect("event should match");
    assert!(first.forwarded);
    assert_eq!(sink.sent_to("ops"), 1);
}

#[tokio::test]
async fn fallback_summary_throttled_per_author_and_keyword() {
    let sink = Arc::new(TestSink {
        fail_destinations: vec!["dead".to_string()],
        ..Default::default()
    });
    let config = EngineConfig {
        default_destination: Some("ops".to_string()),
        cool_down_seconds: 3600,
        ..Default::default()
    };
    // Forwarding always fails, so every matched event falls back.
    let engine = engine_with(
        config,
        vec![rule("scam", "nitro", RuleAction::Notify, Some("dead"))],
        sink.clone(),
    );

    let first = engine
        .process(&event("e1", "free nitro"))
        .await
        .expect("event should match");
    assert!(first.fallback_sent);
    assert_eq!(sink.sent_to("ops"), 1);
    match &sink.sent()[0].1 {
        Artifact::Summary(summary) => {
            assert_eq!(summary.author_id, "u1");
            assert_eq!(summary.matched_rules.len(), 1);
            assert!(summary.action_note.contains("dry run"));
        }
        other => panic!("expected summary, got: {other:?}"),
    }

    // Same author, same keyword, new event id: throttled.
    let second = engine
        .process(&event("e2", "free nitro again"))
        .await
        .expect("event should match");
    assert!(!second.fallback_sent);
    assert_eq!(sink.sent_to("ops"), 1);
}

#[tokio::test]
async fn failed_forward_with_delete_action_deletes_and_falls_back() {
    let sink = Arc::new(TestSink {
        fail_destinations: vec!["dead".to_string()],
        ..Default::default()
    });
    let config = EngineConfig {
        dry_run: false,
        default_destination: Some("ops".to_string()),
        ..Default::default()
    };
    let engine = engine_with(
        config,
        vec![rule("bad", "malware", RuleAction::Delete, Some("dead"))],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "malware link"))
        .await
        .expect("event should match");
    // Delete and the fallback alert both fire for the same event.
    assert!(!report.forwarded);
    assert!(report.deleted);
    assert_eq!(sink.deletes.load(Ordering::SeqCst), 1);
    assert!(report.fallback_sent);
    assert_eq!(sink.sent_to("ops"), 1);
    match &sink.sent()[0].1 {
        Artifact::Summary(summary) => {
            assert!(summary.action_note.contains("delete"));
            assert!(!summary.action_note.contains("dry run"));
        }
        other => panic!("expected summary, got: {other:?}"),
    }
}

#[tokio::test]
async fn long_text_forwards_as_continued_parts() {
    let sink = Arc::new(TestSink::default());
    let config = EngineConfig {
        max_text_part_size: 20,
        ..Default::default()
    };
    let long = format!("nitro {}", "x".repeat(50));
    let engine = engine_with(
        config,
        vec![rule("scam", "nitro", RuleAction::Notify, Some("alerts"))],
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", &long))
        .await
        .expect("event should match");
    assert!(report.forwarded);
    let sent = sink.sent();
    assert!(sent.len() > 1);
    match &sent[0].1 {
        Artifact::Text { body } => assert!(body.ends_with(&format!("(continued 1/{})", sent.len()))),
        other => panic!("expected text part, got: {other:?}"),
    }
}

#[tokio::test]
async fn attachment_only_event_forwards_references() {
    let sink = Arc::new(TestSink::default());
    let engine = engine_with(
        EngineConfig::default(),
        vec![rule("files", "invoice", RuleAction::Notify, Some("alerts"))],
        sink.clone(),
    );

    let mut e = event("e1", "invoice attached");
    e.attachments = vec![Attachment {
        reference: "https://cdn.example/huge.bin".to_string(),
        size_bytes: 100_000_000,
    }];
    let report = engine.process(&e).await.expect("event should match");
    assert!(report.forwarded);
    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    match &sent[1].1 {
        Artifact::Attachment { inline, .. } => assert!(!inline),
        other => panic!("expected attachment, got: {other:?}"),
    }
}

#[tokio::test]
async fn scoped_rule_ignores_out_of_scope_sources() {
    let sink = Arc::new(TestSink::default());
    let mut scoped = rule("local", "nitro", RuleAction::Notify, Some("alerts"));
    scoped.scope = RuleScope {
        allowed_items: ["chan-2".to_string()].into_iter().collect(),
        ..Default::default()
    };
    let engine = engine_with(EngineConfig::default(), vec![scoped], sink.clone());

    assert!(engine.process(&event("e1", "free nitro")).await.is_none());
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn rules_loaded_from_yaml_drive_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("scam.yml"),
        concat!(
            "id: scam\n",
            "scope:\n",
            "  allowed_items:\n",
            "    - chan-1\n",
            "patterns:\n",
            "  - free nitro\n",
            "action: notify\n",
            "severity: high\n",
            "destination: alerts\n",
        ),
    )
    .unwrap();

    let loader = RuleLoader::new(dir.path().to_path_buf());
    loader.load_all().unwrap();
    assert_eq!(loader.active_rules().len(), 1);

    let sink = Arc::new(TestSink::default());
    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(loader),
        sink.clone(),
        sink.clone(),
    );

    let report = engine
        .process(&event("e1", "free nitro inside"))
        .await
        .expect("event should match");
    assert!(report.forwarded);
    assert_eq!(sink.sent_to("alerts"), 1);
}
