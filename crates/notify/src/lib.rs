//! Notification artifacts and delivery sinks.
//!
//! This crate provides:
//! - `NotificationSink` / `DeleteSink` traits for pluggable transports
//! - Artifact reconstruction (text splitting, attachment handling,
//!   section rebuild with plain-text fallback)
//! - A webhook sink implementation delivering artifacts as JSON

pub mod artifact;
pub mod traits;
pub mod webhook;

pub use artifact::{
    build_forward_parts, build_summary, flatten_section, split_text, Artifact, MatchedRuleLine,
    NotificationSummary,
};
pub use traits::{DeleteSink, NotificationSink, NotifyError};
pub use webhook::WebhookSink;
