//! Inbound content event model.
//!
//! An [`Event`] is one content item handed to the engine by the
//! ingestion collaborator. It is immutable for the duration of
//! processing and never persisted here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound content item to evaluate against the rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Opaque id, unique per occurrence.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Fine-grained source identifier (e.g. a specific channel).
    pub source_item_id: String,
    /// Coarse-grained source identifier (e.g. a category).
    #[serde(default)]
    pub source_coarse_id: Option<String>,
    pub author_id: String,
    /// Whether `author_id` equals the dispatcher's own identity.
    #[serde(default)]
    pub is_self_authored: bool,
    /// Main text body, if any.
    #[serde(default)]
    pub text: Option<String>,
    /// Structured sections attached to the event, in order.
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Event {
    /// True when the event carries nothing that could ever match.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, |t| t.trim().is_empty())
            && self.sections.is_empty()
            && self.attachments.is_empty()
    }
}

/// One structured section of an event (title, body, subfields, footer, author).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Section {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub subfields: Vec<SectionField>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
}

/// A named value inside a section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionField {
    pub name: String,
    pub value: String,
}

/// A file reference carried by an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    /// Transport-level reference (URL or handle).
    pub reference: String,
    pub size_bytes: u64,
}
