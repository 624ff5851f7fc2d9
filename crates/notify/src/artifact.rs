//! Artifact reconstruction for forwarded and fallback notifications.
//!
//! A matched event is never relayed verbatim: its content is rebuilt
//! into transport-neutral [`Artifact`] values. Text parts are split at
//! a fixed boundary, attachments re-embedded inline or referenced, and
//! structured sections rebuilt field-by-field with a plain-text
//! fallback when a section cannot be reconstructed.

use serde::Serialize;

use sieve_core::{Event, Section};

/// A rendered artifact ready for delivery to one destination.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// Plain text part (possibly one of several "(continued i/n)" parts).
    Text { body: String },
    /// Re-embedded attachment. `inline` is false when the file exceeded
    /// the inline threshold and only the reference is forwarded.
    Attachment {
        reference: String,
        inline: bool,
        size_bytes: u64,
    },
    /// A structured section rebuilt field-by-field.
    Section { section: Section },
    /// Generic fallback notification summarizing all matched rules.
    Summary(NotificationSummary),
}

/// Summary payload for the fallback notification path.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationSummary {
    pub title: String,
    pub event_id: String,
    pub source_item_id: String,
    pub author_id: String,
    pub severity: String,
    pub matched_rules: Vec<MatchedRuleLine>,
    /// Excerpt of the original text, truncated for display.
    pub content_excerpt: Option<String>,
    /// What the engine did (or would have done under dry run).
    pub action_note: String,
}

/// One matched rule's line in a fallback notification.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchedRuleLine {
    pub name: String,
    pub severity: String,
    /// First few matched texts; see [`MatchedRuleLine::new`].
    pub matched_texts: Vec<String>,
    /// True when more matches existed than are listed.
    pub truncated: bool,
}

/// Matched texts shown per rule before truncation.
const MAX_MATCHED_TEXTS: usize = 3;

/// Excerpt length for the original content in a summary.
const MAX_CONTENT_EXCERPT: usize = 1024;

impl MatchedRuleLine {
    /// Keep the first three matched texts, flagging truncation.
    pub fn new(name: impl Into<String>, severity: &str, mut matched_texts: Vec<String>) -> Self {
        let truncated = matched_texts.len() > MAX_MATCHED_TEXTS;
        matched_texts.truncate(MAX_MATCHED_TEXTS);
        Self {
            name: name.into(),
            severity: severity.to_string(),
            matched_texts,
            truncated,
        }
    }
}

/// Build the ordered artifact list that forwards one event.
///
/// Order mirrors the original content: text parts, then attachments,
/// then sections. An event with nothing forwardable produces a single
/// placeholder part.
pub fn build_forward_parts(
    event: &Event,
    max_text_part_size: usize,
    max_inline_attachment_bytes: u64,
) -> Vec<Artifact> {
    let mut parts = Vec::new();

    if let Some(text) = event.text.as_deref().filter(|t| !t.trim().is_empty()) {
        for part in split_text(text, max_text_part_size) {
            parts.push(Artifact::Text { body: part });
        }
    }

    for attachment in &event.attachments {
        parts.push(Artifact::Attachment {
            reference: attachment.reference.clone(),
            inline: attachment.size_bytes < max_inline_attachment_bytes,
            size_bytes: attachment.size_bytes,
        });
    }

    for section in &event.sections {
        parts.push(rebuild_section(section));
    }

    if parts.is_empty() {
        parts.push(Artifact::Text {
            body: "[empty message or unsupported content]".to_string(),
        });
    }

    parts
}

/// Split text at a fixed boundary into suffixed parts.
///
/// Text at or under the boundary is returned unchanged as one part;
/// longer text becomes chunks with a "(continued i/n)" suffix.
/// Splitting is by character, never inside a UTF-8 sequence.
pub fn split_text(text: &str, max_part_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if max_part_size == 0 || chars.len() <= max_part_size {
        return vec![text.to_string()];
    }

    let chunks: Vec<String> = chars
        .chunks(max_part_size)
        .map(|c| c.iter().collect())
        .collect();
    let total = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, part)| format!("{} (continued {}/{})", part, i + 1, total))
        .collect()
}

/// Rebuild a structured section field-by-field, preserving order.
///
/// A section with no renderable content cannot be reconstructed; it
/// falls back to a flattened plain-text summary instead of failing the
/// whole dispatch.
pub fn rebuild_section(section: &Section) -> Artifact {
    let has_content = section.title.as_deref().is_some_and(|s| !s.is_empty())
        || section.body.as_deref().is_some_and(|s| !s.is_empty())
        || section.footer.as_deref().is_some_and(|s| !s.is_empty())
        || section.author_name.as_deref().is_some_and(|s| !s.is_empty())
        || section
            .subfields
            .iter()
            .any(|f| !f.name.is_empty() || !f.value.is_empty());

    if !has_content {
        return Artifact::Text {
            body: flatten_section(section),
        };
    }

    Artifact::Section {
        section: section.clone(),
    }
}

/// Flatten a section into a plain-text summary.
///
/// Used when the structured form cannot be rebuilt or a destination
/// rejects it.
pub fn flatten_section(section: &Section) -> String {
    let mut lines = Vec::new();
    if let Some(title) = section.title.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("**Title**: {title}"));
    }
    if let Some(body) = section.body.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("**Body**: {body}"));
    }
    for field in &section.subfields {
        lines.push(format!("**{}**: {}", field.name, field.value));
    }
    if let Some(footer) = section.footer.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("**Footer**: {footer}"));
    }
    if let Some(author) = section.author_name.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("**Author**: {author}"));
    }

    if lines.is_empty() {
        "[could not reconstruct section content]".to_string()
    } else {
        lines.join("\n")
    }
}

/// Build the generic fallback notification for an event.
pub fn build_summary(
    event: &Event,
    matched_rules: Vec<MatchedRuleLine>,
    severity: &str,
    action_note: String,
) -> Artifact {
    let content_excerpt = event.text.as_deref().map(|t| {
        if t.chars().count() > MAX_CONTENT_EXCERPT {
            let cut: String = t.chars().take(MAX_CONTENT_EXCERPT - 1).collect();
            format!("{cut}…")
        } else {
            t.to_string()
        }
    });

    Artifact::Summary(NotificationSummary {
        title: "Content filter alert".to_string(),
        event_id: event.id.clone(),
        source_item_id: event.source_item_id.clone(),
        author_id: event.author_id.clone(),
        severity: severity.to_string(),
        matched_rules,
        content_excerpt,
        action_note,
    })
}
