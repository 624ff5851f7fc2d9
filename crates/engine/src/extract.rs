//! Content extraction: flatten an event into an ordered, origin-tagged
//! corpus for matching.
//!
//! Order is fixed: main text first, then per section: title, body,
//! each subfield's name and value, footer, author name. Empty fields
//! are skipped. The `source_field` label on each entry is what a
//! [`crate::matcher::MatchSpan`] records to support highlighting
//! downstream.

use sieve_core::Event;

use crate::matcher::CorpusEntry;

/// Flatten an event's text and sections into corpus entries.
pub fn extract_corpus(event: &Event) -> Vec<CorpusEntry> {
    let mut corpus = Vec::new();

    let mut push = |text: Option<&str>, label: String| {
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            corpus.push(CorpusEntry {
                text: text.to_string(),
                source_field: label,
            });
        }
    };

    push(event.text.as_deref(), "content".to_string());

    for (i, section) in event.sections.iter().enumerate() {
        push(section.title.as_deref(), format!("section[{i}].title"));
        push(section.body.as_deref(), format!("section[{i}].body"));
        for (j, field) in section.subfields.iter().enumerate() {
            push(Some(&field.name), format!("section[{i}].subfield[{j}].name"));
            push(Some(&field.value), format!("section[{i}].subfield[{j}].value"));
        }
        push(section.footer.as_deref(), format!("section[{i}].footer"));
        push(section.author_name.as_deref(), format!("section[{i}].author"));
    }

    corpus
}
