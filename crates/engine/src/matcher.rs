//! Overlap-free pattern matching over an extracted corpus.
//!
//! Two passes per `(event, rule)` pair:
//! 1. **Literal pass**: patterns without regex metacharacters are
//!    scanned case-insensitively for every occurrence, resuming one
//!    character past each match start (adjacent occurrences of the
//!    *same* pattern are all reported).
//! 2. **Regex pass**: every pattern (literal or not) runs as a
//!    case-insensitive regex; a candidate is rejected when its span
//!    intersects one already recorded for the same corpus entry.
//!    First-found-wins, in pattern list order.
//!
//! Invalid regex patterns are logged and skipped individually; they
//! never abort matching for the remaining patterns.

use regex::RegexBuilder;
use serde::Serialize;
use tracing::warn;

/// Characters that mark a pattern as a regex rather than a literal.
const REGEX_METACHARACTERS: &str = r"[]()\.*+?{}|^$";

/// One `(text, source_field)` pair produced by the content extractor.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub text: String,
    pub source_field: String,
}

/// One located occurrence of a rule's pattern within an event's corpus.
///
/// `start`/`end` are byte offsets into the corpus entry named by
/// `source_field`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSpan {
    pub rule_id: String,
    pub pattern: String,
    pub matched_text: String,
    pub start: usize,
    pub end: usize,
    pub source_field: String,
}

/// Whether a pattern is treated as a regex (contains metacharacters).
pub fn is_regex_pattern(pattern: &str) -> bool {
    pattern.chars().any(|c| REGEX_METACHARACTERS.contains(c))
}

/// Find all non-overlapping matches of a rule's pattern set.
///
/// A rule "matches" an event iff the returned list is non-empty.
pub fn find_matches(rule_id: &str, corpus: &[CorpusEntry], patterns: &[String]) -> Vec<MatchSpan> {
    let mut spans: Vec<MatchSpan> = Vec::new();

    // Literal pass.
    for pattern in patterns {
        if pattern.trim().is_empty() || is_regex_pattern(pattern) {
            continue;
        }
        // An escaped literal always compiles.
        let Ok(re) = RegexBuilder::new(&regex::escape(pattern))
            .case_insensitive(true)
            .build()
        else {
            continue;
        };

        for entry in corpus {
            let mut pos = 0;
            while pos <= entry.text.len() {
                let Some(m) = re.find_at(&entry.text, pos) else {
                    break;
                };
                let overlaps_other_pattern = spans.iter().any(|s| {
                    s.source_field == entry.source_field
                        && s.pattern != *pattern
                        && s.start < m.end()
                        && s.end > m.start()
                });
                if !overlaps_other_pattern {
                    spans.push(MatchSpan {
                        rule_id: rule_id.to_string(),
                        pattern: pattern.clone(),
                        matched_text: m.as_str().to_string(),
                        start: m.start(),
                        end: m.end(),
                        source_field: entry.source_field.clone(),
                    });
                }
                // Resume one character past the match start so adjacent
                // occurrences of this pattern are also found.
                let step = entry.text[m.start()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                pos = m.start() + step;
            }
        }
    }

    // Regex pass over every pattern; candidates intersecting a recorded
    // span in the same entry are dropped.
    for pattern in patterns {
        if pattern.trim().is_empty() {
            continue;
        }
        let re = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                warn!(
                    rule_id = %rule_id,
                    pattern = %pattern,
                    error = %e,
                    "invalid regex pattern, skipping"
                );
                continue;
            }
        };

        for entry in corpus {
            for m in re.find_iter(&entry.text) {
                let overlaps = spans.iter().any(|s| {
                    s.source_field == entry.source_field
                        && s.start < m.end()
                        && s.end > m.start()
                });
                if !overlaps {
                    spans.push(MatchSpan {
                        rule_id: rule_id.to_string(),
                        pattern: pattern.clone(),
                        matched_text: m.as_str().to_string(),
                        start: m.start(),
                        end: m.end(),
                        source_field: entry.source_field.clone(),
                    });
                }
            }
        }
    }

    spans
}
