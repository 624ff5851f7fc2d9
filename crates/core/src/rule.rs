//! Rule schema types with serde deserialization.
//!
//! A [`Rule`] is one configured matcher: scope, ordered pattern list,
//! action, severity, and an optional destination override. Malformed
//! rules are rejected at load time via [`Rule::validate`], not at
//! match time.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::SieveError;

/// One configured matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub id: String,
    /// Display name used in notification summaries. Falls back to `id`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub scope: RuleScope,
    /// Ordered pattern list. A pattern containing any regex
    /// metacharacter is treated as a regex, otherwise as a
    /// case-insensitive literal.
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default)]
    pub severity: Severity,
    /// Destination override; absent means the configured default.
    #[serde(default)]
    pub destination: Option<String>,
}

impl Rule {
    /// Display name for summaries (`name`, else `id`).
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Reject malformed rules at load time.
    ///
    /// An empty pattern list is allowed (the rule simply never
    /// matches); an empty or whitespace id is not.
    pub fn validate(&self) -> Result<(), SieveError> {
        if self.id.trim().is_empty() {
            return Err(SieveError::InvalidRule {
                id: self.id.clone(),
                reason: "id must not be empty".to_string(),
            });
        }
        if self.patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(SieveError::InvalidRule {
                id: self.id.clone(),
                reason: "patterns must not contain empty entries".to_string(),
            });
        }
        Ok(())
    }
}

/// Allow-list/deny-list of sources a rule applies to.
///
/// `excluded_items` always wins over both allow-lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleScope {
    /// Coarse-grained source ids (e.g. category ids).
    #[serde(default)]
    pub allowed_sources: HashSet<String>,
    /// Fine-grained source ids (e.g. specific channel ids).
    #[serde(default)]
    pub allowed_items: HashSet<String>,
    /// Item ids always rejected, regardless of allow-lists.
    #[serde(default)]
    pub excluded_items: HashSet<String>,
}

impl RuleScope {
    /// Scope check for one event source.
    ///
    /// Rejects when the item is excluded; accepts when the item is
    /// directly allowed or its coarse source is allowed; rejects
    /// otherwise.
    pub fn admits(&self, source_item_id: &str, source_coarse_id: Option<&str>) -> bool {
        if self.excluded_items.contains(source_item_id) {
            return false;
        }
        if self.allowed_items.contains(source_item_id) {
            return true;
        }
        source_coarse_id.is_some_and(|c| self.allowed_sources.contains(c))
    }
}

/// Action taken when a rule matches. Total order: `log < notify < delete`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Log,
    Notify,
    Delete,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Log => "log",
            RuleAction::Notify => "notify",
            RuleAction::Delete => "delete",
        }
    }
}

/// Severity of a match. Total order: `low < medium < high`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

pub(crate) fn default_true() -> bool {
    true
}
