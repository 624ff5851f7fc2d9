//! Engine configuration loaded from environment variables.
//!
//! All values arrive as already-validated primitives; the engine never
//! mutates or persists them. Call [`load_dotenv`] once at startup.

use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Configuration surface consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Suppress destructive actions; notification/logging still occurs.
    pub dry_run: bool,
    /// Send a fallback notification when a match produced no forward.
    pub notify_filtered: bool,
    /// Default destination for rules without an override.
    pub default_destination: Option<String>,
    /// Throttle cool-down per `(subject, keyword)` pair.
    pub cool_down_seconds: u64,
    /// Maximum number of dedup entries held at once.
    pub dedup_capacity: usize,
    /// Age after which a dedup entry is swept.
    pub dedup_retention_seconds: u64,
    /// Interval of the background cleanup sweep.
    pub cleanup_interval_seconds: u64,
    /// Boundary at which forwarded text is split into parts.
    pub max_text_part_size: usize,
    /// Attachments at or above this size forward as a reference only.
    pub max_inline_attachment_bytes: u64,
}

impl EngineConfig {
    /// Build config from environment variables (call [`load_dotenv`] first).
    pub fn from_env() -> Self {
        Self {
            dry_run: env_bool("SIEVE_DRY_RUN", true),
            notify_filtered: env_bool("SIEVE_NOTIFY_FILTERED", true),
            default_destination: env_opt("SIEVE_DEFAULT_DESTINATION"),
            cool_down_seconds: env_u64("SIEVE_COOL_DOWN_SECONDS", 60),
            dedup_capacity: env_usize("SIEVE_DEDUP_CAPACITY", 100),
            dedup_retention_seconds: env_u64("SIEVE_DEDUP_RETENTION_SECONDS", 3600),
            cleanup_interval_seconds: env_u64("SIEVE_CLEANUP_INTERVAL_SECONDS", 300),
            max_text_part_size: env_usize("SIEVE_MAX_TEXT_PART_SIZE", 1990),
            max_inline_attachment_bytes: env_u64("SIEVE_MAX_INLINE_ATTACHMENT_BYTES", 8_388_608),
        }
    }

    pub fn cool_down(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cool_down_seconds as i64)
    }

    pub fn dedup_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedup_retention_seconds as i64)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_seconds)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Engine config loaded:");
        tracing::info!(
            "  mode:      dry_run={}, notify_filtered={}",
            self.dry_run,
            self.notify_filtered
        );
        tracing::info!(
            "  dispatch:  default_destination={}, max_text_part_size={}, max_inline_attachment_bytes={}",
            self.default_destination.as_deref().unwrap_or("(none)"),
            self.max_text_part_size,
            self.max_inline_attachment_bytes
        );
        tracing::info!(
            "  store:     dedup_capacity={}, dedup_retention={}s, cool_down={}s, cleanup_interval={}s",
            self.dedup_capacity,
            self.dedup_retention_seconds,
            self.cool_down_seconds,
            self.cleanup_interval_seconds
        );
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            notify_filtered: true,
            default_destination: None,
            cool_down_seconds: 60,
            dedup_capacity: 100,
            dedup_retention_seconds: 3600,
            cleanup_interval_seconds: 300,
            max_text_part_size: 1990,
            max_inline_attachment_bytes: 8_388_608,
        }
    }
}
