//! Filesystem-backed rule loader with optional hot-reload.
//!
//! Scans a directory (recursively) for `*.yml` / `*.yaml` files,
//! deserializes each into a [`Rule`], validates it, and maintains an
//! in-memory map keyed by rule id. A [`notify`] watcher keeps the map
//! in sync with edits; a file that stops parsing keeps its previous
//! version.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sieve_core::Rule;
use tracing::{info, warn};

use crate::pipeline::RuleStore;

/// Errors that can occur during rule loading and management.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Outcome of loading a single rule file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    Loaded { rule_id: String },
    /// File was skipped (dotfile, non-YAML, etc.).
    Skipped { reason: String },
    /// Parse or validation error occurred.
    Failed { error: String },
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}

fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Filesystem-backed rule loader with optional hot-reload.
pub struct RuleLoader {
    rules_dir: PathBuf,
    /// In-memory store of all rules keyed by id.
    rules: Arc<RwLock<HashMap<String, Rule>>>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RuleLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(rules_dir: PathBuf) -> Self {
        if !rules_dir.exists() {
            if let Err(e) = fs::create_dir_all(&rules_dir) {
                warn!(path = %rules_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self {
            rules_dir,
            rules: Arc::new(RwLock::new(HashMap::new())),
            _watcher: None,
        }
    }

    /// Recursively scan the rules directory and load all YAML files.
    ///
    /// Dotfiles and non-YAML files are skipped. Parse errors and
    /// duplicate ids are reported per-file but do not abort the scan.
    /// The in-memory map is replaced with the scan's result.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        let mut loaded: HashMap<String, Rule> = HashMap::new();
        let mut seen_ids = HashSet::new();
        self.scan_dir_recursive(&self.rules_dir, &mut results, &mut loaded, &mut seen_ids)?;

        *self.rules.write().expect("rules lock poisoned") = loaded;
        Ok(results)
    }

    fn scan_dir_recursive(
        &self,
        dir: &Path,
        results: &mut Vec<LoadResult>,
        loaded: &mut HashMap<String, Rule>,
        seen_ids: &mut HashSet<String>,
    ) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if is_dotfile(&path) {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results, loaded, seen_ids)?;
                continue;
            }

            if !is_yaml_file(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match load_rule_file(&path) {
                Ok(rule) => {
                    if !seen_ids.insert(rule.id.clone()) {
                        warn!(rule_id = %rule.id, path = %path.display(), "duplicate rule id");
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Failed {
                                error: format!("duplicate rule id '{}'", rule.id),
                            },
                        });
                        continue;
                    }
                    info!(rule_id = %rule.id, path = %path.display(), "loaded rule");
                    let rule_id = rule.id.clone();
                    loaded.insert(rule_id.clone(), rule);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { rule_id },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Start a filesystem watcher over the rules directory.
    ///
    /// On file create/modify the rule is re-parsed and upserted.
    /// On file delete the rule named by the file stem is removed.
    /// Parse errors are logged; the previous version is kept.
    pub fn watch(&mut self) -> Result<()> {
        let rules = Arc::clone(&self.rules);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event(&event, &rules),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;
        watcher.watch(&self.rules_dir, RecursiveMode::Recursive)?;
        let _ = watcher
            .configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.rules_dir.display(), "watching rules directory for changes");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Atomically write a rule to `{id}.yml` in the rules directory.
    ///
    /// Writes to a dotted `.tmp` file first, then renames, to avoid
    /// partial writes on crash.
    pub fn write_rule(&self, rule: &Rule) -> Result<PathBuf> {
        rule.validate()
            .map_err(|e| LoadError::Validation(e.to_string()))?;

        let final_path = self.rules_dir.join(format!("{}.yml", rule.id));
        let tmp_path = self.rules_dir.join(format!(".{}.tmp", rule.id));

        let yaml = serde_yaml::to_string(rule)?;
        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, &final_path)?;

        info!(rule_id = %rule.id, path = %final_path.display(), "wrote rule file");
        self.rules
            .write()
            .expect("rules lock poisoned")
            .insert(rule.id.clone(), rule.clone());
        Ok(final_path)
    }

    /// Delete a rule file by rule id, removing the in-memory entry too.
    pub fn delete_rule(&self, id: &str) -> Result<()> {
        let yml_path = self.rules_dir.join(format!("{id}.yml"));
        let yaml_path = self.rules_dir.join(format!("{id}.yaml"));

        let removed = if yml_path.exists() {
            fs::remove_file(&yml_path)?;
            true
        } else if yaml_path.exists() {
            fs::remove_file(&yaml_path)?;
            true
        } else {
            false
        };

        if !removed {
            return Err(LoadError::Validation(format!(
                "no rule file found for id '{id}'"
            )));
        }

        self.rules.write().expect("rules lock poisoned").remove(id);
        info!(rule_id = %id, "deleted rule");
        Ok(())
    }
}

impl RuleStore for RuleLoader {
    fn active_rules(&self) -> Vec<Rule> {
        let map = self.rules.read().expect("rules lock poisoned");
        let mut rules: Vec<Rule> = map.values().cloned().collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }
}

/// Parse and validate a single YAML rule file.
fn load_rule_file(path: &Path) -> Result<Rule> {
    let contents = fs::read_to_string(path)?;
    let rule: Rule = serde_yaml::from_str(&contents)?;
    rule.validate()
        .map_err(|e| LoadError::Validation(e.to_string()))?;
    Ok(rule)
}

/// Handle a single filesystem event from the notify watcher.
fn handle_fs_event(event: &notify::Event, rules: &Arc<RwLock<HashMap<String, Rule>>>) {
    for path in &event.paths {
        if !is_yaml_file(path) || is_dotfile(path) {
            continue;
        }

        match &event.kind {
            EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_)) => match load_rule_file(path) {
                Ok(rule) => {
                    info!(rule_id = %rule.id, path = %path.display(), "hot-reloaded rule");
                    rules
                        .write()
                        .expect("rules lock poisoned")
                        .insert(rule.id.clone(), rule);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to parse rule during hot-reload, keeping previous version"
                    );
                }
            },
            EventKind::Remove(RemoveKind::File) => {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let removed = rules.write().expect("rules lock poisoned").remove(stem);
                if removed.is_some() {
                    info!(rule_id = %stem, path = %path.display(), "removed rule after file deletion");
                }
            }
            _ => {}
        }
    }
}
