//! Persistent artist sort-order registry.
//!
//! Maps an artist display name to the sort string in use (`primary`) and every
//! alternative that was seen and turned down (`rejected`). The on-disk file is
//! a JSON object `{ "<artist>": { "P": "<primary>", "R": ["<rejected>", ...] } }`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::LibraryError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrderEntry {
    #[serde(rename = "P")]
    pub primary: String,
    #[serde(rename = "R", default)]
    pub rejected: Vec<String>,
}

impl SortOrderEntry {
    fn new(primary: String) -> Self {
        Self {
            primary,
            rejected: Vec::new(),
        }
    }

    pub fn knows(&self, sort: &str) -> bool {
        self.primary == sort || self.rejected.iter().any(|value| value == sort)
    }

    fn reject(&mut self, sort: String) {
        if sort != self.primary && !self.rejected.contains(&sort) {
            self.rejected.push(sort);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictChoice {
    Keep,
    Replace,
    Abort,
}

/// Decisions the registry cannot take on its own.
pub trait SortOrderPrompt {
    /// Sort string for an artist seen for the first time. `None` or an empty
    /// answer stores the artist name itself.
    fn new_sort_order(&mut self, artist: &str) -> Option<String>;

    /// Chance to replace the sort string embedded in a new artist's tags.
    fn override_observed(&mut self, _artist: &str, _observed: &str) -> Option<String> {
        None
    }

    fn resolve_conflict(&mut self, artist: &str, primary: &str, observed: &str) -> ConflictChoice;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    Created { primary: String },
    Overridden { primary: String, rejected: String },
    Kept { rejected: String },
    Replaced { primary: String, rejected: String },
    Aborted,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReconciliation {
    pub applied: usize,
    pub aborted: bool,
}

pub struct SortOrderRegistry {
    path: PathBuf,
    entries: BTreeMap<String, SortOrderEntry>,
}

impl SortOrderRegistry {
    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let mut entries: BTreeMap<String, SortOrderEntry> = if path.exists() {
            let contents = fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };

        for (artist, entry) in entries.iter_mut() {
            let before = entry.rejected.len();
            let primary = entry.primary.clone();
            entry.rejected.retain(|value| *value != primary);
            if entry.rejected.len() != before {
                warn!("Dropped primary sort order from rejected list of {:?}", artist);
            }
        }

        info!("Loaded {} artist sort orders from {:?}", entries.len(), path);
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn persist(&self) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, artist: &str) -> Option<&SortOrderEntry> {
        self.entries.get(artist)
    }

    pub fn lookup(&self, artist: &str) -> Option<&str> {
        self.entries.get(artist).map(|entry| entry.primary.as_str())
    }

    pub fn lookup_or_create(&mut self, artist: &str, prompt: &mut dyn SortOrderPrompt) -> String {
        if let Some(entry) = self.entries.get(artist) {
            return entry.primary.clone();
        }
        let primary = prompt
            .new_sort_order(artist)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| artist.to_string());
        self.entries
            .insert(artist.to_string(), SortOrderEntry::new(primary.clone()));
        primary
    }

    pub fn reconcile(
        &mut self,
        artist: Option<&str>,
        observed: Option<&str>,
        prompt: &mut dyn SortOrderPrompt,
    ) -> Reconciliation {
        let artist = match artist {
            Some(artist) => artist,
            None => return Reconciliation::Unchanged,
        };

        let entry = match self.entries.get_mut(artist) {
            Some(entry) => entry,
            None => return self.record_new(artist, observed, prompt),
        };

        let observed = match observed {
            Some(observed) if !entry.knows(observed) => observed,
            _ => return Reconciliation::Unchanged,
        };

        match prompt.resolve_conflict(artist, &entry.primary, observed) {
            ConflictChoice::Keep => {
                entry.reject(observed.to_string());
                Reconciliation::Kept {
                    rejected: observed.to_string(),
                }
            }
            ConflictChoice::Replace => {
                let old = std::mem::replace(&mut entry.primary, observed.to_string());
                entry.reject(old.clone());
                info!("Replaced sort order {:?} with {:?} for {:?}", old, observed, artist);
                Reconciliation::Replaced {
                    primary: observed.to_string(),
                    rejected: old,
                }
            }
            ConflictChoice::Abort => Reconciliation::Aborted,
        }
    }

    /// Reconciles `(artist, observed sort)` pairs in order, stopping at the
    /// first abort. Entries recorded before the abort are kept.
    pub fn reconcile_batch<'a, I>(
        &mut self,
        pairs: I,
        prompt: &mut dyn SortOrderPrompt,
    ) -> BatchReconciliation
    where
        I: IntoIterator<Item = (Option<&'a str>, Option<&'a str>)>,
    {
        let mut report = BatchReconciliation::default();
        for (artist, observed) in pairs {
            match self.reconcile(artist, observed, prompt) {
                Reconciliation::Unchanged => {}
                Reconciliation::Aborted => {
                    warn!("Sort order reconciliation aborted for the rest of this batch");
                    report.aborted = true;
                    break;
                }
                _ => report.applied += 1,
            }
        }
        report
    }

    fn record_new(
        &mut self,
        artist: &str,
        observed: Option<&str>,
        prompt: &mut dyn SortOrderPrompt,
    ) -> Reconciliation {
        let observed = match observed {
            Some(observed) if observed != artist => observed,
            _ => {
                let primary = self.lookup_or_create(artist, prompt);
                return Reconciliation::Created { primary };
            }
        };

        let replacement = prompt
            .override_observed(artist, observed)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty() && value != observed);

        match replacement {
            Some(primary) => {
                let mut entry = SortOrderEntry::new(primary.clone());
                entry.reject(observed.to_string());
                self.entries.insert(artist.to_string(), entry);
                Reconciliation::Overridden {
                    primary,
                    rejected: observed.to_string(),
                }
            }
            None => {
                info!("Storing sort order {:?} for artist {:?}", observed, artist);
                self.entries
                    .insert(artist.to_string(), SortOrderEntry::new(observed.to_string()));
                Reconciliation::Created {
                    primary: observed.to_string(),
                }
            }
        }
    }
}
