//! Incremental diff engine.
//!
//! [`Updater`] owns the baseline: the authoritative, currently-held set of
//! profiles in display order. Each call to [`Updater::update`] folds one
//! raw batch into the baseline and returns the minimal delta (added,
//! replaced and tombstoned entries only; unchanged entries never appear).
//!
//! The struct carries no lock of its own. The owning connection guards it
//! with a single mutex shared with the listener set, so a flush
//! (update + broadcast) and a listener registration (replay + register)
//! serialize as whole units.

use crate::types::{InstrumentProfile, ProfileKey};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Diff engine holding the baseline.
#[derive(Default)]
pub struct Updater {
    /// Baseline in first-insertion order. Replacing a value keeps its
    /// slot; `shift_remove` keeps the relative order of the rest.
    baseline: IndexMap<ProfileKey, InstrumentProfile>,

    /// Symbol to key, for tombstone addressing. A tombstone carries only
    /// a symbol, so removal resolves the stored entry's key through this
    /// map. If several entries share a symbol the most recently inserted
    /// one wins.
    by_symbol: HashMap<String, ProfileKey>,
}

impl Updater {
    /// Create an empty diff engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `batch` into the baseline, returning the delta.
    ///
    /// The first non-empty call establishes the baseline: every profile is
    /// inserted in order and the delta is the batch verbatim. Incremental
    /// calls apply the added/removed/updated rules per entry; a tombstone
    /// for an unknown symbol is a silent no-op. An empty delta means
    /// nothing changed.
    pub fn update(&mut self, batch: Vec<InstrumentProfile>) -> Vec<InstrumentProfile> {
        if self.baseline.is_empty() {
            return self.bootstrap(batch);
        }

        let mut delta = Vec::new();
        for profile in batch {
            if profile.is_removed() {
                if let Some(key) = self.by_symbol.get(&profile.symbol).copied() {
                    if self.remove(&profile.symbol, key) {
                        delta.push(profile);
                    }
                }
                // Unknown symbol: not an error, not in the delta.
                continue;
            }

            let key = profile.key();
            match self.baseline.get(&key) {
                None => {
                    self.insert(key, profile.clone());
                    delta.push(profile);
                }
                Some(existing) if *existing != profile => {
                    // Same slot, new value.
                    self.insert(key, profile.clone());
                    delta.push(profile);
                }
                Some(_) => {} // Unchanged, idempotent.
            }
        }
        delta
    }

    /// First non-empty batch: insert everything, delta is the batch verbatim.
    fn bootstrap(&mut self, batch: Vec<InstrumentProfile>) -> Vec<InstrumentProfile> {
        for profile in &batch {
            self.insert(profile.key(), profile.clone());
        }
        batch
    }

    fn insert(&mut self, key: ProfileKey, profile: InstrumentProfile) {
        self.by_symbol.insert(profile.symbol.clone(), key);
        self.baseline.insert(key, profile);
    }

    fn remove(&mut self, symbol: &str, key: ProfileKey) -> bool {
        if self.baseline.shift_remove(&key).is_none() {
            return false;
        }
        // Drop the symbol mapping only if it still points at this entry.
        if self.by_symbol.get(symbol) == Some(&key) {
            self.by_symbol.remove(symbol);
        }
        true
    }

    /// Ordered copy of the current baseline, for listener replay.
    pub fn snapshot(&self) -> Vec<InstrumentProfile> {
        self.baseline.values().cloned().collect()
    }

    /// Look up a profile by key.
    pub fn get(&self, key: &ProfileKey) -> Option<&InstrumentProfile> {
        self.baseline.get(key)
    }

    /// Number of profiles in the baseline.
    pub fn len(&self) -> usize {
        self.baseline.len()
    }

    /// Whether the baseline is empty.
    pub fn is_empty(&self) -> bool {
        self.baseline.is_empty()
    }
}
