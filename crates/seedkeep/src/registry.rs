//! Seed registry
//!
//! Master seeds keyed by the identifier of the file that declared them.
//! Seeds are held in memory only.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;

/// Master seeds by file identifier
#[derive(Debug, Default)]
pub struct SeedRegistry {
    seeds: BTreeMap<String, String>,
    most_recently_updated: Option<DateTime<Utc>>,
}

impl SeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file's seed; the first seed seen for an identifier wins
    ///
    /// Returns whether the seed was stored. A later, different seed for the
    /// same identifier is ignored with a warning.
    pub fn insert(&mut self, identifier: &str, master_seed: &str) -> bool {
        if master_seed.is_empty() {
            return false;
        }
        match self.seeds.get(identifier) {
            Some(existing) => {
                if existing != master_seed {
                    warn!(
                        "{}: conflicting master seed ignored, keeping the one loaded first",
                        identifier
                    );
                }
                false
            }
            None => {
                self.seeds
                    .insert(identifier.to_string(), master_seed.to_string());
                true
            }
        }
    }

    /// Note a source file's modification time
    pub fn touch(&mut self, updated: DateTime<Utc>) {
        if self.most_recently_updated.map_or(true, |t| updated > t) {
            self.most_recently_updated = Some(updated);
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.seeds.get(identifier).map(String::as_str)
    }

    /// Identifiers with a seed, sorted
    pub fn identifiers(&self) -> Vec<String> {
        self.seeds.keys().cloned().collect()
    }

    /// Newest modification time across all loaded files
    pub fn most_recently_updated(&self) -> Option<DateTime<Utc>> {
        self.most_recently_updated
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SeedRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (id, seed) in iter {
            registry.insert(&id.into(), &seed.into());
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_first_writer_wins() {
        let mut registry = SeedRegistry::new();
        assert!(registry.insert("x", "first"));
        assert!(!registry.insert("x", "second"));
        assert_eq!(registry.get("x"), Some("first"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_seed_ignored() {
        let mut registry = SeedRegistry::new();
        assert!(!registry.insert("x", ""));
        assert!(registry.is_empty());
        assert!(registry.insert("x", "later"));
    }

    #[test]
    fn test_identifiers_sorted() {
        let registry: SeedRegistry = [("carol", "c"), ("alice", "a"), ("bob", "b")]
            .into_iter()
            .collect();
        assert_eq!(registry.identifiers(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_touch_keeps_newest() {
        let mut registry = SeedRegistry::new();
        let now = Utc::now();
        registry.touch(now - Duration::days(2));
        registry.touch(now);
        registry.touch(now - Duration::days(1));
        assert_eq!(registry.most_recently_updated(), Some(now));
    }
}
