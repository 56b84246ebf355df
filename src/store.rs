//! A thread-safe in-memory storage for the currently active feature definitions. [`FeatureStore`]
//! provides concurrent access for readers (evaluation scopes) and the single writer (the refresh
//! coordinator).
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Utc};

use crate::models::FeatureDefinition;

/// Immutable point-in-time view of the feature definitions.
///
/// A snapshot is never mutated after creation. It may become stale relative to the store, but
/// everyone holding it keeps seeing the same definitions.
#[derive(Debug, Default)]
pub struct FeatureSnapshot {
    features: HashMap<String, FeatureDefinition>,
    /// `None` for the initial empty snapshot.
    fetched_at: Option<DateTime<Utc>>,
}

impl FeatureSnapshot {
    /// Build a snapshot from a list of definitions. If a key repeats, the last definition wins.
    pub fn from_definitions(definitions: Vec<FeatureDefinition>) -> FeatureSnapshot {
        FeatureSnapshot {
            features: definitions
                .into_iter()
                .map(|definition| (definition.key.clone(), definition))
                .collect(),
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn get(&self, feature_key: &str) -> Option<&FeatureDefinition> {
        self.features.get(feature_key)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Get a set of all feature keys present in this snapshot.
    pub fn feature_keys(&self) -> HashSet<String> {
        self.features.keys().cloned().collect()
    }

    /// Wall-clock time the definitions were applied, or `None` if nothing has been applied yet.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

/// `FeatureStore` owns the canonical key→definition mapping.
///
/// Every update replaces the whole mapping with a new [`FeatureSnapshot`]. Readers clone the
/// `Arc` and are not affected by later writes.
#[derive(Default)]
pub struct FeatureStore {
    snapshot: RwLock<Arc<FeatureSnapshot>>,
}

impl FeatureStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        FeatureStore::default()
    }

    /// Get the current snapshot.
    pub fn snapshot(&self) -> Arc<FeatureSnapshot> {
        // The lock only guards the pointer swap, so it's never held across user code and can't be
        // poisoned by a panicking writer.
        let snapshot = self
            .snapshot
            .read()
            .expect("thread holding feature store lock should not panic");

        Arc::clone(&snapshot)
    }

    /// Replace the entire mapping with `definitions`.
    ///
    /// Keys missing from `definitions` disappear. An empty list yields an empty store.
    pub fn apply(&self, definitions: Vec<FeatureDefinition>) {
        // Constructing new value before requesting the lock to minimize lock span.
        let new_snapshot = Arc::new(FeatureSnapshot::from_definitions(definitions));

        let mut slot = self
            .snapshot
            .write()
            .expect("thread holding feature store lock should not panic");

        *slot = new_snapshot;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::FeatureStore;
    use crate::models::FeatureDefinition;

    #[test]
    fn starts_empty() {
        let store = FeatureStore::new();

        let snapshot = store.snapshot();
        assert!(snapshot.is_empty());
        assert!(snapshot.fetched_at().is_none());
    }

    #[test]
    fn apply_replaces_instead_of_merging() {
        let store = FeatureStore::new();
        store.apply(vec![
            FeatureDefinition::new("a", true),
            FeatureDefinition::new("b", "x"),
        ]);
        store.apply(vec![FeatureDefinition::new("b", "y")]);

        let snapshot = store.snapshot();
        assert!(snapshot.get("a").is_none());
        assert_eq!(snapshot.get("b").unwrap().default_value, "y".into());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn apply_empty_clears_store() {
        let store = FeatureStore::new();
        store.apply(vec![FeatureDefinition::new("a", true)]);

        store.apply(vec![]);

        let snapshot = store.snapshot();
        assert!(snapshot.is_empty());
        assert!(snapshot.fetched_at().is_some());
    }

    #[test]
    fn held_snapshot_is_unaffected_by_apply() {
        let store = FeatureStore::new();
        store.apply(vec![FeatureDefinition::new("a", 1.0)]);
        let before = store.snapshot();

        store.apply(vec![FeatureDefinition::new("a", 2.0)]);

        assert_eq!(before.get("a").unwrap().default_value, 1.0.into());
        assert_eq!(store.snapshot().get("a").unwrap().default_value, 2.0.into());
    }

    #[test]
    fn can_apply_from_another_thread() {
        let store = Arc::new(FeatureStore::new());

        {
            let store = store.clone();
            let _ = std::thread::spawn(move || {
                store.apply(vec![FeatureDefinition::new("a", true)]);
            })
            .join();
        }

        assert_eq!(store.snapshot().feature_keys().len(), 1);
    }
}
