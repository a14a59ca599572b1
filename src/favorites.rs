use std::sync::Arc;

use tracing::debug;

use crate::storage::{FAVORITES_KEY, Storage, load_or_default, persist_snapshot};

/// Set of favorited title identifiers, kept in insertion order for stable display.
pub struct FavoritesStore {
    storage: Arc<dyn Storage>,
    ids: Vec<String>,
}

impl FavoritesStore {
    /// Loads the stored favorites. An unreadable snapshot starts the store empty.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let stored: Vec<String> = load_or_default(storage.as_ref(), FAVORITES_KEY);
        let mut ids: Vec<String> = Vec::with_capacity(stored.len());
        for id in stored {
            if !id.trim().is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self { storage, ids }
    }

    /// Returns true when the title was newly added.
    pub fn add(&mut self, title_id: &str) -> bool {
        if self.contains(title_id) {
            return false;
        }
        self.ids.push(title_id.to_string());
        debug!(title_id, "added favorite");
        self.persist();
        true
    }

    /// Returns true when the title was present and is now gone.
    pub fn remove(&mut self, title_id: &str) -> bool {
        let Some(pos) = self.ids.iter().position(|id| id == title_id) else {
            return false;
        };
        self.ids.remove(pos);
        debug!(title_id, "removed favorite");
        self.persist();
        true
    }

    pub fn contains(&self, title_id: &str) -> bool {
        self.ids.iter().any(|id| id == title_id)
    }

    pub fn list(&self) -> Vec<String> {
        self.ids.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn persist(&self) {
        persist_snapshot(self.storage.as_ref(), FAVORITES_KEY, &self.ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn empty_store() -> (Arc<MemoryStorage>, FavoritesStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = FavoritesStore::load(storage.clone());
        (storage, store)
    }

    #[test]
    fn add_then_contains_and_remove_then_absent() {
        let (_, mut store) = empty_store();
        assert!(store.add("one-piece"));
        assert!(store.contains("one-piece"));
        assert!(store.remove("one-piece"));
        assert!(!store.contains("one-piece"));
    }

    #[test]
    fn add_is_idempotent() {
        let (_, mut store) = empty_store();
        assert!(store.add("naruto"));
        assert!(!store.add("naruto"));
        assert_eq!(store.list(), vec!["naruto".to_string()]);
    }

    #[test]
    fn remove_missing_is_noop() {
        let (storage, mut store) = empty_store();
        assert!(!store.remove("bleach"));
        assert!(storage.read(FAVORITES_KEY).expect("read").is_none());
    }

    #[test]
    fn list_keeps_insertion_order() {
        let (_, mut store) = empty_store();
        store.add("c");
        store.add("a");
        store.add("b");
        assert_eq!(store.list(), vec!["c", "a", "b"]);
    }

    #[test]
    fn every_mutation_writes_a_full_snapshot() {
        let (storage, mut store) = empty_store();
        store.add("a");
        store.add("b");
        let raw = storage.read(FAVORITES_KEY).expect("read").expect("snapshot");
        let saved: Vec<String> = serde_json::from_str(&raw).expect("json");
        assert_eq!(saved, vec!["a", "b"]);

        store.remove("a");
        let raw = storage.read(FAVORITES_KEY).expect("read").expect("snapshot");
        let saved: Vec<String> = serde_json::from_str(&raw).expect("json");
        assert_eq!(saved, vec!["b"]);
    }

    #[test]
    fn reload_sees_previous_session() {
        let (storage, mut store) = empty_store();
        store.add("a");
        let reloaded = FavoritesStore::load(storage);
        assert!(reloaded.contains("a"));
    }

    #[test]
    fn corrupt_snapshot_loads_empty() {
        let storage = Arc::new(MemoryStorage::with_value(FAVORITES_KEY, "[1, 2"));
        let store = FavoritesStore::load(storage);
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_ids_in_snapshot_are_collapsed() {
        let storage = Arc::new(MemoryStorage::with_value(
            FAVORITES_KEY,
            r#"["a", "b", "a", ""]"#,
        ));
        let store = FavoritesStore::load(storage);
        assert_eq!(store.list(), vec!["a", "b"]);
    }

    #[test]
    fn write_failure_keeps_memory_authoritative() {
        let storage = Arc::new(MemoryStorage::failing_writes());
        let mut store = FavoritesStore::load(storage);
        assert!(store.add("a"));
        assert!(store.contains("a"));
        assert_eq!(store.list().len(), 1);
    }
}
