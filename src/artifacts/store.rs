use super::Artifact;
use indexmap::IndexMap;
use std::sync::Arc;

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new path was appended at the end
    Created,
    /// An existing path got new content, keeping its position
    Updated,
    /// Same path with identical content
    Unchanged,
}

impl UpsertOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Immutable, ordered view of the store at one point in time
pub type StoreSnapshot = Arc<[Artifact]>;

/// Path-keyed table holding the latest version of every artifact,
/// in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct ArtifactStore {
    artifacts: IndexMap<String, Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new artifact or replace the content of an existing one.
    /// Replacing never moves the entry.
    pub fn upsert(&mut self, artifact: Artifact) -> UpsertOutcome {
        match self.artifacts.get_mut(&artifact.path) {
            Some(existing) if *existing == artifact => UpsertOutcome::Unchanged,
            Some(existing) => {
                *existing = artifact;
                UpsertOutcome::Updated
            }
            None => {
                self.artifacts.insert(artifact.path.clone(), artifact);
                UpsertOutcome::Created
            }
        }
    }

    /// Remove an artifact on explicit user request.
    /// The remaining entries keep their relative order.
    pub fn remove(&mut self, path: &str) -> Option<Artifact> {
        self.artifacts.shift_remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.artifacts.get(path)
    }

    /// Position of `path` in insertion order
    pub fn position(&self, path: &str) -> Option<usize> {
        self.artifacts.get_index_of(path)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.artifacts.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(store: &ArtifactStore) -> Vec<&str> {
        store.iter().map(|a| a.path.as_str()).collect()
    }

    #[test]
    fn test_upsert_appends_new_paths() {
        let mut store = ArtifactStore::new();
        assert_eq!(store.upsert(Artifact::new("b.js", "1")), UpsertOutcome::Created);
        assert_eq!(store.upsert(Artifact::new("a.js", "2")), UpsertOutcome::Created);
        assert_eq!(paths(&store), vec!["b.js", "a.js"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut store = ArtifactStore::new();
        store.upsert(Artifact::new("one.py", "v1"));
        store.upsert(Artifact::new("two.py", "x"));
        store.upsert(Artifact::new("three.py", "y"));

        assert_eq!(store.upsert(Artifact::new("one.py", "v2")), UpsertOutcome::Updated);
        assert_eq!(paths(&store), vec!["one.py", "two.py", "three.py"]);
        assert_eq!(store.get("one.py").unwrap().content, "v2");
        assert_eq!(store.position("one.py"), Some(0));
    }

    #[test]
    fn test_identical_upsert_is_unchanged() {
        let mut store = ArtifactStore::new();
        store.upsert(Artifact::new("a.css", "body {}"));
        let outcome = store.upsert(Artifact::new("a.css", "body {}"));
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert!(!outcome.changed());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_keeps_order_of_untouched_entries() {
        let mut store = ArtifactStore::new();
        for path in ["a", "b", "c", "d"] {
            store.upsert(Artifact::new(path, ""));
        }

        let removed = store.remove("b").unwrap();
        assert_eq!(removed.path, "b");
        assert_eq!(paths(&store), vec!["a", "c", "d"]);
        assert!(store.remove("b").is_none());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_updates() {
        let mut store = ArtifactStore::new();
        store.upsert(Artifact::new("a.json", "{}"));
        let snapshot = store.snapshot();

        store.upsert(Artifact::new("a.json", "[]"));
        store.upsert(Artifact::new("b.json", "{}"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "{}");
    }
}
