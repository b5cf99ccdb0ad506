//! Durable per-resource state and drift detection
//!
//! The whole mapping is rewritten on every save. Each invocation is
//! assumed to be the only writer of its state file.

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::resource::Resource;
use crate::types::{METADATA_CONFIG, METADATA_ERROR, ResourceId, ResourceState, StateStatus};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Mapping from resource id to last known state, backed by a JSON file
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    entries: BTreeMap<ResourceId, ResourceState>,
}

impl StateStore {
    /// Create an empty store backed by `path` (nothing is read)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Create a store and load whatever `path` already holds
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Replace the in-memory mapping with the file's contents
    ///
    /// A missing file leaves the store empty.
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            log::debug!("State file {} does not exist, starting empty", self.path.display());
            self.entries.clear();
            return Ok(());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| Error::persistence(&self.path, e))?;

        self.entries =
            serde_json::from_str(&content).map_err(|e| Error::persistence(&self.path, e))?;

        log::debug!(
            "Loaded {} state entries from {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Write the entire mapping to the backing file
    ///
    /// Content goes to a sibling temp file first and is renamed over the
    /// target, so readers never observe a half-written document.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|e| Error::persistence(dir, e))?;
        }

        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::persistence(&self.path, e))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| Error::persistence(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::persistence(&self.path, e))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ResourceId, &ResourceState)> {
        self.entries.iter()
    }

    /// Ids of entries with the given status
    pub fn ids_by_status(&self, status: StateStatus) -> Vec<&ResourceId> {
        self.entries
            .iter()
            .filter(|(_, state)| state.status == status)
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether the declared configuration differs from the last applied one
    ///
    /// Missing entries and entries without a snapshot count as drifted.
    /// Both sides go through `serde_json::Value`, whose objects are
    /// key-sorted, so field order never causes drift.
    pub fn detect_drift(&self, resource: &dyn Resource) -> Result<bool> {
        let Some(snapshot) = self
            .entries
            .get(resource.id())
            .and_then(ResourceState::config_snapshot)
        else {
            return Ok(true);
        };

        let drift_error = |source| Error::DriftDetection {
            id: resource.id().clone(),
            source,
        };

        let current = resource.config().map_err(drift_error)?;
        let current = serde_json::to_string(&current).map_err(drift_error)?;
        let recorded = serde_json::to_string(snapshot).map_err(drift_error)?;

        Ok(current != recorded)
    }

    // ========================================================================
    // Mutations (each persists immediately)
    // ========================================================================

    pub fn set(&mut self, id: ResourceId, state: ResourceState) -> Result<()> {
        self.entries.insert(id, state);
        self.save()
    }

    pub fn remove(&mut self, id: &ResourceId) -> Result<Option<ResourceState>> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Record a successful apply and snapshot the applied configuration
    pub fn mark_applied(&mut self, resource: &dyn Resource) -> Result<()> {
        let config = resource.config().map_err(|source| Error::DriftDetection {
            id: resource.id().clone(),
            source,
        })?;
        let checksum = serde_json::to_string(&config).map_err(|source| Error::DriftDetection {
            id: resource.id().clone(),
            source,
        })?;

        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_CONFIG.to_string(), config);

        let state = ResourceState {
            status: StateStatus::Applied,
            last_applied: Utc::now(),
            checksum,
            metadata,
        };
        self.set(resource.id().clone(), state)
    }

    /// Record a failed action with its error text
    ///
    /// The previous snapshot is not kept, so the next plan treats the
    /// resource as drifted.
    pub fn mark_failed(&mut self, id: &ResourceId, message: &str) -> Result<()> {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            METADATA_ERROR.to_string(),
            serde_json::Value::String(message.to_string()),
        );

        let state = ResourceState {
            status: StateStatus::Failed,
            last_applied: Utc::now(),
            checksum: String::new(),
            metadata,
        };
        self.set(id.clone(), state)
    }

    /// Drop entries for resources no longer in `graph`
    ///
    /// Returns how many entries were removed; saves only if any were.
    pub fn cleanup(&mut self, graph: &Graph) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|id, _| graph.contains(id));
        let removed = before - self.entries.len();

        if removed > 0 {
            log::info!("Removed {removed} stale state entries");
            self.save()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestResource;
    use crate::types::Layer;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join(".settle").join("state.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path().join("nope.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_malformed_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = StateStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(err.phase(), crate::Phase::Persistence);
    }

    #[test]
    fn test_load_empty_file_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "").unwrap();

        let err = StateStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }

    #[test]
    fn test_save_creates_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let resource = TestResource::new("package:apt:nginx", Layer::Platform);
        store.mark_applied(&resource).unwrap();

        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());

        let reloaded = StateStore::open(store.path()).unwrap();
        let state = reloaded.get(&"package:apt:nginx".into()).unwrap();
        assert_eq!(state.status, StateStatus::Applied);
        assert_eq!(state.checksum, r#"{"value":"v1"}"#);
        assert_eq!(state.config_snapshot().unwrap()["value"], "v1");
    }

    #[test]
    fn test_state_file_format() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.mark_failed(&"host:web1".into(), "unreachable").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let entry = &raw["host:web1"];
        assert_eq!(entry["status"], "failed");
        assert_eq!(entry["metadata"]["error"], "unreachable");
        assert!(entry["last_applied"].is_string());
        assert_eq!(entry["checksum"], "");
    }

    #[test]
    fn test_drift_without_entry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let resource = TestResource::new("a", Layer::Platform);
        assert!(store.detect_drift(&resource).unwrap());
    }

    #[test]
    fn test_drift_without_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.mark_failed(&"a".into(), "boom").unwrap();
        let resource = TestResource::new("a", Layer::Platform);
        assert!(store.detect_drift(&resource).unwrap());
    }

    #[test]
    fn test_no_drift_after_mark_applied() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let resource = TestResource::new("a", Layer::Platform);
        store.mark_applied(&resource).unwrap();
        assert!(!store.detect_drift(&resource).unwrap());

        let changed = TestResource::new("a", Layer::Platform).with_value("v2");
        assert!(store.detect_drift(&changed).unwrap());
    }

    #[test]
    fn test_drift_ignores_key_order() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let mut metadata = BTreeMap::new();
        metadata.insert(
            METADATA_CONFIG.to_string(),
            serde_json::from_str(r#"{"value":"v1"}"#).unwrap(),
        );
        store
            .set(
                "a".into(),
                ResourceState {
                    status: StateStatus::Applied,
                    metadata,
                    ..Default::default()
                },
            )
            .unwrap();

        let reloaded = StateStore::open(store.path()).unwrap();
        let resource = TestResource::new("a", Layer::Platform);
        assert!(!reloaded.detect_drift(&resource).unwrap());
    }

    #[test]
    fn test_drift_serialization_failure() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .mark_applied(&TestResource::new("a", Layer::Platform))
            .unwrap();

        let broken = TestResource::new("a", Layer::Platform).with_broken_config();
        let err = store.detect_drift(&broken).unwrap_err();
        assert!(matches!(err, Error::DriftDetection { .. }));
    }

    #[test]
    fn test_mark_failed_replaces_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let resource = TestResource::new("a", Layer::Platform);
        store.mark_applied(&resource).unwrap();
        store.mark_failed(resource.id(), "apt-get exited 100").unwrap();

        let state = store.get(resource.id()).unwrap();
        assert_eq!(state.status, StateStatus::Failed);
        assert_eq!(state.error_message(), Some("apt-get exited 100"));
        assert!(state.config_snapshot().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cleanup_removes_undeclared() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.mark_failed(&"gone".into(), "x").unwrap();
        store
            .mark_applied(&TestResource::new("kept", Layer::Platform))
            .unwrap();

        let mut graph = Graph::new();
        graph
            .add_resource(Box::new(TestResource::new("kept", Layer::Platform)))
            .unwrap();

        assert_eq!(store.cleanup(&graph).unwrap(), 1);
        assert!(!store.contains(&"gone".into()));

        let reloaded = StateStore::open(store.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(store.cleanup(&graph).unwrap(), 0);
    }

    #[test]
    fn test_ids_by_status() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.mark_failed(&"b".into(), "x").unwrap();
        store
            .mark_applied(&TestResource::new("a", Layer::Platform))
            .unwrap();

        let failed = store.ids_by_status(StateStatus::Failed);
        assert_eq!(failed, vec![&ResourceId::from("b")]);
        assert!(store.ids_by_status(StateStatus::Drifted).is_empty());
    }

    #[test]
    fn test_remove_persists() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.mark_failed(&"a".into(), "x").unwrap();
        assert!(store.remove(&"a".into()).unwrap().is_some());
        assert!(StateStore::open(store.path()).unwrap().is_empty());
    }
}
