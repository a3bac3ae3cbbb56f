//! In-memory instance store
//!
//! Deterministic test double for the SQLite store. Every operation takes the
//! map lock for its whole duration, so per-record read-modify-write updates
//! are atomic here just as single-row statements are in SQLite.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::InstanceStore;
use crate::error::{BrokerError, Result};
use crate::instance::Instance;

/// HashMap-backed implementation of [`InstanceStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    instances: Arc<Mutex<HashMap<String, Instance>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InstanceStore for MemoryStore {
    async fn insert(&self, instance: &Instance) -> Result<()> {
        let mut instances = self.instances.lock().unwrap();
        if instances.contains_key(&instance.name) {
            return Err(BrokerError::Conflict {
                name: instance.name.clone(),
            });
        }
        instances.insert(instance.name.clone(), instance.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Instance> {
        self.instances
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or(BrokerError::NotFound)
    }

    async fn update(&self, instance: &Instance) -> Result<()> {
        let mut instances = self.instances.lock().unwrap();
        match instances.get_mut(&instance.name) {
            Some(stored) => {
                *stored = instance.clone();
                Ok(())
            }
            None => Err(BrokerError::NotFound),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.instances
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or(BrokerError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ProviderHandle;
    use crate::instance::InstanceState;

    fn sample_instance(name: &str) -> Instance {
        Instance::new(name, ProviderHandle::new("i-fake00000001"))
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = MemoryStore::new();
        store.insert(&sample_instance("someapp")).await.unwrap();

        let loaded = store.get("someapp").await.unwrap();
        assert_eq!(loaded.name, "someapp");
        assert_eq!(loaded.state, InstanceState::Pending);
    }

    #[tokio::test]
    async fn duplicate_insert_is_conflict() {
        let store = MemoryStore::new();
        store.insert(&sample_instance("someapp")).await.unwrap();

        let err = store.insert(&sample_instance("someapp")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = MemoryStore::new();
        assert!(store.get("ghost").await.unwrap_err().is_not_found());
        assert!(store.delete("ghost").await.unwrap_err().is_not_found());
        assert!(store
            .update(&sample_instance("ghost"))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn update_replaces_whole_record() {
        let store = MemoryStore::new();
        let mut instance = sample_instance("someapp");
        store.insert(&instance).await.unwrap();

        instance.bound.push("someapp.cloud.tsuru.io".to_string());
        instance.state = InstanceState::Running;
        store.update(&instance).await.unwrap();

        let loaded = store.get("someapp").await.unwrap();
        assert_eq!(loaded.state, InstanceState::Running);
        assert_eq!(loaded.bound.len(), 1);
    }

    #[tokio::test]
    async fn delete_discards_bindings_with_record() {
        let store = MemoryStore::new();
        let mut instance = sample_instance("someapp");
        instance.bound.push("host.example.org".to_string());
        store.insert(&instance).await.unwrap();

        store.delete("someapp").await.unwrap();
        assert!(store.is_empty());
    }
}
