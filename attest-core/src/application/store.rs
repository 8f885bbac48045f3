// attest-core/src/application/store.rs

use crate::domain::message::Message;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact '{0}' was already produced; exactly one producer per id")]
    DuplicateArtifact(String),

    #[error("Artifact '{0}' not found in store")]
    ArtifactNotFound(String),
}

/// Process-local store for produced messages, keyed by namespaced artifact
/// id.
///
/// One instance lives for the duration of a single execution and is injected
/// into artifact tasks explicitly; nothing global. Writers are unique per key
/// (the scheduler runs one producer per artifact), readers are the consuming
/// tasks, so the map itself is the only thing needing a lock.
#[derive(Default)]
pub struct ArtifactStore {
    messages: RwLock<HashMap<String, Arc<Message>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, id: &str, message: Arc<Message>) -> Result<(), StoreError> {
        let mut guard = self
            .messages
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(id) {
            return Err(StoreError::DuplicateArtifact(id.to_string()));
        }
        guard.insert(id.to_string(), message);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<Message>, StoreError> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ArtifactNotFound(id.to_string()))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Stored ids, sorted. Observability only.
    pub fn list_artifacts(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
