use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::services::coordinator::Coordinator;

#[derive(Clone, Default)]
pub struct AppState {
    /// Map of system_id to its coordinator
    pub registry: Arc<RwLock<HashMap<String, Arc<Coordinator>>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a coordinator, replacing any previous one with the same id.
    pub fn insert(&self, coordinator: Arc<Coordinator>) -> Option<Arc<Coordinator>> {
        self.registry
            .write()
            .ok()
            .and_then(|mut map| map.insert(coordinator.id().to_string(), coordinator))
    }

    pub fn remove(&self, system_id: &str) -> Option<Arc<Coordinator>> {
        self.registry.write().ok().and_then(|mut map| map.remove(system_id))
    }

    pub fn get(&self, system_id: &str) -> Option<Arc<Coordinator>> {
        self.registry.read().ok().and_then(|map| map.get(system_id).cloned())
    }

    /// All coordinators, ordered by system id.
    pub fn all(&self) -> Vec<Arc<Coordinator>> {
        let mut all: Vec<Arc<Coordinator>> = self
            .registry
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub fn ids(&self) -> Vec<String> {
        self.all().iter().map(|c| c.id().to_string()).collect()
    }
}
