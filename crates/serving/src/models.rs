use crate::backend::Model;
use crate::errors::StoreError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Name under which the single-model mode registers its model.
pub const DEFAULT_MODEL_NAME: &str = "model";

#[derive(Clone)]
pub struct LoadedModel {
    pub name: String,
    pub url: PathBuf,
    pub model: Arc<dyn Model>,
}

/// Loaded models by name.
///
/// Handles are immutable once inserted; the lock only guards the map and is
/// never held while a model predicts.
#[derive(Default)]
pub struct ModelStore {
    models: RwLock<HashMap<String, LoadedModel>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        name: &str,
        url: PathBuf,
        model: Arc<dyn Model>,
    ) -> Result<(), StoreError> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        if models.contains_key(name) {
            return Err(StoreError::AlreadyLoaded(name.to_string()));
        }
        models.insert(
            name.to_string(),
            LoadedModel {
                name: name.to_string(),
                url,
                model,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<LoadedModel, StoreError> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Result<LoadedModel, StoreError> {
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// All loaded models, sorted by name.
    pub fn list(&self) -> Vec<LoadedModel> {
        let mut models: Vec<LoadedModel> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }
}
