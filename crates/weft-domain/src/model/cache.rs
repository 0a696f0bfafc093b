//! Compiled-model caching keyed by version.
//!
//! The collaborator that loads models supplies the version identifier;
//! a new version is a new immutable [`CompiledModel`] instance, so in-flight
//! queries keep observing the model they started with.

use std::sync::Arc;

use dashmap::DashMap;

use super::compile::CompiledModel;

/// Concurrent cache of compiled models keyed by version id.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: DashMap<String, Arc<CompiledModel>>,
}

impl ModelCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a compiled model under a version id, replacing any previous
    /// entry for that version.
    pub fn insert(&self, version: impl Into<String>, model: Arc<CompiledModel>) {
        self.models.insert(version.into(), model);
    }

    /// Returns the model for a version, if cached.
    pub fn get(&self, version: &str) -> Option<Arc<CompiledModel>> {
        self.models.get(version).map(|entry| Arc::clone(&entry))
    }

    /// Removes and returns the model for a version.
    pub fn remove(&self, version: &str) -> Option<Arc<CompiledModel>> {
        self.models.remove(version).map(|(_, model)| model)
    }

    /// Number of cached model versions.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthorizationModel, RelationDefinition, TypeDefinition, Userset};

    fn tiny_model() -> Arc<CompiledModel> {
        let model = AuthorizationModel {
            schema_version: "1.1".to_string(),
            type_definitions: vec![TypeDefinition {
                type_name: "document".to_string(),
                relations: vec![RelationDefinition {
                    name: "viewer".to_string(),
                    subject_types: vec![],
                    rewrite: Userset::This,
                }],
            }],
        };
        Arc::new(CompiledModel::compile(&model).unwrap())
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = ModelCache::new();
        assert!(cache.is_empty());
        cache.insert("v1", tiny_model());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("v1").is_some());
        assert!(cache.get("v2").is_none());
    }

    #[test]
    fn test_cache_replaces_version_in_place() {
        let cache = ModelCache::new();
        let first = tiny_model();
        let second = tiny_model();
        cache.insert("v1", Arc::clone(&first));
        cache.insert("v1", Arc::clone(&second));
        assert_eq!(cache.len(), 1);
        let cached = cache.get("v1").unwrap();
        assert!(Arc::ptr_eq(&cached, &second));
        assert!(!Arc::ptr_eq(&cached, &first));
    }

    #[test]
    fn test_cache_remove() {
        let cache = ModelCache::new();
        cache.insert("v1", tiny_model());
        assert!(cache.remove("v1").is_some());
        assert!(cache.get("v1").is_none());
    }
}
