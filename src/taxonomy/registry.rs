//! Repository registry
//!
//! Built once at startup from a store and handed to the server through its
//! state. Initializing twice or reading before initialization is an error.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::store::TaxonomyStore;
use crate::taxonomy::hierarchy_repository::HierarchyRepository;
use crate::taxonomy::model_repository::ModelRepository;
use crate::taxonomy::repository::NodeRepository;
use crate::taxonomy::{ObjectType, RelationFamily};
use crate::types::{Result, TaxonomyError};

/// Every repository, sharing one store
pub struct Repositories {
    nodes: HashMap<ObjectType, NodeRepository>,
    hierarchies: HashMap<RelationFamily, HierarchyRepository>,
    models: ModelRepository,
}

impl Repositories {
    pub fn new(store: Arc<dyn TaxonomyStore>) -> Self {
        let nodes = ObjectType::ALL
            .into_iter()
            .map(|t| (t, NodeRepository::new(t, store.clone())))
            .collect();
        let hierarchies = RelationFamily::ALL
            .into_iter()
            .map(|f| (f, HierarchyRepository::new(f, store.clone())))
            .collect();

        Self {
            nodes,
            hierarchies,
            models: ModelRepository::new(store),
        }
    }

    pub fn node(&self, object_type: ObjectType) -> Result<&NodeRepository> {
        self.nodes.get(&object_type).ok_or_else(|| {
            TaxonomyError::Internal(format!("no repository for {}", object_type))
        })
    }

    pub fn hierarchy(&self, family: RelationFamily) -> Result<&HierarchyRepository> {
        self.hierarchies.get(&family).ok_or_else(|| {
            TaxonomyError::Internal(format!("no repository for {}", family))
        })
    }

    pub fn models(&self) -> &ModelRepository {
        &self.models
    }
}

#[derive(Default)]
pub struct RepositoryRegistry {
    repositories: OnceCell<Repositories>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&self, store: Arc<dyn TaxonomyStore>) -> Result<()> {
        self.repositories
            .set(Repositories::new(store))
            .map_err(|_| TaxonomyError::Internal("repository registry already initialized".into()))
    }

    pub fn get(&self) -> Result<&Repositories> {
        self.repositories
            .get()
            .ok_or_else(|| TaxonomyError::Internal("repository registry not initialized".into()))
    }

    pub fn is_initialized(&self) -> bool {
        self.repositories.get().is_some()
    }
}
