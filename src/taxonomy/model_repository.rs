//! Model info repository and the writable check run before every write

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::db::schemas::ModelInfo;
use crate::db::store::TaxonomyStore;
use crate::taxonomy::view::ModelView;
use crate::types::{ModelCheckError, Result, TaxonomyError};

/// Body of a model create request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModelSpec {
    pub name: String,
    pub locale: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone)]
pub struct ModelRepository {
    store: Arc<dyn TaxonomyStore>,
}

impl ModelRepository {
    pub fn new(store: Arc<dyn TaxonomyStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, spec: NewModelSpec) -> Result<ModelView> {
        if spec.name.trim().is_empty() || spec.locale.trim().is_empty() {
            return Err(TaxonomyError::BadRequest(
                "name and locale are required".into(),
            ));
        }

        let model = self
            .store
            .insert_model(ModelInfo::new(spec.name, spec.locale, spec.description))
            .await
            .map_err(|e| e.in_repository("ModelRepository", "create"))?;

        info!("Created model '{}' ({:?})", model.name, model.id);
        Ok(ModelView::from(&model))
    }

    /// Model by id; a malformed id yields `None`
    pub async fn get(&self, id: &str) -> Result<Option<ModelInfo>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        self.store
            .find_model(oid)
            .await
            .map_err(|e| e.in_repository("ModelRepository", "getModelById"))
    }

    pub async fn list(&self) -> Result<Vec<ModelView>> {
        let models = self
            .store
            .list_models()
            .await
            .map_err(|e| e.in_repository("ModelRepository", "getModels"))?;
        Ok(models.iter().map(ModelView::from).collect())
    }

    /// Model must exist and not be released before anything is written to it
    pub async fn check_writable(&self, model_id: &str) -> std::result::Result<ObjectId, ModelCheckError> {
        let model = match self.get(model_id).await {
            Ok(Some(model)) => model,
            Ok(None) => return Err(ModelCheckError::NotFound),
            Err(e) => {
                error!("Failed to fetch model {}: {}", model_id, e);
                return Err(ModelCheckError::FetchFailed);
            }
        };

        if model.released {
            return Err(ModelCheckError::Released);
        }

        model.id.ok_or(ModelCheckError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryTaxonomyStore;

    fn spec(name: &str) -> NewModelSpec {
        NewModelSpec {
            name: name.to_string(),
            locale: "en".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_writable_model() {
        let repo = ModelRepository::new(Arc::new(InMemoryTaxonomyStore::new()));
        let model = repo.create(spec("ESCO 1.1")).await.unwrap();
        assert_eq!(repo.check_writable(&model.id).await.unwrap().to_hex(), model.id);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_models() {
        let repo = ModelRepository::new(Arc::new(InMemoryTaxonomyStore::new()));
        assert_eq!(
            repo.check_writable(&ObjectId::new().to_hex()).await,
            Err(ModelCheckError::NotFound)
        );
        assert_eq!(repo.check_writable("zzz").await, Err(ModelCheckError::NotFound));
    }

    #[tokio::test]
    async fn test_released_model_is_read_only() {
        let store = Arc::new(InMemoryTaxonomyStore::new());
        let mut released = ModelInfo::new("ESCO 1.0".into(), "en".into(), String::new());
        released.released = true;
        let released = store.insert_model(released).await.unwrap();

        let repo = ModelRepository::new(store);
        let id = released.id.unwrap().to_hex();
        assert_eq!(repo.check_writable(&id).await, Err(ModelCheckError::Released));
    }

    #[tokio::test]
    async fn test_store_failure_is_fetch_failed() {
        let store = Arc::new(InMemoryTaxonomyStore::new());
        let repo = ModelRepository::new(store.clone());
        let model = repo.create(spec("ESCO 1.1")).await.unwrap();
        store.set_unavailable(true);
        assert_eq!(
            repo.check_writable(&model.id).await,
            Err(ModelCheckError::FetchFailed)
        );
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let repo = ModelRepository::new(Arc::new(InMemoryTaxonomyStore::new()));
        repo.create(spec("ESCO 1.1")).await.unwrap();
        let err = repo.create(spec("ESCO 1.1")).await.unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_KEY");
    }
}
