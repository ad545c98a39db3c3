//! Hierarchy edge repository
//!
//! Edges are checked when written: both endpoints must exist in the
//! collections their types name, inside the target model, at positions the
//! family permits. Reads still re-check everything since older data may not
//! have passed through here.

use bson::oid::ObjectId;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::schemas::HierarchyEdge;
use crate::db::store::TaxonomyStore;
use crate::taxonomy::view::EdgeView;
use crate::taxonomy::{ObjectType, Position, RelationFamily};
use crate::types::{Result, TaxonomyError};

/// Body item of an edge create request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEdgeSpec {
    pub parent_id: String,
    pub parent_type: ObjectType,
    pub child_id: String,
    pub child_type: ObjectType,
}

#[derive(Clone)]
pub struct HierarchyRepository {
    family: RelationFamily,
    store: Arc<dyn TaxonomyStore>,
}

impl HierarchyRepository {
    pub fn new(family: RelationFamily, store: Arc<dyn TaxonomyStore>) -> Self {
        Self { family, store }
    }

    pub fn family(&self) -> RelationFamily {
        self.family
    }

    fn name(&self) -> String {
        format!("{}Repository", self.family)
    }

    /// Check an edge spec on its own, before endpoint lookups
    fn check_shape(&self, spec: &NewEdgeSpec) -> std::result::Result<HierarchyEdgeDraft, String> {
        let parent_id = ObjectId::parse_str(&spec.parent_id)
            .map_err(|_| format!("parentId '{}' is not an ObjectId", spec.parent_id))?;
        let child_id = ObjectId::parse_str(&spec.child_id)
            .map_err(|_| format!("childId '{}' is not an ObjectId", spec.child_id))?;

        for (position, object_type) in [
            (Position::Parent, spec.parent_type),
            (Position::Child, spec.child_type),
        ] {
            if !self.family.permits(position, object_type) {
                return Err(format!(
                    "{} is not {}: {}",
                    position,
                    self.family.describe_permitted(position),
                    object_type
                ));
            }
        }

        if parent_id == child_id && spec.parent_type == spec.child_type {
            return Err("an edge cannot connect a node to itself".to_string());
        }

        Ok(HierarchyEdgeDraft {
            parent: (spec.parent_type, parent_id),
            child: (spec.child_type, child_id),
        })
    }

    /// `(type, id)` pairs of endpoints that exist inside `model_id`
    async fn existing_endpoints(
        &self,
        model_id: ObjectId,
        drafts: &[(usize, HierarchyEdgeDraft)],
    ) -> Result<(HashSet<(ObjectType, ObjectId)>, HashSet<(ObjectType, ObjectId)>)> {
        let mut batches: HashMap<ObjectType, Vec<ObjectId>> = HashMap::new();
        for (_, draft) in drafts {
            for (object_type, id) in [draft.parent, draft.child] {
                let ids = batches.entry(object_type).or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        let store = &self.store;
        let fetched = try_join_all(batches.iter().map(|(object_type, ids)| async move {
            let nodes = store.find_nodes(*object_type, ids).await?;
            Ok::<_, TaxonomyError>((*object_type, nodes))
        }))
        .await?;

        let mut in_model = HashSet::new();
        let mut elsewhere = HashSet::new();
        for (object_type, nodes) in fetched {
            for node in nodes {
                let id = node.oid()?;
                if node.model_id == model_id && node.object_type == object_type {
                    in_model.insert((object_type, id));
                } else {
                    elsewhere.insert((object_type, id));
                }
            }
        }
        Ok((in_model, elsewhere))
    }

    /// Create a batch of edges inside `model_id`. Invalid specs are left out
    /// with a warning; the persisted edges are returned in input order.
    pub async fn create_many(
        &self,
        model_id: ObjectId,
        specs: Vec<NewEdgeSpec>,
    ) -> Result<Vec<EdgeView>> {
        let total = specs.len();
        let mut drafts = Vec::with_capacity(total);
        for (index, spec) in specs.iter().enumerate() {
            match self.check_shape(spec) {
                Ok(draft) => drafts.push((index, draft)),
                Err(reason) => warn!("{}.createMany: item {} is invalid: {}", self.name(), index, reason),
            }
        }

        let (in_model, elsewhere) = self
            .existing_endpoints(model_id, &drafts)
            .await
            .map_err(|e| self.fail(e))?;

        let mut edges = Vec::with_capacity(drafts.len());
        for (index, draft) in drafts {
            let missing = [(Position::Parent, draft.parent), (Position::Child, draft.child)]
                .into_iter()
                .find(|(_, endpoint)| !in_model.contains(endpoint));

            match missing {
                None => edges.push(HierarchyEdge::new(model_id, draft.parent, draft.child)),
                Some((position, endpoint)) if elsewhere.contains(&endpoint) => warn!(
                    "{}.createMany: item {} is invalid: {} {} is not in model {}",
                    self.name(),
                    index,
                    position,
                    endpoint.1,
                    model_id
                ),
                Some((position, (object_type, id))) => warn!(
                    "{}.createMany: item {} is invalid: {} {} not found in {}",
                    self.name(),
                    index,
                    position,
                    id,
                    object_type.collection_name()
                ),
            }
        }

        let persisted = if edges.is_empty() {
            Vec::new()
        } else {
            self.store
                .insert_edges(self.family, edges)
                .await
                .map_err(|e| self.fail(e))?
        };

        if persisted.len() < total {
            warn!(
                "{}.createMany: {} of {} edges could not be created",
                self.name(),
                total - persisted.len(),
                total
            );
        }
        info!("{} created {} edges in model {}", self.name(), persisted.len(), model_id);

        Ok(persisted.iter().map(EdgeView::from).collect())
    }

    fn fail(&self, err: TaxonomyError) -> TaxonomyError {
        let err = err.in_repository(&self.name(), "createMany");
        error!("{}", err);
        err
    }
}

/// Endpoints of an edge spec that passed the shape checks
#[derive(Debug, Clone, Copy)]
struct HierarchyEdgeDraft {
    parent: (ObjectType, ObjectId),
    child: (ObjectType, ObjectId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryTaxonomyStore;
    use crate::taxonomy::repository::NodeRepository;
    use crate::taxonomy::validation::NewNodeSpec;

    async fn node(store: &Arc<InMemoryTaxonomyStore>, object_type: ObjectType, model_id: ObjectId, code: &str) -> String {
        NodeRepository::new(object_type, store.clone())
            .create(NewNodeSpec {
                code: code.to_string(),
                preferred_label: code.to_string(),
                model_id: model_id.to_hex(),
                ..Default::default()
            })
            .await
            .unwrap()
            .node
            .id
    }

    fn edge(parent: &str, parent_type: ObjectType, child: &str, child_type: ObjectType) -> NewEdgeSpec {
        NewEdgeSpec {
            parent_id: parent.to_string(),
            parent_type,
            child_id: child.to_string(),
            child_type,
        }
    }

    #[tokio::test]
    async fn test_create_many_excludes_invalid_edges() {
        let store = Arc::new(InMemoryTaxonomyStore::new());
        let model_id = ObjectId::new();
        let other_model = ObjectId::new();

        let group = node(&store, ObjectType::SkillGroup, model_id, "S1").await;
        let skill = node(&store, ObjectType::Skill, model_id, "skill-a").await;
        let foreign = node(&store, ObjectType::Skill, other_model, "skill-b").await;

        let repo = HierarchyRepository::new(RelationFamily::Skills, store.clone());
        let created = repo
            .create_many(
                model_id,
                vec![
                    edge(&group, ObjectType::SkillGroup, &skill, ObjectType::Skill),
                    // leaf as parent
                    edge(&skill, ObjectType::Skill, &group, ObjectType::SkillGroup),
                    // other model
                    edge(&group, ObjectType::SkillGroup, &foreign, ObjectType::Skill),
                    // wrong collection for the id
                    edge(&group, ObjectType::SkillGroup, &group, ObjectType::Skill),
                    // self loop
                    edge(&group, ObjectType::SkillGroup, &group, ObjectType::SkillGroup),
                    // malformed id
                    edge("nope", ObjectType::SkillGroup, &skill, ObjectType::Skill),
                ],
            )
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].parent_id, group);
        assert_eq!(created[0].child_id, skill);
        assert_eq!(created[0].model_id, model_id.to_hex());
    }

    #[tokio::test]
    async fn test_wrong_family_types_rejected() {
        let store = Arc::new(InMemoryTaxonomyStore::new());
        let model_id = ObjectId::new();
        let group = node(&store, ObjectType::SkillGroup, model_id, "S1").await;
        let skill = node(&store, ObjectType::Skill, model_id, "skill-a").await;

        let repo = HierarchyRepository::new(RelationFamily::Occupations, store);
        let created = repo
            .create_many(
                model_id,
                vec![edge(&group, ObjectType::SkillGroup, &skill, ObjectType::Skill)],
            )
            .await
            .unwrap();

        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_rejects_call() {
        let store = Arc::new(InMemoryTaxonomyStore::new());
        let model_id = ObjectId::new();
        let group = node(&store, ObjectType::SkillGroup, model_id, "S1").await;
        let skill = node(&store, ObjectType::Skill, model_id, "skill-a").await;
        store.set_unavailable(true);

        let repo = HierarchyRepository::new(RelationFamily::Skills, store.clone());
        let err = repo
            .create_many(
                model_id,
                vec![edge(&group, ObjectType::SkillGroup, &skill, ObjectType::Skill)],
            )
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("SkillHierarchyRepository.createMany: createMany failed"));
    }
}
