//! Node repository
//!
//! One repository per variant. Reads populate the hierarchy in two stages:
//! edges first, then the referenced documents batched per collection, each
//! endpoint passed through the resolver and the same-model guard.

use bson::{oid::ObjectId, DateTime};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::db::schemas::{HierarchyEdge, TaxonomyNode};
use crate::db::store::{EdgeQuery, PageEntry, PageQuery, TaxonomyStore};
use crate::taxonomy::diagnostic::{DiagnosticKind, Diagnostics};
use crate::taxonomy::guard::guard_reference;
use crate::taxonomy::pagination::{Cursor, Page};
use crate::taxonomy::reference::{ids_by_collection, resolve_reference, JoinedNodes, ReferenceView};
use crate::taxonomy::validation::{validate_node_spec, NewNodeSpec};
use crate::taxonomy::view::{NodeDocument, NodeView, ParentLink};
use crate::taxonomy::{ObjectType, ParentCardinality, Position};
use crate::types::{Result, TaxonomyError};

/// Message fragment returned when a caller supplies a server-assigned UUID
pub const UUID_PROVIDED: &str = "UUID should not be provided";

/// Repository for one taxonomy variant
#[derive(Clone)]
pub struct NodeRepository {
    object_type: ObjectType,
    store: Arc<dyn TaxonomyStore>,
}

impl NodeRepository {
    pub fn new(object_type: ObjectType, store: Arc<dyn TaxonomyStore>) -> Self {
        Self { object_type, store }
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn name(&self) -> &'static str {
        self.object_type.repository_name()
    }

    fn fail(&self, op: &str, err: TaxonomyError) -> TaxonomyError {
        let err = err.in_repository(self.name(), op);
        error!("{}", err);
        err
    }

    /// Node with parent(s) and children. An id that does not parse or names
    /// no document yields `None`.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<NodeView>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            debug!("{}.findById: '{}' is not an ObjectId", self.name(), id);
            return Ok(None);
        };

        let node = self
            .store
            .find_node(self.object_type, oid)
            .await
            .map_err(|e| self.fail("findById", e))?;

        match node {
            Some(node) => self
                .populate(node)
                .await
                .map(Some)
                .map_err(|e| self.fail("findById", e)),
            None => Ok(None),
        }
    }

    async fn populate(&self, node: TaxonomyNode) -> Result<NodeView> {
        let family = self.object_type.family();
        let oid = node.oid()?;
        let model_id = node.model_id;

        let (parent_edges, child_edges) = tokio::try_join!(
            self.store.find_edges(
                family,
                EdgeQuery::parents_of(model_id, self.object_type, oid)
            ),
            self.store.find_edges(
                family,
                EdgeQuery::children_of(model_id, self.object_type, oid)
            ),
        )?;

        let joined = self.join(&parent_edges, &child_edges).await?;
        let mut diagnostics = Diagnostics::new();

        let parents = self.resolve_all(&parent_edges, Position::Parent, model_id, &joined, &mut diagnostics);
        let children = self.resolve_all(&child_edges, Position::Child, model_id, &joined, &mut diagnostics);

        let parent = match family.parent_cardinality() {
            ParentCardinality::Single => {
                let mut parents = parents.into_iter();
                let first = parents.next();
                for extra in parents {
                    diagnostics.report(
                        DiagnosticKind::ExtraParent,
                        Position::Parent,
                        None,
                        format!(
                            "{} {} has more than one parent, ignoring {}",
                            self.object_type, oid, extra.id
                        ),
                    );
                }
                ParentLink::Single(first)
            }
            ParentCardinality::Many => ParentLink::Many(parents),
        };

        Ok(NodeView {
            node: NodeDocument::try_from(&node)?,
            parent,
            children,
            diagnostics: diagnostics.into_vec(),
        })
    }

    /// Fetch every referenced document, one batch per collection
    async fn join(
        &self,
        parent_edges: &[HierarchyEdge],
        child_edges: &[HierarchyEdge],
    ) -> Result<JoinedNodes> {
        let mut batches: HashMap<ObjectType, Vec<ObjectId>> = HashMap::new();
        ids_by_collection(parent_edges, Position::Parent, &mut batches);
        ids_by_collection(child_edges, Position::Child, &mut batches);

        let store = &self.store;
        let fetched = try_join_all(batches.iter().map(|(collection, ids)| async move {
            let nodes = store.find_nodes(*collection, ids).await?;
            Ok::<_, TaxonomyError>((*collection, nodes))
        }))
        .await?;

        let mut joined = JoinedNodes::new();
        for (collection, nodes) in fetched {
            joined.extend(collection, nodes);
        }
        Ok(joined)
    }

    fn resolve_all(
        &self,
        edges: &[HierarchyEdge],
        position: Position,
        model_id: ObjectId,
        joined: &JoinedNodes,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ReferenceView> {
        let family = self.object_type.family();
        edges
            .iter()
            .filter_map(|edge| {
                let resolved = resolve_reference(family, position, edge, joined, diagnostics);
                guard_reference(resolved, position, edge, model_id, diagnostics)
            })
            .collect()
    }

    /// Build the document for a validated spec; the fresh UUID is appended to
    /// the history as its newest entry
    fn new_node(&self, spec: NewNodeSpec, model_id: ObjectId) -> TaxonomyNode {
        let uuid = uuid::Uuid::new_v4().to_string();
        let mut uuid_history = spec.uuid_history;
        uuid_history.push(uuid.clone());
        let now = DateTime::now();

        TaxonomyNode {
            id: None,
            uuid,
            uuid_history,
            code: spec.code,
            preferred_label: spec.preferred_label,
            alt_labels: spec.alt_labels,
            description: spec.description,
            model_id,
            object_type: self.object_type,
            import_id: spec.import_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(&self, spec: NewNodeSpec) -> Result<NodeView> {
        if spec.uuid.is_some() {
            return Err(self.fail("create", TaxonomyError::Contract(UUID_PROVIDED.into())));
        }

        let model_id = validate_node_spec(self.object_type, &spec)
            .map_err(|e| self.fail("create", TaxonomyError::Validation(e)))?;

        let node = self
            .store
            .insert_node(self.object_type, self.new_node(spec, model_id))
            .await
            .map_err(|e| self.fail("create", e))?;

        let view = NodeView::without_hierarchy(&node).map_err(|e| self.fail("create", e))?;

        info!(
            "{} created {} {} ({})",
            self.name(),
            self.object_type,
            view.node.id,
            view.node.code
        );

        Ok(view)
    }

    /// Create a batch. Invalid items and items the store refuses are left
    /// out; the rest are returned in input order.
    pub async fn create_many(&self, specs: Vec<NewNodeSpec>) -> Result<Vec<NodeView>> {
        if specs.iter().any(|s| s.uuid.is_some()) {
            return Err(self.fail("createMany", TaxonomyError::Contract(UUID_PROVIDED.into())));
        }

        let total = specs.len();
        let mut nodes = Vec::with_capacity(total);
        for (index, spec) in specs.into_iter().enumerate() {
            match validate_node_spec(self.object_type, &spec) {
                Ok(model_id) => nodes.push(self.new_node(spec, model_id)),
                Err(e) => warn!("{}.createMany: item {} is invalid: {}", self.name(), index, e),
            }
        }

        let persisted = if nodes.is_empty() {
            Vec::new()
        } else {
            self.store
                .insert_nodes(self.object_type, nodes)
                .await
                .map_err(|e| self.fail("createMany", e))?
        };

        if persisted.len() < total {
            warn!(
                "{}.createMany: {} of {} documents could not be created",
                self.name(),
                total - persisted.len(),
                total
            );
        }

        persisted
            .iter()
            .map(NodeView::without_hierarchy)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| self.fail("createMany", e))
    }

    /// Page of a model's nodes ordered by `_id`, newest first when
    /// `descending`
    pub async fn find_paginated(
        &self,
        model_id: ObjectId,
        cursor: Option<&str>,
        limit: usize,
        descending: bool,
    ) -> Result<Page<NodeView>> {
        let after = cursor.map(Cursor::decode).transpose()?.map(|c| c.id);

        let window = self
            .store
            .find_page(
                self.object_type,
                PageQuery {
                    model_id,
                    after,
                    descending,
                    limit: limit as i64 + 1,
                },
            )
            .await
            .map_err(|e| self.fail("findPaginated", e))?;

        // Unreadable documents count toward the window and may carry the
        // cursor, but are not listed
        let page = Page::from_overfetch(window, limit, |e: &PageEntry| {
            Cursor::new(e.id, e.created_at)
        });
        let nodes = page.items.into_iter().filter_map(|e| e.node);

        let items = try_join_all(nodes.map(|n| self.populate(n)))
            .await
            .map_err(|e| self.fail("findPaginated", e))?;

        Ok(Page {
            items,
            next_cursor: page.next_cursor,
        })
    }

    /// Every node of a model, unpopulated, in natural order
    pub async fn find_all(&self, model_id: ObjectId) -> Result<Vec<NodeDocument>> {
        let nodes = self
            .store
            .find_all(self.object_type, model_id)
            .await
            .map_err(|e| self.fail("findAll", e))?;

        nodes
            .iter()
            .map(NodeDocument::try_from)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| self.fail("findAll", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryTaxonomyStore;

    fn repository(object_type: ObjectType) -> (NodeRepository, Arc<InMemoryTaxonomyStore>) {
        let store = Arc::new(InMemoryTaxonomyStore::new());
        (NodeRepository::new(object_type, store.clone()), store)
    }

    fn spec(model_id: ObjectId, code: &str) -> NewNodeSpec {
        NewNodeSpec {
            code: code.to_string(),
            preferred_label: format!("label {code}"),
            model_id: model_id.to_hex(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_uuid_and_history() {
        let (repo, _) = repository(ObjectType::OccupationGroup);
        let model_id = ObjectId::new();
        let previous = uuid::Uuid::new_v4().to_string();
        let mut s = spec(model_id, "11");
        s.uuid_history = vec![previous.clone()];

        let view = repo.create(s).await.unwrap();

        assert!(uuid::Uuid::parse_str(&view.node.uuid).is_ok());
        assert_eq!(view.node.uuid_history, vec![previous, view.node.uuid.clone()]);
        assert_eq!(view.node.object_type, ObjectType::OccupationGroup);
        assert_eq!(view.parent, ParentLink::Single(None));
    }

    #[tokio::test]
    async fn test_create_rejects_supplied_uuid() {
        let (repo, _) = repository(ObjectType::Skill);
        let mut s = spec(ObjectId::new(), "skill-1");
        s.uuid = Some(uuid::Uuid::new_v4().to_string());

        let err = repo.create(s).await.unwrap_err();

        assert!(err.to_string().contains(UUID_PROVIDED));
        assert!(matches!(err.root(), TaxonomyError::Contract(_)));
    }

    #[tokio::test]
    async fn test_create_duplicate_code_is_wrapped() {
        let (repo, _) = repository(ObjectType::OccupationGroup);
        let model_id = ObjectId::new();
        repo.create(spec(model_id, "11")).await.unwrap();

        let err = repo.create(spec(model_id, "11")).await.unwrap_err();

        assert!(err
            .to_string()
            .starts_with("OccupationGroupRepository.create: create failed"));
        assert!(matches!(err.root(), TaxonomyError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_create_invalid_spec() {
        let (repo, _) = repository(ObjectType::Occupation);
        let err = repo.create(spec(ObjectId::new(), "not-a-code")).await.unwrap_err();
        assert!(matches!(err.root(), TaxonomyError::Validation(_)));
        assert_eq!(err.error_code(), "INVALID_JSON_SCHEMA");
    }

    #[tokio::test]
    async fn test_create_many_uuid_rejects_whole_call() {
        let (repo, store) = repository(ObjectType::SkillGroup);
        let model_id = ObjectId::new();
        let mut bad = spec(model_id, "S2");
        bad.uuid = Some(uuid::Uuid::new_v4().to_string());

        let err = repo
            .create_many(vec![spec(model_id, "S1"), bad])
            .await
            .unwrap_err();

        assert!(err.to_string().contains(UUID_PROVIDED));
        assert!(store
            .find_all(ObjectType::SkillGroup, model_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id_unknown_or_malformed() {
        let (repo, _) = repository(ObjectType::Skill);
        assert!(repo.find_by_id("not-an-id").await.unwrap().is_none());
        assert!(repo
            .find_by_id(&ObjectId::new().to_hex())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_by_id_on_unavailable_store_is_wrapped() {
        let (repo, store) = repository(ObjectType::Skill);
        store.set_unavailable(true);

        let err = repo.find_by_id(&ObjectId::new().to_hex()).await.unwrap_err();

        assert!(err
            .to_string()
            .starts_with("SkillRepository.findById: findById failed"));
    }

    #[tokio::test]
    async fn test_single_parent_family_keeps_first_parent() {
        let store = Arc::new(InMemoryTaxonomyStore::new());
        let groups = NodeRepository::new(ObjectType::OccupationGroup, store.clone());
        let occupations = NodeRepository::new(ObjectType::Occupation, store.clone());
        let model_id = ObjectId::new();

        let first = groups.create(spec(model_id, "1")).await.unwrap();
        let second = groups.create(spec(model_id, "2")).await.unwrap();
        let child = occupations.create(spec(model_id, "1111.1")).await.unwrap();
        let child_id = ObjectId::parse_str(&child.node.id).unwrap();

        let edges = [&first, &second]
            .iter()
            .map(|g| {
                HierarchyEdge::new(
                    model_id,
                    (
                        ObjectType::OccupationGroup,
                        ObjectId::parse_str(&g.node.id).unwrap(),
                    ),
                    (ObjectType::Occupation, child_id),
                )
            })
            .collect();
        store
            .insert_edges(crate::taxonomy::RelationFamily::Occupations, edges)
            .await
            .unwrap();

        let view = occupations.find_by_id(&child.node.id).await.unwrap().unwrap();

        let parents = view.parent.references();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, first.node.id);
        assert_eq!(view.diagnostics.len(), 1);
        assert_eq!(view.diagnostics[0].kind, DiagnosticKind::ExtraParent);
    }
}
