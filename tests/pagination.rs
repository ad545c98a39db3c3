//! Integration tests for cursor pagination over the in-memory store

use bson::oid::ObjectId;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use taxonomy_api::db::InMemoryTaxonomyStore;
use taxonomy_api::taxonomy::{Cursor, NewNodeSpec, NodeRepository, ObjectType};
use taxonomy_api::TaxonomyError;

/// Repository holding `count` skills in one model, plus one in another model
async fn seeded(count: usize) -> (NodeRepository, ObjectId) {
    let repo = NodeRepository::new(ObjectType::Skill, Arc::new(InMemoryTaxonomyStore::new()));
    let model_id = ObjectId::new();

    let specs = (0..count)
        .map(|i| NewNodeSpec {
            code: format!("skill-{i}"),
            preferred_label: format!("skill {i}"),
            model_id: model_id.to_hex(),
            ..Default::default()
        })
        .collect();
    let created = repo.create_many(specs).await.unwrap();
    assert_eq!(created.len(), count);

    repo.create(NewNodeSpec {
        code: "elsewhere".into(),
        preferred_label: "elsewhere".into(),
        model_id: ObjectId::new().to_hex(),
        ..Default::default()
    })
    .await
    .unwrap();

    (repo, model_id)
}

/// Walk every page with the given sizes (the last size repeats)
async fn walk(repo: &NodeRepository, model_id: ObjectId, sizes: &[usize], descending: bool) -> Vec<String> {
    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;
    let mut step = 0;

    loop {
        let limit = sizes[step.min(sizes.len() - 1)];
        let page = repo
            .find_paginated(model_id, cursor.as_deref(), limit, descending)
            .await
            .unwrap();
        assert!(page.items.len() <= limit);
        ids.extend(page.items.iter().map(|v| v.node.id.clone()));

        match page.next_cursor {
            Some(next) => cursor = Some(next.encode()),
            None => break,
        }
        step += 1;
    }
    ids
}

/// Any sequence of page sizes reconstructs the single-fetch order
#[tokio::test]
async fn test_pages_reconstruct_full_listing() {
    let (repo, model_id) = seeded(11).await;

    for descending in [true, false] {
        let all = walk(&repo, model_id, &[100], descending).await;
        assert_eq!(all.len(), 11);

        for sizes in [&[1][..], &[3, 1, 2, 5], &[4], &[10, 1], &[11]] {
            let paged = walk(&repo, model_id, sizes, descending).await;
            assert_eq!(paged, all, "page sizes {:?}", sizes);
        }
    }
}

/// Descending order is newest first
#[tokio::test]
async fn test_descending_is_reverse_of_ascending() {
    let (repo, model_id) = seeded(5).await;

    let mut ascending = walk(&repo, model_id, &[2], false).await;
    let descending = walk(&repo, model_id, &[2], true).await;
    ascending.reverse();

    assert_eq!(ascending, descending);
}

/// `next_cursor` is present exactly when items remain
#[tokio::test]
async fn test_next_cursor_presence() {
    let (repo, model_id) = seeded(7).await;

    let exact = repo.find_paginated(model_id, None, 7, true).await.unwrap();
    assert_eq!(exact.items.len(), 7);
    assert!(exact.next_cursor.is_none());

    let short = repo.find_paginated(model_id, None, 6, true).await.unwrap();
    assert_eq!(short.items.len(), 6);
    let next = short.next_cursor.expect("one item remains");
    assert_eq!(next.id.to_hex(), short.items[5].node.id);

    let rest = repo
        .find_paginated(model_id, Some(&next.encode()), 6, true)
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 1);
    assert!(rest.next_cursor.is_none());
}

/// An empty model yields an empty page without a cursor
#[tokio::test]
async fn test_empty_model() {
    let (repo, _) = seeded(3).await;
    let page = assert_ok!(repo.find_paginated(ObjectId::new(), None, 10, true).await);
    assert!(page.items.is_empty());
    assert!(page.next_cursor.is_none());
}

/// Malformed cursors are rejected as invalid cursors
#[tokio::test]
async fn test_malformed_cursor() {
    let (repo, model_id) = seeded(2).await;

    // not base64, base64 of non-JSON, JSON without an id, id not an ObjectId
    for cursor in ["%%%", "bm90IGpzb24=", "e30=", "eyJpZCI6Inh5eiIsImNyZWF0ZWRBdCI6IjIwMjQtMDEtMDFUMDA6MDA6MDAuMDAwWiJ9"] {
        let err = assert_err!(repo.find_paginated(model_id, Some(cursor), 10, true).await);
        assert!(
            matches!(err.root(), TaxonomyError::InvalidCursor(_)),
            "cursor {cursor} gave {err}"
        );
    }
}

/// A cursor decodes to what was encoded
#[tokio::test]
async fn test_cursor_round_trip() {
    let cursor = Cursor::new(ObjectId::new(), bson::DateTime::from_millis(1_700_000_000_123));
    let decoded = assert_ok!(Cursor::decode(&cursor.encode()));
    assert_eq!(decoded, cursor);
}

/// A document that cannot be read still holds its place in the page window,
/// so the readable nodes after it stay reachable
#[tokio::test]
async fn test_unreadable_document_does_not_end_listing() {
    let store = Arc::new(InMemoryTaxonomyStore::new());
    let repo = NodeRepository::new(ObjectType::Skill, store.clone());
    let model_id = ObjectId::new();

    let create = |code: &str| NewNodeSpec {
        code: code.to_string(),
        preferred_label: code.to_string(),
        model_id: model_id.to_hex(),
        ..Default::default()
    };

    let first = repo.create(create("skill-a")).await.unwrap();
    let broken = store.insert_unreadable(ObjectType::Skill, model_id).await;
    let second = repo.create(create("skill-b")).await.unwrap();
    let third = repo.create(create("skill-c")).await.unwrap();

    let page = assert_ok!(repo.find_paginated(model_id, None, 2, false).await);
    let ids: Vec<&str> = page.items.iter().map(|v| v.node.id.as_str()).collect();
    assert_eq!(ids, vec![first.node.id.as_str()]);
    let next = page.next_cursor.expect("readable nodes remain");
    assert_eq!(next.id, broken);

    let listed = walk(&repo, model_id, &[2], false).await;
    assert_eq!(listed, vec![first.node.id, second.node.id, third.node.id]);
}
