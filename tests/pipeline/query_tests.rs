//! Tests for querying a live index

#![allow(unused_imports)]

use prov_index::{Query, QueryEngine};

use crate::common::{TestTree, ACCEPTANCE_DOC};

// ============================================================================
// LABEL QUERIES
// ============================================================================

#[tokio::test]
async fn test_initial_scan_query_order() {
    let tree = TestTree::new();
    tree.add_doc("b/two.prov", "entitylabel2")
        .add_doc("a/one.prov", "entitylabel1");

    let indexer = tree.start_indexer().await;
    let engine = QueryEngine::new(indexer.reader.clone());

    let all = engine.execute(&Query::all()).data;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].path, tree.join("a/one.prov"));
    assert_eq!(all[1].path, tree.join("b/two.prov"));

    let one = engine.execute(&Query::by_label("entitylabel1")).data;
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].record.entity_label(), Some("entitylabel1"));

    indexer.stop().await;
}

#[tokio::test]
async fn test_acceptance_document_query() {
    let tree = TestTree::new();
    tree.add_file("testfile1.txt.prov", ACCEPTANCE_DOC)
        .add_doc("other.prov", "other");

    let indexer = tree.start_indexer().await;
    let engine = QueryEngine::new(indexer.reader.clone());

    let data = engine.execute(&Query::by_label("TESTFILE1.TXT")).data;
    assert_eq!(data.len(), 1);

    let record = &data[0].record;
    let entity = record.entity.as_ref().unwrap();
    assert_eq!(entity.entity_type.as_deref(), Some("File"));
    assert_eq!(
        entity.data_hash.as_deref(),
        Some("66a045b452102c59d840ec097d59d9467e13a3f34f6494e539ffd32c1bb35f18")
    );
    let agent = record.agent.as_ref().unwrap();
    assert_eq!(agent.family_name.as_deref(), Some("Dressel"));
    assert_eq!(agent.given_name.as_deref(), Some("Frank"));
    let activity = record.activity.as_ref().unwrap();
    assert_eq!(activity.location.as_deref(), Some("sp-000093u"));

    indexer.stop().await;
}

#[tokio::test]
async fn test_unmatched_label_returns_empty() {
    let tree = TestTree::new();
    tree.add_doc("doc.prov", "present");

    let indexer = tree.start_indexer().await;
    let engine = QueryEngine::new(indexer.reader.clone());
    assert!(engine.execute(&Query::by_label("missing")).data.is_empty());

    indexer.stop().await;
}
