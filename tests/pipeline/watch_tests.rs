//! Tests for live change handling
//!
//! Each test starts the indexer, waits for it to report `Watching`, then
//! changes the tree:
//! - new documents in watched directories
//! - new documents under newly created subdirectories
//! - rewrites of already-indexed documents
//! - directories removed and recreated under the same name
//! - files with other suffixes

use std::fs;
use std::time::Duration;

use prov_index::CoordinatorState;

use crate::common::{provenance_doc, TestTree};

fn entity_label(reader: &prov_index::IndexReader, path: &std::path::Path) -> Option<String> {
    reader
        .get(path)
        .and_then(|record| record.entity_label().map(str::to_owned))
}

// ============================================================================
// NEW DOCUMENTS
// ============================================================================

#[tokio::test]
async fn test_new_document_is_indexed() {
    let tree = TestTree::new();
    tree.add_doc("first.prov", "entitylabel1");

    let indexer = tree.start_indexer().await;
    assert_eq!(indexer.reader.len(), 1);

    tree.add_doc("second.prov", "entitylabel2");
    let second = tree.join("second.prov");
    indexer
        .wait_until(|reader| entity_label(reader, &second).as_deref() == Some("entitylabel2"))
        .await;

    assert_eq!(indexer.reader.len(), 2);
    indexer.stop().await;
}

#[tokio::test]
async fn test_document_in_new_subdirectory_is_indexed() {
    let tree = TestTree::new();
    tree.add_doc("root.prov", "root");

    let indexer = tree.start_indexer().await;
    let watched_before = indexer.status.snapshot().watched_dirs;

    // Directory and document appear together; the document may land before
    // the directory is registered
    tree.add_doc("batch/run1/result.prov", "nested");
    let nested = tree.join("batch/run1/result.prov");
    indexer
        .wait_until(|reader| entity_label(reader, &nested).as_deref() == Some("nested"))
        .await;

    // Later documents in the adopted directory arrive through its own watch
    tree.add_doc("batch/run1/later.prov", "later");
    let later = tree.join("batch/run1/later.prov");
    indexer
        .wait_until(|reader| entity_label(reader, &later).as_deref() == Some("later"))
        .await;

    assert!(indexer.status.snapshot().watched_dirs >= watched_before + 2);
    indexer.stop().await;
}

#[tokio::test]
async fn test_recreated_subdirectory_is_watched_again() {
    let tree = TestTree::new();
    let indexer = tree.start_indexer().await;

    tree.add_doc("run/first.prov", "first");
    let first = tree.join("run/first.prov");
    indexer
        .wait_until(|reader| entity_label(reader, &first).as_deref() == Some("first"))
        .await;

    fs::remove_dir_all(tree.join("run")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::create_dir(tree.join("run")).unwrap();

    // Let the adoption walk finish so the next document is only visible
    // through the new directory watch
    tokio::time::sleep(Duration::from_millis(500)).await;
    tree.add_doc("run/second.prov", "second");
    let second = tree.join("run/second.prov");
    indexer
        .wait_until(|reader| entity_label(reader, &second).as_deref() == Some("second"))
        .await;

    indexer.stop().await;
}

#[tokio::test]
async fn test_other_suffixes_are_ignored() {
    let tree = TestTree::new();
    let indexer = tree.start_indexer().await;

    tree.add_file("notes.txt", &provenance_doc("not-a-document"));
    tree.add_doc("marker.prov", "marker");
    let marker = tree.join("marker.prov");
    indexer
        .wait_until(|reader| entity_label(reader, &marker).is_some())
        .await;

    assert_eq!(indexer.reader.paths(), vec![marker]);
    indexer.stop().await;
}

// ============================================================================
// MODIFICATIONS
// ============================================================================

#[tokio::test]
async fn test_rewrite_replaces_record() {
    let tree = TestTree::new();
    tree.add_doc("doc.prov", "before");
    let doc = tree.join("doc.prov");

    let indexer = tree.start_indexer().await;
    assert_eq!(entity_label(&indexer.reader, &doc).as_deref(), Some("before"));

    fs::write(&doc, provenance_doc("after")).unwrap();
    indexer
        .wait_until(|reader| entity_label(reader, &doc).as_deref() == Some("after"))
        .await;

    let snapshot = indexer.reader.snapshot_all();
    assert_eq!(snapshot.len(), 1, "path must never appear twice");
    assert_eq!(snapshot[0].path, doc);
    indexer.stop().await;
}

#[tokio::test]
async fn test_garbled_rewrite_keeps_path_indexed() {
    let tree = TestTree::new();
    tree.add_doc("doc.prov", "valid");
    let doc = tree.join("doc.prov");

    let indexer = tree.start_indexer().await;
    fs::write(&doc, "{ this is not json").unwrap();
    indexer
        .wait_until(|reader| {
            reader
                .get(&doc)
                .map(|record| record.is_absent())
                .unwrap_or(false)
        })
        .await;

    assert_eq!(indexer.reader.len(), 1);
    indexer.stop().await;
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_shutdown_stops_cleanly() {
    let tree = TestTree::new();
    tree.add_doc("doc.prov", "doc");

    let indexer = tree.start_indexer().await;
    let status = indexer.status.clone();
    let reader = indexer.reader.clone();
    indexer.stop().await;

    assert_eq!(status.state(), CoordinatorState::Stopped);
    // The index stays readable after the coordinator is gone
    assert_eq!(reader.len(), 1);
}
