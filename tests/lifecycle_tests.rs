//! Lifecycle manager integration tests: single-flight resolution, capacity
//! admission, delete idempotence, and rollback.

mod common;

use common::{FailingEmbedder, HashEmbedder, SlowEmbedder, minimal_pdf};
use gynassist::document::Chunk;
use gynassist::error::AssistError;
use gynassist::lifecycle::IndexLifecycleManager;
use gynassist::store::{BlobStore, MemoryBlobStore, keys};
use gynassist::vector::{IndexId, VectorIndex};
use std::sync::Arc;

fn manager_with(
    store: Arc<MemoryBlobStore>,
    max_active: usize,
) -> IndexLifecycleManager {
    IndexLifecycleManager::new(
        vec![store as Arc<dyn BlobStore>],
        Arc::new(HashEmbedder::new()),
        max_active,
    )
}

/// Persist a pre-built index directly into the store, bypassing upload.
async fn seed_index(store: &MemoryBlobStore, id: &IndexId) {
    let embedder = HashEmbedder::new();
    let chunks = vec![
        Chunk {
            text: "patients with endometriosis often report pelvic pain".to_string(),
            page: 1,
        },
        Chunk {
            text: "laparoscopy remains the diagnostic reference standard".to_string(),
            page: 2,
        },
    ];
    let index = VectorIndex::build(chunks, &embedder).unwrap();
    store
        .put(&keys::index_bin(id), index.to_bytes().unwrap())
        .await
        .unwrap();

    let record = serde_json::json!({
        "id": id.to_string(),
        "filename": "seeded.pdf",
        "page_count": 2,
        "chunk_count": 2,
        "dimension": 384,
        "created_at": "2026-01-01T00:00:00Z",
    });
    store
        .put(&keys::index_json(id), serde_json::to_vec(&record).unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_resolve_downloads_exactly_once() {
    let store = Arc::new(MemoryBlobStore::new());
    let id = IndexId::generate();
    seed_index(&store, &id).await;

    let manager = Arc::new(manager_with(Arc::clone(&store), 2));
    let gets_before = store.get_calls();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        handles.push(tokio::spawn(async move { manager.resolve(&id).await }));
    }
    for handle in handles {
        let retriever = handle.await.unwrap().unwrap();
        assert_eq!(retriever.record().filename, "seeded.pdf");
    }

    // One fetch of index.bin plus one of index.json, regardless of callers
    assert_eq!(store.get_calls() - gets_before, 2);

    // A later resolve is served from cache without touching the store
    let gets = store.get_calls();
    manager.resolve(&id).await.unwrap();
    assert_eq!(store.get_calls(), gets);
}

#[tokio::test]
async fn resolve_unknown_id_fails_with_not_found() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = manager_with(store, 2);

    let id = IndexId::generate();
    match manager.resolve(&id).await {
        Err(AssistError::IndexNotFound { id: missing }) => assert_eq!(missing, id),
        other => panic!("expected IndexNotFound, got {:?}", other.err().map(|e| e.to_string())),
    }
}

#[tokio::test]
async fn capacity_admits_two_rejects_third_until_delete() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = manager_with(Arc::clone(&store), 2);

    let first = manager
        .register_document("first.pdf", minimal_pdf("uterine fibroid treatment options"))
        .await
        .unwrap();
    manager
        .register_document("second.pdf", minimal_pdf("cervical screening guidance"))
        .await
        .unwrap();

    let err = manager
        .register_document("third.pdf", minimal_pdf("one document too many"))
        .await
        .unwrap_err();
    match err {
        AssistError::CapacityExceeded { active, limit } => {
            assert_eq!(active, 2);
            assert_eq!(limit, 2);
        }
        other => panic!("expected CapacityExceeded, got {other}"),
    }

    // Freeing a slot readmits uploads
    assert!(manager.delete(&first.id).await.unwrap());
    manager
        .register_document("third.pdf", minimal_pdf("now it fits"))
        .await
        .unwrap();

    assert_eq!(manager.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_uploads_cannot_overshoot_capacity() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = Arc::new(IndexLifecycleManager::new(
        vec![Arc::clone(&store) as Arc<dyn BlobStore>],
        Arc::new(SlowEmbedder::new(std::time::Duration::from_millis(200))),
        2,
    ));

    manager
        .register_document("seed.pdf", minimal_pdf("already occupying a slot"))
        .await
        .unwrap();

    // Two uploads race for the single remaining slot
    let mut handles = Vec::new();
    for name in ["racer-a.pdf", "racer-b.pdf"] {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .register_document(name, minimal_pdf("contending for the last slot"))
                .await
        }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(AssistError::CapacityExceeded { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(rejected, 1);
    assert_eq!(manager.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_operations_leave_no_pending_state() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = manager_with(Arc::clone(&store), 2);

    // Misses against random ids must not accumulate per-id locks
    for _ in 0..5 {
        let id = IndexId::generate();
        assert!(manager.resolve(&id).await.is_err());
    }
    assert_eq!(manager.pending_ops(), 0);

    // A delete that fails at the store must clean up as well
    store.set_unavailable(true);
    assert!(manager.delete(&IndexId::generate()).await.is_err());
    assert_eq!(manager.pending_ops(), 0);

    store.set_unavailable(false);
    assert!(!manager.delete(&IndexId::generate()).await.unwrap());
    assert_eq!(manager.pending_ops(), 0);
}

#[tokio::test]
async fn register_persists_all_three_artifacts() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = manager_with(Arc::clone(&store), 2);

    let record = manager
        .register_document("report.pdf", minimal_pdf("postpartum follow up schedule"))
        .await
        .unwrap();

    assert_eq!(record.filename, "report.pdf");
    assert_eq!(record.page_count, 1);
    assert!(record.chunk_count >= 1);

    let stored = store.list(&keys::id_prefix(&record.id)).await.unwrap();
    assert!(stored.contains(&keys::index_bin(&record.id)));
    assert!(stored.contains(&keys::index_json(&record.id)));
    assert!(stored.contains(&keys::source_document(&record.id, "report.pdf")));

    // The fresh index is cached, so retrieval does not hit the store
    let gets = store.get_calls();
    let retriever = manager.resolve(&record.id).await.unwrap();
    assert_eq!(store.get_calls(), gets);

    let hits = retriever.retrieve("postpartum follow up", 5).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.page, 1);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = manager_with(Arc::clone(&store), 2);

    let record = manager
        .register_document("doc.pdf", minimal_pdf("short lived document"))
        .await
        .unwrap();

    assert!(manager.delete(&record.id).await.unwrap());
    assert_eq!(store.list(&keys::id_prefix(&record.id)).await.unwrap().len(), 0);

    // Second delete reports nothing existed
    assert!(!manager.delete(&record.id).await.unwrap());

    // And an id that never existed behaves the same
    assert!(!manager.delete(&IndexId::generate()).await.unwrap());
}

#[tokio::test]
async fn failed_build_leaves_no_artifacts() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager =
        IndexLifecycleManager::new(vec![Arc::clone(&store) as Arc<dyn BlobStore>], Arc::new(FailingEmbedder), 2);

    let err = manager
        .register_document("doomed.pdf", minimal_pdf("this will not embed"))
        .await
        .unwrap_err();
    assert!(matches!(err, AssistError::Vector(_)));

    assert_eq!(store.blob_count(), 0);
    assert!(manager.cache().is_empty());
    assert_eq!(manager.list().await.unwrap().len(), 0);
}

#[tokio::test]
async fn resolve_falls_back_to_second_source() {
    let primary = Arc::new(MemoryBlobStore::new());
    let fallback = Arc::new(MemoryBlobStore::new());

    let id = IndexId::generate();
    seed_index(&fallback, &id).await;
    primary.set_unavailable(true);

    let manager = IndexLifecycleManager::new(
        vec![
            Arc::clone(&primary) as Arc<dyn BlobStore>,
            Arc::clone(&fallback) as Arc<dyn BlobStore>,
        ],
        Arc::new(HashEmbedder::new()),
        2,
    );

    let retriever = manager.resolve(&id).await.unwrap();
    assert_eq!(retriever.record().filename, "seeded.pdf");
}

#[tokio::test]
async fn corpus_provision_round_trips_through_store() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = manager_with(Arc::clone(&store), 2);

    let chunks = vec![
        Chunk {
            text: "hormonal contraception eligibility criteria".to_string(),
            page: 1,
        },
        Chunk {
            text: "management of abnormal uterine bleeding".to_string(),
            page: 1,
        },
    ];
    manager.provision_corpus(chunks).await.unwrap();

    // A second manager over the same store loads the corpus cold
    let fresh = manager_with(Arc::clone(&store), 2);
    let corpus = fresh.load_corpus().await.unwrap().expect("corpus present");
    let hits = corpus
        .retrieve("abnormal uterine bleeding management", 1)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].chunk.text.contains("uterine bleeding"));
}

#[tokio::test]
async fn load_corpus_without_any_source_data_is_none() {
    let store = Arc::new(MemoryBlobStore::new());
    let manager = manager_with(store, 2);
    assert!(manager.load_corpus().await.unwrap().is_none());
}
