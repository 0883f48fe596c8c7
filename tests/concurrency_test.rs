mod common;

use common::{Reply, StubStorage, build_service};
use futures::future::join_all;
use metalayer_gateway::models::{UploadBody, UploadRoute};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::Barrier;

fn body(i: usize, creator: Option<&str>) -> UploadBody {
    UploadBody {
        file_name: Some(format!("file-{}.txt", i)),
        creator: creator.map(str::to_string),
        file_data: Some("aGVsbG8gd29ybGQ=".to_string()),
        declared_size: None,
    }
}

#[tokio::test]
async fn test_context_uploads_never_overlap_signing() {
    const N: usize = 8;
    let mut stub = StubStorage::new(
        Reply::Json(json!({"rootHash": "r", "totalChunks": 1, "txHash": "t"})),
        Reply::Json(json!("id")),
    );
    stub.delay = Duration::from_millis(20);
    let storage = Arc::new(stub);
    let staging = tempfile::tempdir().unwrap();
    let uploads = build_service(storage.clone(), staging.path());

    let reports = join_all(
        (0..N).map(|i| uploads.handle_upload(body(i, Some("0xABC")), UploadRoute::WithContext)),
    )
    .await;

    assert!(reports.iter().all(|r| r.outcome.is_success()));
    assert_eq!(storage.context_calls.load(Ordering::SeqCst), N);
    assert_eq!(storage.max_in_flight.load(Ordering::SeqCst), 1);

    // Every signed operation finishes before the next one starts.
    let events = storage.events.lock().unwrap();
    assert_eq!(events.len(), 2 * N);
    for pair in events.chunks(2) {
        let start = pair[0].strip_prefix("start:").unwrap();
        let end = pair[1].strip_prefix("end:").unwrap();
        assert_eq!(start, end);
    }

    assert_eq!(uploads.signer().constructions(), 1);
}

#[tokio::test]
async fn test_concurrent_spawned_context_uploads_are_serialized() {
    const N: usize = 6;
    let mut stub = StubStorage::new(
        Reply::Json(json!({"rootHash": "r", "totalChunks": 1, "txHash": "t"})),
        Reply::Json(json!("id")),
    );
    stub.delay = Duration::from_millis(10);
    let storage = Arc::new(stub);
    let staging = tempfile::tempdir().unwrap();
    let uploads = build_service(storage.clone(), staging.path());

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let uploads = uploads.clone();
            tokio::spawn(async move {
                uploads
                    .handle_upload(body(i, Some("0xABC")), UploadRoute::WithContext)
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().outcome.is_success());
    }
    assert_eq!(storage.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(uploads.signer().constructions(), 1);
}

#[tokio::test]
async fn test_direct_uploads_run_independently() {
    const N: usize = 4;
    let mut stub = StubStorage::new(Reply::Json(json!({})), Reply::Json(json!("id")));
    // Every call waits for all the others: only possible if none is serialized.
    stub.file_barrier = Some(Barrier::new(N));
    let storage = Arc::new(stub);
    let staging = tempfile::tempdir().unwrap();
    let uploads = build_service(storage.clone(), staging.path());

    let reports = tokio::time::timeout(
        Duration::from_secs(10),
        join_all((0..N).map(|i| uploads.handle_upload(body(i, None), UploadRoute::Direct))),
    )
    .await
    .expect("direct uploads must not block each other");

    assert!(reports.iter().all(|r| r.outcome.is_success()));
    assert_eq!(storage.max_in_flight.load(Ordering::SeqCst), N);

    // Each request staged its own artifact and every one was reclaimed.
    let paths = storage.seen_paths.lock().unwrap();
    let mut unique: Vec<_> = paths.iter().map(|(p, _)| p.clone()).collect();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), N);
    assert!(unique.iter().all(|p| !p.exists()));
    assert_eq!(uploads.staging().active(), 0);
    assert_eq!(uploads.signer().constructions(), 0);
}
