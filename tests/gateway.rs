//! Integration tests driving `UpstreamClient` against an in-process fake
//! upstream, covering the cache contract (one network call inside the
//! freshness window, live read after a mutation) and error surfacing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};

use ohmytasks::cache::{MemoryStore, TaskCache};
use ohmytasks::client::{TaskSource, UpstreamClient, UpstreamError};
use ohmytasks::models::{Priority, TaskDraft, TaskId};

async fn list_tasks(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    // Deliberately messy: nested wrapper, mixed id/title conventions,
    // stringy booleans, an unknown field.
    Json(json!({
        "success": true,
        "payload": {
            "rows": [
                {
                    "task_id": 41,
                    "title": "Pay rent",
                    "urgent": "1",
                    "is_full_day": 0,
                    "priority": "high",
                    "position": 7
                },
                { "id": "t-2", "name": "Walk dog", "completed": "yes" }
            ]
        }
    }))
}

async fn create_task(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "success": true,
        "task": {
            "id": 99,
            "title": body["name"],
            "urgent": body["isUrgent"],
            "email": body["email"]
        }
    }))
}

async fn update_task(
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    Json(json!({
        "updatedTask": {
            "id": params.get("id"),
            "title": "Walk dog",
            "completed": body["completed"]
        }
    }))
}

async fn delete_task() -> Json<Value> {
    Json(json!({ "success": true }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream exploded")
}

async fn spawn_upstream() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/tasks",
            get(list_tasks)
                .post(create_task)
                .put(update_task)
                .delete(delete_task),
        )
        .route("/broken", get(broken))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hits)
}

fn client_for(addr: SocketAddr, path: &str) -> UpstreamClient {
    UpstreamClient::new(
        format!("http://{}{}", addr, path),
        String::new(),
        None,
        TaskCache::new(Box::new(MemoryStore::new())),
    )
    .unwrap()
}

fn draft(name: &str) -> TaskDraft {
    TaskDraft {
        name: name.to_string(),
        is_urgent: true,
        ..TaskDraft::default()
    }
}

#[tokio::test]
async fn network_responses_are_normalized() {
    let (addr, _hits) = spawn_upstream().await;
    let client = client_for(addr, "/tasks");

    let fetched = client.fetch_tasks(Some("v@example.com"), true).await.unwrap();
    assert_eq!(fetched.source, TaskSource::Network);
    assert_eq!(fetched.tasks.len(), 2);

    let rent = &fetched.tasks[0];
    assert_eq!(rent.id, TaskId::Num(41));
    assert_eq!(rent.name, "Pay rent");
    assert_eq!(rent.title, "Pay rent");
    assert!(rent.is_urgent);
    assert!(!rent.is_full_day);
    assert_eq!(rent.priority, Priority::Top);
    assert_eq!(rent.extra.get("position"), Some(&json!(7)));

    let dog = &fetched.tasks[1];
    assert_eq!(dog.id, TaskId::Str("t-2".to_string()));
    assert!(dog.completed);
}

#[tokio::test]
async fn cached_read_performs_one_network_call() {
    let (addr, hits) = spawn_upstream().await;
    let client = client_for(addr, "/tasks");

    let first = client.fetch_tasks(Some("v@example.com"), true).await.unwrap();
    let second = client.fetch_tasks(Some("v@example.com"), true).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(first.source, TaskSource::Network);
    assert!(matches!(second.source, TaskSource::Cache { age_ms } if age_ms >= 0));
    assert_eq!(first.tasks, second.tasks);
}

#[tokio::test]
async fn uncached_reads_always_go_live() {
    let (addr, hits) = spawn_upstream().await;
    let client = client_for(addr, "/tasks");

    client.fetch_tasks(Some("v@example.com"), false).await.unwrap();
    client.fetch_tasks(Some("v@example.com"), false).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mutations_invalidate_the_cache() {
    let (addr, hits) = spawn_upstream().await;
    let client = client_for(addr, "/tasks");

    client.fetch_tasks(Some("v@example.com"), true).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let created = client.create_task("v@example.com", &draft("Buy milk")).await.unwrap();
    assert_eq!(created.id, TaskId::Num(99));
    assert_eq!(created.name, "Buy milk");
    assert!(created.is_urgent);

    // The cache entry was dropped, so this read must hit upstream again.
    client.fetch_tasks(Some("v@example.com"), true).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let (addr, hits) = spawn_upstream().await;
    let client = client_for(addr, "/tasks");

    let updated = client
        .update_task("v@example.com", &TaskId::Num(41), json!({ "completed": true }))
        .await
        .unwrap();
    assert_eq!(updated.id, TaskId::Str("41".to_string()));
    assert!(updated.completed);

    client.fetch_tasks(Some("v@example.com"), true).await.unwrap();
    client
        .delete_task("v@example.com", &TaskId::Num(41))
        .await
        .unwrap();

    // Delete invalidated the entry written by the fetch above.
    client.fetch_tasks(Some("v@example.com"), true).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn upstream_errors_carry_status_and_body() {
    let (addr, _hits) = spawn_upstream().await;
    let client = client_for(addr, "/broken");

    let err = client.fetch_tasks(Some("v@example.com"), true).await.unwrap_err();
    match err {
        UpstreamError::Status { status, body } => {
            assert_eq!(status, 502);
            assert!(body.contains("upstream exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn operations_require_an_owner_email() {
    let (addr, _hits) = spawn_upstream().await;
    let client = client_for(addr, "/tasks");

    let err = client.create_task("  ", &draft("x")).await.unwrap_err();
    assert!(matches!(err, UpstreamError::MissingEmail));

    let err = client.fetch_settings("v@example.com").await.unwrap_err();
    assert!(matches!(err, UpstreamError::SettingsNotConfigured));
}
