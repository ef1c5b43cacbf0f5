//! End-to-end HTTP tests against a real server process.

mod common;

use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn test_create_and_get_ticket() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();

    let ticket = server.create_ticket("mario", worker_id).await;
    assert!(ticket["id"].is_i64());
    assert_eq!(ticket["contact"], "mario");
    assert_eq!(ticket["worker_id"], worker_id);
    assert_eq!(ticket["status"], "waiting");
    assert!(ticket["created_at"].is_string());

    let response = server
        .client
        .get(server.url(&format!("/api/v1/tickets/{}", ticket["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["id"], ticket["id"]);
    assert_eq!(fetched["status"], "waiting");

    server.stop().await;
}

#[tokio::test]
async fn test_get_missing_ticket_returns_404() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(server.url("/api/v1/tickets/9999"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn test_create_ticket_for_unknown_worker_returns_404() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(server.url("/api/v1/tickets"))
        .json(&json!({ "contact": "orphan", "worker_id": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_counter_flow_start_advance_finish() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();

    let first = server.create_ticket("first", worker_id).await;
    let second = server.create_ticket("second", worker_id).await;

    // Call the first customer.
    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", worker_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let called: Value = response.json().await.unwrap();
    assert_eq!(called["id"], first["id"]);
    assert_eq!(called["status"], "processing");

    // Advance: finish the first, call the second.
    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/advance", worker_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let called: Value = response.json().await.unwrap();
    assert_eq!(called["id"], second["id"]);
    assert_eq!(called["status"], "processing");

    // Finish without calling anyone else.
    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/finish", worker_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let finished: Value = response.json().await.unwrap();
    assert_eq!(finished["id"], second["id"]);
    assert_eq!(finished["status"], "finished");

    server.stop().await;
}

#[tokio::test]
async fn test_start_on_empty_queue_returns_404() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();

    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", worker_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_double_start_returns_409() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();

    server.create_ticket("one", worker_id).await;
    server.create_ticket("two", worker_id).await;

    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", worker_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", worker_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    server.stop().await;
}

#[tokio::test]
async fn test_cancel_ticket() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();
    let ticket = server.create_ticket("leaver", worker_id).await;

    let response = server
        .client
        .delete(server.url(&format!("/api/v1/tickets/{}", ticket["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let cancelled: Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");

    // Cancelled tickets are never called.
    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", worker_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_skip_ticket_promotes_successor() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();

    let absent = server.create_ticket("absent", worker_id).await;
    let present = server.create_ticket("present", worker_id).await;

    server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", worker_id)))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .post(server.url(&format!("/api/v1/tickets/{}/skip", absent["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let promoted: Value = response.json().await.unwrap();
    assert_eq!(promoted["id"], present["id"]);
    assert_eq!(promoted["status"], "processing");

    // The skipped ticket keeps its record.
    let response = server
        .client
        .get(server.url(&format!("/api/v1/tickets/{}", absent["id"])))
        .send()
        .await
        .unwrap();
    let skipped: Value = response.json().await.unwrap();
    assert_eq!(skipped["status"], "skipped");

    server.stop().await;
}

#[tokio::test]
async fn test_reassign_ticket() {
    let server = TestServer::start().await;

    let alice = server.create_worker("Alice", 1).await;
    let bob = server.create_worker("Bob", 2).await;
    let alice_id = alice["id"].as_i64().unwrap();
    let bob_id = bob["id"].as_i64().unwrap();

    let ticket = server.create_ticket("moved", alice_id).await;

    let response = server
        .client
        .put(server.url(&format!("/api/v1/tickets/{}/worker", ticket["id"])))
        .json(&json!({ "worker_id": bob_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let moved: Value = response.json().await.unwrap();
    assert_eq!(moved["worker_id"], bob_id);

    // Bob now serves it.
    let response = server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", bob_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let called: Value = response.json().await.unwrap();
    assert_eq!(called["id"], ticket["id"]);

    server.stop().await;
}

#[tokio::test]
async fn test_queue_position() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();

    server.create_ticket("first", worker_id).await;
    let second = server.create_ticket("second", worker_id).await;

    let response = server
        .client
        .get(server.url(&format!("/api/v1/tickets/{}/position", second["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["position"], 2);
    assert_eq!(body["status"], "waiting");

    server.stop().await;
}

#[tokio::test]
async fn test_lookup_by_contact() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();

    server.create_ticket("repeat", worker_id).await;
    let latest = server.create_ticket("repeat", worker_id).await;

    let response = server
        .client
        .post(server.url("/api/v1/tickets/lookup"))
        .json(&json!({ "contact": "repeat" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let found: Value = response.json().await.unwrap();
    assert_eq!(found["id"], latest["id"]);

    server.stop().await;
}

#[tokio::test]
async fn test_purge_ticket() {
    let server = TestServer::start().await;

    let worker = server.create_worker("Alice", 1).await;
    let worker_id = worker["id"].as_i64().unwrap();
    let ticket = server.create_ticket("gone", worker_id).await;

    let response = server
        .client
        .delete(server.url(&format!("/api/v1/tickets/{}/purge", ticket["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .get(server.url(&format!("/api/v1/tickets/{}", ticket["id"])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_roster_and_worker_tickets() {
    let server = TestServer::start().await;

    let alice = server.create_worker("Alice", 1).await;
    let alice_id = alice["id"].as_i64().unwrap();
    server.create_worker("Bob", 2).await;

    server.create_ticket("one", alice_id).await;
    server.create_ticket("two", alice_id).await;
    server
        .client
        .post(server.url(&format!("/api/v1/workers/{}/start", alice_id)))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/api/v1/workers"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let roster: Value = response.json().await.unwrap();
    let workers = roster["workers"].as_array().unwrap();
    assert_eq!(workers.len(), 2);

    let alice_entry = workers
        .iter()
        .find(|w| w["id"].as_i64() == Some(alice_id))
        .unwrap();
    assert_eq!(alice_entry["queue_length"], 1);
    assert!(alice_entry["current_ticket"].is_object());

    // Status filter on the worker's ticket list.
    let response = server
        .client
        .get(server.url(&format!(
            "/api/v1/workers/{}/tickets?status=processing",
            alice_id
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let tickets: Value = response.json().await.unwrap();
    assert_eq!(tickets.as_array().unwrap().len(), 1);

    let response = server
        .client
        .get(server.url(&format!(
            "/api/v1/workers/{}/tickets?status=bogus",
            alice_id
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_counter_returns_409() {
    let server = TestServer::start().await;

    server.create_worker("Alice", 7).await;

    let response = server
        .client
        .post(server.url("/api/v1/workers"))
        .json(&json!({ "display_name": "Impostor", "counter_number": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    server.stop().await;
}
