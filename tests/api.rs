mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{harness, Harness};
use seat_inventory::{app, config::Config, AppState};

fn router(h: &Harness) -> Router {
    app(AppState::with_inventory(h.service.clone(), Config::local()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_responds() {
    let h = harness();
    let app = router(&h);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn seat_map_generates_on_first_read() {
    let h = harness();
    let app = router(&h);

    let (status, body) = send(&app, "GET", &format!("/api/sessions/{}/seats", h.session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counts"]["available"], 18);
    assert_eq!(body["rows"][1]["label"], "B");
    assert_eq!(body["rows"][1]["seats"][0]["seat_type"], "WHEELCHAIR");
}

#[tokio::test]
async fn unknown_session_is_404() {
    let h = harness();
    let app = router(&h);

    let (status, body) = send(&app, "GET", &format!("/api/sessions/{}/seats", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn second_buyer_gets_conflict_with_lost_seats() {
    let h = harness();
    let app = router(&h);
    let carts_uri = format!("/api/sessions/{}/carts", h.session_id);

    let (status, first) = send(&app, "POST", &carts_uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, second) = send(&app, "POST", &carts_uri, Some(json!({}))).await;
    let first_id = first["id"].as_str().unwrap().to_string();
    let second_id = second["id"].as_str().unwrap().to_string();

    // holds need seats; the map read creates them
    send(&app, "GET", &format!("/api/sessions/{}/seats", h.session_id), None).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/carts/{}/holds", first_id),
        Some(json!({ "seat_ids": ["A1", "A2"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["held_seat_ids"], json!(["A1", "A2"]));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/carts/{}/holds", second_id),
        Some(json!({ "seat_ids": ["A2", "A3"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Some of your seats were just taken, please reselect");
    assert_eq!(body["seat_ids"], json!(["A2"]));
}

#[tokio::test]
async fn empty_hold_request_is_400() {
    let h = harness();
    let app = router(&h);

    let (_, cart) = send(&app, "POST", &format!("/api/sessions/{}/carts", h.session_id), Some(json!({}))).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/carts/{}/holds", cart["id"].as_str().unwrap()),
        Some(json!({ "seat_ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn purchase_then_regenerate_conflicts() {
    let h = harness();
    let app = router(&h);
    send(&app, "GET", &format!("/api/sessions/{}/seats", h.session_id), None).await;

    let (_, cart) = send(&app, "POST", &format!("/api/sessions/{}/carts", h.session_id), Some(json!({}))).await;
    let cart_id = cart["id"].as_str().unwrap();
    send(&app, "POST", &format!("/api/carts/{}/holds", cart_id), Some(json!({ "seat_ids": ["B5"] }))).await;

    let (status, body) = send(&app, "POST", &format!("/api/carts/{}/purchase", cart_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sold_seat_ids"], json!(["B5"]));

    let (status, _) = send(&app, "POST", &format!("/api/sessions/{}/seats/regenerate", h.session_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn queue_endpoints_issue_and_admit() {
    let h = harness();
    let app = router(&h);

    let (status, first) = send(&app, "POST", "/api/queue/scopes/premiere", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["queue_number"], 1);
    let (_, second) = send(&app, "POST", "/api/queue/scopes/premiere", Some(json!({}))).await;
    assert_eq!(second["queue_number"], 2);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/queue/entries/{}", second["entry_id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ahead"], 1);

    let (status, body) = send(&app, "POST", "/api/queue/scopes/premiere/admit", Some(json!({ "capacity": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["admitted"][0]["queue_number"], 1);
    assert_eq!(body["admitted"][0]["status"], "ADMITTED");

    let (status, _) = send(&app, "POST", "/api/queue/scopes/premiere/admit", Some(json!({ "capacity": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scope_named_entries_is_just_a_scope() {
    let h = harness();
    let app = router(&h);

    let (status, ticket) = send(&app, "POST", "/api/queue/scopes/entries", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ticket["queue_number"], 1);

    let entry_uri = format!("/api/queue/entries/{}", ticket["entry_id"].as_str().unwrap());
    let (status, body) = send(&app, "GET", &entry_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["scope_key"], "entries");

    // not admitted yet
    let (status, body) = send(&app, "POST", &format!("{}/complete", entry_uri), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, "POST", "/api/queue/scopes/entries/admit", Some(json!({ "capacity": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "POST", &format!("{}/complete", entry_uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DONE");
}

#[tokio::test]
async fn reclaim_endpoint_reports_released_seats() {
    let h = harness();
    let app = router(&h);
    send(&app, "GET", &format!("/api/sessions/{}/seats", h.session_id), None).await;
    let (_, cart) = send(&app, "POST", &format!("/api/sessions/{}/carts", h.session_id), Some(json!({}))).await;
    send(
        &app,
        "POST",
        &format!("/api/carts/{}/holds", cart["id"].as_str().unwrap()),
        Some(json!({ "seat_ids": ["A9"], "ttl_minutes": 1 })),
    )
    .await;

    h.clock.advance(chrono::Duration::minutes(2));
    let (status, body) = send(&app, "POST", "/api/reclaim", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released"][0]["seat_id"], "A9");
    assert_eq!(body["expired_carts"], 1);
}
