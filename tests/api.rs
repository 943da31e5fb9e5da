use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;

use protocol_seating::config::Config;
use protocol_seating::controllers;
use protocol_seating::storage::{DynStorage, MemoryStore};
use protocol_seating::AppState;

async fn spawn_app() -> String {
    let config = Config::from_lookup(|_| None).unwrap();
    let store: DynStorage = Arc::new(MemoryStore::new());
    let state = AppState::with_storage(config, store);
    let app = Router::new().nest("/api", controllers::routes()).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

async fn create_event(client: &reqwest::Client, base: &str) -> String {
    let res = client
        .post(format!("{base}/events"))
        .json(&json!({ "title": "Forum", "date": "2025-11-03T09:00:00Z", "location": "Seoul" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn add_guest(client: &reqwest::Client, base: &str, event: &str, name: &str, seat: Option<&str>) -> Value {
    let res = client
        .post(format!("{base}/events/{event}/guests"))
        .json(&json!({ "name": name, "seatNumber": seat }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    res.json().await.unwrap()
}

#[tokio::test]
async fn seat_conflict_returns_409_with_occupant() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &base).await;

    add_guest(&client, &base, &event, "홍길동", Some("A-1")).await;
    let kim = add_guest(&client, &base, &event, "김철수", None).await;
    let kim_id = kim["data"]["id"].as_str().unwrap();

    let res = client
        .patch(format!("{base}/events/{event}/guests/{kim_id}/seat"))
        .json(&json!({ "seatNumber": "A1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 409);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["conflict"]["occupantName"], "홍길동");
}

#[tokio::test]
async fn layout_reflects_assignments_and_rollback() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &base).await;

    let hong = add_guest(&client, &base, &event, "홍길동", None).await;
    let hong_id = hong["data"]["id"].as_str().unwrap();

    let res = client
        .patch(format!("{base}/events/{event}/guests/{hong_id}/seat"))
        .json(&json!({ "seatNumber": "B-2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let moved: Value = res.json().await.unwrap();
    assert_eq!(moved["persisted"], true);
    let entry = moved["entryId"].as_u64().unwrap();

    let layout: Value = client
        .get(format!("{base}/events/{event}/layout"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(layout["data"]["rowLabels"], json!(["B"]));
    assert_eq!(layout["data"]["rows"][0]["cells"][1]["guestId"], hong_id);

    let res = client
        .post(format!("{base}/events/{event}/commands/{entry}/rollback"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let layout: Value = client
        .get(format!("{base}/events/{event}/layout"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(layout["data"]["empty"], true);
}

#[tokio::test]
async fn csv_round_trip_through_import_and_export() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &base).await;

    let csv = "이름,소속,구분,좌석번호,상태\n홍길동,외교부,VIP,A-1,도착\n김철수,산업부,일반,,\n";
    let res = client
        .post(format!("{base}/events/{event}/guests/import?applyLayout=true"))
        .body(csv)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["imported"], 2);

    let res = client
        .get(format!("{base}/events/{event}/guests/export"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));
    let text = res.text().await.unwrap();
    assert!(text.contains("홍길동,외교부"));
    assert!(text.contains("도착"));

    let vip: Value = client
        .get(format!("{base}/events/{event}/guests?filter=vip"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(vip["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let base = spawn_app().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &base).await;

    let res = client
        .post(format!("{base}/events/{event}/guests"))
        .json(&json!({ "name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .post(format!("{base}/events/{event}/layout/manual"))
        .json(&json!({ "rows": 0, "cols": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .get(format!("{base}/events/missing/layout"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}
