//! Integration tests for the hover API.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use choropleth::config::AppConfig;
use choropleth::server::{create_router, AppState};
use choropleth::types::Region;
use geo::{polygon, MultiPolygon};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn square(id: &str, lon: f64, lat: f64, size: f64, value: f64) -> Region {
    let p = polygon![
        (x: lon, y: lat),
        (x: lon + size, y: lat),
        (x: lon + size, y: lat + size),
        (x: lon, y: lat + size),
    ];
    Region { id: id.to_string(), geometry: MultiPolygon::new(vec![p]), value }
}

fn create_test_app() -> Router {
    let config = AppConfig::from_toml("[input]\ngeometry = \"w.geojson\"\nvalues_csv = \"w.csv\"\n")
        .expect("Failed to parse config");
    let regions = vec![
        square("CHN", 73.0, 18.0, 35.0, 1_400_000_000.0),
        square("AUS", 113.0, -39.0, 28.0, 23_456_789.0),
        square("ATA", -180.0, -90.0, 27.0, 0.0),
    ];
    let state = AppState::new(&config, regions).expect("Failed to create app state");
    create_router(Arc::new(state), None)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn hovering(state: &Value) -> Vec<&str> {
    state["styles"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["bordered"] == json!(true))
        .map(|s| s["id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_legend_lists_buckets() {
    let app = create_test_app();
    let (status, json) = send(&app, "GET", "/api/legend", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Population");
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["label"], "< 100 M");
    assert_eq!(entries[0]["color"], "#f8caee");
    assert_eq!(entries[1]["lower"], json!(100_000_000.0));
    assert_eq!(entries[2]["upper"], Value::Null);
}

#[tokio::test]
async fn test_query_by_point() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/api/query?lat=35&lon=100", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "CHN");
    assert_eq!(json["bucket"], 2);
    assert_eq!(json["label"], "> 500 M");

    let (_, json) = send(&app, "GET", "/api/query?lat=0&lon=-30", None).await;
    assert_eq!(json, Value::Null);
}

#[tokio::test]
async fn test_region_by_id() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/api/regions/ATA", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bucket"], 0);
    assert_eq!(json["value"], json!(0.0));

    let (status, json) = send(&app, "GET", "/api/regions/XXX", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("XXX"));
}

#[tokio::test]
async fn test_initial_state_is_idle() {
    let app = create_test_app();
    let (status, json) = send(&app, "GET", "/api/state", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "idle");
    assert_eq!(json["hovered"], Value::Null);
    assert_eq!(json["tooltip"]["opacity"], json!(0.0));
    assert_eq!(json["annotation"]["opacity"], json!(1.0));
    assert!(hovering(&json).is_empty());
}

#[tokio::test]
async fn test_hover_cycle() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/api/hover",
        Some(json!({"lon": 130.0, "lat": -25.0, "page_x": 420.0, "page_y": 300.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "hovering");
    assert_eq!(json["hovered"], "AUS");
    assert_eq!(json["tooltip"]["content"], "AUS: 23,000,000");
    assert_eq!(json["tooltip"]["top"], json!(272.0));
    assert_eq!(json["annotation"]["opacity"], json!(0.0));
    assert_eq!(hovering(&json), vec!["AUS"]);

    // Moving onto another region replaces the highlight
    let (_, json) = send(&app, "POST", "/api/hover/CHN", Some(json!({}))).await;
    assert_eq!(json["hovered"], "CHN");
    assert_eq!(hovering(&json), vec!["CHN"]);

    // Moving over open sea leaves
    let (_, json) = send(&app, "POST", "/api/hover", Some(json!({"lon": -30.0, "lat": 0.0}))).await;
    assert_eq!(json["state"], "idle");
    assert!(hovering(&json).is_empty());
    assert_eq!(json["annotation"]["opacity"], json!(1.0));
}

#[tokio::test]
async fn test_leave_resets_styles() {
    let app = create_test_app();
    send(&app, "POST", "/api/hover/ATA", Some(json!({"page_x": 1.0, "page_y": 2.0}))).await;

    let (status, json) = send(&app, "POST", "/api/leave", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "idle");
    for style in json["styles"].as_array().unwrap() {
        assert_eq!(style["opacity"], json!(0.7));
    }
    assert_eq!(json["tooltip"]["opacity"], json!(0.0));
}

#[tokio::test]
async fn test_hover_unknown_region_is_not_found() {
    let app = create_test_app();
    let (status, _) = send(&app, "POST", "/api/hover/XXX", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&app, "GET", "/api/state", None).await;
    assert_eq!(json["state"], "idle");
}
