//! The HTTP adapter enriches products by `product_id`, in both processing modes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use conduit::config::{Config, SharedConfig};
use conduit::http::{router, AppState};
use conduit::stages::domain::ResponseProducts;
use tower::ServiceExt;

fn test_app() -> axum::Router {
    router(AppState {
        config: SharedConfig::new(Config::default()),
    })
}

fn request_body() -> &'static str {
    r#"{"products":[
        {"product_id":"p-1","name":"Widget"},
        {"product_id":"p-2","name":"Gadget"},
        {"product_id":"p-3","name":"Gizmo"}
    ]}"#
}

#[tokio::test]
async fn ping_returns_pong() {
    let response = test_app()
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"pong");
}

#[tokio::test]
async fn sequential_mode_enriches_every_submitted_product() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/products?mode=sequential")
                .header("content-type", "application/json")
                .body(Body::from(request_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: ResponseProducts = serde_json::from_slice(&body).unwrap();
    let ids: Vec<_> = parsed.products.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, vec!["p-1", "p-2", "p-3"]);
}

#[tokio::test]
async fn concurrent_mode_correlates_results_by_product_id() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/products?mode=concurrent")
                .header("content-type", "application/json")
                .body(Body::from(request_body()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: ResponseProducts = serde_json::from_slice(&body).unwrap();
    let ids: Vec<_> = parsed.products.iter().map(|p| p.product_id.as_str()).collect();
    assert_eq!(ids, vec!["p-1", "p-2", "p-3"]);
    assert!(parsed.products.iter().all(|p| p.availability == "In Stock"));
}

#[tokio::test]
async fn malformed_body_is_rejected_with_bad_request() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/products")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
