mod common;

use acmeter::config::AddressRotation;
use acmeter::dashboard::{build_router, DashboardState};
use acmeter::state::Status;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{Fixture, PowerCall};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn router(fx: &Fixture) -> Router {
    build_router(DashboardState {
        shared: fx.shared.clone(),
        session: fx.session.clone(),
        tariff: fx.tariff,
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (fx, _controller) = Fixture::new(1, AddressRotation::Static);

    let response = router(&fx)
        .oneshot(request(Method::GET, "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "acmeter");
}

#[tokio::test]
async fn test_state_snapshot_as_json() {
    let (fx, mut controller) = Fixture::new(1, AddressRotation::Static);
    controller.tracker_mut().credit(42);
    controller.boot().await;

    let response = router(&fx)
        .oneshot(request(Method::GET, "/ac"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "OFF");
    assert_eq!(body["balance"], 42);
    assert_eq!(body["address"], "ADDR1");
    assert!(body["temperature"].is_null());
}

#[tokio::test]
async fn test_index_page_renders_state() {
    let (fx, mut controller) = Fixture::new(1, AddressRotation::Static);
    controller.boot().await;

    let response = router(&fx)
        .oneshot(request(Method::GET, "/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8_lossy(&bytes);
    assert!(page.contains("Status: <b>OFF</b>"));
    assert!(page.contains("ADDR1"));
    assert!(page.contains("action=\"/ac/toggle\""));
}

#[tokio::test]
async fn test_form_toggle_goes_through_session_and_redirects() {
    let (fx, mut controller) = Fixture::new(1, AddressRotation::Static);
    controller.tracker_mut().credit(5);
    let session_task = tokio::spawn(controller.run());

    let response = router(&fx)
        .oneshot(request(Method::POST, "/ac/toggle"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    assert_eq!(fx.shared.snapshot().status, Some(Status::On));
    assert_eq!(fx.shared.snapshot().balance, 4);
    assert_eq!(fx.appliance.calls(), vec![PowerCall::Off, PowerCall::On]);

    fx.session.shutdown().await.unwrap();
    session_task.await.unwrap();
}

#[tokio::test]
async fn test_api_toggle_reports_outcome_and_state() {
    let (fx, controller) = Fixture::new(1, AddressRotation::Static);
    let session_task = tokio::spawn(controller.run());

    let response = router(&fx)
        .oneshot(request(Method::POST, "/api/toggle"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["outcome"], "insufficient_credit");
    assert_eq!(body["state"]["status"], "OFF");
    assert_eq!(body["state"]["balance"], 0);

    fx.session.shutdown().await.unwrap();
    session_task.await.unwrap();
}

#[tokio::test]
async fn test_toggle_without_session_is_unavailable() {
    let (fx, controller) = Fixture::new(1, AddressRotation::Static);
    drop(controller);

    let response = router(&fx)
        .oneshot(request(Method::POST, "/api/toggle"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "session_unavailable");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (fx, _controller) = Fixture::new(1, AddressRotation::Static);

    let response = router(&fx)
        .oneshot(request(Method::GET, "/missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
