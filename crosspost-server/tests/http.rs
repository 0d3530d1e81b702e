//! Router tests driven through `tower::ServiceExt::oneshot`

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use crosspost_server::{build_app, AppState};
use libcrosspost::config::{FeedConfig, TimeoutConfig};
use libcrosspost::error::PlatformError;
use libcrosspost::publishers::mock::MockPublisher;
use libcrosspost::store::memory::MemoryStore;
use libcrosspost::{Crossposter, FeedRenderer, Post, Publishers};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    store: MemoryStore,
    mastodon: MockPublisher,
    twitter: MockPublisher,
    threads: MockPublisher,
}

impl TestApp {
    fn new() -> Self {
        Self::with(
            MemoryStore::new(),
            MockPublisher::success("mastodon"),
            MockPublisher::success("twitter"),
            MockPublisher::success("threads"),
        )
    }

    fn with(
        store: MemoryStore,
        mastodon: MockPublisher,
        twitter: MockPublisher,
        threads: MockPublisher,
    ) -> Self {
        Self {
            store,
            mastodon,
            twitter,
            threads,
        }
    }

    fn router(&self) -> Router {
        self.router_with_deadline(Duration::from_secs(30))
    }

    fn router_with_deadline(&self, request_timeout: Duration) -> Router {
        let store: Arc<dyn libcrosspost::ContentStore> = Arc::new(self.store.clone());
        let publishers = Publishers::new(
            Arc::new(self.mastodon.clone()),
            Arc::new(self.twitter.clone()),
            Arc::new(self.threads.clone()),
        );
        let crossposter = Crossposter::new(store.clone(), publishers, TimeoutConfig::default());
        let feed = FeedRenderer::new(store, FeedConfig::default());

        build_app(AppState::new(crossposter, feed, request_timeout))
    }
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_post_to_all_success() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_post("/api/postToAll", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "Posted to Mastodon, Twitter, Threads, and stored in DB successfully." })
    );
    assert_eq!(app.store.posts()[0].content, "hello");
    assert_eq!(app.threads.published_content(), vec!["hello"]);
}

#[tokio::test]
async fn test_post_alias_route() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_post("/api/post", json!({ "Body": "via alias" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.mastodon.published_content(), vec!["via alias"]);
}

#[tokio::test]
async fn test_form_encoded_sms_webhook() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("POST")
        .uri("/api/postToAll")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("From=%2B15551234567&Body=sent+from+my+phone"))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.posts()[0].content, "sent from my phone");
}

#[tokio::test]
async fn test_store_failure_returns_500_and_skips_platforms() {
    let app = TestApp::with(
        MemoryStore::failing("database is locked"),
        MockPublisher::success("mastodon"),
        MockPublisher::success("twitter"),
        MockPublisher::success("threads"),
    );

    let response = app
        .router()
        .oneshot(json_post("/api/postToAll", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Error inserting into database");
    assert_eq!(body["details"]["kind"], "store");
    assert_eq!(app.mastodon.publish_call_count(), 0);
}

#[tokio::test]
async fn test_platform_failure_returns_500_with_stage() {
    let app = TestApp::with(
        MemoryStore::new(),
        MockPublisher::success("mastodon"),
        MockPublisher::failure("twitter", PlatformError::RateLimit("slow down".to_string())),
        MockPublisher::success("threads"),
    );

    let response = app
        .router()
        .oneshot(json_post("/api/postToAll", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Error posting to Twitter");
    assert!(body.get("message").is_none());
    assert_eq!(app.threads.publish_call_count(), 0);
}

#[tokio::test]
async fn test_empty_text_is_rejected_with_500() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_post("/api/postToAll", json!({ "text": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid input: "));
    assert_eq!(app.store.save_call_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_client_error() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("POST")
        .uri("/api/postToAll")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(app.store.save_call_count(), 0);
}

#[tokio::test]
async fn test_panicking_publisher_is_caught() {
    let app = TestApp::with(
        MemoryStore::new(),
        MockPublisher::panicking("mastodon", "client exploded"),
        MockPublisher::success("twitter"),
        MockPublisher::success("threads"),
    );

    let response = app
        .router()
        .oneshot(json_post("/api/postToAll", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "An error occurred while processing your request: client exploded" })
    );
}

#[tokio::test]
async fn test_request_deadline_returns_500_json() {
    let app = TestApp::with(
        MemoryStore::new(),
        MockPublisher::success("mastodon").with_delay(Duration::from_secs(5)),
        MockPublisher::success("twitter"),
        MockPublisher::success("threads"),
    );

    let response = app
        .router_with_deadline(Duration::from_millis(100))
        .oneshot(json_post("/api/postToAll", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "An error occurred while processing your request: request timed out" })
    );
    assert_eq!(app.store.save_call_count(), 1);
    assert_eq!(app.twitter.publish_call_count(), 0);
}

#[tokio::test]
async fn test_rss_feed() {
    let app = TestApp::new();
    let base = Utc.with_ymd_and_hms(2023, 10, 1, 12, 0, 0).unwrap();
    for i in 0..12 {
        app.store.insert(Post {
            id: format!("id-{}", i),
            content: format!("post {} https://example.com/{}.", i, i),
            created_at: base + chrono::Duration::hours(i),
        });
    }

    let request = Request::builder().uri("/api/rss").body(Body::empty()).unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/rss+xml"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(xml.matches("<item>").count(), 10);
    assert!(xml.contains("<title>bnji-stream</title>"));
    assert!(xml.contains("https://bnji.org/posts/id-11"));
    assert!(!xml.contains("https://bnji.org/posts/id-1<"));
    assert!(xml.find("id-11").unwrap() < xml.find("id-10").unwrap());
}

#[tokio::test]
async fn test_rss_store_error() {
    let app = TestApp::with(
        MemoryStore::failing("connection refused"),
        MockPublisher::success("mastodon"),
        MockPublisher::success("twitter"),
        MockPublisher::success("threads"),
    );

    let request = Request::builder().uri("/api/rss").body(Body::empty()).unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to generate RSS feed");
    assert!(body["details"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn test_health_reports_configuration() {
    let app = TestApp::with(
        MemoryStore::new(),
        MockPublisher::success("mastodon"),
        MockPublisher::not_configured("twitter"),
        MockPublisher::success("threads"),
    );

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "status": "ok",
            "platforms": { "mastodon": true, "twitter": false, "threads": true },
            "store": true
        })
    );
}
