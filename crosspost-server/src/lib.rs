//! HTTP surface for the crosspost relay
//!
//! Routes:
//!
//! - `POST /api/postToAll` (alias `POST /api/post`): store and publish one post
//! - `GET /api/rss`: RSS 2.0 feed of the most recent posts
//! - `GET /health`: which stages have credentials configured

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post};
use axum::Router;
use libcrosspost::publishers::mock::MockPublisher;
use libcrosspost::store::memory::MemoryStore;
use libcrosspost::{store, Config, Crossposter, FeedRenderer, Publishers, Result};
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub mod routes;
pub mod shutdown;

/// Slack added on top of the summed stage timeouts for the whole request
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Shared, immutable state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub crossposter: Crossposter,
    pub feed: Arc<FeedRenderer>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(crossposter: Crossposter, feed: FeedRenderer, request_timeout: Duration) -> Self {
        Self {
            crossposter,
            feed: Arc::new(feed),
            request_timeout,
        }
    }

    /// Wire the configured store and the real platform publishers
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = store::from_config(config).await?;
        let publishers = Publishers::from_config(config)?;
        Ok(Self::assemble(config, store, publishers))
    }

    /// In-memory store and always-succeeding publishers; nothing leaves the process
    pub fn dry_run(config: &Config) -> Self {
        let publishers = Publishers::new(
            Arc::new(MockPublisher::success("mastodon")),
            Arc::new(MockPublisher::success("twitter")),
            Arc::new(MockPublisher::success("threads")),
        );
        Self::assemble(config, Arc::new(MemoryStore::new()), publishers)
    }

    fn assemble(
        config: &Config,
        store: Arc<dyn libcrosspost::ContentStore>,
        publishers: Publishers,
    ) -> Self {
        let feed = FeedRenderer::new(store.clone(), config.feed.clone());
        let crossposter = Crossposter::new(store, publishers, config.timeouts);
        Self::new(crossposter, feed, request_timeout(config))
    }
}

/// Upper bound for one request: every stage at its limit, plus slack
pub fn request_timeout(config: &Config) -> Duration {
    let t = &config.timeouts;
    let secs = t
        .store
        .saturating_add(t.mastodon)
        .saturating_add(t.twitter)
        .saturating_add(t.threads);
    Duration::from_secs(secs).saturating_add(REQUEST_TIMEOUT_SLACK)
}

/// Build the application router
pub fn build_app(state: AppState) -> Router {
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(routes::panic_response))
        .layer(HandleErrorLayer::new(routes::middleware_error_response))
        .layer(TimeoutLayer::new(state.request_timeout));

    Router::new()
        .route("/api/postToAll", post(routes::publish_handler))
        .route("/api/post", post(routes::publish_handler))
        .route("/api/rss", get(routes::rss_handler))
        .route("/health", get(routes::health_handler))
        .layer(layers)
        .with_state(state)
}
