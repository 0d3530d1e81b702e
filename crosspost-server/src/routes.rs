use std::any::Any;

use axum::extract::{FromRequest, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Form, Json};
use libcrosspost::feed;
use libcrosspost::PublishRequest;
use serde::Serialize;
use serde_json::json;

use crate::AppState;

/// Publish one post to the store and every platform
///
/// Accepts JSON bodies, and form-encoded bodies as sent by SMS webhooks.
pub async fn publish_handler(State(state): State<AppState>, request: Request) -> Response {
    let publish_request = match extract_publish_request(request).await {
        Ok(publish_request) => publish_request,
        Err(rejection) => return rejection,
    };

    let outcome = state.crossposter.handle(publish_request).await;
    let status = StatusCode::from_u16(outcome.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(outcome.into_body())).into_response()
}

async fn extract_publish_request(request: Request) -> Result<PublishRequest, Response> {
    if is_form(request.headers()) {
        Form::<PublishRequest>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .map_err(IntoResponse::into_response)
    } else {
        Json::<PublishRequest>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .map_err(IntoResponse::into_response)
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

pub async fn rss_handler(State(state): State<AppState>) -> Response {
    match state.feed.render().await {
        Ok(xml) => ([(header::CONTENT_TYPE, feed::CONTENT_TYPE)], xml).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to generate RSS feed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate RSS feed",
                    "details": e.details(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    platforms: PlatformHealth,
    store: bool,
}

#[derive(Serialize)]
pub struct PlatformHealth {
    mastodon: bool,
    twitter: bool,
    threads: bool,
}

/// Report which stages have credentials
///
/// Always 200: a missing credential fails requests, not the process.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let publishers = state.crossposter.publishers();

    Json(HealthResponse {
        status: "ok",
        platforms: PlatformHealth {
            mastodon: publishers.federated.is_configured(),
            twitter: publishers.mainstream.is_configured(),
            threads: publishers.threaded.is_configured(),
        },
        store: state.crossposter.store().is_configured(),
    })
}

/// Last-resort response for a panic escaping a handler
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %message, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": format!("An error occurred while processing your request: {}", message),
        })),
    )
        .into_response()
}

/// Failure response for errors raised by the middleware stack
///
/// The whole-request deadline surfaces here as `Elapsed`.
pub async fn middleware_error_response(err: BoxError) -> Response {
    let message = if err.is::<tower::timeout::error::Elapsed>() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };

    tracing::error!(error = %message, "Request aborted");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": format!("An error occurred while processing your request: {}", message),
        })),
    )
        .into_response()
}
