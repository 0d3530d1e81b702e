//! Threads publisher
//!
//! Threads exposes no public write API for personal accounts, so this
//! publisher logs in with a username and password against the Instagram
//! private API and then creates a text-only post. A login is performed on
//! every publish; tokens are never cached between requests.
//!
//! When a [`DeviceConfig`] is configured, requests carry a simulated device
//! fingerprint in the user agent and in the signed post body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::{
    DeviceConfig, ThreadsConfig, TimeoutConfig, THREADS_PASSWORD, THREADS_USERNAME,
};
use crate::error::{ConfigError, PlatformError, Result};
use crate::publishers::Publisher;
use crate::types::PublishReceipt;

const APP_ID: &str = "238260118697367";
const APP_VERSION: &str = "289.0.0.77.109";
const AUTH_HEADER: &str = "ig-set-authorization";

/// Threaded-post publisher
pub struct ThreadsPublisher {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<SecretString>,
    device: Option<DeviceConfig>,
}

/// An authenticated session for one publish
struct Session {
    authorization: String,
    user_id: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    status: Option<String>,
    message: Option<String>,
    logged_in_user: Option<LoggedInUser>,
}

#[derive(Deserialize)]
struct LoggedInUser {
    pk: serde_json::Value,
}

#[derive(Deserialize)]
struct ConfigureResponse {
    status: Option<String>,
    message: Option<String>,
    media: Option<Media>,
}

#[derive(Deserialize)]
struct Media {
    pk: Option<serde_json::Value>,
    id: Option<String>,
}

impl ThreadsPublisher {
    pub fn new(
        base_url: String,
        username: Option<String>,
        password: Option<SecretString>,
        device: Option<DeviceConfig>,
        timeouts: &TimeoutConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeouts.threads))
            .connect_timeout(timeouts.connect())
            .user_agent(user_agent(device.as_ref()))
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "threads".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            device,
        })
    }

    pub fn from_config(config: &ThreadsConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.username.clone(),
            config
                .password
                .as_ref()
                .map(|p| SecretString::new(p.expose_secret().into())),
            config.device.clone(),
            timeouts,
        )
    }

    fn credentials(&self) -> Result<(&str, &SecretString)> {
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField(THREADS_USERNAME.to_string()))?;
        let password = self
            .password
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField(THREADS_PASSWORD.to_string()))?;
        Ok((username, password))
    }

    fn request(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("x-ig-app-id", APP_ID)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn login(&self, username: &str, password: &SecretString) -> Result<Session> {
        let device_id = device_id(username);
        let response = self
            .request("/api/v1/accounts/login/")
            .form(&[
                ("username", username),
                ("password", password.expose_secret()),
                ("device_id", device_id.as_str()),
                ("login_attempt_count", "0"),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Threads login request failed: {}", e)))?;

        let status = response.status();
        let authorization = response
            .headers()
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PlatformError::RateLimit(format!("Threads login throttled: {}", body)).into());
        }
        if status.is_server_error() {
            return Err(PlatformError::Network(format!(
                "Threads login server error {}: {}",
                status.as_u16(),
                body
            ))
            .into());
        }

        let parsed: Option<LoginResponse> = serde_json::from_str(&body).ok();
        let user_id = parsed
            .as_ref()
            .filter(|r| status.is_success() && r.status.as_deref() == Some("ok"))
            .and_then(|r| r.logged_in_user.as_ref())
            .map(|u| id_string(&u.pk));

        match (authorization, user_id) {
            (Some(authorization), Some(user_id)) if !authorization.is_empty() => Ok(Session {
                authorization,
                user_id,
            }),
            _ => {
                let reason = parsed
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                Err(PlatformError::Authentication(format!(
                    "Threads login failed for {}: {}",
                    username, reason
                ))
                .into())
            }
        }
    }

    fn signed_body(&self, content: &str, session: &Session, username: &str) -> String {
        let mut payload = json!({
            "publish_mode": "text_post",
            "text_post_app_info": { "reply_control": 0 },
            "timezone_offset": "0",
            "source_type": "4",
            "_uid": session.user_id,
            "device_id": device_id(username),
            "caption": content,
            "upload_id": chrono::Utc::now().timestamp_millis().to_string(),
        });

        if let Some(device) = &self.device {
            payload["device"] = json!({
                "manufacturer": device.manufacturer,
                "model": device.model,
                "os_version": device.os_version,
                "os_release": device.os_release,
            });
        }

        format!("SIGNATURE.{}", payload)
    }
}

#[async_trait]
impl Publisher for ThreadsPublisher {
    fn name(&self) -> &str {
        "threads"
    }

    fn is_configured(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    async fn publish(&self, content: &str) -> Result<PublishReceipt> {
        let (username, password) = self.credentials()?;
        let session = self.login(username, password).await?;
        tracing::debug!(user_id = %session.user_id, "Threads session established");

        let response = self
            .request("/api/v1/media/configure_text_only_post/")
            .header(reqwest::header::AUTHORIZATION, &session.authorization)
            .form(&[("signed_body", self.signed_body(content, &session, username))])
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Threads post request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PlatformError::RateLimit(format!("Threads throttled post: {}", body)).into());
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PlatformError::Authentication(format!(
                "Threads rejected the session: {}",
                body
            ))
            .into());
        }

        let parsed = serde_json::from_str::<ConfigureResponse>(&body)
            .ok()
            .filter(|r| status.is_success() && r.status.as_deref() == Some("ok"));

        match parsed {
            Some(response) => {
                let remote_id = response
                    .media
                    .and_then(|m| m.id.or_else(|| m.pk.as_ref().map(id_string)));
                Ok(PublishReceipt::new(self.name(), remote_id))
            }
            None => {
                let reason = serde_json::from_str::<ConfigureResponse>(&body)
                    .ok()
                    .and_then(|r| r.message)
                    .unwrap_or(body);
                Err(PlatformError::Posting(format!(
                    "Threads returned {}: {}",
                    status.as_u16(),
                    reason
                ))
                .into())
            }
        }
    }
}

/// Stable per-account device identifier
fn device_id(username: &str) -> String {
    let digest = Sha256::digest(username.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("android-{}", hex)
}

fn user_agent(device: Option<&DeviceConfig>) -> String {
    match device {
        Some(device) => format!(
            "Barcelona {} Android ({}/{}; {}; {})",
            APP_VERSION, device.os_release, device.os_version, device.manufacturer, device.model
        ),
        None => format!("Barcelona {} Android", APP_VERSION),
    }
}

/// Instagram ids arrive as either JSON numbers or strings
fn id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
