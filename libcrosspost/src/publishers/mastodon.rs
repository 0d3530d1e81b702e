//! Mastodon publisher
//!
//! Posts statuses to Mastodon and other Fediverse servers that implement the
//! Mastodon API, using the megalodon client library.

use async_trait::async_trait;
use megalodon::SNS;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{MastodonConfig, MASTODON_ACCESS_TOKEN, MASTODON_API_URL};
use crate::error::{ConfigError, PlatformError, Result};
use crate::publishers::Publisher;
use crate::types::PublishReceipt;

const USER_AGENT: &str = concat!("crosspost/", env!("CARGO_PKG_VERSION"));

/// Federated-network publisher
///
/// Credentials are checked on every publish; the megalodon client is built
/// per call since construction is local and cheap.
pub struct MastodonPublisher {
    instance_url: Option<String>,
    access_token: Option<SecretString>,
}

impl MastodonPublisher {
    pub fn new(instance_url: Option<String>, access_token: Option<SecretString>) -> Self {
        Self {
            instance_url: instance_url.map(|url| normalize_instance_url(&url)),
            access_token,
        }
    }

    pub fn from_config(config: &MastodonConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            config
                .access_token
                .as_ref()
                .map(|token| SecretString::new(token.expose_secret().into())),
        )
    }

    pub fn instance_url(&self) -> Option<&str> {
        self.instance_url.as_deref()
    }

    fn credentials(&self) -> Result<(&str, &SecretString)> {
        let url = self
            .instance_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField(MASTODON_API_URL.to_string()))?;
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField(MASTODON_ACCESS_TOKEN.to_string()))?;
        Ok((url, token))
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    fn name(&self) -> &str {
        "mastodon"
    }

    fn is_configured(&self) -> bool {
        self.instance_url.is_some() && self.access_token.is_some()
    }

    async fn publish(&self, content: &str) -> Result<PublishReceipt> {
        let (instance_url, token) = self.credentials()?;

        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.to_string(),
            Some(token.expose_secret().to_string()),
            Some(USER_AGENT.to_string()),
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        let response = client
            .post_status(content.to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let status_id = match response.json {
            megalodon::megalodon::PostStatusOutput::Status(status) => status.id,
            megalodon::megalodon::PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        tracing::debug!(status_id = %status_id, "Mastodon accepted status");

        Ok(PublishReceipt::new(self.name(), Some(status_id)))
    }
}

/// Reduce a configured API URL to the instance base URL megalodon expects
///
/// Accepts bare hosts (`mastodon.social`), base URLs, and API URLs in the
/// `https://host/api/v1/` form.
pub fn normalize_instance_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix("/api/v1")
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Map megalodon errors to PlatformError
///
/// Errors that carry an HTTP status are classified on that status:
///
/// - 401/403 → `Authentication`
/// - 422 → `Validation`
/// - 429 → `RateLimit`
/// - 5xx and anything else → `Network`
///
/// Transport and parse failures have no status and fall back to the
/// message text.
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    match &error {
        megalodon::error::Error::OwnError(own) => match own.status {
            Some(status) => classify_status(status, &own.message, context),
            None => classify_error(&error.to_string(), context),
        },
        megalodon::error::Error::RequestError(e) => match e.status() {
            Some(status) => classify_status(status.as_u16(), &e.to_string(), context),
            None if e.is_decode() => PlatformError::Posting(format!(
                "Mastodon response parse error ({}): {}",
                context, e
            )),
            None => classify_error(&e.to_string(), context),
        },
        megalodon::error::Error::JsonError(e) => PlatformError::Posting(format!(
            "Mastodon response parse error ({}): {}",
            context, e
        )),
        _ => classify_error(&error.to_string(), context),
    }
}

fn classify_status(status: u16, message: &str, context: &str) -> PlatformError {
    match status {
        401 | 403 => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): HTTP {}: {}. \
             Suggestion: Verify MASTODON_ACCESS_TOKEN is valid and has the write:statuses scope.",
            context, status, message
        )),
        422 => PlatformError::Validation(format!(
            "Mastodon validation failed ({}): HTTP {}: {}",
            context, status, message
        )),
        429 => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): HTTP {}: {}",
            context, status, message
        )),
        500..=599 => PlatformError::Network(format!(
            "Mastodon server error ({}): HTTP {}: {}",
            context, status, message
        )),
        _ => PlatformError::Network(format!(
            "Mastodon HTTP error ({}): HTTP {}: {}",
            context, status, message
        )),
    }
}

/// Classify an error that carries no HTTP status by its message
fn classify_error(error_str: &str, context: &str) -> PlatformError {
    if let Some(status) = extract_http_status(error_str) {
        return classify_status(status, error_str, context);
    }

    let error_lower = error_str.to_lowercase();
    if error_lower.contains("unauthorized") || error_lower.contains("forbidden") {
        PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("parse")
        || error_lower.contains("json")
        || error_lower.contains("deserialize")
    {
        PlatformError::Posting(format!(
            "Mastodon response parse error ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("rate limit") || error_lower.contains("too many requests") {
        PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        ))
    } else {
        PlatformError::Network(format!(
            "Mastodon error ({}): {}. \
             Suggestion: Check MASTODON_API_URL and the instance's availability.",
            context, error_str
        ))
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for `HTTP 401`, `status 403`, `code: 429` and bare `422:` forms.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix.get(0..3).and_then(|s| s.parse::<u16>().ok()) {
                let terminated = after_prefix
                    .as_bytes()
                    .get(3)
                    .map_or(true, |b| !b.is_ascii_digit());
                if terminated && (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        let is_code = window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ');
        let standalone = i == 0 || !bytes[i - 1].is_ascii_digit();
        if is_code && standalone {
            if let Some(code) = std::str::from_utf8(&window[..3])
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
            {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    None
}
