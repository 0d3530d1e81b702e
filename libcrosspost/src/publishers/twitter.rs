//! Twitter publisher
//!
//! Creates posts through the v2 `POST /2/tweets` endpoint, signing each
//! request with OAuth 1.0a user-context credentials.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{
    TimeoutConfig, TwitterConfig, TWITTER_ACCESS_TOKEN, TWITTER_ACCESS_TOKEN_SECRET,
    TWITTER_CONSUMER_KEY, TWITTER_CONSUMER_SECRET,
};
use crate::error::{ConfigError, PlatformError, Result};
use crate::publishers::oauth::{self, OAuthCredentials};
use crate::publishers::Publisher;
use crate::types::PublishReceipt;

/// OAuth 1.0a credential set for one account
pub struct TwitterCredentials {
    pub consumer_key: Option<SecretString>,
    pub consumer_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub access_token_secret: Option<SecretString>,
}

impl TwitterCredentials {
    fn is_complete(&self) -> bool {
        self.consumer_key.is_some()
            && self.consumer_secret.is_some()
            && self.access_token.is_some()
            && self.access_token_secret.is_some()
    }
}

/// Mainstream-network publisher
pub struct TwitterPublisher {
    client: Client,
    base_url: String,
    credentials: TwitterCredentials,
}

#[derive(Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: Option<TweetData>,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

impl TwitterPublisher {
    pub fn new(
        base_url: String,
        credentials: TwitterCredentials,
        timeouts: &TimeoutConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeouts.twitter))
            .connect_timeout(timeouts.connect())
            .user_agent(concat!("crosspost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "twitter".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &TwitterConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        let copy = |secret: &Option<SecretString>| {
            secret
                .as_ref()
                .map(|s| SecretString::new(s.expose_secret().into()))
        };

        Self::new(
            config.api_url.clone(),
            TwitterCredentials {
                consumer_key: copy(&config.consumer_key),
                consumer_secret: copy(&config.consumer_secret),
                access_token: copy(&config.access_token),
                access_token_secret: copy(&config.access_token_secret),
            },
            timeouts,
        )
    }

    fn signing_credentials(&self) -> Result<OAuthCredentials<'_>> {
        fn require<'a>(secret: &'a Option<SecretString>, name: &str) -> Result<&'a str> {
            secret
                .as_ref()
                .map(|s| s.expose_secret())
                .ok_or_else(|| ConfigError::MissingField(name.to_string()).into())
        }

        Ok(OAuthCredentials {
            consumer_key: require(&self.credentials.consumer_key, TWITTER_CONSUMER_KEY)?,
            consumer_secret: require(&self.credentials.consumer_secret, TWITTER_CONSUMER_SECRET)?,
            token: require(&self.credentials.access_token, TWITTER_ACCESS_TOKEN)?,
            token_secret: require(
                &self.credentials.access_token_secret,
                TWITTER_ACCESS_TOKEN_SECRET,
            )?,
        })
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn name(&self) -> &str {
        "twitter"
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_complete()
    }

    async fn publish(&self, content: &str) -> Result<PublishReceipt> {
        let credentials = self.signing_credentials()?;
        let url = format!("{}/2/tweets", self.base_url);

        let authorization = oauth::authorization_header(
            "POST",
            &url,
            &[],
            &credentials,
            &oauth::generate_nonce(),
            chrono::Utc::now().timestamp(),
        )?;

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&CreateTweetRequest { text: content })
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("Twitter request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => {
                return Err(PlatformError::Authentication(format!(
                    "Twitter rejected the OAuth signature: {}",
                    body
                ))
                .into())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(PlatformError::RateLimit(format!(
                    "Twitter rate limit exceeded: {}",
                    body
                ))
                .into())
            }
            s if s.is_server_error() => {
                return Err(PlatformError::Network(format!(
                    "Twitter server error {}: {}",
                    s.as_u16(),
                    body
                ))
                .into())
            }
            s if !s.is_success() => {
                return Err(PlatformError::Posting(format!(
                    "Twitter returned {}: {}",
                    s.as_u16(),
                    body
                ))
                .into())
            }
            _ => {}
        }

        let tweet_id = serde_json::from_str::<CreateTweetResponse>(&body)
            .ok()
            .and_then(|r| r.data)
            .map(|d| d.id)
            .ok_or_else(|| {
                PlatformError::Posting(format!("Unsuccessful request to Twitter: {}", body))
            })?;

        tracing::debug!(tweet_id = %tweet_id, "Twitter accepted post");

        Ok(PublishReceipt::new(self.name(), Some(tweet_id)))
    }
}
