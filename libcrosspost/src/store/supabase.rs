//! Supabase (PostgREST) store backend

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::{StoreConfig, TimeoutConfig, SUPABASE_KEY, SUPABASE_URL};
use crate::error::{ConfigError, Result, StoreError};
use crate::store::ContentStore;
use crate::types::Post;

pub struct SupabaseStore {
    client: Client,
    url: Option<String>,
    key: Option<SecretString>,
    table: String,
}

#[derive(Deserialize)]
struct PostRow {
    id: serde_json::Value,
    content: String,
    created_at: String,
}

impl SupabaseStore {
    pub fn new(
        url: Option<String>,
        key: Option<SecretString>,
        table: &str,
        timeouts: &TimeoutConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeouts.store))
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "store".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: url.map(|u| u.trim_end_matches('/').to_string()),
            key,
            table: table.to_string(),
        })
    }

    pub fn from_config(config: &StoreConfig, timeouts: &TimeoutConfig) -> Result<Self> {
        Self::new(
            config.supabase_url.clone(),
            config
                .supabase_key
                .as_ref()
                .map(|k| SecretString::new(k.expose_secret().into())),
            &config.table,
            timeouts,
        )
    }

    /// Request against the table endpoint with both auth headers set
    ///
    /// Fails with a configuration error before any I/O when the URL or key
    /// is missing.
    fn request(&self, method: reqwest::Method) -> Result<RequestBuilder> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField(SUPABASE_URL.to_string()))?;
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField(SUPABASE_KEY.to_string()))?
            .expose_secret();

        Ok(self
            .client
            .request(method, format!("{}/rest/v1/{}", url, self.table))
            .header("apikey", key)
            .bearer_auth(key))
    }
}

#[async_trait]
impl ContentStore for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    fn is_configured(&self) -> bool {
        self.url.is_some() && self.key.is_some()
    }

    async fn save(&self, content: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST)?
            .header("Prefer", "return=minimal")
            .json(&[serde_json::json!({ "content": content })])
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "Supabase rejected insert");
        Err(StoreError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        }
        .into())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Post>> {
        let limit = limit.to_string();
        let response = self
            .request(reqwest::Method::GET)?
            .query(&[
                ("select", "*"),
                ("order", "created_at.desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let rows: Vec<PostRow> =
            serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))?;

        rows.into_iter().map(PostRow::into_post).collect()
    }
}

impl PostRow {
    fn into_post(self) -> Result<Post> {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Post {
            id,
            content: self.content,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Parse a PostgREST timestamp
///
/// `timestamptz` columns carry an offset; plain `timestamp` columns do not
/// and are read as UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Decode(format!("invalid created_at {:?}: {}", value, e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrosspostError;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(url: Option<String>) -> SupabaseStore {
        SupabaseStore::new(
            url,
            Some(SecretString::new("service-key".into())),
            "posts",
            &TimeoutConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_sends_content_with_auth_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/posts"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .and(body_json(serde_json::json!([{ "content": "hello  world\n" }])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(Some(server.uri())).save("hello  world\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_save_accepts_200() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        assert!(store(Some(server.uri())).save("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_save_rejects_other_statuses_without_error_body() {
        for code in [204u16, 500] {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/rest/v1/posts"))
                .respond_with(ResponseTemplate::new(code))
                .mount(&server)
                .await;

            let result = store(Some(server.uri())).save("hello").await;
            match result {
                Err(CrosspostError::Store(StoreError::UnexpectedStatus { status, body })) => {
                    assert_eq!(status, code);
                    assert!(body.is_empty());
                }
                other => panic!("Expected unexpected status for {}, got {:?}", code, other),
            }
        }
    }

    #[tokio::test]
    async fn test_missing_url_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let store = store(None);
        assert!(!store.is_configured());

        let result = store.save("hello").await;
        assert!(matches!(
            result,
            Err(CrosspostError::Config(ConfigError::MissingField(ref field))) if field == SUPABASE_URL
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let store = SupabaseStore::new(
            Some("https://example.supabase.co".to_string()),
            None,
            "posts",
            &TimeoutConfig::default(),
        )
        .unwrap();

        let result = store.recent(10).await;
        assert!(matches!(
            result,
            Err(CrosspostError::Config(ConfigError::MissingField(ref field))) if field == SUPABASE_KEY
        ));
    }

    #[tokio::test]
    async fn test_recent_queries_newest_first() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .and(query_param("select", "*"))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": 2, "content": "second", "created_at": "2023-10-02T08:30:00.123456+00:00" },
                { "id": 1, "content": "first", "created_at": "2023-10-01T08:30:00" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let posts = store(Some(server.uri())).recent(10).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "2");
        assert_eq!(posts[0].content, "second");
        assert_eq!(
            posts[1].created_at,
            Utc.with_ymd_and_hms(2023, 10, 1, 8, 30, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_recent_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "Invalid API key"
            })))
            .mount(&server)
            .await;

        let result = store(Some(server.uri())).recent(10).await;
        assert!(matches!(
            result,
            Err(CrosspostError::Store(StoreError::UnexpectedStatus { status: 401, .. }))
        ));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
