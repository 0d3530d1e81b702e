//! Core types for Crosspost

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CrosspostError, Result};

/// A persisted post, as read back from the store
///
/// `id` and `created_at` are assigned by the store at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Inbound publish request body
///
/// `Body` is accepted for webhook-style callers (SMS gateways post the
/// message text in a field of that name); browser clients send `text`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl PublishRequest {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            body: None,
            text: Some(text.into()),
        }
    }

    /// Pick the content to publish
    ///
    /// A `Body` with visible content wins; a blank or missing `Body` falls
    /// back to `text`. The chosen value is returned verbatim.
    pub fn extract_content(&self) -> Result<String> {
        [self.body.as_deref(), self.text.as_deref()]
            .into_iter()
            .flatten()
            .find(|candidate| !candidate.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                CrosspostError::InvalidInput(
                    "request must contain a non-empty `Body` or `text` field".to_string(),
                )
            })
    }
}

/// A platform's acknowledgement of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub platform: String,
    /// Remote identifier of the created post, when the platform returns one
    pub remote_id: Option<String>,
}

impl PublishReceipt {
    pub fn new(platform: impl Into<String>, remote_id: Option<String>) -> Self {
        Self {
            platform: platform.into(),
            remote_id,
        }
    }
}

/// One unit of work in the publish sequence, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Store,
    Federated,
    Mainstream,
    Threaded,
}

impl Stage {
    /// Message reported as `error` when this stage fails
    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::Store => "Error inserting into database",
            Stage::Federated => "Error posting to Mastodon",
            Stage::Mainstream => "Error posting to Twitter",
            Stage::Threaded => "Error posting to Threads",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Store => write!(f, "store"),
            Stage::Federated => write!(f, "federated"),
            Stage::Mainstream => write!(f, "mainstream"),
            Stage::Threaded => write!(f, "threaded"),
        }
    }
}
