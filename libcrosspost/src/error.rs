//! Error types for Crosspost

use serde_json::{json, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosspostError {
    /// Returns the HTTP status code for this error
    ///
    /// Every failure maps to the 500 class; callers only ever see full
    /// success or the first failure.
    pub fn status_code(&self) -> u16 {
        500
    }

    /// Short machine-readable classification of the error
    pub fn kind(&self) -> &'static str {
        match self {
            CrosspostError::Config(_) => "configuration",
            CrosspostError::Store(_) => "store",
            CrosspostError::Platform(_) => "platform",
            CrosspostError::InvalidInput(_) => "validation",
        }
    }

    /// Diagnostic payload placed in the `details` field of failure responses
    pub fn details(&self) -> Value {
        let mut details = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });

        if let CrosspostError::Store(StoreError::UnexpectedStatus { status, body }) = self {
            details["status"] = json!(status);
            details["body"] = serde_json::from_str(body).unwrap_or_else(|_| json!(body));
        }

        details
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Store request failed: {0}")]
    Http(String),

    #[error("Store returned unexpected status {status}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to decode store response: {0}")]
    Decode(String),

    #[error("Store operation timed out after {0}s")]
    Timeout(u64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_is_a_server_error() {
        let errors = vec![
            CrosspostError::InvalidInput("empty".to_string()),
            ConfigError::MissingField("SUPABASE_URL".to_string()).into(),
            StoreError::Timeout(10).into(),
            PlatformError::Posting("boom".to_string()).into(),
        ];

        for error in errors {
            assert_eq!(error.status_code(), 500, "{error}");
        }
    }

    #[test]
    fn test_error_message_formatting_invalid_input() {
        let error = CrosspostError::InvalidInput("Content cannot be empty".to_string());
        assert_eq!(error.to_string(), "Invalid input: Content cannot be empty");
    }

    #[test]
    fn test_error_message_formatting_config() {
        let error: CrosspostError = ConfigError::MissingField("MASTODON_ACCESS_TOKEN".to_string()).into();
        assert_eq!(
            error.to_string(),
            "Configuration error: Missing required field: MASTODON_ACCESS_TOKEN"
        );
    }

    #[test]
    fn test_error_message_formatting_platform() {
        let error: CrosspostError =
            PlatformError::Authentication("Invalid token".to_string()).into();
        assert_eq!(error.to_string(), "Platform error: Authentication failed: Invalid token");
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(CrosspostError::InvalidInput("x".into()).kind(), "validation");
        assert_eq!(
            CrosspostError::from(ConfigError::MissingField("x".into())).kind(),
            "configuration"
        );
        assert_eq!(CrosspostError::from(StoreError::Http("x".into())).kind(), "store");
        assert_eq!(
            CrosspostError::from(PlatformError::Network("x".into())).kind(),
            "platform"
        );
    }

    #[test]
    fn test_details_for_unexpected_status_keeps_json_body() {
        let error: CrosspostError = StoreError::UnexpectedStatus {
            status: 409,
            body: r#"{"code":"23505"}"#.to_string(),
        }
        .into();

        let details = error.details();
        assert_eq!(details["kind"], "store");
        assert_eq!(details["status"], 409);
        assert_eq!(details["body"]["code"], "23505");
    }

    #[test]
    fn test_details_for_unexpected_status_keeps_text_body() {
        let error: CrosspostError = StoreError::UnexpectedStatus {
            status: 204,
            body: String::new(),
        }
        .into();

        let details = error.details();
        assert_eq!(details["status"], 204);
        assert_eq!(details["body"], "");
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();

        assert_eq!(original.to_string(), cloned.to_string());
    }
}
