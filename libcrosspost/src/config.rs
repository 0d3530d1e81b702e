//! Configuration management for Crosspost
//!
//! Non-secret settings (bind address, store backend, feed metadata, timeouts)
//! come from an optional TOML file. Platform and store credentials come from
//! the process environment and are held as [`SecretString`]s. Everything is
//! resolved once at startup into an immutable [`Config`].

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_KEY: &str = "SUPABASE_KEY";
pub const MASTODON_API_URL: &str = "MASTODON_API_URL";
pub const MASTODON_ACCESS_TOKEN: &str = "MASTODON_ACCESS_TOKEN";
pub const TWITTER_CONSUMER_KEY: &str = "TWITTER_CONSUMER_KEY";
pub const TWITTER_CONSUMER_SECRET: &str = "TWITTER_CONSUMER_SECRET";
pub const TWITTER_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
pub const TWITTER_ACCESS_TOKEN_SECRET: &str = "TWITTER_ACCESS_TOKEN_SECRET";
pub const THREADS_USERNAME: &str = "THREADS_USERNAME";
pub const THREADS_PASSWORD: &str = "THREADS_PASSWORD";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub mastodon: MastodonConfig,
    pub twitter: TwitterConfig,
    pub threads: ThreadsConfig,
    pub feed: FeedConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Supabase,
    Sqlite,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// SQLite database path, used when `backend = "sqlite"`
    pub path: String,
    /// Table the posts are written to
    pub table: String,
    #[serde(skip)]
    pub supabase_url: Option<String>,
    #[serde(skip)]
    pub supabase_key: Option<SecretString>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Supabase,
            path: "~/.local/share/crosspost/posts.db".to_string(),
            table: "posts".to_string(),
            supabase_url: None,
            supabase_key: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MastodonConfig {
    #[serde(skip)]
    pub api_url: Option<String>,
    #[serde(skip)]
    pub access_token: Option<SecretString>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub api_url: String,
    #[serde(skip)]
    pub consumer_key: Option<SecretString>,
    #[serde(skip)]
    pub consumer_secret: Option<SecretString>,
    #[serde(skip)]
    pub access_token: Option<SecretString>,
    #[serde(skip)]
    pub access_token_secret: Option<SecretString>,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.twitter.com".to_string(),
            consumer_key: None,
            consumer_secret: None,
            access_token: None,
            access_token_secret: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadsConfig {
    pub api_url: String,
    /// Simulated device fingerprint sent with every request, if set
    pub device: Option<DeviceConfig>,
    #[serde(skip)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<SecretString>,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://i.instagram.com".to_string(),
            device: None,
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub manufacturer: String,
    pub model: String,
    pub os_version: String,
    pub os_release: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub title: String,
    pub description: String,
    pub link: String,
    pub copyright: String,
    /// Item links are `{permalink_base}/{post id}`
    pub permalink_base: String,
    pub limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: "bnji-stream".to_string(),
            description: "a stream-of-thought via microstream api".to_string(),
            link: "https://bnji.org/api/rss".to_string(),
            copyright: "Copyright © 2023 bnjmn.org".to_string(),
            permalink_base: "https://bnji.org/posts".to_string(),
            limit: 10,
        }
    }
}

/// Per-stage timeouts, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub store: u64,
    pub mastodon: u64,
    pub twitter: u64,
    pub threads: u64,
    pub connect: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store: 10,
            mastodon: 60,
            twitter: 30,
            threads: 30,
            connect: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect)
    }
}

impl Config {
    /// Load configuration from the default location plus the environment
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load the file portion of the configuration from a specific path
    ///
    /// Credentials are not read from the file; call [`Config::apply_env`].
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Overlay credentials from the process environment
    pub fn apply_env(&mut self) {
        self.apply_lookup(|key| std::env::var(key).ok());
    }

    /// Overlay credentials using an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secret = |key: &str| var(key).map(|v| SecretString::new(v.into()));

        self.store.supabase_url = var(SUPABASE_URL);
        self.store.supabase_key = secret(SUPABASE_KEY);

        self.mastodon.api_url = var(MASTODON_API_URL);
        self.mastodon.access_token = secret(MASTODON_ACCESS_TOKEN);

        self.twitter.consumer_key = secret(TWITTER_CONSUMER_KEY);
        self.twitter.consumer_secret = secret(TWITTER_CONSUMER_SECRET);
        self.twitter.access_token = secret(TWITTER_ACCESS_TOKEN);
        self.twitter.access_token_secret = secret(TWITTER_ACCESS_TOKEN_SECRET);

        self.threads.username = var(THREADS_USERNAME);
        self.threads.password = secret(THREADS_PASSWORD);
    }

    /// Reject values that can never work regardless of credentials
    pub fn validate(&self) -> Result<()> {
        if self.feed.limit == 0 {
            return Err(ConfigError::Invalid {
                field: "feed.limit".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        let timeouts = [
            ("timeouts.store", self.timeouts.store),
            ("timeouts.mastodon", self.timeouts.mastodon),
            ("timeouts.twitter", self.timeouts.twitter),
            ("timeouts.threads", self.timeouts.threads),
        ];
        for (field, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    reason: "must be at least 1 second".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Names of the credentials that are absent, grouped by stage
    ///
    /// Used at startup to warn about stages that will fail every request.
    pub fn missing_credentials(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut missing = Vec::new();

        if self.store.backend == StoreBackend::Supabase {
            let mut store = Vec::new();
            if self.store.supabase_url.is_none() {
                store.push(SUPABASE_URL);
            }
            if self.store.supabase_key.is_none() {
                store.push(SUPABASE_KEY);
            }
            if !store.is_empty() {
                missing.push(("store", store));
            }
        }

        let mut mastodon = Vec::new();
        if self.mastodon.api_url.is_none() {
            mastodon.push(MASTODON_API_URL);
        }
        if self.mastodon.access_token.is_none() {
            mastodon.push(MASTODON_ACCESS_TOKEN);
        }
        if !mastodon.is_empty() {
            missing.push(("mastodon", mastodon));
        }

        let mut twitter = Vec::new();
        if self.twitter.consumer_key.is_none() {
            twitter.push(TWITTER_CONSUMER_KEY);
        }
        if self.twitter.consumer_secret.is_none() {
            twitter.push(TWITTER_CONSUMER_SECRET);
        }
        if self.twitter.access_token.is_none() {
            twitter.push(TWITTER_ACCESS_TOKEN);
        }
        if self.twitter.access_token_secret.is_none() {
            twitter.push(TWITTER_ACCESS_TOKEN_SECRET);
        }
        if !twitter.is_empty() {
            missing.push(("twitter", twitter));
        }

        let mut threads = Vec::new();
        if self.threads.username.is_none() {
            threads.push(THREADS_USERNAME);
        }
        if self.threads.password.is_none() {
            threads.push(THREADS_PASSWORD);
        }
        if !threads.is_empty() {
            missing.push(("threads", threads));
        }

        missing
    }
}

/// Resolve the configuration file path following XDG base directory conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosspost").join("config.toml"))
}
