//! Platform publishers
//!
//! Each external platform sits behind the same [`Publisher`] contract so the
//! crossposter never needs to know which client library or signing strategy
//! is in use. Concrete strategies:
//!
//! - [`mastodon::MastodonPublisher`]: federated network, via megalodon
//! - [`twitter::TwitterPublisher`]: mainstream network, OAuth 1.0a signed v2 API
//! - [`threads::ThreadsPublisher`]: threaded-post service, username/password login
//!
//! # Examples
//!
//! ```no_run
//! use libcrosspost::publishers::Publisher;
//!
//! # async fn example(publisher: &dyn Publisher) -> libcrosspost::Result<()> {
//! if publisher.is_configured() {
//!     let receipt = publisher.publish("Hello from the relay").await?;
//!     println!("{} accepted the post: {:?}", receipt.platform, receipt.remote_id);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::types::{PublishReceipt, Stage};

pub mod mastodon;
pub mod oauth;
pub mod threads;
pub mod twitter;

// Available outside of tests so integration tests and the server crate can use it
pub mod mock;

/// Uniform publish contract for one external platform
///
/// Implementations check that their credentials are present on every call,
/// before any network I/O, and fail with a configuration error otherwise.
/// They never retry and never alter the content.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase platform identifier (e.g. "mastodon")
    fn name(&self) -> &str;

    /// Whether every credential this publisher needs is present
    fn is_configured(&self) -> bool;

    /// Publish `content` verbatim
    ///
    /// # Errors
    ///
    /// - `CrosspostError::Config` if a required credential is missing
    /// - `CrosspostError::Platform` if the remote call fails or returns no
    ///   confirmable success
    async fn publish(&self, content: &str) -> Result<PublishReceipt>;
}

/// The three publisher roles, in the order they are invoked
#[derive(Clone)]
pub struct Publishers {
    pub federated: Arc<dyn Publisher>,
    pub mainstream: Arc<dyn Publisher>,
    pub threaded: Arc<dyn Publisher>,
}

impl Publishers {
    pub fn new(
        federated: Arc<dyn Publisher>,
        mainstream: Arc<dyn Publisher>,
        threaded: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            federated,
            mainstream,
            threaded,
        }
    }

    /// Build the production strategies from configuration
    ///
    /// Construction never touches the network and succeeds even when
    /// credentials are missing; those stages fail per request instead.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeouts = config.timeouts;

        Ok(Self {
            federated: Arc::new(mastodon::MastodonPublisher::from_config(&config.mastodon)),
            mainstream: Arc::new(twitter::TwitterPublisher::from_config(
                &config.twitter,
                &timeouts,
            )?),
            threaded: Arc::new(threads::ThreadsPublisher::from_config(
                &config.threads,
                &timeouts,
            )?),
        })
    }

    /// Publishers paired with their stage, in invocation order
    pub fn in_order(&self) -> [(Stage, &Arc<dyn Publisher>); 3] {
        [
            (Stage::Federated, &self.federated),
            (Stage::Mainstream, &self.mainstream),
            (Stage::Threaded, &self.threaded),
        ]
    }
}
