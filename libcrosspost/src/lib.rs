//! Crosspost - write once, publish everywhere
//!
//! This library stores a short text post and republishes it to Mastodon,
//! Twitter and Threads in a fixed order, failing fast on the first error.
//! It also renders the most recent stored posts as an RSS 2.0 feed.

pub mod config;
pub mod crossposter;
pub mod error;
pub mod feed;
pub mod logging;
pub mod publishers;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use crossposter::{Crossposter, PublishOutcome, StageFailure};
pub use error::{CrosspostError, Result};
pub use feed::FeedRenderer;
pub use publishers::{Publisher, Publishers};
pub use store::ContentStore;
pub use types::{Post, PublishReceipt, PublishRequest, Stage};
