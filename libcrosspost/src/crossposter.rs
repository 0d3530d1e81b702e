//! Publish orchestration
//!
//! One request drives one piece of content through the store and then each
//! publisher in fixed order: federated, mainstream, threaded. The first
//! failing stage ends the request. Nothing is retried and nothing is rolled
//! back, so a failure at a later stage leaves earlier stages' effects in
//! place (the post stays stored, and may already be live on some platforms).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::TimeoutConfig;
use crate::error::{CrosspostError, PlatformError, Result, StoreError};
use crate::publishers::Publishers;
use crate::store::ContentStore;
use crate::types::{PublishRequest, Stage};

pub const SUCCESS_MESSAGE: &str =
    "Posted to Mastodon, Twitter, Threads, and stored in DB successfully.";

/// The stage that ended a request and why
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: CrosspostError,
}

/// Aggregate result of one publish request
#[derive(Debug)]
pub enum PublishOutcome {
    /// Every stage succeeded
    Published { message: String },
    /// A stage failed; later stages were not attempted
    Failed(StageFailure),
    /// The request carried no usable content; no stage ran
    Rejected(CrosspostError),
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }

    pub fn status_code(&self) -> u16 {
        match self {
            PublishOutcome::Published { .. } => 200,
            PublishOutcome::Failed(failure) => failure.error.status_code(),
            PublishOutcome::Rejected(error) => error.status_code(),
        }
    }

    /// JSON response body: `{message}` on success, `{error, details}` otherwise
    pub fn into_body(self) -> Value {
        match self {
            PublishOutcome::Published { message } => json!({ "message": message }),
            PublishOutcome::Failed(StageFailure { stage, error }) => json!({
                "error": stage.failure_message(),
                "details": error.details(),
            }),
            PublishOutcome::Rejected(error) => json!({
                "error": error.to_string(),
                "details": error.details(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct Crossposter {
    store: Arc<dyn ContentStore>,
    publishers: Publishers,
    timeouts: TimeoutConfig,
}

impl Crossposter {
    pub fn new(
        store: Arc<dyn ContentStore>,
        publishers: Publishers,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            store,
            publishers,
            timeouts,
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn publishers(&self) -> &Publishers {
        &self.publishers
    }

    /// Store and publish the content of `request`
    pub async fn handle(&self, request: PublishRequest) -> PublishOutcome {
        let content = match request.extract_content() {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "Rejected publish request");
                return PublishOutcome::Rejected(e);
            }
        };

        match self.run(&content).await {
            Ok(()) => {
                info!("Post delivered to every stage");
                PublishOutcome::Published {
                    message: SUCCESS_MESSAGE.to_string(),
                }
            }
            Err(failure) => PublishOutcome::Failed(failure),
        }
    }

    async fn run(&self, content: &str) -> std::result::Result<(), StageFailure> {
        let store_timeout = self.timeouts.store;
        self.stage(Stage::Store, store_timeout, async {
            self.store.save(content).await?;
            Ok::<_, CrosspostError>(format!("saved to {}", self.store.name()))
        })
        .await?;

        for (stage, publisher) in self.publishers.in_order() {
            let secs = stage_timeout(&self.timeouts, stage);
            self.stage(stage, secs, async {
                let receipt = publisher.publish(content).await?;
                Ok::<_, CrosspostError>(match receipt.remote_id {
                    Some(id) => format!("{} accepted as {}", receipt.platform, id),
                    None => format!("{} accepted", receipt.platform),
                })
            })
            .await?;
        }

        Ok(())
    }

    async fn stage<F>(
        &self,
        stage: Stage,
        secs: u64,
        work: F,
    ) -> std::result::Result<(), StageFailure>
    where
        F: std::future::Future<Output = Result<String>>,
    {
        let result = match tokio::time::timeout(Duration::from_secs(secs), work).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(stage, secs)),
        };

        match result {
            Ok(summary) => {
                info!(stage = %stage, "{}", summary);
                Ok(())
            }
            Err(error) => {
                warn!(stage = %stage, error = %error, "{}", stage.failure_message());
                Err(StageFailure { stage, error })
            }
        }
    }
}

fn stage_timeout(timeouts: &TimeoutConfig, stage: Stage) -> u64 {
    match stage {
        Stage::Store => timeouts.store,
        Stage::Federated => timeouts.mastodon,
        Stage::Mainstream => timeouts.twitter,
        Stage::Threaded => timeouts.threads,
    }
}

fn timeout_error(stage: Stage, secs: u64) -> CrosspostError {
    match stage {
        Stage::Store => StoreError::Timeout(secs).into(),
        _ => PlatformError::Timeout(secs).into(),
    }
}
