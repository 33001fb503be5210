//! Batch execution against a cluster
//!
//! One task per action, joined before returning. Transient failures are
//! retried with jittered exponential backoff; an element that exhausts its
//! attempts is reported failed without aborting its siblings.

use super::client::{AclFilter, ClusterClient, TopicDescription};
use crate::acl::AclDetails;
use crate::config::RetryConfig;
use crate::engine::TopicSpec;
use crate::error::Result;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One create/delete/alter call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ClusterAction {
    CreateTopic { name: String, spec: TopicSpec },
    DeleteTopic { name: String },
    AlterTopicConfig { name: String, configs: BTreeMap<String, String> },
    CreatePartitions { name: String, count: i32 },
    CreateAcl(AclDetails),
    DeleteAcl(AclDetails),
}

impl ClusterAction {
    pub async fn dispatch(&self, client: &dyn ClusterClient) -> Result<()> {
        match self {
            ClusterAction::CreateTopic { name, spec } => client.create_topic(name, spec).await,
            ClusterAction::DeleteTopic { name } => client.delete_topic(name).await,
            ClusterAction::AlterTopicConfig { name, configs } => {
                client.alter_topic_config(name, configs).await
            }
            ClusterAction::CreatePartitions { name, count } => {
                client.create_partitions(name, *count).await
            }
            ClusterAction::CreateAcl(acl) => client.create_acl(acl).await,
            ClusterAction::DeleteAcl(acl) => {
                let removed = client.delete_acls(&AclFilter::exact(acl)).await?;
                if removed == 0 {
                    debug!("No ACL matched {} on delete", acl);
                }
                Ok(())
            }
        }
    }

    /// Whether `live` already reflects this action
    pub fn is_reflected(&self, live: &LiveState) -> bool {
        match self {
            ClusterAction::CreateTopic { name, .. } => live.topics.contains_key(name),
            ClusterAction::DeleteTopic { name } => !live.topics.contains_key(name),
            ClusterAction::AlterTopicConfig { name, configs } => live
                .topics
                .get(name)
                .map_or(false, |topic| &topic.configs == configs),
            ClusterAction::CreatePartitions { name, count } => live
                .topics
                .get(name)
                .map_or(false, |topic| topic.partitions >= *count),
            ClusterAction::CreateAcl(acl) => live.acls.contains(acl),
            ClusterAction::DeleteAcl(acl) => !live.acls.contains(acl),
        }
    }
}

impl fmt::Display for ClusterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterAction::CreateTopic { name, spec } => write!(
                f,
                "create topic {} (partitions={}, replication={})",
                name, spec.partitions, spec.replication_factor
            ),
            ClusterAction::DeleteTopic { name } => write!(f, "delete topic {}", name),
            ClusterAction::AlterTopicConfig { name, configs } => {
                write!(f, "alter topic {} ({} configs)", name, configs.len())
            }
            ClusterAction::CreatePartitions { name, count } => {
                write!(f, "grow topic {} to {} partitions", name, count)
            }
            ClusterAction::CreateAcl(acl) => write!(f, "create acl {}", acl),
            ClusterAction::DeleteAcl(acl) => write!(f, "delete acl {}", acl),
        }
    }
}

/// Topics and ACLs as the cluster reports them
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub topics: BTreeMap<String, TopicDescription>,
    pub acls: BTreeSet<AclDetails>,
}

impl LiveState {
    pub async fn fetch(client: &dyn ClusterClient) -> Result<Self> {
        let topics = client.list_topics().await?;
        let acls = client.list_acls(&AclFilter::any()).await?.into_iter().collect();
        Ok(Self { topics, acls })
    }

    pub fn topic_names(&self) -> BTreeSet<String> {
        self.topics.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAction {
    pub action: ClusterAction,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<ClusterAction>,
    pub failed: Vec<FailedAction>,
}

impl BatchOutcome {
    pub fn merge(&mut self, other: BatchOutcome) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

/// Delay before retry number `attempt` (1-based): exponential, capped, with
/// the upper half jittered.
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let base = retry
        .backoff_initial_ms
        .saturating_mul(1u64 << exponent)
        .min(retry.backoff_max_ms);
    let half = base / 2;
    Duration::from_millis(half + fastrand::u64(0..=base - half))
}

pub struct Executor {
    client: Arc<dyn ClusterClient>,
    retry: RetryConfig,
}

impl Executor {
    pub fn new(client: Arc<dyn ClusterClient>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Run every action concurrently and wait for all of them.
    pub async fn execute(&self, actions: Vec<ClusterAction>) -> BatchOutcome {
        if actions.is_empty() {
            return BatchOutcome::default();
        }

        info!("Executing {} cluster actions", actions.len());
        let handles: Vec<_> = actions
            .iter()
            .cloned()
            .map(|action| {
                let client = Arc::clone(&self.client);
                let retry = self.retry.clone();
                tokio::spawn(async move { execute_with_retry(client.as_ref(), &action, &retry).await })
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        for (action, joined) in actions.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(())) => outcome.succeeded.push(action),
                Ok(Err(e)) => outcome.failed.push(FailedAction {
                    action,
                    error: e.to_string(),
                }),
                Err(e) => {
                    error!("Task for {} did not complete: {}", action, e);
                    outcome.failed.push(FailedAction {
                        action,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        outcome
    }

    /// Poll live state until every action is visible or the poll budget is
    /// spent. Returns the actions still not reflected.
    pub async fn await_convergence(&self, actions: &[ClusterAction]) -> Vec<ClusterAction> {
        let mut pending = actions.to_vec();
        if pending.is_empty() {
            return pending;
        }

        let attempts = self.retry.sync_poll_attempts;
        for poll in 1..=attempts {
            match LiveState::fetch(self.client.as_ref()).await {
                Ok(live) => pending.retain(|action| !action.is_reflected(&live)),
                Err(e) => warn!("Failed to read live state (poll {}/{}): {}", poll, attempts, e),
            }

            if pending.is_empty() {
                debug!("Cluster metadata converged after {} polls", poll);
                return pending;
            }

            if poll < attempts {
                tokio::time::sleep(Duration::from_millis(self.retry.sync_poll_interval_ms)).await;
            }
        }

        warn!(
            "{} changes not visible after {} polls: {}",
            pending.len(),
            attempts,
            pending
                .iter()
                .map(|action| action.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        pending
    }
}

async fn execute_with_retry(client: &dyn ClusterClient, action: &ClusterAction, retry: &RetryConfig) -> Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match action.dispatch(client).await {
            Ok(()) => {
                if attempt > 1 {
                    info!("{} succeeded after {} attempts", action, attempt);
                }
                return Ok(());
            }
            Err(e) => {
                if !e.is_retryable() || attempt >= retry.max_attempts {
                    error!(
                        "{} failed (attempt {}/{}): {}",
                        action, attempt, retry.max_attempts, e
                    );
                    return Err(e);
                }

                let delay = backoff_delay(retry, attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    action, attempt, retry.max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
