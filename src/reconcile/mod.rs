//! Reconciler
//!
//! Diffs the desired state against what the cluster reports and executes
//! only the delta. Expansion and translation are finished before live state
//! is read, so every plan is computed against one stable desired snapshot.

pub mod client;
pub mod diff;
pub mod executor;

pub use client::{AclFilter, ClusterClient, ClusterSnapshot, SnapshotClusterClient, TopicDescription};
pub use diff::{diff, Delta};
pub use executor::{backoff_delay, BatchOutcome, ClusterAction, Executor, FailedAction, LiveState};

use crate::acl::{translate, AclBackend, AclDetails, AclMapping, Translation};
use crate::config::RetryConfig;
use crate::engine::{EngineContext, Expansion, TopicSpec};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Topics and concrete ACL entries one cluster should end up with
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub topics: BTreeMap<String, TopicSpec>,
    pub acls: AclMapping,
}

impl DesiredState {
    /// Typed topic specs plus the ACL entries translated for `backend`.
    pub fn build(ctx: &EngineContext, expansion: &Expansion, backend: AclBackend) -> Result<(Self, Translation)> {
        let topics = expansion.tcm.topic_specs()?;
        let translation = translate(&expansion.acl_mapping(ctx), backend);
        let desired = Self {
            topics,
            acls: translation.accepted.clone(),
        };
        Ok((desired, translation))
    }

    pub fn topic_names(&self) -> BTreeSet<String> {
        self.topics.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcilePlan {
    pub cluster: String,
    pub topics: Delta<String>,
    pub acls: Delta<AclDetails>,
    pub actions: Vec<ClusterAction>,
    pub warnings: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Outcome of one reconcile run
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub operation_id: Uuid,
    pub cluster: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub planned: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedAction>,
    /// Applied but not yet visible in cluster metadata
    pub unsynced: Vec<String>,
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    fn start(plan: &ReconcilePlan, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            operation_id: Uuid::new_v4(),
            cluster: plan.cluster.clone(),
            dry_run,
            started_at: now,
            finished_at: now,
            planned: plan.actions.iter().map(|a| a.to_string()).collect(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            unsynced: Vec::new(),
            warnings: plan.warnings.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Reconciler {
    cluster: String,
    client: Arc<dyn ClusterClient>,
    executor: Executor,
    retry: RetryConfig,
    delete_unknown: bool,
}

impl Reconciler {
    pub fn new(
        cluster: impl Into<String>,
        client: Arc<dyn ClusterClient>,
        retry: RetryConfig,
        delete_unknown: bool,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            executor: Executor::new(Arc::clone(&client), retry.clone()),
            client,
            retry,
            delete_unknown,
        }
    }

    /// Actions that bring the cluster to `desired`. Reads only.
    pub async fn plan(&self, desired: &DesiredState) -> Result<ReconcilePlan> {
        let live = LiveState::fetch(self.client.as_ref()).await?;
        let topics = diff(&desired.topic_names(), &live.topic_names(), self.delete_unknown);
        let acls = diff(&desired.acls.keys(), &live.acls, self.delete_unknown);

        let mut actions = Vec::new();
        let mut warnings = Vec::new();

        for name in &topics.to_create {
            if let Some(spec) = desired.topics.get(name) {
                actions.push(ClusterAction::CreateTopic {
                    name: name.clone(),
                    spec: spec.clone(),
                });
            }
        }

        for name in &topics.to_delete_provisioned {
            if let (Some(spec), Some(current)) = (desired.topics.get(name), live.topics.get(name)) {
                topic_drift(name, spec, current, &mut actions, &mut warnings);
            }
        }

        actions.extend(
            topics
                .to_delete_unknown
                .iter()
                .map(|name| ClusterAction::DeleteTopic { name: name.clone() }),
        );
        actions.extend(acls.to_create.iter().cloned().map(ClusterAction::CreateAcl));
        actions.extend(acls.to_delete_unknown.iter().cloned().map(ClusterAction::DeleteAcl));

        for warning in &warnings {
            warn!("{}: {}", self.cluster, warning);
        }
        info!(
            "Plan for {}: {} topics to create, {} to delete, {} ACLs to create, {} to delete, {} actions total",
            self.cluster,
            topics.to_create.len(),
            topics.to_delete_unknown.len(),
            acls.to_create.len(),
            acls.to_delete_unknown.len(),
            actions.len()
        );

        Ok(ReconcilePlan {
            cluster: self.cluster.clone(),
            topics,
            acls,
            actions,
            warnings,
        })
    }

    /// Actions that remove everything `desired` provisioned and nothing else.
    pub async fn plan_teardown(&self, desired: &DesiredState) -> Result<ReconcilePlan> {
        let live = LiveState::fetch(self.client.as_ref()).await?;
        let topics = diff(&desired.topic_names(), &live.topic_names(), false);
        let acls = diff(&desired.acls.keys(), &live.acls, false);

        let mut actions: Vec<ClusterAction> = acls
            .to_delete_provisioned
            .iter()
            .cloned()
            .map(ClusterAction::DeleteAcl)
            .collect();
        actions.extend(
            topics
                .to_delete_provisioned
                .iter()
                .map(|name| ClusterAction::DeleteTopic { name: name.clone() }),
        );

        info!(
            "Teardown plan for {}: {} topics and {} ACLs",
            self.cluster,
            topics.to_delete_provisioned.len(),
            acls.to_delete_provisioned.len()
        );

        Ok(ReconcilePlan {
            cluster: self.cluster.clone(),
            topics,
            acls,
            actions,
            warnings: Vec::new(),
        })
    }

    /// Execute `plan`: topic creates and alters, then ACL actions, then topic
    /// deletes, then wait for the cluster metadata to reflect what succeeded.
    /// A dry run only reports.
    pub async fn run(&self, plan: ReconcilePlan, dry_run: bool) -> ReconcileReport {
        let mut report = ReconcileReport::start(&plan, dry_run);

        if dry_run {
            info!("Dry run for {}: {} actions not executed", self.cluster, plan.actions.len());
            report.finished_at = Utc::now();
            return report;
        }

        // Topics exist before grants name them and outlive the grants on removal
        let (acl_actions, topic_actions): (Vec<_>, Vec<_>) = plan.actions.into_iter().partition(|action| {
            matches!(action, ClusterAction::CreateAcl(_) | ClusterAction::DeleteAcl(_))
        });
        let (topic_deletes, topic_changes): (Vec<_>, Vec<_>) = topic_actions
            .into_iter()
            .partition(|action| matches!(action, ClusterAction::DeleteTopic { .. }));

        let mut outcome = self.executor.execute(topic_changes).await;
        outcome.merge(self.executor.execute(acl_actions).await);
        outcome.merge(self.executor.execute(topic_deletes).await);

        let unsynced = self.executor.await_convergence(&outcome.succeeded).await;

        report.succeeded = outcome.succeeded.iter().map(|a| a.to_string()).collect();
        report.failed = outcome.failed;
        report.unsynced = unsynced.iter().map(|a| a.to_string()).collect();
        report.finished_at = Utc::now();

        info!(
            "Reconcile {} on {} finished: {} succeeded, {} failed, {} unsynced",
            report.operation_id,
            self.cluster,
            report.succeeded.len(),
            report.failed.len(),
            report.unsynced.len()
        );
        report
    }

    pub async fn close(&self) -> Result<()> {
        close_client(self.client.as_ref(), &self.retry).await
    }
}

fn topic_drift(
    name: &str,
    desired: &TopicSpec,
    live: &TopicDescription,
    actions: &mut Vec<ClusterAction>,
    warnings: &mut Vec<String>,
) {
    if desired.configs != live.configs {
        actions.push(ClusterAction::AlterTopicConfig {
            name: name.to_string(),
            configs: desired.configs.clone(),
        });
    }

    if desired.partitions > live.partitions {
        actions.push(ClusterAction::CreatePartitions {
            name: name.to_string(),
            count: desired.partitions,
        });
    } else if desired.partitions < live.partitions {
        warnings.push(format!(
            "topic {} has {} partitions but {} are declared; partitions cannot be removed",
            name, live.partitions, desired.partitions
        ));
    }

    if desired.replication_factor != live.replication_factor {
        warnings.push(format!(
            "topic {} has replication factor {} but {} is declared; not changed",
            name, live.replication_factor, desired.replication_factor
        ));
    }
}

/// Close the client, retrying transient failures up to `retry.close_attempts`.
pub async fn close_client(client: &dyn ClusterClient, retry: &RetryConfig) -> Result<()> {
    let attempts = retry.close_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.close().await {
            Ok(()) => {
                info!("Cluster connection closed");
                return Ok(());
            }
            Err(e) if attempt < attempts && e.is_retryable() => {
                let delay = backoff_delay(retry, attempt);
                warn!(
                    "Closing cluster connection failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt, attempts, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!("Giving up closing cluster connection after {} attempts: {}", attempt, e);
                return Err(e);
            }
        }
    }
}
