//! Cluster client seam
//!
//! The reconciler only talks to a cluster through [`ClusterClient`]. The
//! in-memory [`SnapshotClusterClient`] backs the CLI and the tests; its
//! state can be persisted as a JSON snapshot between runs.

use crate::acl::{AclDetails, AclOperation, PatternType, ResourceType};
use crate::engine::TopicSpec;
use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

/// Live view of one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescription {
    pub partitions: i32,
    pub replication_factor: i16,
    #[serde(default)]
    pub configs: BTreeMap<String, String>,
}

impl From<&TopicSpec> for TopicDescription {
    fn from(spec: &TopicSpec) -> Self {
        Self {
            partitions: spec.partitions,
            replication_factor: spec.replication_factor,
            configs: spec.configs.clone(),
        }
    }
}

/// ACL selector; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclFilter {
    pub resource_type: Option<ResourceType>,
    pub resource_name: Option<String>,
    pub pattern_type: Option<PatternType>,
    pub principal: Option<String>,
    pub operation: Option<AclOperation>,
    pub host: Option<String>,
}

impl AclFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(acl: &AclDetails) -> Self {
        Self {
            resource_type: Some(acl.resource_type),
            resource_name: Some(acl.resource_name.clone()),
            pattern_type: Some(acl.pattern_type),
            principal: Some(acl.principal.clone()),
            operation: Some(acl.operation),
            host: Some(acl.host.clone()),
        }
    }

    pub fn principal(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, acl: &AclDetails) -> bool {
        self.resource_type.map_or(true, |v| v == acl.resource_type)
            && self.resource_name.as_ref().map_or(true, |v| *v == acl.resource_name)
            && self.pattern_type.map_or(true, |v| v == acl.pattern_type)
            && self.principal.as_ref().map_or(true, |v| *v == acl.principal)
            && self.operation.map_or(true, |v| v == acl.operation)
            && self.host.as_ref().map_or(true, |v| *v == acl.host)
    }
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_topics(&self) -> Result<BTreeMap<String, TopicDescription>>;
    async fn create_topic(&self, name: &str, spec: &TopicSpec) -> Result<()>;
    async fn delete_topic(&self, name: &str) -> Result<()>;
    /// Replace the topic's broker-side configuration
    async fn alter_topic_config(&self, name: &str, configs: &BTreeMap<String, String>) -> Result<()>;
    /// Grow the topic to `count` partitions
    async fn create_partitions(&self, name: &str, count: i32) -> Result<()>;
    async fn list_acls(&self, filter: &AclFilter) -> Result<Vec<AclDetails>>;
    async fn create_acl(&self, acl: &AclDetails) -> Result<()>;
    /// Delete every ACL matching `filter`, returning how many were removed
    async fn delete_acls(&self, filter: &AclFilter) -> Result<usize>;
    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSnapshot {
    pub topics: BTreeMap<String, TopicDescription>,
    pub acls: BTreeSet<AclDetails>,
}

/// In-memory cluster with optional JSON persistence and failure injection
#[derive(Debug, Default)]
pub struct SnapshotClusterClient {
    state: RwLock<ClusterSnapshot>,
    path: Option<PathBuf>,
    /// Remaining injected failures keyed by `operation` or `operation:resource`
    failures: DashMap<String, u32>,
    /// Accept writes without applying them, so metadata never converges
    swallow_writes: AtomicBool,
    mutations: AtomicU64,
    closed: AtomicBool,
}

impl SnapshotClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: ClusterSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    /// Load state from `path`, starting empty when the file does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            info!("No cluster snapshot at {}, starting empty", path.display());
            ClusterSnapshot::default()
        };

        Ok(Self {
            state: RwLock::new(snapshot),
            path: Some(path.to_path_buf()),
            ..Self::default()
        })
    }

    /// Write the current state back to the file it was loaded from.
    pub fn persist(&self) -> Result<()> {
        if let Some(path) = &self.path {
            let content = serde_json::to_string_pretty(&*self.state.read())?;
            std::fs::write(path, content)?;
            debug!("Persisted cluster snapshot to {}", path.display());
        }
        Ok(())
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        self.state.read().clone()
    }

    /// Fail the next `times` calls of `operation` (optionally `operation:resource`).
    pub fn inject_failures(&self, key: impl Into<String>, times: u32) {
        self.failures.insert(key.into(), times);
    }

    pub fn swallow_writes(&self, enabled: bool) {
        self.swallow_writes.store(enabled, Ordering::SeqCst);
    }

    /// Mutating calls that reached the store
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &str, resource: &str) -> Result<()> {
        for key in [format!("{}:{}", operation, resource), operation.to_string()] {
            if let Some(mut remaining) = self.failures.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ProvisionError::Cluster(format!(
                        "injected failure for {} {}",
                        operation, resource
                    )));
                }
            }
        }
        Ok(())
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut ClusterSnapshot) -> Result<T>, noop: T) -> Result<T> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.swallow_writes.load(Ordering::SeqCst) {
            return Ok(noop);
        }
        let mut state = self.state.write();
        apply(&mut *state)
    }
}

#[async_trait]
impl ClusterClient for SnapshotClusterClient {
    async fn list_topics(&self) -> Result<BTreeMap<String, TopicDescription>> {
        self.check("list_topics", "")?;
        Ok(self.state.read().topics.clone())
    }

    async fn create_topic(&self, name: &str, spec: &TopicSpec) -> Result<()> {
        self.check("create_topic", name)?;
        self.mutate(
            |state| {
                if state.topics.contains_key(name) {
                    return Err(ProvisionError::AlreadyExists(format!("topic {}", name)));
                }
                state.topics.insert(name.to_string(), TopicDescription::from(spec));
                Ok(())
            },
            (),
        )
    }

    async fn delete_topic(&self, name: &str) -> Result<()> {
        self.check("delete_topic", name)?;
        self.mutate(
            |state| match state.topics.remove(name) {
                Some(_) => Ok(()),
                None => Err(ProvisionError::NotFound(format!("topic {}", name))),
            },
            (),
        )
    }

    async fn alter_topic_config(&self, name: &str, configs: &BTreeMap<String, String>) -> Result<()> {
        self.check("alter_topic_config", name)?;
        self.mutate(
            |state| match state.topics.get_mut(name) {
                Some(topic) => {
                    topic.configs = configs.clone();
                    Ok(())
                }
                None => Err(ProvisionError::NotFound(format!("topic {}", name))),
            },
            (),
        )
    }

    async fn create_partitions(&self, name: &str, count: i32) -> Result<()> {
        self.check("create_partitions", name)?;
        self.mutate(
            |state| match state.topics.get_mut(name) {
                Some(topic) if count > topic.partitions => {
                    topic.partitions = count;
                    Ok(())
                }
                Some(topic) => Err(ProvisionError::InvalidConfig(format!(
                    "topic {} already has {} partitions, cannot grow to {}",
                    name, topic.partitions, count
                ))),
                None => Err(ProvisionError::NotFound(format!("topic {}", name))),
            },
            (),
        )
    }

    async fn list_acls(&self, filter: &AclFilter) -> Result<Vec<AclDetails>> {
        self.check("list_acls", "")?;
        Ok(self
            .state
            .read()
            .acls
            .iter()
            .filter(|acl| filter.matches(acl))
            .cloned()
            .collect())
    }

    async fn create_acl(&self, acl: &AclDetails) -> Result<()> {
        self.check("create_acl", &acl.resource_name)?;
        self.mutate(
            |state| {
                state.acls.insert(acl.clone());
                Ok(())
            },
            (),
        )
    }

    async fn delete_acls(&self, filter: &AclFilter) -> Result<usize> {
        self.check("delete_acls", filter.resource_name.as_deref().unwrap_or(""))?;
        self.mutate(
            |state| {
                let before = state.acls.len();
                state.acls.retain(|acl| !filter.matches(acl));
                Ok(before - state.acls.len())
            },
            0,
        )
    }

    async fn close(&self) -> Result<()> {
        self.check("close", "")?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::NativeOperation;

    fn spec(partitions: i32) -> TopicSpec {
        TopicSpec {
            partitions,
            replication_factor: 1,
            configs: BTreeMap::new(),
        }
    }

    fn acl(principal: &str) -> AclDetails {
        AclDetails::new(
            ResourceType::Topic,
            "orders",
            PatternType::Literal,
            principal,
            NativeOperation::Read,
            "*",
        )
    }

    #[tokio::test]
    async fn test_topic_lifecycle() {
        let client = SnapshotClusterClient::new();
        client.create_topic("orders", &spec(3)).await.unwrap();
        assert!(matches!(
            client.create_topic("orders", &spec(3)).await,
            Err(ProvisionError::AlreadyExists(_))
        ));

        client.create_partitions("orders", 6).await.unwrap();
        assert!(client.create_partitions("orders", 2).await.is_err());

        let configs: BTreeMap<String, String> = [("retention.ms".to_string(), "1000".to_string())].into();
        client.alter_topic_config("orders", &configs).await.unwrap();

        let topics = client.list_topics().await.unwrap();
        assert_eq!(topics["orders"].partitions, 6);
        assert_eq!(topics["orders"].configs, configs);

        client.delete_topic("orders").await.unwrap();
        assert!(matches!(
            client.delete_topic("orders").await,
            Err(ProvisionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_acl_filters() {
        let client = SnapshotClusterClient::new();
        client.create_acl(&acl("User:a")).await.unwrap();
        client.create_acl(&acl("User:b")).await.unwrap();
        client.create_acl(&acl("User:b")).await.unwrap();

        assert_eq!(client.list_acls(&AclFilter::any()).await.unwrap().len(), 2);
        assert_eq!(client.list_acls(&AclFilter::principal("User:a")).await.unwrap().len(), 1);
        assert_eq!(client.delete_acls(&AclFilter::exact(&acl("User:b"))).await.unwrap(), 1);
        assert_eq!(client.list_acls(&AclFilter::any()).await.unwrap(), vec![acl("User:a")]);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let client = SnapshotClusterClient::new();
        client.inject_failures("create_topic:orders", 2);

        assert!(client.create_topic("orders", &spec(1)).await.unwrap_err().is_retryable());
        assert!(client.create_topic("orders", &spec(1)).await.is_err());
        client.create_topic("orders", &spec(1)).await.unwrap();
        client.create_topic("payments", &spec(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.json");

        let client = SnapshotClusterClient::load(&path).unwrap();
        client.create_topic("orders", &spec(2)).await.unwrap();
        client.create_acl(&acl("User:a")).await.unwrap();
        client.persist().unwrap();

        let reloaded = SnapshotClusterClient::load(&path).unwrap();
        assert_eq!(reloaded.snapshot(), client.snapshot());
    }

    #[tokio::test]
    async fn test_swallowed_writes_are_counted_but_not_applied() {
        let client = SnapshotClusterClient::new();
        client.swallow_writes(true);
        client.create_topic("orders", &spec(1)).await.unwrap();
        assert_eq!(client.mutation_count(), 1);
        assert!(client.list_topics().await.unwrap().is_empty());
    }
}
