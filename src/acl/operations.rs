//! Operation model: abstract client intents and the concrete values each
//! authorization backend understands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authorization model a cluster enforces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclBackend {
    /// Broker-native (resource, operation, principal, host) ACLs
    #[default]
    Native,
    /// Role bindings evaluated by a role-based authorizer
    Rbac,
}

impl fmt::Display for AclBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclBackend::Native => write!(f, "native"),
            AclBackend::Rbac => write!(f, "rbac"),
        }
    }
}

impl FromStr for AclBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" | "acl" | "kafka" => Ok(AclBackend::Native),
            "rbac" => Ok(AclBackend::Rbac),
            _ => Err(format!("Invalid ACL backend: {}. Valid backends: native, rbac", s)),
        }
    }
}

/// Backend-agnostic client intent, prior to translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractRole {
    Producer,
    TransactionalProducer,
    IdempotentProducer,
    Consumer,
    ConsumerGroup,
    SourceConnector,
    SinkConnector,
    StreamRead,
    StreamWrite,
    QueryEngineRead,
    QueryEngineWrite,
}

impl AbstractRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbstractRole::Producer => "producer",
            AbstractRole::TransactionalProducer => "transactional_producer",
            AbstractRole::IdempotentProducer => "idempotent_producer",
            AbstractRole::Consumer => "consumer",
            AbstractRole::ConsumerGroup => "consumer_group",
            AbstractRole::SourceConnector => "source_connector",
            AbstractRole::SinkConnector => "sink_connector",
            AbstractRole::StreamRead => "stream_read",
            AbstractRole::StreamWrite => "stream_write",
            AbstractRole::QueryEngineRead => "query_engine_read",
            AbstractRole::QueryEngineWrite => "query_engine_write",
        }
    }

    /// Roles whose grants are attached to the generated topic names
    pub fn is_topic_scoped(&self) -> bool {
        !matches!(
            self,
            AbstractRole::TransactionalProducer
                | AbstractRole::IdempotentProducer
                | AbstractRole::ConsumerGroup
        )
    }
}

impl fmt::Display for AbstractRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker-native ACL operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NativeOperation {
    All,
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
    ClusterAction,
    DescribeConfigs,
    AlterConfigs,
    IdempotentWrite,
}

impl fmt::Display for NativeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeOperation::All => "ALL",
            NativeOperation::Read => "READ",
            NativeOperation::Write => "WRITE",
            NativeOperation::Create => "CREATE",
            NativeOperation::Delete => "DELETE",
            NativeOperation::Alter => "ALTER",
            NativeOperation::Describe => "DESCRIBE",
            NativeOperation::ClusterAction => "CLUSTER_ACTION",
            NativeOperation::DescribeConfigs => "DESCRIBE_CONFIGS",
            NativeOperation::AlterConfigs => "ALTER_CONFIGS",
            NativeOperation::IdempotentWrite => "IDEMPOTENT_WRITE",
        };
        f.write_str(name)
    }
}

/// Predefined role of a role-based authorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RbacRole {
    DeveloperRead,
    DeveloperWrite,
    DeveloperManage,
    ResourceOwner,
}

impl fmt::Display for RbacRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RbacRole::DeveloperRead => "DeveloperRead",
            RbacRole::DeveloperWrite => "DeveloperWrite",
            RbacRole::DeveloperManage => "DeveloperManage",
            RbacRole::ResourceOwner => "ResourceOwner",
        };
        f.write_str(name)
    }
}

/// Operation carried by an ACL entry, either still abstract or already
/// concrete for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AclOperation {
    Abstract(AbstractRole),
    Native(NativeOperation),
    Rbac(RbacRole),
}

impl AclOperation {
    /// Backend this operation is concrete for, `None` while abstract.
    pub fn backend(&self) -> Option<AclBackend> {
        match self {
            AclOperation::Abstract(_) => None,
            AclOperation::Native(_) => Some(AclBackend::Native),
            AclOperation::Rbac(_) => Some(AclBackend::Rbac),
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, AclOperation::Abstract(_))
    }
}

impl From<AbstractRole> for AclOperation {
    fn from(role: AbstractRole) -> Self {
        AclOperation::Abstract(role)
    }
}

impl From<NativeOperation> for AclOperation {
    fn from(operation: NativeOperation) -> Self {
        AclOperation::Native(operation)
    }
}

impl From<RbacRole> for AclOperation {
    fn from(role: RbacRole) -> Self {
        AclOperation::Rbac(role)
    }
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclOperation::Abstract(role) => write!(f, "<{}>", role),
            AclOperation::Native(operation) => write!(f, "{}", operation),
            AclOperation::Rbac(role) => write!(f, "{}", role),
        }
    }
}
