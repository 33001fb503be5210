//! Resource types and pattern classification for generated grants

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the single cluster resource grants are attached to
pub const CLUSTER_RESOURCE_NAME: &str = "kafka-cluster";

/// Resource type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    /// Topic resource
    Topic,

    /// Consumer group resource
    Group,

    /// Cluster resource
    Cluster,

    /// Transactional id resource
    TransactionalId,

    /// Schema registry subject
    Subject,

    /// Query service (stream SQL engine) cluster resource
    QueryService,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Topic => write!(f, "TOPIC"),
            ResourceType::Group => write!(f, "GROUP"),
            ResourceType::Cluster => write!(f, "CLUSTER"),
            ResourceType::TransactionalId => write!(f, "TRANSACTIONAL_ID"),
            ResourceType::Subject => write!(f, "SUBJECT"),
            ResourceType::QueryService => write!(f, "QUERY_SERVICE"),
        }
    }
}

/// Whether a resource name is matched exactly or as a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternType {
    Literal,
    Prefixed,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::Literal => write!(f, "LITERAL"),
            PatternType::Prefixed => write!(f, "PREFIXED"),
        }
    }
}

/// Classify a generated resource name.
///
/// A bare wildcard is literal (it already means "every resource" to the
/// broker), a name ending in `separator + wildcard` is a prefix grant and
/// anything else is an exact name.
pub fn determine_pattern_type(name: &str, separator: &str, wildcard: &str) -> PatternType {
    if name == wildcard {
        return PatternType::Literal;
    }

    if name.ends_with(&format!("{}{}", separator, wildcard)) {
        PatternType::Prefixed
    } else {
        PatternType::Literal
    }
}

/// Resource name and pattern as the broker expects them: prefix grants drop
/// the trailing wildcard but keep the separator.
pub fn resource_pattern(name: &str, separator: &str, wildcard: &str) -> (String, PatternType) {
    match determine_pattern_type(name, separator, wildcard) {
        PatternType::Prefixed => (
            name[..name.len() - wildcard.len()].to_string(),
            PatternType::Prefixed,
        ),
        PatternType::Literal => (name.to_string(), PatternType::Literal),
    }
}
