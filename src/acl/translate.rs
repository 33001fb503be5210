//! ACL translation
//!
//! Converts entries carrying abstract client roles into the concrete
//! operations of one authorization backend. Entries already concrete for
//! the target are copied; anything without a rule is rejected and logged.

use super::mapping::{
    SIDE_APPLICATION_ID, SIDE_CONNECT_GROUP, SIDE_CONSUMER_GROUP, SIDE_SERVICE_ID,
};
use super::{
    AbstractRole, AclBackend, AclDetails, AclMapping, AclOperation, NativeOperation, PatternType,
    RbacRole, ResourceType, SideData, CLUSTER_RESOURCE_NAME,
};
use crate::error::{ProvisionError, Result};
use tracing::{info, warn};

/// Prefix of the internal topics and groups a query service creates
pub const QUERY_SERVICE_INTERNAL_PREFIX: &str = "_confluent-ksql-";

/// Result of translating one mapping
#[derive(Debug, Clone, Default)]
pub struct Translation {
    /// Concrete entries for the target backend
    pub accepted: AclMapping,
    /// Input entries that could not be translated
    pub rejected: AclMapping,
}

/// Translate every entry of `input` for `target`.
pub fn translate(input: &AclMapping, target: AclBackend) -> Translation {
    let mut translation = Translation::default();

    for (details, side_data) in input.iter() {
        match details.operation.translate(details, side_data, target) {
            Ok(derived) => {
                for entry in derived {
                    translation.accepted.insert(entry, side_data.cloned());
                }
            }
            Err(e) => {
                warn!("Dropping ACL entry for {} backend: {}", target, e);
                translation.rejected.insert(details.clone(), side_data.cloned());
            }
        }
    }

    info!(
        "Translated {} ACL entries into {} {} entries ({} rejected)",
        input.len(),
        translation.accepted.len(),
        target,
        translation.rejected.len()
    );

    translation
}

impl AclOperation {
    /// Render this entry, plus the grants it depends on, for `target`.
    pub fn translate(
        &self,
        details: &AclDetails,
        side_data: Option<&SideData>,
        target: AclBackend,
    ) -> Result<Vec<AclDetails>> {
        match (self, target) {
            (AclOperation::Native(_), AclBackend::Native) => Ok(vec![details.clone()]),
            (AclOperation::Rbac(_), AclBackend::Rbac) => Ok(vec![details.clone()]),
            (AclOperation::Native(_), AclBackend::Rbac) | (AclOperation::Rbac(_), AclBackend::Native) => {
                Err(rejection(details, format!("no mapping from {} to {}", self, target)))
            }
            (AclOperation::Abstract(role), target) => role.translate(details, side_data, target),
        }
    }
}

impl AbstractRole {
    pub fn translate(
        &self,
        details: &AclDetails,
        side_data: Option<&SideData>,
        target: AclBackend,
    ) -> Result<Vec<AclDetails>> {
        self.check_resource_type(details)?;
        match target {
            AclBackend::Native => self.to_native(details, side_data),
            AclBackend::Rbac => self.to_rbac(details, side_data),
        }
    }

    fn expected_resource_type(&self) -> ResourceType {
        match self {
            AbstractRole::TransactionalProducer => ResourceType::TransactionalId,
            AbstractRole::IdempotentProducer => ResourceType::Cluster,
            AbstractRole::ConsumerGroup => ResourceType::Group,
            _ => ResourceType::Topic,
        }
    }

    fn check_resource_type(&self, details: &AclDetails) -> Result<()> {
        let expected = self.expected_resource_type();
        if details.resource_type != expected {
            return Err(rejection(
                details,
                format!("{} applies to {} resources only", self, expected),
            ));
        }
        Ok(())
    }

    fn to_native(&self, base: &AclDetails, side_data: Option<&SideData>) -> Result<Vec<AclDetails>> {
        use NativeOperation::*;

        let acls = match self {
            AbstractRole::Producer => vec![base.with_operation(Write), base.with_operation(Describe)],
            AbstractRole::TransactionalProducer => {
                vec![base.with_operation(Describe), base.with_operation(Write)]
            }
            AbstractRole::IdempotentProducer => vec![base.with_operation(IdempotentWrite)],
            AbstractRole::Consumer => vec![base.with_operation(Read), base.with_operation(Describe)],
            AbstractRole::ConsumerGroup => vec![base.derive(
                ResourceType::Group,
                base.resource_name.clone(),
                PatternType::Literal,
                Read,
            )],
            AbstractRole::SourceConnector | AbstractRole::SinkConnector => {
                let data_operation = if *self == AbstractRole::SourceConnector { Write } else { Read };
                let mut acls = vec![base.with_operation(data_operation), base.with_operation(Describe)];
                if let Some(group) = side_value(side_data, SIDE_CONNECT_GROUP) {
                    acls.push(base.derive(ResourceType::Group, group, PatternType::Literal, Read));
                }
                acls
            }
            AbstractRole::StreamRead | AbstractRole::StreamWrite => {
                let application_id = required_side_value(base, side_data, SIDE_APPLICATION_ID)?;
                let data_operation = if *self == AbstractRole::StreamRead { Read } else { Write };
                vec![
                    base.with_operation(data_operation),
                    base.with_operation(Describe),
                    base.derive(ResourceType::Group, application_id, PatternType::Prefixed, Read),
                ]
            }
            AbstractRole::QueryEngineRead | AbstractRole::QueryEngineWrite => {
                let service_id = required_side_value(base, side_data, SIDE_SERVICE_ID)?;
                let internal_prefix = format!("{}{}", QUERY_SERVICE_INTERNAL_PREFIX, service_id);
                let command_topic = format!("{}_command_topic", internal_prefix);
                let data_operation = if *self == AbstractRole::QueryEngineRead { Read } else { Write };
                vec![
                    base.with_operation(data_operation),
                    base.with_operation(Describe),
                    base.derive(ResourceType::Topic, internal_prefix.clone(), PatternType::Prefixed, All),
                    base.derive(ResourceType::Group, internal_prefix, PatternType::Prefixed, All),
                    base.derive(ResourceType::Topic, command_topic.clone(), PatternType::Literal, Write),
                    base.derive(ResourceType::Topic, command_topic, PatternType::Literal, Describe),
                    base.derive(ResourceType::TransactionalId, service_id, PatternType::Literal, Describe),
                    base.derive(
                        ResourceType::Cluster,
                        CLUSTER_RESOURCE_NAME,
                        PatternType::Literal,
                        DescribeConfigs,
                    ),
                ]
            }
        };

        Ok(acls)
    }

    fn to_rbac(&self, base: &AclDetails, side_data: Option<&SideData>) -> Result<Vec<AclDetails>> {
        use RbacRole::*;

        // Role bindings are not host-scoped
        let base = base.clone().with_host("*");

        let bindings = match self {
            AbstractRole::Producer => {
                let mut bindings = vec![base.with_operation(DeveloperWrite)];
                bindings.extend(subject_bindings(&base, DeveloperWrite));
                bindings
            }
            AbstractRole::TransactionalProducer => vec![base.with_operation(ResourceOwner)],
            AbstractRole::IdempotentProducer => vec![base.with_operation(DeveloperWrite)],
            AbstractRole::Consumer => {
                let mut bindings = vec![base.with_operation(DeveloperRead)];
                bindings.extend(subject_bindings(&base, DeveloperRead));
                if let Some(group) = side_value(side_data, SIDE_CONSUMER_GROUP) {
                    bindings.push(base.derive(ResourceType::Group, group, PatternType::Literal, DeveloperRead));
                }
                bindings
            }
            // folded into the consumer binding above
            AbstractRole::ConsumerGroup => Vec::new(),
            AbstractRole::SourceConnector | AbstractRole::SinkConnector => {
                vec![base.with_operation(ResourceOwner)]
            }
            AbstractRole::StreamRead | AbstractRole::StreamWrite => {
                let application_id = required_side_value(&base, side_data, SIDE_APPLICATION_ID)?;
                vec![
                    base.with_operation(ResourceOwner),
                    base.derive(ResourceType::Group, application_id.clone(), PatternType::Prefixed, ResourceOwner),
                    base.derive(ResourceType::Subject, application_id, PatternType::Prefixed, ResourceOwner),
                ]
            }
            AbstractRole::QueryEngineRead | AbstractRole::QueryEngineWrite => {
                let service_id = required_side_value(&base, side_data, SIDE_SERVICE_ID)?;
                let internal_prefix = format!("{}{}", QUERY_SERVICE_INTERNAL_PREFIX, service_id);
                let role = if *self == AbstractRole::QueryEngineRead { DeveloperRead } else { DeveloperWrite };
                vec![
                    base.with_operation(role),
                    base.derive(ResourceType::QueryService, service_id, PatternType::Literal, role),
                    base.derive(ResourceType::Group, internal_prefix.clone(), PatternType::Prefixed, ResourceOwner),
                    base.derive(ResourceType::Topic, internal_prefix, PatternType::Prefixed, ResourceOwner),
                ]
            }
        };

        Ok(bindings)
    }
}

/// Schema subjects backing a literal topic; prefix topics get none.
fn subject_bindings(base: &AclDetails, role: RbacRole) -> Vec<AclDetails> {
    if base.pattern_type != PatternType::Literal {
        return Vec::new();
    }

    ["key", "value"]
        .iter()
        .map(|suffix| {
            base.derive(
                ResourceType::Subject,
                format!("{}-{}", base.resource_name, suffix),
                PatternType::Literal,
                role,
            )
        })
        .collect()
}

fn side_value(side_data: Option<&SideData>, key: &str) -> Option<String> {
    side_data
        .and_then(|s| s.get(key))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn required_side_value(details: &AclDetails, side_data: Option<&SideData>, key: &str) -> Result<String> {
    side_value(side_data, key).ok_or_else(|| rejection(details, format!("missing side-data '{}'", key)))
}

fn rejection(details: &AclDetails, reason: String) -> ProvisionError {
    ProvisionError::Translation {
        details: details.to_string(),
        reason,
    }
}
