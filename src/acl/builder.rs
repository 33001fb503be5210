//! Abstract ACL entries from the User-Topic Mapping

use super::{
    resource_pattern, AbstractRole, AclDetails, AclMapping, PatternType, ResourceType, SideData,
    CLUSTER_RESOURCE_NAME,
};
use crate::engine::UserTopicMapping;
use tracing::debug;

const DEFAULT_PRINCIPAL_TYPE: &str = "User";

/// `svc1` becomes `User:svc1`; ids that already carry a type are kept.
pub fn normalize_principal(principal: &str) -> String {
    let principal = principal.trim();
    if principal.contains(':') {
        principal.to_string()
    } else {
        format!("{}:{}", DEFAULT_PRINCIPAL_TYPE, principal)
    }
}

/// One abstract entry per (resource, host) each mapping key implies.
pub fn build_acl_mapping(utm: &UserTopicMapping, separator: &str, wildcard: &str) -> AclMapping {
    let mut mapping = AclMapping::new();

    for (key, value) in utm.iter() {
        let principal = normalize_principal(&key.principal);
        let side_data: Option<SideData> = if value.side_data.is_empty() {
            None
        } else {
            Some(value.side_data.clone())
        };
        let group = key.group.trim();

        for host in &value.hostnames {
            let mut add = |resource_type, name: &str, pattern, role: AbstractRole| {
                mapping.insert(
                    AclDetails::new(resource_type, name, pattern, principal.as_str(), role, host.as_str()),
                    side_data.clone(),
                );
            };

            match key.role {
                AbstractRole::TransactionalProducer => {
                    add(ResourceType::TransactionalId, group, PatternType::Literal, key.role);
                }
                AbstractRole::IdempotentProducer => {
                    add(ResourceType::Cluster, CLUSTER_RESOURCE_NAME, PatternType::Literal, key.role);
                }
                AbstractRole::ConsumerGroup => {
                    add(ResourceType::Group, group, PatternType::Literal, key.role);
                }
                role => {
                    for topic in &value.topics {
                        let (name, pattern) = resource_pattern(topic, separator, wildcard);
                        add(ResourceType::Topic, &name, pattern, role);
                    }
                    if role == AbstractRole::Consumer && !group.is_empty() {
                        add(
                            ResourceType::Group,
                            group,
                            PatternType::Literal,
                            AbstractRole::ConsumerGroup,
                        );
                    }
                }
            }
        }
    }

    debug!(
        "Built {} abstract ACL entries for {} principals",
        mapping.len(),
        mapping.principals().len()
    );
    mapping
}
