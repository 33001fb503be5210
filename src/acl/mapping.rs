//! ACL entries and the set-with-metadata they are collected in

use super::{AclOperation, PatternType, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Free-form metadata travelling with an entry (connect group, service id, ...)
pub type SideData = BTreeMap<String, String>;

pub const SIDE_CONSUMER_GROUP: &str = "consumer_group";
pub const SIDE_CONNECT_GROUP: &str = "connect_group";
pub const SIDE_APPLICATION_ID: &str = "application_id";
pub const SIDE_SERVICE_ID: &str = "service_id";

/// One authorization entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AclDetails {
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub pattern_type: PatternType,
    pub principal: String,
    pub operation: AclOperation,
    pub host: String,
}

impl AclDetails {
    pub fn new(
        resource_type: ResourceType,
        resource_name: impl Into<String>,
        pattern_type: PatternType,
        principal: impl Into<String>,
        operation: impl Into<AclOperation>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            resource_name: resource_name.into(),
            pattern_type,
            principal: principal.into(),
            operation: operation.into(),
            host: host.into(),
        }
    }

    /// Same principal and host, different resource and operation
    pub fn derive(
        &self,
        resource_type: ResourceType,
        resource_name: impl Into<String>,
        pattern_type: PatternType,
        operation: impl Into<AclOperation>,
    ) -> Self {
        Self {
            resource_type,
            resource_name: resource_name.into(),
            pattern_type,
            principal: self.principal.clone(),
            operation: operation.into(),
            host: self.host.clone(),
        }
    }

    pub fn with_operation(&self, operation: impl Into<AclOperation>) -> Self {
        let mut derived = self.clone();
        derived.operation = operation.into();
        derived
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

impl fmt::Display for AclDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}({}) {} {} @{}",
            self.resource_type,
            self.resource_name,
            self.pattern_type,
            self.principal,
            self.operation,
            self.host
        )
    }
}

/// ACL entries keyed by their full tuple. Inserting an existing tuple never
/// duplicates it; side-data is unioned with the first value kept per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclMapping {
    entries: BTreeMap<AclDetails, Option<SideData>>,
}

impl AclMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, details: AclDetails, side_data: Option<SideData>) {
        match self.entries.get_mut(&details) {
            Some(existing) => {
                if let Some(incoming) = side_data {
                    let merged = existing.get_or_insert_with(SideData::new);
                    for (key, value) in incoming {
                        if let Some(current) = merged.get(&key) {
                            if current != &value {
                                tracing::debug!(
                                    "Keeping side-data {}={} for {} (ignoring {})",
                                    key,
                                    current,
                                    details,
                                    value
                                );
                            }
                            continue;
                        }
                        merged.insert(key, value);
                    }
                }
            }
            None => {
                self.entries.insert(details, side_data);
            }
        }
    }

    pub fn extend(&mut self, other: AclMapping) {
        for (details, side_data) in other.entries {
            self.insert(details, side_data);
        }
    }

    pub fn contains(&self, details: &AclDetails) -> bool {
        self.entries.contains_key(details)
    }

    pub fn side_data(&self, details: &AclDetails) -> Option<&SideData> {
        self.entries.get(details).and_then(|s| s.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AclDetails, Option<&SideData>)> {
        self.entries.iter().map(|(d, s)| (d, s.as_ref()))
    }

    pub fn details(&self) -> impl Iterator<Item = &AclDetails> {
        self.entries.keys()
    }

    pub fn keys(&self) -> BTreeSet<AclDetails> {
        self.entries.keys().cloned().collect()
    }

    pub fn principals(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|d| d.principal.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(AclDetails, Option<SideData>)> for AclMapping {
    fn from_iter<I: IntoIterator<Item = (AclDetails, Option<SideData>)>>(iter: I) -> Self {
        let mut mapping = AclMapping::new();
        for (details, side_data) in iter {
            mapping.insert(details, side_data);
        }
        mapping
    }
}
