//! Configuration model: the read-only inputs of the expansion engine.
//!
//! Built once from validated configuration files and never mutated
//! afterwards.

pub mod blueprint;
pub mod clients;
pub mod definitions;

pub use blueprint::{Blueprint, TopicPolicy, TopicTemplate};
pub use clients::{
    AccessDirection, ClientDefinition, ClientRoles, ConnectorDefinition, ConnectorDirection,
    ConsumerDefinition, ProducerDefinition, QueryEngineDefinition, StreamDefinition,
};
pub use definitions::{AdhocTopic, Definitions, ScopeNode, TopicDefinition};

use crate::error::{ProvisionError, Result};
use serde::de::Error as _;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const PARTITIONS_KEY: &str = "partitions";
pub const REPLICATION_FACTOR_KEY: &str = "replication.factor";

/// Flat topic property map (partition count, replication factor and any
/// broker-side configuration key)
pub type Properties = BTreeMap<String, String>;

/// Partition count and replication factor from `properties`, when set.
/// Both must be positive integers; `owner` prefixes the error.
pub fn topic_sizing(owner: &str, properties: &Properties) -> Result<(Option<i32>, Option<i16>)> {
    let partitions = properties
        .get(PARTITIONS_KEY)
        .map(|raw| parse_positive::<i32>(owner, PARTITIONS_KEY, raw))
        .transpose()?;
    let replication_factor = properties
        .get(REPLICATION_FACTOR_KEY)
        .map(|raw| parse_positive::<i16>(owner, REPLICATION_FACTOR_KEY, raw))
        .transpose()?;
    Ok((partitions, replication_factor))
}

fn parse_positive<T>(owner: &str, key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ProvisionError::InvalidConfig(format!(
            "{}: {} must be a positive integer, got '{}'",
            owner, key, raw
        ))),
    }
}

/// Lookup key for templates and enumerations
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Accept strings, numbers and booleans as property values so that
/// `partitions = 3` and `partitions = "3"` mean the same thing.
pub(crate) fn deserialize_properties<'de, D>(deserializer: D) -> std::result::Result<Properties, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "property '{}' must be a string, number or boolean, got {}",
                        key, other
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}
