//! Topic Config Merge
//!
//! Effective topic properties are layered, later wins:
//! policy defaults, then the referenced template, then inline overrides.
//! Every layer passes through the policy's whitelist/blacklist.

use crate::error::{ProvisionError, Result};
use crate::model::{
    normalize_name, topic_sizing, Blueprint, Properties, TopicPolicy, PARTITIONS_KEY, REPLICATION_FACTOR_KEY,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_PARTITIONS: i32 = 1;
const DEFAULT_REPLICATION_FACTOR: i16 = 1;

/// Copy every allowed key of `overrides` into `target`.
pub fn apply_overrides(target: &mut Properties, overrides: &Properties, policy: &TopicPolicy) {
    for (key, value) in overrides {
        if policy.allows(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Memoising merger; template results are cached by normalised name.
#[derive(Debug, Default)]
pub struct TopicConfigMerger {
    templates: DashMap<String, Properties>,
}

impl TopicConfigMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filtered policy defaults
    pub fn defaults(&self, blueprint: &Blueprint) -> Properties {
        let policy = &blueprint.topic_policy;
        let mut properties = Properties::new();
        apply_overrides(&mut properties, &policy.defaults, policy);
        properties
    }

    /// Defaults plus the named template's overrides
    pub fn template(&self, blueprint: &Blueprint, name: &str) -> Result<Properties> {
        let key = normalize_name(name);
        if let Some(cached) = self.templates.get(&key) {
            return Ok(cached.clone());
        }

        let template = blueprint
            .template(name)
            .ok_or_else(|| ProvisionError::UnknownTemplate(name.to_string()))?;

        let mut properties = self.defaults(blueprint);
        apply_overrides(&mut properties, &template.overrides, &blueprint.topic_policy);

        self.templates.insert(key, properties.clone());
        Ok(properties)
    }

    pub fn effective(
        &self,
        blueprint: &Blueprint,
        template: Option<&str>,
        inline: &Properties,
    ) -> Result<Properties> {
        let mut properties = match template {
            Some(name) => self.template(blueprint, name)?,
            None => self.defaults(blueprint),
        };
        apply_overrides(&mut properties, inline, &blueprint.topic_policy);
        Ok(properties)
    }

    pub fn cached_templates(&self) -> usize {
        self.templates.len()
    }
}

/// Topic creation parameters derived from a property map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSpec {
    pub partitions: i32,
    pub replication_factor: i16,
    /// Broker-side configuration, without the two keys above
    pub configs: BTreeMap<String, String>,
}

impl TopicSpec {
    pub fn from_properties(topic: &str, properties: &Properties) -> Result<Self> {
        let (partitions, replication_factor) = topic_sizing(&format!("topic '{}'", topic), properties)?;

        let configs = properties
            .iter()
            .filter(|(key, _)| key.as_str() != PARTITIONS_KEY && key.as_str() != REPLICATION_FACTOR_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            partitions: partitions.unwrap_or(DEFAULT_PARTITIONS),
            replication_factor: replication_factor.unwrap_or(DEFAULT_REPLICATION_FACTOR),
            configs,
        })
    }
}

/// Topic Config Mapping: one effective property map per concrete topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopicConfigMapping {
    topics: BTreeMap<String, Properties>,
}

impl TopicConfigMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic. A later definition of the same topic replaces the
    /// earlier one.
    pub fn insert(&mut self, topic: impl Into<String>, properties: Properties) {
        let topic = topic.into();
        if let Some(previous) = self.topics.get(&topic) {
            if previous != &properties {
                tracing::warn!("Topic {} is defined more than once with different settings; keeping the last definition", topic);
            }
        }
        self.topics.insert(topic, properties);
    }

    pub fn get(&self, topic: &str) -> Option<&Properties> {
        self.topics.get(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Properties)> {
        self.topics.iter()
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &String> {
        self.topics.keys()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn topic_specs(&self) -> Result<BTreeMap<String, TopicSpec>> {
        self.topics
            .iter()
            .map(|(name, properties)| Ok((name.clone(), TopicSpec::from_properties(name, properties)?)))
            .collect()
    }
}
