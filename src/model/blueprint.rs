//! Blueprint: reusable topic templates, named enumerations and the global
//! topic policy.

use super::{deserialize_properties, normalize_name, topic_sizing, Properties};
use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blueprint {
    pub topic_policy: TopicPolicy,
    pub templates: Vec<TopicTemplate>,
    /// Named value lists scope nodes can reference instead of inline values
    pub enumerations: BTreeMap<String, Vec<String>>,
}

/// Global defaults plus the key filter applied to every override layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicPolicy {
    #[serde(deserialize_with = "deserialize_properties")]
    pub defaults: Properties,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicTemplate {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub overrides: Properties,
}

impl TopicPolicy {
    /// A key passes when the whitelist is empty or names it, and a non-empty
    /// blacklist does not name it.
    pub fn allows(&self, key: &str) -> bool {
        let whitelisted = self.whitelist.is_empty() || self.whitelist.iter().any(|k| k == key);
        let blacklisted = !self.blacklist.is_empty() && self.blacklist.iter().any(|k| k == key);
        whitelisted && !blacklisted
    }
}

impl Blueprint {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Template lookup ignores case and surrounding whitespace.
    pub fn template(&self, name: &str) -> Option<&TopicTemplate> {
        let wanted = normalize_name(name);
        self.templates.iter().find(|t| normalize_name(&t.name) == wanted)
    }

    pub fn enumeration(&self, name: &str) -> Option<&Vec<String>> {
        let wanted = normalize_name(name);
        self.enumerations
            .iter()
            .find(|(key, _)| normalize_name(key) == wanted)
            .map(|(_, values)| values)
    }

    pub fn validate(&self) -> Result<()> {
        topic_sizing("topic_policy.defaults", &self.topic_policy.defaults)?;

        let mut seen = HashSet::new();
        for (index, template) in self.templates.iter().enumerate() {
            let name = normalize_name(&template.name);
            if name.is_empty() {
                return Err(ProvisionError::InvalidConfig(format!(
                    "templates[{}].name cannot be empty",
                    index
                )));
            }
            if !seen.insert(name) {
                return Err(ProvisionError::InvalidConfig(format!(
                    "templates[{}].name '{}' is duplicated",
                    index, template.name
                )));
            }
            topic_sizing(
                &format!("templates[{}:{}].overrides", index, template.name),
                &template.overrides,
            )?;
        }

        for (name, values) in &self.enumerations {
            if values.iter().all(|v| v.trim().is_empty()) {
                return Err(ProvisionError::InvalidConfig(format!(
                    "enumerations.{} must contain at least one value",
                    name
                )));
            }
        }

        Ok(())
    }
}
