//! Definitions document: the scope chain and ad-hoc topics

use super::{deserialize_properties, topic_sizing, Blueprint, ClientRoles, Properties};
use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definitions {
    /// Topics declared by literal name, outside the scope chain
    pub adhoc_topics: Vec<AdhocTopic>,
    /// Root of the scope chain
    pub scope: Option<ScopeNode>,
}

/// One level of the scope chain. Each node has at most one child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeNode {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    /// Blueprint enumeration to take the values from
    #[serde(default)]
    pub enumeration: Option<String>,
    /// Embed this node's value in generated topic names
    #[serde(default = "default_include_in_name")]
    pub include_in_name: bool,
    #[serde(default)]
    pub topics: TopicDefinition,
    #[serde(default)]
    pub clients: ClientRoles,
    #[serde(default)]
    pub child: Option<Box<ScopeNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicDefinition {
    /// Name fragments appended after the accumulated scope values
    pub names: Vec<String>,
    /// Scope values for which these fragments must not be generated
    pub ignore_scopes: Vec<String>,
    /// Template from the blueprint
    pub blueprint: Option<String>,
    #[serde(deserialize_with = "deserialize_properties")]
    pub overrides: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdhocTopic {
    pub names: Vec<String>,
    #[serde(default)]
    pub blueprint: Option<String>,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub overrides: Properties,
    #[serde(default)]
    pub clients: ClientRoles,
}

fn default_include_in_name() -> bool {
    true
}

impl ScopeNode {
    /// This node followed by its descendants, root first.
    pub fn chain(&self) -> impl Iterator<Item = &ScopeNode> {
        std::iter::successors(Some(self), |node| node.child.as_deref())
    }

    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// Inline values, or the referenced enumeration's values.
    pub fn resolve_tokens(&self, blueprint: &Blueprint) -> Result<Vec<String>> {
        match &self.enumeration {
            Some(name) => blueprint
                .enumeration(name)
                .cloned()
                .ok_or_else(|| ProvisionError::UnknownEnumeration(name.clone())),
            None => Ok(self.values.clone()),
        }
    }

    fn validate(&self, level: usize, blueprint: &Blueprint) -> Result<()> {
        let location = format!("scope[{}:{}]", level, self.name);

        if self.name.trim().is_empty() {
            return Err(ProvisionError::InvalidConfig(format!(
                "scope[{}].name cannot be empty",
                level
            )));
        }

        if let Some(enumeration) = &self.enumeration {
            if !self.values.is_empty() {
                return Err(ProvisionError::InvalidConfig(format!(
                    "{} declares both values and enumeration '{}'",
                    location, enumeration
                )));
            }
            if blueprint.enumeration(enumeration).is_none() {
                return Err(ProvisionError::UnknownEnumeration(format!(
                    "{} (referenced by {})",
                    enumeration, location
                )));
            }
        }

        check_template(self.topics.blueprint.as_deref(), blueprint, &location)?;
        topic_sizing(&format!("{}.topics.overrides", location), &self.topics.overrides)?;
        self.clients
            .validate(&location)
            .map_err(ProvisionError::InvalidConfig)?;

        Ok(())
    }
}

impl AdhocTopic {
    fn validate(&self, index: usize, blueprint: &Blueprint) -> Result<()> {
        let location = format!("adhoc_topics[{}]", index);

        if self.names.iter().all(|n| n.trim().is_empty()) {
            return Err(ProvisionError::InvalidConfig(format!(
                "{}.names must contain at least one name",
                location
            )));
        }

        check_template(self.blueprint.as_deref(), blueprint, &location)?;
        topic_sizing(&format!("{}.overrides", location), &self.overrides)?;
        self.clients
            .validate(&location)
            .map_err(ProvisionError::InvalidConfig)?;

        Ok(())
    }
}

fn check_template(template: Option<&str>, blueprint: &Blueprint, location: &str) -> Result<()> {
    if let Some(name) = template {
        if blueprint.template(name).is_none() {
            return Err(ProvisionError::UnknownTemplate(format!(
                "{} (referenced by {})",
                name, location
            )));
        }
    }
    Ok(())
}

impl Definitions {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn scope_chain(&self) -> impl Iterator<Item = &ScopeNode> {
        self.scope.iter().flat_map(|root| root.chain())
    }

    /// Reject everything expansion assumes cannot happen.
    pub fn validate(&self, blueprint: &Blueprint) -> Result<()> {
        for (level, node) in self.scope_chain().enumerate() {
            node.validate(level, blueprint)?;
        }

        for (index, topic) in self.adhoc_topics.iter().enumerate() {
            topic.validate(index, blueprint)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TopicTemplate;

    const DEFINITIONS: &str = r#"
        [[adhoc_topics]]
        names = ["legacy.audit"]
        blueprint = "compacted"

        [[adhoc_topics.clients.consumers]]
        principal = "auditor"
        group = "audit-readers"

        [scope]
        name = "environment"
        enumeration = "environments"

        [scope.child]
        name = "tenant"
        values = ["team-a", "team-b"]

        [scope.child.topics]
        names = ["orders", "payments"]
        ignore_scopes = ["oss"]
        overrides = { partitions = 12 }

        [[scope.child.clients.producers]]
        principal = "svc1"
        group = "tx-orders"
        enable_idempotence = true

        [scope.child.child]
        name = "stage"
        values = ["dev"]
        include_in_name = false
    "#;

    fn blueprint() -> Blueprint {
        Blueprint {
            templates: vec![TopicTemplate {
                name: "Compacted".to_string(),
                overrides: Properties::new(),
            }],
            enumerations: [(
                "environments".to_string(),
                vec!["int".to_string(), "bss".to_string(), "oss".to_string()],
            )]
            .into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_definitions() {
        let definitions = Definitions::from_toml_str(DEFINITIONS).unwrap();
        assert!(definitions.validate(&blueprint()).is_ok());

        let root = definitions.scope.as_ref().unwrap();
        assert_eq!(root.depth(), 3);
        assert!(root.include_in_name);

        let names: Vec<&str> = root.chain().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["environment", "tenant", "stage"]);

        let tenant = root.child.as_ref().unwrap();
        assert_eq!(tenant.topics.overrides.get("partitions").unwrap(), "12");
        assert_eq!(tenant.clients.producers.len(), 1);
        assert!(!tenant.child.as_ref().unwrap().include_in_name);

        let tokens = root.resolve_tokens(&blueprint()).unwrap();
        assert_eq!(tokens, vec!["int", "bss", "oss"]);
    }

    #[test]
    fn test_unknown_template_rejected() {
        let mut definitions = Definitions::from_toml_str(DEFINITIONS).unwrap();
        definitions.adhoc_topics[0].blueprint = Some("missing".to_string());
        let err = definitions.validate(&blueprint()).unwrap_err();
        assert!(matches!(err, ProvisionError::UnknownTemplate(_)));
    }

    #[test]
    fn test_unknown_enumeration_rejected() {
        let mut definitions = Definitions::from_toml_str(DEFINITIONS).unwrap();
        definitions.scope.as_mut().unwrap().enumeration = Some("regions".to_string());
        let err = definitions.validate(&blueprint()).unwrap_err();
        assert!(matches!(err, ProvisionError::UnknownEnumeration(_)));
    }

    #[test]
    fn test_idempotent_producer_without_group_fails_validation() {
        let mut definitions = Definitions::from_toml_str(DEFINITIONS).unwrap();
        let tenant = definitions.scope.as_mut().unwrap().child.as_mut().unwrap();
        tenant.clients.producers[0].group = String::new();

        let err = definitions.validate(&blueprint()).unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfig(_)));
        assert!(err.to_string().contains("scope[1:tenant].producer 'svc1'"));
    }

    #[test]
    fn test_values_and_enumeration_are_exclusive() {
        let mut definitions = Definitions::from_toml_str(DEFINITIONS).unwrap();
        definitions.scope.as_mut().unwrap().values = vec!["int".to_string()];
        assert!(definitions
            .validate(&blueprint())
            .unwrap_err()
            .to_string()
            .contains("both values and enumeration"));
    }

    #[test]
    fn test_invalid_sizing_overrides_rejected() {
        let mut definitions = Definitions::from_toml_str(DEFINITIONS).unwrap();
        let tenant = definitions.scope.as_mut().unwrap().child.as_mut().unwrap();
        tenant
            .topics
            .overrides
            .insert("partitions".to_string(), "0".to_string());
        let err = definitions.validate(&blueprint()).unwrap_err();
        assert!(err
            .to_string()
            .contains("scope[1:tenant].topics.overrides: partitions must be a positive integer"));

        let mut definitions = Definitions::from_toml_str(DEFINITIONS).unwrap();
        definitions.adhoc_topics[0]
            .overrides
            .insert("replication.factor".to_string(), "three".to_string());
        assert!(definitions
            .validate(&blueprint())
            .unwrap_err()
            .to_string()
            .contains("adhoc_topics[0].overrides: replication.factor"));
    }

    #[test]
    fn test_empty_definitions_are_valid() {
        let definitions = Definitions::default();
        assert!(definitions.validate(&Blueprint::default()).is_ok());
        assert_eq!(definitions.scope_chain().count(), 0);
    }
}
