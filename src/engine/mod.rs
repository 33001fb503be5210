//! Expansion engine: scope chain to topic names, client mappings and
//! effective topic configuration.

pub mod expansion;
pub mod permute;
pub mod topic_config;
pub mod utm;

pub use permute::{permute, permute_joined};
pub use topic_config::{TopicConfigMapping, TopicConfigMerger, TopicSpec};
pub use utm::{UserTopicMapping, UtmBuilder, UtmKey, UtmValue};

use crate::acl::{build_acl_mapping, determine_pattern_type, resource_pattern, AclMapping, PatternType};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{Blueprint, Definitions};

/// Everything expansion reads, built once from validated configuration and
/// passed by reference.
#[derive(Debug)]
pub struct EngineContext {
    pub separator: String,
    pub wildcard: String,
    pub blueprint: Blueprint,
    pub definitions: Definitions,
    pub merger: TopicConfigMerger,
}

impl EngineContext {
    /// Validate every input and build the context. Nothing downstream
    /// re-checks what is rejected here.
    pub fn new(engine: &EngineConfig, blueprint: Blueprint, definitions: Definitions) -> Result<Self> {
        engine.validate()?;
        blueprint.validate()?;
        definitions.validate(&blueprint)?;

        Ok(Self {
            separator: engine.separator.clone(),
            wildcard: engine.wildcard.clone(),
            blueprint,
            definitions,
            merger: TopicConfigMerger::new(),
        })
    }

    /// Candidate ends in `separator + wildcard`
    pub fn is_wildcard_topic(&self, name: &str) -> bool {
        self.pattern_type(name) == PatternType::Prefixed
    }

    pub fn pattern_type(&self, name: &str) -> PatternType {
        determine_pattern_type(name, &self.separator, &self.wildcard)
    }

    pub fn acl_resource(&self, name: &str) -> (String, PatternType) {
        resource_pattern(name, &self.separator, &self.wildcard)
    }

    pub fn expand(&self) -> Result<Expansion> {
        expansion::expand(self)
    }
}

/// Output of one expansion run
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub utm: UserTopicMapping,
    pub tcm: TopicConfigMapping,
}

impl Expansion {
    /// Concrete topic names, sorted
    pub fn topics(&self) -> Vec<String> {
        self.tcm.topic_names().cloned().collect()
    }

    /// Abstract ACL entries implied by the client mappings
    pub fn acl_mapping(&self, ctx: &EngineContext) -> AclMapping {
        build_acl_mapping(&self.utm, &ctx.separator, &ctx.wildcard)
    }
}
