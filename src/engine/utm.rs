//! User-Topic Mapping
//!
//! Aggregates expansion output per (principal, role, group). Values only
//! ever grow by set union.

use crate::acl::{AbstractRole, SideData};
use crate::model::clients::WILDCARD_HOST;
use crate::model::ClientDefinition;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UtmKey {
    pub principal: String,
    pub role: AbstractRole,
    pub group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UtmValue {
    pub topics: BTreeSet<String>,
    pub hostnames: BTreeSet<String>,
    pub side_data: SideData,
}

impl UtmValue {
    fn absorb(&mut self, other: UtmValue) {
        self.topics.extend(other.topics);
        self.hostnames.extend(other.hostnames);
        for (key, value) in other.side_data {
            self.side_data.entry(key).or_insert(value);
        }
    }
}

/// Finished, read-only mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserTopicMapping {
    entries: BTreeMap<UtmKey, UtmValue>,
}

impl UserTopicMapping {
    pub fn get(&self, key: &UtmKey) -> Option<&UtmValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UtmKey, &UtmValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn principals(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|k| k.principal.as_str()).collect()
    }

    /// Every topic name any client of `principal` is attached to
    pub fn topics_for(&self, principal: &str) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|(key, _)| key.principal == principal)
            .flat_map(|(_, value)| value.topics.iter().map(|t| t.as_str()))
            .collect()
    }
}

/// Mutation side of the mapping. A single mutex guards every insertion so
/// concurrent producers can register through a shared reference.
#[derive(Debug, Default)]
pub struct UtmBuilder {
    entries: Mutex<BTreeMap<UtmKey, UtmValue>>,
}

impl UtmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `topic` to every role `client` implies.
    pub fn register(&self, client: &dyn ClientDefinition, topic: &str) {
        let hostnames: BTreeSet<String> = if client.hostnames().is_empty() {
            [WILDCARD_HOST.to_string()].into()
        } else {
            client.hostnames().iter().map(|h| h.trim().to_string()).collect()
        };
        let side_data = client.side_data();

        let mut entries = self.entries.lock();
        for role in client.roles() {
            let key = UtmKey {
                principal: client.principal().trim().to_string(),
                role,
                group: client.group().trim().to_string(),
            };
            entries.entry(key).or_default().absorb(UtmValue {
                topics: [topic.to_string()].into(),
                hostnames: hostnames.clone(),
                side_data: side_data.clone(),
            });
        }
    }

    /// Fold a separately built mapping into this one.
    pub fn merge(&self, other: UserTopicMapping) {
        let mut entries = self.entries.lock();
        for (key, value) in other.entries {
            entries.entry(key).or_default().absorb(value);
        }
    }

    pub fn build(self) -> UserTopicMapping {
        UserTopicMapping {
            entries: self.entries.into_inner(),
        }
    }
}
