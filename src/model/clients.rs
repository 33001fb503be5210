//! Client role definitions attached to scope nodes and ad-hoc topics

use crate::acl::mapping::{SIDE_APPLICATION_ID, SIDE_CONNECT_GROUP, SIDE_CONSUMER_GROUP, SIDE_SERVICE_ID};
use crate::acl::{AbstractRole, SideData};
use serde::{Deserialize, Serialize};

pub const WILDCARD_HOST: &str = "*";

fn default_hostnames() -> Vec<String> {
    vec![WILDCARD_HOST.to_string()]
}

/// Common view over every client kind
pub trait ClientDefinition {
    fn kind(&self) -> &'static str;
    fn principal(&self) -> &str;
    fn group(&self) -> &str;
    fn hostnames(&self) -> &[String];

    /// Abstract roles this client implies for each topic it is attached to
    fn roles(&self) -> Vec<AbstractRole>;

    fn side_data(&self) -> SideData {
        SideData::new()
    }

    /// Checks beyond the ones every client kind shares
    fn validate_kind(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Principal and hostname checks, then [`validate_kind`](Self::validate_kind).
    /// The returned message is prefixed with the client's location by the caller.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.principal().trim().is_empty() {
            return Err("principal cannot be empty".to_string());
        }
        if self.hostnames().iter().any(|h| h.trim().is_empty()) {
            return Err("hostnames cannot contain blank entries".to_string());
        }
        self.validate_kind()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorDirection {
    #[default]
    Source,
    Sink,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDirection {
    #[default]
    Read,
    Write,
    ReadWrite,
}

impl AccessDirection {
    fn reads(&self) -> bool {
        matches!(self, AccessDirection::Read | AccessDirection::ReadWrite)
    }

    fn writes(&self) -> bool {
        matches!(self, AccessDirection::Write | AccessDirection::ReadWrite)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerDefinition {
    pub principal: String,
    /// Transactional id (prefix) used for idempotent and transactional writes
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_hostnames")]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub enable_idempotence: bool,
    #[serde(default)]
    pub transactional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerDefinition {
    pub principal: String,
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_hostnames")]
    pub hostnames: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    pub principal: String,
    /// Group id of the connect cluster running the connector
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_hostnames")]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub direction: ConnectorDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDefinition {
    pub principal: String,
    /// Application id; also the prefix of the app's groups and internal topics
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_hostnames")]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub direction: AccessDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryEngineDefinition {
    pub principal: String,
    /// Service id of the query engine cluster
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_hostnames")]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub direction: AccessDirection,
}

impl ClientDefinition for ProducerDefinition {
    fn kind(&self) -> &'static str {
        "producer"
    }

    fn principal(&self) -> &str {
        &self.principal
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    fn roles(&self) -> Vec<AbstractRole> {
        let mut roles = vec![AbstractRole::Producer];
        if self.transactional {
            roles.push(AbstractRole::TransactionalProducer);
        }
        if self.enable_idempotence {
            roles.push(AbstractRole::IdempotentProducer);
        }
        roles
    }

    fn validate_kind(&self) -> std::result::Result<(), String> {
        if self.enable_idempotence && self.group.trim().is_empty() {
            return Err("enable_idempotence requires a group".to_string());
        }
        if self.transactional && self.group.trim().is_empty() {
            return Err("transactional requires a group".to_string());
        }
        Ok(())
    }
}

impl ClientDefinition for ConsumerDefinition {
    fn kind(&self) -> &'static str {
        "consumer"
    }

    fn principal(&self) -> &str {
        &self.principal
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    fn roles(&self) -> Vec<AbstractRole> {
        vec![AbstractRole::Consumer]
    }

    fn side_data(&self) -> SideData {
        group_side_data(SIDE_CONSUMER_GROUP, &self.group)
    }
}

impl ClientDefinition for ConnectorDefinition {
    fn kind(&self) -> &'static str {
        "connector"
    }

    fn principal(&self) -> &str {
        &self.principal
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    fn roles(&self) -> Vec<AbstractRole> {
        match self.direction {
            ConnectorDirection::Source => vec![AbstractRole::SourceConnector],
            ConnectorDirection::Sink => vec![AbstractRole::SinkConnector],
        }
    }

    fn side_data(&self) -> SideData {
        group_side_data(SIDE_CONNECT_GROUP, &self.group)
    }
}

impl ClientDefinition for StreamDefinition {
    fn kind(&self) -> &'static str {
        "stream"
    }

    fn principal(&self) -> &str {
        &self.principal
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    fn roles(&self) -> Vec<AbstractRole> {
        let mut roles = Vec::new();
        if self.direction.reads() {
            roles.push(AbstractRole::StreamRead);
        }
        if self.direction.writes() {
            roles.push(AbstractRole::StreamWrite);
        }
        roles
    }

    fn side_data(&self) -> SideData {
        group_side_data(SIDE_APPLICATION_ID, &self.group)
    }

    fn validate_kind(&self) -> std::result::Result<(), String> {
        if self.group.trim().is_empty() {
            return Err("stream applications require a group (application id)".to_string());
        }
        Ok(())
    }
}

impl ClientDefinition for QueryEngineDefinition {
    fn kind(&self) -> &'static str {
        "query_engine"
    }

    fn principal(&self) -> &str {
        &self.principal
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    fn roles(&self) -> Vec<AbstractRole> {
        let mut roles = Vec::new();
        if self.direction.reads() {
            roles.push(AbstractRole::QueryEngineRead);
        }
        if self.direction.writes() {
            roles.push(AbstractRole::QueryEngineWrite);
        }
        roles
    }

    fn side_data(&self) -> SideData {
        group_side_data(SIDE_SERVICE_ID, &self.group)
    }

    fn validate_kind(&self) -> std::result::Result<(), String> {
        if self.group.trim().is_empty() {
            return Err("query engines require a group (service id)".to_string());
        }
        Ok(())
    }
}

fn group_side_data(key: &str, group: &str) -> SideData {
    let mut side_data = SideData::new();
    if !group.trim().is_empty() {
        side_data.insert(key.to_string(), group.trim().to_string());
    }
    side_data
}

/// All clients declared at one place in the definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRoles {
    pub consumers: Vec<ConsumerDefinition>,
    pub producers: Vec<ProducerDefinition>,
    pub connectors: Vec<ConnectorDefinition>,
    pub streams: Vec<StreamDefinition>,
    pub query_engines: Vec<QueryEngineDefinition>,
}

impl ClientRoles {
    pub fn iter(&self) -> impl Iterator<Item = &dyn ClientDefinition> {
        self.consumers
            .iter()
            .map(|c| c as &dyn ClientDefinition)
            .chain(self.producers.iter().map(|c| c as &dyn ClientDefinition))
            .chain(self.connectors.iter().map(|c| c as &dyn ClientDefinition))
            .chain(self.streams.iter().map(|c| c as &dyn ClientDefinition))
            .chain(self.query_engines.iter().map(|c| c as &dyn ClientDefinition))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Validate every client, naming the first offender by `location`.
    pub fn validate(&self, location: &str) -> std::result::Result<(), String> {
        for client in self.iter() {
            client.validate().map_err(|reason| {
                format!(
                    "{}.{} '{}': {}",
                    location,
                    client.kind(),
                    client.principal(),
                    reason
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotent_producer_without_group_is_rejected() {
        let producer = ProducerDefinition {
            principal: "svc1".to_string(),
            enable_idempotence: true,
            hostnames: default_hostnames(),
            ..Default::default()
        };
        let err = producer.validate().unwrap_err();
        assert!(err.contains("enable_idempotence requires a group"));

        let producer = ProducerDefinition {
            group: "tx-payments".to_string(),
            ..producer
        };
        assert!(producer.validate().is_ok());
    }

    #[test]
    fn test_producer_roles() {
        let producer = ProducerDefinition {
            principal: "svc1".to_string(),
            group: "tx".to_string(),
            hostnames: default_hostnames(),
            enable_idempotence: true,
            transactional: true,
        };
        assert_eq!(
            producer.roles(),
            vec![
                AbstractRole::Producer,
                AbstractRole::TransactionalProducer,
                AbstractRole::IdempotentProducer
            ]
        );
    }

    #[test]
    fn test_stream_and_query_engine_directions() {
        let stream = StreamDefinition {
            principal: "app".to_string(),
            group: "enricher".to_string(),
            hostnames: default_hostnames(),
            direction: AccessDirection::ReadWrite,
        };
        assert_eq!(stream.roles(), vec![AbstractRole::StreamRead, AbstractRole::StreamWrite]);
        assert_eq!(stream.side_data().get(SIDE_APPLICATION_ID).unwrap(), "enricher");

        let engine = QueryEngineDefinition {
            principal: "ksql".to_string(),
            group: String::new(),
            hostnames: default_hostnames(),
            direction: AccessDirection::Write,
        };
        assert_eq!(engine.roles(), vec![AbstractRole::QueryEngineWrite]);
        assert!(engine.validate().unwrap_err().contains("service id"));
    }

    #[test]
    fn test_client_roles_validate_names_location() {
        let roles = ClientRoles {
            consumers: vec![ConsumerDefinition {
                principal: "  ".to_string(),
                group: "g".to_string(),
                hostnames: default_hostnames(),
            }],
            ..Default::default()
        };
        let err = roles.validate("scope[env]").unwrap_err();
        assert!(err.starts_with("scope[env].consumer"));
        assert!(err.contains("principal cannot be empty"));
    }

    #[test]
    fn test_hostnames_default_to_wildcard() {
        let consumer: ConsumerDefinition = toml::from_str(r#"principal = "svc1""#).unwrap();
        assert_eq!(consumer.hostnames, vec!["*".to_string()]);
        assert!(consumer.side_data().is_empty());
    }

    #[test]
    fn test_iter_covers_every_kind() {
        let roles = ClientRoles {
            consumers: vec![ConsumerDefinition { principal: "c".into(), ..Default::default() }],
            producers: vec![ProducerDefinition { principal: "p".into(), ..Default::default() }],
            connectors: vec![ConnectorDefinition { principal: "k".into(), ..Default::default() }],
            streams: vec![StreamDefinition { principal: "s".into(), ..Default::default() }],
            query_engines: vec![QueryEngineDefinition { principal: "q".into(), ..Default::default() }],
        };
        let kinds: Vec<&str> = roles.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["consumer", "producer", "connector", "stream", "query_engine"]);
        assert_eq!(roles.len(), 5);
    }

    #[test]
    fn test_blank_hostnames_rejected_for_every_kind() {
        let blank = vec!["10.0.0.1".to_string(), " ".to_string()];
        let clients: Vec<Box<dyn ClientDefinition>> = vec![
            Box::new(ConsumerDefinition {
                principal: "c".into(),
                hostnames: blank.clone(),
                ..Default::default()
            }),
            Box::new(ProducerDefinition {
                principal: "p".into(),
                group: "tx".into(),
                hostnames: blank.clone(),
                enable_idempotence: true,
                ..Default::default()
            }),
            Box::new(ConnectorDefinition {
                principal: "k".into(),
                hostnames: blank.clone(),
                ..Default::default()
            }),
            Box::new(StreamDefinition {
                principal: "s".into(),
                group: "app".into(),
                hostnames: blank.clone(),
                ..Default::default()
            }),
            Box::new(QueryEngineDefinition {
                principal: "q".into(),
                group: "svc".into(),
                hostnames: blank,
                ..Default::default()
            }),
        ];

        for client in &clients {
            let err = client.validate().unwrap_err();
            assert!(err.contains("hostnames cannot contain blank entries"), "{}: {}", client.kind(), err);
        }
    }

    #[test]
    fn test_blank_principal_rejected_before_kind_checks() {
        let producer = ProducerDefinition {
            principal: " ".to_string(),
            hostnames: default_hostnames(),
            enable_idempotence: true,
            ..Default::default()
        };
        assert_eq!(producer.validate().unwrap_err(), "principal cannot be empty");

        let stream = StreamDefinition {
            principal: String::new(),
            hostnames: default_hostnames(),
            ..Default::default()
        };
        assert_eq!(stream.validate().unwrap_err(), "principal cannot be empty");
    }
}
