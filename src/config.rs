use crate::acl::AclBackend;
use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables starting with this prefix override file settings,
/// e.g. `SCOPEFORGE__ENGINE__DRY_RUN=true`.
pub const ENV_PREFIX: &str = "SCOPEFORGE";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub retry: RetryConfig,
    pub clusters: Vec<ClusterConfig>,
    pub blueprint_path: PathBuf,
    pub definitions_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Token placed between scope values and topic fragments
    pub separator: String,
    /// Sentinel marking a prefix (wildcard) topic name
    pub wildcard: String,
    /// Delete topics and ACLs present in the cluster but absent from the definitions
    pub delete_unknown: bool,
    /// Compute and report the plan without mutating the cluster
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per create/delete call before the element is reported failed
    pub max_attempts: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Polls of live state while waiting for metadata to converge
    pub sync_poll_attempts: u32,
    pub sync_poll_interval_ms: u64,
    /// Attempts to close the cluster connection on shutdown
    pub close_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub bootstrap_servers: Vec<String>,
    #[serde(default)]
    pub acl_backend: AclBackend,
    #[serde(default)]
    pub security: ClusterSecurityConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSecurityConfig {
    pub protocol: SecurityProtocol,
    pub sasl_mechanism: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_location: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProtocol {
    #[default]
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn uses_sasl(&self) -> bool {
        matches!(self, SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl)
    }
}

fn default_enabled() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            wildcard: "*".to_string(),
            delete_unknown: false,
            dry_run: false,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_initial_ms: 100,
            backoff_max_ms: 5_000,
            sync_poll_attempts: 5,
            sync_poll_interval_ms: 500,
            close_attempts: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            retry: RetryConfig::default(),
            clusters: vec![ClusterConfig {
                name: "local".to_string(),
                enabled: true,
                bootstrap_servers: vec!["localhost:9092".to_string()],
                acl_backend: AclBackend::Native,
                security: ClusterSecurityConfig::default(),
            }],
            blueprint_path: PathBuf::from("blueprint.toml"),
            definitions_path: PathBuf::from("definitions.toml"),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "engine.separator cannot be empty".to_string(),
            ));
        }

        if self.wildcard.is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "engine.wildcard cannot be empty".to_string(),
            ));
        }

        if self.separator.contains(&self.wildcard) {
            return Err(ProvisionError::InvalidConfig(
                "engine.separator must not contain the wildcard".to_string(),
            ));
        }

        Ok(())
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ProvisionError::InvalidConfig(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.backoff_initial_ms > self.backoff_max_ms {
            return Err(ProvisionError::InvalidConfig(
                "retry.backoff_initial_ms must not exceed retry.backoff_max_ms".to_string(),
            ));
        }

        if self.sync_poll_attempts == 0 {
            return Err(ProvisionError::InvalidConfig(
                "retry.sync_poll_attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl ClusterConfig {
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ProvisionError::InvalidConfig(format!(
                "clusters[{}].name cannot be empty",
                index
            )));
        }

        if self.enabled && self.bootstrap_servers.is_empty() {
            return Err(ProvisionError::InvalidConfig(format!(
                "clusters[{}].bootstrap_servers cannot be empty for an enabled cluster",
                index
            )));
        }

        if self.security.protocol.uses_sasl() {
            if self.security.sasl_mechanism.as_deref().unwrap_or("").is_empty() {
                return Err(ProvisionError::InvalidConfig(format!(
                    "clusters[{}].security.sasl_mechanism is required for SASL protocols",
                    index
                )));
            }
            if self.security.username.as_deref().unwrap_or("").is_empty() {
                return Err(ProvisionError::InvalidConfig(format!(
                    "clusters[{}].security.username is required for SASL protocols",
                    index
                )));
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load a TOML file and layer `SCOPEFORGE__*` environment overrides on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProvisionError::NotFound(format!(
                "config file {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.retry.validate()?;

        if self.clusters.is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "clusters must contain at least one cluster".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (index, cluster) in self.clusters.iter().enumerate() {
            cluster.validate(index)?;
            if !seen.insert(cluster.name.as_str()) {
                return Err(ProvisionError::InvalidConfig(format!(
                    "clusters[{}].name '{}' is duplicated",
                    index, cluster.name
                )));
            }
        }

        Ok(())
    }

    pub fn enabled_clusters(&self) -> impl Iterator<Item = &ClusterConfig> {
        self.clusters.iter().filter(|c| c.enabled)
    }

    /// The named cluster, or the first enabled one when no name is given.
    pub fn select_cluster(&self, name: Option<&str>) -> Result<&ClusterConfig> {
        match name {
            Some(name) => self
                .clusters
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| ProvisionError::NotFound(format!("cluster '{}'", name))),
            None => self
                .enabled_clusters()
                .next()
                .ok_or_else(|| ProvisionError::NotFound("no enabled cluster".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.separator, ".");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.sync_poll_attempts, 5);
    }

    #[test]
    fn test_config_validation_separator() {
        let mut config = Config::default();

        config.engine.separator = String::new();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("engine.separator cannot be empty"));

        config.engine.separator = ".*".to_string();
        assert!(config.validate().is_err());

        config.engine.separator = "-".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_clusters() {
        let mut config = Config::default();
        config.clusters[0].name = " ".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("clusters[0].name cannot be empty"));

        let mut config = Config::default();
        let duplicate = config.clusters[0].clone();
        config.clusters.push(duplicate);
        assert!(config.validate().unwrap_err().to_string().contains("is duplicated"));

        let mut config = Config::default();
        config.clusters[0].security.protocol = SecurityProtocol::SaslSsl;
        assert!(config.validate().unwrap_err().to_string().contains("sasl_mechanism"));
        config.clusters[0].security.sasl_mechanism = Some("SCRAM-SHA-512".to_string());
        config.clusters[0].security.username = Some("provisioner".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_retry() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().unwrap_err().to_string().contains("retry.max_attempts"));

        let mut config = Config::default();
        config.retry.backoff_initial_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [engine]
            separator = "_"

            [[clusters]]
            name = "prod"
            bootstrap_servers = ["broker-1:9092"]
            acl_backend = "rbac"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.separator, "_");
        assert_eq!(config.engine.wildcard, "*");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.clusters.len(), 1);
        assert!(config.clusters[0].enabled);
        assert_eq!(config.clusters[0].acl_backend, AclBackend::Rbac);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_select_cluster() {
        let mut config = Config::default();
        config.clusters[0].enabled = false;
        config.clusters.push(ClusterConfig {
            name: "secondary".to_string(),
            enabled: true,
            bootstrap_servers: vec!["b:9092".to_string()],
            acl_backend: AclBackend::Native,
            security: ClusterSecurityConfig::default(),
        });

        assert_eq!(config.select_cluster(None).unwrap().name, "secondary");
        assert_eq!(config.select_cluster(Some("local")).unwrap().name, "local");
        assert!(config.select_cluster(Some("missing")).is_err());
    }
}
