//! Top-level provisioning runs: validated inputs, one expansion, then a plan
//! or reconcile per selected cluster.

use crate::acl::Translation;
use crate::config::{ClusterConfig, Config};
use crate::engine::{EngineContext, Expansion};
use crate::error::{ProvisionError, Result};
use crate::model::{Blueprint, Definitions};
use crate::reconcile::{ClusterClient, DesiredState, ReconcilePlan, ReconcileReport, Reconciler};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One cluster: the named one or the first enabled
    #[default]
    Single,
    /// Every enabled cluster in turn
    Multi,
    /// Copy state between clusters
    Migration,
    /// Derive definitions from an existing cluster
    Generate,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(RunMode::Single),
            "multi" => Ok(RunMode::Multi),
            "migration" => Ok(RunMode::Migration),
            "generate" => Ok(RunMode::Generate),
            _ => Err(format!(
                "Invalid run mode: {}. Valid modes: single, multi, migration, generate",
                s
            )),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Single => write!(f, "single"),
            RunMode::Multi => write!(f, "multi"),
            RunMode::Migration => write!(f, "migration"),
            RunMode::Generate => write!(f, "generate"),
        }
    }
}

pub struct Provisioner {
    config: Config,
    ctx: EngineContext,
    expansion: Expansion,
}

impl Provisioner {
    /// Validate everything, then expand once.
    pub fn new(config: Config, blueprint: Blueprint, definitions: Definitions) -> Result<Self> {
        config.validate()?;
        let ctx = EngineContext::new(&config.engine, blueprint, definitions)?;
        let expansion = ctx.expand()?;
        Ok(Self { config, ctx, expansion })
    }

    /// Load the blueprint and definitions the config points at.
    pub fn from_config(config: Config) -> Result<Self> {
        let blueprint = Blueprint::from_file(&config.blueprint_path)?;
        let definitions = Definitions::from_file(&config.definitions_path)?;
        Self::new(config, blueprint, definitions)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn expansion(&self) -> &Expansion {
        &self.expansion
    }

    pub fn desired_state(&self, cluster: &ClusterConfig) -> Result<(DesiredState, Translation)> {
        DesiredState::build(&self.ctx, &self.expansion, cluster.acl_backend)
    }

    /// Clusters a run in `mode` targets.
    pub fn clusters(&self, mode: RunMode, name: Option<&str>) -> Result<Vec<&ClusterConfig>> {
        match mode {
            RunMode::Single => Ok(vec![self.config.select_cluster(name)?]),
            RunMode::Multi => {
                let clusters: Vec<&ClusterConfig> = self.config.enabled_clusters().collect();
                if clusters.is_empty() {
                    return Err(ProvisionError::NotFound("no enabled cluster".to_string()));
                }
                Ok(clusters)
            }
            RunMode::Migration | RunMode::Generate => Err(ProvisionError::UnsupportedMode(mode.to_string())),
        }
    }

    pub fn reconciler(&self, cluster: &ClusterConfig, client: Arc<dyn ClusterClient>) -> Reconciler {
        Reconciler::new(
            cluster.name.clone(),
            client,
            self.config.retry.clone(),
            self.config.engine.delete_unknown,
        )
    }

    pub async fn plan(&self, cluster: &ClusterConfig, client: Arc<dyn ClusterClient>) -> Result<ReconcilePlan> {
        let (desired, _) = self.desired_state(cluster)?;
        self.reconciler(cluster, client).plan(&desired).await
    }

    /// Bring `cluster` to the desired state. `dry_run` (or `engine.dry_run`)
    /// reports the plan without mutating anything.
    pub async fn apply(
        &self,
        cluster: &ClusterConfig,
        client: Arc<dyn ClusterClient>,
        dry_run: bool,
    ) -> Result<ReconcileReport> {
        let (desired, translation) = self.desired_state(cluster)?;
        if !translation.rejected.is_empty() {
            info!(
                "{} ACL entries cannot be expressed for {} ({} backend) and were skipped",
                translation.rejected.len(),
                cluster.name,
                cluster.acl_backend
            );
        }

        let reconciler = self.reconciler(cluster, client);
        let plan = reconciler.plan(&desired).await?;
        Ok(reconciler.run(plan, dry_run || self.config.engine.dry_run).await)
    }

    /// Remove everything this configuration provisions on `cluster`.
    pub async fn teardown(
        &self,
        cluster: &ClusterConfig,
        client: Arc<dyn ClusterClient>,
        dry_run: bool,
    ) -> Result<ReconcileReport> {
        let (desired, _) = self.desired_state(cluster)?;
        let reconciler = self.reconciler(cluster, client);
        let plan = reconciler.plan_teardown(&desired).await?;
        Ok(reconciler.run(plan, dry_run || self.config.engine.dry_run).await)
    }
}
