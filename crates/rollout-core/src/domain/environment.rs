//! Deployment environments (rings) and the immutable registry that holds them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::{Result, RolloutError};

/// How changes reach an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeploymentCadence {
    /// Every successful build is rolled out as it lands.
    Continuous,
    /// Changes ride a weekly release train. `offset_days` is how long after
    /// the cycle's fork instant this ring is expected to receive the train.
    TrainBased { offset_days: i64 },
}

impl DeploymentCadence {
    pub fn is_train_based(&self) -> bool {
        matches!(self, DeploymentCadence::TrainBased { .. })
    }
}

/// One stage of the deployment topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Stable identifier used by callers (e.g. `"canary"`).
    pub id: String,
    pub display_name: String,
    /// Identifier of the environment in the deployment history service.
    pub external_environment_id: String,
    /// Product or release tag the environment belongs to.
    pub product: String,
    pub cadence: DeploymentCadence,
}

impl Environment {
    pub fn new(
        id: impl Into<String>,
        external_environment_id: impl Into<String>,
        cadence: DeploymentCadence,
    ) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            external_environment_id: external_environment_id.into(),
            product: String::new(),
            cadence,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }
}

/// Immutable table of known environments, validated once at load time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentRegistry {
    environments: Vec<Environment>,
}

impl EnvironmentRegistry {
    /// Build a registry, rejecting empty or duplicate identifiers.
    pub fn new(environments: Vec<Environment>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut external_ids = HashSet::new();
        for env in &environments {
            if env.id.trim().is_empty() {
                return Err(RolloutError::InvalidConfig(
                    "environment id must not be empty".to_string(),
                ));
            }
            if env.external_environment_id.trim().is_empty() {
                return Err(RolloutError::InvalidConfig(format!(
                    "environment '{}' has an empty external_environment_id",
                    env.id
                )));
            }
            if !ids.insert(env.id.as_str()) {
                return Err(RolloutError::DuplicateEnvironment(env.id.clone()));
            }
            if !external_ids.insert(env.external_environment_id.as_str()) {
                return Err(RolloutError::DuplicateExternalId {
                    id: env.id.clone(),
                    external_id: env.external_environment_id.clone(),
                });
            }
        }
        Ok(Self { environments })
    }

    pub fn get(&self, id: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.id == id)
    }

    /// Pick environments by id, preserving the requested order.
    ///
    /// An empty `ids` slice selects every environment.
    pub fn select(&self, ids: &[String]) -> Result<Vec<Environment>> {
        if ids.is_empty() {
            return Ok(self.environments.clone());
        }
        ids.iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| RolloutError::UnknownEnvironment(id.clone()))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Environment> {
        self.environments.iter()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
