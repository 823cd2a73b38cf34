//! Domain models for the rollout engine.
//!
//! - `Environment` / `EnvironmentRegistry`: the configured deployment rings
//! - `DeploymentAttempt` / `AttemptGroup`: raw and grouped deployment history
//! - `RevisionId` / `ResolvedSourceVersion`: source history references
//! - `EnvironmentVerdict`: the per-environment answer

pub mod attempt;
pub mod environment;
pub mod error;
pub mod revision;
pub mod verdict;

pub use attempt::{AttemptGroup, AttemptResult, DeploymentAttempt};
pub use environment::{DeploymentCadence, Environment, EnvironmentRegistry};
pub use error::{Result, RolloutError, SourceError, SourceResult};
pub use revision::{ResolvedSourceVersion, RevisionId, VersionReference};
pub use verdict::{
    AncestryMethod, AncestryVerdict, DeploymentStatus, EnvironmentVerdict, EstimateKind,
};
