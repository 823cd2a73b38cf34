//! Injectable collaborators the engine reads from.
//!
//! Implement these traits to plug in a real deployment service, or use the
//! in-memory implementations in [`crate::fakes`] for tests. Every method is
//! called at most once per unit of work: no retries, no caching.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DeploymentAttempt, RevisionId, SourceResult};

/// Build metadata as reported by the build service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: u64,
    /// `None` for builds that never checked out sources.
    pub source_revision: Option<RevisionId>,
    pub observed_at: DateTime<Utc>,
    pub web_link: Option<String>,
    pub origin_repository: Option<String>,
}

/// One artifact attached to a classic release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseArtifact {
    /// Either a revision id or a build id, depending on the artifact type.
    pub version_reference: String,
    pub repository: Option<String>,
}

/// Classic release metadata as reported by the release service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: u64,
    /// Primary artifact first.
    pub artifacts: Vec<ReleaseArtifact>,
    pub observed_at: DateTime<Utc>,
    pub web_link: Option<String>,
}

/// Deployment history of an environment, newest first.
#[async_trait]
pub trait DeploymentHistorySource: Send + Sync {
    async fn list_deployment_attempts(
        &self,
        external_environment_id: &str,
        limit: usize,
    ) -> SourceResult<Vec<DeploymentAttempt>>;
}

#[async_trait]
pub trait BuildMetadataSource: Send + Sync {
    /// Fetch a build, or `None` if no build has this id.
    async fn get_build(&self, build_id: u64) -> SourceResult<Option<BuildRecord>>;
}

#[async_trait]
pub trait ReleaseMetadataSource: Send + Sync {
    /// Fetch a release, or `None` if no release has this id.
    async fn get_release(&self, release_id: u64) -> SourceResult<Option<ReleaseRecord>>;
}

/// Access to the source-control history graph.
#[async_trait]
pub trait AncestryQuerySource: Send + Sync {
    /// Lowest common ancestors of `a` and `b` within `repository`.
    async fn merge_base(
        &self,
        repository: &str,
        a: &RevisionId,
        b: &RevisionId,
    ) -> SourceResult<Vec<RevisionId>>;
}

/// The set of collaborators a reconciliation reads from.
#[derive(Clone)]
pub struct Sources {
    pub history: Arc<dyn DeploymentHistorySource>,
    pub builds: Arc<dyn BuildMetadataSource>,
    pub releases: Arc<dyn ReleaseMetadataSource>,
    pub ancestry: Arc<dyn AncestryQuerySource>,
}

impl Sources {
    /// Use one client for every collaborator.
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: DeploymentHistorySource
            + BuildMetadataSource
            + ReleaseMetadataSource
            + AncestryQuerySource
            + 'static,
    {
        Self {
            history: client.clone(),
            builds: client.clone(),
            releases: client.clone(),
            ancestry: client,
        }
    }
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources").finish_non_exhaustive()
    }
}
