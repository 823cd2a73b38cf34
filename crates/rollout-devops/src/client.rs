//! DevOps REST client
//!
//! One [`DevOpsClient`] backs all four engine sources: environment deployment
//! history, build metadata, release metadata, and git merge-base queries.
//! Every request is sent exactly once; retries and caching are left to the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use rollout_core::{
    AncestryQuerySource, BuildMetadataSource, BuildRecord, DeploymentAttempt,
    DeploymentHistorySource, ReleaseMetadataSource, ReleaseRecord, RevisionId, SourceResult,
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::DevOpsConfig;
use crate::error::{DevOpsError, Result};
use crate::wire;

pub const API_VERSION: &str = "7.1";

/// HTTP client for a single DevOps project
#[derive(Debug, Clone)]
pub struct DevOpsClient {
    config: DevOpsConfig,
    organization_base: Url,
    release_base: Url,
    http_client: reqwest::Client,
}

impl DevOpsClient {
    pub fn new(config: DevOpsConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("rollout-devops/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build()?;

        Ok(DevOpsClient {
            organization_base: config.organization_base()?,
            release_base: config.release_base()?,
            config,
            http_client,
        })
    }

    /// Create client from `ROLLOUT_DEVOPS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(DevOpsConfig::from_env()?)
    }

    pub fn config(&self) -> &DevOpsConfig {
        &self.config
    }

    /// `{base}/{project}/{segments...}?api-version=...`
    fn project_url(&self, base: &Url, segments: &[&str]) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| DevOpsError::InvalidConfig(format!("{base} cannot be a base URL")))?
            .pop_if_empty()
            .push(&self.config.project)
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    /// GET a JSON document. A 404 is `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        debug!(url = %url, "GET");
        let mut request = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.config.token {
            request = request.basic_auth("", Some(token));
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "not found");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "DevOps request failed");
            return Err(DevOpsError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Recent deployment records of an environment, newest first.
    #[instrument(skip(self))]
    pub async fn deployment_records(
        &self,
        environment_id: &str,
        limit: usize,
    ) -> Result<Vec<DeploymentAttempt>> {
        let mut url = self.project_url(
            &self.organization_base,
            &[
                "_apis",
                "distributedtask",
                "environments",
                environment_id,
                "environmentdeploymentrecords",
            ],
        )?;
        url.query_pairs_mut().append_pair("top", &limit.to_string());

        let list: wire::ListResponse<wire::DeploymentRecord> =
            self.get_json(url.clone()).await?.ok_or(DevOpsError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            })?;
        let total = list.value.len();
        let attempts: Vec<DeploymentAttempt> = list
            .value
            .into_iter()
            .filter_map(wire::DeploymentRecord::into_attempt)
            .take(limit)
            .collect();
        if attempts.len() < total.min(limit) {
            debug!(
                dropped = total - attempts.len(),
                "deployment records without owner or timestamps ignored"
            );
        }
        Ok(attempts)
    }

    #[instrument(skip(self))]
    pub async fn build(&self, build_id: u64) -> Result<Option<BuildRecord>> {
        let id = build_id.to_string();
        let url = self.project_url(&self.organization_base, &["_apis", "build", "builds", &id])?;
        match self.get_json::<wire::Build>(url).await? {
            Some(build) => build.into_record().map(Some).ok_or_else(|| {
                DevOpsError::Decode(format!("build {build_id} has no timestamps"))
            }),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn release(&self, release_id: u64) -> Result<Option<ReleaseRecord>> {
        let id = release_id.to_string();
        let url = self.project_url(&self.release_base, &["_apis", "release", "releases", &id])?;
        Ok(self
            .get_json::<wire::Release>(url)
            .await?
            .map(wire::Release::into_record))
    }

    /// Merge bases of `a` and `b` in `repository`.
    #[instrument(skip(self, a, b), fields(a = %a.short(), b = %b.short()))]
    pub async fn merge_bases(
        &self,
        repository: &str,
        a: &RevisionId,
        b: &RevisionId,
    ) -> Result<Vec<RevisionId>> {
        let mut url = self.project_url(
            &self.organization_base,
            &[
                "_apis",
                "git",
                "repositories",
                repository,
                "commits",
                a.as_str(),
                "mergebases",
            ],
        )?;
        url.query_pairs_mut().append_pair("otherCommitId", b.as_str());

        let list: wire::ListResponse<wire::CommitRef> =
            self.get_json(url.clone()).await?.ok_or(DevOpsError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            })?;
        Ok(list
            .value
            .into_iter()
            .map(|c| RevisionId::new(c.commit_id))
            .collect())
    }
}

#[async_trait]
impl DeploymentHistorySource for DevOpsClient {
    async fn list_deployment_attempts(
        &self,
        external_environment_id: &str,
        limit: usize,
    ) -> SourceResult<Vec<DeploymentAttempt>> {
        Ok(self.deployment_records(external_environment_id, limit).await?)
    }
}

#[async_trait]
impl BuildMetadataSource for DevOpsClient {
    async fn get_build(&self, build_id: u64) -> SourceResult<Option<BuildRecord>> {
        Ok(self.build(build_id).await?)
    }
}

#[async_trait]
impl ReleaseMetadataSource for DevOpsClient {
    async fn get_release(&self, release_id: u64) -> SourceResult<Option<ReleaseRecord>> {
        Ok(self.release(release_id).await?)
    }
}

#[async_trait]
impl AncestryQuerySource for DevOpsClient {
    async fn merge_base(
        &self,
        repository: &str,
        a: &RevisionId,
        b: &RevisionId,
    ) -> SourceResult<Vec<RevisionId>> {
        Ok(self.merge_bases(repository, a, b).await?)
    }
}
