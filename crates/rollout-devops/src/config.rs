//! Connection settings for the DevOps REST API

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{DevOpsError, Result};

pub const ORG_ENV: &str = "ROLLOUT_DEVOPS_ORG";
pub const PROJECT_ENV: &str = "ROLLOUT_DEVOPS_PROJECT";
pub const RELEASE_URL_ENV: &str = "ROLLOUT_DEVOPS_RELEASE_URL";
pub const TOKEN_ENV: &str = "ROLLOUT_DEVOPS_TOKEN";

const CLOUD_HOST: &str = "dev.azure.com";
const CLOUD_RELEASE_HOST: &str = "vsrm.dev.azure.com";
const LEGACY_HOST_SUFFIX: &str = ".visualstudio.com";

/// DevOps organization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevOpsConfig {
    /// Organization URL, e.g. `https://dev.azure.com/contoso`
    pub organization_url: String,
    pub project: String,
    /// Release management URL; derived from the organization URL when unset
    pub release_url: Option<String>,
    /// Personal access token. Acquiring it is the caller's job.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

impl DevOpsConfig {
    pub fn new(organization_url: &str, project: &str) -> Self {
        DevOpsConfig {
            organization_url: organization_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            release_url: None,
            token: None,
            request_timeout_secs: None,
        }
    }

    /// Create a config from `ROLLOUT_DEVOPS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| DevOpsError::InvalidConfig(format!("{key} is not set")))
        };
        let mut config = Self::new(&required(ORG_ENV)?, &required(PROJECT_ENV)?);
        config.release_url = lookup(RELEASE_URL_ENV).filter(|v| !v.trim().is_empty());
        config.token = lookup(TOKEN_ENV).filter(|v| !v.is_empty());
        config.validate()?;
        Ok(config)
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_release_url(mut self, release_url: &str) -> Self {
        self.release_url = Some(release_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(DevOpsError::InvalidConfig("project is empty".to_string()));
        }
        self.organization_base()?;
        self.release_base()?;
        Ok(())
    }

    pub fn organization_base(&self) -> Result<Url> {
        parse_base(&self.organization_url)
    }

    /// Base URL for release management.
    ///
    /// `https://dev.azure.com/{org}` becomes `https://vsrm.dev.azure.com/{org}`
    /// and `https://{org}.visualstudio.com` becomes
    /// `https://{org}.vsrm.visualstudio.com`. Other hosts are used as-is.
    pub fn release_base(&self) -> Result<Url> {
        if let Some(explicit) = &self.release_url {
            return parse_base(explicit);
        }
        let mut url = self.organization_base()?;
        let derived = match url.host_str() {
            Some(CLOUD_HOST) => Some(CLOUD_RELEASE_HOST.to_string()),
            Some(host) if host.ends_with(LEGACY_HOST_SUFFIX) => {
                let account = host.trim_end_matches(LEGACY_HOST_SUFFIX);
                Some(format!("{account}.vsrm{LEGACY_HOST_SUFFIX}"))
            }
            _ => None,
        };
        if let Some(host) = derived {
            url.set_host(Some(&host))
                .map_err(|e| DevOpsError::InvalidConfig(format!("release host {host}: {e}")))?;
        }
        Ok(url)
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| DevOpsError::InvalidConfig(format!("{raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(DevOpsError::InvalidConfig(format!(
            "{raw:?} cannot be used as a base URL"
        )));
    }
    Ok(url)
}
