//! Map a deployment owner (build or classic release) onto a source revision.
//!
//! Resolution order:
//! 1. the owner as a build with a source revision;
//! 2. the owner as a release whose primary artifact names a full revision;
//! 3. the owner as a release whose primary artifact names a build, resolved
//!    once more as a build (one hop; releases are never chained).
//!
//! Lookup failures are folded into [`Resolution::Unresolved`]; nothing here
//! returns an error.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{ResolvedSourceVersion, VersionReference};
use crate::sources::{BuildMetadataSource, BuildRecord, ReleaseMetadataSource, ReleaseRecord};

/// Why an owner could not be mapped to a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Neither a build nor a release with this id exists.
    NotFound,
    /// The release has no artifacts.
    NoArtifacts,
    /// The primary artifact's version is neither a revision nor a build id.
    UnrecognizedVersion(String),
    /// The build named by the release artifact has no revision.
    NestedBuildUnresolved(u64),
    /// A lookup failed in transport.
    LookupFailed(String),
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::NotFound => write!(f, "no build or release with this id"),
            UnresolvedReason::NoArtifacts => write!(f, "release has no artifacts"),
            UnresolvedReason::UnrecognizedVersion(v) => {
                write!(f, "unrecognized artifact version '{v}'")
            }
            UnresolvedReason::NestedBuildUnresolved(id) => {
                write!(f, "artifact build {id} has no source revision")
            }
            UnresolvedReason::LookupFailed(e) => write!(f, "lookup failed: {e}"),
        }
    }
}

/// Outcome of resolving one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The owner is a build.
    Build(ResolvedSourceVersion),
    /// The owner is a release pinned directly to a revision.
    ReleaseRevision(ResolvedSourceVersion),
    /// The owner is a release of build `build_id`.
    ReleaseBuild {
        build_id: u64,
        version: ResolvedSourceVersion,
    },
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn version(&self) -> Option<&ResolvedSourceVersion> {
        match self {
            Resolution::Build(v) | Resolution::ReleaseRevision(v) => Some(v),
            Resolution::ReleaseBuild { version, .. } => Some(version),
            Resolution::Unresolved(_) => None,
        }
    }

    pub fn into_version(self) -> Option<ResolvedSourceVersion> {
        match self {
            Resolution::Build(v) | Resolution::ReleaseRevision(v) => Some(v),
            Resolution::ReleaseBuild { version, .. } => Some(version),
            Resolution::Unresolved(_) => None,
        }
    }
}

/// Resolves deployment owners through the build and release services.
#[derive(Clone)]
pub struct SourceVersionResolver {
    builds: Arc<dyn BuildMetadataSource>,
    releases: Arc<dyn ReleaseMetadataSource>,
}

impl SourceVersionResolver {
    pub fn new(
        builds: Arc<dyn BuildMetadataSource>,
        releases: Arc<dyn ReleaseMetadataSource>,
    ) -> Self {
        Self { builds, releases }
    }

    pub async fn resolve(&self, owner_id: u64) -> Resolution {
        let mut last_failure = None;

        match self.builds.get_build(owner_id).await {
            Ok(Some(build)) => {
                if let Some(version) = version_of_build(build) {
                    return Resolution::Build(version);
                }
                debug!(owner_id, "build has no source revision, trying release");
            }
            Ok(None) => {}
            Err(e) => {
                debug!(owner_id, error = %e, "build lookup failed, trying release");
                last_failure = Some(e.to_string());
            }
        }

        let release = match self.releases.get_release(owner_id).await {
            Ok(Some(release)) => release,
            Ok(None) => {
                return Resolution::Unresolved(match last_failure {
                    Some(e) => UnresolvedReason::LookupFailed(e),
                    None => UnresolvedReason::NotFound,
                })
            }
            Err(e) => return Resolution::Unresolved(UnresolvedReason::LookupFailed(e.to_string())),
        };

        self.resolve_release(release).await
    }

    async fn resolve_release(&self, release: ReleaseRecord) -> Resolution {
        let Some(artifact) = release.artifacts.first() else {
            return Resolution::Unresolved(UnresolvedReason::NoArtifacts);
        };

        match VersionReference::classify(&artifact.version_reference) {
            VersionReference::Revision(revision) => {
                Resolution::ReleaseRevision(ResolvedSourceVersion {
                    revision,
                    observed_at: release.observed_at,
                    web_link: release.web_link.clone(),
                    origin_repository: artifact.repository.clone(),
                })
            }
            VersionReference::Build(build_id) => match self.builds.get_build(build_id).await {
                Ok(Some(build)) => match version_of_build(build) {
                    Some(mut version) => {
                        // Link to what was deployed, not to the build behind it.
                        if release.web_link.is_some() {
                            version.web_link = release.web_link.clone();
                        }
                        Resolution::ReleaseBuild { build_id, version }
                    }
                    None => {
                        Resolution::Unresolved(UnresolvedReason::NestedBuildUnresolved(build_id))
                    }
                },
                Ok(None) => {
                    Resolution::Unresolved(UnresolvedReason::NestedBuildUnresolved(build_id))
                }
                Err(e) => Resolution::Unresolved(UnresolvedReason::LookupFailed(e.to_string())),
            },
            VersionReference::Unrecognized(raw) => {
                Resolution::Unresolved(UnresolvedReason::UnrecognizedVersion(raw))
            }
        }
    }
}

fn version_of_build(build: BuildRecord) -> Option<ResolvedSourceVersion> {
    let revision = build.source_revision?;
    Some(ResolvedSourceVersion {
        revision,
        observed_at: build.observed_at,
        web_link: build.web_link,
        origin_repository: build.origin_repository,
    })
}
