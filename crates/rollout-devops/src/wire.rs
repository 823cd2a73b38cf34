//! JSON shapes returned by the DevOps REST API and their conversion into
//! engine records.

use chrono::{DateTime, Utc};
use rollout_core::{
    AttemptResult, BuildRecord, DeploymentAttempt, ReleaseArtifact, ReleaseRecord, RevisionId,
};
use serde::Deserialize;

/// `{ "count": n, "value": [...] }` envelope used by list endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Links {
    pub web: Option<Href>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Href {
    pub href: String,
}

fn web_link(links: &Option<Links>) -> Option<String> {
    links
        .as_ref()
        .and_then(|l| l.web.as_ref())
        .map(|h| h.href.clone())
}

#[derive(Debug, Deserialize)]
pub(crate) struct Reference {
    pub id: serde_json::Value,
    pub name: Option<String>,
    #[serde(rename = "_links")]
    pub links: Option<Links>,
}

impl Reference {
    /// Ids arrive as numbers on some endpoints and strings on others.
    fn numeric_id(&self) -> Option<u64> {
        match &self.id {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn text_id(&self) -> Option<String> {
        match &self.id {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeploymentRecord {
    pub owner: Option<Reference>,
    pub result: Option<AttemptResult>,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    /// Records without an owner id or any timestamp carry nothing the
    /// engine can use.
    pub fn into_attempt(self) -> Option<DeploymentAttempt> {
        let owner = self.owner?;
        let owner_id = owner.numeric_id()?;
        let queued_at = self.queue_time.or(self.start_time)?;
        let started_at = self.start_time.unwrap_or(queued_at);
        Some(DeploymentAttempt {
            owner_id,
            result: self.result,
            queued_at,
            started_at,
            finished_at: self.finish_time,
            web_link: web_link(&owner.links),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildRepository {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Build {
    pub id: u64,
    pub source_version: Option<String>,
    pub repository: Option<BuildRepository>,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(rename = "_links")]
    pub links: Option<Links>,
}

impl Build {
    /// `None` when the build carries no timestamp at all.
    pub fn into_record(self) -> Option<BuildRecord> {
        let observed_at = self.finish_time.or(self.start_time).or(self.queue_time)?;
        let source_revision = self
            .source_version
            .filter(|v| !v.trim().is_empty())
            .map(RevisionId::new);
        let origin_repository = self
            .repository
            .and_then(|r| r.name.or(r.url))
            .filter(|r| !r.is_empty());
        Some(BuildRecord {
            id: self.id,
            source_revision,
            observed_at,
            web_link: web_link(&self.links),
            origin_repository,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DefinitionReference {
    pub version: Option<Reference>,
    pub repository: Option<Reference>,
    pub build_repository: Option<Reference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Artifact {
    pub definition_reference: Option<DefinitionReference>,
}

impl Artifact {
    fn into_release_artifact(self) -> Option<ReleaseArtifact> {
        let definition = self.definition_reference?;
        let version_reference = definition.version.as_ref()?.text_id()?;
        let repository = definition
            .repository
            .or(definition.build_repository)
            .and_then(|r| {
                let id = r.text_id();
                r.name.or(id)
            });
        Some(ReleaseArtifact {
            version_reference,
            repository,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Release {
    pub id: u64,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(rename = "_links")]
    pub links: Option<Links>,
}

impl Release {
    pub fn into_record(self) -> ReleaseRecord {
        ReleaseRecord {
            id: self.id,
            artifacts: self
                .artifacts
                .into_iter()
                .filter_map(Artifact::into_release_artifact)
                .collect(),
            observed_at: self.created_on,
            web_link: web_link(&self.links),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommitRef {
    pub commit_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deployment_records_convert() {
        let json = r#"{
            "count": 3,
            "value": [
                {
                    "id": 9001,
                    "environmentId": 12,
                    "planType": "Build",
                    "owner": {
                        "id": 4412,
                        "name": "20240612.3",
                        "_links": { "web": { "href": "https://dev.azure.com/contoso/widgets/_build/results?buildId=4412" } }
                    },
                    "result": "succeeded",
                    "queueTime": "2024-06-12T21:58:00Z",
                    "startTime": "2024-06-12T22:00:00Z",
                    "finishTime": "2024-06-12T22:30:00.123Z"
                },
                {
                    "id": 9002,
                    "owner": { "id": 4413 },
                    "queueTime": "2024-06-12T23:00:00Z"
                },
                { "id": 9003, "result": "failed" }
            ]
        }"#;
        let list: ListResponse<DeploymentRecord> = serde_json::from_str(json).unwrap();
        let attempts: Vec<DeploymentAttempt> = list
            .value
            .into_iter()
            .filter_map(DeploymentRecord::into_attempt)
            .collect();

        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].owner_id, 4412);
        assert!(attempts[0].is_succeeded());
        assert_eq!(
            attempts[0].started_at,
            Utc.with_ymd_and_hms(2024, 6, 12, 22, 0, 0).unwrap()
        );
        assert!(attempts[0].web_link.as_deref().unwrap().ends_with("buildId=4412"));

        // Queued only: still in progress, started defaults to queued.
        assert!(attempts[1].is_in_progress());
        assert_eq!(attempts[1].started_at, attempts[1].queued_at);
    }

    #[test]
    fn test_unexpected_result_is_other() {
        let record: DeploymentRecord = serde_json::from_str(
            r#"{ "owner": { "id": "77" }, "result": "partiallySucceeded", "startTime": "2024-06-12T22:00:00Z" }"#,
        )
        .unwrap();
        let attempt = record.into_attempt().unwrap();
        assert_eq!(attempt.owner_id, 77);
        assert_eq!(attempt.result, Some(AttemptResult::Other));
    }

    #[test]
    fn test_build_converts() {
        let build: Build = serde_json::from_str(
            r#"{
                "id": 4412,
                "buildNumber": "20240612.3",
                "sourceVersion": "3f2a9c1d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39",
                "repository": { "id": "e1f2", "name": "Widgets", "type": "TfsGit" },
                "queueTime": "2024-06-12T21:00:00Z",
                "finishTime": "2024-06-12T21:40:00Z",
                "_links": { "web": { "href": "https://dev.azure.com/contoso/widgets/_build/results?buildId=4412" } }
            }"#,
        )
        .unwrap();
        let record = build.into_record().unwrap();
        assert_eq!(record.id, 4412);
        assert!(record.source_revision.as_ref().unwrap().is_full());
        assert_eq!(record.origin_repository.as_deref(), Some("Widgets"));
        assert_eq!(
            record.observed_at,
            Utc.with_ymd_and_hms(2024, 6, 12, 21, 40, 0).unwrap()
        );
    }

    #[test]
    fn test_build_without_source_version() {
        let build: Build =
            serde_json::from_str(r#"{ "id": 5, "sourceVersion": "", "startTime": "2024-06-12T21:00:00Z" }"#)
                .unwrap();
        let record = build.into_record().unwrap();
        assert!(record.source_revision.is_none());
        assert!(record.origin_repository.is_none());
    }

    #[test]
    fn test_release_converts_artifacts() {
        let release: Release = serde_json::from_str(
            r#"{
                "id": 310,
                "name": "Release-310",
                "createdOn": "2024-06-13T02:00:00Z",
                "artifacts": [
                    {
                        "alias": "_widgets",
                        "type": "Build",
                        "definitionReference": {
                            "version": { "id": "4412", "name": "20240612.3" },
                            "buildRepository": { "id": "e1f2", "name": "Widgets" }
                        }
                    },
                    { "alias": "_tools", "type": "Git" }
                ],
                "_links": { "web": { "href": "https://dev.azure.com/contoso/widgets/_release?releaseId=310" } }
            }"#,
        )
        .unwrap();
        let record = release.into_record();
        assert_eq!(record.id, 310);
        assert_eq!(record.artifacts.len(), 1);
        assert_eq!(record.artifacts[0].version_reference, "4412");
        assert_eq!(record.artifacts[0].repository.as_deref(), Some("Widgets"));
        assert!(record.web_link.unwrap().ends_with("releaseId=310"));
    }

    #[test]
    fn test_merge_bases_decode() {
        let list: ListResponse<CommitRef> = serde_json::from_str(
            r#"{ "count": 1, "value": [ { "commitId": "0a1b2c3d4e5f60718293a4b5c6d7e8f901234567", "url": "x" } ] }"#,
        )
        .unwrap();
        assert_eq!(list.value[0].commit_id.len(), 40);
    }
}
