//! Raw deployment history records and their per-owner groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome reported for a deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    Succeeded,
    Failed,
    Running,
    Canceled,
    #[serde(other)]
    Other,
}

/// One record from an environment's deployment history.
///
/// Multi-job deployments emit one record per job or stage, all sharing the
/// same `owner_id` (the build or release that was deployed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentAttempt {
    pub owner_id: u64,
    /// `None` when the history service has not reported a result yet.
    pub result: Option<AttemptResult>,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub web_link: Option<String>,
}

impl DeploymentAttempt {
    pub fn is_succeeded(&self) -> bool {
        self.result == Some(AttemptResult::Succeeded)
    }

    /// Started but not finished, with no terminal result reported.
    pub fn is_in_progress(&self) -> bool {
        self.finished_at.is_none() && matches!(self.result, None | Some(AttemptResult::Running))
    }

    /// Best timestamp for "when did this attempt land".
    pub fn completed_or_started_at(&self) -> DateTime<Utc> {
        self.finished_at.unwrap_or(self.started_at)
    }
}

/// All attempts sharing one owner, collapsed to a representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptGroup {
    pub owner_id: u64,
    pub representative: DeploymentAttempt,
    /// Number of raw attempts folded into this group.
    pub attempt_count: usize,
}
