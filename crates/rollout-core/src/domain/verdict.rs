//! Per-environment reconciliation verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::AttemptGroup;
use super::environment::Environment;
use super::revision::ResolvedSourceVersion;

/// How an ancestry answer was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AncestryMethod {
    /// Answered by the source-control history graph.
    Authoritative,
    /// Approximated by comparing timestamps. A later build does not prove
    /// inclusion and an earlier one does not prove exclusion when changes
    /// propagate across repositories with delay.
    TimeHeuristic,
}

/// Whether the tracked change is an ancestor of a candidate revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestryVerdict {
    pub is_ancestor: bool,
    pub method: AncestryMethod,
}

impl AncestryVerdict {
    pub fn authoritative(is_ancestor: bool) -> Self {
        Self {
            is_ancestor,
            method: AncestryMethod::Authoritative,
        }
    }

    pub fn heuristic(is_ancestor: bool) -> Self {
        Self {
            is_ancestor,
            method: AncestryMethod::TimeHeuristic,
        }
    }
}

/// Deployment status of a change in one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Deployed,
    InProgress,
    NotDeployedYet,
    Unknown,
    /// No direct evidence; `expected_date` carries an estimate.
    WaitingForSchedule,
}

/// Which estimator produced an expected arrival date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateKind {
    FixedCadence,
    ObservedFrequency,
}

/// Outcome for one environment in one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVerdict {
    pub environment: Environment,
    pub status: DeploymentStatus,
    pub matched_attempt: Option<AttemptGroup>,
    pub matched_version: Option<ResolvedSourceVersion>,
    pub ancestry_method: Option<AncestryMethod>,
    /// When the matched attempt landed (or started, while in progress).
    pub timestamp: Option<DateTime<Utc>>,
    pub expected_date: Option<DateTime<Utc>>,
    pub estimate: Option<EstimateKind>,
    /// Grouped candidates scanned before the verdict was reached.
    pub candidates_examined: usize,
}

impl EnvironmentVerdict {
    fn bare(environment: Environment, status: DeploymentStatus) -> Self {
        Self {
            environment,
            status,
            matched_attempt: None,
            matched_version: None,
            ancestry_method: None,
            timestamp: None,
            expected_date: None,
            estimate: None,
            candidates_examined: 0,
        }
    }

    pub fn unknown(environment: Environment) -> Self {
        Self::bare(environment, DeploymentStatus::Unknown)
    }

    pub fn not_deployed_yet(environment: Environment, candidates_examined: usize) -> Self {
        Self {
            candidates_examined,
            ..Self::bare(environment, DeploymentStatus::NotDeployedYet)
        }
    }

    pub fn waiting_for_schedule(
        environment: Environment,
        expected_date: DateTime<Utc>,
        estimate: EstimateKind,
        candidates_examined: usize,
    ) -> Self {
        Self {
            expected_date: Some(expected_date),
            estimate: Some(estimate),
            candidates_examined,
            ..Self::bare(environment, DeploymentStatus::WaitingForSchedule)
        }
    }

    /// Verdict for a matched candidate; status follows the group's
    /// representative attempt.
    pub fn matched(
        environment: Environment,
        group: AttemptGroup,
        version: ResolvedSourceVersion,
        method: AncestryMethod,
        candidates_examined: usize,
    ) -> Self {
        let rep = &group.representative;
        let (status, timestamp) = if rep.is_in_progress() {
            (DeploymentStatus::InProgress, Some(rep.started_at))
        } else if rep.is_succeeded() {
            (
                DeploymentStatus::Deployed,
                Some(rep.completed_or_started_at()),
            )
        } else {
            (DeploymentStatus::Unknown, Some(rep.completed_or_started_at()))
        };
        Self {
            environment,
            status,
            matched_attempt: Some(group),
            matched_version: Some(version),
            ancestry_method: Some(method),
            timestamp,
            expected_date: None,
            estimate: None,
            candidates_examined,
        }
    }
}
