//! Structured observability hooks for reconciliation runs.
//!
//! This module provides:
//! - A request-scoped tracing span via [`reconcile_span`]
//! - Emission functions for key events: start, candidate skipped,
//!   per-environment verdict, environment failure, finish
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`).

use tracing::info;

use crate::domain::{DeploymentStatus, EnvironmentVerdict};

/// Reconciliation-scoped span, tagged with the request id and change.
///
/// Attach it to async work with `tracing::Instrument`:
///
/// ```ignore
/// let span = reconcile_span("5b0c…", "3f2a9c1");
/// work.instrument(span).await;
/// ```
pub fn reconcile_span(reconcile_id: &str, change_id: &str) -> tracing::Span {
    tracing::info_span!(
        "rollout.reconcile",
        reconcile_id = %reconcile_id,
        change_id = %change_id
    )
}

/// Emit event: reconciliation started.
pub fn emit_reconcile_started(reconcile_id: &str, change_id: &str, environments: usize) {
    info!(
        event = "reconcile.started",
        reconcile_id = %reconcile_id,
        change_id = %change_id,
        environments = environments,
    );
}

/// Emit event: a candidate owner was skipped (resolution gap).
pub fn emit_candidate_skipped(environment: &str, owner_id: u64, reason: &str) {
    tracing::debug!(
        event = "candidate.skipped",
        environment = %environment,
        owner_id = owner_id,
        reason = %reason,
    );
}

/// Emit event: verdict for one environment.
pub fn emit_environment_verdict(verdict: &EnvironmentVerdict) {
    info!(
        event = "environment.verdict",
        environment = %verdict.environment.id,
        status = status_label(verdict.status),
        owner_id = verdict.matched_attempt.as_ref().map(|g| g.owner_id),
        candidates_examined = verdict.candidates_examined,
    );
}

/// Emit event: an environment could not be reconciled (warning level).
pub fn emit_environment_failed(environment: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "environment.failed", environment = %environment, error = %error);
}

/// Emit event: reconciliation finished.
pub fn emit_reconcile_finished(reconcile_id: &str, duration_ms: u64, verdicts: usize) {
    info!(
        event = "reconcile.finished",
        reconcile_id = %reconcile_id,
        duration_ms = duration_ms,
        verdicts = verdicts,
    );
}

fn status_label(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Deployed => "deployed",
        DeploymentStatus::InProgress => "in_progress",
        DeploymentStatus::NotDeployedYet => "not_deployed_yet",
        DeploymentStatus::Unknown => "unknown",
        DeploymentStatus::WaitingForSchedule => "waiting_for_schedule",
    }
}
