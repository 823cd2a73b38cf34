//! Per-environment reconciliation: has a change reached each environment?
//!
//! For every requested environment, independently and concurrently:
//! fetch recent deployment attempts, group them per owner, resolve each
//! candidate's source version, and ask the [`AncestryOracle`] whether the
//! change is contained in it. Without a match, the environment is either
//! `NotDeployedYet` or, under [`NoMatchPolicy::Estimate`], gets an expected
//! arrival date from [`crate::schedule`].
//!
//! A failure (or panic) while reconciling one environment yields `Unknown`
//! for that environment only; the caller always receives one verdict per
//! requested environment.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use crate::ancestry::AncestryOracle;
use crate::domain::{
    AncestryMethod, AttemptGroup, Environment, EnvironmentVerdict, ResolvedSourceVersion,
    RevisionId, SourceError, SourceResult,
};
use crate::grouping::group_attempts;
use crate::metrics::{Counter, METRICS};
use crate::obs;
use crate::resolver::{Resolution, SourceVersionResolver};
use crate::schedule::{estimate_arrival, ForkSchedule};
use crate::sources::Sources;

/// Which match wins when several candidates contain the change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSelection {
    /// The first match in newest-first history order. Depends on scan order,
    /// not on timestamps.
    #[default]
    FirstInScanOrder,
    /// The match whose representative attempt landed earliest, i.e. the
    /// first deployment known to carry the change. Scans every capped
    /// candidate.
    EarliestObserved,
}

/// How capped candidates are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// One candidate at a time, stopping early when the selection allows.
    #[default]
    Sequential,
    /// All capped candidates at once, selected afterwards.
    Concurrent,
}

/// What to report when no candidate contains the change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchPolicy {
    /// `NotDeployedYet`.
    #[default]
    Strict,
    /// `WaitingForSchedule` with an estimated date when one can be computed.
    Estimate,
}

/// Tunables for a [`Reconciler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerOptions {
    /// Deployment attempts fetched per environment.
    pub history_limit: usize,
    /// Grouped candidates examined per environment.
    pub scan_cap: usize,
    pub selection: MatchSelection,
    pub scan_mode: ScanMode,
    pub no_match: NoMatchPolicy,
    /// Per-environment deadline; exceeding it yields `Unknown`.
    pub environment_timeout_secs: Option<u64>,
    pub schedule: ForkSchedule,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            history_limit: 50,
            scan_cap: 10,
            selection: MatchSelection::default(),
            scan_mode: ScanMode::default(),
            no_match: NoMatchPolicy::default(),
            environment_timeout_secs: None,
            schedule: ForkSchedule::default(),
        }
    }
}

impl ReconcilerOptions {
    pub fn environment_timeout(&self) -> Option<Duration> {
        self.environment_timeout_secs.map(Duration::from_secs)
    }
}

/// The change being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub change_id: RevisionId,
    pub merged_at: DateTime<Utc>,
    /// Repository the change was merged into.
    pub repository: String,
    /// Reference "now" for forward-looking estimates.
    pub as_of: DateTime<Utc>,
}

impl ReconcileRequest {
    pub fn new(
        change_id: impl Into<String>,
        merged_at: DateTime<Utc>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            change_id: RevisionId::new(change_id),
            merged_at,
            repository: repository.into(),
            as_of: Utc::now(),
        }
    }

    /// Pin the reference instant so repeated runs give identical estimates.
    pub fn as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }
}

/// A candidate that contains the change.
#[derive(Debug, Clone)]
struct Match {
    position: usize,
    group: AttemptGroup,
    version: ResolvedSourceVersion,
    method: AncestryMethod,
}

/// Reconciles a change against a set of environments.
#[derive(Clone)]
pub struct Reconciler {
    sources: Sources,
    resolver: SourceVersionResolver,
    oracle: AncestryOracle,
    options: ReconcilerOptions,
}

impl Reconciler {
    pub fn new(sources: Sources, options: ReconcilerOptions) -> Self {
        let resolver =
            SourceVersionResolver::new(Arc::clone(&sources.builds), Arc::clone(&sources.releases));
        let oracle = AncestryOracle::new(Arc::clone(&sources.ancestry));
        Self {
            sources,
            resolver,
            oracle,
            options,
        }
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    /// Reconcile every environment concurrently; verdicts come back in the
    /// order the environments were given, one per environment.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
        environments: &[Environment],
    ) -> Vec<EnvironmentVerdict> {
        let reconcile_id = uuid::Uuid::new_v4().to_string();
        let span = obs::reconcile_span(&reconcile_id, request.change_id.short());
        let started = Instant::now();
        obs::emit_reconcile_started(&reconcile_id, request.change_id.as_str(), environments.len());

        let request = Arc::new(request.clone());
        let handles: Vec<JoinHandle<EnvironmentVerdict>> = environments
            .iter()
            .map(|env| self.spawn_guarded(Arc::clone(&request), env.clone(), span.clone()))
            .collect();

        let verdicts: Vec<EnvironmentVerdict> = join_all(handles)
            .await
            .into_iter()
            .zip(environments)
            .map(|(joined, env)| {
                joined.unwrap_or_else(|e| {
                    obs::emit_environment_failed(&env.id, &e);
                    EnvironmentVerdict::unknown(env.clone())
                })
            })
            .collect();

        obs::emit_reconcile_finished(
            &reconcile_id,
            started.elapsed().as_millis() as u64,
            verdicts.len(),
        );
        verdicts
    }

    /// Like [`Reconciler::reconcile`], but yields each verdict as soon as its
    /// environment finishes. The receiver closes after the last one.
    pub fn reconcile_streaming(
        &self,
        request: ReconcileRequest,
        environments: Vec<Environment>,
    ) -> mpsc::UnboundedReceiver<EnvironmentVerdict> {
        let reconcile_id = uuid::Uuid::new_v4().to_string();
        let span = obs::reconcile_span(&reconcile_id, request.change_id.short());
        obs::emit_reconcile_started(&reconcile_id, request.change_id.as_str(), environments.len());

        let (tx, rx) = mpsc::unbounded_channel();
        let request = Arc::new(request);
        for env in environments {
            let fallback = env.clone();
            let handle = self.spawn_guarded(Arc::clone(&request), env, span.clone());
            let tx = tx.clone();
            tokio::spawn(async move {
                let verdict = handle.await.unwrap_or_else(|e| {
                    obs::emit_environment_failed(&fallback.id, &e);
                    EnvironmentVerdict::unknown(fallback)
                });
                // The caller may have stopped listening.
                let _ = tx.send(verdict);
            });
        }
        rx
    }

    /// Run one environment on its own task so a panic stays contained.
    fn spawn_guarded(
        &self,
        request: Arc<ReconcileRequest>,
        environment: Environment,
        span: tracing::Span,
    ) -> JoinHandle<EnvironmentVerdict> {
        let this = self.clone();
        tokio::spawn(
            async move {
                let fallback = environment.clone();
                let work = tokio::spawn(
                    async move { this.reconcile_environment(&request, environment).await }
                        .in_current_span(),
                );
                match work.await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        obs::emit_environment_failed(&fallback.id, &e);
                        EnvironmentVerdict::unknown(fallback)
                    }
                }
            }
            .instrument(span),
        )
    }

    /// Reconcile a single environment. Never fails: errors and timeouts
    /// become an `Unknown` verdict.
    pub async fn reconcile_environment(
        &self,
        request: &ReconcileRequest,
        environment: Environment,
    ) -> EnvironmentVerdict {
        let work = self.try_reconcile_environment(request, &environment);
        let result = match self.options.environment_timeout() {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(format!(
                    "environment '{}' not reconciled within {}s",
                    environment.id,
                    limit.as_secs()
                ))),
            },
            None => work.await,
        };

        METRICS.incr(Counter::EnvironmentsReconciled);
        let verdict = match result {
            Ok(verdict) => verdict,
            Err(e) => {
                obs::emit_environment_failed(&environment.id, &e);
                EnvironmentVerdict::unknown(environment)
            }
        };
        obs::emit_environment_verdict(&verdict);
        verdict
    }

    async fn try_reconcile_environment(
        &self,
        request: &ReconcileRequest,
        environment: &Environment,
    ) -> SourceResult<EnvironmentVerdict> {
        let attempts = self
            .sources
            .history
            .list_deployment_attempts(
                &environment.external_environment_id,
                self.options.history_limit,
            )
            .await?;
        let groups = group_attempts(&attempts);
        let capped = &groups[..groups.len().min(self.options.scan_cap)];
        debug!(
            environment = %environment.id,
            attempts = attempts.len(),
            groups = groups.len(),
            scanning = capped.len(),
            "deployment history grouped"
        );

        let (found, examined) = match self.options.scan_mode {
            ScanMode::Sequential => self.scan_sequential(request, environment, capped).await,
            ScanMode::Concurrent => self.scan_concurrent(request, environment, capped).await,
        };

        if let Some(m) = found {
            return Ok(EnvironmentVerdict::matched(
                environment.clone(),
                m.group,
                m.version,
                m.method,
                examined,
            ));
        }

        if self.options.no_match == NoMatchPolicy::Estimate {
            let successes: Vec<DateTime<Utc>> = groups
                .iter()
                .filter(|g| g.representative.is_succeeded())
                .map(|g| g.representative.completed_or_started_at())
                .collect();
            if let Some((expected, kind)) = estimate_arrival(
                &self.options.schedule,
                environment,
                request.merged_at,
                &successes,
                request.as_of,
            ) {
                return Ok(EnvironmentVerdict::waiting_for_schedule(
                    environment.clone(),
                    expected,
                    kind,
                    examined,
                ));
            }
        }

        Ok(EnvironmentVerdict::not_deployed_yet(
            environment.clone(),
            examined,
        ))
    }

    async fn scan_sequential(
        &self,
        request: &ReconcileRequest,
        environment: &Environment,
        candidates: &[AttemptGroup],
    ) -> (Option<Match>, usize) {
        let mut matches = Vec::new();
        let mut examined = 0;
        for (position, group) in candidates.iter().enumerate() {
            examined += 1;
            if let Some(m) = self.evaluate(request, environment, position, group).await {
                if self.options.selection == MatchSelection::FirstInScanOrder {
                    return (Some(m), examined);
                }
                matches.push(m);
            }
        }
        (select(matches, self.options.selection), examined)
    }

    async fn scan_concurrent(
        &self,
        request: &ReconcileRequest,
        environment: &Environment,
        candidates: &[AttemptGroup],
    ) -> (Option<Match>, usize) {
        let evaluations: Vec<_> = candidates
            .iter()
            .enumerate()
            .map(|(position, group)| self.evaluate(request, environment, position, group))
            .collect();
        let matches: Vec<Match> = join_all(evaluations).await.into_iter().flatten().collect();
        (select(matches, self.options.selection), candidates.len())
    }

    /// Resolve one candidate and check it for the change.
    async fn evaluate(
        &self,
        request: &ReconcileRequest,
        environment: &Environment,
        position: usize,
        group: &AttemptGroup,
    ) -> Option<Match> {
        METRICS.incr(Counter::CandidatesExamined);
        let version = match self.resolver.resolve(group.owner_id).await {
            Resolution::Unresolved(reason) => {
                METRICS.incr(Counter::ResolutionGaps);
                obs::emit_candidate_skipped(&environment.id, group.owner_id, &reason.to_string());
                return None;
            }
            resolved => resolved.into_version()?,
        };

        let verdict = self
            .oracle
            .check(
                &request.repository,
                &request.change_id,
                request.merged_at,
                &version,
            )
            .await;
        debug!(
            environment = %environment.id,
            owner_id = group.owner_id,
            revision = %version.revision.short(),
            is_ancestor = verdict.is_ancestor,
            method = ?verdict.method,
            "candidate checked"
        );

        verdict.is_ancestor.then(|| Match {
            position,
            group: group.clone(),
            version,
            method: verdict.method,
        })
    }
}

fn select(matches: Vec<Match>, selection: MatchSelection) -> Option<Match> {
    match selection {
        MatchSelection::FirstInScanOrder => matches.into_iter().min_by_key(|m| m.position),
        MatchSelection::EarliestObserved => matches.into_iter().min_by_key(|m| {
            (
                m.group.representative.completed_or_started_at(),
                m.position,
            )
        }),
    }
}
