//! Rollout Core Library
//!
//! Deployment inclusion reconciliation: given a merged change and a set of
//! environments, decide per environment whether the change is deployed, in
//! progress, not deployed yet, unknown, or waiting for a scheduled train.

pub mod ancestry;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod grouping;
pub mod metrics;
pub mod obs;
pub mod reconciler;
pub mod resolver;
pub mod schedule;
pub mod sources;
pub mod telemetry;

pub use ancestry::AncestryOracle;
pub use config::EngineConfig;
pub use domain::{
    AncestryMethod, AncestryVerdict, AttemptGroup, AttemptResult, DeploymentAttempt,
    DeploymentCadence, DeploymentStatus, Environment, EnvironmentRegistry, EnvironmentVerdict,
    EstimateKind, ResolvedSourceVersion, Result, RevisionId, RolloutError, SourceError,
    SourceResult,
};
pub use grouping::group_attempts;
pub use reconciler::{
    MatchSelection, NoMatchPolicy, ReconcileRequest, Reconciler, ReconcilerOptions, ScanMode,
};
pub use resolver::{Resolution, SourceVersionResolver, UnresolvedReason};
pub use schedule::{estimate_arrival, extrapolate_from_history, ForkSchedule};
pub use sources::{
    AncestryQuerySource, BuildMetadataSource, BuildRecord, DeploymentHistorySource,
    ReleaseArtifact, ReleaseMetadataSource, ReleaseRecord, Sources,
};

pub use metrics::{Counter, MetricsSnapshot, METRICS};
pub use obs::{
    emit_candidate_skipped, emit_environment_failed, emit_environment_verdict,
    emit_reconcile_finished, emit_reconcile_started, reconcile_span,
};
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
