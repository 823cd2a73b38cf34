//! Process-wide reconciliation counters.
//!
//! The engine bumps a [`Counter`] on [`METRICS`] as it works; binaries call
//! [`Metrics::flush`] once at exit to log the totals as a single event, or
//! take a [`MetricsSnapshot`] to report them elsewhere.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// What is being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    EnvironmentsReconciled,
    CandidatesExamined,
    /// An owner could not be mapped to a source revision.
    ResolutionGaps,
    AncestryQueries,
    HeuristicVerdicts,
}

impl Counter {
    pub const ALL: [Counter; 5] = [
        Counter::EnvironmentsReconciled,
        Counter::CandidatesExamined,
        Counter::ResolutionGaps,
        Counter::AncestryQueries,
        Counter::HeuristicVerdicts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::EnvironmentsReconciled => "environments_reconciled",
            Counter::CandidatesExamined => "candidates_examined",
            Counter::ResolutionGaps => "resolution_gaps",
            Counter::AncestryQueries => "ancestry_queries",
            Counter::HeuristicVerdicts => "heuristic_verdicts",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub environments_reconciled: u64,
    pub candidates_examined: u64,
    pub resolution_gaps: u64,
    pub ancestry_queries: u64,
    pub heuristic_verdicts: u64,
}

pub struct Metrics {
    counts: [AtomicU64; Counter::ALL.len()],
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            counts: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
        }
    }

    pub fn incr(&self, counter: Counter) {
        self.counts[counter.slot()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counts[counter.slot()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            environments_reconciled: self.get(Counter::EnvironmentsReconciled),
            candidates_examined: self.get(Counter::CandidatesExamined),
            resolution_gaps: self.get(Counter::ResolutionGaps),
            ancestry_queries: self.get(Counter::AncestryQueries),
            heuristic_verdicts: self.get(Counter::HeuristicVerdicts),
        }
    }

    /// Log the current totals as one `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            environments_reconciled = s.environments_reconciled,
            candidates_examined = s.candidates_examined,
            resolution_gaps = s.resolution_gaps,
            ancestry_queries = s.ancestry_queries,
            heuristic_verdicts = s.heuristic_verdicts,
        );
    }

    pub fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }
}
