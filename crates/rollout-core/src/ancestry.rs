//! Decide whether the tracked change is contained in a candidate revision.
//!
//! Same-repository candidates are answered authoritatively with a merge-base
//! query: the change is an ancestor of the candidate iff the merge base of the
//! two is the change itself. Candidates built from another repository fall
//! back to a time heuristic that is only an approximation: a candidate observed
//! after the merge is assumed to include it. Neither path returns an error; a
//! failed query is a negative verdict.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::{AncestryVerdict, ResolvedSourceVersion, RevisionId};
use crate::metrics::{Counter, METRICS};
use crate::sources::AncestryQuerySource;

#[derive(Clone)]
pub struct AncestryOracle {
    source: Arc<dyn AncestryQuerySource>,
}

impl AncestryOracle {
    pub fn new(source: Arc<dyn AncestryQuerySource>) -> Self {
        Self { source }
    }

    /// Check `target` against `candidate`, choosing the method from
    /// whether the candidate was built from `repository`.
    pub async fn check(
        &self,
        repository: &str,
        target: &RevisionId,
        merged_at: DateTime<Utc>,
        candidate: &ResolvedSourceVersion,
    ) -> AncestryVerdict {
        if candidate.is_same_repository(repository) {
            self.is_ancestor(repository, target, &candidate.revision)
                .await
        } else {
            METRICS.incr(Counter::HeuristicVerdicts);
            Self::observed_after(merged_at, candidate.observed_at)
        }
    }

    /// Authoritative check: is `target` an ancestor of `candidate`?
    pub async fn is_ancestor(
        &self,
        repository: &str,
        target: &RevisionId,
        candidate: &RevisionId,
    ) -> AncestryVerdict {
        if target.same_full(candidate) {
            return AncestryVerdict::authoritative(true);
        }

        METRICS.incr(Counter::AncestryQueries);
        match self.source.merge_base(repository, target, candidate).await {
            Ok(bases) => {
                let found = bases.iter().any(|base| base.matches(target));
                debug!(
                    target = %target.short(),
                    candidate = %candidate.short(),
                    bases = bases.len(),
                    is_ancestor = found,
                    "merge base checked"
                );
                AncestryVerdict::authoritative(found)
            }
            Err(e) => {
                warn!(
                    target = %target.short(),
                    candidate = %candidate.short(),
                    error = %e,
                    "merge base query failed, treating as not included"
                );
                AncestryVerdict::authoritative(false)
            }
        }
    }

    /// Heuristic check: a candidate observed strictly after the merge is
    /// assumed to contain it.
    pub fn observed_after(merged_at: DateTime<Utc>, observed_at: DateTime<Utc>) -> AncestryVerdict {
        AncestryVerdict::heuristic(observed_at > merged_at)
    }
}
