//! In-memory fakes for the source traits (testing only)
//!
//! [`FakeDevOps`] implements every collaborator in [`crate::sources`] on top
//! of plain maps and a tiny commit graph, with switches for injecting
//! failures, delays and panics.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{DeploymentAttempt, RevisionId, SourceError, SourceResult};
use crate::sources::{
    AncestryQuerySource, BuildMetadataSource, BuildRecord, DeploymentHistorySource,
    ReleaseMetadataSource, ReleaseRecord,
};

#[derive(Debug, Default)]
struct FakeState {
    history: HashMap<String, Vec<DeploymentAttempt>>,
    builds: HashMap<u64, BuildRecord>,
    releases: HashMap<u64, ReleaseRecord>,
    parents: HashMap<String, Vec<String>>,
    failing_history: HashSet<String>,
    panicking_history: HashSet<String>,
    history_delays: HashMap<String, Duration>,
    failing_builds: HashSet<u64>,
    failing_releases: HashSet<u64>,
    merge_base_fails: bool,
}

/// Scriptable stand-in for a deployment service and its git host.
#[derive(Debug, Default)]
pub struct FakeDevOps {
    state: Mutex<FakeState>,
    history_calls: AtomicUsize,
    build_calls: AtomicUsize,
    release_calls: AtomicUsize,
    merge_base_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDevOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deployment history (newest first) of an environment.
    pub fn with_history(self, external_id: &str, attempts: Vec<DeploymentAttempt>) -> Self {
        self.state
            .lock()
            .unwrap()
            .history
            .insert(external_id.to_string(), attempts);
        self
    }

    pub fn with_build(self, build: BuildRecord) -> Self {
        self.state.lock().unwrap().builds.insert(build.id, build);
        self
    }

    pub fn with_release(self, release: ReleaseRecord) -> Self {
        self.state
            .lock()
            .unwrap()
            .releases
            .insert(release.id, release);
        self
    }

    /// Add a commit and its parents to the history graph.
    pub fn with_commit(self, id: &str, parents: &[&str]) -> Self {
        self.state.lock().unwrap().parents.insert(
            id.to_string(),
            parents.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn failing_history(self, external_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_history
            .insert(external_id.to_string());
        self
    }

    /// Make the history call for `external_id` panic.
    pub fn panicking_history(self, external_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .panicking_history
            .insert(external_id.to_string());
        self
    }

    pub fn delayed_history(self, external_id: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .history_delays
            .insert(external_id.to_string(), delay);
        self
    }

    pub fn failing_build(self, build_id: u64) -> Self {
        self.state.lock().unwrap().failing_builds.insert(build_id);
        self
    }

    pub fn failing_release(self, release_id: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_releases
            .insert(release_id);
        self
    }

    pub fn failing_merge_base(self) -> Self {
        self.state.lock().unwrap().merge_base_fails = true;
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn merge_base_calls(&self) -> usize {
        self.merge_base_calls.load(Ordering::SeqCst)
    }

    /// Highest number of history calls observed running at once.
    pub fn max_concurrent_history_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// `b`'s history walked breadth-first; the first commit also reachable
    /// from `a` is the merge base.
    fn compute_merge_base(parents: &HashMap<String, Vec<String>>, a: &str, b: &str) -> Vec<String> {
        let reachable_from_a = Self::ancestors(parents, a);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([b.to_string()]);
        while let Some(commit) = queue.pop_front() {
            if !seen.insert(commit.clone()) {
                continue;
            }
            if reachable_from_a.contains(&commit) {
                return vec![commit];
            }
            if let Some(ps) = parents.get(&commit) {
                queue.extend(ps.iter().cloned());
            }
        }
        Vec::new()
    }

    fn ancestors(parents: &HashMap<String, Vec<String>>, start: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![start.to_string()];
        while let Some(commit) = stack.pop() {
            if seen.insert(commit.clone()) {
                if let Some(ps) = parents.get(&commit) {
                    stack.extend(ps.iter().cloned());
                }
            }
        }
        seen
    }
}

#[async_trait]
impl DeploymentHistorySource for FakeDevOps {
    async fn list_deployment_attempts(
        &self,
        external_environment_id: &str,
        limit: usize,
    ) -> SourceResult<Vec<DeploymentAttempt>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, fails, panics, attempts) = {
            let state = self.state.lock().unwrap();
            (
                state.history_delays.get(external_environment_id).copied(),
                state.failing_history.contains(external_environment_id),
                state.panicking_history.contains(external_environment_id),
                state
                    .history
                    .get(external_environment_id)
                    .cloned()
                    .unwrap_or_default(),
            )
        };

        self.enter();
        // Yield so concurrent callers overlap even without an explicit delay.
        tokio::time::sleep(delay.unwrap_or(Duration::from_millis(5))).await;
        self.leave();

        if panics {
            panic!("history source exploded for {external_environment_id}");
        }
        if fails {
            return Err(SourceError::Status {
                status: 503,
                url: format!("fake://environments/{external_environment_id}"),
            });
        }
        Ok(attempts.into_iter().take(limit).collect())
    }
}

#[async_trait]
impl BuildMetadataSource for FakeDevOps {
    async fn get_build(&self, build_id: u64) -> SourceResult<Option<BuildRecord>> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing_builds.contains(&build_id) {
            return Err(SourceError::Transport(format!(
                "connection reset fetching build {build_id}"
            )));
        }
        Ok(state.builds.get(&build_id).cloned())
    }
}

#[async_trait]
impl ReleaseMetadataSource for FakeDevOps {
    async fn get_release(&self, release_id: u64) -> SourceResult<Option<ReleaseRecord>> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing_releases.contains(&release_id) {
            return Err(SourceError::Transport(format!(
                "connection reset fetching release {release_id}"
            )));
        }
        Ok(state.releases.get(&release_id).cloned())
    }
}

#[async_trait]
impl AncestryQuerySource for FakeDevOps {
    async fn merge_base(
        &self,
        _repository: &str,
        a: &RevisionId,
        b: &RevisionId,
    ) -> SourceResult<Vec<RevisionId>> {
        self.merge_base_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.merge_base_fails {
            return Err(SourceError::Decode("merge base payload was empty".to_string()));
        }
        Ok(
            Self::compute_merge_base(&state.parents, a.as_str(), b.as_str())
                .into_iter()
                .map(RevisionId::new)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_base_of_linear_history() {
        let fake = FakeDevOps::new()
            .with_commit("c3", &["c2"])
            .with_commit("c2", &["c1"])
            .with_commit("c1", &[]);
        let base = fake
            .merge_base("widgets", &"c1".into(), &"c3".into())
            .await
            .unwrap();
        assert_eq!(base, vec![RevisionId::new("c1")]);
        let base = fake
            .merge_base("widgets", &"c3".into(), &"c1".into())
            .await
            .unwrap();
        assert_eq!(base, vec![RevisionId::new("c1")]);
    }

    #[tokio::test]
    async fn test_merge_base_of_diverged_branches() {
        let fake = FakeDevOps::new()
            .with_commit("topic", &["base"])
            .with_commit("main", &["base"])
            .with_commit("base", &[]);
        let base = fake
            .merge_base("widgets", &"topic".into(), &"main".into())
            .await
            .unwrap();
        assert_eq!(base, vec![RevisionId::new("base")]);
    }

    #[tokio::test]
    async fn test_history_honours_limit() {
        let now = chrono::Utc::now();
        let attempts = (1..=5)
            .map(|owner_id| DeploymentAttempt {
                owner_id,
                result: None,
                queued_at: now,
                started_at: now,
                finished_at: None,
                web_link: None,
            })
            .collect();
        let fake = FakeDevOps::new().with_history("7", attempts);
        let listed = fake.list_deployment_attempts("7", 3).await.unwrap();
        let owners: Vec<u64> = listed.iter().map(|a| a.owner_id).collect();
        assert_eq!(owners, vec![1, 2, 3]);
        assert_eq!(fake.history_calls(), 1);
        assert!(fake
            .list_deployment_attempts("unknown", 3)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let fake = FakeDevOps::new()
            .failing_history("7")
            .failing_build(1)
            .failing_release(2)
            .failing_merge_base();
        assert!(fake.list_deployment_attempts("7", 10).await.is_err());
        assert!(fake.get_build(1).await.is_err());
        assert!(fake.get_release(2).await.is_err());
        assert!(fake
            .merge_base("r", &"a".into(), &"b".into())
            .await
            .is_err());
        assert!(fake.get_build(3).await.unwrap().is_none());
    }
}
