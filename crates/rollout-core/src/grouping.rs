//! Consolidate raw deployment attempts into one representative per owner.

use std::collections::HashMap;

use crate::domain::{AttemptGroup, DeploymentAttempt};

/// Group `attempts` by owner, keeping the input (newest-first) order of each
/// owner's first appearance.
///
/// The representative of a group is its first succeeded attempt, else its
/// first in-progress attempt. Groups with neither (all failed, canceled or
/// otherwise finished) are dropped and never become candidates.
pub fn group_attempts(attempts: &[DeploymentAttempt]) -> Vec<AttemptGroup> {
    let mut order: Vec<u64> = Vec::new();
    let mut buckets: HashMap<u64, Vec<&DeploymentAttempt>> = HashMap::new();
    for attempt in attempts {
        buckets
            .entry(attempt.owner_id)
            .or_insert_with(|| {
                order.push(attempt.owner_id);
                Vec::new()
            })
            .push(attempt);
    }

    order
        .into_iter()
        .filter_map(|owner_id| {
            let members = buckets.remove(&owner_id)?;
            let representative = members
                .iter()
                .find(|a| a.is_succeeded())
                .or_else(|| members.iter().find(|a| a.is_in_progress()))?;
            Some(AttemptGroup {
                owner_id,
                representative: (*representative).clone(),
                attempt_count: members.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttemptResult;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    fn attempt(owner_id: u64, result: Option<AttemptResult>, minutes_ago: i64) -> DeploymentAttempt {
        let started = base() - Duration::minutes(minutes_ago);
        let finished = match result {
            None | Some(AttemptResult::Running) => None,
            Some(_) => Some(started + Duration::minutes(5)),
        };
        DeploymentAttempt {
            owner_id,
            result,
            queued_at: started,
            started_at: started,
            finished_at: finished,
            web_link: Some(format!("https://deploy.example/{owner_id}/{minutes_ago}")),
        }
    }

    #[test]
    fn test_succeeded_wins_over_in_progress() {
        let attempts = vec![
            attempt(7, None, 1),
            attempt(7, Some(AttemptResult::Succeeded), 2),
        ];
        let groups = group_attempts(&attempts);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].representative.is_succeeded());
        assert_eq!(groups[0].attempt_count, 2);
    }

    #[test]
    fn test_in_progress_wins_over_failed() {
        let attempts = vec![
            attempt(7, Some(AttemptResult::Failed), 1),
            attempt(7, Some(AttemptResult::Running), 2),
        ];
        let groups = group_attempts(&attempts);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].representative.is_in_progress());
    }

    #[test]
    fn test_all_failed_group_is_dropped() {
        let attempts = vec![
            attempt(1, Some(AttemptResult::Failed), 1),
            attempt(1, Some(AttemptResult::Canceled), 2),
            attempt(2, Some(AttemptResult::Succeeded), 3),
        ];
        let groups = group_attempts(&attempts);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].owner_id, 2);
    }

    #[test]
    fn test_order_follows_first_appearance() {
        let attempts = vec![
            attempt(30, Some(AttemptResult::Succeeded), 1),
            attempt(10, Some(AttemptResult::Succeeded), 2),
            attempt(30, Some(AttemptResult::Succeeded), 3),
            attempt(20, None, 4),
        ];
        let owners: Vec<u64> = group_attempts(&attempts)
            .iter()
            .map(|g| g.owner_id)
            .collect();
        assert_eq!(owners, vec![30, 10, 20]);
    }

    #[test]
    fn test_newest_succeeded_attempt_represents_group() {
        let attempts = vec![
            attempt(5, Some(AttemptResult::Succeeded), 1),
            attempt(5, Some(AttemptResult::Succeeded), 60),
        ];
        let groups = group_attempts(&attempts);
        assert_eq!(groups[0].representative, attempts[0]);
    }

    #[test]
    fn test_empty_history() {
        assert!(group_attempts(&[]).is_empty());
    }
}
