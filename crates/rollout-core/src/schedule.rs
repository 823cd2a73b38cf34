//! Expected-arrival estimates for environments without direct evidence.
//!
//! Two strategies, both pure:
//! - [`ForkSchedule`]: a weekly release train forks at a fixed instant in a
//!   fixed reference time zone; each train-based ring receives the train a
//!   fixed number of days after its cycle's fork.
//! - [`extrapolate_from_history`]: the mean interval between an
//!   environment's recent successful deployments, projected forward.
//!
//! Estimates are reported as `WaitingForSchedule`, never as a match.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::{DeploymentCadence, Environment, EstimateKind};

/// Largest accepted reference offset from UTC, in minutes.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Weekly fork instant of the release train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkSchedule {
    pub weekday: Weekday,
    /// Local wall-clock time of the fork in the reference zone.
    pub time: NaiveTime,
    /// Reference zone as a fixed offset from UTC (no daylight saving).
    pub utc_offset_minutes: i32,
}

impl Default for ForkSchedule {
    fn default() -> Self {
        Self {
            weekday: Weekday::Thu,
            time: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            utc_offset_minutes: -8 * 60,
        }
    }
}

impl ForkSchedule {
    /// The fork that closes the cycle `merged_at` belongs to: the first fork
    /// instant strictly after the merge.
    pub fn cycle_fork(&self, merged_at: DateTime<Utc>) -> DateTime<Utc> {
        let offset = Duration::minutes(i64::from(self.utc_offset_minutes));
        let local = merged_at.naive_utc() + offset;

        let days_ahead = (7 + i64::from(self.weekday.num_days_from_monday())
            - i64::from(local.weekday().num_days_from_monday()))
            % 7;
        let fork_local = (local.date() + Duration::days(days_ahead)).and_time(self.time);
        let fork = Utc.from_utc_datetime(&(fork_local - offset));

        if fork > merged_at {
            fork
        } else {
            fork + Duration::days(7)
        }
    }

    /// Expected arrival of a change merged at `merged_at` in a ring that
    /// trails the fork by `offset_days`.
    pub fn expected_arrival(&self, merged_at: DateTime<Utc>, offset_days: i64) -> DateTime<Utc> {
        self.cycle_fork(merged_at) + Duration::days(offset_days)
    }
}

/// Project the next deployment from previous successful ones.
///
/// Uses the mean interval between `samples` (any order). The projection
/// `latest + interval` is rolled forward by whole intervals until it lies
/// strictly after `as_of`. Needs at least two distinct samples.
pub fn extrapolate_from_history(
    samples: &[DateTime<Utc>],
    as_of: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if samples.len() < 2 {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let newest = sorted[0];
    let oldest = sorted[sorted.len() - 1];
    let gaps = i64::try_from(sorted.len() - 1).ok()?;
    let interval_secs = (newest - oldest).num_seconds() / gaps;
    if interval_secs <= 0 {
        return None;
    }

    let mut expected = newest + Duration::seconds(interval_secs);
    if expected <= as_of {
        let behind = (as_of - expected).num_seconds();
        let steps = behind / interval_secs + 1;
        expected += Duration::seconds(interval_secs.checked_mul(steps)?);
    }
    Some(expected)
}

/// Pick the estimator matching the environment's cadence.
///
/// Train-based rings use the weekly fork; continuous environments use the
/// observed frequency of `recent_successes`.
pub fn estimate_arrival(
    schedule: &ForkSchedule,
    environment: &Environment,
    merged_at: DateTime<Utc>,
    recent_successes: &[DateTime<Utc>],
    as_of: DateTime<Utc>,
) -> Option<(DateTime<Utc>, EstimateKind)> {
    match environment.cadence {
        DeploymentCadence::TrainBased { offset_days } => Some((
            schedule.expected_arrival(merged_at, offset_days),
            EstimateKind::FixedCadence,
        )),
        DeploymentCadence::Continuous => extrapolate_from_history(recent_successes, as_of)
            .map(|at| (at, EstimateKind::ObservedFrequency)),
    }
}
