//! Run aggregator: keeps each leaderboard row consistent with the set of
//! ended runs for its (user, route) pair.
//!
//! Two operating modes share one merge rule:
//!
//! - [`merge_run`] folds a single newly-ended run into the pair's entry
//!   (creating it on the first run).
//! - [`rebuild_leaderboard`] recomputes every entry from the full run
//!   history; repeated rebuilds with no new runs are no-ops.
//!
//! Writes go through [`LeaderboardStore::store_entry`]'s compare-and-swap, so
//! concurrent merges for the same pair serialize; a losing writer re-reads and
//! retries up to [`MAX_WRITE_ATTEMPTS`] times before surfacing
//! `AggregationFailed`. `best_time` and `fastest_pace` only ever decrease,
//! `last_run_date` only ever increases; totals accumulate. `average_pace` is
//! recomputed from the pair's full history on every merge rather than
//! incrementally, so it always equals the exact mean.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    errors::AppError,
    models::{LeaderboardEntry, Run},
    store::LeaderboardStore,
};

/// CAS attempts per entry before giving up with `AggregationFailed`.
pub const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Pace stored with two decimal places, seconds per km. Undefined (None) for
/// zero-distance runs; undefined paces are excluded from min comparisons and
/// from the mean.
pub fn derive_pace(duration_seconds: i32, distance_km: Decimal) -> Option<Decimal> {
    if distance_km <= Decimal::ZERO {
        return None;
    }
    Some((Decimal::from(duration_seconds) / distance_km).round_dp(2))
}

/// The validated fields of an ended run that contribute to aggregation.
#[derive(Debug, Clone)]
pub struct ContributingRun {
    pub user_id: i64,
    pub route_id: i64,
    pub started_at: OffsetDateTime,
    pub duration_seconds: i32,
    pub distance_km: Decimal,
    pub pace: Option<Decimal>,
}

/// Checks aggregation preconditions: the run has ended and carries
/// non-negative metrics. In-progress or malformed runs are rejected, never
/// coerced.
pub fn contributing(run: &Run) -> Result<ContributingRun, AppError> {
    if !run.is_ended() {
        return Err(AppError::InvalidRun(format!(
            "run {} has not ended",
            run.id
        )));
    }
    let duration_seconds = run
        .duration_seconds
        .ok_or_else(|| AppError::InvalidRun(format!("run {} has no duration", run.id)))?;
    if duration_seconds < 0 {
        return Err(AppError::InvalidRun(format!(
            "run {} has a negative duration",
            run.id
        )));
    }
    let distance_km = run
        .distance_km
        .ok_or_else(|| AppError::InvalidRun(format!("run {} has no distance", run.id)))?;
    if distance_km < Decimal::ZERO {
        return Err(AppError::InvalidRun(format!(
            "run {} has a negative distance",
            run.id
        )));
    }

    Ok(ContributingRun {
        user_id: run.user_id,
        route_id: run.route_id,
        started_at: run.started_at,
        duration_seconds,
        distance_km,
        pace: run.pace_seconds_per_km,
    })
}

fn min_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn max_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn mean_of(paces: &[Decimal]) -> Option<Decimal> {
    if paces.is_empty() {
        return None;
    }
    let sum: Decimal = paces.iter().sum();
    Some((sum / Decimal::from(paces.len() as i64)).round_dp(2))
}

/// The pure merge rule behind Operation A. `average_pace` is supplied by the
/// caller as the mean over the pair's full ended-run history.
fn merge_entry(
    current: Option<&LeaderboardEntry>,
    run: &ContributingRun,
    average_pace: Option<Decimal>,
    now: OffsetDateTime,
) -> LeaderboardEntry {
    match current {
        None => LeaderboardEntry {
            user_id: run.user_id,
            route_id: run.route_id,
            best_time: Some(run.duration_seconds),
            fastest_pace: run.pace,
            total_runs: 1,
            total_distance: run.distance_km,
            total_duration: i64::from(run.duration_seconds),
            average_pace,
            last_run_date: Some(run.started_at),
            updated_at: now,
        },
        Some(entry) => LeaderboardEntry {
            user_id: entry.user_id,
            route_id: entry.route_id,
            best_time: min_opt(entry.best_time, Some(run.duration_seconds)),
            fastest_pace: min_opt(entry.fastest_pace, run.pace),
            total_runs: entry.total_runs + 1,
            total_distance: entry.total_distance + run.distance_km,
            total_duration: entry.total_duration + i64::from(run.duration_seconds),
            average_pace,
            last_run_date: max_opt(entry.last_run_date, Some(run.started_at)),
            updated_at: now,
        },
    }
}

/// Aggregates one (user, route) group from scratch, for the batch recompute.
fn aggregate_group(
    user_id: i64,
    route_id: i64,
    group: &[ContributingRun],
    now: OffsetDateTime,
) -> LeaderboardEntry {
    let paces: Vec<Decimal> = group.iter().filter_map(|r| r.pace).collect();
    LeaderboardEntry {
        user_id,
        route_id,
        best_time: group.iter().map(|r| r.duration_seconds).min(),
        fastest_pace: paces.iter().copied().min(),
        total_runs: group.len() as i64,
        total_distance: group.iter().map(|r| r.distance_km).sum(),
        total_duration: group.iter().map(|r| i64::from(r.duration_seconds)).sum(),
        average_pace: mean_of(&paces),
        last_run_date: group.iter().map(|r| r.started_at).max(),
        updated_at: now,
    }
}

/// Operation A: folds one newly-ended run into its pair's leaderboard entry.
///
/// The run row must already be persisted in the store. The merge is
/// commutative across runs but not deduplicating: replaying the same run
/// twice double-counts the totals, so callers must deliver each run-ended
/// event at most once.
pub async fn merge_run<S>(store: &S, run: &Run) -> Result<LeaderboardEntry, AppError>
where
    S: LeaderboardStore + ?Sized,
{
    let contribution = contributing(run)?;

    if !store.user_exists(run.user_id).await? {
        return Err(AppError::NotFound);
    }
    if !store.route_exists(run.route_id).await? {
        return Err(AppError::NotFound);
    }

    for attempt in 0..MAX_WRITE_ATTEMPTS {
        let current = store.load_entry(run.user_id, run.route_id).await?;

        // Exact mean over the pair's full history (this run included once,
        // whether or not the store already returns it).
        let history = store.ended_runs_for_pair(run.user_id, run.route_id).await?;
        let mut paces: Vec<Decimal> = history
            .iter()
            .filter(|r| r.id != run.id)
            .filter_map(|r| r.pace_seconds_per_km)
            .collect();
        if let Some(pace) = contribution.pace {
            paces.push(pace);
        }
        let average_pace = mean_of(&paces);

        let next = merge_entry(
            current.as_ref(),
            &contribution,
            average_pace,
            OffsetDateTime::now_utc(),
        );

        match store.store_entry(current.as_ref(), &next).await {
            Ok(()) => return Ok(next),
            Err(AppError::ConcurrentUpdateConflict) => {
                tracing::debug!(
                    user_id = run.user_id,
                    route_id = run.route_id,
                    attempt,
                    "leaderboard write conflicted, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::AggregationFailed)
}

/// Outcome of a full recompute.
#[derive(Debug, Serialize, ToSchema)]
pub struct RebuildSummary {
    /// Distinct (user, route) pairs with at least one ended run.
    pub pairs: usize,
    pub written: usize,
    /// Entries whose stored stats already matched the recomputed values.
    pub unchanged: usize,
}

/// Operation B: recomputes every leaderboard entry from the complete ended-run
/// history.
///
/// Entries whose stored values already match are skipped, so repeated rebuilds
/// are no-ops. When an entry was advanced by a concurrent incremental merge
/// after this rebuild's read of the run table, the write keeps the better
/// stored `best_time`/`fastest_pace` and the later `last_run_date` rather than
/// regressing them. A failing group aborts the remaining groups; groups
/// already written keep their values (the rebuild is resumable).
pub async fn rebuild_leaderboard<S>(store: &S) -> Result<RebuildSummary, AppError>
where
    S: LeaderboardStore + ?Sized,
{
    let runs = store.all_ended_runs().await?;

    let mut groups: BTreeMap<(i64, i64), Vec<ContributingRun>> = BTreeMap::new();
    for run in &runs {
        groups
            .entry((run.user_id, run.route_id))
            .or_default()
            .push(contributing(run)?);
    }

    let mut summary = RebuildSummary {
        pairs: groups.len(),
        written: 0,
        unchanged: 0,
    };

    for ((user_id, route_id), group) in &groups {
        if !store.user_exists(*user_id).await? || !store.route_exists(*route_id).await? {
            return Err(AppError::NotFound);
        }

        let mut attempt = 0;
        loop {
            let current = store.load_entry(*user_id, *route_id).await?;
            let computed =
                aggregate_group(*user_id, *route_id, group, OffsetDateTime::now_utc());

            // Floor rule at write time: never regress records that a newer
            // incremental merge already improved.
            let next = match &current {
                None => computed,
                Some(cur) => LeaderboardEntry {
                    best_time: min_opt(computed.best_time, cur.best_time),
                    fastest_pace: min_opt(computed.fastest_pace, cur.fastest_pace),
                    last_run_date: max_opt(computed.last_run_date, cur.last_run_date),
                    ..computed
                },
            };

            if let Some(cur) = &current
                && cur.same_stats(&next)
            {
                summary.unchanged += 1;
                break;
            }

            match store.store_entry(current.as_ref(), &next).await {
                Ok(()) => {
                    summary.written += 1;
                    break;
                }
                Err(AppError::ConcurrentUpdateConflict) if attempt + 1 < MAX_WRITE_ATTEMPTS => {
                    attempt += 1;
                    tracing::debug!(
                        user_id = *user_id,
                        route_id = *route_id,
                        attempt,
                        "rebuild write conflicted, retrying"
                    );
                }
                Err(AppError::ConcurrentUpdateConflict) => {
                    return Err(AppError::AggregationFailed);
                }
                Err(e) => return Err(e),
            }
        }
    }

    tracing::info!(
        pairs = summary.pairs,
        written = summary.written,
        unchanged = summary.unchanged,
        "leaderboard rebuild finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn ts(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    fn ended_run(
        id: i64,
        started_at_secs: i64,
        duration: i32,
        distance: &str,
        pace: Option<&str>,
    ) -> Run {
        Run {
            id,
            user_id: 1,
            route_id: 1,
            started_at: ts(started_at_secs),
            ended_at: Some(ts(started_at_secs + i64::from(duration))),
            duration_seconds: Some(duration),
            distance_km: Some(d(distance)),
            pace_seconds_per_km: pace.map(d),
            weather: None,
            created_at: ts(started_at_secs),
        }
    }

    fn store_with_pair() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_user(1);
        store.add_route(1);
        store
    }

    async fn merge_all(store: &MemoryStore, runs: &[Run]) {
        for run in runs {
            store.add_run(run.clone());
            merge_run(store, run).await.unwrap();
        }
    }

    #[tokio::test]
    async fn first_run_seeds_entry() {
        let store = store_with_pair();
        let run = ended_run(1, 1_000, 3600, "8.5", Some("254.1"));
        store.add_run(run.clone());

        let entry = merge_run(&store, &run).await.unwrap();

        assert_eq!(entry.best_time, Some(3600));
        assert_eq!(entry.fastest_pace, Some(d("254.1")));
        assert_eq!(entry.total_runs, 1);
        assert_eq!(entry.total_distance, d("8.5"));
        assert_eq!(entry.total_duration, 3600);
        assert_eq!(entry.average_pace, Some(d("254.1")));
        assert_eq!(entry.last_run_date, Some(ts(1_000)));
    }

    #[tokio::test]
    async fn slower_second_run_keeps_records() {
        let store = store_with_pair();
        merge_all(
            &store,
            &[
                ended_run(1, 1_000, 3600, "8.5", Some("254.1")),
                ended_run(2, 2_000, 4200, "8.5", Some("296.5")),
            ],
        )
        .await;

        let entry = store.entry(1, 1).unwrap();
        assert_eq!(entry.best_time, Some(3600));
        assert_eq!(entry.fastest_pace, Some(d("254.1")));
        assert_eq!(entry.total_runs, 2);
        assert_eq!(entry.total_distance, d("17.0"));
        assert_eq!(entry.total_duration, 7800);
        assert_eq!(entry.average_pace, Some(d("275.3")));
        assert_eq!(entry.last_run_date, Some(ts(2_000)));
    }

    #[tokio::test]
    async fn faster_third_run_updates_records() {
        let store = store_with_pair();
        merge_all(
            &store,
            &[
                ended_run(1, 1_000, 3600, "8.5", Some("254.1")),
                ended_run(2, 2_000, 4200, "8.5", Some("296.5")),
                ended_run(3, 3_000, 3500, "8.5", Some("247.1")),
            ],
        )
        .await;

        let entry = store.entry(1, 1).unwrap();
        assert_eq!(entry.best_time, Some(3500));
        assert_eq!(entry.fastest_pace, Some(d("247.1")));
        assert_eq!(entry.total_runs, 3);
    }

    #[tokio::test]
    async fn merge_order_does_not_matter_and_matches_rebuild() {
        let runs = [
            ended_run(1, 5_000, 4100, "8.3", Some("493.98")),
            ended_run(2, 1_000, 3600, "8.5", Some("423.53")),
            ended_run(3, 9_000, 3900, "8.6", Some("453.49")),
        ];

        let forward = store_with_pair();
        merge_all(&forward, &runs).await;

        let mut reversed_runs = runs.to_vec();
        reversed_runs.reverse();
        let reversed = store_with_pair();
        merge_all(&reversed, &reversed_runs).await;

        let batch = store_with_pair();
        for run in &runs {
            batch.add_run(run.clone());
        }
        rebuild_leaderboard(&batch).await.unwrap();

        let a = forward.entry(1, 1).unwrap();
        let b = reversed.entry(1, 1).unwrap();
        let c = batch.entry(1, 1).unwrap();
        assert!(a.same_stats(&b));
        assert!(a.same_stats(&c));
    }

    #[tokio::test]
    async fn best_time_and_fastest_pace_never_increase() {
        let store = store_with_pair();
        let durations = [4000, 3800, 4500, 3600, 5000, 3700];

        let mut last_best: Option<i32> = None;
        let mut last_pace: Option<Decimal> = None;
        for (i, duration) in durations.into_iter().enumerate() {
            let pace = derive_pace(duration, d("8.5")).unwrap().to_string();
            let run = ended_run(
                i as i64 + 1,
                1_000 * (i as i64 + 1),
                duration,
                "8.5",
                Some(pace.as_str()),
            );
            store.add_run(run.clone());
            let entry = merge_run(&store, &run).await.unwrap();

            if let Some(prev) = last_best {
                assert!(entry.best_time.unwrap() <= prev);
            }
            if let Some(prev) = last_pace {
                assert!(entry.fastest_pace.unwrap() <= prev);
            }
            last_best = entry.best_time;
            last_pace = entry.fastest_pace;
        }
    }

    #[tokio::test]
    async fn rebuild_twice_is_a_noop() {
        let store = store_with_pair();
        store.add_user(2);
        for run in [
            ended_run(1, 1_000, 3600, "8.5", Some("423.53")),
            ended_run(2, 2_000, 4200, "8.5", Some("494.12")),
        ] {
            store.add_run(run);
        }
        let mut other_user = ended_run(3, 4_000, 3000, "5.0", Some("600.0"));
        other_user.user_id = 2;
        store.add_run(other_user);

        let first = rebuild_leaderboard(&store).await.unwrap();
        assert_eq!(first.pairs, 2);
        assert_eq!(first.written, 2);

        let before: Vec<_> = [(1, 1), (2, 1)]
            .iter()
            .map(|&(u, r)| store.entry(u, r).unwrap())
            .collect();

        let second = rebuild_leaderboard(&store).await.unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, 2);

        let after: Vec<_> = [(1, 1), (2, 1)]
            .iter()
            .map(|&(u, r)| store.entry(u, r).unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn rebuild_does_not_regress_concurrently_merged_records() {
        let store = store_with_pair();
        store.add_run(ended_run(1, 1_000, 3600, "8.5", Some("423.53")));

        // A newer run merged in after the rebuild's read snapshot would have
        // left a better record than the run table we see here.
        let racing = LeaderboardEntry {
            user_id: 1,
            route_id: 1,
            best_time: Some(3000),
            fastest_pace: Some(d("352.94")),
            total_runs: 2,
            total_distance: d("17.0"),
            total_duration: 6600,
            average_pace: Some(d("388.24")),
            last_run_date: Some(ts(9_000)),
            updated_at: ts(9_001),
        };
        store.store_entry(None, &racing).await.unwrap();

        rebuild_leaderboard(&store).await.unwrap();

        let entry = store.entry(1, 1).unwrap();
        assert_eq!(entry.best_time, Some(3000));
        assert_eq!(entry.fastest_pace, Some(d("352.94")));
        assert_eq!(entry.last_run_date, Some(ts(9_000)));
        // Totals come from the recompute's run set.
        assert_eq!(entry.total_runs, 1);
        assert_eq!(entry.total_distance, d("8.5"));
    }

    #[tokio::test]
    async fn replaying_a_run_double_counts_totals() {
        let store = store_with_pair();
        let run = ended_run(1, 1_000, 3600, "8.5", Some("423.53"));
        store.add_run(run.clone());

        merge_run(&store, &run).await.unwrap();
        merge_run(&store, &run).await.unwrap();

        let entry = store.entry(1, 1).unwrap();
        // No dedup key beyond the run id; delivery must be at-most-once.
        assert_eq!(entry.total_runs, 2);
        assert_eq!(entry.total_distance, d("17.0"));
        assert_eq!(entry.best_time, Some(3600));
    }

    #[tokio::test]
    async fn zero_distance_runs_carry_no_pace() {
        let store = store_with_pair();
        merge_all(
            &store,
            &[
                ended_run(1, 1_000, 1800, "0", None),
                ended_run(2, 2_000, 3600, "8.5", Some("423.53")),
            ],
        )
        .await;

        let entry = store.entry(1, 1).unwrap();
        // Undefined paces stay out of min and mean; durations still count.
        assert_eq!(entry.best_time, Some(1800));
        assert_eq!(entry.fastest_pace, Some(d("423.53")));
        assert_eq!(entry.average_pace, Some(d("423.53")));
        assert_eq!(entry.total_runs, 2);
    }

    #[tokio::test]
    async fn in_progress_run_is_rejected() {
        let store = store_with_pair();
        let mut run = ended_run(1, 1_000, 3600, "8.5", Some("423.53"));
        run.ended_at = None;

        let err = merge_run(&store, &run).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRun(_)));
        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test]
    async fn negative_metrics_are_rejected() {
        let store = store_with_pair();

        let mut run = ended_run(1, 1_000, 3600, "8.5", Some("423.53"));
        run.duration_seconds = Some(-1);
        assert!(matches!(
            merge_run(&store, &run).await.unwrap_err(),
            AppError::InvalidRun(_)
        ));

        let mut run = ended_run(2, 1_000, 3600, "8.5", Some("423.53"));
        run.distance_km = Some(d("-0.5"));
        assert!(matches!(
            merge_run(&store, &run).await.unwrap_err(),
            AppError::InvalidRun(_)
        ));
    }

    #[tokio::test]
    async fn dangling_references_are_not_skipped() {
        let store = MemoryStore::new();
        store.add_user(1);
        // No route 1.
        let run = ended_run(1, 1_000, 3600, "8.5", Some("423.53"));
        store.add_run(run.clone());

        assert!(matches!(
            merge_run(&store, &run).await.unwrap_err(),
            AppError::NotFound
        ));
        assert!(matches!(
            rebuild_leaderboard(&store).await.unwrap_err(),
            AppError::NotFound
        ));
    }

    /// Wraps a [`MemoryStore`] and fails the first `failures` CAS writes.
    struct ConflictingStore {
        inner: MemoryStore,
        remaining: Mutex<u32>,
    }

    #[async_trait]
    impl LeaderboardStore for ConflictingStore {
        async fn user_exists(&self, user_id: i64) -> Result<bool, AppError> {
            self.inner.user_exists(user_id).await
        }
        async fn route_exists(&self, route_id: i64) -> Result<bool, AppError> {
            self.inner.route_exists(route_id).await
        }
        async fn ended_runs_for_pair(
            &self,
            user_id: i64,
            route_id: i64,
        ) -> Result<Vec<Run>, AppError> {
            self.inner.ended_runs_for_pair(user_id, route_id).await
        }
        async fn all_ended_runs(&self) -> Result<Vec<Run>, AppError> {
            self.inner.all_ended_runs().await
        }
        async fn load_entry(
            &self,
            user_id: i64,
            route_id: i64,
        ) -> Result<Option<LeaderboardEntry>, AppError> {
            self.inner.load_entry(user_id, route_id).await
        }
        async fn store_entry(
            &self,
            expected: Option<&LeaderboardEntry>,
            next: &LeaderboardEntry,
        ) -> Result<(), AppError> {
            {
                let mut remaining = self.remaining.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AppError::ConcurrentUpdateConflict);
                }
            }
            self.inner.store_entry(expected, next).await
        }
    }

    #[tokio::test]
    async fn transient_conflicts_are_retried() {
        let store = ConflictingStore {
            inner: store_with_pair(),
            remaining: Mutex::new(MAX_WRITE_ATTEMPTS - 1),
        };
        let run = ended_run(1, 1_000, 3600, "8.5", Some("423.53"));
        store.inner.add_run(run.clone());

        let entry = merge_run(&store, &run).await.unwrap();
        assert_eq!(entry.best_time, Some(3600));
        assert_eq!(store.inner.entry_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_conflicts_surface_as_aggregation_failed() {
        let store = ConflictingStore {
            inner: store_with_pair(),
            remaining: Mutex::new(MAX_WRITE_ATTEMPTS),
        };
        let run = ended_run(1, 1_000, 3600, "8.5", Some("423.53"));
        store.inner.add_run(run.clone());

        assert!(matches!(
            merge_run(&store, &run).await.unwrap_err(),
            AppError::AggregationFailed
        ));
        assert_eq!(store.inner.entry_count(), 0);
    }

    #[tokio::test]
    async fn rebuild_ignores_in_progress_runs() {
        let store = store_with_pair();
        store.add_run(ended_run(1, 1_000, 3600, "8.5", Some("423.53")));
        let mut in_progress = ended_run(2, 2_000, 0, "0", None);
        in_progress.ended_at = None;
        in_progress.duration_seconds = None;
        in_progress.distance_km = None;
        store.add_run(in_progress);

        let summary = rebuild_leaderboard(&store).await.unwrap();
        assert_eq!(summary.pairs, 1);
        assert_eq!(store.entry(1, 1).unwrap().total_runs, 1);
    }

    #[test]
    fn pace_is_undefined_for_zero_distance() {
        assert_eq!(derive_pace(3600, Decimal::ZERO), None);
        assert_eq!(derive_pace(3600, d("8.5")), Some(d("423.53")));
        assert_eq!(derive_pace(0, d("8.5")), Some(Decimal::ZERO));
    }
}
