//! Fixed-interval draw scheduler.
//!
//! The scheduler owns the wall-clock deadline of the next draw and a guard that
//! keeps at most one resolution in flight. [`DrawScheduler::try_begin`] advances the
//! deadline synchronously, under the same lock that claims the guard, before any
//! store I/O starts. Overlapping callers (the background ticker and status
//! requests) therefore observe the new deadline and back off instead of resolving
//! the same interval twice, and a slow or failed resolution cannot miss the next
//! deadline.
//!
//! A resolution that fails before its result is appended is skipped and logged:
//! no result exists for that interval, the pending target stays in place for the
//! next draw, and the deadline remains advanced. Once the result is stored the
//! resolution counts as completed; clearing a consumed pin is retried once and
//! a second failure is only logged.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    dao::{draw_store::DrawStore, models::DrawResultEntity, storage::StorageError},
    state::draw::{InvalidTarget, PendingTarget, pick_value},
};

/// Shortest interval the scheduler accepts.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Errors surfaced by scheduler operations.
#[derive(Debug, Error)]
pub enum DrawError {
    /// Raw target outside `-1..=9`.
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTarget),
    /// The store failed before the draw was recorded.
    #[error("draw store failure: {0}")]
    Store(#[from] StorageError),
}

/// Read-only view of the scheduler at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawStatus {
    /// Wall-clock instant of the next draw.
    pub next_deadline: SystemTime,
    /// Whole seconds until `next_deadline`, clamped to `0..=interval`.
    pub seconds_remaining: u64,
    /// Target the next draw will use.
    pub pending_target: PendingTarget,
}

#[derive(Debug)]
struct SchedulerState {
    next_deadline: SystemTime,
    resolving: bool,
}

/// Single per-process scheduler shared by the ticker and the HTTP handlers.
#[derive(Debug)]
pub struct DrawScheduler {
    interval: Duration,
    state: Mutex<SchedulerState>,
}

/// Proof that the caller owns the in-flight resolution; releases it on drop.
#[must_use = "dropping the guard immediately releases the resolution slot"]
#[derive(Debug)]
pub struct ResolvingGuard<'a> {
    scheduler: &'a DrawScheduler,
    due: SystemTime,
}

impl ResolvingGuard<'_> {
    /// Deadline this resolution was started for.
    pub fn due(&self) -> SystemTime {
        self.due
    }
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.lock().resolving = false;
    }
}

impl DrawScheduler {
    /// Create a scheduler whose first draw is due one interval after `start`.
    pub fn new(interval: Duration, start: SystemTime) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        Self {
            interval,
            state: Mutex::new(SchedulerState {
                next_deadline: start + interval,
                resolving: false,
            }),
        }
    }

    /// Effective interval after clamping to [`MIN_INTERVAL`].
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deadline of the next draw.
    pub fn next_deadline(&self) -> SystemTime {
        self.lock().next_deadline
    }

    /// Whether a resolution is currently in flight.
    pub fn is_resolving(&self) -> bool {
        self.lock().resolving
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the resolution slot if a draw is due at `now`.
    ///
    /// On success the deadline has already moved to the first interval boundary
    /// strictly after `now`; intervals missed while the process was stalled are not
    /// backfilled.
    pub fn try_begin(&self, now: SystemTime) -> Option<ResolvingGuard<'_>> {
        let mut state = self.lock();
        if state.resolving || now < state.next_deadline {
            return None;
        }

        let due = state.next_deadline;
        let behind = now.duration_since(due).unwrap_or_default();
        let missed = behind.as_nanos() / self.interval.as_nanos();
        let steps = u32::try_from(missed.saturating_add(1)).unwrap_or(u32::MAX);
        state.next_deadline = self
            .interval
            .checked_mul(steps)
            .and_then(|offset| due.checked_add(offset))
            .unwrap_or(now + self.interval);
        state.resolving = true;

        if missed > 0 {
            warn!(missed = %missed, "draw deadlines missed; skipping to the next boundary");
        }

        Some(ResolvingGuard { scheduler: self, due })
    }

    /// Resolve the draw claimed by `guard` and persist it.
    ///
    /// The guard is released on every exit path, including store failures.
    pub async fn resolve<S>(
        &self,
        guard: ResolvingGuard<'_>,
        store: &S,
        now: SystemTime,
    ) -> Result<DrawResultEntity, DrawError>
    where
        S: DrawStore + ?Sized,
    {
        let due = guard.due();
        let outcome = self.persist_draw(store, now).await;
        drop(guard);

        match &outcome {
            Ok(result) => info!(
                value = result.value,
                source = ?result.source,
                next_deadline = ?self.next_deadline(),
                "draw resolved"
            ),
            Err(err) => warn!(
                ?due,
                error = %err,
                "draw resolution failed; interval skipped"
            ),
        }
        outcome
    }

    async fn persist_draw<S>(&self, store: &S, now: SystemTime) -> Result<DrawResultEntity, DrawError>
    where
        S: DrawStore + ?Sized,
    {
        let target = store.read_pending_target().await?;
        let (value, source) = pick_value(target, &mut rand::rng());
        let result = DrawResultEntity::new(value, source, now);

        store.append_result(result.clone()).await?;

        if let PendingTarget::Pinned(_) = target {
            consume_pin(store, target).await;
        }

        Ok(result)
    }

    /// Resolve a draw if one is due at `now`.
    ///
    /// Returns `Ok(None)` when nothing was due or another caller is already resolving.
    pub async fn tick<S>(
        &self,
        store: &S,
        now: SystemTime,
    ) -> Result<Option<DrawResultEntity>, DrawError>
    where
        S: DrawStore + ?Sized,
    {
        let Some(guard) = self.try_begin(now) else {
            return Ok(None);
        };
        self.resolve(guard, store, now).await.map(Some)
    }

    /// Whole seconds until the next draw, clamped to `0..=interval`.
    pub fn seconds_remaining(&self, now: SystemTime) -> u64 {
        self.remaining_until(self.next_deadline(), now)
    }

    fn remaining_until(&self, deadline: SystemTime, now: SystemTime) -> u64 {
        deadline
            .duration_since(now)
            .unwrap_or_default()
            .as_secs()
            .min(self.interval.as_secs())
    }

    /// Assemble the status view from the scheduler clock and a pending target.
    pub fn status(&self, now: SystemTime, pending_target: PendingTarget) -> DrawStatus {
        let next_deadline = self.next_deadline();
        DrawStatus {
            next_deadline,
            seconds_remaining: self.remaining_until(next_deadline, now),
            pending_target,
        }
    }

    /// Overwrite the pending target after validating the raw `-1..=9` value.
    pub async fn set_pending_target<S>(&self, store: &S, raw: i64) -> Result<PendingTarget, DrawError>
    where
        S: DrawStore + ?Sized,
    {
        let target = PendingTarget::from_raw(raw)?;
        store.write_pending_target(target).await?;
        Ok(target)
    }

    /// Newest `limit` valid results, newest first.
    pub async fn recent_history<S>(
        &self,
        store: &S,
        limit: usize,
    ) -> Result<Vec<DrawResultEntity>, DrawError>
    where
        S: DrawStore + ?Sized,
    {
        let mut history = store.query_history(limit).await?;
        history.retain(DrawResultEntity::is_valid);
        history.truncate(limit);
        Ok(history)
    }
}

/// Clear a pin that the stored draw just used.
///
/// Values are compared, not writes: re-pinning the same value while it resolves
/// is cleared together with it.
async fn consume_pin<S>(store: &S, target: PendingTarget)
where
    S: DrawStore + ?Sized,
{
    let mut retried = false;
    loop {
        match store.reset_pending_target(target).await {
            Ok(true) => return,
            Ok(false) => {
                info!("pending target replaced during resolution; keeping the newer value");
                return;
            }
            Err(err) if !retried => {
                debug!(error = %err, "clearing consumed pending target failed; retrying");
                retried = true;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    target = target.as_raw(),
                    "draw result saved but pending target not cleared"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::draw_store::memory::MemoryStore,
        state::draw::{DrawSource, DrawValue},
    };

    const INTERVAL: Duration = Duration::from_secs(60);

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn scheduler() -> DrawScheduler {
        DrawScheduler::new(INTERVAL, at(0))
    }

    fn pinned(value: i64) -> PendingTarget {
        PendingTarget::Pinned(DrawValue::new(value).unwrap())
    }

    #[tokio::test]
    async fn nothing_resolves_before_deadline() {
        let scheduler = scheduler();
        let store = MemoryStore::new();

        assert!(scheduler.tick(&store, at(59)).await.unwrap().is_none());
        assert!(store.results().await.is_empty());
        assert_eq!(scheduler.next_deadline(), at(60));
    }

    #[tokio::test]
    async fn random_draw_after_deadline() {
        let scheduler = scheduler();
        let store = MemoryStore::new();

        let result = scheduler.tick(&store, at(61)).await.unwrap().unwrap();
        assert!((0..=9).contains(&result.value));
        assert_eq!(result.source, DrawSource::Random);
        assert_eq!(result.resolved_at, at(61));
        assert_eq!(store.results().await.len(), 1);
        assert_eq!(
            store.read_pending_target().await.unwrap(),
            PendingTarget::Random
        );
        assert_eq!(scheduler.next_deadline(), at(120));
        assert!(!scheduler.is_resolving());
    }

    #[tokio::test]
    async fn pinned_target_is_consumed() {
        let scheduler = scheduler();
        let store = MemoryStore::new();

        scheduler.set_pending_target(&store, 7).await.unwrap();
        assert_eq!(store.read_pending_target().await.unwrap(), pinned(7));
        assert!(scheduler.tick(&store, at(10)).await.unwrap().is_none());

        let result = scheduler.tick(&store, at(61)).await.unwrap().unwrap();
        assert_eq!(result.value, 7);
        assert_eq!(result.source, DrawSource::Pinned);
        assert_eq!(
            store.read_pending_target().await.unwrap(),
            PendingTarget::Random
        );
    }

    #[tokio::test]
    async fn pinned_five_wins_over_random() {
        let scheduler = scheduler();
        let store = MemoryStore::new();

        scheduler.set_pending_target(&store, 5).await.unwrap();
        let result = scheduler.tick(&store, at(60)).await.unwrap().unwrap();
        assert_eq!(result.value, 5);
    }

    #[tokio::test]
    async fn invalid_target_is_rejected_without_mutation() {
        let scheduler = scheduler();
        let store = MemoryStore::new();
        scheduler.set_pending_target(&store, 3).await.unwrap();

        for raw in [-2, 10, 100] {
            let err = scheduler.set_pending_target(&store, raw).await.unwrap_err();
            assert!(matches!(err, DrawError::InvalidTarget(InvalidTarget(v)) if v == raw));
        }
        assert_eq!(store.read_pending_target().await.unwrap(), pinned(3));

        for raw in -1..=9 {
            scheduler.set_pending_target(&store, raw).await.unwrap();
        }
    }

    #[tokio::test]
    async fn second_tick_for_same_instant_does_nothing() {
        let scheduler = scheduler();
        let store = MemoryStore::new();

        assert!(scheduler.tick(&store, at(61)).await.unwrap().is_some());
        assert!(scheduler.tick(&store, at(61)).await.unwrap().is_none());
        assert_eq!(store.results().await.len(), 1);
    }

    #[test]
    fn guard_blocks_overlapping_claims() {
        let scheduler = scheduler();

        let guard = scheduler.try_begin(at(61)).unwrap();
        assert_eq!(guard.due(), at(60));
        assert!(scheduler.is_resolving());
        assert_eq!(scheduler.next_deadline(), at(120));
        // Past the new deadline, but the first resolution is still in flight.
        assert!(scheduler.try_begin(at(125)).is_none());

        drop(guard);
        assert!(!scheduler.is_resolving());
        assert!(scheduler.try_begin(at(125)).is_some());
    }

    #[tokio::test]
    async fn concurrent_ticks_resolve_once() {
        let scheduler = Arc::new(scheduler());
        let store = MemoryStore::new();
        store
            .set_append_delay(Some(Duration::from_millis(50)))
            .await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                scheduler.tick(&store, at(61)).await
            }));
        }

        let mut resolved = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                resolved += 1;
            }
        }
        assert_eq!(resolved, 1);
        assert_eq!(store.results().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_resolution_skips_interval_and_releases_guard() {
        let scheduler = scheduler();
        let store = MemoryStore::new();
        scheduler.set_pending_target(&store, 4).await.unwrap();

        store.set_fail_writes(true);
        let err = scheduler.tick(&store, at(61)).await.unwrap_err();
        assert!(matches!(err, DrawError::Store(_)));
        assert!(!scheduler.is_resolving());
        assert_eq!(scheduler.next_deadline(), at(120));
        assert!(store.results().await.is_empty());

        store.set_fail_writes(false);
        assert!(scheduler.tick(&store, at(90)).await.unwrap().is_none());
        let result = scheduler.tick(&store, at(121)).await.unwrap().unwrap();
        assert_eq!(result.value, 4);
        assert_eq!(
            store.read_pending_target().await.unwrap(),
            PendingTarget::Random
        );
    }

    #[tokio::test]
    async fn saved_draw_completes_when_clearing_the_pin_fails_once() {
        let scheduler = scheduler();
        let store = MemoryStore::new();
        scheduler.set_pending_target(&store, 7).await.unwrap();

        store.fail_next_resets(1);
        let first = scheduler.tick(&store, at(61)).await.unwrap().unwrap();
        assert_eq!(first.value, 7);
        assert_eq!(first.source, DrawSource::Pinned);
        assert_eq!(
            store.read_pending_target().await.unwrap(),
            PendingTarget::Random
        );

        let second = scheduler.tick(&store, at(121)).await.unwrap().unwrap();
        assert_eq!(second.source, DrawSource::Random);
        assert_eq!(store.results().await.len(), 2);
    }

    #[tokio::test]
    async fn saved_draw_is_reported_even_if_the_pin_cannot_be_cleared() {
        let scheduler = scheduler();
        let store = MemoryStore::new();
        scheduler.set_pending_target(&store, 7).await.unwrap();

        store.fail_next_resets(2);
        let result = scheduler.tick(&store, at(61)).await.unwrap().unwrap();
        assert_eq!(result.value, 7);
        assert_eq!(store.results().await.len(), 1);
        assert!(!scheduler.is_resolving());
        assert_eq!(scheduler.next_deadline(), at(120));
    }

    #[tokio::test]
    async fn stalled_clock_resolves_once_and_realigns() {
        let scheduler = scheduler();
        let store = MemoryStore::new();

        assert!(scheduler.tick(&store, at(185)).await.unwrap().is_some());
        assert_eq!(scheduler.next_deadline(), at(240));
        assert!(scheduler.tick(&store, at(186)).await.unwrap().is_none());
        assert_eq!(store.results().await.len(), 1);
    }

    #[test]
    fn seconds_remaining_is_clamped() {
        let scheduler = scheduler();
        assert_eq!(scheduler.seconds_remaining(at(0)), 60);
        assert_eq!(scheduler.seconds_remaining(at(30)), 30);
        assert_eq!(scheduler.seconds_remaining(at(59)), 1);
        assert_eq!(scheduler.seconds_remaining(at(60)), 0);
        assert_eq!(scheduler.seconds_remaining(at(500)), 0);

        // Clock skew: a deadline further away than one interval still reports at most one.
        let early = SystemTime::UNIX_EPOCH;
        let skewed = DrawScheduler::new(INTERVAL, at(100));
        assert_eq!(skewed.seconds_remaining(early), 60);

        let status = scheduler.status(at(45), PendingTarget::Random);
        assert_eq!(status.next_deadline, at(60));
        assert_eq!(status.seconds_remaining, 15);
    }

    #[tokio::test]
    async fn history_excludes_invalid_rows() {
        let scheduler = scheduler();
        let store = MemoryStore::new();

        for secs in [60, 120, 180] {
            scheduler.tick(&store, at(secs)).await.unwrap().unwrap();
        }
        let mut legacy = DrawResultEntity::new(
            DrawValue::new(0).unwrap(),
            DrawSource::Random,
            at(200),
        );
        legacy.value = -1;
        store.append_result(legacy).await.unwrap();

        let history = scheduler.recent_history(&store, 10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].resolved_at, at(180));
        assert!(history.iter().all(DrawResultEntity::is_valid));

        let bounded = scheduler.recent_history(&store, 2).await.unwrap();
        assert_eq!(bounded.len(), 2);
    }
}
