//! Process-wide "a workout is running" clock.
//!
//! Elapsed time is always recomputed from the absolute start instant, so a
//! suspended or restarted process catches up on the next read no matter how
//! many ticks were missed.

use crate::clock::Clock;
use crate::data_manager::{ClockStore, DataError, DataResult};
use crate::recovery_state::PersistedClockRecord;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveWorkout {
    workout_id: String,
    started_at_ms: i64,
}

/// Read-only view of the clock for hosts and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClockState {
    pub is_active: bool,
    pub start_instant: Option<i64>,
    pub active_workout_id: Option<String>,
    pub elapsed_seconds: u64,
}

pub struct SessionClock {
    active: Option<ActiveWorkout>,
    elapsed_seconds: u64,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ClockStore>,
}

impl std::fmt::Debug for SessionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClock")
            .field("active", &self.active)
            .field("elapsed_seconds", &self.elapsed_seconds)
            .finish()
    }
}

impl SessionClock {
    pub fn new(clock: Arc<dyn Clock>, store: Arc<dyn ClockStore>) -> Self {
        Self {
            active: None,
            elapsed_seconds: 0,
            clock,
            store,
        }
    }

    /// Rebuilds the clock at process start from the persisted record and
    /// catches elapsed time up to now. The record is never erased here.
    pub fn restore(clock: Arc<dyn Clock>, store: Arc<dyn ClockStore>) -> DataResult<Self> {
        let mut session_clock = Self::new(clock, store);
        let record = match session_clock.store.load_record() {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(session_clock),
            Err(DataError::Serde(err)) => {
                tracing::warn!(error = %err, "Ignoring unreadable workout clock record");
                return Ok(session_clock);
            }
            Err(err) => return Err(err),
        };
        match record.resumable() {
            Some((workout_id, started_at_ms)) => {
                session_clock.active = Some(ActiveWorkout {
                    workout_id: workout_id.to_string(),
                    started_at_ms,
                });
                let elapsed = session_clock.tick();
                tracing::info!(
                    workout_id = %workout_id,
                    elapsed_seconds = elapsed,
                    "Restored active workout clock"
                );
            }
            None if record.is_active => {
                tracing::warn!(?record, "Ignoring incomplete active workout record");
            }
            None => {}
        }
        Ok(session_clock)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn start_instant(&self) -> Option<i64> {
        self.active.as_ref().map(|active| active.started_at_ms)
    }

    pub fn active_workout_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.workout_id.as_str())
    }

    /// Last value computed by [`SessionClock::tick`].
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Starts the clock now. Callers gate on [`SessionClock::is_active`];
    /// an active clock is overwritten.
    pub fn start_workout(&mut self, workout_id: impl Into<String>) -> DataResult<()> {
        let now = self.clock.now_ms();
        self.begin(workout_id.into(), now)
    }

    /// Starts the clock from a start instant learned elsewhere, e.g. the
    /// server session when the local half of a start never happened.
    pub fn resume_workout(
        &mut self,
        workout_id: impl Into<String>,
        started_at_ms: i64,
    ) -> DataResult<()> {
        self.begin(workout_id.into(), started_at_ms)?;
        self.tick();
        Ok(())
    }

    fn begin(&mut self, workout_id: String, started_at_ms: i64) -> DataResult<()> {
        if let Some(previous) = &self.active {
            tracing::warn!(
                previous_workout_id = %previous.workout_id,
                workout_id = %workout_id,
                "Overwriting active workout clock"
            );
        }
        let record = PersistedClockRecord::active(workout_id.clone(), started_at_ms);
        self.active = Some(ActiveWorkout {
            workout_id,
            started_at_ms,
        });
        self.elapsed_seconds = 0;
        self.store.save_record(&record)
    }

    /// Stops the clock and erases the persisted record. Safe when inactive.
    pub fn end_workout(&mut self) -> DataResult<()> {
        if let Some(active) = self.active.take() {
            tracing::info!(
                workout_id = %active.workout_id,
                elapsed_seconds = self.elapsed_seconds,
                "Workout clock ended"
            );
        }
        self.elapsed_seconds = 0;
        self.store.clear_record()
    }

    /// Recomputes elapsed seconds from the start instant.
    pub fn tick(&mut self) -> u64 {
        if self.active.is_some() {
            self.elapsed_seconds = self.elapsed_now();
        }
        self.elapsed_seconds
    }

    /// Elapsed seconds at this instant without touching stored state.
    pub fn elapsed_now(&self) -> u64 {
        match &self.active {
            Some(active) => elapsed_between(active.started_at_ms, self.clock.now_ms()),
            None => 0,
        }
    }

    /// Current instant from the injected time source.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn formatted_elapsed(&self) -> String {
        format_time(self.elapsed_now())
    }

    pub fn state(&self) -> SessionClockState {
        SessionClockState {
            is_active: self.is_active(),
            start_instant: self.start_instant(),
            active_workout_id: self.active_workout_id().map(str::to_string),
            elapsed_seconds: self.elapsed_seconds,
        }
    }
}

fn elapsed_between(start_ms: i64, now_ms: i64) -> u64 {
    let delta = now_ms.saturating_sub(start_ms);
    if delta <= 0 {
        0
    } else {
        (delta / 1000) as u64
    }
}

/// `H:MM:SS` from one hour up, `MM:SS` below.
pub fn format_time(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if total_seconds >= 3600 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::{format_time, SessionClock};
    use crate::clock::ManualClock;
    use crate::data_manager::{ClockStore, DataManager, MemoryClockStore};
    use crate::recovery_state::PersistedClockRecord;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    const T0: i64 = 1_700_000_000_000;

    fn clock_with_store() -> (Arc<ManualClock>, Arc<MemoryClockStore>, SessionClock) {
        let clock = Arc::new(ManualClock::new(T0));
        let store = Arc::new(MemoryClockStore::new());
        let session_clock = SessionClock::new(clock.clone(), store.clone());
        (clock, store, session_clock)
    }

    fn assert_invariant(session_clock: &SessionClock) {
        let state = session_clock.state();
        assert_eq!(state.is_active, state.start_instant.is_some());
        assert_eq!(state.is_active, state.active_workout_id.is_some());
        if !state.is_active {
            assert_eq!(state.elapsed_seconds, 0);
        }
    }

    #[test]
    fn start_persists_immediately() {
        let (_clock, store, mut session_clock) = clock_with_store();
        session_clock.start_workout("workout-1").expect("start");

        let record = store.load_record().expect("load").expect("record");
        assert_eq!(record, PersistedClockRecord::active("workout-1", T0));
        assert!(session_clock.is_active());
        assert_eq!(session_clock.elapsed_seconds(), 0);
    }

    #[test]
    fn elapsed_catches_up_without_ticks() {
        let (clock, _store, mut session_clock) = clock_with_store();
        session_clock.start_workout("workout-1").expect("start");

        clock.advance_secs(125);
        assert_eq!(session_clock.elapsed_now(), 125);
        assert_eq!(session_clock.formatted_elapsed(), "02:05");
        assert_eq!(session_clock.elapsed_seconds(), 0);
        assert_eq!(session_clock.tick(), 125);
    }

    #[test]
    fn elapsed_floors_partial_seconds() {
        let (clock, _store, mut session_clock) = clock_with_store();
        session_clock.start_workout("workout-1").expect("start");
        clock.advance_ms(2_999);
        assert_eq!(session_clock.tick(), 2);
    }

    #[test]
    fn elapsed_clamps_clock_skew_to_zero() {
        let (clock, _store, mut session_clock) = clock_with_store();
        session_clock.start_workout("workout-1").expect("start");
        clock.advance_secs(-30);
        assert_eq!(session_clock.tick(), 0);
    }

    #[test]
    fn elapsed_matches_floor_for_random_reads() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let (clock, _store, mut session_clock) = clock_with_store();
            session_clock.start_workout("workout-1").expect("start");
            let ticks = rng.gen_range(0..5);
            for _ in 0..ticks {
                clock.advance_ms(rng.gen_range(0..5_000));
                session_clock.tick();
            }
            let gap = rng.gen_range(0..10_000_000_i64);
            clock.set(T0 + gap);
            assert_eq!(session_clock.elapsed_now(), (gap / 1000) as u64);
        }
    }

    #[test]
    fn end_is_idempotent_and_erases_record() {
        let (clock, store, mut session_clock) = clock_with_store();
        session_clock.start_workout("workout-1").expect("start");
        clock.advance_secs(10);
        session_clock.tick();

        session_clock.end_workout().expect("end");
        session_clock.end_workout().expect("end again");

        assert!(!session_clock.is_active());
        assert_eq!(session_clock.elapsed_seconds(), 0);
        assert_eq!(session_clock.tick(), 0);
        assert!(store.load_record().expect("load").is_none());
    }

    #[test]
    fn clock_fields_move_together_under_random_sequences() {
        let mut rng = StdRng::seed_from_u64(42);
        let (clock, store, mut session_clock) = clock_with_store();
        for step in 0..500 {
            clock.advance_ms(rng.gen_range(0..3_000));
            match rng.gen_range(0..3) {
                0 => session_clock
                    .start_workout(format!("workout-{step}"))
                    .expect("start"),
                1 => session_clock.end_workout().expect("end"),
                _ => {
                    session_clock.tick();
                }
            }
            assert_invariant(&session_clock);
            let persisted = store.load_record().expect("load");
            assert_eq!(persisted.is_some(), session_clock.is_active());
        }
    }

    #[test]
    fn restore_resumes_and_catches_up() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(DataManager::new(dir.path()).expect("manager"));
        let clock = Arc::new(ManualClock::new(T0));

        let mut first = SessionClock::new(clock.clone(), store.clone());
        first.start_workout("workout-9").expect("start");
        drop(first);

        clock.advance_secs(3_725);
        let restored = SessionClock::restore(clock.clone(), store.clone()).expect("restore");
        assert!(restored.is_active());
        assert_eq!(restored.active_workout_id(), Some("workout-9"));
        assert_eq!(restored.start_instant(), Some(T0));
        assert_eq!(restored.elapsed_seconds(), 3_725);
        assert_eq!(restored.formatted_elapsed(), "1:02:05");
    }

    #[test]
    fn restore_without_record_is_inactive() {
        let clock = Arc::new(ManualClock::new(T0));
        let store = Arc::new(MemoryClockStore::new());
        let restored = SessionClock::restore(clock, store).expect("restore");
        assert!(!restored.is_active());
        assert_eq!(restored.elapsed_seconds(), 0);
    }

    #[test]
    fn restore_keeps_incomplete_record_on_disk() {
        let clock = Arc::new(ManualClock::new(T0));
        let record = PersistedClockRecord {
            is_active: true,
            start_time: None,
            active_workout_id: Some("workout-1".to_string()),
        };
        let store = Arc::new(MemoryClockStore::with_record(record.clone()));
        let restored = SessionClock::restore(clock, store.clone()).expect("restore");
        assert!(!restored.is_active());
        assert_eq!(store.load_record().expect("load"), Some(record));
    }

    #[test]
    fn restore_treats_unreadable_record_as_inactive() {
        let dir = tempfile::tempdir().expect("temp dir");
        let manager = DataManager::new(dir.path()).expect("manager");
        std::fs::write(manager.active_workout_path(), "{not json").expect("write");

        let session_clock =
            SessionClock::restore(Arc::new(ManualClock::new(T0)), Arc::new(manager))
                .expect("restore");
        assert!(!session_clock.is_active());
    }

    #[test]
    fn resume_workout_uses_given_start() {
        let (clock, store, mut session_clock) = clock_with_store();
        clock.advance_secs(600);
        session_clock
            .resume_workout("workout-3", T0)
            .expect("resume");
        assert_eq!(session_clock.elapsed_seconds(), 600);
        let record = store.load_record().expect("load").expect("record");
        assert_eq!(record.start_time, Some(T0));
    }

    #[test]
    fn format_time_switches_to_hours() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(59), "00:59");
        assert_eq!(format_time(125), "02:05");
        assert_eq!(format_time(3_599), "59:59");
        assert_eq!(format_time(3_600), "1:00:00");
        assert_eq!(format_time(36_061), "10:01:01");
    }
}
