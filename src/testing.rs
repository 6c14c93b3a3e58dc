//! In-process doubles shared by the unit tests.

use crate::api::{ApiError, ApiResult, WorkoutApi};
use crate::events::{EventSink, SessionEvent};
use crate::models::{
    ActiveSessionSnapshot, ExerciseHistoryEntry, ExerciseProgress, HistorySet, NewSet,
    StartedSession,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    StartSession(String),
    AddSet(String, u32),
    FinishSession(String),
    GetActiveSession(String),
    GetExerciseHistory(String),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<ApiCall>,
    submitted: Vec<(String, NewSet)>,
    active: Option<ActiveSessionSnapshot>,
    history: HashMap<String, Vec<ExerciseHistoryEntry>>,
    started: u32,
    start_failures: VecDeque<ApiError>,
    add_set_failures: VecDeque<ApiError>,
    finish_failures: VecDeque<ApiError>,
    active_failures: VecDeque<ApiError>,
    history_failures: VecDeque<ApiError>,
}

/// Scripted [`WorkoutApi`]: each `fail_next_*` queues one failure for the
/// matching call, otherwise the call succeeds against in-memory state.
#[derive(Default)]
pub struct FakeWorkoutApi {
    state: Mutex<FakeState>,
}

impl FakeWorkoutApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active_session(snapshot: ActiveSessionSnapshot) -> Self {
        let api = Self::new();
        api.set_active_session(Some(snapshot));
        api
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake api lock")
    }

    pub fn set_active_session(&self, snapshot: Option<ActiveSessionSnapshot>) {
        self.state().active = snapshot;
    }

    pub fn set_history(&self, exercise_ref: &str, history: Vec<ExerciseHistoryEntry>) {
        self.state()
            .history
            .insert(exercise_ref.to_string(), history);
    }

    pub fn fail_next_start(&self, error: ApiError) {
        self.state().start_failures.push_back(error);
    }

    pub fn fail_next_add_set(&self, error: ApiError) {
        self.state().add_set_failures.push_back(error);
    }

    pub fn fail_next_finish(&self, error: ApiError) {
        self.state().finish_failures.push_back(error);
    }

    pub fn fail_next_active(&self, error: ApiError) {
        self.state().active_failures.push_back(error);
    }

    pub fn fail_next_history(&self, error: ApiError) {
        self.state().history_failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    pub fn submitted_sets(&self) -> Vec<(String, NewSet)> {
        self.state().submitted.clone()
    }

    pub fn start_calls(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::StartSession(_)))
    }

    pub fn finish_calls(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::FinishSession(_)))
    }

    pub fn history_calls(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::GetExerciseHistory(_)))
    }

    fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(*call)).count()
    }
}

#[async_trait]
impl WorkoutApi for FakeWorkoutApi {
    async fn start_session(&self, plan_id: &str) -> ApiResult<StartedSession> {
        let mut state = self.state();
        state.calls.push(ApiCall::StartSession(plan_id.to_string()));
        if let Some(error) = state.start_failures.pop_front() {
            return Err(error);
        }
        state.started += 1;
        Ok(StartedSession {
            session_id: format!("s-{}", state.started),
        })
    }

    async fn add_set(&self, session_id: &str, set: &NewSet) -> ApiResult<()> {
        let mut state = self.state();
        state
            .calls
            .push(ApiCall::AddSet(set.exercise_ref.clone(), set.set_number));
        if let Some(error) = state.add_set_failures.pop_front() {
            return Err(error);
        }
        state.submitted.push((session_id.to_string(), set.clone()));
        Ok(())
    }

    async fn finish_session(&self, session_id: &str) -> ApiResult<()> {
        let mut state = self.state();
        state
            .calls
            .push(ApiCall::FinishSession(session_id.to_string()));
        if let Some(error) = state.finish_failures.pop_front() {
            return Err(error);
        }
        state.active = None;
        Ok(())
    }

    async fn get_active_session(&self, user_id: &str) -> ApiResult<Option<ActiveSessionSnapshot>> {
        let mut state = self.state();
        state
            .calls
            .push(ApiCall::GetActiveSession(user_id.to_string()));
        if let Some(error) = state.active_failures.pop_front() {
            return Err(error);
        }
        Ok(state.active.clone())
    }

    async fn get_exercise_history(
        &self,
        exercise_ref: &str,
    ) -> ApiResult<Vec<ExerciseHistoryEntry>> {
        let mut state = self.state();
        state
            .calls
            .push(ApiCall::GetExerciseHistory(exercise_ref.to_string()));
        if let Some(error) = state.history_failures.pop_front() {
            return Err(error);
        }
        Ok(state.history.get(exercise_ref).cloned().unwrap_or_default())
    }
}

/// Keeps every emitted event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("sink lock").clone()
    }

    pub fn count(&self, predicate: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events
            .lock()
            .expect("sink lock")
            .iter()
            .filter(|event| predicate(*event))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &SessionEvent) -> Result<(), String> {
        self.events
            .lock()
            .map_err(|_| "sink lock poisoned".to_string())?
            .push(event.clone());
        Ok(())
    }
}

pub fn history_entry(date: &str) -> ExerciseHistoryEntry {
    ExerciseHistoryEntry {
        date: date.to_string(),
        sets: vec![HistorySet {
            set: 1,
            reps: 8,
            weight: 60.0,
        }],
    }
}

/// Push day, 14 minutes in: bench 3/4 done, dips untouched.
pub fn sample_snapshot() -> ActiveSessionSnapshot {
    ActiveSessionSnapshot {
        session_id: "s-remote".to_string(),
        workout_id: "w-1".to_string(),
        workout_name: "Push Day".to_string(),
        completed_sets: 3,
        total_sets: 8,
        elapsed_minutes: 14,
        exercises: vec![
            ExerciseProgress {
                exercise_ref: "e-1".to_string(),
                name: "Bench Press".to_string(),
                sets: 4,
                reps: 8,
                weight: 60.0,
                rest_time_seconds: 90,
                completed_sets: 3,
            },
            ExerciseProgress {
                exercise_ref: "e-2".to_string(),
                name: "Dips".to_string(),
                sets: 4,
                reps: 10,
                weight: 0.0,
                rest_time_seconds: 60,
                completed_sets: 0,
            },
        ],
    }
}
