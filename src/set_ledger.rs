//! Per-exercise completed-set tracking for the active session.
//!
//! Counts only move after the server confirms a set; there is no optimistic
//! bump. Submission is split into begin/confirm/abort so callers can release
//! their lock while the request is in flight.

use crate::api::{ApiError, WorkoutApi};
use crate::models::{ActiveSessionSnapshot, ExerciseHistoryEntry, ExerciseProgress, NewSet};
use serde::Serialize;
use thiserror::Error;

pub const WEIGHT_STEP: f64 = 2.5;
pub const REST_STEP_SECONDS: i32 = 15;
pub const MIN_REST_SECONDS: u32 = 15;

const NEEDS_SESSION_HINT: &str = "Start the workout to log sets";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No workout session has been started")]
    SessionNotStarted,
    #[error("Unknown exercise: {0}")]
    UnknownExercise(String),
    #[error("All sets already completed for {0}")]
    ExerciseComplete(String),
    #[error("A set for {0} is still being submitted")]
    SubmissionPending(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExerciseStatus {
    NotStarted,
    InProgress,
    Complete,
}

/// The "complete set" affordance as the UI should render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SetAction {
    #[serde(rename_all = "camelCase")]
    Available { set_number: u32 },
    NeedsSession,
    Pending,
    Complete,
}

impl SetAction {
    pub fn is_available(&self) -> bool {
        matches!(self, SetAction::Available { .. })
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SetAction::NeedsSession => Some(NEEDS_SESSION_HINT),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseCard {
    exercise_ref: String,
    name: String,
    planned_sets: u32,
    reps: u32,
    weight: f64,
    rest_seconds: u32,
    completed_sets: u32,
    expanded: bool,
    history: Option<Vec<ExerciseHistoryEntry>>,
    history_visible: usize,
    #[serde(skip)]
    history_loading: bool,
    #[serde(skip)]
    submitting: bool,
}

impl ExerciseCard {
    pub fn new(
        exercise_ref: impl Into<String>,
        name: impl Into<String>,
        planned_sets: u32,
        reps: u32,
        weight: f64,
        rest_seconds: u32,
    ) -> Self {
        Self {
            exercise_ref: exercise_ref.into(),
            name: name.into(),
            planned_sets,
            reps,
            weight: weight.max(0.0),
            rest_seconds,
            completed_sets: 0,
            expanded: false,
            history: None,
            history_visible: 0,
            history_loading: false,
            submitting: false,
        }
    }

    pub fn from_progress(progress: &ExerciseProgress) -> Self {
        let mut card = Self::new(
            progress.exercise_ref.clone(),
            progress.name.clone(),
            progress.sets,
            progress.reps,
            progress.weight,
            progress.rest_time_seconds,
        );
        card.completed_sets = progress.completed_sets;
        card
    }

    pub fn exercise_ref(&self) -> &str {
        &self.exercise_ref
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn planned_sets(&self) -> u32 {
        self.planned_sets
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn rest_seconds(&self) -> u32 {
        self.rest_seconds
    }

    pub fn completed_sets(&self) -> u32 {
        self.completed_sets
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn history_loaded(&self) -> bool {
        self.history.is_some()
    }

    pub fn status(&self) -> ExerciseStatus {
        if self.completed_sets == 0 && self.planned_sets > 0 {
            ExerciseStatus::NotStarted
        } else if self.completed_sets < self.planned_sets {
            ExerciseStatus::InProgress
        } else {
            ExerciseStatus::Complete
        }
    }

    pub fn set_action(&self, session_id: Option<&str>) -> SetAction {
        if self.status() == ExerciseStatus::Complete {
            SetAction::Complete
        } else if session_id.is_none() {
            SetAction::NeedsSession
        } else if self.submitting {
            SetAction::Pending
        } else {
            SetAction::Available {
                set_number: self.completed_sets + 1,
            }
        }
    }

    /// Revealed prefix of the loaded history.
    pub fn visible_history(&self) -> &[ExerciseHistoryEntry] {
        match &self.history {
            Some(history) => &history[..self.history_visible.min(history.len())],
            None => &[],
        }
    }

    pub fn has_more_history(&self) -> bool {
        self.history
            .as_ref()
            .is_some_and(|history| history.len() > self.history_visible)
    }
}

/// A set handed to the server and awaiting its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSet {
    pub session_id: String,
    pub set: NewSet,
}

/// Confirmed completion; the caller starts the rest timer from `rest_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCompleted {
    pub exercise_ref: String,
    pub set_number: u32,
    pub completed_sets: u32,
    pub planned_sets: u32,
    pub rest_seconds: u32,
    pub status: ExerciseStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOutcome {
    pub expanded: bool,
    /// History must be fetched and handed back through
    /// [`SetLedger::store_history`] or [`SetLedger::history_failed`].
    pub needs_history: bool,
}

#[derive(Debug, Clone)]
pub struct SetLedger {
    cards: Vec<ExerciseCard>,
    history_page_size: usize,
}

impl SetLedger {
    pub fn new(history_page_size: usize) -> Self {
        Self {
            cards: Vec::new(),
            history_page_size: history_page_size.max(1),
        }
    }

    pub fn from_snapshot(snapshot: &ActiveSessionSnapshot, history_page_size: usize) -> Self {
        let mut ledger = Self::new(history_page_size);
        ledger.apply_snapshot(snapshot);
        ledger
    }

    pub fn add_exercise(&mut self, card: ExerciseCard) {
        match self.card_index(&card.exercise_ref) {
            Some(index) => self.cards[index] = card,
            None => self.cards.push(card),
        }
    }

    /// Raises completed counts to the server's and adds unknown exercises.
    /// Local weight and rest overrides survive.
    pub fn apply_snapshot(&mut self, snapshot: &ActiveSessionSnapshot) {
        for progress in &snapshot.exercises {
            match self.card_index(&progress.exercise_ref) {
                Some(index) => {
                    let card = &mut self.cards[index];
                    card.planned_sets = progress.sets;
                    // A snapshot fetched before a local confirmation must not re-offer that set.
                    card.completed_sets = card.completed_sets.max(progress.completed_sets);
                }
                None => self.cards.push(ExerciseCard::from_progress(progress)),
            }
        }
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    pub fn cards(&self) -> &[ExerciseCard] {
        &self.cards
    }

    pub fn card(&self, exercise_ref: &str) -> Option<&ExerciseCard> {
        self.cards
            .iter()
            .find(|card| card.exercise_ref == exercise_ref)
    }

    pub fn total_completed(&self) -> u32 {
        self.cards.iter().map(|card| card.completed_sets).sum()
    }

    pub fn total_planned(&self) -> u32 {
        self.cards.iter().map(|card| card.planned_sets).sum()
    }

    pub fn set_action(
        &self,
        exercise_ref: &str,
        session_id: Option<&str>,
    ) -> Result<SetAction, LedgerError> {
        self.card(exercise_ref)
            .map(|card| card.set_action(session_id))
            .ok_or_else(|| LedgerError::UnknownExercise(exercise_ref.to_string()))
    }

    /// Marks the exercise as submitting and builds the next set.
    pub fn begin_submission(
        &mut self,
        exercise_ref: &str,
        session_id: Option<&str>,
    ) -> Result<PendingSet, LedgerError> {
        let card = self.card_mut(exercise_ref)?;
        match card.set_action(session_id) {
            SetAction::Complete => Err(LedgerError::ExerciseComplete(exercise_ref.to_string())),
            SetAction::NeedsSession => Err(LedgerError::SessionNotStarted),
            SetAction::Pending => Err(LedgerError::SubmissionPending(exercise_ref.to_string())),
            SetAction::Available { set_number } => {
                card.submitting = true;
                Ok(PendingSet {
                    session_id: session_id.unwrap_or_default().to_string(),
                    set: NewSet {
                        exercise_ref: card.exercise_ref.clone(),
                        set_number,
                        reps: card.reps,
                        weight: card.weight,
                        rest_seconds: Some(card.rest_seconds),
                    },
                })
            }
        }
    }

    pub fn confirm_submission(&mut self, pending: &PendingSet) -> Result<SetCompleted, LedgerError> {
        let card = self.card_mut(&pending.set.exercise_ref)?;
        card.submitting = false;
        card.completed_sets = card.completed_sets.max(pending.set.set_number);
        tracing::info!(
            exercise_ref = %card.exercise_ref,
            set_number = pending.set.set_number,
            completed_sets = card.completed_sets,
            "Set recorded"
        );
        Ok(SetCompleted {
            exercise_ref: card.exercise_ref.clone(),
            set_number: pending.set.set_number,
            completed_sets: card.completed_sets,
            planned_sets: card.planned_sets,
            rest_seconds: card.rest_seconds,
            status: card.status(),
        })
    }

    /// Releases the exercise without counting the set.
    pub fn abort_submission(&mut self, pending: &PendingSet) {
        if let Ok(card) = self.card_mut(&pending.set.exercise_ref) {
            card.submitting = false;
        }
    }

    /// Settles a submission from the server's answer. A conflict means the
    /// server already holds this set number and counts as confirmation.
    pub fn settle_submission(
        &mut self,
        pending: &PendingSet,
        result: Result<(), ApiError>,
    ) -> Result<SetCompleted, LedgerError> {
        match result {
            Ok(()) => self.confirm_submission(pending),
            Err(ApiError::Conflict(reason)) => {
                tracing::info!(
                    exercise_ref = %pending.set.exercise_ref,
                    set_number = pending.set.set_number,
                    reason = %reason,
                    "Server already holds this set"
                );
                self.confirm_submission(pending)
            }
            Err(err) => {
                tracing::warn!(
                    exercise_ref = %pending.set.exercise_ref,
                    set_number = pending.set.set_number,
                    error = %err,
                    "Set submission failed"
                );
                self.abort_submission(pending);
                Err(LedgerError::Api(err))
            }
        }
    }

    pub async fn complete_set(
        &mut self,
        exercise_ref: &str,
        session_id: Option<&str>,
        api: &dyn WorkoutApi,
    ) -> Result<SetCompleted, LedgerError> {
        let pending = self.begin_submission(exercise_ref, session_id)?;
        let result = api.add_set(&pending.session_id, &pending.set).await;
        self.settle_submission(&pending, result)
    }

    pub fn adjust_weight(&mut self, exercise_ref: &str, delta: f64) -> Result<f64, LedgerError> {
        let card = self.card_mut(exercise_ref)?;
        card.weight = (card.weight + delta).max(0.0);
        Ok(card.weight)
    }

    pub fn adjust_rest(&mut self, exercise_ref: &str, delta_seconds: i32) -> Result<u32, LedgerError> {
        let card = self.card_mut(exercise_ref)?;
        let adjusted = i64::from(card.rest_seconds) + i64::from(delta_seconds);
        card.rest_seconds = adjusted.clamp(i64::from(MIN_REST_SECONDS), i64::from(u32::MAX)) as u32;
        Ok(card.rest_seconds)
    }

    pub fn toggle_expanded(&mut self, exercise_ref: &str) -> Result<ExpandOutcome, LedgerError> {
        let card = self.card_mut(exercise_ref)?;
        card.expanded = !card.expanded;
        let needs_history = card.expanded && card.history.is_none() && !card.history_loading;
        if needs_history {
            card.history_loading = true;
        }
        Ok(ExpandOutcome {
            expanded: card.expanded,
            needs_history,
        })
    }

    pub fn store_history(
        &mut self,
        exercise_ref: &str,
        history: Vec<ExerciseHistoryEntry>,
    ) -> Result<(), LedgerError> {
        let page_size = self.history_page_size;
        let card = self.card_mut(exercise_ref)?;
        card.history_loading = false;
        card.history = Some(history);
        card.history_visible = page_size;
        Ok(())
    }

    /// Leaves the panel empty; the next expand tries again.
    pub fn history_failed(&mut self, exercise_ref: &str, error: &ApiError) {
        tracing::warn!(exercise_ref, error = %error, "Failed to load exercise history");
        if let Ok(card) = self.card_mut(exercise_ref) {
            card.history_loading = false;
        }
    }

    /// Fetches history once; later calls are no-ops.
    pub async fn load_history(
        &mut self,
        exercise_ref: &str,
        api: &dyn WorkoutApi,
    ) -> Result<(), LedgerError> {
        let card = self.card_mut(exercise_ref)?;
        if card.history.is_some() {
            return Ok(());
        }
        card.history_loading = true;
        match api.get_exercise_history(exercise_ref).await {
            Ok(history) => self.store_history(exercise_ref, history),
            Err(err) => {
                self.history_failed(exercise_ref, &err);
                Ok(())
            }
        }
    }

    pub fn visible_history(&self, exercise_ref: &str) -> Result<&[ExerciseHistoryEntry], LedgerError> {
        self.card(exercise_ref)
            .map(ExerciseCard::visible_history)
            .ok_or_else(|| LedgerError::UnknownExercise(exercise_ref.to_string()))
    }

    /// Reveals the next page of history; returns the new reveal count.
    pub fn show_more_history(&mut self, exercise_ref: &str) -> Result<usize, LedgerError> {
        let page_size = self.history_page_size;
        let card = self.card_mut(exercise_ref)?;
        if let Some(history) = &card.history {
            card.history_visible = (card.history_visible + page_size).min(history.len().max(page_size));
        }
        Ok(card.history_visible)
    }

    fn card_index(&self, exercise_ref: &str) -> Option<usize> {
        self.cards
            .iter()
            .position(|card| card.exercise_ref == exercise_ref)
    }

    fn card_mut(&mut self, exercise_ref: &str) -> Result<&mut ExerciseCard, LedgerError> {
        self.cards
            .iter_mut()
            .find(|card| card.exercise_ref == exercise_ref)
            .ok_or_else(|| LedgerError::UnknownExercise(exercise_ref.to_string()))
    }
}
