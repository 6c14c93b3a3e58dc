//! Entry points the host shell calls. Every failure is reported as an
//! `AppError` event and returned as the user-facing message.

use crate::app_error::{AppError, AppErrorKind};
use crate::app_state::{lock, AppState};
use crate::events::SessionEvent;
use crate::models::ExerciseProgress;
use crate::progress::{calculate_progress, ProgressBanner};
use crate::rest_timer::{RestPhase, RestTimer, TimerError};
use crate::session_clock::SessionClockState;
use crate::session_reconciliation::{self, ReconcileOutcome};
use crate::set_ledger::{ExerciseCard, LedgerError, SetAction, SetCompleted, SetLedger};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    pub clock: SessionClockState,
    pub session_id: Option<String>,
    pub progress: Option<ProgressBanner>,
    pub exercises: Vec<ExerciseCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTimerView {
    pub phase: RestPhase,
    pub remaining_seconds: u32,
    pub initial_seconds: u32,
    pub progress: f64,
}

pub async fn load_session(state: &AppState, user_id: String) -> Result<SessionOverview, String> {
    let outcome = session_reconciliation::reconcile_on_load(
        state.api(),
        &user_id,
        state.clock(),
        state.runtime(),
        state.config().stale_clock_policy,
    )
    .await
    .map_err(|err| report_error(state, AppError::from(err)))?;

    match &outcome {
        ReconcileOutcome::Resumed { snapshot, .. } => {
            lock(state.ledger(), "Exercise list")
                .map_err(|err| report_error(state, err))?
                .apply_snapshot(snapshot);
        }
        ReconcileOutcome::NoActiveSession { .. } | ReconcileOutcome::Unauthenticated { .. } => {}
        ReconcileOutcome::FetchFailed { error } => {
            // Non-fatal: the local clock keeps running.
            report_error(
                state,
                AppError::with_detail(
                    AppErrorKind::Network,
                    "Could not check for an active workout",
                    error.to_string(),
                    error.is_transient(),
                ),
            );
        }
    }
    state
        .sync_clock_ticker()
        .map_err(|err| report_error(state, err))?;

    let overview = session_overview(state).await?;
    if !matches!(outcome, ReconcileOutcome::FetchFailed { .. }) {
        state.emit(SessionEvent::SessionReconciled {
            clock: overview.clock.clone(),
            session_id: overview.session_id.clone(),
        });
    }
    Ok(overview)
}

pub async fn session_overview(state: &AppState) -> Result<SessionOverview, String> {
    let clock = clock_state(state).await?;
    let (session_id, progress) = {
        let runtime = lock(state.runtime(), "Session state").map_err(|err| report_error(state, err))?;
        (
            runtime.session_id().map(str::to_string),
            runtime.snapshot().map(calculate_progress),
        )
    };
    let exercises = lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .cards()
        .to_vec();
    Ok(SessionOverview {
        clock,
        session_id,
        progress,
        exercises,
    })
}

/// Shows the plan's exercises before a session exists.
pub async fn load_plan(state: &AppState, exercises: Vec<ExerciseProgress>) -> Result<(), String> {
    let mut ledger = lock(state.ledger(), "Exercise list").map_err(|err| report_error(state, err))?;
    for exercise in &exercises {
        ledger.add_exercise(ExerciseCard::from_progress(exercise));
    }
    Ok(())
}

pub async fn start_workout(
    state: &AppState,
    plan_id: String,
    workout_id: String,
) -> Result<String, String> {
    let session_id = session_reconciliation::start_workout_session(
        state.api(),
        &plan_id,
        &workout_id,
        state.clock(),
        state.runtime(),
    )
    .await
    .map_err(|err| report_error(state, AppError::from(err)))?;

    state
        .ensure_clock_ticker()
        .map_err(|err| report_error(state, err))?;
    state.emit(SessionEvent::WorkoutStarted {
        workout_id,
        session_id: session_id.clone(),
    });
    Ok(session_id)
}

pub async fn finish_workout(state: &AppState) -> Result<Option<String>, String> {
    let session_id =
        session_reconciliation::finish_workout_session(state.api(), state.clock(), state.runtime())
            .await
            .map_err(|err| report_error(state, AppError::from(err)))?;

    state
        .stop_clock_ticker()
        .map_err(|err| report_error(state, err))?;
    state
        .clear_rest_timer()
        .map_err(|err| report_error(state, err))?;
    lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .clear();
    state.emit(SessionEvent::WorkoutFinished {
        session_id: session_id.clone(),
    });
    Ok(session_id)
}

/// Records the next set for an exercise and starts the rest period once the
/// server has confirmed it.
pub async fn complete_set(state: &AppState, exercise_ref: String) -> Result<SetCompleted, String> {
    let session_id = state.session_id().map_err(|err| report_error(state, err))?;
    let pending = lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .begin_submission(&exercise_ref, session_id.as_deref())
        .map_err(|err| report_error(state, AppError::from(err)))?;

    let result = state.api().add_set(&pending.session_id, &pending.set).await;

    let completed = lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .settle_submission(&pending, result)
        .map_err(|err| report_error(state, AppError::from(err)))?;

    lock(state.runtime(), "Session state")
        .map_err(|err| report_error(state, err))?
        .record_completed_set(&completed.exercise_ref, completed.completed_sets);
    state.emit(SessionEvent::SetCompleted {
        exercise_ref: completed.exercise_ref.clone(),
        set_number: completed.set_number,
        completed_sets: completed.completed_sets,
        planned_sets: completed.planned_sets,
    });
    state
        .start_rest_timer(completed.rest_seconds)
        .map_err(|err| report_error(state, err))?;
    Ok(completed)
}

pub async fn set_action(state: &AppState, exercise_ref: String) -> Result<SetAction, String> {
    let session_id = state.session_id().map_err(|err| report_error(state, err))?;
    lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .set_action(&exercise_ref, session_id.as_deref())
        .map_err(|err| report_error(state, AppError::from(err)))
}

pub async fn adjust_weight(
    state: &AppState,
    exercise_ref: String,
    delta: f64,
) -> Result<f64, String> {
    lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .adjust_weight(&exercise_ref, delta)
        .map_err(|err| report_error(state, AppError::from(err)))
}

pub async fn adjust_rest(
    state: &AppState,
    exercise_ref: String,
    delta_seconds: i32,
) -> Result<u32, String> {
    lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .adjust_rest(&exercise_ref, delta_seconds)
        .map_err(|err| report_error(state, AppError::from(err)))
}

/// Expands or collapses an exercise; history is fetched on first expand.
pub async fn toggle_exercise(
    state: &AppState,
    exercise_ref: String,
) -> Result<ExerciseCard, String> {
    let outcome = lock(state.ledger(), "Exercise list")
        .map_err(|err| report_error(state, err))?
        .toggle_expanded(&exercise_ref)
        .map_err(|err| report_error(state, AppError::from(err)))?;

    let fetched = if outcome.needs_history {
        Some(state.api().get_exercise_history(&exercise_ref).await)
    } else {
        None
    };

    let mut ledger = lock(state.ledger(), "Exercise list").map_err(|err| report_error(state, err))?;
    match fetched {
        Some(Ok(history)) => ledger
            .store_history(&exercise_ref, history)
            .map_err(|err| report_error(state, AppError::from(err)))?,
        Some(Err(err)) => ledger.history_failed(&exercise_ref, &err),
        None => {}
    }
    exercise_card(state, &ledger, &exercise_ref)
}

pub async fn show_more_history(
    state: &AppState,
    exercise_ref: String,
) -> Result<ExerciseCard, String> {
    let mut ledger = lock(state.ledger(), "Exercise list").map_err(|err| report_error(state, err))?;
    ledger
        .show_more_history(&exercise_ref)
        .map_err(|err| report_error(state, AppError::from(err)))?;
    exercise_card(state, &ledger, &exercise_ref)
}

fn exercise_card(
    state: &AppState,
    ledger: &SetLedger,
    exercise_ref: &str,
) -> Result<ExerciseCard, String> {
    ledger.card(exercise_ref).cloned().ok_or_else(|| {
        report_error(
            state,
            AppError::from(LedgerError::UnknownExercise(exercise_ref.to_string())),
        )
    })
}

pub async fn start_rest(state: &AppState, seconds: u32) -> Result<(), String> {
    state
        .start_rest_timer(seconds)
        .map_err(|err| report_error(state, err))
}

pub async fn pause_rest(state: &AppState) -> Result<(), String> {
    with_rest_timer(state, |timer| Ok(timer.pause()?))
}

pub async fn resume_rest(state: &AppState) -> Result<(), String> {
    with_rest_timer(state, |timer| Ok(timer.resume()?))
}

pub async fn adjust_rest_timer(state: &AppState, delta_seconds: i32) -> Result<u32, String> {
    with_rest_timer(state, |timer| Ok(timer.adjust(delta_seconds)?))
}

pub async fn skip_rest(state: &AppState) -> Result<(), String> {
    with_rest_timer(state, |timer| Ok(timer.skip()?))?;
    state
        .stop_rest_ticker()
        .map_err(|err| report_error(state, err))
}

pub async fn rest_state(state: &AppState) -> Result<Option<RestTimerView>, String> {
    let slot = lock(state.rest_timer(), "Rest timer").map_err(|err| report_error(state, err))?;
    Ok(slot.as_ref().map(|timer| RestTimerView {
        phase: timer.phase(),
        remaining_seconds: timer.remaining_seconds(),
        initial_seconds: timer.initial_seconds(),
        progress: timer.progress_ratio(),
    }))
}

fn with_rest_timer<T>(
    state: &AppState,
    action: impl FnOnce(&mut RestTimer) -> Result<T, AppError>,
) -> Result<T, String> {
    let mut slot = lock(state.rest_timer(), "Rest timer").map_err(|err| report_error(state, err))?;
    let timer = slot.as_mut().ok_or_else(|| {
        report_error(state, AppError::from(TimerError::NotRunning))
    })?;
    action(timer).map_err(|err| report_error(state, err))
}

pub async fn clock_state(state: &AppState) -> Result<SessionClockState, String> {
    let mut clock = lock(state.clock(), "Workout clock").map_err(|err| report_error(state, err))?;
    clock.tick();
    Ok(clock.state())
}

pub async fn progress(state: &AppState) -> Result<Option<ProgressBanner>, String> {
    Ok(lock(state.runtime(), "Session state")
        .map_err(|err| report_error(state, err))?
        .snapshot()
        .map(calculate_progress))
}

fn report_error(state: &AppState, error: AppError) -> String {
    state.emit(SessionEvent::AppError(error.payload()));
    if let Some(detail) = error.detail() {
        tracing::warn!(kind = ?error.kind(), detail, "{}", error.message());
    } else {
        tracing::warn!(kind = ?error.kind(), "{}", error.message());
    }
    error.message().to_string()
}
