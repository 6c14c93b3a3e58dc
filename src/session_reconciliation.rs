//! Aligns the local clock with the server's view of the session.
//!
//! Locks are taken only between network calls, never across them.

use crate::api::{ApiError, WorkoutApi};
use crate::config::StaleClockPolicy;
use crate::data_manager::DataError;
use crate::models::ActiveSessionSnapshot;
use crate::progress::validate_snapshot;
use crate::runtime_state::RuntimeState;
use crate::session_clock::SessionClock;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Data(#[from] DataError),
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The server holds an active session; its id is now available.
    Resumed {
        snapshot: ActiveSessionSnapshot,
        /// The local clock was inactive and has been started from the
        /// server's elapsed minutes.
        repaired_clock: bool,
    },
    NoActiveSession { local_clock_active: bool },
    Unauthenticated { local_clock_active: bool },
    /// Transient read failure; nothing local was touched.
    FetchFailed { error: ApiError },
}

impl ReconcileOutcome {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ReconcileOutcome::Resumed { snapshot, .. } => Some(&snapshot.session_id),
            _ => None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> SessionResult<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| SessionError::Data(DataError::Lock))
}

pub async fn reconcile_on_load(
    api: &dyn WorkoutApi,
    user_id: &str,
    clock: &Mutex<SessionClock>,
    runtime: &Mutex<RuntimeState>,
    policy: StaleClockPolicy,
) -> SessionResult<ReconcileOutcome> {
    match api.get_active_session(user_id).await {
        Ok(Some(snapshot)) => resume_from_snapshot(snapshot, clock, runtime),
        Ok(None) | Err(ApiError::NotFound) => {
            lock(runtime)?.clear();
            let mut session_clock = lock(clock)?;
            if session_clock.is_active() {
                match policy {
                    StaleClockPolicy::Keep => {
                        tracing::info!(
                            workout_id = ?session_clock.active_workout_id(),
                            "No server session; keeping local clock"
                        );
                    }
                    StaleClockPolicy::ClearOnNotFound => {
                        tracing::info!(
                            workout_id = ?session_clock.active_workout_id(),
                            "No server session; ending stale local clock"
                        );
                        session_clock.end_workout()?;
                    }
                }
            }
            Ok(ReconcileOutcome::NoActiveSession {
                local_clock_active: session_clock.is_active(),
            })
        }
        Err(ApiError::NotAuthenticated) => {
            tracing::info!("Not signed in; skipping session reconciliation");
            lock(runtime)?.clear();
            Ok(ReconcileOutcome::Unauthenticated {
                local_clock_active: lock(clock)?.is_active(),
            })
        }
        Err(error) => {
            tracing::warn!(error = %error, "Failed to fetch active session");
            Ok(ReconcileOutcome::FetchFailed { error })
        }
    }
}

fn resume_from_snapshot(
    snapshot: ActiveSessionSnapshot,
    clock: &Mutex<SessionClock>,
    runtime: &Mutex<RuntimeState>,
) -> SessionResult<ReconcileOutcome> {
    validate_snapshot(&snapshot);
    lock(runtime)?.set_snapshot(snapshot.clone());

    let mut session_clock = lock(clock)?;
    let repaired_clock = !session_clock.is_active();
    if repaired_clock {
        let elapsed_ms = i64::from(snapshot.elapsed_minutes) * 60_000;
        let started_at_ms = session_clock.now_ms().saturating_sub(elapsed_ms);
        tracing::info!(
            workout_id = %snapshot.workout_id,
            session_id = %snapshot.session_id,
            elapsed_minutes = snapshot.elapsed_minutes,
            "Repairing local clock from server session"
        );
        session_clock.resume_workout(snapshot.workout_id.clone(), started_at_ms)?;
    } else if session_clock.active_workout_id() != Some(snapshot.workout_id.as_str()) {
        tracing::warn!(
            local_workout_id = ?session_clock.active_workout_id(),
            server_workout_id = %snapshot.workout_id,
            "Local clock belongs to a different workout"
        );
    }

    Ok(ReconcileOutcome::Resumed {
        snapshot,
        repaired_clock,
    })
}

/// Creates the server session, then starts the local clock. A second call
/// while both halves are live returns the held session id.
pub async fn start_workout_session(
    api: &dyn WorkoutApi,
    plan_id: &str,
    workout_id: &str,
    clock: &Mutex<SessionClock>,
    runtime: &Mutex<RuntimeState>,
) -> SessionResult<String> {
    {
        let session_clock = lock(clock)?;
        let state = lock(runtime)?;
        if let (true, Some(session_id)) = (session_clock.is_active(), state.session_id()) {
            tracing::debug!(session_id, "Workout already started");
            return Ok(session_id.to_string());
        }
    }

    let started = api.start_session(plan_id).await.map_err(|err| {
        tracing::warn!(plan_id, error = %err, "Failed to start workout session");
        err
    })?;
    lock(runtime)?.set_session_id(started.session_id.clone());

    let mut session_clock = lock(clock)?;
    if session_clock.active_workout_id() == Some(workout_id) {
        tracing::info!(workout_id, "Attaching server session to running clock");
    } else {
        session_clock.start_workout(workout_id)?;
    }
    tracing::info!(workout_id, session_id = %started.session_id, "Workout started");
    Ok(started.session_id)
}

/// Finishes the server session, then ends the local clock. Returns the
/// finished session id, if one was held.
pub async fn finish_workout_session(
    api: &dyn WorkoutApi,
    clock: &Mutex<SessionClock>,
    runtime: &Mutex<RuntimeState>,
) -> SessionResult<Option<String>> {
    let session_id = lock(runtime)?.session_id().map(str::to_string);

    if let Some(session_id) = &session_id {
        match api.finish_session(session_id).await {
            Ok(()) => {}
            Err(ApiError::NotFound) => {
                tracing::info!(session_id = %session_id, "Session already closed on server");
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "Failed to finish session");
                return Err(err.into());
            }
        }
    }

    lock(runtime)?.clear();
    lock(clock)?.end_workout()?;
    Ok(session_id)
}
