//! Contract consumed from the remote workout API.
//!
//! Transport, retries and token refresh belong to the implementation; the
//! session core only sees these five calls and [`ApiError`].

use crate::models::{ActiveSessionSnapshot, ExerciseHistoryEntry, NewSet, StartedSession};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Resource not found")]
    NotFound,

    #[error("Not authenticated")]
    NotAuthenticated,

    /// The server already holds this record, e.g. a duplicate set number.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request URL could not be built from the base URL and ids.
    #[error("Invalid request path: {0}")]
    InvalidPath(String),
}

impl ApiError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            ApiError::NotFound
            | ApiError::NotAuthenticated
            | ApiError::Conflict(_)
            | ApiError::Json(_)
            | ApiError::InvalidPath(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
pub trait WorkoutApi: Send + Sync {
    async fn start_session(&self, plan_id: &str) -> ApiResult<StartedSession>;

    async fn add_set(&self, session_id: &str, set: &NewSet) -> ApiResult<()>;

    async fn finish_session(&self, session_id: &str) -> ApiResult<()>;

    /// `Ok(None)` when the user has no active session.
    async fn get_active_session(&self, user_id: &str) -> ApiResult<Option<ActiveSessionSnapshot>>;

    /// Empty when the exercise has never been logged.
    async fn get_exercise_history(&self, exercise_ref: &str)
        -> ApiResult<Vec<ExerciseHistoryEntry>>;
}
