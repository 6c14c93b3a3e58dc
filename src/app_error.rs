use crate::api::ApiError;
use crate::config::ConfigError;
use crate::data_manager::DataError;
use crate::rest_timer::TimerError;
use crate::session_reconciliation::SessionError;
use crate::set_ledger::LedgerError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppErrorKind {
    System,
    Data,
    Timer,
    Network,
    Auth,
    Ledger,
}

/// What the host shows to the user (a toast or banner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppErrorPayload {
    pub kind: AppErrorKind,
    pub message: String,
    pub detail: Option<String>,
    pub recoverable: bool,
}

#[derive(Debug, Clone)]
pub struct AppError {
    kind: AppErrorKind,
    message: String,
    detail: Option<String>,
    recoverable: bool,
}

impl AppError {
    pub fn new(kind: AppErrorKind, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            recoverable,
        }
    }

    pub fn with_detail(
        kind: AppErrorKind,
        message: impl Into<String>,
        detail: impl Into<String>,
        recoverable: bool,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: Some(detail.into()),
            recoverable,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::System, message, true)
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn payload(&self) -> AppErrorPayload {
        AppErrorPayload {
            kind: self.kind,
            message: self.message.clone(),
            detail: self.detail.clone(),
            recoverable: self.recoverable,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for AppError {}

impl From<TimerError> for AppError {
    fn from(error: TimerError) -> Self {
        let detail = error.to_string();
        let message = match error {
            TimerError::InvalidDuration => "Rest time must be at least one second",
            TimerError::NotRunning => "No rest timer is running",
            TimerError::AlreadyPaused => "Rest timer is already paused",
            TimerError::NotPaused => "Rest timer is not paused",
            TimerError::Finished => "Rest period is already over",
        };
        Self::with_detail(AppErrorKind::Timer, message, detail, true)
    }
}

impl From<DataError> for AppError {
    fn from(error: DataError) -> Self {
        let detail = error.to_string();
        let message = match error {
            DataError::Io(_) => "Could not save workout progress on this device",
            DataError::Serde(_) => "Saved workout progress is unreadable",
            DataError::Lock => "Workout progress is temporarily unavailable",
        };
        Self::with_detail(AppErrorKind::Data, message, detail, true)
    }
}

impl From<ApiError> for AppError {
    fn from(error: ApiError) -> Self {
        let detail = error.to_string();
        let transient = error.is_transient();
        match error {
            ApiError::NotAuthenticated => Self::with_detail(
                AppErrorKind::Auth,
                "Sign in to sync your workout",
                detail,
                true,
            ),
            ApiError::NotFound => Self::with_detail(
                AppErrorKind::Network,
                "That workout session no longer exists",
                detail,
                false,
            ),
            ApiError::Conflict(_) => Self::with_detail(
                AppErrorKind::Network,
                "That set was already recorded",
                detail,
                false,
            ),
            ApiError::Json(_) => Self::with_detail(
                AppErrorKind::Network,
                "Unexpected response from the server",
                detail,
                true,
            ),
            ApiError::InvalidPath(_) => Self::with_detail(
                AppErrorKind::System,
                "Could not reach the workout service",
                detail,
                false,
            ),
            ApiError::Http(_) | ApiError::Status { .. } if transient => Self::with_detail(
                AppErrorKind::Network,
                "Network problem, please try again",
                detail,
                true,
            ),
            ApiError::Http(_) | ApiError::Status { .. } => Self::with_detail(
                AppErrorKind::Network,
                "The workout service rejected the request",
                detail,
                false,
            ),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(error: LedgerError) -> Self {
        let detail = error.to_string();
        match error {
            LedgerError::Api(api) => Self::from(api),
            LedgerError::SessionNotStarted => Self::with_detail(
                AppErrorKind::Ledger,
                "Start the workout to log sets",
                detail,
                true,
            ),
            LedgerError::UnknownExercise(_) => Self::with_detail(
                AppErrorKind::Ledger,
                "Exercise is not part of this workout",
                detail,
                false,
            ),
            LedgerError::ExerciseComplete(_) => Self::with_detail(
                AppErrorKind::Ledger,
                "All sets for this exercise are done",
                detail,
                false,
            ),
            LedgerError::SubmissionPending(_) => Self::with_detail(
                AppErrorKind::Ledger,
                "Still saving the previous set",
                detail,
                true,
            ),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Api(api) => Self::from(api),
            SessionError::Data(data) => Self::from(data),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        Self::with_detail(
            AppErrorKind::System,
            "Invalid configuration",
            error.to_string(),
            false,
        )
    }
}
