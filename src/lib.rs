pub mod api;
pub mod app_error;
pub mod app_state;
pub mod clock;
pub mod commands;
pub mod config;
pub mod data_manager;
pub mod events;
pub mod http_api;
pub mod logging;
pub mod models;
pub mod progress;
pub mod recovery_state;
pub mod rest_timer;
pub mod runtime_state;
pub mod session_clock;
pub mod session_reconciliation;
pub mod set_ledger;
pub mod ticker;

#[cfg(test)]
mod testing;

pub use api::{ApiError, WorkoutApi};
pub use app_error::{AppError, AppErrorKind, AppErrorPayload};
pub use app_state::AppState;
pub use config::{SessionConfig, StaleClockPolicy};
pub use events::{ChannelEventSink, EventSink, LogEventSink, SessionEvent};
pub use http_api::HttpWorkoutApi;
pub use logging::init_logging;
pub use rest_timer::RestTimer;
pub use session_clock::{format_time, SessionClock, SessionClockState};
pub use set_ledger::SetLedger;
