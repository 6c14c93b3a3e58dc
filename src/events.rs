use crate::app_error::AppErrorPayload;
use crate::session_clock::SessionClockState;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    WorkoutStarted {
        workout_id: String,
        session_id: String,
    },
    #[serde(rename_all = "camelCase")]
    WorkoutFinished { session_id: Option<String> },
    #[serde(rename_all = "camelCase")]
    ClockTick {
        elapsed_seconds: u64,
        display: String,
    },
    #[serde(rename_all = "camelCase")]
    SetCompleted {
        exercise_ref: String,
        set_number: u32,
        completed_sets: u32,
        planned_sets: u32,
    },
    #[serde(rename_all = "camelCase")]
    RestTimerStarted { initial_seconds: u32 },
    #[serde(rename_all = "camelCase")]
    RestTimerTick {
        remaining_seconds: u32,
        progress: f64,
    },
    RestTimerCompleted,
    RestTimerSkipped,
    #[serde(rename_all = "camelCase")]
    SessionReconciled {
        clock: SessionClockState,
        session_id: Option<String>,
    },
    AppError(AppErrorPayload),
}

/// Destination for events the host UI renders.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SessionEvent) -> Result<(), String>;
}

/// Writes every event to the log; the default when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &SessionEvent) -> Result<(), String> {
        tracing::debug!(?event, "session event");
        Ok(())
    }
}

/// Forwards events to a single consumer task.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &SessionEvent) -> Result<(), String> {
        self.sender
            .send(event.clone())
            .map_err(|_| "event receiver dropped".to_string())
    }
}

pub fn emit_event(sink: &dyn EventSink, event: SessionEvent) {
    if let Err(err) = sink.emit(&event) {
        tracing::warn!(error = %err, ?event, "Failed to emit session event");
    }
}
