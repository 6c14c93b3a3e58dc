use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Rest duration must be at least 1 second")]
    InvalidDuration,
    #[error("Rest timer not running")]
    NotRunning,
    #[error("Rest timer already paused")]
    AlreadyPaused,
    #[error("Rest timer not paused")]
    NotPaused,
    #[error("Rest timer already finished")]
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestPhase {
    Running,
    Paused,
    Expired,
    Skipped,
}

impl RestPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RestPhase::Expired | RestPhase::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestTick {
    /// Paused or already terminal; nothing changed.
    Idle,
    Counting { remaining_seconds: u32 },
    /// This tick reached zero and fired the completion callback.
    Expired,
}

pub type RestCallback = Box<dyn FnMut() + Send>;

/// Countdown between sets. Decrements once per tick; unlike the session
/// clock it does not recompute from an absolute instant.
pub struct RestTimer {
    initial_seconds: u32,
    remaining_seconds: u32,
    phase: RestPhase,
    on_complete: Option<RestCallback>,
    on_skip: Option<RestCallback>,
    complete_fired: bool,
    skip_fired: bool,
}

impl std::fmt::Debug for RestTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestTimer")
            .field("initial_seconds", &self.initial_seconds)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("phase", &self.phase)
            .finish()
    }
}

impl RestTimer {
    pub fn new(initial_seconds: u32) -> Result<Self, TimerError> {
        if initial_seconds == 0 {
            return Err(TimerError::InvalidDuration);
        }
        Ok(Self {
            initial_seconds,
            remaining_seconds: initial_seconds,
            phase: RestPhase::Running,
            on_complete: None,
            on_skip: None,
            complete_fired: false,
            skip_fired: false,
        })
    }

    pub fn on_complete(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn on_skip(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_skip = Some(Box::new(callback));
        self
    }

    pub fn phase(&self) -> RestPhase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.phase == RestPhase::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn initial_seconds(&self) -> u32 {
        self.initial_seconds
    }

    /// Elapsed share of the rest period for progress indicators.
    pub fn progress_ratio(&self) -> f64 {
        let initial = f64::from(self.initial_seconds);
        let remaining = f64::from(self.remaining_seconds);
        ((initial - remaining) / initial).clamp(0.0, 1.0)
    }

    pub fn tick(&mut self) -> RestTick {
        if self.phase != RestPhase::Running {
            return RestTick::Idle;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = RestPhase::Expired;
            self.fire_complete();
            return RestTick::Expired;
        }
        RestTick::Counting {
            remaining_seconds: self.remaining_seconds,
        }
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        match self.phase {
            RestPhase::Running => {
                self.phase = RestPhase::Paused;
                Ok(())
            }
            RestPhase::Paused => Err(TimerError::AlreadyPaused),
            RestPhase::Expired | RestPhase::Skipped => Err(TimerError::Finished),
        }
    }

    pub fn resume(&mut self) -> Result<(), TimerError> {
        match self.phase {
            RestPhase::Paused => {
                self.phase = RestPhase::Running;
                Ok(())
            }
            RestPhase::Running => Err(TimerError::NotPaused),
            RestPhase::Expired | RestPhase::Skipped => Err(TimerError::Finished),
        }
    }

    /// Returns the paused flag after toggling.
    pub fn toggle_pause(&mut self) -> Result<bool, TimerError> {
        if self.is_paused() {
            self.resume()?;
        } else {
            self.pause()?;
        }
        Ok(self.is_paused())
    }

    /// Shifts the remaining time, never below zero. The initial duration is
    /// left alone so the progress ratio keeps its reference point.
    pub fn adjust(&mut self, delta_seconds: i32) -> Result<u32, TimerError> {
        if self.is_finished() {
            return Err(TimerError::Finished);
        }
        let adjusted = i64::from(self.remaining_seconds) + i64::from(delta_seconds);
        self.remaining_seconds = adjusted.clamp(0, i64::from(u32::MAX)) as u32;
        Ok(self.remaining_seconds)
    }

    pub fn skip(&mut self) -> Result<(), TimerError> {
        if self.is_finished() {
            return Err(TimerError::Finished);
        }
        self.phase = RestPhase::Skipped;
        self.fire_skip();
        Ok(())
    }

    /// Re-enters `Running` for a new rest period on the same instance and
    /// re-arms both callbacks.
    pub fn reset(&mut self, initial_seconds: u32) -> Result<(), TimerError> {
        if initial_seconds == 0 {
            return Err(TimerError::InvalidDuration);
        }
        self.initial_seconds = initial_seconds;
        self.remaining_seconds = initial_seconds;
        self.phase = RestPhase::Running;
        self.complete_fired = false;
        self.skip_fired = false;
        Ok(())
    }

    fn fire_complete(&mut self) {
        if self.complete_fired {
            return;
        }
        self.complete_fired = true;
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }

    fn fire_skip(&mut self) {
        if self.skip_fired {
            return;
        }
        self.skip_fired = true;
        if let Some(callback) = self.on_skip.as_mut() {
            callback();
        }
    }
}
