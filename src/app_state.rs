//! Process-wide state shared by the command entry points.

use crate::api::WorkoutApi;
use crate::app_error::AppError;
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::data_manager::{ClockStore, DataManager};
use crate::events::{emit_event, EventSink, SessionEvent};
use crate::logging::init_logging;
use crate::rest_timer::{RestTick, RestTimer};
use crate::runtime_state::RuntimeState;
use crate::session_clock::{format_time, SessionClock};
use crate::set_ledger::SetLedger;
use crate::ticker::{TickControl, Ticker};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct AppState {
    config: SessionConfig,
    api: Arc<dyn WorkoutApi>,
    events: Arc<dyn EventSink>,
    clock: Arc<Mutex<SessionClock>>,
    runtime: Mutex<RuntimeState>,
    ledger: Mutex<SetLedger>,
    rest_timer: Arc<Mutex<Option<RestTimer>>>,
    clock_ticker: Mutex<Option<Ticker>>,
    rest_ticker: Mutex<Option<Ticker>>,
}

pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::system(format!("{what} is temporarily unavailable")))
}

impl AppState {
    /// Installs logging, opens the file store under the configured data
    /// directory and restores the session clock. Outside a tokio runtime the
    /// restored clock's ticker waits for the first `load_session`.
    pub fn bootstrap(
        config: SessionConfig,
        api: Arc<dyn WorkoutApi>,
        events: Arc<dyn EventSink>,
    ) -> Result<Arc<Self>, AppError> {
        init_logging(&config.log_level);
        let store = DataManager::new(&config.data_dir)?;
        tracing::info!(data_dir = %store.base_dir().display(), "Session store ready");
        Self::with_parts(config, api, events, Arc::new(SystemClock), Arc::new(store))
    }

    pub fn with_parts(
        config: SessionConfig,
        api: Arc<dyn WorkoutApi>,
        events: Arc<dyn EventSink>,
        time: Arc<dyn Clock>,
        store: Arc<dyn ClockStore>,
    ) -> Result<Arc<Self>, AppError> {
        let clock = SessionClock::restore(time, store)?;
        let resumed = clock.is_active();
        let ledger = SetLedger::new(config.history_page_size());
        let state = Arc::new(Self {
            config,
            api,
            events,
            clock: Arc::new(Mutex::new(clock)),
            runtime: Mutex::new(RuntimeState::default()),
            ledger: Mutex::new(ledger),
            rest_timer: Arc::new(Mutex::new(None)),
            clock_ticker: Mutex::new(None),
            rest_ticker: Mutex::new(None),
        });
        if resumed {
            if tokio::runtime::Handle::try_current().is_ok() {
                state.ensure_clock_ticker()?;
            } else {
                tracing::debug!("No runtime yet; clock ticker deferred");
            }
        }
        Ok(state)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn api(&self) -> &dyn WorkoutApi {
        self.api.as_ref()
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    pub fn emit(&self, event: SessionEvent) {
        emit_event(self.events.as_ref(), event);
    }

    pub fn clock(&self) -> &Mutex<SessionClock> {
        &self.clock
    }

    pub fn runtime(&self) -> &Mutex<RuntimeState> {
        &self.runtime
    }

    pub fn ledger(&self) -> &Mutex<SetLedger> {
        &self.ledger
    }

    pub fn rest_timer(&self) -> &Mutex<Option<RestTimer>> {
        &self.rest_timer
    }

    pub fn session_id(&self) -> Result<Option<String>, AppError> {
        Ok(lock(&self.runtime, "Session state")?
            .session_id()
            .map(str::to_string))
    }

    /// Keeps one clock ticker alive while the clock is active.
    pub fn ensure_clock_ticker(&self) -> Result<(), AppError> {
        let mut slot = lock(&self.clock_ticker, "Clock ticker")?;
        if slot.as_ref().is_some_and(|ticker| !ticker.is_finished()) {
            return Ok(());
        }
        let clock = Arc::clone(&self.clock);
        let events = Arc::clone(&self.events);
        *slot = Some(Ticker::spawn(self.config.tick_interval(), move || {
            let elapsed_seconds = {
                let Ok(mut clock) = clock.lock() else {
                    tracing::error!("Clock lock poisoned; stopping clock ticker");
                    return TickControl::Stop;
                };
                if !clock.is_active() {
                    return TickControl::Stop;
                }
                clock.tick()
            };
            emit_event(
                events.as_ref(),
                SessionEvent::ClockTick {
                    elapsed_seconds,
                    display: format_time(elapsed_seconds),
                },
            );
            TickControl::Continue
        }));
        tracing::debug!("Clock ticker started");
        Ok(())
    }

    /// Runs the clock ticker exactly when the clock is active.
    pub fn sync_clock_ticker(&self) -> Result<(), AppError> {
        if lock(&self.clock, "Workout clock")?.is_active() {
            self.ensure_clock_ticker()
        } else {
            self.stop_clock_ticker()
        }
    }

    pub fn stop_clock_ticker(&self) -> Result<(), AppError> {
        if let Some(ticker) = lock(&self.clock_ticker, "Clock ticker")?.take() {
            ticker.cancel();
            tracing::debug!("Clock ticker stopped");
        }
        Ok(())
    }

    /// Starts a rest period, reusing the existing timer when there is one.
    pub fn start_rest_timer(&self, seconds: u32) -> Result<(), AppError> {
        {
            let mut slot = lock(&self.rest_timer, "Rest timer")?;
            match slot.as_mut() {
                Some(timer) => timer.reset(seconds)?,
                None => *slot = Some(self.new_rest_timer(seconds)?),
            }
        }
        self.spawn_rest_ticker()?;
        self.emit(SessionEvent::RestTimerStarted {
            initial_seconds: seconds,
        });
        tracing::info!(seconds, "Rest timer started");
        Ok(())
    }

    fn new_rest_timer(&self, seconds: u32) -> Result<RestTimer, AppError> {
        let on_complete = Arc::clone(&self.events);
        let on_skip = Arc::clone(&self.events);
        Ok(RestTimer::new(seconds)?
            .on_complete(move || emit_event(on_complete.as_ref(), SessionEvent::RestTimerCompleted))
            .on_skip(move || emit_event(on_skip.as_ref(), SessionEvent::RestTimerSkipped)))
    }

    /// Replaces any previous rest ticker; the old one is cancelled on drop.
    fn spawn_rest_ticker(&self) -> Result<(), AppError> {
        let timer = Arc::clone(&self.rest_timer);
        let events = Arc::clone(&self.events);
        let ticker = Ticker::spawn(self.config.tick_interval(), move || {
            let Ok(mut slot) = timer.lock() else {
                tracing::error!("Rest timer lock poisoned; stopping rest ticker");
                return TickControl::Stop;
            };
            let Some(rest) = slot.as_mut() else {
                return TickControl::Stop;
            };
            match rest.tick() {
                RestTick::Counting { remaining_seconds } => {
                    emit_event(
                        events.as_ref(),
                        SessionEvent::RestTimerTick {
                            remaining_seconds,
                            progress: rest.progress_ratio(),
                        },
                    );
                    TickControl::Continue
                }
                RestTick::Expired => TickControl::Stop,
                RestTick::Idle if rest.is_finished() => TickControl::Stop,
                RestTick::Idle => TickControl::Continue,
            }
        });
        *lock(&self.rest_ticker, "Rest ticker")? = Some(ticker);
        Ok(())
    }

    pub fn stop_rest_ticker(&self) -> Result<(), AppError> {
        if let Some(ticker) = lock(&self.rest_ticker, "Rest ticker")?.take() {
            ticker.cancel();
        }
        Ok(())
    }

    /// Drops the rest timer and its ticker without firing callbacks.
    pub fn clear_rest_timer(&self) -> Result<(), AppError> {
        self.stop_rest_ticker()?;
        lock(&self.rest_timer, "Rest timer")?.take();
        Ok(())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}
