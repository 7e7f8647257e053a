//! # Poll Scheduler
//!
//! Drives the two periodic activities of the mirror on a single task:
//!
//! - **Sensor tick** (`gesture_poll_ms`): read light, consume at most one
//!   gesture, run the state machine and carry out the transition's side
//!   effects.
//! - **Weather tick** (`poll_ms`): fetch the data for the current view and
//!   render it. The deadline is pushed back every time a wake or a view
//!   change forces an immediate fetch, so the cadence is measured from the
//!   latest fetch rather than from process start. Asleep, there is no
//!   deadline at all.
//!
//! ## Concurrency
//! Network fetches run as spawned tasks so a slow weather service never
//! delays the sensor tick, but their results come back through the
//! scheduler's own `select!` loop. State machine and render cache are only
//! ever touched from this one task, so no lock is needed around them.
//!
//! ## Stale Results
//! Every fetch carries a [`FetchTicket`]. Starting a new fetch aborts the
//! previous one and bumps the generation; a result whose ticket no longer
//! matches the current generation and view (or which arrives while asleep)
//! is dropped instead of being drawn over the newer view.

use crate::config::Config;
use crate::display::{DisplayPort, Ink};
use crate::format::format_snapshot;
use crate::render::{PaneLayout, RenderCache, RenderedPane};
use crate::sensor::{poll_gesture, SensorPort};
use crate::state::{DisplayState, DisplayStateMachine, Transition};
use crate::weather::{fetch_view, WeatherError, WeatherPort, WeatherRequest};
use crate::{LightLevel, ViewKind, WeatherSnapshot};
use chrono::Local;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

type FetchResult = Result<WeatherSnapshot, WeatherError>;

/// Hardware handles, acquired once at startup and owned by the scheduler.
pub struct DeviceContext<S, D> {
    pub sensor: S,
    pub display: D,
}

/// Identifies one weather fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub view: ViewKind,
    pub generation: u64,
}

struct PendingFetch {
    ticket: FetchTicket,
    handle: JoinHandle<FetchResult>,
}

/// Timing and request parameters taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    pub gesture_poll: Duration,
    pub weather_poll: Duration,
    pub request: WeatherRequest,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gesture_poll: config.sensor.poll_interval(),
            weather_poll: config.weather.poll_interval(),
            request: WeatherRequest {
                location: config.weather.location(),
                units: config.weather.units,
                max_hourly_entries: config.weather.max_hourly_entries,
            },
        }
    }
}

pub struct PollScheduler<S, D, W: ?Sized> {
    ctx: DeviceContext<S, D>,
    weather: Arc<W>,
    machine: DisplayStateMachine,
    cache: RenderCache,
    settings: SchedulerSettings,
    pending: Option<PendingFetch>,
    next_refresh: Option<Instant>,
    generation: u64,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_fetch(
    pending: &mut Option<PendingFetch>,
) -> (FetchTicket, Result<FetchResult, JoinError>) {
    match pending {
        Some(fetch) => {
            let outcome = (&mut fetch.handle).await;
            (fetch.ticket, outcome)
        }
        None => std::future::pending().await,
    }
}

impl<S, D, W> PollScheduler<S, D, W>
where
    S: SensorPort,
    D: DisplayPort,
    W: WeatherPort + ?Sized + 'static,
{
    pub fn new(ctx: DeviceContext<S, D>, weather: Arc<W>, config: &Config) -> Self {
        Self {
            ctx,
            weather,
            machine: DisplayStateMachine::new(
                config.sensor.high_threshold,
                config.sensor.low_threshold,
            ),
            cache: RenderCache::new(PaneLayout::from_config(&config.display)),
            settings: SchedulerSettings::from_config(config),
            pending: None,
            next_refresh: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> DisplayState {
        self.machine.state()
    }

    pub fn pane(&self) -> &RenderedPane {
        self.cache.pane()
    }

    pub fn context(&self) -> &DeviceContext<S, D> {
        &self.ctx
    }

    /// Give the devices back, cancelling any fetch in flight.
    pub fn into_context(mut self) -> DeviceContext<S, D> {
        self.cancel_fetch();
        self.ctx
    }

    /// When the next periodic weather fetch is due, if any.
    pub fn next_refresh(&self) -> Option<Instant> {
        self.next_refresh
    }

    /// Ticket of the fetch currently in flight.
    pub fn in_flight(&self) -> Option<FetchTicket> {
        self.pending.as_ref().map(|p| p.ticket)
    }

    /// One sensor tick.
    ///
    /// A failed light read skips the whole tick: no gesture is consumed and
    /// the state holds.
    pub fn poll_sensors(&mut self) -> Option<Transition> {
        let light = match self.ctx.sensor.read_ambient_light() {
            Ok(light) => light,
            Err(e) => {
                log::warn!("{e}; skipping tick");
                return None;
            }
        };
        let gesture = poll_gesture(&mut self.ctx.sensor);
        log::debug!("light {light}, gesture {gesture:?}");

        let transition = self.machine.transition(light, gesture)?;
        self.on_transition(transition, light);
        Some(transition)
    }

    fn on_transition(&mut self, transition: Transition, light: LightLevel) {
        match transition {
            Transition::Woke(view) => {
                log::info!("Light {light}: waking display ({view:?})");
                self.start_fetch(view);
            }
            Transition::Slept => {
                log::info!("Light {light}: display going to sleep");
                self.cancel_fetch();
                self.next_refresh = None;
                if let Err(e) = self.cache.clear(&mut self.ctx.display) {
                    log::warn!("Failed to erase panes: {e}");
                }
            }
            Transition::ViewChanged { from, to } => {
                log::info!("View changed {from:?} -> {to:?}");
                self.start_fetch(to);
            }
        }
    }

    /// Dispatch a fetch for `view`, replacing any fetch in flight, and
    /// restart the periodic refresh timer.
    fn start_fetch(&mut self, view: ViewKind) {
        self.cancel_fetch();
        self.generation += 1;
        let ticket = FetchTicket {
            view,
            generation: self.generation,
        };

        let port = Arc::clone(&self.weather);
        let request = self.settings.request;
        let handle = tokio::spawn(async move { fetch_view(&*port, view, request).await });

        log::debug!("Fetching {view:?} weather (generation {})", ticket.generation);
        self.pending = Some(PendingFetch { ticket, handle });
        self.next_refresh = Some(Instant::now() + self.settings.weather_poll);
    }

    fn cancel_fetch(&mut self) {
        if let Some(fetch) = self.pending.take() {
            fetch.handle.abort();
            log::debug!(
                "Cancelled {:?} fetch (generation {})",
                fetch.ticket.view,
                fetch.ticket.generation
            );
        }
    }

    /// Periodic weather tick.
    fn on_refresh_due(&mut self) {
        let state = self.machine.state();
        if !state.on {
            self.next_refresh = None;
            return;
        }
        match self.in_flight() {
            Some(ticket) if ticket.view == state.view => {
                log::debug!("{:?} fetch still in flight, not starting another", state.view);
                self.next_refresh = Some(Instant::now() + self.settings.weather_poll);
            }
            _ => self.start_fetch(state.view),
        }
    }

    fn is_current(&self, ticket: FetchTicket) -> bool {
        let state = self.machine.state();
        state.on && state.view == ticket.view && ticket.generation == self.generation
    }

    fn handle_fetch_outcome(&mut self, ticket: FetchTicket, outcome: Result<FetchResult, JoinError>) {
        match outcome {
            Ok(result) => {
                self.apply_fetch_result(ticket, result);
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => log::error!("Weather fetch task failed: {e}"),
        }
    }

    /// Render a finished fetch. Returns whether anything was drawn.
    ///
    /// Failures and stale results leave the screen as it is.
    pub fn apply_fetch_result(&mut self, ticket: FetchTicket, result: FetchResult) -> bool {
        if !self.is_current(ticket) {
            log::debug!(
                "Dropping stale {:?} result (generation {}, current {})",
                ticket.view,
                ticket.generation,
                self.generation
            );
            return false;
        }

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Weather fetch failed: {e}; keeping previous content");
                return false;
            }
        };

        let units = self.settings.request.units;
        let (time, body) = format_snapshot(&snapshot, units, &Local::now());
        let state = self.machine.state();
        match self.cache.apply(&mut self.ctx.display, &state, &time, &body) {
            Ok(update) => update.time || update.body,
            Err(e) => {
                log::warn!("Failed to draw weather: {e}");
                false
            }
        }
    }

    /// Wait for the fetch in flight, if any, and render its result.
    pub async fn complete_pending_fetch(&mut self) -> bool {
        match self.pending.take() {
            Some(fetch) => {
                let outcome = fetch.handle.await;
                self.handle_fetch_outcome(fetch.ticket, outcome);
                true
            }
            None => false,
        }
    }

    /// Run both loops until `shutdown` resolves.
    pub async fn run<F: Future<Output = ()>>(&mut self, shutdown: F) {
        if let Err(e) = self.ctx.display.clear_screen(Ink::Background) {
            log::warn!("Failed to clear display: {e}");
        }

        let mut sensor_tick = tokio::time::interval(self.settings.gesture_poll);
        sensor_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        log::info!(
            "Polling sensor every {:?}, weather every {:?}",
            self.settings.gesture_poll,
            self.settings.weather_poll
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sensor_tick.tick() => {
                    self.poll_sensors();
                }
                _ = wait_until(self.next_refresh) => self.on_refresh_due(),
                (ticket, outcome) = wait_for_fetch(&mut self.pending) => {
                    self.pending = None;
                    self.handle_fetch_outcome(ticket, outcome);
                }
            }
        }

        self.cancel_fetch();
        log::info!("Poll loop stopped");
    }

    /// Erase the panes and blank the panel before the process exits.
    pub fn shutdown(&mut self) {
        self.cancel_fetch();
        self.next_refresh = None;
        if let Err(e) = self.cache.clear(&mut self.ctx.display) {
            log::warn!("Failed to erase panes: {e}");
        }
        if let Err(e) = self.ctx.display.clear_screen(Ink::Background) {
            log::warn!("Failed to clear display: {e}");
        }
    }
}
