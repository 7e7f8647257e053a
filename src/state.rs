//! Display lifecycle state machine
//!
//! Whether the screen is on and which view it shows is a function of the
//! current state, the light level and the gesture read in one sensor tick.
//! Distinct wake and sleep thresholds give the light check hysteresis so a
//! noisy reading near a single boundary cannot make the display flap.

use crate::{GestureEvent, LightLevel, ViewKind};

/// Lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Display off, waiting for light
    Asleep,
    /// Display on, showing a view
    Awake(ViewKind),
}

/// Snapshot of the display state as seen by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    pub on: bool,
    pub view: ViewKind,
}

/// Outcome of a tick that changed state. Each one carries side effects the
/// scheduler has to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Light rose to the wake threshold; fetch `view` immediately
    Woke(ViewKind),
    /// Light fell to the sleep threshold; clear the panes, stop refreshing
    Slept,
    /// A swipe selected another view; fetch it and restart the refresh timer
    ViewChanged { from: ViewKind, to: ViewKind },
}

#[derive(Debug, Clone)]
pub struct DisplayStateMachine {
    phase: Phase,
    high_threshold: LightLevel,
    low_threshold: LightLevel,
}

impl DisplayStateMachine {
    /// Start asleep. `high_threshold` must exceed `low_threshold`; the config
    /// layer enforces it.
    pub fn new(high_threshold: LightLevel, low_threshold: LightLevel) -> Self {
        debug_assert!(high_threshold > low_threshold);
        Self {
            phase: Phase::Asleep,
            high_threshold,
            low_threshold,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> DisplayState {
        match self.phase {
            Phase::Asleep => DisplayState {
                on: false,
                view: ViewKind::Current,
            },
            Phase::Awake(view) => DisplayState { on: true, view },
        }
    }

    /// Feed one sensor tick.
    ///
    /// Rules are checked in order and the first match wins, so the light
    /// check always precedes the gesture check and a tick makes at most one
    /// transition. A wake always lands on [`ViewKind::Current`]; the view
    /// never survives a sleep.
    pub fn transition(&mut self, light: LightLevel, gesture: GestureEvent) -> Option<Transition> {
        match self.phase {
            Phase::Asleep if light >= self.high_threshold => {
                self.phase = Phase::Awake(ViewKind::Current);
                Some(Transition::Woke(ViewKind::Current))
            }
            Phase::Asleep => None,
            Phase::Awake(_) if light <= self.low_threshold => {
                self.phase = Phase::Asleep;
                Some(Transition::Slept)
            }
            Phase::Awake(from) => {
                let to = match gesture {
                    GestureEvent::SwipeLeft => from.prev(),
                    GestureEvent::SwipeRight => from.next(),
                    GestureEvent::None => return None,
                };
                self.phase = Phase::Awake(to);
                Some(Transition::ViewChanged { from, to })
            }
        }
    }
}
