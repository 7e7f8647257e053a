//! # Ambient Light and Gesture Sensor Port
//!
//! The core only needs three things from the sensor: the current ambient
//! light level, whether a gesture is waiting, and that gesture. Everything
//! else (bus access, FIFO draining, gesture decoding) lives in the adapter.
//!
//! Two adapters ship with the crate:
//! - [`SimulatedSensor`]: values injected through a [`SimulatedSensorHandle`],
//!   used by the development mode and the tests
//! - `apds9960::Apds9960`: the I²C driver for the real board (`hardware` feature)

use crate::{GestureEvent, LightLevel};
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;

/// Sensor failures.
///
/// `Init` is fatal at startup; `Read` only costs the current tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor init failed: {0}")]
    Init(String),

    #[error("sensor read failed: {0}")]
    Read(String),
}

/// Gesture as decoded by the sensor, before the core narrows it down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawGesture {
    Left,
    Right,
    /// Up, down, near, far, or anything the decoder could not classify
    Other,
}

/// Capability the poll loop needs from the light/gesture sensor.
///
/// Reads are expected to be fast and non-blocking.
pub trait SensorPort: Send {
    fn read_ambient_light(&mut self) -> Result<LightLevel, SensorError>;
    fn gesture_available(&mut self) -> Result<bool, SensorError>;
    fn read_gesture(&mut self) -> Result<RawGesture, SensorError>;
}

/// Consume at most one gesture from the sensor.
///
/// Anything that is not a horizontal swipe, and any read failure, counts as
/// no gesture for this tick.
pub fn poll_gesture<S: SensorPort + ?Sized>(sensor: &mut S) -> GestureEvent {
    match sensor.gesture_available() {
        Ok(true) => {}
        Ok(false) => return GestureEvent::None,
        Err(e) => {
            log::warn!("{e}");
            return GestureEvent::None;
        }
    }

    match sensor.read_gesture() {
        Ok(RawGesture::Left) => GestureEvent::SwipeLeft,
        Ok(RawGesture::Right) => GestureEvent::SwipeRight,
        Ok(RawGesture::Other) => GestureEvent::None,
        Err(e) => {
            log::warn!("{e}");
            GestureEvent::None
        }
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    light: LightLevel,
    gestures: VecDeque<RawGesture>,
    failing: bool,
}

/// Sensor whose readings are set from the outside.
pub struct SimulatedSensor {
    state: Arc<Mutex<SimulatedState>>,
}

/// Cloneable control side of a [`SimulatedSensor`].
#[derive(Clone)]
pub struct SimulatedSensorHandle {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedSensor {
    /// Create a sensor reading `initial_light` and its control handle.
    pub fn new(initial_light: LightLevel) -> (Self, SimulatedSensorHandle) {
        let state = Arc::new(Mutex::new(SimulatedState {
            light: initial_light,
            ..Default::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedSensorHandle { state },
        )
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut SimulatedState) -> T,
    ) -> Result<T, SensorError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SensorError::Read("simulated sensor state poisoned".to_string()))?;
        if state.failing {
            return Err(SensorError::Read("simulated failure".to_string()));
        }
        Ok(f(&mut state))
    }
}

impl SensorPort for SimulatedSensor {
    fn read_ambient_light(&mut self) -> Result<LightLevel, SensorError> {
        self.with_state(|s| s.light)
    }

    fn gesture_available(&mut self) -> Result<bool, SensorError> {
        self.with_state(|s| !s.gestures.is_empty())
    }

    fn read_gesture(&mut self) -> Result<RawGesture, SensorError> {
        self.with_state(|s| s.gestures.pop_front().unwrap_or(RawGesture::Other))
    }
}

impl SimulatedSensorHandle {
    fn update(&self, f: impl FnOnce(&mut SimulatedState)) {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn set_light(&self, light: LightLevel) {
        self.update(|s| s.light = light);
    }

    pub fn push_gesture(&self, gesture: RawGesture) {
        self.update(|s| s.gestures.push_back(gesture));
    }

    /// Make every read fail until called again with `false`.
    pub fn set_failing(&self, failing: bool) {
        self.update(|s| s.failing = failing);
    }

    /// Apply one text command: `light <n>`, `left`, `right`, `other`,
    /// `fail` or `recover`.
    pub fn apply_command(&self, line: &str) -> Result<(), String> {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("light"), Some(value)) => {
                let level = value
                    .parse::<LightLevel>()
                    .map_err(|_| format!("not a light level: {value}"))?;
                self.set_light(level);
            }
            (Some("left"), None) => self.push_gesture(RawGesture::Left),
            (Some("right"), None) => self.push_gesture(RawGesture::Right),
            (Some("other"), None) => self.push_gesture(RawGesture::Other),
            (Some("fail"), None) => self.set_failing(true),
            (Some("recover"), None) => self.set_failing(false),
            (None, _) => {}
            _ => return Err(format!("unknown command: {}", line.trim())),
        }
        Ok(())
    }

    /// Feed commands line by line until the reader is exhausted.
    pub fn feed_from<R: BufRead>(&self, reader: R) -> std::io::Result<()> {
        for line in reader.lines() {
            if let Err(e) = self.apply_command(&line?) {
                log::warn!("{e}");
            }
        }
        Ok(())
    }

    /// Run [`Self::feed_from`] on a dedicated thread.
    ///
    /// Reads block until input arrives, so they stay off the async runtime;
    /// the thread is detached and never delays shutdown.
    pub fn spawn_feed<R: BufRead + Send + 'static>(
        self,
        reader: R,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("sensor-input".to_string())
            .spawn(move || match self.feed_from(reader) {
                Ok(()) => log::info!("Sensor input closed"),
                Err(e) => log::warn!("Sensor input failed: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_light_follows_handle() {
        let (mut sensor, handle) = SimulatedSensor::new(10);
        assert_eq!(sensor.read_ambient_light(), Ok(10));
        handle.set_light(2500);
        assert_eq!(sensor.read_ambient_light(), Ok(2500));
    }

    #[test]
    fn poll_gesture_consumes_one_per_call() {
        let (mut sensor, handle) = SimulatedSensor::new(0);
        handle.push_gesture(RawGesture::Right);
        handle.push_gesture(RawGesture::Left);

        assert_eq!(poll_gesture(&mut sensor), GestureEvent::SwipeRight);
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::SwipeLeft);
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::None);
    }

    #[test]
    fn other_gestures_are_ignored() {
        let (mut sensor, handle) = SimulatedSensor::new(0);
        handle.push_gesture(RawGesture::Other);
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::None);
        assert_eq!(sensor.gesture_available(), Ok(false));
    }

    #[test]
    fn failing_sensor_reports_read_errors() {
        let (mut sensor, handle) = SimulatedSensor::new(0);
        handle.push_gesture(RawGesture::Left);
        handle.set_failing(true);
        assert!(matches!(
            sensor.read_ambient_light(),
            Err(SensorError::Read(_))
        ));
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::None);

        handle.set_failing(false);
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::SwipeLeft);
    }

    #[test]
    fn commands_drive_the_sensor() {
        let (mut sensor, handle) = SimulatedSensor::new(0);
        handle.apply_command("light 2500").unwrap();
        handle.apply_command("right").unwrap();
        handle.apply_command("   ").unwrap();
        assert!(handle.apply_command("light bright").is_err());
        assert!(handle.apply_command("jump").is_err());

        assert_eq!(sensor.read_ambient_light(), Ok(2500));
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::SwipeRight);
    }

    #[test]
    fn feed_from_reads_every_line() {
        let (mut sensor, handle) = SimulatedSensor::new(0);
        let input: &[u8] = b"light 120\nleft\nbogus\nlight 30\n";
        handle.feed_from(input).unwrap();

        assert_eq!(sensor.read_ambient_light(), Ok(30));
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::SwipeLeft);
    }

    #[test]
    fn spawned_feed_applies_commands_and_exits_at_eof() {
        let (mut sensor, handle) = SimulatedSensor::new(0);
        let input: &[u8] = b"light 900\nright\n";
        handle.spawn_feed(input).unwrap().join().unwrap();

        assert_eq!(sensor.read_ambient_light(), Ok(900));
        assert_eq!(poll_gesture(&mut sensor), GestureEvent::SwipeRight);
    }
}
