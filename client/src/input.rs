//! Control-state sampling for the fixed simulation tick

use shared::MoveFlags;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Raw control state pushed in by the presentation layer.
///
/// The host updates this whenever its own input events fire; the engine only
/// reads it at tick boundaries, so mid-tick changes never tear a simulation
/// step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlState {
    pub flags: MoveFlags,
    pub running: bool,
}

/// Immutable per-tick snapshot of the controls.
#[derive(Debug, Clone, Copy)]
pub struct InputSample {
    pub flags: MoveFlags,
    pub running: bool,
    pub timestamp: u64,
}

/// Samples the live control state once per simulation tick.
pub struct InputSampler {
    current: ControlState,
}

impl InputSampler {
    pub fn new() -> Self {
        Self {
            current: ControlState::default(),
        }
    }

    /// Replaces the live control state. Called by the host at any time.
    pub fn set_controls(&mut self, controls: ControlState) {
        self.current = controls;
    }

    pub fn controls(&self) -> &ControlState {
        &self.current
    }

    /// Freezes the current controls into a tick-stamped sample.
    pub fn sample(&self) -> InputSample {
        InputSample {
            flags: self.current.flags,
            running: self.current.running,
            timestamp: get_timestamp(),
        }
    }
}

impl Default for InputSampler {
    fn default() -> Self {
        Self::new()
    }
}

// Wall-clock milliseconds since the epoch
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
