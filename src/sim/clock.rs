//! Frame clock
//!
//! One simulation tick runs per rendered frame. The clock owns the frame
//! counter and elapsed simulation time, and clamps oversized frame deltas so a
//! stalled host cannot teleport fighters through the ring boundary.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::consts::{FRAME_DT, MAX_FRAME_DT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameClock {
    /// Frames advanced so far
    pub frame: u64,
    /// Simulation seconds elapsed (sum of clamped deltas)
    pub elapsed: f64,
    /// Wall-clock time of the previous realtime frame
    #[serde(skip)]
    last_instant: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by an externally supplied delta, returning the clamped delta
    pub fn advance(&mut self, dt: f32) -> f32 {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.frame += 1;
        self.elapsed += f64::from(dt);
        dt
    }

    /// Measure the wall-clock delta since the previous call
    ///
    /// The first call has nothing to measure against and reports the nominal
    /// frame time.
    pub fn measure(&mut self) -> f32 {
        let now = Instant::now();
        let dt = match self.last_instant {
            Some(last) => now.duration_since(last).as_secs_f32(),
            None => FRAME_DT,
        };
        self.last_instant = Some(now);
        dt.min(MAX_FRAME_DT)
    }
}
