//! Time utilities for the frame-driven simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default display refresh rate the engine is tuned for
pub const DEFAULT_FPS: u32 = 60;

/// Wall-clock duration of one frame at the given rate
pub fn frame_duration(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / fps.max(1) as u64)
}

/// Match clock derived purely from the frame counter.
///
/// Every timestamp inside the engine (modifier expiry, supply spawns) is
/// expressed in these seconds, so stepping frames by hand in tests behaves
/// exactly like real time passing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    pub frame: u64,
    pub fps: u32,
}

impl FrameClock {
    pub fn new(fps: u32) -> Self {
        Self {
            frame: 0,
            fps: fps.max(1),
        }
    }

    pub fn advance(&mut self) {
        self.frame += 1;
    }

    /// Seconds of match time elapsed
    pub fn now(&self) -> f64 {
        self.frame as f64 / self.fps as f64
    }
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
