//! Shrinking safe zone

use serde::{Deserialize, Serialize};

/// The safe circle, centered on the arena center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Current radius
    pub radius: f32,
    /// Radius the zone never shrinks below
    pub floor: f32,
    /// Radius lost every frame
    pub shrink_per_frame: f32,
}

impl Zone {
    /// A zone that will close from `initial_radius` to `floor` over the round
    pub fn start(initial_radius: f32, floor: f32, round_duration_secs: f32, fps: u32) -> Self {
        let floor = floor.max(0.0).min(initial_radius);
        let frames = (round_duration_secs * fps as f32).max(1.0);
        Self {
            radius: initial_radius,
            floor,
            shrink_per_frame: (initial_radius - floor) / frames,
        }
    }

    /// A zone that never moves (used outside of battle)
    pub fn idle(radius: f32) -> Self {
        Self {
            radius,
            floor: radius,
            shrink_per_frame: 0.0,
        }
    }

    /// Shrink by one frame, stopping at the floor
    pub fn step(&mut self) {
        self.radius = (self.radius - self.shrink_per_frame).max(self.floor);
    }

    pub fn at_floor(&self) -> bool {
        self.radius <= self.floor
    }
}
