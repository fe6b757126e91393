//! Dino Arena - entity simulation core for a 2D top-down arcade shooter
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entity pool, flag-driven behavior
//!   engine, weapons, particles)
//!
//! Rendering, audio mixing, window/input polling and asset loading live
//! outside this crate. Each frame the simulation consumes one input snapshot
//! and produces a retained render command list plus fire-and-forget camera
//! and audio events.

pub mod sim;

pub use sim::world::{InputFlags, InputSnapshot, Rect, World};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Reference frame rate the content was tuned at
    pub const TARGET_FPS: u32 = 60;
    /// One frame at the reference rate
    pub const FRAME_DT: f32 = 1.0 / TARGET_FPS as f32;
    /// Worst-case integration step; longer frame spikes are clamped to this
    pub const MAX_FRAME_DT: f32 = 1.0 / 10.0;

    /// Entity pool capacity; exceeding it is fatal
    pub const MAX_ENTITIES: usize = 4096;
    /// Particle ring capacity; overflow overwrites the oldest slot
    pub const MAX_PARTICLES: usize = 8192;
    /// Pre-authored bullet offsets a gun's point bag can hold
    pub const MAX_BULLETS_IN_BAG: usize = 8;
}

/// Rotate a vector by `angle` radians (counter-clockwise)
#[inline]
pub fn rotate_vec(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Normalize `value` from [min, max] to [0, 1]
#[inline]
pub fn normalize_range(value: f32, min: f32, max: f32) -> f32 {
    if (max - min).abs() < f32::EPSILON {
        0.0
    } else {
        (value - min) / (max - min)
    }
}

/// Linear remap of `value` from [in_min, in_max] to [out_min, out_max]
#[inline]
pub fn remap(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    out_min + normalize_range(value, in_min, in_max) * (out_max - out_min)
}
