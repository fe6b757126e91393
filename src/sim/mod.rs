//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only (clamped, never skipped)
//! - Seeded RNG only
//! - Stable iteration order (by pool slot, FIRST bucket before LAST)
//! - No rendering or platform dependencies; presentation consumes the
//!   render command list and the drained event queues

pub mod entity;
pub mod gun;
pub mod list;
pub mod particle;
pub mod pool;
pub mod step;
pub mod world;

pub use entity::{
    Control, Entity, EntityFlags, EntityKind, KindMask, Order, Rgba, Sprite, SpriteId, Waypoint,
    WaypointAction,
};
pub use gun::{Gun, GunFlags, GunKind};
pub use particle::EmitterKind;
pub use pool::{EntityHandle, EntityPool};
pub use step::RenderCommand;
pub use world::{
    AudioEvent, CameraEvent, FrameStats, InputFlags, InputSnapshot, Rect, SoundId, World,
};
