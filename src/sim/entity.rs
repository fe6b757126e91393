//! Entity data: kinds, capability flags, control states, sprites, colors
//!
//! An entity is one flat struct; behavior is selected by a 64-bit capability
//! mask interpreted in a fixed order each frame (see `step`). Most fields are
//! meaningful only when the corresponding flag is set.

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::TARGET_FPS;
use crate::sim::gun::Gun;
use crate::sim::list::{ListId, NodeId};
use crate::sim::particle::EmitterKind;
use crate::sim::pool::EntityHandle;

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const BLANK: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const RAYWHITE: Rgba = Rgba::new(245, 245, 245, 255);
    pub const BLOOD: Rgba = Rgba::new(255, 0, 0, 255);
    pub const GREEN: Rgba = Rgba::new(0, 255, 0, 255);
    pub const YELLOW: Rgba = Rgba::new(253, 249, 0, 255);
    pub const ORANGE: Rgba = Rgba::new(255, 161, 0, 255);
    pub const RED: Rgba = Rgba::new(230, 41, 55, 255);
    pub const PURPLE: Rgba = Rgba::new(200, 122, 255, 255);
    pub const PINK: Rgba = Rgba::new(255, 109, 194, 255);
    pub const GUNMETAL: Rgba = Rgba::new(58, 58, 58, 255);
    pub const DIRT_BROWN: Rgba = Rgba::new(102, 57, 49, 255);
    pub const SPARK_GOLD: Rgba = Rgba::new(255, 188, 3, 255);

    /// Same color with alpha scaled to `alpha` in [0, 1]
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0) as u8,
            ..self
        }
    }

    /// Component-wise linear interpolation, `t` clamped to [0, 1]
    pub fn lerp(self, other: Rgba, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
        Rgba {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

/// What an entity is. Kinds select collision targets via [`KindMask`], not
/// behavior; behavior comes from flags and control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityKind {
    #[default]
    None,
    Player,
    Parent,
    PlayerBullet,
    Raptor,
    HealthPack,
    Shotgun,
    AssaultRifle,
    GrenadeLauncher,
    Flamethrower,
    Boss,
}

/// Set of entity kinds, one bit per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindMask(pub u64);

impl KindMask {
    pub const EMPTY: KindMask = KindMask(0);
    pub const PLAYER: KindMask = KindMask::one(EntityKind::Player);
    pub const RAPTOR: KindMask = KindMask::one(EntityKind::Raptor);

    /// Targets player bullets collide with
    pub const PLAYER_BULLET_TARGETS: KindMask =
        KindMask(KindMask::one(EntityKind::Raptor).0 | KindMask::one(EntityKind::Boss).0);

    /// Kinds counted as enemies in frame stats
    pub const ENEMIES: KindMask = KindMask(
        KindMask::one(EntityKind::Raptor).0
            | KindMask::one(EntityKind::Boss).0
            | KindMask::one(EntityKind::Parent).0,
    );

    pub const fn one(kind: EntityKind) -> KindMask {
        KindMask(1u64 << kind as u64)
    }

    pub const fn contains(self, kind: EntityKind) -> bool {
        self.0 & (1u64 << kind as u64) != 0
    }
}

bitflags! {
    /// Entity capability mask. The frame pipeline tests these in a fixed
    /// order; that order is load-bearing (e.g. damage is settled before
    /// lifetime expiry, death is always last).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct EntityFlags: u64 {
        const DYNAMICS                 = 1 << 0;
        const SPINNING                 = 1 << 1;
        const HAS_SPRITE               = 1 << 2;
        const APPLY_FRICTION           = 1 << 3;
        const FILL_BOUNDS              = 1 << 4;
        const HAS_GUN                  = 1 << 5;
        const NOT_ON_SCREEN            = 1 << 6;
        const ON_SCREEN                = 1 << 7;
        const DIE_IF_CHILD_LIST_EMPTY  = 1 << 8;
        const DIE_NOW                  = 1 << 9;
        const INTERACT                 = 1 << 10;
        const IS_INTERACTABLE          = 1 << 11;
        const HAS_LIFETIME             = 1 << 12;
        const APPLY_COLLISION          = 1 << 13;
        const RECEIVE_COLLISION        = 1 << 14;
        const APPLY_COLLISION_DAMAGE   = 1 << 15;
        const RECEIVE_COLLISION_DAMAGE = 1 << 16;
        const DAMAGE_INCREMENTS_SCORE  = 1 << 17;
        const DIE_ON_APPLY_COLLISION   = 1 << 18;
        const EMIT_SPAWN_PARTICLES     = 1 << 19;
        const EMIT_DEATH_PARTICLES     = 1 << 20;
        const APPLY_EFFECT_TINT        = 1 << 21;
    }
}

/// Update/draw bucket. All FIRST entities are processed before any LAST
/// entity; within a bucket, pool slot order applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    First,
    Last,
}

/// Per-frame steering, applied before the flag pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Control {
    /// Pure flag-driven entity
    #[default]
    None,
    /// Reads the input snapshot: mouse look, movement, fire, interact, throw
    Player,
    /// Rigidly follows the parent with a rotated hold offset
    GunBeingHeld,
    /// Mirrors the parent's velocity
    CopyParent,
    /// Steers toward the parent at `scalar_vel`
    FollowParent,
    /// Walks a waypoint route, arrival tested against squared radius
    GotoWaypoint,
}

/// Sprite atlas identifiers known to the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpriteId {
    #[default]
    None,
    Dude,
    ShotgunSide,
    ShotgunTop,
    RifleSide,
    RifleTop,
    HealthPack,
    ShotgunPellet,
    RifleRound,
    Raptor,
    Boss,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct SpriteFlags: u32 {
        const STILL           = 1 << 0;
        const INFINITE_REPEAT = 1 << 1;
        const PINGPONG        = 1 << 2;
        const REVERSE         = 1 << 3;
        const AT_LAST_FRAME   = 1 << 4;
    }
}

/// Frame-counted sprite animation state. Advances by whole simulation frames
/// relative to [`TARGET_FPS`], not wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sprite {
    pub id: SpriteId,
    pub total_frames: u32,
    pub fps: u32,
    pub cur_frame: u32,
    pub frame_counter: u32,
    pub flags: SpriteFlags,
}

impl Sprite {
    /// Single-frame sprite that never animates
    pub fn still(id: SpriteId) -> Self {
        Sprite {
            id,
            total_frames: 1,
            fps: 0,
            flags: SpriteFlags::STILL,
            ..Default::default()
        }
    }

    /// Looping animation at `fps` atlas frames per second
    pub fn looping(id: SpriteId, total_frames: u32, fps: u32) -> Self {
        Sprite {
            id,
            total_frames,
            fps,
            flags: SpriteFlags::INFINITE_REPEAT,
            ..Default::default()
        }
    }

    /// Advance one simulation frame
    pub fn tick(&mut self) {
        if self.flags.contains(SpriteFlags::STILL) {
            return;
        }

        debug_assert!(self.fps > 0);

        if self.cur_frame < self.total_frames {
            self.frame_counter += 1;
            if self.frame_counter >= TARGET_FPS / self.fps {
                self.frame_counter = 0;
                self.cur_frame += 1;
            }
        }

        if self.cur_frame >= self.total_frames {
            if self.flags.contains(SpriteFlags::INFINITE_REPEAT) {
                if self.flags.contains(SpriteFlags::PINGPONG) {
                    self.cur_frame -= 1;
                    self.flags.toggle(SpriteFlags::REVERSE);
                } else {
                    self.cur_frame = 0;
                }
            } else {
                self.cur_frame -= 1;
                self.flags |= SpriteFlags::AT_LAST_FRAME | SpriteFlags::STILL;
            }
        }
    }

    /// Atlas frame index for drawing, honoring REVERSE
    pub fn display_frame(&self) -> u32 {
        if self.flags.contains(SpriteFlags::REVERSE) {
            self.total_frames - 1 - self.cur_frame
        } else {
            self.cur_frame
        }
    }
}

/// One stop on a patrol route
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub pos: Vec2,
    pub radius: f32,
}

/// What happens when the final waypoint is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaypointAction {
    /// Keep the last steering velocity
    #[default]
    Hold,
    /// Restart from the first waypoint
    Loop,
    /// Mark the entity for death
    Die,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaypointRoute {
    pub points: Vec<Waypoint>,
    pub cursor: usize,
    pub action: WaypointAction,
}

/// Side effect applied when a collision lands on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollideEffect {
    #[default]
    None,
    /// Health pack touch: heal the target, capped at full player health
    HealPlayer,
}

/// Side effect when the player interacts with this entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InteractEffect {
    #[default]
    None,
    /// Attach this weapon to the interacting entity
    PickupWeapon,
}

/// One pooled game object. Zero-initialized on spawn apart from `live` and
/// `uid`; spawn constructors in `world` fill in the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    pub live: bool,
    pub uid: u64,
    /// Free-list link, meaningful only while dead
    pub free_next: Option<u32>,

    pub kind: EntityKind,
    pub update_order: Order,
    pub draw_order: Order,
    pub control: Control,
    pub flags: EntityFlags,

    pub parent_handle: EntityHandle,
    /// For the player this is the held weapon
    pub child_handle: EntityHandle,

    /// List this entity owns (e.g. a spawner's surviving children)
    pub child_list: Option<ListId>,
    /// List this entity is a member of, plus its node there
    pub member_of: Option<ListId>,
    pub member_node: Option<NodeId>,

    pub look_dir: Vec2,
    pub look_angle: f32,
    pub accel: Vec2,
    pub vel: Vec2,
    pub pos: Vec2,
    pub radius: f32,
    pub interact_radius: f32,
    pub scalar_vel: f32,
    pub friction: f32,
    pub spin_vel: f32,

    pub received_collision: bool,
    pub received_damage: i32,
    pub damage_amount: i32,
    pub health: i32,

    pub apply_collision_mask: KindMask,
    pub collide_effect: CollideEffect,
    pub interact_effect: InteractEffect,

    pub waypoints: WaypointRoute,

    pub spawn_emitter: Option<EmitterKind>,
    pub death_emitter: Option<EmitterKind>,

    pub gun: Gun,
    pub being_held_offset: Vec2,

    /// Countdown until an automatic non-player gunner starts firing
    pub shooting_pause_timer: f32,
    pub start_shooting_delay: f32,

    pub sprite: Sprite,
    pub sprite_scale: f32,
    pub sprite_rotation: f32,
    pub sprite_tint: Rgba,

    pub fill_color: Rgba,

    pub effect_tint: Rgba,
    pub effect_tint_timer_vel: f32,
    pub effect_tint_duration: f32,
    pub effect_tint_timer: f32,

    pub invulnerability_timer: f32,

    pub life_time_duration: f32,
    pub life_timer: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mask_contains() {
        assert!(KindMask::PLAYER_BULLET_TARGETS.contains(EntityKind::Raptor));
        assert!(KindMask::PLAYER_BULLET_TARGETS.contains(EntityKind::Boss));
        assert!(!KindMask::PLAYER_BULLET_TARGETS.contains(EntityKind::Player));
        assert!(KindMask::ENEMIES.contains(EntityKind::Parent));
        assert!(!KindMask::EMPTY.contains(EntityKind::Player));
    }

    #[test]
    fn test_color_lerp_endpoints() {
        let a = Rgba::new(0, 100, 200, 255);
        let b = Rgba::new(255, 0, 50, 0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        let mid = a.lerp(b, 0.5);
        assert_eq!(mid.r, 127);
    }

    #[test]
    fn test_sprite_loop_advances_at_fps_divisor() {
        // 12 fps sprite at 60 fps sim: one atlas frame every 5 ticks
        let mut sp = Sprite::looping(SpriteId::Dude, 4, 12);
        for _ in 0..4 {
            sp.tick();
            assert_eq!(sp.cur_frame, 0);
        }
        sp.tick();
        assert_eq!(sp.cur_frame, 1);
    }

    #[test]
    fn test_sprite_loop_wraps() {
        let mut sp = Sprite::looping(SpriteId::Dude, 2, 60);
        sp.tick();
        assert_eq!(sp.cur_frame, 1);
        sp.tick();
        assert_eq!(sp.cur_frame, 0);
    }

    #[test]
    fn test_still_sprite_never_animates() {
        let mut sp = Sprite::still(SpriteId::HealthPack);
        for _ in 0..100 {
            sp.tick();
        }
        assert_eq!(sp.cur_frame, 0);
    }

    #[test]
    fn test_one_shot_sprite_parks_on_last_frame() {
        let mut sp = Sprite {
            id: SpriteId::Dude,
            total_frames: 2,
            fps: 60,
            ..Default::default()
        };
        sp.tick();
        sp.tick();
        assert!(sp.flags.contains(SpriteFlags::AT_LAST_FRAME));
        assert!(sp.flags.contains(SpriteFlags::STILL));
        assert_eq!(sp.cur_frame, 1);
        sp.tick();
        assert_eq!(sp.cur_frame, 1);
    }
}
