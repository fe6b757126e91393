//! Weapon firing: lazy tuning, cooldown/burst timing, bullet pattern geometry
//!
//! A gun lives inline in its owning entity. It is inert until first
//! triggered, at which point it tunes itself once from its kind (`cocked`).
//! Each frame the trigger state machine either pays down a timer or releases
//! one volley; volley geometry is pure and returns where the bullets go.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use bitflags::bitflags;

use crate::consts::MAX_BULLETS_IN_BAG;
use crate::rotate_vec;
use crate::sim::entity::{EntityFlags, EntityKind, KindMask, Rgba, Sprite, SpriteId};
use crate::sim::particle::EmitterKind;
use crate::sim::world::SoundId;

/// Flags bullets always carry, on top of the tuned per-gun extras
pub const DEFAULT_BULLET_FLAGS: EntityFlags = EntityFlags::APPLY_COLLISION
    .union(EntityFlags::APPLY_COLLISION_DAMAGE)
    .union(EntityFlags::DIE_ON_APPLY_COLLISION)
    .union(EntityFlags::DYNAMICS);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GunKind {
    Shotgun,
    AssaultRifle,
    GrenadeLauncher,
    Flamethrower,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct GunFlags: u64 {
        /// Aim at the player instead of the owner's look direction
        const LOOK_AT_PLAYER = 1 << 0;
        /// Bullet positions come from the pre-authored point bag
        const USE_POINT_BAG  = 1 << 1;
        /// Fire `burst_shots` volleys spaced by `burst_cooldown` per trigger
        const BURST          = 1 << 2;
        /// Keep firing while the trigger is held
        const AUTOMATIC      = 1 << 3;
    }
}

/// Position and velocity for one bullet of a volley
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletShot {
    pub pos: Vec2,
    pub vel: Vec2,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gun {
    pub flags: GunFlags,
    pub kind: Option<GunKind>,

    pub bullet_kind: EntityKind,
    pub bullet_collision_mask: KindMask,

    /// Distance from the owner's center to the muzzle
    pub radius: f32,
    pub n_arms: u32,
    /// Fraction of the full circle the arms fan across
    pub sector_percent: f32,

    pub point_bag: [Vec2; MAX_BULLETS_IN_BAG],

    pub n_bullets: u32,
    pub arm_width: f32,
    pub bullet_radius: f32,
    pub bullet_vel: f32,
    pub bullet_friction: f32,
    pub bullet_damage: i32,
    pub bullet_lifetime: f32,
    pub bullet_flags: EntityFlags,
    pub bullet_sprite: Sprite,
    pub bullet_sprite_tint: Rgba,
    pub bullet_sprite_scale: f32,
    pub bullet_spawn_emitter: Option<EmitterKind>,
    pub bullet_death_emitter: Option<EmitterKind>,

    pub shake_duration: f32,
    pub shake_magnitude: f32,
    pub sound: Option<SoundId>,

    pub burst_cooldown: f32,
    pub burst_timer: f32,
    pub burst_shots: i32,
    pub burst_shots_fired: i32,

    pub cooldown_duration: f32,
    pub cooldown_timer: f32,
    pub cooling_down: bool,

    pub cocked: bool,
    /// Trigger count; set by whoever pulls the trigger, cleared by the timing
    /// machine when the shot cycle completes
    pub shots: i16,
}

impl Gun {
    pub fn of_kind(kind: GunKind) -> Self {
        Gun {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// One-time tuning, keyed by kind. `holder_radius` offsets the muzzle
    /// past the owner's bounds. A gun with no kind stays untuned and the
    /// trigger machine will never release a volley for it.
    ///
    /// Panics for kinds that have no tuning table yet.
    pub fn cock(&mut self, holder_radius: f32) {
        if self.cocked {
            return;
        }
        self.cocked = true;

        let Some(kind) = self.kind else {
            return;
        };

        match kind {
            GunKind::Shotgun => {
                self.bullet_kind = EntityKind::PlayerBullet;
                self.bullet_collision_mask = KindMask::PLAYER_BULLET_TARGETS;
                self.cooling_down = false;
                self.cooldown_duration = 1.0;
                self.radius = holder_radius + 5.0;
                self.n_arms = 6;
                self.sector_percent = 0.06;
                self.n_bullets = 1;
                self.arm_width = 0.0;
                self.bullet_radius = 3.0;
                self.bullet_vel = 1000.0;
                self.bullet_friction = 0.1;
                self.bullet_damage = 10;
                self.bullet_sprite = Sprite::still(SpriteId::ShotgunPellet);
                self.bullet_sprite_tint = Rgba::WHITE;
                self.bullet_sprite_scale = 1.0;
                self.bullet_flags = EntityFlags::HAS_SPRITE
                    | EntityFlags::EMIT_DEATH_PARTICLES
                    | EntityFlags::APPLY_FRICTION;
                self.shake_duration = 0.18;
                self.shake_magnitude = 2.0;
                self.sound = Some(SoundId::GunShot);
                self.bullet_death_emitter = Some(EmitterKind::Sparks);
            }
            GunKind::AssaultRifle => {
                self.bullet_kind = EntityKind::PlayerBullet;
                self.flags |= GunFlags::AUTOMATIC;
                self.bullet_collision_mask = KindMask::PLAYER_BULLET_TARGETS;
                self.cooling_down = false;
                self.cooldown_duration = 0.03;
                self.radius = holder_radius + 5.0;
                self.n_arms = 1;
                self.sector_percent = 0.0;
                self.n_bullets = 1;
                self.arm_width = 0.0;
                self.bullet_radius = 2.0;
                self.bullet_vel = 1200.0;
                self.bullet_friction = 0.0;
                self.bullet_damage = 5;
                self.bullet_sprite = Sprite::still(SpriteId::RifleRound);
                self.bullet_sprite_tint = Rgba::WHITE;
                self.bullet_sprite_scale = 1.0;
                self.bullet_flags = EntityFlags::HAS_SPRITE
                    | EntityFlags::EMIT_DEATH_PARTICLES
                    | EntityFlags::APPLY_FRICTION;
                self.shake_duration = 0.10;
                self.shake_magnitude = 1.0;
                self.sound = Some(SoundId::GunShot);
                self.bullet_death_emitter = Some(EmitterKind::Sparks);
            }
            GunKind::GrenadeLauncher | GunKind::Flamethrower => {
                panic!("no fire tuning for {kind:?}");
            }
        }
    }

    /// Advance the trigger state machine by one frame. Returns true exactly
    /// when a volley should be released this frame.
    pub fn advance_trigger(&mut self, dt: f32) -> bool {
        if self.shots == 0 {
            return false;
        }

        if self.cooling_down {
            if self.flags.contains(GunFlags::BURST) {
                if self.burst_shots_fired >= self.burst_shots {
                    // Between groups: the long cooldown
                    if self.cooldown_timer >= self.cooldown_duration {
                        self.cooling_down = false;
                        self.shots = 0;
                        self.burst_timer = 0.0;
                        self.burst_shots_fired = 0;
                    } else {
                        self.cooldown_timer += dt;
                    }
                } else if self.burst_timer >= self.burst_cooldown {
                    // Next shot of the group
                    self.cooling_down = false;
                    self.burst_timer = 0.0;
                } else {
                    self.burst_timer += dt;
                }
            } else if self.cooldown_timer >= self.cooldown_duration {
                self.cooling_down = false;
                self.shots = 0;
            } else {
                self.cooldown_timer += dt;
            }

            return false;
        }

        self.cooling_down = true;
        self.cooldown_timer = 0.0;
        if self.flags.contains(GunFlags::BURST) {
            self.burst_shots_fired += 1;
        }

        true
    }

    /// Compute the bullet positions and velocities of one volley.
    ///
    /// Arms fan over `sector_percent` of the circle centered on `aim`; per
    /// arm, bullets come either from the rotated point bag or from an evenly
    /// spaced line perpendicular to the arm.
    pub fn volley(&self, origin: Vec2, aim: Vec2) -> Vec<BulletShot> {
        assert!(self.n_arms > 0);
        assert!(self.n_bullets > 0);

        let mut shots = Vec::with_capacity((self.n_arms * self.n_bullets) as usize);

        let (mut arm_dir, arm_step) = if self.n_arms == 1 {
            (aim, 0.0)
        } else {
            assert!(self.sector_percent > 0.0);
            let sector = std::f32::consts::TAU * self.sector_percent;
            let step = sector / (self.n_arms - 1) as f32;
            (rotate_vec(aim, -0.5 * sector), step)
        };

        for _ in 0..self.n_arms {
            let muzzle = origin + arm_dir * self.radius;

            if self.flags.contains(GunFlags::USE_POINT_BAG) {
                assert!((self.n_bullets as usize) < MAX_BULLETS_IN_BAG);
                let perp = Vec2::new(arm_dir.y, -arm_dir.x);

                for i in 0..self.n_bullets as usize {
                    let p = self.point_bag[i];
                    shots.push(BulletShot {
                        pos: muzzle + perp * p.x + arm_dir * p.y,
                        vel: arm_dir * self.bullet_vel,
                    });
                }
            } else {
                let (start, step_dir) = if self.n_bullets > 1 {
                    assert!(self.arm_width > 0.0);
                    let perp = Vec2::new(arm_dir.y, -arm_dir.x);
                    (
                        muzzle + perp * (-0.5 * self.arm_width),
                        perp * (self.arm_width / (self.n_bullets - 1) as f32),
                    )
                } else {
                    (muzzle, Vec2::ZERO)
                };

                let mut pos = start;
                for _ in 0..self.n_bullets {
                    shots.push(BulletShot {
                        pos,
                        vel: arm_dir * self.bullet_vel,
                    });
                    pos += step_dir;
                }
            }

            arm_dir = rotate_vec(arm_dir, arm_step);
        }

        shots
    }
}
