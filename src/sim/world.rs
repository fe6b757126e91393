//! World context: pool, lists, particles, RNG, score, event queues
//!
//! Owns all simulation state and the spawn constructors. The per-frame
//! pipeline lives in `step`; everything here is setup, teardown, and the
//! handful of cross-entity interactions (weapon pickup/drop/throw).

use bitflags::bitflags;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::sim::entity::{
    CollideEffect, Control, EntityFlags, EntityKind, InteractEffect, KindMask, Order, Rgba,
    Sprite, SpriteId, Waypoint, WaypointAction, WaypointRoute,
};
use crate::sim::gun::{Gun, GunFlags, GunKind};
use crate::sim::list::ListArena;
use crate::sim::particle::{emit, EmitterKind, ParticleRing};
use crate::sim::pool::{EntityHandle, EntityPool};

/*
 * entity settings
 */

pub const PLAYER_INITIAL_POS: Vec2 = Vec2::new(500.0, 500.0);
pub const PLAYER_FRICTION: f32 = 40.0;
pub const PLAYER_LOOK_DIR: Vec2 = Vec2::new(0.0, -1.0);
pub const PLAYER_HEALTH: i32 = 10;
pub const PLAYER_BOUNDS_RADIUS: f32 = 10.0;
pub const PLAYER_ACCEL: f32 = 1.2e4;
/// Seconds of invulnerability after taking a hit
pub const PLAYER_INVULN_DURATION: f32 = 1.2;

pub const WEAPON_INTERACT_RADIUS: f32 = 50.0;
pub const WEAPON_RADIUS: f32 = 12.0;
/// Local offset of a held weapon, rotated with the wielder's look angle
pub const WEAPON_HELD_OFFSET: Vec2 = Vec2::new(-6.0, 12.0);

pub const THROWN_WEAPON_SPEED: f32 = 1100.0;
pub const THROWN_WEAPON_LIFETIME: f32 = 0.23;

pub const RAPTOR_SPEED: f32 = 120.0;
pub const RAPTOR_HEALTH: i32 = 20;
pub const RAPTOR_RADIUS: f32 = 10.0;
pub const RAPTOR_CONTACT_DAMAGE: i32 = 1;

pub const BOSS_HEALTH: i32 = 100;
pub const BOSS_RADIUS: f32 = 20.0;
pub const BOSS_SPEED: f32 = 90.0;
pub const BOSS_CONTACT_DAMAGE: i32 = 2;
pub const BOSS_SHOOT_PAUSE: f32 = 1.5;

/// Axis-aligned rectangle, used for the viewport
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    /// Circle touches the rectangle at all
    pub fn circle_overlaps(&self, center: Vec2, radius: f32) -> bool {
        let cx = center.x.clamp(self.x, self.x + self.w);
        let cy = center.y.clamp(self.y, self.y + self.h);
        let d = Vec2::new(center.x - cx, center.y - cy);
        d.length_squared() <= radius * radius
    }

    /// Circle lies strictly inside the rectangle
    pub fn circle_inside(&self, center: Vec2, radius: f32) -> bool {
        center.x > self.x + radius
            && center.x < self.x + self.w - radius
            && center.y > self.y + radius
            && center.y < self.y + self.h - radius
    }
}

bitflags! {
    /// One frame's worth of player intent
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct InputFlags: u64 {
        const MOVE_FORWARD  = 1 << 0;
        const MOVE_BACKWARD = 1 << 1;
        const MOVE_LEFT     = 1 << 2;
        const MOVE_RIGHT    = 1 << 3;
        /// Trigger pressed this frame (semi-automatic weapons)
        const SHOOT         = 1 << 4;
        /// Trigger held (automatic weapons)
        const SHOOT_HOLD    = 1 << 5;
        const INTERACT      = 1 << 6;
        const THROW         = 1 << 7;

        const MOVE = Self::MOVE_FORWARD.bits()
            | Self::MOVE_BACKWARD.bits()
            | Self::MOVE_LEFT.bits()
            | Self::MOVE_RIGHT.bits();
    }
}

/// Input snapshot consumed by one `step` call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub flags: InputFlags,
    /// Aim point in viewport space (e.g. the mouse cursor)
    pub aim: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoundId {
    GunShot,
    PlayerHurt,
    MonsterHurt,
    HealthPickup,
}

/// Fire-and-forget camera requests for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CameraEvent {
    Shake { duration: f32, magnitude: f32 },
    Pulsate { duration: f32, magnitude: f32 },
}

/// Fire-and-forget audio request; pan is 1.0 at the viewport's left edge
/// and 0.0 at the right, matching the mixer's convention
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioEvent {
    pub sound: SoundId,
    pub pan: f32,
    pub volume: f32,
    pub pitch: f32,
}

/// Per-frame counters for logging and the debug overlay
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame_index: u64,
    pub live_entities: u32,
    pub live_enemies: u32,
    pub live_particles: u32,
    pub slots_allocated: usize,
    pub score: i32,
    pub game_over: bool,
}

pub struct World {
    pub pool: EntityPool,
    pub lists: ListArena,
    pub particles: ParticleRing,
    pub rng: Pcg32,
    pub seed: u64,

    pub frame_index: u64,
    pub score: i32,
    pub game_over: bool,
    /// Debug switch: the player shrugs off all damage while set
    pub debug_invincible: bool,
    pub player_handle: EntityHandle,

    pub camera_events: Vec<CameraEvent>,
    pub audio_events: Vec<AudioEvent>,

    /// Counters refreshed by the last `step`
    pub live_entities: u32,
    pub live_enemies: u32,
}

impl World {
    pub fn new(seed: u64) -> Self {
        log::info!("world created with seed {seed}");
        Self {
            pool: EntityPool::new(),
            lists: ListArena::new(),
            particles: ParticleRing::new(),
            rng: Pcg32::seed_from_u64(seed),
            seed,
            frame_index: 0,
            score: 0,
            game_over: false,
            debug_invincible: false,
            player_handle: EntityHandle::NONE,
            camera_events: Vec::new(),
            audio_events: Vec::new(),
            live_entities: 0,
            live_enemies: 0,
        }
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            frame_index: self.frame_index,
            live_entities: self.live_entities,
            live_enemies: self.live_enemies,
            live_particles: self.particles.live_count() as u32,
            slots_allocated: self.pool.allocated(),
            score: self.score,
            game_over: self.game_over,
        }
    }

    pub fn player_slot(&self) -> Option<u32> {
        self.pool.resolve(self.player_handle)
    }

    pub fn drain_camera_events(&mut self) -> Vec<CameraEvent> {
        std::mem::take(&mut self.camera_events)
    }

    pub fn drain_audio_events(&mut self) -> Vec<AudioEvent> {
        std::mem::take(&mut self.audio_events)
    }

    pub fn camera_shake(&mut self, duration: f32, magnitude: f32) {
        self.camera_events.push(CameraEvent::Shake { duration, magnitude });
    }

    /// Queue a positional sound; pan follows the x position across the
    /// viewport, pitch gets a slight random wobble.
    pub fn play_sound_at(&mut self, sound: SoundId, volume: f32, x: f32, viewport: Rect) {
        let pan = if viewport.w > 0.0 {
            (1.0 - x / viewport.w).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let pitch = crate::remap(self.rng.gen_range(0..=4) as f32, 0.0, 4.0, 0.98, 1.01);
        self.audio_events.push(AudioEvent { sound, pan, volume, pitch });
    }

    /// Release a slot, unlinking it from its membership list first
    pub fn kill(&mut self, slot: u32) {
        let (member_of, member_node) = {
            let ent = self.pool.get(slot);
            (ent.member_of, ent.member_node)
        };
        if let (Some(list), Some(node)) = (member_of, member_node) {
            self.lists.remove(list, node);
        }
        self.pool.die(slot);
    }

    /// Run a particle recipe at an entity's position
    pub fn emit_from(&mut self, slot: u32, kind: EmitterKind) {
        let (pos, vel) = {
            let ent = self.pool.get(slot);
            (ent.pos, ent.vel)
        };
        emit(&mut self.particles, &mut self.rng, kind, pos, vel);
    }

    /*
     * spawn constructors
     */

    pub fn spawn_player(&mut self) -> u32 {
        let slot = self.pool.spawn();
        let ent = self.pool.get_mut(slot);

        ent.control = Control::Player;
        ent.kind = EntityKind::Player;
        ent.flags = EntityFlags::DYNAMICS
            | EntityFlags::APPLY_FRICTION
            | EntityFlags::HAS_SPRITE
            | EntityFlags::HAS_GUN
            | EntityFlags::RECEIVE_COLLISION
            | EntityFlags::RECEIVE_COLLISION_DAMAGE
            | EntityFlags::NOT_ON_SCREEN
            | EntityFlags::EMIT_DEATH_PARTICLES;
        ent.update_order = Order::Last;
        ent.draw_order = Order::Last;

        ent.look_dir = PLAYER_LOOK_DIR;
        ent.pos = PLAYER_INITIAL_POS;
        ent.health = PLAYER_HEALTH;
        ent.radius = PLAYER_BOUNDS_RADIUS;
        ent.friction = PLAYER_FRICTION;

        ent.sprite = Sprite::still(SpriteId::Dude);
        ent.sprite_tint = Rgba::WHITE;
        ent.sprite_scale = 1.0;

        ent.death_emitter = Some(EmitterKind::BigExplosion);

        self.player_handle = self.pool.handle(slot);
        log::info!("player spawned at {:?}", PLAYER_INITIAL_POS);
        slot
    }

    /// Invisible group anchor that dies once all of its children have
    pub fn spawn_parent(&mut self) -> u32 {
        let slot = self.pool.spawn();
        let list = self.lists.new_list();

        let ent = self.pool.get_mut(slot);
        ent.kind = EntityKind::Parent;
        ent.flags = EntityFlags::DYNAMICS
            | EntityFlags::NOT_ON_SCREEN
            | EntityFlags::DIE_IF_CHILD_LIST_EMPTY;
        ent.update_order = Order::First;
        ent.draw_order = Order::Last;
        ent.radius = 16.0;
        ent.child_list = Some(list);

        slot
    }

    fn spawn_weapon(&mut self, kind: GunKind, pos: Vec2) -> u32 {
        let slot = self.pool.spawn();
        let ent = self.pool.get_mut(slot);

        ent.kind = match kind {
            GunKind::Shotgun => EntityKind::Shotgun,
            GunKind::AssaultRifle => EntityKind::AssaultRifle,
            GunKind::GrenadeLauncher => EntityKind::GrenadeLauncher,
            GunKind::Flamethrower => EntityKind::Flamethrower,
        };
        ent.flags = EntityFlags::HAS_GUN
            | EntityFlags::APPLY_COLLISION
            | EntityFlags::IS_INTERACTABLE
            | EntityFlags::EMIT_DEATH_PARTICLES
            | EntityFlags::HAS_SPRITE;
        ent.update_order = Order::Last;
        ent.draw_order = Order::First;

        ent.pos = pos;
        ent.apply_collision_mask = KindMask::PLAYER;
        ent.interact_effect = InteractEffect::PickupWeapon;
        ent.gun = Gun::of_kind(kind);
        ent.death_emitter = Some(EmitterKind::WeaponDiePuff);

        ent.sprite = Sprite::still(weapon_sprite(kind, false));
        ent.sprite_scale = 1.0;
        ent.sprite_tint = Rgba::WHITE;

        ent.interact_radius = WEAPON_INTERACT_RADIUS;
        ent.radius = WEAPON_RADIUS;

        slot
    }

    pub fn spawn_shotgun(&mut self, pos: Vec2) -> u32 {
        self.spawn_weapon(GunKind::Shotgun, pos)
    }

    pub fn spawn_assault_rifle(&mut self, pos: Vec2) -> u32 {
        self.spawn_weapon(GunKind::AssaultRifle, pos)
    }

    /// Drops in from above the viewport at a randomized x and fall speed
    pub fn spawn_health_pack(&mut self, viewport: Rect) -> u32 {
        let slot = self.pool.spawn();

        let x = self.rng.gen_range(200.0..=(viewport.w - 200.0).max(201.0));
        let fall = self.rng.gen_range(780..=800) as f32;

        let ent = self.pool.get_mut(slot);
        ent.kind = EntityKind::HealthPack;
        ent.flags = EntityFlags::DYNAMICS
            | EntityFlags::APPLY_COLLISION
            | EntityFlags::DIE_ON_APPLY_COLLISION
            | EntityFlags::APPLY_FRICTION
            | EntityFlags::HAS_SPRITE
            | EntityFlags::EMIT_DEATH_PARTICLES;
        ent.update_order = Order::First;
        ent.draw_order = Order::First;

        ent.pos = Vec2::new(x, -0.4 * viewport.h);
        ent.vel = Vec2::new(0.0, fall);
        ent.friction = 0.45;

        ent.collide_effect = CollideEffect::HealPlayer;
        ent.apply_collision_mask = KindMask::PLAYER;
        ent.death_emitter = Some(EmitterKind::GreenPuff);

        ent.sprite = Sprite::still(SpriteId::HealthPack);
        ent.sprite_scale = 1.0;
        ent.sprite_tint = Rgba::WHITE;
        ent.radius = 40.0;

        slot
    }

    /// Melee chaser. `chase` is the steering target (normally the player);
    /// `brood` optionally enrolls the raptor in a parent's child list.
    pub fn spawn_raptor(&mut self, pos: Vec2, chase: EntityHandle, brood: Option<u32>) -> u32 {
        let slot = self.pool.spawn();
        let handle = self.pool.handle(slot);

        let member = brood.and_then(|parent| {
            let list = self.pool.get(parent).child_list?;
            Some((list, self.lists.append(list, handle)))
        });

        let ent = self.pool.get_mut(slot);
        ent.kind = EntityKind::Raptor;
        ent.control = Control::FollowParent;
        ent.flags = EntityFlags::DYNAMICS
            | EntityFlags::HAS_SPRITE
            | EntityFlags::APPLY_COLLISION
            | EntityFlags::APPLY_COLLISION_DAMAGE
            | EntityFlags::RECEIVE_COLLISION
            | EntityFlags::RECEIVE_COLLISION_DAMAGE
            | EntityFlags::DAMAGE_INCREMENTS_SCORE
            | EntityFlags::NOT_ON_SCREEN
            | EntityFlags::EMIT_DEATH_PARTICLES;
        ent.update_order = Order::Last;
        ent.draw_order = Order::Last;

        ent.pos = pos;
        ent.parent_handle = chase;
        ent.scalar_vel = RAPTOR_SPEED;
        ent.health = RAPTOR_HEALTH;
        ent.radius = RAPTOR_RADIUS;
        ent.damage_amount = RAPTOR_CONTACT_DAMAGE;
        ent.apply_collision_mask = KindMask::PLAYER;
        ent.death_emitter = Some(EmitterKind::BloodPuff);

        ent.sprite = Sprite::looping(SpriteId::Raptor, 4, 12);
        ent.sprite_scale = 1.0;
        ent.sprite_tint = Rgba::WHITE;

        if let Some((list, node)) = member {
            ent.member_of = Some(list);
            ent.member_node = Some(node);
        }

        slot
    }

    /// Waypoint patrol with a player-seeking shotgun
    pub fn spawn_boss(&mut self, pos: Vec2, route: Vec<Waypoint>) -> u32 {
        let slot = self.pool.spawn();
        let ent = self.pool.get_mut(slot);

        ent.kind = EntityKind::Boss;
        ent.control = Control::GotoWaypoint;
        ent.flags = EntityFlags::DYNAMICS
            | EntityFlags::HAS_SPRITE
            | EntityFlags::HAS_GUN
            | EntityFlags::APPLY_COLLISION
            | EntityFlags::APPLY_COLLISION_DAMAGE
            | EntityFlags::RECEIVE_COLLISION
            | EntityFlags::RECEIVE_COLLISION_DAMAGE
            | EntityFlags::DAMAGE_INCREMENTS_SCORE
            | EntityFlags::NOT_ON_SCREEN
            | EntityFlags::EMIT_DEATH_PARTICLES;
        ent.update_order = Order::Last;
        ent.draw_order = Order::Last;

        ent.pos = pos;
        ent.scalar_vel = BOSS_SPEED;
        ent.health = BOSS_HEALTH;
        ent.radius = BOSS_RADIUS;
        ent.damage_amount = BOSS_CONTACT_DAMAGE;
        ent.apply_collision_mask = KindMask::PLAYER;
        ent.death_emitter = Some(EmitterKind::MassiveBloodPuff);
        ent.look_dir = Vec2::new(0.0, 1.0);

        ent.waypoints = WaypointRoute {
            points: route,
            cursor: 0,
            action: WaypointAction::Loop,
        };

        ent.gun = Gun::of_kind(GunKind::Shotgun);
        ent.gun.flags |= GunFlags::LOOK_AT_PLAYER;
        ent.start_shooting_delay = BOSS_SHOOT_PAUSE;
        ent.shooting_pause_timer = BOSS_SHOOT_PAUSE;

        ent.sprite = Sprite::looping(SpriteId::Boss, 2, 8);
        ent.sprite_scale = 1.0;
        ent.sprite_tint = Rgba::WHITE;

        slot
    }

    /*
     * weapon interactions
     */

    /// Attach a weapon to a wielder; anything already held is dropped first
    pub fn pickup_weapon(&mut self, weapon: u32, wielder: u32) {
        if let Some(held) = self.pool.resolve(self.pool.get(wielder).child_handle) {
            self.drop_weapon(held, wielder);
        }

        let wielder_handle = self.pool.handle(wielder);
        let weapon_handle = self.pool.handle(weapon);

        let kind = match self.pool.get(weapon).gun.kind {
            Some(k) => k,
            None => return,
        };

        let ent = self.pool.get_mut(weapon);
        ent.flags.toggle(EntityFlags::IS_INTERACTABLE);
        ent.parent_handle = wielder_handle;
        ent.sprite = Sprite::still(weapon_sprite(kind, true));
        ent.control = Control::GunBeingHeld;
        ent.being_held_offset = WEAPON_HELD_OFFSET;

        self.pool.get_mut(wielder).child_handle = weapon_handle;
    }

    pub fn drop_weapon(&mut self, weapon: u32, wielder: u32) {
        let ent = self.pool.get_mut(weapon);
        ent.flags |= EntityFlags::IS_INTERACTABLE;
        ent.parent_handle = EntityHandle::NONE;
        ent.control = Control::None;
        if let Some(kind) = ent.gun.kind {
            ent.sprite = Sprite::still(weapon_sprite(kind, false));
        }

        self.pool.get_mut(wielder).child_handle = EntityHandle::NONE;
    }

    /// Hurl the held weapon as a short-lived spinning projectile dealing
    /// four times its bullet damage on contact
    pub fn throw_held_weapon(&mut self, wielder: u32) {
        let Some(held) = self.pool.resolve(self.pool.get(wielder).child_handle) else {
            return;
        };

        let look_dir = self.pool.get(wielder).look_dir;
        self.pool.get_mut(wielder).child_handle = EntityHandle::NONE;

        let ent = self.pool.get_mut(held);
        ent.flags.toggle(
            EntityFlags::DYNAMICS
                | EntityFlags::SPINNING
                | EntityFlags::APPLY_FRICTION
                | EntityFlags::APPLY_COLLISION_DAMAGE
                | EntityFlags::DIE_ON_APPLY_COLLISION
                | EntityFlags::HAS_LIFETIME
                | EntityFlags::IS_INTERACTABLE,
        );
        ent.control = Control::None;
        ent.parent_handle = EntityHandle::NONE;
        ent.vel = look_dir * THROWN_WEAPON_SPEED;
        ent.spin_vel = std::f32::consts::PI * 6.5;
        ent.friction = 1.0;
        ent.damage_amount = ent.gun.bullet_damage << 2;
        ent.life_time_duration = THROWN_WEAPON_LIFETIME;
        ent.apply_collision_mask = KindMask::RAPTOR;
    }

    /// Spawn one bullet from a gun's tuned template
    pub(crate) fn spawn_bullet(
        &mut self,
        gun: &Gun,
        pos: Vec2,
        vel: Vec2,
        look_dir: Vec2,
        look_angle: f32,
    ) -> u32 {
        let slot = self.pool.spawn();
        let ent = self.pool.get_mut(slot);

        ent.kind = gun.bullet_kind;
        ent.update_order = Order::First;
        ent.draw_order = Order::Last;
        ent.flags = crate::sim::gun::DEFAULT_BULLET_FLAGS | gun.bullet_flags;

        ent.look_dir = look_dir;
        ent.look_angle = look_angle;
        ent.pos = pos;
        ent.vel = vel;
        ent.scalar_vel = gun.bullet_vel;
        ent.friction = gun.bullet_friction;
        ent.radius = gun.bullet_radius;

        ent.apply_collision_mask = gun.bullet_collision_mask;
        ent.damage_amount = gun.bullet_damage;
        ent.spawn_emitter = gun.bullet_spawn_emitter;
        ent.death_emitter = gun.bullet_death_emitter;

        if gun.bullet_flags.contains(EntityFlags::HAS_LIFETIME) {
            ent.life_time_duration = gun.bullet_lifetime;
        }

        ent.sprite = gun.bullet_sprite;
        ent.sprite_rotation = look_angle.to_degrees();
        ent.sprite_scale = gun.bullet_sprite_scale;
        ent.sprite_tint = gun.bullet_sprite_tint;

        slot
    }
}

fn weapon_sprite(kind: GunKind, held: bool) -> SpriteId {
    match (kind, held) {
        (GunKind::Shotgun, false) => SpriteId::ShotgunSide,
        (GunKind::Shotgun, true) => SpriteId::ShotgunTop,
        (GunKind::AssaultRifle, false) => SpriteId::RifleSide,
        (GunKind::AssaultRifle, true) => SpriteId::RifleTop,
        // No art for the unimplemented kinds yet
        (GunKind::GrenadeLauncher | GunKind::Flamethrower, _) => SpriteId::None,
    }
}
