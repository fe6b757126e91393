//! Per-frame simulation pipeline and the render command pass
//!
//! Entities update in two buckets (FIRST then LAST) in pool slot order.
//! Each entity runs its control state first, then the capability flags in a
//! fixed order. That order is the contract: friction before dynamics, damage
//! settled before lifetime expiry, and DIE_NOW always last so an entity dies
//! at most once per frame no matter how many triggers raised the bit.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_FRAME_DT;
use crate::rotate_vec;
use crate::sim::entity::{
    CollideEffect, Control, EntityFlags, EntityKind, InteractEffect, KindMask, Order, Rgba,
    SpriteId, WaypointAction,
};
use crate::sim::gun::GunFlags;
use crate::sim::world::{
    InputFlags, InputSnapshot, Rect, SoundId, World, PLAYER_ACCEL, PLAYER_HEALTH,
    PLAYER_INVULN_DURATION,
};

/// One retained draw call. Produced in draw-bucket order: FIRST entities,
/// then LAST entities, then particles on top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    Disc {
        pos: Vec2,
        radius: f32,
        color: Rgba,
    },
    Sprite {
        id: SpriteId,
        frame: u32,
        pos: Vec2,
        rotation: f32,
        scale: f32,
        tint: Rgba,
    },
    Quad {
        pos: Vec2,
        half_extent: f32,
        tint: Rgba,
    },
}

impl World {
    /// Advance the simulation one frame. `dt` is clamped to [0, 1/10] s so a
    /// long frame spike cannot tunnel the discrete collision test.
    pub fn step(&mut self, dt: f32, input: InputSnapshot, viewport: Rect) {
        let dt = dt.clamp(0.0, MAX_FRAME_DT);

        if self.player_handle.is_set() && self.player_slot().is_none() && !self.game_over {
            log::info!("player died, game over at frame {}", self.frame_index);
            self.game_over = true;
        }

        self.live_entities = 0;
        self.live_enemies = 0;

        for order in [Order::First, Order::Last] {
            for slot in 0..self.pool.allocated() as u32 {
                let ent = self.pool.get(slot);
                if !ent.live || ent.update_order != order {
                    continue;
                }

                self.live_entities += 1;
                if KindMask::ENEMIES.contains(ent.kind) {
                    self.live_enemies += 1;
                }

                self.update_entity(slot, dt, input, viewport);
            }
        }

        self.particles.update(dt, viewport);
        self.frame_index += 1;
    }

    fn update_entity(&mut self, slot: u32, dt: f32, input: InputSnapshot, viewport: Rect) {
        let (is_on_screen, is_fully_on_screen) = {
            let ent = self.pool.get(slot);
            (
                viewport.circle_overlaps(ent.pos, ent.radius),
                viewport.circle_inside(ent.pos, ent.radius),
            )
        };

        let mut applied_collision = false;

        match self.pool.get(slot).control {
            Control::None => {}
            Control::Player => self.control_player(slot, dt, input, viewport),
            Control::GunBeingHeld => {
                let parent = self.require_parent(slot);
                let (p_pos, p_look_dir, p_look_angle, p_sprite_rotation) = {
                    let p = self.pool.get(parent);
                    (p.pos, p.look_dir, p.look_angle, p.sprite_rotation)
                };

                let ent = self.pool.get_mut(slot);
                ent.look_dir = p_look_dir;
                ent.look_angle = p_look_angle;
                ent.sprite_rotation = p_sprite_rotation;
                ent.pos = p_pos + rotate_vec(ent.being_held_offset, p_look_angle);
            }
            Control::CopyParent => {
                let parent = self.require_parent(slot);
                let p_vel = self.pool.get(parent).vel;
                self.pool.get_mut(slot).vel = p_vel;
            }
            Control::FollowParent => {
                let parent = self.require_parent(slot);
                let p_pos = self.pool.get(parent).pos;
                let ent = self.pool.get_mut(slot);
                let dir = (p_pos - ent.pos).normalize_or_zero();
                ent.vel = dir * ent.scalar_vel;
            }
            Control::GotoWaypoint => {
                let ent = self.pool.get(slot);
                assert!(
                    !ent.waypoints.points.is_empty(),
                    "waypoint control with empty route"
                );
                let wp = ent.waypoints.points[ent.waypoints.cursor];
                let at_last = ent.waypoints.cursor + 1 >= ent.waypoints.points.len();
                let action = ent.waypoints.action;

                let dir = wp.pos - ent.pos;
                let dist_sqr = dir.length_squared();

                if dist_sqr < wp.radius * wp.radius {
                    let ent = self.pool.get_mut(slot);
                    if at_last {
                        match action {
                            WaypointAction::Hold => {}
                            WaypointAction::Loop => ent.waypoints.cursor = 0,
                            WaypointAction::Die => ent.flags |= EntityFlags::DIE_NOW,
                        }
                    } else {
                        ent.waypoints.cursor += 1;
                    }
                } else {
                    let scalar_vel = ent.scalar_vel;
                    self.pool.get_mut(slot).vel = dir * (scalar_vel / dist_sqr.sqrt());
                }
            }
        }

        /* capability flags, fixed order */

        if self.flag(slot, EntityFlags::APPLY_FRICTION) {
            let ent = self.pool.get_mut(slot);
            ent.vel -= ent.vel * ent.friction * dt;
        }

        if self.flag(slot, EntityFlags::DYNAMICS) {
            let ent = self.pool.get_mut(slot);
            let a_t = ent.accel * dt;
            ent.vel += a_t;
            ent.pos += ent.vel * dt + a_t * (0.5 * dt);
        }

        if self.flag(slot, EntityFlags::SPINNING) {
            let ent = self.pool.get_mut(slot);
            ent.look_angle += ent.spin_vel * dt;
        }

        if self.flag(slot, EntityFlags::HAS_GUN) && !self.game_over {
            self.fire_gun(slot, dt, viewport);
        }

        if self.flag(slot, EntityFlags::INTERACT) {
            self.pool.get_mut(slot).flags.remove(EntityFlags::INTERACT);
            self.run_interact_scan(slot);
        }

        if self.flag(slot, EntityFlags::APPLY_COLLISION) {
            applied_collision = self.run_collision_scan(slot, viewport);
        }

        if self.flag(slot, EntityFlags::DIE_IF_CHILD_LIST_EMPTY) {
            let list = self
                .pool
                .get(slot)
                .child_list
                .expect("DIE_IF_CHILD_LIST_EMPTY without a child list");
            if self.lists.count(list) <= 0 {
                self.pool.get_mut(slot).flags |= EntityFlags::DIE_NOW;
            }
        }

        if self.flag(slot, EntityFlags::DIE_ON_APPLY_COLLISION) && applied_collision {
            self.pool.get_mut(slot).flags |= EntityFlags::DIE_NOW;
        }

        if self.flag(slot, EntityFlags::APPLY_EFFECT_TINT) {
            let ent = self.pool.get_mut(slot);
            if ent.effect_tint_timer < 0.0 {
                ent.effect_tint_timer = 0.0;
                ent.flags.remove(EntityFlags::APPLY_EFFECT_TINT);
            } else {
                ent.effect_tint_timer -= ent.effect_tint_timer_vel * dt;
            }
        }

        if self.flag(slot, EntityFlags::RECEIVE_COLLISION) {
            self.settle_received_collision(slot, is_fully_on_screen, viewport);
        }

        if self.flag(slot, EntityFlags::HAS_SPRITE) {
            let ent = self.pool.get_mut(slot);
            ent.sprite_rotation = ent.look_angle.to_degrees();
            ent.sprite.tick();
        }

        if self.flag(slot, EntityFlags::NOT_ON_SCREEN) && is_on_screen {
            self.pool
                .get_mut(slot)
                .flags
                .toggle(EntityFlags::NOT_ON_SCREEN | EntityFlags::ON_SCREEN);
        }

        if self.flag(slot, EntityFlags::HAS_LIFETIME) {
            let ent = self.pool.get_mut(slot);
            debug_assert!(ent.life_time_duration > 0.0);
            if ent.life_timer >= ent.life_time_duration {
                ent.life_timer = 0.0;
                ent.flags |= EntityFlags::DIE_NOW;
            } else {
                ent.life_timer += dt;
            }
        }

        if self.flag(slot, EntityFlags::EMIT_SPAWN_PARTICLES) {
            self.pool
                .get_mut(slot)
                .flags
                .remove(EntityFlags::EMIT_SPAWN_PARTICLES);
            if is_on_screen {
                if let Some(kind) = self.pool.get(slot).spawn_emitter {
                    self.emit_from(slot, kind);
                }
            }
        }

        if self.flag(slot, EntityFlags::DIE_NOW) {
            if is_on_screen && self.flag(slot, EntityFlags::EMIT_DEATH_PARTICLES) {
                if let Some(kind) = self.pool.get(slot).death_emitter {
                    self.emit_from(slot, kind);
                }
            }
            self.kill(slot);
        }
    }

    #[inline]
    fn flag(&self, slot: u32, flag: EntityFlags) -> bool {
        self.pool.get(slot).flags.contains(flag)
    }

    /// Parent-relative control states treat a dangling parent as a bug
    fn require_parent(&self, slot: u32) -> u32 {
        let ent = self.pool.get(slot);
        match self.pool.resolve(ent.parent_handle) {
            Some(parent) => parent,
            None => panic!(
                "entity uid {} ({:?}): dangling parent handle in {:?}",
                ent.uid, ent.kind, ent.control
            ),
        }
    }

    fn control_player(&mut self, slot: u32, dt: f32, input: InputSnapshot, viewport: Rect) {
        let invincible = self.debug_invincible;
        {
            let ent = self.pool.get_mut(slot);

            // Mouse look relative to the viewport center
            let look = input.aim - viewport.center();
            let len = look.length();
            if len > 0.001 {
                let look_dir = look / len;
                ent.look_dir = look_dir;
                ent.look_angle = -look_dir.x.atan2(look_dir.y);
                ent.sprite_rotation = ent.look_angle.to_degrees();
            }

            ent.accel = Vec2::ZERO;
            if input.flags.intersects(InputFlags::MOVE) {
                if input.flags.contains(InputFlags::MOVE_LEFT) {
                    ent.accel.x = -1.0;
                }
                if input.flags.contains(InputFlags::MOVE_RIGHT) {
                    ent.accel.x += 1.0;
                }
                if input.flags.contains(InputFlags::MOVE_FORWARD) {
                    ent.accel.y = -1.0;
                }
                if input.flags.contains(InputFlags::MOVE_BACKWARD) {
                    ent.accel.y += 1.0;
                }
                ent.accel = ent.accel.normalize_or_zero() * PLAYER_ACCEL;
            } else {
                // Stop dead; no drift while idle
                ent.vel = Vec2::ZERO;
            }

            if invincible {
                ent.health = PLAYER_HEALTH;
                ent.received_damage = 0;
            }

            if ent.received_damage > 0 {
                ent.effect_tint = Rgba::BLOOD;

                if ent.invulnerability_timer > 0.0 {
                    // Refund the hit; the window absorbs it
                    ent.health += ent.received_damage;
                } else {
                    ent.invulnerability_timer = PLAYER_INVULN_DURATION;
                }
            }

            if ent.invulnerability_timer != 0.0 {
                if ent.invulnerability_timer > 0.0 {
                    ent.invulnerability_timer -= dt;

                    // Re-arm the hurt flash for the whole window
                    if ent.effect_tint_timer <= 0.0 {
                        ent.flags |= EntityFlags::APPLY_EFFECT_TINT;
                        ent.effect_tint_duration = 0.1;
                        ent.effect_tint_timer_vel = 1.0;
                        ent.effect_tint_timer = ent.effect_tint_duration;
                    }
                } else {
                    ent.invulnerability_timer = 0.0;
                    ent.effect_tint = Rgba::BLANK;
                }
            }
        }

        // Forward the fire trigger to the held weapon
        let child = self.pool.get(slot).child_handle;
        if let Some(gun_slot) = self.pool.resolve(child) {
            let automatic = self
                .pool
                .get(gun_slot)
                .gun
                .flags
                .contains(GunFlags::AUTOMATIC);
            let pulled = if automatic {
                input.flags.contains(InputFlags::SHOOT_HOLD)
            } else {
                input.flags.contains(InputFlags::SHOOT)
            };
            if pulled {
                self.pool.get_mut(gun_slot).gun.shots = 1;
            }
        }

        if input.flags.contains(InputFlags::INTERACT) {
            self.pool.get_mut(slot).flags |= EntityFlags::INTERACT;
        }

        if input.flags.contains(InputFlags::THROW) {
            self.throw_held_weapon(slot);
        }
    }

    fn fire_gun(&mut self, slot: u32, dt: f32, viewport: Rect) {
        // Player-seeking gunners aim and trigger themselves
        if self.pool.get(slot).gun.flags.contains(GunFlags::LOOK_AT_PLAYER) {
            if let Some(player) = self.player_slot() {
                let target = self.pool.get(player).pos;
                let ent = self.pool.get_mut(slot);
                let aim = (target - ent.pos).normalize_or_zero();
                if aim != Vec2::ZERO {
                    ent.look_dir = aim;
                    ent.look_angle = -aim.x.atan2(aim.y);
                }

                if ent.shooting_pause_timer <= 0.0 {
                    ent.gun.shots = 1;
                    ent.shooting_pause_timer = ent.start_shooting_delay;
                } else {
                    ent.shooting_pause_timer -= dt;
                }
            }
        }

        {
            let radius = self.pool.get(slot).radius;
            self.pool.get_mut(slot).gun.cock(radius);
        }

        if !self.pool.get_mut(slot).gun.advance_trigger(dt) {
            return;
        }

        let (gun, pos, look_dir, look_angle) = {
            let ent = self.pool.get(slot);
            (ent.gun.clone(), ent.pos, ent.look_dir, ent.look_angle)
        };

        for shot in gun.volley(pos, look_dir) {
            self.spawn_bullet(&gun, shot.pos, shot.vel, look_dir, look_angle);
        }

        self.camera_shake(gun.shake_duration, gun.shake_magnitude);
        if let Some(sound) = gun.sound {
            self.play_sound_at(sound, 0.2, pos.x, viewport);
        }
    }

    /// One-shot scan for something interactable under the entity's position
    fn run_interact_scan(&mut self, slot: u32) {
        let pos = self.pool.get(slot).pos;

        for other in 0..self.pool.allocated() as u32 {
            if other == slot {
                continue;
            }
            let target = self.pool.get(other);
            if !target.live || !target.flags.contains(EntityFlags::IS_INTERACTABLE) {
                continue;
            }

            let r = target.interact_radius;
            if (target.pos - pos).length_squared() < r * r {
                match target.interact_effect {
                    InteractEffect::None => {}
                    InteractEffect::PickupWeapon => self.pickup_weapon(other, slot),
                }
                break;
            }
        }
    }

    /// Push this entity's collision onto every target in its mask. Targets
    /// only accumulate; they settle damage themselves in their own update.
    fn run_collision_scan(&mut self, slot: u32, viewport: Rect) -> bool {
        let (pos, radius, mask, damage, flags, effect) = {
            let ent = self.pool.get(slot);
            (
                ent.pos,
                ent.radius,
                ent.apply_collision_mask,
                ent.damage_amount,
                ent.flags,
                ent.collide_effect,
            )
        };

        let mut applied = false;

        for other in 0..self.pool.allocated() as u32 {
            if other == slot {
                continue;
            }
            let target = self.pool.get(other);
            if !target.live || !mask.contains(target.kind) {
                continue;
            }

            let min_dist = radius + target.radius;
            if (target.pos - pos).length_squared() >= min_dist * min_dist {
                continue;
            }

            applied = true;
            self.pool.get_mut(other).received_collision = true;

            match effect {
                CollideEffect::None => {}
                CollideEffect::HealPlayer => self.heal_on_touch(other, pos, viewport),
            }

            if flags.contains(EntityFlags::APPLY_COLLISION_DAMAGE) {
                self.pool.get_mut(other).received_damage += damage;
            }
        }

        applied
    }

    fn heal_on_touch(&mut self, target: u32, source_pos: Vec2, viewport: Rect) {
        let ent = self.pool.get_mut(target);
        ent.health = (ent.health + 5).min(PLAYER_HEALTH);

        ent.effect_tint = Rgba::GREEN;
        ent.flags |= EntityFlags::APPLY_EFFECT_TINT;
        ent.effect_tint_duration = 0.7;
        ent.effect_tint_timer_vel = 1.0;
        ent.effect_tint_timer = ent.effect_tint_duration;

        self.play_sound_at(SoundId::HealthPickup, 0.3, source_pos.x, viewport);
    }

    /// Settle accumulated collision state. Entities not fully inside the
    /// viewport discard their accumulated damage; partially visible things
    /// cannot be hurt.
    fn settle_received_collision(&mut self, slot: u32, is_fully_on_screen: bool, viewport: Rect) {
        if !is_fully_on_screen {
            let ent = self.pool.get_mut(slot);
            ent.received_collision = false;
            ent.received_damage = 0;
            return;
        }

        if !self.pool.get(slot).received_collision {
            return;
        }
        self.pool.get_mut(slot).received_collision = false;

        if !self.flag(slot, EntityFlags::RECEIVE_COLLISION_DAMAGE) {
            return;
        }

        let (damage, kind, x) = {
            let ent = self.pool.get(slot);
            (ent.received_damage, ent.kind, ent.pos.x)
        };

        if damage > 0 {
            let (sound, volume) = if kind == EntityKind::Player {
                (SoundId::PlayerHurt, 0.17)
            } else {
                (SoundId::MonsterHurt, 0.5)
            };
            self.play_sound_at(sound, volume, x, viewport);
        }

        let score_it = self.flag(slot, EntityFlags::DAMAGE_INCREMENTS_SCORE);
        if score_it {
            self.score += damage;
        }

        let ent = self.pool.get_mut(slot);
        ent.health -= damage;
        ent.received_damage = 0;

        if kind != EntityKind::Player {
            ent.flags |= EntityFlags::APPLY_EFFECT_TINT;
            ent.effect_tint = Rgba::BLOOD;
            if ent.effect_tint_duration == 0.0 {
                ent.effect_tint_duration = 0.02;
            }
            if ent.effect_tint_timer_vel == 0.0 {
                ent.effect_tint_timer_vel = 1.0;
            }
            ent.effect_tint_timer = ent.effect_tint_duration;
        }

        if ent.health <= 0 {
            ent.flags |= EntityFlags::DIE_NOW;
        }
    }

    /// Build this frame's draw list: FIRST bucket, LAST bucket, particles
    pub fn render_commands(&self) -> Vec<RenderCommand> {
        let mut out = Vec::new();

        for order in [Order::First, Order::Last] {
            for slot in 0..self.pool.allocated() as u32 {
                let ent = self.pool.get(slot);
                if !ent.live || ent.draw_order != order {
                    continue;
                }

                if ent.flags.contains(EntityFlags::FILL_BOUNDS) {
                    out.push(RenderCommand::Disc {
                        pos: ent.pos,
                        radius: ent.radius,
                        color: ent.fill_color,
                    });
                }

                if ent.flags.contains(EntityFlags::HAS_SPRITE) {
                    let tint = if ent.flags.contains(EntityFlags::APPLY_EFFECT_TINT)
                        && ent.effect_tint_duration > 0.0
                    {
                        ent.sprite_tint.lerp(
                            ent.effect_tint,
                            ent.effect_tint_timer / ent.effect_tint_duration,
                        )
                    } else {
                        ent.sprite_tint
                    };

                    out.push(RenderCommand::Sprite {
                        id: ent.sprite.id,
                        frame: ent.sprite.display_frame(),
                        pos: ent.pos,
                        rotation: ent.sprite_rotation,
                        scale: ent.sprite_scale,
                        tint,
                    });
                }
            }
        }

        for p in self.particles.iter_live() {
            out.push(RenderCommand::Quad {
                pos: p.pos,
                half_extent: p.radius,
                tint: p.tint(),
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::FRAME_DT;
    use crate::sim::entity::Waypoint;
    use crate::sim::world::CameraEvent;

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 800.0)
    }

    fn step(world: &mut World) {
        world.step(FRAME_DT, InputSnapshot::default(), viewport());
    }

    /// Bare flag-driven entity for physics tests
    fn spawn_mover(world: &mut World, flags: EntityFlags) -> u32 {
        let slot = world.pool.spawn();
        let ent = world.pool.get_mut(slot);
        ent.flags = flags;
        ent.pos = Vec2::new(500.0, 400.0);
        slot
    }

    #[test]
    fn test_friction_scales_velocity_exactly() {
        let mut world = World::new(1);
        let slot = spawn_mover(&mut world, EntityFlags::APPLY_FRICTION);
        world.pool.get_mut(slot).vel = Vec2::new(200.0, -100.0);
        world.pool.get_mut(slot).friction = 3.0;

        let dt = 0.05;
        world.step(dt, InputSnapshot::default(), viewport());

        let expect = Vec2::new(200.0, -100.0) * (1.0 - 3.0 * dt);
        let vel = world.pool.get(slot).vel;
        assert!((vel - expect).length() < 1e-4, "{vel:?} != {expect:?}");
    }

    #[test]
    fn test_dynamics_integration_formula() {
        let mut world = World::new(1);
        let slot = spawn_mover(&mut world, EntityFlags::DYNAMICS);
        let ent = world.pool.get_mut(slot);
        ent.vel = Vec2::new(10.0, 0.0);
        ent.accel = Vec2::new(100.0, 0.0);
        let p0 = ent.pos;

        let dt = 0.05;
        world.step(dt, InputSnapshot::default(), viewport());

        let a_t = 100.0 * dt;
        let v1 = 10.0 + a_t;
        let expect_x = p0.x + v1 * dt + a_t * 0.5 * dt;
        let ent = world.pool.get(slot);
        assert!((ent.vel.x - v1).abs() < 1e-4);
        assert!((ent.pos.x - expect_x).abs() < 1e-4);
    }

    #[test]
    fn test_dt_clamped_to_max_step() {
        let mut world = World::new(1);
        let slot = spawn_mover(&mut world, EntityFlags::DYNAMICS);
        world.pool.get_mut(slot).vel = Vec2::new(100.0, 0.0);
        let x0 = world.pool.get(slot).pos.x;

        // A two-second frame spike advances at most 1/10 s of motion
        world.step(2.0, InputSnapshot::default(), viewport());
        let moved = world.pool.get(slot).pos.x - x0;
        assert!((moved - 100.0 * MAX_FRAME_DT).abs() < 1e-4);
    }

    #[test]
    fn test_collision_damage_is_one_directional() {
        let mut world = World::new(1);

        let bullet = spawn_mover(
            &mut world,
            EntityFlags::APPLY_COLLISION | EntityFlags::APPLY_COLLISION_DAMAGE,
        );
        {
            let ent = world.pool.get_mut(bullet);
            ent.radius = 3.0;
            ent.damage_amount = 3;
            ent.apply_collision_mask = KindMask::RAPTOR;
            ent.health = 1;
        }

        let raptor = spawn_mover(
            &mut world,
            EntityFlags::RECEIVE_COLLISION | EntityFlags::RECEIVE_COLLISION_DAMAGE,
        );
        {
            let ent = world.pool.get_mut(raptor);
            ent.kind = EntityKind::Raptor;
            ent.radius = 10.0;
            ent.health = 10;
            ent.pos = Vec2::new(505.0, 400.0);
        }

        step(&mut world);

        // Toucher is unharmed, target settled the damage and flashes red
        assert_eq!(world.pool.get(bullet).health, 1);
        let r = world.pool.get(raptor);
        assert_eq!(r.health, 7);
        assert_eq!(r.received_damage, 0);
        assert!(r.flags.contains(EntityFlags::APPLY_EFFECT_TINT));
        assert_eq!(r.effect_tint, Rgba::BLOOD);
    }

    #[test]
    fn test_damage_discarded_while_not_fully_on_screen() {
        let mut world = World::new(1);

        let bullet = spawn_mover(
            &mut world,
            EntityFlags::APPLY_COLLISION | EntityFlags::APPLY_COLLISION_DAMAGE,
        );
        {
            let ent = world.pool.get_mut(bullet);
            ent.radius = 3.0;
            ent.damage_amount = 5;
            ent.apply_collision_mask = KindMask::RAPTOR;
            ent.pos = Vec2::new(5.0, 400.0);
        }

        let raptor = spawn_mover(
            &mut world,
            EntityFlags::RECEIVE_COLLISION | EntityFlags::RECEIVE_COLLISION_DAMAGE,
        );
        {
            let ent = world.pool.get_mut(raptor);
            ent.kind = EntityKind::Raptor;
            ent.radius = 10.0;
            ent.health = 10;
            // Straddles the left edge: overlapping but not fully inside
            ent.pos = Vec2::new(6.0, 400.0);
        }

        step(&mut world);

        let r = world.pool.get(raptor);
        assert_eq!(r.health, 10);
        assert_eq!(r.received_damage, 0);
        assert!(!r.received_collision);
    }

    #[test]
    fn test_double_death_trigger_frees_slot_once() {
        let mut world = World::new(1);

        // Expired lifetime AND lethal collision in the same frame
        let wall = spawn_mover(&mut world, EntityFlags::empty());
        world.pool.get_mut(wall).kind = EntityKind::Raptor;
        world.pool.get_mut(wall).radius = 10.0;

        let victim = spawn_mover(
            &mut world,
            EntityFlags::APPLY_COLLISION
                | EntityFlags::DIE_ON_APPLY_COLLISION
                | EntityFlags::HAS_LIFETIME,
        );
        {
            let ent = world.pool.get_mut(victim);
            ent.radius = 5.0;
            ent.apply_collision_mask = KindMask::RAPTOR;
            ent.life_time_duration = 0.001;
            ent.life_timer = 1.0;
        }

        step(&mut world);
        assert!(!world.pool.get(victim).live);

        // A corrupted free list would hand the same slot out twice
        let a = world.pool.spawn();
        let b = world.pool.spawn();
        assert_ne!(a, b);
        assert_eq!(a, victim);
    }

    #[test]
    fn test_parent_dies_when_brood_wiped() {
        let mut world = World::new(1);
        let player = world.spawn_player();
        let chase = world.pool.handle(player);

        let parent = world.spawn_parent();
        let raptor = world.spawn_raptor(Vec2::new(300.0, 300.0), chase, Some(parent));

        step(&mut world);
        assert!(world.pool.get(parent).live);

        world.kill(raptor);
        step(&mut world);
        assert!(!world.pool.get(parent).live);
    }

    #[test]
    fn test_lifetime_expires_after_duration() {
        let mut world = World::new(1);
        let slot = spawn_mover(&mut world, EntityFlags::HAS_LIFETIME);
        world.pool.get_mut(slot).life_time_duration = FRAME_DT * 2.5;

        step(&mut world);
        step(&mut world);
        step(&mut world);
        assert!(world.pool.get(slot).live);
        step(&mut world);
        assert!(!world.pool.get(slot).live);
    }

    #[test]
    fn test_on_screen_flip_happens_once() {
        let mut world = World::new(1);
        let slot = spawn_mover(&mut world, EntityFlags::NOT_ON_SCREEN);
        world.pool.get_mut(slot).pos = Vec2::new(-100.0, 400.0);
        world.pool.get_mut(slot).radius = 5.0;

        step(&mut world);
        assert!(world.pool.get(slot).flags.contains(EntityFlags::NOT_ON_SCREEN));

        world.pool.get_mut(slot).pos = Vec2::new(500.0, 400.0);
        step(&mut world);
        let flags = world.pool.get(slot).flags;
        assert!(!flags.contains(EntityFlags::NOT_ON_SCREEN));
        assert!(flags.contains(EntityFlags::ON_SCREEN));

        // Leaving the screen again does not flip back
        world.pool.get_mut(slot).pos = Vec2::new(-100.0, 400.0);
        step(&mut world);
        assert!(world.pool.get(slot).flags.contains(EntityFlags::ON_SCREEN));
    }

    #[test]
    fn test_spawn_particles_emit_once_on_screen() {
        let mut world = World::new(1);
        let slot = spawn_mover(&mut world, EntityFlags::EMIT_SPAWN_PARTICLES);
        world.pool.get_mut(slot).spawn_emitter = Some(crate::sim::particle::EmitterKind::WhitePuff);
        world.pool.get_mut(slot).radius = 5.0;

        step(&mut world);
        let emitted = world.particles.cursor();
        assert!(emitted >= 100);
        assert!(!world.pool.get(slot).flags.contains(EntityFlags::EMIT_SPAWN_PARTICLES));

        step(&mut world);
        assert_eq!(world.particles.cursor(), emitted);
    }

    #[test]
    fn test_shotgun_fires_six_bullets_through_pipeline() {
        let mut world = World::new(1);
        let player = world.spawn_player();
        let shotgun = world.spawn_shotgun(Vec2::new(520.0, 400.0));
        world.pickup_weapon(shotgun, player);
        world.pool.get_mut(player).pos = Vec2::new(500.0, 400.0);

        let before = world.pool.allocated();
        let input = InputSnapshot {
            flags: InputFlags::SHOOT,
            aim: Vec2::new(500.0, 0.0),
        };
        world.step(FRAME_DT, input, viewport());

        assert_eq!(world.pool.allocated() - before, 6);
        assert!(matches!(
            world.drain_camera_events().as_slice(),
            [CameraEvent::Shake { .. }]
        ));
        assert!(!world.drain_audio_events().is_empty());

        // Cooldown: holding the trigger next frame adds nothing
        let before = world.pool.allocated();
        world.step(FRAME_DT, input, viewport());
        assert_eq!(world.pool.allocated(), before);
    }

    #[test]
    fn test_no_fire_after_game_over() {
        let mut world = World::new(1);
        let player = world.spawn_player();
        let shotgun = world.spawn_shotgun(Vec2::new(520.0, 400.0));
        world.pickup_weapon(shotgun, player);
        world.game_over = true;

        let before = world.pool.allocated();
        let input = InputSnapshot {
            flags: InputFlags::SHOOT,
            aim: Vec2::new(500.0, 0.0),
        };
        world.step(FRAME_DT, input, viewport());
        assert_eq!(world.pool.allocated(), before);
    }

    #[test]
    fn test_player_invulnerability_refunds_damage() {
        let mut world = World::new(1);
        let player = world.spawn_player();
        world.pool.get_mut(player).pos = Vec2::new(500.0, 400.0);

        let spike = spawn_mover(
            &mut world,
            EntityFlags::APPLY_COLLISION | EntityFlags::APPLY_COLLISION_DAMAGE,
        );
        {
            let ent = world.pool.get_mut(spike);
            // Spikes update FIRST so the hit lands before the player settles
            ent.update_order = Order::First;
            ent.radius = 5.0;
            ent.damage_amount = 2;
            ent.apply_collision_mask = KindMask::PLAYER;
            ent.pos = Vec2::new(505.0, 400.0);
        }

        step(&mut world);
        let p = world.pool.get(player);
        assert_eq!(p.health, PLAYER_HEALTH - 2);
        assert!(p.invulnerability_timer > 0.0);

        // Second hit inside the window is refunded before settling
        step(&mut world);
        assert_eq!(world.pool.get(player).health, PLAYER_HEALTH - 2);
    }

    #[test]
    fn test_debug_invincibility_absorbs_all_damage() {
        let mut world = World::new(1);
        world.debug_invincible = true;
        let player = world.spawn_player();
        world.pool.get_mut(player).pos = Vec2::new(500.0, 400.0);

        let spike = spawn_mover(
            &mut world,
            EntityFlags::APPLY_COLLISION | EntityFlags::APPLY_COLLISION_DAMAGE,
        );
        {
            let ent = world.pool.get_mut(spike);
            ent.update_order = Order::First;
            ent.radius = 5.0;
            ent.damage_amount = 50;
            ent.apply_collision_mask = KindMask::PLAYER;
            ent.pos = Vec2::new(505.0, 400.0);
        }

        for _ in 0..5 {
            step(&mut world);
        }

        let p = world.pool.get(player);
        assert!(p.live);
        assert_eq!(p.health, PLAYER_HEALTH);
        assert_eq!(p.received_damage, 0);
        // Damage never settles, so the hurt window never opens
        assert_eq!(p.invulnerability_timer, 0.0);
        assert!(!world.game_over);
    }

    #[test]
    fn test_player_death_sets_game_over_next_frame() {
        let mut world = World::new(1);
        let player = world.spawn_player();
        world.pool.get_mut(player).pos = Vec2::new(500.0, 400.0);
        world.pool.get_mut(player).health = 1;

        let spike = spawn_mover(
            &mut world,
            EntityFlags::APPLY_COLLISION | EntityFlags::APPLY_COLLISION_DAMAGE,
        );
        {
            let ent = world.pool.get_mut(spike);
            ent.update_order = Order::First;
            ent.radius = 5.0;
            ent.damage_amount = 50;
            ent.apply_collision_mask = KindMask::PLAYER;
            ent.pos = Vec2::new(505.0, 400.0);
        }

        // The first hit is settled in full; the invulnerability window only
        // refunds hits that land after it opened
        step(&mut world);
        assert!(!world.pool.get(player).live);
        assert!(!world.game_over);

        // The stale handle stops resolving, flagging game over next frame
        step(&mut world);
        assert!(world.game_over);
    }

    #[test]
    fn test_waypoint_route_advances_and_dies_at_end() {
        let mut world = World::new(1);
        let slot = spawn_mover(&mut world, EntityFlags::DYNAMICS);
        {
            let ent = world.pool.get_mut(slot);
            ent.control = Control::GotoWaypoint;
            ent.scalar_vel = 100.0;
            ent.pos = Vec2::new(500.0, 400.0);
            ent.waypoints.points = vec![
                Waypoint { pos: Vec2::new(500.0, 400.0), radius: 10.0 },
                Waypoint { pos: Vec2::new(600.0, 400.0), radius: 10.0 },
            ];
            ent.waypoints.action = WaypointAction::Die;
        }

        // Already inside the first waypoint: cursor advances
        step(&mut world);
        assert_eq!(world.pool.get(slot).waypoints.cursor, 1);

        // Steers toward the second waypoint at scalar_vel
        step(&mut world);
        let ent = world.pool.get(slot);
        assert!(ent.vel.x > 99.0);
        assert!(ent.vel.y.abs() < 1e-3);

        // Teleport onto the last waypoint: terminal action fires
        world.pool.get_mut(slot).pos = Vec2::new(600.0, 400.0);
        step(&mut world);
        assert!(!world.pool.get(slot).live);
    }

    #[test]
    fn test_copy_parent_mirrors_velocity() {
        let mut world = World::new(1);
        let parent = spawn_mover(&mut world, EntityFlags::DYNAMICS);
        world.pool.get_mut(parent).vel = Vec2::new(33.0, -7.0);

        let shadow = spawn_mover(&mut world, EntityFlags::DYNAMICS);
        world.pool.get_mut(shadow).control = Control::CopyParent;
        world.pool.get_mut(shadow).parent_handle = world.pool.handle(parent);

        step(&mut world);
        assert_eq!(world.pool.get(shadow).vel, Vec2::new(33.0, -7.0));
    }

    #[test]
    fn test_interact_input_picks_up_nearby_weapon() {
        let mut world = World::new(1);
        let player = world.spawn_player();
        world.pool.get_mut(player).pos = Vec2::new(500.0, 400.0);
        // Inside the weapon's interact radius, outside its bounds
        let shotgun = world.spawn_shotgun(Vec2::new(530.0, 400.0));

        let input = InputSnapshot {
            flags: InputFlags::INTERACT,
            aim: Vec2::new(500.0, 0.0),
        };
        world.step(FRAME_DT, input, viewport());

        assert_eq!(
            world.pool.resolve(world.pool.get(player).child_handle),
            Some(shotgun)
        );
        assert_eq!(world.pool.get(shotgun).control, Control::GunBeingHeld);
    }

    #[test]
    #[should_panic(expected = "dangling parent handle")]
    fn test_dangling_parent_is_fatal() {
        let mut world = World::new(1);
        let parent = spawn_mover(&mut world, EntityFlags::empty());
        let handle = world.pool.handle(parent);
        world.kill(parent);

        let orphan = spawn_mover(&mut world, EntityFlags::empty());
        world.pool.get_mut(orphan).control = Control::FollowParent;
        world.pool.get_mut(orphan).parent_handle = handle;

        step(&mut world);
    }

    #[test]
    fn test_render_draw_buckets_order() {
        let mut world = World::new(1);

        let late = spawn_mover(&mut world, EntityFlags::FILL_BOUNDS);
        world.pool.get_mut(late).draw_order = Order::Last;
        world.pool.get_mut(late).fill_color = Rgba::RED;

        let early = spawn_mover(&mut world, EntityFlags::FILL_BOUNDS);
        world.pool.get_mut(early).draw_order = Order::First;
        world.pool.get_mut(early).fill_color = Rgba::GREEN;

        let cmds = world.render_commands();
        assert_eq!(cmds.len(), 2);
        assert!(matches!(cmds[0], RenderCommand::Disc { color: Rgba::GREEN, .. }));
        assert!(matches!(cmds[1], RenderCommand::Disc { color: Rgba::RED, .. }));
    }

    #[test]
    fn test_deterministic_replay() {
        let run = |seed: u64| {
            let mut world = World::new(seed);
            let player = world.spawn_player();
            let shotgun = world.spawn_shotgun(Vec2::new(520.0, 400.0));
            world.pickup_weapon(shotgun, player);
            world.spawn_raptor(
                Vec2::new(100.0, 100.0),
                world.pool.handle(player),
                None,
            );
            world.spawn_health_pack(viewport());

            for frame in 0..120 {
                let mut input = InputSnapshot {
                    flags: InputFlags::MOVE_RIGHT,
                    aim: Vec2::new(900.0, 100.0),
                };
                if frame % 30 == 0 {
                    input.flags |= InputFlags::SHOOT;
                }
                world.step(FRAME_DT, input, viewport());
            }

            let player_pos = world.player_slot().map(|s| world.pool.get(s).pos);
            (world.stats().live_entities, world.score, player_pos)
        };

        assert_eq!(run(42), run(42));
    }
}
