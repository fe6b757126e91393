//! Particle ring buffer and emitter recipes
//!
//! Particles are fire-and-forget squares living in a fixed ring. Emission
//! writes at a monotone cursor that wraps to zero; when the ring is full the
//! oldest particles are simply overwritten. Nothing is reported on overflow.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::{FRAME_DT, MAX_PARTICLES};
use crate::sim::entity::Rgba;
use crate::sim::world::Rect;
use crate::{remap, rotate_vec};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Particle {
    /// Seconds lived so far; dead once this reaches `lifetime`
    pub live: f32,
    pub lifetime: f32,

    pub pos: Vec2,
    pub vel: Vec2,
    /// Half-extent of the drawn square
    pub radius: f32,
    pub shrink: f32,
    pub friction: f32,
    pub begin_tint: Rgba,
    pub end_tint: Rgba,
}

impl Particle {
    pub fn is_live(&self) -> bool {
        self.live < self.lifetime
    }

    /// Tint at the current point of the particle's life
    pub fn tint(&self) -> Rgba {
        let t = if self.lifetime > 0.0 {
            self.live / self.lifetime
        } else {
            1.0
        };
        self.begin_tint.lerp(self.end_tint, t)
    }
}

pub struct ParticleRing {
    slots: Box<[Particle]>,
    cursor: usize,
}

impl ParticleRing {
    pub fn new() -> Self {
        Self {
            slots: vec![Particle::default(); MAX_PARTICLES].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Write one particle at the cursor, wrapping first if needed
    pub fn push(&mut self, p: Particle) {
        if self.cursor >= MAX_PARTICLES {
            self.cursor = 0;
        }
        self.slots[self.cursor] = p;
        self.cursor += 1;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn slots(&self) -> &[Particle] {
        &self.slots
    }

    pub fn iter_live(&self) -> impl Iterator<Item = &Particle> {
        self.slots.iter().filter(|p| p.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.iter_live().count()
    }

    /// Integrate all live particles: retire at end of life or off-screen,
    /// then move, decay velocity, and shrink.
    pub fn update(&mut self, dt: f32, viewport: Rect) {
        for p in self.slots.iter_mut() {
            if !p.is_live() {
                p.live = 0.0;
                p.lifetime = 0.0;
                continue;
            }

            if !viewport.circle_overlaps(p.pos, p.radius) {
                p.live = 0.0;
                p.lifetime = 0.0;
                continue;
            }

            p.pos += p.vel * dt;
            p.vel -= p.vel * p.friction * dt;
            if p.radius > 0.0 {
                p.radius -= p.shrink * dt;
            }
            p.live += dt;
        }
    }
}

impl Default for ParticleRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Named burst recipes. Each emission randomizes count, lifetime, direction,
/// speed, size and friction within the recipe's ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmitterKind {
    /// Directional gold sparks opposite the emitter's travel
    Sparks,
    /// Sparks in purple
    PurpleSparks,
    /// Tight directional blood spray opposite the emitter's travel
    BloodSpit,
    BloodPuff,
    MassiveBloodPuff,
    PinkPuff,
    GreenPuff,
    BrownPuff,
    /// Small gray puff for weapons breaking
    WeaponDiePuff,
    WhitePuff,
    /// Layered yellow/orange/red explosion
    BigExplosion,
}

/// Stepped uniform float: `steps + 1` evenly spaced values in [min, max].
/// Coarse on purpose; particle variety does not need dense floats.
pub fn random_float(rng: &mut Pcg32, min: f32, max: f32, steps: i32) -> f32 {
    let val = rng.gen_range(0..=steps);
    remap(val as f32, 0.0, steps as f32, min, max)
}

fn random_dir(rng: &mut Pcg32) -> Vec2 {
    rotate_vec(
        Vec2::new(0.0, -1.0),
        random_float(rng, 0.0, std::f32::consts::TAU, 150),
    )
}

/// Omni-directional puff shared by several recipes
#[allow(clippy::too_many_arguments)]
fn emit_puff(
    ring: &mut ParticleRing,
    rng: &mut Pcg32,
    pos: Vec2,
    count: (i32, i32),
    life_frames: (f32, f32),
    speed: (i32, i32),
    radius: (f32, f32, i32),
    shrink_factor: f32,
    friction: (f32, f32, i32),
    tint: Rgba,
    end_alpha: f32,
) {
    let n = rng.gen_range(count.0..=count.1);
    for _ in 0..n {
        let lifetime = random_float(rng, FRAME_DT * life_frames.0, FRAME_DT * life_frames.1, 10);
        let vel = random_dir(rng) * rng.gen_range(speed.0..=speed.1) as f32;
        let r = random_float(rng, radius.0, radius.1, radius.2);

        ring.push(Particle {
            lifetime,
            pos,
            vel,
            radius: r,
            shrink: (shrink_factor * r) / lifetime,
            friction: random_float(rng, friction.0, friction.1, friction.2),
            begin_tint: tint,
            end_tint: tint.with_alpha(end_alpha),
            live: 0.0,
        });
    }
}

/// Directional spray used by sparks and blood spit: particles fly roughly
/// opposite `vel`, spread by `half_angle`.
#[allow(clippy::too_many_arguments)]
fn emit_spray(
    ring: &mut ParticleRing,
    rng: &mut Pcg32,
    pos: Vec2,
    vel: Vec2,
    count: (i32, i32),
    half_angle: f32,
    radius: (f32, f32),
    tint: Rgba,
    end_alpha: f32,
) {
    let base = -vel.normalize_or_zero();
    let n = rng.gen_range(count.0..=count.1);
    for _ in 0..n {
        let lifetime = random_float(rng, FRAME_DT * 10.0, FRAME_DT * 20.0, 10);
        let dir = rotate_vec(base, random_float(rng, -half_angle, half_angle, 200));

        ring.push(Particle {
            lifetime,
            pos,
            vel: dir * rng.gen_range(1500..=1800) as f32,
            radius: random_float(rng, radius.0, radius.1, 4),
            shrink: 12.3,
            friction: rng.gen_range(0..=20) as f32,
            begin_tint: tint,
            end_tint: tint.with_alpha(end_alpha),
            live: 0.0,
        });
    }
}

/// Run one recipe at `pos`. `vel` is the emitter's velocity, which the
/// directional recipes spray against.
pub fn emit(ring: &mut ParticleRing, rng: &mut Pcg32, kind: EmitterKind, pos: Vec2, vel: Vec2) {
    use std::f32::consts::PI;

    match kind {
        EmitterKind::BigExplosion => {
            // Three layers walking down a tint ladder
            let tints = [
                Rgba::YELLOW,
                Rgba::ORANGE,
                Rgba::RED,
                Rgba::RED.with_alpha(0.8),
            ];
            let amounts = [300, 200, 40];

            for (i, &base) in amounts.iter().enumerate() {
                let n = rng.gen_range(base..=base + 20);
                for _ in 0..n {
                    let lifetime =
                        random_float(rng, FRAME_DT * 20.0, FRAME_DT * 30.0, 5);
                    let r = random_float(rng, 2.9, 4.7, 15);

                    ring.push(Particle {
                        lifetime,
                        pos,
                        vel: random_dir(rng) * rng.gen_range(400..=700) as f32,
                        radius: r,
                        shrink: (0.6 * r) / lifetime,
                        friction: rng.gen_range(0..=2) as f32,
                        begin_tint: tints[i],
                        end_tint: tints[i + 1],
                        live: 0.0,
                    });
                }
            }
        }
        EmitterKind::WhitePuff => {
            let n = rng.gen_range(100..=110);
            for _ in 0..n {
                let lifetime = random_float(rng, FRAME_DT * 20.0, FRAME_DT * 26.0, 10);
                let r = random_float(rng, 2.0, 4.0, 5);

                ring.push(Particle {
                    lifetime,
                    pos,
                    vel: random_dir(rng) * rng.gen_range(1400..=1500) as f32,
                    radius: r,
                    shrink: (0.5 * r) / lifetime,
                    friction: rng.gen_range(8..=15) as f32,
                    begin_tint: Rgba::RAYWHITE,
                    end_tint: Rgba::RAYWHITE.with_alpha(0.8),
                    live: 0.0,
                });
            }
        }
        EmitterKind::WeaponDiePuff => emit_puff(
            ring, rng, pos,
            (10, 15), (30.0, 40.0), (80, 90), (0.9, 1.7, 4),
            0.46, (0.05, 0.1, 4),
            Rgba::GUNMETAL, 0.8,
        ),
        EmitterKind::BrownPuff => emit_puff(
            ring, rng, pos,
            (10, 15), (30.0, 40.0), (80, 90), (2.9, 3.5, 4),
            0.36, (0.05, 0.1, 4),
            Rgba::DIRT_BROWN, 0.8,
        ),
        EmitterKind::GreenPuff => emit_puff(
            ring, rng, pos,
            (10, 15), (30.0, 40.0), (80, 90), (2.9, 3.5, 4),
            0.36, (0.05, 0.1, 4),
            Rgba::GREEN, 0.8,
        ),
        EmitterKind::PinkPuff => emit_puff(
            ring, rng, pos,
            (10, 15), (30.0, 40.0), (80, 90), (2.9, 3.5, 4),
            0.36, (0.05, 0.1, 4),
            Rgba::PINK, 0.8,
        ),
        EmitterKind::MassiveBloodPuff => emit_puff(
            ring, rng, pos,
            (1100, 1300), (20.0, 30.0), (400, 600), (3.7, 4.6, 10),
            0.7, (0.0, 2.0, 2),
            Rgba::BLOOD, 0.75,
        ),
        EmitterKind::BloodPuff => emit_puff(
            ring, rng, pos,
            (200, 210), (20.0, 25.0), (500, 600), (2.7, 3.2, 3),
            0.7, (0.0, 2.0, 2),
            Rgba::BLOOD, 0.75,
        ),
        EmitterKind::Sparks => emit_spray(
            ring, rng, pos, vel,
            (20, 25), PI * 0.37, (2.0, 3.2),
            Rgba::SPARK_GOLD, 0.83,
        ),
        EmitterKind::PurpleSparks => emit_spray(
            ring, rng, pos, vel,
            (20, 25), PI * 0.37, (2.0, 3.2),
            Rgba::PURPLE, 0.83,
        ),
        EmitterKind::BloodSpit => emit_spray(
            ring, rng, pos, vel,
            (50, 60), PI * 0.1, (1.6, 2.2),
            Rgba::BLOOD, 0.85,
        ),
    }
}
