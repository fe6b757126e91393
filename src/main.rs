//! Headless simulation driver
//!
//! Runs a scripted arena session at the fixed timestep and logs frame stats,
//! ending with a JSON dump of the final counters. Useful for soak-testing
//! the pipeline and for eyeballing determinism across runs of the same seed.

use glam::Vec2;

use dino_arena::consts::FRAME_DT;
use dino_arena::sim::{InputFlags, InputSnapshot, Rect, Waypoint, World};

const VIEWPORT: Rect = Rect::new(0.0, 0.0, 1600.0, 900.0);
const FRAMES: u64 = 600;

fn main() {
    env_logger::init();

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0xD1_50);
    let mut world = World::new(seed);

    build_arena(&mut world);

    for frame in 0..FRAMES {
        let input = scripted_input(frame);
        world.step(FRAME_DT, input, VIEWPORT);

        for event in world.drain_camera_events() {
            log::debug!("camera: {event:?}");
        }
        for event in world.drain_audio_events() {
            log::debug!("audio: {event:?}");
        }

        if frame % 60 == 0 {
            let stats = world.stats();
            log::info!(
                "frame {:4}  entities {:3}  enemies {:2}  particles {:5}  score {}",
                stats.frame_index,
                stats.live_entities,
                stats.live_enemies,
                stats.live_particles,
                stats.score,
            );
        }

        if world.game_over {
            log::info!("game over at frame {frame}");
            break;
        }
    }

    let stats = world.stats();
    let commands = world.render_commands();
    log::info!("final frame draws {} commands", commands.len());

    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{json}"),
        Err(err) => log::error!("stats serialization failed: {err}"),
    }
}

fn build_arena(world: &mut World) {
    let player = world.spawn_player();
    let chase = world.pool.handle(player);

    world.spawn_shotgun(Vec2::new(700.0, 450.0));
    world.spawn_assault_rifle(Vec2::new(900.0, 450.0));
    world.spawn_health_pack(VIEWPORT);

    let pack = world.spawn_parent();
    for i in 0..4 {
        let x = 200.0 + 300.0 * i as f32;
        world.spawn_raptor(Vec2::new(x, -50.0), chase, Some(pack));
    }

    world.spawn_boss(
        Vec2::new(1400.0, 100.0),
        vec![
            Waypoint { pos: Vec2::new(1400.0, 100.0), radius: 30.0 },
            Waypoint { pos: Vec2::new(1400.0, 800.0), radius: 30.0 },
            Waypoint { pos: Vec2::new(200.0, 800.0), radius: 30.0 },
            Waypoint { pos: Vec2::new(200.0, 100.0), radius: 30.0 },
        ],
    );
}

/// Canned session: walk to the shotgun, grab it, spray the raptor pack,
/// then kite while firing at the aim point.
fn scripted_input(frame: u64) -> InputSnapshot {
    let mut input = InputSnapshot {
        flags: InputFlags::empty(),
        aim: Vec2::new(800.0, 100.0),
    };

    match frame {
        0..=60 => input.flags |= InputFlags::MOVE_RIGHT,
        61..=70 => input.flags |= InputFlags::INTERACT,
        71..=300 => {
            input.flags |= InputFlags::MOVE_LEFT;
            if frame % 70 == 0 {
                input.flags |= InputFlags::SHOOT;
            }
        }
        301..=310 => input.flags |= InputFlags::THROW,
        _ => {
            input.flags |= InputFlags::MOVE_BACKWARD;
            if frame % 70 == 0 {
                input.flags |= InputFlags::SHOOT;
            }
        }
    }

    input
}
