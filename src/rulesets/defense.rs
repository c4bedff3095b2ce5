//! Lane defense
//!
//! Waves of enemies walk a fixed lane across the field. A turret in the
//! middle turns with the aim intents (or follows the pointer) and fires
//! along its heading. Every enemy that reaches the end of the lane costs a
//! life; surviving every wave wins.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec2;
use rand::Rng;

use crate::Rgba;
use crate::direction_to;
use crate::platform::input::{InputFrame, Intent};
use crate::renderer::Frame;
use crate::sim::collision::{CollisionEvent, Policy, PolicyTable};
use crate::sim::entity::{Boundary, Entity, EntityKind};
use crate::sim::geometry::Shape;
use crate::sim::ruleset::{RuleContext, Ruleset};
use crate::sim::state::Session;
use crate::sim::world::World;

/// Waypoints of the enemy lane, entry first
const LANE: [Vec2; 6] = [
    Vec2::new(-20.0, 100.0),
    Vec2::new(600.0, 100.0),
    Vec2::new(600.0, 300.0),
    Vec2::new(100.0, 300.0),
    Vec2::new(100.0, 440.0),
    Vec2::new(820.0, 440.0),
];

const TURRET_POS: Vec2 = Vec2::new(400.0, 200.0);
const TURRET_RADIUS: f32 = 16.0;
/// Turn rate in radians per tick
const AIM_RATE: f32 = 0.06;

const SHOT_SPEED: f32 = 8.0;
const SHOT_TTL: u32 = 90;
const SHOT_COOLDOWN: u32 = 12;

const WAVES: u32 = 5;
const SPAWN_GAP: u32 = 45;
const WAVE_BONUS: u64 = 100;

#[derive(Debug, Default)]
pub struct Defense {
    cooldown: u32,
    spawn_timer: u32,
    spawned: u32,
    survived: bool,
}

impl Defense {
    pub fn new() -> Self {
        Self::default()
    }

    fn wave_size(wave: u32) -> u32 {
        5 + 2 * wave
    }

    fn spawn_enemy(ctx: &mut RuleContext) {
        let wave = ctx.session.level();
        let speed = 1.0 + 0.15 * wave as f32 + ctx.rng.random_range(0.0..0.3);
        let health = 2.0 + (wave / 2) as f32;
        ctx.world.spawn(
            Entity::new(EntityKind::Enemy, LANE[0], Shape::circle(11.0))
                .with_speed(speed)
                .with_health(health)
                .with_value(10 + 2 * wave as u64)
                .with_tag(1)
                .with_boundary(Boundary::Free),
        );
    }

    /// Steer enemies along the lane. Returns how many left through the exit.
    fn walk_lane(world: &mut World) -> u32 {
        let mut escaped = 0;
        for e in world.of_kind_mut(EntityKind::Enemy) {
            let mut next = e.tag as usize;
            if let Some(&waypoint) = LANE.get(next) {
                if e.center().distance(waypoint) <= e.speed {
                    e.set_center(waypoint);
                    next += 1;
                    e.tag = next as u16;
                }
            }
            match LANE.get(next) {
                Some(&waypoint) => e.vel = direction_to(e.center(), waypoint) * e.speed,
                None => {
                    e.alive = false;
                    escaped += 1;
                }
            }
        }
        escaped
    }
}

impl Ruleset for Defense {
    fn name(&self) -> &'static str {
        "defense"
    }

    fn policies(&self) -> PolicyTable {
        PolicyTable::new().with(EntityKind::Projectile, EntityKind::Enemy, Policy::Damage)
    }

    fn setup(&mut self, ctx: &mut RuleContext) {
        *self = Self {
            spawn_timer: SPAWN_GAP,
            ..Self::new()
        };
        ctx.world.spawn(
            Entity::new(EntityKind::Player, TURRET_POS, Shape::circle(TURRET_RADIUS))
                .with_heading(3.0 * FRAC_PI_2)
                .with_boundary(Boundary::Free),
        );
    }

    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
        self.cooldown = self.cooldown.saturating_sub(1);

        let mut muzzle = None;
        if let Some(turret) = ctx.world.player_mut() {
            let aim = input.aim();
            if aim != 0.0 {
                turret.heading += aim * AIM_RATE;
            } else if let Some(target) = input.pointer {
                let dir = direction_to(turret.center(), target);
                if dir != Vec2::ZERO {
                    turret.heading = dir.to_angle();
                }
            }
            turret.heading = turret.heading.rem_euclid(TAU);
            let facing = Vec2::from_angle(turret.heading);
            muzzle = Some((turret.center() + facing * (TURRET_RADIUS + 4.0), facing));
        }

        if let Some((from, facing)) = muzzle.filter(|_| input.held(Intent::Fire) && self.cooldown == 0) {
            ctx.world.spawn(
                Entity::new(EntityKind::Projectile, from, Shape::circle(3.0))
                    .with_vel(facing * SHOT_SPEED)
                    .with_ttl(SHOT_TTL),
            );
            self.cooldown = SHOT_COOLDOWN;
        }

        let escaped = Self::walk_lane(ctx.world);
        if escaped > 0 {
            log::debug!("{} enemies escaped", escaped);
            ctx.session.lose_lives(escaped as f32);
        }

        let wave = ctx.session.level();
        if self.spawned < Self::wave_size(wave) {
            self.spawn_timer = self.spawn_timer.saturating_sub(1);
            if self.spawn_timer == 0 {
                Self::spawn_enemy(ctx);
                self.spawned += 1;
                self.spawn_timer = SPAWN_GAP.saturating_sub(wave * 4).max(15);
            }
        }
    }

    fn after_collisions(&mut self, ctx: &mut RuleContext, _events: &[CollisionEvent]) {
        let wave = ctx.session.level();
        let cleared = self.spawned >= Self::wave_size(wave) && ctx.world.count(EntityKind::Enemy) == 0;
        if !cleared || ctx.session.is_terminal() {
            return;
        }
        ctx.session.add_score(WAVE_BONUS * wave as u64);
        if wave >= WAVES {
            self.survived = true;
        } else {
            ctx.session.advance_level();
            self.spawned = 0;
            self.spawn_timer = SPAWN_GAP * 2;
        }
    }

    fn is_won(&self, _world: &World, _session: &Session) -> bool {
        self.survived
    }

    fn background(&self) -> Rgba {
        [0.08, 0.1, 0.07, 1.0]
    }

    fn color(&self, entity: &Entity) -> Rgba {
        match entity.kind {
            EntityKind::Player => [0.5, 0.8, 1.0, 1.0],
            EntityKind::Enemy => [0.95, 0.45, 0.25, 1.0],
            EntityKind::Projectile => [1.0, 1.0, 0.6, 1.0],
            _ => [0.7, 0.7, 0.7, 1.0],
        }
    }

    fn decorate(&self, world: &World, frame: &mut Frame) {
        for pair in LANE.windows(2) {
            frame.line(pair[0], pair[1], 26.0, [0.25, 0.22, 0.15, 1.0]);
        }
        if let Some(turret) = world.player() {
            let tip = turret.center() + Vec2::from_angle(turret.heading) * (TURRET_RADIUS + 10.0);
            frame.line(turret.center(), tip, 6.0, [0.7, 0.9, 1.0, 1.0]);
        }
    }
}
