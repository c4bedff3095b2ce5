//! Top-down road racer
//!
//! Lives are a continuous health pool here: driving off the winding road
//! drains a fraction of a life every tick, and crashing into traffic costs a
//! larger chunk. Checkpoints advance the level; the finish line wins.

use glam::Vec2;
use rand::Rng;

use crate::Rgba;
use crate::platform::input::{InputFrame, Intent};
use crate::renderer::Frame;
use crate::sim::collision::{Policy, PolicyTable};
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::geometry::Shape;
use crate::sim::ruleset::{RuleContext, Ruleset};
use crate::sim::state::Session;
use crate::sim::world::World;

const HEALTH: f32 = 10.0;
/// Health lost per tick off the road
const OFF_ROAD_DRAIN: f32 = 0.1;

const CAR_W: f32 = 24.0;
const CAR_H: f32 = 40.0;
const STEER_SPEED: f32 = 5.0;

const BASE_SPEED: f32 = 4.0;
const MAX_SPEED: f32 = 9.0;
const MIN_SPEED: f32 = 2.0;
const ACCEL: f32 = 0.08;

const ROAD_HALF: f32 = 140.0;
const ROAD_SWING: f32 = 150.0;
const ROAD_WAVE: f32 = 0.004;

const CHECKPOINT: f32 = 1500.0;
const FINISH: f32 = 7500.0;
const CHECKPOINT_BONUS: u64 = 250;

/// Distance driven per point of score
const DISTANCE_PER_POINT: f32 = 10.0;

#[derive(Debug, Default)]
pub struct Racer {
    /// Road distance at the bottom edge of the screen
    distance: f32,
    speed: f32,
    spawn_timer: u32,
    scored_distance: f32,
    width: f32,
    height: f32,
}

impl Racer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Road centre x at a road distance
    fn road_center(&self, d: f32) -> f32 {
        self.width / 2.0 + ROAD_SWING * (d * ROAD_WAVE).sin()
    }

    /// Road distance shown at a screen y
    fn distance_at(&self, y: f32) -> f32 {
        self.distance + (self.height - y)
    }

    fn on_road(&self, car: &Entity) -> bool {
        let c = car.center();
        (c.x - self.road_center(self.distance_at(c.y))).abs() <= ROAD_HALF
    }

    fn spawn_traffic(&self, ctx: &mut RuleContext) {
        let y = -CAR_H;
        let center = self.road_center(self.distance_at(y));
        let lane = ctx.rng.random_range(-ROAD_HALF + CAR_W..ROAD_HALF - CAR_W);
        let repair = ctx.rng.random_bool(0.15);

        let entity = if repair {
            Entity::new(EntityKind::Pickup, Vec2::new(center + lane, y), Shape::circle(10.0)).with_value(25)
        } else {
            Entity::new(
                EntityKind::Obstacle,
                Vec2::new(center + lane - CAR_W / 2.0, y),
                Shape::rect(CAR_W, CAR_H),
            )
            .with_speed(ctx.rng.random_range(1.0..2.5))
        };
        ctx.world.spawn(entity);
    }
}

impl Ruleset for Racer {
    fn name(&self) -> &'static str {
        "racer"
    }

    fn initial_lives(&self) -> f32 {
        HEALTH
    }

    fn fractional_lives(&self) -> bool {
        true
    }

    fn policies(&self) -> PolicyTable {
        PolicyTable::new()
            .with(
                EntityKind::Player,
                EntityKind::Obstacle,
                Policy::Hurt {
                    lives: 2.0,
                    stun_ticks: 45,
                    respawn: false,
                    consume_hazard: true,
                },
            )
            .with(EntityKind::Player, EntityKind::Pickup, Policy::Collect)
    }

    fn setup(&mut self, ctx: &mut RuleContext) {
        let size = ctx.size();
        *self = Self {
            speed: BASE_SPEED,
            spawn_timer: 60,
            width: size.x,
            height: size.y,
            ..Self::default()
        };

        let y = size.y - CAR_H - 24.0;
        let x = self.road_center(self.distance_at(y + CAR_H / 2.0)) - CAR_W / 2.0;
        ctx.world.spawn(
            Entity::new(EntityKind::Player, Vec2::new(x, y), Shape::rect(CAR_W, CAR_H)).with_speed(STEER_SPEED),
        );
    }

    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
        if input.held(Intent::MoveUp) {
            self.speed += ACCEL;
        } else if input.held(Intent::MoveDown) {
            self.speed -= ACCEL * 2.0;
        } else {
            self.speed += (BASE_SPEED - self.speed) * 0.02;
        }
        self.speed = self.speed.clamp(MIN_SPEED, MAX_SPEED);

        let before = self.distance;
        self.distance += self.speed;

        let on_road = match ctx.world.player_mut() {
            Some(car) => {
                car.vel = Vec2::new(input.horizontal() * car.speed, 0.0);
                Some(self.on_road(car))
            }
            None => None,
        };
        match on_road {
            Some(false) => {
                ctx.session.lose_lives(OFF_ROAD_DRAIN);
                self.speed = self.speed.min(BASE_SPEED);
            }
            Some(true) => {
                self.scored_distance += self.speed;
                let points = (self.scored_distance / DISTANCE_PER_POINT) as u64;
                if points > 0 {
                    ctx.session.add_score(points);
                    self.scored_distance -= points as f32 * DISTANCE_PER_POINT;
                }
            }
            None => {}
        }

        // Scenery scrolls at the car's speed minus its own
        let speed = self.speed;
        for e in ctx.world.iter_mut().filter(|e| e.kind != EntityKind::Player) {
            e.vel.y = speed - e.speed;
        }

        if (before / CHECKPOINT).floor() < (self.distance / CHECKPOINT).floor() && self.distance < FINISH {
            ctx.session.add_score(CHECKPOINT_BONUS);
            ctx.session.advance_level();
        }

        self.spawn_timer = self.spawn_timer.saturating_sub(1);
        if self.spawn_timer == 0 {
            self.spawn_traffic(ctx);
            let level = ctx.session.level();
            self.spawn_timer = ctx.rng.random_range(30..70u32).saturating_sub(level * 4).max(15);
        }
    }

    fn on_collect(&mut self, ctx: &mut RuleContext, _collector: EntityId, _pickup: &Entity) {
        ctx.session.gain_lives(1.5, Some(HEALTH));
    }

    fn is_won(&self, _world: &World, _session: &Session) -> bool {
        self.distance >= FINISH
    }

    fn background(&self) -> Rgba {
        [0.12, 0.35, 0.15, 1.0]
    }

    fn color(&self, entity: &Entity) -> Rgba {
        match entity.kind {
            EntityKind::Player => [1.0, 0.85, 0.2, 1.0],
            EntityKind::Obstacle => [0.85, 0.3, 0.3, 1.0],
            EntityKind::Pickup => [0.3, 0.9, 1.0, 1.0],
            _ => [1.0, 1.0, 1.0, 1.0],
        }
    }

    fn decorate(&self, _world: &World, frame: &mut Frame) {
        const STRIP: f32 = 10.0;
        let mut y = 0.0;
        while y < self.height {
            let d = self.distance_at(y + STRIP / 2.0);
            let center = self.road_center(d);
            frame.rect(center - ROAD_HALF, y, ROAD_HALF * 2.0, STRIP, [0.22, 0.22, 0.25, 1.0]);
            // Dashed centre line
            if (d / 40.0).floor() as i64 % 2 == 0 {
                frame.rect(center - 2.0, y, 4.0, STRIP, [0.9, 0.9, 0.8, 1.0]);
            }
            y += STRIP;
        }
        // Finish line
        let finish_y = self.height - (FINISH - self.distance);
        if finish_y >= 0.0 && finish_y <= self.height {
            let center = self.road_center(FINISH);
            frame.rect(center - ROAD_HALF, finish_y - 4.0, ROAD_HALF * 2.0, 8.0, [1.0, 1.0, 1.0, 1.0]);
        }
    }
}
