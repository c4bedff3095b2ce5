//! Ball-and-paddle (breakout)
//!
//! The ball bounces off the side and top walls, the paddle and the bricks.
//! Losing the ball off the bottom costs one life and serves a new ball from
//! the paddle. Clearing every brick advances the level; clearing the last
//! level wins.

use glam::Vec2;
use rand::Rng;

use crate::Rgba;
use crate::platform::input::InputFrame;
use crate::renderer::shapes::velocity_color;
use crate::safe_normalize;
use crate::sim::collision::{CollisionEvent, Policy, PolicyTable, bounce, contact};
use crate::sim::entity::{Boundary, Entity, EntityId, EntityKind};
use crate::sim::geometry::Shape;
use crate::sim::particles::Burst;
use crate::sim::ruleset::{RuleContext, Ruleset};
use crate::sim::state::Session;
use crate::sim::world::World;

const WIDTH: f32 = 800.0;
const HEIGHT: f32 = 500.0;

pub const BALL_RADIUS: f32 = 8.0;
pub const BALL_START: Vec2 = Vec2::new(400.0, 240.0);
/// Serve speed per axis at level 1 (units per tick)
const BALL_SPEED: f32 = 4.0;

const PADDLE_W: f32 = 100.0;
const PADDLE_H: f32 = 12.0;
const PADDLE_Y: f32 = 460.0;
const PADDLE_SPEED: f32 = 8.0;

const BRICK_COLS: usize = 10;
const BRICK_H: f32 = 20.0;
const BRICK_GAP: f32 = 6.0;
const BRICK_TOP: f32 = 60.0;
const BRICK_MARGIN: f32 = 40.0;
const BRICK_VALUE: u64 = 10;

const LEVELS: u32 = 3;
const LEVEL_BONUS: u64 = 100;

/// Chance a destroyed brick drops an extra-life capsule
const DROP_CHANCE: f64 = 0.12;
const MAX_LIVES: f32 = 5.0;

#[derive(Debug, Default)]
pub struct Paddle {
    cleared_final: bool,
}

impl Paddle {
    pub fn new() -> Self {
        Self::default()
    }

    fn ball_speed(level: u32) -> f32 {
        BALL_SPEED * (1.0 + 0.1 * level.saturating_sub(1) as f32)
    }

    fn build_bricks(ctx: &mut RuleContext) {
        let level = ctx.session.level();
        let rows = (4 + level).min(7) as usize;
        let w = (WIDTH - 2.0 * BRICK_MARGIN - (BRICK_COLS - 1) as f32 * BRICK_GAP) / BRICK_COLS as f32;

        for row in 0..rows {
            // Top rows get tougher from level 2 on
            let health = if level >= 2 && row < (level as usize - 1) { 2.0 } else { 1.0 };
            for col in 0..BRICK_COLS {
                let pos = Vec2::new(
                    BRICK_MARGIN + col as f32 * (w + BRICK_GAP),
                    BRICK_TOP + row as f32 * (BRICK_H + BRICK_GAP),
                );
                ctx.world.spawn(
                    Entity::new(EntityKind::Obstacle, pos, Shape::rect(w, BRICK_H))
                        .with_health(health)
                        .with_value(BRICK_VALUE * health as u64)
                        .with_boundary(Boundary::Free),
                );
            }
        }
    }

    /// Put the ball back above the paddle heading up, random horizontal sign
    fn serve(ctx: &mut RuleContext, ball: EntityId) {
        let (px, py) = match ctx.world.player() {
            Some(p) => (p.center().x, p.pos.y),
            None => (BALL_START.x, PADDLE_Y),
        };
        let speed = Self::ball_speed(ctx.session.level());
        let sign = if ctx.rng.random_bool(0.5) { 1.0 } else { -1.0 };
        if let Some(b) = ctx.world.get_mut(ball) {
            b.pos = Vec2::new(px, py - BALL_RADIUS - 2.0);
            b.vel = Vec2::new(sign * speed, -speed);
        }
    }

    fn bounce_off_paddle(ctx: &mut RuleContext, ball: EntityId, paddle: &Entity) -> bool {
        let Some(b) = ctx.world.get_mut(ball) else {
            return false;
        };
        // Only a falling ball bounces; a rising one is already leaving
        if b.vel.y <= 0.0 {
            return false;
        }
        let speed = b.vel.length();
        let offset = ((b.pos.x - paddle.center().x) / (PADDLE_W / 2.0)).clamp(-1.0, 1.0);
        b.vel = safe_normalize(Vec2::new(offset * 0.9, -1.0)) * speed;
        b.pos.y = paddle.pos.y - BALL_RADIUS;
        true
    }

    fn hit_brick(ctx: &mut RuleContext, ball: EntityId, brick: &Entity, color: Rgba) -> bool {
        let Some(ball_entity) = ctx.world.get(ball) else {
            return false;
        };
        let Some(c) = contact(ball_entity, brick) else {
            return false;
        };
        if let Some(b) = ctx.world.get_mut(ball) {
            bounce(b, c);
        }

        match ctx.world.damage(brick.id, 1.0) {
            Some(true) => {
                ctx.session.add_score(brick.value);
                ctx.burst(Burst::explosion(brick.center(), color));
                if ctx.rng.random_bool(DROP_CHANCE) {
                    ctx.world.spawn(
                        Entity::new(EntityKind::Pickup, brick.center(), Shape::circle(7.0))
                            .with_vel(Vec2::new(0.0, 2.5))
                            .with_value(50),
                    );
                }
            }
            Some(false) => {
                ctx.burst(Burst::hit(brick.center(), color));
            }
            None => return false,
        }
        true
    }
}

impl Ruleset for Paddle {
    fn name(&self) -> &'static str {
        "paddle"
    }

    fn logical_size(&self) -> Vec2 {
        Vec2::new(WIDTH, HEIGHT)
    }

    fn policies(&self) -> PolicyTable {
        PolicyTable::new()
            .with(EntityKind::Projectile, EntityKind::Player, Policy::Custom)
            .with(EntityKind::Projectile, EntityKind::Obstacle, Policy::Custom)
            .with(EntityKind::Player, EntityKind::Pickup, Policy::Collect)
    }

    fn setup(&mut self, ctx: &mut RuleContext) {
        self.cleared_final = false;

        ctx.world.spawn(
            Entity::new(
                EntityKind::Player,
                Vec2::new((WIDTH - PADDLE_W) / 2.0, PADDLE_Y),
                Shape::rect(PADDLE_W, PADDLE_H),
            )
            .with_speed(PADDLE_SPEED),
        );
        ctx.world.spawn(
            Entity::new(EntityKind::Projectile, BALL_START, Shape::circle(BALL_RADIUS))
                .with_vel(Vec2::new(BALL_SPEED, -BALL_SPEED))
                .with_boundary(Boundary::Free),
        );
        Self::build_bricks(ctx);
    }

    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
        let dir = input.horizontal();
        if let Some(p) = ctx.world.player_mut() {
            p.vel.x = if dir != 0.0 {
                dir * p.speed
            } else if let Some(target) = input.pointer {
                (target.x - p.center().x).clamp(-p.speed, p.speed)
            } else {
                0.0
            };
        }

        // Wall contact seen at the end of the last tick flips the ball now
        let width = ctx.world.width;
        for ball in ctx.world.of_kind_mut(EntityKind::Projectile) {
            if ball.pos.y - BALL_RADIUS <= 0.0 && ball.vel.y < 0.0 {
                ball.vel.y = -ball.vel.y;
            }
            if (ball.pos.x - BALL_RADIUS <= 0.0 && ball.vel.x < 0.0)
                || (ball.pos.x + BALL_RADIUS >= width && ball.vel.x > 0.0)
            {
                ball.vel.x = -ball.vel.x;
            }
        }
    }

    fn resolve_custom(&mut self, ctx: &mut RuleContext, a: EntityId, b: EntityId) -> bool {
        let (Some(ea), Some(eb)) = (ctx.world.get(a), ctx.world.get(b)) else {
            return false;
        };
        let (ball, other) = match (ea.kind, eb.kind) {
            (EntityKind::Projectile, _) => (a, eb.clone()),
            (_, EntityKind::Projectile) => (b, ea.clone()),
            _ => return false,
        };

        match other.kind {
            EntityKind::Player => Self::bounce_off_paddle(ctx, ball, &other),
            EntityKind::Obstacle => {
                let color = self.color(&other);
                Self::hit_brick(ctx, ball, &other, color)
            }
            _ => false,
        }
    }

    fn on_collect(&mut self, ctx: &mut RuleContext, _collector: EntityId, _pickup: &Entity) {
        ctx.session.gain_lives(1.0, Some(MAX_LIVES));
    }

    fn after_collisions(&mut self, ctx: &mut RuleContext, _events: &[CollisionEvent]) {
        let height = ctx.world.height;
        let fallen: Vec<EntityId> = ctx
            .world
            .of_kind(EntityKind::Projectile)
            .filter(|b| b.pos.y > height)
            .map(|b| b.id)
            .collect();
        for ball in fallen {
            ctx.session.lose_lives(1.0);
            Self::serve(ctx, ball);
        }

        if ctx.session.is_terminal() || ctx.world.count(EntityKind::Obstacle) > 0 {
            return;
        }
        if ctx.session.level() >= LEVELS {
            self.cleared_final = true;
            return;
        }

        ctx.session.add_score(LEVEL_BONUS);
        ctx.session.advance_level();
        Self::build_bricks(ctx);
        for ball in ctx.world.ids_of(EntityKind::Projectile) {
            Self::serve(ctx, ball);
        }
    }

    fn is_won(&self, _world: &World, _session: &Session) -> bool {
        self.cleared_final
    }

    fn color(&self, entity: &Entity) -> Rgba {
        match entity.kind {
            EntityKind::Projectile => velocity_color(entity.vel.length(), BALL_SPEED, BALL_SPEED * 2.0, 1.0),
            EntityKind::Obstacle if entity.max_health > 1.0 => [0.75, 0.45, 1.0, 1.0],
            EntityKind::Obstacle => [0.35, 0.6, 1.0, 1.0],
            EntityKind::Pickup => [1.0, 0.35, 0.45, 1.0],
            _ => [0.9, 0.92, 1.0, 1.0],
        }
    }
}
