//! Side-scrolling runner
//!
//! The runner stays in place while the ground scrolls past. Gravity pulls it
//! back to the ground; the jump intent launches it over incoming blocks.
//! Releasing jump early cuts the jump short. Distance survived scores, and
//! the pace picks up every level.

use glam::Vec2;
use rand::Rng;

use crate::Rgba;
use crate::platform::input::{InputFrame, Intent};
use crate::renderer::Frame;
use crate::sim::collision::{Policy, PolicyTable};
use crate::sim::entity::{Entity, EntityKind};
use crate::sim::geometry::Shape;
use crate::sim::ruleset::{RuleContext, Ruleset};
use crate::sim::state::Session;
use crate::sim::world::World;

const GROUND: f32 = 420.0;
const RUNNER_X: f32 = 120.0;
const RUNNER_W: f32 = 24.0;
const RUNNER_H: f32 = 32.0;

/// Units per tick squared
const GRAVITY: f32 = 0.6;
const JUMP_VEL: f32 = -11.0;
/// Upward speed kept when jump is released early
const JUMP_CUT: f32 = 0.5;

const BASE_SCROLL: f32 = 6.0;
const LEVEL_TICKS: u64 = 900;
const WIN_LEVEL: u32 = 6;
/// Ticks survived per point
const TICKS_PER_POINT: u64 = 6;

#[derive(Debug, Default)]
pub struct Runner {
    /// Ticks survived this session
    elapsed: u64,
    spawn_timer: u32,
    /// Ground stripe offset for the scrolling floor
    scroll: f32,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    fn scroll_speed(level: u32) -> f32 {
        BASE_SCROLL + 0.5 * (level - 1) as f32
    }

    fn grounded(runner: &Entity) -> bool {
        runner.pos.y >= GROUND - RUNNER_H - 0.01
    }

    fn spawn_block(ctx: &mut RuleContext) {
        let width = ctx.world.width;
        let (w, h) = (ctx.rng.random_range(20.0..44.0), ctx.rng.random_range(24.0..56.0));
        ctx.world.spawn(Entity::new(EntityKind::Obstacle, Vec2::new(width + 10.0, GROUND - h), Shape::rect(w, h)));

        if ctx.rng.random_bool(0.35) {
            ctx.world.spawn(
                Entity::new(
                    EntityKind::Pickup,
                    Vec2::new(width + 10.0 + w / 2.0, GROUND - h - 60.0),
                    Shape::circle(8.0),
                )
                .with_value(20),
            );
        }
    }
}

impl Ruleset for Runner {
    fn name(&self) -> &'static str {
        "runner"
    }

    fn policies(&self) -> PolicyTable {
        PolicyTable::new()
            .with(
                EntityKind::Player,
                EntityKind::Obstacle,
                Policy::Hurt {
                    lives: 1.0,
                    stun_ticks: 60,
                    respawn: false,
                    consume_hazard: true,
                },
            )
            .with(EntityKind::Player, EntityKind::Pickup, Policy::Collect)
    }

    fn setup(&mut self, ctx: &mut RuleContext) {
        *self = Self {
            spawn_timer: 90,
            ..Self::new()
        };
        ctx.world.spawn(Entity::new(
            EntityKind::Player,
            Vec2::new(RUNNER_X, GROUND - RUNNER_H),
            Shape::rect(RUNNER_W, RUNNER_H),
        ));
    }

    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
        self.elapsed += 1;
        if self.elapsed % TICKS_PER_POINT == 0 {
            ctx.session.add_score(1);
        }
        let target_level = 1 + (self.elapsed / LEVEL_TICKS) as u32;
        while ctx.session.level() < target_level.min(WIN_LEVEL) && !ctx.session.is_terminal() {
            ctx.session.advance_level();
        }

        let level = ctx.session.level();
        let scroll = Self::scroll_speed(level);
        self.scroll = (self.scroll + scroll) % 40.0;

        if let Some(runner) = ctx.world.player_mut() {
            if Self::grounded(runner) && input.held(Intent::Jump) {
                runner.vel.y = JUMP_VEL;
            } else if runner.vel.y < 0.0 && input.just_released(Intent::Jump) {
                runner.vel.y *= JUMP_CUT;
            }
            runner.vel.y += GRAVITY;
            runner.vel.x = 0.0;

            // Land exactly on the ground
            let floor = GROUND - RUNNER_H;
            if runner.pos.y + runner.vel.y >= floor {
                runner.pos.y = floor;
                runner.vel.y = 0.0;
            }
        }

        for e in ctx.world.iter_mut().filter(|e| e.kind != EntityKind::Player) {
            e.vel = Vec2::new(-scroll, 0.0);
        }

        self.spawn_timer = self.spawn_timer.saturating_sub(1);
        if self.spawn_timer == 0 {
            Self::spawn_block(ctx);
            let gap = ctx.rng.random_range(50..100u32);
            self.spawn_timer = gap.saturating_sub(level * 5).max(35);
        }
    }

    fn is_won(&self, _world: &World, session: &Session) -> bool {
        session.level() >= WIN_LEVEL
    }

    fn background(&self) -> Rgba {
        [0.1, 0.12, 0.2, 1.0]
    }

    fn color(&self, entity: &Entity) -> Rgba {
        match entity.kind {
            EntityKind::Player => [1.0, 0.6, 0.2, 1.0],
            EntityKind::Obstacle => [0.5, 0.4, 0.6, 1.0],
            EntityKind::Pickup => [1.0, 0.9, 0.3, 1.0],
            _ => [1.0, 1.0, 1.0, 1.0],
        }
    }

    fn decorate(&self, world: &World, frame: &mut Frame) {
        frame.rect(0.0, GROUND, world.width, world.height - GROUND, [0.2, 0.18, 0.25, 1.0]);
        let mut x = -self.scroll;
        while x < world.width {
            frame.rect(x, GROUND + 6.0, 20.0, 3.0, [0.35, 0.3, 0.4, 1.0]);
            x += 40.0;
        }
    }
}
