//! Vertical shooter
//!
//! Enemies drift down from the top; the ship shoots them. Shots use the
//! standard `Damage` policy, enemy contact uses `Hurt`, and destroyed enemies
//! sometimes drop pickups. Levels come from score thresholds.

use glam::Vec2;
use rand::Rng;

use crate::Rgba;
use crate::platform::input::{InputFrame, Intent};
use crate::sim::collision::{Policy, PolicyTable};
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::geometry::Shape;
use crate::sim::ruleset::{RuleContext, Ruleset};
use crate::sim::state::Session;
use crate::sim::world::World;

const SHIP_W: f32 = 30.0;
const SHIP_H: f32 = 20.0;
const SHIP_SPEED: f32 = 5.0;

const SHOT_SPEED: f32 = 9.0;
const SHOT_COOLDOWN: u32 = 10;
const RAPID_COOLDOWN: u32 = 4;
const RAPID_TICKS: u32 = 300;

/// Score needed per level
const LEVEL_SCORE: u64 = 250;
const WIN_LEVEL: u32 = 6;

const DROP_CHANCE: f64 = 0.1;
const MAX_LIVES: f32 = 5.0;

/// Enemy variants (`Entity::tag`)
const GRUNT: u16 = 0;
const TANK: u16 = 1;

/// Pickup effects (`Entity::tag`)
const HEAL: u16 = 0;
const RAPID: u16 = 1;

#[derive(Debug, Default)]
pub struct Shooter {
    cooldown: u32,
    rapid: u32,
    spawn_timer: u32,
}

impl Shooter {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn_interval(level: u32) -> u32 {
        70u32.saturating_sub(level * 8).max(20)
    }

    fn spawn_enemy(ctx: &mut RuleContext) {
        let level = ctx.session.level();
        let width = ctx.world.width;
        let x = ctx.rng.random_range(24.0..width - 24.0);
        let drift = ctx.rng.random_range(-1.0..=1.0_f32);
        let tank = level >= 2 && ctx.rng.random_bool(0.2);

        let enemy = if tank {
            Entity::new(EntityKind::Enemy, Vec2::new(x, -20.0), Shape::circle(18.0))
                .with_health(3.0)
                .with_value(30)
                .with_tag(TANK)
                .with_vel(Vec2::new(drift * 0.5, 1.0 + 0.2 * level as f32))
        } else {
            Entity::new(EntityKind::Enemy, Vec2::new(x, -20.0), Shape::circle(12.0))
                .with_value(10)
                .with_tag(GRUNT)
                .with_vel(Vec2::new(drift, 1.5 + 0.3 * level as f32))
        };
        ctx.world.spawn(enemy);
    }

    fn fire(&mut self, ctx: &mut RuleContext, from: Vec2) {
        ctx.world.spawn(
            Entity::new(EntityKind::Projectile, from, Shape::circle(3.0))
                .with_vel(Vec2::new(0.0, -SHOT_SPEED))
                .with_damage(1.0),
        );
        self.cooldown = if self.rapid > 0 { RAPID_COOLDOWN } else { SHOT_COOLDOWN };
    }
}

impl Ruleset for Shooter {
    fn name(&self) -> &'static str {
        "shooter"
    }

    fn policies(&self) -> PolicyTable {
        PolicyTable::new()
            .with(EntityKind::Projectile, EntityKind::Enemy, Policy::Damage)
            .with(
                EntityKind::Player,
                EntityKind::Enemy,
                Policy::Hurt {
                    lives: 1.0,
                    stun_ticks: 90,
                    respawn: false,
                    consume_hazard: true,
                },
            )
            .with(EntityKind::Player, EntityKind::Pickup, Policy::Collect)
    }

    fn setup(&mut self, ctx: &mut RuleContext) {
        *self = Self::new();
        self.spawn_timer = Self::spawn_interval(1);

        let size = ctx.size();
        ctx.world.spawn(
            Entity::new(
                EntityKind::Player,
                Vec2::new((size.x - SHIP_W) / 2.0, size.y - SHIP_H - 16.0),
                Shape::rect(SHIP_W, SHIP_H),
            )
            .with_speed(SHIP_SPEED),
        );
    }

    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
        self.cooldown = self.cooldown.saturating_sub(1);
        self.rapid = self.rapid.saturating_sub(1);

        let mut muzzle = None;
        if let Some(p) = ctx.world.player_mut() {
            let mut dir = input.move_dir();
            if dir == Vec2::ZERO {
                if let Some(target) = input.pointer {
                    dir.x = ((target.x - p.center().x) / p.speed).clamp(-1.0, 1.0);
                }
            }
            p.vel = dir * p.speed;
            muzzle = Some(Vec2::new(p.center().x, p.pos.y - 4.0));
        }

        if let Some(from) = muzzle.filter(|_| input.held(Intent::Fire) && self.cooldown == 0) {
            self.fire(ctx, from);
        }

        self.spawn_timer = self.spawn_timer.saturating_sub(1);
        if self.spawn_timer == 0 {
            Self::spawn_enemy(ctx);
            self.spawn_timer = Self::spawn_interval(ctx.session.level());
        }

        // Score thresholds drive the level
        let target_level = 1 + (ctx.session.score() / LEVEL_SCORE) as u32;
        while ctx.session.level() < target_level.min(WIN_LEVEL) && !ctx.session.is_terminal() {
            ctx.session.advance_level();
        }
    }

    fn on_destroyed(&mut self, ctx: &mut RuleContext, destroyed: &Entity) {
        if destroyed.kind != EntityKind::Enemy || !ctx.rng.random_bool(DROP_CHANCE) {
            return;
        }
        let tag = if ctx.rng.random_bool(0.5) { HEAL } else { RAPID };
        ctx.world.spawn(
            Entity::new(EntityKind::Pickup, destroyed.center(), Shape::circle(8.0))
                .with_vel(Vec2::new(0.0, 1.5))
                .with_value(5)
                .with_tag(tag),
        );
    }

    fn on_collect(&mut self, ctx: &mut RuleContext, _collector: EntityId, pickup: &Entity) {
        match pickup.tag {
            HEAL => ctx.session.gain_lives(1.0, Some(MAX_LIVES)),
            _ => self.rapid = RAPID_TICKS,
        }
    }

    fn is_won(&self, _world: &World, session: &Session) -> bool {
        session.level() >= WIN_LEVEL
    }

    fn color(&self, entity: &Entity) -> Rgba {
        match (entity.kind, entity.tag) {
            (EntityKind::Player, _) => [0.4, 0.9, 1.0, 1.0],
            (EntityKind::Enemy, TANK) => [1.0, 0.55, 0.2, 1.0],
            (EntityKind::Enemy, _) => [1.0, 0.3, 0.4, 1.0],
            (EntityKind::Pickup, HEAL) => [0.4, 1.0, 0.5, 1.0],
            (EntityKind::Pickup, _) => [1.0, 0.9, 0.3, 1.0],
            _ => [1.0, 1.0, 0.7, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::testing::{Harness, hold};

    #[test]
    fn test_fire_respects_cooldown() {
        let mut h = Harness::new(Shooter::new(), 1);
        let fire = hold(&[Intent::Fire]);
        h.step(&fire);
        assert_eq!(h.world.count(EntityKind::Projectile), 1);
        for _ in 0..SHOT_COOLDOWN - 1 {
            h.step(&fire);
        }
        assert_eq!(h.world.count(EntityKind::Projectile), 1);
        h.step(&fire);
        assert_eq!(h.world.count(EntityKind::Projectile), 2);
    }

    #[test]
    fn test_shot_destroys_enemy_above() {
        let mut h = Harness::new(Shooter::new(), 2);
        let ship = h.world.player().unwrap().center();
        let enemy = h.world.spawn(
            Entity::new(EntityKind::Enemy, Vec2::new(ship.x, ship.y - 200.0), Shape::circle(12.0)).with_value(10),
        );
        h.step(&hold(&[Intent::Fire]));
        h.run(40, &[]);
        assert!(!h.world.is_alive(enemy));
        assert!(h.session.score() >= 10);
    }

    #[test]
    fn test_enemies_spawn_over_time() {
        let mut h = Harness::new(Shooter::new(), 3);
        h.run(Shooter::spawn_interval(1) as usize, &[]);
        assert!(h.world.count(EntityKind::Enemy) >= 1);
    }

    #[test]
    fn test_score_threshold_levels() {
        let mut h = Harness::new(Shooter::new(), 4);
        h.session.add_score(LEVEL_SCORE * 2);
        h.idle();
        assert_eq!(h.session.level(), 3);
        assert!(!h.session.is_terminal());

        h.session.add_score(LEVEL_SCORE * 10);
        h.idle();
        assert!(h.session.game_won());
    }

    #[test]
    fn test_rapid_fire_pickup() {
        let mut h = Harness::new(Shooter::new(), 5);
        let ship = h.world.player().unwrap().center();
        h.world.spawn(Entity::new(EntityKind::Pickup, ship, Shape::circle(8.0)).with_tag(RAPID));
        h.idle();
        assert_eq!(h.rules.rapid, RAPID_TICKS);

        let fire = hold(&[Intent::Fire]);
        for _ in 0..=RAPID_COOLDOWN {
            h.step(&fire);
        }
        assert_eq!(h.world.count(EntityKind::Projectile), 2);
    }

    #[test]
    fn test_setup_resets_state() {
        let mut h = Harness::new(Shooter::new(), 6);
        h.rules.rapid = 99;
        h.rules.cooldown = 7;
        let mut world = World::new(800.0, 500.0);
        let mut ctx = RuleContext {
            world: &mut world,
            session: &mut h.session,
            particles: &mut h.particles,
            rng: &mut h.rng,
            settings: &h.settings,
            tick: 0,
        };
        h.rules.setup(&mut ctx);
        assert_eq!(h.rules.rapid, 0);
        assert_eq!(h.rules.cooldown, 0);
        assert_eq!(world.count(EntityKind::Player), 1);
    }
}
