//! Top-down stealth
//!
//! Guards patrol between two waypoints and give chase once they see the
//! player. Walls block movement and sight. Collecting every intel item on a
//! floor moves to the next floor; getting caught costs a life and sends the
//! player back to the entrance.

use glam::Vec2;
use rand::Rng;

use crate::Rgba;
use crate::direction_to;
use crate::platform::input::InputFrame;
use crate::renderer::Frame;
use crate::sim::collision::{CollisionEvent, Policy, PolicyTable, contact};
use crate::sim::entity::{Entity, EntityId, EntityKind};
use crate::sim::geometry::{Aabb, Shape};
use crate::sim::ruleset::{RuleContext, Ruleset};
use crate::sim::state::Session;
use crate::sim::world::World;

const PLAYER_RADIUS: f32 = 10.0;
const PLAYER_SPEED: f32 = 3.0;
const ENTRANCE: Vec2 = Vec2::new(40.0, 250.0);

const GUARD_RADIUS: f32 = 12.0;
const PATROL_SPEED: f32 = 1.2;
const CHASE_SPEED: f32 = 2.2;

const SIGHT_RANGE: f32 = 170.0;
/// Half-angle of the view cone in radians
const SIGHT_CONE: f32 = 0.7;
/// Close enough to be noticed from any direction
const HEARING_RANGE: f32 = 40.0;
/// Ticks a guard keeps chasing after losing sight
const ALERT_TICKS: u32 = 120;

const FLOORS: u32 = 3;
const FLOOR_BONUS: u64 = 200;
const INTEL_VALUE: u64 = 50;

#[derive(Debug, Clone, Copy)]
struct Patrol {
    guard: EntityId,
    a: Vec2,
    b: Vec2,
    toward_b: bool,
    alert: u32,
}

#[derive(Debug, Default)]
pub struct Stealth {
    patrols: Vec<Patrol>,
    walls: Vec<Aabb>,
    escaped: bool,
}

impl Stealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall layout for a floor; later floors add more cover and corridors
    fn layout(floor: u32) -> Vec<Aabb> {
        let mut walls = vec![
            Aabb::new(150.0, 0.0, 20.0, 180.0),
            Aabb::new(150.0, 320.0, 20.0, 180.0),
            Aabb::new(330.0, 120.0, 140.0, 20.0),
            Aabb::new(330.0, 360.0, 140.0, 20.0),
            Aabb::new(620.0, 80.0, 20.0, 340.0),
        ];
        if floor >= 2 {
            walls.push(Aabb::new(390.0, 200.0, 20.0, 100.0));
        }
        if floor >= 3 {
            walls.push(Aabb::new(240.0, 230.0, 60.0, 40.0));
            walls.push(Aabb::new(700.0, 230.0, 100.0, 20.0));
        }
        walls
    }

    /// Whether the segment from `from` to `to` clears every wall
    fn clear_line(&self, from: Vec2, to: Vec2) -> bool {
        const SAMPLES: usize = 16;
        (0..=SAMPLES).all(|i| {
            let p = from.lerp(to, i as f32 / SAMPLES as f32);
            self.walls.iter().all(|w| !w.contains(p))
        })
    }

    fn sees(&self, guard: &Entity, target: Vec2) -> bool {
        let to = target - guard.center();
        let dist = to.length();
        if dist < HEARING_RANGE {
            return true;
        }
        if dist > SIGHT_RANGE {
            return false;
        }
        let facing = Vec2::from_angle(guard.heading);
        let angle = facing.angle_to(direction_to(guard.center(), target));
        angle.abs() <= SIGHT_CONE && self.clear_line(guard.center(), target)
    }

    fn build_floor(&mut self, ctx: &mut RuleContext) {
        let floor = ctx.session.level();
        ctx.world.clear();
        self.patrols.clear();
        self.walls = Self::layout(floor);

        for wall in &self.walls {
            ctx.world.spawn(Entity::new(
                EntityKind::Obstacle,
                Vec2::new(wall.x, wall.y),
                Shape::rect(wall.w, wall.h),
            ));
        }

        ctx.world.spawn(
            Entity::new(EntityKind::Player, ENTRANCE, Shape::circle(PLAYER_RADIUS)).with_speed(PLAYER_SPEED),
        );

        let routes = [
            (Vec2::new(240.0, 60.0), Vec2::new(240.0, 440.0)),
            (Vec2::new(540.0, 60.0), Vec2::new(540.0, 440.0)),
            (Vec2::new(700.0, 60.0), Vec2::new(760.0, 440.0)),
            (Vec2::new(330.0, 250.0), Vec2::new(580.0, 250.0)),
        ];
        let guards = (1 + floor as usize).min(routes.len());
        for &(a, b) in routes.iter().take(guards) {
            let guard = ctx.world.spawn(
                Entity::new(EntityKind::Enemy, a, Shape::circle(GUARD_RADIUS))
                    .with_speed(PATROL_SPEED)
                    .with_heading((b - a).to_angle()),
            );
            self.patrols.push(Patrol {
                guard,
                a,
                b,
                toward_b: true,
                alert: 0,
            });
        }

        let intel = 2 + floor as usize;
        let mut placed = 0;
        let mut attempts = 0;
        while placed < intel && attempts < 200 {
            attempts += 1;
            let p = Vec2::new(ctx.rng.random_range(200.0..780.0), ctx.rng.random_range(20.0..480.0));
            let blocked = self.walls.iter().any(|w| w.inflate(12.0).contains(p));
            if !blocked {
                ctx.world.spawn(
                    Entity::new(EntityKind::Pickup, p, Shape::circle(7.0)).with_value(INTEL_VALUE),
                );
                placed += 1;
            }
        }
        log::debug!("stealth floor {}: {} guards, {} intel", floor, guards, placed);
    }

    /// Push `mover` out of `wall`
    fn push_out(world: &mut World, mover: EntityId, wall: EntityId) -> bool {
        let hit = match (world.get(mover), world.get(wall)) {
            (Some(m), Some(w)) => contact(m, w),
            _ => None,
        };
        match (hit, world.get_mut(mover)) {
            (Some(c), Some(m)) => {
                m.pos += c.normal * c.penetration;
                true
            }
            _ => false,
        }
    }
}

impl Ruleset for Stealth {
    fn name(&self) -> &'static str {
        "stealth"
    }

    fn policies(&self) -> PolicyTable {
        PolicyTable::new()
            .with(
                EntityKind::Player,
                EntityKind::Enemy,
                Policy::Hurt {
                    lives: 1.0,
                    stun_ticks: 60,
                    respawn: true,
                    consume_hazard: false,
                },
            )
            .with(EntityKind::Player, EntityKind::Pickup, Policy::Collect)
            .with(EntityKind::Player, EntityKind::Obstacle, Policy::Custom)
            .with(EntityKind::Enemy, EntityKind::Obstacle, Policy::Custom)
    }

    fn setup(&mut self, ctx: &mut RuleContext) {
        *self = Self::new();
        self.build_floor(ctx);
    }

    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
        let target = match ctx.world.player_mut() {
            Some(p) => {
                p.vel = input.move_dir() * p.speed;
                if p.is_stunned() {
                    p.vel = Vec2::ZERO;
                }
                p.center()
            }
            None => return,
        };
        let level = ctx.session.level();

        for i in 0..self.patrols.len() {
            let patrol = self.patrols[i];
            let spotted = match ctx.world.get(patrol.guard) {
                Some(g) => self.sees(g, target),
                None => continue,
            };
            let alert = if spotted { ALERT_TICKS } else { patrol.alert.saturating_sub(1) };
            if spotted && patrol.alert == 0 {
                log::debug!("guard {} spotted the player", patrol.guard);
            }

            let Some(guard) = ctx.world.get_mut(patrol.guard) else {
                continue;
            };
            let waypoint = if patrol.toward_b { patrol.b } else { patrol.a };
            let (goal, speed) = if alert > 0 {
                (target, CHASE_SPEED + 0.2 * level as f32)
            } else {
                (waypoint, guard.speed)
            };
            // Coincident points yield a zero direction, never NaN
            let dir = direction_to(guard.center(), goal);
            guard.vel = dir * speed;
            if dir != Vec2::ZERO {
                guard.heading = dir.to_angle();
            }

            let mut toward_b = patrol.toward_b;
            if alert == 0 && guard.center().distance(waypoint) <= speed {
                toward_b = !toward_b;
            }
            self.patrols[i].alert = alert;
            self.patrols[i].toward_b = toward_b;
        }
    }

    fn resolve_custom(&mut self, ctx: &mut RuleContext, a: EntityId, b: EntityId) -> bool {
        let a_is_wall = ctx.world.get(a).is_some_and(|e| e.kind == EntityKind::Obstacle);
        let (mover, wall) = if a_is_wall { (b, a) } else { (a, b) };
        Self::push_out(ctx.world, mover, wall)
    }

    fn on_hurt(&mut self, ctx: &mut RuleContext, _player: EntityId, _hazard: EntityId) {
        // Guards lose interest once the intruder is thrown out
        for patrol in &mut self.patrols {
            patrol.alert = 0;
            if let Some(g) = ctx.world.get_mut(patrol.guard) {
                g.set_center(patrol.a);
                g.vel = Vec2::ZERO;
            }
            patrol.toward_b = true;
        }
    }

    fn after_collisions(&mut self, ctx: &mut RuleContext, _events: &[CollisionEvent]) {
        if ctx.session.is_terminal() || ctx.world.count(EntityKind::Pickup) > 0 {
            return;
        }
        ctx.session.add_score(FLOOR_BONUS);
        if ctx.session.level() >= FLOORS {
            self.escaped = true;
            return;
        }
        ctx.session.advance_level();
        self.build_floor(ctx);
    }

    fn is_won(&self, _world: &World, _session: &Session) -> bool {
        self.escaped
    }

    fn background(&self) -> Rgba {
        [0.06, 0.07, 0.1, 1.0]
    }

    fn color(&self, entity: &Entity) -> Rgba {
        match entity.kind {
            EntityKind::Player => [0.3, 1.0, 0.6, 1.0],
            EntityKind::Enemy => {
                let chasing = self.patrols.iter().any(|p| p.guard == entity.id && p.alert > 0);
                if chasing { [1.0, 0.25, 0.25, 1.0] } else { [0.9, 0.7, 0.3, 1.0] }
            }
            EntityKind::Pickup => [0.4, 0.7, 1.0, 1.0],
            EntityKind::Obstacle => [0.3, 0.32, 0.4, 1.0],
            EntityKind::Projectile => [1.0, 1.0, 1.0, 1.0],
        }
    }

    fn decorate(&self, world: &World, frame: &mut Frame) {
        // View cones
        for patrol in &self.patrols {
            if let Some(g) = world.get(patrol.guard) {
                let c = g.center();
                let color = if patrol.alert > 0 { [1.0, 0.2, 0.2, 0.35] } else { [1.0, 0.9, 0.5, 0.2] };
                for edge in [-SIGHT_CONE, SIGHT_CONE] {
                    let tip = c + Vec2::from_angle(g.heading + edge) * SIGHT_RANGE;
                    frame.line(c, tip, 1.0, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::input::Intent;
    use crate::sim::testing::{Harness, hold};

    #[test]
    fn test_floor_layout() {
        let h = Harness::new(Stealth::new(), 1);
        assert_eq!(h.world.count(EntityKind::Player), 1);
        assert_eq!(h.world.count(EntityKind::Enemy), 2);
        assert_eq!(h.world.count(EntityKind::Pickup), 3);
        assert_eq!(h.world.count(EntityKind::Obstacle), Stealth::layout(1).len());
    }

    #[test]
    fn test_guard_on_player_position_stays_finite() {
        let mut h = Harness::new(Stealth::new(), 2);
        let target = h.world.player().unwrap().center();
        let guard = h.rules.patrols[0].guard;
        h.world.get_mut(guard).unwrap().set_center(target);
        h.rules.patrols[0].alert = ALERT_TICKS;
        let report = h.idle();
        assert_eq!(report.sanitized, 0);
        for e in h.world.iter() {
            assert!(e.pos.is_finite() && e.vel.is_finite());
        }
    }

    #[test]
    fn test_caught_sends_player_back() {
        let mut h = Harness::new(Stealth::new(), 3);
        if let Some(p) = h.world.player_mut() {
            p.set_center(Vec2::new(240.0, 60.0));
        }
        h.idle();
        assert_eq!(h.session.lives(), 2.0);
        let p = h.world.player().unwrap();
        assert_eq!(p.center(), ENTRANCE);
        assert!(p.is_stunned());
        assert!(h.rules.patrols.iter().all(|p| p.alert == 0));
    }

    #[test]
    fn test_walls_block_player() {
        let mut h = Harness::new(Stealth::new(), 4);
        // Walk right into the wall at x = 150..170 (clear of guards)
        if let Some(p) = h.world.player_mut() {
            p.set_center(Vec2::new(120.0, 100.0));
        }
        h.run(40, &[Intent::MoveRight]);
        let p = h.world.player().unwrap();
        assert!(p.center().x <= 150.0 - PLAYER_RADIUS + 0.01);
    }

    #[test]
    fn test_guard_spots_player_in_cone() {
        let h = Harness::new(Stealth::new(), 5);
        let guard = h.world.get(h.rules.patrols[0].guard).unwrap().clone();
        // Patrol 0 starts facing down the corridor at x = 240
        assert!(h.rules.sees(&guard, guard.center() + Vec2::new(0.0, 100.0)));
        assert!(!h.rules.sees(&guard, guard.center() + Vec2::new(0.0, -100.0)));
        assert!(h.rules.sees(&guard, guard.center() + Vec2::new(0.0, -30.0)));
        assert!(!h.rules.sees(&guard, guard.center() + Vec2::new(0.0, SIGHT_RANGE + 10.0)));
    }

    #[test]
    fn test_walls_block_sight() {
        let mut rules = Stealth::new();
        rules.walls = vec![Aabb::new(50.0, -10.0, 10.0, 20.0)];
        let guard = Entity::new(EntityKind::Enemy, Vec2::ZERO, Shape::circle(GUARD_RADIUS)).with_heading(0.0);
        assert!(!rules.sees(&guard, Vec2::new(100.0, 0.0)));
        assert!(rules.sees(&guard, Vec2::new(100.0, 30.0)));
    }

    #[test]
    fn test_collecting_all_intel_advances_then_wins() {
        let mut h = Harness::new(Stealth::new(), 6);
        for floor in 1..=FLOORS {
            assert_eq!(h.session.level(), floor);
            for id in h.world.ids_of(EntityKind::Enemy) {
                h.world.despawn(id);
            }
            let spots: Vec<Vec2> = h.world.of_kind(EntityKind::Pickup).map(|e| e.center()).collect();
            for spot in spots {
                if let Some(p) = h.world.player_mut() {
                    p.set_center(spot);
                }
                h.step(&hold(&[]));
            }
        }
        assert!(h.session.game_won());
        assert!(h.session.score() >= FLOOR_BONUS * FLOORS as u64);
    }
}
