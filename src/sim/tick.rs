//! Fixed timestep simulation tick
//!
//! Advances one session by exactly one logical step. Input is sampled by the
//! caller and held constant for the whole step.

use super::collision::{CollisionEvent, Policy, PolicyTable, Resolution, candidate_pairs, collides};
use super::entity::{EntityId, EntityKind};
use super::particles::Burst;
use super::ruleset::{RuleContext, Ruleset};
use super::state::SessionState;
use crate::consts::CULL_MARGIN;
use crate::platform::input::InputFrame;

/// What happened during one tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub events: Vec<CollisionEvent>,
    /// Entities destroyed for leaving the playfield
    pub culled: Vec<EntityId>,
    /// Entities whose vectors had to be repaired
    pub sanitized: usize,
    /// The session reached a terminal state during this tick
    pub ended: bool,
}

/// Advance the session by one fixed timestep
pub fn step(
    ruleset: &mut dyn Ruleset,
    policies: &PolicyTable,
    ctx: &mut RuleContext,
    input: &InputFrame,
) -> TickReport {
    let was_terminal = ctx.session.is_terminal();
    ctx.session.ticks += 1;
    ctx.tick = ctx.session.ticks;

    ruleset.update(ctx, input);

    ctx.world.integrate();
    let culled = ctx.world.enforce_bounds(CULL_MARGIN);

    // Spawn order keeps resolution deterministic
    let mut events = Vec::new();
    for (a, b) in candidate_pairs(ctx.world, policies) {
        if let Some(event) = resolve_pair(ruleset, policies, ctx, a, b) {
            events.push(event);
        }
    }
    ruleset.after_collisions(ctx, &events);

    ctx.particles.update();

    if !ctx.session.is_terminal() && ruleset.is_won(ctx.world, ctx.session) {
        ctx.session.declare_won();
    }

    ctx.world.sweep();
    let sanitized = ctx.world.sanitize();
    if sanitized > 0 {
        log::warn!("tick {}: repaired {} non-finite entities", ctx.tick, sanitized);
    }

    log::trace!(
        "tick {}: {} entities, {} contacts, {} particles",
        ctx.tick,
        ctx.world.len(),
        events.len(),
        ctx.particles.len()
    );

    TickReport {
        events,
        culled,
        sanitized,
        ended: !was_terminal && matches!(ctx.session.state(), SessionState::Ended(_)),
    }
}

/// Apply the policy for one overlapping pair.
///
/// Either side may have been destroyed or moved by an earlier contact this
/// tick, so the pair is re-checked first; a stale pair resolves to nothing.
pub fn resolve_pair(
    ruleset: &mut dyn Ruleset,
    policies: &PolicyTable,
    ctx: &mut RuleContext,
    a: EntityId,
    b: EntityId,
) -> Option<CollisionEvent> {
    let (ea, eb) = (ctx.world.get(a)?, ctx.world.get(b)?);
    if !collides(ea, eb) {
        return None;
    }
    let (ka, kb) = (ea.kind, eb.kind);

    let resolution = match policies.get(ka, kb) {
        Policy::Ignore => return None,
        Policy::Damage => {
            let (attacker, target) = if kb == EntityKind::Projectile && ka != EntityKind::Projectile {
                (b, a)
            } else {
                (a, b)
            };
            apply_damage(ruleset, ctx, attacker, target)?
        }
        Policy::Hurt {
            lives,
            stun_ticks,
            respawn,
            consume_hazard,
        } => {
            let (player, hazard) = match (ka, kb) {
                (EntityKind::Player, _) => (a, b),
                (_, EntityKind::Player) => (b, a),
                _ => return None,
            };
            apply_hurt(ruleset, ctx, player, hazard, lives, stun_ticks, respawn, consume_hazard)?
        }
        Policy::Collect => {
            let (collector, pickup) = match (ka, kb) {
                (EntityKind::Pickup, EntityKind::Pickup) => return None,
                (_, EntityKind::Pickup) => (a, b),
                (EntityKind::Pickup, _) => (b, a),
                _ => return None,
            };
            apply_collect(ruleset, ctx, collector, pickup)?
        }
        Policy::Custom => {
            if !ruleset.resolve_custom(ctx, a, b) {
                return None;
            }
            Resolution::Custom
        }
    };

    Some(CollisionEvent { a, b, resolution })
}

fn apply_damage(
    ruleset: &mut dyn Ruleset,
    ctx: &mut RuleContext,
    attacker: EntityId,
    target: EntityId,
) -> Option<Resolution> {
    let source = ctx.world.get(attacker)?;
    let (amount, consumed) = (source.damage, source.kind == EntityKind::Projectile);
    let victim = ctx.world.get(target)?.clone();

    if consumed {
        ctx.world.despawn(attacker);
    }
    let killed = ctx.world.damage(target, amount)?;

    let color = ruleset.color(&victim);
    if killed {
        ctx.session.add_score(victim.value);
        ctx.burst(Burst::explosion(victim.center(), color));
        ruleset.on_destroyed(ctx, &victim);
    } else {
        ctx.burst(Burst::hit(victim.center(), color));
    }

    Some(Resolution::Damaged {
        target,
        amount,
        killed,
    })
}

#[allow(clippy::too_many_arguments)]
fn apply_hurt(
    ruleset: &mut dyn Ruleset,
    ctx: &mut RuleContext,
    player: EntityId,
    hazard: EntityId,
    lives: f32,
    stun_ticks: u32,
    respawn: bool,
    consume_hazard: bool,
) -> Option<Resolution> {
    let p = ctx.world.get_mut(player)?;
    // Invulnerable while stunned so a lingering contact drains once
    if p.is_stunned() {
        return None;
    }
    p.stun_ticks = stun_ticks;
    if respawn {
        p.pos = p.spawn_pos;
        p.vel = glam::Vec2::ZERO;
    }
    let at = p.center();
    let color = ruleset.color(p);

    if consume_hazard {
        ctx.world.despawn(hazard);
    }
    ctx.session.lose_lives(lives);
    ctx.burst(Burst::hit(at, color));
    ruleset.on_hurt(ctx, player, hazard);

    Some(Resolution::Hurt { player, lives })
}

fn apply_collect(
    ruleset: &mut dyn Ruleset,
    ctx: &mut RuleContext,
    collector: EntityId,
    pickup: EntityId,
) -> Option<Resolution> {
    let item = ctx.world.get(pickup)?.clone();
    ctx.world.despawn(pickup);
    ctx.session.add_score(item.value);
    ctx.burst(Burst::sparkle(item.center(), ruleset.color(&item)));
    ruleset.on_collect(ctx, collector, &item);

    Some(Resolution::Collected {
        pickup,
        value: item.value,
    })
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::sim::entity::{Boundary, Entity};
    use crate::sim::geometry::Shape;
    use crate::sim::state::{Outcome, Session};
    use crate::sim::testing::Harness;
    use crate::sim::world::World;

    /// Minimal rules: the test places every entity itself
    struct Sandbox {
        table: PolicyTable,
        lives: f32,
        collected: u32,
        destroyed: Vec<EntityId>,
        win_at: Option<u64>,
    }

    impl Ruleset for Sandbox {
        fn name(&self) -> &'static str {
            "sandbox"
        }

        fn initial_lives(&self) -> f32 {
            self.lives
        }

        fn policies(&self) -> PolicyTable {
            self.table.clone()
        }

        fn setup(&mut self, _ctx: &mut RuleContext) {}

        fn update(&mut self, _ctx: &mut RuleContext, _input: &InputFrame) {}

        fn on_collect(&mut self, _ctx: &mut RuleContext, _collector: EntityId, _pickup: &Entity) {
            self.collected += 1;
        }

        fn on_destroyed(&mut self, _ctx: &mut RuleContext, destroyed: &Entity) {
            self.destroyed.push(destroyed.id);
        }

        fn is_won(&self, _world: &World, session: &Session) -> bool {
            self.win_at.is_some_and(|score| session.score() >= score)
        }
    }

    fn sandbox(table: PolicyTable) -> Harness<Sandbox> {
        sandbox_with(table, 3.0, None)
    }

    fn sandbox_with(table: PolicyTable, lives: f32, win_at: Option<u64>) -> Harness<Sandbox> {
        let rules = Sandbox {
            table,
            lives,
            collected: 0,
            destroyed: Vec::new(),
            win_at,
        };
        Harness::new(rules, 1)
    }

    fn player() -> Entity {
        Entity::new(EntityKind::Player, Vec2::new(100.0, 100.0), Shape::rect(20.0, 20.0))
    }

    #[test]
    fn test_pickup_collected_once() {
        let mut h = sandbox(PolicyTable::new().with(EntityKind::Player, EntityKind::Pickup, Policy::Collect));
        h.world.spawn(player());
        let pickup = h.world.spawn(
            Entity::new(EntityKind::Pickup, Vec2::new(110.0, 110.0), Shape::circle(5.0)).with_value(25),
        );

        let report = h.idle();
        assert_eq!(h.session.score(), 25);
        assert!(!h.world.is_alive(pickup));
        assert_eq!(report.events.len(), 1);
        assert!(matches!(
            report.events[0].resolution,
            Resolution::Collected { value: 25, .. }
        ));

        // Still superimposed next tick would be a second award; it is gone
        h.idle();
        h.idle();
        assert_eq!(h.session.score(), 25);
        assert_eq!(h.rules.collected, 1);
        assert!(!h.particles.is_empty());
    }

    #[test]
    fn test_projectile_consumed_and_enemy_killed() {
        let mut h = sandbox(PolicyTable::new().with(EntityKind::Projectile, EntityKind::Enemy, Policy::Damage));
        let enemy = h.world.spawn(
            Entity::new(EntityKind::Enemy, Vec2::new(200.0, 100.0), Shape::circle(10.0))
                .with_health(2.0)
                .with_value(100),
        );
        let first = h.world.spawn(
            Entity::new(EntityKind::Projectile, Vec2::new(200.0, 105.0), Shape::circle(2.0)),
        );
        let second = h.world.spawn(
            Entity::new(EntityKind::Projectile, Vec2::new(195.0, 100.0), Shape::circle(2.0)),
        );
        let third = h.world.spawn(
            Entity::new(EntityKind::Projectile, Vec2::new(205.0, 100.0), Shape::circle(2.0)),
        );

        let report = h.idle();
        assert!(!h.world.is_alive(enemy));
        assert!(!h.world.is_alive(first));
        assert!(!h.world.is_alive(second));
        // The enemy died before the third shot was resolved
        assert!(h.world.is_alive(third));
        assert_eq!(report.events.len(), 2);
        assert_eq!(h.session.score(), 100);
        assert_eq!(h.rules.destroyed, vec![enemy]);
    }

    #[test]
    fn test_hurt_respects_stun() {
        let mut h = sandbox(PolicyTable::new().with(
            EntityKind::Player,
            EntityKind::Enemy,
            Policy::Hurt {
                lives: 0.5,
                stun_ticks: 3,
                respawn: false,
                consume_hazard: false,
            },
        ));
        h.world.spawn(player());
        h.world.spawn(Entity::new(EntityKind::Enemy, Vec2::new(105.0, 105.0), Shape::circle(4.0)));

        h.idle();
        assert_eq!(h.session.lives(), 2.5);
        // Stunned for the next ticks
        h.idle();
        h.idle();
        assert_eq!(h.session.lives(), 2.5);
        h.idle();
        assert_eq!(h.session.lives(), 2.0);
    }

    #[test]
    fn test_hurt_to_game_over_once() {
        let mut h = sandbox_with(
            PolicyTable::new().with(EntityKind::Player, EntityKind::Enemy, Policy::hurt()),
            1.0,
            None,
        );
        h.world.spawn(player());
        h.world.spawn(Entity::new(EntityKind::Enemy, Vec2::new(105.0, 105.0), Shape::circle(4.0)));
        h.world.spawn(Entity::new(EntityKind::Enemy, Vec2::new(110.0, 110.0), Shape::circle(4.0)));

        let report = h.idle();
        assert!(report.ended);
        assert!(h.session.game_over());
        assert_eq!(h.session.lives(), 0.0);
        assert_eq!(h.session.state(), SessionState::Ended(Outcome::Over));
    }

    #[test]
    fn test_win_predicate_ends_session() {
        let mut h = sandbox_with(
            PolicyTable::new().with(EntityKind::Player, EntityKind::Pickup, Policy::Collect),
            3.0,
            Some(10),
        );
        h.world.spawn(player());
        h.world.spawn(Entity::new(EntityKind::Pickup, Vec2::new(105.0, 105.0), Shape::circle(4.0)).with_value(10));

        let report = h.idle();
        assert!(report.ended);
        assert!(h.session.game_won());
        assert!(!h.session.game_over());
    }

    #[test]
    fn test_leavers_culled_before_collisions() {
        let mut h = sandbox(PolicyTable::new().with(EntityKind::Projectile, EntityKind::Enemy, Policy::Damage));
        // Both move far outside the playfield this tick
        let enemy = h.world.spawn(
            Entity::new(EntityKind::Enemy, Vec2::new(790.0, 10.0), Shape::circle(5.0))
                .with_vel(Vec2::new(500.0, 0.0)),
        );
        h.world.spawn(
            Entity::new(EntityKind::Projectile, Vec2::new(790.0, 10.0), Shape::circle(5.0))
                .with_vel(Vec2::new(500.0, 0.0)),
        );
        let report = h.idle();
        assert_eq!(report.culled.len(), 2);
        assert!(report.events.is_empty());
        assert!(!h.world.is_alive(enemy));
        assert_eq!(h.session.score(), 0);
    }

    #[test]
    fn test_shot_leaving_top_cannot_hit_incoming_enemy() {
        let mut h = sandbox(PolicyTable::new().with(EntityKind::Projectile, EntityKind::Enemy, Policy::Damage));
        // Enemy waiting above the screen, not yet in view
        let enemy = h.world.spawn(
            Entity::new(EntityKind::Enemy, Vec2::new(400.0, -20.0), Shape::circle(12.0)).with_value(10),
        );
        let shot = h.world.spawn(
            Entity::new(EntityKind::Projectile, Vec2::new(400.0, 5.0), Shape::circle(3.0))
                .with_vel(Vec2::new(0.0, -9.0)),
        );

        // Fully above the top edge after one tick: gone that same tick
        let report = h.idle();
        assert_eq!(report.culled, vec![shot]);
        assert!(!h.world.is_alive(shot));
        assert!(h.world.is_alive(enemy));

        h.idle();
        assert!(h.world.is_alive(enemy));
        assert_eq!(h.session.score(), 0);
        assert!(h.rules.destroyed.is_empty());
    }

    #[test]
    fn test_nan_velocity_repaired() {
        let mut h = sandbox(PolicyTable::new());
        let id = h.world.spawn(
            Entity::new(EntityKind::Obstacle, Vec2::new(50.0, 50.0), Shape::rect(4.0, 4.0))
                .with_vel(Vec2::new(f32::NAN, 1.0))
                .with_boundary(Boundary::Free),
        );
        let report = h.idle();
        assert_eq!(report.sanitized, 1);
        let e = h.world.get(id).unwrap();
        assert!(e.pos.is_finite() && e.vel.is_finite());
    }
}
