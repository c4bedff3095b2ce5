//! Pluggable game rules
//!
//! The engine owns the loop, world, collisions, particles and lifecycle.
//! A `Ruleset` supplies what differs between games: spawning, the collision
//! policy table, custom contact handling, win predicate and colours.

use glam::Vec2;
use rand_pcg::Pcg32;

use super::collision::{CollisionEvent, PolicyTable};
use super::entity::{Entity, EntityId, EntityKind};
use super::particles::{Burst, ParticleSystem};
use super::state::Session;
use super::world::World;
use crate::consts::{DEFAULT_HEIGHT, DEFAULT_LIVES, DEFAULT_WIDTH};
use crate::platform::input::InputFrame;
use crate::renderer::Frame;
use crate::settings::Settings;
use crate::Rgba;

/// Mutable view of one session handed to ruleset hooks
pub struct RuleContext<'a> {
    pub world: &'a mut World,
    pub session: &'a mut Session,
    pub particles: &'a mut ParticleSystem,
    /// Gameplay RNG, seeded per session
    pub rng: &'a mut Pcg32,
    pub settings: &'a Settings,
    /// Tick number within the session (0 during setup)
    pub tick: u64,
}

impl RuleContext<'_> {
    /// Spawn a particle burst, honouring the particle settings
    pub fn burst(&mut self, mut burst: Burst) -> usize {
        if !self.settings.particles {
            return 0;
        }
        burst.count = self.settings.burst_count(burst.count);
        if self.settings.reduced_motion {
            burst.speed *= 0.5;
        }
        self.particles.burst(burst)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.world.width, self.world.height)
    }
}

/// Game-specific behaviour plugged into the engine
pub trait Ruleset {
    /// Catalog name
    fn name(&self) -> &'static str;

    /// Logical playfield size
    fn logical_size(&self) -> Vec2 {
        Vec2::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Lives at the start of a session
    fn initial_lives(&self) -> f32 {
        DEFAULT_LIVES
    }

    /// Lives are a continuous health pool (HUD shows a bar instead of pips)
    fn fractional_lives(&self) -> bool {
        false
    }

    /// Collision policy per kind pair
    fn policies(&self) -> PolicyTable;

    /// Populate a fresh world. Must also reset any state the ruleset keeps,
    /// so a restart never inherits the previous session.
    fn setup(&mut self, ctx: &mut RuleContext);

    /// Per-tick rules: steering, spawning, timers. Runs before motion.
    fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame);

    /// Handle a `Policy::Custom` pair. Return true if it did something.
    fn resolve_custom(&mut self, _ctx: &mut RuleContext, _a: EntityId, _b: EntityId) -> bool {
        false
    }

    /// A pickup was collected by `collector`
    fn on_collect(&mut self, _ctx: &mut RuleContext, _collector: EntityId, _pickup: &Entity) {}

    /// An entity was destroyed by damage
    fn on_destroyed(&mut self, _ctx: &mut RuleContext, _destroyed: &Entity) {}

    /// The player was hurt by `hazard`
    fn on_hurt(&mut self, _ctx: &mut RuleContext, _player: EntityId, _hazard: EntityId) {}

    /// Runs once all contacts of the tick are resolved
    fn after_collisions(&mut self, _ctx: &mut RuleContext, _events: &[CollisionEvent]) {}

    /// Win predicate, checked once per tick
    fn is_won(&self, _world: &World, _session: &Session) -> bool {
        false
    }

    fn background(&self) -> Rgba {
        [0.04, 0.05, 0.09, 1.0]
    }

    /// Fill colour for an entity
    fn color(&self, entity: &Entity) -> Rgba {
        match entity.kind {
            EntityKind::Player => [0.3, 0.8, 1.0, 1.0],
            EntityKind::Obstacle => [0.55, 0.55, 0.6, 1.0],
            EntityKind::Projectile => [1.0, 0.95, 0.5, 1.0],
            EntityKind::Pickup => [0.4, 1.0, 0.5, 1.0],
            EntityKind::Enemy => [1.0, 0.35, 0.35, 1.0],
        }
    }

    /// Draw static scenery between the background and the entities
    fn decorate(&self, _world: &World, _frame: &mut Frame) {}
}
