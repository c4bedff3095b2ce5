//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No DOM, canvas or wall-clock access (hosts feed frames and events in)

pub mod clock;
pub mod collision;
pub mod controller;
pub mod entity;
pub mod geometry;
pub mod particles;
pub mod ruleset;
pub mod state;
pub mod tick;
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{FixedClock, FrameTimer};
pub use collision::{CollisionEvent, Contact, Policy, PolicyTable, Resolution, collides};
pub use controller::{Controller, ObserverId};
pub use entity::{Boundary, Entity, EntityId, EntityKind};
pub use geometry::{Aabb, Shape};
pub use particles::{Burst, Particle, ParticleSystem};
pub use ruleset::{RuleContext, Ruleset};
pub use state::{Outcome, Session, SessionState, Snapshot};
pub use tick::TickReport;
pub use world::World;
