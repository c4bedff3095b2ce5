//! Entity record shared by every ruleset

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::{Aabb, Shape, shapes_overlap};

/// Entity identifier, allocated in spawn order (never reused within a session)
pub type EntityId = u32;

/// Broad entity category used by the collision policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Obstacle,
    Projectile,
    Pickup,
    Enemy,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Player,
        EntityKind::Obstacle,
        EntityKind::Projectile,
        EntityKind::Pickup,
        EntityKind::Enemy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Obstacle => "obstacle",
            EntityKind::Projectile => "projectile",
            EntityKind::Pickup => "pickup",
            EntityKind::Enemy => "enemy",
        }
    }
}

/// What happens when an entity reaches the playfield edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// Position is clamped inside the playfield
    Clamp,
    /// Entity is destroyed the tick it leaves the playfield. Entities
    /// spawned outside get a margin until they first come into view.
    Cull,
    /// Ruleset handles the edge itself
    Free,
}

impl Boundary {
    fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Player => Boundary::Clamp,
            _ => Boundary::Cull,
        }
    }
}

/// A simulated object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub pos: Vec2,
    /// Logical units per tick
    pub vel: Vec2,
    pub shape: Shape,
    pub health: f32,
    pub max_health: f32,
    /// Damage dealt on contact (projectiles, hazards)
    pub damage: f32,
    /// Movement speed in units per tick (ruleset-interpreted)
    pub speed: f32,
    /// Ticks left before the entity expires
    pub ttl: Option<u32>,
    /// Score awarded when destroyed or collected
    pub value: u64,
    /// Ruleset-specific sub-type (pickup effect, enemy variant, ...)
    pub tag: u16,
    /// Facing angle in radians (turrets, guards)
    pub heading: f32,
    pub boundary: Boundary,
    /// Where the entity was spawned, used for respawn-on-hit
    pub spawn_pos: Vec2,
    /// Ticks of stun/invulnerability remaining
    pub stun_ticks: u32,
    /// Has overlapped the playfield at least once
    #[serde(default)]
    pub entered: bool,
    pub alive: bool,
}

impl Entity {
    pub fn new(kind: EntityKind, pos: Vec2, shape: Shape) -> Self {
        Self {
            id: 0,
            kind,
            pos,
            vel: Vec2::ZERO,
            shape,
            health: 1.0,
            max_health: 1.0,
            damage: 1.0,
            speed: 0.0,
            ttl: None,
            value: 0,
            tag: 0,
            heading: 0.0,
            boundary: Boundary::default_for(kind),
            spawn_pos: pos,
            stun_ticks: 0,
            entered: false,
            alive: true,
        }
    }

    pub fn with_vel(mut self, vel: Vec2) -> Self {
        self.vel = vel;
        self
    }

    pub fn with_health(mut self, health: f32) -> Self {
        self.health = health;
        self.max_health = health;
        self
    }

    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_ttl(mut self, ticks: u32) -> Self {
        self.ttl = Some(ticks);
        self
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }

    pub fn with_tag(mut self, tag: u16) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_heading(mut self, heading: f32) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::of(self.pos, self.shape)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.shape.center_offset()
    }

    /// Move so the shape's centre sits at `center`
    pub fn set_center(&mut self, center: Vec2) {
        self.pos = center - self.shape.center_offset();
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        shapes_overlap(self.pos, self.shape, other.pos, other.shape)
    }

    pub fn is_stunned(&self) -> bool {
        self.stun_ticks > 0
    }

    /// Health as a fraction of max health
    pub fn health_fraction(&self) -> f32 {
        if self.max_health > 0.0 {
            (self.health / self.max_health).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
