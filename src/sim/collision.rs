//! Collision detection and the per-kind resolution policy table
//!
//! Detection is a pairwise overlap test over live entities in spawn order.
//! What a contact *does* is looked up by the unordered pair of entity kinds;
//! the tick applies the policy (see `tick::resolve_pair`).

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId, EntityKind};
use super::geometry::{Aabb, Shape};
use super::world::World;

/// What happens when two kinds touch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Policy {
    /// No interaction
    Ignore,
    /// Projectile side damages the other and is consumed
    Damage,
    /// Player side loses lives
    Hurt {
        /// Lives removed per contact (fractional allowed)
        lives: f32,
        /// Invulnerability ticks granted after the hit
        stun_ticks: u32,
        /// Move the player back to its spawn point
        respawn: bool,
        /// Remove the hazard that caused the hit
        consume_hazard: bool,
    },
    /// Pickup side is consumed and its value scored
    Collect,
    /// Ruleset decides
    Custom,
}

impl Policy {
    /// One life, short stun, hazard removed
    pub const fn hurt() -> Self {
        Policy::Hurt {
            lives: 1.0,
            stun_ticks: 60,
            respawn: false,
            consume_hazard: true,
        }
    }
}

/// Unordered (kind, kind) to policy lookup
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    rules: HashMap<(EntityKind, EntityKind), Policy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: EntityKind, b: EntityKind) -> (EntityKind, EntityKind) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Builder form of [`PolicyTable::set`]
    pub fn with(mut self, a: EntityKind, b: EntityKind, policy: Policy) -> Self {
        self.set(a, b, policy);
        self
    }

    pub fn set(&mut self, a: EntityKind, b: EntityKind, policy: Policy) {
        self.rules.insert(Self::key(a, b), policy);
    }

    /// Policy for a pair; unlisted pairs are ignored
    pub fn get(&self, a: EntityKind, b: EntityKind) -> Policy {
        self.rules
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or(Policy::Ignore)
    }
}

/// What a resolved contact did
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    Damaged {
        target: EntityId,
        amount: f32,
        killed: bool,
    },
    Hurt {
        player: EntityId,
        lives: f32,
    },
    Collected {
        pickup: EntityId,
        value: u64,
    },
    Custom,
}

/// One applied contact between two entities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub a: EntityId,
    pub b: EntityId,
    pub resolution: Resolution,
}

/// True if both entities are alive and their shapes overlap
pub fn collides(a: &Entity, b: &Entity) -> bool {
    a.alive && b.alive && a.overlaps(b)
}

/// Overlapping pairs with a non-ignored policy, in spawn order (lower id first)
pub fn candidate_pairs(world: &World, table: &PolicyTable) -> Vec<(EntityId, EntityId)> {
    let entities: Vec<&Entity> = world.iter().collect();
    let mut pairs = Vec::new();
    for (i, a) in entities.iter().enumerate() {
        for b in &entities[i + 1..] {
            if table.get(a.kind, b.kind) != Policy::Ignore && collides(a, b) {
                pairs.push((a.id, b.id));
            }
        }
    }
    pairs
}

/// Contact details for physical responses (bounces, pushes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit normal pointing from `b` toward `a`
    pub normal: Vec2,
    /// Overlap depth along the normal
    pub penetration: f32,
}

/// Normal and depth of the overlap between `a` and `b`, if they overlap.
pub fn contact(a: &Entity, b: &Entity) -> Option<Contact> {
    if !a.overlaps(b) {
        return None;
    }
    let found = match (a.shape, b.shape) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            let delta = a.pos - b.pos;
            let dist = delta.length();
            let normal = if dist > 1e-6 { delta / dist } else { Vec2::NEG_Y };
            Contact {
                normal,
                penetration: (ra + rb - dist).max(0.0),
            }
        }
        (Shape::Circle { radius }, Shape::Rect { .. }) => circle_box_contact(a.pos, radius, &b.aabb()),
        (Shape::Rect { .. }, Shape::Circle { radius }) => {
            let c = circle_box_contact(b.pos, radius, &a.aabb());
            Contact {
                normal: -c.normal,
                penetration: c.penetration,
            }
        }
        (Shape::Rect { .. }, Shape::Rect { .. }) => box_box_contact(&a.aabb(), &b.aabb()),
    };
    Some(found)
}

/// Normal points from the box toward the circle
fn circle_box_contact(center: Vec2, radius: f32, rect: &Aabb) -> Contact {
    let closest = rect.closest_point(center);
    let delta = center - closest;
    let dist = delta.length();
    if dist > 1e-6 {
        return Contact {
            normal: delta / dist,
            penetration: (radius - dist).max(0.0),
        };
    }

    // Centre inside the box: push out through the nearest face
    let faces = [
        (center.x - rect.x, Vec2::NEG_X),
        (rect.right() - center.x, Vec2::X),
        (center.y - rect.y, Vec2::NEG_Y),
        (rect.bottom() - center.y, Vec2::Y),
    ];
    let (depth, normal) = faces
        .into_iter()
        .min_by(|l, r| l.0.total_cmp(&r.0))
        .unwrap_or((0.0, Vec2::NEG_Y));
    Contact {
        normal,
        penetration: depth + radius,
    }
}

/// Minimum-translation axis between two boxes; normal points from `b` to `a`
fn box_box_contact(a: &Aabb, b: &Aabb) -> Contact {
    let overlap_x = a.right().min(b.right()) - a.x.max(b.x);
    let overlap_y = a.bottom().min(b.bottom()) - a.y.max(b.y);
    let (ca, cb) = (a.center(), b.center());
    if overlap_x < overlap_y {
        Contact {
            normal: if ca.x < cb.x { Vec2::NEG_X } else { Vec2::X },
            penetration: overlap_x,
        }
    } else {
        Contact {
            normal: if ca.y < cb.y { Vec2::NEG_Y } else { Vec2::Y },
            penetration: overlap_y,
        }
    }
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Bounce `mover` off a contact: push it out and reflect its velocity if it
/// is heading into the surface.
pub fn bounce(mover: &mut Entity, contact: Contact) {
    mover.pos += contact.normal * contact.penetration;
    if mover.vel.dot(contact.normal) < 0.0 {
        mover.vel = reflect_velocity(mover.vel, contact.normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(kind: EntityKind, x: f32, y: f32, shape: Shape) -> Entity {
        Entity::new(kind, Vec2::new(x, y), shape)
    }

    #[test]
    fn test_policy_lookup_is_unordered() {
        let table = PolicyTable::new().with(EntityKind::Projectile, EntityKind::Enemy, Policy::Damage);
        assert_eq!(table.get(EntityKind::Enemy, EntityKind::Projectile), Policy::Damage);
        assert_eq!(table.get(EntityKind::Projectile, EntityKind::Enemy), Policy::Damage);
        assert_eq!(table.get(EntityKind::Player, EntityKind::Enemy), Policy::Ignore);
    }

    #[test]
    fn test_candidate_pairs_spawn_order() {
        let mut world = World::new(200.0, 200.0);
        let table = PolicyTable::new()
            .with(EntityKind::Projectile, EntityKind::Enemy, Policy::Damage)
            .with(EntityKind::Player, EntityKind::Pickup, Policy::Collect);

        let enemy = world.spawn(at(EntityKind::Enemy, 50.0, 50.0, Shape::circle(10.0)));
        let shot = world.spawn(at(EntityKind::Projectile, 55.0, 50.0, Shape::circle(2.0)));
        let player = world.spawn(at(EntityKind::Player, 100.0, 100.0, Shape::rect(10.0, 10.0)));
        let pickup = world.spawn(at(EntityKind::Pickup, 105.0, 105.0, Shape::circle(4.0)));
        // Overlaps the enemy but the pair is ignored
        world.spawn(at(EntityKind::Obstacle, 50.0, 50.0, Shape::rect(5.0, 5.0)));

        let pairs = candidate_pairs(&world, &table);
        assert_eq!(pairs, vec![(enemy, shot), (player, pickup)]);
    }

    #[test]
    fn test_dead_entities_do_not_collide() {
        let a = at(EntityKind::Enemy, 0.0, 0.0, Shape::circle(5.0));
        let mut b = at(EntityKind::Projectile, 1.0, 0.0, Shape::circle(5.0));
        assert!(collides(&a, &b));
        b.alive = false;
        assert!(!collides(&a, &b));
    }

    #[test]
    fn test_ball_hits_paddle_top() {
        let ball = at(EntityKind::Projectile, 50.0, 96.0, Shape::circle(8.0)).with_vel(Vec2::new(3.0, 4.0));
        let paddle = at(EntityKind::Player, 20.0, 100.0, Shape::rect(80.0, 10.0));
        let c = contact(&ball, &paddle).unwrap();
        assert_eq!(c.normal, Vec2::NEG_Y);
        assert!((c.penetration - 4.0).abs() < 1e-5);

        let mut ball = ball;
        bounce(&mut ball, c);
        assert_eq!(ball.vel, Vec2::new(3.0, -4.0));
        assert!(!ball.overlaps(&paddle) || ball.pos.y <= 92.0 + 1e-4);
    }

    #[test]
    fn test_contact_normals_are_opposite() {
        let ball = at(EntityKind::Projectile, 50.0, 96.0, Shape::circle(8.0));
        let brick = at(EntityKind::Obstacle, 20.0, 100.0, Shape::rect(80.0, 10.0));
        let ab = contact(&ball, &brick).unwrap();
        let ba = contact(&brick, &ball).unwrap();
        assert_eq!(ab.normal, -ba.normal);
        assert_eq!(ab.penetration, ba.penetration);
    }

    #[test]
    fn test_box_box_contact_axis() {
        let a = at(EntityKind::Player, 0.0, 0.0, Shape::rect(10.0, 10.0));
        let b = at(EntityKind::Obstacle, 8.0, 2.0, Shape::rect(10.0, 10.0));
        let c = contact(&a, &b).unwrap();
        assert_eq!(c.normal, Vec2::NEG_X);
        assert!((c.penetration - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_reflect_velocity() {
        // Ball moving right, hits vertical wall (normal pointing left)
        let velocity = Vec2::new(100.0, 0.0);
        let normal = Vec2::new(-1.0, 0.0);

        let reflected = reflect_velocity(velocity, normal);
        assert!((reflected.x - (-100.0)).abs() < 0.001);
        assert!(reflected.y.abs() < 0.001);
    }

    fn shape_strategy() -> impl Strategy<Value = Shape> {
        prop_oneof![
            (0.5f32..60.0, 0.5f32..60.0).prop_map(|(w, h)| Shape::rect(w, h)),
            (0.5f32..40.0).prop_map(Shape::circle),
        ]
    }

    proptest! {
        #[test]
        fn prop_collision_is_symmetric(
            ax in -100.0f32..100.0, ay in -100.0f32..100.0, sa in shape_strategy(),
            bx in -100.0f32..100.0, by in -100.0f32..100.0, sb in shape_strategy(),
        ) {
            let a = at(EntityKind::Enemy, ax, ay, sa);
            let b = at(EntityKind::Projectile, bx, by, sb);
            prop_assert_eq!(collides(&a, &b), collides(&b, &a));
        }

        #[test]
        fn prop_contact_normal_is_unit(
            ax in -50.0f32..50.0, ay in -50.0f32..50.0, sa in shape_strategy(),
            bx in -50.0f32..50.0, by in -50.0f32..50.0, sb in shape_strategy(),
        ) {
            let a = at(EntityKind::Enemy, ax, ay, sa);
            let b = at(EntityKind::Obstacle, bx, by, sb);
            if let Some(c) = contact(&a, &b) {
                prop_assert!(c.normal.is_finite());
                prop_assert!((c.normal.length() - 1.0).abs() < 1e-3);
                prop_assert!(c.penetration >= 0.0);
            }
        }
    }
}
