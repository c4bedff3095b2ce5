//! World model: every live entity of one session
//!
//! Entities are stored sorted by id (= spawn order) so iteration is stable.
//! Removal is two-phase: `despawn` marks an entity dead immediately (it is
//! invisible to every later query in the same tick) and `sweep` drops the
//! dead records at the end of the tick.

use glam::Vec2;

use super::entity::{Boundary, Entity, EntityId, EntityKind};
use super::geometry::Aabb;
use crate::finite_or;

/// Mutable record of all live entities
#[derive(Debug, Clone)]
pub struct World {
    pub width: f32,
    pub height: f32,
    entities: Vec<Entity>,
    next_id: EntityId,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            entities: Vec::new(),
            next_id: 1,
        }
    }

    /// Playfield rectangle
    pub fn bounds(&self) -> Aabb {
        Aabb::new(0.0, 0.0, self.width, self.height)
    }

    /// Add an entity, assigning it the next id
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        entity.alive = true;
        entity.entered = self.bounds().overlaps(&entity.aabb());
        self.entities.push(entity);
        id
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        self.entities.binary_search_by_key(&id, |e| e.id).ok()
    }

    /// Live entity by id
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index_of(id)
            .map(|i| &self.entities[i])
            .filter(|e| e.alive)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.index_of(id)
            .map(|i| &mut self.entities[i])
            .filter(|e| e.alive)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Mark an entity dead. Returns false if it was already gone.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        match self.get_mut(id) {
            Some(e) => {
                e.alive = false;
                true
            }
            None => false,
        }
    }

    /// Apply damage; the entity is despawned at zero health.
    ///
    /// Returns `Some(killed)` or `None` if the entity no longer exists.
    pub fn damage(&mut self, id: EntityId, amount: f32) -> Option<bool> {
        let e = self.get_mut(id)?;
        e.health -= amount;
        if e.health <= 0.0 {
            e.alive = false;
            Some(true)
        } else {
            Some(false)
        }
    }

    /// Live entities in spawn order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.alive)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut().filter(|e| e.alive)
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.iter().filter(move |e| e.kind == kind)
    }

    pub fn of_kind_mut(&mut self, kind: EntityKind) -> impl Iterator<Item = &mut Entity> {
        self.iter_mut().filter(move |e| e.kind == kind)
    }

    /// Ids of live entities of a kind, in spawn order
    pub fn ids_of(&self, kind: EntityKind) -> Vec<EntityId> {
        self.of_kind(kind).map(|e| e.id).collect()
    }

    /// Ids of all live entities, in spawn order
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(|e| e.id).collect()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Live entities counted over all kinds
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First live player entity
    pub fn player(&self) -> Option<&Entity> {
        self.of_kind(EntityKind::Player).next()
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.of_kind_mut(EntityKind::Player).next()
    }

    /// Advance motion by one tick and age timers. Expired entities die here.
    pub fn integrate(&mut self) {
        for e in self.iter_mut() {
            e.pos += e.vel;
            if e.stun_ticks > 0 {
                e.stun_ticks -= 1;
            }
            if let Some(ttl) = e.ttl.as_mut() {
                *ttl = ttl.saturating_sub(1);
                if *ttl == 0 {
                    e.alive = false;
                }
            }
        }
    }

    /// Clamp or cull entities at the playfield edge.
    ///
    /// A `Cull` entity that has been in view dies as soon as it is fully
    /// outside. One that has not entered yet survives within `entry_margin`.
    /// Returns the ids culled this call.
    pub fn enforce_bounds(&mut self, entry_margin: f32) -> Vec<EntityId> {
        let (width, height) = (self.width, self.height);
        let playfield = self.bounds();
        let entry_zone = playfield.inflate(entry_margin);
        let mut culled = Vec::new();

        for e in self.iter_mut() {
            match e.boundary {
                Boundary::Clamp => {
                    let extent = e.shape.extent();
                    let offset = e.shape.center_offset() - extent / 2.0;
                    let min = -offset;
                    let max = Vec2::new(width - extent.x, height - extent.y) - offset;
                    e.pos = e.pos.clamp(min, max.max(min));
                }
                Boundary::Cull => {
                    let aabb = e.aabb();
                    if playfield.overlaps(&aabb) {
                        e.entered = true;
                    } else if e.entered || !entry_zone.overlaps(&aabb) {
                        e.alive = false;
                        culled.push(e.id);
                    }
                }
                Boundary::Free => {}
            }
        }

        culled
    }

    /// Replace non-finite vectors. Returns how many entities needed fixing.
    pub fn sanitize(&mut self) -> usize {
        let mut fixed = 0;
        for e in self.iter_mut() {
            if !e.pos.is_finite() || !e.vel.is_finite() {
                e.pos = finite_or(e.pos, e.spawn_pos);
                e.vel = finite_or(e.vel, Vec2::ZERO);
                fixed += 1;
            }
        }
        fixed
    }

    /// Drop dead records
    pub fn sweep(&mut self) {
        self.entities.retain(|e| e.alive);
    }

    /// Remove every entity (ids keep counting up)
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
