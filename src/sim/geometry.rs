//! Bounding shapes and overlap tests
//!
//! Rects are anchored at their top-left corner, circles at their centre.
//! Every test here is symmetric in its arguments.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Collision footprint of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Axis-aligned box, `pos` is the top-left corner
    Rect { w: f32, h: f32 },
    /// Circle, `pos` is the centre
    Circle { radius: f32 },
}

impl Shape {
    pub fn rect(w: f32, h: f32) -> Self {
        Shape::Rect { w, h }
    }

    pub fn circle(radius: f32) -> Self {
        Shape::Circle { radius }
    }

    /// Width and height of the shape's bounding box
    pub fn extent(&self) -> Vec2 {
        match *self {
            Shape::Rect { w, h } => Vec2::new(w, h),
            Shape::Circle { radius } => Vec2::splat(radius * 2.0),
        }
    }

    /// Offset from `pos` to the shape's centre
    pub fn center_offset(&self) -> Vec2 {
        match *self {
            Shape::Rect { w, h } => Vec2::new(w / 2.0, h / 2.0),
            Shape::Circle { .. } => Vec2::ZERO,
        }
    }
}

/// Axis-aligned bounding box (top-left + size)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Bounding box of a shape placed at `pos`
    pub fn of(pos: Vec2, shape: Shape) -> Self {
        match shape {
            Shape::Rect { w, h } => Self::new(pos.x, pos.y, w, h),
            Shape::Circle { radius } => {
                Self::new(pos.x - radius, pos.y - radius, radius * 2.0, radius * 2.0)
            }
        }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Strict overlap: boxes that only share an edge do not intersect
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Closest point inside the box to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x.clamp(self.x, self.right()), p.y.clamp(self.y, self.bottom()))
    }

    /// Grow the box by `margin` on every side
    pub fn inflate(&self, margin: f32) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.w + margin * 2.0,
            self.h + margin * 2.0,
        )
    }
}

/// Circle-circle test: centre distance <= sum of radii
#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let reach = ra + rb;
    a.distance_squared(b) <= reach * reach
}

/// Circle-box test using the closest point on the box
#[inline]
pub fn circle_rect_overlap(center: Vec2, radius: f32, rect: &Aabb) -> bool {
    let closest = rect.closest_point(center);
    center.distance_squared(closest) <= radius * radius
}

/// Overlap test between two placed shapes
pub fn shapes_overlap(pos_a: Vec2, a: Shape, pos_b: Vec2, b: Shape) -> bool {
    match (a, b) {
        (Shape::Rect { .. }, Shape::Rect { .. }) => {
            Aabb::of(pos_a, a).overlaps(&Aabb::of(pos_b, b))
        }
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circles_overlap(pos_a, ra, pos_b, rb)
        }
        (Shape::Circle { radius }, Shape::Rect { .. }) => {
            circle_rect_overlap(pos_a, radius, &Aabb::of(pos_b, b))
        }
        (Shape::Rect { .. }, Shape::Circle { radius }) => {
            circle_rect_overlap(pos_b, radius, &Aabb::of(pos_a, a))
        }
    }
}
