//! Draw helpers for entities and colour ramps

use glam::Vec2;

use super::Frame;
use crate::Rgba;
use crate::sim::entity::Entity;
use crate::sim::geometry::Shape;

/// Same colour with its alpha scaled by `alpha`
#[inline]
pub fn with_alpha(color: Rgba, alpha: f32) -> Rgba {
    [color[0], color[1], color[2], color[3] * alpha.clamp(0.0, 1.0)]
}

/// Interpolate color based on speed (slow=blue, medium=green, fast=red/orange)
pub fn velocity_color(speed: f32, min_speed: f32, max_speed: f32, alpha: f32) -> Rgba {
    let span = (max_speed - min_speed).max(f32::EPSILON);
    let t = ((speed - min_speed) / span).clamp(0.0, 1.0);

    // Color gradient: blue (slow) -> cyan -> green -> yellow -> orange -> red (fast)
    let (r, g, b) = if t < 0.25 {
        let u = t / 0.25;
        (0.2, 0.4 + 0.4 * u, 1.0)
    } else if t < 0.5 {
        let u = (t - 0.25) / 0.25;
        (0.2, 0.8, 1.0 - 0.6 * u)
    } else if t < 0.75 {
        let u = (t - 0.5) / 0.25;
        (0.2 + 0.8 * u, 0.8, 0.4 - 0.2 * u)
    } else {
        let u = (t - 0.75) / 0.25;
        (1.0, 0.8 - 0.5 * u, 0.2)
    };

    [r, g, b, alpha]
}

/// Red at empty, yellow at half, green at full
pub fn health_color(fraction: f32) -> Rgba {
    let t = fraction.clamp(0.0, 1.0);
    if t < 0.5 {
        [1.0, 0.25 + 1.3 * t, 0.2, 1.0]
    } else {
        [1.0 - 1.6 * (t - 0.5), 0.9, 0.3, 1.0]
    }
}

/// Horizontal bar with a dim track behind the filled part
pub fn bar(frame: &mut Frame, pos: Vec2, size: Vec2, fraction: f32) {
    let t = fraction.clamp(0.0, 1.0);
    frame.rect(pos.x, pos.y, size.x, size.y, [1.0, 1.0, 1.0, 0.15]);
    if t > 0.0 {
        frame.rect(pos.x, pos.y, size.x * t, size.y, health_color(t));
    }
}

/// Draw one entity. Stunned entities blink; damaged ones get a health bar.
pub fn entity(frame: &mut Frame, e: &Entity, color: Rgba) {
    let color = if e.is_stunned() && (e.stun_ticks / 4) % 2 == 1 {
        with_alpha(color, 0.35)
    } else {
        color
    };

    match e.shape {
        Shape::Rect { w, h } => frame.rect(e.pos.x, e.pos.y, w, h, color),
        Shape::Circle { radius } => frame.circle(e.pos, radius, color),
    }

    if e.max_health > 1.0 && e.health < e.max_health {
        let aabb = e.aabb();
        bar(
            frame,
            Vec2::new(aabb.x, aabb.y - 6.0),
            Vec2::new(aabb.w, 3.0),
            e.health_fraction(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::DrawCommand;
    use crate::sim::entity::EntityKind;

    #[test]
    fn test_velocity_color_ramp() {
        let slow = velocity_color(0.0, 2.0, 10.0, 1.0);
        let fast = velocity_color(20.0, 2.0, 10.0, 1.0);
        assert_eq!(slow, [0.2, 0.4, 1.0, 1.0]);
        assert_eq!(fast[0], 1.0);
        assert!(fast[2] < 0.5);
        // Degenerate range does not produce NaN
        assert!(velocity_color(5.0, 3.0, 3.0, 1.0).iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_damaged_entity_gets_bar() {
        let mut frame = Frame::new(100.0, 100.0);
        let mut e = Entity::new(EntityKind::Enemy, Vec2::new(50.0, 50.0), Shape::circle(10.0)).with_health(4.0);
        entity(&mut frame, &e, [1.0; 4]);
        assert_eq!(frame.len(), 1);

        e.health = 2.0;
        let mut frame = Frame::new(100.0, 100.0);
        entity(&mut frame, &e, [1.0; 4]);
        // Shape, track, fill
        assert_eq!(frame.len(), 3);
        assert!(matches!(frame.commands()[2], DrawCommand::Rect { w, .. } if (w - 10.0).abs() < 1e-5));
    }

    #[test]
    fn test_alpha_scaling_clamps() {
        assert_eq!(with_alpha([1.0, 1.0, 1.0, 0.5], 2.0)[3], 0.5);
        assert_eq!(with_alpha([1.0, 1.0, 1.0, 1.0], -1.0)[3], 0.0);
    }
}
