//! Draw-command renderer
//!
//! `render` is a pure function of the world: it reads a session and produces
//! a `Frame` of draw commands in logical coordinates. Hosts replay the frame
//! onto whatever surface they have (see `platform::web` for the canvas).

pub mod hud;
pub mod shapes;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::Rgba;
use crate::settings::Settings;
use crate::sim::particles::ParticleSystem;
use crate::sim::ruleset::Ruleset;
use crate::sim::state::Session;
use crate::sim::world::World;

/// Horizontal text anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

/// One drawing primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    /// Fill the whole surface
    Clear { color: Rgba },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgba,
    },
    Circle {
        center: Vec2,
        radius: f32,
        color: Rgba,
    },
    Line {
        from: Vec2,
        to: Vec2,
        width: f32,
        color: Rgba,
    },
    /// `pos` is the baseline anchor
    Text {
        pos: Vec2,
        text: String,
        size: f32,
        color: Rgba,
        align: TextAlign,
    },
}

/// Ordered draw commands for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Logical surface size
    pub width: f32,
    pub height: f32,
    commands: Vec<DrawCommand>,
}

impl Frame {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            commands: Vec::with_capacity(128),
        }
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        self.push(DrawCommand::Rect { x, y, w, h, color });
    }

    pub fn circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        self.push(DrawCommand::Circle {
            center,
            radius,
            color,
        });
    }

    pub fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Rgba) {
        self.push(DrawCommand::Line {
            from,
            to,
            width,
            color,
        });
    }

    pub fn text(&mut self, pos: Vec2, text: impl Into<String>, size: f32, color: Rgba, align: TextAlign) {
        self.push(DrawCommand::Text {
            pos,
            text: text.into(),
            size,
            color,
            align,
        });
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Everything the renderer may read
pub struct RenderView<'a> {
    pub world: &'a World,
    pub session: &'a Session,
    pub particles: &'a ParticleSystem,
    pub ruleset: &'a dyn Ruleset,
    pub settings: &'a Settings,
}

/// Build the frame for the current state.
///
/// Order: background, decorations, entities, particles, HUD, overlay.
pub fn render(view: &RenderView) -> Frame {
    let world = view.world;
    let mut frame = Frame::new(world.width, world.height);

    frame.push(DrawCommand::Clear {
        color: view.ruleset.background(),
    });
    view.ruleset.decorate(world, &mut frame);

    for entity in world.iter() {
        shapes::entity(&mut frame, entity, view.ruleset.color(entity));
    }

    let size_scale = if view.settings.reduced_motion { 0.5 } else { 1.0 };
    for p in view.particles.iter() {
        frame.circle(p.pos, p.size * size_scale, shapes::with_alpha(p.color, p.alpha()));
    }

    hud::draw(&mut frame, view.session, view.ruleset.fractional_lives());
    hud::overlay(&mut frame, view.session.state());

    frame
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::rulesets::paddle::Paddle;
    use crate::sim::entity::{Entity, EntityKind};
    use crate::sim::geometry::Shape;
    use crate::sim::particles::Burst;

    fn view_parts() -> (World, Session, ParticleSystem, Paddle, Settings) {
        let mut world = World::new(800.0, 500.0);
        world.spawn(Entity::new(EntityKind::Enemy, Vec2::new(10.0, 10.0), Shape::circle(5.0)));
        let mut particles = ParticleSystem::new(16, 1);
        particles.burst(Burst::hit(Vec2::new(50.0, 50.0), [1.0, 0.0, 0.0, 1.0]));
        (world, Session::new(3.0, 0), particles, Paddle::new(), Settings::default())
    }

    #[test]
    fn test_render_order() {
        let (world, session, particles, ruleset, settings) = view_parts();
        let frame = render(&RenderView {
            world: &world,
            session: &session,
            particles: &particles,
            ruleset: &ruleset,
            settings: &settings,
        });

        assert!(matches!(frame.commands()[0], DrawCommand::Clear { .. }));
        let entity_at = frame
            .commands()
            .iter()
            .position(|c| matches!(c, DrawCommand::Circle { radius, .. } if *radius == 5.0))
            .unwrap();
        let first_text = frame
            .commands()
            .iter()
            .position(|c| matches!(c, DrawCommand::Text { .. }))
            .unwrap();
        assert!(entity_at < first_text, "HUD draws over the world");
        assert_eq!(frame.width, 800.0);
    }

    #[test]
    fn test_render_is_pure() {
        let (world, session, particles, ruleset, settings) = view_parts();
        let before = (world.ids(), session.snapshot(), particles.len());
        let view = RenderView {
            world: &world,
            session: &session,
            particles: &particles,
            ruleset: &ruleset,
            settings: &settings,
        };
        let a = render(&view);
        let b = render(&view);
        assert_eq!(a, b);
        assert_eq!(before, (world.ids(), session.snapshot(), particles.len()));
    }

    #[test]
    fn test_particle_alpha_follows_life() {
        let (world, session, mut particles, ruleset, settings) = view_parts();
        particles.update();
        let expected = 17.0 / 18.0;
        let frame = render(&RenderView {
            world: &world,
            session: &session,
            particles: &particles,
            ruleset: &ruleset,
            settings: &settings,
        });
        let faded = frame
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Circle { color, .. } if (color[3] - expected).abs() < 1e-5))
            .count();
        assert_eq!(faded, particles.len());
    }
}
