//! Arcade Engine - fixed-tick simulation core for browser minigames
//!
//! Core modules:
//! - `sim`: Deterministic simulation (world, collisions, particles, lifecycle)
//! - `renderer`: Pure draw-command generation from the world
//! - `platform`: Input normalization and the browser host
//! - `bridge`: Host-facing command/event channels
//! - `rulesets`: Concrete games plugged into the engine
//! - `settings`: Data-driven engine configuration

pub mod bridge;
pub mod error;
pub mod platform;
pub mod renderer;
pub mod rulesets;
pub mod settings;
pub mod sim;

pub use error::EngineError;
pub use settings::{QualityPreset, Settings};

use glam::Vec2;

/// Linear RGBA colour, components in 0-1
pub type Rgba = [f32; 4];

/// Engine configuration constants
pub mod consts {
    /// Reference simulation rate
    pub const TICK_RATE_HZ: u32 = 60;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest frame delta fed into the accumulator (seconds)
    pub const MAX_FRAME_DELTA: f32 = 0.25;

    /// Default logical playfield
    pub const DEFAULT_WIDTH: f32 = 800.0;
    pub const DEFAULT_HEIGHT: f32 = 500.0;

    /// How far outside the playfield a not-yet-visible entity may spawn
    pub const CULL_MARGIN: f32 = 64.0;

    /// Starting lives when a ruleset does not override them
    pub const DEFAULT_LIVES: f32 = 3.0;
}

/// Normalize a vector, returning zero instead of NaN for (near) zero length.
#[inline]
pub fn safe_normalize(v: Vec2) -> Vec2 {
    if v.is_finite() {
        v.normalize_or_zero()
    } else {
        Vec2::ZERO
    }
}

/// Unit direction from `from` toward `to` (zero when the points coincide)
#[inline]
pub fn direction_to(from: Vec2, to: Vec2) -> Vec2 {
    safe_normalize(to - from)
}

/// Replace non-finite components with `fallback`'s
#[inline]
pub fn finite_or(v: Vec2, fallback: Vec2) -> Vec2 {
    Vec2::new(
        if v.x.is_finite() { v.x } else { fallback.x },
        if v.y.is_finite() { v.y } else { fallback.y },
    )
}
