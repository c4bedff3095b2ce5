//! Engine settings
//!
//! Handed in by the host as JSON; nothing here is persisted.

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_FRAME_DELTA, MAX_SUBSTEPS, TICK_RATE_HZ};
use crate::error::EngineError;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Maximum live particles for this preset
    pub fn max_particles(&self) -> usize {
        match self {
            QualityPreset::Low => 64,
            QualityPreset::Medium => 256,
            QualityPreset::High => 1024,
        }
    }

    /// Particles spawned per effect, as a fraction of what the ruleset asks for
    pub fn burst_scale(&self) -> f32 {
        match self {
            QualityPreset::Low => 0.35,
            QualityPreset::Medium => 0.7,
            QualityPreset::High => 1.0,
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset
    pub quality: QualityPreset,

    // === Clock ===
    /// Fixed simulation rate (ticks per simulated second)
    pub tick_rate_hz: u32,
    /// Cap on ticks run for one delivered frame
    pub max_substeps: u32,
    /// Longest frame delta (seconds) accepted before the backlog is clamped
    pub max_frame_delta: f32,

    // === Effects ===
    /// Particle effects (hits, pickups, explosions)
    pub particles: bool,
    /// Reduced motion (smaller, fewer particles)
    pub reduced_motion: bool,

    // === Input ===
    /// Left/right thirds of the surface act as move buttons on touch devices
    pub touch_zones: bool,

    /// Fixed session seed (None = derived from the host clock per start)
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,

            tick_rate_hz: TICK_RATE_HZ,
            max_substeps: MAX_SUBSTEPS,
            max_frame_delta: MAX_FRAME_DELTA,

            particles: true,
            reduced_motion: false,

            touch_zones: false,

            seed: None,
        }
    }
}

impl Settings {
    /// Create settings from a quality preset (applies preset defaults)
    pub fn from_preset(preset: QualityPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Apply a quality preset (updates quality-dependent settings)
    pub fn apply_preset(&mut self, preset: QualityPreset) {
        self.quality = preset;
    }

    /// Parse and validate settings from the host's JSON blob.
    ///
    /// Missing fields take their defaults, so `{}` is valid.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(1..=1000).contains(&self.tick_rate_hz) {
            return Err(EngineError::InvalidSetting {
                field: "tick_rate_hz",
                reason: "must be between 1 and 1000",
            });
        }
        if self.max_substeps == 0 {
            return Err(EngineError::InvalidSetting {
                field: "max_substeps",
                reason: "must be at least 1",
            });
        }
        if !self.max_frame_delta.is_finite() || self.max_frame_delta <= 0.0 {
            return Err(EngineError::InvalidSetting {
                field: "max_frame_delta",
                reason: "must be a positive number of seconds",
            });
        }
        Ok(())
    }

    /// Fixed timestep in seconds
    pub fn step_dt(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }

    /// Effective particle count cap
    pub fn max_particles(&self) -> usize {
        if !self.particles {
            0
        } else if self.reduced_motion {
            self.quality.max_particles() / 4
        } else {
            self.quality.max_particles()
        }
    }

    /// Scale a requested burst size to the configured quality
    pub fn burst_count(&self, requested: usize) -> usize {
        if !self.particles {
            return 0;
        }
        let mut scale = self.quality.burst_scale();
        if self.reduced_motion {
            scale *= 0.5;
        }
        ((requested as f32 * scale).round() as usize).max(1)
    }
}
