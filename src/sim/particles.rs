//! Cosmetic particle effects
//!
//! Particles never take part in collisions or scoring. They run on their own
//! RNG stream so spawning more or fewer of them cannot change gameplay.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::Rgba;

/// A particle for visual effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Ticks remaining
    pub life: u32,
    pub max_life: u32,
    pub color: Rgba,
    pub size: f32,
}

impl Particle {
    /// Render opacity, fades linearly with remaining life
    pub fn alpha(&self) -> f32 {
        if self.max_life == 0 {
            0.0
        } else {
            self.life as f32 / self.max_life as f32
        }
    }
}

/// Description of one burst of particles
#[derive(Debug, Clone, Copy)]
pub struct Burst {
    pub pos: Vec2,
    pub count: usize,
    pub color: Rgba,
    /// Maximum initial speed (units per tick)
    pub speed: f32,
    /// Lifetime in ticks
    pub life: u32,
    pub size: f32,
}

impl Burst {
    /// Small spray for a non-lethal hit
    pub fn hit(pos: Vec2, color: Rgba) -> Self {
        Self {
            pos,
            count: 6,
            color,
            speed: 2.0,
            life: 18,
            size: 2.0,
        }
    }

    /// Larger burst when something is destroyed
    pub fn explosion(pos: Vec2, color: Rgba) -> Self {
        Self {
            pos,
            count: 20,
            color,
            speed: 4.0,
            life: 30,
            size: 3.0,
        }
    }

    /// Slow glitter for pickups
    pub fn sparkle(pos: Vec2, color: Rgba) -> Self {
        Self {
            pos,
            count: 12,
            color,
            speed: 1.5,
            life: 24,
            size: 2.0,
        }
    }
}

/// Owns and ages every live particle
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    cap: usize,
    /// Added to vel.y each tick
    pub gravity: f32,
    /// Velocity multiplier each tick
    pub drag: f32,
    rng: Pcg32,
}

impl ParticleSystem {
    pub fn new(cap: usize, seed: u64) -> Self {
        Self {
            particles: Vec::with_capacity(cap.min(256)),
            cap,
            gravity: 0.05,
            drag: 0.96,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn with_physics(mut self, gravity: f32, drag: f32) -> Self {
        self.gravity = gravity;
        self.drag = drag;
        self
    }

    /// Spawn a burst with randomized directions. Returns the number spawned.
    pub fn burst(&mut self, burst: Burst) -> usize {
        if self.cap == 0 || burst.count == 0 || !burst.pos.is_finite() {
            return 0;
        }

        for _ in 0..burst.count {
            let angle = self.rng.random_range(0.0..TAU);
            let speed = burst.speed * self.rng.random_range(0.3..=1.0_f32);
            let size = burst.size * self.rng.random_range(0.6..=1.4_f32);
            self.particles.push(Particle {
                pos: burst.pos,
                vel: Vec2::new(angle.cos(), angle.sin()) * speed,
                life: burst.life,
                max_life: burst.life,
                color: burst.color,
                size,
            });
        }

        // Oldest particles make room for new ones
        if self.particles.len() > self.cap {
            let excess = self.particles.len() - self.cap;
            self.particles.drain(..excess);
        }

        burst.count.min(self.cap)
    }

    /// Age every particle by one tick and drop the dead ones
    pub fn update(&mut self) {
        for p in self.particles.iter_mut() {
            p.pos += p.vel;
            p.vel *= self.drag;
            p.vel.y += self.gravity;
            p.life = p.life.saturating_sub(1);
        }
        self.particles.retain(|p| p.life > 0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];

    #[test]
    fn test_burst_and_expire() {
        let mut fx = ParticleSystem::new(100, 1);
        let spawned = fx.burst(Burst {
            pos: Vec2::new(10.0, 10.0),
            count: 5,
            color: WHITE,
            speed: 2.0,
            life: 3,
            size: 2.0,
        });
        assert_eq!(spawned, 5);
        fx.update();
        fx.update();
        assert_eq!(fx.len(), 5);
        assert!(fx.iter().all(|p| (p.alpha() - 1.0 / 3.0).abs() < 1e-6));
        fx.update();
        assert!(fx.is_empty());
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut fx = ParticleSystem::new(8, 2);
        fx.burst(Burst::hit(Vec2::ZERO, WHITE));
        fx.burst(Burst::hit(Vec2::new(50.0, 50.0), WHITE));
        assert_eq!(fx.len(), 8);
        // The newest burst survives intact
        assert_eq!(fx.iter().filter(|p| p.pos == Vec2::new(50.0, 50.0)).count(), 6);
    }

    #[test]
    fn test_zero_cap_spawns_nothing() {
        let mut fx = ParticleSystem::new(0, 3);
        assert_eq!(fx.burst(Burst::explosion(Vec2::ZERO, WHITE)), 0);
        assert!(fx.is_empty());
    }

    #[test]
    fn test_motion_applies_drag_and_gravity() {
        let mut fx = ParticleSystem::new(10, 4).with_physics(1.0, 0.5);
        fx.burst(Burst {
            pos: Vec2::ZERO,
            count: 1,
            color: WHITE,
            speed: 0.0,
            life: 10,
            size: 1.0,
        });
        fx.update();
        let p = fx.iter().next().unwrap();
        assert_eq!(p.vel, Vec2::new(0.0, 1.0));
        fx.update();
        let p = fx.iter().next().unwrap();
        assert_eq!(p.pos, Vec2::new(0.0, 1.0));
    }
}
