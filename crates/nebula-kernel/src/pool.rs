//! Sizing and seeding of the 2D particle population.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::particle::ParticleEntity;

/// Settings for the 2D particle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Particle2DSettings {
    /// Surface area in square pixels per particle.
    pub area_per_particle: u32,
    /// Upper bound on the population.
    pub max_particles: usize,
}

impl Default for Particle2DSettings {
    fn default() -> Self {
        Self {
            area_per_particle: 9000,
            max_particles: 150,
        }
    }
}

/// Population for a surface: `min(floor(w·h / area), max)`.
#[must_use]
pub fn pool_size(width: u32, height: u32, settings: &Particle2DSettings) -> usize {
    let area = u64::from(width) * u64::from(height);
    let per = u64::from(settings.area_per_particle.max(1));
    let count = (area / per) as usize;
    count.min(settings.max_particles)
}

/// All particles of one 2D engine.
#[derive(Debug, Clone, Default)]
pub struct ParticlePool {
    particles: Vec<ParticleEntity>,
}

impl ParticlePool {
    /// Spawns a full population for a `width × height` surface.
    pub fn seeded(
        rng: &mut fastrand::Rng,
        width: u32,
        height: u32,
        settings: &Particle2DSettings,
    ) -> Self {
        let mut pool = Self::default();
        pool.reseed(rng, width, height, settings);
        pool
    }

    /// Discards every particle and spawns a fresh population.
    pub fn reseed(
        &mut self,
        rng: &mut fastrand::Rng,
        width: u32,
        height: u32,
        settings: &Particle2DSettings,
    ) {
        let count = pool_size(width, height, settings);
        self.particles.clear();
        self.particles.extend(
            (0..count).map(|_| ParticleEntity::spawn(rng, width as f32, height as f32)),
        );
        debug!("Seeded {} particles for {}x{}", count, width, height);
    }

    /// Number of particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Iterates particles in draw order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParticleEntity> {
        self.particles.iter()
    }

    /// Iterates particles mutably.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ParticleEntity> {
        self.particles.iter_mut()
    }

    /// Particles as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[ParticleEntity] {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pool_size_examples() {
        let s = Particle2DSettings::default();
        assert_eq!(pool_size(1200, 800, &s), 106);
        assert_eq!(pool_size(1920, 1080, &s), 150);
        assert_eq!(pool_size(0, 800, &s), 0);
        assert_eq!(pool_size(94, 95, &s), 0);
        assert_eq!(pool_size(90, 100, &s), 1);
    }

    #[test]
    fn test_reseed_replaces_everything() {
        let s = Particle2DSettings::default();
        let mut rng = fastrand::Rng::with_seed(7);
        let mut pool = ParticlePool::seeded(&mut rng, 1200, 800, &s);
        assert_eq!(pool.len(), 106);
        let before = pool.as_slice()[0];

        pool.reseed(&mut rng, 600, 400, &s);
        assert_eq!(pool.len(), 26);
        assert_ne!(pool.as_slice()[0], before);
        assert!(pool
            .iter()
            .all(|p| p.position.x < 600.0 && p.position.y < 400.0));
    }

    #[test]
    fn test_zero_area_setting_is_safe() {
        let s = Particle2DSettings {
            area_per_particle: 0,
            max_particles: 10,
        };
        assert_eq!(pool_size(100, 100, &s), 10);
    }

    proptest! {
        #[test]
        fn pool_size_matches_formula(w in 0u32..10_000, h in 0u32..10_000) {
            let s = Particle2DSettings::default();
            let expected = ((f64::from(w) * f64::from(h)) / 9000.0).floor() as usize;
            prop_assert_eq!(pool_size(w, h, &s), expected.min(150));
        }
    }
}
