// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Host-side particle arrays
//!
//! A [`ParticleSet`] holds the canonical initial conditions as parallel
//! arrays (structure of arrays): one mass, position and velocity per
//! particle. Construction validates everything the backends rely on, so a
//! `ParticleSet` that exists is always safe to hand to either backend.
//!
//! The diagnostics here (momentum, energies, centre of mass) are evaluated on
//! host arrays and are what the conservation tests measure.

use crate::error::{Result, SimError};
use crate::vector::Vec3;

/// Validated host arrays of masses, positions and velocities
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    masses: Vec<f64>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
}

impl ParticleSet {
    /// Build a particle set from host arrays
    ///
    /// # Errors
    ///
    /// - [`SimError::EmptySystem`] if there are no particles
    /// - [`SimError::LengthMismatch`] if the arrays differ in length
    /// - [`SimError::InvalidMass`] for a non-positive or non-finite mass
    /// - [`SimError::InvalidState`] for a non-finite position or velocity
    pub fn new(masses: Vec<f64>, positions: Vec<Vec3>, velocities: Vec<Vec3>) -> Result<Self> {
        validate_host_arrays(&masses, &positions, &velocities)?;
        Ok(ParticleSet { masses, positions, velocities })
    }

    /// Particle count N
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    /// Always false for a constructed set; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// Masses, immutable for the lifetime of the set
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// Positions
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Velocities
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Consume the set and return its arrays
    pub fn into_parts(self) -> (Vec<f64>, Vec<Vec3>, Vec<Vec3>) {
        (self.masses, self.positions, self.velocities)
    }

    /// Total mass
    pub fn total_mass(&self) -> f64 {
        self.masses.iter().sum()
    }

    /// Total linear momentum Σ m·v
    pub fn total_momentum(&self) -> Vec3 {
        total_momentum(&self.masses, &self.velocities)
    }

    /// Total kinetic energy Σ ½·m·v²
    pub fn kinetic_energy(&self) -> f64 {
        self.masses
            .iter()
            .zip(&self.velocities)
            .map(|(&m, v)| 0.5 * m * v.length_squared())
            .sum()
    }

    /// Total potential energy over pairs separated by more than the cutoff
    ///
    /// Pairs inside the cutoff are excluded exactly as the force kernel
    /// excludes them, so the value is consistent with the simulated forces.
    pub fn potential_energy(&self, cutoff_radius_squared: f64) -> f64 {
        let n = self.len();
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let d2 = (self.positions[j] - self.positions[i]).length_squared();
                if d2 > cutoff_radius_squared {
                    total -= self.masses[i] * self.masses[j] / d2.sqrt();
                }
            }
        }
        total
    }

    /// Mass-weighted centre of the set
    pub fn center_of_mass(&self) -> Vec3 {
        let weighted = self
            .masses
            .iter()
            .zip(&self.positions)
            .fold(Vec3::zero(), |acc, (&m, &p)| acc + p * m);
        weighted * (1.0 / self.total_mass())
    }
}

/// Total linear momentum of caller-owned arrays
pub fn total_momentum(masses: &[f64], velocities: &[Vec3]) -> Vec3 {
    masses
        .iter()
        .zip(velocities)
        .fold(Vec3::zero(), |acc, (&m, &v)| acc + v * m)
}

/// Check host arrays before they reach a backend
///
/// Shared by [`ParticleSet::new`] and the stateless thread-parallel entry
/// point, which works on caller-owned slices.
pub fn validate_host_arrays(masses: &[f64], positions: &[Vec3], velocities: &[Vec3]) -> Result<()> {
    let n = masses.len();
    if n == 0 {
        return Err(SimError::EmptySystem);
    }
    if positions.len() != n {
        return Err(SimError::LengthMismatch {
            what: "positions",
            expected: n,
            actual: positions.len(),
        });
    }
    if velocities.len() != n {
        return Err(SimError::LengthMismatch {
            what: "velocities",
            expected: n,
            actual: velocities.len(),
        });
    }
    for (index, &mass) in masses.iter().enumerate() {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(SimError::InvalidMass { index, mass });
        }
    }
    if let Some(index) = positions.iter().position(|p| !p.is_valid()) {
        return Err(SimError::InvalidState { index, what: "position" });
    }
    if let Some(index) = velocities.iter().position(|v| !v.is_valid()) {
        return Err(SimError::InvalidState { index, what: "velocity" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> ParticleSet {
        ParticleSet::new(
            vec![1.0, 3.0],
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0)],
            vec![Vec3::new(3.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(
            ParticleSet::new(vec![], vec![], vec![]),
            Err(SimError::EmptySystem)
        );
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = ParticleSet::new(vec![1.0, 1.0], vec![Vec3::zero()], vec![Vec3::zero(); 2])
            .unwrap_err();
        assert_eq!(
            err,
            SimError::LengthMismatch { what: "positions", expected: 2, actual: 1 }
        );
    }

    #[test]
    fn test_rejects_bad_mass() {
        for mass in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = ParticleSet::new(vec![1.0, mass], vec![Vec3::zero(); 2], vec![Vec3::zero(); 2]);
            assert!(matches!(result, Err(SimError::InvalidMass { index: 1, .. })));
        }
    }

    #[test]
    fn test_rejects_non_finite_state() {
        let result = ParticleSet::new(
            vec![1.0],
            vec![Vec3::zero()],
            vec![Vec3::new(0.0, f64::NAN, 0.0)],
        );
        assert_eq!(result, Err(SimError::InvalidState { index: 0, what: "velocity" }));
    }

    #[test]
    fn test_diagnostics() {
        let set = pair();
        assert_eq!(set.len(), 2);
        assert_eq!(set.total_mass(), 4.0);
        assert_eq!(set.total_momentum(), Vec3::zero());
        // 0.5*1*9 + 0.5*3*1
        assert_eq!(set.kinetic_energy(), 6.0);
        assert_eq!(set.center_of_mass(), Vec3::new(3.0, 0.0, 0.0));
        assert!((set.potential_energy(1.5) + 0.75).abs() < 1e-15);
        // Inside the cutoff the pair is not counted
        assert_eq!(set.potential_energy(16.0), 0.0);
    }
}
