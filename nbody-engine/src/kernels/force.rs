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
//! Pairwise inverse-square attraction with a hard cutoff
//!
//! The contribution of particle `i` on particle `j` is
//!
//! ```text
//! dr = p[i] - p[j]
//! d2 = dr · dr
//! a  = dr * m[i] / (d2 * sqrt(d2))   if d2 > cutoff²
//!      0                             otherwise
//! ```
//!
//! The cutoff is a step, not a softening: at `d2 == cutoff²` the pair is
//! excluded, just above it the full unsoftened term applies. Zero
//! separation (including the self pair) always falls inside the cutoff, so
//! no division by zero can happen. The gravitational constant is folded into
//! the masses.

use crate::vector::Vec3;

/// Acceleration contributed to a particle at `target` by a mass at `source`
#[inline]
pub fn pair_contribution(target: Vec3, source: Vec3, source_mass: f64, cutoff_radius_squared: f64) -> Vec3 {
    let dr = source - target;
    let d2 = dr.dot(dr);
    if d2 > cutoff_radius_squared {
        dr * (source_mass / (d2 * d2.sqrt()))
    } else {
        Vec3::zero()
    }
}

/// Net acceleration on particle `j` from every particle in the snapshot
///
/// The sum runs sequentially over `i` in index order. `positions` must be
/// the unmodified snapshot from the start of the cycle; the function only
/// reads it.
///
/// # Panics
///
/// Panics if `j` is out of bounds or `masses` is shorter than `positions`.
#[inline]
pub fn accumulate_acceleration(j: usize, positions: &[Vec3], masses: &[f64], cutoff_radius_squared: f64) -> Vec3 {
    let target = positions[j];
    let mut acceleration = Vec3::zero();
    for (i, &source) in positions.iter().enumerate() {
        acceleration += pair_contribution(target, source, masses[i], cutoff_radius_squared);
    }
    acceleration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_pair_is_zero() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(pair_contribution(p, p, 5.0, 0.0), Vec3::zero());
    }

    #[test]
    fn test_inverse_square_magnitude() {
        // Unit mass at distance 2: |a| = 1/4, pointing toward the source
        let a = pair_contribution(Vec3::zero(), Vec3::new(2.0, 0.0, 0.0), 1.0, 1.5);
        assert_eq!(a, Vec3::new(0.25, 0.0, 0.0));
    }

    #[test]
    fn test_cutoff_is_a_hard_step() {
        let r2: f64 = 1.5;
        let at_cutoff = Vec3::new(r2.sqrt(), 0.0, 0.0);
        // Whatever sqrt rounds to, the squared separation decides
        let d2 = at_cutoff.length_squared();
        let a = pair_contribution(Vec3::zero(), at_cutoff, 1.0, d2);
        assert_eq!(a, Vec3::zero());

        let just_above = Vec3::new(f64::from_bits(at_cutoff.x.to_bits() + 1), 0.0, 0.0);
        let a = pair_contribution(Vec3::zero(), just_above, 1.0, d2);
        let d2_above = just_above.length_squared();
        assert!(d2_above > d2);
        let expected = just_above.x * (1.0 / (d2_above * d2_above.sqrt()));
        assert_eq!(a.x, expected);
        // Full term, no smoothing toward zero
        assert!(a.x > 0.5);
    }

    #[test]
    fn test_accumulate_sums_all_sources() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, -2.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0), // inside cutoff of particle 0
        ];
        let masses = [1.0, 1.0, 4.0, 100.0];
        let a = accumulate_acceleration(0, &positions, &masses, 1.5);
        assert_eq!(a, Vec3::new(0.25, -1.0, 0.0));
    }
}
