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
//! Single-evaluation position/velocity update

use crate::vector::Vec3;

/// Advance one particle by one step
///
/// `acceleration` must be the value computed for this particle in the
/// current cycle. The position update uses the velocity from before the
/// step; the velocity update reuses the same acceleration.
///
/// ```
/// use nbody_engine::{Vec3, kernels::integrate_particle};
///
/// let mut p = Vec3::zero();
/// let mut v = Vec3::new(1.0, 0.0, 0.0);
/// integrate_particle(&mut p, &mut v, Vec3::new(2.0, 0.0, 0.0), 0.5, 0.25);
/// assert_eq!(p.x, 0.5 * (1.0 + 0.25 * 2.0));
/// assert_eq!(v.x, 2.0);
/// ```
#[inline]
pub fn integrate_particle(position: &mut Vec3, velocity: &mut Vec3, acceleration: Vec3, dt: f64, half_dt: f64) {
    *position += (*velocity + acceleration * half_dt) * dt;
    *velocity += acceleration * dt;
}
