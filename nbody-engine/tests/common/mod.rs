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
//! Shared fixtures for integration tests

#![allow(dead_code)]

use nbody_engine::{ParticleSet, Vec3};

/// Deterministic cloud of `n` particles with varied masses and velocities
pub fn cloud(n: usize) -> ParticleSet {
    let mut masses = Vec::with_capacity(n);
    let mut positions = Vec::with_capacity(n);
    let mut velocities = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64;
        masses.push(0.5 + (i % 5) as f64 * 0.25);
        positions.push(Vec3::new(
            10.0 * (t * 0.37).sin(),
            10.0 * (t * 0.61).cos(),
            5.0 * (t * 0.23).sin(),
        ));
        velocities.push(Vec3::new(0.1 * (t * 1.3).cos(), 0.1 * (t * 0.7).sin(), 0.0));
    }
    ParticleSet::new(masses, positions, velocities).unwrap()
}

/// Two unit masses at (0,0,0) and (2,0,0), at rest
pub fn resting_pair() -> ParticleSet {
    ParticleSet::new(
        vec![1.0, 1.0],
        vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
        vec![Vec3::zero(); 2],
    )
    .unwrap()
}

/// Read positions and velocities out of any backend
pub fn snapshot(backend: &dyn nbody_engine::Backend) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut positions = vec![Vec3::zero(); backend.len()];
    let mut velocities = vec![Vec3::zero(); backend.len()];
    backend.read_positions(&mut positions).unwrap();
    backend.read_velocities(&mut velocities).unwrap();
    (positions, velocities)
}
