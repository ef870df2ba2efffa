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
//! Lane-grid execution of a bound kernel
//!
//! A dispatch covers `shape.global()` lanes. Lane `group * local + id`
//! handles the particle with that index. Each group is one unit of work
//! for the rayon pool; lanes inside a group run in order on one worker.
//! Every lane writes only its own slot, so groups need no locking, and the
//! dispatch returns only once every group has finished.

use super::memory::DeviceMemory;
use super::program::{BoundKernel, Stage};
use super::LaunchShape;
use crate::kernels::{accumulate_acceleration, integrate_particle};
use crate::vector::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Run one stage over the whole grid
///
/// The caller guarantees `shape.global() == memory.lanes()`.
pub(crate) fn run_stage(kernel: &BoundKernel, shape: LaunchShape, memory: &mut DeviceMemory) {
    debug_assert_eq!(shape.global(), memory.lanes());
    match kernel.stage() {
        Stage::ComputeForces => compute_forces(kernel, shape, memory),
        Stage::UpdatePositions => update_positions(kernel, shape, memory),
    }
}

fn compute_forces(kernel: &BoundKernel, shape: LaunchShape, memory: &mut DeviceMemory) {
    let cutoff = kernel.constants().cutoff_radius_squared;
    let local = shape.local();
    let DeviceMemory { positions, accelerations, masses, .. } = memory;
    let positions: &[Vec3] = positions;
    let masses: &[f64] = masses;

    let group = |(group_id, lanes): (usize, &mut [Vec3])| {
        for (local_id, acceleration) in lanes.iter_mut().enumerate() {
            let lane = group_id * local + local_id;
            *acceleration = accumulate_acceleration(lane, positions, masses, cutoff);
        }
    };

    #[cfg(feature = "parallel")]
    accelerations.par_chunks_mut(local).enumerate().for_each(group);

    #[cfg(not(feature = "parallel"))]
    accelerations.chunks_mut(local).enumerate().for_each(group);
}

fn update_positions(kernel: &BoundKernel, shape: LaunchShape, memory: &mut DeviceMemory) {
    let dt = kernel.constants().dt;
    let half_dt = kernel.constants().half_dt();
    let local = shape.local();
    let DeviceMemory { positions, velocities, accelerations, .. } = memory;

    #[cfg(feature = "parallel")]
    let groups = positions
        .par_chunks_mut(local)
        .zip(velocities.par_chunks_mut(local))
        .zip(accelerations.par_chunks(local));

    #[cfg(not(feature = "parallel"))]
    let groups = positions
        .chunks_mut(local)
        .zip(velocities.chunks_mut(local))
        .zip(accelerations.chunks(local));

    groups.for_each(|((p, v), a)| {
        for ((position, velocity), &acceleration) in p.iter_mut().zip(v.iter_mut()).zip(a) {
            integrate_particle(position, velocity, acceleration, dt, half_dt);
        }
    });
}
