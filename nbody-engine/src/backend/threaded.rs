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
//! Thread-parallel reference backend
//!
//! One cycle is a single fused parallel loop: each worker takes a disjoint
//! chunk of particle indices and, for every `j` in it, computes the full
//! acceleration of `j` and immediately integrates `j`. Workers read the
//! whole position and mass arrays and write only their own slots.
//!
//! Because integration happens inside the same loop that evaluates forces,
//! the force sum reads from a snapshot of positions taken before the loop.
//! Reading the live array would let a worker observe positions another
//! worker already advanced in this cycle.

use super::{check_output_len, Backend};
use crate::config::{SimulationConstants, ThreadConfig};
use crate::error::{Result, SimError};
use crate::kernels::{accumulate_acceleration, integrate_particle};
use crate::particles::{validate_host_arrays, ParticleSet};
use crate::vector::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Advance caller-owned host arrays by one cycle
///
/// Stateless form of the reference backend: validates the arrays, copies
/// positions into the caller's `snapshot` scratch buffer and runs the fused
/// loop on the global rayon pool. Blocks until every particle has been
/// updated. Nothing is allocated; `snapshot` only needs to be N long and
/// its previous contents are overwritten.
///
/// # Errors
///
/// Any configuration error from [`SimulationConstants::validate`] or the
/// host array checks, or [`SimError::LengthMismatch`] for a snapshot of the
/// wrong length. Nothing is modified when an error is returned.
///
/// # Example
///
/// ```
/// use nbody_engine::{advance_host, SimulationConstants, Vec3};
///
/// let masses = [1.0, 1.0];
/// let mut positions = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
/// let mut velocities = [Vec3::zero(); 2];
/// let mut snapshot = [Vec3::zero(); 2];
///
/// let constants = SimulationConstants::default();
/// for _ in 0..3 {
///     advance_host(&constants, &masses, &mut positions, &mut velocities, &mut snapshot).unwrap();
/// }
/// assert!(positions[0].x > 0.0);
/// ```
pub fn advance_host(
    constants: &SimulationConstants,
    masses: &[f64],
    positions: &mut [Vec3],
    velocities: &mut [Vec3],
    snapshot: &mut [Vec3],
) -> Result<()> {
    constants.validate()?;
    validate_host_arrays(masses, positions, velocities)?;
    check_output_len("snapshot", masses.len(), snapshot)?;

    snapshot.copy_from_slice(positions);
    let chunk = ThreadConfig::default().chunk_len(masses.len(), worker_count());
    fused_cycle(constants, masses, snapshot, positions, velocities, chunk);
    Ok(())
}

#[cfg(feature = "parallel")]
fn worker_count() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
fn worker_count() -> usize {
    1
}

fn fused_cycle(
    constants: &SimulationConstants,
    masses: &[f64],
    snapshot: &[Vec3],
    positions: &mut [Vec3],
    velocities: &mut [Vec3],
    chunk: usize,
) {
    let cutoff = constants.cutoff_radius_squared;
    let dt = constants.dt;
    let half_dt = constants.half_dt();

    let worker = |(index, (p, v)): (usize, (&mut [Vec3], &mut [Vec3]))| {
        let start = index * chunk;
        for (offset, (position, velocity)) in p.iter_mut().zip(v.iter_mut()).enumerate() {
            let acceleration = accumulate_acceleration(start + offset, snapshot, masses, cutoff);
            integrate_particle(position, velocity, acceleration, dt, half_dt);
        }
    };

    #[cfg(feature = "parallel")]
    positions
        .par_chunks_mut(chunk)
        .zip(velocities.par_chunks_mut(chunk))
        .enumerate()
        .for_each(worker);

    #[cfg(not(feature = "parallel"))]
    positions
        .chunks_mut(chunk)
        .zip(velocities.chunks_mut(chunk))
        .enumerate()
        .for_each(worker);
}

/// Reference backend owning its host arrays
///
/// The snapshot buffer is allocated once, so advancing never allocates.
///
/// # Example
///
/// ```
/// use nbody_engine::{Backend, ParticleSet, SimulationConstants, ThreadConfig, ThreadedBackend, Vec3};
///
/// let particles = ParticleSet::new(
///     vec![1.0, 1.0],
///     vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
///     vec![Vec3::zero(); 2],
/// ).unwrap();
///
/// let mut threaded = ThreadedBackend::new(particles, SimulationConstants::default(), ThreadConfig::default()).unwrap();
/// threaded.advance().unwrap();
/// assert_eq!(threaded.cycles(), 1);
/// assert_eq!(threaded.velocities()[0].x, -threaded.velocities()[1].x);
/// ```
pub struct ThreadedBackend {
    masses: Vec<f64>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    snapshot: Vec<Vec3>,
    constants: SimulationConstants,
    config: ThreadConfig,
    cycles: u64,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl ThreadedBackend {
    /// Take ownership of `particles` and prepare the worker pool
    ///
    /// # Errors
    ///
    /// Invalid constants, or [`SimError::ThreadPool`] if a dedicated pool
    /// was requested and could not be built.
    pub fn new(particles: ParticleSet, constants: SimulationConstants, config: ThreadConfig) -> Result<Self> {
        constants.validate()?;
        if let Some(advisory) = constants.timestep_advisory() {
            log::warn!("{advisory}");
        }

        let (masses, positions, velocities) = particles.into_parts();
        let snapshot = positions.clone();

        #[cfg(feature = "parallel")]
        let pool = if config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("nbody-worker-{i}"))
                .build()
                .map_err(|e| SimError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        #[cfg(not(feature = "parallel"))]
        if config.threads > 1 {
            log::warn!(
                "Requested {} worker threads but the `parallel` feature is disabled; running on one thread",
                config.threads
            );
        }

        let backend = ThreadedBackend {
            masses,
            positions,
            velocities,
            snapshot,
            constants,
            config,
            cycles: 0,
            #[cfg(feature = "parallel")]
            pool,
        };
        log::info!(
            "Threaded backend ready: {} particles on {} workers",
            backend.masses.len(),
            backend.threads()
        );
        Ok(backend)
    }

    /// Number of worker threads used per cycle
    pub fn threads(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            match &self.pool {
                Some(pool) => pool.current_num_threads(),
                None => rayon::current_num_threads(),
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    /// Run one fused cycle; returns once every worker has finished
    pub fn advance(&mut self) -> Result<()> {
        let chunk = self.config.chunk_len(self.masses.len(), self.threads());
        self.snapshot.copy_from_slice(&self.positions);

        let ThreadedBackend {
            masses,
            positions,
            velocities,
            snapshot,
            constants,
            ..
        } = self;
        let mut cycle = || fused_cycle(constants, masses, snapshot, positions, velocities, chunk);

        #[cfg(feature = "parallel")]
        {
            match &self.pool {
                Some(pool) => pool.install(cycle),
                None => cycle(),
            }
        }

        #[cfg(not(feature = "parallel"))]
        cycle();

        self.cycles += 1;
        Ok(())
    }

    /// Current positions
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Current velocities
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Masses
    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// Constants used every cycle
    pub fn constants(&self) -> &SimulationConstants {
        &self.constants
    }

    /// Current state as a validated particle set
    pub fn to_particles(&self) -> Result<ParticleSet> {
        ParticleSet::new(self.masses.clone(), self.positions.clone(), self.velocities.clone())
    }
}

impl Backend for ThreadedBackend {
    fn name(&self) -> &str {
        "threaded"
    }

    fn len(&self) -> usize {
        self.masses.len()
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }

    fn advance(&mut self) -> Result<()> {
        ThreadedBackend::advance(self)
    }

    fn read_positions(&self, out: &mut [Vec3]) -> Result<()> {
        check_output_len("positions", self.masses.len(), out)?;
        out.copy_from_slice(&self.positions);
        Ok(())
    }

    fn read_velocities(&self, out: &mut [Vec3]) -> Result<()> {
        check_output_len("velocities", self.masses.len(), out)?;
        out.copy_from_slice(&self.velocities);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> ParticleSet {
        ParticleSet::new(
            vec![1.0, 1.0],
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
            vec![Vec3::zero(); 2],
        )
        .unwrap()
    }

    #[test]
    fn test_advance_host_matches_kernels() {
        let constants = SimulationConstants::default();
        let masses = [1.0, 1.0];
        let mut positions = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
        let mut velocities = [Vec3::zero(); 2];
        let mut snapshot = [Vec3::zero(); 2];

        advance_host(&constants, &masses, &mut positions, &mut velocities, &mut snapshot).unwrap();

        // a = ±1/4, p = dt * (dt/2 * a), v = dt * a
        assert_eq!(positions[0].x, 0.01 * (0.0 + 0.005 * 0.25));
        assert_eq!(positions[1].x, 2.0 + 0.01 * (0.0 + 0.005 * -0.25));
        assert_eq!(velocities[0].x, 0.01 * 0.25);
        assert_eq!(velocities[1].x, -0.01 * 0.25);
    }

    #[test]
    fn test_advance_host_rejects_bad_input() {
        let constants = SimulationConstants::default();
        let mut positions = [Vec3::zero(); 2];
        let mut velocities = [Vec3::zero(); 1];
        let mut snapshot = [Vec3::zero(); 2];
        let err = advance_host(&constants, &[1.0, 1.0], &mut positions, &mut velocities, &mut snapshot).unwrap_err();
        assert!(err.is_configuration());

        let mut velocities = [Vec3::zero(); 2];
        let err = advance_host(&constants, &[1.0, -1.0], &mut positions, &mut velocities, &mut snapshot).unwrap_err();
        assert_eq!(err, SimError::InvalidMass { index: 1, mass: -1.0 });
    }

    #[test]
    fn test_advance_host_checks_snapshot_length() {
        let constants = SimulationConstants::default();
        let mut positions = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
        let mut velocities = [Vec3::zero(); 2];
        let mut short = [Vec3::zero(); 1];

        let err = advance_host(&constants, &[1.0, 1.0], &mut positions, &mut velocities, &mut short).unwrap_err();
        assert_eq!(err, SimError::LengthMismatch { what: "snapshot", expected: 2, actual: 1 });
        assert_eq!(positions[1], Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_advance_host_reuses_snapshot_buffer() {
        // A reused scratch buffer gives the same trajectory as the owning backend
        let constants = SimulationConstants::default();
        let (masses, mut positions, mut velocities) = pair().into_parts();
        let mut snapshot = vec![Vec3::new(9.0, 9.0, 9.0); 2];
        let scratch = snapshot.as_ptr();

        let mut backend = ThreadedBackend::new(pair(), constants, ThreadConfig::default()).unwrap();
        for _ in 0..5 {
            advance_host(&constants, &masses, &mut positions, &mut velocities, &mut snapshot).unwrap();
            backend.advance().unwrap();
        }

        assert_eq!(snapshot.as_ptr(), scratch);
        assert_eq!(positions, backend.positions());
        assert_eq!(velocities, backend.velocities());
    }

    #[test]
    fn test_snapshot_isolates_workers() {
        // One particle per chunk forces every index onto its own work item;
        // results must match a single chunk covering everything
        let make = |chunk| {
            let config = ThreadConfig::default().with_chunk_size(chunk);
            let mut backend = ThreadedBackend::new(pair(), SimulationConstants::default(), config).unwrap();
            backend.advance_by(5).unwrap();
            (backend.positions().to_vec(), backend.velocities().to_vec())
        };
        assert_eq!(make(1), make(2));
    }

    #[test]
    fn test_dedicated_pool() {
        let backend = ThreadedBackend::new(pair(), SimulationConstants::default(), ThreadConfig::with_threads(2)).unwrap();
        #[cfg(feature = "parallel")]
        assert_eq!(backend.threads(), 2);
        #[cfg(not(feature = "parallel"))]
        assert_eq!(backend.threads(), 1);
    }

    #[test]
    fn test_read_into_host_buffers() {
        let mut backend = ThreadedBackend::new(pair(), SimulationConstants::default(), ThreadConfig::default()).unwrap();
        backend.advance().unwrap();
        let mut out = vec![Vec3::zero(); 2];
        Backend::read_positions(&backend, &mut out).unwrap();
        assert_eq!(out, backend.positions());
        assert!(Backend::read_velocities(&backend, &mut [Vec3::zero(); 3]).is_err());
    }
}
