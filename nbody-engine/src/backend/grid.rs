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
//! Wide-parallel dispatch backend
//!
//! The backend owns everything a run needs on the device: the four
//! persistent buffers, the two bound kernels and the launch shape. Host code
//! never touches device memory directly; it only enqueues cycles and reads
//! positions or velocities back.
//!
//! # Lifecycle
//!
//! ```text
//! initialize ──► Ready ⇄ Advancing ──release──► Released
//! ```
//!
//! There is no uninitialized value: [`GridBackend::initialize`] either
//! returns a ready backend or fails before anything is dispatched.
//!
//! # Ordering
//!
//! [`advance`](GridBackend::advance) enqueues the force stage and then the
//! integrator stage. The queue runs commands strictly in order, so the
//! integrator of cycle *k* sees every acceleration of cycle *k*, and the
//! force stage of cycle *k+1* sees every position written in cycle *k*.

use super::{check_output_len, Backend};
use crate::config::{GridConfig, SimulationConstants};
use crate::device::{
    BoundKernel, BufferId, CommandQueue, DeviceMemory, LaunchShape, Program, ProgramSource, Stage,
};
use crate::error::{Result, SimError};
use crate::particles::ParticleSet;
use crate::vector::Vec3;

/// Observable state of a [`GridBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridState {
    /// No dispatch outstanding
    Ready,
    /// Dispatches queued or running
    Advancing,
    /// Device resources freed; every operation fails
    Released,
}

/// Wide-parallel backend running one lane per particle
///
/// # Example
///
/// ```
/// use nbody_engine::{GridBackend, GridConfig, ParticleSet, SimulationConstants, Vec3};
///
/// let particles = ParticleSet::new(
///     vec![1.0, 1.0],
///     vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
///     vec![Vec3::zero(); 2],
/// ).unwrap();
///
/// let mut grid = GridBackend::initialize(&particles, SimulationConstants::default(), GridConfig::new(2)).unwrap();
/// grid.advance().unwrap();
///
/// let mut positions = vec![Vec3::zero(); 2];
/// grid.read_positions(&mut positions).unwrap();
/// assert!(positions[0].x > 0.0 && positions[1].x < 2.0);
/// ```
pub struct GridBackend {
    queue: CommandQueue,
    forces: BoundKernel,
    update: BoundKernel,
    shape: LaunchShape,
    particles: usize,
    cycles: u64,
}

impl GridBackend {
    /// Upload `particles` and prepare the standard two-stage program
    ///
    /// # Errors
    ///
    /// Configuration errors (bad constants, zero group size, particle count
    /// not a multiple of the group size under [`GroupPolicy::Reject`]) are
    /// reported before any device resource is created. Environment errors
    /// come from building the program, allocating buffers or starting the
    /// queue.
    ///
    /// [`GroupPolicy::Reject`]: crate::config::GroupPolicy::Reject
    pub fn initialize(particles: &ParticleSet, constants: SimulationConstants, grid: GridConfig) -> Result<Self> {
        Self::with_program(particles, constants, grid, &ProgramSource::nbody())
    }

    /// Like [`initialize`](Self::initialize) with an explicit program source
    pub fn with_program(
        particles: &ParticleSet,
        constants: SimulationConstants,
        grid: GridConfig,
        source: &ProgramSource,
    ) -> Result<Self> {
        constants.validate()?;
        if let Some(advisory) = constants.timestep_advisory() {
            log::warn!("{advisory}");
        }

        let n = particles.len();
        let lanes = grid.lane_count(n)?;
        let shape = LaunchShape::new(lanes, grid.group_size)?;

        let program = Program::build(source, constants)?;
        let forces = program
            .create_kernel(Stage::ComputeForces.name())?
            .bind(&[BufferId::Positions, BufferId::Masses, BufferId::Accelerations])?;
        let update = program
            .create_kernel(Stage::UpdatePositions.name())?
            .bind(&[BufferId::Positions, BufferId::Velocities, BufferId::Accelerations])?;

        let mut memory = DeviceMemory::allocate(lanes)?;
        memory.write_masses(particles.masses())?;
        memory.write_positions(particles.positions())?;
        memory.write_velocities(particles.velocities())?;
        let queue = CommandQueue::new(memory)?;

        log::info!(
            "Grid backend ready: {} particles, {} groups of {} lanes ({} ghost lanes)",
            n,
            shape.groups(),
            shape.local(),
            lanes - n
        );

        Ok(GridBackend {
            queue,
            forces,
            update,
            shape,
            particles: n,
            cycles: 0,
        })
    }

    fn ensure_live(&self) -> Result<()> {
        if self.queue.is_open() {
            Ok(())
        } else {
            Err(SimError::Released)
        }
    }

    /// Enqueue one cycle (force stage, then integrator stage)
    ///
    /// Returns as soon as both stages are queued.
    pub fn advance(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.queue.enqueue(&self.forces, self.shape)?;
        self.queue.enqueue(&self.update, self.shape)?;
        self.cycles += 1;
        log::debug!("Enqueued cycle {} ({} pending dispatches)", self.cycles, self.queue.pending());
        Ok(())
    }

    /// Wait for queued work, then copy positions into `out`
    ///
    /// Ghost lanes are never copied. Device state is not modified.
    pub fn read_positions(&self, out: &mut [Vec3]) -> Result<()> {
        self.ensure_live()?;
        check_output_len("positions", self.particles, out)?;
        log::debug!("Reading back positions after cycle {}", self.cycles);
        self.queue.read(|memory| memory.read_positions(out))?
    }

    /// Wait for queued work, then copy velocities into `out`
    pub fn read_velocities(&self, out: &mut [Vec3]) -> Result<()> {
        self.ensure_live()?;
        check_output_len("velocities", self.particles, out)?;
        self.queue.read(|memory| memory.read_velocities(out))?
    }

    /// Block until every queued cycle has completed
    pub fn finish(&self) -> Result<()> {
        self.ensure_live()?;
        self.queue.finish()
    }

    /// Current lifecycle state
    pub fn state(&self) -> GridState {
        if !self.queue.is_open() {
            GridState::Released
        } else if self.queue.pending() > 0 {
            GridState::Advancing
        } else {
            GridState::Ready
        }
    }

    /// Drain outstanding work and free device resources
    ///
    /// The device buffers are dropped before this returns and the backend is
    /// unusable afterwards. Dropping the backend releases it as well.
    pub fn release(&mut self) {
        if !self.queue.is_open() {
            return;
        }
        self.queue.shutdown();
        log::info!("Grid backend released after {} cycles", self.cycles);
    }

    /// Lanes per execution group
    pub fn group_size(&self) -> usize {
        self.shape.local()
    }

    /// Number of execution groups
    pub fn groups(&self) -> usize {
        self.shape.groups()
    }

    /// Total lanes, including ghost lanes
    pub fn lanes(&self) -> usize {
        self.shape.global()
    }

    /// Zero-mass lanes appended to fill the last group
    pub fn ghosts(&self) -> usize {
        self.shape.global() - self.particles
    }
}

impl Backend for GridBackend {
    fn name(&self) -> &str {
        "grid"
    }

    fn len(&self) -> usize {
        self.particles
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }

    fn advance(&mut self) -> Result<()> {
        GridBackend::advance(self)
    }

    fn read_positions(&self, out: &mut [Vec3]) -> Result<()> {
        GridBackend::read_positions(self, out)
    }

    fn read_velocities(&self, out: &mut [Vec3]) -> Result<()> {
        GridBackend::read_velocities(self, out)
    }
}
