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
//! Simulation constants and backend configuration
//!
//! All configuration types are plain structs with a `Default`, `with_*`
//! builder methods and a `validate()` that is called by the backends before
//! any work is dispatched.

use crate::error::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default time step between cycles
pub const DEFAULT_DT: f64 = 0.01;

/// Default squared cutoff radius; closer pairs exert no force
pub const DEFAULT_CUTOFF_RADIUS_SQUARED: f64 = 1.5;

/// Default number of lanes per execution group on the grid backend
pub const DEFAULT_GROUP_SIZE: usize = 64;

/// Constants shared by both backends for the whole run
///
/// # Example
///
/// ```
/// use nbody_engine::SimulationConstants;
///
/// let constants = SimulationConstants::default().with_dt(0.005);
/// assert!(constants.validate().is_ok());
/// assert_eq!(constants.half_dt(), 0.0025);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConstants {
    /// Fixed time step
    pub dt: f64,
    /// Pairs with squared separation at or below this value contribute no force
    pub cutoff_radius_squared: f64,
}

impl Default for SimulationConstants {
    fn default() -> Self {
        SimulationConstants {
            dt: DEFAULT_DT,
            cutoff_radius_squared: DEFAULT_CUTOFF_RADIUS_SQUARED,
        }
    }
}

impl SimulationConstants {
    /// Create constants with an explicit time step and cutoff
    pub fn new(dt: f64, cutoff_radius_squared: f64) -> Self {
        SimulationConstants { dt, cutoff_radius_squared }
    }

    /// Set the time step
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Set the squared cutoff radius
    pub fn with_cutoff_radius_squared(mut self, r2: f64) -> Self {
        self.cutoff_radius_squared = r2;
        self
    }

    /// Half of the time step, used by the position update
    pub fn half_dt(&self) -> f64 {
        self.dt * 0.5
    }

    /// Reject constants that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(SimError::InvalidTimestep(self.dt));
        }
        if !(self.cutoff_radius_squared >= 0.0 && self.cutoff_radius_squared.is_finite()) {
            return Err(SimError::InvalidCutoff(self.cutoff_radius_squared));
        }
        Ok(())
    }

    /// Advisory check for time steps that are legal but likely unwise
    ///
    /// Returns a description of the problem, or `None` when the step looks
    /// reasonable. Backends log the message and carry on.
    pub fn timestep_advisory(&self) -> Option<String> {
        if self.dt < 1e-9 {
            Some(format!(
                "Timestep {} is extremely small and may cause precision loss with f64",
                self.dt
            ))
        } else if self.dt > 1.0 {
            Some(format!(
                "Timestep {} is large and may cause instability",
                self.dt
            ))
        } else {
            None
        }
    }
}

/// What the grid backend does when N is not a multiple of the group size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GroupPolicy {
    /// Fail initialization with [`SimError::GroupSizeMismatch`]
    #[default]
    Reject,
    /// Append zero-mass ghost particles up to the next multiple
    ///
    /// Ghosts exert no force and are never returned by readback.
    PadWithGhosts,
}

/// Execution-grid layout for the wide-parallel backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridConfig {
    /// Number of lanes scheduled together as one execution group
    pub group_size: usize,
    /// Handling of particle counts that do not fill whole groups
    pub policy: GroupPolicy,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            group_size: DEFAULT_GROUP_SIZE,
            policy: GroupPolicy::Reject,
        }
    }
}

impl GridConfig {
    /// Create a grid configuration with the given group size
    pub fn new(group_size: usize) -> Self {
        GridConfig {
            group_size,
            ..Default::default()
        }
    }

    /// Pad with ghost particles instead of rejecting non-conforming N
    pub fn with_ghost_padding(mut self) -> Self {
        self.policy = GroupPolicy::PadWithGhosts;
        self
    }

    /// Validate the layout against a particle count
    ///
    /// Returns the number of lanes the grid needs (N rounded up to whole
    /// groups under [`GroupPolicy::PadWithGhosts`], N otherwise).
    pub fn lane_count(&self, particles: usize) -> Result<usize> {
        if self.group_size == 0 {
            return Err(SimError::InvalidGroupSize(self.group_size));
        }
        if particles == 0 {
            return Err(SimError::EmptySystem);
        }
        let remainder = particles % self.group_size;
        match (remainder, self.policy) {
            (0, _) => Ok(particles),
            (_, GroupPolicy::Reject) => Err(SimError::GroupSizeMismatch {
                particles,
                group_size: self.group_size,
            }),
            (r, GroupPolicy::PadWithGhosts) => Ok(particles + (self.group_size - r)),
        }
    }
}

/// Worker configuration for the thread-parallel backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreadConfig {
    /// Worker count; 0 uses the global rayon pool
    pub threads: usize,
    /// Particles per work item; 0 picks a size giving each worker ~4 items
    pub chunk_size: usize,
}

impl ThreadConfig {
    /// Use a dedicated pool with exactly `threads` workers
    pub fn with_threads(threads: usize) -> Self {
        ThreadConfig {
            threads,
            ..Default::default()
        }
    }

    /// Fix the number of particles handed to a worker at a time
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Chunk length for `particles` particles spread over `workers` threads
    pub fn chunk_len(&self, particles: usize, workers: usize) -> usize {
        if self.chunk_size > 0 {
            self.chunk_size
        } else {
            // At least 4 chunks per worker for load balancing
            (particles / (workers.max(1) * 4)).max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let c = SimulationConstants::default();
        assert_eq!(c.dt, 0.01);
        assert_eq!(c.cutoff_radius_squared, 1.5);
        assert_eq!(c.half_dt(), 0.005);
        assert!(c.validate().is_ok());
        assert!(c.timestep_advisory().is_none());
    }

    #[test]
    fn test_invalid_constants() {
        assert_eq!(
            SimulationConstants::default().with_dt(0.0).validate(),
            Err(SimError::InvalidTimestep(0.0))
        );
        assert!(SimulationConstants::default().with_dt(f64::NAN).validate().is_err());
        assert_eq!(
            SimulationConstants::default().with_cutoff_radius_squared(-1.0).validate(),
            Err(SimError::InvalidCutoff(-1.0))
        );
        // A zero cutoff still excludes exactly coincident pairs
        assert!(SimulationConstants::default()
            .with_cutoff_radius_squared(0.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_timestep_advisory() {
        let small = SimulationConstants::default().with_dt(1e-10);
        assert!(small.timestep_advisory().unwrap().contains("extremely small"));

        let large = SimulationConstants::default().with_dt(2.0);
        assert!(large.timestep_advisory().unwrap().contains("large"));
    }

    #[test]
    fn test_lane_count_reject() {
        let grid = GridConfig::new(4);
        assert_eq!(grid.lane_count(8), Ok(8));
        assert_eq!(
            grid.lane_count(6),
            Err(SimError::GroupSizeMismatch { particles: 6, group_size: 4 })
        );
        assert_eq!(grid.lane_count(0), Err(SimError::EmptySystem));
        assert_eq!(GridConfig::new(0).lane_count(8), Err(SimError::InvalidGroupSize(0)));
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(ThreadConfig::default().chunk_len(1000, 5), 50);
        assert_eq!(ThreadConfig::default().chunk_len(3, 8), 1);
        assert_eq!(ThreadConfig::with_threads(2).with_chunk_size(7).chunk_len(1000, 2), 7);
    }

    #[test]
    fn test_lane_count_padding() {
        let grid = GridConfig::new(4).with_ghost_padding();
        assert_eq!(grid.lane_count(8), Ok(8));
        assert_eq!(grid.lane_count(6), Ok(8));
        assert_eq!(grid.lane_count(1), Ok(4));
    }
}
