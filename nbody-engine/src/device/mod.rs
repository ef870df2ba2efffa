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
//! Emulated accelerator for the wide-parallel backend
//!
//! This module stands in for an accelerator runtime. It provides exactly
//! what the grid backend needs from one:
//!
//! - **Memory** ([`DeviceMemory`]): four persistent N-element buffers
//!   (positions, velocities, accelerations, masses) that the host can only
//!   reach through explicit writes and reads.
//! - **Program** ([`Program`]): named computational stages built once, then
//!   turned into kernels and bound to buffers ([`Kernel::bind`]). Binding
//!   only checks the argument list against the stage signature; every stage
//!   always reads and writes the fixed buffers of its signature, so a
//!   binding cannot redirect a stage to other memory.
//! - **Queue** ([`CommandQueue`]): an in-order command queue served by a
//!   dedicated thread. Enqueueing never blocks; a dispatch starts only after
//!   every earlier command has finished, which is the only synchronization
//!   between stages and between cycles.
//!   Shutting the queue down drops the device memory with it.
//!
//! Each dispatch runs one lane per particle. Lanes are grouped into
//! fixed-size execution groups ([`LaunchShape`]) and groups are spread over
//! the rayon pool when the `parallel` feature is enabled.

mod executor;
mod memory;
mod program;
mod queue;

pub use memory::{BufferId, DeviceMemory};
pub use program::{BoundKernel, Kernel, Program, ProgramSource, Stage};
pub use queue::CommandQueue;

use crate::error::{Result, SimError};

/// Total lane count and group size of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchShape {
    global: usize,
    local: usize,
}

impl LaunchShape {
    /// Create a launch shape of `global` lanes in groups of `local`
    ///
    /// # Errors
    ///
    /// Fails if either size is zero or `global` is not a multiple of `local`.
    pub fn new(global: usize, local: usize) -> Result<Self> {
        if local == 0 {
            return Err(SimError::InvalidGroupSize(local));
        }
        if global == 0 {
            return Err(SimError::EmptySystem);
        }
        if global % local != 0 {
            return Err(SimError::GroupSizeMismatch {
                particles: global,
                group_size: local,
            });
        }
        Ok(LaunchShape { global, local })
    }

    /// Total number of lanes
    pub fn global(&self) -> usize {
        self.global
    }

    /// Lanes per execution group
    pub fn local(&self) -> usize {
        self.local
    }

    /// Number of execution groups
    pub fn groups(&self) -> usize {
        self.global / self.local
    }
}
