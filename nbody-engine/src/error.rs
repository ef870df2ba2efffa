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
//! Typed errors for configuration, device setup and backend operation
//!
//! Every failure is fatal for the run that raised it. Configuration errors
//! are reported before any work reaches a backend; environment errors come
//! from building the device program or the worker threads.

use std::fmt;

/// Errors raised by the simulation backends and their collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// The particle set is empty (N = 0)
    EmptySystem,

    /// Two arrays that must describe the same particles differ in length
    LengthMismatch {
        /// Which array was wrong
        what: &'static str,
        /// Length required by the particle count
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// A mass is zero, negative or not finite
    InvalidMass {
        /// Particle index
        index: usize,
        /// Offending value
        mass: f64,
    },

    /// A position or velocity component is NaN or infinite
    InvalidState {
        /// Particle index
        index: usize,
        /// `"position"` or `"velocity"`
        what: &'static str,
    },

    /// Time step is not positive and finite
    InvalidTimestep(f64),

    /// Cutoff radius squared is negative or not finite
    InvalidCutoff(f64),

    /// Execution group size of zero
    InvalidGroupSize(usize),

    /// Particle count is not a multiple of the execution group size
    GroupSizeMismatch {
        /// Particle count N
        particles: usize,
        /// Requested group size
        group_size: usize,
    },

    /// The device program could not be built
    ProgramBuild(String),

    /// The program has no stage with this name
    UnknownStage(String),

    /// A kernel was bound to buffers it cannot use
    KernelBinding {
        /// Stage name
        stage: &'static str,
        /// What was wrong with the binding
        reason: String,
    },

    /// The device (or its command queue) is gone
    DeviceUnavailable(String),

    /// A dedicated worker pool could not be created
    ThreadPool(String),

    /// The backend was released and can no longer be used
    Released,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySystem => write!(f, "Particle set is empty"),
            Self::LengthMismatch { what, expected, actual } => write!(
                f,
                "Length mismatch for {what}: expected {expected}, got {actual}"
            ),
            Self::InvalidMass { index, mass } => write!(
                f,
                "Invalid mass {mass} for particle {index}: must be positive and finite"
            ),
            Self::InvalidState { index, what } => {
                write!(f, "Non-finite {what} for particle {index}")
            }
            Self::InvalidTimestep(dt) => {
                write!(f, "Invalid timestep: {dt}. Must be positive and finite.")
            }
            Self::InvalidCutoff(r2) => write!(
                f,
                "Invalid cutoff radius squared: {r2}. Must be non-negative and finite."
            ),
            Self::InvalidGroupSize(size) => {
                write!(f, "Invalid group size: {size}. Must be at least 1.")
            }
            Self::GroupSizeMismatch { particles, group_size } => write!(
                f,
                "Particle count {particles} is not a multiple of group size {group_size}"
            ),
            Self::ProgramBuild(msg) => write!(f, "Failed to build device program: {msg}"),
            Self::UnknownStage(name) => write!(f, "Device program has no stage named '{name}'"),
            Self::KernelBinding { stage, reason } => {
                write!(f, "Cannot bind arguments for stage '{stage}': {reason}")
            }
            Self::DeviceUnavailable(msg) => write!(f, "Device unavailable: {msg}"),
            Self::ThreadPool(msg) => write!(f, "Failed to create worker pool: {msg}"),
            Self::Released => write!(f, "Backend has been released"),
        }
    }
}

impl std::error::Error for SimError {}

impl SimError {
    /// True for errors caused by caller-supplied configuration or data
    ///
    /// Everything else describes an unusable execution environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptySystem
                | Self::LengthMismatch { .. }
                | Self::InvalidMass { .. }
                | Self::InvalidState { .. }
                | Self::InvalidTimestep(_)
                | Self::InvalidCutoff(_)
                | Self::InvalidGroupSize(_)
                | Self::GroupSizeMismatch { .. }
        )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SimError>;
