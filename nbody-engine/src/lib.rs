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
//! # N-Body Engine
//!
//! Direct-summation simulation of point masses under pairwise
//! inverse-square attraction with a hard close-range cutoff, advanced in
//! fixed time steps by one of two interchangeable backends.
//!
//! ## Features
//!
//! - **Force kernel**: per-particle acceleration from a pre-cycle snapshot,
//!   pairs at or inside the cutoff excluded exactly
//! - **Integrator kernel**: one force evaluation per step, reused for the
//!   position and the velocity update
//! - **Grid backend**: wide-parallel lanes in fixed-size groups over
//!   persistent device buffers, dispatched through an in-order queue
//! - **Threaded backend**: fused host-parallel loop used as a reference and
//!   throughput baseline
//! - **Cross-validation**: run both backends in lockstep and compare
//!
//! ## Example
//!
//! ```rust
//! use nbody_engine::{
//!     compare_backends, GridBackend, GridConfig, ParticleSet, SimulationConstants,
//!     ThreadConfig, ThreadedBackend, Vec3,
//! };
//!
//! let particles = ParticleSet::new(
//!     vec![1.0, 1.0],
//!     vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
//!     vec![Vec3::zero(); 2],
//! ).unwrap();
//! let constants = SimulationConstants::default();
//!
//! let mut grid = GridBackend::initialize(&particles, constants, GridConfig::new(2)).unwrap();
//! let mut threaded = ThreadedBackend::new(particles, constants, ThreadConfig::default()).unwrap();
//!
//! let report = compare_backends(&mut grid, &mut threaded, 10, 1e-5).unwrap();
//! assert!(report.agrees());
//! ```

#![warn(missing_docs)]

/// Parallel execution strategies
pub mod backend;

/// Simulation constants and backend configuration
pub mod config;

/// Emulated accelerator used by the grid backend
pub mod device;

/// Error types
pub mod error;

/// Force and integrator kernels
pub mod kernels;

/// Host-side particle arrays
pub mod particles;

/// 3D vector type
pub mod vector;

pub use backend::{
    advance_host, compare_backends, max_relative_error, Backend, GridBackend, GridState, ParityReport,
    ThreadedBackend,
};
pub use config::{GridConfig, GroupPolicy, SimulationConstants, ThreadConfig};
pub use error::{Result, SimError};
pub use particles::ParticleSet;
pub use vector::Vec3;
