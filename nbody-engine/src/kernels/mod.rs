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
//! Per-particle computational kernels
//!
//! One cycle is two kernels applied to every particle `j`:
//!
//! 1. **Force** ([`accumulate_acceleration`]): sum the contributions of all
//!    particles `i` on `j` from a position snapshot taken before the cycle.
//! 2. **Integrate** ([`integrate_particle`]): advance `position[j]` and
//!    `velocity[j]` by one step with the acceleration from stage 1.
//!
//! Both backends call these exact functions, in the same per-particle
//! summation order, so their trajectories differ only if the parallel
//! decomposition breaks the snapshot ordering.
//!
//! # Integration scheme
//!
//! ```text
//! p' = p + dt * (v + dt/2 * a)
//! v' = v + dt * a
//! ```
//!
//! The position update equals the velocity Verlet one, but the velocity
//! update reuses the pre-step acceleration: one force evaluation per cycle.

mod force;
mod integrate;

pub use force::{accumulate_acceleration, pair_contribution};
pub use integrate::integrate_particle;
