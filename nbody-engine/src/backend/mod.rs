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
//! Execution backends
//!
//! Two interchangeable strategies run the same two-kernel cycle:
//!
//! - [`GridBackend`]: wide-parallel. State lives in device memory; each
//!   cycle is two dispatches on an in-order queue; `advance` does not block.
//! - [`ThreadedBackend`]: thread-parallel reference. One fused parallel loop
//!   over host arrays; `advance` blocks until the cycle is done.
//!
//! Both implement [`Backend`], so cross-validation ([`compare_backends`])
//! and benchmarks are written once.

mod grid;
mod threaded;

pub use grid::{GridBackend, GridState};
pub use threaded::{advance_host, ThreadedBackend};

use crate::error::{Result, SimError};
use crate::vector::Vec3;

/// Common interface of the execution strategies
pub trait Backend {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Host-visible particle count
    fn len(&self) -> usize;

    /// Whether the backend holds no particles (never true once constructed)
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cycles submitted so far
    fn cycles(&self) -> u64;

    /// Advance every particle by one cycle
    fn advance(&mut self) -> Result<()>;

    /// Copy current positions into `out`, waiting for outstanding work
    ///
    /// `out.len()` must equal [`len`](Backend::len).
    fn read_positions(&self, out: &mut [Vec3]) -> Result<()>;

    /// Copy current velocities into `out`, waiting for outstanding work
    fn read_velocities(&self, out: &mut [Vec3]) -> Result<()>;

    /// Advance by `cycles` cycles
    fn advance_by(&mut self, cycles: usize) -> Result<()> {
        for _ in 0..cycles {
            self.advance()?;
        }
        Ok(())
    }
}

pub(crate) fn check_output_len(what: &'static str, expected: usize, out: &[Vec3]) -> Result<()> {
    if out.len() != expected {
        return Err(SimError::LengthMismatch {
            what,
            expected,
            actual: out.len(),
        });
    }
    Ok(())
}

/// Largest relative difference between two vector arrays
///
/// For each pair the difference is scaled by the larger of the two
/// magnitudes; pairs that are both exactly zero count as equal. Arrays of
/// different length compare as `f64::INFINITY`.
pub fn max_relative_error(a: &[Vec3], b: &[Vec3]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let scale = x.length().max(y.length());
            if scale == 0.0 {
                0.0
            } else {
                (x - y).length() / scale
            }
        })
        .fold(0.0, f64::max)
}

/// Outcome of running two backends in lockstep
#[derive(Debug, Clone, PartialEq)]
pub struct ParityReport {
    /// Cycles compared
    pub cycles: usize,
    /// Worst position disagreement seen at any cycle boundary
    pub max_position_error: f64,
    /// Worst velocity disagreement seen at any cycle boundary
    pub max_velocity_error: f64,
    /// First cycle (1-based) whose disagreement exceeded the tolerance
    pub first_divergence: Option<usize>,
}

impl ParityReport {
    /// True when no cycle exceeded the tolerance
    pub fn agrees(&self) -> bool {
        self.first_divergence.is_none()
    }
}

/// Advance two backends side by side and compare them after every cycle
///
/// # Errors
///
/// [`SimError::LengthMismatch`] if the backends hold different particle
/// counts, or any error raised by either backend.
pub fn compare_backends(
    a: &mut dyn Backend,
    b: &mut dyn Backend,
    cycles: usize,
    tolerance: f64,
) -> Result<ParityReport> {
    let n = a.len();
    if b.len() != n {
        return Err(SimError::LengthMismatch {
            what: "backend particles",
            expected: n,
            actual: b.len(),
        });
    }

    let mut pos_a = vec![Vec3::zero(); n];
    let mut pos_b = vec![Vec3::zero(); n];
    let mut vel_a = vec![Vec3::zero(); n];
    let mut vel_b = vec![Vec3::zero(); n];

    let mut report = ParityReport {
        cycles,
        max_position_error: 0.0,
        max_velocity_error: 0.0,
        first_divergence: None,
    };

    for cycle in 1..=cycles {
        a.advance()?;
        b.advance()?;
        a.read_positions(&mut pos_a)?;
        b.read_positions(&mut pos_b)?;
        a.read_velocities(&mut vel_a)?;
        b.read_velocities(&mut vel_b)?;

        let position_error = max_relative_error(&pos_a, &pos_b);
        let velocity_error = max_relative_error(&vel_a, &vel_b);
        report.max_position_error = report.max_position_error.max(position_error);
        report.max_velocity_error = report.max_velocity_error.max(velocity_error);

        if report.first_divergence.is_none() && (position_error > tolerance || velocity_error > tolerance) {
            log::warn!(
                "{} and {} diverged at cycle {}: position error {:e}, velocity error {:e}",
                a.name(),
                b.name(),
                cycle,
                position_error,
                velocity_error
            );
            report.first_divergence = Some(cycle);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_error_identical() {
        let a = [Vec3::new(1.0, 2.0, 3.0), Vec3::zero()];
        assert_eq!(max_relative_error(&a, &a), 0.0);
    }

    #[test]
    fn test_relative_error_scaled() {
        let a = [Vec3::new(100.0, 0.0, 0.0)];
        let b = [Vec3::new(100.001, 0.0, 0.0)];
        let err = max_relative_error(&a, &b);
        assert!(err > 9.9e-6 && err < 1.0e-5);
    }

    #[test]
    fn test_relative_error_length_mismatch() {
        assert_eq!(max_relative_error(&[Vec3::zero()], &[]), f64::INFINITY);
    }

    #[test]
    fn test_output_length_check() {
        assert!(check_output_len("positions", 2, &[Vec3::zero(); 2]).is_ok());
        assert_eq!(
            check_output_len("positions", 2, &[Vec3::zero(); 3]),
            Err(SimError::LengthMismatch { what: "positions", expected: 2, actual: 3 })
        );
    }
}
