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
//! Device-resident particle buffers

use crate::error::{Result, SimError};
use crate::vector::Vec3;

/// Identifies one of the four device buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    /// Particle positions, read-write
    Positions,
    /// Particle velocities, read-write
    Velocities,
    /// Per-cycle accelerations, written by the force stage
    Accelerations,
    /// Particle masses, read-only once uploaded
    Masses,
}

impl BufferId {
    /// Buffer name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            BufferId::Positions => "positions",
            BufferId::Velocities => "velocities",
            BufferId::Accelerations => "accelerations",
            BufferId::Masses => "masses",
        }
    }
}

/// The four persistent buffers of one simulation
///
/// All buffers have one slot per lane. Slots past the uploaded particle
/// count keep their zeroed initial contents: zero mass, at rest at the
/// origin.
#[derive(Debug)]
pub struct DeviceMemory {
    pub(crate) positions: Vec<Vec3>,
    pub(crate) velocities: Vec<Vec3>,
    pub(crate) accelerations: Vec<Vec3>,
    pub(crate) masses: Vec<f64>,
}

fn zeroed<T: Clone>(lanes: usize, value: T, id: BufferId) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(lanes).map_err(|e| {
        SimError::DeviceUnavailable(format!(
            "cannot allocate {} buffer of {} elements: {}",
            id.name(),
            lanes,
            e
        ))
    })?;
    buffer.resize(lanes, value);
    Ok(buffer)
}

fn check_fits(id: BufferId, lanes: usize, len: usize) -> Result<()> {
    if len > lanes {
        return Err(SimError::LengthMismatch {
            what: id.name(),
            expected: lanes,
            actual: len,
        });
    }
    Ok(())
}

impl DeviceMemory {
    /// Allocate zeroed buffers for `lanes` particles
    ///
    /// # Errors
    ///
    /// [`SimError::DeviceUnavailable`] if any buffer cannot be allocated.
    pub fn allocate(lanes: usize) -> Result<Self> {
        if lanes == 0 {
            return Err(SimError::EmptySystem);
        }
        Ok(DeviceMemory {
            positions: zeroed(lanes, Vec3::zero(), BufferId::Positions)?,
            velocities: zeroed(lanes, Vec3::zero(), BufferId::Velocities)?,
            accelerations: zeroed(lanes, Vec3::zero(), BufferId::Accelerations)?,
            masses: zeroed(lanes, 0.0, BufferId::Masses)?,
        })
    }

    /// Number of slots per buffer
    pub fn lanes(&self) -> usize {
        self.masses.len()
    }

    /// Upload masses into the leading slots
    pub fn write_masses(&mut self, masses: &[f64]) -> Result<()> {
        check_fits(BufferId::Masses, self.lanes(), masses.len())?;
        self.masses[..masses.len()].copy_from_slice(masses);
        Ok(())
    }

    /// Upload positions into the leading slots
    pub fn write_positions(&mut self, positions: &[Vec3]) -> Result<()> {
        check_fits(BufferId::Positions, self.lanes(), positions.len())?;
        self.positions[..positions.len()].copy_from_slice(positions);
        Ok(())
    }

    /// Upload velocities into the leading slots
    pub fn write_velocities(&mut self, velocities: &[Vec3]) -> Result<()> {
        check_fits(BufferId::Velocities, self.lanes(), velocities.len())?;
        self.velocities[..velocities.len()].copy_from_slice(velocities);
        Ok(())
    }

    /// Copy the leading `out.len()` positions to the host
    pub fn read_positions(&self, out: &mut [Vec3]) -> Result<()> {
        check_fits(BufferId::Positions, self.lanes(), out.len())?;
        out.copy_from_slice(&self.positions[..out.len()]);
        Ok(())
    }

    /// Copy the leading `out.len()` velocities to the host
    pub fn read_velocities(&self, out: &mut [Vec3]) -> Result<()> {
        check_fits(BufferId::Velocities, self.lanes(), out.len())?;
        out.copy_from_slice(&self.velocities[..out.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_zeroed() {
        let memory = DeviceMemory::allocate(8).unwrap();
        assert_eq!(memory.lanes(), 8);
        assert!(memory.masses.iter().all(|&m| m == 0.0));
        assert!(memory.positions.iter().all(|p| *p == Vec3::zero()));
        assert!(memory.accelerations.iter().all(|a| *a == Vec3::zero()));
    }

    #[test]
    fn test_partial_upload_leaves_tail_zeroed() {
        let mut memory = DeviceMemory::allocate(4).unwrap();
        memory.write_masses(&[1.0, 2.0]).unwrap();
        memory.write_positions(&[Vec3::new(1.0, 1.0, 1.0); 2]).unwrap();
        assert_eq!(memory.masses, vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(memory.positions[3], Vec3::zero());

        let mut out = [Vec3::zero(); 2];
        memory.read_positions(&mut out).unwrap();
        assert_eq!(out, [Vec3::new(1.0, 1.0, 1.0); 2]);
    }

    #[test]
    fn test_oversized_transfer_rejected() {
        let mut memory = DeviceMemory::allocate(2).unwrap();
        let err = memory.write_velocities(&[Vec3::zero(); 3]).unwrap_err();
        assert_eq!(
            err,
            SimError::LengthMismatch { what: "velocities", expected: 2, actual: 3 }
        );
    }

    #[test]
    fn test_buffer_names() {
        assert_eq!(BufferId::Masses.name(), "masses");
        assert_eq!(BufferId::Accelerations.name(), "accelerations");
    }
}
