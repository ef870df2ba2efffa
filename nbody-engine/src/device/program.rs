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
//! Device program: named stages, kernels and argument binding
//!
//! A program is built once from a [`ProgramSource`] listing the entry
//! points it provides. Kernels are created from the built program by name
//! and bound to buffers exactly once; the resulting [`BoundKernel`] is what
//! gets dispatched every cycle.

use super::memory::BufferId;
use crate::config::SimulationConstants;
use crate::error::{Result, SimError};

/// The computational stages a program can provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Force kernel: (positions, masses) -> accelerations
    ComputeForces,
    /// Integrator kernel: (positions, velocities, accelerations) -> (positions, velocities)
    UpdatePositions,
}

impl Stage {
    /// Every stage, in dispatch order
    pub const ALL: [Stage; 2] = [Stage::ComputeForces, Stage::UpdatePositions];

    /// Entry point name of the stage
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ComputeForces => "compute_forces",
            Stage::UpdatePositions => "update_positions",
        }
    }

    /// Look a stage up by entry point name
    pub fn from_name(name: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| stage.name() == name)
    }

    /// Buffers the stage must be bound to, in argument order
    pub fn signature(&self) -> &'static [BufferId] {
        match self {
            Stage::ComputeForces => &[BufferId::Positions, BufferId::Masses, BufferId::Accelerations],
            Stage::UpdatePositions => {
                &[BufferId::Positions, BufferId::Velocities, BufferId::Accelerations]
            }
        }
    }
}

/// Declaration of a program's entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    name: String,
    entry_points: Vec<String>,
}

impl ProgramSource {
    /// Empty source with the given name
    pub fn new(name: impl Into<String>) -> Self {
        ProgramSource {
            name: name.into(),
            entry_points: Vec::new(),
        }
    }

    /// Declare an entry point
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_points.push(name.into());
        self
    }

    /// The standard two-stage particle program
    pub fn nbody() -> Self {
        Stage::ALL
            .into_iter()
            .fold(ProgramSource::new("nbody"), |source, stage| {
                source.with_entry_point(stage.name())
            })
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A built program
///
/// The simulation constants are fixed at build time, the way compile-time
/// definitions would be for a real device program.
#[derive(Debug, Clone)]
pub struct Program {
    name: String,
    stages: Vec<Stage>,
    constants: SimulationConstants,
}

impl Program {
    /// Build a program from its source
    ///
    /// # Errors
    ///
    /// [`SimError::ProgramBuild`] if the source declares no entry points,
    /// declares one twice, or declares one with no implementation.
    pub fn build(source: &ProgramSource, constants: SimulationConstants) -> Result<Program> {
        constants.validate()?;
        if source.entry_points.is_empty() {
            return Err(SimError::ProgramBuild(format!(
                "program '{}' declares no entry points",
                source.name
            )));
        }

        let mut stages = Vec::with_capacity(source.entry_points.len());
        for entry in &source.entry_points {
            let stage = Stage::from_name(entry).ok_or_else(|| {
                SimError::ProgramBuild(format!("entry point '{entry}' has no implementation"))
            })?;
            if stages.contains(&stage) {
                return Err(SimError::ProgramBuild(format!(
                    "entry point '{entry}' declared twice"
                )));
            }
            stages.push(stage);
        }

        log::debug!("Built program '{}' with {} stage(s)", source.name, stages.len());
        Ok(Program {
            name: source.name.clone(),
            stages,
            constants,
        })
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages the program provides
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Create a kernel for the named stage
    ///
    /// # Errors
    ///
    /// [`SimError::UnknownStage`] if the program has no such entry point.
    pub fn create_kernel(&self, name: &str) -> Result<Kernel> {
        self.stages
            .iter()
            .copied()
            .find(|stage| stage.name() == name)
            .map(|stage| Kernel {
                stage,
                constants: self.constants,
            })
            .ok_or_else(|| SimError::UnknownStage(name.to_string()))
    }
}

/// An unbound kernel
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    stage: Stage,
    constants: SimulationConstants,
}

impl Kernel {
    /// Stage this kernel runs
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Bind the kernel's arguments to device buffers
    ///
    /// # Errors
    ///
    /// [`SimError::KernelBinding`] if `args` does not match the stage
    /// signature in count and order.
    pub fn bind(&self, args: &[BufferId]) -> Result<BoundKernel> {
        let expected = self.stage.signature();
        if args.len() != expected.len() {
            return Err(SimError::KernelBinding {
                stage: self.stage.name(),
                reason: format!("expected {} arguments, got {}", expected.len(), args.len()),
            });
        }
        for (position, (given, wanted)) in args.iter().zip(expected).enumerate() {
            if given != wanted {
                return Err(SimError::KernelBinding {
                    stage: self.stage.name(),
                    reason: format!(
                        "argument {} must be {}, got {}",
                        position,
                        wanted.name(),
                        given.name()
                    ),
                });
            }
        }
        Ok(BoundKernel {
            stage: self.stage,
            constants: self.constants,
        })
    }
}

/// A kernel with its arguments bound, ready to dispatch any number of times
#[derive(Debug, Clone, Copy)]
pub struct BoundKernel {
    stage: Stage,
    constants: SimulationConstants,
}

impl BoundKernel {
    /// Stage this kernel runs
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Constants baked into the program
    pub fn constants(&self) -> &SimulationConstants {
        &self.constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Program {
        Program::build(&ProgramSource::nbody(), SimulationConstants::default()).unwrap()
    }

    #[test]
    fn test_stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_name(stage.name()), Some(stage));
        }
        assert_eq!(Stage::from_name("integrate"), None);
    }

    #[test]
    fn test_build_standard_program() {
        let program = program();
        assert_eq!(program.name(), "nbody");
        assert_eq!(program.stages(), &Stage::ALL);
    }

    #[test]
    fn test_build_failures() {
        let constants = SimulationConstants::default();

        let empty = ProgramSource::new("empty");
        assert!(matches!(Program::build(&empty, constants), Err(SimError::ProgramBuild(_))));

        let unknown = ProgramSource::new("bad").with_entry_point("collide");
        let err = Program::build(&unknown, constants).unwrap_err();
        assert!(err.to_string().contains("collide"));

        let twice = ProgramSource::new("dup")
            .with_entry_point("compute_forces")
            .with_entry_point("compute_forces");
        assert!(matches!(Program::build(&twice, constants), Err(SimError::ProgramBuild(_))));
    }

    #[test]
    fn test_create_kernel_unknown_stage() {
        let source = ProgramSource::new("forces-only").with_entry_point("compute_forces");
        let program = Program::build(&source, SimulationConstants::default()).unwrap();
        assert!(program.create_kernel("compute_forces").is_ok());
        assert_eq!(
            program.create_kernel("update_positions").unwrap_err(),
            SimError::UnknownStage("update_positions".into())
        );
    }

    #[test]
    fn test_bind_checks_signature() {
        let kernel = program().create_kernel("compute_forces").unwrap();
        let bound = kernel
            .bind(&[BufferId::Positions, BufferId::Masses, BufferId::Accelerations])
            .unwrap();
        assert_eq!(bound.stage(), Stage::ComputeForces);

        let err = kernel
            .bind(&[BufferId::Positions, BufferId::Velocities, BufferId::Accelerations])
            .unwrap_err();
        assert!(err.to_string().contains("argument 1 must be masses"));

        let err = kernel.bind(&[BufferId::Positions]).unwrap_err();
        assert!(err.to_string().contains("expected 3 arguments"));
    }
}
