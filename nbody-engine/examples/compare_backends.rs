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
//! Run both backends on the same system and report how far apart they end up
//!
//! Usage: `cargo run --example compare_backends -- [particles] [cycles]`
//!
//! Set `RUST_LOG=debug` to see backend setup and per-cycle queue activity.

use std::time::Instant;

use nbody_engine::{
    max_relative_error, Backend, GridBackend, GridConfig, ParticleSet, SimulationConstants,
    ThreadConfig, ThreadedBackend, Vec3,
};

fn lattice(n: usize) -> ParticleSet {
    let side = (n as f64).cbrt().ceil() as usize;
    let mut masses = Vec::with_capacity(n);
    let mut positions = Vec::with_capacity(n);
    let mut velocities = Vec::with_capacity(n);
    for i in 0..n {
        let (x, y, z) = (i % side, (i / side) % side, i / (side * side));
        masses.push(1.0 + (i % 3) as f64 * 0.5);
        positions.push(Vec3::new(x as f64 * 1.5, y as f64 * 1.5, z as f64 * 1.5));
        velocities.push(Vec3::new(0.0, 0.01 * (i as f64).sin(), 0.0));
    }
    // Lattice spacing keeps every pair clear of the cutoff at t = 0
    ParticleSet::new(masses, positions, velocities).expect("lattice is valid")
}

fn arg_or(index: usize, default: usize) -> usize {
    std::env::args()
        .nth(index)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let n = arg_or(1, 1024);
    let cycles = arg_or(2, 100);
    let constants = SimulationConstants::default();
    let particles = lattice(n);

    println!("=== N-body backend comparison ===");
    println!("Particles: {n}");
    println!("Cycles:    {cycles}");
    println!("dt:        {}", constants.dt);
    println!("cutoff²:   {}", constants.cutoff_radius_squared);
    println!();

    let grid_config = GridConfig::default().with_ghost_padding();
    let mut grid = GridBackend::initialize(&particles, constants, grid_config)?;
    println!(
        "Grid backend: {} groups of {} lanes ({} ghosts)",
        grid.groups(),
        grid.group_size(),
        grid.ghosts()
    );

    let start = Instant::now();
    grid.advance_by(cycles)?;
    grid.finish()?;
    let grid_time = start.elapsed();

    let mut threaded = ThreadedBackend::new(particles.clone(), constants, ThreadConfig::default())?;
    println!("Threaded backend: {} workers", threaded.threads());

    let start = Instant::now();
    threaded.advance_by(cycles)?;
    let threaded_time = start.elapsed();

    let mut grid_positions = vec![Vec3::zero(); n];
    let mut grid_velocities = vec![Vec3::zero(); n];
    grid.read_positions(&mut grid_positions)?;
    grid.read_velocities(&mut grid_velocities)?;

    let position_error = max_relative_error(&grid_positions, threaded.positions());
    let velocity_error = max_relative_error(&grid_velocities, threaded.velocities());

    println!();
    println!("Grid:     {:>10.3} ms", grid_time.as_secs_f64() * 1e3);
    println!("Threaded: {:>10.3} ms", threaded_time.as_secs_f64() * 1e3);
    println!();
    println!("Max relative position deviation: {position_error:e}");
    println!("Max relative velocity deviation: {velocity_error:e}");

    let initial = particles.total_momentum();
    let state = threaded.to_particles()?;
    println!(
        "Momentum drift: {:e}",
        (state.total_momentum() - initial).length()
    );

    if position_error > 1e-5 || velocity_error > 1e-5 {
        println!("\nBackends disagree beyond 1e-5");
        std::process::exit(1);
    }
    println!("\nBackends agree within 1e-5");

    grid.release();
    Ok(())
}
