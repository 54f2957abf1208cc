//! Fixed-step accumulator driver that orchestrates the system list.

use tracing::debug;

use crate::physics::body::BodyStore;
use crate::physics::systems::{build_system, PhysicsSystem, SystemKind};

/// Frame `dt` values above this are clamped before being added to the
/// accumulator, so a debugger breakpoint or a dropped frame can't produce
/// a runaway catch-up burst.
pub const MAX_FRAME_DT: f32 = 0.25;

/// Accumulator is capped at this many fixed steps' worth of backlog — the
/// spiral-of-death guard.
pub const MAX_ACCUMULATOR_STEPS: f32 = 4.0;

/// Owns the ordered system list and the fixed-step accumulator. Generic
/// over the store so a host can substitute its own `BodyStore` impl in
/// place of [`crate::physics::store::HecsBodyStore`].
pub struct PhysicsWorld<S: BodyStore> {
    fixed_timestep: f32,
    accumulator: f32,
    systems: Vec<Box<dyn PhysicsSystem<S>>>,
}

impl<S: BodyStore + 'static> PhysicsWorld<S> {
    pub fn new(fixed_timestep: f32) -> Self {
        debug!(fixed_timestep, "constructing physics world");
        Self {
            fixed_timestep,
            accumulator: 0.0,
            systems: Vec::new(),
        }
    }

    pub fn fixed_timestep(&self) -> f32 {
        self.fixed_timestep
    }

    /// Append a system, built from its declarative [`SystemKind`]. Insertion
    /// order is execution order, both for `init` and every `fixed_step`.
    pub fn add_system(&mut self, kind: SystemKind) -> &mut Self {
        self.systems.push(build_system(kind));
        self
    }

    /// Run every system's `init` hook once, in insertion order.
    pub fn init(&mut self, store: &mut S) {
        for system in &mut self.systems {
            system.init(store);
        }
    }

    /// Advance the simulation by `frame_dt` (clamped to [`MAX_FRAME_DT`]),
    /// running as many fixed steps as the accumulator now covers. Returns
    /// once the accumulator is drained below one fixed step.
    pub fn update(&mut self, store: &mut S, frame_dt: f32) {
        let clamped = frame_dt.min(MAX_FRAME_DT);
        self.accumulator += clamped;
        self.accumulator = self
            .accumulator
            .min(MAX_ACCUMULATOR_STEPS * self.fixed_timestep);

        while self.accumulator >= self.fixed_timestep {
            self.step(store);
            self.accumulator -= self.fixed_timestep;
        }
    }

    fn step(&mut self, store: &mut S) {
        let dt = self.fixed_timestep;
        for system in &mut self.systems {
            system.fixed_step(store, dt);
        }
    }
}
