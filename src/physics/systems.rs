//! The plugin shell behind the pipeline: an ordered list of systems a host
//! wires onto a [`crate::physics::world::PhysicsWorld`].

use glam::Vec2;
use tracing::debug;

use crate::physics::body::{BodyStore, Collider};
use crate::physics::broadphase::{compute_aabb, SweepAndPrune};
use crate::physics::contact::ContactManager;
use crate::physics::inertia::compute_inertia;
use crate::physics::mouse_grab::{self, MouseGrabState, PointerState};
use crate::physics::narrowphase::{circle_vs_circle, circle_vs_polygon, polygon_vs_polygon};
use crate::physics::solver::{self, SolverConfig};

/// A stage of the per-tick pipeline. `init` runs once, `fixed_step` runs
/// once per fixed-timestep tick, in the order systems were added to the
/// world.
pub trait PhysicsSystem<S: BodyStore> {
    fn init(&mut self, _store: &mut S) {}
    fn fixed_step(&mut self, store: &mut S, dt: f32);
}

/// Declarative description of a system to add to a [`PhysicsWorld`], built
/// as a closed enum so the system list can be constructed and logged
/// without boxing trait objects by hand at the call site.
///
/// [`PhysicsWorld`]: crate::physics::world::PhysicsWorld
pub enum SystemKind {
    Inertia,
    Gravity(Vec2),
    MouseGrab,
    CollisionDetection,
    ConstraintSolver {
        velocity_iterations: u32,
        position_iterations: u32,
    },
}

/// Derives every body's inertia from its collider once, at `init`. Does
/// not re-run per tick.
#[derive(Default)]
pub struct InertiaSystem;

impl<S: BodyStore> PhysicsSystem<S> for InertiaSystem {
    fn init(&mut self, store: &mut S) {
        for id in store.collidable_bodies() {
            let Some(collider) = store.collider(id).cloned() else {
                continue;
            };
            let Some(rb) = store.body_mut(id) else {
                continue;
            };
            if rb.is_static || rb.mass <= 0.0 {
                rb.inertia = 0.0;
                rb.inv_inertia = 0.0;
                continue;
            }
            let (inertia, inv_inertia) = compute_inertia(&collider, rb.mass);
            rb.inertia = inertia;
            rb.inv_inertia = inv_inertia;
        }
    }

    fn fixed_step(&mut self, _store: &mut S, _dt: f32) {}
}

/// Accumulates a constant force `mass * gravity` into every non-static
/// body's force accumulator each tick. A body's `is_static` flag is read
/// fresh every tick, so toggling it takes effect on the next step.
pub struct GravitySystem {
    pub gravity: Vec2,
}

impl GravitySystem {
    pub fn new(gravity: Vec2) -> Self {
        Self { gravity }
    }
}

impl<S: BodyStore> PhysicsSystem<S> for GravitySystem {
    fn fixed_step(&mut self, store: &mut S, _dt: f32) {
        for id in store.bodies() {
            let Some(rb) = store.body_mut(id) else {
                continue;
            };
            if rb.is_static {
                continue;
            }
            rb.force += self.gravity * rb.mass * rb.gravity_scale;
        }
    }
}

/// Drives the mouse-grab acquire/release/pre-step machinery each tick.
/// Reads `PointerState` and owns `MouseGrabState`, both in the store's
/// context map.
pub struct MouseGrabSystem {
    pub frequency: f32,
    pub damping_ratio: f32,
    pub max_force: f32,
}

impl Default for MouseGrabSystem {
    fn default() -> Self {
        Self {
            frequency: 5.0,
            damping_ratio: 1.0,
            max_force: 500.0,
        }
    }
}

impl<S: BodyStore> PhysicsSystem<S> for MouseGrabSystem {
    fn fixed_step(&mut self, store: &mut S, dt: f32) {
        let pointer = store
            .context()
            .get::<PointerState>()
            .copied()
            .unwrap_or_default();

        let mut state = store
            .context_mut()
            .remove::<MouseGrabState>()
            .unwrap_or_default();

        mouse_grab::handle_pointer_edges(store, &mut state, &pointer);
        if state.active {
            state.target = pointer.world_pos;
            mouse_grab::pre_step(
                store,
                &mut state,
                dt,
                self.frequency,
                self.damping_ratio,
                self.max_force,
            );
        }

        store.context_mut().insert(state);
    }
}

/// Broadphase + narrowphase, producing this tick's contacts and feeding
/// them through the persistent [`ContactManager`] for warm-start carry-over.
#[derive(Default)]
pub struct CollisionDetectionSystem {
    broadphase: SweepAndPrune,
}

impl CollisionDetectionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with a non-default AABB inflation margin (default:
    /// [`crate::physics::broadphase::BROADPHASE_MARGIN`]).
    pub fn with_margin(margin: f32) -> Self {
        Self {
            broadphase: SweepAndPrune::with_margin(margin),
        }
    }

    pub fn margin(&self) -> f32 {
        self.broadphase.margin()
    }

    pub fn set_margin(&mut self, margin: f32) {
        self.broadphase.set_margin(margin);
    }
}

impl<S: BodyStore> PhysicsSystem<S> for CollisionDetectionSystem {
    fn fixed_step(&mut self, store: &mut S, _dt: f32) {
        let bodies = store.collidable_bodies();
        let margin = self.broadphase.margin();

        let aabbs: Vec<_> = bodies
            .iter()
            .filter_map(|&id| {
                let collider = store.collider(id)?.clone();
                let transform = *store.transform(id)?;
                let is_static = store.body(id)?.is_static;
                Some((id, compute_aabb(&collider, &transform, margin), is_static))
            })
            .collect();

        let pairs = self.broadphase.find_pairs(&bodies, |id| {
            aabbs
                .iter()
                .find(|(bid, _, _)| *bid == id)
                .map(|(_, aabb, is_static)| (*aabb, *is_static))
                .unwrap_or((
                    crate::physics::broadphase::Aabb {
                        min: Vec2::ZERO,
                        max: Vec2::ZERO,
                    },
                    true,
                ))
        });

        let mut constraints = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            let Some(collider_a) = store.collider(a).cloned() else {
                continue;
            };
            let Some(collider_b) = store.collider(b).cloned() else {
                continue;
            };
            let Some(xf_a) = store.transform(a).copied() else {
                continue;
            };
            let Some(xf_b) = store.transform(b).copied() else {
                continue;
            };

            let mut constraint = match (&collider_a, &collider_b) {
                (Collider::Circle { radius: ra, offset: oa }, Collider::Circle { radius: rb, offset: ob }) => {
                    circle_vs_circle(a, &xf_a, *ra, *oa, b, &xf_b, *rb, *ob)
                }
                (Collider::Circle { radius, offset }, _) => {
                    circle_vs_polygon(a, &xf_a, *radius, *offset, b, &xf_b, &collider_b, false)
                }
                (_, Collider::Circle { radius, offset }) => {
                    circle_vs_polygon(b, &xf_b, *radius, *offset, a, &xf_a, &collider_a, true)
                }
                _ => polygon_vs_polygon(a, &xf_a, &collider_a, b, &xf_b, &collider_b),
            };

            if let Some(c) = constraint.as_mut() {
                let Some(rb_a) = store.body(a) else { continue };
                let Some(rb_b) = store.body(b) else { continue };
                c.friction = (rb_a.friction * rb_b.friction).max(0.0).sqrt();
                c.restitution = rb_a.restitution.max(rb_b.restitution);
            }

            if let Some(c) = constraint {
                constraints.push(c);
            }
        }

        store
            .context_mut()
            .get_mut_or_default::<ContactManager>()
            .update(constraints);
    }
}

/// Runs the sequential-impulse solver over this tick's contacts (plus any
/// active mouse grab) — the bulk of the pipeline. The four position/
/// restitution constants from [`crate::physics::solver`] are exposed here as
/// settable fields, the same way `velocity_iterations`/`position_iterations`
/// already were; [`ConstraintSolverSystem::new`] seeds them from
/// [`SolverConfig::default`].
pub struct ConstraintSolverSystem {
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub baumgarte: f32,
    pub slop: f32,
    pub max_position_correction: f32,
    pub restitution_threshold: f32,
}

impl ConstraintSolverSystem {
    pub fn new(velocity_iterations: u32, position_iterations: u32) -> Self {
        let defaults = SolverConfig::default();
        Self {
            velocity_iterations,
            position_iterations,
            baumgarte: defaults.baumgarte,
            slop: defaults.slop,
            max_position_correction: defaults.max_position_correction,
            restitution_threshold: defaults.restitution_threshold,
        }
    }

    fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            baumgarte: self.baumgarte,
            slop: self.slop,
            max_position_correction: self.max_position_correction,
            restitution_threshold: self.restitution_threshold,
        }
    }
}

impl<S: BodyStore> PhysicsSystem<S> for ConstraintSolverSystem {
    fn fixed_step(&mut self, store: &mut S, dt: f32) {
        let mut constraints = store
            .context_mut()
            .get_mut_or_default::<ContactManager>()
            .constraints()
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();

        let mut grab = store.context_mut().remove::<MouseGrabState>();
        let grab_ref = grab.as_mut().filter(|g| g.active);

        solver::solve(
            store,
            &mut constraints,
            grab_ref,
            dt,
            self.velocity_iterations,
            self.position_iterations,
            self.solver_config(),
        );

        if let Some(grab) = grab {
            store.context_mut().insert(grab);
        }

        store
            .context_mut()
            .get_mut_or_default::<ContactManager>()
            .replace_solved(constraints);
    }
}

impl std::fmt::Debug for SystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemKind::Inertia => write!(f, "Inertia"),
            SystemKind::Gravity(g) => write!(f, "Gravity({g})"),
            SystemKind::MouseGrab => write!(f, "MouseGrab"),
            SystemKind::CollisionDetection => write!(f, "CollisionDetection"),
            SystemKind::ConstraintSolver {
                velocity_iterations,
                position_iterations,
            } => write!(
                f,
                "ConstraintSolver{{velocity_iterations: {velocity_iterations}, position_iterations: {position_iterations}}}"
            ),
        }
    }
}

/// Build the boxed system a [`SystemKind`] describes, logging the choice
/// at `debug!`.
pub fn build_system<S: BodyStore + 'static>(kind: SystemKind) -> Box<dyn PhysicsSystem<S>> {
    debug!(system = ?kind, "adding physics system");
    match kind {
        SystemKind::Inertia => Box::new(InertiaSystem),
        SystemKind::Gravity(g) => Box::new(GravitySystem::new(g)),
        SystemKind::MouseGrab => Box::new(MouseGrabSystem::default()),
        SystemKind::CollisionDetection => Box::new(CollisionDetectionSystem::default()),
        SystemKind::ConstraintSolver {
            velocity_iterations,
            position_iterations,
        } => Box::new(ConstraintSolverSystem::new(velocity_iterations, position_iterations)),
    }
}
