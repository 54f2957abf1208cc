//! vervain2d — a 2D rigid-body physics core.
//!
//! A fixed-timestep simulation pipeline: broadphase sweep-and-prune,
//! SAT + Sutherland-Hodgman narrowphase, a persistent feature-keyed contact
//! cache, and a sequential-impulse velocity/position solver with Coulomb
//! friction, restitution, and a soft mouse-grab constraint.
//!
//! The crate is organized as a single module:
//!
//! - [`physics`] — body/collider components, inertia derivation, broadphase,
//!   narrowphase, the contact cache, the constraint solver, the mouse-grab
//!   constraint, the `BodyStore` contract plus its `hecs`-backed reference
//!   implementation (`ecs` feature, on by default), and the
//!   `PhysicsWorld` fixed-step driver that orchestrates all of it.
//!
//! Windowing, rendering, scripting, and every other concern of a full
//! real-time engine are out of scope — this crate consumes only a
//! `BodyStore` and, optionally, pointer edges.

pub mod physics;

pub use physics::{
    Aabb, BodyId, BodyStore, Collider, CollisionDetectionSystem, ConstraintSolverSystem, Context,
    ContactConstraint, ContactFeature, ContactManager, ContactPoint, FeatureKind, GravitySystem,
    InertiaSystem, MouseGrabState, MouseGrabSystem, PhysicsSystem, PhysicsWorld, PointerState,
    RigidBody, SolverConfig, SweepAndPrune, SystemKind, Transform, BROADPHASE_MARGIN,
};

#[cfg(feature = "ecs")]
pub use physics::HecsBodyStore;

// Re-export glam so callers constructing `Transform`/`RigidBody` values
// don't need to depend on it separately.
pub use glam;
