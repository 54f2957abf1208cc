//! 2D rigid-body physics core: fixed-timestep pipeline of broadphase,
//! narrowphase, persistent contact caching, and a sequential-impulse
//! solver with a soft mouse-grab constraint.

pub mod body;
pub mod broadphase;
pub mod contact;
pub mod inertia;
pub mod mouse_grab;
pub mod narrowphase;
pub mod solver;
#[cfg(feature = "ecs")]
pub mod store;
pub mod systems;
pub mod world;

pub use body::{BodyId, BodyStore, Collider, Context, RigidBody, Transform};
pub use broadphase::{compute_aabb, Aabb, SweepAndPrune, BROADPHASE_MARGIN};
pub use contact::{ContactConstraint, ContactFeature, ContactManager, ContactPoint, FeatureKind};
pub use mouse_grab::{MouseGrabState, PointerState};
pub use solver::SolverConfig;
#[cfg(feature = "ecs")]
pub use store::HecsBodyStore;
pub use systems::{
    CollisionDetectionSystem, ConstraintSolverSystem, GravitySystem, InertiaSystem,
    MouseGrabSystem, PhysicsSystem, SystemKind,
};
pub use world::PhysicsWorld;
