//! Body components and the store contract the physics core runs over.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use anyhow::{bail, Result};
use glam::Vec2;

/// Opaque handle to a body. Wraps the backing store's native id (for the
/// reference `hecs` implementation, a `hecs::Entity`) so callers cannot
/// treat it as an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(pub(crate) u64);

impl BodyId {
    /// Canonical unordered pair key for the contact map: the smaller id
    /// packed into the high 32 bits, the larger into the low 32 bits.
    pub(crate) fn pair_key(a: BodyId, b: BodyId) -> u64 {
        let (lo, hi) = if a.0 <= b.0 { (a.0, b.0) } else { (b.0, a.0) };
        (lo << 32) | (hi & 0xffff_ffff)
    }
}

/// 2D rigid-body dynamic state and material properties.
///
/// Field defaults mirror a typical 2D physics body: light damping, moderate
/// restitution and friction, and a generous speed cap so stacks don't
/// accumulate runaway velocity under sustained contact forces.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub mass: f32,
    pub inv_mass: f32,
    pub inertia: f32,
    pub inv_inertia: f32,

    pub linear_velocity: Vec2,
    pub angular_velocity: f32,

    pub force: Vec2,
    pub torque: f32,

    pub restitution: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub max_linear_speed: f32,
    pub gravity_scale: f32,

    pub is_static: bool,
}

impl RigidBody {
    /// A dynamic body of the given mass. Inertia is left at zero; the
    /// `InertiaSystem` derives it from the attached collider on init.
    pub fn new_dynamic(mass: f32) -> Self {
        Self {
            mass,
            inv_mass: if mass > 0.0 { 1.0 / mass } else { 0.0 },
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            restitution: 0.2,
            friction: 0.3,
            linear_damping: 0.01,
            angular_damping: 0.05,
            max_linear_speed: 50.0,
            gravity_scale: 1.0,
            is_static: false,
        }
    }

    /// An immovable body: zero inverse mass/inertia, pinned velocities.
    pub fn new_static() -> Self {
        Self {
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            restitution: 0.2,
            friction: 0.3,
            linear_damping: 0.0,
            angular_damping: 0.0,
            max_linear_speed: 0.0,
            gravity_scale: 0.0,
            is_static: true,
        }
    }

    pub fn clear_forces(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }
}

/// Collider shape attached to a body, in the body's local frame.
///
/// Convex vertices must be counter-clockwise; construct through
/// [`Collider::convex`] to get that invariant enforced rather than
/// building the variant directly.
#[derive(Debug, Clone)]
pub enum Collider {
    Circle { radius: f32, offset: Vec2 },
    Box { half_extents: Vec2, offset: Vec2 },
    Convex { vertices: Vec<Vec2>, offset: Vec2 },
}

impl Collider {
    pub fn circle(radius: f32) -> Self {
        Collider::Circle {
            radius,
            offset: Vec2::ZERO,
        }
    }

    pub fn rect(half_extents: Vec2) -> Self {
        Collider::Box {
            half_extents,
            offset: Vec2::ZERO,
        }
    }

    /// Build a convex collider, reordering `vertices` to counter-clockwise
    /// if the signed area comes out negative. Errors if fewer than 3
    /// vertices are given — this is a caller-input-validation boundary,
    /// not a simulation invariant.
    pub fn convex(mut vertices: Vec<Vec2>) -> Result<Self> {
        if vertices.len() < 3 {
            bail!(
                "convex collider needs at least 3 vertices, got {}",
                vertices.len()
            );
        }
        if signed_area(&vertices) < 0.0 {
            vertices.reverse();
        }
        Ok(Collider::Convex {
            vertices,
            offset: Vec2::ZERO,
        })
    }

    pub fn offset(&self) -> Vec2 {
        match self {
            Collider::Circle { offset, .. }
            | Collider::Box { offset, .. }
            | Collider::Convex { offset, .. } => *offset,
        }
    }
}

/// Twice the signed area of the polygon (shoelace formula); positive for
/// counter-clockwise winding.
pub(crate) fn signed_area(vertices: &[Vec2]) -> f32 {
    let mut area = 0.0;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        area += a.x * b.y - b.x * a.y;
    }
    area
}

/// World-space position, rotation (radians), and non-uniform scale.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Rotate and scale a local-space point into world space (no translation).
    #[inline]
    pub fn rotate_scale(&self, local: Vec2) -> Vec2 {
        let (s, c) = self.rotation.sin_cos();
        let scaled = local * self.scale;
        Vec2::new(c * scaled.x - s * scaled.y, s * scaled.x + c * scaled.y)
    }

    #[inline]
    pub fn to_world(&self, local: Vec2) -> Vec2 {
        self.position + self.rotate_scale(local)
    }

    /// Rotate a world vector by the inverse rotation (used to express a
    /// world contact anchor in a body's local frame for the position
    /// solver).
    #[inline]
    pub fn inverse_rotate(&self, world: Vec2) -> Vec2 {
        let (s, c) = self.rotation.sin_cos();
        Vec2::new(c * world.x + s * world.y, -s * world.x + c * world.y)
    }

    /// Rotate a local-space vector by this transform's rotation only,
    /// ignoring scale. The exact inverse of [`Transform::inverse_rotate`];
    /// used to re-derive world contact anchors from cached local anchors
    /// every position iteration.
    #[inline]
    pub fn rotate_scale_unit(&self, local: Vec2) -> Vec2 {
        let (s, c) = self.rotation.sin_cos();
        Vec2::new(c * local.x - s * local.y, s * local.x + c * local.y)
    }
}

/// A type-keyed singleton map, used for cross-system state
/// (`ContactManager`, `PointerState`, `MouseGrabState`) that doesn't
/// belong to any one body. hecs has no built-in resource map, so this
/// is a small hand-rolled one.
#[derive(Default)]
pub struct Context {
    slots: HashMap<TypeId, Box<dyn Any>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: 'static>(&mut self, value: T) {
        self.slots.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.slots.get(&TypeId::of::<T>()).and_then(|b| b.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut())
    }

    /// Get the slot, inserting `T::default()` if absent.
    pub fn get_mut_or_default<T: 'static + Default>(&mut self) -> &mut T {
        self.slots
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut()
            .expect("TypeId collision in Context")
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }
}

/// The contract the physics core requires of an entity store. Iteration is
/// exposed as owned `Vec<BodyId>` snapshots rather than
/// borrowed iterators so the core never holds a borrow of the store across
/// a mutation of it — at the cost of an allocation per query, which is
/// negligible next to narrowphase/solver work for the body counts this
/// core targets.
///
/// Single-entity accessors take `&mut self` even for reads. hecs has no way
/// to hand back a plain `&T`/`&mut T` without a runtime-borrow-tracked guard
/// (`Ref`/`RefMut`) that would have to leak to match this signature;
/// `World::query_one_mut` gives a real reference instead, at the cost of
/// requiring exclusive access to the whole store for what is logically a
/// read of one component.
pub trait BodyStore {
    fn spawn(&mut self, transform: Transform, body: RigidBody) -> BodyId;
    fn spawn_with_collider(
        &mut self,
        transform: Transform,
        body: RigidBody,
        collider: Collider,
    ) -> BodyId;
    fn despawn(&mut self, id: BodyId);

    fn transform(&mut self, id: BodyId) -> Option<&Transform>;
    fn transform_mut(&mut self, id: BodyId) -> Option<&mut Transform>;
    fn body(&mut self, id: BodyId) -> Option<&RigidBody>;
    fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody>;
    fn collider(&mut self, id: BodyId) -> Option<&Collider>;

    /// All bodies with a `RigidBody` component, in store-defined order.
    fn bodies(&self) -> Vec<BodyId>;
    /// All bodies with both a `RigidBody` and a `Collider`.
    fn collidable_bodies(&self) -> Vec<BodyId>;

    fn context(&self) -> &Context;
    fn context_mut(&mut self) -> &mut Context;
}
