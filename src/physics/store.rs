//! Reference `BodyStore` implementation over `hecs::World`, and the type-keyed
//! `Context` singleton map.

use anyhow::{bail, Result};
use glam::Vec2;
use hecs::Entity;

use crate::physics::body::{BodyId, BodyStore, Collider, Context, RigidBody, Transform};

/// `hecs`-backed `BodyStore`. Not the only legal implementation of the
/// contract — a host application may supply its own entity store — but this
/// is what the crate's own test suite exercises end to end.
pub struct HecsBodyStore {
    world: hecs::World,
    context: Context,
}

impl Default for HecsBodyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HecsBodyStore {
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            context: Context::new(),
        }
    }

    /// Spawn a dynamic body with a convex collider, reordering vertices to
    /// counter-clockwise if necessary. Errors if fewer than 3 vertices are
    /// given — a caller-input-validation boundary, not a simulation
    /// invariant.
    pub fn spawn_convex(
        &mut self,
        transform: Transform,
        body: RigidBody,
        vertices: Vec<Vec2>,
    ) -> Result<BodyId> {
        if vertices.len() < 3 {
            bail!(
                "convex collider needs at least 3 vertices, got {}",
                vertices.len()
            );
        }
        let collider = Collider::convex(vertices)?;
        Ok(self.spawn_with_collider(transform, body, collider))
    }
}

fn to_body_id(entity: Entity) -> BodyId {
    BodyId(entity.to_bits().get())
}

impl BodyStore for HecsBodyStore {
    fn spawn(&mut self, transform: Transform, body: RigidBody) -> BodyId {
        to_body_id(self.world.spawn((transform, body)))
    }

    fn spawn_with_collider(
        &mut self,
        transform: Transform,
        body: RigidBody,
        collider: Collider,
    ) -> BodyId {
        to_body_id(self.world.spawn((transform, body, collider)))
    }

    fn despawn(&mut self, id: BodyId) {
        if let Some(entity) = Entity::from_bits(id.0) {
            let _ = self.world.despawn(entity);
        }
        self.context.get_mut_or_default::<crate::physics::contact::ContactManager>()
            .remove_body(id);
        if let Some(grab) = self
            .context
            .get_mut::<crate::physics::mouse_grab::MouseGrabState>()
        {
            crate::physics::mouse_grab::forget_body(grab, id);
        }
    }

    fn transform(&mut self, id: BodyId) -> Option<&Transform> {
        let entity = Entity::from_bits(id.0)?;
        self.world.query_one_mut::<&Transform>(entity).ok()
    }

    fn transform_mut(&mut self, id: BodyId) -> Option<&mut Transform> {
        let entity = Entity::from_bits(id.0)?;
        self.world.query_one_mut::<&mut Transform>(entity).ok()
    }

    fn body(&mut self, id: BodyId) -> Option<&RigidBody> {
        let entity = Entity::from_bits(id.0)?;
        self.world.query_one_mut::<&RigidBody>(entity).ok()
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        let entity = Entity::from_bits(id.0)?;
        self.world.query_one_mut::<&mut RigidBody>(entity).ok()
    }

    fn collider(&mut self, id: BodyId) -> Option<&Collider> {
        let entity = Entity::from_bits(id.0)?;
        self.world.query_one_mut::<&Collider>(entity).ok()
    }

    fn bodies(&self) -> Vec<BodyId> {
        self.world
            .query::<&RigidBody>()
            .iter()
            .map(|(e, _)| to_body_id(e))
            .collect()
    }

    fn collidable_bodies(&self) -> Vec<BodyId> {
        self.world
            .query::<(&RigidBody, &Collider)>()
            .iter()
            .map(|(e, _)| to_body_id(e))
            .collect()
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }
}
