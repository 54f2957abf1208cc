//! Contact features, constraints, and the persistent feature-keyed cache
//! that warm-starts the solver.

use std::collections::HashMap;

use glam::Vec2;

use crate::physics::body::BodyId;

/// Which kind of geometric element produced a contact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Vertex,
    Face,
}

/// Identity of the geometric elements on each body that produced a contact
/// point. Stable across frames for the same clip topology, which is what
/// makes it the correct warm-start key (as opposed to positional
/// proximity, which drifts as bodies move).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactFeature {
    pub kind_a: FeatureKind,
    pub index_a: u8,
    pub kind_b: FeatureKind,
    pub index_b: u8,
}

impl ContactFeature {
    pub fn new(kind_a: FeatureKind, index_a: u8, kind_b: FeatureKind, index_b: u8) -> Self {
        Self {
            kind_a,
            index_a,
            kind_b,
            index_b,
        }
    }

    /// Pack into a stable 4-byte key.
    pub fn key(&self) -> u32 {
        let ka = matches!(self.kind_a, FeatureKind::Face) as u32;
        let kb = matches!(self.kind_b, FeatureKind::Face) as u32;
        (ka << 24) | ((self.index_a as u32) << 16) | (kb << 8) | (self.index_b as u32)
    }
}

/// A single contact point, with solver-cache fields populated by pre-step.
#[derive(Debug, Clone, Copy)]
pub struct ContactPoint {
    pub position: Vec2,
    pub penetration: f32,
    pub feature: ContactFeature,

    /// Anchors in each body's local frame, relative to its origin (set once
    /// at narrowphase time; the position solver re-derives world anchors
    /// from these every iteration using the *current* rotation).
    pub local_a: Vec2,
    pub local_b: Vec2,

    pub normal_impulse: f32,
    pub tangent_impulse: f32,

    // Solver scratch, recomputed every pre-step.
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

impl ContactPoint {
    pub fn new(position: Vec2, penetration: f32, feature: ContactFeature) -> Self {
        Self {
            position,
            penetration,
            feature,
            local_a: Vec2::ZERO,
            local_b: Vec2::ZERO,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            normal_mass: 0.0,
            tangent_mass: 0.0,
            velocity_bias: 0.0,
        }
    }
}

/// One tick's resolved constraint between a pair of bodies: the contact
/// normal (from A to B) and up to two contact points.
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub normal: Vec2,
    pub friction: f32,
    pub restitution: f32,
    pub points: Vec<ContactPoint>,
}

impl ContactConstraint {
    pub fn pair_key(&self) -> u64 {
        BodyId::pair_key(self.body_a, self.body_b)
    }
}

/// Persistent contact map. Replaced wholesale every tick; on `update`, new
/// constraints inherit `normal_impulse`/`tangent_impulse` from the previous
/// tick's constraint for the same body pair, matched point-by-point via
/// feature key.
#[derive(Default)]
pub struct ContactManager {
    current: HashMap<u64, ContactConstraint>,
}

impl ContactManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Stable-ordered view of the current tick's constraints, for solver
    /// iteration.
    pub fn constraints(&self) -> Vec<&ContactConstraint> {
        let mut keys: Vec<&u64> = self.current.keys().collect();
        keys.sort_unstable();
        keys.into_iter().map(|k| &self.current[k]).collect()
    }

    pub fn constraints_mut(&mut self) -> Vec<&mut ContactConstraint> {
        let mut items: Vec<(&u64, &mut ContactConstraint)> = self.current.iter_mut().collect();
        items.sort_unstable_by_key(|(k, _)| **k);
        items.into_iter().map(|(_, v)| v).collect()
    }

    /// Replace the map with `new_constraints`, donating impulses from the
    /// previous tick's matching pair+feature.
    pub fn update(&mut self, mut new_constraints: Vec<ContactConstraint>) {
        for constraint in &mut new_constraints {
            let key = constraint.pair_key();
            if let Some(old) = self.current.get(&key) {
                for new_point in &mut constraint.points {
                    if let Some(old_point) = old
                        .points
                        .iter()
                        .find(|p| p.feature.key() == new_point.feature.key())
                    {
                        new_point.normal_impulse = old_point.normal_impulse;
                        new_point.tangent_impulse = old_point.tangent_impulse;
                    }
                }
            }
        }

        self.current = new_constraints
            .into_iter()
            .map(|c| (c.pair_key(), c))
            .collect();
    }

    /// Write solved constraints directly back into the map, keyed by pair,
    /// with no feature-matching pass. Used by
    /// [`crate::physics::systems::ConstraintSolverSystem`] to persist the
    /// impulses it just solved for — unlike [`ContactManager::update`],
    /// which donates impulses from the *previous* tick's map, this simply
    /// replaces, since the constraints passed in already carry this tick's
    /// solved state.
    pub fn replace_solved(&mut self, constraints: Vec<ContactConstraint>) {
        self.current = constraints
            .into_iter()
            .map(|c| (c.pair_key(), c))
            .collect();
    }

    /// Drop any constraint referencing `id` (called on body removal).
    pub fn remove_body(&mut self, id: BodyId) {
        self.current
            .retain(|_, c| c.body_a != id && c.body_b != id);
    }
}
