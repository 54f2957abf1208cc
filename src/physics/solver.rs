//! Sequential-impulse constraint solver: pre-step, warm-start, velocity and
//! position iterations.

use glam::Vec2;

use crate::physics::body::BodyStore;
use crate::physics::contact::ContactConstraint;
use crate::physics::mouse_grab::MouseGrabState;

pub const BAUMGARTE: f32 = 0.2;
pub const SLOP: f32 = 0.005;
pub const MAX_POSITION_CORRECTION: f32 = 0.2;
pub const RESTITUTION_THRESHOLD: f32 = 1.0;

#[inline]
fn cross_vv(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

#[inline]
fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Apply impulse `p` to body `id` at lever arm `r` with the given sign
/// (`+1.0` for B, `-1.0` for A, per the normal convention that `P` points
/// from A to B).
fn apply_impulse(store: &mut impl BodyStore, id: crate::physics::body::BodyId, r: Vec2, p: Vec2, sign: f32) {
    if let Some(rb) = store.body_mut(id) {
        rb.linear_velocity += sign * rb.inv_mass * p;
        rb.angular_velocity += sign * rb.inv_inertia * cross_vv(r, p);
    }
}

/// Step 1: integrate velocities for every non-static body.
pub fn integrate_velocities(store: &mut impl BodyStore, dt: f32) {
    for id in store.bodies() {
        let Some(rb) = store.body_mut(id) else {
            continue;
        };
        if rb.is_static {
            continue;
        }

        rb.linear_velocity += rb.force * rb.inv_mass * dt;
        rb.angular_velocity += rb.torque * rb.inv_inertia * dt;

        rb.linear_velocity *= 1.0 / (1.0 + rb.linear_damping * dt);
        rb.angular_velocity *= 1.0 / (1.0 + rb.angular_damping * dt);

        let speed2 = rb.linear_velocity.length_squared();
        let max2 = rb.max_linear_speed * rb.max_linear_speed;
        if max2 > 0.0 && speed2 > max2 {
            rb.linear_velocity *= rb.max_linear_speed / speed2.sqrt();
        }
    }
}

/// Step 6: integrate positions for every non-static body.
pub fn integrate_positions(store: &mut impl BodyStore, dt: f32) {
    for id in store.bodies() {
        let (is_static, v, w) = {
            let Some(rb) = store.body(id) else {
                continue;
            };
            (rb.is_static, rb.linear_velocity, rb.angular_velocity)
        };
        if is_static {
            continue;
        }
        if let Some(xf) = store.transform_mut(id) {
            xf.position += v * dt;
            xf.rotation += w * dt;
        }
    }
}

/// Step 8: clear per-tick force/torque accumulators.
pub fn clear_forces(store: &mut impl BodyStore) {
    for id in store.bodies() {
        if let Some(rb) = store.body_mut(id) {
            rb.clear_forces();
        }
    }
}

/// Step 3: pre-step every contact point — effective masses and restitution bias.
pub fn pre_step(store: &mut impl BodyStore, constraint: &mut ContactConstraint, restitution_threshold: f32) {
    let Some(xf_a) = store.transform(constraint.body_a) else {
        return;
    };
    let Some(rb_a) = store.body(constraint.body_a) else {
        return;
    };
    let Some(xf_b) = store.transform(constraint.body_b) else {
        return;
    };
    let Some(rb_b) = store.body(constraint.body_b) else {
        return;
    };

    let pos_a = xf_a.position;
    let pos_b = xf_b.position;
    let v_a = rb_a.linear_velocity;
    let v_b = rb_b.linear_velocity;
    let w_a = rb_a.angular_velocity;
    let w_b = rb_b.angular_velocity;
    let inv_mass_a = rb_a.inv_mass;
    let inv_mass_b = rb_b.inv_mass;
    let inv_inertia_a = rb_a.inv_inertia;
    let inv_inertia_b = rb_b.inv_inertia;
    let restitution = constraint.restitution;
    let normal = constraint.normal;
    let tangent = Vec2::new(-normal.y, normal.x);

    for pt in &mut constraint.points {
        pt.r_a = pt.position - pos_a;
        pt.r_b = pt.position - pos_b;

        let rn_a = cross_vv(pt.r_a, normal);
        let rn_b = cross_vv(pt.r_b, normal);
        let kn = inv_mass_a + inv_mass_b + inv_inertia_a * rn_a * rn_a + inv_inertia_b * rn_b * rn_b;
        pt.normal_mass = if kn > 0.0 { 1.0 / kn } else { 0.0 };

        let rt_a = cross_vv(pt.r_a, tangent);
        let rt_b = cross_vv(pt.r_b, tangent);
        let kt = inv_mass_a + inv_mass_b + inv_inertia_a * rt_a * rt_a + inv_inertia_b * rt_b * rt_b;
        pt.tangent_mass = if kt > 0.0 { 1.0 / kt } else { 0.0 };

        let vel_a = v_a + cross_sv(w_a, pt.r_a);
        let vel_b = v_b + cross_sv(w_b, pt.r_b);
        let v_rel = (vel_b - vel_a).dot(normal);

        pt.velocity_bias = if v_rel < -restitution_threshold {
            -restitution * v_rel
        } else {
            0.0
        };
    }
}

/// Step 4: apply each point's previously accumulated impulse before iterating.
pub fn warm_start(store: &mut impl BodyStore, constraint: &ContactConstraint) {
    let normal = constraint.normal;
    let tangent = Vec2::new(-normal.y, normal.x);

    for pt in &constraint.points {
        let p = pt.normal_impulse * normal + pt.tangent_impulse * tangent;
        apply_impulse(store, constraint.body_a, pt.r_a, p, -1.0);
        apply_impulse(store, constraint.body_b, pt.r_b, p, 1.0);
    }
}

/// One velocity-iteration pass over a single constraint: friction first,
/// then normal, each using the `normal_impulse` accumulated by the *prior*
/// pass so the friction cone stays conservative.
pub fn solve_velocity(store: &mut impl BodyStore, constraint: &mut ContactConstraint) {
    let normal = constraint.normal;
    let tangent = Vec2::new(-normal.y, normal.x);
    let friction = constraint.friction;
    let body_a = constraint.body_a;
    let body_b = constraint.body_b;

    for pt in &mut constraint.points {
        let (inv_mass_a, inv_inertia_a) = body_inverse(store, body_a);
        let (inv_mass_b, inv_inertia_b) = body_inverse(store, body_b);
        let (v_a, w_a) = body_velocity(store, body_a);
        let (v_b, w_b) = body_velocity(store, body_b);

        let vel_a = v_a + cross_sv(w_a, pt.r_a);
        let vel_b = v_b + cross_sv(w_b, pt.r_b);
        let vt = (vel_b - vel_a).dot(tangent);

        let lambda = pt.tangent_mass * -vt;
        let max_friction = friction * pt.normal_impulse;
        let old_accum = pt.tangent_impulse;
        pt.tangent_impulse = (old_accum + lambda).clamp(-max_friction, max_friction);
        let delta = pt.tangent_impulse - old_accum;

        let p = delta * tangent;
        apply_impulse_raw(store, body_a, pt.r_a, p, -1.0, inv_mass_a, inv_inertia_a);
        apply_impulse_raw(store, body_b, pt.r_b, p, 1.0, inv_mass_b, inv_inertia_b);
    }

    for pt in &mut constraint.points {
        let (inv_mass_a, inv_inertia_a) = body_inverse(store, body_a);
        let (inv_mass_b, inv_inertia_b) = body_inverse(store, body_b);
        let (v_a, w_a) = body_velocity(store, body_a);
        let (v_b, w_b) = body_velocity(store, body_b);

        let vel_a = v_a + cross_sv(w_a, pt.r_a);
        let vel_b = v_b + cross_sv(w_b, pt.r_b);
        let vn = (vel_b - vel_a).dot(normal);

        let lambda = pt.normal_mass * (-vn + pt.velocity_bias);
        let old_accum = pt.normal_impulse;
        pt.normal_impulse = (old_accum + lambda).max(0.0);
        let delta = pt.normal_impulse - old_accum;

        let p = delta * normal;
        apply_impulse_raw(store, body_a, pt.r_a, p, -1.0, inv_mass_a, inv_inertia_a);
        apply_impulse_raw(store, body_b, pt.r_b, p, 1.0, inv_mass_b, inv_inertia_b);
    }
}

fn body_inverse(store: &mut impl BodyStore, id: crate::physics::body::BodyId) -> (f32, f32) {
    store
        .body(id)
        .map(|rb| (rb.inv_mass, rb.inv_inertia))
        .unwrap_or((0.0, 0.0))
}

fn body_velocity(store: &mut impl BodyStore, id: crate::physics::body::BodyId) -> (Vec2, f32) {
    store
        .body(id)
        .map(|rb| (rb.linear_velocity, rb.angular_velocity))
        .unwrap_or((Vec2::ZERO, 0.0))
}

#[allow(clippy::too_many_arguments)]
fn apply_impulse_raw(
    store: &mut impl BodyStore,
    id: crate::physics::body::BodyId,
    r: Vec2,
    p: Vec2,
    sign: f32,
    inv_mass: f32,
    inv_inertia: f32,
) {
    if let Some(rb) = store.body_mut(id) {
        rb.linear_velocity += sign * inv_mass * p;
        rb.angular_velocity += sign * inv_inertia * cross_vv(r, p);
    }
}

/// Step 7: pseudo-velocity Baumgarte position correction. Recomputes world
/// anchors from the *current* rotation every iteration; never touches
/// velocities.
pub fn solve_position(
    store: &mut impl BodyStore,
    constraint: &ContactConstraint,
    baumgarte: f32,
    slop: f32,
    max_position_correction: f32,
) {
    let normal = constraint.normal;

    for pt in &constraint.points {
        let (xf_a, xf_b) = {
            let Some(a) = store.transform(constraint.body_a) else {
                return;
            };
            let Some(b) = store.transform(constraint.body_b) else {
                return;
            };
            (*a, *b)
        };
        let (inv_mass_a, inv_inertia_a) = body_inverse(store, constraint.body_a);
        let (inv_mass_b, inv_inertia_b) = body_inverse(store, constraint.body_b);

        let r_a = xf_a.rotate_scale_unit(pt.local_a);
        let r_b = xf_b.rotate_scale_unit(pt.local_b);
        let world_a = xf_a.position + r_a;
        let world_b = xf_b.position + r_b;

        let separation = (world_b - world_a).dot(normal);
        let c = (separation + slop).min(0.0);
        if c >= 0.0 {
            continue;
        }

        let rn_a = cross_vv(r_a, normal);
        let rn_b = cross_vv(r_b, normal);
        let k = inv_mass_a + inv_mass_b + inv_inertia_a * rn_a * rn_a + inv_inertia_b * rn_b * rn_b;
        if k <= 0.0 {
            continue;
        }

        let correction = (-baumgarte * c / k).min(max_position_correction);
        let p = correction * normal;

        if let Some(xf) = store.transform_mut(constraint.body_a) {
            xf.position -= inv_mass_a * p;
            xf.rotation -= inv_inertia_a * rn_a * correction;
        }
        if let Some(xf) = store.transform_mut(constraint.body_b) {
            xf.position += inv_mass_b * p;
            xf.rotation += inv_inertia_b * rn_b * correction;
        }
    }
}

/// Tunable position/restitution parameters for [`solve`], mirroring the
/// iteration-count fields already settable on
/// [`crate::physics::systems::ConstraintSolverSystem`]. `Default` reproduces
/// this module's constants.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub baumgarte: f32,
    pub slop: f32,
    pub max_position_correction: f32,
    pub restitution_threshold: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            baumgarte: BAUMGARTE,
            slop: SLOP,
            max_position_correction: MAX_POSITION_CORRECTION,
            restitution_threshold: RESTITUTION_THRESHOLD,
        }
    }
}

/// Full tick sequence, driven by
/// [`crate::physics::systems::ConstraintSolverSystem`].
#[allow(clippy::too_many_arguments)]
pub fn solve(
    store: &mut impl BodyStore,
    constraints: &mut [ContactConstraint],
    grab: Option<&mut MouseGrabState>,
    dt: f32,
    velocity_iterations: u32,
    position_iterations: u32,
    config: SolverConfig,
) {
    integrate_velocities(store, dt);

    if constraints.is_empty() && grab.is_none() {
        integrate_positions(store, dt);
        clear_forces(store);
        return;
    }

    for c in constraints.iter_mut() {
        pre_step(store, c, config.restitution_threshold);
    }
    for c in constraints.iter() {
        warm_start(store, c);
    }
    if let Some(grab) = grab.as_ref() {
        if grab.active {
            crate::physics::mouse_grab::warm_start(store, grab);
        }
    }

    let mut grab = grab;
    for _ in 0..velocity_iterations {
        if let Some(grab) = grab.as_deref_mut() {
            crate::physics::mouse_grab::solve_step(store, grab);
        }
        for c in constraints.iter_mut() {
            solve_velocity(store, c);
        }
    }

    integrate_positions(store, dt);

    for _ in 0..position_iterations {
        for c in constraints.iter() {
            solve_position(
                store,
                c,
                config.baumgarte,
                config.slop,
                config.max_position_correction,
            );
        }
    }

    clear_forces(store);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::{BodyId, Collider, RigidBody, Transform};
    use crate::physics::contact::{ContactFeature, ContactPoint, FeatureKind};
    use crate::physics::store::HecsBodyStore;

    fn two_body_store(a: RigidBody, b: RigidBody) -> (HecsBodyStore, BodyId, BodyId) {
        let mut store = HecsBodyStore::new();
        let id_a = store.spawn(Transform::from_position(Vec2::new(0.0, 0.0)), a);
        let id_b = store.spawn(Transform::from_position(Vec2::new(1.0, 0.0)), b);
        (store, id_a, id_b)
    }

    #[test]
    fn head_on_elastic_collision_swaps_velocities() {
        let mut a = RigidBody::new_dynamic(1.0);
        a.linear_velocity = Vec2::new(1.0, 0.0);
        a.restitution = 1.0;
        let mut b = RigidBody::new_dynamic(1.0);
        b.restitution = 1.0;

        let (mut store, id_a, id_b) = two_body_store(a, b);

        let mut point = ContactPoint::new(
            Vec2::new(0.5, 0.0),
            0.01,
            ContactFeature::new(FeatureKind::Vertex, 0, FeatureKind::Vertex, 0),
        );
        point.local_a = Vec2::new(0.5, 0.0);
        point.local_b = Vec2::new(-0.5, 0.0);

        let mut constraint = ContactConstraint {
            body_a: id_a,
            body_b: id_b,
            normal: Vec2::X,
            friction: 0.0,
            restitution: 1.0,
            points: vec![point],
        };

        solve(
            &mut store,
            std::slice::from_mut(&mut constraint),
            None,
            1.0 / 60.0,
            12,
            4,
            SolverConfig::default(),
        );

        let va = store.body(id_a).unwrap().linear_velocity.x;
        let vb = store.body(id_b).unwrap().linear_velocity.x;
        assert!(va.abs() < 0.05, "va = {va}");
        assert!((vb - 1.0).abs() < 0.05, "vb = {vb}");
    }

    #[test]
    fn normal_impulse_never_goes_negative() {
        let a = RigidBody::new_dynamic(1.0);
        let b = RigidBody::new_static();
        let (mut store, id_a, id_b) = two_body_store(a, b);

        let mut point = ContactPoint::new(
            Vec2::new(0.5, 0.0),
            0.01,
            ContactFeature::new(FeatureKind::Vertex, 0, FeatureKind::Vertex, 0),
        );
        point.local_a = Vec2::ZERO;
        point.local_b = Vec2::ZERO;

        let mut constraint = ContactConstraint {
            body_a: id_a,
            body_b: id_b,
            normal: Vec2::X,
            friction: 0.5,
            restitution: 0.0,
            points: vec![point],
        };

        solve(
            &mut store,
            std::slice::from_mut(&mut constraint),
            None,
            1.0 / 60.0,
            12,
            4,
            SolverConfig::default(),
        );
        for pt in &constraint.points {
            assert!(pt.normal_impulse >= 0.0);
            assert!(pt.tangent_impulse.abs() <= constraint.friction * pt.normal_impulse + 1e-5);
        }
    }

    #[test]
    fn no_contacts_and_no_grab_just_integrates() {
        let a = RigidBody::new_dynamic(1.0);
        let b = RigidBody::new_static();
        let (mut store, id_a, _id_b) = two_body_store(a, b);
        if let Some(rb) = store.body_mut(id_a) {
            rb.force = Vec2::new(0.0, -9.81);
        }
        solve(
            &mut store,
            &mut [],
            None,
            1.0 / 60.0,
            12,
            4,
            SolverConfig::default(),
        );
        let rb = store.body(id_a).unwrap();
        assert_eq!(rb.force, Vec2::ZERO);
        assert!(rb.linear_velocity.y < 0.0);
    }

    #[test]
    fn custom_slop_suppresses_small_penetration_correction() {
        // A 0.15-unit penetration along +x between a unit-mass dynamic body
        // and a static one, expressed via local anchors so `solve_position`
        // recomputes the same separation every iteration.
        let make_constraint = |id_a, id_b| {
            let mut point = ContactPoint::new(
                Vec2::ZERO,
                0.15,
                ContactFeature::new(FeatureKind::Vertex, 0, FeatureKind::Vertex, 0),
            );
            point.local_a = Vec2::new(1.05, 0.0);
            point.local_b = Vec2::new(-0.1, 0.0);
            ContactConstraint {
                body_a: id_a,
                body_b: id_b,
                normal: Vec2::X,
                friction: 0.0,
                restitution: 0.0,
                points: vec![point],
            }
        };

        // Default slop (0.005): separation + slop is still negative, so the
        // position solver pushes the dynamic body apart.
        let (mut store, id_a, id_b) = two_body_store(RigidBody::new_dynamic(1.0), RigidBody::new_static());
        let mut constraint = make_constraint(id_a, id_b);
        solve(&mut store, std::slice::from_mut(&mut constraint), None, 1.0 / 60.0, 0, 4, SolverConfig::default());
        let moved = store.transform(id_a).unwrap().position.x;
        assert!(moved < 0.0, "default slop should correct the penetration, x = {moved}");

        // A slop of 0.2 makes separation + slop >= 0: the position solver
        // should skip the correction entirely, leaving the body in place.
        let (mut store, id_a, id_b) = two_body_store(RigidBody::new_dynamic(1.0), RigidBody::new_static());
        let mut constraint = make_constraint(id_a, id_b);
        let loose = SolverConfig {
            slop: 0.2,
            ..SolverConfig::default()
        };
        solve(&mut store, std::slice::from_mut(&mut constraint), None, 1.0 / 60.0, 0, 4, loose);
        let unmoved = store.transform(id_a).unwrap().position.x;
        assert_eq!(unmoved, 0.0, "large slop should suppress the correction, x = {unmoved}");
    }

    // Touches Collider only to keep the import honest for doctest-style
    // readability; the solver itself is collider-agnostic.
    #[allow(dead_code)]
    fn _uses_collider(_: &Collider) {}
}
