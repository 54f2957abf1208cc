//! Soft point-to-point mouse-grab constraint: a critically-damped
//! spring-damper that pulls a grabbed body's anchor point toward the
//! pointer, solved alongside the contact constraints each tick.
//!
//! Warm-start impulse reapplication is pulled out into its own
//! [`warm_start`] function, called once per tick from
//! `physics::solver::solve` alongside every contact constraint's
//! warm-start, leaving [`pre_step`] to do only the spring-damper
//! bookkeeping.

use glam::{Mat2, Vec2};
use tracing::{debug, warn};

use crate::physics::body::{BodyId, BodyStore, Collider, Transform};

/// Raw per-frame pointer input, sampled once per tick by the host
/// application and written into the store's [`crate::physics::body::Context`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerState {
    pub down: bool,
    pub pressed: bool,
    pub released: bool,
    pub world_pos: Vec2,
}

/// Inflation factors applied to a candidate body's collider when testing
/// whether the pointer has grabbed it — a little forgiveness makes small
/// or thin shapes easier to pick up.
const GRAB_CIRCLE_INFLATE: f32 = 1.2;
const GRAB_BOX_INFLATE: f32 = 1.1;

/// Live state of the mouse-grab constraint: which body (if any) is held,
/// where on that body it's held, and the spring-damper terms recomputed
/// every pre-step.
#[derive(Debug, Clone)]
pub struct MouseGrabState {
    pub active: bool,
    pub grabbed: Option<BodyId>,
    /// Anchor on the grabbed body, in its local frame (rotation-only, no
    /// scale), fixed at acquire time.
    pub local_anchor: Vec2,
    /// Current world-space pointer position the anchor is being pulled
    /// toward.
    pub target: Vec2,

    pub r_arm: Vec2,
    pub mass_matrix: Mat2,
    pub bias: Vec2,
    pub gamma: f32,
    pub impulse_accum: Vec2,
    pub max_impulse: f32,
}

impl Default for MouseGrabState {
    fn default() -> Self {
        Self {
            active: false,
            grabbed: None,
            local_anchor: Vec2::ZERO,
            target: Vec2::ZERO,
            r_arm: Vec2::ZERO,
            mass_matrix: Mat2::ZERO,
            bias: Vec2::ZERO,
            gamma: 0.0,
            impulse_accum: Vec2::ZERO,
            max_impulse: 0.0,
        }
    }
}

#[inline]
fn cross_vv(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

#[inline]
fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Release the grab, zeroing the impulse accumulator so nothing carries
/// over if the same body is grabbed again later.
fn release(state: &mut MouseGrabState) {
    debug!(body = ?state.grabbed, "released mouse grab");
    state.active = false;
    state.grabbed = None;
    state.impulse_accum = Vec2::ZERO;
}

/// Point-in-inflated-collider test against a vector already expressed
/// relative to the body's origin (world space, not yet rotated).
fn contains(collider: &Collider, xf: &Transform, diff: Vec2) -> bool {
    let local = xf.inverse_rotate(diff);
    match collider {
        Collider::Circle { radius, .. } => {
            let r = radius * xf.scale.x.max(xf.scale.y);
            local.length_squared() <= r * r * GRAB_CIRCLE_INFLATE
        }
        Collider::Box { half_extents, .. } => {
            let half = *half_extents * xf.scale;
            local.x.abs() <= half.x * GRAB_BOX_INFLATE && local.y.abs() <= half.y * GRAB_BOX_INFLATE
        }
        Collider::Convex { vertices, .. } => {
            let scaled: Vec<Vec2> = vertices.iter().map(|v| *v * xf.scale).collect();
            let mut all_left = true;
            let mut all_right = true;
            for i in 0..scaled.len() {
                let a = scaled[i];
                let b = scaled[(i + 1) % scaled.len()];
                let edge = b - a;
                let side = cross_vv(edge, local - a);
                if side < 0.0 {
                    all_left = false;
                } else if side > 0.0 {
                    all_right = false;
                }
            }
            all_left || all_right
        }
    }
}

/// Try to acquire a body under the pointer: the closest non-static,
/// collidable body whose (inflated) collider contains `pointer.world_pos`.
fn try_grab(store: &mut impl BodyStore, state: &mut MouseGrabState, pointer: &PointerState) {
    let mut best: Option<(BodyId, f32, Vec2)> = None;

    for id in store.collidable_bodies() {
        let is_static = store.body(id).map(|rb| rb.is_static).unwrap_or(true);
        if is_static {
            continue;
        }
        let Some(collider) = store.collider(id).cloned() else {
            continue;
        };
        let Some(xf) = store.transform(id).copied() else {
            continue;
        };

        let diff = pointer.world_pos - xf.position;
        if !contains(&collider, &xf, diff) {
            continue;
        }

        let d2 = diff.length_squared();
        if best.as_ref().map_or(true, |(_, best_d2, _)| d2 < *best_d2) {
            let local_anchor = xf.inverse_rotate(diff);
            best = Some((id, d2, local_anchor));
        }
    }

    if let Some((id, _, local_anchor)) = best {
        debug!(body = ?id, "acquired mouse grab");
        state.active = true;
        state.grabbed = Some(id);
        state.local_anchor = local_anchor;
        state.target = pointer.world_pos;
        state.impulse_accum = Vec2::ZERO;
    }
}

/// Drive the acquire/release state machine off this tick's pointer edges.
/// Call once per tick before [`pre_step`].
pub fn handle_pointer_edges(
    store: &mut impl BodyStore,
    state: &mut MouseGrabState,
    pointer: &PointerState,
) {
    if pointer.pressed && !state.active {
        try_grab(store, state, pointer);
    }
    if pointer.released && state.active {
        release(state);
    }
}

/// Clear the grab if it references a body that no longer exists.
pub fn forget_body(state: &mut MouseGrabState, id: BodyId) {
    if state.grabbed == Some(id) {
        release(state);
    }
}

/// Recompute the spring-damper terms for this tick: lever arm, effective
/// mass matrix, bias velocity, and the softness term `gamma`. Does not
/// touch velocities — [`warm_start`] and [`solve_step`] do that.
pub fn pre_step(
    store: &mut impl BodyStore,
    state: &mut MouseGrabState,
    dt: f32,
    frequency: f32,
    damping_ratio: f32,
    max_force: f32,
) {
    let Some(grabbed) = state.grabbed else {
        return;
    };
    let Some(xf) = store.transform(grabbed).copied() else {
        release(state);
        return;
    };
    let Some(rb) = store.body(grabbed) else {
        release(state);
        return;
    };
    let mass = rb.mass;
    let inv_mass = rb.inv_mass;
    let inv_inertia = rb.inv_inertia;

    state.r_arm = xf.rotate_scale_unit(state.local_anchor);

    let omega = std::f32::consts::TAU * frequency;
    let c_damping = 2.0 * mass * damping_ratio * omega;
    let k_spring = mass * omega * omega;

    state.gamma = 1.0 / (dt * (c_damping + dt * k_spring)).max(1e-9);
    let beta = dt * k_spring * state.gamma;

    let r = state.r_arm;
    let k00 = inv_mass + inv_inertia * r.y * r.y + state.gamma;
    let k01 = -inv_inertia * r.x * r.y;
    let k11 = inv_mass + inv_inertia * r.x * r.x + state.gamma;

    let det = k00 * k11 - k01 * k01;
    state.mass_matrix = if det.abs() > 1e-12 {
        let inv_det = 1.0 / det;
        Mat2::from_cols(
            Vec2::new(k11 * inv_det, -k01 * inv_det),
            Vec2::new(-k01 * inv_det, k00 * inv_det),
        )
    } else {
        warn!("mouse grab effective-mass matrix is singular; grab will apply no force this tick");
        Mat2::ZERO
    };

    let world_anchor = xf.position + state.r_arm;
    state.bias = beta * (world_anchor - state.target);
    state.max_impulse = max_force * dt;
}

/// Reapply the impulse accumulated on the previous tick, mirroring how
/// contact constraints are warm-started.
pub fn warm_start(store: &mut impl BodyStore, state: &MouseGrabState) {
    let Some(grabbed) = state.grabbed else {
        return;
    };
    if let Some(rb) = store.body_mut(grabbed) {
        rb.linear_velocity += rb.inv_mass * state.impulse_accum;
        rb.angular_velocity += rb.inv_inertia * cross_vv(state.r_arm, state.impulse_accum);
    }
}

/// One velocity-iteration's worth of grab impulse, clamped to
/// `max_impulse`.
pub fn solve_step(store: &mut impl BodyStore, state: &mut MouseGrabState) {
    let Some(grabbed) = state.grabbed else {
        return;
    };
    let Some(rb) = store.body(grabbed) else {
        return;
    };
    let v = rb.linear_velocity;
    let w = rb.angular_velocity;
    let inv_mass = rb.inv_mass;
    let inv_inertia = rb.inv_inertia;

    let v_anchor = v + cross_sv(w, state.r_arm);
    let c_dot = v_anchor + state.bias + state.gamma * state.impulse_accum;
    let impulse = -(state.mass_matrix * c_dot);

    let old_accum = state.impulse_accum;
    state.impulse_accum += impulse;
    let mag = state.impulse_accum.length();
    if mag > state.max_impulse && mag > 1e-9 {
        state.impulse_accum *= state.max_impulse / mag;
    }
    let delta = state.impulse_accum - old_accum;

    if let Some(rb) = store.body_mut(grabbed) {
        rb.linear_velocity += inv_mass * delta;
        rb.angular_velocity += inv_inertia * cross_vv(state.r_arm, delta);
    }
}
