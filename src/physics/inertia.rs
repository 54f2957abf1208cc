//! Moment-of-inertia derivation from collider shape.

use glam::Vec2;

use crate::physics::body::{signed_area, Collider};

/// Fallback moment of inertia for a degenerate convex shape: `0.1 * mass`.
const DEGENERATE_INERTIA_FACTOR: f32 = 0.1;
const MIN_POLYGON_AREA: f32 = 1e-8;

/// Compute `(inertia, inv_inertia)` for a collider of the given mass.
/// Static bodies (or bodies with `mass <= 0`) should not call this; callers
/// are expected to zero inertia for those directly, mirroring how
/// `inv_mass` is zeroed.
pub fn compute_inertia(collider: &Collider, mass: f32) -> (f32, f32) {
    if mass <= 0.0 {
        return (0.0, 0.0);
    }

    let inertia = match collider {
        Collider::Circle { radius, .. } => 0.5 * mass * radius * radius,
        Collider::Box { half_extents, .. } => {
            let w = 2.0 * half_extents.x;
            let h = 2.0 * half_extents.y;
            mass * (w * w + h * h) / 12.0
        }
        Collider::Convex { vertices, .. } => polygon_inertia(vertices, mass),
    };

    if inertia > 0.0 {
        (inertia, 1.0 / inertia)
    } else {
        (0.0, 0.0)
    }
}

/// Standard polygon moment-of-inertia integral about the centroid, from the
/// decomposition into triangles `(centroid, v_i, v_{i+1})`. Falls back to
/// `0.1 * mass` for `<3` vertices or near-zero signed area.
fn polygon_inertia(vertices: &[Vec2], mass: f32) -> f32 {
    if vertices.len() < 3 {
        return DEGENERATE_INERTIA_FACTOR * mass;
    }

    let area2 = signed_area(vertices);
    if area2.abs() < MIN_POLYGON_AREA {
        return DEGENERATE_INERTIA_FACTOR * mass;
    }

    let centroid = polygon_centroid(vertices, area2);

    let mut numerator = 0.0f32;
    let mut denom_area2 = 0.0f32;
    for i in 0..vertices.len() {
        let a = vertices[i] - centroid;
        let b = vertices[(i + 1) % vertices.len()] - centroid;
        let cross = a.x * b.y - b.x * a.y;
        numerator += cross.abs() * (a.dot(a) + a.dot(b) + b.dot(b));
        denom_area2 += cross;
    }

    if denom_area2.abs() < MIN_POLYGON_AREA {
        return DEGENERATE_INERTIA_FACTOR * mass;
    }

    let inertia = (mass / 6.0) * numerator / denom_area2.abs();
    if inertia > 0.0 {
        inertia
    } else {
        DEGENERATE_INERTIA_FACTOR * mass
    }
}

/// Centroid of a polygon given its precomputed signed-area*2 (shoelace sum).
fn polygon_centroid(vertices: &[Vec2], area2: f32) -> Vec2 {
    let mut cx = 0.0f32;
    let mut cy = 0.0f32;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    let factor = 1.0 / (3.0 * area2);
    Vec2::new(cx * factor, cy * factor)
}
