//! Exact-geometry contact generation: circle/circle, circle/polygon, and
//! polygon/polygon via SAT + Sutherland-Hodgman clipping.
//!
//! Dispatch and friction/restitution combination live in
//! [`crate::physics::systems::CollisionDetectionSystem`]; this module only
//! produces the geometric normal and contact points for a pair.

use glam::Vec2;

use crate::physics::body::{BodyId, Collider, Transform};
use crate::physics::contact::{ContactConstraint, ContactFeature, ContactPoint, FeatureKind};

pub const MAX_POLY_VERTS: usize = 16;

fn world_center(transform: &Transform, offset: Vec2) -> Vec2 {
    transform.to_world(offset)
}

/// World-space vertices of a box or convex collider, empty for circles.
fn world_polygon(collider: &Collider, transform: &Transform) -> Vec<Vec2> {
    match collider {
        Collider::Circle { .. } => Vec::new(),
        Collider::Box {
            half_extents,
            offset,
        } => {
            let center = world_center(transform, *offset);
            let (s, c) = transform.rotation.sin_cos();
            let half = *half_extents * transform.scale;
            let ax = Vec2::new(c, s);
            let ay = Vec2::new(-s, c);
            vec![
                center - half.x * ax - half.y * ay,
                center + half.x * ax - half.y * ay,
                center + half.x * ax + half.y * ay,
                center - half.x * ax + half.y * ay,
            ]
        }
        Collider::Convex { vertices, offset } => {
            let center = world_center(transform, *offset);
            let (s, c) = transform.rotation.sin_cos();
            vertices
                .iter()
                .take(MAX_POLY_VERTS)
                .map(|v| {
                    let scaled = *v * transform.scale;
                    center + Vec2::new(c * scaled.x - s * scaled.y, s * scaled.x + c * scaled.y)
                })
                .collect()
        }
    }
}

/// Outward face normal of edge `i -> i+1` of a CCW polygon.
fn face_normal(verts: &[Vec2], i: usize) -> Vec2 {
    let n = verts.len();
    let edge = verts[(i + 1) % n] - verts[i];
    let len = edge.length();
    if len < 1e-8 {
        Vec2::Y
    } else {
        Vec2::new(edge.y / len, -edge.x / len)
    }
}

fn polygon_centroid(verts: &[Vec2]) -> Vec2 {
    let sum: Vec2 = verts.iter().copied().fold(Vec2::ZERO, |a, b| a + b);
    sum / verts.len() as f32
}

fn world_to_local(transform: &Transform, world_point: Vec2) -> Vec2 {
    transform.inverse_rotate(world_point - transform.position)
}

/// Circle vs circle.
pub fn circle_vs_circle(
    body_a: BodyId,
    xf_a: &Transform,
    radius_a: f32,
    offset_a: Vec2,
    body_b: BodyId,
    xf_b: &Transform,
    radius_b: f32,
    offset_b: Vec2,
) -> Option<ContactConstraint> {
    let pos_a = world_center(xf_a, offset_a);
    let pos_b = world_center(xf_b, offset_b);
    let r_a = radius_a * xf_a.scale.x.max(xf_a.scale.y);
    let r_b = radius_b * xf_b.scale.x.max(xf_b.scale.y);

    let diff = pos_b - pos_a;
    let dist2 = diff.length_squared();
    let r_sum = r_a + r_b;
    if dist2 >= r_sum * r_sum {
        return None;
    }

    let dist = dist2.sqrt();
    let normal = if dist > 1e-6 { diff / dist } else { Vec2::Y };

    let position = pos_a + normal * r_a;
    let mut point = ContactPoint::new(
        position,
        r_sum - dist,
        ContactFeature::new(FeatureKind::Vertex, 0, FeatureKind::Vertex, 0),
    );
    point.local_a = world_to_local(xf_a, position);
    point.local_b = world_to_local(xf_b, position);

    Some(ContactConstraint {
        body_a,
        body_b,
        normal,
        friction: 0.0,
        restitution: 0.0,
        points: vec![point],
    })
}

/// Circle vs polygon. `flipped` indicates the caller passed (polygon,
/// circle) rather than (circle, polygon); the result is always oriented
/// `body_a = circle, body_b = polygon` internally here and the caller
/// re-flips bodies/normal (see `CollisionDetectionSystem`) to restore the
/// original pair order when `flipped` is true.
#[allow(clippy::too_many_arguments)]
pub fn circle_vs_polygon(
    circle_body: BodyId,
    xf_circle: &Transform,
    radius: f32,
    circle_offset: Vec2,
    poly_body: BodyId,
    xf_poly: &Transform,
    poly_collider: &Collider,
    flipped: bool,
) -> Option<ContactConstraint> {
    let poly_v = world_polygon(poly_collider, xf_poly);
    if poly_v.len() < 3 {
        return None;
    }

    let center = world_center(xf_circle, circle_offset);
    let radius = radius * xf_circle.scale.x.max(xf_circle.scale.y);

    let mut best_sep = f32::NEG_INFINITY;
    let mut best_edge = 0usize;
    let mut all_inside = true;

    for i in 0..poly_v.len() {
        let n = face_normal(&poly_v, i);
        let sep = (center - poly_v[i]).dot(n);
        if sep > 0.0 {
            all_inside = false;
        }
        if sep > best_sep {
            best_sep = sep;
            best_edge = i;
        }
    }

    let (body_a, body_b, normal, position, penetration, feature);

    if all_inside {
        let n = face_normal(&poly_v, best_edge);
        body_a = if flipped { poly_body } else { circle_body };
        body_b = if flipped { circle_body } else { poly_body };
        normal = if flipped { n } else { -n };
        position = center - n * best_sep;
        penetration = radius - best_sep;
        feature = ContactFeature::new(FeatureKind::Face, best_edge as u8, FeatureKind::Vertex, 0);
    } else {
        let mut best_dist2 = f32::MAX;
        let mut best_point = Vec2::ZERO;
        let mut best_idx = 0u8;
        let mut best_kind = FeatureKind::Vertex;

        for i in 0..poly_v.len() {
            let j = (i + 1) % poly_v.len();
            let edge = poly_v[j] - poly_v[i];
            let len2 = edge.length_squared();
            let mut t = if len2 > 1e-12 {
                (center - poly_v[i]).dot(edge) / len2
            } else {
                0.0
            };
            t = t.clamp(0.0, 1.0);
            let cp = poly_v[i] + edge * t;
            let d2 = (center - cp).length_squared();
            if d2 < best_dist2 {
                best_dist2 = d2;
                best_point = cp;
                if t < 1e-4 {
                    best_kind = FeatureKind::Vertex;
                    best_idx = i as u8;
                } else if t > 1.0 - 1e-4 {
                    best_kind = FeatureKind::Vertex;
                    best_idx = j as u8;
                } else {
                    best_kind = FeatureKind::Face;
                    best_idx = i as u8;
                }
            }
        }

        let dist = best_dist2.sqrt();
        if dist >= radius {
            return None;
        }

        let n = if dist > 1e-6 {
            (center - best_point) / dist
        } else {
            Vec2::Y
        };

        body_a = if flipped { poly_body } else { circle_body };
        body_b = if flipped { circle_body } else { poly_body };
        normal = if flipped { n } else { -n };
        position = best_point;
        penetration = radius - dist;
        feature = ContactFeature::new(best_kind, best_idx, FeatureKind::Vertex, 0);
    }

    let xf_first = if flipped { xf_poly } else { xf_circle };
    let xf_second = if flipped { xf_circle } else { xf_poly };

    let mut point = ContactPoint::new(position, penetration, feature);
    point.local_a = world_to_local(xf_first, position);
    point.local_b = world_to_local(xf_second, position);

    Some(ContactConstraint {
        body_a,
        body_b,
        normal,
        friction: 0.0,
        restitution: 0.0,
        points: vec![point],
    })
}

struct ClipVertex {
    v: Vec2,
    feature: ContactFeature,
}

fn find_axis_least_penetration(a: &[Vec2], b: &[Vec2]) -> (f32, usize) {
    let mut best_sep = f32::NEG_INFINITY;
    let mut best_face = 0;
    for i in 0..a.len() {
        let n = face_normal(a, i);
        let min_dot = b
            .iter()
            .map(|v| (*v - a[i]).dot(n))
            .fold(f32::INFINITY, f32::min);
        if min_dot > best_sep {
            best_sep = min_dot;
            best_face = i;
        }
    }
    (best_sep, best_face)
}

fn find_incident_edge(verts: &[Vec2], ref_normal: Vec2) -> usize {
    let mut min_dot = f32::INFINITY;
    let mut best = 0;
    for i in 0..verts.len() {
        let d = face_normal(verts, i).dot(ref_normal);
        if d < min_dot {
            min_dot = d;
            best = i;
        }
    }
    best
}

/// Sutherland-Hodgman clip of a 2-vertex segment against a single half-plane
/// `dot(normal, v) <= offset`. A clipped vertex inherits a Face feature on
/// the clip-plane side and the preserved endpoint's Vertex feature on the
/// other side (swapped if the reference polygon is B).
fn clip_segment(
    input: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    clip_edge: u8,
    ref_is_a: bool,
) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(2);
    let d0 = normal.dot(input[0].v) - offset;
    let d1 = normal.dot(input[1].v) - offset;

    if d0 <= 0.0 {
        out.push(ClipVertex {
            v: input[0].v,
            feature: input[0].feature,
        });
    }
    if d1 <= 0.0 {
        out.push(ClipVertex {
            v: input[1].v,
            feature: input[1].feature,
        });
    }

    if d0 * d1 < 0.0 && out.len() < 2 {
        let t = d0 / (d0 - d1);
        let v = input[0].v + t * (input[1].v - input[0].v);
        let feature = if ref_is_a {
            ContactFeature::new(
                FeatureKind::Face,
                clip_edge,
                FeatureKind::Vertex,
                if d0 > 0.0 {
                    input[0].feature.index_b
                } else {
                    input[1].feature.index_b
                },
            )
        } else {
            ContactFeature::new(
                FeatureKind::Vertex,
                if d0 > 0.0 {
                    input[0].feature.index_a
                } else {
                    input[1].feature.index_a
                },
                FeatureKind::Face,
                clip_edge,
            )
        };
        out.push(ClipVertex { v, feature });
    }

    out
}

/// Polygon vs polygon via SAT + 2-plane Sutherland-Hodgman clipping.
pub fn polygon_vs_polygon(
    body_a: BodyId,
    xf_a: &Transform,
    collider_a: &Collider,
    body_b: BodyId,
    xf_b: &Transform,
    collider_b: &Collider,
) -> Option<ContactConstraint> {
    let v_a = world_polygon(collider_a, xf_a);
    let v_b = world_polygon(collider_b, xf_b);
    if v_a.len() < 3 || v_b.len() < 3 {
        return None;
    }

    let (sep_a, face_a) = find_axis_least_penetration(&v_a, &v_b);
    if sep_a > 0.0 {
        return None;
    }
    let (sep_b, face_b) = find_axis_least_penetration(&v_b, &v_a);
    if sep_b > 0.0 {
        return None;
    }

    // Hysteresis toward A's reference face: prevents the reference-face
    // choice (and thus the feature keys) from flickering frame to frame
    // when the two separations are nearly equal.
    const REL_TOL: f32 = 0.95;
    const ABS_TOL: f32 = 0.005;
    let use_a = sep_a >= sep_b * REL_TOL + ABS_TOL;

    let (ref_v, ref_e, inc_v, ref_is_a): (&[Vec2], usize, &[Vec2], bool) = if use_a {
        (&v_a, face_a, &v_b, true)
    } else {
        (&v_b, face_b, &v_a, false)
    };

    let ref_normal = face_normal(ref_v, ref_e);
    let i_edge = find_incident_edge(inc_v, ref_normal);
    let inc_n = inc_v.len();

    let (f0, f1) = if ref_is_a {
        (
            ContactFeature::new(FeatureKind::Face, ref_e as u8, FeatureKind::Vertex, i_edge as u8),
            ContactFeature::new(
                FeatureKind::Face,
                ref_e as u8,
                FeatureKind::Vertex,
                ((i_edge + 1) % inc_n) as u8,
            ),
        )
    } else {
        (
            ContactFeature::new(FeatureKind::Vertex, i_edge as u8, FeatureKind::Face, ref_e as u8),
            ContactFeature::new(
                FeatureKind::Vertex,
                ((i_edge + 1) % inc_n) as u8,
                FeatureKind::Face,
                ref_e as u8,
            ),
        )
    };

    let inc_seg = [
        ClipVertex {
            v: inc_v[i_edge],
            feature: f0,
        },
        ClipVertex {
            v: inc_v[(i_edge + 1) % inc_n],
            feature: f1,
        },
    ];

    let rv1 = ref_v[ref_e];
    let rv2 = ref_v[(ref_e + 1) % ref_v.len()];
    let tangent = (rv2 - rv1).normalize_or_zero();

    let side_idx1 = ref_e as u8;
    let side_idx2 = ((ref_e + 1) % ref_v.len()) as u8;
    let side_offset1 = tangent.dot(rv1);
    let side_offset2 = tangent.dot(rv2);

    let clip1 = clip_segment(&inc_seg, -tangent, -side_offset1, side_idx1, ref_is_a);
    if clip1.len() < 2 {
        return None;
    }
    let clip1: [ClipVertex; 2] = [
        ClipVertex {
            v: clip1[0].v,
            feature: clip1[0].feature,
        },
        ClipVertex {
            v: clip1[1].v,
            feature: clip1[1].feature,
        },
    ];

    let clip2 = clip_segment(&clip1, tangent, side_offset2, side_idx2, ref_is_a);
    if clip2.len() < 2 {
        return None;
    }

    let ref_face_offset = ref_normal.dot(rv1);

    let centroid_a = polygon_centroid(&v_a);
    let centroid_b = polygon_centroid(&v_b);
    let dir_a_to_b = centroid_b - centroid_a;
    let result_normal = if ref_normal.dot(dir_a_to_b) >= 0.0 {
        ref_normal
    } else {
        -ref_normal
    };

    let mut points = Vec::with_capacity(2);
    for cv in &clip2 {
        let sep = ref_normal.dot(cv.v) - ref_face_offset;
        if sep <= 0.0 && points.len() < 2 {
            let mut point = ContactPoint::new(cv.v, -sep, cv.feature);
            point.local_a = world_to_local(xf_a, cv.v);
            point.local_b = world_to_local(xf_b, cv.v);
            points.push(point);
        }
    }

    if points.is_empty() {
        return None;
    }

    Some(ContactConstraint {
        body_a,
        body_b,
        normal: result_normal,
        friction: 0.0,
        restitution: 0.0,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circles_overlapping_produce_one_point() {
        let xf_a = Transform::from_position(Vec2::ZERO);
        let xf_b = Transform::from_position(Vec2::new(1.5, 0.0));
        let cc = circle_vs_circle(
            BodyId(0),
            &xf_a,
            1.0,
            Vec2::ZERO,
            BodyId(1),
            &xf_b,
            1.0,
            Vec2::ZERO,
        )
        .unwrap();
        assert_eq!(cc.points.len(), 1);
        assert!((cc.points[0].penetration - 0.5).abs() < 1e-5);
        assert!((cc.normal - Vec2::X).length() < 1e-5);
    }

    #[test]
    fn circles_far_apart_do_not_collide() {
        let xf_a = Transform::from_position(Vec2::ZERO);
        let xf_b = Transform::from_position(Vec2::new(10.0, 0.0));
        assert!(circle_vs_circle(
            BodyId(0),
            &xf_a,
            1.0,
            Vec2::ZERO,
            BodyId(1),
            &xf_b,
            1.0,
            Vec2::ZERO
        )
        .is_none());
    }

    #[test]
    fn circle_resting_on_box_face_is_face_feature() {
        let box_collider = Collider::rect(Vec2::new(5.0, 0.5));
        let xf_box = Transform::from_position(Vec2::ZERO);
        let xf_circle = Transform::from_position(Vec2::new(0.0, 0.9));
        let cc = circle_vs_polygon(
            BodyId(1),
            &xf_circle,
            0.5,
            Vec2::ZERO,
            BodyId(0),
            &xf_box,
            &box_collider,
            false,
        )
        .unwrap();
        assert_eq!(cc.points[0].feature.kind_a, super::FeatureKind::Face);
        assert!(cc.normal.y < 0.0, "normal should point from circle to box, downward");
    }

    #[test]
    fn two_overlapping_unit_boxes_produce_two_points() {
        let a = Collider::rect(Vec2::splat(0.5));
        let b = Collider::rect(Vec2::splat(0.5));
        let xf_a = Transform::from_position(Vec2::ZERO);
        let xf_b = Transform::from_position(Vec2::new(0.9, 0.0));
        let cc = polygon_vs_polygon(BodyId(0), &xf_a, &a, BodyId(1), &xf_b, &b).unwrap();
        assert_eq!(cc.points.len(), 2);
        for p in &cc.points {
            assert!(p.penetration > 0.0);
        }
    }

    #[test]
    fn separated_boxes_produce_no_contact() {
        let a = Collider::rect(Vec2::splat(0.5));
        let b = Collider::rect(Vec2::splat(0.5));
        let xf_a = Transform::from_position(Vec2::ZERO);
        let xf_b = Transform::from_position(Vec2::new(5.0, 0.0));
        assert!(polygon_vs_polygon(BodyId(0), &xf_a, &a, BodyId(1), &xf_b, &b).is_none());
    }
}
