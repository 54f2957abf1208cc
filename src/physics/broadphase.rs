//! Shape-aware AABBs and sort-based sweep-and-prune.

use glam::Vec2;

use crate::physics::body::{BodyId, Collider, Transform};

/// Margin every AABB is inflated by before pairing. The broadphase's only
/// tolerance — narrowphase itself is exact.
pub const BROADPHASE_MARGIN: f32 = 0.01;

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    #[inline]
    fn inflated(self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }
}

/// Compute the world-space AABB for a body's collider, inflated by `margin`.
pub fn compute_aabb(collider: &Collider, transform: &Transform, margin: f32) -> Aabb {
    let raw = match collider {
        Collider::Circle { radius, offset } => {
            let center = transform.to_world(*offset);
            let r = radius * transform.scale.x.max(transform.scale.y);
            Aabb {
                min: center - Vec2::splat(r),
                max: center + Vec2::splat(r),
            }
        }
        Collider::Box {
            half_extents,
            offset,
        } => {
            let center = transform.to_world(*offset);
            let (s, c) = transform.rotation.sin_cos();
            let hx = half_extents.x * transform.scale.x;
            let hy = half_extents.y * transform.scale.y;
            let ex = c.abs() * hx + s.abs() * hy;
            let ey = s.abs() * hx + c.abs() * hy;
            Aabb {
                min: center - Vec2::new(ex, ey),
                max: center + Vec2::new(ex, ey),
            }
        }
        Collider::Convex { vertices, offset } => {
            let mut min = Vec2::splat(f32::MAX);
            let mut max = Vec2::splat(f32::MIN);
            for v in vertices {
                let world = transform.to_world(*offset + *v);
                min = min.min(world);
                max = max.max(world);
            }
            Aabb { min, max }
        }
    };
    raw.inflated(margin)
}

struct Entry {
    id: BodyId,
    aabb: Aabb,
    is_static: bool,
}

/// Sweep-and-prune broadphase. Holds no per-tick state (entries are rebuilt
/// and sorted fresh every call) besides the configurable AABB margin.
pub struct SweepAndPrune {
    margin: f32,
}

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self {
            margin: BROADPHASE_MARGIN,
        }
    }
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build with a non-default AABB inflation margin.
    pub fn with_margin(margin: f32) -> Self {
        Self { margin }
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn set_margin(&mut self, margin: f32) {
        self.margin = margin;
    }

    /// Find candidate colliding pairs among `bodies`. `aabb_of` supplies the
    /// AABB and static flag for a body; bodies without a collider should be
    /// excluded by the caller before this is invoked.
    pub fn find_pairs(
        &self,
        bodies: &[BodyId],
        aabb_of: impl Fn(BodyId) -> (Aabb, bool),
    ) -> Vec<(BodyId, BodyId)> {
        let mut entries: Vec<Entry> = bodies
            .iter()
            .map(|&id| {
                let (aabb, is_static) = aabb_of(id);
                Entry {
                    id,
                    aabb,
                    is_static,
                }
            })
            .collect();

        // Stable sort so that tied min.x entries keep the input order,
        // making pair emission reproducible across runs.
        entries.sort_by(|a, b| a.aabb.min.x.partial_cmp(&b.aabb.min.x).unwrap());

        let mut pairs = Vec::new();
        for i in 0..entries.len() {
            let a = &entries[i];
            for b in entries.iter().skip(i + 1) {
                if b.aabb.min.x > a.aabb.max.x {
                    break;
                }
                if a.is_static && b.is_static {
                    continue;
                }
                if a.aabb.min.y <= b.aabb.max.y && a.aabb.max.y >= b.aabb.min.y {
                    pairs.push((a.id, b.id));
                }
            }
        }
        pairs
    }
}
