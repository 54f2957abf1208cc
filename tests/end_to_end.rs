//! End-to-end scenario coverage through the public `PhysicsWorld` API
//! against the `HecsBodyStore` reference implementation. All scenarios
//! run at `fixed_timestep = 1/240` with gravity `(0, -9.81)` unless noted
//! otherwise.

use approx::assert_relative_eq;
use glam::Vec2;
use vervain2d::{
    BodyStore, Collider, HecsBodyStore, PhysicsWorld, PointerState, RigidBody, SystemKind,
    Transform,
};

const FIXED_TIMESTEP: f32 = 1.0 / 240.0;
const GRAVITY: Vec2 = Vec2::new(0.0, -9.81);

fn full_world() -> PhysicsWorld<HecsBodyStore> {
    let mut world = PhysicsWorld::new(FIXED_TIMESTEP);
    world.add_system(SystemKind::Inertia);
    world.add_system(SystemKind::Gravity(GRAVITY));
    world.add_system(SystemKind::MouseGrab);
    world.add_system(SystemKind::CollisionDetection);
    world.add_system(SystemKind::ConstraintSolver {
        velocity_iterations: 12,
        position_iterations: 4,
    });
    world
}

fn run_ticks(world: &mut PhysicsWorld<HecsBodyStore>, store: &mut HecsBodyStore, ticks: u32) {
    for _ in 0..ticks {
        world.update(store, FIXED_TIMESTEP);
    }
}

/// Scenario 1: a circle dropped onto a static floor comes to rest at
/// `y ~= floor_top + radius` with near-zero velocity.
#[test]
fn circle_rests_on_static_floor() {
    let mut store = HecsBodyStore::new();
    let mut floor = RigidBody::new_static();
    floor.friction = 0.3;
    store.spawn_with_collider(
        Transform::from_position(Vec2::new(0.0, 0.0)),
        floor,
        Collider::rect(Vec2::new(10.0, 0.5)),
    );

    let mut circle = RigidBody::new_dynamic(1.0);
    circle.restitution = 0.0;
    circle.friction = 0.3;
    let circle_id = store.spawn_with_collider(
        Transform::from_position(Vec2::new(0.0, 2.0)),
        circle,
        Collider::circle(0.5),
    );

    let mut world = full_world();
    world.init(&mut store);
    run_ticks(&mut world, &mut store, 240);

    let xf = store.transform(circle_id).unwrap();
    let rb = store.body(circle_id).unwrap();
    assert_relative_eq!(xf.position.y, 1.0, epsilon = 0.01);
    assert!(rb.linear_velocity.length() < 0.05, "v = {:?}", rb.linear_velocity);
}

/// Scenario 2: a head-on elastic collision between equal-mass circles swaps
/// velocities within one tick of contact resolution.
#[test]
fn elastic_circle_collision_swaps_velocities() {
    let mut store = HecsBodyStore::new();

    let mut a = RigidBody::new_dynamic(1.0);
    a.restitution = 1.0;
    a.linear_velocity = Vec2::new(1.0, 0.0);
    let id_a = store.spawn_with_collider(
        Transform::from_position(Vec2::new(0.0, 0.0)),
        a,
        Collider::circle(1.0),
    );

    let mut b = RigidBody::new_dynamic(1.0);
    b.restitution = 1.0;
    let id_b = store.spawn_with_collider(
        Transform::from_position(Vec2::new(1.5, 0.0)),
        b,
        Collider::circle(1.0),
    );

    let mut world = PhysicsWorld::new(FIXED_TIMESTEP);
    world.add_system(SystemKind::Inertia);
    world.add_system(SystemKind::CollisionDetection);
    world.add_system(SystemKind::ConstraintSolver {
        velocity_iterations: 12,
        position_iterations: 4,
    });
    world.init(&mut store);

    run_ticks(&mut world, &mut store, 1);

    let va = store.body(id_a).unwrap().linear_velocity.x;
    let vb = store.body(id_b).unwrap().linear_velocity.x;
    assert!(va.abs() < 1e-2, "va = {va}");
    assert!((vb - 1.0).abs() < 1e-2, "vb = {vb}");
}

/// Scenario 3: a stack of boxes on a static floor stays settled with
/// bounded penetration over a long run.
#[test]
fn box_stack_settles_with_bounded_penetration() {
    let mut store = HecsBodyStore::new();

    let mut floor = RigidBody::new_static();
    floor.friction = 0.3;
    store.spawn_with_collider(
        Transform::from_position(Vec2::new(0.0, 0.0)),
        floor,
        Collider::rect(Vec2::new(10.0, 0.5)),
    );

    let mut ids = Vec::new();
    for i in 0..5 {
        let mut b = RigidBody::new_dynamic(1.0);
        b.friction = 0.3;
        b.restitution = 0.1;
        let y = 0.5 + 1.0 * (i as f32) + 1.0 * 0.5;
        let id = store.spawn_with_collider(
            Transform::from_position(Vec2::new(0.0, y)),
            b,
            Collider::rect(Vec2::splat(0.5)),
        );
        ids.push(id);
    }

    let mut world = full_world();
    world.init(&mut store);
    run_ticks(&mut world, &mut store, 30 * 240);

    for &id in &ids {
        let xf = store.transform(id).unwrap();
        // Floor top is at y=0.5; each box's half-height is 0.5, so no box
        // should sink more than a couple of slop-widths below that.
        assert!(
            xf.position.y > 0.5 + 0.5 - 2.0 * 0.005 - 0.05,
            "box sank too far: y = {}",
            xf.position.y
        );
    }
}

/// Scenario 4: a frictionless box dropped on an incline accelerates
/// downhill without sticking.
#[test]
fn frictionless_box_slides_down_incline() {
    let mut store = HecsBodyStore::new();

    let mut incline = RigidBody::new_static();
    incline.friction = 0.0;
    store.spawn_with_collider(
        Transform {
            position: Vec2::new(0.0, 0.0),
            rotation: 0.3,
            scale: Vec2::ONE,
        },
        incline,
        Collider::rect(Vec2::new(5.0, 0.25)),
    );

    let mut b = RigidBody::new_dynamic(1.0);
    b.friction = 0.0;
    b.restitution = 0.0;
    let box_id = store.spawn_with_collider(
        Transform::from_position(Vec2::new(0.0, 1.5)),
        b,
        Collider::rect(Vec2::splat(0.5)),
    );

    let mut world = full_world();
    world.init(&mut store);

    // This incline's positive rotation puts downhill in -x (the right edge
    // of the box sits higher than the left once rotated); the box's
    // x-velocity should become monotonically more negative as it slides,
    // never sticking or reversing.
    let mut last_vx = f32::INFINITY;
    let mut monotonic_downhill = true;
    for _ in 0..(2 * 240 / 24) {
        run_ticks(&mut world, &mut store, 24);
        let vx = store.body(box_id).unwrap().linear_velocity.x;
        if vx > last_vx + 1e-3 {
            monotonic_downhill = false;
        }
        last_vx = vx;
    }

    assert!(monotonic_downhill, "downhill velocity should not reverse");
    assert!(last_vx < -0.1, "box should have picked up downhill speed, vx = {last_vx}");
}

/// Scenario 5: mouse grab pulls a circle toward the pointer target and the
/// approach decays rather than oscillating forever.
#[test]
fn mouse_grab_pulls_body_to_target_and_settles() {
    let mut store = HecsBodyStore::new();
    let circle_id = store.spawn_with_collider(
        Transform::from_position(Vec2::ZERO),
        RigidBody::new_dynamic(1.0),
        Collider::circle(0.5),
    );

    let mut world = PhysicsWorld::new(FIXED_TIMESTEP);
    world.add_system(SystemKind::Inertia);
    world.add_system(SystemKind::MouseGrab);
    world.add_system(SystemKind::ConstraintSolver {
        velocity_iterations: 12,
        position_iterations: 4,
    });
    world.init(&mut store);

    store.context_mut().insert(PointerState {
        down: true,
        pressed: true,
        released: false,
        world_pos: Vec2::ZERO,
    });
    world.update(&mut store, FIXED_TIMESTEP);

    for _ in 0..240 {
        store.context_mut().insert(PointerState {
            down: true,
            pressed: false,
            released: false,
            world_pos: Vec2::new(2.0, 0.0),
        });
        world.update(&mut store, FIXED_TIMESTEP);
    }

    let xf = store.transform(circle_id).unwrap();
    assert!(
        (xf.position - Vec2::new(2.0, 0.0)).length() < 0.05,
        "pos = {:?}",
        xf.position
    );
}

/// Scenario 6: warm-started impulses keep a resting stack quiet even with
/// very few velocity iterations per tick.
#[test]
fn warm_start_keeps_low_iteration_stack_quiet() {
    let mut store = HecsBodyStore::new();

    let mut floor = RigidBody::new_static();
    floor.friction = 0.3;
    store.spawn_with_collider(
        Transform::from_position(Vec2::ZERO),
        floor,
        Collider::rect(Vec2::new(10.0, 0.5)),
    );

    let mut ids = Vec::new();
    for i in 0..10 {
        let mut b = RigidBody::new_dynamic(1.0);
        b.friction = 0.3;
        b.restitution = 0.0;
        let y = 0.5 + 1.0 * (i as f32) + 0.5;
        let id = store.spawn_with_collider(
            Transform::from_position(Vec2::new(0.0, y)),
            b,
            Collider::rect(Vec2::splat(0.5)),
        );
        ids.push(id);
    }

    let mut world = PhysicsWorld::new(FIXED_TIMESTEP);
    world.add_system(SystemKind::Inertia);
    world.add_system(SystemKind::Gravity(GRAVITY));
    world.add_system(SystemKind::CollisionDetection);
    world.add_system(SystemKind::ConstraintSolver {
        velocity_iterations: 2,
        position_iterations: 4,
    });
    world.init(&mut store);

    // Let the stack settle for a few seconds first, same as it would after
    // any initial drop, then measure KE over the following second.
    run_ticks(&mut world, &mut store, 5 * 240);
    run_ticks(&mut world, &mut store, 240);

    let total_ke: f32 = ids
        .iter()
        .map(|&id| {
            let rb = store.body(id).unwrap();
            0.5 * rb.mass * rb.linear_velocity.length_squared()
                + 0.5 * rb.inertia * rb.angular_velocity * rb.angular_velocity
        })
        .sum();

    assert!(total_ke < 0.1, "total KE = {total_ke}");
}

/// Property 7: removing a body drops every contact-map key referencing it.
#[test]
fn despawn_drops_its_contact_map_entries() {
    let mut store = HecsBodyStore::new();
    let a = store.spawn_with_collider(
        Transform::from_position(Vec2::ZERO),
        RigidBody::new_dynamic(1.0),
        Collider::circle(1.0),
    );
    let b = store.spawn_with_collider(
        Transform::from_position(Vec2::new(1.5, 0.0)),
        RigidBody::new_dynamic(1.0),
        Collider::circle(1.0),
    );

    let mut world = PhysicsWorld::new(FIXED_TIMESTEP);
    world.add_system(SystemKind::Inertia);
    world.add_system(SystemKind::CollisionDetection);
    world.init(&mut store);
    world.update(&mut store, FIXED_TIMESTEP);

    store.despawn(a);
    let remaining = store
        .context_mut()
        .get_mut_or_default::<vervain2d::ContactManager>()
        .constraints();
    assert!(remaining.iter().all(|c| c.body_a != a && c.body_b != a));
    let _ = b;
}

/// Property 1: static bodies never acquire velocity, even under gravity.
#[test]
fn static_bodies_stay_at_zero_velocity() {
    let mut store = HecsBodyStore::new();
    let floor = store.spawn_with_collider(
        Transform::from_position(Vec2::ZERO),
        RigidBody::new_static(),
        Collider::rect(Vec2::new(10.0, 0.5)),
    );

    let mut world = full_world();
    world.init(&mut store);
    run_ticks(&mut world, &mut store, 60);

    let rb = store.body(floor).unwrap();
    assert_eq!(rb.linear_velocity, Vec2::ZERO);
    assert_eq!(rb.angular_velocity, 0.0);
}
