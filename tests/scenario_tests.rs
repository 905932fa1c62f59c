use approx::assert_relative_eq;
use cable_dynamics::*;

const DT: f64 = 1.0 / 60.0;

#[test]
fn hanging_rope_settles_near_rest_length() {
    let mut world = SandboxWorld::new();
    let hook = world.add_sphere(0.05);
    let body = world.add_body(BodyBuilder::new(hook).fixed());
    let config = RopeConfig::default().with_collision(false).with_damping(0.05);
    let mut rope = Rope::from_segment(DVec3::ZERO, DVec3::new(0.9, 0.0, 0.0), 10, 1.0, config)
        .expect("valid rope");
    rope.append_anchor(0, body, DVec3::ZERO, 1.0).expect("node exists");
    let rest = rope.rest_length();
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    for _ in 0..300 {
        cable.step(&mut world, DT, None);
    }

    let rope = cable.rope();
    assert!(
        (rope.length() - rest).abs() <= rest * 0.01,
        "length {} drifted from rest {}",
        rope.length(),
        rest
    );
    assert!(rope.nodes()[9].position.y < -0.5, "tail should hang below the hook");
    assert_eq!(rope.nodes()[0].position, DVec3::ZERO);
    assert!(rope.tension(0).expect("anchor exists").y > 0.0);
}

#[test]
fn non_finite_external_force_zeroes_that_node() {
    let mut world = SandboxWorld::with_gravity(DVec3::ZERO);
    let config = RopeConfig::default()
        .with_gravity(false)
        .with_collision(false)
        .with_external_forces(true);
    let rope = Rope::from_segment(DVec3::ZERO, DVec3::new(4.0, 0.0, 0.0), 5, 5.0, config)
        .expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    let mut forces = vec![DVec3::ZERO; 5];
    forces[2] = DVec3::new(f64::NAN, 0.0, 0.0);
    let metrics = cable.step(&mut world, DT, Some(forces.as_slice()));

    assert_eq!(metrics.status, RopeStatus::InternalForcesError);
    assert_eq!(cable.rope().status(), RopeStatus::InternalForcesError);
    assert_eq!(cable.rope().nodes()[2].velocity, DVec3::ZERO);
    assert!(cable
        .rope()
        .nodes()
        .iter()
        .all(|n| n.position.is_finite() && n.velocity.is_finite()));

    let forces = vec![DVec3::ZERO; 5];
    let metrics = cable.step(&mut world, DT, Some(forces.as_slice()));
    assert_eq!(metrics.status, RopeStatus::Valid);
}

#[test]
fn external_forces_are_ignored_unless_enabled() {
    let mut world = SandboxWorld::with_gravity(DVec3::ZERO);
    let config = RopeConfig::default().with_gravity(false).with_collision(false);
    let rope = Rope::new(&[DVec3::ZERO], &[1.0], config).expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    cable.step(&mut world, DT, Some([DVec3::new(100.0, 0.0, 0.0)].as_slice()));

    assert_eq!(cable.rope().nodes()[0].position, DVec3::ZERO);
}

#[test]
fn external_force_accelerates_node() {
    let mut world = SandboxWorld::with_gravity(DVec3::ZERO);
    let config = RopeConfig::default()
        .with_gravity(false)
        .with_collision(false)
        .with_external_forces(true);
    let rope = Rope::new(&[DVec3::ZERO], &[2.0], config).expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    cable.step(&mut world, 0.5, Some([DVec3::new(4.0, 0.0, 0.0)].as_slice()));

    assert_relative_eq!(cable.rope().nodes()[0].velocity, DVec3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    assert_relative_eq!(cable.rope().nodes()[0].position, DVec3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
}

#[test]
fn invalid_time_step_is_skipped() {
    let mut world = SandboxWorld::new();
    let rope = Rope::from_segment(DVec3::ZERO, DVec3::X, 3, 1.0, RopeConfig::default()).expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);
    let before: Vec<DVec3> = cable.rope().nodes().iter().map(|n| n.position).collect();

    for dt in [0.0, -DT, f64::NAN, f64::INFINITY] {
        let metrics = cable.step(&mut world, dt, None);
        assert_eq!(metrics, StepMetrics::default());
    }

    let after: Vec<DVec3> = cable.rope().nodes().iter().map(|n| n.position).collect();
    assert_eq!(before, after);
    assert_eq!(cable.step_count(), 0);
}

#[test]
fn host_receives_swept_rope_bounds() {
    let mut world = SandboxWorld::new();
    let rope = Rope::from_segment(DVec3::ZERO, DVec3::X, 3, 1.0, RopeConfig::default()).expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    cable.step(&mut world, DT, None);

    let bounds = world.rope_bounds(handle).expect("rope registered");
    assert_eq!(bounds, cable.rope().bounds());
    assert!(bounds.contains_point(DVec3::ZERO));
    assert!(bounds.contains_point(cable.rope().nodes()[2].position));
}

#[test]
fn exported_buffers_follow_the_nodes() {
    let mut world = SandboxWorld::new();
    let rope = Rope::from_segment(DVec3::ZERO, DVec3::X, 3, 1.0, RopeConfig::default()).expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    cable.step(&mut world, DT, None);

    let rope = cable.rope();
    assert_eq!(rope.node_positions().len(), 3);
    assert_eq!(rope.node_data().len(), 3);
    for (node, (position, data)) in rope
        .nodes()
        .iter()
        .zip(rope.node_positions().iter().zip(rope.node_data()))
    {
        assert_eq!(DVec3::new(position.x, position.y, position.z), node.position);
        assert_eq!(data.velocity(), node.velocity);
        assert!(data.volume > 0.0);
    }
}

#[test]
fn rope_draped_over_box_stays_on_top() {
    let mut world = SandboxWorld::new();
    let shape = world.add_cuboid(DVec3::new(0.25, 0.25, 0.25));
    let body = world.add_body(BodyBuilder::new(shape).fixed());
    let rope = Rope::from_segment(
        DVec3::new(-0.5, 0.5, 0.0),
        DVec3::new(0.5, 0.5, 0.0),
        11,
        0.5,
        RopeConfig::default(),
    )
    .expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    for _ in 0..90 {
        cable.step(&mut world, DT, None);
    }

    let middle = cable.rope().nodes()[5].position;
    assert!(middle.y > 0.25, "middle node fell through the box: {middle}");
    assert!(world.manifold_for(handle, body).is_some());

    let rope = cable.release(&mut world);
    assert_eq!(world.manifold_count(), 0);
    assert_eq!(rope.node_count(), 11);
}

#[test]
fn config_changes_apply_to_later_steps() {
    let mut world = SandboxWorld::new();
    let config = RopeConfig::default().with_collision(false);
    let rope = Rope::new(&[DVec3::ZERO], &[1.0], config).expect("valid rope");
    let handle = world.register_rope();
    let mut cable = Cable::new(handle, rope);

    cable
        .rope_mut()
        .set_config(config.with_gravity(false))
        .expect("valid config");
    cable.step(&mut world, DT, None);
    assert_eq!(cable.rope().nodes()[0].position, DVec3::ZERO);

    assert!(cable
        .rope_mut()
        .set_config(config.with_node_radius(-1.0))
        .is_err());
}
