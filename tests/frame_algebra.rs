//! Frame tree composition, caching and reprojection

mod common;

use approx::assert_relative_eq;
use avtrack::geometry::{common_ancestor, differential, integrate, AncestorMatch};
use avtrack::prelude::*;
use common::{seeded_rng, sensor_rig};
use nalgebra::Vector3;
use rand::Rng;

#[test]
fn test_self_differential_is_identity() {
    let mut tree = FrameTree::new();
    let rig = sensor_rig(&mut tree);
    for frame in [FrameId::GLOBAL, rig.ego, rig.mount, rig.sensor] {
        let diff = differential(&tree, frame, frame, true).unwrap();
        assert!(diff.is_identity(), "{frame} differs from itself");
        assert_eq!(diff.anchor, frame);
    }
}

#[test]
fn test_twin_frames_are_equal() {
    let mut tree = FrameTree::new();
    let rig = sensor_rig(&mut tree);
    let twin = sensor_rig(&mut tree);
    assert_ne!(rig.sensor, twin.sensor);
    assert!(tree.frames_equal(rig.sensor, twin.sensor).unwrap());
    assert!(differential(&tree, rig.sensor, twin.sensor, true).unwrap().is_identity());
}

#[test]
fn test_parent_mutation_invalidates_descendants() {
    let mut tree = FrameTree::new();
    let rig = sensor_rig(&mut tree);
    let before = tree.hash_of(rig.sensor).unwrap();
    integrate(&tree, rig.sensor, FrameId::GLOBAL).unwrap();
    assert!(tree.has_cached_hash(rig.mount).unwrap());
    assert!(!tree.is_invalidated(rig.sensor).unwrap());

    tree.set_position(rig.ego, Vector3::new(121.0, -35.0, 0.0)).unwrap();
    for frame in [rig.ego, rig.mount, rig.sensor] {
        assert!(tree.is_invalidated(frame).unwrap());
    }
    assert!(tree.has_cached_hash(FrameId::GLOBAL).unwrap());
    assert_ne!(tree.hash_of(rig.sensor).unwrap(), before);

    // the sensor origin moved along with the ego
    let pose = integrate(&tree, rig.sensor, FrameId::GLOBAL).unwrap();
    let original = {
        let mut t = FrameTree::new();
        let r = sensor_rig(&mut t);
        integrate(&t, r.sensor, FrameId::GLOBAL).unwrap()
    };
    assert_relative_eq!(pose.x - original.x, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-7);
}

#[test]
fn test_global_origin_is_immutable() {
    let mut tree = FrameTree::new();
    let result = tree.set_velocity(FrameId::GLOBAL, Vector3::new(1.0, 0.0, 0.0));
    assert!(matches!(result, Err(Error::ImmutableOrigin)));
}

#[test]
fn test_integrate_requires_an_ancestor() {
    let mut tree = FrameTree::new();
    let rig = sensor_rig(&mut tree);
    let result = integrate(&tree, rig.mount, rig.sensor);
    assert!(matches!(result, Err(Error::NotAnAncestor { .. })));
    assert_eq!(
        common_ancestor(&tree, rig.sensor, rig.ego, AncestorMatch::Exact).unwrap(),
        rig.ego
    );
}

#[test]
fn test_reprojection_composes() {
    let mut tree = FrameTree::new();
    let rig = sensor_rig(&mut tree);
    let other = tree
        .add_frame(
            FrameId::GLOBAL,
            FramePose::new(
                Vector3::new(-10.0, 40.0, 2.0),
                Rotation::from_yaw(-1.2, FrameId::GLOBAL).q,
            ),
        )
        .unwrap();

    let mut rng = seeded_rng(11);
    for _ in 0..20 {
        let x = Vector3::new(
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-2.0..2.0),
        );
        let v = Vector::position(x, rig.sensor);
        let direct = v.change_reference(&tree, other).unwrap();
        let hopped = v
            .change_reference(&tree, rig.ego)
            .unwrap()
            .change_reference(&tree, FrameId::GLOBAL)
            .unwrap()
            .change_reference(&tree, other)
            .unwrap();
        assert_relative_eq!(direct.x, hopped.x, epsilon = 1e-7);

        let back = direct.change_reference(&tree, rig.sensor).unwrap();
        assert_relative_eq!(back.x, x, epsilon = 1e-7);
    }
}

#[test]
fn test_vector_kinds_use_matching_offsets() {
    let mut tree = FrameTree::new();
    let rig = sensor_rig(&mut tree);
    let stationary = Vector::velocity(Vector3::zeros(), FrameId::GLOBAL);
    let seen = stationary.change_reference(&tree, rig.ego).unwrap();
    // a stationary point appears to move backwards at the ego speed
    assert_relative_eq!(seen.norm(), (81.0f64 + 16.0).sqrt(), epsilon = 1e-7);
    assert!(seen.x[0] < 0.0);

    let north = Vector::direction(Vector3::new(0.0, 1.0, 0.0), FrameId::GLOBAL);
    let local = north.change_reference(&tree, rig.ego).unwrap();
    assert_relative_eq!(local.norm(), 1.0, epsilon = 1e-7);
}

#[test]
fn test_rotation_round_trip_through_frames() {
    let mut tree = FrameTree::new();
    let rig = sensor_rig(&mut tree);
    let heading = Rotation::from_yaw(0.9, FrameId::GLOBAL);
    let local = heading.change_reference(&tree, rig.ego).unwrap();
    assert_relative_eq!(local.yaw(), 0.3, epsilon = 1e-7);
    let back = local.change_reference(&tree, FrameId::GLOBAL).unwrap();
    assert!(back.allclose(&tree, &heading).unwrap());
}
