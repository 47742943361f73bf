//! Multi-step tracker scenarios with seeded measurement noise

mod common;

use avtrack::geometry::vector::cartesian_to_spherical;
use avtrack::prelude::*;
use common::{seeded_rng, xy_noise};
use nalgebra::{Vector2, Vector3};
use rand_distr::{Distribution, Normal};

const DT: f64 = 0.1;

#[test]
fn test_two_targets_in_global_frame() {
    let mut rng = seeded_rng(42);
    let sigma = 0.2;
    let noise = Normal::new(0.0, sigma).unwrap();
    let tree = FrameTree::new();
    let mut tracker: Tracker<CartesianXy, 4, 2> = Tracker::new(CartesianXy::new(), xy_noise(sigma));

    let starts = [Vector2::new(0.0, 0.0), Vector2::new(50.0, 20.0)];
    let velocities = [Vector2::new(3.0, 1.0), Vector2::new(-2.0, 0.5)];
    let mut ids: [Option<TrackId>; 2] = [None, None];

    for step in 0..60 {
        let t = step as f64 * DT;
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        let mut waiting = Vec::new();
        for k in 0..2 {
            let p = starts[k] + velocities[k] * t;
            let data = [p.x + noise.sample(&mut rng), p.y + noise.sample(&mut rng)];
            let detection = Detection::new("lidar", data, FrameId::GLOBAL, "car");
            match ids[k] {
                Some(id) => matched.push((id, detection)),
                None => {
                    unmatched.push(detection);
                    waiting.push(k);
                }
            }
        }
        let report = tracker.step(&tree, t, &matched, &unmatched).unwrap();
        assert_eq!(report.updated.len(), matched.len());
        for (k, id) in waiting.into_iter().zip(report.spawned) {
            ids[k] = Some(id);
        }
    }

    assert_eq!(tracker.confirmed_tracks().count(), 2);
    let t = 59.0 * DT;
    for k in 0..2 {
        let track = tracker.track(ids[k].unwrap()).unwrap();
        let truth = starts[k] + velocities[k] * t;
        let estimate = Vector2::new(track.x()[0], track.x()[1]);
        assert!((estimate - truth).norm() < 0.8, "target {k} off by {}", (estimate - truth).norm());
        let velocity = Vector2::new(track.x()[2], track.x()[3]);
        assert!((velocity - velocities[k]).norm() < 2.5);
    }
}

#[test]
fn test_moving_radar_reprojects_tracks() {
    let mut rng = seeded_rng(3);
    let range_noise = Normal::new(0.0, 0.2).unwrap();
    let angle_noise = Normal::new(0.0, 0.002).unwrap();

    let mut tree = FrameTree::new();
    let mount = FramePose::translation(Vector3::new(2.0, 0.0, 1.0));
    let ego_velocity = Vector3::new(6.0, 0.0, 0.0);
    let target_start = Vector3::new(40.0, 5.0, 0.0);
    let target_velocity = Vector3::new(8.0, -1.0, 0.0);

    let noise = MeasurementCovariance::from_std_devs(&[0.2, 0.002, 0.002]);
    let mut tracker: Tracker<RangeAzimuthElevation, 6, 3> =
        Tracker::new(RangeAzimuthElevation::new(), noise);
    let mut id = None;
    let mut last_radar = None;

    for step in 0..50 {
        let t = step as f64 * DT;
        let ego_pose = FramePose::new(ego_velocity * t, Rotation::from_yaw(0.1, FrameId::GLOBAL).q)
            .with_velocity(ego_velocity);
        let ego = tree.find_or_add_frame(FrameId::GLOBAL, ego_pose, tree.precision()).unwrap();
        let radar = tree.find_or_add_frame(ego, mount, tree.precision()).unwrap();
        last_radar = Some(radar);

        let truth = Vector::position(target_start + target_velocity * t, FrameId::GLOBAL);
        let local = truth.change_reference(&tree, radar).unwrap();
        let razel = cartesian_to_spherical(&local.x);
        let data = [
            razel[0] + range_noise.sample(&mut rng),
            razel[1] + angle_noise.sample(&mut rng),
            razel[2] + angle_noise.sample(&mut rng),
        ];
        let detection = Detection::new("radar", data, radar, "car");

        let report = match id {
            Some(id) => tracker.step(&tree, t, &[(id, detection)], &[]).unwrap(),
            None => tracker.step(&tree, t, &[], &[detection]).unwrap(),
        };
        id = id.or(report.spawned.first().copied());
    }

    let track = tracker.track(id.unwrap()).unwrap();
    assert_eq!(Some(track.frame()), last_radar);
    assert!(track.is_confirmed());

    let estimate = track.position().change_reference(&tree, FrameId::GLOBAL).unwrap();
    let truth = target_start + target_velocity * (49.0 * DT);
    let error = (estimate.x - truth).norm();
    assert!(error < 1.0, "global position error {error}");
}

#[test]
fn test_one_off_clutter_is_retired_unconfirmed() {
    let tree = FrameTree::new();
    let mut tracker: Tracker<CartesianXy, 4, 2> = Tracker::new(CartesianXy::new(), xy_noise(0.5));
    let clutter = Detection::new("lidar", [7.0, -2.0], FrameId::GLOBAL, "unknown");
    let spawned = tracker.step(&tree, 0.0, &[], &[clutter]).unwrap().spawned;
    assert_eq!(spawned.len(), 1);
    assert_eq!(tracker.confirmed_tracks().count(), 0);

    let mut retired = Vec::new();
    for step in 1..20 {
        let report = tracker.step(&tree, step as f64 * DT, &[], &[]).unwrap();
        assert_eq!(tracker.confirmed_tracks().count(), 0);
        retired.extend(report.retired);
    }
    assert_eq!(retired, spawned);
    assert!(tracker.tracks().is_empty());
}

#[test]
fn test_degenerate_update_counts_as_miss() {
    let tree = FrameTree::new();
    let mut tracker: Tracker<RangeAzimuth, 4, 2> = Tracker::new(
        RangeAzimuth::new(),
        MeasurementCovariance::from_std_devs(&[0.5, 0.01]),
    );
    let at_origin = Detection::new("radar", [0.0, 0.0], FrameId::GLOBAL, "car");
    let id = tracker.step(&tree, 0.0, &[], &[at_origin.clone()]).unwrap().spawned[0];

    let report = tracker.step(&tree, 0.1, &[(id, at_origin)], &[]).unwrap();
    assert!(report.updated.is_empty());
    let track = tracker.track(id).unwrap();
    assert_eq!(track.n_missed(), 1);
    assert_eq!(track.n_updates(), 1);
}
