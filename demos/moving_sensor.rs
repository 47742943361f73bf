//! Lidar on a moving platform, tracked in the global frame
//!
//! The lidar frame is mutated in place every scan. Detections are moved into
//! the global frame before they reach the tracker, so tracks never live in a
//! frame that changes under them. Truth-labelled detections stand in for an
//! association step.

use avtrack::codec::{decode_any_track, encode_any_track, encode_frame_chain};
use avtrack::prelude::*;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

const DT: f64 = 0.1;
const STEPS: usize = 40;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let mut rng = StdRng::seed_from_u64(7);
    let position_noise = Normal::new(0.0, 0.15)?;

    let mut tree = FrameTree::new();
    let platform = tree.add_frame(FrameId::GLOBAL, FramePose::identity())?;
    let lidar = tree.add_frame(platform, FramePose::translation(Vector3::new(1.2, 0.0, 1.8)))?;

    let starts = [Vector3::new(25.0, 3.0, 0.5), Vector3::new(-15.0, -10.0, 0.4)];
    let velocities = [Vector3::new(-4.0, 0.0, 0.0), Vector3::new(2.0, 3.0, 0.0)];
    let mut labels: [Option<TrackId>; 2] = [None, None];

    let noise = MeasurementCovariance::from_std_devs(&[0.15, 0.15, 0.15]);
    let mut tracker: Tracker<CartesianXyz, 6, 3> = Tracker::new(CartesianXyz::new(), noise);

    for step in 0..STEPS {
        let t = step as f64 * DT;
        let yaw = 0.02 * t;
        tree.set_pose(
            platform,
            FramePose::new(
                Vector3::new(6.0 * t, 0.0, 0.0),
                Rotation::from_yaw(yaw, FrameId::GLOBAL).q,
            )
            .with_velocity(Vector3::new(6.0, 0.0, 0.0)),
        )?;

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        let mut unlabelled = Vec::new();
        for (k, (start, velocity)) in starts.iter().zip(&velocities).enumerate() {
            let truth = Vector::position(start + velocity * t, FrameId::GLOBAL);
            let mut local = truth.change_reference(&tree, lidar)?;
            for c in local.x.iter_mut() {
                *c += position_noise.sample(&mut rng);
            }
            // what the sensor reports, moved back to the tracking frame
            let global = local.change_reference(&tree, FrameId::GLOBAL)?;
            let data: [f64; 3] = global.x.into();
            let detection = Detection::new("roof-lidar", data, FrameId::GLOBAL, "car");
            match labels[k] {
                Some(id) => matched.push((id, detection)),
                None => {
                    unmatched.push(detection);
                    unlabelled.push(k);
                }
            }
        }

        let report = tracker.step(&tree, t, &matched, &unmatched)?;
        for (k, id) in unlabelled.into_iter().zip(report.spawned) {
            labels[k] = Some(id);
        }
    }

    for track in tracker.tracks() {
        let velocity = track.velocity();
        println!(
            "track {} ({}): pos=({:.2}, {:.2}, {:.2}) vel=({:.2}, {:.2}) confirmed={}",
            track.id(),
            track.obj_type(),
            track.x()[0],
            track.x()[1],
            track.x()[2],
            velocity.x[0],
            velocity.x[1],
            track.is_confirmed()
        );
    }

    println!("\nlidar frame chain: {}", encode_frame_chain(&tree, lidar)?);

    if let Some(track) = tracker.tracks().first() {
        let encoded = encode_any_track(&tree, &AnyTrack::from(track.clone()))?;
        let mut restored_tree = FrameTree::new();
        let restored = decode_any_track(&mut restored_tree, &encoded)?;
        println!(
            "round trip of {}: {}",
            track.id(),
            encode_any_track(&restored_tree, &restored)? == encoded
        );
    }

    Ok(())
}
