//! Example usage of the avtrack library
//!
//! A radar mounted on a moving ego vehicle reports range and azimuth to two
//! other vehicles. Every cycle the tracks are parked in the global frame,
//! the ego pose is updated in place, detections are associated to the
//! nearest track in the radar frame, and the tracker reprojects, updates,
//! spawns and retires tracks.

use avtrack::codec::encode_any_track;
use avtrack::geometry::vector::cartesian_to_spherical;
use avtrack::prelude::*;
use nalgebra::Vector3;

const DT: f64 = 0.1;
const STEPS: usize = 50;
/// Association gate on the radar-frame distance, in meters.
const GATE: f64 = 4.0;

struct Vehicle {
    start: Vector3<f64>,
    velocity: Vector3<f64>,
}

impl Vehicle {
    fn position(&self, t: f64) -> Vector3<f64> {
        self.start + self.velocity * t
    }
}

fn main() -> avtrack::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("avtrack: radar tracking from a moving platform");
    println!("==============================================\n");

    let mut tree = FrameTree::new();
    let ego_speed = 8.0;
    let heading = Rotation::from_yaw(0.05, FrameId::GLOBAL);
    let ego_velocity = heading.conjugate().apply(&Vector3::new(ego_speed, 0.0, 0.0));
    let ego = tree.add_frame(
        FrameId::GLOBAL,
        FramePose::new(Vector3::zeros(), heading.q).with_velocity(ego_velocity),
    )?;
    let radar = tree.add_frame(ego, FramePose::translation(Vector3::new(3.7, 0.0, 0.5)))?;

    let vehicles = [
        Vehicle {
            start: Vector3::new(40.0, 6.0, 0.0),
            velocity: Vector3::new(10.0, 0.0, 0.0),
        },
        Vehicle {
            start: Vector3::new(70.0, -8.0, 0.0),
            velocity: Vector3::new(5.0, 1.0, 0.0),
        },
    ];

    let noise = MeasurementCovariance::from_std_devs(&[0.5, 0.01]);
    let mut tracker: Tracker<RangeAzimuth, 4, 2> = Tracker::new(RangeAzimuth::new(), noise).with_lifecycle(LifecycleConfig {
        pd: 0.95,
        ..LifecycleConfig::default()
    });

    for step in 0..STEPS {
        let t = step as f64 * DT;

        // radar-frame tracks would move with the ego otherwise
        tracker.change_reference(&tree, FrameId::GLOBAL)?;
        tree.set_position(ego, ego_velocity * t)?;

        let mut detections = Vec::new();
        for (k, vehicle) in vehicles.iter().enumerate() {
            // skip a few scans of the second vehicle
            if k == 1 && (20..24).contains(&step) {
                continue;
            }
            let truth = Vector::position(vehicle.position(t), FrameId::GLOBAL);
            let local = truth.change_reference(&tree, radar)?;
            let razel = cartesian_to_spherical(&local.x);
            let jitter = (step as f64 * 1.7 + k as f64).sin();
            let measurement = [razel[0] + 0.3 * jitter, razel[1] + 0.004 * jitter];
            detections.push(Detection::new("front-radar", measurement, radar, "car"));
        }

        let (matched, unmatched) = associate(&tree, &tracker, detections)?;
        let report = tracker.step(&tree, t, &matched, &unmatched)?;
        if !report.spawned.is_empty() || !report.retired.is_empty() {
            log::info!(
                "t = {:.1}s: spawned {:?}, retired {:?}",
                t,
                report.spawned,
                report.retired
            );
        }
    }

    println!("Confirmed tracks after {:.1}s:", STEPS as f64 * DT);
    for track in tracker.confirmed_tracks() {
        let position = track.position().change_reference(&tree, FrameId::GLOBAL)?;
        println!(
            "  track {}: global pos=({:.1}, {:.1}), {} updates, p={:.3}",
            track.id(),
            position.x[0],
            position.x[1],
            track.n_updates(),
            track.probability()
        );
    }

    if let Some(track) = tracker.confirmed_tracks().next() {
        let encoded = encode_any_track(&tree, &AnyTrack::from(track.clone()))?;
        println!("\nEncoded {}:\n{}", track.id(), encoded);
    }

    Ok(())
}

type RazDetection = Detection<[f64; 2]>;

/// Greedy nearest-neighbor association in each detection's frame.
fn associate(
    tree: &FrameTree,
    tracker: &Tracker<RangeAzimuth, 4, 2>,
    detections: Vec<RazDetection>,
) -> avtrack::Result<(Vec<(TrackId, RazDetection)>, Vec<RazDetection>)> {
    let mut matched: Vec<(TrackId, RazDetection)> = Vec::new();
    let mut unmatched = Vec::new();
    for detection in detections {
        let [r, az] = detection.data;
        let observed = Vector3::new(r * az.cos(), r * az.sin(), 0.0);

        let mut best: Option<(TrackId, f64)> = None;
        for track in tracker.tracks() {
            if matched.iter().any(|(id, _)| *id == track.id()) {
                continue;
            }
            let predicted = track.position().change_reference(tree, detection.frame)?;
            let distance = (predicted.x.xy() - observed.xy()).norm();
            if distance < GATE && best.map_or(true, |(_, d)| distance < d) {
                best = Some((track.id(), distance));
            }
        }
        match best {
            Some((id, _)) => matched.push((id, detection)),
            None => unmatched.push(detection),
        }
    }
    Ok((matched, unmatched))
}
