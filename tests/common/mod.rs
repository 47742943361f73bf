//! Common helpers for the integration tests

#![allow(dead_code)]

use avtrack::prelude::*;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Frames of a car with a roof sensor: global → ego → mount → sensor.
pub struct SensorRig {
    pub ego: FrameId,
    pub mount: FrameId,
    pub sensor: FrameId,
}

/// Builds a moving, yawed ego vehicle carrying a tilted sensor.
pub fn sensor_rig(tree: &mut FrameTree) -> SensorRig {
    let ego = tree
        .add_frame(
            FrameId::GLOBAL,
            FramePose::new(
                Vector3::new(120.0, -35.0, 0.0),
                Rotation::from_yaw(0.6, FrameId::GLOBAL).q,
            )
            .with_velocity(Vector3::new(9.0, 4.0, 0.0)),
        )
        .unwrap();
    let mount = tree
        .add_frame(ego, FramePose::translation(Vector3::new(1.1, 0.0, 1.6)))
        .unwrap();
    let sensor = tree
        .add_frame(
            mount,
            FramePose::new(
                Vector3::new(0.2, -0.3, 0.1),
                Rotation::from_yaw(-0.25, FrameId::GLOBAL).q,
            ),
        )
        .unwrap();
    SensorRig { ego, mount, sensor }
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn xyz_track(id: u64, frame: FrameId, position: [f64; 3]) -> XyzFromXyzTrack {
    Track::new(
        CartesianXyz::new(),
        Lifecycle::default(),
        TrackId(id),
        "car",
        0.0,
        frame,
        &position,
    )
}

pub fn xy_noise(sigma: f64) -> MeasurementCovariance<2> {
    MeasurementCovariance::from_std_devs(&[sigma, sigma])
}

pub fn xyz_noise(sigma: f64) -> MeasurementCovariance<3> {
    MeasurementCovariance::from_std_devs(&[sigma, sigma, sigma])
}
