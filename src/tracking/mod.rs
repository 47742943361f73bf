//! Kalman tracks, their lifecycle and the tracking cycle

pub mod group;
pub mod joint;
pub mod lifecycle;
pub mod track;
pub mod tracker;

pub use group::{AnyTrack, GroupTrack};
pub use joint::{JointBox, JointBoxTrack, JointNoise, JointParts};
pub use lifecycle::{track_probability, Lifecycle, LifecycleConfig};
pub use track::{
    BoxTrack2D, BoxTrack3D, Track, XyFromRazTrack, XyFromXyTrack, XyzFromRazelRrtTrack,
    XyzFromRazelTrack, XyzFromXyzTrack,
};
pub use tracker::{Detection, StepReport, Tracker};
