//! Kalman track with a scored lifecycle
//!
//! One [`Track`] type serves every measurement model. The model supplies
//! `f, F, h, H, Q` and the state layout; the track owns the filter state,
//! the timing counters and the score.
//!
//! `active` and `confirmed` are derived from the score and counters on every
//! read. The only stored lifecycle flag is a one-way retirement latch, so a
//! deleted track never comes back.

use nalgebra::{SMatrix, UnitQuaternion, Vector3};

use crate::geometry::boxes::{Box2D, Box3D};
use crate::geometry::differential::differential;
use crate::geometry::frame::{FrameId, FrameTree};
use crate::geometry::vector::Vector;
use crate::models::{
    Box2dModel, Box3dModel, CartesianXy, CartesianXyz, RangeAzimuth, RangeAzimuthElevation,
    RangeAzimuthElevationRate, TrackKind, TrackModel,
};
use crate::tracking::lifecycle::{track_probability, Lifecycle};
use crate::tracking::tracker::Detection;
use crate::types::ids::TrackId;
use crate::types::spaces::{Measurement, MeasurementCovariance, StateCovariance, StateVector};
use crate::types::transforms::{
    compute_innovation_covariance, compute_kalman_gain, simple_covariance_update,
};
use crate::{Error, Result};

/// Predictions over shorter intervals are skipped.
pub const MIN_PREDICT_DT: f64 = 1e-8;

/// Source name on detections re-emitted from tracks.
pub const TRACKER_SOURCE: &str = "tracker";

/// Covariance entries smaller than this are zeroed after a change of frame.
pub const COVARIANCE_FLOOR: f64 = 1e-5;

#[derive(Debug, Clone)]
pub struct Track<Mdl: TrackModel<N, M>, const N: usize, const M: usize> {
    model: Mdl,
    lifecycle: Lifecycle,
    id: TrackId,
    obj_type: String,
    x: StateVector<N>,
    p: StateCovariance<N>,
    frame: FrameId,
    attributes: Mdl::Attributes,
    t0: f64,
    t: f64,
    dt_coast: f64,
    n_updates: u32,
    n_missed: u32,
    score: f64,
    retired: bool,
}

// ============================================================================
// Aliases
// ============================================================================

pub type XyFromXyTrack = Track<CartesianXy, 4, 2>;
pub type XyzFromXyzTrack = Track<CartesianXyz, 6, 3>;
pub type XyFromRazTrack = Track<RangeAzimuth, 4, 2>;
pub type XyzFromRazelTrack = Track<RangeAzimuthElevation, 6, 3>;
pub type XyzFromRazelRrtTrack = Track<RangeAzimuthElevationRate, 6, 4>;
pub type BoxTrack2D = Track<Box2dModel, 6, 4>;
pub type BoxTrack3D = Track<Box3dModel, 9, 6>;

impl<Mdl: TrackModel<N, M>, const N: usize, const M: usize> Track<Mdl, N, M> {
    /// Spawns a track from a detection expressed in `frame`.
    pub fn new(
        model: Mdl,
        lifecycle: Lifecycle,
        id: TrackId,
        obj_type: impl Into<String>,
        t0: f64,
        frame: FrameId,
        detection: &Mdl::Detection,
    ) -> Self {
        let (x, p, attributes) = model.initialize(detection);
        Self::from_state(model, lifecycle, id, obj_type, t0, frame, x, p, attributes)
    }

    /// Builds a fresh track around an explicit state.
    #[allow(clippy::too_many_arguments)]
    pub fn from_state(
        model: Mdl,
        lifecycle: Lifecycle,
        id: TrackId,
        obj_type: impl Into<String>,
        t0: f64,
        frame: FrameId,
        x: StateVector<N>,
        p: StateCovariance<N>,
        attributes: Mdl::Attributes,
    ) -> Self {
        let score = lifecycle.config().score_init;
        Self {
            model,
            lifecycle,
            id,
            obj_type: obj_type.into(),
            x,
            p,
            frame,
            attributes,
            t0,
            t: t0,
            dt_coast: 0.0,
            n_updates: 1,
            n_missed: 0,
            score,
            retired: false,
        }
    }

    pub(crate) fn restore_counters(
        &mut self,
        t: f64,
        dt_coast: f64,
        n_updates: u32,
        n_missed: u32,
        score: f64,
    ) {
        self.t = t;
        self.dt_coast = dt_coast;
        self.n_updates = n_updates;
        self.n_missed = n_missed;
        self.score = score;
        self.refresh();
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[inline]
    pub fn kind(&self) -> TrackKind {
        Mdl::KIND
    }

    #[inline]
    pub fn model(&self) -> &Mdl {
        &self.model
    }

    #[inline]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn obj_type(&self) -> &str {
        &self.obj_type
    }

    #[inline]
    pub fn x(&self) -> &StateVector<N> {
        &self.x
    }

    #[inline]
    pub fn p(&self) -> &StateCovariance<N> {
        &self.p
    }

    #[inline]
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    #[inline]
    pub fn attributes(&self) -> &Mdl::Attributes {
        &self.attributes
    }

    #[inline]
    pub fn t0(&self) -> f64 {
        self.t0
    }

    /// Time of the last prediction.
    #[inline]
    pub fn t(&self) -> f64 {
        self.t
    }

    #[inline]
    pub fn dt_coast(&self) -> f64 {
        self.dt_coast
    }

    #[inline]
    pub fn n_updates(&self) -> u32 {
        self.n_updates
    }

    #[inline]
    pub fn n_missed(&self) -> u32 {
        self.n_missed
    }

    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Probability that this is a true track.
    pub fn probability(&self) -> f64 {
        track_probability(self.score)
    }

    pub fn is_active(&self) -> bool {
        !self.retired && self.lifecycle.is_active(self.score, self.dt_coast, self.n_missed)
    }

    pub fn is_confirmed(&self) -> bool {
        self.is_active()
            && self
                .lifecycle
                .is_confirmed(self.score, self.dt_coast, self.n_missed, self.n_updates)
    }

    /// Position block as a frame-tagged vector (2D states get `z = 0`).
    pub fn position(&self) -> Vector {
        Vector::position(self.block(self.model.layout().position), self.frame)
    }

    /// Velocity block as a frame-tagged vector (2D states get `z = 0`).
    pub fn velocity(&self) -> Vector {
        Vector::velocity(self.block(self.model.layout().velocity), self.frame)
    }

    fn block(&self, range: core::ops::Range<usize>) -> Vector3<f64> {
        let mut out = Vector3::zeros();
        for (i, idx) in range.enumerate().take(3) {
            out[i] = self.x[idx];
        }
        out
    }

    /// Explicit finiteness check over the state and covariance.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.p.is_finite()
    }

    // ------------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------------

    /// Propagates the state to time `t`.
    pub fn predict(&mut self, t: f64) {
        let dt = t - self.t;
        if dt > MIN_PREDICT_DT {
            self.x = self.model.propagate(&self.x, dt);
            let f = self.model.transition_jacobian(dt);
            self.p = f.propagate_covariance(&self.p) + self.model.process_noise(dt);
            self.t = t;
            self.dt_coast += dt;
            log::trace!("track {} predicted by {:.3}s", self.id, dt);
        }
        self.refresh();
    }

    /// Kalman update with measurement `z` and noise `r`.
    ///
    /// On error the track is left untouched.
    pub fn update(&mut self, z: &Measurement<M>, r: &MeasurementCovariance<M>) -> Result<()> {
        let predicted = self.model.observe(&self.x);
        let y = self.model.residual(z, &predicted);
        let h = self.model.observation_jacobian(&self.x)?;
        let s = compute_innovation_covariance(&self.p, &h, r);
        let k = compute_kalman_gain(&self.p, &h, &s).ok_or(Error::SingularInnovation)?;
        let d2 = s.mahalanobis_squared(&y).ok_or(Error::SingularInnovation)?;
        let det_s = s.determinant().ok_or(Error::SingularInnovation)?;

        self.x = self.x + k.correct(&y);
        self.p = simple_covariance_update(&self.p, &k, &h);
        self.dt_coast = 0.0;
        self.n_updates += 1;
        self.n_missed = 0;
        self.score += self.lifecycle.update_increment(d2, M, det_s);
        log::trace!("track {} updated, d2 = {:.3}, score = {:.3}", self.id, d2, self.score);
        if !self.is_finite() {
            log::warn!("track {} has non-finite state after update", self.id);
        }
        self.refresh();
        Ok(())
    }

    /// Updates from a detection payload expressed in `frame`.
    pub fn update_detection(
        &mut self,
        frame: FrameId,
        detection: &Mdl::Detection,
        r: &MeasurementCovariance<M>,
    ) -> Result<()> {
        if frame != self.frame {
            return Err(Error::FrameMismatch {
                track: self.frame,
                detection: frame,
            });
        }
        let z = self.model.measure(detection, &self.attributes)?;
        self.update(&z, r)?;
        self.model.absorb(detection, &mut self.attributes);
        Ok(())
    }

    /// Records a missed detection.
    pub fn missed(&mut self) {
        self.n_missed += 1;
        self.score += self.lifecycle.missed_penalty();
        self.refresh();
    }

    fn refresh(&mut self) {
        if !self.retired && !self.lifecycle.is_active(self.score, self.dt_coast, self.n_missed) {
            self.retired = true;
        }
    }

    // ------------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------------

    /// Re-expresses the track in `target`.
    ///
    /// Position and velocity blocks are shifted by the differential and
    /// rotated; the covariance is rotated on both sides and small entries
    /// are zeroed. Image-plane models only relabel the frame.
    pub fn change_reference(&mut self, tree: &FrameTree, target: FrameId) -> Result<()> {
        if self.frame == target {
            return Ok(());
        }
        if !self.model.reprojects() {
            self.frame = target;
            return Ok(());
        }

        let diff = differential(tree, self.frame, target, true)?;
        let rot = UnitQuaternion::from_quaternion(diff.pose.q)
            .to_rotation_matrix()
            .into_inner();
        let layout = self.model.layout();
        let dim = layout.spatial_dim();

        let position = rot * (self.block(layout.position.clone()) - diff.pose.x);
        let velocity = rot * (self.block(layout.velocity.clone()) - diff.pose.v);

        let mut t = SMatrix::<f64, N, N>::identity();
        for (range, value) in [(&layout.position, position), (&layout.velocity, velocity)] {
            for i in 0..dim {
                self.x[range.start + i] = value[i];
                for j in 0..dim {
                    t[(range.start + i, range.start + j)] = rot[(i, j)];
                }
            }
        }
        let mut p = t * self.p.as_matrix() * t.transpose();
        p.iter_mut()
            .filter(|v| v.abs() < COVARIANCE_FLOOR)
            .for_each(|v| *v = 0.0);
        self.p = StateCovariance::from_matrix(p);

        self.attributes = self.model.reproject_attributes(&self.attributes, &diff);
        self.frame = target;
        Ok(())
    }
}

// ============================================================================
// Box Views
// ============================================================================

impl BoxTrack2D {
    /// Current image box.
    pub fn box2d(&self) -> Box2D {
        Box2D::from_center([self.x[0], self.x[1]], self.x[2], self.x[3], self.frame)
    }
}

impl BoxTrack3D {
    /// Current 3D box with the last accepted orientation.
    pub fn box3d(&self) -> Box3D {
        Box3D::new(
            Vector3::new(self.x[0], self.x[1], self.x[2]),
            [self.x[3], self.x[4], self.x[5]],
            self.attributes.q,
            self.attributes.anchor,
            self.frame,
        )
    }

    /// The track's box as a detection, e.g. for a downstream fusion stage.
    pub fn as_box_detection(&self) -> Detection<Box3D> {
        Detection::new(TRACKER_SOURCE, self.box3d(), self.frame, self.obj_type.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::boxes::BoxAnchor;
    use crate::geometry::frame::FramePose;
    use crate::geometry::rotation::Rotation;
    use approx::assert_relative_eq;
    use nalgebra::Quaternion;

    fn raz_track(r: f64, az: f64) -> XyFromRazTrack {
        Track::new(
            RangeAzimuth::new(),
            Lifecycle::default(),
            TrackId(0),
            "car",
            0.0,
            FrameId::GLOBAL,
            &[r, az],
        )
    }

    #[test]
    fn test_raz_initialization() {
        let track = raz_track(10.0, 0.0);
        assert_eq!(track.x().as_slice(), &[10.0, 0.0, 0.0, 0.0]);
        assert_eq!(track.n_updates(), 1);
        assert!(track.is_active());
        assert!(!track.is_confirmed());
    }

    #[test]
    fn test_predict_without_velocity_keeps_position() {
        let mut track = raz_track(10.0, 0.0);
        track.predict(1.0);
        assert_relative_eq!(track.x()[0], 10.0);
        assert_relative_eq!(track.x()[1], 0.0);
        assert_relative_eq!(track.dt_coast(), 1.0);
        assert!(track.p()[(0, 0)] > 25.0);
    }

    #[test]
    fn test_predict_skips_tiny_steps() {
        let mut track = raz_track(10.0, 0.0);
        let before = track.p().clone();
        track.predict(1e-9);
        assert_eq!(track.p(), &before);
        assert_eq!(track.t(), 0.0);
    }

    #[test]
    fn test_update_pulls_azimuth() {
        let mut track = raz_track(10.0, 0.0);
        track.predict(1.0);
        let r = MeasurementCovariance::from_std_devs(&[0.1, 0.01]);
        track.update(&Measurement::from_array([10.0, 0.1]), &r).unwrap();
        let azimuth = track.x()[1].atan2(track.x()[0]);
        assert!(azimuth > 0.05 && azimuth <= 0.1 + 1e-9);
        assert_eq!(track.n_updates(), 2);
        assert_eq!(track.dt_coast(), 0.0);
    }

    #[test]
    fn test_singular_innovation_leaves_track_untouched() {
        let mut track: XyFromXyTrack = Track::from_state(
            CartesianXy::new(),
            Lifecycle::default(),
            TrackId(1),
            "car",
            0.0,
            FrameId::GLOBAL,
            StateVector::from_array([1.0, 1.0, 0.0, 0.0]),
            StateCovariance::zeros(),
            (),
        );
        let result = track.update(&Measurement::from_array([2.0, 2.0]), &MeasurementCovariance::zeros());
        assert!(matches!(result, Err(Error::SingularInnovation)));
        assert_eq!(track.x().as_slice(), &[1.0, 1.0, 0.0, 0.0]);
        assert_eq!(track.n_updates(), 1);
    }

    #[test]
    fn test_missed_detections_retire() {
        let mut track = raz_track(10.0, 0.0);
        for _ in 0..7 {
            track.missed();
        }
        assert!(!track.is_active());
    }

    #[test]
    fn test_frame_mismatch_rejected() {
        let mut tree = FrameTree::new();
        let sensor = tree
            .add_frame(FrameId::GLOBAL, FramePose::translation(Vector3::new(1.0, 0.0, 0.0)))
            .unwrap();
        let mut track = raz_track(10.0, 0.0);
        let r = MeasurementCovariance::identity();
        let result = track.update_detection(sensor, &[10.0, 0.0], &r);
        assert!(matches!(result, Err(Error::FrameMismatch { .. })));
    }

    #[test]
    fn test_change_reference_rotates_state_and_covariance() {
        let mut tree = FrameTree::new();
        let heading = Rotation::from_yaw(core::f64::consts::FRAC_PI_2, FrameId::GLOBAL);
        let ego = tree
            .add_frame(FrameId::GLOBAL, FramePose::new(Vector3::new(0.0, 5.0, 0.0), heading.q))
            .unwrap();
        let mut track: XyzFromXyzTrack = Track::from_state(
            CartesianXyz::new(),
            Lifecycle::default(),
            TrackId(2),
            "car",
            0.0,
            FrameId::GLOBAL,
            StateVector::from_array([0.0, 10.0, 0.0, 0.0, 1.0, 0.0]),
            StateCovariance::from_std_devs(&[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]),
            (),
        );
        track.change_reference(&tree, ego).unwrap();
        assert_eq!(track.frame(), ego);
        // the ego faces +y, so the target is 5 m straight ahead
        assert_relative_eq!(track.position().x, Vector3::new(5.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(track.velocity().x, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(track.p()[(0, 0)], 4.0, epsilon = 1e-6);
        assert_relative_eq!(track.p()[(1, 1)], 1.0, epsilon = 1e-6);
        assert_eq!(track.p()[(0, 1)], 0.0);
    }

    #[test]
    fn test_box3d_update_copies_orientation() {
        let detection = |yaw: f64, anchor| {
            Box3D::new(
                Vector3::new(10.0, 0.0, 0.0),
                [1.5, 1.8, 4.2],
                Rotation::from_yaw(yaw, FrameId::GLOBAL).q,
                anchor,
                FrameId::GLOBAL,
            )
        };
        let mut track: BoxTrack3D = Track::new(
            Box3dModel::new(),
            Lifecycle::default(),
            TrackId(3),
            "truck",
            0.0,
            FrameId::GLOBAL,
            &detection(0.0, BoxAnchor::Center),
        );
        let r = MeasurementCovariance::identity();
        track.predict(0.1);
        track.update_detection(FrameId::GLOBAL, &detection(0.3, BoxAnchor::Center), &r).unwrap();
        assert_relative_eq!(
            Rotation::new(track.attributes().q, FrameId::GLOBAL).yaw(),
            0.3,
            epsilon = 1e-12
        );

        let result = track.update_detection(FrameId::GLOBAL, &detection(0.3, BoxAnchor::Bottom), &r);
        assert!(matches!(result, Err(Error::ConventionMismatch { .. })));
        assert_ne!(track.attributes().q, Quaternion::identity());
    }
}
