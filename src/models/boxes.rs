//! Bounding-box measurements

use nalgebra::{Quaternion, SVector};
use serde::{Deserialize, Serialize};

use super::cartesian::KINEMATIC_PROCESS_NOISE;
use super::{
    assert_process_noise, constant_velocity_matrix, constant_velocity_step, scaled_process_noise,
    selection_matrix, StateLayout, TrackKind, TrackModel,
};
use crate::geometry::boxes::{Box2D, Box3D, BoxAnchor};
use crate::geometry::numeric::{compose, conjugate};
use crate::geometry::RelativeFrame;
use crate::types::spaces::{Measurement, StateCovariance, StateVector};
use crate::types::transforms::{ObservationMatrix, TransitionMatrix};
use crate::{Error, Result};

/// Default process noise for 3D box extents.
pub const SIZE_PROCESS_NOISE: f64 = 0.2;

/// Default process noise for 3D box velocities.
pub const BOX3D_VELOCITY_PROCESS_NOISE: f64 = 3.0;

/// Initial standard deviation of every image-box state.
pub const BOX2D_INIT_SIGMA: f64 = 10.0;

/// Initial standard deviations of `[x, y, z, h, w, l, vx, vy, vz]`.
pub const BOX3D_INIT_SIGMAS: [f64; 9] = [5.0, 5.0, 5.0, 2.0, 2.0, 2.0, 10.0, 10.0, 10.0];

// ============================================================================
// Box2D
// ============================================================================

/// Image-plane box tracker.
///
/// State: `[cx, cy, w, h, vx, vy]`, measurement: `[cx, cy, w, h]` computed
/// from the detected corners.
#[derive(Debug, Clone, PartialEq)]
pub struct Box2dModel {
    pub process_noise: SVector<f64, 6>,
}

impl Default for Box2dModel {
    fn default() -> Self {
        Self {
            process_noise: SVector::repeat(KINEMATIC_PROCESS_NOISE),
        }
    }
}

impl Box2dModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// Panics if any entry is negative or not finite.
    pub fn with_process_noise(diag: [f64; 6]) -> Self {
        let process_noise = SVector::from(diag);
        assert_process_noise(&process_noise);
        Self { process_noise }
    }
}

fn box2d_measurement(detection: &Box2D) -> Measurement<4> {
    let [cx, cy] = detection.center();
    Measurement::from_array([cx, cy, detection.width(), detection.height()])
}

impl TrackModel<6, 4> for Box2dModel {
    type Detection = Box2D;
    type Attributes = ();

    const KIND: TrackKind = TrackKind::Box2D;

    fn layout(&self) -> StateLayout {
        StateLayout {
            position: 0..2,
            velocity: 4..6,
            size: Some(2..4),
        }
    }

    fn propagate(&self, x: &StateVector<6>, dt: f64) -> StateVector<6> {
        constant_velocity_step(&self.layout(), x, dt)
    }

    fn transition_jacobian(&self, dt: f64) -> TransitionMatrix<6> {
        constant_velocity_matrix(&self.layout(), dt)
    }

    fn process_noise(&self, dt: f64) -> StateCovariance<6> {
        scaled_process_noise(&self.process_noise, dt)
    }

    fn observe(&self, x: &StateVector<6>) -> Measurement<4> {
        Measurement::from_array([x[0], x[1], x[2], x[3]])
    }

    fn observation_jacobian(&self, _x: &StateVector<6>) -> Result<ObservationMatrix<4, 6>> {
        Ok(selection_matrix([0, 1, 2, 3]))
    }

    fn initialize(&self, detection: &Box2D) -> (StateVector<6>, StateCovariance<6>, ()) {
        let z = box2d_measurement(detection);
        let x = StateVector::from_array([z[0], z[1], z[2], z[3], 0.0, 0.0]);
        (x, StateCovariance::from_std_devs(&[BOX2D_INIT_SIGMA; 6]), ())
    }

    fn measure(&self, detection: &Box2D, _attributes: &()) -> Result<Measurement<4>> {
        Ok(box2d_measurement(detection))
    }

    fn reprojects(&self) -> bool {
        false
    }
}

// ============================================================================
// Box3D
// ============================================================================

/// Orientation and anchor convention carried by a 3D box track.
///
/// Orientation is not filtered; it is copied from each accepted detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box3dAttributes {
    pub q: Quaternion<f64>,
    pub anchor: BoxAnchor,
}

impl Default for Box3dAttributes {
    fn default() -> Self {
        Self {
            q: Quaternion::identity(),
            anchor: BoxAnchor::Center,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Box3dAttributesRecord {
    q: [f64; 4],
    anchor: BoxAnchor,
}

/// 3D box tracker.
///
/// State: `[x, y, z, h, w, l, vx, vy, vz]`, measurement: `[x, y, z, h, w, l]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Box3dModel {
    pub process_noise: SVector<f64, 9>,
}

impl Default for Box3dModel {
    fn default() -> Self {
        let k = KINEMATIC_PROCESS_NOISE;
        let s = SIZE_PROCESS_NOISE;
        let v = BOX3D_VELOCITY_PROCESS_NOISE;
        Self {
            process_noise: SVector::from([k, k, k, s, s, s, v, v, v]),
        }
    }
}

impl Box3dModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// Panics if any entry is negative or not finite.
    pub fn with_process_noise(diag: [f64; 9]) -> Self {
        let process_noise = SVector::from(diag);
        assert_process_noise(&process_noise);
        Self { process_noise }
    }
}

impl TrackModel<9, 6> for Box3dModel {
    type Detection = Box3D;
    type Attributes = Box3dAttributes;

    const KIND: TrackKind = TrackKind::Box3D;

    fn layout(&self) -> StateLayout {
        StateLayout {
            position: 0..3,
            velocity: 6..9,
            size: Some(3..6),
        }
    }

    fn propagate(&self, x: &StateVector<9>, dt: f64) -> StateVector<9> {
        constant_velocity_step(&self.layout(), x, dt)
    }

    fn transition_jacobian(&self, dt: f64) -> TransitionMatrix<9> {
        constant_velocity_matrix(&self.layout(), dt)
    }

    fn process_noise(&self, dt: f64) -> StateCovariance<9> {
        scaled_process_noise(&self.process_noise, dt)
    }

    fn observe(&self, x: &StateVector<9>) -> Measurement<6> {
        Measurement::from_array([x[0], x[1], x[2], x[3], x[4], x[5]])
    }

    fn observation_jacobian(&self, _x: &StateVector<9>) -> Result<ObservationMatrix<6, 9>> {
        Ok(selection_matrix([0, 1, 2, 3, 4, 5]))
    }

    fn initialize(&self, detection: &Box3D) -> (StateVector<9>, StateCovariance<9>, Box3dAttributes) {
        let p = detection.position;
        let [h, w, l] = detection.size;
        let x = StateVector::from_array([p[0], p[1], p[2], h, w, l, 0.0, 0.0, 0.0]);
        let attributes = Box3dAttributes {
            q: detection.q,
            anchor: detection.anchor,
        };
        (x, StateCovariance::from_std_devs(&BOX3D_INIT_SIGMAS), attributes)
    }

    fn measure(&self, detection: &Box3D, attributes: &Box3dAttributes) -> Result<Measurement<6>> {
        if detection.anchor != attributes.anchor {
            return Err(Error::ConventionMismatch {
                expected: attributes.anchor.to_string(),
                found: detection.anchor.to_string(),
            });
        }
        let p = detection.position;
        let [h, w, l] = detection.size;
        Ok(Measurement::from_array([p[0], p[1], p[2], h, w, l]))
    }

    fn absorb(&self, detection: &Box3D, attributes: &mut Box3dAttributes) {
        attributes.q = detection.q;
    }

    fn reproject_attributes(&self, attributes: &Box3dAttributes, diff: &RelativeFrame) -> Box3dAttributes {
        Box3dAttributes {
            q: compose(&attributes.q, &conjugate(&diff.pose.q)),
            anchor: attributes.anchor,
        }
    }

    fn encode_attributes(&self, attributes: &Box3dAttributes) -> Option<serde_json::Value> {
        let q = attributes.q;
        let record = Box3dAttributesRecord {
            q: [q.w, q.i, q.j, q.k],
            anchor: attributes.anchor,
        };
        serde_json::to_value(record).ok()
    }

    fn decode_attributes(&self, value: Option<&serde_json::Value>) -> Result<Box3dAttributes> {
        let value = value.ok_or_else(|| Error::Decode("box track is missing its attributes".into()))?;
        let record: Box3dAttributesRecord = serde_json::from_value(value.clone())?;
        let [w, i, j, k] = record.q;
        Ok(Box3dAttributes {
            q: Quaternion::new(w, i, j, k),
            anchor: record.anchor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FrameId;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn detection(anchor: BoxAnchor) -> Box3D {
        Box3D::new(
            Vector3::new(12.0, -1.0, 0.5),
            [1.6, 1.9, 4.4],
            Quaternion::identity(),
            anchor,
            FrameId::GLOBAL,
        )
    }

    #[test]
    fn test_box2d_measures_center_and_size() {
        let b = Box2D::new([100.0, 50.0, 140.0, 130.0], FrameId::GLOBAL);
        let z = Box2dModel::new().measure(&b, &()).unwrap();
        assert_eq!(z.as_slice(), &[120.0, 90.0, 40.0, 80.0]);
    }

    #[test]
    fn test_box2d_default_noise_is_uniform() {
        let q = Box2dModel::new().process_noise(0.5);
        for i in 0..6 {
            assert_relative_eq!(q[(i, i)], 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_box3d_anchor_mismatch_rejected() {
        let model = Box3dModel::new();
        let (_, _, attributes) = model.initialize(&detection(BoxAnchor::Center));
        let result = model.measure(&detection(BoxAnchor::Bottom), &attributes);
        assert!(matches!(result, Err(Error::ConventionMismatch { .. })));
    }

    #[test]
    fn test_box3d_default_noise() {
        let q = Box3dModel::new().process_noise(1.0);
        assert_relative_eq!(q[(0, 0)], 4.0);
        assert_relative_eq!(q[(3, 3)], 0.04, epsilon = 1e-15);
        assert_relative_eq!(q[(8, 8)], 9.0);
    }

    #[test]
    fn test_box3d_attributes_json() {
        let model = Box3dModel::new();
        let attributes = Box3dAttributes {
            q: Quaternion::new(0.5, 0.5, 0.5, 0.5),
            anchor: BoxAnchor::Bottom,
        };
        let value = model.encode_attributes(&attributes).unwrap();
        assert_eq!(value["anchor"], "bottom");
        assert_eq!(model.decode_attributes(Some(&value)).unwrap(), attributes);
    }
}
