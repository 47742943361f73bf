//! Frame-tagged orientations
//!
//! A [`Rotation`] stores the quaternion taking reference-frame coordinates to
//! object coordinates.

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};

use super::differential::differential;
use super::frame::{FrameId, FrameTree};
use super::numeric::{compose, conjugate, near_zero, rotate};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub q: Quaternion<f64>,
    pub frame: FrameId,
}

impl Rotation {
    #[inline]
    pub fn new(q: Quaternion<f64>, frame: FrameId) -> Self {
        Self { q, frame }
    }

    #[inline]
    pub fn identity(frame: FrameId) -> Self {
        Self::new(Quaternion::identity(), frame)
    }

    /// Builds a rotation from a direction-cosine matrix.
    ///
    /// Returns [`Error::NotRightHanded`] for a negative determinant.
    pub fn from_matrix(matrix: &Matrix3<f64>, frame: FrameId) -> Result<Self> {
        if matrix.determinant() < 0.0 {
            return Err(Error::NotRightHanded);
        }
        let rotation = Rotation3::from_matrix(matrix);
        Ok(Self::new(UnitQuaternion::from_rotation_matrix(&rotation).into_inner(), frame))
    }

    /// An orientation heading along `yaw` radians in the reference xy-plane.
    pub fn from_yaw(yaw: f64, frame: FrameId) -> Self {
        Self::new(UnitQuaternion::from_euler_angles(0.0, 0.0, -yaw).into_inner(), frame)
    }

    /// Direction-cosine matrix mapping reference coordinates to object
    /// coordinates.
    pub fn matrix(&self) -> Matrix3<f64> {
        UnitQuaternion::from_quaternion(self.q)
            .to_rotation_matrix()
            .into_inner()
    }

    /// Object x-axis in reference coordinates.
    pub fn forward(&self) -> Vector3<f64> {
        self.matrix().row(0).transpose()
    }

    /// Object y-axis in reference coordinates.
    pub fn left(&self) -> Vector3<f64> {
        self.matrix().row(1).transpose()
    }

    /// Object z-axis in reference coordinates.
    pub fn up(&self) -> Vector3<f64> {
        self.matrix().row(2).transpose()
    }

    /// Heading of the forward axis in the reference xy-plane.
    pub fn yaw(&self) -> f64 {
        let r = self.matrix();
        r[(0, 1)].atan2(r[(0, 0)])
    }

    /// Rotates a reference-frame vector into object coordinates.
    pub fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        rotate(&self.q, v)
    }

    pub fn conjugate(&self) -> Self {
        Self::new(conjugate(&self.q), self.frame)
    }

    /// Applies `other` after reprojecting it into this rotation's frame.
    pub fn compose(&self, tree: &FrameTree, other: &Rotation) -> Result<Self> {
        let rhs = other.change_reference(tree, self.frame)?;
        Ok(Self::new(compose(&self.q, &rhs.q), self.frame))
    }

    /// Smallest angle between the two orientations.
    pub fn angle_between(&self, tree: &FrameTree, other: &Rotation) -> Result<f64> {
        let rhs = other.change_reference(tree, self.frame)?;
        let delta = compose(&conjugate(&self.q), &rhs.q);
        Ok(2.0 * delta.imag().norm().atan2(delta.w.abs()))
    }

    pub fn allclose(&self, tree: &FrameTree, other: &Rotation) -> Result<bool> {
        let rhs = other.change_reference(tree, self.frame)?;
        let delta = compose(&conjugate(&self.q), &rhs.q);
        Ok(near_zero(&delta.imag()))
    }

    /// Re-expresses the orientation relative to `target`.
    pub fn change_reference(&self, tree: &FrameTree, target: FrameId) -> Result<Self> {
        if self.frame == target {
            return Ok(*self);
        }
        let diff = differential(tree, self.frame, target, true)?.pose;
        Ok(Self::new(compose(&self.q, &conjugate(&diff.q)), target))
    }

    pub fn is_finite(&self) -> bool {
        self.q.coords.iter().all(|c| c.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::frame::FramePose;
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;

    #[test]
    fn test_yaw_round_trip() {
        for yaw in [-2.5, -0.3, 0.0, 0.7, 3.0] {
            let r = Rotation::from_yaw(yaw, FrameId::GLOBAL);
            assert_relative_eq!(r.yaw(), yaw, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_forward_axis_follows_yaw() {
        let r = Rotation::from_yaw(FRAC_PI_2, FrameId::GLOBAL);
        assert_relative_eq!(r.forward(), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(r.left(), Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(r.up(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_left_handed_matrix_rejected() {
        let m = Matrix3::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        assert!(matches!(Rotation::from_matrix(&m, FrameId::GLOBAL), Err(Error::NotRightHanded)));
    }

    #[test]
    fn test_change_reference_subtracts_frame_heading() {
        let mut tree = FrameTree::new();
        let heading = Rotation::from_yaw(0.5, FrameId::GLOBAL);
        let ego = tree
            .add_frame(FrameId::GLOBAL, FramePose::new(Vector3::new(3.0, 1.0, 0.0), heading.q))
            .unwrap();
        let target = Rotation::from_yaw(0.8, FrameId::GLOBAL);
        let relative = target.change_reference(&tree, ego).unwrap();
        assert_relative_eq!(relative.yaw(), 0.3, epsilon = 1e-7);
        let back = relative.change_reference(&tree, FrameId::GLOBAL).unwrap();
        assert!(back.allclose(&tree, &target).unwrap());
    }
}
