//! Frame-tagged 3-vectors and spherical coordinates
//!
//! A [`Vector`] is a numeric value plus the frame it is expressed in. Binary
//! operations reproject the right operand into the left operand's frame
//! before combining them.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::differential::differential;
use super::frame::{FrameId, FrameTree};
use super::numeric::{near_zero, rotate, round_vector, AngleWrapping, DEFAULT_PRECISION};
use crate::Result;

// ============================================================================
// Vector Kind
// ============================================================================

/// Selects which part of a frame differential translates a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorKind {
    Position,
    Velocity,
    Acceleration,
    /// Rotated only.
    Direction,
}

impl VectorKind {
    /// Lowercase tag used by the encoders.
    pub fn key(self) -> &'static str {
        match self {
            VectorKind::Position => "position",
            VectorKind::Velocity => "velocity",
            VectorKind::Acceleration => "acceleration",
            VectorKind::Direction => "direction",
        }
    }
}

// ============================================================================
// Frame-tagged Vector
// ============================================================================

/// A 3-vector expressed in a specific frame.
///
/// Components are rounded to `n_prec` digits whenever a vector is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector {
    pub kind: VectorKind,
    pub x: Vector3<f64>,
    pub frame: FrameId,
    pub n_prec: u32,
}

impl Vector {
    #[inline]
    pub fn new(kind: VectorKind, x: Vector3<f64>, frame: FrameId) -> Self {
        Self::with_precision(kind, x, frame, DEFAULT_PRECISION)
    }

    pub fn with_precision(kind: VectorKind, x: Vector3<f64>, frame: FrameId, n_prec: u32) -> Self {
        Self {
            kind,
            x: round_vector(&x, n_prec),
            frame,
            n_prec,
        }
    }

    /// A vector of the same kind and precision.
    #[inline]
    fn derived(&self, x: Vector3<f64>, frame: FrameId) -> Self {
        Self::with_precision(self.kind, x, frame, self.n_prec)
    }

    #[inline]
    pub fn position(x: Vector3<f64>, frame: FrameId) -> Self {
        Self::new(VectorKind::Position, x, frame)
    }

    #[inline]
    pub fn velocity(x: Vector3<f64>, frame: FrameId) -> Self {
        Self::new(VectorKind::Velocity, x, frame)
    }

    #[inline]
    pub fn acceleration(x: Vector3<f64>, frame: FrameId) -> Self {
        Self::new(VectorKind::Acceleration, x, frame)
    }

    #[inline]
    pub fn direction(x: Vector3<f64>, frame: FrameId) -> Self {
        Self::new(VectorKind::Direction, x, frame)
    }

    /// Re-expresses the vector in `target`.
    ///
    /// The differential offset matching the vector kind is subtracted first,
    /// then the result is rotated into the target frame.
    pub fn change_reference(&self, tree: &FrameTree, target: FrameId) -> Result<Self> {
        if self.frame == target {
            return Ok(*self);
        }
        let diff = differential(tree, self.frame, target, true)?.pose;
        let offset = match self.kind {
            VectorKind::Position => diff.x,
            VectorKind::Velocity => diff.v,
            VectorKind::Acceleration => diff.acc,
            VectorKind::Direction => Vector3::zeros(),
        };
        Ok(self.derived(rotate(&diff.q, &(self.x - offset)), target))
    }

    /// The same vector expressed in the global origin.
    pub fn in_global(&self, tree: &FrameTree) -> Result<Self> {
        self.change_reference(tree, FrameId::GLOBAL)
    }

    fn aligned(&self, tree: &FrameTree, other: &Vector) -> Result<Vector3<f64>> {
        Ok(other.change_reference(tree, self.frame)?.x)
    }

    pub fn add(&self, tree: &FrameTree, other: &Vector) -> Result<Self> {
        let rhs = self.aligned(tree, other)?;
        Ok(self.derived(self.x + rhs, self.frame))
    }

    pub fn subtract(&self, tree: &FrameTree, other: &Vector) -> Result<Self> {
        let rhs = self.aligned(tree, other)?;
        Ok(self.derived(self.x - rhs, self.frame))
    }

    /// Element-wise product.
    pub fn multiply(&self, tree: &FrameTree, other: &Vector) -> Result<Self> {
        let rhs = self.aligned(tree, other)?;
        Ok(self.derived(self.x.component_mul(&rhs), self.frame))
    }

    pub fn dot(&self, tree: &FrameTree, other: &Vector) -> Result<f64> {
        let rhs = self.aligned(tree, other)?;
        Ok(self.x.dot(&rhs))
    }

    /// Euclidean distance to `other` after reprojection.
    pub fn distance(&self, tree: &FrameTree, other: &Vector) -> Result<f64> {
        let rhs = self.aligned(tree, other)?;
        Ok((self.x - rhs).norm())
    }

    /// Component-wise closeness after reprojection (`|a - b| <= 1e-8`).
    pub fn allclose(&self, tree: &FrameTree, other: &Vector) -> Result<bool> {
        let rhs = self.aligned(tree, other)?;
        Ok(near_zero(&(self.x - rhs)))
    }

    #[inline]
    pub fn scale(&self, s: f64) -> Self {
        self.derived(self.x * s, self.frame)
    }

    #[inline]
    pub fn divide(&self, s: f64) -> Self {
        self.derived(self.x / s, self.frame)
    }

    /// Adds a scalar to every component.
    #[inline]
    pub fn offset(&self, s: f64) -> Self {
        self.derived(self.x.add_scalar(s), self.frame)
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        self.x.norm()
    }

    /// Unit vector; a zero vector is returned unchanged.
    pub fn unit(&self) -> Self {
        let n = self.norm();
        if n > 0.0 {
            self.divide(n)
        } else {
            *self
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.iter().all(|c| c.is_finite())
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// `(x, y, z)` to `(range, azimuth, elevation)`.
pub fn cartesian_to_spherical(x: &Vector3<f64>) -> Vector3<f64> {
    let range = x.norm();
    let azimuth = x[1].atan2(x[0]);
    let elevation = if range > 0.0 { (x[2] / range).clamp(-1.0, 1.0).asin() } else { 0.0 };
    Vector3::new(range, azimuth, elevation)
}

/// `(range, azimuth, elevation)` to `(x, y, z)`.
pub fn spherical_to_cartesian(razel: &Vector3<f64>) -> Vector3<f64> {
    let (r, az, el) = (razel[0], razel[1], razel[2]);
    Vector3::new(r * el.cos() * az.cos(), r * el.cos() * az.sin(), r * el.sin())
}

/// Position and velocity to `(range, azimuth, elevation, range_rate)`.
///
/// Range rate is positive when moving away from the origin.
pub fn cartesian_to_razelrrt(position: &Vector3<f64>, velocity: &Vector3<f64>) -> [f64; 4] {
    let razel = cartesian_to_spherical(position);
    let range_rate = if razel[0] > 0.0 {
        velocity.dot(position) / razel[0]
    } else {
        0.0
    };
    [razel[0], razel[1], razel[2], range_rate]
}

/// `(range, azimuth, elevation, range_rate)` to a position and the
/// line-of-sight velocity it implies.
pub fn razelrrt_to_cartesian(razelrrt: &[f64; 4]) -> (Vector3<f64>, Vector3<f64>) {
    let position = spherical_to_cartesian(&Vector3::new(razelrrt[0], razelrrt[1], razelrrt[2]));
    let los = position.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
    (position, los * razelrrt[3])
}

// ============================================================================
// Spherical Value
// ============================================================================

/// `(range, azimuth, elevation)` tagged with a frame.
///
/// Angles are wrapped on every write according to `wrapping`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    range: f64,
    azimuth: f64,
    elevation: f64,
    pub frame: FrameId,
    pub wrapping: AngleWrapping,
}

impl Spherical {
    pub fn new(range: f64, azimuth: f64, elevation: f64, frame: FrameId) -> Self {
        Self::with_wrapping(range, azimuth, elevation, frame, AngleWrapping::default())
    }

    pub fn with_wrapping(
        range: f64,
        azimuth: f64,
        elevation: f64,
        frame: FrameId,
        wrapping: AngleWrapping,
    ) -> Self {
        Self {
            range,
            azimuth: wrapping.azimuth(azimuth),
            elevation: wrapping.elevation(elevation),
            frame,
            wrapping,
        }
    }

    /// Spherical coordinates of a frame-tagged position.
    pub fn from_cartesian(position: &Vector, wrapping: AngleWrapping) -> Self {
        let razel = cartesian_to_spherical(&position.x);
        Self::with_wrapping(razel[0], razel[1], razel[2], position.frame, wrapping)
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.range
    }

    #[inline]
    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    #[inline]
    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    pub fn set_range(&mut self, range: f64) {
        self.range = range;
    }

    pub fn set_azimuth(&mut self, azimuth: f64) {
        self.azimuth = self.wrapping.azimuth(azimuth);
    }

    pub fn set_elevation(&mut self, elevation: f64) {
        self.elevation = self.wrapping.elevation(elevation);
    }

    pub fn to_cartesian(&self) -> Vector {
        Vector::position(
            spherical_to_cartesian(&Vector3::new(self.range, self.azimuth, self.elevation)),
            self.frame,
        )
    }

    /// Reprojects through Cartesian coordinates.
    pub fn change_reference(&self, tree: &FrameTree, target: FrameId) -> Result<Self> {
        let moved = self.to_cartesian().change_reference(tree, target)?;
        Ok(Self::from_cartesian(&moved, self.wrapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::frame::FramePose;
    use approx::assert_relative_eq;
    use core::f64::consts::{FRAC_PI_2, PI};
    use nalgebra::UnitQuaternion;

    #[test]
    fn test_position_into_translated_frame() {
        let mut tree = FrameTree::new();
        let sensor = tree
            .add_frame(FrameId::GLOBAL, FramePose::translation(Vector3::new(2.0, 0.0, 0.0)))
            .unwrap();
        let p = Vector::position(Vector3::new(5.0, 1.0, 0.0), FrameId::GLOBAL);
        let local = p.change_reference(&tree, sensor).unwrap();
        assert_relative_eq!(local.x, Vector3::new(3.0, 1.0, 0.0), epsilon = 1e-12);
        assert_eq!(local.frame, sensor);
    }

    #[test]
    fn test_direction_ignores_translation() {
        let mut tree = FrameTree::new();
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2).into_inner();
        let turned = tree
            .add_frame(FrameId::GLOBAL, FramePose::new(Vector3::new(7.0, 7.0, 0.0), q))
            .unwrap();
        let d = Vector::direction(Vector3::new(1.0, 0.0, 0.0), FrameId::GLOBAL);
        let local = d.change_reference(&tree, turned).unwrap();
        assert_relative_eq!(local.x, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-7);
    }

    #[test]
    fn test_velocity_subtracts_frame_velocity() {
        let mut tree = FrameTree::new();
        let ego = tree
            .add_frame(
                FrameId::GLOBAL,
                FramePose::identity().with_velocity(Vector3::new(10.0, 0.0, 0.0)),
            )
            .unwrap();
        let v = Vector::velocity(Vector3::new(12.0, 1.0, 0.0), FrameId::GLOBAL);
        let relative = v.change_reference(&tree, ego).unwrap();
        assert_relative_eq!(relative.x, Vector3::new(2.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_binary_ops_reproject() {
        let mut tree = FrameTree::new();
        let a = tree
            .add_frame(FrameId::GLOBAL, FramePose::translation(Vector3::new(1.0, 0.0, 0.0)))
            .unwrap();
        let p = Vector::position(Vector3::new(1.0, 1.0, 0.0), FrameId::GLOBAL);
        let q = Vector::position(Vector3::new(0.0, 1.0, 0.0), a);
        assert!(p.allclose(&tree, &q).unwrap());
        assert_relative_eq!(p.distance(&tree, &q).unwrap(), 0.0, epsilon = 1e-12);
        let sum = p.add(&tree, &q).unwrap();
        assert_relative_eq!(sum.x, Vector3::new(2.0, 2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(p.dot(&tree, &q).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_components_rounded_on_build() {
        let v = Vector::position(Vector3::new(1.234_567_891_2, -0.000_000_000_4, 2.0), FrameId::GLOBAL);
        assert_eq!(v.x, Vector3::new(1.234_567_89, 0.0, 2.0));
        assert_eq!(v.scale(1.0 / 3.0).x[2], 0.666_666_67);

        let coarse = Vector::with_precision(VectorKind::Velocity, Vector3::new(0.126, 0.0, 0.0), FrameId::GLOBAL, 2);
        assert_eq!(coarse.offset(0.001).x[0], 0.13);
    }

    #[test]
    fn test_spherical_wraps_on_write() {
        let mut s = Spherical::new(10.0, 3.0 * PI / 2.0, 0.0, FrameId::GLOBAL);
        assert_relative_eq!(s.azimuth(), -FRAC_PI_2, epsilon = 1e-12);
        s.set_azimuth(2.0 * PI + 0.1);
        assert_relative_eq!(s.azimuth(), 0.1, epsilon = 1e-12);

        let positive = Spherical::with_wrapping(10.0, -0.5, 0.0, FrameId::GLOBAL, AngleWrapping::Positive);
        assert_relative_eq!(positive.azimuth(), 2.0 * PI - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_spherical_cartesian_conversion() {
        let s = Spherical::new(10.0, 0.3, -0.2, FrameId::GLOBAL);
        let back = Spherical::from_cartesian(&s.to_cartesian(), AngleWrapping::Symmetric);
        assert_relative_eq!(back.range(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(back.azimuth(), 0.3, epsilon = 1e-8);
        assert_relative_eq!(back.elevation(), -0.2, epsilon = 1e-8);
    }

    #[test]
    fn test_zenith_and_nadir_round_trip() {
        for z in [10.0_f64, -10.0] {
            let p = Vector::position(Vector3::new(0.0, 0.0, z), FrameId::GLOBAL);
            let s = Spherical::from_cartesian(&p, AngleWrapping::Symmetric);
            assert_relative_eq!(s.elevation(), FRAC_PI_2 * z.signum(), epsilon = 1e-12);
            assert_relative_eq!(s.to_cartesian().x, p.x, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_range_rate_sign() {
        let position = Vector3::new(10.0, 0.0, 0.0);
        let receding = cartesian_to_razelrrt(&position, &Vector3::new(3.0, 4.0, 0.0));
        assert_relative_eq!(receding[3], 3.0, epsilon = 1e-12);
        let (_, v) = razelrrt_to_cartesian(&[10.0, 0.0, 0.0, -2.0]);
        assert_relative_eq!(v, Vector3::new(-2.0, 0.0, 0.0), epsilon = 1e-12);
    }
}
