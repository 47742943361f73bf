//! Rounding, angle wrapping and small quaternion helpers shared by the
//! geometry types.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};

/// Default number of decimal digits kept on every numeric write.
pub const DEFAULT_PRECISION: u32 = 8;

/// Precisions above this are left unrounded; `10^n` no longer fits the
/// significand of an `f64`.
pub const MAX_ROUNDING_DIGITS: u32 = 15;

/// Absolute tolerance used for "near zero" checks (matches `allclose`).
pub const NEAR_ZERO: f64 = 1e-8;

/// Rounds `value` to `n_prec` decimal digits.
///
/// Negative zero is normalized to positive zero so that rounded values hash
/// identically.
#[inline]
pub fn round_to<T: Float>(value: T, n_prec: u32) -> T {
    if n_prec > MAX_ROUNDING_DIGITS {
        return if value == T::zero() { T::zero() } else { value };
    }
    let ten = T::from(10u8).unwrap_or_else(T::one);
    let scale = ten.powi(n_prec as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    let rounded = scaled.round() / scale;
    if rounded == T::zero() {
        T::zero()
    } else {
        rounded
    }
}

/// Rounds every component of a 3-vector.
#[inline]
pub fn round_vector(v: &Vector3<f64>, n_prec: u32) -> Vector3<f64> {
    v.map(|c| round_to(c, n_prec))
}

/// Rounds every coordinate of a (not necessarily unit) quaternion.
#[inline]
pub fn round_quaternion(q: &Quaternion<f64>, n_prec: u32) -> Quaternion<f64> {
    Quaternion::new(
        round_to(q.w, n_prec),
        round_to(q.i, n_prec),
        round_to(q.j, n_prec),
        round_to(q.k, n_prec),
    )
}

/// True if every component is within [`NEAR_ZERO`] of zero.
#[inline]
pub fn near_zero(v: &Vector3<f64>) -> bool {
    v.iter().all(|c| c.abs() <= NEAR_ZERO)
}

/// Rotates `v` by the (normalized) quaternion `q`: `q · v · q*`.
#[inline]
pub fn rotate(q: &Quaternion<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    UnitQuaternion::from_quaternion(*q) * v
}

/// Hamilton product of two quaternions, renormalized.
#[inline]
pub fn compose(lhs: &Quaternion<f64>, rhs: &Quaternion<f64>) -> Quaternion<f64> {
    (UnitQuaternion::from_quaternion(*lhs) * UnitQuaternion::from_quaternion(*rhs)).into_inner()
}

/// Quaternion conjugate.
#[inline]
pub fn conjugate(q: &Quaternion<f64>) -> Quaternion<f64> {
    q.conjugate()
}

/// Wraps `angle` into `[lower, lower + span)`.
#[inline]
pub fn wrap_to<T: Float>(angle: T, lower: T, span: T) -> T {
    let shifted = (angle - lower) % span;
    let shifted = if shifted < T::zero() { shifted + span } else { shifted };
    shifted + lower
}

/// Wraps an angle into `[-π, π)`.
#[inline]
pub fn wrap_pi<T: Float + FloatConst>(angle: T) -> T {
    wrap_to(angle, -T::PI(), T::TAU())
}

/// Convention for wrapping spherical angles on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleWrapping {
    /// Azimuth in `[-π, π)`, elevation in `[-π/2, π/2]`.
    #[default]
    Symmetric,
    /// Azimuth in `[0, 2π)`, elevation in `[-π/2, π/2]`.
    Positive,
}

impl AngleWrapping {
    /// Wraps an azimuth angle.
    #[inline]
    pub fn azimuth<T: Float + FloatConst>(self, az: T) -> T {
        match self {
            AngleWrapping::Symmetric => wrap_pi(az),
            AngleWrapping::Positive => wrap_to(az, T::zero(), T::TAU()),
        }
    }

    /// Wraps an elevation angle. Both poles are kept as given.
    #[inline]
    pub fn elevation<T: Float + FloatConst>(self, el: T) -> T {
        if el.abs() <= T::FRAC_PI_2() {
            el
        } else {
            wrap_to(el, -T::FRAC_PI_2(), T::PI())
        }
    }
}
