//! Vector space markers and typed Kalman vectors
//!
//! State, measurement and innovation vectors share a representation but live
//! in different spaces; the marker parameter keeps them from being mixed.

use ::core::marker::PhantomData;
use ::core::ops::{Add, Index, IndexMut, Mul, Neg, Sub};
use nalgebra::{SMatrix, SVector};

// ============================================================================
// Vector Space Markers
// ============================================================================

/// Marker for track state vectors (position, velocity, box size...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpace;

/// Marker for sensor measurement vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpace;

/// Marker for innovation vectors (measurement - predicted measurement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnovationSpace;

// ============================================================================
// Typed Vector
// ============================================================================

/// An `N`-vector bound to a mathematical space.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanVector<const N: usize, Space> {
    inner: SVector<f64, N>,
    _marker: PhantomData<Space>,
}

impl<const N: usize, Space: Clone> Copy for KalmanVector<N, Space> {}

impl<const N: usize, Space> KalmanVector<N, Space> {
    #[inline]
    pub fn from_array(data: [f64; N]) -> Self {
        Self::from_svector(SVector::from(data))
    }

    #[inline]
    pub fn from_svector(inner: SVector<f64, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn zeros() -> Self {
        Self::from_svector(SVector::zeros())
    }

    #[inline]
    pub fn as_svector(&self) -> &SVector<f64, N> {
        &self.inner
    }

    #[inline]
    pub fn as_svector_mut(&mut self) -> &mut SVector<f64, N> {
        &mut self.inner
    }

    #[inline]
    pub fn into_svector(self) -> SVector<f64, N> {
        self.inner
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        self.inner.as_slice()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&f64> {
        self.inner.get(index)
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        self.inner.norm()
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|c| c.is_finite())
    }
}

impl<const N: usize, Space> Index<usize> for KalmanVector<N, Space> {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &f64 {
        &self.inner[index]
    }
}

impl<const N: usize, Space> IndexMut<usize> for KalmanVector<N, Space> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.inner[index]
    }
}

impl<const N: usize, Space> Add for KalmanVector<N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::from_svector(self.inner + rhs.inner)
    }
}

impl<const N: usize, Space> Sub for KalmanVector<N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::from_svector(self.inner - rhs.inner)
    }
}

impl<const N: usize, Space> Neg for KalmanVector<N, Space> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::from_svector(-self.inner)
    }
}

impl<const N: usize, Space> Mul<f64> for KalmanVector<N, Space> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::from_svector(self.inner * rhs)
    }
}

/// A track state vector.
pub type StateVector<const N: usize> = KalmanVector<N, StateSpace>;

/// A sensor measurement.
pub type Measurement<const M: usize> = KalmanVector<M, MeasurementSpace>;

/// A measurement residual.
pub type Innovation<const M: usize> = KalmanVector<M, InnovationSpace>;

impl<const M: usize> Measurement<M> {
    /// Raw residual `self - predicted`. Models with angular components wrap
    /// the result themselves.
    #[inline]
    pub fn innovation(&self, predicted: &Measurement<M>) -> Innovation<M> {
        Innovation::from_svector(self.inner - predicted.inner)
    }
}

// ============================================================================
// Covariance Matrix
// ============================================================================

/// A covariance matrix bound to a vector space.
///
/// Callers are responsible for keeping the matrix symmetric positive
/// semi-definite.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<const N: usize, Space> {
    inner: SMatrix<f64, N, N>,
    _marker: PhantomData<Space>,
}

impl<const N: usize, Space: Clone> Copy for Covariance<N, Space> {}

impl<const N: usize, Space> Covariance<N, Space> {
    #[inline]
    pub fn from_matrix(inner: SMatrix<f64, N, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn zeros() -> Self {
        Self::from_matrix(SMatrix::zeros())
    }

    #[inline]
    pub fn identity() -> Self {
        Self::from_matrix(SMatrix::identity())
    }

    #[inline]
    pub fn from_diagonal(diag: &SVector<f64, N>) -> Self {
        Self::from_matrix(SMatrix::from_diagonal(diag))
    }

    /// Diagonal covariance from per-component standard deviations.
    pub fn from_std_devs(sigmas: &[f64; N]) -> Self {
        Self::from_diagonal(&SVector::from_fn(|i, _| sigmas[i] * sigmas[i]))
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<f64, N, N> {
        &self.inner
    }

    #[inline]
    pub fn as_matrix_mut(&mut self) -> &mut SMatrix<f64, N, N> {
        &mut self.inner
    }

    #[inline]
    pub fn into_matrix(self) -> SMatrix<f64, N, N> {
        self.inner
    }

    #[inline]
    pub fn scale(&self, s: f64) -> Self {
        Self::from_matrix(self.inner.scale(s))
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        self.inner.trace()
    }

    /// Determinant through a Cholesky factor.
    ///
    /// Returns `None` if the matrix is not positive definite.
    pub fn determinant(&self) -> Option<f64> {
        let l = nalgebra::Cholesky::new(self.inner)?.l();
        let det_l: f64 = (0..N).map(|i| l[(i, i)]).product();
        Some(det_l * det_l)
    }

    #[inline]
    pub fn try_inverse(&self) -> Option<SMatrix<f64, N, N>> {
        self.inner.try_inverse()
    }

    /// `(P + Pᵗ) / 2`.
    pub fn symmetrized(&self) -> Self {
        Self::from_matrix((self.inner + self.inner.transpose()) * 0.5)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|c| c.is_finite())
    }
}

impl<const N: usize, Space> Index<(usize, usize)> for Covariance<N, Space> {
    type Output = f64;

    #[inline]
    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.inner[index]
    }
}

impl<const N: usize, Space> Add for Covariance<N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::from_matrix(self.inner + rhs.inner)
    }
}

/// Covariance of a track state.
pub type StateCovariance<const N: usize> = Covariance<N, StateSpace>;

/// Sensor noise covariance `R`.
pub type MeasurementCovariance<const M: usize> = Covariance<M, MeasurementSpace>;

/// Innovation covariance `S = H·P·Hᵗ + R`.
pub type InnovationCovariance<const M: usize> = Covariance<M, InnovationSpace>;

impl<const M: usize> InnovationCovariance<M> {
    /// Squared Mahalanobis distance `yᵗ·S⁻¹·y`, or `None` if `S` is singular.
    pub fn mahalanobis_squared(&self, innovation: &Innovation<M>) -> Option<f64> {
        let s_inv = self.try_inverse()?;
        let y = innovation.as_svector();
        Some((y.transpose() * s_inv * y)[(0, 0)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_state_vector_operations() {
        let v1: StateVector<4> = StateVector::from_array([1.0, 2.0, 3.0, 4.0]);
        let v2: StateVector<4> = StateVector::from_array([0.5, 1.0, 1.5, 2.0]);

        let sum = v1 + v2;
        assert_relative_eq!(sum[0], 1.5);
        assert_relative_eq!(sum[1], 3.0);
        assert_relative_eq!((sum * 2.0)[3], 12.0);
    }

    #[test]
    fn test_measurement_to_innovation() {
        let actual: Measurement<2> = Measurement::from_array([10.0, 20.0]);
        let predicted: Measurement<2> = Measurement::from_array([9.5, 19.0]);

        let innovation = actual.innovation(&predicted);
        assert_relative_eq!(innovation[0], 0.5);
        assert_relative_eq!(innovation[1], 1.0);
    }

    #[test]
    fn test_covariance_from_std_devs() {
        let cov: StateCovariance<3> = StateCovariance::from_std_devs(&[5.0, 5.0, 30.0]);
        assert_relative_eq!(cov[(2, 2)], 900.0);
        assert_relative_eq!(cov.trace(), 950.0);
        assert_relative_eq!(cov.determinant().unwrap(), 25.0 * 25.0 * 900.0, max_relative = 1e-12);
    }

    #[test]
    fn test_singular_covariance_determinant() {
        let singular: StateCovariance<2> =
            StateCovariance::from_matrix(nalgebra::matrix![1.0, 1.0; 1.0, 1.0]);
        assert!(singular.determinant().is_none());
    }

    #[test]
    fn test_mahalanobis() {
        let s: InnovationCovariance<2> = InnovationCovariance::from_std_devs(&[2.0, 1.0]);
        let y = Innovation::from_array([2.0, 1.0]);
        assert_relative_eq!(s.mahalanobis_squared(&y).unwrap(), 2.0, epsilon = 1e-12);
    }
}
