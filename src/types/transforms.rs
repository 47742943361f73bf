//! Typed transformation matrices
//!
//! Matrices that map vectors between spaces, with the source and target
//! spaces carried in the type.

use ::core::marker::PhantomData;
use nalgebra::SMatrix;

use super::spaces::{
    InnovationCovariance, InnovationSpace, Innovation, MeasurementCovariance, MeasurementSpace,
    Measurement, StateCovariance, StateSpace, StateVector,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A `ROWS × COLS` matrix mapping `From` vectors to `To` vectors.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<f64, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<const ROWS: usize, const COLS: usize, To: Clone, From: Clone> Copy
    for Transform<ROWS, COLS, To, From>
{
}

impl<const ROWS: usize, const COLS: usize, To, From> Transform<ROWS, COLS, To, From> {
    #[inline]
    pub fn from_matrix(inner: SMatrix<f64, ROWS, COLS>) -> Self {
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
    pub fn as_matrix(&self) -> &SMatrix<f64, ROWS, COLS> {
        &self.inner
    }

    #[inline]
    pub fn into_matrix(self) -> SMatrix<f64, ROWS, COLS> {
        self.inner
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|c| c.is_finite())
    }
}

/// State transition `F`: state -> state.
pub type TransitionMatrix<const N: usize> = Transform<N, N, StateSpace, StateSpace>;

/// Observation Jacobian `H`: state -> measurement.
pub type ObservationMatrix<const M: usize, const N: usize> =
    Transform<M, N, MeasurementSpace, StateSpace>;

/// Kalman gain `K`: innovation -> state.
pub type KalmanGain<const N: usize, const M: usize> = Transform<N, M, StateSpace, InnovationSpace>;

impl<const N: usize> TransitionMatrix<N> {
    #[inline]
    pub fn identity() -> Self {
        Self::from_matrix(SMatrix::identity())
    }

    #[inline]
    pub fn apply_state(&self, state: &StateVector<N>) -> StateVector<N> {
        StateVector::from_svector(self.inner * state.as_svector())
    }

    /// `F·P·Fᵗ`
    #[inline]
    pub fn propagate_covariance(&self, cov: &StateCovariance<N>) -> StateCovariance<N> {
        StateCovariance::from_matrix(self.inner * cov.as_matrix() * self.inner.transpose())
    }
}

impl<const M: usize, const N: usize> ObservationMatrix<M, N> {
    /// Linear observation `H·x`.
    #[inline]
    pub fn observe(&self, state: &StateVector<N>) -> Measurement<M> {
        Measurement::from_svector(self.inner * state.as_svector())
    }

    /// `H·P·Hᵗ`
    #[inline]
    pub fn project_covariance(&self, cov: &StateCovariance<N>) -> SMatrix<f64, M, M> {
        self.inner * cov.as_matrix() * self.inner.transpose()
    }
}

impl<const N: usize, const M: usize> KalmanGain<N, M> {
    #[inline]
    pub fn correct(&self, innovation: &Innovation<M>) -> StateVector<N> {
        StateVector::from_svector(self.inner * innovation.as_svector())
    }
}

// ============================================================================
// Kalman Update Helpers
// ============================================================================

/// `S = H·P·Hᵗ + R`
pub fn compute_innovation_covariance<const N: usize, const M: usize>(
    state_cov: &StateCovariance<N>,
    obs_matrix: &ObservationMatrix<M, N>,
    meas_noise: &MeasurementCovariance<M>,
) -> InnovationCovariance<M> {
    InnovationCovariance::from_matrix(obs_matrix.project_covariance(state_cov) + meas_noise.as_matrix())
}

/// `K = P·Hᵗ·S⁻¹`, or `None` when `S` is singular.
pub fn compute_kalman_gain<const N: usize, const M: usize>(
    state_cov: &StateCovariance<N>,
    obs_matrix: &ObservationMatrix<M, N>,
    innovation_cov: &InnovationCovariance<M>,
) -> Option<KalmanGain<N, M>> {
    let s_inv = innovation_cov.try_inverse()?;
    Some(KalmanGain::from_matrix(
        state_cov.as_matrix() * obs_matrix.as_matrix().transpose() * s_inv,
    ))
}

/// `P = (I - K·H)·P`
pub fn simple_covariance_update<const N: usize, const M: usize>(
    state_cov: &StateCovariance<N>,
    kalman_gain: &KalmanGain<N, M>,
    obs_matrix: &ObservationMatrix<M, N>,
) -> StateCovariance<N> {
    let i_kh = SMatrix::<f64, N, N>::identity() - kalman_gain.as_matrix() * obs_matrix.as_matrix();
    StateCovariance::from_matrix(i_kh * state_cov.as_matrix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transition_matrix() {
        let dt = 1.0_f64;
        let f = TransitionMatrix::<4>::from_matrix(nalgebra::matrix![
            1.0, 0.0, dt, 0.0;
            0.0, 1.0, 0.0, dt;
            0.0, 0.0, 1.0, 0.0;
            0.0, 0.0, 0.0, 1.0
        ]);

        let predicted = f.apply_state(&StateVector::from_array([0.0, 0.0, 1.0, 2.0]));
        assert_relative_eq!(predicted[0], 1.0);
        assert_relative_eq!(predicted[1], 2.0);
    }

    #[test]
    fn test_scalar_update_halves_variance() {
        let p = StateCovariance::<1>::from_std_devs(&[1.0]);
        let h = ObservationMatrix::<1, 1>::from_matrix(nalgebra::matrix![1.0]);
        let r = MeasurementCovariance::<1>::from_std_devs(&[1.0]);

        let s = compute_innovation_covariance(&p, &h, &r);
        assert_relative_eq!(s[(0, 0)], 2.0);
        let k = compute_kalman_gain(&p, &h, &s).unwrap();
        assert_relative_eq!(k.as_matrix()[(0, 0)], 0.5);
        let updated = simple_covariance_update(&p, &k, &h);
        assert_relative_eq!(updated[(0, 0)], 0.5);

        let correction = k.correct(&Innovation::from_array([4.0]));
        assert_relative_eq!(correction[0], 2.0);
    }

    #[test]
    fn test_singular_innovation_has_no_gain() {
        let p = StateCovariance::<2>::zeros();
        let h = ObservationMatrix::<2, 2>::from_matrix(nalgebra::Matrix2::identity());
        let r = MeasurementCovariance::<2>::zeros();
        let s = compute_innovation_covariance(&p, &h, &r);
        assert!(compute_kalman_gain(&p, &h, &s).is_none());
    }
}
