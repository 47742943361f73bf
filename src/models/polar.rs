//! Polar (radar-like) measurements
//!
//! Sensors report range and bearing angles, optionally with range rate,
//! while the track state stays Cartesian in the sensor frame. The observation
//! is non-linear, so `H` is the analytic Jacobian at the current estimate.

use nalgebra::{SVector, Vector3};

use super::cartesian::{INIT_POSITION_SIGMA, INIT_VELOCITY_SIGMA, KINEMATIC_PROCESS_NOISE};
use super::{
    assert_process_noise, constant_velocity_matrix, constant_velocity_step, scaled_process_noise,
    StateLayout, TrackKind, TrackModel,
};
use crate::geometry::numeric::wrap_pi;
use crate::geometry::vector::{cartesian_to_spherical, razelrrt_to_cartesian, spherical_to_cartesian};
use crate::types::spaces::{Innovation, Measurement, StateCovariance, StateVector};
use crate::types::transforms::{ObservationMatrix, TransitionMatrix};
use crate::{Error, Result};

/// Velocity standard deviation floor for range-rate initialization.
pub const MIN_RANGE_RATE_VELOCITY_SIGMA: f64 = 10.0;

const MIN_RANGE: f64 = 1e-9;

fn spatial_layout() -> StateLayout {
    StateLayout {
        position: 0..3,
        velocity: 3..6,
        size: None,
    }
}

fn wrap_angles<const M: usize>(mut y: Innovation<M>, angles: &[usize]) -> Innovation<M> {
    for &i in angles {
        y[i] = wrap_pi(y[i]);
    }
    y
}

/// Rows of `∂(r, az, el)/∂(x, y, z)`.
fn razel_jacobian(p: &Vector3<f64>) -> Result<[[f64; 3]; 3]> {
    let rho2 = p[0] * p[0] + p[1] * p[1];
    let rho = rho2.sqrt();
    let r2 = rho2 + p[2] * p[2];
    let r = r2.sqrt();
    if r < MIN_RANGE || rho < MIN_RANGE {
        return Err(Error::UndefinedJacobian);
    }
    Ok([
        [p[0] / r, p[1] / r, p[2] / r],
        [-p[1] / rho2, p[0] / rho2, 0.0],
        [-p[0] * p[2] / (r2 * rho), -p[1] * p[2] / (r2 * rho), rho / r2],
    ])
}

// ============================================================================
// Range-Azimuth
// ============================================================================

/// Planar range/azimuth sensor.
///
/// State: `[x, y, vx, vy]`, measurement: `[r, az]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeAzimuth {
    pub process_noise: SVector<f64, 4>,
}

impl Default for RangeAzimuth {
    fn default() -> Self {
        Self {
            process_noise: SVector::repeat(KINEMATIC_PROCESS_NOISE),
        }
    }
}

impl RangeAzimuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    /// Panics if any entry is negative or not finite.
    pub fn with_process_noise(diag: [f64; 4]) -> Self {
        let process_noise = SVector::from(diag);
        assert_process_noise(&process_noise);
        Self { process_noise }
    }
}

impl TrackModel<4, 2> for RangeAzimuth {
    type Detection = [f64; 2];
    type Attributes = ();

    const KIND: TrackKind = TrackKind::XyFromRaz;

    fn layout(&self) -> StateLayout {
        StateLayout {
            position: 0..2,
            velocity: 2..4,
            size: None,
        }
    }

    fn propagate(&self, x: &StateVector<4>, dt: f64) -> StateVector<4> {
        constant_velocity_step(&self.layout(), x, dt)
    }

    fn transition_jacobian(&self, dt: f64) -> TransitionMatrix<4> {
        constant_velocity_matrix(&self.layout(), dt)
    }

    fn process_noise(&self, dt: f64) -> StateCovariance<4> {
        scaled_process_noise(&self.process_noise, dt)
    }

    fn observe(&self, x: &StateVector<4>) -> Measurement<2> {
        Measurement::from_array([x[0].hypot(x[1]), x[1].atan2(x[0])])
    }

    fn observation_jacobian(&self, x: &StateVector<4>) -> Result<ObservationMatrix<2, 4>> {
        let r2 = x[0] * x[0] + x[1] * x[1];
        let r = r2.sqrt();
        if r < MIN_RANGE {
            return Err(Error::UndefinedJacobian);
        }
        Ok(ObservationMatrix::from_matrix(nalgebra::matrix![
            x[0] / r, x[1] / r, 0.0, 0.0;
            -x[1] / r2, x[0] / r2, 0.0, 0.0
        ]))
    }

    fn residual(&self, z: &Measurement<2>, predicted: &Measurement<2>) -> Innovation<2> {
        wrap_angles(z.innovation(predicted), &[1])
    }

    fn initialize(&self, detection: &[f64; 2]) -> (StateVector<4>, StateCovariance<4>, ()) {
        let (r, az) = (detection[0], detection[1]);
        let x = StateVector::from_array([r * az.cos(), r * az.sin(), 0.0, 0.0]);
        let p = StateCovariance::from_std_devs(&[
            INIT_POSITION_SIGMA,
            INIT_POSITION_SIGMA,
            INIT_VELOCITY_SIGMA,
            INIT_VELOCITY_SIGMA,
        ]);
        (x, p, ())
    }

    fn measure(&self, detection: &[f64; 2], _attributes: &()) -> Result<Measurement<2>> {
        Ok(Measurement::from_array(*detection))
    }
}

// ============================================================================
// Range-Azimuth-Elevation
// ============================================================================

/// 3D range/azimuth/elevation sensor.
///
/// State: `[x, y, z, vx, vy, vz]`, measurement: `[r, az, el]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeAzimuthElevation {
    pub process_noise: SVector<f64, 6>,
}

impl Default for RangeAzimuthElevation {
    fn default() -> Self {
        Self {
            process_noise: SVector::repeat(KINEMATIC_PROCESS_NOISE),
        }
    }
}

impl RangeAzimuthElevation {
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

impl TrackModel<6, 3> for RangeAzimuthElevation {
    type Detection = [f64; 3];
    type Attributes = ();

    const KIND: TrackKind = TrackKind::XyzFromRazel;

    fn layout(&self) -> StateLayout {
        spatial_layout()
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

    fn observe(&self, x: &StateVector<6>) -> Measurement<3> {
        let razel = cartesian_to_spherical(&Vector3::new(x[0], x[1], x[2]));
        Measurement::from_svector(razel)
    }

    fn observation_jacobian(&self, x: &StateVector<6>) -> Result<ObservationMatrix<3, 6>> {
        let j = razel_jacobian(&Vector3::new(x[0], x[1], x[2]))?;
        let mut h = nalgebra::SMatrix::<f64, 3, 6>::zeros();
        for (row, values) in j.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                h[(row, col)] = *value;
            }
        }
        Ok(ObservationMatrix::from_matrix(h))
    }

    fn residual(&self, z: &Measurement<3>, predicted: &Measurement<3>) -> Innovation<3> {
        wrap_angles(z.innovation(predicted), &[1, 2])
    }

    fn initialize(&self, detection: &[f64; 3]) -> (StateVector<6>, StateCovariance<6>, ()) {
        let p = spherical_to_cartesian(&Vector3::from(*detection));
        let x = StateVector::from_array([p[0], p[1], p[2], 0.0, 0.0, 0.0]);
        let cov = StateCovariance::from_std_devs(&[
            INIT_POSITION_SIGMA,
            INIT_POSITION_SIGMA,
            INIT_POSITION_SIGMA,
            INIT_VELOCITY_SIGMA,
            INIT_VELOCITY_SIGMA,
            INIT_VELOCITY_SIGMA,
        ]);
        (x, cov, ())
    }

    fn measure(&self, detection: &[f64; 3], _attributes: &()) -> Result<Measurement<3>> {
        Ok(Measurement::from_array(*detection))
    }
}

// ============================================================================
// Range-Azimuth-Elevation + Range Rate
// ============================================================================

/// Range/azimuth/elevation sensor that also reports range rate.
///
/// State: `[x, y, z, vx, vy, vz]`. The fourth measurement component is the
/// pseudo-measurement `range · range_rate = position · velocity`, which keeps
/// the observation polynomial in the state. Range rate is positive when the
/// target moves away from the sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeAzimuthElevationRate {
    pub process_noise: SVector<f64, 6>,
}

impl Default for RangeAzimuthElevationRate {
    fn default() -> Self {
        Self {
            process_noise: SVector::repeat(KINEMATIC_PROCESS_NOISE),
        }
    }
}

impl RangeAzimuthElevationRate {
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

impl TrackModel<6, 4> for RangeAzimuthElevationRate {
    type Detection = [f64; 4];
    type Attributes = ();

    const KIND: TrackKind = TrackKind::XyzFromRazelRrt;

    fn layout(&self) -> StateLayout {
        spatial_layout()
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
        let p = Vector3::new(x[0], x[1], x[2]);
        let v = Vector3::new(x[3], x[4], x[5]);
        let razel = cartesian_to_spherical(&p);
        Measurement::from_array([razel[0], razel[1], razel[2], p.dot(&v)])
    }

    fn observation_jacobian(&self, x: &StateVector<6>) -> Result<ObservationMatrix<4, 6>> {
        let j = razel_jacobian(&Vector3::new(x[0], x[1], x[2]))?;
        let mut h = nalgebra::SMatrix::<f64, 4, 6>::zeros();
        for (row, values) in j.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                h[(row, col)] = *value;
            }
        }
        // ∂(p·v)/∂p = v, ∂(p·v)/∂v = p
        for i in 0..3 {
            h[(3, i)] = x[3 + i];
            h[(3, 3 + i)] = x[i];
        }
        Ok(ObservationMatrix::from_matrix(h))
    }

    fn residual(&self, z: &Measurement<4>, predicted: &Measurement<4>) -> Innovation<4> {
        wrap_angles(z.innovation(predicted), &[1, 2])
    }

    fn initialize(&self, detection: &[f64; 4]) -> (StateVector<6>, StateCovariance<6>, ()) {
        let (p, v) = razelrrt_to_cartesian(detection);
        let x = StateVector::from_array([p[0], p[1], p[2], v[0], v[1], v[2]]);
        let los = p.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
        let vel_sigma = |u: f64| (INIT_VELOCITY_SIGMA * (1.0 - u)).max(MIN_RANGE_RATE_VELOCITY_SIGMA);
        let cov = StateCovariance::from_std_devs(&[
            INIT_POSITION_SIGMA,
            INIT_POSITION_SIGMA,
            INIT_POSITION_SIGMA,
            vel_sigma(los[0]),
            vel_sigma(los[1]),
            vel_sigma(los[2]),
        ]);
        (x, cov, ())
    }

    fn measure(&self, detection: &[f64; 4], _attributes: &()) -> Result<Measurement<4>> {
        Ok(Measurement::from_array([
            detection[0],
            detection[1],
            detection[2],
            detection[0] * detection[3],
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::PI;

    fn numeric_jacobian<Mdl, const N: usize, const M: usize>(
        model: &Mdl,
        x: &StateVector<N>,
    ) -> nalgebra::SMatrix<f64, M, N>
    where
        Mdl: TrackModel<N, M>,
    {
        let eps = 1e-6;
        let mut j = nalgebra::SMatrix::<f64, M, N>::zeros();
        for col in 0..N {
            let mut plus = *x;
            let mut minus = *x;
            plus[col] += eps;
            minus[col] -= eps;
            let d = (model.observe(&plus).into_svector() - model.observe(&minus).into_svector()) / (2.0 * eps);
            j.set_column(col, &d);
        }
        j
    }

    #[test]
    fn test_raz_jacobian_matches_numeric() {
        let model = RangeAzimuth::new();
        let x = StateVector::from_array([8.0, 6.0, 1.0, -1.0]);
        let analytic = model.observation_jacobian(&x).unwrap().into_matrix();
        assert_relative_eq!(analytic, numeric_jacobian::<_, 4, 2>(&model, &x), epsilon = 1e-6);
    }

    #[test]
    fn test_razel_jacobian_matches_numeric() {
        let model = RangeAzimuthElevation::new();
        let x = StateVector::from_array([8.0, -6.0, 2.0, 1.0, 0.0, 0.0]);
        let analytic = model.observation_jacobian(&x).unwrap().into_matrix();
        assert_relative_eq!(analytic, numeric_jacobian::<_, 6, 3>(&model, &x), epsilon = 1e-6);
    }

    #[test]
    fn test_razelrrt_jacobian_matches_numeric() {
        let model = RangeAzimuthElevationRate::new();
        let x = StateVector::from_array([8.0, 3.0, -1.0, -2.0, 0.5, 0.1]);
        let analytic = model.observation_jacobian(&x).unwrap().into_matrix();
        assert_relative_eq!(analytic, numeric_jacobian::<_, 6, 4>(&model, &x), epsilon = 1e-5);
    }

    #[test]
    fn test_jacobian_undefined_at_origin() {
        let model = RangeAzimuth::new();
        let x = StateVector::from_array([0.0, 0.0, 1.0, 0.0]);
        assert!(matches!(model.observation_jacobian(&x), Err(Error::UndefinedJacobian)));
    }

    #[test]
    fn test_azimuth_residual_wraps() {
        let model = RangeAzimuth::new();
        let z = Measurement::from_array([10.0, PI - 0.05]);
        let predicted = Measurement::from_array([10.0, -PI + 0.05]);
        assert_relative_eq!(model.residual(&z, &predicted)[1], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_range_rate_initialization() {
        let model = RangeAzimuthElevationRate::new();
        let (x, p, ()) = model.initialize(&[20.0, 0.0, 0.0, -3.0]);
        assert_relative_eq!(x[0], 20.0, epsilon = 1e-12);
        assert_relative_eq!(x[3], -3.0, epsilon = 1e-12);
        // along the line of sight the velocity is known best
        assert_relative_eq!(p[(3, 3)], 100.0, epsilon = 1e-12);
        assert_relative_eq!(p[(4, 4)], 900.0, epsilon = 1e-12);

        let z = model.measure(&[20.0, 0.0, 0.0, -3.0], &()).unwrap();
        assert_relative_eq!(z[3], model.observe(&x)[3], epsilon = 1e-9);
    }

    #[test]
    fn test_range_rate_initialization_uses_signed_line_of_sight() {
        let model = RangeAzimuthElevationRate::new();
        let (_, p, ()) = model.initialize(&[20.0, PI, 0.0, -3.0]);
        // the line of sight points along -x, so that axis gets the widest sigma
        assert_relative_eq!(p[(3, 3)], 3600.0, epsilon = 1e-9);
        assert_relative_eq!(p[(4, 4)], 900.0, epsilon = 1e-9);
    }
}
