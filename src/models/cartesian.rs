//! Cartesian position measurements
//!
//! The sensor reports the target position directly, so `h` and `H` are
//! linear selections of the position block.

use nalgebra::SVector;

use super::{
    assert_process_noise, constant_velocity_matrix, constant_velocity_step, scaled_process_noise,
    selection_matrix, StateLayout, TrackKind, TrackModel,
};
use crate::types::spaces::{Measurement, StateCovariance, StateVector};
use crate::types::transforms::{ObservationMatrix, TransitionMatrix};
use crate::Result;

/// Initial position standard deviation for centroid tracks.
pub const INIT_POSITION_SIGMA: f64 = 5.0;

/// Initial velocity standard deviation for centroid tracks.
pub const INIT_VELOCITY_SIGMA: f64 = 30.0;

/// Default per-entry process noise for kinematic states.
pub const KINEMATIC_PROCESS_NOISE: f64 = 2.0;

// ============================================================================
// XY
// ============================================================================

/// Planar position sensor.
///
/// State: `[x, y, vx, vy]`, measurement: `[x, y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianXy {
    pub process_noise: SVector<f64, 4>,
}

impl Default for CartesianXy {
    fn default() -> Self {
        Self {
            process_noise: SVector::repeat(KINEMATIC_PROCESS_NOISE),
        }
    }
}

impl CartesianXy {
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

impl TrackModel<4, 2> for CartesianXy {
    type Detection = [f64; 2];
    type Attributes = ();

    const KIND: TrackKind = TrackKind::XyFromXy;

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
        Measurement::from_array([x[0], x[1]])
    }

    fn observation_jacobian(&self, _x: &StateVector<4>) -> Result<ObservationMatrix<2, 4>> {
        Ok(selection_matrix([0, 1]))
    }

    fn initialize(&self, detection: &[f64; 2]) -> (StateVector<4>, StateCovariance<4>, ()) {
        let x = StateVector::from_array([detection[0], detection[1], 0.0, 0.0]);
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
// XYZ
// ============================================================================

/// 3D position sensor (e.g. lidar centroids).
///
/// State: `[x, y, z, vx, vy, vz]`, measurement: `[x, y, z]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianXyz {
    pub process_noise: SVector<f64, 6>,
}

impl Default for CartesianXyz {
    fn default() -> Self {
        Self {
            process_noise: SVector::repeat(KINEMATIC_PROCESS_NOISE),
        }
    }
}

impl CartesianXyz {
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

impl TrackModel<6, 3> for CartesianXyz {
    type Detection = [f64; 3];
    type Attributes = ();

    const KIND: TrackKind = TrackKind::XyzFromXyz;

    fn layout(&self) -> StateLayout {
        StateLayout {
            position: 0..3,
            velocity: 3..6,
            size: None,
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

    fn observe(&self, x: &StateVector<6>) -> Measurement<3> {
        Measurement::from_array([x[0], x[1], x[2]])
    }

    fn observation_jacobian(&self, _x: &StateVector<6>) -> Result<ObservationMatrix<3, 6>> {
        Ok(selection_matrix([0, 1, 2]))
    }

    fn initialize(&self, detection: &[f64; 3]) -> (StateVector<6>, StateCovariance<6>, ()) {
        let x = StateVector::from_array([detection[0], detection[1], detection[2], 0.0, 0.0, 0.0]);
        let p = StateCovariance::from_std_devs(&[
            INIT_POSITION_SIGMA,
            INIT_POSITION_SIGMA,
            INIT_POSITION_SIGMA,
            INIT_VELOCITY_SIGMA,
            INIT_VELOCITY_SIGMA,
            INIT_VELOCITY_SIGMA,
        ]);
        (x, p, ())
    }

    fn measure(&self, detection: &[f64; 3], _attributes: &()) -> Result<Measurement<3>> {
        Ok(Measurement::from_array(*detection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_xy_observation_is_linear() {
        let model = CartesianXy::new();
        let x = StateVector::from_array([3.0, -4.0, 1.0, 1.0]);
        let h = model.observation_jacobian(&x).unwrap();
        assert_relative_eq!(h.observe(&x).into_svector(), model.observe(&x).into_svector());
    }

    #[test]
    fn test_xyz_initialization() {
        let (x, p, ()) = CartesianXyz::new().initialize(&[1.0, 2.0, 3.0]);
        assert_eq!(x.as_slice(), &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(p[(0, 0)], 25.0);
        assert_relative_eq!(p[(5, 5)], 900.0);
    }

    #[test]
    #[should_panic(expected = "Process noise entries must be finite and non-negative")]
    fn test_negative_process_noise_panics() {
        CartesianXy::with_process_noise([1.0, -1.0, 1.0, 1.0]);
    }
}
