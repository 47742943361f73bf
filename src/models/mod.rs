//! Measurement models for Kalman tracks
//!
//! A [`TrackModel`] bundles the process model `f`/`F`/`Q`, the measurement
//! model `h`/`H` and the state layout of one kind of track. Every model here
//! is constant-velocity; they differ in what they measure.

use core::fmt;
use core::ops::Range;

use nalgebra::SVector;

use crate::geometry::RelativeFrame;
use crate::types::spaces::{Innovation, Measurement, StateCovariance, StateVector};
use crate::types::transforms::{ObservationMatrix, TransitionMatrix};
use crate::Result;

mod boxes;
mod cartesian;
mod polar;

pub use boxes::*;
pub use cartesian::*;
pub use polar::*;

// ============================================================================
// Track Kinds
// ============================================================================

/// Every encodable kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    XyFromXy,
    XyzFromXyz,
    XyFromRaz,
    XyzFromRazel,
    XyzFromRazelRrt,
    Box2D,
    Box3D,
    JointBox,
    Group,
}

impl TrackKind {
    pub const ALL: [TrackKind; 9] = [
        TrackKind::XyFromXy,
        TrackKind::XyzFromXyz,
        TrackKind::XyFromRaz,
        TrackKind::XyzFromRazel,
        TrackKind::XyzFromRazelRrt,
        TrackKind::Box2D,
        TrackKind::Box3D,
        TrackKind::JointBox,
        TrackKind::Group,
    ];

    /// Lowercase key used in the JSON encoding.
    pub fn key(self) -> &'static str {
        match self {
            TrackKind::XyFromXy => "xyfromxytrack",
            TrackKind::XyzFromXyz => "xyzfromxyztrack",
            TrackKind::XyFromRaz => "xyfromraztrack",
            TrackKind::XyzFromRazel => "xyzfromrazeltrack",
            TrackKind::XyzFromRazelRrt => "xyzfromrazelrrttrack",
            TrackKind::Box2D => "basicboxtrack2d",
            TrackKind::Box3D => "basicboxtrack3d",
            TrackKind::JointBox => "basicjointboxtrack",
            TrackKind::Group => "grouptrack",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ============================================================================
// State Layout
// ============================================================================

/// Where the kinematic blocks sit inside a state vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    pub position: Range<usize>,
    pub velocity: Range<usize>,
    /// Box extent, if the model carries one.
    pub size: Option<Range<usize>>,
}

impl StateLayout {
    /// Spatial dimension of the position block (2 or 3).
    #[inline]
    pub fn spatial_dim(&self) -> usize {
        self.position.len()
    }
}

// ============================================================================
// Track Model Trait
// ============================================================================

/// Process and measurement model of a track with an `N`-state and an
/// `M`-measurement.
pub trait TrackModel<const N: usize, const M: usize>: Clone + fmt::Debug {
    /// Payload a detector hands over for this model.
    type Detection: Clone + fmt::Debug;
    /// Extra per-track data carried next to the state vector.
    type Attributes: Clone + fmt::Debug + Default + PartialEq;

    const KIND: TrackKind;

    fn layout(&self) -> StateLayout;

    /// State propagation `f(x, dt)`.
    fn propagate(&self, x: &StateVector<N>, dt: f64) -> StateVector<N>;

    /// `F = ∂f/∂x`.
    fn transition_jacobian(&self, dt: f64) -> TransitionMatrix<N>;

    /// `Q(dt)`.
    fn process_noise(&self, dt: f64) -> StateCovariance<N>;

    /// Predicted measurement `h(x)`.
    fn observe(&self, x: &StateVector<N>) -> Measurement<M>;

    /// `H = ∂h/∂x`, evaluated at `x`.
    fn observation_jacobian(&self, x: &StateVector<N>) -> Result<ObservationMatrix<M, N>>;

    /// Innovation `z - h(x)`; angular components are wrapped by the
    /// models that have them.
    fn residual(&self, z: &Measurement<M>, predicted: &Measurement<M>) -> Innovation<M> {
        z.innovation(predicted)
    }

    /// Initial state, covariance and attributes from a detection.
    fn initialize(
        &self,
        detection: &Self::Detection,
    ) -> (StateVector<N>, StateCovariance<N>, Self::Attributes);

    /// Measurement vector of a detection, after checking that its
    /// conventions agree with the track's attributes.
    fn measure(
        &self,
        detection: &Self::Detection,
        attributes: &Self::Attributes,
    ) -> Result<Measurement<M>>;

    /// Copies non-filtered data from an accepted detection.
    fn absorb(&self, _detection: &Self::Detection, _attributes: &mut Self::Attributes) {}

    /// False for models whose state is not spatial (image-plane boxes):
    /// changing reference only relabels the frame.
    fn reprojects(&self) -> bool {
        true
    }

    /// Re-expresses attributes after the track moved by `diff`.
    fn reproject_attributes(
        &self,
        attributes: &Self::Attributes,
        _diff: &RelativeFrame,
    ) -> Self::Attributes {
        attributes.clone()
    }

    fn encode_attributes(&self, _attributes: &Self::Attributes) -> Option<serde_json::Value> {
        None
    }

    fn decode_attributes(&self, _value: Option<&serde_json::Value>) -> Result<Self::Attributes> {
        Ok(Self::Attributes::default())
    }
}

// ============================================================================
// Constant-Velocity Helpers
// ============================================================================

/// Identity with `dt` coupling each position entry to its velocity entry.
pub fn constant_velocity_matrix<const N: usize>(layout: &StateLayout, dt: f64) -> TransitionMatrix<N> {
    let mut f = nalgebra::SMatrix::<f64, N, N>::identity();
    for (p, v) in layout.position.clone().zip(layout.velocity.clone()) {
        f[(p, v)] = dt;
    }
    TransitionMatrix::from_matrix(f)
}

/// `x[p] += x[v]·dt` for every position/velocity pair.
pub fn constant_velocity_step<const N: usize>(
    layout: &StateLayout,
    x: &StateVector<N>,
    dt: f64,
) -> StateVector<N> {
    let mut next = *x;
    for (p, v) in layout.position.clone().zip(layout.velocity.clone()) {
        next[p] += x[v] * dt;
    }
    next
}

/// `(diag·dt)²` on the diagonal.
pub fn scaled_process_noise<const N: usize>(diag: &SVector<f64, N>, dt: f64) -> StateCovariance<N> {
    StateCovariance::from_diagonal(&diag.map(|q| (q * dt) * (q * dt)))
}

/// Linear observation picking `indices` out of the state.
pub fn selection_matrix<const M: usize, const N: usize>(indices: [usize; M]) -> ObservationMatrix<M, N> {
    let mut h = nalgebra::SMatrix::<f64, M, N>::zeros();
    for (row, col) in indices.into_iter().enumerate() {
        h[(row, col)] = 1.0;
    }
    ObservationMatrix::from_matrix(h)
}

pub(crate) fn assert_process_noise<const N: usize>(diag: &SVector<f64, N>) {
    assert!(
        diag.iter().all(|q| *q >= 0.0 && q.is_finite()),
        "Process noise entries must be finite and non-negative"
    );
}
