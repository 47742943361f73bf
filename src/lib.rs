//! avtrack: reference frames and Kalman track lifecycles for perception stacks
//!
//! Sensors report measurements in their own, often moving, coordinate frames.
//! This crate keeps those frames in a rooted tree, reprojects values between
//! them, and maintains scored Kalman tracks over the measurements.
//!
//! # Features
//!
//! - **Frame algebra**: cached integration and differentials over an arena of frames
//! - **Type Safety**: state, measurement and innovation spaces cannot be mixed
//! - **Track models**: Cartesian, polar, range-rate and box measurement models
//! - **Lifecycle scoring**: sequential log-likelihood-ratio confirm/delete logic
//! - **Codec**: JSON and flat-text encodings of frames, values and tracks

pub mod codec;
pub mod geometry;
pub mod models;
pub mod tracking;
pub mod types;

pub mod prelude {
    pub use crate::geometry::*;
    pub use crate::models::*;
    pub use crate::tracking::*;
    pub use crate::types::ids::*;
    pub use crate::types::spaces::*;
    pub use crate::types::transforms::*;
    pub use crate::{Error, Result};
}

use crate::geometry::FrameId;
use crate::types::ids::TrackId;

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Handle does not belong to the tree it was used with
    #[error("unknown frame {0}")]
    UnknownFrame(FrameId),
    /// A non-origin frame was described without a parent
    #[error("only the global origin may be built without a parent")]
    MissingParent,
    #[error("frame is not right-handed")]
    NotRightHanded,
    #[error("global origin must have zero pose")]
    NonZeroOrigin,
    #[error("global origin cannot be modified")]
    ImmutableOrigin,
    #[error("{ancestor} is not an ancestor of {frame}")]
    NotAnAncestor { frame: FrameId, ancestor: FrameId },
    #[error("no common ancestor between {0} and {1}")]
    NoCommonAncestor(FrameId, FrameId),
    /// Measurement conventions disagree with the track's
    #[error("convention mismatch: track uses {expected}, measurement uses {found}")]
    ConventionMismatch { expected: String, found: String },
    #[error("detection frame {detection} differs from track frame {track}")]
    FrameMismatch { track: FrameId, detection: FrameId },
    /// Innovation covariance could not be inverted
    #[error("innovation covariance is singular")]
    SingularInnovation,
    #[error("observation jacobian is undefined at the current state")]
    UndefinedJacobian,
    #[error("unknown track {0}")]
    UnknownTrack(TrackId),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = ::core::result::Result<T, Error>;
