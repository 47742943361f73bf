//! Reference frames and the values expressed in them

pub mod boxes;
pub mod differential;
pub mod frame;
pub mod numeric;
pub mod rotation;
pub mod vector;

pub use boxes::{Box2D, Box3D, BoxAnchor};
pub use differential::{allclose, common_ancestor, differential, integrate, AncestorMatch, RelativeFrame};
pub use frame::{FrameId, FramePose, FrameTree};
pub use numeric::AngleWrapping;
pub use rotation::Rotation;
pub use vector::{Spherical, Vector, VectorKind};
