//! Image-plane and 3D bounding boxes

use core::fmt;

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::frame::{FrameId, FrameTree};
use super::rotation::Rotation;
use super::vector::Vector;
use crate::Result;

/// Axis-aligned image-plane box given by its corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box2D {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub frame: FrameId,
}

impl Box2D {
    pub fn new(corners: [f64; 4], frame: FrameId) -> Self {
        Self {
            xmin: corners[0],
            ymin: corners[1],
            xmax: corners[2],
            ymax: corners[3],
            frame,
        }
    }

    /// Builds a box from its center and size.
    pub fn from_center(center: [f64; 2], width: f64, height: f64, frame: FrameId) -> Self {
        Self::new(
            [
                center[0] - width / 2.0,
                center[1] - height / 2.0,
                center[0] + width / 2.0,
                center[1] + height / 2.0,
            ],
            frame,
        )
    }

    #[inline]
    pub fn corners(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    #[inline]
    pub fn center(&self) -> [f64; 2] {
        [(self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0]
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union with another box in the same image.
    pub fn iou(&self, other: &Box2D) -> f64 {
        let w = (self.xmax.min(other.xmax) - self.xmin.max(other.xmin)).max(0.0);
        let h = (self.ymax.min(other.ymax) - self.ymin.max(other.ymin)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    pub fn is_finite(&self) -> bool {
        self.corners().iter().all(|c| c.is_finite())
    }
}

/// Where a [`Box3D`] translation sits on the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxAnchor {
    #[default]
    Center,
    Bottom,
}

impl fmt::Display for BoxAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxAnchor::Center => write!(f, "center"),
            BoxAnchor::Bottom => write!(f, "bottom"),
        }
    }
}

/// Oriented 3D box: translation, `(h, w, l)` size and orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box3D {
    pub position: Vector3<f64>,
    /// `[h, w, l]`.
    pub size: [f64; 3],
    pub q: Quaternion<f64>,
    pub anchor: BoxAnchor,
    pub frame: FrameId,
}

impl Box3D {
    pub fn new(
        position: Vector3<f64>,
        size: [f64; 3],
        q: Quaternion<f64>,
        anchor: BoxAnchor,
        frame: FrameId,
    ) -> Self {
        Self {
            position,
            size,
            q,
            anchor,
            frame,
        }
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.size[0]
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.size[1]
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.size[2]
    }

    pub fn volume(&self) -> f64 {
        self.size.iter().product()
    }

    pub fn rotation(&self) -> Rotation {
        Rotation::new(self.q, self.frame)
    }

    /// Moves the translation to another anchor along the box's up axis.
    pub fn with_anchor(&self, anchor: BoxAnchor) -> Self {
        let half = self.rotation().up() * (self.height() / 2.0);
        let position = match (self.anchor, anchor) {
            (BoxAnchor::Center, BoxAnchor::Bottom) => self.position - half,
            (BoxAnchor::Bottom, BoxAnchor::Center) => self.position + half,
            _ => self.position,
        };
        Self {
            position,
            anchor,
            ..*self
        }
    }

    /// Reprojects translation and orientation into `target`.
    pub fn change_reference(&self, tree: &FrameTree, target: FrameId) -> Result<Self> {
        if self.frame == target {
            return Ok(*self);
        }
        let position = Vector::position(self.position, self.frame).change_reference(tree, target)?;
        let rotation = self.rotation().change_reference(tree, target)?;
        Ok(Self {
            position: position.x,
            q: rotation.q,
            frame: target,
            ..*self
        })
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
            && self.size.iter().all(|c| c.is_finite())
            && self.q.coords.iter().all(|c| c.is_finite())
    }
}
