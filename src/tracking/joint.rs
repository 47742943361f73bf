//! One object tracked through both an image box and a 3D box
//!
//! The two parts filter independently and share the track ID. Reads that
//! need a single answer (frame, score, position) come from the 3D part when
//! there is one.

use crate::geometry::boxes::{Box2D, Box3D};
use crate::geometry::frame::{FrameId, FrameTree};
use crate::geometry::vector::Vector;
use crate::models::{Box2dModel, Box3dModel, TrackKind};
use crate::tracking::lifecycle::Lifecycle;
use crate::tracking::track::{BoxTrack2D, BoxTrack3D, Track};
use crate::tracking::tracker::Detection;
use crate::types::ids::TrackId;
use crate::types::spaces::MeasurementCovariance;
use crate::{Error, Result};

/// Boxes a detector reports for one object.
#[derive(Debug, Clone, PartialEq)]
pub enum JointBox {
    Image(Box2D),
    Solid(Box3D),
    Both(Box2D, Box3D),
}

impl JointBox {
    pub fn image(&self) -> Option<&Box2D> {
        match self {
            JointBox::Image(image) | JointBox::Both(image, _) => Some(image),
            JointBox::Solid(_) => None,
        }
    }

    pub fn solid(&self) -> Option<&Box3D> {
        match self {
            JointBox::Solid(solid) | JointBox::Both(_, solid) => Some(solid),
            JointBox::Image(_) => None,
        }
    }
}

/// Measurement noise of each part.
#[derive(Debug, Clone, PartialEq)]
pub struct JointNoise {
    pub image: MeasurementCovariance<4>,
    pub solid: MeasurementCovariance<6>,
}

/// Filter parts of a [`JointBoxTrack`]; there is always at least one.
#[derive(Debug, Clone)]
pub enum JointParts {
    Image(BoxTrack2D),
    Solid(BoxTrack3D),
    Both(BoxTrack2D, BoxTrack3D),
}

macro_rules! primary {
    ($parts:expr, $track:ident => $body:expr) => {
        match $parts {
            JointParts::Image($track) => $body,
            JointParts::Solid($track) | JointParts::Both(_, $track) => $body,
        }
    };
}

macro_rules! each_part {
    ($parts:expr, $track:ident => $body:expr) => {
        match $parts {
            JointParts::Image($track) => $body,
            JointParts::Solid($track) => $body,
            JointParts::Both(image, solid) => {
                let $track = image;
                $body;
                let $track = solid;
                $body
            }
        }
    };
}

/// A track carrying an image box, a 3D box, or both.
#[derive(Debug, Clone)]
pub struct JointBoxTrack {
    id: TrackId,
    obj_type: String,
    lifecycle: Lifecycle,
    parts: JointParts,
}

impl JointBoxTrack {
    /// Spawns a part for every box in `detection`, each in its box's frame.
    pub fn new(
        lifecycle: Lifecycle,
        id: TrackId,
        obj_type: impl Into<String>,
        t0: f64,
        detection: &JointBox,
    ) -> Self {
        let obj_type = obj_type.into();
        let image = |b: &Box2D| Track::new(Box2dModel::new(), lifecycle, id, obj_type.clone(), t0, b.frame, b);
        let solid = |b: &Box3D| Track::new(Box3dModel::new(), lifecycle, id, obj_type.clone(), t0, b.frame, b);
        let parts = match detection {
            JointBox::Image(b2) => JointParts::Image(image(b2)),
            JointBox::Solid(b3) => JointParts::Solid(solid(b3)),
            JointBox::Both(b2, b3) => JointParts::Both(image(b2), solid(b3)),
        };
        Self {
            id,
            obj_type,
            lifecycle,
            parts,
        }
    }

    /// Reassembles a joint track from decoded parts.
    ///
    /// Both parts must carry the same ID.
    pub fn from_parts(parts: JointParts) -> Result<Self> {
        let (id, obj_type, lifecycle) = match &parts {
            JointParts::Both(image, solid) if image.id() != solid.id() => {
                return Err(Error::Decode(format!(
                    "joint track parts disagree on ID: {} and {}",
                    image.id(),
                    solid.id()
                )));
            }
            parts => primary!(parts, t => (t.id(), t.obj_type().to_owned(), *t.lifecycle())),
        };
        Ok(Self {
            id,
            obj_type,
            lifecycle,
            parts,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[inline]
    pub fn kind(&self) -> TrackKind {
        TrackKind::JointBox
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn obj_type(&self) -> &str {
        &self.obj_type
    }

    #[inline]
    pub fn parts(&self) -> &JointParts {
        &self.parts
    }

    pub fn track_2d(&self) -> Option<&BoxTrack2D> {
        match &self.parts {
            JointParts::Image(image) | JointParts::Both(image, _) => Some(image),
            JointParts::Solid(_) => None,
        }
    }

    pub fn track_3d(&self) -> Option<&BoxTrack3D> {
        match &self.parts {
            JointParts::Solid(solid) | JointParts::Both(_, solid) => Some(solid),
            JointParts::Image(_) => None,
        }
    }

    pub fn box2d(&self) -> Option<Box2D> {
        self.track_2d().map(BoxTrack2D::box2d)
    }

    pub fn box3d(&self) -> Option<Box3D> {
        self.track_3d().map(BoxTrack3D::box3d)
    }

    /// Updates of the image part, zero without one.
    pub fn n_updates_2d(&self) -> u32 {
        self.track_2d().map_or(0, |t| t.n_updates())
    }

    pub fn n_updates_3d(&self) -> u32 {
        self.track_3d().map_or(0, |t| t.n_updates())
    }

    pub fn dt_coast_2d(&self) -> f64 {
        self.track_2d().map_or(0.0, |t| t.dt_coast())
    }

    pub fn dt_coast_3d(&self) -> f64 {
        self.track_3d().map_or(0.0, |t| t.dt_coast())
    }

    pub fn frame(&self) -> FrameId {
        primary!(&self.parts, t => t.frame())
    }

    pub fn t(&self) -> f64 {
        primary!(&self.parts, t => t.t())
    }

    pub fn score(&self) -> f64 {
        primary!(&self.parts, t => t.score())
    }

    pub fn probability(&self) -> f64 {
        primary!(&self.parts, t => t.probability())
    }

    pub fn is_active(&self) -> bool {
        primary!(&self.parts, t => t.is_active())
    }

    pub fn is_confirmed(&self) -> bool {
        primary!(&self.parts, t => t.is_confirmed())
    }

    pub fn is_finite(&self) -> bool {
        let mut finite = true;
        each_part!(&self.parts, t => finite &= t.is_finite());
        finite
    }

    pub fn position(&self) -> Vector {
        primary!(&self.parts, t => t.position())
    }

    pub fn velocity(&self) -> Vector {
        primary!(&self.parts, t => t.velocity())
    }

    /// The 3D part as a detection; `None` for an image-only track.
    pub fn as_box_detection(&self) -> Option<Detection<Box3D>> {
        self.track_3d().map(BoxTrack3D::as_box_detection)
    }

    // ------------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------------

    pub fn predict(&mut self, t: f64) {
        each_part!(&mut self.parts, part => part.predict(t));
    }

    /// Both parts register the miss.
    pub fn missed(&mut self) {
        each_part!(&mut self.parts, part => part.missed());
    }

    /// Updates the parts `detection` has boxes for.
    ///
    /// A box for a part the track does not have yet spawns that part at the
    /// existing part's time. A part without a box is left coasting.
    pub fn update(&mut self, detection: &JointBox, noise: &JointNoise) -> Result<()> {
        if let Some(b2) = detection.image() {
            match &mut self.parts {
                JointParts::Image(image) | JointParts::Both(image, _) => {
                    image.update_detection(b2.frame, b2, &noise.image)?;
                }
                JointParts::Solid(solid) => {
                    let image = Track::new(
                        Box2dModel::new(),
                        self.lifecycle,
                        self.id,
                        self.obj_type.clone(),
                        solid.t(),
                        b2.frame,
                        b2,
                    );
                    log::debug!("joint track {} gained an image part", self.id);
                    self.parts = JointParts::Both(image, solid.clone());
                }
            }
        }
        if let Some(b3) = detection.solid() {
            match &mut self.parts {
                JointParts::Solid(solid) | JointParts::Both(_, solid) => {
                    solid.update_detection(b3.frame, b3, &noise.solid)?;
                }
                JointParts::Image(image) => {
                    let solid = Track::new(
                        Box3dModel::new(),
                        self.lifecycle,
                        self.id,
                        self.obj_type.clone(),
                        image.t(),
                        b3.frame,
                        b3,
                    );
                    log::debug!("joint track {} gained a 3D part", self.id);
                    self.parts = JointParts::Both(image.clone(), solid);
                }
            }
        }
        Ok(())
    }

    /// Moves every part into `target`.
    pub fn change_reference(&mut self, tree: &FrameTree, target: FrameId) -> Result<()> {
        each_part!(&mut self.parts, part => part.change_reference(tree, target)?);
        Ok(())
    }
}
