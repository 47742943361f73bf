//! Closed sum of track variants and composite group tracks

use core::ops::Deref;

use crate::geometry::frame::{FrameId, FrameTree};
use crate::geometry::vector::Vector;
use crate::models::TrackKind;
use crate::tracking::joint::JointBoxTrack;
use crate::tracking::track::{
    BoxTrack2D, BoxTrack3D, XyFromRazTrack, XyFromXyTrack, XyzFromRazelRrtTrack,
    XyzFromRazelTrack, XyzFromXyzTrack,
};
use crate::types::ids::TrackId;
use crate::Result;

/// Any track the crate knows how to hold and encode.
#[derive(Debug, Clone)]
pub enum AnyTrack {
    XyFromXy(XyFromXyTrack),
    XyzFromXyz(XyzFromXyzTrack),
    XyFromRaz(XyFromRazTrack),
    XyzFromRazel(XyzFromRazelTrack),
    XyzFromRazelRrt(XyzFromRazelRrtTrack),
    Box2D(BoxTrack2D),
    Box3D(BoxTrack3D),
    JointBox(JointBoxTrack),
    Group(GroupTrack),
}

macro_rules! dispatch {
    ($value:expr, $track:ident => $body:expr) => {
        match $value {
            AnyTrack::XyFromXy($track) => $body,
            AnyTrack::XyzFromXyz($track) => $body,
            AnyTrack::XyFromRaz($track) => $body,
            AnyTrack::XyzFromRazel($track) => $body,
            AnyTrack::XyzFromRazelRrt($track) => $body,
            AnyTrack::Box2D($track) => $body,
            AnyTrack::Box3D($track) => $body,
            AnyTrack::JointBox($track) => $body,
            AnyTrack::Group($track) => $body,
        }
    };
}

macro_rules! impl_from_track {
    ($($track:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$track> for AnyTrack {
                fn from(track: $track) -> Self {
                    AnyTrack::$variant(track)
                }
            }
        )*
    };
}

impl_from_track!(
    XyFromXyTrack => XyFromXy,
    XyzFromXyzTrack => XyzFromXyz,
    XyFromRazTrack => XyFromRaz,
    XyzFromRazelTrack => XyzFromRazel,
    XyzFromRazelRrtTrack => XyzFromRazelRrt,
    BoxTrack2D => Box2D,
    BoxTrack3D => Box3D,
    JointBoxTrack => JointBox,
    GroupTrack => Group,
);

impl AnyTrack {
    pub fn kind(&self) -> TrackKind {
        match self {
            AnyTrack::Group(_) => TrackKind::Group,
            other => dispatch!(other, t => t.kind()),
        }
    }

    pub fn id(&self) -> TrackId {
        dispatch!(self, t => t.id())
    }

    pub fn obj_type(&self) -> &str {
        dispatch!(self, t => t.obj_type())
    }

    pub fn frame(&self) -> FrameId {
        dispatch!(self, t => t.frame())
    }

    pub fn t(&self) -> f64 {
        dispatch!(self, t => t.t())
    }

    pub fn score(&self) -> f64 {
        dispatch!(self, t => t.score())
    }

    pub fn probability(&self) -> f64 {
        dispatch!(self, t => t.probability())
    }

    pub fn is_active(&self) -> bool {
        dispatch!(self, t => t.is_active())
    }

    pub fn is_confirmed(&self) -> bool {
        dispatch!(self, t => t.is_confirmed())
    }

    pub fn is_finite(&self) -> bool {
        dispatch!(self, t => t.is_finite())
    }

    pub fn position(&self) -> Vector {
        dispatch!(self, t => t.position())
    }

    pub fn velocity(&self) -> Vector {
        dispatch!(self, t => t.velocity())
    }

    pub fn predict(&mut self, time: f64) {
        dispatch!(self, t => t.predict(time))
    }

    pub fn missed(&mut self) {
        dispatch!(self, t => t.missed())
    }

    pub fn change_reference(&mut self, tree: &FrameTree, target: FrameId) -> Result<()> {
        dispatch!(self, t => t.change_reference(tree, target))
    }
}

// ============================================================================
// Group Track
// ============================================================================

/// A representative track plus the member tracks it summarizes.
///
/// Reads that are not specific to the group go to `state` through
/// [`Deref`].
#[derive(Debug, Clone)]
pub struct GroupTrack {
    pub state: Box<AnyTrack>,
    pub members: Vec<AnyTrack>,
}

impl GroupTrack {
    pub fn new(state: impl Into<AnyTrack>, members: Vec<AnyTrack>) -> Self {
        Self {
            state: Box::new(state.into()),
            members,
        }
    }

    pub fn members(&self) -> &[AnyTrack] {
        &self.members
    }

    pub fn predict(&mut self, t: f64) {
        self.state.predict(t);
        for member in &mut self.members {
            member.predict(t);
        }
    }

    /// Only the representative state accumulates misses.
    pub fn missed(&mut self) {
        self.state.missed();
    }

    /// Moves the state and every member into `target`.
    pub fn change_reference(&mut self, tree: &FrameTree, target: FrameId) -> Result<()> {
        self.state.change_reference(tree, target)?;
        for member in &mut self.members {
            member.change_reference(tree, target)?;
        }
        Ok(())
    }
}

impl Deref for GroupTrack {
    type Target = AnyTrack;

    fn deref(&self) -> &AnyTrack {
        &self.state
    }
}
