//! Tracks and group tracks
//!
//! A track is written under its kind key, e.g. `{"xyzfromrazeltrack": {...}}`,
//! with the state, covariance, counters and the encoded frame it lives in.
//! Group tracks nest their state and members as encoded strings.

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::codec::frame::{decode_frame, encode_frame};
use crate::codec::{unwrap, unwrap_as, wrap};
use crate::geometry::frame::FrameTree;
use crate::models::{
    Box2dModel, Box3dModel, CartesianXy, CartesianXyz, RangeAzimuth, RangeAzimuthElevation,
    RangeAzimuthElevationRate, TrackKind, TrackModel,
};
use crate::tracking::group::{AnyTrack, GroupTrack};
use crate::tracking::joint::{JointBoxTrack, JointParts};
use crate::tracking::lifecycle::Lifecycle;
use crate::tracking::track::{BoxTrack2D, BoxTrack3D, Track};
use crate::types::ids::TrackId;
use crate::types::spaces::{StateCovariance, StateVector};
use crate::{Error, Result};

/// Body of a single-model track encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub obj_type: String,
    pub t0: f64,
    pub t: f64,
    #[serde(rename = "ID")]
    pub id: u64,
    pub dt_coast: f64,
    pub n_updates: u32,
    #[serde(default)]
    pub n_missed: u32,
    /// Falls back to the lifecycle's initial score when absent.
    #[serde(default)]
    pub score: Option<f64>,
    pub x: Vec<f64>,
    #[serde(rename = "P")]
    pub p: Vec<Vec<f64>>,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JointRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    track_2d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    track_3d: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    state: String,
    members: Vec<String>,
}

impl TrackRecord {
    pub fn from_track<Mdl: TrackModel<N, M>, const N: usize, const M: usize>(
        tree: &FrameTree,
        track: &Track<Mdl, N, M>,
    ) -> Result<Self> {
        let p = track.p().as_matrix();
        Ok(Self {
            obj_type: track.obj_type().to_owned(),
            t0: track.t0(),
            t: track.t(),
            id: track.id().0,
            dt_coast: track.dt_coast(),
            n_updates: track.n_updates(),
            n_missed: track.n_missed(),
            score: Some(track.score()),
            x: track.x().as_slice().to_vec(),
            p: (0..N).map(|i| (0..N).map(|j| p[(i, j)]).collect()).collect(),
            reference: encode_frame(tree, track.frame())?,
            attributes: track.model().encode_attributes(track.attributes()),
        })
    }

    /// Rebuilds the track, decoding its frame into `tree`.
    pub fn into_track<Mdl: TrackModel<N, M>, const N: usize, const M: usize>(
        self,
        tree: &mut FrameTree,
        model: Mdl,
        lifecycle: Lifecycle,
    ) -> Result<Track<Mdl, N, M>> {
        if self.x.len() != N {
            return Err(Error::Decode(format!(
                "{} state has {} entries, expected {N}",
                Mdl::KIND,
                self.x.len()
            )));
        }
        if self.p.len() != N || self.p.iter().any(|row| row.len() != N) {
            return Err(Error::Decode(format!("{} covariance is not {N}x{N}", Mdl::KIND)));
        }
        let attributes = model.decode_attributes(self.attributes.as_ref())?;
        let x = StateVector::from_svector(SVector::from_column_slice(&self.x));
        let p = StateCovariance::from_matrix(SMatrix::from_fn(|i, j| self.p[i][j]));
        let frame = decode_frame(tree, &self.reference)?;
        let score = self.score.unwrap_or(lifecycle.config().score_init);

        let mut track = Track::from_state(
            model,
            lifecycle,
            TrackId(self.id),
            self.obj_type,
            self.t0,
            frame,
            x,
            p,
            attributes,
        );
        track.restore_counters(self.t, self.dt_coast, self.n_updates, self.n_missed, score);
        Ok(track)
    }
}

pub fn encode_track<Mdl: TrackModel<N, M>, const N: usize, const M: usize>(
    tree: &FrameTree,
    track: &Track<Mdl, N, M>,
) -> Result<String> {
    wrap(track.kind().key(), &TrackRecord::from_track(tree, track)?)
}

/// Decodes a track of a known model, rejecting documents of any other kind.
pub fn decode_track<Mdl: TrackModel<N, M>, const N: usize, const M: usize>(
    tree: &mut FrameTree,
    text: &str,
    model: Mdl,
    lifecycle: Lifecycle,
) -> Result<Track<Mdl, N, M>> {
    let record: TrackRecord = unwrap_as(text, Mdl::KIND.key())?;
    record.into_track(tree, model, lifecycle)
}

pub fn encode_any_track(tree: &FrameTree, track: &AnyTrack) -> Result<String> {
    match track {
        AnyTrack::XyFromXy(t) => encode_track(tree, t),
        AnyTrack::XyzFromXyz(t) => encode_track(tree, t),
        AnyTrack::XyFromRaz(t) => encode_track(tree, t),
        AnyTrack::XyzFromRazel(t) => encode_track(tree, t),
        AnyTrack::XyzFromRazelRrt(t) => encode_track(tree, t),
        AnyTrack::Box2D(t) => encode_track(tree, t),
        AnyTrack::Box3D(t) => encode_track(tree, t),
        AnyTrack::JointBox(joint) => {
            let record = JointRecord {
                track_2d: joint.track_2d().map(|t| encode_track(tree, t)).transpose()?,
                track_3d: joint.track_3d().map(|t| encode_track(tree, t)).transpose()?,
            };
            wrap(TrackKind::JointBox.key(), &record)
        }
        AnyTrack::Group(group) => {
            let record = GroupRecord {
                state: encode_any_track(tree, &group.state)?,
                members: group
                    .members
                    .iter()
                    .map(|member| encode_any_track(tree, member))
                    .collect::<Result<_>>()?,
            };
            wrap(TrackKind::Group.key(), &record)
        }
    }
}

/// Decodes any track kind with default models and lifecycle.
pub fn decode_any_track(tree: &mut FrameTree, text: &str) -> Result<AnyTrack> {
    let (key, body) = unwrap(text)?;
    let kind = TrackKind::from_key(&key)
        .ok_or_else(|| Error::Decode(format!("\"{key}\" is not a track type")))?;
    let lifecycle = Lifecycle::default();
    let record = |body| serde_json::from_value::<TrackRecord>(body);
    let track = match kind {
        TrackKind::XyFromXy => {
            AnyTrack::XyFromXy(record(body)?.into_track(tree, CartesianXy::default(), lifecycle)?)
        }
        TrackKind::XyzFromXyz => {
            AnyTrack::XyzFromXyz(record(body)?.into_track(tree, CartesianXyz::default(), lifecycle)?)
        }
        TrackKind::XyFromRaz => {
            AnyTrack::XyFromRaz(record(body)?.into_track(tree, RangeAzimuth::default(), lifecycle)?)
        }
        TrackKind::XyzFromRazel => AnyTrack::XyzFromRazel(record(body)?.into_track(
            tree,
            RangeAzimuthElevation::default(),
            lifecycle,
        )?),
        TrackKind::XyzFromRazelRrt => AnyTrack::XyzFromRazelRrt(record(body)?.into_track(
            tree,
            RangeAzimuthElevationRate::default(),
            lifecycle,
        )?),
        TrackKind::Box2D => {
            AnyTrack::Box2D(record(body)?.into_track(tree, Box2dModel::default(), lifecycle)?)
        }
        TrackKind::Box3D => {
            AnyTrack::Box3D(record(body)?.into_track(tree, Box3dModel::default(), lifecycle)?)
        }
        TrackKind::JointBox => {
            let joint: JointRecord = serde_json::from_value(body)?;
            let image = |text: &str, tree: &mut FrameTree| -> Result<BoxTrack2D> {
                decode_track(tree, text, Box2dModel::default(), lifecycle)
            };
            let solid = |text: &str, tree: &mut FrameTree| -> Result<BoxTrack3D> {
                decode_track(tree, text, Box3dModel::default(), lifecycle)
            };
            let parts = match (joint.track_2d, joint.track_3d) {
                (Some(b2), Some(b3)) => JointParts::Both(image(&b2, tree)?, solid(&b3, tree)?),
                (Some(b2), None) => JointParts::Image(image(&b2, tree)?),
                (None, Some(b3)) => JointParts::Solid(solid(&b3, tree)?),
                (None, None) => return Err(Error::Decode("joint track has no parts".into())),
            };
            JointBoxTrack::from_parts(parts)?.into()
        }
        TrackKind::Group => {
            let group: GroupRecord = serde_json::from_value(body)?;
            let state = decode_any_track(tree, &group.state)?;
            let members = group
                .members
                .iter()
                .map(|member| decode_any_track(tree, member))
                .collect::<Result<Vec<_>>>()?;
            GroupTrack::new(state, members).into()
        }
    };
    Ok(track)
}
