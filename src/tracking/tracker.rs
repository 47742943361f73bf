//! One tracking cycle over pre-associated detections
//!
//! Association happens upstream; the tracker receives `(track, detection)`
//! pairs plus the detections nobody claimed, and runs
//! predict → update → miss → spawn → retire.

use std::collections::HashSet;

use crate::geometry::frame::{FrameId, FrameTree};
use crate::models::TrackModel;
use crate::tracking::lifecycle::{Lifecycle, LifecycleConfig};
use crate::tracking::track::Track;
use crate::types::ids::{IdGenerator, TrackId};
use crate::types::spaces::MeasurementCovariance;
use crate::{Error, Result};

/// A detector output handed to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection<D> {
    /// Name of the sensor or detector that produced it.
    pub source: String,
    pub data: D,
    pub frame: FrameId,
    pub obj_type: String,
    /// Detector confidence.
    pub score: f64,
}

impl<D> Detection<D> {
    pub fn new(source: impl Into<String>, data: D, frame: FrameId, obj_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            data,
            frame,
            obj_type: obj_type.into(),
            score: 1.0,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

/// What happened to the track set in one [`Tracker::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub updated: Vec<TrackId>,
    pub spawned: Vec<TrackId>,
    pub retired: Vec<TrackId>,
}

/// Single-model tracker.
#[derive(Debug, Clone)]
pub struct Tracker<Mdl: TrackModel<N, M>, const N: usize, const M: usize> {
    model: Mdl,
    lifecycle: Lifecycle,
    noise: MeasurementCovariance<M>,
    ids: IdGenerator,
    tracks: Vec<Track<Mdl, N, M>>,
}

impl<Mdl: TrackModel<N, M>, const N: usize, const M: usize> Tracker<Mdl, N, M> {
    /// Creates a tracker using `noise` as the measurement covariance of
    /// every detection.
    pub fn new(model: Mdl, noise: MeasurementCovariance<M>) -> Self {
        Self {
            model,
            lifecycle: Lifecycle::default(),
            noise,
            ids: IdGenerator::new(),
            tracks: Vec::new(),
        }
    }

    pub fn with_lifecycle(mut self, config: LifecycleConfig) -> Self {
        self.lifecycle = Lifecycle::new(config);
        self
    }

    pub fn with_first_id(mut self, first: u64) -> Self {
        self.ids = IdGenerator::starting_at(first);
        self
    }

    #[inline]
    pub fn model(&self) -> &Mdl {
        &self.model
    }

    #[inline]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[inline]
    pub fn noise(&self) -> &MeasurementCovariance<M> {
        &self.noise
    }

    #[inline]
    pub fn tracks(&self) -> &[Track<Mdl, N, M>] {
        &self.tracks
    }

    pub fn confirmed_tracks(&self) -> impl Iterator<Item = &Track<Mdl, N, M>> {
        self.tracks.iter().filter(|t| t.is_confirmed())
    }

    pub fn track(&self, id: TrackId) -> Option<&Track<Mdl, N, M>> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    /// Takes over an externally built (e.g. decoded) track.
    pub fn adopt(&mut self, track: Track<Mdl, N, M>) {
        self.ids.observe(track.id());
        self.tracks.push(track);
    }

    /// Reprojects every track into `target`.
    ///
    /// Call before mutating a frame that tracks are expressed in.
    pub fn change_reference(&mut self, tree: &FrameTree, target: FrameId) -> Result<()> {
        for track in &mut self.tracks {
            track.change_reference(tree, target)?;
        }
        Ok(())
    }

    /// Runs one cycle at time `t`.
    ///
    /// Numerical failures of a single update are logged and counted as a
    /// miss for that track; any other error aborts the step.
    pub fn step(
        &mut self,
        tree: &FrameTree,
        t: f64,
        matched: &[(TrackId, Detection<Mdl::Detection>)],
        unmatched: &[Detection<Mdl::Detection>],
    ) -> Result<StepReport> {
        for (id, _) in matched {
            if self.track(*id).is_none() {
                return Err(Error::UnknownTrack(*id));
            }
        }

        for track in &mut self.tracks {
            track.predict(t);
        }

        let mut report = StepReport::default();
        let mut hit: HashSet<TrackId> = HashSet::with_capacity(matched.len());
        for (id, detection) in matched {
            let Some(track) = self.tracks.iter_mut().find(|tr| tr.id() == *id) else {
                continue;
            };
            if track.frame() != detection.frame {
                track.change_reference(tree, detection.frame)?;
            }
            match track.update_detection(detection.frame, &detection.data, &self.noise) {
                Ok(()) => {
                    hit.insert(*id);
                    report.updated.push(*id);
                }
                Err(err @ (Error::SingularInnovation | Error::UndefinedJacobian)) => {
                    log::warn!("track {} skipped update from {}: {}", id, detection.source, err);
                }
                Err(err) => return Err(err),
            }
        }

        for track in self.tracks.iter_mut().filter(|tr| !hit.contains(&tr.id())) {
            track.missed();
        }

        for detection in unmatched {
            let id = self.ids.next_id();
            let track = Track::new(
                self.model.clone(),
                self.lifecycle,
                id,
                detection.obj_type.clone(),
                t,
                detection.frame,
                &detection.data,
            );
            log::debug!("spawned {} track {} from {}", Mdl::KIND, id, detection.source);
            report.spawned.push(id);
            self.tracks.push(track);
        }

        let retired = &mut report.retired;
        self.tracks.retain(|track| {
            if track.is_active() {
                true
            } else {
                log::debug!(
                    "retired track {} after {} updates, score {:.2}",
                    track.id(),
                    track.n_updates(),
                    track.score()
                );
                retired.push(track.id());
                false
            }
        });

        Ok(report)
    }
}
