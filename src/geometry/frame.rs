//! Reference frames stored in an arena
//!
//! Every frame is a rigid pose (plus velocity, acceleration and angular
//! velocity) relative to exactly one parent. Frames are addressed through
//! stable [`FrameId`] handles; node 0 of every [`FrameTree`] is the global
//! origin.
//!
//! # Caching
//!
//! Each node lazily caches its structural hash and its pose integrated from
//! an ancestor. Any setter clears the caches of the touched frame and, with a
//! breadth-first walk of the dependents lists, of every frame parented on it.
//! Parenting is write-once, so the walk never meets a cycle.

use core::cell::{Cell, RefCell};
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};

use super::numeric::{near_zero, round_quaternion, round_vector, DEFAULT_PRECISION};
use crate::{Error, Result};

// ============================================================================
// Frame Handle
// ============================================================================

/// Stable handle of a frame inside a [`FrameTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(usize);

impl FrameId {
    /// The global origin, present in every tree.
    pub const GLOBAL: FrameId = FrameId(0);

    /// Index of the frame in its arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// True for the global origin handle.
    #[inline]
    pub const fn is_global(self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for FrameId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_global() {
            write!(f, "frame#global")
        } else {
            write!(f, "frame#{}", self.0)
        }
    }
}

// ============================================================================
// Frame Pose
// ============================================================================

/// Pose and motion of a frame relative to its parent.
///
/// - `x`: translation of the frame origin, expressed in the parent
/// - `q`: rotation from the parent to this frame
/// - `v`, `acc`: linear velocity and acceleration, expressed in the parent
/// - `ang`: angular velocity (vector part of the rate quaternion)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePose {
    pub x: Vector3<f64>,
    pub q: Quaternion<f64>,
    pub v: Vector3<f64>,
    pub acc: Vector3<f64>,
    pub ang: Vector3<f64>,
}

impl Default for FramePose {
    fn default() -> Self {
        Self::identity()
    }
}

impl FramePose {
    /// Zero translation, identity rotation, no motion.
    #[inline]
    pub fn identity() -> Self {
        Self {
            x: Vector3::zeros(),
            q: Quaternion::identity(),
            v: Vector3::zeros(),
            acc: Vector3::zeros(),
            ang: Vector3::zeros(),
        }
    }

    /// A static pose.
    #[inline]
    pub fn new(x: Vector3<f64>, q: Quaternion<f64>) -> Self {
        Self {
            x,
            q,
            ..Self::identity()
        }
    }

    /// A static, unrotated pose at `x`.
    #[inline]
    pub fn translation(x: Vector3<f64>) -> Self {
        Self::new(x, Quaternion::identity())
    }

    /// A static pose whose rotation is given as a direction-cosine matrix.
    ///
    /// Returns [`Error::NotRightHanded`] if the matrix has a negative
    /// determinant.
    pub fn from_rotation_matrix(x: Vector3<f64>, matrix: &Matrix3<f64>) -> Result<Self> {
        if matrix.determinant() < 0.0 {
            return Err(Error::NotRightHanded);
        }
        let rotation = Rotation3::from_matrix(matrix);
        let q = UnitQuaternion::from_rotation_matrix(&rotation).into_inner();
        Ok(Self::new(x, q))
    }

    /// Sets the linear velocity.
    #[inline]
    pub fn with_velocity(mut self, v: Vector3<f64>) -> Self {
        self.v = v;
        self
    }

    /// Sets the linear acceleration.
    #[inline]
    pub fn with_acceleration(mut self, acc: Vector3<f64>) -> Self {
        self.acc = acc;
        self
    }

    /// Sets the angular velocity.
    #[inline]
    pub fn with_angular_velocity(mut self, ang: Vector3<f64>) -> Self {
        self.ang = ang;
        self
    }

    /// Normalized rotation.
    #[inline]
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(self.q)
    }

    /// A link is "fixed" when it carries no velocity, acceleration or
    /// angular velocity.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        near_zero(&self.v) && near_zero(&self.acc) && near_zero(&self.ang)
    }

    /// True when translation, rotation and motion all collapse to zero.
    pub fn is_near_identity(&self) -> bool {
        near_zero(&self.x) && near_zero(&self.q.imag()) && self.is_fixed()
    }

    /// True when the pose carries no translation and no rotation at all.
    pub fn is_zero_pose(&self) -> bool {
        self.x.iter().all(|c| *c == 0.0) && self.q.imag().iter().all(|c| *c == 0.0)
    }

    /// Same pose with every field rounded to `n_prec` digits.
    pub fn rounded(&self, n_prec: u32) -> Self {
        Self {
            x: round_vector(&self.x, n_prec),
            q: round_quaternion(&self.q, n_prec),
            v: round_vector(&self.v, n_prec),
            acc: round_vector(&self.acc, n_prec),
            ang: round_vector(&self.ang, n_prec),
        }
    }

    /// True if no field holds NaN or an infinity.
    pub fn is_finite(&self) -> bool {
        self.x.iter().all(|c| c.is_finite())
            && self.q.coords.iter().all(|c| c.is_finite())
            && self.v.iter().all(|c| c.is_finite())
            && self.acc.iter().all(|c| c.is_finite())
            && self.ang.iter().all(|c| c.is_finite())
    }

    fn hash_numbers<H: Hasher>(&self, state: &mut H) {
        let fields = self
            .x
            .iter()
            .chain(self.q.coords.iter())
            .chain(self.v.iter())
            .chain(self.acc.iter())
            .chain(self.ang.iter());
        for c in fields {
            // -0.0 and 0.0 must hash alike
            let c = if *c == 0.0 { 0.0 } else { *c };
            c.to_bits().hash(state);
        }
    }
}

// ============================================================================
// Arena Nodes
// ============================================================================

#[derive(Debug, Default)]
struct FrameCache {
    hash: Cell<Option<u64>>,
    integrated: RefCell<Option<(FrameId, FramePose)>>,
}

impl FrameCache {
    fn clear(&mut self) {
        self.hash.set(None);
        *self.integrated.get_mut() = None;
    }

    fn is_clean(&self) -> bool {
        self.hash.get().is_none() && self.integrated.borrow().is_none()
    }
}

#[derive(Debug)]
struct FrameNode {
    pose: FramePose,
    parent: Option<FrameId>,
    level: usize,
    n_prec: u32,
    dependents: Vec<FrameId>,
    cache: FrameCache,
}

// ============================================================================
// Frame Tree
// ============================================================================

/// Arena of reference frames rooted at the global origin.
#[derive(Debug)]
pub struct FrameTree {
    nodes: Vec<FrameNode>,
    n_prec: u32,
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTree {
    /// Creates a tree holding only the global origin.
    pub fn new() -> Self {
        Self::with_precision(DEFAULT_PRECISION)
    }

    /// Creates a tree whose frames default to `n_prec` rounding digits.
    pub fn with_precision(n_prec: u32) -> Self {
        let origin = FrameNode {
            pose: FramePose::identity(),
            parent: None,
            level: 0,
            n_prec,
            dependents: Vec::new(),
            cache: FrameCache::default(),
        };
        Self {
            nodes: vec![origin],
            n_prec,
        }
    }

    /// Handle of the global origin.
    #[inline]
    pub fn global(&self) -> FrameId {
        FrameId::GLOBAL
    }

    /// Default rounding precision of new frames.
    #[inline]
    pub fn precision(&self) -> u32 {
        self.n_prec
    }

    /// Number of frames, including the global origin.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the handle belongs to this tree.
    #[inline]
    pub fn contains(&self, id: FrameId) -> bool {
        id.0 < self.nodes.len()
    }

    fn node(&self, id: FrameId) -> Result<&FrameNode> {
        self.nodes.get(id.0).ok_or(Error::UnknownFrame(id))
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Adds a frame parented on `parent` with the tree's default precision.
    pub fn add_frame(&mut self, parent: FrameId, pose: FramePose) -> Result<FrameId> {
        self.add_frame_with_precision(parent, pose, self.n_prec)
    }

    /// Adds a frame parented on `parent`, rounding its fields to `n_prec`.
    pub fn add_frame_with_precision(
        &mut self,
        parent: FrameId,
        pose: FramePose,
        n_prec: u32,
    ) -> Result<FrameId> {
        let level = self.node(parent)?.level + 1;
        let id = FrameId(self.nodes.len());
        self.nodes.push(FrameNode {
            pose: pose.rounded(n_prec),
            parent: Some(parent),
            level,
            n_prec,
            dependents: Vec::new(),
            cache: FrameCache::default(),
        });
        self.nodes[parent.0].dependents.push(id);
        log::trace!("added {} at level {} under {}", id, level, parent);
        Ok(id)
    }

    /// Adds `pose` under `parent`, reusing an existing child that is
    /// structurally identical.
    pub fn find_or_add_frame(
        &mut self,
        parent: FrameId,
        pose: FramePose,
        n_prec: u32,
    ) -> Result<FrameId> {
        let rounded = pose.rounded(n_prec);
        let existing = self.node(parent)?.dependents.iter().copied().find(|child| {
            let node = &self.nodes[child.0];
            node.n_prec == n_prec && node.pose == rounded
        });
        match existing {
            Some(id) => Ok(id),
            None => self.add_frame_with_precision(parent, rounded, n_prec),
        }
    }

    /// Adds a zero-pose child that absorbs `frame` as its reference.
    pub fn engross(&mut self, frame: FrameId) -> Result<FrameId> {
        let n_prec = self.node(frame)?.n_prec;
        self.add_frame_with_precision(frame, FramePose::identity(), n_prec)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Pose of `id` relative to its parent.
    pub fn pose(&self, id: FrameId) -> Result<&FramePose> {
        Ok(&self.node(id)?.pose)
    }

    /// Parent of `id`; `None` only for the global origin.
    pub fn parent(&self, id: FrameId) -> Result<Option<FrameId>> {
        Ok(self.node(id)?.parent)
    }

    /// Tree depth of `id`.
    pub fn level(&self, id: FrameId) -> Result<usize> {
        Ok(self.node(id)?.level)
    }

    /// Rounding digits of `id`.
    pub fn n_prec(&self, id: FrameId) -> Result<u32> {
        Ok(self.node(id)?.n_prec)
    }

    /// Frames parented directly on `id`.
    pub fn dependents(&self, id: FrameId) -> Result<&[FrameId]> {
        Ok(&self.node(id)?.dependents)
    }

    /// True when the link from the parent to `id` carries no motion.
    pub fn is_fixed(&self, id: FrameId) -> Result<bool> {
        Ok(self.node(id)?.pose.is_fixed())
    }

    /// `[id, parent, grandparent, ..., global]`.
    pub fn ancestors(&self, id: FrameId) -> Result<Vec<FrameId>> {
        let mut chain = Vec::with_capacity(self.node(id)?.level + 1);
        let mut current = Some(id);
        while let Some(frame) = current {
            chain.push(frame);
            current = self.node(frame)?.parent;
        }
        Ok(chain)
    }

    /// True if the cached hash of `id` is currently populated.
    pub fn has_cached_hash(&self, id: FrameId) -> Result<bool> {
        Ok(self.node(id)?.cache.hash.get().is_some())
    }

    /// True if `id` holds no cached hash and no cached integration.
    pub fn is_invalidated(&self, id: FrameId) -> Result<bool> {
        Ok(self.node(id)?.cache.is_clean())
    }

    // ------------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------------

    /// Replaces the whole pose of `id`.
    pub fn set_pose(&mut self, id: FrameId, pose: FramePose) -> Result<()> {
        self.mutate(id, |p| *p = pose)
    }

    /// Sets the translation of `id`.
    pub fn set_position(&mut self, id: FrameId, x: Vector3<f64>) -> Result<()> {
        self.mutate(id, |p| p.x = x)
    }

    /// Sets the rotation of `id`.
    pub fn set_attitude(&mut self, id: FrameId, q: Quaternion<f64>) -> Result<()> {
        self.mutate(id, |p| p.q = q)
    }

    /// Sets the linear velocity of `id`.
    pub fn set_velocity(&mut self, id: FrameId, v: Vector3<f64>) -> Result<()> {
        self.mutate(id, |p| p.v = v)
    }

    /// Sets the linear acceleration of `id`.
    pub fn set_acceleration(&mut self, id: FrameId, acc: Vector3<f64>) -> Result<()> {
        self.mutate(id, |p| p.acc = acc)
    }

    /// Sets the angular velocity of `id`.
    pub fn set_angular_velocity(&mut self, id: FrameId, ang: Vector3<f64>) -> Result<()> {
        self.mutate(id, |p| p.ang = ang)
    }

    fn mutate(&mut self, id: FrameId, apply: impl FnOnce(&mut FramePose)) -> Result<()> {
        if id.is_global() {
            return Err(Error::ImmutableOrigin);
        }
        let n_prec = self.node(id)?.n_prec;
        let node = &mut self.nodes[id.0];
        apply(&mut node.pose);
        node.pose = node.pose.rounded(n_prec);
        self.invalidate(id);
        Ok(())
    }

    /// Clears the caches of `id` and of every frame transitively parented
    /// on it.
    fn invalidate(&mut self, id: FrameId) {
        let mut queue = VecDeque::from([id]);
        while let Some(frame) = queue.pop_front() {
            let node = &mut self.nodes[frame.0];
            node.cache.clear();
            queue.extend(node.dependents.iter().copied());
        }
    }

    // ------------------------------------------------------------------------
    // Structural identity
    // ------------------------------------------------------------------------

    /// Hash of the rounded numeric state of `id` composed with its
    /// ancestors' hashes.
    pub fn hash_of(&self, id: FrameId) -> Result<u64> {
        let node = self.node(id)?;
        if let Some(hash) = node.cache.hash.get() {
            return Ok(hash);
        }
        let mut hasher = DefaultHasher::new();
        node.level.hash(&mut hasher);
        node.pose.hash_numbers(&mut hasher);
        if let Some(parent) = node.parent {
            self.hash_of(parent)?.hash(&mut hasher);
        }
        let hash = hasher.finish();
        node.cache.hash.set(Some(hash));
        Ok(hash)
    }

    /// Structural equality: same rounded state along the whole chain.
    pub fn frames_equal(&self, a: FrameId, b: FrameId) -> Result<bool> {
        if a == b {
            return Ok(true);
        }
        Ok(self.hash_of(a)? == self.hash_of(b)?)
    }

    pub(crate) fn cached_integration(&self, id: FrameId, anchor: FrameId) -> Option<FramePose> {
        let node = self.nodes.get(id.0)?;
        let cached = node.cache.integrated.borrow();
        match *cached {
            Some((cached_anchor, pose)) if cached_anchor == anchor => Some(pose),
            _ => None,
        }
    }

    pub(crate) fn store_integration(&self, id: FrameId, anchor: FrameId, pose: FramePose) {
        if let Some(node) = self.nodes.get(id.0) {
            *node.cache.integrated.borrow_mut() = Some((anchor, pose));
        }
    }

    /// Human-readable one-line description of `id`.
    pub fn describe(&self, id: FrameId) -> Result<String> {
        let node = self.node(id)?;
        if id.is_global() {
            return Ok("GlobalOrigin".to_string());
        }
        let p = &node.pose;
        Ok(format!(
            "ReferenceFrame level {}, x: {:?}, q: [{}, {}, {}, {}], v: {:?}, acc: {:?}, ang: {:?}",
            node.level,
            p.x.as_slice(),
            p.q.w,
            p.q.i,
            p.q.j,
            p.q.k,
            p.v.as_slice(),
            p.acc.as_slice(),
            p.ang.as_slice(),
        ))
    }
}
