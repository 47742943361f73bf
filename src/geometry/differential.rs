//! Composition and differencing of frame chains
//!
//! All operations here are read-only on the [`FrameTree`] apart from the
//! lazily populated integration cache.

use nalgebra::Vector3;

use super::frame::{FrameId, FramePose, FrameTree};
use super::numeric::{compose, conjugate, near_zero, rotate};
use crate::{Error, Result};

/// How two frames are matched when searching for a shared ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AncestorMatch {
    /// Structural equality (same rounded state along the chain).
    #[default]
    Exact,
    /// Near-equality via [`allclose`].
    Relaxed,
}

/// A pose expressed relative to an anchor frame, not yet part of the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeFrame {
    pub anchor: FrameId,
    pub pose: FramePose,
}

impl RelativeFrame {
    /// Inserts the relative pose into the tree as a child of its anchor.
    pub fn attach(&self, tree: &mut FrameTree) -> Result<FrameId> {
        let n_prec = tree.n_prec(self.anchor)?;
        tree.add_frame_with_precision(self.anchor, self.pose, n_prec)
    }

    /// True if the relative pose is the identity within tolerance.
    pub fn is_identity(&self) -> bool {
        self.pose.is_near_identity()
    }
}

/// Composes the chain from `start_at` down to `frame`.
///
/// Returns the pose of `frame` relative to `start_at`. The ancestor is
/// matched structurally, so a twin of an ancestor is also accepted.
pub fn integrate(tree: &FrameTree, frame: FrameId, start_at: FrameId) -> Result<FramePose> {
    let chain = tree.ancestors(frame)?;
    let mut anchor_index = None;
    for (i, ancestor) in chain.iter().enumerate() {
        if tree.frames_equal(*ancestor, start_at)? {
            anchor_index = Some(i);
            break;
        }
    }
    let anchor_index = anchor_index.ok_or(Error::NotAnAncestor {
        frame,
        ancestor: start_at,
    })?;
    let anchor = chain[anchor_index];

    if let Some(pose) = tree.cached_integration(frame, anchor) {
        return Ok(pose);
    }

    let mut total = FramePose::identity();
    for link_id in chain[..anchor_index].iter().rev() {
        let link = tree.pose(*link_id)?;
        let back = conjugate(&total.q);
        total.x += rotate(&back, &link.x);
        if !link.is_fixed() {
            total.v += rotate(&back, &link.v);
            total.acc += rotate(&back, &link.acc);
            total.ang += rotate(&back, &link.ang);
        }
        total.q = compose(&link.q, &total.q);
    }

    tree.store_integration(frame, anchor, total);
    Ok(total)
}

/// First frame shared by the ancestor chains of `a` and `b`.
///
/// `a`'s chain is scanned outermost, so the deepest match on `a`'s side wins.
pub fn common_ancestor(
    tree: &FrameTree,
    a: FrameId,
    b: FrameId,
    mode: AncestorMatch,
) -> Result<FrameId> {
    let chain_a = tree.ancestors(a)?;
    let chain_b = tree.ancestors(b)?;
    for fa in &chain_a {
        for fb in &chain_b {
            let matched = match mode {
                AncestorMatch::Exact => tree.frames_equal(*fa, *fb)?,
                AncestorMatch::Relaxed => allclose(tree, *fa, *fb)?,
            };
            if matched {
                return Ok(*fa);
            }
        }
    }
    Err(Error::NoCommonAncestor(a, b))
}

/// Pose of one frame relative to another.
///
/// With `in_self` the result is `other` expressed relative to `frame` and
/// anchored at `frame`; otherwise the roles are swapped.
pub fn differential(
    tree: &FrameTree,
    frame: FrameId,
    other: FrameId,
    in_self: bool,
) -> Result<RelativeFrame> {
    let (base, target) = if in_self { (frame, other) } else { (other, frame) };
    if tree.frames_equal(base, target)? {
        return Ok(RelativeFrame {
            anchor: base,
            pose: FramePose::identity(),
        });
    }

    let ancestor = common_ancestor(tree, base, target, AncestorMatch::Exact)?;
    let from = integrate(tree, base, ancestor)?;
    let to = integrate(tree, target, ancestor)?;

    let mut pose = FramePose::new(
        rotate(&from.q, &(to.x - from.x)),
        compose(&to.q, &conjugate(&from.q)),
    );
    if !from.is_fixed() || !to.is_fixed() {
        // TODO: add transport and Coriolis terms once rotating parents need them
        pose.v = rotate(&from.q, &(to.v - from.v));
        pose.acc = rotate(&from.q, &(to.acc - from.acc));
        pose.ang = rotate(&from.q, &(to.ang - from.ang));
    }
    Ok(RelativeFrame { anchor: base, pose })
}

/// Near-equality of two frames: their differential collapses to zero.
pub fn allclose(tree: &FrameTree, a: FrameId, b: FrameId) -> Result<bool> {
    if a == b {
        return Ok(true);
    }
    let diff = differential(tree, a, b, true)?;
    let p = &diff.pose;
    let rotation_close = near_zero(&Vector3::new(p.q.i, p.q.j, p.q.k));
    Ok(near_zero(&p.x) && rotation_close && near_zero(&p.v) && near_zero(&p.acc) && near_zero(&p.ang))
}
