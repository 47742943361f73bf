//! Frame chains as JSON and as a flat token stream

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::codec::{unwrap_as, wrap};
use crate::geometry::frame::{FrameId, FramePose, FrameTree};
use crate::geometry::numeric::MAX_ROUNDING_DIGITS;
use crate::{Error, Result};

pub const FRAME_KEY: &str = "reference";

const RIGHT_HANDED: &str = "right";
const GLOBAL_TOKEN: &str = "global";

/// Numbers per non-global frame in the flat chain: `x(3) q(4) v(3) acc(3) ang(3)`.
const FLAT_POSE_LEN: usize = 16;

/// Body of `{"reference": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub x: [f64; 3],
    pub qw: f64,
    pub qv: [f64; 3],
    pub v: [f64; 3],
    pub acc: [f64; 3],
    pub ang: [f64; 3],
    /// Encoded parent; `null` for the global origin.
    pub reference: Option<String>,
    pub handedness: String,
    pub n_prec: u32,
    pub level: usize,
}

impl FrameRecord {
    fn pose(&self) -> FramePose {
        FramePose {
            x: Vector3::from(self.x),
            q: Quaternion::new(self.qw, self.qv[0], self.qv[1], self.qv[2]),
            v: Vector3::from(self.v),
            acc: Vector3::from(self.acc),
            ang: Vector3::from(self.ang),
        }
    }
}

fn array3(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

/// Encodes `id` and, recursively, all of its ancestors.
pub fn encode_frame(tree: &FrameTree, id: FrameId) -> Result<String> {
    let pose = tree.pose(id)?;
    let reference = tree
        .parent(id)?
        .map(|parent| encode_frame(tree, parent))
        .transpose()?;
    let record = FrameRecord {
        x: array3(&pose.x),
        qw: pose.q.w,
        qv: [pose.q.i, pose.q.j, pose.q.k],
        v: array3(&pose.v),
        acc: array3(&pose.acc),
        ang: array3(&pose.ang),
        reference,
        handedness: RIGHT_HANDED.to_owned(),
        n_prec: tree.n_prec(id)?,
        level: tree.level(id)?,
    };
    wrap(FRAME_KEY, &record)
}

/// Decodes a frame chain into `tree`, reusing structurally equal frames.
pub fn decode_frame(tree: &mut FrameTree, text: &str) -> Result<FrameId> {
    let record: FrameRecord = unwrap_as(text, FRAME_KEY)?;
    if record.handedness != RIGHT_HANDED {
        return Err(Error::NotRightHanded);
    }
    if record.n_prec > MAX_ROUNDING_DIGITS {
        return Err(Error::Decode(format!("precision {} out of range", record.n_prec)));
    }
    let pose = record.pose();
    match &record.reference {
        None => attach_global(record.level, &pose),
        Some(parent) => {
            if record.level == 0 {
                return Err(Error::NonZeroOrigin);
            }
            let parent = decode_frame(tree, parent)?;
            attach(tree, parent, record.level, pose, record.n_prec)
        }
    }
}

fn attach_global(level: usize, pose: &FramePose) -> Result<FrameId> {
    if level != 0 {
        return Err(Error::MissingParent);
    }
    if !pose.is_zero_pose() || !pose.is_fixed() {
        return Err(Error::NonZeroOrigin);
    }
    Ok(FrameId::GLOBAL)
}

fn attach(
    tree: &mut FrameTree,
    parent: FrameId,
    level: usize,
    pose: FramePose,
    n_prec: u32,
) -> Result<FrameId> {
    let expected = tree.level(parent)? + 1;
    if level != expected {
        return Err(Error::Decode(format!(
            "frame at level {level} cannot sit under a level {} parent",
            expected - 1
        )));
    }
    tree.find_or_add_frame(parent, pose, n_prec)
}

// ============================================================================
// Flat Chain
// ============================================================================

/// Encodes `id` as `reference <level> <x y z> <qw qx qy qz> <v> <acc> <ang> ...`
/// terminated by `reference 0 global`.
pub fn encode_frame_chain(tree: &FrameTree, id: FrameId) -> Result<String> {
    let mut tokens = Vec::new();
    for frame in tree.ancestors(id)? {
        tokens.push(FRAME_KEY.to_owned());
        tokens.push(tree.level(frame)?.to_string());
        if frame.is_global() {
            tokens.push(GLOBAL_TOKEN.to_owned());
            continue;
        }
        let pose = tree.pose(frame)?;
        let q = [pose.q.w, pose.q.i, pose.q.j, pose.q.k];
        let numbers = pose
            .x
            .iter()
            .chain(q.iter())
            .chain(pose.v.iter())
            .chain(pose.acc.iter())
            .chain(pose.ang.iter());
        tokens.extend(numbers.map(|c| c.to_string()));
    }
    Ok(tokens.join(" "))
}

/// Decodes a flat chain using the tree's default precision.
pub fn decode_frame_chain(tree: &mut FrameTree, text: &str) -> Result<FrameId> {
    let mut links = Vec::new();
    let mut tokens = text.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if token != FRAME_KEY {
            return Err(Error::Decode(format!("expected \"{FRAME_KEY}\", found \"{token}\"")));
        }
        let level: usize = tokens
            .next()
            .ok_or_else(|| Error::Decode("missing level".into()))?
            .parse()
            .map_err(|_| Error::Decode("level is not an integer".into()))?;
        if tokens.peek() == Some(&GLOBAL_TOKEN) {
            tokens.next();
            if level != 0 {
                return Err(Error::MissingParent);
            }
            if tokens.next().is_some() {
                return Err(Error::Decode("tokens after the global origin".into()));
            }
            return attach_chain(tree, &links);
        }
        let mut numbers = [0.0; FLAT_POSE_LEN];
        for slot in numbers.iter_mut() {
            *slot = tokens
                .next()
                .ok_or_else(|| Error::Decode("truncated frame pose".into()))?
                .parse()
                .map_err(|_| Error::Decode("pose entry is not a number".into()))?;
        }
        links.push((level, numbers));
    }
    Err(Error::MissingParent)
}

fn attach_chain(tree: &mut FrameTree, links: &[(usize, [f64; FLAT_POSE_LEN])]) -> Result<FrameId> {
    let n_prec = tree.precision();
    let mut frame = FrameId::GLOBAL;
    for (level, n) in links.iter().rev() {
        let pose = FramePose {
            x: Vector3::new(n[0], n[1], n[2]),
            q: Quaternion::new(n[3], n[4], n[5], n[6]),
            v: Vector3::new(n[7], n[8], n[9]),
            acc: Vector3::new(n[10], n[11], n[12]),
            ang: Vector3::new(n[13], n[14], n[15]),
        };
        frame = attach(tree, frame, *level, pose, n_prec)?;
    }
    Ok(frame)
}
