//! Vectors, rotations and boxes with their frames embedded

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::codec::frame::{decode_frame, encode_frame};
use crate::codec::{unwrap, unwrap_as, wrap};
use crate::geometry::boxes::{Box2D, Box3D, BoxAnchor};
use crate::geometry::frame::FrameTree;
use crate::geometry::rotation::Rotation;
use crate::geometry::vector::{Vector, VectorKind};
use crate::{Error, Result};

pub const ROTATION_KEY: &str = "rotation";
pub const BOX2D_KEY: &str = "box2d";
pub const BOX3D_KEY: &str = "box3d";

#[derive(Debug, Serialize, Deserialize)]
struct VectorRecord {
    x: [f64; 3],
    reference: String,
    n_prec: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct RotationRecord {
    qw: f64,
    qv: [f64; 3],
    reference: String,
    n_prec: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Box2dRecord {
    /// `[xmin, ymin, xmax, ymax]`.
    #[serde(rename = "box")]
    corners: [f64; 4],
    reference: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Box3dRecord {
    x: [f64; 3],
    hwl: [f64; 3],
    qw: f64,
    qv: [f64; 3],
    anchor: BoxAnchor,
    reference: String,
}

fn vector_kind(key: &str) -> Result<VectorKind> {
    match key {
        "position" => Ok(VectorKind::Position),
        "velocity" => Ok(VectorKind::Velocity),
        "acceleration" => Ok(VectorKind::Acceleration),
        "direction" => Ok(VectorKind::Direction),
        other => Err(Error::Decode(format!("\"{other}\" is not a vector type"))),
    }
}

pub fn encode_vector(tree: &FrameTree, vector: &Vector) -> Result<String> {
    let record = VectorRecord {
        x: [vector.x.x, vector.x.y, vector.x.z],
        reference: encode_frame(tree, vector.frame)?,
        n_prec: vector.n_prec,
    };
    wrap(vector.kind.key(), &record)
}

pub fn decode_vector(tree: &mut FrameTree, text: &str) -> Result<Vector> {
    let (key, body) = unwrap(text)?;
    let kind = vector_kind(&key)?;
    let record: VectorRecord = serde_json::from_value(body)?;
    let frame = decode_frame(tree, &record.reference)?;
    Ok(Vector::with_precision(kind, Vector3::from(record.x), frame, record.n_prec))
}

pub fn encode_rotation(tree: &FrameTree, rotation: &Rotation) -> Result<String> {
    let q = &rotation.q;
    let record = RotationRecord {
        qw: q.w,
        qv: [q.i, q.j, q.k],
        reference: encode_frame(tree, rotation.frame)?,
        n_prec: tree.n_prec(rotation.frame)?,
    };
    wrap(ROTATION_KEY, &record)
}

pub fn decode_rotation(tree: &mut FrameTree, text: &str) -> Result<Rotation> {
    let record: RotationRecord = unwrap_as(text, ROTATION_KEY)?;
    let frame = decode_frame(tree, &record.reference)?;
    let [i, j, k] = record.qv;
    Ok(Rotation::new(Quaternion::new(record.qw, i, j, k), frame))
}

pub fn encode_box2d(tree: &FrameTree, bbox: &Box2D) -> Result<String> {
    let record = Box2dRecord {
        corners: bbox.corners(),
        reference: encode_frame(tree, bbox.frame)?,
    };
    wrap(BOX2D_KEY, &record)
}

pub fn decode_box2d(tree: &mut FrameTree, text: &str) -> Result<Box2D> {
    let record: Box2dRecord = unwrap_as(text, BOX2D_KEY)?;
    let frame = decode_frame(tree, &record.reference)?;
    Ok(Box2D::new(record.corners, frame))
}

pub fn encode_box3d(tree: &FrameTree, bbox: &Box3D) -> Result<String> {
    let record = Box3dRecord {
        x: [bbox.position.x, bbox.position.y, bbox.position.z],
        hwl: bbox.size,
        qw: bbox.q.w,
        qv: [bbox.q.i, bbox.q.j, bbox.q.k],
        anchor: bbox.anchor,
        reference: encode_frame(tree, bbox.frame)?,
    };
    wrap(BOX3D_KEY, &record)
}

pub fn decode_box3d(tree: &mut FrameTree, text: &str) -> Result<Box3D> {
    let record: Box3dRecord = unwrap_as(text, BOX3D_KEY)?;
    let frame = decode_frame(tree, &record.reference)?;
    let [i, j, k] = record.qv;
    Ok(Box3D::new(
        Vector3::from(record.x),
        record.hwl,
        Quaternion::new(record.qw, i, j, k),
        record.anchor,
        frame,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::frame::{FrameId, FramePose};

    fn sensor(tree: &mut FrameTree) -> FrameId {
        tree.add_frame(FrameId::GLOBAL, FramePose::translation(Vector3::new(0.0, 2.0, 1.0)))
            .unwrap()
    }

    #[test]
    fn test_vector_keeps_kind_and_frame() {
        let mut tree = FrameTree::new();
        let frame = sensor(&mut tree);
        let velocity = Vector::velocity(Vector3::new(3.0, -1.0, 0.25), frame);
        let text = encode_vector(&tree, &velocity).unwrap();
        assert!(text.starts_with(r#"{"velocity":{"x":[3.0,-1.0,0.25]"#));

        let decoded = decode_vector(&mut tree, &text).unwrap();
        assert_eq!(decoded, velocity);
    }

    #[test]
    fn test_unknown_vector_key() {
        let mut tree = FrameTree::new();
        let result = decode_vector(&mut tree, r#"{"jerk":{"x":[0,0,0],"reference":"","n_prec":8}}"#);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_rotation_and_boxes() {
        let mut tree = FrameTree::new();
        let frame = sensor(&mut tree);

        let rotation = Rotation::from_yaw(0.7, frame);
        let text = encode_rotation(&tree, &rotation).unwrap();
        assert_eq!(decode_rotation(&mut tree, &text).unwrap(), rotation);

        let image = Box2D::new([10.0, 20.0, 50.0, 80.0], frame);
        let text = encode_box2d(&tree, &image).unwrap();
        assert!(text.contains(r#""box":[10.0,20.0,50.0,80.0]"#));
        assert_eq!(decode_box2d(&mut tree, &text).unwrap(), image);

        let solid = Box3D::new(
            Vector3::new(12.0, 1.0, 0.0),
            [1.6, 1.9, 4.5],
            rotation.q,
            BoxAnchor::Bottom,
            frame,
        );
        let text = encode_box3d(&tree, &solid).unwrap();
        assert!(text.contains(r#""anchor":"bottom""#));
        assert_eq!(decode_box3d(&mut tree, &text).unwrap(), solid);
    }
}
