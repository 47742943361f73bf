//! Textual encodings of frames, values and tracks
//!
//! Every JSON document is an object with a single lowercase type key, e.g.
//! `{"reference": {...}}` or `{"xyfromraztrack": {...}}`. Parent frames are
//! embedded as encoded strings, recursively, down to the global origin.
//!
//! Decoding frames never inserts duplicates: a structurally identical frame
//! already in the tree is reused.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

pub mod frame;
pub mod track;
pub mod values;

pub use frame::{decode_frame, decode_frame_chain, encode_frame, encode_frame_chain};
pub use track::{decode_any_track, decode_track, encode_any_track, encode_track, TrackRecord};
pub use values::{
    decode_box2d, decode_box3d, decode_rotation, decode_vector, encode_box2d, encode_box3d,
    encode_rotation, encode_vector,
};

/// Serializes `body` under a single type key.
pub(crate) fn wrap<T: Serialize>(key: &str, body: &T) -> Result<String> {
    let mut tagged = BTreeMap::new();
    tagged.insert(key, body);
    Ok(serde_json::to_string(&tagged)?)
}

/// Splits a tagged document into its key and body.
pub(crate) fn unwrap(text: &str) -> Result<(String, serde_json::Value)> {
    let tagged: BTreeMap<String, serde_json::Value> = serde_json::from_str(text)?;
    if tagged.len() != 1 {
        return Err(Error::Decode(format!(
            "expected exactly one type key, found {}",
            tagged.len()
        )));
    }
    tagged
        .into_iter()
        .next()
        .ok_or_else(|| Error::Decode("empty document".into()))
}

/// Decodes a body that must sit under `key`.
pub(crate) fn unwrap_as<T: DeserializeOwned>(text: &str, key: &str) -> Result<T> {
    let (found, body) = unwrap(text)?;
    if found != key {
        return Err(Error::Decode(format!("expected \"{key}\", found \"{found}\"")));
    }
    Ok(serde_json::from_value(body)?)
}
