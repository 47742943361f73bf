//! Core types for typed Kalman spaces, transforms and identifiers

pub mod ids;
pub mod spaces;
pub mod transforms;
