//! rollcall-core — Roster enrollment and face matching.
//!
//! Faces are located with SCRFD and embedded with ArcFace, both running via
//! ONNX Runtime for CPU inference. The [`FaceEncoder`] trait is the seam
//! between the models and the roster/matching logic.

pub mod alignment;
pub mod annotate;
pub mod detector;
pub mod encoder;
pub mod matcher;
pub mod recognizer;
pub mod roster;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use annotate::Annotator;
pub use encoder::{
    compare_faces, is_strict_tolerance, EncoderError, FaceEncoder, OnnxFaceEncoder, DEFAULT_TOLERANCE,
};
pub use matcher::{detect_and_match, to_encoder_rgb, MatchOutcome};
pub use roster::{Roster, RosterError};
pub use types::{BoundingBox, Embedding, FaceMatch, StudentRecord};

/// Model directory used when none is configured.
pub fn default_model_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("models")
}
