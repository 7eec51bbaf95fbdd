//! The face encoder seam: locate faces, embed them, compare embeddings.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

/// File name of the SCRFD detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default maximum embedding distance for two faces to count as the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Below this distance most same-person pairs of unit-length ArcFace
/// embeddings are rejected. Cosine 0.40 corresponds to about 1.1.
pub const STRICT_TOLERANCE: f32 = 0.9;

/// Whether `tolerance` is tight enough to miss most true matches.
pub fn is_strict_tolerance(tolerance: f32) -> bool {
    tolerance < STRICT_TOLERANCE
}

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Locates faces in an RGB image and turns them into embeddings.
///
/// Implementations may keep inference state, hence `&mut self`.
pub trait FaceEncoder {
    /// Bounding boxes of all faces in `image`, in detection order.
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EncoderError>;

    /// One embedding per box in `faces`, in the same order.
    fn encode(&mut self, image: &RgbImage, faces: &[BoundingBox]) -> Result<Vec<Embedding>, EncoderError>;
}

impl<E: FaceEncoder + ?Sized> FaceEncoder for Box<E> {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EncoderError> {
        (**self).locate(image)
    }

    fn encode(&mut self, image: &RgbImage, faces: &[BoundingBox]) -> Result<Vec<Embedding>, EncoderError> {
        (**self).encode(image, faces)
    }
}

/// Compare a candidate against known embeddings.
///
/// Entry `i` is true when `known[i]` is within `tolerance` (Euclidean
/// distance, inclusive) of `candidate`.
pub fn compare_faces(known: &[Embedding], candidate: &Embedding, tolerance: f32) -> Vec<bool> {
    known
        .iter()
        .map(|k| k.distance(candidate) <= tolerance)
        .collect()
}

/// SCRFD detection + ArcFace recognition, both through ONNX Runtime.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncoderError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EncoderError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode(&mut self, image: &RgbImage, faces: &[BoundingBox]) -> Result<Vec<Embedding>, EncoderError> {
        faces
            .iter()
            .map(|face| self.recognizer.extract(image, face).map_err(EncoderError::from))
            .collect()
    }
}
