//! A model-free encoder for tests.
//!
//! `MarkerEncoder` treats every pixel whose blue channel is 255 as the
//! top-left corner of a face. The face's embedding is `[r / 255, g / 255]`
//! read from that pixel, so tests can paint faces with known embeddings
//! into ordinary images. Markers are reported in row-major order.

use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::{BoundingBox, Embedding};
use image::{Rgb, RgbImage};

/// Side length of the box reported for each marker.
pub const MARKER_FACE_SIZE: f32 = 12.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerEncoder;

impl MarkerEncoder {
    /// Pixel value that encodes the embedding `[r / 255, g / 255]`.
    pub fn marker(r: u8, g: u8) -> Rgb<u8> {
        Rgb([r, g, 255])
    }

    /// The embedding a marker of `(r, g)` produces.
    pub fn embedding(r: u8, g: u8) -> Embedding {
        Embedding::new(vec![r as f32 / 255.0, g as f32 / 255.0])
    }
}

impl FaceEncoder for MarkerEncoder {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, EncoderError> {
        Ok(image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[2] == 255)
            .map(|(x, y, _)| BoundingBox {
                x: x as f32,
                y: y as f32,
                width: MARKER_FACE_SIZE,
                height: MARKER_FACE_SIZE,
                confidence: 1.0,
                landmarks: None,
            })
            .collect())
    }

    fn encode(&mut self, image: &RgbImage, faces: &[BoundingBox]) -> Result<Vec<Embedding>, EncoderError> {
        Ok(faces
            .iter()
            .map(|f| {
                let p = image.get_pixel(f.x as u32, f.y as u32);
                MarkerEncoder::embedding(p[0], p[1])
            })
            .collect())
    }
}
