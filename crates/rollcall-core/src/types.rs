use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Integer pixel rectangle `(left, top, right, bottom)` clamped to an image
    /// of the given size. Returns `None` when nothing of the box is visible.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1) as f32;
        let max_y = (height - 1) as f32;

        let left = self.x.round().clamp(0.0, max_x) as u32;
        let top = self.y.round().clamp(0.0, max_y) as u32;
        let right = (self.x + self.width).round().clamp(0.0, max_x) as u32;
        let bottom = (self.y + self.height).round().clamp(0.0, max_y) as u32;

        if right <= left || bottom <= top {
            return None;
        }
        Some((left, top, right, bottom))
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Euclidean distance between two embeddings.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One enrolled student and the embeddings taken from their photos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub embeddings: Vec<Embedding>,
}

/// Result for a single face found in an uploaded image.
#[derive(Debug, Clone, Serialize)]
pub struct FaceMatch {
    pub bbox: BoundingBox,
    /// Student the face was matched to, `None` for an unknown face.
    pub student_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x, y, width: w, height: h, confidence: 1.0, landmarks: None,
        }
    }

    #[test]
    fn test_distance_identical() {
        let a = Embedding::new(vec![0.3, 0.4, 0.5]);
        assert!(a.distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_distance_pythagorean() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_bounds_inside() {
        let b = bbox(10.2, 20.6, 30.0, 40.0);
        assert_eq!(b.pixel_bounds(100, 100), Some((10, 21, 40, 61)));
    }

    #[test]
    fn test_pixel_bounds_clamped() {
        let b = bbox(-15.0, -5.0, 50.0, 500.0);
        assert_eq!(b.pixel_bounds(64, 48), Some((0, 0, 35, 47)));
    }

    #[test]
    fn test_pixel_bounds_outside() {
        let b = bbox(200.0, 200.0, 10.0, 10.0);
        assert_eq!(b.pixel_bounds(64, 48), None);
        assert_eq!(bbox(0.0, 0.0, 5.0, 5.0).pixel_bounds(0, 0), None);
    }
}
