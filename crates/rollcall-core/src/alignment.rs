//! Face alignment via 4-DOF similarity transform.
//!
//! Warps a detected face onto the canonical 112×112 ArcFace crop using the
//! five InsightFace reference landmarks and a closed-form least-squares fit.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Estimate the similarity transform (scale, rotation, translation) mapping
/// `src` landmarks onto `dst` landmarks in the least-squares sense.
///
/// Returns [a, -b, tx, b, a, ty] representing the matrix:
/// ```text
/// | a  -b  tx |
/// | b   a  ty |
/// ```
fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    let n = src.len() as f32;
    let (src_cx, src_cy) = centroid(src);
    let (dst_cx, dst_cy) = centroid(dst);

    let mut norm = 0.0f32;
    let mut dot = 0.0f32;
    let mut cross = 0.0f32;
    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let (sx, sy) = (sx - src_cx, sy - src_cy);
        let (dx, dy) = (dx - dst_cx, dy - dst_cy);
        norm += sx * sx + sy * sy;
        dot += sx * dx + sy * dy;
        cross += sx * dy - sy * dx;
    }

    // Degenerate landmarks (all on one point): fall back to a pure translation.
    if norm / n < 1e-12 {
        return [1.0, 0.0, dst_cx - src_cx, 0.0, 1.0, dst_cy - src_cy];
    }

    let a = dot / norm;
    let b = cross / norm;
    let tx = dst_cx - (a * src_cx - b * src_cy);
    let ty = dst_cy - (b * src_cx + a * src_cy);

    [a, -b, tx, b, a, ty]
}

fn centroid(points: &[(f32, f32); 5]) -> (f32, f32) {
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0f32, 0.0f32), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

/// Align a detected face to a canonical 112×112 RGB crop.
///
/// Pixels that map outside the source image are filled with black.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let m = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    let mut aligned = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);

    let matrix = [m[0], m[1], m[2], m[3], m[4], m[5], 0.0, 0.0, 1.0];
    match Projection::from_matrix(matrix) {
        Some(projection) => warp_into(
            image,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
            &mut aligned,
        ),
        None => tracing::warn!(?m, "alignment transform is not invertible; using blank crop"),
    }

    aligned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let pts = REFERENCE_LANDMARKS_112;
        let m = estimate_similarity_transform(&pts, &pts);

        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4, "-b = {}", m[1]);
        assert!(m[2].abs() < 1e-3, "tx = {}", m[2]);
        assert!(m[3].abs() < 1e-4, "b = {}", m[3]);
        assert!((m[4] - 1.0).abs() < 1e-4, "a2 = {}", m[4]);
        assert!(m[5].abs() < 1e-3, "ty = {}", m[5]);
    }

    #[test]
    fn test_scaled_transform() {
        // Source landmarks at 2x scale → a ≈ 0.5
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (x * 2.0, y * 2.0));
        let m = estimate_similarity_transform(&src, &REFERENCE_LANDMARKS_112);
        assert!((m[0] - 0.5).abs() < 1e-4, "a = {}, expected 0.5", m[0]);
        assert!(m[3].abs() < 1e-4, "b = {}", m[3]);
    }

    #[test]
    fn test_translated_transform() {
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (x + 30.0, y - 12.0));
        let m = estimate_similarity_transform(&src, &REFERENCE_LANDMARKS_112);
        assert!((m[0] - 1.0).abs() < 1e-4);
        assert!((m[2] + 30.0).abs() < 1e-3, "tx = {}", m[2]);
        assert!((m[5] - 12.0).abs() < 1e-3, "ty = {}", m[5]);
    }

    #[test]
    fn test_degenerate_landmarks() {
        let src = [(10.0, 10.0); 5];
        let m = estimate_similarity_transform(&src, &REFERENCE_LANDMARKS_112);
        assert_eq!(m[0], 1.0);
        assert_eq!(m[3], 0.0);
    }

    #[test]
    fn test_align_face_output_size() {
        let image = RgbImage::from_pixel(640, 480, Rgb([128, 64, 32]));
        let aligned = align_face(&image, &REFERENCE_LANDMARKS_112);
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
        // Identity mapping over a uniform image keeps the color.
        let px = aligned.get_pixel(56, 56);
        for (got, want) in px.0.iter().zip([128u8, 64, 32]) {
            assert!(got.abs_diff(want) <= 1, "got {px:?}");
        }
    }

    #[test]
    fn test_landmark_roundtrip() {
        // A bright patch at the source left eye should land near the reference left eye.
        let mut image = RgbImage::new(200, 200);
        let src_landmarks: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        for dy in 0..5 {
            for dx in 0..5 {
                image.put_pixel(78 + dx, 58 + dy, Rgb([255, 255, 255]));
            }
        }

        let aligned = align_face(&image, &src_landmarks);

        let ref_x = REFERENCE_LANDMARKS_112[0].0.round() as u32;
        let ref_y = REFERENCE_LANDMARKS_112[0].1.round() as u32;
        let mut max_val = 0u8;
        for y in ref_y - 1..=ref_y + 1 {
            for x in ref_x - 1..=ref_x + 1 {
                max_val = max_val.max(aligned.get_pixel(x, y)[0]);
            }
        }
        assert!(max_val > 100, "expected bright patch near ({ref_x}, {ref_y}), max={max_val}");
    }
}
