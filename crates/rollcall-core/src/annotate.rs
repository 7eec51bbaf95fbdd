//! Box-and-label drawing for matched and unknown faces.

use crate::types::BoundingBox;
use ab_glyph::{FontVec, PxScale};
use image::{ImageError, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MATCHED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const UNKNOWN_LABEL: &str = "Unknown";

const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 24.0;
const LABEL_OFFSET: i32 = 10;

/// Fonts tried in order when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("reading font {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font file: {0}")]
    InvalidFont(PathBuf),
}

/// Draws face boxes, plus text labels when a font is available.
#[derive(Default)]
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// Annotator that only draws rectangles.
    pub fn without_labels() -> Self {
        Self { font: None }
    }

    /// Load the label font from `path`.
    pub fn with_font_file(path: &Path) -> Result<Self, AnnotateError> {
        let data = std::fs::read(path).map_err(|source| AnnotateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(data).map_err(|_| AnnotateError::InvalidFont(path.to_path_buf()))?;
        Ok(Self { font: Some(font) })
    }

    /// Use the configured font if given, else the first usable system font.
    ///
    /// Never fails: without a font, labels are skipped and a warning is logged.
    pub fn discover(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::with_font_file(path) {
                Ok(a) => {
                    tracing::info!(path = %path.display(), "label font loaded");
                    return a;
                }
                Err(e) => tracing::warn!(error = %e, "configured label font unusable"),
            }
        }

        for candidate in SYSTEM_FONTS.iter().map(Path::new) {
            if !candidate.exists() {
                continue;
            }
            if let Ok(a) = Self::with_font_file(candidate) {
                tracing::info!(path = %candidate.display(), "label font loaded");
                return a;
            }
        }

        tracing::warn!("no label font found; faces will be boxed without labels");
        Self::without_labels()
    }

    pub fn has_labels(&self) -> bool {
        self.font.is_some()
    }

    /// Draw one face box with its label above the top-left corner.
    pub fn draw_face(&self, image: &mut RgbImage, bbox: &BoundingBox, label: &str, color: Rgb<u8>) {
        let Some((left, top, right, bottom)) = bbox.pixel_bounds(image.width(), image.height()) else {
            tracing::debug!(?bbox, "face box outside image; not drawn");
            return;
        };

        for inset in 0..BOX_THICKNESS {
            let (l, t) = (left + inset, top + inset);
            let (r, b) = (right.saturating_sub(inset), bottom.saturating_sub(inset));
            if r <= l || b <= t {
                break;
            }
            let rect = Rect::at(l as i32, t as i32).of_size(r - l + 1, b - t + 1);
            draw_hollow_rect_mut(image, rect, color);
        }

        if let Some(font) = &self.font {
            let scale = PxScale::from(LABEL_SCALE);
            let y = (top as i32 - LABEL_OFFSET - LABEL_SCALE as i32).max(0);
            draw_text_mut(image, color, left as i32, y, scale, font, label);
        }
    }
}

/// Write an annotated image, picking the format from the file extension.
///
/// Any encode failure in the chosen format is retried as JPEG.
pub fn save_annotated(image: &RgbImage, path: &Path) -> Result<(), ImageError> {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Jpeg);
    match image.save_with_format(path, format) {
        Err(e) if format != ImageFormat::Jpeg => {
            tracing::debug!(path = %path.display(), ?format, error = %e, "format not writable; saving as JPEG");
            image.save_with_format(path, ImageFormat::Jpeg)
        }
        other => other,
    }
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
    fn test_draw_face_box_edges() {
        let mut image = RgbImage::new(64, 64);
        Annotator::without_labels().draw_face(&mut image, &bbox(10.0, 10.0, 20.0, 20.0), "alice", MATCHED_COLOR);

        // Outer and inner edge are drawn, interior stays untouched.
        assert_eq!(image.get_pixel(10, 20), &MATCHED_COLOR);
        assert_eq!(image.get_pixel(11, 20), &MATCHED_COLOR);
        assert_eq!(image.get_pixel(30, 20), &MATCHED_COLOR);
        assert_eq!(image.get_pixel(20, 30), &MATCHED_COLOR);
        assert_eq!(image.get_pixel(20, 20), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_face_clamped_to_image() {
        let mut image = RgbImage::new(32, 32);
        Annotator::without_labels().draw_face(&mut image, &bbox(-8.0, 20.0, 20.0, 40.0), UNKNOWN_LABEL, UNKNOWN_COLOR);
        assert_eq!(image.get_pixel(0, 25), &UNKNOWN_COLOR);
        assert_eq!(image.get_pixel(31, 31), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(12, 31), &UNKNOWN_COLOR);
    }

    #[test]
    fn test_draw_face_outside_is_noop() {
        let mut image = RgbImage::new(16, 16);
        let before = image.clone();
        Annotator::without_labels().draw_face(&mut image, &bbox(40.0, 40.0, 5.0, 5.0), "x", MATCHED_COLOR);
        assert_eq!(image, before);
    }

    #[test]
    fn test_save_annotated_formats() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbImage::from_pixel(8, 8, UNKNOWN_COLOR);

        let png = dir.path().join("output_a.png");
        save_annotated(&image, &png).unwrap();
        assert_eq!(image::open(&png).unwrap().to_rgb8(), image);

        // No usable extension: written as JPEG.
        let bare = dir.path().join("output_noext");
        save_annotated(&image, &bare).unwrap();
        assert_eq!(image::ImageReader::open(&bare).unwrap().with_guessed_format().unwrap().format(), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_save_annotated_falls_back_when_encoder_rejects_image() {
        let dir = tempfile::tempdir().unwrap();
        // ICO cannot hold images wider than 256 px.
        let image = RgbImage::from_pixel(300, 40, MATCHED_COLOR);
        let path = dir.path().join("output_big.ico");

        save_annotated(&image, &path).unwrap();

        let reader = image::ImageReader::open(&path).unwrap().with_guessed_format().unwrap();
        assert_eq!(reader.format(), Some(ImageFormat::Jpeg));
        assert_eq!(reader.decode().unwrap().width(), 300);
    }

    #[test]
    fn test_invalid_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-font.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();

        assert!(matches!(Annotator::with_font_file(&path), Err(AnnotateError::InvalidFont(_))));
        assert!(matches!(
            Annotator::with_font_file(&dir.path().join("missing.ttf")),
            Err(AnnotateError::Io { .. })
        ));
    }

    #[test]
    fn test_discover_falls_back_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        // A bad configured path must not prevent startup.
        let annotator = Annotator::discover(Some(&dir.path().join("missing.ttf")));
        let mut image = RgbImage::new(64, 64);
        annotator.draw_face(&mut image, &bbox(10.0, 40.0, 20.0, 20.0), "a", MATCHED_COLOR);
        assert_eq!(image.get_pixel(20, 60), &MATCHED_COLOR);
    }
}
