//! Per-image matching against the roster.

use crate::annotate::{Annotator, MATCHED_COLOR, UNKNOWN_COLOR, UNKNOWN_LABEL};
use crate::encoder::{compare_faces, EncoderError, FaceEncoder};
use crate::roster::Roster;
use crate::types::{Embedding, FaceMatch};
use image::{DynamicImage, RgbImage};

/// Everything produced by matching one image.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub annotated: RgbImage,
    /// One entry per located face, in detection order.
    pub faces: Vec<FaceMatch>,
    /// Students matched by at least one face, in roster order.
    pub detected: Vec<String>,
    /// The rest of the roster, in roster order.
    pub not_detected: Vec<String>,
}

/// First student (in roster order) with any embedding within `tolerance`.
pub fn find_student<'r>(roster: &'r Roster, probe: &Embedding, tolerance: f32) -> Option<&'r str> {
    roster
        .students()
        .iter()
        .find(|s| compare_faces(&s.embeddings, probe, tolerance).into_iter().any(|m| m))
        .map(|s| s.id.as_str())
}

/// Normalize a decoded image to the 8-bit RGB layout the encoder expects.
pub fn to_encoder_rgb(image: DynamicImage) -> RgbImage {
    image.into_rgb8()
}

/// Locate, embed and match every face in `image`, drawing a labeled box per face.
pub fn detect_and_match<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    roster: &Roster,
    image: RgbImage,
    tolerance: f32,
    annotator: &Annotator,
) -> Result<MatchOutcome, EncoderError> {
    let boxes = encoder.locate(&image)?;
    let embeddings = if boxes.is_empty() {
        Vec::new()
    } else {
        encoder.encode(&image, &boxes)?
    };

    let mut annotated = image;
    let mut matched = vec![false; roster.len()];
    let mut faces = Vec::with_capacity(boxes.len());

    for (bbox, embedding) in boxes.into_iter().zip(embeddings.iter()) {
        let student = find_student(roster, embedding, tolerance);

        match student {
            Some(id) => {
                if let Some(pos) = roster.students().iter().position(|s| s.id == id) {
                    matched[pos] = true;
                }
                annotator.draw_face(&mut annotated, &bbox, id, MATCHED_COLOR);
            }
            None => annotator.draw_face(&mut annotated, &bbox, UNKNOWN_LABEL, UNKNOWN_COLOR),
        }

        faces.push(FaceMatch {
            bbox,
            student_id: student.map(str::to_string),
        });
    }

    let (detected, not_detected): (Vec<_>, Vec<_>) = roster
        .student_ids()
        .zip(matched.iter())
        .partition(|&(_, &hit)| hit);

    let outcome = MatchOutcome {
        annotated,
        faces,
        detected: detected.into_iter().map(|(id, _)| id.to_string()).collect(),
        not_detected: not_detected.into_iter().map(|(id, _)| id.to_string()).collect(),
    };

    tracing::debug!(
        faces = outcome.faces.len(),
        detected = outcome.detected.len(),
        not_detected = outcome.not_detected.len(),
        "image matched"
    );
    Ok(outcome)
}
