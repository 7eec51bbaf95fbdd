//! Roster enrollment from a directory of per-student photo folders.
//!
//! Layout: `<root>/<student_id>/<photo>.{jpg,jpeg,png,pgm}`. Each photo
//! contributes the embedding of its first located face; photos that cannot
//! be read or contain no face are skipped. Students left with no embeddings
//! are not enrolled at all.

use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::{Embedding, StudentRecord};
use image::{ImageError, ImageReader, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Photo extensions picked up during enrollment (compared case-insensitively).
pub const ROSTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pgm"];

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("roster directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single enrollment photo was skipped.
#[derive(Error, Debug)]
enum PhotoError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(#[from] ImageError),
    #[error("{0}")]
    Encoder(#[from] EncoderError),
}

/// Enrolled students in enrollment order. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: Vec<StudentRecord>,
}

impl Roster {
    /// Build a roster from already computed records.
    ///
    /// Records without embeddings are dropped; a repeated id keeps its first
    /// position and gains the later record's embeddings.
    pub fn from_records(records: impl IntoIterator<Item = StudentRecord>) -> Self {
        let mut students: Vec<StudentRecord> = Vec::new();
        for record in records {
            if record.embeddings.is_empty() {
                continue;
            }
            match students.iter_mut().find(|s| s.id == record.id) {
                Some(existing) => existing.embeddings.extend(record.embeddings),
                None => students.push(record),
            }
        }
        Self { students }
    }

    /// Scan `root` and enroll every student folder found there.
    ///
    /// Folders and photos are visited in name order so the roster order is
    /// stable between runs.
    pub fn enroll<E: FaceEncoder + ?Sized>(root: &Path, encoder: &mut E) -> Result<Self, RosterError> {
        let folders: Vec<(String, PathBuf)> = read_dir_sorted(root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| Some((p.file_name()?.to_str()?.to_string(), p)))
            .collect();

        let mut records = Vec::with_capacity(folders.len());
        for (student_id, folder) in folders {
            let embeddings = enroll_student(&student_id, &folder, encoder)?;
            if embeddings.is_empty() {
                tracing::info!(student = %student_id, "no usable photos; student not enrolled");
                continue;
            }
            tracing::debug!(student = %student_id, photos = embeddings.len(), "student enrolled");
            records.push(StudentRecord { id: student_id, embeddings });
        }

        let roster = Self::from_records(records);
        tracing::info!(
            root = %root.display(),
            students = roster.len(),
            embeddings = roster.embedding_count(),
            "roster enrolled"
        );
        Ok(roster)
    }

    pub fn students(&self) -> &[StudentRecord] {
        &self.students
    }

    pub fn student_ids(&self) -> impl Iterator<Item = &str> {
        self.students.iter().map(|s| s.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Total embeddings across all students.
    pub fn embedding_count(&self) -> usize {
        self.students.iter().map(|s| s.embeddings.len()).sum()
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, RosterError> {
    let io_err = |source| RosterError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}

fn has_roster_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ROSTER_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn enroll_student<E: FaceEncoder + ?Sized>(
    student_id: &str,
    folder: &Path,
    encoder: &mut E,
) -> Result<Vec<Embedding>, RosterError> {
    let mut embeddings = Vec::new();

    for photo in read_dir_sorted(folder)? {
        if !photo.is_file() || !has_roster_extension(&photo) {
            continue;
        }
        match embed_photo(&photo, encoder) {
            Ok(Some(embedding)) => embeddings.push(embedding),
            Ok(None) => {
                tracing::debug!(student = student_id, photo = %photo.display(), "no face found; skipped");
            }
            Err(reason) => {
                tracing::warn!(student = student_id, photo = %photo.display(), %reason, "photo skipped");
            }
        }
    }

    Ok(embeddings)
}

/// Embedding of the first face located in `photo`, if any.
///
/// The decoder is chosen from the file contents, not the extension.
fn embed_photo<E: FaceEncoder + ?Sized>(photo: &Path, encoder: &mut E) -> Result<Option<Embedding>, PhotoError> {
    let image: RgbImage = ImageReader::open(photo)?.with_guessed_format()?.decode()?.to_rgb8();

    let faces = encoder.locate(&image)?;
    let Some(first) = faces.first() else {
        return Ok(None);
    };

    let embeddings = encoder.encode(&image, std::slice::from_ref(first))?;
    Ok(embeddings.into_iter().next())
}
