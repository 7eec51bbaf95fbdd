use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on (default: 127.0.0.1:5000).
    pub bind: SocketAddr,
    /// Where raw uploads are stored under their original file name.
    pub upload_dir: PathBuf,
    /// Where annotated images are written as `output_<name>`.
    pub output_dir: PathBuf,
    /// Roster root: one subdirectory of photos per student.
    pub roster_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum embedding distance for a face to match a student.
    pub tolerance: f32,
    /// Font used for face labels; system fonts are searched when unset.
    pub font_path: Option<PathBuf>,
    /// Upper bound on the multipart request body.
    pub max_upload_bytes: usize,
}

const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 5000);
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str, default: &str| var(key).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default));
        Self {
            bind: parse_var(&var, "ROLLCALL_BIND").unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND)),
            upload_dir: path("ROLLCALL_UPLOAD_DIR", "uploads"),
            output_dir: path("ROLLCALL_OUTPUT_DIR", "outputs"),
            roster_dir: path("ROLLCALL_ROSTER_DIR", "student_faces"),
            model_dir: var("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(rollcall_core::default_model_dir),
            tolerance: parse_var(&var, "ROLLCALL_TOLERANCE")
                .filter(|t: &f32| t.is_finite() && *t >= 0.0)
                .unwrap_or(rollcall_core::DEFAULT_TOLERANCE),
            font_path: var("ROLLCALL_FONT_PATH").filter(|v| !v.is_empty()).map(PathBuf::from),
            max_upload_bytes: parse_var(&var, "ROLLCALL_MAX_UPLOAD_BYTES").unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.trim().parse().ok())
}
