use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rollcall_core::annotate::save_annotated;
use rollcall_core::{detect_and_match, to_encoder_rgb, Annotator, OnnxFaceEncoder, Roster, DEFAULT_TOLERANCE};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Rollcall CLI — inspect a roster and match photos offline")]
struct Cli {
    #[command(flatten)]
    shared: Shared,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Shared {
    /// Directory containing det_10g.onnx and w600k_r50.onnx
    #[arg(long, global = true, env = "ROLLCALL_MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    /// Roster root with one folder of photos per student
    #[arg(long, global = true, env = "ROLLCALL_ROSTER_DIR", default_value = "student_faces")]
    roster_dir: PathBuf,

    /// Font used for face labels
    #[arg(long, global = true, env = "ROLLCALL_FONT_PATH")]
    font: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the roster directory and list the students found
    Roster,
    /// Match the faces in a photo against the roster
    Match {
        /// Photo to process
        image: PathBuf,

        /// Where to write the annotated image (default: output_<name> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum embedding distance for a match (lower is stricter)
        #[arg(short, long, env = "ROLLCALL_TOLERANCE", default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Roster => roster(&cli.shared),
        Commands::Match { image, output, tolerance } => {
            let output = output.unwrap_or_else(|| default_output_path(&image));
            run_match(&cli.shared, &image, &output, tolerance)
        }
    }
}

fn load(shared: &Shared) -> Result<(OnnxFaceEncoder, Roster)> {
    let mut encoder = OnnxFaceEncoder::load(&shared.model_dir)
        .with_context(|| format!("loading models from {}", shared.model_dir.display()))?;
    let roster = Roster::enroll(&shared.roster_dir, &mut encoder)
        .with_context(|| format!("enrolling roster from {}", shared.roster_dir.display()))?;
    Ok((encoder, roster))
}

fn roster(shared: &Shared) -> Result<()> {
    let (_, roster) = load(shared)?;

    if shared.json {
        let students: Vec<_> = roster
            .students()
            .iter()
            .map(|s| serde_json::json!({ "id": s.id, "photos": s.embeddings.len() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&students)?);
        return Ok(());
    }

    if roster.is_empty() {
        println!("No students enrolled from {}", shared.roster_dir.display());
        return Ok(());
    }
    for student in roster.students() {
        println!("{:<24} {} photo(s)", student.id, student.embeddings.len());
    }
    println!("{} student(s), {} embedding(s)", roster.len(), roster.embedding_count());
    Ok(())
}

fn run_match(shared: &Shared, image_path: &Path, output: &Path, tolerance: f32) -> Result<()> {
    let (mut encoder, roster) = load(shared)?;

    let image = image::open(image_path).with_context(|| format!("decoding {}", image_path.display()))?;
    let annotator = Annotator::discover(shared.font.as_deref());

    let outcome = detect_and_match(&mut encoder, &roster, to_encoder_rgb(image), tolerance, &annotator)?;
    save_annotated(&outcome.annotated, output).with_context(|| format!("writing {}", output.display()))?;

    if shared.json {
        let report = serde_json::json!({
            "detected": outcome.detected,
            "not_detected": outcome.not_detected,
            "faces": outcome.faces,
            "output": output,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Faces found: {}", outcome.faces.len());
    println!("Detected:     {}", list_or_none(&outcome.detected));
    println!("Not detected: {}", list_or_none(&outcome.not_detected));
    println!("Annotated image: {}", output.display());
    Ok(())
}

/// `dir/photo.jpg` → `dir/output_photo.jpg`
fn default_output_path(image: &Path) -> PathBuf {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.jpg".to_string());
    image.with_file_name(format!("output_{name}"))
}

fn list_or_none(ids: &[String]) -> String {
    if ids.is_empty() {
        "(none)".to_string()
    } else {
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path(Path::new("shots/class.jpg")), PathBuf::from("shots/output_class.jpg"));
        assert_eq!(default_output_path(Path::new("a.png")), PathBuf::from("output_a.png"));
    }

    #[test]
    fn test_parse_match() {
        let cli = Cli::try_parse_from(["rollcall", "match", "class.jpg", "--tolerance", "0.5", "--json"]).unwrap();
        assert!(cli.shared.json);
        match cli.command {
            Commands::Match { image, tolerance, output, .. } => {
                assert_eq!(image, PathBuf::from("class.jpg"));
                assert!((tolerance - 0.5).abs() < 1e-6);
                assert!(output.is_none());
            }
            Commands::Roster => panic!("expected match"),
        }
    }

    #[test]
    fn test_font_is_shared_option() {
        let cli = Cli::try_parse_from(["rollcall", "roster", "--font", "/fonts/a.ttf"]).unwrap();
        assert_eq!(cli.shared.font, Some(PathBuf::from("/fonts/a.ttf")));

        let cli = Cli::try_parse_from(["rollcall", "--font", "/fonts/b.ttf", "match", "class.jpg"]).unwrap();
        assert_eq!(cli.shared.font, Some(PathBuf::from("/fonts/b.ttf")));
    }

    #[test]
    fn test_list_or_none() {
        assert_eq!(list_or_none(&[]), "(none)");
        assert_eq!(list_or_none(&["a".into(), "b".into()]), "a, b");
    }
}
