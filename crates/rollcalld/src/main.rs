use anyhow::{Context, Result};
use rollcall_core::{Annotator, OnnxFaceEncoder, Roster};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod pages;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    tracing::info!(?config, "rollcalld starting");
    if rollcall_core::is_strict_tolerance(config.tolerance) {
        tracing::warn!(
            tolerance = config.tolerance,
            "tolerance is very strict for ArcFace embeddings; ROLLCALL_TOLERANCE around 1.0-1.1 is typical"
        );
    }

    for dir in [&config.upload_dir, &config.output_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    // Load models and enroll the roster before serving (fail-fast).
    let mut encoder = OnnxFaceEncoder::load(&config.model_dir)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    let roster = Roster::enroll(&config.roster_dir, &mut encoder)
        .with_context(|| format!("enrolling roster from {}", config.roster_dir.display()))?;
    let roster = Arc::new(roster);

    let annotator = Annotator::discover(config.font_path.as_deref());
    let labels = annotator.has_labels();
    let engine = engine::spawn_engine(encoder, roster.clone(), annotator, config.tolerance)?;

    let state = server::AppState {
        engine,
        roster,
        upload_dir: config.upload_dir.clone(),
        output_dir: config.output_dir.clone(),
        tolerance: config.tolerance,
        labels,
    };
    let app = server::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, "rollcalld ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("rollcalld shutting down");
    Ok(())
}
