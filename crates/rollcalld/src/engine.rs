use image::RgbImage;
use rollcall_core::{detect_and_match, Annotator, EncoderError, FaceEncoder, MatchOutcome, Roster};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Pending match requests before senders start waiting.
const REQUEST_QUEUE_DEPTH: usize = 4;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Match {
        image: RgbImage,
        reply: oneshot::Sender<Result<MatchOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Match every face in `image` against the roster and annotate it.
    pub async fn match_image(&self, image: RgbImage) -> Result<MatchOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Match {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the encoder, which needs exclusive access for inference,
/// and shares the read-only roster with the rest of the server.
pub fn spawn_engine<E>(
    mut encoder: E,
    roster: Arc<Roster>,
    annotator: Annotator,
    tolerance: f32,
) -> Result<EngineHandle, EngineError>
where
    E: FaceEncoder + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(REQUEST_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!(students = roster.len(), tolerance, "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Match { image, reply } => {
                        let result = detect_and_match(&mut encoder, &roster, image, tolerance, &annotator)
                            .map_err(EngineError::from);
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, "match failed");
                        }
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rollcall_core::testing::MarkerEncoder;
    use rollcall_core::StudentRecord;

    fn roster() -> Arc<Roster> {
        Arc::new(Roster::from_records([StudentRecord {
            id: "alice".into(),
            embeddings: vec![MarkerEncoder::embedding(90, 90)],
        }]))
    }

    #[tokio::test]
    async fn test_match_through_engine() {
        let engine = spawn_engine(MarkerEncoder, roster(), Annotator::without_labels(), 0.6).unwrap();

        let mut image = RgbImage::new(32, 32);
        image.put_pixel(4, 4, MarkerEncoder::marker(92, 88));

        let outcome = engine.match_image(image).await.unwrap();
        assert_eq!(outcome.detected, vec!["alice"]);
        assert!(outcome.not_detected.is_empty());
    }

    #[tokio::test]
    async fn test_handles_are_shared() {
        let engine = spawn_engine(MarkerEncoder, roster(), Annotator::without_labels(), 0.6).unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let mut image = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
                    if i % 2 == 0 {
                        image.put_pixel(1, 1, MarkerEncoder::marker(90, 90));
                    }
                    engine.match_image(image).await
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let outcome = task.await.unwrap().unwrap();
            assert_eq!(outcome.detected.is_empty(), i % 2 == 1);
        }
    }
}
