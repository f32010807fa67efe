use crate::model_service::{GestureModel, ModelError};
use bytes::Bytes;
use image::DynamicImage;
use sign_proto::{read_request, write_response, ProtoError};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::instrument;

/// Answered when the model finds no hand in the frame.
pub const NO_HAND_DETECTED: &str = "No hand detected";

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtoError),
    #[error("Decoder task failed: {0}")]
    DecoderTask(#[from] tokio::task::JoinError),
}

pub struct InferenceService<M: GestureModel> {
    model_service: Arc<M>,
    max_frame_bytes: usize,
}

impl<M: GestureModel> Clone for InferenceService<M> {
    fn clone(&self) -> Self {
        Self {
            model_service: self.model_service.clone(),
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

impl<M: GestureModel> InferenceService<M> {
    pub fn new(model_service: M, max_frame_bytes: usize) -> Self {
        Self {
            model_service: Arc::new(model_service),
            max_frame_bytes,
        }
    }

    /// Label for one encoded frame.
    pub async fn predict(&self, image_data: Bytes) -> Result<String, InferenceError> {
        let image = decode_image(image_data).await?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            "Frame decoded"
        );

        let label = self.model_service.recognize(image).await?;
        Ok(label.unwrap_or_else(|| NO_HAND_DETECTED.to_string()))
    }

    /// Answers every frame sent over one connection until the client hangs up.
    ///
    /// Frames that cannot be decoded get no answer. A model failure ends the
    /// connection.
    #[instrument(skip(self, stream))]
    pub async fn serve_connection<S>(&self, mut stream: S, peer: SocketAddr) -> Result<u64, InferenceError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::info!("Client connected");
        let mut answered = 0;

        while let Some(image_data) = read_request(&mut stream, self.max_frame_bytes).await? {
            if image_data.is_empty() {
                continue;
            }

            let label = match self.predict(image_data).await {
                Ok(label) => label,
                Err(InferenceError::Decode(e)) => {
                    tracing::debug!("Skipping undecodable frame: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            write_response(&mut stream, &label).await?;
            answered += 1;
        }

        tracing::info!(answered, "Client disconnected");
        Ok(answered)
    }
}

async fn decode_image(image_data: Bytes) -> Result<DynamicImage, InferenceError> {
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&image_data)).await??;
    Ok(image)
}
