use async_trait::async_trait;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Recognition failed: {0}")]
    RecognitionFailed(String),
}

/// Gesture recognizer behind the prediction server.
///
/// `Ok(None)` means no hand was found in the image.
#[async_trait]
pub trait GestureModel: Send + Sync + 'static {
    async fn recognize(&self, image: DynamicImage) -> Result<Option<String>, ModelError>;
}

/// Answers the same label for every image. Lets the client and the wire
/// protocol be exercised without a recognizer.
#[derive(Debug, Clone, Default)]
pub struct FixedLabelModel {
    label: Option<String>,
}

impl FixedLabelModel {
    pub fn new(label: Option<String>) -> Self {
        Self { label }
    }
}

#[async_trait]
impl GestureModel for FixedLabelModel {
    async fn recognize(&self, _image: DynamicImage) -> Result<Option<String>, ModelError> {
        Ok(self.label.clone())
    }
}
