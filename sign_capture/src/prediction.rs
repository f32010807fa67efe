use crate::config::PredictionServiceConfig;
use crate::state::{PLACEHOLDER, SERVER_DOWN};
use bytes::Bytes;
use sign_proto::{read_response, write_request, ProtoError};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::{
    io::BufReader,
    net::TcpStream,
    time::timeout,
};
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictionServiceError {
    #[error("Failed to connect to prediction server: {0}")]
    ConnectionFailed(#[source] std::io::Error),
    #[error("Connecting to prediction server timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("Prediction exchange timed out after {0:?}")]
    ExchangeTimeout(Duration),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtoError),
}

/// Turns one encoded frame into the label to display.
///
/// Implementations never fail: problems are reported through the sentinel
/// labels.
pub trait LabelPredictor: Send + 'static {
    fn predict(&self, image_data: Bytes) -> impl Future<Output = String> + Send;
}

/// Client for the line-answering prediction server.
///
/// Every request uses its own connection, which is closed once the single
/// response line has been read.
#[derive(Debug, Clone)]
pub struct PredictionService {
    address: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl PredictionService {
    pub fn new(config: &PredictionServiceConfig) -> Self {
        Self {
            address: config.get_address(),
            connect_timeout: config.connect_timeout(),
            io_timeout: config.io_timeout(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// One request/response exchange. `Ok(None)` means the server closed the
    /// connection without answering.
    #[instrument(skip(self, image_data), fields(address = %self.address, bytes = image_data.len()))]
    pub async fn request(&self, image_data: &[u8]) -> Result<Option<String>, PredictionServiceError> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| PredictionServiceError::ConnectTimeout(self.connect_timeout))?
            .map_err(PredictionServiceError::ConnectionFailed)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }
        let mut stream = BufReader::new(stream);

        let exchange = async {
            write_request(&mut stream, image_data).await?;
            read_response(&mut stream).await
        };

        let response = timeout(self.io_timeout, exchange)
            .await
            .map_err(|_| PredictionServiceError::ExchangeTimeout(self.io_timeout))??;

        tracing::debug!(response = ?response, "Prediction received");
        Ok(response)
    }
}

impl LabelPredictor for PredictionService {
    async fn predict(&self, image_data: Bytes) -> String {
        label_from_response(self.request(&image_data).await)
    }
}

/// Maps the outcome of an exchange onto the label shown to the user.
pub fn label_from_response(response: Result<Option<String>, PredictionServiceError>) -> String {
    match response {
        Ok(Some(line)) if !line.is_empty() => line.to_uppercase(),
        Ok(_) => PLACEHOLDER.to_string(),
        Err(e) => {
            tracing::warn!("Prediction request failed: {}", e);
            SERVER_DOWN.to_string()
        }
    }
}
