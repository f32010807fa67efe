mod inference_service;
mod model_service;
mod server;

pub mod config;

pub use inference_service::{InferenceError, InferenceService, NO_HAND_DETECTED};
pub use model_service::{FixedLabelModel, GestureModel, ModelError};
pub use server::{start_server, PredictionServer, ServerError};
