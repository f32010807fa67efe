use crate::config::CameraConfig;
use opencv::{core::Mat, prelude::*, videoio};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    OpenCameraFailed(opencv::Error),
    #[error("Camera {0} not detected")]
    NotOpened(i32),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
    #[error("Camera returned no frame")]
    FrameNotGrabbed,
    #[error("Camera returned an empty frame")]
    EmptyFrame,
    #[error("Camera already released")]
    Released,
    #[error("Unsupported capture backend `{0}`")]
    UnsupportedBackend(String),
}

/// Capture backend requested from OpenCV. The device may still pick another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraBackend {
    Any,
    DirectShow,
    MediaFoundation,
    V4l2,
    AvFoundation,
}

impl CameraBackend {
    pub fn api_preference(&self) -> i32 {
        match self {
            CameraBackend::Any => videoio::CAP_ANY,
            CameraBackend::DirectShow => videoio::CAP_DSHOW,
            CameraBackend::MediaFoundation => videoio::CAP_MSMF,
            CameraBackend::V4l2 => videoio::CAP_V4L2,
            CameraBackend::AvFoundation => videoio::CAP_AVFOUNDATION,
        }
    }
}

impl FromStr for CameraBackend {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "dshow" => Ok(Self::DirectShow),
            "msmf" => Ok(Self::MediaFoundation),
            "v4l2" => Ok(Self::V4l2),
            "avfoundation" => Ok(Self::AvFoundation),
            other => Err(CameraError::UnsupportedBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device_index: i32,
    pub backend: CameraBackend,
    pub resolution: Option<(u32, u32)>,
}

impl CameraSettings {
    /// Default device, default backend, no resolution hint.
    pub fn default_device() -> Self {
        Self {
            device_index: 0,
            backend: CameraBackend::Any,
            resolution: None,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Result<Self, CameraError> {
        Ok(Self {
            device_index: config.device_index,
            backend: config.backend.parse()?,
            resolution: Some((config.frame_width, config.frame_height)),
        })
    }
}

/// Anything the capture loops can pull frames from.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Mat, CameraError>;

    /// Gives the device back. Calling it more than once is a no-op.
    fn release(&mut self);
}

#[derive(Debug)]
pub struct Camera {
    capture: videoio::VideoCapture,
    device_index: i32,
    released: bool,
}

impl Camera {
    pub fn open(settings: &CameraSettings) -> Result<Self, CameraError> {
        let mut capture =
            videoio::VideoCapture::new(settings.device_index, settings.backend.api_preference())
                .map_err(CameraError::OpenCameraFailed)?;

        if !capture
            .is_opened()
            .map_err(CameraError::OpenCameraFailed)?
        {
            return Err(CameraError::NotOpened(settings.device_index));
        }

        if let Some((width, height)) = settings.resolution {
            apply_hint(&mut capture, videoio::CAP_PROP_FRAME_WIDTH, width, "width");
            apply_hint(&mut capture, videoio::CAP_PROP_FRAME_HEIGHT, height, "height");
        }

        tracing::info!(
            device_index = settings.device_index,
            backend = ?settings.backend,
            "Camera opened"
        );

        Ok(Self {
            capture,
            device_index: settings.device_index,
            released: false,
        })
    }
}

fn apply_hint(capture: &mut videoio::VideoCapture, prop: i32, value: u32, name: &str) {
    match capture.set(prop, value as f64) {
        Ok(true) => {}
        Ok(false) => tracing::debug!("Camera ignored frame {} hint {}", name, value),
        Err(e) => tracing::debug!("Camera rejected frame {} hint {}: {}", name, value, e),
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<Mat, CameraError> {
        if self.released {
            return Err(CameraError::Released);
        }
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(CameraError::ReadFrameFailed)?;
        if !grabbed {
            return Err(CameraError::FrameNotGrabbed);
        }
        if frame.empty() {
            return Err(CameraError::EmptyFrame);
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.capture.release() {
            tracing::warn!("Failed to release camera {}: {}", self.device_index, e);
        } else {
            tracing::info!("Camera {} released", self.device_index);
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_hint_parsing() {
        assert_eq!("DSHOW".parse::<CameraBackend>().unwrap(), CameraBackend::DirectShow);
        assert_eq!("v4l2".parse::<CameraBackend>().unwrap(), CameraBackend::V4l2);
        assert_eq!(CameraBackend::Any.api_preference(), videoio::CAP_ANY);
        assert!(matches!(
            "gstreamer-ish".parse::<CameraBackend>(),
            Err(CameraError::UnsupportedBackend(_))
        ));
    }

    #[test]
    fn test_settings_from_config_carry_resolution_hint() {
        let config = CameraConfig {
            device_index: 1,
            backend: "any".to_string(),
            frame_width: 640,
            frame_height: 480,
        };
        let settings = CameraSettings::from_config(&config).unwrap();

        assert_eq!(settings.device_index, 1);
        assert_eq!(settings.backend, CameraBackend::Any);
        assert_eq!(settings.resolution, Some((640, 480)));
        assert!(CameraSettings::default_device().resolution.is_none());
    }
}
