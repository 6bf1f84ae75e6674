//! Image ingestion service - camera frames into the gesture path
//!
//! Decodes inbound `camera_frame` messages (base64-encoded image bytes),
//! hands the frame to the gesture classifier collaborator, and forwards the
//! resulting observation into the [`GestureController`]. The classifier is a
//! black box behind a trait: decode failures and missing detections surface
//! as an absent observation, never as an error into the hub.

use async_trait::async_trait;
use base64::Engine;
use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::control::{GestureController, GestureDetection};
use crate::services::{HandlerService, ServiceError};

/// External gesture recognizer boundary.
///
/// Implementations receive one decoded frame and report the top prediction,
/// or `None` when nothing was recognized. Implementations must not fail into
/// the caller.
pub trait GestureClassifier: Send {
    fn classify(&mut self, frame: &DynamicImage) -> Option<GestureDetection>;
}

/// Placeholder classifier used until a real recognizer is plugged in.
/// Reports every frame as "no gesture".
pub struct NullClassifier;

impl GestureClassifier for NullClassifier {
    fn classify(&mut self, _frame: &DynamicImage) -> Option<GestureDetection> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct CameraFrameMessage {
    seq: u64,
    /// Base64-encoded image bytes
    data: String,
    timestamp: f64,
}

/// Handler for the `camera_frame` message type.
pub struct ImageService {
    name: String,
    classifier: Box<dyn GestureClassifier>,
    gesture: GestureController,
}

impl ImageService {
    pub fn new(classifier: Box<dyn GestureClassifier>, gesture: GestureController) -> Self {
        info!("ImageService created");
        Self {
            name: "ImageService".to_string(),
            classifier,
            gesture,
        }
    }

    fn decode_frame(&self, frame: &CameraFrameMessage) -> Result<DynamicImage, ServiceError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&frame.data)
            .map_err(|e| ServiceError::DecodeError(format!("seq {}: {}", frame.seq, e)))?;

        image::load_from_memory(&bytes)
            .map_err(|e| ServiceError::ImageError(format!("seq {}: {}", frame.seq, e)))
    }
}

#[async_trait]
impl HandlerService for ImageService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&mut self, message: Value) -> Result<(), ServiceError> {
        let frame: CameraFrameMessage = serde_json::from_value(message)
            .map_err(|e| ServiceError::DecodeError(e.to_string()))?;
        debug!("Handling frame seq {} at {:.2}", frame.seq, frame.timestamp);

        let image = self.decode_frame(&frame)?;
        let detection = self.classifier.classify(&image);
        self.gesture.observe(detection).await;
        Ok(())
    }
}
