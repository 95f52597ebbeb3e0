#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod overlay;
pub mod recognizer;
pub mod rgba_converter;

#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraSource, available_cameras};
pub use overlay::Canvas;
pub use recognizer::{DetectedHand, HandDetector, HandposeEngine, ModelPaths};

use anyhow::Result;

use crate::types::Frame;

/// Something that yields camera frames one at a time.
pub trait FrameSource {
    /// `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
