//! Fixed tuning values. There is no runtime configuration surface.

use std::path::PathBuf;

pub const CAMERA_WIDTH: u32 = 640;
pub const CAMERA_HEIGHT: u32 = 480;
pub const CAMERA_FPS: u32 = 30;

/// Minimum palm detector score for a hand to be considered.
pub const MIN_DETECTION_CONFIDENCE: f32 = 0.8;
/// Minimum landmark presence score for a detected hand to be tracked.
pub const MIN_TRACKING_CONFIDENCE: f32 = 0.5;
pub const MAX_HANDS: usize = 2;
/// Largest wrist movement between frames, as a fraction of the frame, that
/// still counts as the same hand.
pub const MAX_TRACK_JUMP: f32 = 0.25;
/// Frames a hand may go undetected before its slot and gesture state are dropped.
pub const MAX_MISSED_FRAMES: usize = 5;

pub const CLICK_DISTANCE_THRESHOLD: f32 = 0.05;
pub const SCREENSHOT_DISTANCE_THRESHOLD: f32 = 0.07;
/// Wrist travel in camera pixels needed for one scroll tick.
pub const SCROLL_SENSITIVITY: f32 = 30.0;

pub const SCREENSHOT_PATH: &str = "screenshot.png";
pub const MARKER_RADIUS: i32 = 15;

pub const MODEL_DIR: &str = "models";

/// Thresholds consumed by the gesture classifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureThresholds {
    pub click_distance: f32,
    pub screenshot_distance: f32,
    pub scroll_sensitivity: f32,
}

impl Default for GestureThresholds {
    fn default() -> Self {
        Self {
            click_distance: CLICK_DISTANCE_THRESHOLD,
            screenshot_distance: SCREENSHOT_DISTANCE_THRESHOLD,
            scroll_sensitivity: SCROLL_SENSITIVITY,
        }
    }
}

pub fn screenshot_path() -> PathBuf {
    PathBuf::from(SCREENSHOT_PATH)
}
