use anyhow::{Context, Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution,
    },
};

use super::{FrameSource, rgba_converter};
use crate::{
    config::{CAMERA_FPS, CAMERA_HEIGHT, CAMERA_WIDTH},
    types::Frame,
};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    let capture = CameraFormat::new(
        Resolution::new(CAMERA_WIDTH, CAMERA_HEIGHT),
        FrameFormat::MJPEG,
        CAMERA_FPS,
    );
    [
        RequestedFormat::with_formats(
            RequestedFormatType::Closest(capture),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(capture)),
        // Some drivers reject anything but their own default; take what we get
        // and let the landmark projection deal with the real size.
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Synchronous webcam reader producing mirrored RGBA frames.
pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self> {
        let camera = build_camera(CameraIndex::Index(index))
            .with_context(|| format!("failed to open camera {index}"))?;
        let resolution = camera.resolution();
        log::info!(
            "camera {} streaming at {}x{} ({:?})",
            camera.info().human_name(),
            resolution.width_x,
            resolution.height_y,
            camera.frame_format()
        );
        Ok(Self { camera })
    }
}

impl FrameSource for CameraSource {
    /// Blocks until the next frame arrives and decodes it. A camera never runs dry.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let buffer = self.camera.frame().context("camera frame read failed")?;
        let frame = rgba_converter::decode_camera_frame(&buffer)
            .context("failed to decode camera frame")?;
        Ok(Some(frame))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            log::warn!("failed to stop camera stream: {err:?}");
        }
    }
}

/// Lists camera names, for diagnostics when opening fails.
pub fn available_cameras() -> Result<Vec<String>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras.into_iter().map(|info| info.human_name()).collect())
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}
