//! Runs hand detection and gesture classification on still images and writes
//! annotated copies next to them. No cursor is moved.
//!
//! cargo run --example gesture_from_image -- hand.png [more.png ...]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use virtual_mouse::{
    GestureClassifier, GestureSession, ScreenSize,
    config::{CAMERA_HEIGHT, CAMERA_WIDTH},
    pipeline::{Canvas, HandDetector, ModelPaths},
    types::Frame,
};

fn main() -> Result<()> {
    env_logger::init();

    let image_paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if image_paths.is_empty() {
        anyhow::bail!("usage: gesture_from_image <image> [image ...]");
    }

    let mut detector = HandDetector::from_models(&ModelPaths::default())?;
    let classifier = GestureClassifier::new(ScreenSize::new(1920, 1080));

    for path in image_paths {
        let mut frame = load_frame(&path)?;
        detector.reset_tracks();
        let hands = detector
            .detect(&frame)
            .with_context(|| format!("failed to run detection on {}", path.display()))?;

        if hands.is_empty() {
            println!("{} -> no hand", path.display());
            continue;
        }

        let (width, height) = (frame.width, frame.height);
        let mut canvas = Canvas::new(&mut frame.rgba, width, height);
        for hand in &hands {
            let mut session = GestureSession::new();
            let action = classifier.classify(&hand.landmarks, &mut session);
            println!(
                "{} -> hand {} ({:.0}%): {} {:?}",
                path.display(),
                hand.slot,
                hand.confidence * 100.0,
                action.gesture().label(),
                action
            );

            canvas.draw_skeleton(&hand.landmarks.to_pixels(width, height));
            if let Some(mut marker) = classifier.marker(&action, &hand.landmarks) {
                // Markers come in capture coordinates; rescale to this image.
                marker.x = marker.x * width as i32 / CAMERA_WIDTH as i32;
                marker.y = marker.y * height as i32 / CAMERA_HEIGHT as i32;
                canvas.draw_marker(&marker);
            }
        }

        let output = annotated_path(&path);
        image::RgbaImage::from_raw(width, height, frame.rgba)
            .context("annotated buffer has the wrong size")?
            .save(&output)
            .with_context(|| format!("failed to save {}", output.display()))?;
        println!("wrote {}", output.display());
    }

    Ok(())
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Frame::new(image.into_raw(), width, height))
}

fn annotated_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    path.with_file_name(format!("{stem}_gesture.png"))
}
