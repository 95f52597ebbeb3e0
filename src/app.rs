use std::{io::BufRead, thread};

use crossbeam_channel::{Receiver, TryRecvError, bounded};

use crate::{
    actions::ActionExecutor,
    gesture::Gesture,
    mouse::VirtualMouse,
    pipeline::{FrameSource, HandDetector, HandposeEngine},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: usize,
    pub skipped_frames: usize,
    pub hands: usize,
    pub failed_actions: usize,
}

/// Opens the webcam, the models and the input backend, then runs until the
/// user types `q`.
#[cfg(feature = "camera-nokhwa")]
pub fn run() -> anyhow::Result<()> {
    use anyhow::Context;

    use crate::{
        actions::DesktopExecutor,
        config::CAMERA_WIDTH,
        pipeline::{CameraSource, ModelPaths, available_cameras},
    };

    let mut detector = HandDetector::from_models(&ModelPaths::default())
        .context("failed to prepare hand landmark models")?;

    let mut camera = match CameraSource::open(0) {
        Ok(camera) => camera,
        Err(err) => {
            match available_cameras() {
                Ok(names) => log::error!("available cameras: {names:?}"),
                Err(query_err) => log::error!("failed to list cameras: {query_err:?}"),
            }
            return Err(err);
        }
    };

    let executor = DesktopExecutor::new().context("failed to start the input backend")?;
    let mut mouse = VirtualMouse::new(executor).context("failed to query the screen size")?;

    let quit = spawn_quit_listener();
    log::info!(
        "virtual mouse running on a {CAMERA_WIDTH}px wide capture, type q and press Enter to exit"
    );

    let stats = run_loop(&mut camera, &mut detector, &mut mouse, &quit);
    log::info!(
        "stopped after {} frames ({} skipped, {} hands, {} failed actions)",
        stats.frames,
        stats.skipped_frames,
        stats.hands,
        stats.failed_actions
    );
    Ok(())
}

/// Processes frames one at a time until `quit` fires or the source runs dry.
///
/// Every per-frame failure is logged and skipped.
pub fn run_loop<S, E, X>(
    source: &mut S,
    detector: &mut HandDetector<E>,
    mouse: &mut VirtualMouse<X>,
    quit: &Receiver<()>,
) -> LoopStats
where
    S: FrameSource,
    E: HandposeEngine,
    X: ActionExecutor,
{
    let mut stats = LoopStats::default();

    loop {
        match quit.try_recv() {
            Ok(()) => {
                log::info!("quit requested");
                break;
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                log::warn!("ignoring empty camera frame: {err:#}");
                stats.skipped_frames += 1;
                continue;
            }
        };

        let hands = match detector.detect(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("hand detection failed: {err:#}");
                stats.skipped_frames += 1;
                continue;
            }
        };

        mouse.retain_hands(|slot| detector.is_tracked(slot));

        for hand in &hands {
            match mouse.update(hand.slot, &hand.landmarks) {
                Ok(report) if report.action.gesture() != Gesture::Idle => {
                    log::trace!(
                        "hand {} -> {:?} marker {:?} after {:?}",
                        report.slot,
                        report.action,
                        report.marker,
                        frame.timestamp.elapsed()
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("hand {}: action failed: {err}", hand.slot);
                    stats.failed_actions += 1;
                }
            }
        }

        stats.frames += 1;
        stats.hands += hands.len();
    }

    stats
}

/// Watches standard input for a line reading `q`.
pub fn spawn_quit_listener() -> Receiver<()> {
    let (quit_tx, quit_rx) = bounded(1);
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if is_quit_command(&line) => {
                    let _ = quit_tx.send(());
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("stopped reading stdin: {err}");
                    return;
                }
            }
        }
    });
    quit_rx
}

pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}
