pub mod common;
pub mod ort;
pub mod palm;

use std::{cmp::Ordering, path::PathBuf};

use anyhow::Result;

use self::common::HandposeOutput;
use crate::{
    config::{MAX_MISSED_FRAMES, MAX_TRACK_JUMP, MIN_TRACKING_CONFIDENCE},
    model_download::{self, ModelKind},
    types::{Frame, HandLandmark, HandLandmarks, Landmark},
};

pub trait HandposeEngine {
    /// Every hand found in `frame`, in frame pixel coordinates.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<HandposeOutput>>;
}

/// A tracked hand ready for gesture classification.
#[derive(Clone, Debug)]
pub struct DetectedHand {
    /// Identity of the hand across frames. Slots are never reused.
    pub slot: usize,
    pub landmarks: HandLandmarks,
    pub confidence: f32,
}

#[derive(Clone, Debug)]
pub struct ModelPaths {
    pub handpose_estimator: PathBuf,
    pub palm_detector: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            handpose_estimator: model_download::default_model_path(ModelKind::HandposeEstimator),
            palm_detector: model_download::default_model_path(ModelKind::PalmDetector),
        }
    }
}

impl ModelPaths {
    /// Downloads any model that is not on disk yet.
    pub fn ensure_ready(&self) -> Result<()> {
        model_download::ensure_model_ready(ModelKind::HandposeEstimator, &self.handpose_estimator)?;
        model_download::ensure_model_ready(ModelKind::PalmDetector, &self.palm_detector)
    }
}

#[derive(Clone, Copy, Debug)]
struct Track {
    slot: usize,
    wrist: Landmark,
    missed: usize,
}

/// Landmark provider: runs a [`HandposeEngine`], keeps the hands it is
/// confident about, normalized to the frame, and follows each hand from frame
/// to frame by its wrist position.
pub struct HandDetector<E> {
    engine: E,
    min_tracking_confidence: f32,
    tracks: Vec<Track>,
    next_slot: usize,
}

impl HandDetector<ort::OrtEngine> {
    pub fn from_models(paths: &ModelPaths) -> Result<Self> {
        paths.ensure_ready()?;
        let engine = ort::OrtEngine::new(&paths.handpose_estimator, &paths.palm_detector)?;
        Ok(Self::new(engine))
    }
}

impl<E: HandposeEngine> HandDetector<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            min_tracking_confidence: MIN_TRACKING_CONFIDENCE,
            tracks: Vec::new(),
            next_slot: 0,
        }
    }

    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedHand>> {
        let outputs = self.engine.infer(frame)?;
        Ok(self.track(outputs, frame.width, frame.height))
    }

    /// Whether `slot` still belongs to a hand seen in the last few frames.
    pub fn is_tracked(&self, slot: usize) -> bool {
        self.tracks.iter().any(|track| track.slot == slot)
    }

    /// Forgets every hand, for callers feeding unrelated images.
    pub fn reset_tracks(&mut self) {
        self.tracks.clear();
    }

    fn track(&mut self, outputs: Vec<HandposeOutput>, width: u32, height: u32) -> Vec<DetectedHand> {
        let mut hands: Vec<(DetectedHand, f32)> = outputs
            .into_iter()
            .filter(|output| {
                let keep = output.confidence >= self.min_tracking_confidence;
                if !keep {
                    log::trace!(
                        "dropping hand with landmark confidence {:.2} (palm {:.2})",
                        output.confidence,
                        output.palm_score
                    );
                }
                keep
            })
            .filter_map(|output| {
                let landmarks =
                    HandLandmarks::from_pixels(&output.projected_landmarks, width, height)?;
                let hand = DetectedHand {
                    slot: 0,
                    landmarks,
                    confidence: output.confidence,
                };
                Some((hand, output.handedness))
            })
            .collect();

        hands.sort_by(|(a, _), (b, _)| {
            let ax = a.landmarks[HandLandmark::Wrist].x;
            let bx = b.landmarks[HandLandmark::Wrist].x;
            ax.partial_cmp(&bx).unwrap_or(Ordering::Equal)
        });

        // Closest hand/track pairs claim each other first.
        let mut pairs = Vec::new();
        for (h, (hand, _)) in hands.iter().enumerate() {
            let wrist = hand.landmarks[HandLandmark::Wrist];
            for (t, track) in self.tracks.iter().enumerate() {
                let jump = wrist.distance_to(&track.wrist);
                if jump <= MAX_TRACK_JUMP {
                    pairs.push((jump, h, t));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let mut matched = vec![false; hands.len()];
        let mut seen = vec![false; self.tracks.len()];
        for (_, h, t) in pairs {
            if matched[h] || seen[t] {
                continue;
            }
            matched[h] = true;
            seen[t] = true;
            let track = &mut self.tracks[t];
            track.wrist = hands[h].0.landmarks[HandLandmark::Wrist];
            track.missed = 0;
            hands[h].0.slot = track.slot;
        }

        for (track, &claimed) in self.tracks.iter_mut().zip(&seen) {
            if !claimed {
                track.missed += 1;
            }
        }
        self.tracks.retain(|track| {
            let alive = track.missed <= MAX_MISSED_FRAMES;
            if !alive {
                log::debug!("hand {} left the frame", track.slot);
            }
            alive
        });

        for ((hand, handedness), matched) in hands.iter_mut().zip(matched) {
            if matched {
                continue;
            }
            hand.slot = self.next_slot;
            self.next_slot += 1;
            self.tracks.push(Track {
                slot: hand.slot,
                wrist: hand.landmarks[HandLandmark::Wrist],
                missed: 0,
            });
            log::debug!(
                "hand {} entered the frame (handedness {:.2})",
                hand.slot,
                handedness
            );
        }

        hands.into_iter().map(|(hand, _)| hand).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    struct FixedEngine(Vec<HandposeOutput>);

    impl HandposeEngine for FixedEngine {
        fn infer(&mut self, _frame: &Frame) -> Result<Vec<HandposeOutput>> {
            Ok(self.0.clone())
        }
    }

    fn hand_at(wrist_x: f32, confidence: f32) -> HandposeOutput {
        let mut points = vec![(320.0, 240.0); 21];
        points[0] = (wrist_x, 400.0);
        HandposeOutput {
            projected_landmarks: points,
            confidence,
            handedness: 0.9,
            palm_score: 0.95,
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0; 640 * 480 * 4], 640, 480)
    }

    #[test]
    fn hands_are_normalized_and_numbered_left_to_right() {
        let mut detector =
            HandDetector::new(FixedEngine(vec![hand_at(480.0, 0.9), hand_at(160.0, 0.8)]));
        let hands = detector.detect(&frame()).unwrap();

        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].slot, 0);
        assert_abs_diff_eq!(hands[0].landmarks[HandLandmark::Wrist].x, 0.25);
        assert_abs_diff_eq!(hands[0].landmarks[HandLandmark::Wrist].y, 400.0 / 480.0);
        assert_eq!(hands[1].slot, 1);
        assert_abs_diff_eq!(hands[1].landmarks[HandLandmark::Wrist].x, 0.75);
    }

    #[test]
    fn low_confidence_hands_are_dropped() {
        let mut detector =
            HandDetector::new(FixedEngine(vec![hand_at(100.0, 0.2), hand_at(500.0, 0.6)]));
        let hands = detector.detect(&frame()).unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].slot, 0);
        assert_abs_diff_eq!(hands[0].confidence, 0.6);
    }

    #[test]
    fn no_hands_is_not_an_error() {
        let mut detector = HandDetector::new(FixedEngine(Vec::new()));
        assert!(detector.detect(&frame()).unwrap().is_empty());
    }

    fn slots(detector: &mut HandDetector<FixedEngine>, hands: Vec<HandposeOutput>) -> Vec<usize> {
        detector.engine.0 = hands;
        detector
            .detect(&frame())
            .unwrap()
            .iter()
            .map(|hand| hand.slot)
            .collect()
    }

    #[test]
    fn slot_survives_other_hand_leaving() {
        let mut detector = HandDetector::new(FixedEngine(Vec::new()));
        assert_eq!(slots(&mut detector, vec![hand_at(160.0, 0.9), hand_at(480.0, 0.9)]), [0, 1]);
        assert_eq!(slots(&mut detector, vec![hand_at(480.0, 0.9)]), [1]);
        assert_eq!(slots(&mut detector, vec![hand_at(485.0, 0.9)]), [1]);
        assert_eq!(slots(&mut detector, vec![hand_at(170.0, 0.9), hand_at(480.0, 0.9)]), [0, 1]);
    }

    #[test]
    fn moving_hand_keeps_its_slot() {
        let mut detector = HandDetector::new(FixedEngine(Vec::new()));
        for x in [100.0, 130.0, 160.0, 190.0, 220.0] {
            assert_eq!(slots(&mut detector, vec![hand_at(x, 0.9)]), [0]);
        }
    }

    #[test]
    fn jump_across_the_frame_is_a_new_hand() {
        let mut detector = HandDetector::new(FixedEngine(Vec::new()));
        assert_eq!(slots(&mut detector, vec![hand_at(100.0, 0.9)]), [0]);
        assert_eq!(slots(&mut detector, vec![hand_at(600.0, 0.9)]), [1]);
        assert!(detector.is_tracked(0));
    }

    #[test]
    fn long_absence_expires_the_slot() {
        let mut detector = HandDetector::new(FixedEngine(Vec::new()));
        assert_eq!(slots(&mut detector, vec![hand_at(100.0, 0.9)]), [0]);
        for _ in 0..MAX_MISSED_FRAMES {
            assert!(slots(&mut detector, Vec::new()).is_empty());
        }
        assert!(detector.is_tracked(0));

        assert!(slots(&mut detector, Vec::new()).is_empty());
        assert!(!detector.is_tracked(0));
        assert_eq!(slots(&mut detector, vec![hand_at(100.0, 0.9)]), [1]);
    }

    #[test]
    fn reset_forgets_every_hand() {
        let mut detector = HandDetector::new(FixedEngine(Vec::new()));
        slots(&mut detector, vec![hand_at(100.0, 0.9)]);
        detector.reset_tracks();
        assert!(!detector.is_tracked(0));
        assert_eq!(slots(&mut detector, vec![hand_at(100.0, 0.9)]), [1]);
    }
}
