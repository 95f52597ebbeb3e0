mod anchors;

use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anchors::generate_anchors;
use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::common::{LetterboxInfo, PALM_INPUT_SIZE, prepare_frame_with_size};
use crate::{
    config::{MAX_HANDS, MIN_DETECTION_CONFIDENCE},
    types::Frame,
};

const PALM_KEYPOINTS: usize = 7;
const BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;
/// Crop side relative to the palm size; the palm box alone would cut off the fingers.
const CROP_EXPANSION: f32 = 2.4;
const MIN_CROP_SIDE: f32 = 80.0;

#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub max_palms: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: MIN_DETECTION_CONFIDENCE,
            nms_threshold: 0.3,
            max_palms: MAX_HANDS,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self {
            session,
            anchors: generate_anchors(),
            cfg,
        })
    }

    /// Palms above the detection threshold, best first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = prepare_frame_with_size(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes = boxes
            .as_slice()
            .ok_or_else(|| anyhow!("palm boxes not contiguous"))?;
        let scores = scores
            .as_slice()
            .ok_or_else(|| anyhow!("palm scores not contiguous"))?;

        decode_palms(boxes, scores, &self.anchors, &letterbox, &self.cfg)
    }
}

/// Turns raw anchor regressions into palm regions in frame pixels.
///
/// `boxes` holds `BOX_FEATURES` (or more) values per anchor, `scores` one
/// logit per anchor.
pub fn decode_palms(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &LetterboxInfo,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    let count = anchors.len().min(scores.len());
    if count == 0 {
        return Ok(Vec::new());
    }
    let stride = boxes.len() / count;
    if stride < BOX_FEATURES {
        return Err(anyhow!(
            "palm box output too small: {} values for {count} anchors",
            boxes.len()
        ));
    }

    let input = PALM_INPUT_SIZE as f32;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let bias = (letterbox.pad_x / letterbox.scale, letterbox.pad_y / letterbox.scale);
    let to_frame = |anchor: [f32; 2], dx: f32, dy: f32| {
        (
            (dx / input + anchor[0]) * scale - bias.0,
            (dy / input + anchor[1]) * scale - bias.1,
        )
    };

    let mut candidates = Vec::new();
    for (idx, (&anchor, &logit)) in anchors.iter().zip(scores).enumerate() {
        let score = sigmoid(logit);
        if score < cfg.score_threshold {
            continue;
        }

        let raw = &boxes[idx * stride..idx * stride + BOX_FEATURES];
        let (cx, cy) = to_frame(anchor, raw[0], raw[1]);
        let (hw, hh) = (raw[2] / input * scale / 2.0, raw[3] / input * scale / 2.0);
        if hw <= 0.0 || hh <= 0.0 {
            continue;
        }

        let max_x = letterbox.orig_w.saturating_sub(1) as f32;
        let max_y = letterbox.orig_h.saturating_sub(1) as f32;
        let bbox = [
            (cx - hw).clamp(0.0, max_x),
            (cy - hh).clamp(0.0, max_y),
            (cx + hw).clamp(0.0, max_x),
            (cy + hh).clamp(0.0, max_y),
        ];
        let keypoints = raw[4..]
            .chunks_exact(2)
            .map(|kp| to_frame(anchor, kp[0], kp[1]))
            .collect();

        candidates.push(PalmRegion {
            bbox,
            keypoints,
            score,
        });
    }

    Ok(nms(candidates, cfg.nms_threshold, cfg.max_palms))
}

/// Square crop around a palm as `(center, side, angle)`, rotated so the
/// fingers point up.
pub fn crop_from_palm(region: &PalmRegion) -> ((f32, f32), f32, f32) {
    let center = if region.keypoints.is_empty() {
        (
            (region.bbox[0] + region.bbox[2]) * 0.5,
            (region.bbox[1] + region.bbox[3]) * 0.5,
        )
    } else {
        let n = region.keypoints.len() as f32;
        let (sx, sy) = region
            .keypoints
            .iter()
            .fold((0.0, 0.0), |acc, p| (acc.0 + p.0, acc.1 + p.1));
        (sx / n, sy / n)
    };

    let base = (region.bbox[2] - region.bbox[0])
        .abs()
        .max((region.bbox[3] - region.bbox[1]).abs());
    let (min_x, max_x, min_y, max_y) = region.keypoints.iter().fold(
        (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
        |acc, (x, y)| (acc.0.min(*x), acc.1.max(*x), acc.2.min(*y), acc.3.max(*y)),
    );
    let spread = if region.keypoints.is_empty() {
        0.0
    } else {
        (max_x - min_x).max(max_y - min_y)
    };
    let side = base.max(spread).max(MIN_CROP_SIDE) * CROP_EXPANSION;

    (center, side, estimate_orientation(region))
}

/// Principal axis of the palm keypoints, turned a quarter so the hand faces up.
pub fn estimate_orientation(region: &PalmRegion) -> f32 {
    let points = &region.keypoints;
    if points.len() < 2 {
        return 0.0;
    }

    let n = points.len() as f32;
    let mean = points
        .iter()
        .fold((0.0, 0.0), |acc, (x, y)| (acc.0 + x / n, acc.1 + y / n));
    let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let (dx, dy) = (x - mean.0, y - mean.1);
        xx += dx * dx / n;
        xy += dx * dy / n;
        yy += dy * dy / n;
    }

    let half_trace = (xx + yy) * 0.5;
    let det = xx * yy - xy * xy;
    let lambda = (half_trace + (half_trace * half_trace - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if xy.abs() > 1e-6 {
        (lambda - yy, xy)
    } else if xx >= yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    vy.atan2(vx) - PI * 0.5
}

fn nms(mut candidates: Vec<PalmRegion>, threshold: f32, limit: usize) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if keep.len() >= limit {
            break;
        }
        if keep.iter().all(|k| iou(&candidate.bbox, &k.bbox) < threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            keypoints: Vec::new(),
            score,
        }
    }

    fn square_letterbox() -> LetterboxInfo {
        LetterboxInfo {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        }
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_abs_diff_eq!(iou(&a, &a), 1.0);
        assert_abs_diff_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        assert_abs_diff_eq!(iou(&a, &[5.0, 0.0, 15.0, 10.0]), 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn nms_keeps_best_of_overlapping_boxes() {
        let kept = nms(
            vec![
                region([0.0, 0.0, 10.0, 10.0], 0.85),
                region([1.0, 1.0, 11.0, 11.0], 0.95),
                region([50.0, 50.0, 60.0, 60.0], 0.9),
                region([100.0, 100.0, 110.0, 110.0], 0.88),
            ],
            0.3,
            2,
        );
        let scores: Vec<f32> = kept.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.95, 0.9]);
    }

    #[test]
    fn decode_skips_low_scores_and_maps_to_frame() {
        let anchors = [[0.5, 0.5], [0.25, 0.25]];
        let mut boxes = vec![0.0; BOX_FEATURES * 2];
        // Anchor 0: 48x48 box shifted 9.6px right of the anchor.
        boxes[0] = 9.6;
        boxes[2] = 48.0;
        boxes[3] = 48.0;
        boxes[BOX_FEATURES + 2] = 48.0;
        boxes[BOX_FEATURES + 3] = 48.0;
        let scores = [4.0, -4.0];

        let palms = decode_palms(
            &boxes,
            &scores,
            &anchors,
            &square_letterbox(),
            &PalmDetectorConfig::default(),
        )
        .unwrap();

        assert_eq!(palms.len(), 1);
        let palm = &palms[0];
        assert_abs_diff_eq!(palm.bbox[0], 81.6, epsilon = 1e-3);
        assert_abs_diff_eq!(palm.bbox[1], 72.0, epsilon = 1e-3);
        assert_abs_diff_eq!(palm.bbox[2], 129.6, epsilon = 1e-3);
        assert_abs_diff_eq!(palm.bbox[3], 120.0, epsilon = 1e-3);
        assert_eq!(palm.keypoints.len(), PALM_KEYPOINTS);
        assert!(palm.score > MIN_DETECTION_CONFIDENCE);
    }

    #[test]
    fn decode_rejects_truncated_boxes() {
        let err = decode_palms(
            &[0.0; 10],
            &[1.0],
            &[[0.5, 0.5]],
            &square_letterbox(),
            &PalmDetectorConfig::default(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn crop_expands_around_keypoint_centroid() {
        let palm = PalmRegion {
            bbox: [100.0, 100.0, 200.0, 200.0],
            keypoints: vec![(140.0, 150.0), (160.0, 150.0)],
            score: 0.9,
        };
        let (center, side, angle) = crop_from_palm(&palm);
        assert_eq!(center, (150.0, 150.0));
        assert_abs_diff_eq!(side, 100.0 * CROP_EXPANSION);
        // Keypoints spread horizontally, so the crop turns a quarter.
        assert_abs_diff_eq!(angle, -PI * 0.5, epsilon = 1e-5);
    }
}
