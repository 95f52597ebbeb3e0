use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, SessionOutputs, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    HandposeEngine,
    common::{self, HandposeOutput},
    palm::{PalmDetector, PalmDetectorConfig, PalmRegion, crop_from_palm},
};
use crate::types::Frame;

/// Two-stage ONNX pipeline: palm detection, then landmark estimation on a
/// rotated crop around every detected palm.
pub struct OrtEngine {
    handpose: Session,
    palm_detector: PalmDetector,
}

impl OrtEngine {
    pub fn new(handpose_model_path: &Path, palm_detector_model_path: &Path) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_model_path)
            .with_context(|| {
                format!(
                    "failed to load ORT session from {}",
                    handpose_model_path.display()
                )
            })?;

        let palm_detector =
            PalmDetector::new(palm_detector_model_path, PalmDetectorConfig::default())?;

        log::info!(
            "handpose ORT backend ready using {} and palm detector {}",
            handpose_model_path.display(),
            palm_detector_model_path.display()
        );

        Ok(Self {
            handpose,
            palm_detector,
        })
    }

    fn estimate(&mut self, frame: &Frame, palm: &PalmRegion) -> Result<HandposeOutput> {
        let (center, side, angle) = crop_from_palm(palm);
        let (input, transform) =
            common::prepare_rotated_crop(frame, center, side, angle, common::HANDPOSE_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = common::decode_landmarks(&flattened)?;

        Ok(HandposeOutput {
            projected_landmarks: transform.project_landmarks(&landmarks),
            confidence: first_scalar(&outputs, 1),
            handedness: first_scalar(&outputs, 2),
            palm_score: palm.score,
        })
    }
}

fn first_scalar(outputs: &SessionOutputs<'_>, index: usize) -> f32 {
    if outputs.len() <= index {
        return 0.0;
    }
    outputs[index]
        .try_extract_array::<f32>()
        .ok()
        .and_then(|arr| arr.iter().next().copied())
        .unwrap_or(0.0)
}

impl HandposeEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<HandposeOutput>> {
        let palms = self
            .palm_detector
            .detect(frame)
            .context("palm detection failed")?;

        let mut hands = Vec::with_capacity(palms.len());
        for palm in &palms {
            match self.estimate(frame, palm) {
                Ok(hand) => hands.push(hand),
                Err(err) => log::warn!("landmark estimation failed: {err:?}"),
            }
        }
        Ok(hands)
    }
}
