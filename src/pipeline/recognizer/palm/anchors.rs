//! SSD anchor centers of the 192x192 palm detection model.

use crate::pipeline::recognizer::common::PALM_INPUT_SIZE;

/// (stride, anchors per cell) for each feature map, layers sharing a stride
/// already merged.
const FEATURE_MAPS: [(u32, usize); 2] = [(8, 2), (16, 6)];

pub const NUM_ANCHORS: usize = 2016;

/// Anchor centers in normalized input coordinates, in model output order.
pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (stride, per_cell) in FEATURE_MAPS {
        let cells = PALM_INPUT_SIZE.div_ceil(stride);
        for y in 0..cells {
            let cy = (y as f32 + 0.5) / cells as f32;
            for x in 0..cells {
                let cx = (x as f32 + 0.5) / cells as f32;
                anchors.extend(std::iter::repeat_n([cx, cy], per_cell));
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_table_matches_model_layout() {
        let anchors = generate_anchors();
        assert_eq!(anchors.len(), NUM_ANCHORS);
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[0], anchors[1]);
        assert_eq!(anchors[2], [1.5 / 24.0, 0.5 / 24.0]);
        // First anchor of the 12x12 map follows the 24x24 map's 1152 anchors.
        assert_eq!(anchors[1152], [0.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(anchors[NUM_ANCHORS - 1], [11.5 / 12.0, 11.5 / 12.0]);
    }
}
