// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::cmp::Ordering;

use super::DetectionRecord;

/// Per-class non-maximum suppression
///
/// Sorts by confidence (highest first) and drops any box whose IoU with an
/// already kept box of the same class exceeds `iou_threshold`.
pub fn non_max_suppression(boxes: &mut Vec<DetectionRecord>, iou_threshold: f32) {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept = 0;
    for index in 0..boxes.len() {
        let suppressed = (0..kept).any(|prev| {
            boxes[prev].class_id == boxes[index].class_id
                && boxes[prev].iou(&boxes[index]) > iou_threshold
        });
        if !suppressed {
            boxes.swap(kept, index);
            kept += 1;
        }
    }
    boxes.truncate(kept);
}
