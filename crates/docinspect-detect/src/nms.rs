// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-class non-maximum suppression.

use docinspect_core::RawCandidate;

/// Keep the strongest candidate among same-class boxes overlapping by more
/// than `iou_threshold`, returning at most `max_detections` in descending
/// confidence order.
pub fn non_max_suppression(
    mut candidates: Vec<RawCandidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawCandidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawCandidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class == candidate.class && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
