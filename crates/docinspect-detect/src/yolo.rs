// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoding of YOLO-style detection heads.
//
// The head output has shape `[4 + classes, anchors]` (batch dimension already
// dropped): rows 0..4 hold box centre x, centre y, width, and height in model
// input pixels; the remaining rows hold one score per class.

use docinspect_core::{BoundingBox, DetectionClass, RawCandidate};

/// Decode every anchor whose best class score reaches `floor`.
///
/// `scale_x` / `scale_y` map model input pixels back to page pixels. Anchors
/// whose best class id is unknown are skipped.
pub fn decode(
    output: &[f32],
    anchors: usize,
    scale_x: f32,
    scale_y: f32,
    floor: f32,
) -> Vec<RawCandidate> {
    let rows = if anchors == 0 { 0 } else { output.len() / anchors };
    if rows <= 4 {
        return Vec::new();
    }
    let at = |row: usize, anchor: usize| output[row * anchors + anchor];

    (0..anchors)
        .filter_map(|i| {
            let (class_id, score) = (4..rows)
                .map(|row| (row - 4, at(row, i)))
                .max_by(|a, b| a.1.total_cmp(&b.1))?;
            if score < floor {
                return None;
            }
            let class = DetectionClass::from_id(class_id)?;

            let (cx, cy, bw, bh) = (at(0, i), at(1, i), at(2, i), at(3, i));
            let bbox = BoundingBox::new(
                (cx - bw / 2.0) * scale_x,
                (cy - bh / 2.0) * scale_y,
                (cx + bw / 2.0) * scale_x,
                (cy + bh / 2.0) * scale_y,
            );
            Some(RawCandidate {
                class,
                bbox,
                confidence: score.clamp(0.0, 1.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two anchors, three classes, laid out row-major.
    fn head() -> Vec<f32> {
        vec![
            100.0, 300.0, // cx
            50.0, 400.0, // cy
            40.0, 60.0, // w
            20.0, 60.0, // h
            0.10, 0.05, // signature
            0.80, 0.20, // stamp
            0.05, 0.30, // qr_code
        ]
    }

    #[test]
    fn boxes_are_scaled_to_page_pixels() {
        let out = decode(&head(), 2, 2.0, 3.0, 0.25);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].class, DetectionClass::Stamp);
        assert_eq!(out[0].bbox, BoundingBox::new(160.0, 120.0, 240.0, 180.0));
        assert_eq!(out[1].class, DetectionClass::QrCode);
    }

    #[test]
    fn weak_anchors_are_dropped() {
        let out = decode(&head(), 2, 1.0, 1.0, 0.5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.80);
    }

    #[test]
    fn malformed_heads_decode_to_nothing() {
        assert!(decode(&[], 0, 1.0, 1.0, 0.1).is_empty());
        assert!(decode(&[1.0; 8], 2, 1.0, 1.0, 0.1).is_empty());
    }
}
