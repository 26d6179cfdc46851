// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confidence and geometry filtering of raw candidates.

use std::sync::Arc;

use docinspect_core::{ClassConfig, Detection, FilterConfig, RawCandidate};
use tracing::{debug, trace};

/// Turns raw candidates into detections.
///
/// A candidate survives when its confidence reaches its class threshold and
/// its box is geometrically plausible for the page. Everything else is dropped
/// with a trace-level record only.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    classes: Arc<ClassConfig>,
    geometry: FilterConfig,
}

impl DetectionFilter {
    pub fn new(classes: Arc<ClassConfig>, geometry: FilterConfig) -> Self {
        Self { classes, geometry }
    }

    /// Filter the candidates of page `page` (1-based), sized `width` x `height`.
    pub fn apply(
        &self,
        page: u32,
        width: u32,
        height: u32,
        raw: &[RawCandidate],
    ) -> Vec<Detection> {
        let survivors: Vec<Detection> = raw
            .iter()
            .filter(|c| self.passes_threshold(c) && self.passes_geometry(c, width, height))
            .map(|c| Detection {
                class: c.class,
                confidence: c.confidence,
                bbox: c.bbox,
                page,
            })
            .collect();
        debug!(page, raw = raw.len(), kept = survivors.len(), "Candidates filtered");
        survivors
    }

    fn passes_threshold(&self, c: &RawCandidate) -> bool {
        let threshold = self.classes.threshold(c.class);
        let ok = c.confidence >= threshold && c.confidence <= 1.0;
        if !ok {
            trace!(class = %c.class, confidence = c.confidence, threshold, "Below class threshold");
        }
        ok
    }

    fn passes_geometry(&self, c: &RawCandidate, width: u32, height: u32) -> bool {
        let g = &self.geometry;
        let bbox = &c.bbox;
        let page_area = width as f32 * height as f32;

        let reason = if !bbox.is_within(width, height) {
            Some("outside page")
        } else if bbox.area() <= g.min_bbox_area {
            Some("too small")
        } else if bbox.area() > g.max_bbox_ratio * page_area {
            Some("covers too much of the page")
        } else if !(g.min_aspect_ratio..=g.max_aspect_ratio).contains(&bbox.aspect_ratio()) {
            Some("implausible aspect ratio")
        } else {
            None
        };

        if let Some(reason) = reason {
            trace!(class = %c.class, ?bbox, reason, "Rejected by geometry");
        }
        reason.is_none()
    }
}
