// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deterministic stand-in detector.
//
// Box placement and confidences are derived from a SHA-256 digest of the seed
// and the page content, so the same page always yields the same candidates.

use docinspect_core::{BoundingBox, DetectionClass, Page, RawCandidate, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::detector::Detector;

/// Pages narrower or shorter than this produce no candidates.
const MIN_SIDE_PX: u32 = 16;

/// Emits two or three plausible candidates per page.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticDetector {
    seed: u64,
}

impl SyntheticDetector {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn digest(&self, page: &Page) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(page.index.to_le_bytes());
        hasher.update(page.width().to_le_bytes());
        hasher.update(page.height().to_le_bytes());
        hasher.update(page.image.as_raw());
        hasher.finalize().into()
    }
}

impl Detector for SyntheticDetector {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    #[instrument(skip_all, fields(page = page.index))]
    fn detect(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        let (w, h) = (page.width(), page.height());
        if w < MIN_SIDE_PX || h < MIN_SIDE_PX {
            debug!(w, h, "Page too small for synthetic candidates");
            return Ok(Vec::new());
        }

        let mut bytes = ByteStream::new(self.digest(page));
        let count = 2 + usize::from(bytes.byte() % 2);
        let first = usize::from(bytes.byte() % 3);

        let candidates: Vec<RawCandidate> = (0..count)
            .map(|k| {
                let class = DetectionClass::ALL[(first + k) % 3];
                let bbox = place(class, w as f32, h as f32, &mut bytes).clamp_to(w, h);
                let confidence = 0.55 + 0.42 * bytes.unit();
                RawCandidate {
                    class,
                    bbox,
                    confidence,
                }
            })
            .collect();

        debug!(count = candidates.len(), "Synthetic candidates emitted");
        Ok(candidates)
    }
}

/// Class-specific box geometry, as fractions of the page.
///
/// Signatures sit low on the right and are wide and short; stamps are roughly
/// square on the lower left; QR codes are small squares near the top right.
fn place(class: DetectionClass, w: f32, h: f32, bytes: &mut ByteStream) -> BoundingBox {
    let short = w.min(h);
    match class {
        DetectionClass::Signature => {
            let x1 = (0.55 + 0.15 * bytes.unit()) * w;
            let y1 = (0.75 + 0.10 * bytes.unit()) * h;
            let bw = (0.20 + 0.08 * bytes.unit()) * w;
            let bh = (0.05 + 0.03 * bytes.unit()) * h;
            BoundingBox::new(x1, y1, x1 + bw, y1 + bh)
        }
        DetectionClass::Stamp => {
            let x1 = (0.10 + 0.20 * bytes.unit()) * w;
            let y1 = (0.62 + 0.12 * bytes.unit()) * h;
            let side = (0.12 + 0.06 * bytes.unit()) * short;
            let squash = 0.85 + 0.15 * bytes.unit();
            BoundingBox::new(x1, y1, x1 + side, y1 + side * squash)
        }
        DetectionClass::QrCode => {
            let x1 = (0.75 + 0.10 * bytes.unit()) * w;
            let y1 = (0.04 + 0.08 * bytes.unit()) * h;
            let side = (0.08 + 0.04 * bytes.unit()) * short;
            BoundingBox::new(x1, y1, x1 + side, y1 + side)
        }
    }
}

/// Cycles through a digest one byte at a time.
struct ByteStream {
    bytes: [u8; 32],
    pos: usize,
}

impl ByteStream {
    fn new(bytes: [u8; 32]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn byte(&mut self) -> u8 {
        let b = self.bytes[self.pos % self.bytes.len()];
        self.pos += 1;
        b
    }

    /// Next byte mapped to `[0, 1]`.
    fn unit(&mut self) -> f32 {
        f32::from(self.byte()) / 255.0
    }
}
