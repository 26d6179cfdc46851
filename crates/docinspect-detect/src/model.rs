// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trained-model detector, executed with `rten`.
//
// # Feature Gate
//
// Only available with the `model` feature:
//
// ```toml
// docinspect-detect = { path = "crates/docinspect-detect", features = ["model"] }
// ```
//
// # Weights
//
// Expects a single-input YOLO-style detector converted to the `.rten` format,
// taking a `[1, 3, 640, 640]` RGB tensor scaled to `[0, 1]` and producing a
// `[1, 4 + 3, anchors]` head (see [`crate::yolo`]). Class ids follow
// `signature = 0`, `stamp = 1`, `qr_code = 2`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use docinspect_core::{
    ClassConfig, DetectionClass, DocInspectError, ModelConfig, Page, RawCandidate, Result,
};
use image::imageops::{FilterType, resize};
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::detector::{Detector, InferenceConcurrency};
use crate::nms::non_max_suppression;
use crate::yolo;

/// Description of a loaded model, for diagnostics and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_path: PathBuf,
    pub device: &'static str,
    pub classes: Vec<&'static str>,
    pub class_thresholds: Vec<(&'static str, f32)>,
    pub confidence_threshold: f32,
    pub input_size: u32,
}

/// Detector backed by trained weights. Loaded once, then shared read-only.
pub struct ModelDetector {
    model: Model,
    path: PathBuf,
    config: ModelConfig,
    /// Candidate floor applied before suppression.
    confidence_floor: f32,
    exclusive: bool,
    classes: Arc<ClassConfig>,
}

impl ModelDetector {
    // -- Construction ---------------------------------------------------------

    /// Load weights from `path`. Fails with `ModelLoad` if the file is missing
    /// or cannot be parsed.
    #[instrument(skip(config, classes), fields(path = %path.display()))]
    pub fn load(
        path: &Path,
        use_gpu: bool,
        config: ModelConfig,
        confidence_floor: f32,
        classes: Arc<ClassConfig>,
    ) -> Result<Self> {
        if !path.is_file() {
            return Err(DocInspectError::ModelLoad(format!(
                "weights not found at {}",
                path.display()
            )));
        }
        let model = Model::load_file(path).map_err(|err| {
            DocInspectError::ModelLoad(format!("failed to load {}: {err}", path.display()))
        })?;

        if use_gpu {
            warn!("GPU requested; rten runs on the CPU, inference will be serialized");
        }
        info!(input_size = config.input_size, "Model loaded");

        Ok(Self {
            model,
            path: path.to_path_buf(),
            config,
            confidence_floor,
            exclusive: use_gpu,
            classes,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_path: self.path.clone(),
            device: if self.exclusive { "gpu (cpu fallback)" } else { "cpu" },
            classes: DetectionClass::ALL.iter().map(|c| c.name()).collect(),
            class_thresholds: DetectionClass::ALL
                .iter()
                .map(|&c| (c.name(), self.classes.threshold(c)))
                .collect(),
            confidence_threshold: self.confidence_floor,
            input_size: self.config.input_size,
        }
    }

    // -- Inference ------------------------------------------------------------

    /// Resize to the square model input and lay out as NCHW in `[0, 1]`.
    fn input_tensor(&self, page: &Page) -> NdTensor<f32, 4> {
        let side = self.config.input_size;
        let resized = resize(&page.image, side, side, FilterType::Triangle);
        let plane = (side * side) as usize;

        let mut data = vec![0f32; 3 * plane];
        for (i, px) in resized.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = f32::from(px[c]) / 255.0;
            }
        }
        NdTensor::from_data([1, 3, side as usize, side as usize], data)
    }
}

impl Detector for ModelDetector {
    fn name(&self) -> &'static str {
        "model"
    }

    fn concurrency(&self) -> InferenceConcurrency {
        if self.exclusive {
            InferenceConcurrency::Exclusive
        } else {
            InferenceConcurrency::Shared
        }
    }

    #[instrument(skip_all, fields(page = page.index))]
    fn detect(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        let input = self.input_tensor(page);
        let output: NdTensor<f32, 3> = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|err| DocInspectError::page(page.index, format!("inference failed: {err}")))?
            .try_into()
            .map_err(|err| {
                DocInspectError::page(page.index, format!("unexpected model output: {err:?}"))
            })?;

        let [_, a, b] = output.shape();
        // Some exports emit [1, anchors, 4 + classes]; bring those into row layout.
        let (head, anchors) = if a > b {
            (output.permuted([0, 2, 1]).to_vec(), a)
        } else {
            (output.to_vec(), b)
        };

        let side = self.config.input_size as f32;
        let scale_x = page.width() as f32 / side;
        let scale_y = page.height() as f32 / side;
        let decoded = yolo::decode(&head, anchors, scale_x, scale_y, self.confidence_floor);
        let decoded_count = decoded.len();

        let kept: Vec<RawCandidate> =
            non_max_suppression(decoded, self.config.nms_iou, self.config.max_detections)
                .into_iter()
                .map(|mut c| {
                    c.bbox = c.bbox.clamp_to(page.width(), page.height());
                    c
                })
                .collect();

        debug!(decoded = decoded_count, kept = kept.len(), "Model inference complete");
        Ok(kept)
    }
}

impl std::fmt::Debug for ModelDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDetector")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("exclusive", &self.exclusive)
            .finish()
    }
}
