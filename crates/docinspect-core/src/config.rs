// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis configuration and the immutable per-class configuration record.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{DocInspectError, Result};
use crate::types::DetectionClass;

// -- Named constants ----------------------------------------------------------

/// Estimated skew below this magnitude (degrees) leaves the page untouched.
pub const DESKEW_TOLERANCE_DEG: f32 = 0.5;
/// Non-local-means filter strength `h`.
pub const DENOISE_STRENGTH: f32 = 10.0;
/// Side of the square patch compared by the denoiser (odd).
pub const DENOISE_TEMPLATE_WINDOW: u32 = 7;
/// Side of the square neighbourhood searched for similar patches (odd).
pub const DENOISE_SEARCH_WINDOW: u32 = 21;

pub const MIN_BBOX_AREA: f32 = 100.0;
/// Largest fraction of the page a single box may cover.
pub const MAX_BBOX_RATIO: f32 = 0.8;
pub const MIN_ASPECT_RATIO: f32 = 0.1;
pub const MAX_ASPECT_RATIO: f32 = 10.0;

pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_CONFIDENCE: f32 = 0.35;

// -- Class configuration ------------------------------------------------------

/// Threshold, display colour, and model id of one detection class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub class_id: u8,
    pub threshold: f32,
    /// RGB display colour used by the annotator.
    pub color: [u8; 3],
}

/// Process-wide, read-only per-class configuration.
///
/// Built once when the pipeline is constructed and shared by reference with
/// every component that needs thresholds or colours.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassConfig {
    signature: ClassSpec,
    stamp: ClassSpec,
    qr_code: ClassSpec,
}

impl Default for ClassConfig {
    fn default() -> Self {
        Self {
            signature: ClassSpec {
                class_id: 0,
                threshold: 0.35,
                color: [0, 255, 0],
            },
            stamp: ClassSpec {
                class_id: 1,
                threshold: 0.40,
                color: [0, 0, 255],
            },
            qr_code: ClassSpec {
                class_id: 2,
                threshold: 0.45,
                color: [255, 0, 0],
            },
        }
    }
}

impl ClassConfig {
    /// Defaults with the per-class overrides of `config` applied.
    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        let overrides = &config.per_class_thresholds;
        let mut classes = Self::default();
        for class in DetectionClass::ALL {
            if let Some(threshold) = overrides.get(class) {
                classes = classes.with_threshold(class, threshold);
            }
        }
        debug!(?classes, "Class configuration built");
        classes
    }

    /// Copy with one class threshold replaced.
    pub fn with_threshold(mut self, class: DetectionClass, threshold: f32) -> Self {
        self.spec_mut(class).threshold = threshold;
        self
    }

    pub fn spec(&self, class: DetectionClass) -> &ClassSpec {
        match class {
            DetectionClass::Signature => &self.signature,
            DetectionClass::Stamp => &self.stamp,
            DetectionClass::QrCode => &self.qr_code,
        }
    }

    fn spec_mut(&mut self, class: DetectionClass) -> &mut ClassSpec {
        match class {
            DetectionClass::Signature => &mut self.signature,
            DetectionClass::Stamp => &mut self.stamp,
            DetectionClass::QrCode => &mut self.qr_code,
        }
    }

    pub fn threshold(&self, class: DetectionClass) -> f32 {
        self.spec(class).threshold
    }

    pub fn color(&self, class: DetectionClass) -> [u8; 3] {
        self.spec(class).color
    }
}

/// Optional per-class threshold overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerClassThresholds {
    pub signature: Option<f32>,
    pub stamp: Option<f32>,
    pub qr_code: Option<f32>,
}

impl PerClassThresholds {
    pub fn get(&self, class: DetectionClass) -> Option<f32> {
        match class {
            DetectionClass::Signature => self.signature,
            DetectionClass::Stamp => self.stamp,
            DetectionClass::QrCode => self.qr_code,
        }
    }
}

// -- Analysis configuration ---------------------------------------------------

/// The configuration bundle a caller passes with each document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Trained weights; `None` selects the synthetic detector.
    pub model_path: Option<PathBuf>,
    /// Request a GPU inference context (serialized across pages).
    pub use_gpu: bool,
    /// Candidate floor applied by the model before non-maximum suppression.
    pub confidence_threshold: f32,
    pub per_class_thresholds: PerClassThresholds,
    /// Rasterization resolution for PDF pages.
    pub dpi: u32,
    pub return_annotated: bool,
    /// Directory that receives annotated images.
    pub output_directory: Option<PathBuf>,
    /// Seed mixed into the synthetic detector.
    pub seed: u64,
    /// Page worker count; defaults to the available CPU cores.
    pub workers: Option<usize>,
    /// TrueType font for annotation labels; system fonts are tried otherwise.
    pub font_path: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            use_gpu: false,
            confidence_threshold: DEFAULT_CONFIDENCE,
            per_class_thresholds: PerClassThresholds::default(),
            dpi: DEFAULT_DPI,
            return_annotated: false,
            output_directory: None,
            seed: 0,
            workers: None,
            font_path: None,
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values before any work starts.
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);

        if !in_unit(self.confidence_threshold) {
            return Err(DocInspectError::InvalidConfig(format!(
                "confidence_threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        for class in DetectionClass::ALL {
            match self.per_class_thresholds.get(class) {
                Some(t) if !in_unit(t) => {
                    return Err(DocInspectError::InvalidConfig(format!(
                        "{class} threshold {t} outside [0, 1]"
                    )));
                }
                _ => {}
            }
        }
        if !(36..=1200).contains(&self.dpi) {
            return Err(DocInspectError::InvalidConfig(format!(
                "dpi {} outside 36..=1200",
                self.dpi
            )));
        }
        if self.workers == Some(0) {
            return Err(DocInspectError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        if self.return_annotated && self.output_directory.is_none() {
            return Err(DocInspectError::InvalidConfig(
                "return_annotated requires an output_directory".into(),
            ));
        }
        Ok(())
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

// -- Stage configuration ------------------------------------------------------

/// Deskew and denoise parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub deskew_tolerance_deg: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Lower bound on Hough votes; the effective threshold also scales with
    /// the shorter page side.
    pub hough_min_votes: u32,
    pub hough_suppression_radius: u32,
    pub denoise_strength: f32,
    pub template_window: u32,
    pub search_window: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            deskew_tolerance_deg: DESKEW_TOLERANCE_DEG,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_min_votes: 80,
            hough_suppression_radius: 8,
            denoise_strength: DENOISE_STRENGTH,
            template_window: DENOISE_TEMPLATE_WINDOW,
            search_window: DENOISE_SEARCH_WINDOW,
        }
    }
}

/// Geometric plausibility bounds for surviving boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub min_bbox_area: f32,
    pub max_bbox_ratio: f32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_bbox_area: MIN_BBOX_AREA,
            max_bbox_ratio: MAX_BBOX_RATIO,
            min_aspect_ratio: MIN_ASPECT_RATIO,
            max_aspect_ratio: MAX_ASPECT_RATIO,
        }
    }
}

/// Inference geometry and suppression settings of the trained model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Square input side expected by the network.
    pub input_size: u32,
    pub nms_iou: f32,
    pub max_detections: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            nms_iou: 0.4,
            max_detections: 100,
        }
    }
}
