// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docinspect-detect — Finds signatures, stamps, and QR codes on preprocessed
// pages and keeps only the plausible ones.
//
// Two detectors share one capability trait: a trained model (behind the
// `model` feature) and a deterministic synthetic stand-in used when no model
// is configured or the weights cannot be loaded.

pub mod detector;
pub mod filter;
pub mod nms;
pub mod synthetic;
pub mod yolo;

#[cfg(feature = "model")]
pub mod model;

pub use detector::{Detector, InferenceConcurrency, build_detector};
pub use filter::DetectionFilter;
pub use synthetic::SyntheticDetector;

#[cfg(feature = "model")]
pub use model::{ModelDetector, ModelInfo};
