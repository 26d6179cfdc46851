// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docinspect-document — Page-level image work for the docinspect pipeline.
//
// Turns documents into RGB pages (image decoding, PDF rendering), cleans pages
// up before detection (deskew, non-local-means denoise), and draws detections
// onto annotated copies.

pub mod annotate;
pub mod preprocess;
pub mod raster;

pub use annotate::Annotator;
pub use preprocess::Preprocessor;
pub use raster::Rasterizer;
pub use raster::pdf::{PageRenderer, PdfiumRenderer};
