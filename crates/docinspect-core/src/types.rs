// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the document analysis pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{DocInspectError, Result};

// -- Detection classes --------------------------------------------------------

/// The three artifact classes the pipeline localizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Signature,
    Stamp,
    QrCode,
}

impl DetectionClass {
    /// All classes in class-id order.
    pub const ALL: [DetectionClass; 3] = [Self::Signature, Self::Stamp, Self::QrCode];

    /// Numeric class id used by the trained model (0, 1, 2).
    pub fn id(&self) -> u8 {
        match self {
            Self::Signature => 0,
            Self::Stamp => 1,
            Self::QrCode => 2,
        }
    }

    /// Map a model class id back to a class.
    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    /// Wire name (`signature`, `stamp`, `qr_code`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Stamp => "stamp",
            Self::QrCode => "qr_code",
        }
    }
}

impl std::fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// -- Geometry -----------------------------------------------------------------

/// Axis-aligned box `(x1, y1, x2, y2)` in page pixel coordinates.
///
/// Serialized as a four-element array to match the report format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Width over height; zero for a box without height.
    pub fn aspect_ratio(&self) -> f32 {
        let h = self.height();
        if h == 0.0 { 0.0 } else { self.width() / h }
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x_min = self.x1.max(other.x1);
        let y_min = self.y1.max(other.y1);
        let x_max = self.x2.min(other.x2);
        let y_max = self.y2.min(other.y2);

        if x_max <= x_min || y_max <= y_min {
            return 0.0;
        }

        let intersection = (x_max - x_min) * (y_max - y_min);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 { intersection / union } else { 0.0 }
    }

    /// Clamp all four coordinates into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }

    /// `0 <= x1 < x2 <= width` and `0 <= y1 < y2 <= height`.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        let finite = [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite());
        finite
            && 0.0 <= self.x1
            && self.x1 < self.x2
            && self.x2 <= width as f32
            && 0.0 <= self.y1
            && self.y1 < self.y2
            && self.y2 <= height as f32
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

// -- Detections ---------------------------------------------------------------

/// Unfiltered detector output for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandidate {
    pub class: DetectionClass,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// A candidate that survived filtering, tagged with its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class: DetectionClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// 1-based page index.
    pub page: u32,
}

/// Per-class detection counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub signature: usize,
    pub stamp: usize,
    pub qr_code: usize,
}

impl Summary {
    pub fn record(&mut self, class: DetectionClass) {
        match class {
            DetectionClass::Signature => self.signature += 1,
            DetectionClass::Stamp => self.stamp += 1,
            DetectionClass::QrCode => self.qr_code += 1,
        }
    }

    pub fn get(&self, class: DetectionClass) -> usize {
        match class {
            DetectionClass::Signature => self.signature,
            DetectionClass::Stamp => self.stamp,
            DetectionClass::QrCode => self.qr_code,
        }
    }

    pub fn total(&self) -> usize {
        self.signature + self.stamp + self.qr_code
    }
}

// -- Documents ----------------------------------------------------------------

/// Declared media type of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Pdf,
}

impl MediaType {
    /// Infer the media type from a file extension (`png`, `jpg`, `jpeg`, `pdf`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }
}

/// Where the document bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// An input document awaiting rasterization.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name used for reporting and artifact naming.
    name: String,
    source: DocumentSource,
    media_type: MediaType,
}

impl Document {
    /// Describe a document on disk. The extension decides the media type.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let media_type = MediaType::from_extension(ext)
            .ok_or_else(|| DocInspectError::UnsupportedFormat(format!(".{ext}")))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            source: DocumentSource::Path(path.to_path_buf()),
            media_type,
        })
    }

    /// Describe an in-memory document with its declared extension.
    pub fn from_bytes(
        name: impl Into<String>,
        extension: &str,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self> {
        let media_type = MediaType::from_extension(extension).ok_or_else(|| {
            DocInspectError::UnsupportedFormat(format!(".{}", extension.trim_start_matches('.')))
        })?;
        Ok(Self {
            name: name.into(),
            source: DocumentSource::Bytes(data.into()),
            media_type,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its extension, used to derive artifact names.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    pub fn source(&self) -> &DocumentSource {
        &self.source
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Read the raw document bytes.
    pub fn read_bytes(&self) -> Result<Arc<[u8]>> {
        match &self.source {
            DocumentSource::Path(path) => Ok(std::fs::read(path)?.into()),
            DocumentSource::Bytes(data) => Ok(Arc::clone(data)),
        }
    }
}

// -- Pages --------------------------------------------------------------------

/// Processing state of a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageState {
    Ingested,
    Preprocessed,
    Detected,
    Filtered,
    Annotated,
    Aggregated,
    Errored,
}

impl PageState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: PageState) -> bool {
        use PageState::*;
        matches!(
            (self, next),
            (Ingested, Preprocessed)
                | (Preprocessed, Detected)
                | (Detected, Filtered)
                | (Filtered, Annotated)
                | (Filtered, Aggregated)
                | (Annotated, Aggregated)
                | (Ingested, Errored)
                | (Preprocessed, Errored)
        )
    }
}

/// One rasterized page owned by a pipeline run.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page index matching document order.
    pub index: u32,
    pub image: RgbImage,
    state: PageState,
}

impl Page {
    pub fn new(index: u32, image: RgbImage) -> Self {
        Self {
            index,
            image,
            state: PageState::Ingested,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Move the page to its next processing state.
    pub fn advance(&mut self, next: PageState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal page transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(page = self.index, from = ?self.state, to = ?next, "page state");
        self.state = next;
    }
}

// -- Results ------------------------------------------------------------------

/// Filtered detections of one page, in detector order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDetections {
    pub page: u32,
    pub detections: Vec<Detection>,
}

/// Diagnostic recorded for a skipped page or a failed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNote {
    pub page: u32,
    pub message: String,
}

/// Final, immutable outcome of one document analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub filename: String,
    pub media_type: MediaType,
    /// Pages produced by the rasterizer.
    pub total_pages: usize,
    /// Pages that completed the pipeline, in page order.
    pub pages: Vec<PageDetections>,
    pub summary: Summary,
    pub total: usize,
    /// Annotated artifact references in page order, when annotation was requested.
    pub annotated: Option<Vec<PathBuf>>,
    pub output_directory: Option<PathBuf>,
    pub notes: Vec<PageNote>,
    /// Which detector variant produced the candidates.
    pub detector: &'static str,
}

impl AnalysisResult {
    /// Number of ingested pages that contributed to the result.
    pub fn processed_pages(&self) -> usize {
        self.pages.len()
    }

    /// Iterate all detections in page order.
    pub fn detections(&self) -> impl Iterator<Item = &Detection> {
        self.pages.iter().flat_map(|p| p.detections.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_round_trip() {
        for class in DetectionClass::ALL {
            assert_eq!(DetectionClass::from_id(class.id() as usize), Some(class));
        }
        assert_eq!(DetectionClass::from_id(3), None);
    }

    #[test]
    fn class_serializes_as_wire_name() {
        let json = serde_json::to_string(&DetectionClass::QrCode).unwrap();
        assert_eq!(json, "\"qr_code\"");
    }

    #[test]
    fn bbox_serializes_as_array() {
        let bbox = BoundingBox::new(1.0, 2.0, 30.0, 40.0);
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[1.0,2.0,30.0,40.0]");
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);

        let half = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_keeps_box_inside_page() {
        let bbox = BoundingBox::new(-5.0, 10.0, 120.0, 90.0).clamp_to(100, 80);
        assert_eq!(bbox, BoundingBox::new(0.0, 10.0, 100.0, 80.0));
        assert!(bbox.is_within(100, 80));
    }

    #[test]
    fn degenerate_box_is_not_within() {
        assert!(!BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_within(100, 100));
        assert!(!BoundingBox::new(0.0, 0.0, f32::NAN, 5.0).is_within(100, 100));
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(MediaType::from_extension("PNG"), Some(MediaType::Image));
        assert_eq!(MediaType::from_extension(".jpeg"), Some(MediaType::Image));
        assert_eq!(MediaType::from_extension("pdf"), Some(MediaType::Pdf));
        assert_eq!(MediaType::from_extension("docx"), None);
        assert_eq!(MediaType::from_extension("tiff"), None);
    }

    #[test]
    fn open_rejects_unknown_extension() {
        let err = Document::open("contract.docx").unwrap_err();
        assert!(matches!(err, DocInspectError::UnsupportedFormat(ext) if ext == ".docx"));
    }

    #[test]
    fn document_stem_strips_extension() {
        let doc = Document::from_bytes("invoice.scan.pdf", "pdf", vec![0u8; 4]).unwrap();
        assert_eq!(doc.stem(), "invoice.scan");
        assert_eq!(doc.media_type(), MediaType::Pdf);
    }

    #[test]
    fn page_state_transitions() {
        assert!(PageState::Ingested.can_advance_to(PageState::Preprocessed));
        assert!(PageState::Filtered.can_advance_to(PageState::Aggregated));
        assert!(PageState::Preprocessed.can_advance_to(PageState::Errored));
        assert!(!PageState::Filtered.can_advance_to(PageState::Errored));
        assert!(!PageState::Ingested.can_advance_to(PageState::Detected));
    }

    #[test]
    fn summary_totals() {
        let mut summary = Summary::default();
        summary.record(DetectionClass::Stamp);
        summary.record(DetectionClass::Stamp);
        summary.record(DetectionClass::QrCode);
        assert_eq!(summary.get(DetectionClass::Stamp), 2);
        assert_eq!(summary.total(), 3);
    }
}
