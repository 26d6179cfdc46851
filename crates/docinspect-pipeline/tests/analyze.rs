// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end analysis tests: images and PDFs through the full page pipeline.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docinspect_core::{
    AnalysisConfig, AnalysisResult, BoundingBox, ClassConfig, DetectionClass, DocInspectError,
    Document, MediaType, Page, RawCandidate, Result,
};
use docinspect_detect::{Detector, InferenceConcurrency};
use docinspect_document::PageRenderer;
use docinspect_pipeline::{AnalysisReport, Analyzer, CancelHandle};
use image::{Rgb, RgbImage};
use lopdf::{Object, dictionary};

// -- Fixtures -----------------------------------------------------------------

/// Small off-white page with a dark block, cheap enough to denoise quickly.
fn scan(width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([245, 245, 240]));
    for y in height / 3..height / 3 + 12 {
        for x in width / 4..width / 2 {
            img.put_pixel(x, y, Rgb([30, 30, 30]));
        }
    }
    img
}

fn write_png(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    scan(100, 140).save(&path).unwrap();
    path
}

fn pdf_with_pages(count: usize) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..count)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Renders every PDF page as a small synthetic scan, varied by page index.
struct ScanRenderer;

impl PageRenderer for ScanRenderer {
    fn render_page(&self, _pdf: &[u8], index: u16, _dpi: u32) -> Result<RgbImage> {
        let mut img = scan(100, 140);
        img.put_pixel(5 + u32::from(index), 5, Rgb([0, 0, 0]));
        Ok(img)
    }
}

/// Returns the same candidates for every page.
struct FixedDetector(Vec<RawCandidate>);

impl Detector for FixedDetector {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn detect(&self, _page: &Page) -> Result<Vec<RawCandidate>> {
        Ok(self.0.clone())
    }
}

/// Fails on one page, succeeds with nothing elsewhere.
struct FailsOnPage(u32);

impl Detector for FailsOnPage {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn detect(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        if page.index == self.0 {
            Err(DocInspectError::page(page.index, "inference failed"))
        } else {
            Ok(Vec::new())
        }
    }
}

/// Records which pages reached detection and cancels the run on the first.
struct CancelsOnFirstPage {
    cancel: CancelHandle,
    started: Mutex<Vec<u32>>,
}

impl Detector for CancelsOnFirstPage {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    fn detect(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        self.started.lock().unwrap().push(page.index);
        if page.index == 1 {
            self.cancel.cancel();
        }
        Ok(Vec::new())
    }
}

/// Claims an exclusive inference context and tracks overlapping calls.
#[derive(Default)]
struct ExclusiveDetector {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Detector for ExclusiveDetector {
    fn name(&self) -> &'static str {
        "exclusive"
    }

    fn concurrency(&self) -> InferenceConcurrency {
        InferenceConcurrency::Exclusive
    }

    fn detect(&self, _page: &Page) -> Result<Vec<RawCandidate>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(25));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

fn assert_invariants(result: &AnalysisResult, width: u32, height: u32) {
    let classes = ClassConfig::default();
    let per_page: usize = result.pages.iter().map(|p| p.detections.len()).sum();
    assert_eq!(result.total, result.summary.total());
    assert_eq!(result.total, per_page);
    for class in DetectionClass::ALL {
        let counted = result.detections().filter(|d| d.class == class).count();
        assert_eq!(result.summary.get(class), counted);
    }
    for d in result.detections() {
        assert!(d.confidence >= classes.threshold(d.class) && d.confidence <= 1.0);
        assert!(d.bbox.is_within(width, height), "{:?} outside page", d.bbox);
    }
}

// -- Scenarios ----------------------------------------------------------------

#[tokio::test]
async fn single_png_without_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "receipt.png");

    let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
    let result = analyzer.analyze(&Document::open(&path).unwrap()).await.unwrap();

    assert_eq!(result.detector, "synthetic");
    assert_eq!(result.media_type, MediaType::Image);
    assert_eq!(result.total_pages, 1);
    assert_eq!(result.processed_pages(), 1);
    assert!(result.total >= 1);
    assert!(result.annotated.is_none());
    assert_invariants(&result, 100, 140);
}

#[tokio::test]
async fn three_page_pdf_keeps_page_order() {
    let analyzer = Analyzer::builder(AnalysisConfig::default())
        .renderer(Arc::new(ScanRenderer))
        .build()
        .unwrap();
    let document = Document::from_bytes("bundle.pdf", "pdf", pdf_with_pages(3)).unwrap();

    let result = analyzer.analyze(&document).await.unwrap();

    assert_eq!(result.total_pages, 3);
    let order: Vec<u32> = result.pages.iter().map(|p| p.page).collect();
    assert_eq!(order, vec![1, 2, 3]);
    for page in &result.pages {
        assert!(page.detections.iter().all(|d| d.page == page.page));
    }
    assert_invariants(&result, 100, 140);
}

#[tokio::test]
async fn docx_is_rejected_before_analysis() {
    let err = Document::open("minutes.docx").unwrap_err();
    assert!(matches!(err, DocInspectError::UnsupportedFormat(ref ext) if ext == ".docx"));
    assert!(err.is_document_fatal());

    let err = Document::from_bytes("minutes.docx", "docx", vec![0u8; 4]).unwrap_err();
    assert!(matches!(err, DocInspectError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn weak_stamp_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "form.png");
    let detector = FixedDetector(vec![
        RawCandidate {
            class: DetectionClass::Stamp,
            bbox: BoundingBox::new(10.0, 10.0, 40.0, 40.0),
            confidence: 0.30,
        },
        RawCandidate {
            class: DetectionClass::Signature,
            bbox: BoundingBox::new(50.0, 100.0, 90.0, 115.0),
            confidence: 0.62,
        },
    ]);

    let analyzer = Analyzer::builder(AnalysisConfig::default())
        .detector(Arc::new(detector))
        .build()
        .unwrap();
    let result = analyzer.analyze(&Document::open(&path).unwrap()).await.unwrap();

    assert_eq!(result.summary.stamp, 0);
    assert_eq!(result.summary.signature, 1);
    assert_eq!(result.total, 1);
}

#[tokio::test]
async fn annotated_images_match_processed_pages() {
    let out = tempfile::tempdir().unwrap();
    let config = AnalysisConfig {
        return_annotated: true,
        output_directory: Some(out.path().to_path_buf()),
        ..Default::default()
    };
    let analyzer = Analyzer::builder(config)
        .renderer(Arc::new(ScanRenderer))
        .build()
        .unwrap();
    let document = Document::from_bytes("deed.pdf", "pdf", pdf_with_pages(2)).unwrap();

    let result = analyzer.analyze(&document).await.unwrap();

    let annotated = result.annotated.clone().unwrap();
    assert_eq!(annotated.len(), result.processed_pages());
    assert!(annotated[0].ends_with("deed_page_001_annotated.jpg"));
    assert!(annotated[1].ends_with("deed_page_002_annotated.jpg"));
    assert!(annotated.iter().all(|p| p.exists()));

    let report = AnalysisReport::from_result(&result);
    assert_eq!(
        report.annotated_images.unwrap(),
        vec!["deed_page_001_annotated.jpg", "deed_page_002_annotated.jpg"]
    );
    assert_eq!(report.output_directory.as_deref(), Some(out.path()));
}

#[tokio::test]
async fn annotated_images_cover_only_processed_pages() {
    let out = tempfile::tempdir().unwrap();
    let config = AnalysisConfig {
        return_annotated: true,
        output_directory: Some(out.path().to_path_buf()),
        ..Default::default()
    };
    let analyzer = Analyzer::builder(config)
        .renderer(Arc::new(ScanRenderer))
        .detector(Arc::new(FailsOnPage(2)))
        .build()
        .unwrap();
    let document = Document::from_bytes("lease.pdf", "pdf", pdf_with_pages(3)).unwrap();

    let result = analyzer.analyze(&document).await.unwrap();

    let annotated = result.annotated.clone().unwrap();
    assert_eq!(result.processed_pages(), 2);
    assert!(result.processed_pages() < result.total_pages);
    assert_eq!(annotated.len(), result.processed_pages());
    assert!(annotated[0].ends_with("lease_page_001_annotated.jpg"));
    assert!(annotated[1].ends_with("lease_page_003_annotated.jpg"));
    assert!(!out.path().join("lease_page_002_annotated.jpg").exists());
}

// -- Concurrency --------------------------------------------------------------

#[tokio::test]
async fn exclusive_detector_never_runs_twice_at_once() {
    let detector = Arc::new(ExclusiveDetector::default());
    let config = AnalysisConfig {
        workers: Some(4),
        ..Default::default()
    };
    let analyzer = Analyzer::builder(config)
        .renderer(Arc::new(ScanRenderer))
        .detector(detector.clone())
        .build()
        .unwrap();
    let document = Document::from_bytes("batch.pdf", "pdf", pdf_with_pages(6)).unwrap();

    let result = analyzer.analyze(&document).await.unwrap();

    assert_eq!(result.processed_pages(), 6);
    assert_eq!(detector.calls.load(Ordering::SeqCst), 6);
    assert_eq!(detector.peak.load(Ordering::SeqCst), 1);
}

// -- Failure handling ---------------------------------------------------------

#[tokio::test]
async fn failing_page_is_skipped_with_a_note() {
    let analyzer = Analyzer::builder(AnalysisConfig::default())
        .renderer(Arc::new(ScanRenderer))
        .detector(Arc::new(FailsOnPage(2)))
        .build()
        .unwrap();
    let document = Document::from_bytes("scan.pdf", "pdf", pdf_with_pages(3)).unwrap();

    let result = analyzer.analyze(&document).await.unwrap();

    assert_eq!(result.total_pages, 3);
    assert_eq!(result.processed_pages(), 2);
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].page, 2);
}

#[tokio::test]
async fn corrupt_image_fails_the_document() {
    let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
    let document = Document::from_bytes("photo.jpg", "jpg", b"\xFF\xD8 truncated".to_vec()).unwrap();

    let err = analyzer.analyze(&document).await.unwrap_err();
    assert!(matches!(err, DocInspectError::CorruptFile { .. }));
}

#[tokio::test]
async fn cancelled_analysis_returns_no_result() {
    let analyzer = Analyzer::builder(AnalysisConfig::default())
        .renderer(Arc::new(ScanRenderer))
        .build()
        .unwrap();
    let document = Document::from_bytes("long.pdf", "pdf", pdf_with_pages(4)).unwrap();
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = analyzer
        .analyze_with_cancel(&document, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DocInspectError::Cancelled));
}

#[tokio::test]
async fn cancelling_mid_run_stops_scheduling_and_returns_no_result() {
    let cancel = CancelHandle::new();
    let detector = Arc::new(CancelsOnFirstPage {
        cancel: cancel.clone(),
        started: Mutex::new(Vec::new()),
    });
    let config = AnalysisConfig {
        workers: Some(1),
        ..Default::default()
    };
    let analyzer = Analyzer::builder(config)
        .renderer(Arc::new(ScanRenderer))
        .detector(detector.clone())
        .build()
        .unwrap();
    let document = Document::from_bytes("long.pdf", "pdf", pdf_with_pages(5)).unwrap();

    let err = analyzer
        .analyze_with_cancel(&document, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, DocInspectError::Cancelled));
    assert_eq!(*detector.started.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "stable.png");
    let config = AnalysisConfig {
        seed: 11,
        ..Default::default()
    };
    let analyzer = Analyzer::new(config).unwrap();
    let document = Document::open(&path).unwrap();

    let first = analyzer.analyze(&document).await.unwrap();
    let second = analyzer.analyze(&document).await.unwrap();
    assert_eq!(first.pages, second.pages);
}

#[tokio::test]
async fn invalid_configuration_is_rejected() {
    let config = AnalysisConfig {
        workers: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        Analyzer::new(config),
        Err(DocInspectError::InvalidConfig(_))
    ));
}
