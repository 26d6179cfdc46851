// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analyzer — end-to-end document analysis.
//
// Rasterization runs on the blocking pool; each page then runs preprocess,
// detect, filter, and annotate as its own blocking task, bounded by a
// semaphore sized to the worker count. Aggregation waits for every started
// page.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use docinspect_core::{
    AnalysisConfig, AnalysisResult, ClassConfig, DocInspectError, Document, FilterConfig, Page,
    PageState, PreprocessConfig, Result,
};
use docinspect_detect::{DetectionFilter, Detector, InferenceConcurrency, build_detector};
use docinspect_document::{Annotator, PageRenderer, Preprocessor, Rasterizer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{PageOutcome, ResultHeader, aggregate};
use crate::cancel::CancelHandle;

/// Runs analyses with one fixed configuration.
///
/// Construction loads the detector once; the analyzer can then be shared and
/// used for many documents, concurrently if needed.
pub struct Analyzer {
    config: AnalysisConfig,
    rasterizer: Rasterizer,
    worker: Arc<PageWorker>,
}

/// Optional overrides applied when building an [`Analyzer`].
pub struct AnalyzerBuilder {
    config: AnalysisConfig,
    renderer: Option<Arc<dyn PageRenderer>>,
    detector: Option<Arc<dyn Detector>>,
}

impl AnalyzerBuilder {
    /// Render PDF pages with `renderer` instead of PDFium.
    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Use `detector` instead of the one selected from the configuration.
    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn build(self) -> Result<Analyzer> {
        let config = self.config;
        config.validate()?;

        let classes = Arc::new(ClassConfig::from_analysis(&config));
        let detector = match self.detector {
            Some(detector) => detector,
            None => build_detector(&config, Arc::clone(&classes)),
        };
        let inference_lock = (detector.concurrency() == InferenceConcurrency::Exclusive)
            .then(|| Mutex::new(()));

        let annotator = match (&config.output_directory, config.return_annotated) {
            (Some(dir), true) => Some(match &config.font_path {
                Some(font) => Annotator::with_font_path(dir, font)?,
                None => Annotator::new(dir),
            }),
            _ => None,
        };

        let rasterizer = match self.renderer {
            Some(renderer) => Rasterizer::with_renderer(renderer, config.dpi),
            None => Rasterizer::new(config.dpi),
        };

        info!(
            detector = detector.name(),
            workers = config.worker_count(),
            annotate = annotator.is_some(),
            "Analyzer ready"
        );

        Ok(Analyzer {
            rasterizer,
            worker: Arc::new(PageWorker {
                preprocessor: Preprocessor::new(PreprocessConfig::default()),
                filter: DetectionFilter::new(Arc::clone(&classes), FilterConfig::default()),
                detector,
                inference_lock,
                annotator,
                classes,
            }),
            config,
        })
    }
}

impl Analyzer {
    // -- Construction ---------------------------------------------------------

    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: AnalysisConfig) -> AnalyzerBuilder {
        AnalyzerBuilder {
            config,
            renderer: None,
            detector: None,
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Name of the detector variant in use.
    pub fn detector_name(&self) -> &'static str {
        self.worker.detector.name()
    }

    // -- Analysis -------------------------------------------------------------

    /// Analyze `document` to completion.
    pub async fn analyze(&self, document: &Document) -> Result<AnalysisResult> {
        self.analyze_with_cancel(document, &CancelHandle::new()).await
    }

    /// Analyze `document`, stopping early if `cancel` is triggered.
    ///
    /// Cancellation stops new pages from starting, waits for the pages already
    /// running, and returns `Cancelled` without a partial result.
    #[instrument(skip_all, fields(document = %document.name()))]
    pub async fn analyze_with_cancel(
        &self,
        document: &Document,
        cancel: &CancelHandle,
    ) -> Result<AnalysisResult> {
        if cancel.is_cancelled() {
            return Err(DocInspectError::Cancelled);
        }

        let pages = self.rasterize(document).await?;
        let total_pages = pages.len();
        info!(pages = total_pages, "Rasterization complete");

        let outcomes = self.process_pages(document, pages, cancel).await?;

        let header = ResultHeader {
            filename: document.name().to_string(),
            media_type: document.media_type(),
            total_pages,
            annotated: self.worker.annotator.is_some(),
            output_directory: self.config.output_directory.clone(),
            detector: self.worker.detector.name(),
        };
        let result = aggregate(header, outcomes);
        info!(
            processed = result.processed_pages(),
            total = result.total,
            signature = result.summary.signature,
            stamp = result.summary.stamp,
            qr_code = result.summary.qr_code,
            "Analysis complete"
        );
        Ok(result)
    }

    async fn rasterize(&self, document: &Document) -> Result<Vec<Page>> {
        let rasterizer = self.rasterizer.clone();
        let doc = document.clone();
        tokio::task::spawn_blocking(move || rasterizer.rasterize(&doc))
            .await
            .map_err(|err| DocInspectError::CorruptFile {
                name: document.name().to_string(),
                reason: format!("rasterizer task failed: {err}"),
            })?
    }

    async fn process_pages(
        &self,
        document: &Document,
        pages: Vec<Page>,
        cancel: &CancelHandle,
    ) -> Result<Vec<PageOutcome>> {
        let permits = Arc::new(Semaphore::new(self.config.worker_count()));
        let mut tasks = JoinSet::new();

        for page in pages {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|_| DocInspectError::Cancelled)?;
            if cancel.is_cancelled() {
                debug!(next_page = page.index, "Cancellation requested; no further pages scheduled");
                break;
            }

            let worker = Arc::clone(&self.worker);
            let artifact_name =
                Annotator::artifact_name(document.stem(), document.media_type(), page.index);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let index = page.index;
                catch_unwind(AssertUnwindSafe(|| worker.run(page, &artifact_name))).unwrap_or_else(
                    |_| PageOutcome::Skipped {
                        page: index,
                        reason: "page worker panicked".into(),
                    },
                )
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => warn!(error = %err, "Page task did not complete"),
            }
        }

        if cancel.is_cancelled() {
            info!(finished = outcomes.len(), "Analysis cancelled");
            return Err(DocInspectError::Cancelled);
        }
        Ok(outcomes)
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("rasterizer", &self.rasterizer)
            .field("detector", &self.worker.detector.name())
            .finish()
    }
}

// -- Per-page work ------------------------------------------------------------

/// Everything a page task needs, shared read-only across tasks.
struct PageWorker {
    preprocessor: Preprocessor,
    detector: Arc<dyn Detector>,
    /// Serializes inference for detectors with an exclusive context.
    inference_lock: Option<Mutex<()>>,
    filter: DetectionFilter,
    annotator: Option<Annotator>,
    classes: Arc<ClassConfig>,
}

impl PageWorker {
    fn run(&self, page: Page, artifact_name: &str) -> PageOutcome {
        let index = page.index;
        let skipped = |err: DocInspectError| {
            warn!(page = index, error = %err, "Page skipped");
            PageOutcome::Skipped {
                page: index,
                reason: err.to_string(),
            }
        };

        let mut page = match self.preprocessor.process(page) {
            Ok(page) => page,
            Err(err) => return skipped(err),
        };

        let raw = {
            let _guard = self
                .inference_lock
                .as_ref()
                .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));
            self.detector.detect(&page)
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => {
                page.advance(PageState::Errored);
                return skipped(err);
            }
        };
        page.advance(PageState::Detected);

        let detections = self
            .filter
            .apply(page.index, page.width(), page.height(), &raw);
        page.advance(PageState::Filtered);

        let (artifact, note) = match &self.annotator {
            Some(annotator) => {
                match annotator.annotate(&page, &detections, &self.classes, artifact_name) {
                    Ok(path) => {
                        page.advance(PageState::Annotated);
                        (Some(path), None)
                    }
                    Err(err) => {
                        warn!(page = index, error = %err, "Annotated image not written");
                        (None, Some(err.to_string()))
                    }
                }
            }
            None => (None, None),
        };
        page.advance(PageState::Aggregated);

        PageOutcome::Completed {
            page: index,
            detections,
            artifact,
            note,
        }
    }
}
