// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterizer — turns an input document into an ordered list of RGB pages.

pub mod image;
pub mod pdf;

use std::sync::Arc;

use docinspect_core::{Document, MediaType, Page, Result};
use tracing::{info, instrument};

use self::pdf::{PageRenderer, PdfiumRenderer};

/// Converts documents into pages.
///
/// Images always yield one page. PDFs yield one page per document page, in
/// document order, rendered through a [`PageRenderer`].
#[derive(Clone)]
pub struct Rasterizer {
    renderer: Arc<dyn PageRenderer>,
    dpi: u32,
}

impl Rasterizer {
    // -- Construction ---------------------------------------------------------

    /// Rasterizer backed by PDFium, rendering PDF pages at `dpi`.
    pub fn new(dpi: u32) -> Self {
        Self::with_renderer(Arc::new(PdfiumRenderer), dpi)
    }

    /// Rasterizer with a caller-supplied PDF page renderer.
    pub fn with_renderer(renderer: Arc<dyn PageRenderer>, dpi: u32) -> Self {
        Self { renderer, dpi }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    // -- Rasterization --------------------------------------------------------

    /// Decode or render every page of `document`.
    ///
    /// Fails with `CorruptFile` if the codec cannot read the document, and
    /// with `Io` if a path-backed document cannot be read at all.
    #[instrument(skip_all, fields(document = %document.name(), media = document.media_type().as_str()))]
    pub fn rasterize(&self, document: &Document) -> Result<Vec<Page>> {
        let bytes = document.read_bytes()?;
        let pages = match document.media_type() {
            MediaType::Image => vec![image::decode_page(document.name(), &bytes)?],
            MediaType::Pdf => {
                pdf::render_pages(document.name(), &bytes, self.renderer.as_ref(), self.dpi)?
            }
        };
        info!(pages = pages.len(), "Document rasterized");
        Ok(pages)
    }
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer").field("dpi", &self.dpi).finish()
    }
}
