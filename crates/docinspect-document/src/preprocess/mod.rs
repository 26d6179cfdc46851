// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page preprocessing — skew correction followed by edge-preserving denoising.

pub mod denoise;
pub mod deskew;

use docinspect_core::{DocInspectError, Page, PageState, PreprocessConfig, Result};
use tracing::{debug, instrument};

/// Cleans a page up before detection. Output dimensions equal input dimensions.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Deskew, then denoise, then mark the page `Preprocessed`.
    #[instrument(skip_all, fields(page = page.index))]
    pub fn process(&self, mut page: Page) -> Result<Page> {
        if page.width() == 0 || page.height() == 0 {
            return Err(DocInspectError::page(page.index, "empty raster"));
        }

        let deskewed = deskew::deskew(page.image, &self.config);
        page.image = denoise::non_local_means(
            &deskewed,
            self.config.denoise_strength,
            self.config.template_window,
            self.config.search_window,
        );
        debug!(width = page.width(), height = page.height(), "Page preprocessed");

        page.advance(PageState::Preprocessed);
        Ok(page)
    }
}
