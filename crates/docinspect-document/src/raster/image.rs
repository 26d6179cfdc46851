// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster image decoding (PNG, JPEG).

use docinspect_core::{DocInspectError, Page, Result};
use tracing::debug;

/// Decode an image file into its single page.
pub fn decode_page(name: &str, data: &[u8]) -> Result<Page> {
    let decoded = ::image::load_from_memory(data).map_err(|err| DocInspectError::CorruptFile {
        name: name.to_string(),
        reason: err.to_string(),
    })?;
    let rgb = decoded.to_rgb8();
    debug!(width = rgb.width(), height = rgb.height(), "Image decoded");
    Ok(Page::new(1, rgb))
}
