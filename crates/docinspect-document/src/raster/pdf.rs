// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF rasterization — structure checks with `lopdf`, page rendering through
// PDFium (loaded at runtime).

use docinspect_core::{DocInspectError, Page, Result};
use image::RgbImage;
use pdfium_render::prelude::*;
use tracing::{debug, instrument, warn};

/// Upper bound on either side of a rendered page, in pixels.
const MAX_DIMENSION_PX: u32 = 8192;

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to RGB rasters.
pub trait PageRenderer: Send + Sync {
    /// Render the zero-based page `index` of `pdf` at `dpi`.
    fn render_page(&self, pdf: &[u8], index: u16, dpi: u32) -> Result<RgbImage>;

    /// Render the first `page_count` pages of `pdf` in order.
    ///
    /// Renderers that parse the document themselves should override this to
    /// parse it once.
    fn render_all(&self, pdf: &[u8], page_count: u16, dpi: u32) -> Result<Vec<RgbImage>> {
        (0..page_count)
            .map(|index| self.render_page(pdf, index, dpi))
            .collect()
    }
}

/// Validate `data` as a PDF and render every page in order.
#[instrument(skip(data, renderer), fields(bytes = data.len()))]
pub fn render_pages(
    name: &str,
    data: &[u8],
    renderer: &dyn PageRenderer,
    dpi: u32,
) -> Result<Vec<Page>> {
    let corrupt = |reason: String| DocInspectError::CorruptFile {
        name: name.to_string(),
        reason,
    };

    let structure = lopdf::Document::load_mem(data).map_err(|err| corrupt(err.to_string()))?;
    let page_count = structure.get_pages().len();
    if page_count == 0 {
        return Err(corrupt("document has no pages".into()));
    }
    let page_count =
        u16::try_from(page_count).map_err(|_| corrupt(format!("{page_count} pages exceeds limit")))?;
    debug!(page_count, "PDF structure loaded");

    let rasters = renderer
        .render_all(data, page_count, dpi)
        .map_err(|err| match err {
            DocInspectError::Renderer(_) => err,
            other => corrupt(other.to_string()),
        })?;
    if rasters.len() != usize::from(page_count) {
        return Err(corrupt(format!(
            "rendered {} of {page_count} pages",
            rasters.len()
        )));
    }

    Ok(rasters
        .into_iter()
        .zip(1..)
        .map(|(raster, index)| Page::new(index, raster))
        .collect())
}

// -- PDFium -------------------------------------------------------------------

/// Page renderer backed by Google PDFium.
///
/// The library handle is bound per call; `Pdfium` itself is not `Send`, and
/// the OS caches the dynamic library after the first load.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Fail early if no PDFium library can be found.
    pub fn probe() -> Result<()> {
        load_pdfium().map(|_| ())
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_page(&self, pdf: &[u8], index: u16, dpi: u32) -> Result<RgbImage> {
        let page_number = u32::from(index) + 1;
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|err| DocInspectError::page(page_number, format!("PDF load failed: {err}")))?;
        let page = document
            .pages()
            .get(index)
            .map_err(|err| DocInspectError::page(page_number, err.to_string()))?;
        render_loaded(&page, page_number, dpi)
    }

    #[instrument(skip(self, pdf), fields(bytes = pdf.len()))]
    fn render_all(&self, pdf: &[u8], page_count: u16, dpi: u32) -> Result<Vec<RgbImage>> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|err| DocInspectError::page(1, format!("PDF load failed: {err}")))?;
        let pages = document.pages();

        let mut rasters = Vec::with_capacity(usize::from(page_count));
        for index in 0..page_count {
            let page_number = u32::from(index) + 1;
            let page = pages
                .get(index)
                .map_err(|err| DocInspectError::page(page_number, err.to_string()))?;
            rasters.push(render_loaded(&page, page_number, dpi)?);
        }
        Ok(rasters)
    }
}

/// Render one page of an already loaded document.
fn render_loaded(page: &PdfPage<'_>, page_number: u32, dpi: u32) -> Result<RgbImage> {
    let (target_w, target_h) = render_dimensions(page.width().value, page.height().value, dpi);
    let config = PdfRenderConfig::new()
        .set_target_width(target_w as i32)
        .set_maximum_height(target_h as i32);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|err| DocInspectError::page(page_number, format!("rendering failed: {err}")))?;
    let raster = bitmap.as_image().to_rgb8();

    debug!(
        page = page_number,
        width = raster.width(),
        height = raster.height(),
        "PDF page rendered"
    );
    Ok(raster)
}

/// Bind the PDFium dynamic library.
///
/// Search order: `PDFIUM_DYNAMIC_LIB_PATH`, the executable's directory, then
/// the system library path.
fn load_pdfium() -> Result<Pdfium> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from environment");
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|err| DocInspectError::Renderer(format!("cannot load {path}: {err}")))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %exe_dir.display(), "Loaded PDFium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|err| {
        DocInspectError::Renderer(format!(
            "PDFium not found; set PDFIUM_DYNAMIC_LIB_PATH or install it ({err})"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Pixel size of a page of `width_pt` x `height_pt` points at `dpi`, capped
/// at [`MAX_DIMENSION_PX`] with the aspect ratio preserved.
fn render_dimensions(width_pt: f32, height_pt: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_pt * scale).max(1.0);
    let raw_h = (height_pt * scale).max(1.0);

    let longest = raw_w.max(raw_h);
    if longest <= MAX_DIMENSION_PX as f32 {
        return (raw_w.round() as u32, raw_h.round() as u32);
    }

    let ratio = MAX_DIMENSION_PX as f32 / longest;
    let capped = (
        ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX),
        ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX),
    );
    warn!(dpi, width = capped.0, height = capped.1, "Page raster size capped");
    capped
}
