// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annotated page rendering — class-coloured boxes and label tags drawn on a
// copy of the page, saved as JPEG into the caller's output directory.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use docinspect_core::{ClassConfig, DocInspectError, Detection, MediaType, Page, Result};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, info, instrument, warn};

const SYSTEM_FONTS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Draws detections onto page copies and persists them.
pub struct Annotator {
    output_dir: PathBuf,
    /// Label font; labels are drawn as bare tags when none is available.
    font: Option<FontVec>,
    box_thickness: i32,
    font_scale: f32,
}

impl Annotator {
    // -- Construction ---------------------------------------------------------

    /// Annotator writing into `output_dir`, labelling with the first system
    /// font that can be found.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let font = SYSTEM_FONTS.iter().find_map(|path| {
            let data = std::fs::read(path).ok()?;
            let font = FontVec::try_from_vec(data).ok()?;
            debug!(path, "Loaded label font");
            Some(font)
        });
        if font.is_none() {
            warn!("No system font found; annotation labels will carry no text");
        }
        Self::with_font(output_dir, font)
    }

    /// Annotator using the TrueType font at `font_path`.
    pub fn with_font_path(output_dir: impl Into<PathBuf>, font_path: &Path) -> Result<Self> {
        let data = std::fs::read(font_path)?;
        let font = FontVec::try_from_vec(data).map_err(|_| {
            DocInspectError::InvalidConfig(format!("cannot parse font {}", font_path.display()))
        })?;
        Ok(Self::with_font(output_dir, Some(font)))
    }

    fn with_font(output_dir: impl Into<PathBuf>, font: Option<FontVec>) -> Self {
        Self {
            output_dir: output_dir.into(),
            font,
            box_thickness: 2,
            font_scale: 18.0,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    // -- Naming ---------------------------------------------------------------

    /// Deterministic artifact file name for one page of a document.
    pub fn artifact_name(stem: &str, media_type: MediaType, page: u32) -> String {
        match media_type {
            MediaType::Image => format!("{stem}_annotated.jpg"),
            MediaType::Pdf => format!("{stem}_page_{page:03}_annotated.jpg"),
        }
    }

    // -- Rendering ------------------------------------------------------------

    /// Draw every detection onto a copy of the page.
    pub fn render(&self, page: &Page, detections: &[Detection], classes: &ClassConfig) -> RgbImage {
        let mut canvas = page.image.clone();
        for detection in detections {
            let color = Rgb(classes.color(detection.class));
            let label = format!(
                "{} {:.0}%",
                detection.class.name(),
                detection.confidence * 100.0
            );
            self.draw_box(&mut canvas, detection, color);
            self.draw_label(&mut canvas, detection, color, &label);
        }
        canvas
    }

    /// Render and save the annotated page, returning the artifact path.
    ///
    /// Failures concern this artifact only and are reported as `Annotation`.
    #[instrument(skip(self, page, detections, classes), fields(page = page.index))]
    pub fn annotate(
        &self,
        page: &Page,
        detections: &[Detection],
        classes: &ClassConfig,
        file_name: &str,
    ) -> Result<PathBuf> {
        let failed = |reason: String| DocInspectError::Annotation {
            page: page.index,
            reason,
        };

        std::fs::create_dir_all(&self.output_dir).map_err(|err| failed(err.to_string()))?;
        let path = self.output_dir.join(file_name);
        let canvas = self.render(page, detections, classes);
        canvas
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|err| failed(err.to_string()))?;

        info!(path = %path.display(), boxes = detections.len(), "Annotated page saved");
        Ok(path)
    }

    fn draw_box(&self, canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
        let bbox = detection.bbox;
        let left = bbox.x1.round() as i32;
        let top = bbox.y1.round() as i32;
        let width = (bbox.width().round() as u32).max(1);
        let height = (bbox.height().round() as u32).max(1);

        for t in 0..self.box_thickness {
            let rect = Rect::at(left - t, top - t)
                .of_size(width + 2 * t as u32, height + 2 * t as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    fn draw_label(&self, canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>, text: &str) {
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(self.font_scale, font, text),
            None => (
                (text.len() as f32 * self.font_scale * 0.55) as u32,
                self.font_scale as u32,
            ),
        };
        let tag_w = text_w + 6;
        let tag_h = text_h + 6;

        let left = (detection.bbox.x1.round() as i32).max(0);
        let above = detection.bbox.y1.round() as i32 - tag_h as i32;
        // Tags that would leave the page sit inside the box instead.
        let top = if above >= 0 {
            above
        } else {
            detection.bbox.y1.round() as i32
        };

        draw_filled_rect_mut(canvas, Rect::at(left, top).of_size(tag_w.max(1), tag_h.max(1)), color);
        if let Some(font) = &self.font {
            draw_text_mut(canvas, TEXT_COLOR, left + 3, top + 3, self.font_scale, font, text);
        }
    }
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("output_dir", &self.output_dir)
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docinspect_core::{BoundingBox, DetectionClass};

    fn detection(class: DetectionClass) -> Detection {
        Detection {
            class,
            confidence: 0.87,
            bbox: BoundingBox::new(40.0, 50.0, 120.0, 90.0),
            page: 1,
        }
    }

    #[test]
    fn artifact_names_are_deterministic() {
        assert_eq!(
            Annotator::artifact_name("invoice", MediaType::Image, 1),
            "invoice_annotated.jpg"
        );
        assert_eq!(
            Annotator::artifact_name("contract", MediaType::Pdf, 7),
            "contract_page_007_annotated.jpg"
        );
    }

    #[test]
    fn render_draws_on_a_copy() {
        let page = Page::new(1, RgbImage::from_pixel(200, 150, Rgb([255, 255, 255])));
        let annotator = Annotator::with_font(std::env::temp_dir(), None);
        let classes = ClassConfig::default();

        let canvas = annotator.render(&page, &[detection(DetectionClass::Stamp)], &classes);

        // Right edge of the box carries the stamp colour; the page is untouched.
        assert_eq!(*canvas.get_pixel(120, 70), Rgb(classes.color(DetectionClass::Stamp)));
        assert_eq!(*page.image.get_pixel(120, 70), Rgb([255, 255, 255]));
    }

    #[test]
    fn annotate_writes_a_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let page = Page::new(2, RgbImage::from_pixel(160, 120, Rgb([255, 255, 255])));
        let annotator = Annotator::new(dir.path());

        let path = annotator
            .annotate(
                &page,
                &[detection(DetectionClass::Signature)],
                &ClassConfig::default(),
                "scan_page_002_annotated.jpg",
            )
            .unwrap();

        assert!(path.exists());
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (160, 120));
    }

    #[test]
    fn unwritable_directory_is_an_annotation_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let page = Page::new(3, RgbImage::from_pixel(50, 50, Rgb([255, 255, 255])));
        let err = Annotator::with_font(&blocker, None)
            .annotate(&page, &[], &ClassConfig::default(), "a.jpg")
            .unwrap_err();
        assert!(matches!(err, DocInspectError::Annotation { page: 3, .. }));
    }
}
