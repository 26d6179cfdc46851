// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew estimation and correction using Canny edges and the Hough transform.

use docinspect_core::PreprocessConfig;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::hough::{LineDetectionOptions, detect_lines};
use tracing::{debug, instrument, trace};

/// Largest deviation from the page axes that is still treated as skew.
const MAX_SKEW_DEG: u32 = 45;

/// Half-width of the search around the Hough estimate, in degrees.
const REFINE_SPAN_DEG: f32 = 1.5;

/// Angular step of the refinement search, in degrees.
const REFINE_STEP_DEG: f32 = 0.1;

/// Edge pixels used by the refinement; larger sets are sampled evenly.
const MAX_PROFILE_POINTS: usize = 250_000;

const PAD: Rgb<u8> = Rgb([255, 255, 255]);

/// Page axis a detected line runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Estimate how far the page content is rotated clockwise, in degrees.
///
/// Hough lines vote in whole degrees for their deviation from the nearest
/// page axis; the modal deviation gives a coarse angle. That angle is then
/// refined to a tenth of a degree by finding the rotation under which the
/// edge pixels project most sharply onto the dominant axis. Returns `None`
/// when no usable lines are found.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn estimate_skew(image: &RgbImage, config: &PreprocessConfig) -> Option<f32> {
    let gray = image::imageops::grayscale(image);
    let edges = canny(&gray, config.canny_low, config.canny_high);

    // A line that is off its 1° Hough bin spreads its votes over several
    // distance bins, so the threshold only scales gently with page size.
    let vote_threshold = config
        .hough_min_votes
        .max(image.width().min(image.height()) / 32);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: config.hough_suppression_radius,
        },
    );
    debug!(lines = lines.len(), vote_threshold, "Hough lines detected");

    let votes: Vec<(Axis, i32)> = lines
        .iter()
        .filter_map(|line| axis_deviation(line.angle_in_degrees))
        .collect();
    let deviations: Vec<i32> = votes.iter().map(|&(_, d)| d).collect();
    let coarse = modal_angle(&deviations)?;
    let axis = dominant_axis(&votes, coarse);

    let angle = refine_angle(&edges, axis, coarse);
    debug!(coarse, angle, ?axis, votes = votes.len(), "Skew estimated");
    Some(angle)
}

/// Rotate the page back by its estimated skew.
///
/// Pages whose skew is below the tolerance come back untouched. Otherwise the
/// page is rotated about its centre with bicubic interpolation, uncovered
/// corners are padded white, and the dimensions are kept.
pub fn deskew(image: RgbImage, config: &PreprocessConfig) -> RgbImage {
    let Some(angle) = estimate_skew(&image, config) else {
        trace!("No lines found; page left as is");
        return image;
    };
    if angle.abs() < config.deskew_tolerance_deg {
        trace!(angle, "Skew within tolerance");
        return image;
    }

    debug!(angle, "Rotating page");
    rotate_about_center(
        &image,
        (-angle).to_radians(),
        Interpolation::Bicubic,
        PAD,
    )
}

/// Deviation of a Hough line from the nearest page axis.
///
/// `angle` is the direction of the line normal: 90 for a horizontal line,
/// 0 or 180 for a vertical one. Lines at exactly 45 degrees to both axes are
/// ambiguous and ignored.
fn axis_deviation(angle: u32) -> Option<(Axis, i32)> {
    let angle = angle as i32;
    let max = MAX_SKEW_DEG as i32;
    if (angle - 90).abs() < max {
        Some((Axis::Horizontal, angle - 90))
    } else if angle < max {
        Some((Axis::Vertical, angle))
    } else if angle > 180 - max {
        Some((Axis::Vertical, angle - 180))
    } else {
        None
    }
}

/// Most frequent deviation, refined by the mean of its neighbourhood.
fn modal_angle(deviations: &[i32]) -> Option<f32> {
    let max = MAX_SKEW_DEG as i32;
    let mut bins = vec![0usize; (2 * max + 1) as usize];
    for &d in deviations {
        bins[(d + max) as usize] += 1;
    }

    let (mode, count) = bins
        .iter()
        .enumerate()
        .map(|(i, &count)| (i as i32 - max, count))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.abs().cmp(&a.0.abs())))?;
    if count == 0 {
        return None;
    }

    let near: Vec<i32> = deviations
        .iter()
        .copied()
        .filter(|d| (d - mode).abs() <= 1)
        .collect();
    Some(near.iter().sum::<i32>() as f32 / near.len() as f32)
}

/// Axis carrying most of the lines close to `angle`.
fn dominant_axis(votes: &[(Axis, i32)], angle: f32) -> Axis {
    let (horizontal, vertical) = votes
        .iter()
        .filter(|&&(_, d)| (d as f32 - angle).abs() <= 1.5)
        .fold((0usize, 0usize), |(h, v), &(axis, _)| match axis {
            Axis::Horizontal => (h + 1, v),
            Axis::Vertical => (h, v + 1),
        });
    if vertical > horizontal {
        Axis::Vertical
    } else {
        Axis::Horizontal
    }
}

/// Search around `coarse` for the angle whose edge projection is sharpest.
///
/// Edge pixels are projected onto the normal of `axis` rotated by each
/// candidate angle and binned per pixel; the sum of squared bin counts peaks
/// when lines collapse into single bins.
fn refine_angle(edges: &GrayImage, axis: Axis, coarse: f32) -> f32 {
    let points: Vec<(f32, f32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x as f32, y as f32))
        .collect();
    if points.is_empty() {
        return coarse;
    }
    let stride = points.len().div_ceil(MAX_PROFILE_POINTS);

    let extent = (edges.width() + edges.height()) as i64;
    let mut bins = vec![0u32; 2 * extent as usize + 1];
    let steps = (2.0 * REFINE_SPAN_DEG / REFINE_STEP_DEG).round() as i32;

    let mut best = (coarse, 0u64);
    for k in 0..=steps {
        let candidate = coarse - REFINE_SPAN_DEG + k as f32 * REFINE_STEP_DEG;
        let (sin, cos) = candidate.to_radians().sin_cos();

        bins.fill(0);
        for &(x, y) in points.iter().step_by(stride) {
            let offset = match axis {
                Axis::Horizontal => y * cos - x * sin,
                Axis::Vertical => x * cos + y * sin,
            };
            let bin = (offset.round() as i64 + extent).clamp(0, 2 * extent) as usize;
            bins[bin] += 1;
        }

        let score: u64 = bins.iter().map(|&c| u64::from(c) * u64::from(c)).sum();
        if score > best.1 {
            best = (candidate, score);
        }
    }
    trace!(angle = best.0, score = best.1, "Projection refined");
    best.0
}
