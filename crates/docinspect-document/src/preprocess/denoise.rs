// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Non-local-means denoising for colour pages.
//
// For each offset in the search window the squared colour difference between
// the page and its shifted copy is summed with an integral image, which gives
// every patch distance for that offset in constant time per pixel.

use image::RgbImage;
use rayon::prelude::*;
use tracing::{instrument, trace};

/// Smooth `image` while keeping edges.
///
/// `strength` is the filter parameter `h`: patches whose mean squared channel
/// difference is around `h²` contribute with weight `1/e`. Both windows are
/// square and should be odd. Borders are handled by clamping coordinates.
///
/// Offsets are visited one after another; within an offset every row is
/// independent and runs on the rayon pool.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn non_local_means(
    image: &RgbImage,
    strength: f32,
    template_window: u32,
    search_window: u32,
) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || strength <= 0.0 {
        return image.clone();
    }

    let w = width as usize;
    let h = height as usize;
    let n = w * h;
    let src = image.as_raw().as_slice();
    let template_radius = (template_window / 2) as isize;
    let search_radius = (search_window / 2) as isize;
    let inv_h2 = 1.0 / (strength * strength);

    let mut weight_sum = vec![0f32; n];
    let mut acc = vec![0f32; n * 3];
    let mut diff = vec![0f32; n];
    let mut integral = vec![0f64; (w + 1) * (h + 1)];

    for dy in -search_radius..=search_radius {
        for dx in -search_radius..=search_radius {
            // Per-pixel squared distance to the shifted pixel.
            diff.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
                let sy = clamp(y as isize + dy, h);
                for (x, d) in row.iter_mut().enumerate() {
                    let sx = clamp(x as isize + dx, w);
                    *d = pixel_distance(src, (y * w + x) * 3, (sy * w + sx) * 3);
                }
            });

            fill_integral(&diff, w, h, &mut integral);
            let integral = integral.as_slice();

            weight_sum
                .par_chunks_mut(w)
                .zip(acc.par_chunks_mut(w * 3))
                .enumerate()
                .for_each(|(y, (weights, sums))| {
                    let y0 = clamp(y as isize - template_radius, h);
                    let y1 = clamp(y as isize + template_radius, h);
                    let sy = clamp(y as isize + dy, h);
                    for x in 0..w {
                        let x0 = clamp(x as isize - template_radius, w);
                        let x1 = clamp(x as isize + template_radius, w);
                        let count = ((x1 - x0 + 1) * (y1 - y0 + 1) * 3) as f64;
                        let dist = box_sum(integral, w, x0, y0, x1, y1) / count;
                        let weight = (-(dist as f32) * inv_h2).exp();

                        let b = (sy * w + clamp(x as isize + dx, w)) * 3;
                        weights[x] += weight;
                        for c in 0..3 {
                            sums[x * 3 + c] += weight * f32::from(src[b + c]);
                        }
                    }
                });
        }
    }

    let mut out = RgbImage::new(width, height);
    out.par_chunks_mut(3).enumerate().for_each(|(i, px)| {
        let total = weight_sum[i];
        for c in 0..3 {
            px[c] = (acc[i * 3 + c] / total).round().clamp(0.0, 255.0) as u8;
        }
    });
    trace!("Denoise complete");
    out
}

#[inline]
fn clamp(v: isize, len: usize) -> usize {
    v.clamp(0, len as isize - 1) as usize
}

/// Squared RGB distance between the pixels starting at byte offsets `a` and `b`.
#[inline]
fn pixel_distance(src: &[u8], a: usize, b: usize) -> f32 {
    (0..3)
        .map(|c| {
            let t = f32::from(src[a + c]) - f32::from(src[b + c]);
            t * t
        })
        .sum()
}

/// Summed-area table with a zero row and column in front.
fn fill_integral(values: &[f32], w: usize, h: usize, integral: &mut [f64]) {
    let stride = w + 1;
    integral[stride..]
        .par_chunks_mut(stride)
        .zip(values.par_chunks(w))
        .for_each(|(out, row)| {
            let mut sum = 0f64;
            for (o, &v) in out[1..].iter_mut().zip(row) {
                sum += f64::from(v);
                *o = sum;
            }
        });

    for y in 2..=h {
        let (above, rest) = integral.split_at_mut(y * stride);
        let prev = &above[(y - 1) * stride..];
        for (cur, &up) in rest[..stride].iter_mut().zip(prev) {
            *cur += up;
        }
    }
}

/// Sum over the inclusive rectangle `(x0, y0)..=(x1, y1)`.
fn box_sum(integral: &[f64], w: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
    let stride = w + 1;
    integral[(y1 + 1) * stride + x1 + 1] - integral[y0 * stride + x1 + 1]
        - integral[(y1 + 1) * stride + x0]
        + integral[y0 * stride + x0]
}
