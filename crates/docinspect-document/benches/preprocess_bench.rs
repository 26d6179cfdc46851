// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for page preprocessing: skew estimation on a ruled page
// and non-local-means denoising on a small noisy page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};

use docinspect_core::PreprocessConfig;
use docinspect_document::preprocess::{denoise, deskew};

/// 400x400 white page with dark rules every 40 pixels.
fn ruled_page() -> RgbImage {
    let mut img = RgbImage::from_pixel(400, 400, Rgb([255, 255, 255]));
    for row in (40..380).step_by(40) {
        for y in row..row + 2 {
            for x in 20..380 {
                img.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
    }
    img
}

fn bench_deskew(c: &mut Criterion) {
    let page = ruled_page();
    let config = PreprocessConfig::default();

    c.bench_function("estimate_skew (400x400)", |b| {
        b.iter(|| black_box(deskew::estimate_skew(black_box(&page), &config)));
    });
}

fn bench_denoise(c: &mut Criterion) {
    // Deterministic speckle pattern.
    let page = RgbImage::from_fn(128, 128, |x, y| {
        let v = 200u8.wrapping_add(((x * 31 + y * 17) % 23) as u8);
        Rgb([v, v, v])
    });
    let config = PreprocessConfig::default();

    c.bench_function("non_local_means (128x128)", |b| {
        b.iter(|| {
            black_box(denoise::non_local_means(
                black_box(&page),
                config.denoise_strength,
                config.template_window,
                config.search_window,
            ))
        });
    });
}

criterion_group!(benches, bench_deskew, bench_denoise);
criterion_main!(benches);
