// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docinspect — command-line front end for the document analysis pipeline.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use docinspect_core::{AnalysisConfig, AnalysisResult, DetectionClass, Document};
use docinspect_pipeline::{AnalysisReport, Analyzer};

#[derive(Parser)]
#[command(name = "docinspect")]
#[command(version, about = "Detect signatures, stamps, and QR codes in scanned documents")]
struct Cli {
    /// Image (PNG, JPEG) or PDF to analyze
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Directory for annotated images and the JSON report
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    output: PathBuf,

    /// Trained detector weights; the synthetic detector is used without them
    #[arg(short, long, value_name = "MODEL")]
    model: Option<PathBuf>,

    /// Request GPU inference
    #[arg(long)]
    gpu: bool,

    /// Save annotated images into the output directory
    #[arg(long)]
    annotate: bool,

    /// Save `<name>_results.json` into the output directory
    #[arg(long)]
    save_json: bool,

    /// JSON configuration file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of pages processed in parallel
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// PDF rasterization resolution
    #[arg(long, value_name = "N")]
    dpi: Option<u32>,
}

impl Cli {
    fn analysis_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        config.use_gpu |= self.gpu;
        config.return_annotated |= self.annotate;
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if config.output_directory.is_none() || self.annotate || self.save_json {
            config.output_directory = Some(self.output.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.analysis_config()?;

    let document = Document::open(&cli.file)
        .with_context(|| format!("cannot analyze {}", cli.file.display()))?;
    let analyzer = Analyzer::new(config).context("invalid analysis configuration")?;
    tracing::info!(file = %cli.file.display(), detector = analyzer.detector_name(), "Analyzing");

    let result = analyzer
        .analyze(&document)
        .await
        .with_context(|| format!("analysis of {} failed", document.name()))?;

    print_summary(&result);

    if cli.save_json {
        let report = AnalysisReport::from_result(&result);
        let path = report
            .save(&cli.output)
            .with_context(|| format!("writing report into {}", cli.output.display()))?;
        println!("\nReport saved to {}", path.display());
    }

    Ok(())
}

fn print_summary(result: &AnalysisResult) {
    println!("\n=== {} ===", result.filename);
    println!(
        "Pages: {} processed of {} ({} detector)",
        result.processed_pages(),
        result.total_pages,
        result.detector
    );
    println!();
    println!("{:<12} {:>6}", "Class", "Count");
    for class in DetectionClass::ALL {
        println!("{:<12} {:>6}", class.name(), result.summary.get(class));
    }
    println!("{:<12} {:>6}", "total", result.total);

    for page in result.pages.iter().filter(|p| !p.detections.is_empty()) {
        println!("\nPage {}:", page.page);
        for d in &page.detections {
            println!(
                "  {:<10} {:>5.1}%  [{:.0}, {:.0}, {:.0}, {:.0}]",
                d.class.name(),
                d.confidence * 100.0,
                d.bbox.x1,
                d.bbox.y1,
                d.bbox.x2,
                d.bbox.y2
            );
        }
    }

    for note in &result.notes {
        println!("\nnote: page {}: {}", note.page, note.message);
    }
    if let Some(paths) = &result.annotated {
        println!("\nAnnotated images:");
        for path in paths {
            println!("  {}", path.display());
        }
    }
}
