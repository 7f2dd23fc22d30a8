use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use framecull::core::loader::load_frame;
use framecull::core::output::{write_report, write_unique_images, RunReport};
use framecull::{
    DedupConfig, DedupOutcome, Deduplicator, FrameDiffer, Progress, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "framecull",
    version,
    about = "CLI for culling near-duplicate frames"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Keep visually distinct frames, writing them into `<dir>/unique`
    Dedup {
        /// Folder of frames
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Minimum changed area (pixels) for two frames to count as different
        #[arg(short = 'a', long, default_value_t = 5000)]
        min_contour_area: u32,
        /// Only classify; do not touch the output folder
        #[arg(long)]
        dry_run: bool,
        /// Write a JSON report of every verdict
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Score the difference between two images
    Compare {
        #[arg(long, value_name = "FILE")]
        first: PathBuf,
        #[arg(long, value_name = "FILE")]
        second: PathBuf,
        /// Minimum changed area (pixels) for two frames to count as different
        #[arg(short = 'a', long, default_value_t = 5000)]
        min_contour_area: u32,
        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Write the default configuration as JSON
    Config {
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TuningArgs {
    /// JSON config file; the flags below override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Odd Gaussian kernel sizes, applied in order
    #[arg(long, value_delimiter = ',', value_name = "K1,K2,..")]
    kernels: Option<Vec<u32>>,
    /// Intensity delta (0-255) at which a pixel counts as changed
    #[arg(long)]
    cutoff: Option<u8>,
    /// Smallest accepted image, in pixels, before resizing
    #[arg(long, value_name = "PIXELS")]
    min_pixels: Option<u64>,
    /// Canonical frame size, e.g. 500x500
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    size: Option<FrameSize>,
}

#[derive(Debug, Clone, Copy)]
struct FrameSize {
    width: u32,
    height: u32,
}

fn parse_size(raw: &str) -> Result<FrameSize, String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {raw:?}"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid dimension {part:?}: {e}"))
    };
    Ok(FrameSize {
        width: parse(width)?,
        height: parse(height)?,
    })
}

impl TuningArgs {
    fn resolve(&self) -> Result<DedupConfig> {
        let mut config = match &self.config {
            Some(path) => DedupConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => DedupConfig::default(),
        };

        if let Some(kernels) = &self.kernels {
            config.blur_kernels = kernels.clone();
        }
        if let Some(cutoff) = self.cutoff {
            config.binarize_cutoff = cutoff;
        }
        if let Some(min_pixels) = self.min_pixels {
            config.min_pixels = min_pixels;
        }
        if let Some(size) = self.size {
            config.canonical_width = size.width;
            config.canonical_height = size.height;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dedup {
            path,
            min_contour_area,
            dry_run,
            report,
            tuning,
        } => {
            let config = tuning.resolve()?;
            println!("▶ Checking similar frames in: {}", path.display());

            let deduplicator = Deduplicator::with_config(config.clone(), min_contour_area)?;
            let bar = progress_bar()?;
            let callback = progress_callback(bar.clone());

            let outcome = benchmark("classifying frames", || {
                deduplicator.run_folder(&path, Some(&callback))
            })
            .with_context(|| format!("Failed to deduplicate {:?}", path))?;
            bar.finish_and_clear();

            print_summary(&outcome);

            if let Some(report_path) = report {
                let run_report = RunReport::from_outcome(&path, &config, &outcome);
                write_report(&report_path, &run_report)
                    .with_context(|| format!("Failed to write report {:?}", report_path))?;
                println!("📝 Wrote report to {}", report_path.display());
            }

            if dry_run {
                println!("\n⚠️  Dry-run only; no files were written.");
            } else {
                let output_dir = write_unique_images(&path, outcome.unique_paths(), &config)
                    .with_context(|| {
                        format!("Failed to write unique frames under {:?}", path)
                    })?;
                println!(
                    "\n✅ Wrote {} unique frame(s) to {}",
                    outcome.unique().len(),
                    output_dir.display()
                );
            }
        }

        Commands::Compare {
            first,
            second,
            min_contour_area,
            tuning,
        } => {
            let config = tuning.resolve()?;
            let load = |path: &PathBuf| {
                load_frame(path, &config).map_err(|reason| {
                    anyhow!("Cannot use {}: {:?}", path.display(), reason)
                })
            };
            let first_frame = load(&first)?;
            let second_frame = load(&second)?;

            let differ = FrameDiffer::from_config(&config)?;
            let result = differ.score(&first_frame.image, &second_frame.image, min_contour_area)?;

            println!("▶ {} ↔ {}", first.display(), second.display());
            println!("   score: {}", result.score);
            println!("   significant regions: {}", result.region_count);
            for region in &result.regions {
                println!(
                    "     ▶ {}x{} at ({}, {}), area {}",
                    region.width, region.height, region.x, region.y, region.area
                );
            }
            if result.is_duplicate() {
                println!("   🔁 duplicate");
            } else {
                println!("   ✨ distinct");
            }
        }

        Commands::Config { output } => {
            DedupConfig::default()
                .to_file(&output)
                .with_context(|| format!("Failed to write config {:?}", output))?;
            println!("✅ Wrote default config to {}", output.display());
        }
    }

    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} {prefix:<11} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
    )?);
    Ok(bar)
}

fn progress_callback(bar: ProgressBar) -> ProgressCallback {
    Box::new(move |progress: &Progress| {
        bar.set_prefix(format!("{:?}", progress.phase));
        bar.set_length(progress.total as u64);
        bar.set_position(progress.processed as u64);
        bar.set_message(progress.current_file.clone());
    })
}

fn print_summary(outcome: &DedupOutcome) {
    let rejected = outcome.rejected();

    match outcome {
        DedupOutcome::EmptyFolder => println!("⚠️  The image folder is empty."),
        DedupOutcome::NoEligibleFiles { .. } => {
            println!("⚠️  No usable image files found in the folder.")
        }
        DedupOutcome::Classified(report) => {
            println!(
                "✨ Found {} unique frame(s), {} duplicate(s) after {} comparison(s)",
                report.unique.len(),
                report.duplicate.len(),
                report.comparisons
            );
        }
    }

    if !rejected.is_empty() {
        println!(
            "⚠️  Rejected {} file(s): {} corrupt, {} undersized, {} unsupported",
            rejected.len(),
            outcome.count_rejected("corrupt"),
            outcome.count_rejected("undersized"),
            outcome.count_rejected("wrong-extension")
        );
        for rejection in rejected {
            println!("   ✗ {} ({})", rejection.filename, rejection.reason.label());
        }
    }
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
