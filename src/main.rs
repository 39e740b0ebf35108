mod logging;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use vdtenc::Encoder;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "tif", "tiff"];

/// Convert a folder of images into videotex .vdt streams.
#[derive(Parser, Debug)]
#[command(name = "vdt-convert")]
struct Args {
    /// folder of source images
    input: PathBuf,

    /// destination folder for the .vdt artifacts
    output: PathBuf,

    /// jpeg quality factor
    #[arg(long, default_value_t = 78)]
    quality: u8,

    /// use the fixed quantization tables instead of a quality factor
    #[arg(long)]
    tables: bool,

    /// repack frames for 6-bit-safe transports
    #[arg(long)]
    translation: bool,

    /// frame chunk size in bytes
    #[arg(long, default_value_t = vdtenc::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Default)]
struct BatchReport {
    converted: usize,
    failed: Vec<(PathBuf, String)>,
}

fn source_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let matches_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && matches_ext {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn convert_one(encoder: &Encoder, source: &Path, out_dir: &Path) -> Result<PathBuf> {
    let image = image::open(source)?;
    let stream = encoder.encode(image)?;
    let stem = source.file_stem().context("source file has no name")?;
    let target = out_dir.join(stem).with_extension("vdt");
    fs::write(&target, &stream)?;
    Ok(target)
}

/// Converts every image in `input`, isolating per-image failures so one bad
/// file never aborts the batch.
fn convert_batch(encoder: &Encoder, input: &Path, output: &Path) -> Result<BatchReport> {
    let images = source_images(input)?;
    if images.is_empty() {
        info!("no images found in {}", input.display());
        return Ok(BatchReport::default());
    }
    fs::create_dir_all(output)
        .with_context(|| format!("creating output folder {}", output.display()))?;

    info!("converting {} images...", images.len());
    let mut report = BatchReport::default();
    for source in &images {
        match convert_one(encoder, source, output) {
            Ok(target) => {
                report.converted += 1;
                info!("converted {} -> {}", source.display(), target.display());
            }
            Err(err) => {
                error!("failed to convert {}: {err:#}", source.display());
                report.failed.push((source.clone(), format!("{err:#}")));
            }
        }
    }
    Ok(report)
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    let encoder = Encoder {
        chunk_size: args.chunk_size,
        quality: if args.tables { None } else { Some(args.quality) },
        translation: args.translation,
        ..Encoder::default()
    };

    let report = convert_batch(&encoder, &args.input, &args.output)?;
    info!(
        "done: {} converted, {} failed",
        report.converted,
        report.failed.len()
    );
    Ok(())
}
