//! Cutout CLI tool
//!
//! Exposes the boundary operations that do not need a model: tensor
//! preparation, compositing of existing masks, background removal from a
//! saved saliency map and preset inspection.

use super::config::CliConfigBuilder;
use crate::{
    background::BackgroundRemover,
    compositor::Compositor,
    config::PipelineVariant,
    error::CutoutError,
    services::ImageIOService,
    tracing_config::{TracingConfig, TracingFormat},
    utils::ImagePreprocessor,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use instant::Instant;
use std::path::PathBuf;
use tracing::{info, warn};

/// Segmentation pre/post-processing tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cutout")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Explicit tracing filter (e.g. "cutout=debug"), overrides -v
    #[arg(long, value_name = "FILTER", global = true)]
    pub log_filter: Option<String>,

    /// Plain log output without colors
    #[arg(long, global = true)]
    pub compact_logs: bool,

    /// Pipeline configuration JSON replacing the variant preset
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resize, normalize and pad an image into a model-input tensor
    Preprocess {
        /// Input image
        image: PathBuf,
        #[arg(long, value_enum, default_value_t = CliVariant::Sam)]
        variant: CliVariant,
        /// Raw little-endian f32 output; a `.json` sidecar is written next to it
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Composite an existing binary mask into a cropped RGBA sticker
    Sticker {
        /// Source image
        image: PathBuf,
        /// Grayscale mask of the same size
        mask: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Remove the background using a saved raw saliency map
    Remove {
        /// Source image
        image: PathBuf,
        /// Raw little-endian f32 saliency map at model resolution
        mask: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a pipeline preset as JSON
    Config {
        #[arg(long, value_enum, default_value_t = CliVariant::Sam)]
        variant: CliVariant,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliVariant {
    /// Interactive segmentation (1024 input)
    Sam,
    /// Background removal (320 input)
    U2net,
}

impl From<CliVariant> for PipelineVariant {
    fn from(variant: CliVariant) -> Self {
        match variant {
            CliVariant::Sam => Self::SegmentAnything,
            CliVariant::U2net => Self::BackgroundRemoval,
        }
    }
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli).context("Failed to initialize tracing")?;
    run(&cli)
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let format = if cli.compact_logs {
        TracingFormat::Compact
    } else {
        TracingFormat::Console
    };
    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format);
    if let Some(filter) = &cli.log_filter {
        config = config.with_env_filter(filter.clone());
    }
    config.init()
}

/// Execute a parsed command
pub(crate) fn run(cli: &Cli) -> Result<()> {
    let start = Instant::now();
    match &cli.command {
        Command::Preprocess {
            image,
            variant,
            output,
        } => {
            let config = CliConfigBuilder::pipeline_config(cli, (*variant).into())?;
            let rgb = ImageIOService::load_rgb(image)
                .with_context(|| format!("Failed to load {}", image.display()))?;
            let tensor = ImagePreprocessor::preprocess(&rgb, &config)
                .context("Failed to preprocess image")?;
            let sidecar = ImageIOService::write_tensor(&tensor, output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                output = %output.display(),
                sidecar = %sidecar.display(),
                shape = ?tensor.shape(),
                resized = %tensor.resized_size(),
                "Tensor written"
            );
        },
        Command::Sticker {
            image,
            mask,
            output,
        } => {
            let rgb = ImageIOService::load_rgb(image)
                .with_context(|| format!("Failed to load {}", image.display()))?;
            let mask = ImageIOService::load_mask(mask)
                .with_context(|| format!("Failed to load mask {}", mask.display()))?;
            if Compositor::write(&rgb, &mask, output)? {
                info!(output = %output.display(), "Sticker written");
            } else {
                warn!("Mask is empty, no sticker written");
            }
        },
        Command::Remove {
            image,
            mask,
            output,
        } => {
            let config = CliConfigBuilder::pipeline_config(cli, PipelineVariant::BackgroundRemoval)?;
            let mut remover =
                BackgroundRemover::new(config).context("Invalid background removal config")?;
            remover
                .preprocess(image)
                .with_context(|| format!("Failed to load {}", image.display()))?;
            let raw = ImageIOService::read_f32_file(mask)
                .with_context(|| format!("Failed to read {}", mask.display()))?;
            match remover.postprocess(&raw, output) {
                Ok(()) => info!(output = %output.display(), "Background removed"),
                Err(e @ (CutoutError::BelowAreaThreshold { .. } | CutoutError::NoContent(_))) => {
                    warn!("{}", e);
                },
                Err(e) => return Err(e).context("Failed to remove background"),
            }
        },
        Command::Config { variant } => {
            let config = CliConfigBuilder::pipeline_config(cli, (*variant).into())?;
            println!("{}", config.to_json_string()?);
        },
    }
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Command finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_parse_preprocess_command() {
        let cli = Cli::try_parse_from([
            "cutout",
            "-vv",
            "preprocess",
            "photo.jpg",
            "--variant",
            "u2net",
            "--output",
            "tensor.bin",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Preprocess { variant, .. } => assert_eq!(variant, CliVariant::U2net),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sticker_command_skips_empty_mask() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("image.png");
        let mask_path = temp_dir.path().join("mask.png");
        let output = temp_dir.path().join("sticker.png");
        RgbImage::from_pixel(12, 12, image::Rgb([1, 2, 3])).save(&image_path)?;
        GrayImage::new(12, 12).save(&mask_path)?;

        let cli = Cli::try_parse_from([
            "cutout",
            "sticker",
            image_path.to_str().unwrap(),
            mask_path.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])?;
        run(&cli)?;
        assert!(!output.exists());

        GrayImage::from_pixel(12, 12, Luma([255])).save(&mask_path)?;
        run(&cli)?;
        assert!(output.exists());
        Ok(())
    }

    #[test]
    fn test_preprocess_command_writes_sidecar() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("image.png");
        let output = temp_dir.path().join("tensor.bin");
        RgbImage::from_pixel(40, 20, image::Rgb([100, 50, 25])).save(&image_path)?;

        let cli = Cli::try_parse_from([
            "cutout",
            "preprocess",
            image_path.to_str().unwrap(),
            "--variant",
            "u2net",
            "--output",
            output.to_str().unwrap(),
        ])?;
        run(&cli)?;

        let values = ImageIOService::read_f32_file(&output)?;
        assert_eq!(values.len(), 3 * 320 * 320);
        assert!(temp_dir.path().join("tensor.bin.json").exists());
        Ok(())
    }
}
