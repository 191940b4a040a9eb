//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{PipelineConfig, PipelineVariant};
use anyhow::{Context, Result};

/// Resolve the pipeline configuration a command should run with
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Preset for `variant`, or the `--config` file when one is given
    pub(crate) fn pipeline_config(cli: &Cli, variant: PipelineVariant) -> Result<PipelineConfig> {
        let Some(path) = &cli.config else {
            return Ok(PipelineConfig::for_variant(variant));
        };

        let config = PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load pipeline config {}", path.display()))?;
        if config.variant != variant {
            tracing::warn!(
                requested = %variant,
                loaded = %config.variant,
                "Config file targets a different variant"
            );
        }
        Ok(config)
    }
}
