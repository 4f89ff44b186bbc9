//! Settings file plus command-line overrides

use anyhow::Context;
use eventline::{DecoderConfig, OverflowMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::render::OutputFormat;

/// ```yaml
/// decoder:
///   max_line_size: 65536
///   overflow_mode: dead_letter
/// dead_letter_dir: ./dead-letters
/// output: json
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub decoder: DecoderConfig,
    pub dead_letter_dir: Option<PathBuf>,
    pub output: OutputFormat,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Settings for this run: the file named by `--config`, if any, with flags
    /// applied on top.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply(cli);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(max_line_size) = cli.max_line_size {
            self.decoder.max_line_size = max_line_size;
        }
        if let Some(mode) = cli.overflow {
            self.decoder.overflow_mode = mode;
        }
        if let Some(dir) = &cli.dead_letter_dir {
            self.dead_letter_dir = Some(dir.clone());
        }
        if let Some(format) = cli.format {
            self.output = format;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.decoder.validate().context("invalid decoder settings")?;
        if self.dead_letter_dir.is_some() && self.decoder.overflow_mode != OverflowMode::DeadLetter {
            tracing::warn!(
                mode = %self.decoder.overflow_mode,
                "dead_letter_dir is set but overflow mode is not dead_letter; only diagnostics will be written"
            );
        }
        Ok(())
    }
}
