//! Build command implementation

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use tracing::info;

use crate::bundler::Bundler;
use crate::config::Config;
use crate::env::EnvSnapshot;
use crate::utils::{format_duration, format_size};

/// Build the project
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Build mode, exposed to scripts as `process.env.NODE_ENV`
    #[arg(short, long, value_enum, default_value_t = Mode::Production)]
    pub mode: Mode,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;

        eprintln!("{} Building {}...", "→".blue(), config.project.name.cyan());

        let bundler = Bundler::new(config, self.into(), EnvSnapshot::capture())?;
        let output = bundler.build()?;
        bundler.write(&output)?;

        eprintln!(
            "\n{} Built {} chunk(s) from {} module(s) in {}\n",
            "✓".green().bold(),
            output.chunks.len(),
            output.module_count,
            format_duration(start.elapsed())
        );

        for chunk in &output.chunks {
            eprintln!(
                "  {} {} {} {}",
                "•".dimmed(),
                chunk.file.cyan(),
                format!("[{}]", chunk.kind.as_str()).dimmed(),
                format_size(chunk.size).dimmed()
            );
        }

        eprintln!();

        Ok(())
    }
}

/// Build mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

/// Build options derived from command arguments
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Overrides `output.dir`
    pub outdir: Option<PathBuf>,

    pub mode: Mode,

    /// Inject the dev server's live-reload client into the document
    pub reload_client: bool,
}

impl From<&BuildCommand> for BuildOptions {
    fn from(cmd: &BuildCommand) -> Self {
        Self {
            outdir: cmd.outdir.clone(),
            mode: cmd.mode,
            reload_client: false,
        }
    }
}
