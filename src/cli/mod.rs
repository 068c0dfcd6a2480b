//! Command-line interface for Splitpack
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Production build
//! - `dev`: Development server with live reload
//! - `chunks`: Print the chunk assignment without writing anything
//! - `init`: Project scaffolding

mod build;
mod chunks;
mod dev;
mod init;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::{BuildCommand, BuildOptions, Mode};
pub use chunks::ChunksCommand;
pub use dev::{DevCommand, DevServerOptions};
pub use init::InitCommand;

/// Splitpack - a code-splitting asset pipeline for browser applications
#[derive(Parser, Debug)]
#[command(name = "splitpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to splitpack.toml config file
    #[arg(short, long, global = true, default_value = "splitpack.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the project
    Build(BuildCommand),

    /// Start development server with live reload
    Dev(DevCommand),

    /// Show how modules are split into chunks
    Chunks(ChunksCommand),

    /// Initialize a new project
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Chunks(cmd) if cmd.json => {}
            _ => print_banner(),
        }

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config).await,
            Commands::Dev(cmd) => cmd.execute(&self.config).await,
            Commands::Chunks(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the Splitpack banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "Splitpack".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
