//! Development server command implementation

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::config::Config;
use crate::server::DevServer;

/// Start development server with live reload
#[derive(Args, Debug)]
pub struct DevCommand {
    /// Port to run the dev server on (defaults to `dev.port`)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (defaults to `dev.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,

    /// Disable live reload
    #[arg(long)]
    pub no_hmr: bool,
}

impl DevCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;

        let options = DevServerOptions {
            host: self.host.clone().unwrap_or_else(|| config.dev.host.clone()),
            port: self.port.unwrap_or(config.dev.port),
            hmr: config.dev.hmr && !self.no_hmr,
            open: self.open || config.dev.open,
        };

        eprintln!(
            "{} Starting dev server at {}\n",
            "→".blue(),
            format!("http://{}:{}", options.host, options.port).cyan().underline()
        );

        if options.hmr {
            eprintln!("  {} Live reload {}", "•".dimmed(), "enabled".green());
        }

        eprintln!("  {} Press {} to stop\n", "•".dimmed(), "Ctrl+C".yellow());

        let server = DevServer::new(Arc::new(config), options)?;

        server.start().await
    }
}

/// Development server options
#[derive(Debug, Clone)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    pub hmr: bool,
    pub open: bool,
}
