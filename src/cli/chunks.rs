//! Chunk report command

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::bundler::{Bundler, ChunkGraph, ModuleGraph};
use crate::config::Config;
use crate::env::EnvSnapshot;

/// Show how modules are split into chunks
#[derive(Args, Debug)]
pub struct ChunksCommand {
    /// Print machine-readable JSON to stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ChunkReport<'a> {
    name: &'a str,
    kind: &'static str,
    requires: &'a [String],
    modules: Vec<&'a str>,
}

impl ChunksCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let config = Config::load(config_path)?;
        let bundler = Bundler::new(config, Default::default(), EnvSnapshot::default())?;
        let (graph, chunks) = bundler.analyze()?;

        let report = report(&graph, &chunks);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        for chunk in &report {
            println!("{} {}", chunk.name.cyan().bold(), format!("[{}]", chunk.kind).dimmed());
            if !chunk.requires.is_empty() {
                println!("  {} {}", "requires".dimmed(), chunk.requires.join(", "));
            }
            for module in &chunk.modules {
                println!("  {} {}", "•".dimmed(), module);
            }
        }

        Ok(())
    }
}

fn report<'a>(graph: &'a ModuleGraph, chunks: &'a ChunkGraph) -> Vec<ChunkReport<'a>> {
    chunks
        .chunks()
        .iter()
        .map(|chunk| ChunkReport {
            name: &chunk.name,
            kind: chunk.kind.as_str(),
            requires: &chunk.requires,
            modules: chunk
                .module_ids
                .iter()
                .filter_map(|&id| graph.get_module(id))
                .map(|module| module.key.as_str())
                .collect(),
        })
        .collect()
}
