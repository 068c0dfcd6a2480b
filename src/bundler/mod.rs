//! Core bundler implementation
//!
//! Builds the module graph from the configured entries, splits it into
//! chunks, runs per-module transforms, renders and hashes every chunk and
//! assembles the output (entry document, chunks, environment asset, emitted
//! and public files) in memory before anything is written.

mod cache;
mod chunk;
mod emit;
mod graph;
mod manifest;
pub mod render;
mod split;

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cli::BuildOptions;
use crate::config::Config;
use crate::env::EnvSnapshot;
use crate::error::{BuildError, BuildResult};
use crate::html::{render_document, DocumentInput};
use crate::resolver::Resolver;
use crate::transform::{TransformRegistry, Transformed};
use crate::utils::{hash_content, module_key};

pub use cache::{SourceCache, TransformCache};
pub use chunk::{Chunk, ChunkKind};
pub use emit::OutputFiles;
pub use graph::{Module, ModuleGraph, ModuleId, ModuleKind};
pub use manifest::{Manifest, ManifestEntry, MANIFEST_GLOBAL};
pub use split::{split_chunks, ChunkGraph, LibraryRule, SharedRule, SplitRules, VendorRule};

/// Output-relative path of the entry document
pub const DOCUMENT: &str = "index.html";

/// Result of a build, not yet written
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Every output file, keyed by output-relative path
    pub files: OutputFiles,

    /// Chunk manifest (inlined in the document)
    pub manifest: Manifest,

    /// Per-chunk summary, in chunk order
    pub chunks: Vec<ChunkSummary>,

    /// Number of modules in the graph
    pub module_count: usize,
}

impl BuildOutput {
    /// The rendered entry document
    pub fn document(&self) -> Option<&str> {
        self.files
            .get(DOCUMENT)
            .and_then(|content| std::str::from_utf8(content).ok())
    }
}

/// Information about a generated chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    pub name: String,
    pub kind: ChunkKind,

    /// Output-relative filename
    pub file: String,

    /// Rendered size in bytes
    pub size: usize,

    /// Member module keys
    pub modules: Vec<String>,
}

/// The main bundler
pub struct Bundler {
    /// Project configuration
    config: Arc<Config>,

    /// Build options
    options: BuildOptions,

    /// Environment captured for this process
    env: Arc<EnvSnapshot>,

    /// Module resolver
    resolver: Resolver,

    /// Per-module transforms
    transforms: TransformRegistry,

    /// Chunk split rules
    rules: SplitRules,

    /// Sources reused across rebuilds
    sources: SourceCache,

    /// Transform results reused across rebuilds
    transformed: TransformCache,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(config: Config, options: BuildOptions, env: EnvSnapshot) -> BuildResult<Self> {
        if let Some(outdir) = &options.outdir {
            config
                .check_output_dir(outdir)
                .map_err(|e| BuildError::Config(format!("{:#}", e)))?;
        }

        let transforms = TransformRegistry::with_defaults(&config, options.mode)?;
        let rules = SplitRules::from_config(&config)?;
        let resolver = Resolver::new(&config);

        Ok(Self {
            config: Arc::new(config),
            options,
            env: Arc::new(env),
            resolver,
            transforms,
            rules,
            sources: SourceCache::new(),
            transformed: TransformCache::new(),
        })
    }

    /// Replace the transform registry
    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self.transformed = TransformCache::new();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    /// Directory the build is published to
    pub fn output_dir(&self) -> PathBuf {
        self.options
            .outdir
            .clone()
            .unwrap_or_else(|| self.config.output_dir())
    }

    /// Build the project in memory
    pub fn build(&self) -> BuildResult<BuildOutput> {
        let start = Instant::now();

        info!("Building module graph...");
        let graph = self.build_module_graph()?;

        info!("Splitting {} modules into chunks...", graph.len());
        let chunks = split_chunks(&graph, &self.rules);

        info!("Transforming modules...");
        let transformed = self.transform_modules(&graph)?;

        info!("Rendering {} chunks...", chunks.len());
        let output = self.render_output(&graph, &chunks, &transformed)?;

        debug!(
            "Build completed in {:?} ({} sources, {} transforms cached)",
            start.elapsed(),
            self.sources.len(),
            self.transformed.len()
        );

        Ok(output)
    }

    /// Resolve and split without transforming or emitting
    pub fn analyze(&self) -> BuildResult<(ModuleGraph, ChunkGraph)> {
        let graph = self.build_module_graph()?;
        let chunks = split_chunks(&graph, &self.rules);
        Ok((graph, chunks))
    }

    /// Publish a build to the output directory, replacing its contents
    pub fn write(&self, output: &BuildOutput) -> BuildResult<()> {
        let out_dir = self.output_dir();
        info!("Writing {} files to {}", output.files.len(), out_dir.display());
        emit::publish(&output.files, &out_dir)
    }

    /// Drop cached state for changed files
    pub fn invalidate(&self, paths: &[PathBuf]) {
        let paths: Vec<PathBuf> = paths
            .iter()
            .flat_map(|path| {
                let canonical = path.canonicalize().ok();
                std::iter::once(path.clone()).chain(canonical)
            })
            .collect();

        debug!("Invalidating {} cached paths", paths.len());
        self.sources.invalidate(&paths);
        self.transformed.invalidate(&paths);
    }

    /// Build the module graph by traversing from entrypoints
    fn build_module_graph(&self) -> BuildResult<ModuleGraph> {
        let mut graph = ModuleGraph::new();

        for (name, path) in self.config.all_entrypoints() {
            debug!("Processing entrypoint: {} -> {}", name, path.display());

            let canonical = path
                .canonicalize()
                .map_err(|_| BuildError::MissingEntry {
                    name: name.clone(),
                    path: path.clone(),
                })?;

            let mut queue = VecDeque::new();
            let id = self.intern_module(&mut graph, &mut queue, canonical)?;
            graph.add_entry(name, id);

            while let Some(id) = queue.pop_front() {
                self.process_dependencies(&mut graph, &mut queue, id)?;
            }
        }

        Ok(graph)
    }

    /// Resolve every specifier of a module and link the results
    fn process_dependencies(
        &self,
        graph: &mut ModuleGraph,
        queue: &mut VecDeque<ModuleId>,
        id: ModuleId,
    ) -> BuildResult<()> {
        let Some(module) = graph.get_module(id) else {
            return Ok(());
        };
        let path = module.path.clone();
        let key = module.key.clone();
        let specifiers = module.specifiers.clone();

        for specifier in specifiers {
            let resolved = self
                .resolver
                .resolve(&specifier, &path)
                .ok_or_else(|| BuildError::Unresolved {
                    importer: key.clone(),
                    specifier: specifier.clone(),
                })?;

            let dep_id = self.intern_module(graph, queue, resolved)?;
            graph.add_dependency(id, dep_id);
        }

        Ok(())
    }

    /// Get a module's id, loading and queueing it on first sight
    fn intern_module(
        &self,
        graph: &mut ModuleGraph,
        queue: &mut VecDeque<ModuleId>,
        path: PathBuf,
    ) -> BuildResult<ModuleId> {
        if let Some(id) = graph.get_module_id(&path) {
            return Ok(id);
        }

        let module = self.load_module(path)?;
        let id = graph.add_module(module);
        queue.push_back(id);
        Ok(id)
    }

    /// Read a module and extract its dependency specifiers
    fn load_module(&self, path: PathBuf) -> BuildResult<Module> {
        let source = self.sources.load(&path).map_err(|source| BuildError::Io {
            path: path.clone(),
            source,
        })?;

        let kind = ModuleKind::detect(&path);
        let specifiers = if kind.declares_dependencies() {
            match std::str::from_utf8(&source) {
                Ok(text) => self.resolver.extract_dependencies(text, kind),
                Err(_) => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let key = module_key(&self.config.root, &path);
        debug!("Loaded {} ({} dependencies)", key, specifiers.len());

        Ok(Module::new(path, key, source, specifiers))
    }

    /// Transform all modules in parallel, results indexed by module id
    fn transform_modules(&self, graph: &ModuleGraph) -> BuildResult<Vec<Arc<Transformed>>> {
        let modules: Vec<&Module> = graph.modules().map(|(_, module)| module).collect();

        let results: Vec<BuildResult<Arc<Transformed>>> = modules
            .par_iter()
            .map(|module| self.transform_module(module))
            .collect();

        results.into_iter().collect()
    }

    fn transform_module(&self, module: &Module) -> BuildResult<Arc<Transformed>> {
        let source_hash = hash_content(&module.source);

        if let Some(cached) = self.transformed.get(&module.path, &source_hash) {
            return Ok(cached);
        }

        let transformed = Arc::new(self.transforms.apply(
            &module.key,
            &module.path,
            module.kind,
            &module.source,
        )?);
        self.transformed
            .insert(module.path.clone(), source_hash, transformed.clone());

        Ok(transformed)
    }

    /// Render chunks, manifest, document and auxiliary files
    fn render_output(
        &self,
        graph: &ModuleGraph,
        chunks: &ChunkGraph,
        transformed: &[Arc<Transformed>],
    ) -> BuildResult<BuildOutput> {
        let env_asset = self.config.env_asset_path();
        let favicon = self.favicon()?;

        let mut reserved = vec![env_asset.as_str(), DOCUMENT];
        if let Some((name, _)) = &favicon {
            reserved.push(name.as_str());
        }

        let mut files = match self.config.public_dir() {
            Some(dir) => emit::collect_public_files(&dir, &reserved)?,
            None => OutputFiles::new(),
        };

        for asset in transformed.iter().flat_map(|t| t.assets.iter()) {
            files.insert(asset.path.clone(), asset.content.clone());
        }

        let mut manifest = Manifest::new();
        let mut summaries = Vec::with_capacity(chunks.len());

        for chunk in chunks.chunks() {
            let (initial_requires, async_requires): (Vec<&str>, Vec<&str>) = chunk
                .requires
                .iter()
                .map(String::as_str)
                .partition(|name| chunks.get(name).map(|c| c.kind.is_initial()).unwrap_or(false));

            let code = render::render_chunk(
                graph,
                chunk,
                transformed,
                &initial_requires,
                &async_requires,
            );
            let file = manifest
                .insert_chunk(&chunk.name, code.as_bytes(), &self.config.output.assets_dir)
                .file
                .clone();

            debug!("Chunk {} -> {} ({} bytes)", chunk.name, file, code.len());

            summaries.push(ChunkSummary {
                name: chunk.name.clone(),
                kind: chunk.kind,
                file: file.clone(),
                size: code.len(),
                modules: chunk
                    .module_ids
                    .iter()
                    .filter_map(|&id| graph.get_module(id))
                    .map(|module| module.key.clone())
                    .collect(),
            });
            files.insert(file, code.into_bytes());
        }

        files.insert(
            env_asset.clone(),
            self.env.render_script(&self.config.env.global).into_bytes(),
        );

        let template = self.template()?;
        let initial_files = initial_load_order(&summaries);
        let public_path = format!("{}/", self.config.output.public_url.trim_end_matches('/'));

        let document = render_document(&DocumentInput {
            html: &self.config.html,
            project_name: &self.config.project.name,
            public_path: &public_path,
            env_asset: &env_asset,
            manifest: &manifest,
            initial_files: &initial_files,
            template: template.as_deref(),
            favicon: favicon.as_ref().map(|(name, _)| name.as_str()),
            reload_client: self.options.reload_client,
        });

        if let Some((name, content)) = favicon {
            files.insert(name, content);
        }
        files.insert(DOCUMENT.to_string(), document.into_bytes());

        Ok(BuildOutput {
            files,
            manifest,
            chunks: summaries,
            module_count: graph.len(),
        })
    }

    fn template(&self) -> BuildResult<Option<String>> {
        self.config
            .html
            .template
            .as_ref()
            .map(|template| {
                let path = self.config.root.join(template);
                fs::read_to_string(&path).map_err(|source| BuildError::Io { path, source })
            })
            .transpose()
    }

    /// Favicon output name and content
    fn favicon(&self) -> BuildResult<Option<(String, Vec<u8>)>> {
        let Some(favicon) = &self.config.html.favicon else {
            return Ok(None);
        };

        let path = self.config.root.join(favicon);
        let name = Path::new(favicon)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "favicon.ico".to_string());
        let content = fs::read(&path).map_err(|source| BuildError::Io { path, source })?;

        Ok(Some((name, content)))
    }
}

/// Initial chunk files: libraries, then vendor, then entries
fn initial_load_order(chunks: &[ChunkSummary]) -> Vec<String> {
    let rank = |kind: ChunkKind| match kind {
        ChunkKind::Library => 0,
        ChunkKind::Vendor => 1,
        ChunkKind::Entry => 2,
        ChunkKind::Shared => 3,
    };

    let mut initial: Vec<&ChunkSummary> = chunks.iter().filter(|c| c.kind.is_initial()).collect();
    initial.sort_by_key(|c| rank(c.kind));
    initial.into_iter().map(|c| c.file.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, kind: ChunkKind) -> ChunkSummary {
        ChunkSummary {
            name: name.to_string(),
            kind,
            file: format!("assets/{}.js", name),
            size: 0,
            modules: Vec::new(),
        }
    }

    #[test]
    fn test_initial_load_order() {
        let chunks = vec![
            summary("main", ChunkKind::Entry),
            summary("admin", ChunkKind::Entry),
            summary("vendor", ChunkKind::Vendor),
            summary("react", ChunkKind::Library),
            summary("async-common", ChunkKind::Shared),
        ];

        assert_eq!(
            initial_load_order(&chunks),
            vec![
                "assets/react.js",
                "assets/vendor.js",
                "assets/main.js",
                "assets/admin.js",
            ]
        );
    }
}
