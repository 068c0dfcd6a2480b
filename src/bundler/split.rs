//! Chunk splitting
//!
//! Assigns every module of the graph to exactly one chunk. Rules are checked
//! in a fixed priority order and the first match wins:
//!
//! 1. modules under a vendor root go to the vendor chunk
//! 2. vendor modules matching a library pattern go to that library's chunk
//! 3. modules reached by at least `min_chunks` entries go to the shared chunk
//! 4. everything else stays with the first entry that reached it
//!
//! Entry modules always stay in their own entry chunk.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use regex::Regex;
use tracing::{debug, instrument};

use super::chunk::Chunk;
use super::graph::{Module, ModuleGraph, ModuleId};
use crate::config::Config;
use crate::error::{BuildError, BuildResult};

/// Isolates modules under external dependency roots
#[derive(Debug, Clone)]
pub struct VendorRule {
    pub chunk: String,
    pub roots: Vec<PathBuf>,
}

impl VendorRule {
    fn matches(&self, module: &Module) -> bool {
        self.roots.iter().any(|root| module.path.starts_with(root))
    }
}

/// Carves a named library out of the vendor chunk
#[derive(Debug, Clone)]
pub struct LibraryRule {
    pub chunk: String,
    pub pattern: Regex,
}

impl LibraryRule {
    fn matches(&self, module: &Module) -> bool {
        self.pattern.is_match(&module.key)
    }
}

/// Extracts modules reached by several entries
#[derive(Debug, Clone)]
pub struct SharedRule {
    pub chunk: String,
    pub min_chunks: usize,
}

/// The ordered rule set consumed by [`split_chunks`]
#[derive(Debug, Clone, Default)]
pub struct SplitRules {
    pub vendor: Option<VendorRule>,
    pub libraries: Vec<LibraryRule>,
    pub shared: Option<SharedRule>,
}

impl SplitRules {
    /// Build the rule set from the `[split]` configuration
    pub fn from_config(config: &Config) -> BuildResult<Self> {
        let libraries = config
            .split
            .libraries
            .iter()
            .map(|library| {
                Regex::new(&library.pattern)
                    .map(|pattern| LibraryRule {
                        chunk: library.name.clone(),
                        pattern,
                    })
                    .map_err(|e| {
                        BuildError::Config(format!("library '{}': {}", library.name, e))
                    })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(Self {
            vendor: Some(VendorRule {
                chunk: config.split.vendor_chunk.clone(),
                roots: config.vendor_roots(),
            }),
            libraries,
            shared: Some(SharedRule {
                chunk: config.split.shared_chunk.clone(),
                min_chunks: config.split.min_chunks,
            }),
        })
    }
}

/// Rule outcome for a single module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Entry(usize),
    Vendor,
    Library(usize),
    Shared,
}

/// Result of splitting: chunks plus the module → chunk index
#[derive(Debug, Clone, Default)]
pub struct ChunkGraph {
    chunks: Vec<Chunk>,
    module_to_chunk: HashMap<ModuleId, usize>,
}

impl ChunkGraph {
    /// All chunks in output order
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk by name
    pub fn get(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    /// The chunk holding a module
    pub fn chunk_for_module(&self, id: ModuleId) -> Option<&Chunk> {
        self.module_to_chunk.get(&id).map(|&index| &self.chunks[index])
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Partition the module graph into chunks
#[instrument(skip_all)]
pub fn split_chunks(graph: &ModuleGraph, rules: &SplitRules) -> ChunkGraph {
    let entries = graph.entries();

    // Which entry traversals reach each module, in entry order
    let mut reached_by: Vec<Vec<usize>> = vec![Vec::new(); graph.len()];
    for (index, &(_, entry_id)) in entries.iter().enumerate() {
        for id in graph.get_reachable_modules(entry_id) {
            reached_by[id].push(index);
        }
    }

    // Chunk slots: entries, vendor, libraries, shared
    let vendor_slot = entries.len();
    let library_base = vendor_slot + 1;
    let shared_slot = library_base + rules.libraries.len();

    let mut slots: Vec<Chunk> = entries
        .iter()
        .map(|(name, id)| Chunk::entry(name.clone(), *id))
        .collect();
    slots.push(Chunk::vendor(
        rules.vendor.as_ref().map(|v| v.chunk.clone()).unwrap_or_default(),
    ));
    slots.extend(rules.libraries.iter().map(|l| Chunk::library(l.chunk.clone())));
    slots.push(Chunk::shared(
        rules.shared.as_ref().map(|s| s.chunk.clone()).unwrap_or_default(),
    ));

    for (id, module) in graph.modules() {
        let Some(assignment) = assign(graph, rules, id, module, &reached_by[id]) else {
            continue;
        };
        debug!("{} -> {:?}", module.key, assignment);

        let slot = match assignment {
            Assignment::Entry(index) => index,
            Assignment::Vendor => vendor_slot,
            Assignment::Library(index) => library_base + index,
            Assignment::Shared => shared_slot,
        };
        slots[slot].module_ids.push(id);
    }

    let mut chunks: Vec<Chunk> = slots.into_iter().filter(|c| !c.is_empty()).collect();
    for chunk in &mut chunks {
        chunk
            .module_ids
            .sort_by(|&a, &b| module_key(graph, a).cmp(module_key(graph, b)));
    }

    let module_to_chunk: HashMap<ModuleId, usize> = chunks
        .iter()
        .enumerate()
        .flat_map(|(index, chunk)| chunk.module_ids.iter().map(move |&id| (id, index)))
        .collect();

    let requires = chunk_requirements(graph, &chunks, &module_to_chunk);
    for (chunk, required) in chunks.iter_mut().zip(requires) {
        chunk.requires = required;
    }

    debug!("Split {} modules into {} chunks", graph.len(), chunks.len());

    ChunkGraph {
        chunks,
        module_to_chunk,
    }
}

/// Apply the rules to one module; `None` for modules no entry reaches
fn assign(
    graph: &ModuleGraph,
    rules: &SplitRules,
    id: ModuleId,
    module: &Module,
    reached_by: &[usize],
) -> Option<Assignment> {
    if let Some(index) = graph.entries().iter().position(|&(_, entry)| entry == id) {
        return Some(Assignment::Entry(index));
    }

    let &first_entry = reached_by.first()?;

    if let Some(vendor) = &rules.vendor {
        if vendor.matches(module) {
            let library = rules.libraries.iter().position(|l| l.matches(module));
            return Some(library.map_or(Assignment::Vendor, Assignment::Library));
        }
    }

    if let Some(shared) = &rules.shared {
        if reached_by.len() >= shared.min_chunks {
            return Some(Assignment::Shared);
        }
    }

    Some(Assignment::Entry(first_entry))
}

/// Transitive chunk dependencies for every chunk, in chunk order
fn chunk_requirements(
    graph: &ModuleGraph,
    chunks: &[Chunk],
    module_to_chunk: &HashMap<ModuleId, usize>,
) -> Vec<Vec<String>> {
    let direct: Vec<BTreeSet<usize>> = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            chunk
                .module_ids
                .iter()
                .filter_map(|&id| graph.get_module(id))
                .flat_map(|module| module.dependencies.iter())
                .filter_map(|dep| module_to_chunk.get(dep).copied())
                .filter(|&dep_chunk| dep_chunk != index)
                .collect()
        })
        .collect();

    (0..chunks.len())
        .map(|start| {
            let mut seen = BTreeSet::new();
            let mut stack: Vec<usize> = direct[start].iter().copied().collect();
            while let Some(index) = stack.pop() {
                if index != start && seen.insert(index) {
                    stack.extend(direct[index].iter().copied());
                }
            }
            seen.into_iter().map(|i| chunks[i].name.clone()).collect()
        })
        .collect()
}

fn module_key(graph: &ModuleGraph, id: ModuleId) -> &str {
    graph.get_module(id).map(|m| m.key.as_str()).unwrap_or_default()
}

impl std::fmt::Display for ChunkGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for chunk in &self.chunks {
            writeln!(f, "{} ({}, {} modules)", chunk.name, chunk.kind.as_str(), chunk.len())?;
        }
        Ok(())
    }
}
