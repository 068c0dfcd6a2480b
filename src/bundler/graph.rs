//! Module graph data structures

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Unique identifier for a module
pub type ModuleId = usize;

/// Kinds of modules the pipeline distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Script,
    Style,
    Image,
    Json,
    Unknown,
}

impl ModuleKind {
    /// Determine module kind from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => ModuleKind::Script,
            "css" => ModuleKind::Style,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "ico" | "webp" => ModuleKind::Image,
            "json" => ModuleKind::Json,
            _ => ModuleKind::Unknown,
        }
    }

    /// Determine module kind from a path
    pub fn detect(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(ModuleKind::from_extension)
            .unwrap_or(ModuleKind::Unknown)
    }

    /// Whether dependency specifiers are declared inside this kind of module
    pub fn declares_dependencies(&self) -> bool {
        matches!(self, ModuleKind::Script | ModuleKind::Style)
    }
}

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Canonical absolute path, the module's identity
    pub path: PathBuf,

    /// Root-relative key used in emitted output
    pub key: String,

    /// Module kind
    pub kind: ModuleKind,

    /// Raw file content
    pub source: Arc<Vec<u8>>,

    /// Dependency specifiers in declaration order
    pub specifiers: Vec<String>,

    /// Resolved dependencies, parallel to `specifiers`
    pub dependencies: Vec<ModuleId>,
}

impl Module {
    pub fn new(path: PathBuf, key: String, source: Arc<Vec<u8>>, specifiers: Vec<String>) -> Self {
        let kind = ModuleKind::detect(&path);
        Self {
            path,
            key,
            kind,
            source,
            specifiers,
            dependencies: Vec::new(),
        }
    }

    /// Specifier → dependency key pairs
    pub fn dependency_map<'a>(&'a self, graph: &'a ModuleGraph) -> Vec<(&'a str, &'a str)> {
        self.specifiers
            .iter()
            .zip(&self.dependencies)
            .filter_map(|(spec, &id)| graph.get_module(id).map(|m| (spec.as_str(), m.key.as_str())))
            .collect()
    }
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules, indexed by ID in discovery order
    modules: Vec<Module>,

    /// Map from path to module ID
    path_to_id: HashMap<PathBuf, ModuleId>,

    /// Entry points in configured order
    entries: Vec<(String, ModuleId)>,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph, returning the existing ID for a known path
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(&module.path) {
            return id;
        }

        let id = self.modules.len();
        self.path_to_id.insert(module.path.clone(), id);
        self.modules.push(module);

        id
    }

    /// Record `id` as the entry point named `name`
    pub fn add_entry(&mut self, name: String, id: ModuleId) {
        self.entries.push((name, id));
    }

    /// Append a dependency edge
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if let Some(module) = self.modules.get_mut(from) {
            module.dependencies.push(to);
        }
    }

    /// Get module ID from path
    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Get a module by ID
    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// All modules in ID order
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter().enumerate()
    }

    /// Entry points in configured order
    pub fn entries(&self) -> &[(String, ModuleId)] {
        &self.entries
    }

    /// All modules reachable from a given module, breadth first in
    /// declaration order
    pub fn get_reachable_modules(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            result.push(id);

            if let Some(module) = self.modules.get(id) {
                for &dep_id in &module.dependencies {
                    if visited.insert(dep_id) {
                        queue.push_back(dep_id);
                    }
                }
            }
        }

        result
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str) -> Module {
        Module::new(
            PathBuf::from(path),
            path.trim_start_matches('/').to_string(),
            Arc::new(Vec::new()),
            Vec::new(),
        )
    }

    #[test]
    fn test_module_kind_detection() {
        assert_eq!(ModuleKind::from_extension("js"), ModuleKind::Script);
        assert_eq!(ModuleKind::from_extension("tsx"), ModuleKind::Script);
        assert_eq!(ModuleKind::from_extension("css"), ModuleKind::Style);
        assert_eq!(ModuleKind::from_extension("PNG"), ModuleKind::Image);
        assert_eq!(ModuleKind::from_extension("json"), ModuleKind::Json);
        assert_eq!(ModuleKind::from_extension("xyz"), ModuleKind::Unknown);
        assert!(!ModuleKind::Image.declares_dependencies());
    }

    #[test]
    fn test_module_graph_basic() {
        let mut graph = ModuleGraph::new();

        let id = graph.add_module(module("/test/main.js"));
        assert_eq!(graph.len(), 1);
        assert!(graph.get_module(id).is_some());
        assert_eq!(graph.get_module_id(Path::new("/test/main.js")), Some(id));

        // Same identity, same ID
        assert_eq!(graph.add_module(module("/test/main.js")), id);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_reachable_handles_cycles() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module(module("/a.js"));
        let b = graph.add_module(module("/b.js"));
        let c = graph.add_module(module("/c.js"));
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);
        graph.add_dependency(b, c);

        assert_eq!(graph.get_reachable_modules(a), vec![a, b, c]);
        assert_eq!(graph.get_reachable_modules(c), vec![c]);
    }
}
