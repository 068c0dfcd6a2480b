//! Configuration schema definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Project metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// A single entry point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryConfig {
    /// Chunk name for this entry
    pub name: String,

    /// Path relative to the project root
    pub path: String,
}

/// Module resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Extensions tried, in order, when a specifier has none
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directories searched for bare specifiers, in order
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            roots: default_roots(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    [".ts", ".tsx", ".js", ".jsx", ".css", ".json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_roots() -> Vec<String> {
    vec!["src".to_string(), "node_modules".to_string()]
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Public URL prefix for assets
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Sub-directory of the output holding chunks and emitted assets
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// Static files copied verbatim into the output
    #[serde(default)]
    pub public_dir: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            public_url: default_public_url(),
            assets_dir: default_assets_dir(),
            public_dir: None,
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_public_url() -> String {
    "/".to_string()
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_true() -> bool {
    true
}

/// Named-library isolation rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Chunk the matching vendor modules move into
    pub name: String,

    /// Regex tested against the module's root-relative path
    pub pattern: String,
}

/// Chunk splitting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Directories whose modules count as vendor code
    #[serde(default = "default_vendor_roots")]
    pub vendor_roots: Vec<String>,

    /// Vendor chunk name
    #[serde(default = "default_vendor_chunk")]
    pub vendor_chunk: String,

    /// Named libraries carved out of the vendor chunk
    #[serde(default, rename = "library")]
    pub libraries: Vec<LibraryConfig>,

    /// Async chunk receiving modules shared between entries
    #[serde(default = "default_shared_chunk")]
    pub shared_chunk: String,

    /// Minimum number of entries that must reach a module to share it
    #[serde(default = "default_min_chunks")]
    pub min_chunks: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            vendor_roots: default_vendor_roots(),
            vendor_chunk: default_vendor_chunk(),
            libraries: Vec::new(),
            shared_chunk: default_shared_chunk(),
            min_chunks: default_min_chunks(),
        }
    }
}

fn default_vendor_roots() -> Vec<String> {
    vec!["node_modules".to_string()]
}

fn default_vendor_chunk() -> String {
    "vendor".to_string()
}

fn default_shared_chunk() -> String {
    "async-common".to_string()
}

fn default_min_chunks() -> usize {
    2
}

/// Runtime environment asset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Global binding the snapshot is attached to (`window.<global>`)
    #[serde(default = "default_env_global")]
    pub global: String,

    /// File name of the environment asset inside the assets directory
    #[serde(default = "default_env_file")]
    pub file: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            global: default_env_global(),
            file: default_env_file(),
        }
    }
}

fn default_env_global() -> String {
    "env".to_string()
}

fn default_env_file() -> String {
    "env.js".to_string()
}

/// Entry document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlConfig {
    /// Document title
    #[serde(default)]
    pub title: Option<String>,

    /// `<meta name="description">` content
    #[serde(default)]
    pub description: Option<String>,

    /// Template file the generated tags are injected into
    #[serde(default)]
    pub template: Option<String>,

    /// Favicon copied next to the document
    #[serde(default)]
    pub favicon: Option<String>,

    /// Collapse whitespace between tags
    #[serde(default = "default_true")]
    pub minify: bool,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            template: None,
            favicon: None,
            minify: true,
        }
    }
}

/// Built-in transform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Images at or below this size (bytes) are inlined as data URIs
    #[serde(default = "default_inline_limit")]
    pub inline_limit: usize,

    /// Expression replacements applied to scripts
    #[serde(default)]
    pub define: BTreeMap<String, String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            inline_limit: default_inline_limit(),
            define: BTreeMap::new(),
        }
    }
}

fn default_inline_limit() -> usize {
    10240
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Port to run dev server on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Open browser automatically
    #[serde(default)]
    pub open: bool,

    /// Push reload messages to connected pages
    #[serde(default = "default_true")]
    pub hmr: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            open: false,
            hmr: true,
        }
    }
}

fn default_port() -> u16 {
    3001
}

fn default_host() -> String {
    "localhost".to_string()
}
