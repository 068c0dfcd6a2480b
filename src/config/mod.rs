//! Configuration handling for Splitpack
//!
//! Parses and validates splitpack.toml configuration files.

mod schema;

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    pub project: ProjectConfig,

    /// Entry points, in traversal order
    #[serde(default, rename = "entry")]
    pub entrypoints: Vec<EntryConfig>,

    /// Module resolution
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Chunk splitting rules
    #[serde(default)]
    pub split: SplitConfig,

    /// Runtime environment asset
    #[serde(default)]
    pub env: EnvConfig,

    /// Entry document
    #[serde(default)]
    pub html: HtmlConfig,

    /// Built-in transforms
    #[serde(default)]
    pub transform: TransformConfig,

    /// Development server settings
    #[serde(default)]
    pub dev: DevConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&absolute_path)
            .with_context(|| format!("Failed to read config file: {}", absolute_path.display()))?;

        let root = absolute_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self::parse(&content, &root)
            .with_context(|| format!("Invalid config file: {}", absolute_path.display()))
    }

    /// Parse configuration text for a project rooted at `root`
    pub fn parse(content: &str, root: &Path) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).context("Failed to parse splitpack.toml")?;

        // Canonical root so module keys never depend on symlinked temp paths
        config.root = root
            .canonicalize()
            .with_context(|| format!("Project root does not exist: {}", root.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.entrypoints.is_empty() {
            anyhow::bail!("At least one [[entry]] must be specified");
        }
        if self.resolve.extensions.is_empty() {
            anyhow::bail!("resolve.extensions must not be empty");
        }
        if let Some(ext) = self.resolve.extensions.iter().find(|e| !e.starts_with('.')) {
            anyhow::bail!("resolve.extensions entries must start with '.', got '{}'", ext);
        }
        if self.resolve.roots.is_empty() {
            anyhow::bail!("resolve.roots must not be empty");
        }

        let mut entry_paths = HashSet::new();
        for entry in &self.entrypoints {
            let full_path = self.root.join(&entry.path);
            if !full_path.is_file() {
                anyhow::bail!(
                    "Entrypoint '{}' points to non-existent file: {}",
                    entry.name,
                    full_path.display()
                );
            }
            if !entry_paths.insert(full_path.canonicalize()?) {
                anyhow::bail!("Entrypoint '{}' repeats the path {}", entry.name, entry.path);
            }
        }

        if self.split.min_chunks < 2 {
            anyhow::bail!(
                "split.min_chunks must be at least 2, got {}",
                self.split.min_chunks
            );
        }

        let mut chunk_names = HashSet::new();
        let names = self
            .entrypoints
            .iter()
            .map(|e| e.name.as_str())
            .chain([self.split.vendor_chunk.as_str(), self.split.shared_chunk.as_str()])
            .chain(self.split.libraries.iter().map(|l| l.name.as_str()));
        for name in names {
            if name.is_empty() || name.contains(['/', '\\']) {
                anyhow::bail!("Invalid chunk name '{}'", name);
            }
            if !chunk_names.insert(name) {
                anyhow::bail!("Chunk name '{}' is used more than once", name);
            }
        }

        for library in &self.split.libraries {
            Regex::new(&library.pattern).with_context(|| {
                format!("Invalid pattern for library chunk '{}'", library.name)
            })?;
        }

        if self.env.global.is_empty() || self.env.file.is_empty() {
            anyhow::bail!("env.global and env.file must not be empty");
        }

        self.check_output_dir(&self.output_dir())
            .context("Invalid output.dir")?;

        Ok(())
    }

    /// Reject an output directory whose replacement would remove project inputs.
    ///
    /// Publishing swaps the whole directory, so it must not be (or contain)
    /// the project root, a resolution or vendor root, the public directory or
    /// an entry file. Relative paths are taken from the working directory.
    pub fn check_output_dir(&self, out_dir: &Path) -> Result<()> {
        let out_dir = if out_dir.is_absolute() {
            out_dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(out_dir)
        };
        let out_dir = out_dir.canonicalize().unwrap_or_else(|_| normalize(&out_dir));

        let protected = std::iter::once(("project root", self.root.clone()))
            .chain(self.resolve_roots().into_iter().map(|r| ("resolve root", r)))
            .chain(self.vendor_roots().into_iter().map(|r| ("vendor root", r)))
            .chain(self.public_dir().map(|d| ("public directory", absolutize_path(d))))
            .chain(
                self.all_entrypoints()
                    .into_iter()
                    .map(|(_, p)| ("entry point", absolutize_path(p))),
            );

        for (what, path) in protected {
            if path.starts_with(&out_dir) {
                anyhow::bail!(
                    "output directory {} would replace the {} {}",
                    out_dir.display(),
                    what,
                    path.display()
                );
            }
        }

        Ok(())
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    /// Get all entrypoints with absolute paths, in configured order
    pub fn all_entrypoints(&self) -> Vec<(String, PathBuf)> {
        self.entrypoints
            .iter()
            .map(|entry| (entry.name.clone(), self.root.join(&entry.path)))
            .collect()
    }

    /// Absolute resolution roots, in search order
    pub fn resolve_roots(&self) -> Vec<PathBuf> {
        self.resolve.roots.iter().map(|r| absolutize(&self.root, r)).collect()
    }

    /// Absolute vendor roots
    pub fn vendor_roots(&self) -> Vec<PathBuf> {
        self.split
            .vendor_roots
            .iter()
            .map(|r| absolutize(&self.root, r))
            .collect()
    }

    /// Output-relative path of the environment asset
    pub fn env_asset_path(&self) -> String {
        join_url(&self.output.assets_dir, &self.env.file)
    }

    /// Absolute public directory, if configured
    pub fn public_dir(&self) -> Option<PathBuf> {
        self.output.public_dir.as_ref().map(|d| self.root.join(d))
    }
}

/// Join a root and a configured directory, canonicalizing when it exists
fn absolutize(root: &Path, dir: &str) -> PathBuf {
    absolutize_path(root.join(dir))
}

fn absolutize_path(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(&path))
}

/// Lexically drop `.` and `..` components of a path that may not exist
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Join two `/`-separated path segments
pub fn join_url(base: &str, file: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", base, file.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn test_defaults_applied() {
        let dir = project(&["src/index.js"]);
        let config = Config::parse(
            r#"
            [project]
            name = "app"

            [[entry]]
            name = "main"
            path = "src/index.js"
            "#,
            dir.path(),
        )
        .unwrap();

        assert_eq!(config.split.vendor_chunk, "vendor");
        assert_eq!(config.split.shared_chunk, "async-common");
        assert_eq!(config.split.min_chunks, 2);
        assert_eq!(config.resolve.roots, vec!["src", "node_modules"]);
        assert_eq!(config.env_asset_path(), "assets/env.js");
        assert_eq!(config.transform.inline_limit, 10240);
    }

    #[test]
    fn test_entries_keep_order() {
        let dir = project(&["src/b.js", "src/a.js"]);
        let config = Config::parse(
            r#"
            [project]
            name = "app"

            [[entry]]
            name = "b"
            path = "src/b.js"

            [[entry]]
            name = "a"
            path = "src/a.js"
            "#,
            dir.path(),
        )
        .unwrap();

        let names: Vec<_> = config.all_entrypoints().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_rejects_missing_entries() {
        let dir = project(&[]);
        let err = Config::parse("[project]\nname = \"app\"\n", dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("[[entry]]"));
    }

    #[test]
    fn test_rejects_empty_extensions() {
        let dir = project(&["src/index.js"]);
        let err = Config::parse(
            r#"
            [project]
            name = "app"

            [[entry]]
            name = "main"
            path = "src/index.js"

            [resolve]
            extensions = []
            "#,
            dir.path(),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("extensions"));
    }

    #[test]
    fn test_rejects_chunk_name_clash() {
        let dir = project(&["src/index.js"]);
        let err = Config::parse(
            r#"
            [project]
            name = "app"

            [[entry]]
            name = "vendor"
            path = "src/index.js"
            "#,
            dir.path(),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("used more than once"));
    }

    #[test]
    fn test_rejects_output_over_project_inputs() {
        let dir = project(&["src/main.js", "public/robots.txt"]);
        let base = "[project]\nname = \"app\"\n[[entry]]\nname = \"main\"\npath = \"src/main.js\"\n";

        for out in ["src", ".", "..", "node_modules", "public", "src/main.js"] {
            let text = format!(
                "{}[output]\ndir = \"{}\"\npublic_dir = \"public\"\n",
                base, out
            );
            let err = Config::parse(&text, dir.path()).unwrap_err();
            assert!(
                format!("{:#}", err).contains("would replace"),
                "output.dir = {:?} accepted",
                out
            );
        }

        let ok = format!("{}[output]\ndir = \"build/site\"\npublic_dir = \"public\"\n", base);
        let config = Config::parse(&ok, dir.path()).unwrap();
        assert!(config.check_output_dir(&dir.path().join("dist")).is_ok());
        assert!(config.check_output_dir(&dir.path().join("src/../src")).is_err());
    }

    #[test]
    fn test_rejects_low_threshold_and_bad_pattern() {
        let dir = project(&["src/index.js"]);
        let base = "[project]\nname = \"app\"\n[[entry]]\nname = \"main\"\npath = \"src/index.js\"\n";

        let low = format!("{}[split]\nmin_chunks = 1\n", base);
        assert!(Config::parse(&low, dir.path()).is_err());

        let bad = format!(
            "{}[[split.library]]\nname = \"lib\"\npattern = \"(unclosed\"\n",
            base
        );
        assert!(Config::parse(&bad, dir.path()).is_err());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("assets", "env.js"), "assets/env.js");
        assert_eq!(join_url("/assets/", "/env.js"), "assets/env.js");
        assert_eq!(join_url("", "env.js"), "env.js");
    }
}
