//! Module resolution
//!
//! Extracts declared dependency specifiers from module sources and resolves
//! them to canonical file paths using the configured extensions and roots.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::bundler::ModuleKind;
use crate::config::Config;

/// Static imports, re-exports, side-effect imports and require calls
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:[\w*{}\s,$]+?\s+from\s+)?["']([^"']+)["']|require\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static DYNAMIC_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static CSS_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)"#).unwrap()
});

static CSS_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')\s]+)["']?\s*\)"#).unwrap()
});

static SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").unwrap());

/// Module resolver
#[derive(Debug, Clone)]
pub struct Resolver {
    /// Extensions tried in order
    extensions: Vec<String>,

    /// Roots searched for bare specifiers
    roots: Vec<PathBuf>,
}

impl Resolver {
    /// Create a resolver from project configuration
    pub fn new(config: &Config) -> Self {
        Self::with_rules(config.resolve.extensions.clone(), config.resolve_roots())
    }

    /// Create a resolver from explicit rules
    pub fn with_rules(extensions: Vec<String>, roots: Vec<PathBuf>) -> Self {
        Self { extensions, roots }
    }

    /// Extract declared dependency specifiers from source code, in order
    pub fn extract_dependencies(&self, source: &str, kind: ModuleKind) -> Vec<String> {
        let patterns: [(&Regex, usize); 2] = match kind {
            ModuleKind::Script => [(&*IMPORT_REGEX, 2), (&*DYNAMIC_IMPORT_REGEX, 1)],
            ModuleKind::Style => [(&*CSS_IMPORT_REGEX, 1), (&*CSS_URL_REGEX, 1)],
            _ => return Vec::new(),
        };

        // Collect (offset, specifier) so declaration order survives two passes
        let mut found: Vec<(usize, String)> = Vec::new();
        for (regex, groups) in patterns {
            for cap in regex.captures_iter(source) {
                let Some(m) = (1..=groups).find_map(|g| cap.get(g)) else {
                    continue;
                };
                let spec = m.as_str().trim();
                if is_external_url(spec) {
                    continue;
                }
                found.push((m.start(), spec.to_string()));
            }
        }
        found.sort_by_key(|(offset, _)| *offset);

        let mut dependencies: Vec<String> = Vec::new();
        for (_, spec) in found {
            if !dependencies.contains(&spec) {
                dependencies.push(spec);
            }
        }

        debug!("Found {} dependencies", dependencies.len());

        dependencies
    }

    /// Resolve a specifier imported by `from` to a canonical file path
    pub fn resolve(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        debug!("Resolving '{}' from '{}'", specifier, from.display());

        let resolved = if is_path_like(specifier) {
            let base_dir = from.parent().unwrap_or(Path::new("."));
            self.resolve_target(&base_dir.join(specifier))
        } else {
            self.roots
                .iter()
                .find_map(|root| self.resolve_target(&root.join(specifier)))
        };

        debug!("Resolved to: {:?}", resolved);

        resolved.map(|p| p.canonicalize().unwrap_or(p))
    }

    /// Try a target as a file, with each extension, then as a directory
    fn resolve_target(&self, target: &Path) -> Option<PathBuf> {
        self.resolve_file(target)
            .or_else(|| self.resolve_directory(target))
    }

    fn resolve_file(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(target.to_path_buf());
        }

        self.extensions.iter().find_map(|ext| {
            let mut candidate = OsString::from(target.as_os_str());
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        })
    }

    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }

        if let Some(main) = self.package_main(dir) {
            return Some(main);
        }

        self.resolve_file(&dir.join("index"))
    }

    /// Entry file declared by a package.json (`module` first, then `main`)
    fn package_main(&self, package_dir: &Path) -> Option<PathBuf> {
        let package_json = package_dir.join("package.json");
        let content = fs::read_to_string(&package_json).ok()?;

        let pkg: serde_json::Value = match serde_json::from_str(&content) {
            Ok(pkg) => pkg,
            Err(e) => {
                warn!("Ignoring malformed {}: {}", package_json.display(), e);
                return None;
            }
        };

        ["module", "main"]
            .iter()
            .filter_map(|field| pkg.get(field).and_then(|v| v.as_str()))
            .find_map(|entry| {
                let target = package_dir.join(entry);
                self.resolve_file(&target)
                    .or_else(|| self.resolve_file(&target.join("index")))
            })
    }
}

/// Relative or absolute specifiers resolve against the importer
fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// URLs that point outside the module graph
pub(crate) fn is_external_url(specifier: &str) -> bool {
    specifier.is_empty()
        || specifier.starts_with("//")
        || specifier.starts_with('#')
        || SCHEME_REGEX.is_match(specifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(root: &Path) -> Resolver {
        Resolver::with_rules(
            vec![".ts".into(), ".js".into(), ".css".into()],
            vec![root.join("src"), root.join("node_modules")],
        )
    }

    fn write(root: &Path, file: &str, content: &str) -> PathBuf {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path.canonicalize().unwrap()
    }

    #[test]
    fn test_extract_imports() {
        let source = r#"
            import foo from './foo';
            import { bar } from './bar.js';
            import * as baz from '../baz';
            import React, { useState } from 'react';
            import './side-effect.css';
            export { qux } from './qux';
            const x = require('./x');
        "#;

        let resolver = Resolver::with_rules(vec![".js".into()], vec![]);
        let deps = resolver.extract_dependencies(source, ModuleKind::Script);

        assert_eq!(
            deps,
            vec!["./foo", "./bar.js", "../baz", "react", "./side-effect.css", "./qux", "./x"]
        );
    }

    #[test]
    fn test_extract_dynamic_imports_in_order() {
        let source = r#"
            import first from './first';
            const module = import('./dynamic');
            const other = import("./other");
            import './first';
        "#;

        let resolver = Resolver::with_rules(vec![".js".into()], vec![]);
        let deps = resolver.extract_dependencies(source, ModuleKind::Script);

        assert_eq!(deps, vec!["./first", "./dynamic", "./other"]);
    }

    #[test]
    fn test_extract_style_dependencies() {
        let source = r#"
            @import "./reset.css";
            @import url('./theme.css');
            .logo { background: url(./logo.png); }
            .remote { background: url("https://cdn.example.com/x.png"); }
            .inline { background: url(data:image/png;base64,AAAA); }
        "#;

        let resolver = Resolver::with_rules(vec![".css".into()], vec![]);
        let deps = resolver.extract_dependencies(source, ModuleKind::Style);

        assert_eq!(deps, vec!["./reset.css", "./theme.css", "./logo.png"]);
    }

    #[test]
    fn test_images_declare_nothing() {
        let resolver = Resolver::with_rules(vec![".js".into()], vec![]);
        assert!(resolver
            .extract_dependencies("import './x'", ModuleKind::Image)
            .is_empty());
    }

    #[test]
    fn test_resolve_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let entry = write(root, "src/index.js", "");
        let ts = write(root, "src/util.ts", "");
        write(root, "src/util.js", "");

        let resolved = resolver(root).resolve("./util", &entry).unwrap();
        assert_eq!(resolved, ts);
    }

    #[test]
    fn test_resolve_bare_through_roots() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let entry = write(root, "src/index.js", "");
        let app = write(root, "src/app/main.js", "");
        let lib = write(root, "node_modules/lib/dist/lib.js", "");
        write(root, "node_modules/lib/package.json", r#"{"main": "dist/lib"}"#);
        let scoped = write(root, "node_modules/@scope/pkg/index.js", "");

        let resolver = resolver(root);
        assert_eq!(resolver.resolve("app/main", &entry).unwrap(), app);
        assert_eq!(resolver.resolve("lib", &entry).unwrap(), lib);
        assert_eq!(resolver.resolve("@scope/pkg", &entry).unwrap(), scoped);
    }

    #[test]
    fn test_resolve_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let entry = write(root, "src/index.js", "");
        let index = write(root, "src/widgets/index.js", "");

        assert_eq!(resolver(root).resolve("./widgets", &entry).unwrap(), index);
    }

    #[test]
    fn test_resolve_missing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let entry = write(root, "src/index.js", "");

        assert!(resolver(root).resolve("./missing", &entry).is_none());
        assert!(resolver(root).resolve("not-installed", &entry).is_none());
    }
}
