//! Per-module transforms
//!
//! A [`TransformRegistry`] maps file name patterns to ordered chains of
//! [`Transform`]s. The first pattern matching a module's file name wins;
//! modules without a matching pattern pass through unchanged.

mod builtin;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use globset::{Glob, GlobMatcher};
use tracing::debug;

use crate::bundler::ModuleKind;
use crate::cli::Mode;
use crate::config::Config;
use crate::error::{BuildError, BuildResult};

pub use builtin::{DefineTransform, JsonTransform, StyleTransform, UrlTransform};

/// Input handed to each transform in a chain
#[derive(Debug)]
pub struct TransformInput<'a> {
    /// Root-relative module key
    pub key: &'a str,

    /// Absolute module path
    pub path: &'a Path,

    /// Module kind
    pub kind: ModuleKind,

    /// Current content (output of the previous transform)
    pub content: &'a [u8],
}

/// A file produced by a transform in addition to the module code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Output-relative, `/`-separated path
    pub path: String,

    pub content: Vec<u8>,
}

/// Output of a single transform
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub content: Vec<u8>,
    pub assets: Vec<EmittedAsset>,
}

impl TransformOutput {
    pub fn code(code: String) -> Self {
        Self {
            content: code.into_bytes(),
            assets: Vec::new(),
        }
    }
}

/// Final result of running a module through its chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Module code, ready to be wrapped into a chunk
    pub code: String,

    /// Extra files to emit
    pub assets: Vec<EmittedAsset>,
}

/// A content transform
pub trait Transform: Send + Sync {
    /// Transform name for logging and error reports
    fn name(&self) -> &str;

    /// Transform one module's content
    fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput>;
}

struct TransformRule {
    pattern: String,
    matcher: GlobMatcher,
    chain: Vec<Arc<dyn Transform>>,
}

/// Pattern → transform chain registry
#[derive(Default)]
pub struct TransformRegistry {
    rules: Vec<TransformRule>,
}

impl TransformRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in script, style, image and JSON chains
    pub fn with_defaults(config: &Config, mode: Mode) -> BuildResult<Self> {
        let mut defines = config.transform.define.clone();
        defines
            .entry("process.env.NODE_ENV".to_string())
            .or_insert_with(|| format!("\"{}\"", mode.as_str()));

        let mut registry = Self::new();
        registry.register(
            "*.{js,mjs,cjs,jsx,ts,mts,cts,tsx}",
            vec![Arc::new(DefineTransform::new(defines)?)],
        )?;
        registry.register("*.css", vec![Arc::new(StyleTransform)])?;
        registry.register(
            "*.{png,jpg,jpeg,gif,svg,ico,webp}",
            vec![Arc::new(UrlTransform::new(
                config.transform.inline_limit,
                config.output.assets_dir.clone(),
                config.output.public_url.clone(),
            ))],
        )?;
        registry.register("*.json", vec![Arc::new(JsonTransform)])?;

        Ok(registry)
    }

    /// Register a chain for a file name glob; earlier registrations win
    pub fn register(&mut self, pattern: &str, chain: Vec<Arc<dyn Transform>>) -> BuildResult<()> {
        let matcher = Glob::new(pattern)
            .map_err(|e| BuildError::Config(format!("transform pattern '{}': {}", pattern, e)))?
            .compile_matcher();

        self.rules.push(TransformRule {
            pattern: pattern.to_string(),
            matcher,
            chain,
        });

        Ok(())
    }

    /// Chain registered for a path, if any
    pub fn chain_for(&self, path: &Path) -> Option<&[Arc<dyn Transform>]> {
        let file_name = path.file_name()?;
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(file_name))
            .map(|rule| rule.chain.as_slice())
    }

    /// Run a module's source through its chain
    pub fn apply(
        &self,
        key: &str,
        path: &Path,
        kind: ModuleKind,
        source: &[u8],
    ) -> BuildResult<Transformed> {
        let mut content = source.to_vec();
        let mut assets = Vec::new();

        for transform in self.chain_for(path).unwrap_or_default() {
            debug!("Applying '{}' to {}", transform.name(), key);

            let input = TransformInput {
                key,
                path,
                kind,
                content: &content,
            };
            let output = transform.transform(&input).map_err(|e| BuildError::Transform {
                module: key.to_string(),
                transform: transform.name().to_string(),
                message: format!("{:#}", e),
            })?;

            content = output.content;
            assets.extend(output.assets);
        }

        let code = String::from_utf8(content).map_err(|_| BuildError::Transform {
            module: key.to_string(),
            transform: "utf-8".to_string(),
            message: "module did not produce UTF-8 code".to_string(),
        })?;

        Ok(Transformed { code, assets })
    }

    /// Registered patterns, in priority order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.pattern.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Append(&'static str);

    impl Transform for Append {
        fn name(&self) -> &str {
            "append"
        }

        fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput> {
            let mut content = input.content.to_vec();
            content.extend_from_slice(self.0.as_bytes());
            Ok(TransformOutput {
                content,
                assets: vec![EmittedAsset {
                    path: format!("assets/{}", self.0),
                    content: Vec::new(),
                }],
            })
        }
    }

    struct Fail;

    impl Transform for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn transform(&self, _input: &TransformInput<'_>) -> Result<TransformOutput> {
            anyhow::bail!("unsupported syntax")
        }
    }

    fn apply(registry: &TransformRegistry, file: &str, source: &[u8]) -> BuildResult<Transformed> {
        let path = PathBuf::from("/project/src").join(file);
        registry.apply(&format!("src/{}", file), &path, ModuleKind::detect(&path), source)
    }

    #[test]
    fn test_chain_runs_in_order() {
        let mut registry = TransformRegistry::new();
        registry
            .register("*.txt", vec![Arc::new(Append("a")), Arc::new(Append("b"))])
            .unwrap();

        let out = apply(&registry, "x.txt", b"-").unwrap();
        assert_eq!(out.code, "-ab");
        assert_eq!(out.assets.len(), 2);
        assert_eq!(out.assets[1].path, "assets/b");
    }

    #[test]
    fn test_first_pattern_wins() {
        let mut registry = TransformRegistry::new();
        registry.register("special.*", vec![Arc::new(Append("1"))]).unwrap();
        registry.register("*.txt", vec![Arc::new(Append("2"))]).unwrap();

        assert_eq!(apply(&registry, "special.txt", b"").unwrap().code, "1");
        assert_eq!(apply(&registry, "other.txt", b"").unwrap().code, "2");
        assert_eq!(registry.patterns().collect::<Vec<_>>(), vec!["special.*", "*.txt"]);
    }

    #[test]
    fn test_unmatched_passes_through() {
        let registry = TransformRegistry::new();
        assert_eq!(apply(&registry, "notes.md", b"# hi").unwrap().code, "# hi");
    }

    #[test]
    fn test_failure_names_module() {
        let mut registry = TransformRegistry::new();
        registry.register("*.js", vec![Arc::new(Fail)]).unwrap();

        let err = apply(&registry, "broken.js", b"").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("src/broken.js"));
        assert!(message.contains("fail"));
        assert!(message.contains("unsupported syntax"));
    }

    #[test]
    fn test_binary_without_transform_fails() {
        let registry = TransformRegistry::new();
        let err = apply(&registry, "blob.bin", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, BuildError::Transform { .. }));
    }
}
