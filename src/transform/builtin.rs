//! Built-in transforms for scripts, styles, images and JSON

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{EmittedAsset, Transform, TransformInput, TransformOutput};
use crate::config::join_url;
use crate::error::{BuildError, BuildResult};
use crate::resolver::is_external_url;
use crate::utils::hash_filename;

static CSS_IMPORT_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?[^;]*;"#).unwrap()
});

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')\s]+)["']?\s*\)"#).unwrap()
});

/// Replaces configured expressions (e.g. `process.env.NODE_ENV`) in scripts
pub struct DefineTransform {
    pattern: Option<Regex>,
    values: BTreeMap<String, String>,
}

impl DefineTransform {
    pub fn new(values: BTreeMap<String, String>) -> BuildResult<Self> {
        // Longest keys first so `a.b.c` wins over `a.b`
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let pattern = if keys.is_empty() {
            None
        } else {
            let alternation = keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let regex = Regex::new(&format!(r"\b(?:{})\b", alternation))
                .map_err(|e| BuildError::Config(format!("transform.define: {}", e)))?;
            Some(regex)
        };

        Ok(Self { pattern, values })
    }
}

impl Transform for DefineTransform {
    fn name(&self) -> &str {
        "define"
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput> {
        let source = std::str::from_utf8(input.content).context("script is not valid UTF-8")?;

        let code = match &self.pattern {
            Some(pattern) => pattern
                .replace_all(source, |caps: &regex::Captures| {
                    self.values[&caps[0]].clone()
                })
                .into_owned(),
            None => source.to_string(),
        };

        Ok(TransformOutput::code(code))
    }
}

/// Wraps a stylesheet into a module that injects a `<style>` element.
///
/// `@import` rules become `require` calls and `url()` references are
/// replaced by the URL the referenced module exports.
pub struct StyleTransform;

impl Transform for StyleTransform {
    fn name(&self) -> &str {
        "style"
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput> {
        let source = std::str::from_utf8(input.content).context("stylesheet is not valid UTF-8")?;

        let mut imports = Vec::new();
        let css = CSS_IMPORT_STATEMENT.replace_all(source, |caps: &regex::Captures| {
            let spec = &caps[1];
            if is_external_url(spec) {
                caps[0].to_string()
            } else {
                imports.push(spec.to_string());
                String::new()
            }
        });

        // Build a JS string expression, splicing in required URLs
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in CSS_URL.captures_iter(&css) {
            let spec = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if is_external_url(spec) {
                continue;
            }
            let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
            parts.push(serde_json::to_string(&format!("{}url(\"", &css[last..whole.start]))?);
            parts.push(format!("require({})", serde_json::to_string(spec)?));
            parts.push(serde_json::to_string("\")")?);
            last = whole.end;
        }
        parts.push(serde_json::to_string(&css[last..])?);

        let mut code = String::new();
        for spec in &imports {
            code.push_str(&format!("require({});\n", serde_json::to_string(spec)?));
        }
        code.push_str(&format!(
            r#"(function() {{
  var style = document.createElement('style');
  style.setAttribute('data-module', {});
  style.textContent = {};
  document.head.appendChild(style);
}})();
module.exports = {{}};
"#,
            serde_json::to_string(input.key)?,
            parts.join(" + ")
        ));

        Ok(TransformOutput::code(code))
    }
}

/// Inlines small files as data URIs and emits larger ones as hashed assets
pub struct UrlTransform {
    limit: usize,
    assets_dir: String,
    public_url: String,
}

impl UrlTransform {
    pub fn new(limit: usize, assets_dir: String, public_url: String) -> Self {
        Self {
            limit,
            assets_dir,
            public_url,
        }
    }
}

impl Transform for UrlTransform {
    fn name(&self) -> &str {
        "url"
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput> {
        let ext = input
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase();

        if input.content.len() <= self.limit {
            let encoded = base64::engine::general_purpose::STANDARD.encode(input.content);
            let uri = format!("data:{};base64,{}", mime_type(&ext), encoded);
            return Ok(TransformOutput::code(format!(
                "module.exports = {};",
                serde_json::to_string(&uri)?
            )));
        }

        let stem = input
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset");
        let path = join_url(&self.assets_dir, &hash_filename(stem, input.content, &ext));
        let url = format!("{}/{}", self.public_url.trim_end_matches('/'), path);

        Ok(TransformOutput {
            content: format!("module.exports = {};", serde_json::to_string(&url)?).into_bytes(),
            assets: vec![EmittedAsset {
                path,
                content: input.content.to_vec(),
            }],
        })
    }
}

fn mime_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Turns a JSON file into a module exporting its value
pub struct JsonTransform;

impl Transform for JsonTransform {
    fn name(&self) -> &str {
        "json"
    }

    fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput> {
        let source = std::str::from_utf8(input.content).context("JSON is not valid UTF-8")?;

        // Validate JSON
        serde_json::from_str::<serde_json::Value>(source)
            .with_context(|| format!("Invalid JSON in {}", input.key))?;

        Ok(TransformOutput::code(format!("module.exports = {};", source.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::ModuleKind;
    use std::path::Path;

    fn run(transform: &dyn Transform, file: &str, content: &[u8]) -> Result<TransformOutput> {
        let path = Path::new("/project/src").join(file);
        let key = format!("src/{}", file);
        transform.transform(&TransformInput {
            key: &key,
            path: &path,
            kind: ModuleKind::detect(&path),
            content,
        })
    }

    fn code(output: TransformOutput) -> String {
        String::from_utf8(output.content).unwrap()
    }

    #[test]
    fn test_define_replaces_whole_expressions() {
        let mut values = BTreeMap::new();
        values.insert("process.env.NODE_ENV".to_string(), "\"production\"".to_string());
        values.insert("__DEV__".to_string(), "false".to_string());
        let define = DefineTransform::new(values).unwrap();

        let out = code(
            run(
                &define,
                "a.js",
                b"if (process.env.NODE_ENV !== 'production' && __DEV__) {} process.env.NODE_ENV_X;",
            )
            .unwrap(),
        );
        assert_eq!(
            out,
            "if (\"production\" !== 'production' && false) {} process.env.NODE_ENV_X;"
        );
    }

    #[test]
    fn test_transform_css() {
        let out = code(run(&StyleTransform, "test.css", b"body { color: red; }").unwrap());

        assert!(out.contains("document.createElement('style')"));
        assert!(out.contains("\"body { color: red; }\""));
        assert!(out.contains("\"src/test.css\""));
    }

    #[test]
    fn test_css_imports_and_urls_become_requires() {
        let css = b"@import './reset.css';\n.a { background: url(./logo.png) }\n.b { background: url(https://x.test/y.png) }";
        let out = code(run(&StyleTransform, "app.css", css).unwrap());

        assert!(out.starts_with("require(\"./reset.css\");\n"));
        assert!(out.contains("require(\"./logo.png\")"));
        assert!(out.contains("https://x.test/y.png"));
        assert!(!out.contains("@import"));
    }

    #[test]
    fn test_small_image_inlined() {
        let url = UrlTransform::new(16, "assets".into(), "/".into());
        let output = run(&url, "dot.png", &[1, 2, 3]).unwrap();

        assert!(output.assets.is_empty());
        assert_eq!(code(output), "module.exports = \"data:image/png;base64,AQID\";");
    }

    #[test]
    fn test_large_image_emitted() {
        let url = UrlTransform::new(2, "assets".into(), "/static/".into());
        let output = run(&url, "logo.svg", b"<svg></svg>").unwrap();

        assert_eq!(output.assets.len(), 1);
        let asset = &output.assets[0];
        assert!(asset.path.starts_with("assets/logo."));
        assert!(asset.path.ends_with(".svg"));
        assert_eq!(
            code(output.clone()),
            format!("module.exports = \"/static/{}\";", asset.path)
        );
    }

    #[test]
    fn test_transform_json() {
        let out = code(run(&JsonTransform, "data.json", br#"{"key": "value", "num": 42}"#).unwrap());
        assert_eq!(out, r#"module.exports = {"key": "value", "num": 42};"#);

        assert!(run(&JsonTransform, "bad.json", b"{nope").is_err());
    }
}
