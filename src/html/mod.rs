//! Entry document generation
//!
//! The document loads, in order: the environment asset, the inline manifest
//! together with the chunk runtime, then every initial chunk. Tags are
//! injected into a user template when one is configured.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bundler::render::runtime_script;
use crate::bundler::Manifest;
use crate::config::HtmlConfig;

/// WebSocket path the dev server accepts reload clients on
pub const RELOAD_PATH: &str = "/__splitpack_hmr";

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());

static SCRIPT_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<@(\d+)>").unwrap());

static BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());

static TITLE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*title\s*\}\}").unwrap());

/// Everything needed to render the entry document
#[derive(Debug)]
pub struct DocumentInput<'a> {
    pub html: &'a HtmlConfig,

    /// Fallback title
    pub project_name: &'a str,

    /// Public URL prefix, ending with `/`
    pub public_path: &'a str,

    /// Output-relative path of the environment asset
    pub env_asset: &'a str,

    pub manifest: &'a Manifest,

    /// Output-relative chunk files, in load order
    pub initial_files: &'a [String],

    /// Template contents, if configured
    pub template: Option<&'a str>,

    /// Output-relative favicon path
    pub favicon: Option<&'a str>,

    /// Inject the live-reload client
    pub reload_client: bool,
}

/// Render the entry document
pub fn render_document(input: &DocumentInput<'_>) -> String {
    let title = input.html.title.as_deref().unwrap_or(input.project_name);

    let mut head = Vec::new();
    if let Some(favicon) = input.favicon {
        head.push(format!(
            r#"<link rel="icon" href="{}{}" />"#,
            input.public_path,
            escape(favicon)
        ));
    }
    head.push(format!(
        r#"<script src="{}{}"></script>"#,
        input.public_path,
        escape(input.env_asset)
    ));
    head.push(format!(
        "<script>\n{}\n{}</script>",
        input.manifest.inline_script(),
        runtime_script(input.public_path)
    ));

    let mut body: Vec<String> = input
        .initial_files
        .iter()
        .map(|file| format!(r#"<script src="{}{}"></script>"#, input.public_path, escape(file)))
        .collect();
    if input.reload_client {
        body.push(reload_client_script());
    }

    let document = match input.template {
        Some(template) => inject(
            &TITLE_PLACEHOLDER.replace_all(template, regex::NoExpand(&escape(title))),
            &head.join("\n"),
            &body.join("\n"),
        ),
        None => default_document(title, input.html.description.as_deref(), &head, &body),
    };

    if input.html.minify {
        minify(&document)
    } else {
        document
    }
}

fn default_document(title: &str, description: Option<&str>, head: &[String], body: &[String]) -> String {
    let description = description
        .map(|d| format!("    <meta name=\"description\" content=\"{}\" />\n", escape(d)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{}</title>
{}    {}
  </head>
  <body>
    <div id="app"></div>
    {}
  </body>
</html>
"#,
        escape(title),
        description,
        head.join("\n    "),
        body.join("\n    ")
    )
}

/// Insert head tags before `</head>` and body tags before `</body>`
fn inject(template: &str, head: &str, body: &str) -> String {
    let mut html = template.to_string();

    match html.rfind("</head>") {
        Some(pos) => html.insert_str(pos, &format!("{}\n", head)),
        None => html.insert_str(0, &format!("{}\n", head)),
    }

    match html.rfind("</body>") {
        Some(pos) => html.insert_str(pos, &format!("{}\n", body)),
        None => {
            html.push_str(body);
            html.push('\n');
        }
    }

    html
}

/// Collapse whitespace between tags, leaving script contents untouched
fn minify(html: &str) -> String {
    let mut scripts = Vec::new();
    let masked = SCRIPT_BLOCK.replace_all(html, |caps: &regex::Captures| {
        scripts.push(caps[0].to_string());
        format!("<@{}>", scripts.len() - 1)
    });

    let collapsed = BETWEEN_TAGS.replace_all(&masked, "><");
    let restored = SCRIPT_PLACEHOLDER.replace_all(&collapsed, |caps: &regex::Captures| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|i| scripts.get(i))
            .cloned()
            .unwrap_or_default()
    });

    restored.trim().to_string()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn reload_client_script() -> String {
    format!(
        r#"<script>
(function () {{
  var protocol = location.protocol === "https:" ? "wss://" : "ws://";
  var ws = new WebSocket(protocol + location.host + "{}");
  ws.onmessage = function (event) {{
    var message = JSON.parse(event.data);
    if (message.type === "update" || message.type === "full-reload") {{
      location.reload();
    }} else if (message.type === "error") {{
      console.error("[splitpack] " + message.message);
    }}
  }};
  ws.onclose = function () {{
    setTimeout(function () {{ location.reload(); }}, 1000);
  }};
}})();
</script>"#,
        RELOAD_PATH
    )
}
