//! Project initialization command

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

/// Initialize a new project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project name / directory
    #[arg(default_value = ".")]
    pub name: String,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = Path::new(&self.name);

        eprintln!("{} Initializing new project...\n", "→".blue());

        if project_dir.join("splitpack.toml").exists() && !self.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                project_dir.join("splitpack.toml").display()
            );
        }

        let files = [
            ("splitpack.toml", self.generate_config()),
            ("src/index.js", INDEX_JS.to_string()),
            ("src/footer.js", FOOTER_JS.to_string()),
            ("src/styles.css", STYLES_CSS.to_string()),
            ("public/robots.txt", ROBOTS_TXT.to_string()),
        ];

        for (relative, content) in files {
            let path = project_dir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("  {} Created {}", "✓".green(), relative.cyan());
        }

        eprintln!("\n{} Project initialized successfully!\n", "✓".green().bold());

        eprintln!("  Next steps:");
        if self.name != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.name.cyan());
        }
        eprintln!("    {} splitpack dev", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn project_name(&self) -> String {
        Path::new(&self.name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "my-app".to_string())
    }

    fn generate_config(&self) -> String {
        format!(
            r#"# Splitpack configuration

[project]
name = "{name}"
version = "0.1.0"

[[entry]]
name = "main"
path = "src/index.js"

[resolve]
extensions = [".js", ".jsx", ".ts", ".tsx", ".css", ".json"]
roots = ["src", "node_modules"]

[output]
dir = "dist"
public_url = "/"
public_dir = "public"

[split]
shared_chunk = "async-common"
min_chunks = 2

# [[split.library]]
# name = "react"
# pattern = "^node_modules/(react|react-dom|scheduler)/"

[env]
global = "env"
file = "env.js"

[html]
title = "{name}"

[dev]
port = 3001
"#,
            name = self.project_name(),
        )
    }
}

const INDEX_JS: &str = r#"import './styles.css';
import { renderFooter } from './footer';

const app = document.getElementById('app');
app.innerHTML = `<h1>Hello from ${window.env.DEPLOY_ENV || 'local'}</h1>`;
app.appendChild(renderFooter());
"#;

const FOOTER_JS: &str = r#"export function renderFooter() {
  const footer = document.createElement('footer');
  footer.textContent = `v${window.env.APP_VERSION || 'dev'}`;
  return footer;
}
"#;

const STYLES_CSS: &str = r#"body {
  margin: 0;
  font-family: system-ui, sans-serif;
}

footer {
  color: #888;
}
"#;

const ROBOTS_TXT: &str = "User-agent: *\nAllow: /\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = InitCommand {
            name: dir.path().join("shop").display().to_string(),
            force: false,
        };

        let root = Path::new(&cmd.name);
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/index.js"), INDEX_JS).unwrap();

        let config = crate::config::Config::parse(&cmd.generate_config(), root).unwrap();
        assert_eq!(config.project.name, "shop");
        assert_eq!(config.entrypoints[0].name, "main");
        assert_eq!(config.output.public_dir.as_deref(), Some("public"));
    }
}
