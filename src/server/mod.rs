//! Development server with live reload
//!
//! Provides a local development server with:
//! - Static serving of the published output directory
//! - Cache headers matching production (fixed-name files are never cached)
//! - File watching with generation-ordered incremental rebuilds
//! - WebSocket reload notifications

mod hmr;
mod rebuild;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::bundler::{Bundler, DOCUMENT};
use crate::cli::{BuildOptions, DevServerOptions, Mode};
use crate::config::Config;
use crate::env::EnvSnapshot;
use crate::html::RELOAD_PATH;

pub use hmr::HmrMessage;
pub use rebuild::{RebuildCoordinator, RebuildOutcome};

const IMMUTABLE: &str = "public, max-age=31536000, immutable";
const NO_CACHE: &str = "no-cache";

/// Shared server state
struct ServerState {
    /// Reload broadcast channel
    hmr_tx: broadcast::Sender<HmrMessage>,

    /// Output-relative path of the environment asset
    env_asset: String,

    /// Output-relative directory of hashed assets
    assets_dir: String,
}

/// Development server
pub struct DevServer {
    /// Project configuration
    config: Arc<Config>,

    /// Server options
    options: DevServerOptions,
}

impl DevServer {
    /// Create a new development server
    pub fn new(config: Arc<Config>, options: DevServerOptions) -> Result<Self> {
        Ok(Self { config, options })
    }

    /// Start the development server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = tokio::net::lookup_host((self.options.host.as_str(), self.options.port))
            .await?
            .next()
            .with_context(|| format!("Cannot resolve host {}", self.options.host))?;

        let build_options = BuildOptions {
            outdir: None,
            mode: Mode::Development,
            reload_client: self.options.hmr,
        };
        let bundler = Bundler::new((*self.config).clone(), build_options, EnvSnapshot::capture())?;
        let out_dir = bundler.output_dir();
        let coordinator = Arc::new(RebuildCoordinator::new(Arc::new(bundler)));

        let (hmr_tx, _) = broadcast::channel::<HmrMessage>(100);

        // Initial build; a failure is reported and the watcher keeps going
        let initial = {
            let coordinator = coordinator.clone();
            tokio::task::spawn_blocking(move || coordinator.rebuild(&[])).await?
        };
        report_outcome(&initial);

        if self.options.hmr {
            self.setup_file_watcher(coordinator.clone(), hmr_tx.clone(), out_dir.clone())?;
        }

        let state = Arc::new(ServerState {
            hmr_tx,
            env_asset: self.config.env_asset_path(),
            assets_dir: self.config.output.assets_dir.trim_matches('/').to_string(),
        });

        let app = Router::new()
            .route(RELOAD_PATH, get(hmr::hmr_websocket))
            .fallback_service(ServeDir::new(&out_dir))
            .layer(middleware::from_fn_with_state(state.clone(), cache_headers))
            .layer(CorsLayer::permissive())
            .with_state(state);

        if self.options.open {
            let url = format!("http://{}:{}", self.options.host, self.options.port);
            if let Err(e) = webbrowser_open(&url) {
                debug!("Failed to open browser: {}", e);
            }
        }

        info!("Server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Watch the project and rebuild on change
    fn setup_file_watcher(
        &self,
        coordinator: Arc<RebuildCoordinator>,
        hmr_tx: broadcast::Sender<HmrMessage>,
        out_dir: PathBuf,
    ) -> Result<()> {
        let root = self.config.root.clone();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer(Duration::from_millis(100), tx)?;
        debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

        // The debouncer is moved into the thread to keep it alive
        std::thread::spawn(move || {
            let _debouncer = debouncer;

            loop {
                match rx.recv() {
                    Ok(Ok(events)) => {
                        let changed: Vec<PathBuf> = events
                            .into_iter()
                            .map(|event| event.path)
                            .filter(|path| is_source_change(path, &root, &out_dir))
                            .collect();

                        if changed.is_empty() {
                            continue;
                        }

                        for path in &changed {
                            eprintln!(
                                "  {} File changed: {}",
                                "↻".yellow(),
                                path.strip_prefix(&root).unwrap_or(path).display().to_string().dimmed()
                            );
                        }

                        // Each rebuild runs on its own thread so a newer one can supersede it
                        let generation = coordinator.begin(&changed);
                        let coordinator = coordinator.clone();
                        let hmr_tx = hmr_tx.clone();
                        std::thread::spawn(move || {
                            let outcome = coordinator.run(generation);
                            report_outcome(&outcome);
                            if let Some(message) = HmrMessage::from_outcome(&outcome) {
                                let _ = hmr_tx.send(message);
                            }
                        });
                    }
                    Ok(Err(e)) => {
                        error!("Watch error: {:?}", e);
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(())
    }
}

/// Whether a watched path can affect the build
fn is_source_change(path: &Path, root: &Path, out_dir: &Path) -> bool {
    if path.starts_with(out_dir) {
        return false;
    }

    // Staging siblings of the output directory and other dot-directories
    let relative = path.strip_prefix(root).unwrap_or(path);
    !relative.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.starts_with('.') && name.len() > 1 && name != ".."
    })
}

/// Cache policy for an output-relative request path
fn cache_policy(path: &str, env_asset: &str, assets_dir: &str) -> &'static str {
    let path = path.trim_start_matches('/');

    if path.is_empty() || path == DOCUMENT || path == env_asset {
        NO_CACHE
    } else if !assets_dir.is_empty() && path.starts_with(&format!("{}/", assets_dir)) {
        IMMUTABLE
    } else {
        NO_CACHE
    }
}

async fn cache_headers(State(state): State<Arc<ServerState>>, request: Request, next: Next) -> Response {
    let policy = cache_policy(request.uri().path(), &state.env_asset, &state.assets_dir);
    let mut response = next.run(request).await;

    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(policy));
    }

    response
}

fn report_outcome(outcome: &RebuildOutcome) {
    match outcome {
        RebuildOutcome::Published { generation, changed, .. } => eprintln!(
            "  {} Rebuilt #{} ({} chunk(s) changed)",
            "✓".green(),
            generation,
            changed.len()
        ),
        RebuildOutcome::Superseded { generation } => {
            debug!("Rebuild #{} superseded", generation);
        }
        RebuildOutcome::Failed { error, .. } => eprintln!("  {} {}", "✗".red(), error.red()),
    }
}

/// Open URL in browser (simple implementation)
fn webbrowser_open(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd").args(["/C", "start", url]).spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_policy() {
        assert_eq!(cache_policy("/", "assets/env.js", "assets"), NO_CACHE);
        assert_eq!(cache_policy("/index.html", "assets/env.js", "assets"), NO_CACHE);
        assert_eq!(cache_policy("/assets/env.js", "assets/env.js", "assets"), NO_CACHE);
        assert_eq!(cache_policy("/assets/main.0123456789abcdef.js", "assets/env.js", "assets"), IMMUTABLE);
        assert_eq!(cache_policy("/robots.txt", "assets/env.js", "assets"), NO_CACHE);
    }

    #[test]
    fn test_output_and_staging_changes_ignored() {
        let root = Path::new("/home/.work/p");
        let out = Path::new("/home/.work/p/dist");
        assert!(is_source_change(Path::new("/home/.work/p/src/a.js"), root, out));
        assert!(!is_source_change(Path::new("/home/.work/p/dist/index.html"), root, out));
        assert!(!is_source_change(Path::new("/home/.work/p/.dist.staging/index.html"), root, out));
        assert!(!is_source_change(Path::new("/home/.work/p/.git/HEAD"), root, out));
    }
}
