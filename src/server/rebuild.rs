//! Generation-ordered rebuilds for watch mode
//!
//! Every rebuild request takes a new generation number. Builds may overlap,
//! but only a build whose generation is still the newest when it finishes is
//! published, and publishing happens under a lock, so the output directory
//! always holds exactly one build.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bundler::{BuildOutput, Bundler, Manifest, DOCUMENT};
use crate::utils::hash_content;

/// What happened to a rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Written to the output directory
    Published {
        generation: u64,
        /// Chunks whose hash changed since the previous publish
        changed: Vec<String>,
        /// Whether any non-chunk file (public files, env asset, document
        /// template or favicon) differs from the previous publish
        static_changed: bool,
    },

    /// A newer rebuild was requested before this one finished
    Superseded { generation: u64 },

    /// Build or write failed; the previous output stays in place
    Failed { generation: u64, error: String },
}

#[derive(Debug, Default)]
struct Published {
    generation: u64,
    manifest: Option<Manifest>,
    static_files: Option<String>,
}

/// Serializes publishing of overlapping rebuilds
pub struct RebuildCoordinator {
    bundler: Arc<Bundler>,
    generation: AtomicU64,
    published: Mutex<Published>,
}

impl RebuildCoordinator {
    pub fn new(bundler: Arc<Bundler>) -> Self {
        Self {
            bundler,
            generation: AtomicU64::new(0),
            published: Mutex::new(Published::default()),
        }
    }

    /// Newest requested generation
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Generation of the build currently in the output directory
    pub fn published_generation(&self) -> u64 {
        self.published.lock().generation
    }

    /// Invalidate changed files and claim a new generation
    pub fn begin(&self, changed: &[PathBuf]) -> u64 {
        self.bundler.invalidate(changed);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Rebuild generation {} requested ({} changed files)", generation, changed.len());
        generation
    }

    /// Build and, if still current, publish `generation`
    pub fn run(&self, generation: u64) -> RebuildOutcome {
        let result = self.bundler.build();

        let mut published = self.published.lock();
        if generation != self.current_generation() {
            debug!("Discarding superseded generation {}", generation);
            return RebuildOutcome::Superseded { generation };
        }

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!("Rebuild {} failed: {}", generation, e);
                return RebuildOutcome::Failed {
                    generation,
                    error: e.to_string(),
                };
            }
        };

        if let Err(e) = self.bundler.write(&output) {
            warn!("Publishing rebuild {} failed: {}", generation, e);
            return RebuildOutcome::Failed {
                generation,
                error: e.to_string(),
            };
        }

        let changed = match &published.manifest {
            Some(previous) => output.manifest.changed_since(previous),
            None => output.manifest.iter().map(|(name, _)| name.to_string()).collect(),
        };

        let static_files = static_fingerprint(&output);
        let static_changed = published.static_files.as_deref() != Some(static_files.as_str());

        info!("Published generation {} ({} chunks changed)", generation, changed.len());
        published.generation = generation;
        published.manifest = Some(output.manifest);
        published.static_files = Some(static_files);

        RebuildOutcome::Published {
            generation,
            changed,
            static_changed,
        }
    }

    /// Request and run a rebuild on the current thread
    pub fn rebuild(&self, changed: &[PathBuf]) -> RebuildOutcome {
        let generation = self.begin(changed);
        self.run(generation)
    }
}

/// Digest of every output file that is not a chunk.
///
/// The document embeds the manifest, so it is compared with the manifest
/// blanked out: a chunk-only change does not count as a static change.
fn static_fingerprint(output: &BuildOutput) -> String {
    let chunk_files: Vec<&str> = output.manifest.iter().map(|(_, entry)| entry.file.as_str()).collect();
    let inline_manifest = output.manifest.inline_script();

    let mut digest = Vec::new();
    for (path, content) in &output.files {
        if chunk_files.contains(&path.as_str()) {
            continue;
        }
        let hash = match output.document() {
            Some(document) if path == DOCUMENT => {
                let mut document = document.replace(&inline_manifest, "");
                for file in &chunk_files {
                    document = document.replace(file, "");
                }
                hash_content(document.as_bytes())
            }
            _ => hash_content(content),
        };
        digest.extend_from_slice(path.as_bytes());
        digest.push(0);
        digest.extend_from_slice(hash.as_bytes());
        digest.push(b'\n');
    }

    hash_content(&digest)
}
