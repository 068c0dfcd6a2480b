//! Output emission
//!
//! A build is first fully rendered in memory. Publishing writes every file
//! into a staging directory next to the output directory and swaps it in,
//! so a failed or superseded build never leaves a partial output behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{BuildError, BuildResult};

/// Output-relative path → file content
pub type OutputFiles = BTreeMap<String, Vec<u8>>;

/// Collect the public directory, skipping reserved output paths
pub fn collect_public_files(public_dir: &Path, reserved: &[&str]) -> BuildResult<OutputFiles> {
    let mut files = OutputFiles::new();

    if !public_dir.is_dir() {
        debug!("No public directory at {}", public_dir.display());
        return Ok(files);
    }

    for entry in WalkDir::new(public_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| public_dir.to_path_buf()),
            source: e.into_io_error().unwrap_or_else(|| std::io::Error::other("walk failed")),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(public_dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if reserved.contains(&relative.as_str()) {
            warn!("Skipping public file {}: path is generated by the build", relative);
            continue;
        }

        let content = fs::read(entry.path()).map_err(|source| BuildError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        files.insert(relative, content);
    }

    Ok(files)
}

/// Replace `out_dir` with exactly `files`
pub fn publish(files: &OutputFiles, out_dir: &Path) -> BuildResult<()> {
    let staging = sibling(out_dir, "staging");
    let retired = sibling(out_dir, "old");

    remove_dir(&staging)?;
    create_dir(&staging)?;

    for (relative, content) in files {
        let path = staging.join(relative);
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        fs::write(&path, content).map_err(|source| BuildError::Emit {
            path: out_dir.join(relative),
            source,
        })?;
    }

    remove_dir(&retired)?;
    if out_dir.exists() {
        rename(out_dir, &retired)?;
    }
    rename(&staging, out_dir)?;
    remove_dir(&retired)?;

    debug!("Published {} files to {}", files.len(), out_dir.display());
    Ok(())
}

/// `<parent>/.<name>.<suffix>`
fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dist".to_string());
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{}.{}", name, suffix))
}

fn create_dir(path: &Path) -> BuildResult<()> {
    fs::create_dir_all(path).map_err(|source| BuildError::Emit {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_dir(path: &Path) -> BuildResult<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|source| BuildError::Emit {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn rename(from: &Path, to: &Path) -> BuildResult<()> {
    fs::rename(from, to).map_err(|source| BuildError::Emit {
        path: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.js"), "old").unwrap();

        let mut files = OutputFiles::new();
        files.insert("index.html".into(), b"<html></html>".to_vec());
        files.insert("assets/main.abc.js".into(), b"main".to_vec());
        publish(&files, &out).unwrap();

        assert!(!out.join("stale.js").exists());
        assert_eq!(fs::read(out.join("assets/main.abc.js")).unwrap(), b"main");
        assert!(!dir.path().join(".dist.staging").exists());
        assert!(!dir.path().join(".dist.old").exists());
    }

    #[test]
    fn test_public_files_skip_reserved() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(public.join("assets")).unwrap();
        fs::write(public.join("robots.txt"), "User-agent: *").unwrap();
        fs::write(public.join("assets/env.js"), "window.env = {}").unwrap();

        let files = collect_public_files(&public, &["assets/env.js"]).unwrap();

        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["robots.txt"]);
    }

    #[test]
    fn test_missing_public_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_public_files(&dir.path().join("nope"), &[]).unwrap().is_empty());
    }
}
