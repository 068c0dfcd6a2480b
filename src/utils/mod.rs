//! Utility functions and helpers

use std::path::Path;

use sha2::{Digest, Sha256};

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Generate a hash-based filename
pub fn hash_filename(base: &str, content: &[u8], ext: &str) -> String {
    let hash = hash_content(content);
    format!("{}.{}.{}", base, hash, ext)
}

/// Root-relative, `/`-separated key for a path.
///
/// Paths outside `root` keep their absolute form.
pub fn module_key(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => pathdiff::diff_paths(path, root)
            .filter(|p| !p.starts_with(".."))
            .unwrap_or_else(|| path.to_path_buf()),
    };

    relative.display().to_string().replace('\\', "/")
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_hash_content() {
        let hash = hash_content(b"hello world");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, hash_content(b"hello world"));
        assert_ne!(hash, hash_content(b"hello world!"));
    }

    #[test]
    fn test_hash_filename() {
        let name = hash_filename("logo", b"png", "png");
        assert!(name.starts_with("logo."));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "logo.".len() + 16 + ".png".len());
    }

    #[test]
    fn test_module_key() {
        let root = PathBuf::from("/project");
        assert_eq!(module_key(&root, Path::new("/project/src/a.js")), "src/a.js");
        assert_eq!(
            module_key(&root, Path::new("/project/node_modules/x/index.js")),
            "node_modules/x/index.js"
        );
        assert_eq!(module_key(&root, Path::new("/elsewhere/b.js")), "/elsewhere/b.js");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        use std::time::Duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5.00s");
    }
}
