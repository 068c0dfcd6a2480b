//! Content-addressed chunk manifest
//!
//! Maps every chunk name to the hash of its rendered content and the
//! filename that embeds that hash. The manifest is inlined into the entry
//! document so async chunks resolve without an extra request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::join_url;
use crate::utils::hash_content;

/// Global the inline manifest is assigned to
pub const MANIFEST_GLOBAL: &str = "__splitpack_manifest__";

/// One chunk's manifest record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Content hash of the rendered chunk
    pub hash: String,

    /// Output-relative filename, `<assets_dir>/<name>.<hash>.js`
    pub file: String,
}

/// Chunk name → manifest entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a chunk's content and record it
    pub fn insert_chunk(&mut self, name: &str, content: &[u8], assets_dir: &str) -> &ManifestEntry {
        let hash = hash_content(content);
        let file = join_url(assets_dir, &format!("{}.{}.js", name, hash));

        self.entries.insert(name.to_string(), ManifestEntry { hash, file });
        &self.entries[name]
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.get(name)
    }

    /// Entries ordered by chunk name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact JSON form
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Statement assigning the manifest to its global, safe inside `<script>`
    pub fn inline_script(&self) -> String {
        format!("window.{} = {};", MANIFEST_GLOBAL, self.to_json().replace("</", "<\\/"))
    }

    /// Chunks added, removed or re-hashed relative to `previous`, by name
    pub fn changed_since(&self, previous: &Manifest) -> Vec<String> {
        let mut changed: Vec<String> = self
            .entries
            .iter()
            .filter(|(name, entry)| previous.get(name).map(|p| p.hash != entry.hash).unwrap_or(true))
            .map(|(name, _)| name.clone())
            .collect();

        changed.extend(
            previous
                .entries
                .keys()
                .filter(|name| !self.entries.contains_key(*name))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_encodes_hash() {
        let mut manifest = Manifest::new();
        let entry = manifest.insert_chunk("main", b"console.log(1)", "assets").clone();

        assert_eq!(entry.hash.len(), 16);
        assert_eq!(entry.file, format!("assets/main.{}.js", entry.hash));
    }

    #[test]
    fn test_hash_follows_content_only() {
        let mut a = Manifest::new();
        let mut b = Manifest::new();
        a.insert_chunk("main", b"same", "assets");
        b.insert_chunk("main", b"same", "assets");
        assert_eq!(a, b);

        b.insert_chunk("main", b"different", "assets");
        assert_ne!(a.get("main").unwrap().hash, b.get("main").unwrap().hash);
    }

    #[test]
    fn test_inline_script() {
        let mut manifest = Manifest::new();
        let hash = manifest.insert_chunk("async-common", b"x", "assets").hash.clone();

        assert_eq!(
            manifest.inline_script(),
            format!(
                "window.__splitpack_manifest__ = {{\"async-common\":{{\"hash\":\"{0}\",\"file\":\"assets/async-common.{0}.js\"}}}};",
                hash
            )
        );
    }

    #[test]
    fn test_changed_since() {
        let mut before = Manifest::new();
        before.insert_chunk("a", b"a", "assets");
        before.insert_chunk("b", b"b", "assets");
        before.insert_chunk("gone", b"g", "assets");

        let mut after = Manifest::new();
        after.insert_chunk("a", b"a", "assets");
        after.insert_chunk("b", b"b2", "assets");
        after.insert_chunk("new", b"n", "assets");

        assert_eq!(after.changed_since(&before), vec!["b", "gone", "new"]);
        assert!(after.changed_since(&after).is_empty());
    }
}
