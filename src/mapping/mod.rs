//! Cross-reference between external ids (IMDb) and site slugs.
//!
//! The table is small and read-mostly. It lives behind an `RwLock` so the
//! server can share one store across requests; `upsert` is last-writer-wins.

use crate::core::ContentSlug;
use crate::utils::fold_vietnamese;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub external_id: String,
    pub slug: ContentSlug,
    /// Title as the external catalog knows it (usually English).
    pub canonical_title: String,
    /// Title as the source site shows it.
    pub local_title: String,
    pub alias_titles: Vec<String>,
}

impl MappingEntry {
    /// All known titles, canonical first, without blanks or repeats.
    pub fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = Vec::new();
        let candidates = [&self.canonical_title, &self.local_title]
            .into_iter()
            .chain(self.alias_titles.iter());
        for title in candidates {
            let title = title.trim();
            if !title.is_empty() && !titles.iter().any(|t| t == title) {
                titles.push(title.to_string());
            }
        }
        titles
    }
}

/// Fields accepted by [`MappingStore::upsert`]; omitted ones become empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MappingUpdate {
    pub external_id: Option<String>,
    pub canonical_title: Option<String>,
    pub local_title: Option<String>,
    pub alias_titles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default)]
    entries: Vec<MappingFileEntry>,
}

#[derive(Debug, Deserialize)]
struct MappingFileEntry {
    slug: ContentSlug,
    #[serde(flatten)]
    update: MappingUpdate,
}

#[derive(Debug, Default)]
pub struct MappingStore {
    entries: RwLock<Vec<MappingEntry>>,
}

impl MappingStore {
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Store seeded with the titles known to need a cross-reference.
    pub fn with_defaults() -> Self {
        Self::new(default_entries())
    }

    /// Find the entry a free-text query or external id refers to.
    ///
    /// Entries are tried in table order; within an entry the rules are, in
    /// order: canonical title, external id, local or alias title, and finally
    /// substring containment either way against the canonical title.
    pub fn resolve(&self, query: &str) -> Option<MappingEntry> {
        let query = fold_vietnamese(query);
        if query.is_empty() {
            return None;
        }

        let found = self.read().iter().find(|entry| matches_entry(entry, &query)).cloned();
        match &found {
            Some(entry) => debug!("Resolved '{}' to {}", query, entry.slug),
            None => debug!("No mapping for '{}'", query),
        }
        found
    }

    /// Slug for an external id, by exact id match only.
    pub fn slug_for(&self, external_id: &str) -> Option<ContentSlug> {
        let id = fold_vietnamese(external_id);
        if id.is_empty() {
            return None;
        }
        self.read()
            .iter()
            .find(|entry| fold_vietnamese(&entry.external_id) == id)
            .map(|entry| entry.slug.clone())
    }

    pub fn metadata_for(&self, slug: &ContentSlug) -> Option<MappingEntry> {
        self.read().iter().find(|entry| &entry.slug == slug).cloned()
    }

    /// Insert or overwrite the entry for `slug`. Omitted fields are emptied.
    pub fn upsert(&self, slug: ContentSlug, update: MappingUpdate) {
        let entry = MappingEntry {
            external_id: update.external_id.unwrap_or_default(),
            slug,
            canonical_title: update.canonical_title.unwrap_or_default(),
            local_title: update.local_title.unwrap_or_default(),
            alias_titles: update.alias_titles.unwrap_or_default(),
        };

        let mut entries = self.write();
        match entries.iter_mut().find(|e| e.slug == entry.slug) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    pub fn entries(&self) -> Vec<MappingEntry> {
        self.read().clone()
    }

    /// Merge `[[entries]]` from a TOML file through [`upsert`](Self::upsert).
    pub fn load_toml(&self, path: &Path) -> anyhow::Result<usize> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping file {}", path.display()))?;
        let file: MappingFile = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse mapping file {}", path.display()))?;

        let count = file.entries.len();
        for entry in file.entries {
            self.upsert(entry.slug, entry.update);
        }
        info!("Loaded {} mapping entries from {}", count, path.display());
        Ok(count)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<MappingEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<MappingEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches_entry(entry: &MappingEntry, query: &str) -> bool {
    let canonical = fold_vietnamese(&entry.canonical_title);

    if !canonical.is_empty() && canonical == query {
        return true;
    }
    if !entry.external_id.is_empty() && fold_vietnamese(&entry.external_id) == query {
        return true;
    }
    if std::iter::once(&entry.local_title)
        .chain(entry.alias_titles.iter())
        .map(|t| fold_vietnamese(t))
        .any(|t| !t.is_empty() && t == query)
    {
        return true;
    }
    // An empty canonical title would otherwise be contained in every query.
    !canonical.is_empty() && (query.contains(&canonical) || canonical.contains(query))
}

fn default_entries() -> Vec<MappingEntry> {
    let Some(slug) = ContentSlug::new("con-ra-the-thong-gi-nua") else {
        return Vec::new();
    };
    vec![MappingEntry {
        external_id: "tt35231547".to_string(),
        slug,
        canonical_title: "How Dare You".to_string(),
        local_title: "Còn Ra Thể Thống Gì Nữa".to_string(),
        alias_titles: vec![
            "Cheng He Ti Tong".to_string(),
            "In What Manner".to_string(),
            "This Is Ridiculous".to_string(),
            "What a Disgrace".to_string(),
        ],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(s: &str) -> ContentSlug {
        ContentSlug::new(s).unwrap()
    }

    #[test]
    fn resolves_by_every_rule() {
        let store = MappingStore::with_defaults();
        for query in [
            "How Dare You!?",
            "tt35231547",
            "Con Ra The Thong Gi Nua",
            "  HOW DARE YOU ",
            "what a disgrace",
            "dare",
        ] {
            let entry = store.resolve(query).unwrap_or_else(|| panic!("no match for {query}"));
            assert_eq!(entry.slug.as_str(), "con-ra-the-thong-gi-nua");
        }
    }

    #[test]
    fn resolves_decomposed_local_title() {
        let store = MappingStore::with_defaults();
        let query = "Co\u{300}n Ra The\u{302}\u{309} Tho\u{302}\u{301}ng Gi\u{300} Nu\u{31b}\u{303}a";
        let entry = store.resolve(query).unwrap();
        assert_eq!(entry.external_id, "tt35231547");
    }

    #[test]
    fn misses_are_none() {
        let store = MappingStore::with_defaults();
        assert!(store.resolve("nonexistent-title-xyz").is_none());
        assert!(store.resolve("   ").is_none());
        assert!(store.slug_for("tt0000000").is_none());
    }

    #[test]
    fn slug_for_uses_external_id_only() {
        let store = MappingStore::with_defaults();
        assert_eq!(store.slug_for("tt35231547"), Some(slug("con-ra-the-thong-gi-nua")));
        assert_eq!(store.slug_for("How Dare You"), None);
    }

    #[test]
    fn first_entry_in_table_order_wins() {
        let store = MappingStore::with_defaults();
        store.upsert(
            slug("how-dare-you-2"),
            MappingUpdate {
                canonical_title: Some("How Dare You 2".into()),
                ..Default::default()
            },
        );
        // Substring of both canonical titles: the earlier entry is returned.
        assert_eq!(store.resolve("how dare").unwrap().slug.as_str(), "con-ra-the-thong-gi-nua");
        assert_eq!(store.resolve("How Dare You 2").unwrap().slug.as_str(), "con-ra-the-thong-gi-nua");
    }

    #[test]
    fn upsert_overwrites_with_defaults() {
        let store = MappingStore::with_defaults();
        store.upsert(
            slug("con-ra-the-thong-gi-nua"),
            MappingUpdate {
                external_id: Some("tt1".into()),
                ..Default::default()
            },
        );
        let entry = store.metadata_for(&slug("con-ra-the-thong-gi-nua")).unwrap();
        assert_eq!(entry.external_id, "tt1");
        assert!(entry.canonical_title.is_empty());
        assert!(entry.alias_titles.is_empty());
        assert_eq!(store.entries().len(), 1);
        // A blank canonical title must not swallow every query.
        assert!(store.resolve("anything").is_none());
    }

    #[test]
    fn titles_are_deduplicated() {
        let entry = MappingStore::with_defaults().entries().remove(0);
        let titles = entry.titles();
        assert_eq!(titles[0], "How Dare You");
        assert_eq!(titles[1], "Còn Ra Thể Thống Gì Nữa");
        assert_eq!(titles.len(), 6);
    }
}
