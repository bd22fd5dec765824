//! Level catalog (`levels/index.json`)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// One catalog line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
    /// Level file, relative to the index
    pub file: String,
}

impl CatalogEntry {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Catalog {
    /// Directory the index was read from
    #[serde(skip)]
    pub root: PathBuf,
    #[serde(default)]
    pub levels: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn from_json(json: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut catalog: Catalog = serde_json::from_str(json).context("invalid level index")?;
        catalog.root = root.into();
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read level index {}", path.display()))?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&json, root)
    }

    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.levels.iter().find(|e| e.id == id)
    }

    pub fn level_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.root.join(&entry.file)
    }

    /// Levels grouped by chapter, in catalog order
    pub fn chapters(&self) -> Vec<(&str, Vec<&CatalogEntry>)> {
        let mut chapters: Vec<(&str, Vec<&CatalogEntry>)> = Vec::new();
        for entry in &self.levels {
            let chapter = entry.chapter.as_deref().unwrap_or("Other");
            match chapters.iter_mut().find(|(name, _)| *name == chapter) {
                Some((_, entries)) => entries.push(entry),
                None => chapters.push((chapter, vec![entry])),
            }
        }
        chapters
    }
}
