use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::analyzer::FileExtraction;

/// Cached extraction of one file, valid while its hash matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExtraction {
    pub hash: String,
    pub extraction: FileExtraction,
}

/// Extraction cache stored in `.strata/cache.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionCache {
    pub files: BTreeMap<String, CachedExtraction>,
}

const CACHE_DIR: &str = ".strata";
const CACHE_FILE: &str = "cache.json";

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache relative to the project root. A missing file is an empty cache.
    pub fn load(project_root: &Path) -> Result<Self> {
        let cache_path = project_root.join(CACHE_DIR).join(CACHE_FILE);
        if !cache_path.exists() {
            return Ok(Self::new());
        }
        let content =
            std::fs::read_to_string(&cache_path).context("failed to read extraction cache")?;
        let cache: Self =
            serde_json::from_str(&content).context("failed to parse extraction cache")?;
        Ok(cache)
    }

    pub fn save(&self, project_root: &Path) -> Result<()> {
        let cache_dir = project_root.join(CACHE_DIR);
        std::fs::create_dir_all(&cache_dir).context("failed to create .strata directory")?;
        let content =
            serde_json::to_string(self).context("failed to serialize extraction cache")?;
        std::fs::write(cache_dir.join(CACHE_FILE), content)
            .context("failed to write extraction cache")?;
        Ok(())
    }

    /// Cached extraction for a file if its content is unchanged.
    pub fn get(&self, rel_path: &str, content: &str) -> Option<&FileExtraction> {
        let cached = self.files.get(rel_path)?;
        (cached.hash == compute_hash(content)).then_some(&cached.extraction)
    }

    pub fn insert(&mut self, rel_path: String, content: &str, extraction: FileExtraction) {
        self.files.insert(
            rel_path,
            CachedExtraction {
                hash: compute_hash(content),
                extraction,
            },
        );
    }

    /// Drop entries for files that are gone or no longer extracted.
    pub fn prune(&mut self, current_files: &[String]) {
        let keep: HashSet<&str> = current_files.iter().map(String::as_str).collect();
        self.files.retain(|path, _| keep.contains(path.as_str()));
    }
}

/// SHA-256 of file content as lowercase hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
