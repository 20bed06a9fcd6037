use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::admission::AdmissionFilter;
use crate::analyzer::{extract_file, ExtractionContext, FileExtraction, SourceAnalyzer};
use crate::cache::ExtractionCache;
use crate::classifier::{EntityClassifier, EntityFacts};
use crate::config::Config;
use crate::deadline::Deadline;
use crate::error::ExtractError;
use crate::estimate::{self, EntityCost, ProjectEstimate};
use crate::registry::{EntityRegistry, RelationshipGraph};
use crate::types::{EntityDescriptor, Layer, ModuleRecord, ModuleStatus};

/// Architectural model of a whole corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusModel {
    /// Keyed by path relative to the project root.
    pub modules: BTreeMap<PathBuf, ModuleRecord>,
    pub graph: RelationshipGraph,
    pub project: ProjectEstimate,
}

impl CorpusModel {
    pub fn module(&self, path: &Path) -> Option<&ModuleRecord> {
        self.modules.get(path)
    }

    /// Modules that did not make it through extraction.
    pub fn rejected(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values().filter(|m| !m.status.is_ok())
    }
}

/// Result of one file's worker, ready for the serialized merge.
struct FileResult {
    record: ModuleRecord,
    entities: Vec<(EntityDescriptor, Layer)>,
    /// Content and fresh extraction, kept only for the cache.
    cache_entry: Option<(String, FileExtraction)>,
}

/// Discovers, extracts and merges a corpus.
pub struct AnalysisPipeline {
    analyzer: Box<dyn SourceAnalyzer>,
    config: Config,
    classifier: EntityClassifier,
    admission: AdmissionFilter,
}

impl AnalysisPipeline {
    pub fn new(analyzer: Box<dyn SourceAnalyzer>, config: Config) -> Result<Self> {
        let classifier = EntityClassifier::new(&config.classification);
        let admission = AdmissionFilter::new(&config.admission)?;
        Ok(Self {
            analyzer,
            config,
            classifier,
            admission,
        })
    }

    /// Analyze every matching file under `project_path`.
    pub fn analyze(&self, project_path: &Path) -> Result<CorpusModel> {
        self.analyze_inner(project_path, false)
    }

    /// Like `analyze`, reusing cached extractions for unchanged files.
    pub fn analyze_incremental(&self, project_path: &Path) -> Result<CorpusModel> {
        self.analyze_inner(project_path, true)
    }

    /// Analyze in-memory sources keyed by path.
    pub fn analyze_sources(&self, sources: Vec<(PathBuf, String)>) -> CorpusModel {
        let results: Vec<FileResult> = sources
            .par_iter()
            .map(|(path, content)| self.process(path, Ok(content.as_bytes().to_vec()), None, false))
            .collect();
        merge(results)
    }

    /// Source files under `project_path`, relative to it and sorted.
    pub fn discover(&self, project_path: &Path) -> Result<Vec<PathBuf>> {
        let excludes = build_globset(&self.config.project.exclude_patterns)?;
        let extensions: Vec<String> = if self.config.project.extensions.is_empty() {
            self.analyzer
                .file_extensions()
                .iter()
                .map(|e| e.to_string())
                .collect()
        } else {
            self.config.project.extensions.clone()
        };

        let mut files: Vec<PathBuf> = WalkDir::new(project_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| extensions.iter().any(|x| ext == x.as_str()))
            })
            .filter_map(|e| {
                let rel = e.path().strip_prefix(project_path).ok()?.to_path_buf();
                (!excludes.is_match(&rel)).then_some(rel)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn analyze_inner(&self, project_path: &Path, incremental: bool) -> Result<CorpusModel> {
        if !project_path.is_dir() {
            anyhow::bail!("'{}' is not a directory", project_path.display());
        }
        let files = self
            .discover(project_path)
            .with_context(|| format!("failed to scan '{}'", project_path.display()))?;
        tracing::info!(
            files = files.len(),
            language = self.analyzer.language(),
            "discovered source files"
        );

        let mut cache = if incremental {
            ExtractionCache::load(project_path).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable cache: {e:#}");
                ExtractionCache::new()
            })
        } else {
            ExtractionCache::new()
        };

        let results: Vec<FileResult> = {
            let cache = incremental.then_some(&cache);
            files
                .par_iter()
                .map(|rel| {
                    let bytes = std::fs::read(project_path.join(rel));
                    self.process(rel, bytes.map_err(|e| e.to_string()), cache, incremental)
                })
                .collect()
        };

        if incremental {
            let mut current = Vec::new();
            for result in &results {
                let key = result.record.path.to_string_lossy().to_string();
                if let Some((content, extraction)) = &result.cache_entry {
                    cache.insert(key.clone(), content, extraction.clone());
                }
                if result.record.status.is_ok() {
                    current.push(key);
                }
            }
            cache.prune(&current);
            if let Err(e) = cache.save(project_path) {
                tracing::warn!("failed to save extraction cache: {e:#}");
            }
        }

        Ok(merge(results))
    }

    /// Admission, parse and extraction of one file. Never fails; problems
    /// become the record's status.
    fn process(
        &self,
        rel: &Path,
        bytes: std::result::Result<Vec<u8>, String>,
        cache: Option<&ExtractionCache>,
        keep_for_cache: bool,
    ) -> FileResult {
        match self.extract(rel, bytes, cache) {
            Ok((content, extraction, fresh)) => {
                let (record, entities) = self.build_record(rel, &extraction);
                let cache_entry = (keep_for_cache && fresh).then(|| (content, extraction));
                FileResult {
                    record,
                    entities,
                    cache_entry,
                }
            }
            Err(e) => {
                match &e {
                    ExtractError::Read(_) | ExtractError::Parse(_) => {
                        tracing::warn!("{}: {e}", rel.display())
                    }
                    _ => tracing::debug!("skipping {}: {e}", rel.display()),
                }
                FileResult {
                    record: ModuleRecord::placeholder(rel.to_path_buf(), e.into_status()),
                    entities: Vec::new(),
                    cache_entry: None,
                }
            }
        }
    }

    /// Returns the decoded content, the extraction and whether it was freshly computed.
    fn extract(
        &self,
        rel: &Path,
        bytes: std::result::Result<Vec<u8>, String>,
        cache: Option<&ExtractionCache>,
    ) -> std::result::Result<(String, FileExtraction, bool), ExtractError> {
        let deadline = Deadline::start(self.config.extraction.file_timeout_ms);
        let bytes = bytes.map_err(ExtractError::Read)?;
        self.admission.check_bytes(&bytes)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        self.admission.check(&content)?;

        if let Some(cached) = cache.and_then(|c| c.get(&rel.to_string_lossy(), &content)) {
            return Ok((content, cached.clone(), false));
        }

        deadline.check()?;
        // A parse cancelled by the deadline surfaces as an error; report it as a timeout.
        let parsed = self
            .analyzer
            .parse_file(rel, &content, &deadline)
            .map_err(|e| match deadline.check() {
                Err(timeout) => timeout,
                Ok(()) => ExtractError::Parse(format!("{e:#}")),
            })?;
        deadline.check()?;

        let ctx = ExtractionContext {
            std_namespaces: &self.config.extraction.std_namespaces,
            deadline,
        };
        let extraction = extract_file(self.analyzer.as_ref(), &parsed, &ctx)?;
        drop(parsed);

        Ok((content, extraction, true))
    }

    /// Classify a file's entities and fill in its score and estimate.
    fn build_record(
        &self,
        rel: &Path,
        extraction: &FileExtraction,
    ) -> (ModuleRecord, Vec<(EntityDescriptor, Layer)>) {
        let file_name = rel
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let entities: Vec<(EntityDescriptor, Layer)> = extraction
            .entities
            .iter()
            .map(|e| {
                let layer = self.classifier.classify(&EntityFacts {
                    shape: e.shape(),
                    name: &e.name,
                    file_name: &file_name,
                });
                (e.clone(), layer)
            })
            .collect();

        let costs: Vec<EntityCost> = entities
            .iter()
            .map(|(e, layer)| EntityCost {
                layer: *layer,
                loc: e.implemented_loc(),
            })
            .collect();
        let mut metrics = extraction.metrics.clone();
        let breakdown = estimate::apply(
            &mut metrics,
            &extraction.blocks,
            &extraction.templates,
            &costs,
        );

        let layers: Vec<Layer> = entities.iter().map(|(_, l)| *l).collect();
        let mut names: Vec<String> = entities.iter().map(|(e, _)| e.name.clone()).collect();
        names.sort();
        names.dedup();

        let record = ModuleRecord {
            path: rel.to_path_buf(),
            status: ModuleStatus::Ok,
            metrics,
            breakdown,
            includes: extraction.includes.clone(),
            entities: names,
            layer: self.classifier.module_layer(&layers, &file_name),
            methods: extraction.methods.clone(),
        };
        (record, entities)
    }
}

/// Serialized merge: pass 1 in path order, then pass 2.
fn merge(mut results: Vec<FileResult>) -> CorpusModel {
    results.sort_by(|a, b| a.record.path.cmp(&b.record.path));

    let mut registry = EntityRegistry::new();
    let mut modules = BTreeMap::new();
    for result in results {
        for (entity, layer) in &result.entities {
            registry.register(&result.record.path, entity, *layer);
        }
        modules.insert(result.record.path.clone(), result.record);
    }

    let graph = registry.finish();
    let project = ProjectEstimate::from_modules(&modules);
    tracing::info!(
        modules = modules.len(),
        skipped = project.skipped_files,
        entities = graph.len(),
        "corpus merged"
    );
    CorpusModel {
        modules,
        graph,
        project,
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!("ignoring invalid exclude pattern {pattern:?}: {e}"),
        }
    }
    builder.build().context("failed to build exclude globset")
}
