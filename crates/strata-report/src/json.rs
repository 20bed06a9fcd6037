use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use strata_core::estimate::ProjectEstimate;
use strata_core::pipeline::CorpusModel;
use strata_core::registry::RelationshipGraph;
use strata_core::types::{Layer, ModuleRecord, ModuleStatus};

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_files: usize,
    pub analyzed_files: usize,
    pub skipped_files: usize,
    pub error_files: usize,
    pub entities: usize,
    pub entities_by_layer: BTreeMap<Layer, usize>,
    pub unresolved_references: usize,
    pub layer_conflicts: usize,
    pub total_time: String,
    pub work_weeks: u64,
}

impl Summary {
    pub fn from_model(model: &CorpusModel) -> Self {
        let error_files = model
            .modules
            .values()
            .filter(|m| matches!(m.status, ModuleStatus::Error(_)))
            .count();
        Self {
            total_files: model.modules.len(),
            analyzed_files: model.project.analyzed_files,
            skipped_files: model.project.skipped_files - error_files,
            error_files,
            entities: model.graph.len(),
            entities_by_layer: model.graph.layer_counts(),
            unresolved_references: model.graph.unresolved().len(),
            layer_conflicts: model.graph.layer_conflicts().len(),
            total_time: model.project.total_time.to_string(),
            work_weeks: model.project.work_weeks,
        }
    }
}

/// Everything the JSON report carries.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub version: &'static str,
    pub summary: Summary,
    pub project: &'a ProjectEstimate,
    pub modules: &'a BTreeMap<PathBuf, ModuleRecord>,
    pub graph: &'a RelationshipGraph,
    pub cycles: Vec<Vec<String>>,
}

impl<'a> JsonReport<'a> {
    pub fn new(model: &'a CorpusModel, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            version: env!("CARGO_PKG_VERSION"),
            summary: Summary::from_model(model),
            project: &model.project,
            modules: &model.modules,
            graph: &model.graph,
            cycles: model.graph.find_cycles(),
        }
    }
}

/// Format a full analysis report as JSON.
pub fn format_report(model: &CorpusModel, compact: bool) -> Result<String> {
    let report = JsonReport::new(model, Utc::now());
    let json = if compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    };
    json.context("failed to serialize report")
}
