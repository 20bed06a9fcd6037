use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metrics::{BlockKind, BlockSpan, TemplateShape};
use crate::types::{EstimatedTime, Layer, Metrics, ModuleRecord, TimeBreakdown};

const REVIEW_SECONDS_PER_LINE: f64 = 5.0;
const ENTITY_SECONDS_PER_LINE: f64 = 15.0;
const TESTING_FACTOR: f64 = 0.5;
const DOCUMENTATION_FACTOR: f64 = 0.3;
const HOURS_PER_WORK_WEEK: u64 = 40;

/// One classified entity as the estimator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCost {
    pub layer: Layer,
    /// Summed line spans of implemented methods.
    pub loc: usize,
}

impl EntityCost {
    pub fn hours(&self) -> f64 {
        self.layer.base_hours() + self.loc as f64 * ENTITY_SECONDS_PER_LINE / 3600.0
    }
}

fn tiered(lines: usize, small: u64, medium: u64, large: u64) -> u64 {
    if lines <= 5 {
        small
    } else if lines <= 15 {
        medium
    } else {
        large
    }
}

pub fn block_minutes(block: &BlockSpan) -> u64 {
    match block.kind {
        BlockKind::Conditional => tiered(block.lines, 5, 10, 15),
        BlockKind::Loop => tiered(block.lines, 7, 12, 20),
    }
}

pub fn control_flow_minutes(blocks: &[BlockSpan]) -> u64 {
    blocks.iter().map(block_minutes).sum()
}

pub fn template_minutes(template: &TemplateShape) -> u64 {
    let extra_parameters = template.parameters.saturating_sub(1) as u64;
    let mut minutes = 1 + 15 * extra_parameters + 30 * template.specializations as u64;
    if template.constrained {
        minutes += 45;
    }
    minutes
}

/// Additive time components for one file, in hours.
pub fn estimate_file(
    loc: usize,
    blocks: &[BlockSpan],
    templates: &[TemplateShape],
    entities: &[EntityCost],
) -> TimeBreakdown {
    let entity_hours: f64 = entities.iter().map(EntityCost::hours).sum();
    let weighted_hours: f64 = entities
        .iter()
        .filter(|e| matches!(e.layer, Layer::Core | Layer::Utility))
        .map(EntityCost::hours)
        .sum();

    TimeBreakdown {
        review: loc as f64 * REVIEW_SECONDS_PER_LINE / 3600.0,
        entities: entity_hours,
        control_flow: control_flow_minutes(blocks) as f64 / 60.0,
        templates: templates.iter().map(template_minutes).sum::<u64>() as f64 / 60.0,
        testing: weighted_hours * TESTING_FACTOR,
        documentation: weighted_hours * DOCUMENTATION_FACTOR,
    }
}

/// Relative ranking score; not a unit of anything.
pub fn complexity_score(metrics: &Metrics, layers: &[Layer]) -> f64 {
    let entity_weight: f64 = layers.iter().map(Layer::score_weight).sum();
    2.0 * metrics.functions as f64
        + entity_weight
        + 4.0 * metrics.templates as f64
        + metrics.conditionals as f64
        + 1.5 * metrics.loops as f64
        + 0.5 * metrics.includes as f64
}

/// Fill in the derived score and estimate of a file's metrics.
pub fn apply(
    metrics: &mut Metrics,
    blocks: &[BlockSpan],
    templates: &[TemplateShape],
    entities: &[EntityCost],
) -> TimeBreakdown {
    let breakdown = estimate_file(metrics.loc, blocks, templates, entities);
    let layers: Vec<Layer> = entities.iter().map(|e| e.layer).collect();
    metrics.complexity_score = complexity_score(metrics, &layers);
    metrics.estimated_time = EstimatedTime::from_hours(breakdown.total());
    breakdown
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFile {
    pub path: PathBuf,
    pub complexity_score: f64,
    pub estimated_time: EstimatedTime,
}

/// Corpus-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectEstimate {
    pub total_time: EstimatedTime,
    pub work_weeks: u64,
    pub total_loc: usize,
    pub analyzed_files: usize,
    pub skipped_files: usize,
    /// Highest score first.
    pub ranking: Vec<RankedFile>,
}

impl ProjectEstimate {
    pub fn from_modules(modules: &BTreeMap<PathBuf, ModuleRecord>) -> Self {
        let mut total_minutes = 0u64;
        let mut total_loc = 0usize;
        let mut analyzed_files = 0usize;
        let mut ranking = Vec::new();

        for module in modules.values() {
            if !module.status.is_ok() {
                continue;
            }
            analyzed_files += 1;
            total_minutes += module.metrics.estimated_time.total_minutes();
            total_loc += module.metrics.loc;
            ranking.push(RankedFile {
                path: module.path.clone(),
                complexity_score: module.metrics.complexity_score,
                estimated_time: module.metrics.estimated_time,
            });
        }

        ranking.sort_by(|a, b| {
            b.complexity_score
                .total_cmp(&a.complexity_score)
                .then_with(|| a.path.cmp(&b.path))
        });

        let total_time = EstimatedTime::from_minutes(total_minutes);
        Self {
            total_time,
            work_weeks: total_minutes.div_ceil(HOURS_PER_WORK_WEEK * 60),
            total_loc,
            analyzed_files,
            skipped_files: modules.len() - analyzed_files,
            ranking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleStatus;

    fn conditional(lines: usize) -> BlockSpan {
        BlockSpan {
            kind: BlockKind::Conditional,
            lines,
        }
    }

    fn looped(lines: usize) -> BlockSpan {
        BlockSpan {
            kind: BlockKind::Loop,
            lines,
        }
    }

    #[test]
    fn test_control_flow_example() {
        let blocks = [conditional(4), conditional(4), looped(20)];
        assert_eq!(control_flow_minutes(&blocks), 30);
        let breakdown = estimate_file(120, &blocks, &[], &[]);
        assert!((breakdown.control_flow - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_block_tiers() {
        assert_eq!(block_minutes(&conditional(5)), 5);
        assert_eq!(block_minutes(&conditional(6)), 10);
        assert_eq!(block_minutes(&conditional(15)), 10);
        assert_eq!(block_minutes(&conditional(16)), 15);
        assert_eq!(block_minutes(&looped(1)), 7);
        assert_eq!(block_minutes(&looped(15)), 12);
        assert_eq!(block_minutes(&looped(40)), 20);
    }

    #[test]
    fn test_template_minutes() {
        let simple = TemplateShape {
            parameters: 1,
            specializations: 0,
            constrained: false,
        };
        assert_eq!(template_minutes(&simple), 1);

        let heavy = TemplateShape {
            parameters: 3,
            specializations: 1,
            constrained: true,
        };
        assert_eq!(template_minutes(&heavy), 1 + 30 + 30 + 45);

        let explicit = TemplateShape {
            parameters: 0,
            specializations: 1,
            constrained: false,
        };
        assert_eq!(template_minutes(&explicit), 31);
    }

    #[test]
    fn test_entity_and_overhead_hours() {
        let entities = [
            EntityCost {
                layer: Layer::Core,
                loc: 240,
            },
            EntityCost {
                layer: Layer::Derived,
                loc: 0,
            },
        ];
        let b = estimate_file(0, &[], &[], &entities);
        // core: 1.5h + 240 * 15s = 2.5h; derived: 0.25h
        assert!((b.entities - 2.75).abs() < 1e-9);
        assert!((b.testing - 1.25).abs() < 1e-9);
        assert!((b.documentation - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_review_cost() {
        let b = estimate_file(720, &[], &[], &[]);
        assert!((b.review - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_complexity_score_formula() {
        let metrics = Metrics {
            functions: 3,
            templates: 1,
            conditionals: 2,
            loops: 2,
            includes: 4,
            ..Metrics::default()
        };
        let layers = [Layer::Core, Layer::Utility, Layer::Interface, Layer::Derived];
        // 6 + (4+3+2+1) + 4 + 2 + 3 + 2
        assert!((complexity_score(&metrics, &layers) - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_fills_metrics() {
        let mut metrics = Metrics {
            loc: 120,
            conditionals: 2,
            loops: 1,
            ..Metrics::default()
        };
        let blocks = [conditional(4), conditional(4), looped(20)];
        let breakdown = apply(&mut metrics, &blocks, &[], &[]);
        // 0.5h control flow + 120 * 5s review
        assert!((breakdown.total() - (0.5 + 1.0 / 6.0)).abs() < 1e-9);
        assert_eq!(metrics.estimated_time, EstimatedTime { hours: 0, minutes: 40 });
        assert!((metrics.complexity_score - 3.5).abs() < 1e-9);
    }

    fn module(path: &str, score: f64, minutes: u64, status: ModuleStatus) -> ModuleRecord {
        let mut record = ModuleRecord::placeholder(PathBuf::from(path), status);
        record.metrics.complexity_score = score;
        record.metrics.estimated_time = EstimatedTime::from_minutes(minutes);
        record.metrics.loc = 10;
        record
    }

    #[test]
    fn test_project_estimate() {
        let mut modules = BTreeMap::new();
        for m in [
            module("a.cc", 2.0, 40 * 60, ModuleStatus::Ok),
            module("b.cc", 9.0, 90, ModuleStatus::Ok),
            module("gen.cc", 0.0, 0, ModuleStatus::Skipped("generated".into())),
        ] {
            modules.insert(m.path.clone(), m);
        }
        let project = ProjectEstimate::from_modules(&modules);
        assert_eq!(project.total_time, EstimatedTime { hours: 41, minutes: 30 });
        assert_eq!(project.work_weeks, 2);
        assert_eq!(project.analyzed_files, 2);
        assert_eq!(project.skipped_files, 1);
        assert_eq!(project.total_loc, 20);
        assert_eq!(project.ranking[0].path, PathBuf::from("b.cc"));
    }
}
