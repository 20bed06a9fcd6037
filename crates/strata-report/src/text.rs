use colored::Colorize;

use strata_core::pipeline::CorpusModel;
use strata_core::types::{Layer, ModuleStatus};

/// Format a full triage report for terminal output.
pub fn format_report(model: &CorpusModel) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        "Strata - Legacy Codebase Triage".bold()
    ));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    let project = &model.project;
    out.push_str(&format!(
        "{}: {} files ({} analyzed, {} skipped), {} lines, {} entities\n",
        "Summary".bold(),
        model.modules.len(),
        project.analyzed_files,
        project.skipped_files,
        project.total_loc,
        model.graph.len(),
    ));

    out.push_str(&format_layer_section(model));
    out.push_str(&format_ranking_section(model));
    out.push_str(&format_skipped_section(model));
    out.push_str(&format_findings_section(model));

    out.push_str(&format!(
        "\n{}: {} ({} work week{} at 40h)\n\n",
        "Estimated rewrite effort".bold(),
        project.total_time.to_string().cyan().bold(),
        project.work_weeks,
        if project.work_weeks == 1 { "" } else { "s" },
    ));
    out
}

fn colored_layer(layer: Option<Layer>) -> String {
    match layer {
        Some(Layer::Core) => "core".red().to_string(),
        Some(Layer::Interface) => "interface".blue().to_string(),
        Some(Layer::Derived) => "derived".green().to_string(),
        Some(Layer::Utility) => "utility".yellow().to_string(),
        None => "unknown".dimmed().to_string(),
    }
}

fn format_layer_section(model: &CorpusModel) -> String {
    let mut out = format!("\n{}\n{}\n", "Entities by layer".bold(), "-".repeat(40));
    let counts = model.graph.layer_counts();
    for layer in Layer::ALL {
        let count = counts.get(&layer).copied().unwrap_or(0);
        out.push_str(&format!(
            "  {:<20} {count}\n",
            format!("{}:", colored_layer(Some(layer)))
        ));
    }
    out
}

fn format_ranking_section(model: &CorpusModel) -> String {
    let mut out = format!(
        "\n{}\n{}\n",
        "Files by complexity".bold(),
        "-".repeat(40)
    );
    if model.project.ranking.is_empty() {
        out.push_str("  (no analyzed files)\n");
        return out;
    }
    for ranked in &model.project.ranking {
        let Some(module) = model.modules.get(&ranked.path) else {
            continue;
        };
        let m = &module.metrics;
        out.push_str(&format!(
            "  {:>8.1}  {:>8}  {}  [{}]\n",
            ranked.complexity_score,
            ranked.estimated_time.to_string(),
            ranked.path.display(),
            colored_layer(module.layer),
        ));
        out.push_str(&format!(
            "            loc={} functions={} classes={} templates={} conditionals={} loops={} includes={}\n",
            m.loc, m.functions, m.classes, m.templates, m.conditionals, m.loops, m.includes
        ));
    }
    out
}

fn format_skipped_section(model: &CorpusModel) -> String {
    let rejected: Vec<_> = model.rejected().collect();
    if rejected.is_empty() {
        return String::new();
    }
    let mut out = format!(
        "\n{} ({})\n{}\n",
        "Skipped files".yellow().bold(),
        rejected.len(),
        "-".repeat(40)
    );
    for module in rejected {
        let (tag, reason) = match &module.status {
            ModuleStatus::Skipped(reason) => ("SKIP".yellow().bold().to_string(), reason.as_str()),
            ModuleStatus::Error(reason) => ("ERROR".red().bold().to_string(), reason.as_str()),
            ModuleStatus::Ok => continue,
        };
        out.push_str(&format!("  {tag} {}: {reason}\n", module.path.display()));
    }
    out
}

fn format_findings_section(model: &CorpusModel) -> String {
    let graph = &model.graph;
    let conflicts = graph.layer_conflicts();
    let cycles = graph.find_cycles();
    let unresolved = graph.unresolved().len();
    if conflicts.is_empty() && cycles.is_empty() && unresolved == 0 {
        return String::new();
    }

    let mut out = format!("\n{}\n{}\n", "Findings".bold(), "-".repeat(40));
    for (name, layers) in conflicts {
        let detail: Vec<String> = layers
            .iter()
            .map(|(path, layer)| format!("{}={layer}", path.display()))
            .collect();
        out.push_str(&format!(
            "  {} {name}: {}\n",
            "CONFLICT".magenta().bold(),
            detail.join(", ")
        ));
    }
    for cycle in &cycles {
        out.push_str(&format!(
            "  {} {}\n",
            "CYCLE".red().bold(),
            cycle.join(" <-> ")
        ));
    }
    if unresolved > 0 {
        out.push_str(&format!(
            "  {unresolved} referenced name(s) have no definition in the corpus\n"
        ));
    }
    out
}
