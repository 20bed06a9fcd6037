use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use strata_core::pipeline::CorpusModel;
use strata_core::registry::{RelationKind, RelationshipGraph};
use strata_core::types::Layer;

const LAYER_STYLES: [(Layer, &str, &str); 4] = [
    (Layer::Core, "Core", "#ffebee"),
    (Layer::Interface, "Interface", "#e3f2fd"),
    (Layer::Derived, "Derived", "#e8f5e9"),
    (Layer::Utility, "Utility", "#fff8e1"),
];

fn push_cluster(out: &mut String, id: &str, label: &str, color: &str, nodes: &[(String, String)]) {
    out.push_str(&format!("  subgraph cluster_{id} {{\n"));
    out.push_str(&format!("    label=\"{label}\";\n"));
    out.push_str("    style=filled;\n");
    out.push_str(&format!("    color=\"{color}\";\n"));
    out.push_str("    node [fillcolor=white];\n");
    for (node_id, node_label) in nodes {
        out.push_str(&format!("    {node_id} [label=\"{}\"];\n", escape(node_label)));
    }
    out.push_str("  }\n\n");
}

/// Entity relationship graph with entities grouped by layer. Names that are
/// referenced but never defined are drawn as dashed "unknown" nodes.
pub fn entity_graph(graph: &RelationshipGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph entities {\n");
    out.push_str("  rankdir=BT;\n");
    out.push_str("  node [shape=box, style=filled];\n\n");

    let mut by_layer: BTreeMap<Layer, Vec<(String, String)>> = BTreeMap::new();
    for entity in graph.entities() {
        by_layer
            .entry(entity.layer)
            .or_default()
            .push((sanitize_dot_id(&entity.name), entity.name.clone()));
    }
    for (layer, label, color) in &LAYER_STYLES {
        if let Some(nodes) = by_layer.get(layer) {
            push_cluster(&mut out, &layer.to_string(), label, color, nodes);
        }
    }

    if !graph.unresolved().is_empty() {
        out.push_str("  subgraph cluster_unknown {\n");
        out.push_str("    label=\"Unknown\";\n");
        out.push_str("    style=dashed;\n");
        out.push_str("    node [style=dashed, fillcolor=white];\n");
        for name in graph.unresolved().keys() {
            out.push_str(&format!(
                "    {} [label=\"{}\"];\n",
                sanitize_dot_id(name),
                escape(name)
            ));
        }
        out.push_str("  }\n\n");
    }

    for edge in graph.edges() {
        let from = sanitize_dot_id(&edge.from);
        let to = sanitize_dot_id(&edge.to);
        let mut attrs = Vec::new();
        if edge.kind == RelationKind::Inherits {
            attrs.push("arrowhead=empty");
        }
        if !edge.resolved {
            attrs.push("style=dashed");
            attrs.push("color=gray");
        }
        if attrs.is_empty() {
            out.push_str(&format!("  {from} -> {to};\n"));
        } else {
            out.push_str(&format!("  {from} -> {to} [{}];\n", attrs.join(", ")));
        }
    }

    out.push_str("}\n");
    out
}

/// File include graph with files grouped by module layer.
pub fn include_graph(model: &CorpusModel) -> String {
    let mut out = String::new();
    out.push_str("digraph includes {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=filled];\n\n");

    let mut by_layer: BTreeMap<Option<Layer>, Vec<(String, String)>> = BTreeMap::new();
    for (path, module) in &model.modules {
        let label = path.display().to_string();
        let entry = (sanitize_dot_id(&label), label);
        if module.status.is_ok() {
            by_layer.entry(module.layer).or_default().push(entry);
        } else {
            by_layer.entry(None).or_default().push(entry);
        }
    }
    for (layer, label, color) in &LAYER_STYLES {
        if let Some(nodes) = by_layer.get(&Some(*layer)) {
            push_cluster(&mut out, &layer.to_string(), label, color, nodes);
        }
    }
    if let Some(nodes) = by_layer.get(&None) {
        out.push_str("  subgraph cluster_unclassified {\n");
        out.push_str("    label=\"Unclassified\";\n");
        out.push_str("    style=dashed;\n");
        out.push_str("    node [fillcolor=white];\n");
        for (id, label) in nodes {
            out.push_str(&format!("    {id} [label=\"{}\"];\n", escape(label)));
        }
        out.push_str("  }\n\n");
    }

    let paths: Vec<&PathBuf> = model.modules.keys().collect();
    for (path, module) in &model.modules {
        let from = sanitize_dot_id(&path.display().to_string());
        for include in &module.includes {
            if let Some(target) = resolve_include(&paths, path, include) {
                let to = sanitize_dot_id(&target.display().to_string());
                out.push_str(&format!("  {from} -> {to};\n"));
            }
        }
    }

    out.push_str("}\n");
    out
}

/// Corpus file an include refers to: relative to the including file first,
/// then any file whose path ends with the include.
fn resolve_include<'a>(paths: &[&'a PathBuf], from: &Path, include: &str) -> Option<&'a PathBuf> {
    let sibling = from.parent().map(|dir| dir.join(include));
    if let Some(sibling) = &sibling {
        if let Some(found) = paths.iter().find(|p| **p == sibling) {
            return Some(*found);
        }
    }
    paths
        .iter()
        .find(|p| p.ends_with(include) && p.as_path() != from)
        .copied()
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn sanitize_dot_id(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // DOT IDs must start with a letter or underscore
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}
