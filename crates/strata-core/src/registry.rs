use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::types::{EntityDescriptor, EntityRecord, Layer, MethodInfo};

#[derive(Debug, Default)]
struct Entry {
    methods: BTreeSet<MethodInfo>,
    inherits_from: BTreeSet<String>,
    uses: BTreeSet<String>,
    /// Layer assigned at each occurrence.
    layers: BTreeMap<PathBuf, Layer>,
}

/// Pass 1: mutable corpus-wide registry of entities keyed by bare name.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: BTreeMap<String, Entry>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one entity found in `file`. Registering the same pair again
    /// changes nothing.
    pub fn register(&mut self, file: &Path, entity: &EntityDescriptor, layer: Layer) {
        let entry = self.entries.entry(entity.name.clone()).or_default();

        entry.methods.extend(entity.methods.iter().cloned());
        entry.inherits_from.extend(
            entity
                .inherits_from
                .iter()
                .filter(|n| **n != entity.name)
                .cloned(),
        );
        entry.uses.extend(
            entity
                .uses
                .iter()
                .filter(|n| **n != entity.name)
                .cloned(),
        );

        // Two same-named types in one file keep the higher-priority layer.
        entry
            .layers
            .entry(file.to_path_buf())
            .and_modify(|l| *l = (*l).min(layer))
            .or_insert(layer);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Pass 2: derive back-references and freeze the registry.
    pub fn finish(self) -> RelationshipGraph {
        let mut used_by: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut unresolved: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (name, entry) in &self.entries {
            for target in entry.uses.iter().chain(entry.inherits_from.iter()) {
                if self.entries.contains_key(target) {
                    used_by
                        .entry(target.clone())
                        .or_default()
                        .insert(name.clone());
                } else {
                    unresolved
                        .entry(target.clone())
                        .or_default()
                        .insert(name.clone());
                }
            }
        }

        let mut layer_conflicts = BTreeMap::new();
        let mut entities = BTreeMap::new();
        for (name, entry) in self.entries {
            let distinct: BTreeSet<Layer> = entry.layers.values().copied().collect();
            if distinct.len() > 1 {
                layer_conflicts.insert(name.clone(), entry.layers.clone());
            }
            // Occurrence with the smallest path decides.
            let layer = entry
                .layers
                .values()
                .next()
                .copied()
                .unwrap_or(Layer::Core);
            let record = EntityRecord {
                name: name.clone(),
                layer,
                methods: entry.methods.into_iter().collect(),
                inherits_from: entry.inherits_from,
                uses: entry.uses,
                used_by: used_by.remove(&name).unwrap_or_default(),
                occurrences: entry.layers.into_keys().collect(),
            };
            entities.insert(name, record);
        }

        tracing::debug!(
            entities = entities.len(),
            unresolved = unresolved.len(),
            conflicts = layer_conflicts.len(),
            "relationship graph built"
        );

        RelationshipGraph {
            entities,
            unresolved,
            layer_conflicts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Inherits,
    Uses,
}

/// A directed edge from an entity to a name it depends on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationEdge {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    /// False when `to` is not a registered entity.
    pub resolved: bool,
}

/// Immutable result of both registry passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    entities: BTreeMap<String, EntityRecord>,
    /// Unregistered name -> entities referring to it.
    unresolved: BTreeMap<String, BTreeSet<String>>,
    /// Names whose occurrences were classified differently.
    layer_conflicts: BTreeMap<String, BTreeMap<PathBuf, Layer>>,
}

impl RelationshipGraph {
    pub fn get(&self, name: &str) -> Option<&EntityRecord> {
        self.entities.get(name)
    }

    /// All entities in name order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn unresolved(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.unresolved
    }

    pub fn layer_conflicts(&self) -> &BTreeMap<String, BTreeMap<PathBuf, Layer>> {
        &self.layer_conflicts
    }

    /// Entities with an occurrence in `file`.
    pub fn entities_in<'a>(&'a self, file: &'a Path) -> impl Iterator<Item = &'a EntityRecord> {
        self.entities
            .values()
            .filter(move |e| e.occurrences.contains(file))
    }

    pub fn layer_counts(&self) -> BTreeMap<Layer, usize> {
        let mut counts = BTreeMap::new();
        for entity in self.entities.values() {
            *counts.entry(entity.layer).or_insert(0) += 1;
        }
        counts
    }

    /// Every inheritance and usage edge, sorted.
    pub fn edges(&self) -> Vec<RelationEdge> {
        let mut edges = Vec::new();
        for entity in self.entities.values() {
            let kinds = entity
                .inherits_from
                .iter()
                .map(|t| (t, RelationKind::Inherits))
                .chain(entity.uses.iter().map(|t| (t, RelationKind::Uses)));
            for (target, kind) in kinds {
                edges.push(RelationEdge {
                    from: entity.name.clone(),
                    to: target.clone(),
                    kind,
                    resolved: self.entities.contains_key(target),
                });
            }
        }
        edges.sort();
        edges
    }

    /// Project resolved edges into a petgraph graph.
    pub fn dependency_graph(&self) -> DiGraph<String, RelationKind> {
        let mut graph = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for name in self.entities.keys() {
            index.insert(name.as_str(), graph.add_node(name.clone()));
        }
        for edge in self.edges().into_iter().filter(|e| e.resolved) {
            if let (Some(&from), Some(&to)) =
                (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            {
                graph.add_edge(from, to, edge.kind);
            }
        }
        graph
    }

    /// Groups of entities that depend on each other in a cycle.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let graph = self.dependency_graph();
        let mut cycles: Vec<Vec<String>> = petgraph::algo::kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut names: Vec<String> = scc.iter().map(|&idx| graph[idx].clone()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }
}
