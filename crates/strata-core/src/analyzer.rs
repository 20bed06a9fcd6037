use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Tree};

use crate::deadline::Deadline;
use crate::error::ExtractError;
use crate::metrics::{BlockSpan, NodeKinds, TemplateShape};
use crate::types::{EntityDescriptor, MethodAnalysis, Metrics};

/// A parsed source file with its tree-sitter AST and original content.
/// Lives only for the duration of one file's extraction.
pub struct ParsedFile {
    pub path: PathBuf,
    pub tree: Tree,
    pub content: String,
}

/// Settings an analyzer needs while resolving names.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub std_namespaces: &'a [String],
    /// Long-running extractors stop early once this expires.
    pub deadline: Deadline,
}

impl ExtractionContext<'_> {
    /// True when a qualified name belongs to an excluded namespace.
    pub fn is_std_qualified(&self, qualified: &str) -> bool {
        let trimmed = qualified.trim_start_matches("::");
        self.std_namespaces
            .iter()
            .any(|ns| trimmed.starts_with(ns.as_str()))
    }
}

/// Trait that each language analyzer must implement.
pub trait SourceAnalyzer: Send + Sync {
    /// Language name (e.g., "cpp")
    fn language(&self) -> &'static str;

    /// File extensions this analyzer handles (e.g., &["h", "cpp"])
    fn file_extensions(&self) -> &[&str];

    /// Grammar node kinds used by the metrics counter.
    fn node_kinds(&self) -> &NodeKinds;

    /// Parse a source file into a ParsedFile. Parsing is abandoned with an
    /// error once `deadline` expires.
    fn parse_file(&self, path: &Path, content: &str, deadline: &Deadline) -> Result<ParsedFile>;

    /// Extract structural units that have a realized body.
    fn extract_entities(&self, parsed: &ParsedFile, ctx: &ExtractionContext) -> Vec<EntityDescriptor>;

    /// Extract include/reference targets.
    fn extract_includes(&self, parsed: &ParsedFile) -> Vec<String>;

    /// Extract local function definitions and callback sites.
    fn extract_methods(&self, parsed: &ParsedFile) -> MethodAnalysis;
}

/// Tree-free result of extracting one file. Safe to cache and to send
/// between threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileExtraction {
    pub metrics: Metrics,
    pub blocks: Vec<BlockSpan>,
    pub templates: Vec<TemplateShape>,
    pub includes: Vec<String>,
    pub entities: Vec<EntityDescriptor>,
    pub methods: MethodAnalysis,
}

/// Run the metrics counter and the analyzer's extractors over a parsed file,
/// checking the deadline after each stage.
pub fn extract_file(
    analyzer: &dyn SourceAnalyzer,
    parsed: &ParsedFile,
    ctx: &ExtractionContext,
) -> Result<FileExtraction, ExtractError> {
    let sample = crate::metrics::count_structure(
        parsed.tree.root_node(),
        &parsed.content,
        analyzer.node_kinds(),
    );
    ctx.deadline.check()?;
    let includes = analyzer.extract_includes(parsed);
    let entities = analyzer.extract_entities(parsed, ctx);
    ctx.deadline.check()?;
    let methods = analyzer.extract_methods(parsed);
    ctx.deadline.check()?;
    Ok(FileExtraction {
        metrics: sample.metrics,
        blocks: sample.blocks,
        templates: sample.templates,
        includes,
        entities,
        methods,
    })
}

/// All nodes strictly below `node` whose kind is in `kinds`, in document order.
pub fn descendants_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut cursor = node.walk();
    if !cursor.goto_first_child() {
        return found;
    }
    loop {
        let current = cursor.node();
        if kinds.contains(&current.kind()) {
            found.push(current);
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() || cursor.node() == node {
                return found;
            }
        }
    }
}

/// 1-based (start, end) lines of a node.
pub fn line_range(node: Node) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

/// Extract text from a tree-sitter node.
pub fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}
