use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::analyzer::{descendants_of_kind, line_range};
use crate::types::Metrics;

/// Grammar node kinds the counter looks for. Supplied by each analyzer.
#[derive(Debug, Clone)]
pub struct NodeKinds {
    pub functions: &'static [&'static str],
    /// Counted only when the node has a `body` field.
    pub types: &'static [&'static str],
    pub templates: &'static [&'static str],
    pub conditionals: &'static [&'static str],
    pub loops: &'static [&'static str],
    pub includes: &'static [&'static str],
    pub constraints: &'static [&'static str],
    /// Field holding a template's parameter list.
    pub template_parameters_field: &'static str,
    /// Kind of a declared name that carries template arguments (a specialization).
    pub specialized_name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Conditional,
    Loop,
}

/// One conditional or loop and how many lines it spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpan {
    pub kind: BlockKind,
    pub lines: usize,
}

/// Shape of one template declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateShape {
    pub parameters: usize,
    pub specializations: usize,
    pub constrained: bool,
}

/// Raw counts plus the spans the estimator needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureSample {
    pub metrics: Metrics,
    pub blocks: Vec<BlockSpan>,
    pub templates: Vec<TemplateShape>,
}

/// Count structural node kinds in one file.
pub fn count_structure(root: Node, source: &str, kinds: &NodeKinds) -> StructureSample {
    let mut metrics = Metrics {
        loc: source.split('\n').count(),
        ..Metrics::default()
    };

    metrics.functions = descendants_of_kind(root, kinds.functions).len();
    metrics.classes = descendants_of_kind(root, kinds.types)
        .into_iter()
        .filter(|n| n.child_by_field_name("body").is_some())
        .count();
    metrics.includes = descendants_of_kind(root, kinds.includes).len();

    let mut blocks = Vec::new();
    for node in descendants_of_kind(root, kinds.conditionals) {
        blocks.push(BlockSpan {
            kind: BlockKind::Conditional,
            lines: span(node),
        });
    }
    for node in descendants_of_kind(root, kinds.loops) {
        blocks.push(BlockSpan {
            kind: BlockKind::Loop,
            lines: span(node),
        });
    }
    metrics.conditionals = blocks
        .iter()
        .filter(|b| b.kind == BlockKind::Conditional)
        .count();
    metrics.loops = blocks.len() - metrics.conditionals;

    let templates: Vec<TemplateShape> = descendants_of_kind(root, kinds.templates)
        .into_iter()
        .map(|node| template_shape(node, kinds))
        .collect();
    metrics.templates = templates.len();

    StructureSample {
        metrics,
        blocks,
        templates,
    }
}

fn span(node: Node) -> usize {
    let (start, end) = line_range(node);
    end - start + 1
}

fn template_shape(node: Node, kinds: &NodeKinds) -> TemplateShape {
    let parameters = node
        .child_by_field_name(kinds.template_parameters_field)
        .map(|list| list.named_child_count())
        .unwrap_or(0);

    // `template<>` is an explicit specialization; a declared name with
    // template arguments is a partial one.
    let mut cursor = node.walk();
    let specialized_name = node.named_children(&mut cursor).any(|child| {
        child
            .child_by_field_name("name")
            .is_some_and(|name| name.kind() == kinds.specialized_name)
    });
    let specializations = usize::from(parameters == 0 || specialized_name);

    TemplateShape {
        parameters,
        specializations,
        constrained: !descendants_of_kind(node, kinds.constraints).is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    const CPP_KINDS: NodeKinds = NodeKinds {
        functions: &["function_definition"],
        types: &["class_specifier", "struct_specifier"],
        templates: &["template_declaration"],
        conditionals: &["if_statement"],
        loops: &[
            "for_statement",
            "for_range_loop",
            "while_statement",
            "do_statement",
        ],
        includes: &["preproc_include"],
        constraints: &["requires_clause"],
        template_parameters_field: "parameters",
        specialized_name: "template_type",
    };

    fn sample(src: &str) -> StructureSample {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(src, None).unwrap();
        count_structure(tree.root_node(), src, &CPP_KINDS)
    }

    #[test]
    fn test_counts_basic_constructs() {
        let src = r#"#include <vector>
#include "Page.h"

class Page;

class Catalog {
public:
    int count() const { return n; }
private:
    int n;
};

void walk(int n) {
    for (int i = 0; i < n; i++) {
        if (i % 2) { continue; }
    }
    while (n > 0) { n--; }
}
"#;
        let s = sample(src);
        assert_eq!(s.metrics.includes, 2);
        // forward declaration has no body
        assert_eq!(s.metrics.classes, 1);
        assert_eq!(s.metrics.functions, 2);
        assert_eq!(s.metrics.conditionals, 1);
        assert_eq!(s.metrics.loops, 2);
        assert_eq!(s.metrics.loc, src.split('\n').count());
    }

    #[test]
    fn test_block_spans() {
        let src = "void f(int a) {\n  if (a) {\n    a++;\n    a++;\n  }\n}\n";
        let s = sample(src);
        assert_eq!(
            s.blocks,
            vec![BlockSpan {
                kind: BlockKind::Conditional,
                lines: 4
            }]
        );
    }

    #[test]
    fn test_template_shapes() {
        let src = r#"
template <typename K, typename V, typename H>
class Table { };

template <>
class Table<int, int, int> { };

template <typename T>
T twice(T v) { return v + v; }
"#;
        let s = sample(src);
        assert_eq!(s.metrics.templates, 3);
        assert_eq!(s.templates[0].parameters, 3);
        assert_eq!(s.templates[0].specializations, 0);
        assert_eq!(s.templates[1].parameters, 0);
        assert_eq!(s.templates[1].specializations, 1);
        assert_eq!(s.templates[2].parameters, 1);
        assert!(!s.templates[2].constrained);
    }
}
