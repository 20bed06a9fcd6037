use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tree_sitter::{
    Language, Node, ParseOptions, ParseState, Parser, Query, QueryCursor, StreamingIterator,
};

use strata_core::analyzer::{
    descendants_of_kind, line_range, node_text, ExtractionContext, ParsedFile, SourceAnalyzer,
};
use strata_core::deadline::Deadline;
use strata_core::metrics::NodeKinds;
use strata_core::types::*;

pub const CPP_NODE_KINDS: NodeKinds = NodeKinds {
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

/// Declarator kinds that name a member function.
const METHOD_NAME_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "destructor_name",
    "operator_name",
    "qualified_identifier",
    "template_function",
];

const BASE_TYPE_KINDS: &[&str] = &["type_identifier", "qualified_identifier", "template_type"];

/// Wrappers that keep a type identifier part of one qualified name.
const QUALIFIED_WRAPPERS: &[&str] = &[
    "qualified_identifier",
    "qualified_type_identifier",
    "template_type",
];

/// C++ analyzer using tree-sitter.
pub struct CppAnalyzer {
    language: Language,
    entity_query: Query,
    entity_idx: u32,
    name_idx: u32,
    body_idx: u32,
    include_query: Query,
    path_idx: u32,
    virtual_kw: Regex,
    override_kw: Regex,
    pure_suffix: Regex,
}

impl CppAnalyzer {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_cpp::LANGUAGE.into();

        let entity_query = Query::new(
            &language,
            r#"
            [
              (class_specifier
                name: (_) @name
                body: (field_declaration_list) @body)
              (struct_specifier
                name: (_) @name
                body: (field_declaration_list) @body)
            ] @entity
            "#,
        )
        .context("failed to compile entity query")?;

        let include_query = Query::new(
            &language,
            r#"
            (preproc_include
              path: [(string_literal) (system_lib_string)] @path)
            "#,
        )
        .context("failed to compile include query")?;

        let capture = |query: &Query, name: &str| {
            query
                .capture_index_for_name(name)
                .with_context(|| format!("query has no @{name} capture"))
        };

        Ok(Self {
            entity_idx: capture(&entity_query, "entity")?,
            name_idx: capture(&entity_query, "name")?,
            body_idx: capture(&entity_query, "body")?,
            path_idx: capture(&include_query, "path")?,
            language,
            entity_query,
            include_query,
            virtual_kw: Regex::new(r"\bvirtual\b").context("virtual regex")?,
            override_kw: Regex::new(r"\b(override|final)\b").context("override regex")?,
            pure_suffix: Regex::new(r"=\s*0\s*;?$").context("pure virtual regex")?,
        })
    }

    fn build_entity(
        &self,
        entity: Node,
        name: Node,
        body: Node,
        parsed: &ParsedFile,
        ctx: &ExtractionContext,
        definitions: &[OutOfLine],
    ) -> Option<EntityDescriptor> {
        let src = parsed.content.as_str();
        let name = bare_type_name(&type_name_text(name, src));
        if name.is_empty() {
            return None;
        }

        let mut methods = Vec::new();
        let mut bodies = Vec::new();
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            self.collect_member(member, member, src, false, &mut methods, &mut bodies);
        }

        // Out-of-line definitions in the same file implement declared methods.
        for def in definitions.iter().filter(|d| d.scope == name) {
            if let Some(method) = methods
                .iter_mut()
                .find(|m| !m.is_implemented && m.name == def.name)
            {
                let (line_start, line_end) = line_range(def.node);
                method.is_implemented = true;
                method.line_start = line_start;
                method.line_end = line_end;
                if let Some(b) = def.node.child_by_field_name("body") {
                    bodies.push(b);
                }
            }
        }
        methods.sort();

        let mut uses = BTreeSet::new();
        for b in &bodies {
            collect_uses(*b, src, ctx, &name, &methods, &mut uses);
        }

        let (line_start, line_end) = line_range(entity);
        Some(EntityDescriptor {
            inherits_from: base_types(entity, src, &name),
            name,
            line_start,
            line_end,
            methods,
            uses,
        })
    }

    fn collect_member<'t>(
        &self,
        member: Node<'t>,
        span: Node<'t>,
        src: &str,
        templated: bool,
        methods: &mut Vec<MethodInfo>,
        bodies: &mut Vec<Node<'t>>,
    ) {
        match member.kind() {
            "template_declaration" => {
                let mut cursor = member.walk();
                for inner in member.named_children(&mut cursor) {
                    if inner.kind() != "template_parameter_list" {
                        self.collect_member(inner, member, src, true, methods, bodies);
                    }
                }
            }
            "function_definition" | "field_declaration" | "declaration" => {
                if let Some(method) = self.method_info(member, span, src, templated) {
                    if method.is_implemented {
                        if let Some(b) = member.child_by_field_name("body") {
                            bodies.push(b);
                        }
                    }
                    methods.push(method);
                }
            }
            _ => {}
        }
    }

    fn method_info(&self, member: Node, span: Node, src: &str, templated: bool) -> Option<MethodInfo> {
        let declarator = member.child_by_field_name("declarator")?;
        let (name, named) = method_name(declarator, src)?;

        let prefix = &src[member.start_byte()..named.start_byte()];
        let is_virtual =
            self.virtual_kw.is_match(prefix) || self.override_kw.is_match(&node_text(named, src));
        let text = node_text(member, src);
        let is_pure_virtual = is_virtual && self.pure_suffix.is_match(text.trim_end());
        let is_implemented = member.kind() == "function_definition"
            && member.child_by_field_name("body").is_some();

        let (line_start, line_end) = line_range(span);
        Some(MethodInfo {
            line_start,
            line_end,
            name,
            is_virtual,
            is_pure_virtual,
            is_implemented,
            is_template: templated,
        })
    }
}

impl SourceAnalyzer for CppAnalyzer {
    fn language(&self) -> &'static str {
        "cpp"
    }

    fn file_extensions(&self) -> &[&str] {
        &["h", "hpp", "hh", "hxx", "cpp", "cc", "cxx"]
    }

    fn node_kinds(&self) -> &NodeKinds {
        &CPP_NODE_KINDS
    }

    fn parse_file(&self, path: &Path, content: &str, deadline: &Deadline) -> Result<ParsedFile> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .context("failed to set C++ language")?;

        let bytes = content.as_bytes();
        let mut progress = |_: &ParseState| {
            if deadline.is_expired() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let tree = parser
            .parse_with_options(
                &mut |offset, _| bytes.get(offset..).unwrap_or_default(),
                None,
                Some(ParseOptions::new().progress_callback(&mut progress)),
            )
            .with_context(|| {
                if deadline.is_expired() {
                    "parse cancelled after the time budget ran out"
                } else {
                    "failed to parse C++ file"
                }
            })?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
        })
    }

    fn extract_entities(&self, parsed: &ParsedFile, ctx: &ExtractionContext) -> Vec<EntityDescriptor> {
        let root = parsed.tree.root_node();
        let definitions = out_of_line_definitions(root, &parsed.content);

        let mut entities = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.entity_query, root, parsed.content.as_bytes());
        while let Some(m) = matches.next() {
            if ctx.deadline.is_expired() {
                break;
            }
            let mut entity = None;
            let mut name = None;
            let mut body = None;
            for capture in m.captures {
                match capture.index {
                    i if i == self.entity_idx => entity = Some(capture.node),
                    i if i == self.name_idx => name = Some(capture.node),
                    i if i == self.body_idx => body = Some(capture.node),
                    _ => {}
                }
            }
            if let (Some(entity), Some(name), Some(body)) = (entity, name, body) {
                if let Some(descriptor) =
                    self.build_entity(entity, name, body, parsed, ctx, &definitions)
                {
                    entities.push(descriptor);
                }
            }
        }
        entities
    }

    fn extract_includes(&self, parsed: &ParsedFile) -> Vec<String> {
        let mut includes = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(
            &self.include_query,
            parsed.tree.root_node(),
            parsed.content.as_bytes(),
        );
        while let Some(m) = matches.next() {
            for capture in m.captures {
                if capture.index == self.path_idx {
                    let raw = node_text(capture.node, &parsed.content);
                    let target = raw.trim_matches(|c| matches!(c, '<' | '>' | '"'));
                    includes.push(target.to_string());
                }
            }
        }
        includes
    }

    fn extract_methods(&self, parsed: &ParsedFile) -> MethodAnalysis {
        let root = parsed.tree.root_node();
        let src = parsed.content.as_str();

        let local_functions = descendants_of_kind(root, &["function_definition"])
            .into_iter()
            .filter_map(|def| {
                let declarator = def.child_by_field_name("declarator")?;
                let name = method_name(declarator, src)
                    .map(|(name, _)| name)
                    .unwrap_or_else(|| node_text(declarator, src));
                let (line_start, line_end) = line_range(def);
                Some(FunctionSpan {
                    name,
                    line_start,
                    line_end,
                })
            })
            .collect();

        let mut callbacks = Vec::new();
        for call in descendants_of_kind(root, &["call_expression"]) {
            let (Some(function), Some(args)) = (
                call.child_by_field_name("function"),
                call.child_by_field_name("arguments"),
            ) else {
                continue;
            };
            let parent_function = node_text(function, src);
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                if let Some(kind) = callback_kind(arg, src) {
                    let (line_start, line_end) = line_range(arg);
                    callbacks.push(CallbackSite {
                        parent_function: parent_function.clone(),
                        kind,
                        line_start,
                        line_end,
                    });
                }
            }
        }

        MethodAnalysis {
            local_functions,
            callbacks,
        }
    }
}

/// A `Type::method` definition outside its class body.
struct OutOfLine<'t> {
    scope: String,
    name: String,
    node: Node<'t>,
}

fn out_of_line_definitions<'t>(root: Node<'t>, src: &str) -> Vec<OutOfLine<'t>> {
    descendants_of_kind(root, &["function_definition"])
        .into_iter()
        .filter(|def| def.child_by_field_name("body").is_some())
        .filter_map(|def| {
            let (_, named) = method_name(def.child_by_field_name("declarator")?, src)?;
            let mut qualified = named.child_by_field_name("declarator")?;
            if qualified.kind() != "qualified_identifier" {
                return None;
            }
            // ns::Outer::method nests; the innermost scope owns the method
            while let Some(inner) = qualified
                .child_by_field_name("name")
                .filter(|n| n.kind() == "qualified_identifier")
            {
                qualified = inner;
            }
            let scope = qualified.child_by_field_name("scope")?;
            let name = qualified.child_by_field_name("name")?;
            Some(OutOfLine {
                scope: bare_type_name(&type_name_text(scope, src)),
                name: node_text(name, src),
                node: def,
            })
        })
        .collect()
}

/// Name of the function a declarator declares, plus the node that carries it.
fn method_name<'t>(declarator: Node<'t>, src: &str) -> Option<(String, Node<'t>)> {
    let mut current = declarator;
    loop {
        match current.kind() {
            "function_declarator" => {
                let inner = current.child_by_field_name("declarator")?;
                if !METHOD_NAME_KINDS.contains(&inner.kind()) {
                    return None;
                }
                return Some((node_text(inner, src), current));
            }
            "operator_cast" => {
                let text = node_text(current, src);
                let name = text.split('(').next().unwrap_or("").trim().to_string();
                return Some((name, current));
            }
            "pointer_declarator" | "reference_declarator" => {
                let last = current.named_child_count().checked_sub(1)?;
                current = current.named_child(u32::try_from(last).ok()?)?;
            }
            _ => return None,
        }
    }
}

fn type_name_text(node: Node, src: &str) -> String {
    match node.kind() {
        "template_type" => node
            .child_by_field_name("name")
            .map(|n| node_text(n, src))
            .unwrap_or_else(|| node_text(node, src)),
        _ => node_text(node, src),
    }
}

/// `ns::Outer<T>::Inner<U>` -> `Inner`
fn bare_type_name(text: &str) -> String {
    let mut depth = 0usize;
    let mut plain = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => plain.push(c),
            _ => {}
        }
    }
    plain
        .rsplit("::")
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

fn base_types(entity: Node, src: &str, own: &str) -> BTreeSet<String> {
    let mut bases = BTreeSet::new();
    let mut cursor = entity.walk();
    for clause in entity
        .children(&mut cursor)
        .filter(|c| c.kind() == "base_class_clause")
    {
        let mut inner = clause.walk();
        for base in clause
            .named_children(&mut inner)
            .filter(|b| BASE_TYPE_KINDS.contains(&b.kind()))
        {
            let name = bare_type_name(&type_name_text(base, src));
            if !name.is_empty() && name != own {
                bases.insert(name);
            }
        }
    }
    bases
}

fn qualified_top(node: Node) -> Node {
    let mut top = node;
    while let Some(parent) = top.parent() {
        if !QUALIFIED_WRAPPERS.contains(&parent.kind()) {
            break;
        }
        top = parent;
    }
    top
}

fn collect_uses(
    body: Node,
    src: &str,
    ctx: &ExtractionContext,
    own: &str,
    methods: &[MethodInfo],
    uses: &mut BTreeSet<String>,
) {
    for ty in descendants_of_kind(body, &["type_identifier"]) {
        if ctx.is_std_qualified(&node_text(qualified_top(ty), src)) {
            continue;
        }
        let name = node_text(ty, src);
        if name != own {
            uses.insert(name);
        }
    }

    for call in descendants_of_kind(body, &["call_expression"]) {
        let Some(function) = call.child_by_field_name("function") else {
            continue;
        };
        let target = match function.kind() {
            "identifier" => node_text(function, src),
            "qualified_identifier" => {
                let text = node_text(function, src);
                if ctx.is_std_qualified(&text) {
                    continue;
                }
                let scope = text.trim_start_matches("::").split("::").next().unwrap_or("");
                bare_type_name(scope)
            }
            "template_function" => match function.child_by_field_name("name") {
                Some(name) => node_text(name, src),
                None => continue,
            },
            _ => continue,
        };
        // calls to the entity's own members are not dependencies
        if target.is_empty() || target == own || methods.iter().any(|m| m.name == target) {
            continue;
        }
        uses.insert(target);
    }
}

fn callback_kind(arg: Node, src: &str) -> Option<CallbackKind> {
    match arg.kind() {
        "lambda_expression" => Some(CallbackKind::Lambda),
        "pointer_expression" => {
            let operator = arg.child_by_field_name("operator")?;
            let target = arg.child_by_field_name("argument")?;
            (node_text(operator, src) == "&"
                && matches!(target.kind(), "identifier" | "qualified_identifier"))
            .then_some(CallbackKind::FunctionPointer)
        }
        _ => None,
    }
}
