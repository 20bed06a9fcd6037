use regex::Regex;

use crate::config::{ClassificationConfig, FileHintConfig};
use crate::types::{EntityShape, Layer};

/// What the classifier knows about one entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityFacts<'a> {
    pub shape: EntityShape,
    pub name: &'a str,
    pub file_name: &'a str,
}

/// Condition tested by one row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    PureVirtualMethod,
    AllMethodsVirtual,
    InterfaceName,
    DeclarationsOnly,
    UtilityName,
    BaseTypeWithPrivateName,
    BaseTypeWithVirtualMethod,
    BaseType,
    NoMethods,
    PrivateName,
    OperatorOverload,
    TemplateMethod,
    Always,
}

/// One row of the ordered rule table: the first matching row decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerRule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub layer: Layer,
}

const fn rule(name: &'static str, predicate: Predicate, layer: Layer) -> LayerRule {
    LayerRule {
        name,
        predicate,
        layer,
    }
}

pub const LAYER_RULES: &[LayerRule] = &[
    rule("pure-virtual", Predicate::PureVirtualMethod, Layer::Interface),
    rule("all-virtual", Predicate::AllMethodsVirtual, Layer::Interface),
    rule("interface-name", Predicate::InterfaceName, Layer::Interface),
    rule("declarations-only", Predicate::DeclarationsOnly, Layer::Interface),
    rule("utility-name", Predicate::UtilityName, Layer::Utility),
    rule("base-private", Predicate::BaseTypeWithPrivateName, Layer::Derived),
    rule("base-virtual", Predicate::BaseTypeWithVirtualMethod, Layer::Core),
    rule("base", Predicate::BaseType, Layer::Derived),
    rule("data-only", Predicate::NoMethods, Layer::Derived),
    rule("private-name", Predicate::PrivateName, Layer::Derived),
    rule("operator-overload", Predicate::OperatorOverload, Layer::Core),
    rule("template-method", Predicate::TemplateMethod, Layer::Utility),
    rule("default", Predicate::Always, Layer::Core),
];

struct FileHint {
    pattern: Regex,
    unless: Option<Regex>,
    layer: Layer,
}

/// Assigns an architectural layer to entities by shape and name.
pub struct EntityClassifier {
    interface_names: Vec<Regex>,
    utility_names: Vec<Regex>,
    private_names: Vec<Regex>,
    file_hints: Vec<FileHint>,
}

fn build_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("ignoring invalid classification pattern {p:?}: {e}");
                None
            }
        })
        .collect()
}

fn build_file_hints(hints: &[FileHintConfig]) -> Vec<FileHint> {
    hints
        .iter()
        .filter_map(|h| {
            let pattern = build_patterns(std::slice::from_ref(&h.pattern)).pop()?;
            let unless = match &h.unless {
                Some(u) => Some(build_patterns(std::slice::from_ref(u)).pop()?),
                None => None,
            };
            Some(FileHint {
                pattern,
                unless,
                layer: h.layer,
            })
        })
        .collect()
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

impl EntityClassifier {
    pub fn new(config: &ClassificationConfig) -> Self {
        Self {
            interface_names: build_patterns(&config.interface_patterns),
            utility_names: build_patterns(&config.utility_patterns),
            private_names: build_patterns(&config.private_patterns),
            file_hints: build_file_hints(&config.file_hints),
        }
    }

    /// Classify an entity into an architectural layer.
    pub fn classify(&self, facts: &EntityFacts) -> Layer {
        self.matching_rule(facts).layer
    }

    /// The rule table row that decides this entity's layer.
    pub fn matching_rule(&self, facts: &EntityFacts) -> &'static LayerRule {
        LAYER_RULES
            .iter()
            .find(|r| self.holds(r.predicate, facts))
            .unwrap_or(&LAYER_RULES[LAYER_RULES.len() - 1])
    }

    fn holds(&self, predicate: Predicate, facts: &EntityFacts) -> bool {
        let shape = &facts.shape;
        match predicate {
            Predicate::PureVirtualMethod => shape.has_pure_virtual_method,
            Predicate::AllMethodsVirtual => shape.all_methods_virtual,
            Predicate::InterfaceName => any_match(&self.interface_names, facts.name),
            Predicate::DeclarationsOnly => {
                shape.method_count > 0 && shape.implemented_method_count == 0
            }
            Predicate::UtilityName => any_match(&self.utility_names, facts.name),
            Predicate::BaseTypeWithPrivateName => {
                shape.declares_base_type && self.is_private_name(facts.name)
            }
            Predicate::BaseTypeWithVirtualMethod => {
                shape.declares_base_type && shape.virtual_method_count > 0
            }
            Predicate::BaseType => shape.declares_base_type,
            Predicate::NoMethods => shape.method_count == 0,
            Predicate::PrivateName => self.is_private_name(facts.name),
            Predicate::OperatorOverload => shape.has_operator_overload,
            Predicate::TemplateMethod => shape.has_template_method,
            Predicate::Always => true,
        }
    }

    fn is_private_name(&self, name: &str) -> bool {
        any_match(&self.private_names, name)
    }

    /// Fallback for files without entity-level signal.
    pub fn classify_file_name(&self, file_name: &str) -> Option<Layer> {
        self.file_hints
            .iter()
            .find(|h| {
                h.pattern.is_match(file_name)
                    && !h.unless.as_ref().is_some_and(|u| u.is_match(file_name))
            })
            .map(|h| h.layer)
    }

    /// Layer hint for a whole file: the highest-priority entity layer, or
    /// the file-name fallback when the file has no entities.
    pub fn module_layer(&self, entity_layers: &[Layer], file_name: &str) -> Option<Layer> {
        match entity_layers.iter().min() {
            Some(layer) => Some(*layer),
            None => self.classify_file_name(file_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> EntityClassifier {
        EntityClassifier::new(&ClassificationConfig::default())
    }

    fn shape(methods: usize, implemented: usize, virtuals: usize, base: bool) -> EntityShape {
        EntityShape {
            has_pure_virtual_method: false,
            all_methods_virtual: methods > 0 && virtuals == methods,
            has_operator_overload: false,
            has_template_method: false,
            declares_base_type: base,
            method_count: methods,
            implemented_method_count: implemented,
            virtual_method_count: virtuals,
        }
    }

    fn classify(name: &str, shape: EntityShape) -> Layer {
        classifier().classify(&EntityFacts {
            shape,
            name,
            file_name: "Test.h",
        })
    }

    #[test]
    fn test_interface_name_with_declared_method() {
        assert_eq!(classify("IRenderer", shape(1, 0, 0, false)), Layer::Interface);
    }

    #[test]
    fn test_utility_name_beats_core_default() {
        assert_eq!(classify("GooList", shape(2, 2, 0, false)), Layer::Utility);
    }

    #[test]
    fn test_impl_with_base_is_derived() {
        assert_eq!(classify("PixelMapImpl", shape(0, 0, 0, true)), Layer::Derived);
        assert_eq!(classify("PixelMapImpl", shape(2, 2, 0, true)), Layer::Derived);
    }

    #[test]
    fn test_pure_virtual_is_interface() {
        let mut s = shape(3, 2, 1, true);
        s.has_pure_virtual_method = true;
        assert_eq!(classify("Stream", s), Layer::Interface);
    }

    #[test]
    fn test_all_virtual_is_interface() {
        assert_eq!(classify("Device", shape(2, 2, 2, false)), Layer::Interface);
    }

    #[test]
    fn test_interface_rule_precedes_utility_rule() {
        // "Factory" is both an interface suffix and a utility fragment
        assert_eq!(classify("FontFactory", shape(1, 1, 0, false)), Layer::Interface);
        assert_eq!(classify("FactoryRegistry", shape(1, 1, 0, false)), Layer::Utility);
    }

    #[test]
    fn test_base_type_branches() {
        assert_eq!(classify("Annot", shape(3, 3, 1, true)), Layer::Core);
        assert_eq!(classify("AnnotLink", shape(3, 3, 0, true)), Layer::Derived);
    }

    #[test]
    fn test_no_base_type_branches() {
        assert_eq!(classify("PDFRectangle", shape(0, 0, 0, false)), Layer::Derived);
        assert_eq!(classify("Stream_private", shape(2, 2, 0, false)), Layer::Derived);
        assert_eq!(classify("Catalog", shape(4, 4, 0, false)), Layer::Core);
    }

    #[test]
    fn test_operator_and_template_refine_default() {
        let mut s = shape(2, 2, 0, false);
        s.has_template_method = true;
        assert_eq!(classify("Matrix", s), Layer::Utility);
        s.has_operator_overload = true;
        assert_eq!(classify("Matrix", s), Layer::Core);
    }

    #[test]
    fn test_matching_rule_names_the_row() {
        let c = classifier();
        let facts = EntityFacts {
            shape: shape(1, 0, 0, false),
            name: "IRenderer",
            file_name: "IRenderer.h",
        };
        assert_eq!(c.matching_rule(&facts).name, "interface-name");
    }

    #[test]
    fn test_rule_table_ends_with_default() {
        let last = LAYER_RULES.last().unwrap();
        assert_eq!(last.predicate, Predicate::Always);
        assert_eq!(last.layer, Layer::Core);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let facts = EntityFacts {
            shape: shape(3, 2, 1, true),
            name: "SplashOutputDev",
            file_name: "SplashOutputDev.h",
        };
        let first = c.classify(&facts);
        for _ in 0..10 {
            assert_eq!(c.classify(&facts), first);
        }
    }

    #[test]
    fn test_file_name_fallback() {
        let c = classifier();
        assert_eq!(c.classify_file_name("GfxState_private.h"), Some(Layer::Derived));
        assert_eq!(c.classify_file_name("SplashImpl.cc"), Some(Layer::Derived));
        assert_eq!(c.classify_file_name("UTF.h"), Some(Layer::Utility));
        assert_eq!(c.classify_file_name("Object.h"), Some(Layer::Core));
        assert_eq!(c.classify_file_name("PSWriter.cc"), Some(Layer::Derived));
        assert_eq!(c.classify_file_name("ImgWriter.h"), None);
        assert_eq!(c.classify_file_name("JPEG2000Stream.cc"), Some(Layer::Derived));
        assert_eq!(c.classify_file_name("Page.cc"), None);
    }

    #[test]
    fn test_module_layer_prefers_entities() {
        let c = classifier();
        assert_eq!(
            c.module_layer(&[Layer::Utility, Layer::Derived], "Types.h"),
            Some(Layer::Derived)
        );
        assert_eq!(
            c.module_layer(&[Layer::Interface, Layer::Core], "x.h"),
            Some(Layer::Core)
        );
        assert_eq!(c.module_layer(&[], "Types.h"), Some(Layer::Utility));
        assert_eq!(c.module_layer(&[], "main.cc"), None);
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let config = ClassificationConfig {
            interface_patterns: vec!["(".to_string(), "Port$".to_string()],
            ..ClassificationConfig::default()
        };
        let c = EntityClassifier::new(&config);
        assert_eq!(
            c.classify(&EntityFacts {
                shape: shape(1, 1, 0, false),
                name: "StoragePort",
                file_name: "x.h",
            }),
            Layer::Interface
        );
    }
}
