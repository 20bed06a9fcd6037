use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::Layer;

/// Top-level configuration from `.strata.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Overrides the analyzer's own extension list when non-empty.
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            exclude_patterns: vec![
                "**/build/**".to_string(),
                "**/third_party/**".to_string(),
                "**/.git/**".to_string(),
            ],
        }
    }
}

/// A file-name pattern used when a file yields no entity-level signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHintConfig {
    pub pattern: String,
    pub layer: Layer,
    #[serde(default)]
    pub unless: Option<String>,
}

/// Name conventions driving layer classification (regular expressions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_interface_patterns")]
    pub interface_patterns: Vec<String>,
    #[serde(default = "default_utility_patterns")]
    pub utility_patterns: Vec<String>,
    #[serde(default = "default_private_patterns")]
    pub private_patterns: Vec<String>,
    #[serde(default = "default_file_hints")]
    pub file_hints: Vec<FileHintConfig>,
}

fn default_interface_patterns() -> Vec<String> {
    [
        "^I[A-Z]",
        "Interface$",
        "^Abstract",
        "OutputDev$",
        "ImgWriter$",
        "Factory$",
        "Builder$",
        "Source$",
        "FontSrc$",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_utility_patterns() -> Vec<String> {
    [
        "^Goo",
        "^UTF",
        "Utils",
        "Helper",
        "Factory",
        "Unicode",
        "Types$",
        "Constants$",
        "Math$",
        "Config$",
        "Creator$",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_private_patterns() -> Vec<String> {
    vec!["Impl$".to_string(), "_private".to_string()]
}

fn hint(pattern: &str, layer: Layer, unless: Option<&str>) -> FileHintConfig {
    FileHintConfig {
        pattern: pattern.to_string(),
        layer,
        unless: unless.map(str::to_string),
    }
}

fn default_file_hints() -> Vec<FileHintConfig> {
    vec![
        hint("_private", Layer::Derived, None),
        hint(r"Impl\.[A-Za-z]+$", Layer::Derived, None),
        hint("UTF|Math|Types", Layer::Utility, None),
        hint(r"Object\.h$", Layer::Core, None),
        hint("Writer", Layer::Derived, Some("ImgWriter")),
        hint("JPEG|PNG|JBIG2", Layer::Derived, None),
    ]
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            interface_patterns: default_interface_patterns(),
            utility_patterns: default_utility_patterns(),
            private_patterns: default_private_patterns(),
            file_hints: default_file_hints(),
        }
    }
}

/// Thresholds for the pre-extraction admission filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default = "default_generated_markers")]
    pub generated_markers: Vec<String>,
    #[serde(default = "default_max_pragmas")]
    pub max_pragmas: usize,
    #[serde(default = "default_max_types_with_pragmas")]
    pub max_types_with_pragmas: usize,
    #[serde(default = "default_max_types")]
    pub max_types: usize,
    #[serde(default = "default_max_deleted")]
    pub max_deleted: usize,
    #[serde(default = "default_max_hex_entries")]
    pub max_hex_entries: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_generated_markers() -> Vec<String> {
    vec![
        "/* This file is generated".to_string(),
        "/* This is an automatically generated table".to_string(),
        "// Generated by".to_string(),
        "regenerated".to_string(),
    ]
}

fn default_max_pragmas() -> usize {
    2
}
fn default_max_types_with_pragmas() -> usize {
    5
}
fn default_max_types() -> usize {
    10
}
fn default_max_deleted() -> usize {
    5
}
fn default_max_hex_entries() -> usize {
    10
}
fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            generated_markers: default_generated_markers(),
            max_pragmas: default_max_pragmas(),
            max_types_with_pragmas: default_max_types_with_pragmas(),
            max_types: default_max_types(),
            max_deleted: default_max_deleted(),
            max_hex_entries: default_max_hex_entries(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

/// Name-resolution and resource settings for per-file extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Qualifiers whose calls and types never count as uses.
    #[serde(default = "default_std_namespaces")]
    pub std_namespaces: Vec<String>,
    /// Soft per-file budget; 0 disables it.
    #[serde(default = "default_file_timeout_ms")]
    pub file_timeout_ms: u64,
}

fn default_std_namespaces() -> Vec<String> {
    vec!["std::".to_string()]
}

fn default_file_timeout_ms() -> u64 {
    5_000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            std_namespaces: default_std_namespaces(),
            file_timeout_ms: default_file_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.strata.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `strata init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `.strata.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut current = start.as_path();
        loop {
            let config_path = current.join(".strata.toml");
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(
                            "failed to load config from '{}': {e:#}. Using defaults.",
                            config_path.display()
                        );
                        Self::default()
                    }
                };
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::default()
    }

    /// Generate default TOML content for `strata init`.
    pub fn default_toml() -> String {
        r#"# Strata - legacy codebase triage configuration

[project]
# Leave empty to use the analyzer's extensions (.h, .hpp, .cpp, ...)
extensions = []
exclude_patterns = ["**/build/**", "**/third_party/**", "**/.git/**"]

[classification]
# Regular expressions matched against entity names, in rule order.
interface_patterns = ["^I[A-Z]", "Interface$", "^Abstract", "OutputDev$", "ImgWriter$", "Factory$", "Builder$", "Source$", "FontSrc$"]
utility_patterns = ["^Goo", "^UTF", "Utils", "Helper", "Factory", "Unicode", "Types$", "Constants$", "Math$", "Config$", "Creator$"]
private_patterns = ["Impl$", "_private"]

# Used only for files without any classified entity. First match wins.
[[classification.file_hints]]
pattern = "_private"
layer = "derived"

[[classification.file_hints]]
pattern = "Impl\\.[A-Za-z]+$"
layer = "derived"

[[classification.file_hints]]
pattern = "UTF|Math|Types"
layer = "utility"

[[classification.file_hints]]
pattern = "Object\\.h$"
layer = "core"

[[classification.file_hints]]
pattern = "Writer"
layer = "derived"
unless = "ImgWriter"

[[classification.file_hints]]
pattern = "JPEG|PNG|JBIG2"
layer = "derived"

[admission]
generated_markers = ["/* This file is generated", "/* This is an automatically generated table", "// Generated by", "regenerated"]
max_pragmas = 2
max_types_with_pragmas = 5
max_types = 10
max_deleted = 5
max_hex_entries = 10
max_file_bytes = 2097152

[extraction]
std_namespaces = ["std::"]
# Soft per-file budget in milliseconds (0 disables it)
file_timeout_ms = 5000
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.project.extensions.is_empty());
        assert!(config
            .classification
            .interface_patterns
            .contains(&"^I[A-Z]".to_string()));
        assert_eq!(config.admission.max_types, 10);
        assert_eq!(config.extraction.std_namespaces, vec!["std::"]);
    }

    #[test]
    fn test_deserialize_config() {
        let toml_str = r#"
[project]
extensions = ["h", "cc"]

[classification]
interface_patterns = ["Port$"]

[admission]
max_types = 20

[extraction]
std_namespaces = ["std::", "boost::"]
file_timeout_ms = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.extensions, vec!["h", "cc"]);
        assert_eq!(config.classification.interface_patterns, vec!["Port$"]);
        // Untouched lists keep their defaults
        assert!(!config.classification.utility_patterns.is_empty());
        assert_eq!(config.admission.max_types, 20);
        assert_eq!(config.admission.max_deleted, 5);
        assert_eq!(config.extraction.file_timeout_ms, 0);
    }

    #[test]
    fn test_default_toml_is_valid() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        let defaults = ClassificationConfig::default();
        assert_eq!(config.classification.file_hints, defaults.file_hints);
        assert_eq!(
            config.classification.utility_patterns,
            defaults.utility_patterns
        );
        assert_eq!(config.admission.max_file_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_file_hint_unless_parses() {
        let toml_str = r#"
[[classification.file_hints]]
pattern = "Writer"
layer = "derived"
unless = "ImgWriter"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.classification.file_hints.len(), 1);
        assert_eq!(config.classification.file_hints[0].layer, Layer::Derived);
        assert_eq!(
            config.classification.file_hints[0].unless.as_deref(),
            Some("ImgWriter")
        );
    }

    #[test]
    fn test_load_or_default_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(".strata.toml"),
            "[admission]\nmax_types = 3\n",
        )
        .unwrap();
        let nested = tmp.path().join("src/render");
        std::fs::create_dir_all(&nested).unwrap();

        let config = Config::load_or_default(&nested);
        assert_eq!(config.admission.max_types, 3);
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".strata.toml");
        std::fs::write(&path, "[admission\nmax_types = ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("strata init"));
    }
}
