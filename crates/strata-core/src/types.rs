use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Architectural role assigned to an entity.
/// Declaration order is the module-level priority: a file holding any Core
/// entity is a Core module, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Core,
    Interface,
    Derived,
    Utility,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Core, Layer::Interface, Layer::Derived, Layer::Utility];

    /// Base rewrite cost in hours for one entity of this layer.
    pub fn base_hours(&self) -> f64 {
        match self {
            Layer::Core => 1.5,
            Layer::Utility => 1.0,
            Layer::Interface => 0.5,
            Layer::Derived => 0.25,
        }
    }

    /// Weight of one entity of this layer in the complexity score.
    pub fn score_weight(&self) -> f64 {
        match self {
            Layer::Core => 4.0,
            Layer::Utility => 3.0,
            Layer::Interface => 2.0,
            Layer::Derived => 1.0,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Core => write!(f, "core"),
            Layer::Interface => write!(f, "interface"),
            Layer::Derived => write!(f, "derived"),
            Layer::Utility => write!(f, "utility"),
        }
    }
}

impl std::str::FromStr for Layer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "core" => Ok(Layer::Core),
            "interface" => Ok(Layer::Interface),
            "derived" => Ok(Layer::Derived),
            "utility" => Ok(Layer::Utility),
            _ => Err(anyhow::anyhow!("unknown layer: {s}")),
        }
    }
}

/// A member function of an entity, declared or defined inside its body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodInfo {
    pub line_start: usize,
    pub line_end: usize,
    pub name: String,
    pub is_virtual: bool,
    #[serde(default)]
    pub is_pure_virtual: bool,
    /// Has a real body (not a bare declaration, `= default` or `= delete`).
    #[serde(default)]
    pub is_implemented: bool,
    #[serde(default)]
    pub is_template: bool,
}

impl MethodInfo {
    pub fn line_span(&self) -> usize {
        self.line_end.saturating_sub(self.line_start) + 1
    }

    pub fn is_operator(&self) -> bool {
        let short = self.name.rsplit("::").next().unwrap_or(&self.name);
        match short.strip_prefix("operator") {
            Some(rest) => !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'),
            None => false,
        }
    }
}

/// Structural facts the layer classifier looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityShape {
    pub has_pure_virtual_method: bool,
    pub all_methods_virtual: bool,
    pub has_operator_overload: bool,
    pub has_template_method: bool,
    pub declares_base_type: bool,
    pub method_count: usize,
    pub implemented_method_count: usize,
    pub virtual_method_count: usize,
}

impl EntityShape {
    pub fn from_methods(methods: &[MethodInfo], declares_base_type: bool) -> Self {
        let virtual_method_count = methods.iter().filter(|m| m.is_virtual).count();
        Self {
            has_pure_virtual_method: methods.iter().any(|m| m.is_pure_virtual),
            all_methods_virtual: !methods.is_empty() && virtual_method_count == methods.len(),
            has_operator_overload: methods.iter().any(MethodInfo::is_operator),
            has_template_method: methods.iter().any(|m| m.is_template),
            declares_base_type,
            method_count: methods.len(),
            implemented_method_count: methods.iter().filter(|m| m.is_implemented).count(),
            virtual_method_count,
        }
    }
}

/// A structural unit found in one file, before it is merged into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub line_start: usize,
    pub line_end: usize,
    pub methods: Vec<MethodInfo>,
    pub inherits_from: BTreeSet<String>,
    pub uses: BTreeSet<String>,
}

impl EntityDescriptor {
    pub fn shape(&self) -> EntityShape {
        EntityShape::from_methods(&self.methods, !self.inherits_from.is_empty())
    }

    /// Lines of implemented member code.
    pub fn implemented_loc(&self) -> usize {
        self.methods
            .iter()
            .filter(|m| m.is_implemented)
            .map(MethodInfo::line_span)
            .sum()
    }
}

/// A function definition found anywhere in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpan {
    pub name: String,
    pub line_start: usize,
    pub line_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    Lambda,
    FunctionPointer,
}

/// A function handed to another call as an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSite {
    pub parent_function: String,
    pub kind: CallbackKind,
    pub line_start: usize,
    pub line_end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodAnalysis {
    pub local_functions: Vec<FunctionSpan>,
    pub callbacks: Vec<CallbackSite>,
}

/// Whole hours plus a 0..=59 minute remainder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EstimatedTime {
    pub hours: u64,
    pub minutes: u8,
}

impl EstimatedTime {
    /// Split fractional hours into whole hours and rounded minutes.
    pub fn from_hours(total: f64) -> Self {
        if !total.is_finite() || total <= 0.0 {
            return Self::default();
        }
        let mut hours = total.floor() as u64;
        let mut minutes = ((total - hours as f64) * 60.0).round() as u64;
        if minutes >= 60 {
            hours += minutes / 60;
            minutes %= 60;
        }
        Self {
            hours,
            minutes: minutes as u8,
        }
    }

    pub fn as_hours(&self) -> f64 {
        self.hours as f64 + f64::from(self.minutes) / 60.0
    }

    pub fn total_minutes(&self) -> u64 {
        self.hours * 60 + u64::from(self.minutes)
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Self {
            hours: minutes / 60,
            minutes: (minutes % 60) as u8,
        }
    }
}

impl fmt::Display for EstimatedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {:02}m", self.hours, self.minutes)
    }
}

/// Per-file counts plus the derived score and estimate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub loc: usize,
    pub functions: usize,
    pub classes: usize,
    pub templates: usize,
    pub conditionals: usize,
    pub loops: usize,
    pub includes: usize,
    pub complexity_score: f64,
    pub estimated_time: EstimatedTime,
}

/// Admission and extraction outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ModuleStatus {
    Ok,
    Skipped(String),
    Error(String),
}

impl ModuleStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ModuleStatus::Ok)
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Skipped(reason) => write!(f, "skipped:{reason}"),
            ModuleStatus::Error(reason) => write!(f, "error:{reason}"),
        }
    }
}

/// Additive components of a file's time estimate, in hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBreakdown {
    pub review: f64,
    pub entities: f64,
    pub control_flow: f64,
    pub templates: f64,
    pub testing: f64,
    pub documentation: f64,
}

impl TimeBreakdown {
    pub fn total(&self) -> f64 {
        self.review
            + self.entities
            + self.control_flow
            + self.templates
            + self.testing
            + self.documentation
    }
}

/// Everything known about one file after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub path: PathBuf,
    pub status: ModuleStatus,
    pub metrics: Metrics,
    #[serde(default)]
    pub breakdown: TimeBreakdown,
    pub includes: Vec<String>,
    pub entities: Vec<String>,
    #[serde(default)]
    pub layer: Option<Layer>,
    #[serde(default)]
    pub methods: MethodAnalysis,
}

impl ModuleRecord {
    /// Placeholder record for a file that contributed nothing.
    pub fn placeholder(path: PathBuf, status: ModuleStatus) -> Self {
        Self {
            path,
            status,
            metrics: Metrics::default(),
            breakdown: TimeBreakdown::default(),
            includes: Vec::new(),
            entities: Vec::new(),
            layer: None,
            methods: MethodAnalysis::default(),
        }
    }
}

/// Corpus-wide view of one entity name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub layer: Layer,
    pub methods: Vec<MethodInfo>,
    pub inherits_from: BTreeSet<String>,
    pub uses: BTreeSet<String>,
    pub used_by: BTreeSet<String>,
    pub occurrences: BTreeSet<PathBuf>,
}
