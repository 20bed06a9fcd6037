pub mod admission;
pub mod analyzer;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod deadline;
pub mod error;
pub mod estimate;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod types;

pub use analyzer::{ExtractionContext, FileExtraction, ParsedFile, SourceAnalyzer};
pub use classifier::EntityClassifier;
pub use config::Config;
pub use deadline::Deadline;
pub use error::ExtractError;
pub use estimate::ProjectEstimate;
pub use pipeline::{AnalysisPipeline, CorpusModel};
pub use registry::{EntityRegistry, RelationEdge, RelationKind, RelationshipGraph};
pub use types::*;
