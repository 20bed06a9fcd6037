use thiserror::Error;

use crate::types::ModuleStatus;

/// Why a single file contributed no entities.
///
/// None of these abort a run: each is folded into the file's
/// [`ModuleStatus`] and the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("unreadable: {0}")]
    Read(String),
    #[error("empty file")]
    Empty,
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("{0}")]
    Admission(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl ExtractError {
    /// Read failures are errors; everything else is a deliberate skip.
    pub fn into_status(self) -> ModuleStatus {
        match self {
            ExtractError::Read(_) | ExtractError::Empty => ModuleStatus::Error(self.to_string()),
            ExtractError::Parse(_) | ExtractError::Admission(_) | ExtractError::Timeout(_) => {
                ModuleStatus::Skipped(self.to_string())
            }
        }
    }
}
