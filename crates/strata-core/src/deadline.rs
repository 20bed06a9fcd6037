use std::time::{Duration, Instant};

use crate::error::ExtractError;

/// Soft per-file time budget. Analyzers poll it while parsing and the
/// pipeline checks it between extraction stages.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// Start the clock; a budget of 0 never expires.
    pub fn start(budget_ms: u64) -> Self {
        Self {
            started: Instant::now(),
            budget: (budget_ms > 0).then(|| Duration::from_millis(budget_ms)),
        }
    }

    pub fn unbounded() -> Self {
        Self::start(0)
    }

    pub fn is_expired(&self) -> bool {
        self.budget
            .is_some_and(|budget| self.started.elapsed() > budget)
    }

    pub fn check(&self) -> Result<(), ExtractError> {
        match self.budget {
            Some(budget) if self.is_expired() => {
                Err(ExtractError::Timeout(budget.as_millis() as u64))
            }
            _ => Ok(()),
        }
    }
}
