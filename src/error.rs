//! Error taxonomy for the natural-query crate.

use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;

/// Errors surfaced while processing one natural-language query or one
/// saved-query command.
///
/// Statement execution failures are *not* represented here: they are
/// recoverable, normalized into
/// [`ExecutionOutcome::Failure`](crate::db::ExecutionOutcome) and consumed by
/// the correction loop. Exceeding the attempt budget is likewise an ordinary
/// [`LoopOutcome::Exhausted`](crate::correction::LoopOutcome), not an error.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The translation service is unreachable or misconfigured.
    /// Fatal to the current query only; the session continues.
    #[error("translation unavailable: {0}")]
    TranslationUnavailable(#[from] LlmError),

    /// The saved-query store could not be read or written.
    #[error("saved-query store error: {0}")]
    Persistence(#[from] StoreError),

    /// Terminal input/output failed mid-prompt.
    #[error("prompt error: {0}")]
    Prompt(#[from] std::io::Error),
}
