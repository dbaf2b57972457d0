//! Translation of natural-language questions into candidate SQL statements.

use std::sync::Arc;

use tracing::debug;

use crate::cost::CostMeter;
use crate::history::{ConversationHistory, Turn};
use crate::llm::{LlmClient, LlmError};

/// Output-length cap for every translation call.
pub const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Fixed translation instructions sent as the system instruction, followed by
/// the schema document supplied at startup.
pub const TRANSLATE_INSTRUCTIONS: &str = "You are an expert SQL developer. Based on the database \
schema provided below, translate the user's natural language query into a single, executable \
MySQL statement. Respond with ONLY the SQL statement, no explanation.";

/// Build the system instruction from the schema documentation.
pub fn system_instruction(schema_doc: &str) -> String {
    format!("{TRANSLATE_INSTRUCTIONS}\n\nSchema:\n{schema_doc}")
}

/// Wraps the model call: extends the conversation transcript, meters usage,
/// and returns a cleaned candidate statement.
///
/// Owns the session's [`ConversationHistory`] and [`CostMeter`]; both live
/// exactly as long as the session.
pub struct Translator {
    llm: Arc<dyn LlmClient>,
    history: ConversationHistory,
    cost: CostMeter,
}

impl Translator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            history: ConversationHistory::new(),
            cost: CostMeter::new(),
        }
    }

    /// Translate a natural-language query into a candidate SQL statement.
    ///
    /// Appends the user turn (and, when a prior execution error exists, a
    /// synthetic model turn carrying the error plus a correction request)
    /// before sending the full transcript to the model. The model's cleaned
    /// reply is appended as a new turn and returned.
    ///
    /// A model-service failure is fatal to the current query only — it never
    /// drives the correction loop.
    pub async fn translate(
        &mut self,
        query: &str,
        prior_error: Option<&str>,
    ) -> Result<String, LlmError> {
        self.history.append(Turn::user(query));

        if let Some(error) = prior_error {
            // Re-present the failure as the model's own turn, then ask for a fix.
            self.history.append(Turn::model(error));
            self.history.append(Turn::user(format!(
                "The previous SQL statement failed with this error: {error}. \
                 Provide a corrected SQL statement."
            )));
        }

        let completion = self
            .llm
            .complete(self.history.snapshot(), MAX_OUTPUT_TOKENS)
            .await?;

        let call_cost = self.cost.record(self.llm.model(), completion.total_tokens);
        debug!(
            model = self.llm.model(),
            tokens = completion.total_tokens,
            cost = call_cost,
            session_cost = self.cost.total_cost(),
            "translation call"
        );

        let statement = strip_code_fences(&completion.text);
        if statement.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        self.history.append(Turn::model(statement.clone()));
        Ok(statement)
    }

    pub fn cost(&self) -> &CostMeter {
        &self.cost
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}

/// Strip markdown code fences (with or without a language tag) from model
/// output, returning the trimmed inner text.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let after_first_fence = trimmed
            .find('\n')
            .map(|i| &trimmed[i + 1..])
            .unwrap_or(trimmed);
        if let Some(end) = after_first_fence.rfind("```") {
            return after_first_fence[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}

// ============================================================================
// Tests
// ============================================================================
