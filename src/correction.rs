//! Self-correcting translate → sample → confirm → execute loop.
//!
//! One invocation handles one natural-language query. Each attempt asks the
//! translator for a candidate statement and validates it by running a
//! row-bounded sample. Execution errors feed back into the next translation;
//! translation-service errors abort the current query immediately. A
//! non-empty sample requires human confirmation before the unbounded full
//! run, after which the statement can be saved as a template.

use tracing::warn;

use crate::db::{Database, ExecutionOutcome};
use crate::display::render_table;
use crate::error::QueryError;
use crate::prompt::Prompter;
use crate::store::QueryStore;
use crate::translate::Translator;
use crate::{MAX_ATTEMPTS, SAMPLE_ROW_LIMIT};

/// Terminal state of one loop invocation.
///
/// A translation-service failure is not an outcome; it surfaces as
/// [`QueryError::TranslationUnavailable`] and aborts the current query.
#[derive(Debug)]
pub enum LoopOutcome {
    /// A sample run validated a candidate. `ran_full` is false when the
    /// sample was empty or the user declined the full run.
    Succeeded { attempts: u32, ran_full: bool },
    /// The attempt budget was spent without a successful sample.
    Exhausted { attempts: u32, last_error: String },
}

/// Orchestrates the translator and the database across the attempt budget.
pub struct CorrectionLoop<'a> {
    translator: &'a mut Translator,
    db: &'a dyn Database,
    max_attempts: u32,
}

impl<'a> CorrectionLoop<'a> {
    pub fn new(translator: &'a mut Translator, db: &'a dyn Database) -> Self {
        Self {
            translator,
            db,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Process one natural-language query to a terminal state.
    ///
    /// The session continues after any outcome; only the caller's REPL
    /// decides when the process ends.
    pub async fn run(
        &mut self,
        query: &str,
        prompter: &mut dyn Prompter,
        store: &mut QueryStore,
    ) -> Result<LoopOutcome, QueryError> {
        let mut last_error: Option<String> = None;
        let mut attempt: u32 = 1;

        loop {
            let candidate = self
                .translator
                .translate(query, last_error.as_deref())
                .await?;

            println!("Generated SQL:\n{candidate}\n");

            let sample = sample_statement(&candidate);
            match self.db.execute(&sample).await {
                ExecutionOutcome::Failure(error) => {
                    warn!(attempt, %error, "sample execution failed");
                    attempt += 1;
                    if attempt > self.max_attempts {
                        eprintln!(
                            "Failed to produce a working statement after {} attempts.",
                            self.max_attempts
                        );
                        eprintln!("Last error: {error}");
                        return Ok(LoopOutcome::Exhausted {
                            attempts: self.max_attempts,
                            last_error: error,
                        });
                    }
                    eprintln!("Statement failed: {error}");
                    eprintln!("Asking the model for a correction...\n");
                    last_error = Some(error);
                }
                ExecutionOutcome::Success(rows) if rows.is_empty() => {
                    println!("Sample returned no rows; skipping full execution.\n");
                    return Ok(LoopOutcome::Succeeded {
                        attempts: attempt,
                        ran_full: false,
                    });
                }
                ExecutionOutcome::Success(rows) => {
                    println!("Sample results ({} rows):", rows.len());
                    print!("{}", render_table(&rows));

                    let confirmed =
                        prompter.confirm("Execute the full statement for all results? (y/N)")?;
                    if !confirmed {
                        println!("Full execution cancelled.\n");
                        return Ok(LoopOutcome::Succeeded {
                            attempts: attempt,
                            ran_full: false,
                        });
                    }

                    // Full results stay out of the conversation transcript so
                    // result-set data never inflates later model-call cost.
                    self.run_full(&candidate, prompter, store).await?;
                    return Ok(LoopOutcome::Succeeded {
                        attempts: attempt,
                        ran_full: true,
                    });
                }
            }
        }
    }

    /// Run the validated, un-suffixed candidate unbounded, display all rows,
    /// then offer to save it as a template.
    async fn run_full(
        &self,
        candidate: &str,
        prompter: &mut dyn Prompter,
        store: &mut QueryStore,
    ) -> Result<(), QueryError> {
        match self.db.execute(candidate).await {
            ExecutionOutcome::Failure(error) => {
                // The candidate already validated at sample scale; a failure
                // here ends the query without restarting correction.
                eprintln!("Full execution failed: {error}\n");
            }
            ExecutionOutcome::Success(rows) => {
                if rows.is_empty() {
                    println!("No rows.\n");
                } else {
                    println!("Results ({} rows):", rows.len());
                    print!("{}", render_table(&rows));
                    println!();
                }

                if prompter.confirm("Save this statement? (y/N)")? {
                    let label = prompter.input("Enter a label for this statement:")?;
                    if label.trim().is_empty() {
                        eprintln!("Empty label; not saved.");
                    } else {
                        if store.contains(label.trim()) {
                            eprintln!("Label \"{}\" already exists; overwriting.", label.trim());
                        }
                        store.save(label.trim(), candidate)?;
                        println!("Saved as \"{}\".", label.trim());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Form the row-bounded sample variant of a candidate statement.
///
/// A cheap syntactic suffix: the trailing semicolon is trimmed and a
/// `LIMIT` clause appended. No semantic rewrite is attempted.
pub fn sample_statement(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    format!("{trimmed} LIMIT {SAMPLE_ROW_LIMIT}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{MockDatabase, Scalar, make_row};
    use crate::llm::MockLlmClient;
    use crate::prompt::ScriptedPrompter;

    fn temp_store() -> (QueryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = QueryStore::open(dir.path().join("queries.json")).unwrap();
        (store, dir)
    }

    fn one_row() -> Vec<crate::db::Row> {
        vec![make_row(&[("total", Scalar::Integer(2156))])]
    }

    // --- sample_statement ---

    #[test]
    fn test_sample_statement_appends_limit() {
        assert_eq!(
            sample_statement("SELECT * FROM node"),
            "SELECT * FROM node LIMIT 5"
        );
    }

    #[test]
    fn test_sample_statement_trims_trailing_semicolon() {
        assert_eq!(
            sample_statement("SELECT * FROM node;\n"),
            "SELECT * FROM node LIMIT 5"
        );
    }

    #[test]
    fn test_sample_statement_suffixes_even_with_existing_limit() {
        // The suffix is syntactic, never a rewrite of an existing clause.
        assert_eq!(
            sample_statement("SELECT * FROM node LIMIT 10"),
            "SELECT * FROM node LIMIT 10 LIMIT 5"
        );
    }

    // --- correction loop ---

    #[tokio::test]
    async fn test_exhausted_after_three_failed_attempts() {
        let llm = Arc::new(MockLlmClient::new(vec![
            "SELECT bad1".into(),
            "SELECT bad2".into(),
            "SELECT bad3".into(),
        ]));
        let db = MockDatabase::new(vec![
            ExecutionOutcome::Failure("error one".into()),
            ExecutionOutcome::Failure("error two".into()),
            ExecutionOutcome::Failure("error three".into()),
        ]);
        let mut translator = Translator::new(llm.clone());
        let mut prompter = ScriptedPrompter::new(&[]);
        let (mut store, _dir) = temp_store();

        let outcome = CorrectionLoop::new(&mut translator, &db)
            .run("broken question", &mut prompter, &mut store)
            .await
            .unwrap();

        match outcome {
            LoopOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "error three");
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }

        // At most 3 translation calls, all samples row-bounded, no prompts.
        assert_eq!(llm.call_count(), 3);
        assert!(db.executed().iter().all(|s| s.ends_with("LIMIT 5")));
        assert!(prompter.asked.is_empty());
    }

    #[tokio::test]
    async fn test_empty_sample_skips_confirmation_and_full_run() {
        let llm = Arc::new(MockLlmClient::new(vec!["SELECT * FROM empty_t".into()]));
        let db = MockDatabase::new(vec![ExecutionOutcome::Success(vec![])]);
        let mut translator = Translator::new(llm);
        let mut prompter = ScriptedPrompter::new(&[]);
        let (mut store, _dir) = temp_store();

        let outcome = CorrectionLoop::new(&mut translator, &db)
            .run("anything there?", &mut prompter, &mut store)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            LoopOutcome::Succeeded {
                attempts: 1,
                ran_full: false
            }
        ));
        assert_eq!(db.executed().len(), 1);
        assert!(prompter.asked.is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_full_run_uses_unsuffixed_statement() {
        // Scenario A: single-row aggregate sample, confirmation, full run.
        let llm = Arc::new(MockLlmClient::new(vec![
            "SELECT COUNT(*) AS total FROM node WHERE status = 1".into(),
        ]));
        let db = MockDatabase::new(vec![
            ExecutionOutcome::Success(one_row()),
            ExecutionOutcome::Success(one_row()),
        ]);
        let mut translator = Translator::new(llm);
        let mut prompter = ScriptedPrompter::new(&["y", "n"]);
        let (mut store, _dir) = temp_store();

        let outcome = CorrectionLoop::new(&mut translator, &db)
            .run("count published english letters", &mut prompter, &mut store)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            LoopOutcome::Succeeded {
                attempts: 1,
                ran_full: true
            }
        ));

        let executed = db.executed();
        assert_eq!(
            executed[0],
            "SELECT COUNT(*) AS total FROM node WHERE status = 1 LIMIT 5"
        );
        assert_eq!(
            executed[1],
            "SELECT COUNT(*) AS total FROM node WHERE status = 1"
        );

        // Exactly one confirmation prompt before the full run.
        assert_eq!(prompter.asked_count("Execute the full statement"), 1);
    }

    #[tokio::test]
    async fn test_declined_confirmation_skips_full_run() {
        let llm = Arc::new(MockLlmClient::new(vec!["SELECT name FROM users".into()]));
        let db = MockDatabase::new(vec![ExecutionOutcome::Success(one_row())]);
        let mut translator = Translator::new(llm);
        let mut prompter = ScriptedPrompter::new(&["n"]);
        let (mut store, _dir) = temp_store();

        let outcome = CorrectionLoop::new(&mut translator, &db)
            .run("list users", &mut prompter, &mut store)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            LoopOutcome::Succeeded {
                ran_full: false,
                ..
            }
        ));
        assert_eq!(db.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_error_feedback_then_success() {
        // Scenario B: first statement references a bad column, second works.
        let llm = Arc::new(MockLlmClient::new(vec![
            "SELECT missing_col FROM node".into(),
            "SELECT nid FROM node".into(),
        ]));
        let db = MockDatabase::new(vec![
            ExecutionOutcome::Failure("Unknown column 'missing_col'".into()),
            ExecutionOutcome::Success(one_row()),
        ]);
        let mut translator = Translator::new(llm.clone());
        let mut prompter = ScriptedPrompter::new(&["n"]);
        let (mut store, _dir) = temp_store();

        let outcome = CorrectionLoop::new(&mut translator, &db)
            .run("list node ids", &mut prompter, &mut store)
            .await
            .unwrap();

        assert!(matches!(outcome, LoopOutcome::Succeeded { attempts: 2, .. }));
        assert_eq!(llm.call_count(), 2);

        // The error text reached the transcript as correction context.
        let transcript = translator.history().snapshot();
        assert!(
            transcript
                .iter()
                .any(|t| t.text.contains("Unknown column 'missing_col'"))
        );
    }

    #[tokio::test]
    async fn test_exhaustion_meters_exactly_three_calls() {
        // Scenario C: the meter reflects exactly 3 translation calls.
        let llm = Arc::new(MockLlmClient::new(vec![
            "SELECT a".into(),
            "SELECT b".into(),
            "SELECT c".into(),
        ]));
        let db = MockDatabase::new(vec![
            ExecutionOutcome::Failure("e1".into()),
            ExecutionOutcome::Failure("e2".into()),
            ExecutionOutcome::Failure("e3".into()),
        ]);
        let mut translator = Translator::new(llm);
        let mut prompter = ScriptedPrompter::new(&[]);
        let (mut store, _dir) = temp_store();

        CorrectionLoop::new(&mut translator, &db)
            .run("hopeless", &mut prompter, &mut store)
            .await
            .unwrap();

        // MockLlmClient reports 100 tokens per call.
        assert_eq!(translator.cost().total_tokens(), 300);
    }

    #[tokio::test]
    async fn test_translation_failure_aborts_without_touching_db() {
        let llm = Arc::new(MockLlmClient::failing());
        let db = MockDatabase::new(vec![]);
        let mut translator = Translator::new(llm);
        let mut prompter = ScriptedPrompter::new(&[]);
        let (mut store, _dir) = temp_store();

        let result = CorrectionLoop::new(&mut translator, &db)
            .run("anything", &mut prompter, &mut store)
            .await;

        assert!(matches!(
            result,
            Err(QueryError::TranslationUnavailable(_))
        ));
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_save_offer_after_full_run() {
        let llm = Arc::new(MockLlmClient::new(vec![
            "SELECT name FROM users WHERE status = 1".into(),
        ]));
        let db = MockDatabase::new(vec![
            ExecutionOutcome::Success(one_row()),
            ExecutionOutcome::Success(one_row()),
        ]);
        let mut translator = Translator::new(llm);
        let mut prompter = ScriptedPrompter::new(&["y", "y", "active-users"]);
        let (mut store, _dir) = temp_store();

        CorrectionLoop::new(&mut translator, &db)
            .run("who is active", &mut prompter, &mut store)
            .await
            .unwrap();

        let saved = store.get("active-users").unwrap();
        assert_eq!(saved.sql, "SELECT name FROM users WHERE status = 1");
        assert!(saved.params.is_empty());
    }

    #[tokio::test]
    async fn test_full_run_failure_ends_query_without_retry() {
        let llm = Arc::new(MockLlmClient::new(vec!["SELECT big FROM t".into()]));
        let db = MockDatabase::new(vec![
            ExecutionOutcome::Success(one_row()),
            ExecutionOutcome::Failure("server went away".into()),
        ]);
        let mut translator = Translator::new(llm.clone());
        let mut prompter = ScriptedPrompter::new(&["y"]);
        let (mut store, _dir) = temp_store();

        let outcome = CorrectionLoop::new(&mut translator, &db)
            .run("big query", &mut prompter, &mut store)
            .await
            .unwrap();

        // No further translation attempts after a confirmed full run.
        assert!(matches!(outcome, LoopOutcome::Succeeded { ran_full: true, .. }));
        assert_eq!(llm.call_count(), 1);
    }
}
