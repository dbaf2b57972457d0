//! Line-oriented terminal prompts for confirmation and free-text input.

use std::io::{self, BufRead, Write};

/// Terminal prompt boundary.
///
/// The process blocks on these calls; there is no asynchronous input.
pub trait Prompter: Send {
    /// Ask a yes/no question. Only `y`/`yes` (case-insensitive) confirm;
    /// everything else, including an empty answer, declines.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;

    /// Ask for one line of free text.
    fn input(&mut self, prompt: &str) -> io::Result<String>;
}

/// Prompter over the process stdin/stdout.
pub struct StdPrompter;

impl Prompter for StdPrompter {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.input(question)?;
        let answer = answer.trim().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    fn input(&mut self, prompt: &str) -> io::Result<String> {
        print!("{prompt} ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }
}

// ============================================================================
// Scripted Implementation (Test Only)
// ============================================================================

/// Scripted prompter for testing. Answers prompts in FIFO order and records
/// every question asked.
#[cfg(test)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    /// Questions asked so far, in order.
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    /// Create a prompter with a sequence of answers.
    ///
    /// # Panics
    ///
    /// Panics if prompted more times than there are answers.
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            asked: Vec::new(),
        }
    }

    /// Number of asked questions containing the given fragment.
    pub fn asked_count(&self, fragment: &str) -> usize {
        self.asked.iter().filter(|q| q.contains(fragment)).count()
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        self.asked.push(question.to_string());
        let answer = self
            .answers
            .pop_front()
            .expect("ScriptedPrompter: no more answers available");
        let answer = answer.trim().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    fn input(&mut self, prompt: &str) -> io::Result<String> {
        self.asked.push(prompt.to_string());
        Ok(self
            .answers
            .pop_front()
            .expect("ScriptedPrompter: no more answers available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_confirm_yes_variants() {
        let mut prompter = ScriptedPrompter::new(&["y", "YES", "n", ""]);
        assert!(prompter.confirm("go?").unwrap());
        assert!(prompter.confirm("go?").unwrap());
        assert!(!prompter.confirm("go?").unwrap());
        assert!(!prompter.confirm("go?").unwrap());
        assert_eq!(prompter.asked.len(), 4);
    }

    #[test]
    fn test_scripted_input_returns_answer() {
        let mut prompter = ScriptedPrompter::new(&["my-label"]);
        assert_eq!(prompter.input("label?").unwrap(), "my-label");
        assert_eq!(prompter.asked_count("label"), 1);
    }
}
