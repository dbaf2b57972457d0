//! Conversation transcript exchanged with the translation service.
//!
//! The history is append-only for the lifetime of a session: failed
//! candidates and their error text stay visible so later queries benefit
//! from the accumulated context. Nothing is ever removed or truncated
//! mid-loop; the whole transcript is discarded when the session ends.

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Wire name used by the generateContent API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One exchange unit in the transcript. Immutable once appended.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Ordered, monotonically growing sequence of [`Turn`]s.
///
/// Turns are appended in strict call order, so the model always sees a
/// causally ordered transcript. Growth within a session is unbounded by
/// design; sessions are short-lived.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one turn to the transcript.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The full ordered transcript, for the next model call.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
