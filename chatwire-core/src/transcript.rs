//! Ordered, append-only conversation history.
//!
//! The store only ever holds confirmed turns. An assistant turn that is still
//! streaming lives in the reducer's buffer and shows up here once, on `end`.

use crate::model::Turn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn to the end. Pure in-memory growth, never fails.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_human(&mut self, content: impl Into<String>) {
        self.append(Turn::human(content));
    }

    /// The full ordered history, as replayed to the backend.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}
