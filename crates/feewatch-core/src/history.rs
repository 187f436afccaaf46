//! Bounded history of recently observed blocks.

use crate::types::BlockSummary;

/// Maximum number of block summaries retained.
pub const HISTORY_CAPACITY: usize = 20;

/// Newest-first, bounded list of block summaries.
///
/// The buffer is a value type with a pure [`push`](BlockHistory::push):
/// state transitions in the engine produce a new history rather than
/// mutating a shared one, so snapshots handed to callers never change
/// underneath them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockHistory {
    entries: Vec<BlockSummary>,
}

impl BlockHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new history with `summary` prepended, dropping the oldest
    /// entry once [`HISTORY_CAPACITY`] is reached.
    #[must_use]
    pub fn push(&self, summary: BlockSummary) -> Self {
        let mut entries = Vec::with_capacity((self.entries.len() + 1).min(HISTORY_CAPACITY));
        entries.push(summary);
        entries.extend(self.entries.iter().take(HISTORY_CAPACITY - 1).copied());
        Self { entries }
    }

    /// Block summaries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[BlockSummary] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
