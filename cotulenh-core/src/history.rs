//! Undo/redo over full state snapshots.

use crate::game::GameState;
use crate::types::Move;

/// One committed transition. Snapshots are deep copies taken at push time
/// and never mutated afterwards, so readers of past states cannot observe
/// changes to the live game.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub before: GameState,
    pub mv: Move,
    pub after: GameState,
}

/// Append-only log with a cursor. The cursor counts applied entries:
/// `cursor == entries.len()` means nothing to redo.
#[derive(Clone, Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    /// Record a committed transition, discarding any redo future.
    pub fn push(&mut self, before: GameState, mv: Move, after: GameState) {
        self.entries.truncate(self.cursor);
        self.entries.push(HistoryEntry { before, mv, after });
        self.cursor += 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Step the cursor back and return the state before the undone move.
    pub fn undo(&mut self) -> Option<GameState> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].before.clone())
    }

    /// Step the cursor forward and return the state after the redone move.
    pub fn redo(&mut self) -> Option<GameState> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor - 1].after.clone())
    }

    /// Snapshot at a cursor position without moving it: `-1` is the very
    /// first `before` (the initial position), `i >= 0` the state after
    /// entry `i`.
    pub fn jump_to(&self, index: isize) -> Option<GameState> {
        if index == -1 {
            return self.entries.first().map(|e| e.before.clone());
        }
        self.entries
            .get(usize::try_from(index).ok()?)
            .map(|e| e.after.clone())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
