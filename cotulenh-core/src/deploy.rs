//! Deploy session state machine.
//!
//! A deploy unstacks pieces from one square one at a time before the turn
//! passes. The session tracks the steps as virtual overlays on top of the
//! real board, which stays untouched until commit; cancel therefore
//! restores the pre-deploy position by simply discarding the session.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::board::Board;
use crate::combine::CombineTable;
use crate::game::RuleError;
use crate::types::{Color, Piece, Role, Square, Stack};

/// Lifecycle phase of a session.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    /// Steps may still be taken; deployable pieces remain.
    Active,
    /// Every remaining piece has moved or elected to stay.
    ReadyToCommit,
}

/// One in-progress multi-step deployment.
#[derive(Clone, Debug, PartialEq)]
pub struct DeploySession {
    origin: Square,
    color: Color,
    original: Stack,
    remaining: Option<Stack>,
    moved: Vec<(Piece, Square)>,
    stay: Vec<Role>,
    /// Virtual square contents not yet committed; `None` marks a square
    /// cleared by a suicide capture.
    overlays: BTreeMap<Square, Option<Stack>>,
    captured_any: bool,
}

impl DeploySession {
    /// Start a session over the stack at `origin`, captured pre-deploy.
    pub fn start(origin: Square, original: Stack) -> DeploySession {
        DeploySession {
            origin,
            color: original.color(),
            remaining: Some(original.clone()),
            original,
            moved: Vec::new(),
            stay: Vec::new(),
            overlays: BTreeMap::new(),
            captured_any: false,
        }
    }

    #[inline]
    pub fn origin(&self) -> Square {
        self.origin
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    /// The stack as it stood before the deploy began.
    pub fn original(&self) -> &Stack {
        &self.original
    }

    /// Pieces still at the origin, stayers included.
    pub fn remaining(&self) -> Option<&Stack> {
        self.remaining.as_ref()
    }

    pub fn moved(&self) -> &[(Piece, Square)] {
        &self.moved
    }

    /// True once any step captured; resets the half-move clock on commit.
    pub fn captured_any(&self) -> bool {
        self.captured_any
    }

    /// Roles that may still take a deploy step (remaining minus stayers).
    pub fn deployable(&self) -> Vec<Piece> {
        match &self.remaining {
            None => Vec::new(),
            Some(stack) => stack
                .flatten()
                .into_iter()
                .filter(|p| !self.stay.contains(&p.role))
                .collect(),
        }
    }

    pub fn phase(&self) -> DeployPhase {
        if !self.moved.is_empty() && self.deployable().is_empty() {
            DeployPhase::ReadyToCommit
        } else {
            DeployPhase::Active
        }
    }

    /// Whether commit would be accepted.
    pub fn can_commit(&self) -> bool {
        self.phase() == DeployPhase::ReadyToCommit
    }

    /// The board as the session sees it: overlays applied and the origin
    /// holding only the remaining pieces.
    pub fn virtual_board(&self, board: &Board) -> Board {
        let mut view = board.clone();
        view.clear(self.origin);
        if let Some(remaining) = &self.remaining {
            view.put(self.origin, remaining.clone());
        }
        for (&sq, overlay) in &self.overlays {
            match overlay {
                Some(stack) => view.put(sq, stack.clone()),
                None => view.clear(sq),
            }
        }
        view
    }

    /// Record one piece leaving the stack.
    ///
    /// Removes the role from the remaining set, appends it to the moved
    /// list and writes a virtual overlay at the destination. A suicide
    /// step clears the destination instead.
    pub fn step(
        &mut self,
        table: &CombineTable,
        role: Role,
        to: Square,
        captured: bool,
        suicide: bool,
    ) -> Result<(), RuleError> {
        let Some(current) = &self.remaining else {
            return Err(RuleError::NotDeployed);
        };
        if self.stay.contains(&role) {
            return Err(RuleError::NotDeployed);
        }
        let (rest, removed) = table.remove(current, role);
        let Some(piece) = removed else {
            return Err(RuleError::NotDeployed);
        };
        self.remaining = rest;
        self.moved.push((piece, to));
        let overlay = if suicide {
            None
        } else {
            Some(Stack::single(piece))
        };
        self.overlays.insert(to, overlay);
        if captured {
            self.captured_any = true;
        }
        Ok(())
    }

    /// Elect a remaining piece to stay at the origin through commit.
    pub fn mark_stay(&mut self, role: Role) -> Result<(), RuleError> {
        let has = self
            .remaining
            .as_ref()
            .is_some_and(|s| s.contains_role(role));
        if !has {
            return Err(RuleError::NotDeployed);
        }
        if !self.stay.contains(&role) {
            self.stay.push(role);
        }
        Ok(())
    }

    /// Re-attach a previously moved piece to another moved piece or to the
    /// remaining stack, when the combination engine validates the result.
    pub fn recombine(
        &mut self,
        table: &CombineTable,
        role: Role,
        target: Square,
    ) -> Result<(), RuleError> {
        let idx = self
            .moved
            .iter()
            .position(|(p, _)| p.role == role)
            .ok_or(RuleError::NotDeployed)?;
        let (piece, from_sq) = self.moved[idx];
        // A suicided piece left no overlay to detach from.
        let Some(Some(source)) = self.overlays.get(&from_sq).cloned() else {
            return Err(RuleError::NotDeployed);
        };

        if target == self.origin {
            let Some(remaining) = &self.remaining else {
                return Err(RuleError::InvalidCombination);
            };
            let combined = table
                .combine(&[remaining, &Stack::single(piece)])
                .ok_or(RuleError::InvalidCombination)?;
            self.detach(table, &source, from_sq, role);
            self.remaining = Some(combined);
            self.moved.remove(idx);
            return Ok(());
        }

        let Some(Some(dest)) = self.overlays.get(&target).cloned() else {
            return Err(RuleError::NotDeployed);
        };
        let combined = table
            .combine(&[&dest, &Stack::single(piece)])
            .ok_or(RuleError::InvalidCombination)?;
        self.detach(table, &source, from_sq, role);
        self.overlays.insert(target, Some(combined));
        self.moved[idx].1 = target;
        Ok(())
    }

    fn detach(&mut self, table: &CombineTable, source: &Stack, sq: Square, role: Role) {
        let (rest, _) = table.remove(source, role);
        self.overlays.insert(sq, rest);
    }

    /// Write the session onto the real board. The caller has already
    /// validated `can_commit`.
    pub fn commit(self, board: &mut Board) {
        board.clear(self.origin);
        if let Some(remaining) = self.remaining {
            board.put(self.origin, remaining);
        }
        for (sq, overlay) in self.overlays {
            match overlay {
                Some(stack) => board.put(sq, stack),
                None => board.clear(sq),
            }
        }
    }

    /// Plain serializable view for callers; no internal access needed.
    pub fn snapshot(&self) -> DeploySnapshot {
        DeploySnapshot {
            origin: self.origin,
            color: self.color,
            phase: self.phase(),
            moved: self
                .moved
                .iter()
                .map(|(p, sq)| (p.role, *sq))
                .collect(),
            remaining: self
                .remaining
                .as_ref()
                .map(|s| s.flatten().iter().map(|p| p.role).collect())
                .unwrap_or_default(),
            stay: self.stay.clone(),
        }
    }
}

/// Serializable session view exposed on the public API.
#[derive(Clone, Debug, Serialize)]
pub struct DeploySnapshot {
    pub origin: Square,
    pub color: Color,
    pub phase: DeployPhase,
    pub moved: Vec<(Role, Square)>,
    pub remaining: Vec<Role>,
    pub stay: Vec<Role>,
}
