//! Game state, legality filtering and the public command surface.
//!
//! Rule violations are reported as `Err(RuleError)` values; they never
//! panic across this boundary. Committed transitions are snapshotted into
//! the history manager before and after application.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::airdefense::{AirDefenseTable, ZoneSets};
use crate::board::Board;
use crate::combine::CombineTable;
use crate::deploy::{DeploySession, DeploySnapshot};
use crate::fen::{self, FenError};
use crate::history::History;
use crate::movegen;
use crate::types::{Color, Move, Role, Square};

/// Expected rule violations, surfaced as values for the caller to present.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuleError {
    #[error("the game is over")]
    GameOver,
    #[error("move is not legal in this position")]
    IllegalMove,
    #[error("no active deploy session")]
    NoDeploySession,
    #[error("a deploy session is already active")]
    DeployInProgress,
    #[error("square does not hold a deployable stack of the side to move")]
    NotAStack,
    #[error("piece is not part of the deploy session")]
    NotDeployed,
    #[error("deploy session has no steps to commit")]
    EmptyDeploy,
    #[error("pieces remain to deploy or stay")]
    PiecesRemaining,
    #[error("combination is not allowed")]
    InvalidCombination,
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Full game position. Committed transitions replace the state wholesale;
/// history snapshots clone it.
#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    pub board: Board,
    pub turn: Color,
    pub commanders: [Option<Square>; 2],
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub deploy: Option<DeploySession>,
    pub winner: Option<Color>,
}

impl GameState {
    pub fn commander(&self, color: Color) -> Option<Square> {
        self.commanders[color.index()]
    }

    fn refresh_commanders(&mut self) {
        self.commanders = [
            self.board.find_commander(Color::Red),
            self.board.find_commander(Color::Blue),
        ];
    }
}

/// The engine facade owning one game.
pub struct Game {
    state: GameState,
    table: CombineTable,
    air: AirDefenseTable,
    history: History,
}

impl Game {
    /// Start from the opening setup.
    pub fn new() -> Game {
        Game::from_fen(fen::START_POSITION).expect("start position parses")
    }

    /// Load a serialized position, re-playing any encoded deploy session.
    pub fn from_fen(text: &str) -> Result<Game, FenError> {
        let table = CombineTable::new();
        let air = AirDefenseTable::new();
        let parsed = fen::parse(text, &table)?;
        let mut state = GameState {
            board: parsed.board,
            turn: parsed.turn,
            commanders: [None, None],
            halfmove_clock: parsed.halfmove_clock,
            fullmove_number: parsed.fullmove_number,
            deploy: None,
            winner: None,
        };
        state.refresh_commanders();

        if let Some(deploy) = parsed.deploy {
            let stack = state.board.get(deploy.origin).cloned().ok_or_else(|| {
                FenError::Validation(format!("deploy origin {} is empty", deploy.origin))
            })?;
            if stack.color() != state.turn {
                return Err(FenError::Validation(
                    "deploy session must belong to the side to move".into(),
                ));
            }
            let mut session = DeploySession::start(deploy.origin, stack);
            for (role, dest) in deploy.steps {
                let view = session.virtual_board(&state.board);
                let captured = view.get(dest).is_some_and(|s| s.color() != state.turn);
                session.step(&table, role, dest, captured, false).map_err(|_| {
                    FenError::Validation(format!(
                        "deploy step {}{} does not match the origin stack",
                        role.to_char(),
                        dest
                    ))
                })?;
            }
            state.deploy = Some(session);
        }

        Ok(Game {
            state,
            table,
            air,
            history: History::new(),
        })
    }

    /// Serialize the current position, deploy session included.
    pub fn fen(&self) -> String {
        fen::format(&self.state)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn turn(&self) -> Color {
        self.state.turn
    }

    pub fn winner(&self) -> Option<Color> {
        self.state.winner
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The active deploy session as a plain snapshot, if any.
    pub fn deploy_snapshot(&self) -> Option<DeploySnapshot> {
        self.state.deploy.as_ref().map(|s| s.snapshot())
    }

    /// Per-color air-defense influence, computed on the session's virtual
    /// view while a deploy is in progress.
    pub fn air_defense(&self) -> ZoneSets {
        match &self.state.deploy {
            Some(session) => self
                .air
                .zones(&session.virtual_board(&self.state.board))
                .snapshot(),
            None => self.air.zones(&self.state.board).snapshot(),
        }
    }

    /// All pseudo-legal moves for the side to move: whole-stack moves, or
    /// deploy steps while a session is active.
    fn pseudo_moves(&self) -> Vec<Move> {
        match &self.state.deploy {
            Some(session) => {
                let view = session.virtual_board(&self.state.board);
                let enemy_zone = self.air.influence(&view, self.state.turn.opponent());
                let mut moves = Vec::new();
                for piece in session.deployable() {
                    moves.extend(movegen::deploy_piece_moves(
                        &view,
                        session.origin(),
                        piece,
                        &self.table,
                        &enemy_zone,
                    ));
                }
                if session.can_commit() {
                    moves.push(Move::DeployComplete {
                        origin: session.origin(),
                    });
                }
                moves
            }
            None => movegen::pseudo_legal(&self.state.board, self.state.turn, &self.table, &self.air),
        }
    }

    /// Legal moves: pseudo-legal moves whose tentative application does
    /// not leave the mover's own commander attacked.
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.state.winner.is_some() {
            return Vec::new();
        }
        self.pseudo_moves()
            .into_iter()
            .filter(|mv| self.is_legal(mv))
            .collect()
    }

    /// Legal moves grouped by origin square for the query surface.
    pub fn moves_by_origin(&self) -> BTreeMap<Square, Vec<Move>> {
        let mut map: BTreeMap<Square, Vec<Move>> = BTreeMap::new();
        for mv in self.legal_moves() {
            map.entry(mv.from()).or_default().push(mv);
        }
        map
    }

    pub fn moves_from(&self, sq: Square) -> Vec<Move> {
        self.legal_moves()
            .into_iter()
            .filter(|mv| mv.from() == sq)
            .collect()
    }

    fn is_legal(&self, mv: &Move) -> bool {
        let mut probe = self.state.clone();
        Self::apply_unchecked(&mut probe, mv, &self.table, &self.air);
        let mover = self.state.turn;
        if probe.winner == Some(mover) {
            return true;
        }
        let view = match &probe.deploy {
            Some(session) => session.virtual_board(&probe.board),
            None => probe.board.clone(),
        };
        match view.find_commander(mover) {
            Some(cmd) => {
                !movegen::is_attacked(&view, cmd, mover.opponent(), &self.table, &self.air)
            }
            // Commander-less positions (test boards) are vacuously safe.
            None => true,
        }
    }

    /// Apply a legal move. Deploy steps mutate the session; every other
    /// kind commits a transition and records it in the history.
    pub fn apply(&mut self, mv: &Move) -> Result<(), RuleError> {
        if self.state.winner.is_some() {
            return Err(RuleError::GameOver);
        }
        if !self.legal_moves().contains(mv) {
            return Err(RuleError::IllegalMove);
        }
        if matches!(mv, Move::DeployStep { .. }) {
            Self::apply_unchecked(&mut self.state, mv, &self.table, &self.air);
            return Ok(());
        }
        let mut before = self.state.clone();
        if matches!(mv, Move::DeployComplete { .. }) {
            // The board is untouched during a session, so stripping it
            // yields exactly the pre-deploy state.
            before.deploy = None;
        }
        Self::apply_unchecked(&mut self.state, mv, &self.table, &self.air);
        self.history.push(before, mv.clone(), self.state.clone());
        Ok(())
    }

    fn apply_unchecked(state: &mut GameState, mv: &Move, table: &CombineTable, air: &AirDefenseTable) {
        let mover = state.turn;
        let enemy_had_commander = state.commanders[mover.opponent().index()].is_some();
        let mut capture_happened = false;

        match mv {
            Move::Normal { from, to, .. } => {
                if let Some(stack) = state.board.take(*from) {
                    state.board.put(*to, stack);
                }
            }
            Move::Capture { from, to, .. } => {
                capture_happened = true;
                state.board.clear(*to);
                if let Some(stack) = state.board.take(*from) {
                    state.board.put(*to, stack);
                }
            }
            Move::StayCapture { target, .. } => {
                capture_happened = true;
                state.board.clear(*target);
            }
            Move::SuicideCapture { from, target, .. } => {
                capture_happened = true;
                state.board.clear(*target);
                state.board.clear(*from);
            }
            Move::Combine { from, to, combined, .. } => {
                state.board.clear(*from);
                state.board.clear(*to);
                state.board.put(*to, combined.clone());
            }
            Move::DeployStep {
                to,
                piece,
                captured,
                suicide,
                ..
            } => {
                if let Some(session) = state.deploy.as_mut() {
                    let _ = session.step(table, piece.role, *to, captured.is_some(), *suicide);
                }
                // Steps neither switch the turn nor touch the clocks.
                return;
            }
            Move::DeployComplete { .. } => {
                if let Some(session) = state.deploy.take() {
                    capture_happened = session.captured_any();
                    session.commit(&mut state.board);
                }
            }
        }

        state.refresh_commanders();
        if enemy_had_commander && state.commanders[mover.opponent().index()].is_none() {
            state.winner = Some(mover);
        }
        Self::promote_check_givers(state, mover, table, air);

        state.halfmove_clock = if capture_happened {
            0
        } else {
            state.halfmove_clock + 1
        };
        if mover == Color::Blue {
            state.fullmove_number += 1;
        }
        state.turn = mover.opponent();
    }

    /// A piece whose move leaves the enemy commander under its attack is
    /// promoted heroic.
    fn promote_check_givers(
        state: &mut GameState,
        mover: Color,
        table: &CombineTable,
        air: &AirDefenseTable,
    ) {
        let Some(cmd) = state.commanders[mover.opponent().index()] else {
            return;
        };
        let attackers: Vec<Square> = movegen::pseudo_legal(&state.board, mover, table, air)
            .iter()
            .filter(|m| m.captured().is_some() && m.target() == cmd)
            .map(|m| m.from())
            .collect();
        for sq in attackers {
            if let Some(stack) = state.board.get_mut(sq) {
                if !stack.heroic() {
                    stack.promote();
                }
            }
        }
    }

    /// Open a deploy session over a stack of the side to move.
    pub fn deploy_start(&mut self, origin: Square) -> Result<(), RuleError> {
        if self.state.winner.is_some() {
            return Err(RuleError::GameOver);
        }
        if self.state.deploy.is_some() {
            return Err(RuleError::DeployInProgress);
        }
        let Some(stack) = self.state.board.get(origin) else {
            return Err(RuleError::NotAStack);
        };
        if stack.color() != self.state.turn || !stack.is_stack() {
            return Err(RuleError::NotAStack);
        }
        self.state.deploy = Some(DeploySession::start(origin, stack.clone()));
        Ok(())
    }

    /// Discard the session; the board was never mutated, so the pre-deploy
    /// position is restored exactly. The turn does not switch.
    pub fn deploy_cancel(&mut self) -> Result<(), RuleError> {
        if self.state.deploy.take().is_none() {
            return Err(RuleError::NoDeploySession);
        }
        Ok(())
    }

    /// Commit the session: write overlays, clear or reduce the origin,
    /// switch the turn once.
    pub fn deploy_commit(&mut self) -> Result<(), RuleError> {
        let Some(session) = &self.state.deploy else {
            return Err(RuleError::NoDeploySession);
        };
        if session.moved().is_empty() {
            return Err(RuleError::EmptyDeploy);
        }
        if !session.can_commit() {
            return Err(RuleError::PiecesRemaining);
        }
        let origin = session.origin();
        self.apply(&Move::DeployComplete { origin })
    }

    /// Elect a remaining piece to stay at the origin.
    pub fn deploy_stay(&mut self, role: Role) -> Result<(), RuleError> {
        match self.state.deploy.as_mut() {
            Some(session) => session.mark_stay(role),
            None => Err(RuleError::NoDeploySession),
        }
    }

    /// Re-attach an already-moved piece to another moved piece or back to
    /// the remaining stack.
    pub fn recombine(&mut self, role: Role, target: Square) -> Result<(), RuleError> {
        match self.state.deploy.as_mut() {
            Some(session) => session.recombine(&self.table, role, target),
            None => Err(RuleError::NoDeploySession),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.state.deploy.is_none() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state.deploy.is_none() && self.history.can_redo()
    }

    /// Restore the state before the last committed move. Rejected while a
    /// deploy session is active; cancel it first.
    pub fn undo(&mut self) -> Result<(), RuleError> {
        if self.state.deploy.is_some() {
            return Err(RuleError::DeployInProgress);
        }
        match self.history.undo() {
            Some(snapshot) => {
                self.state = snapshot;
                Ok(())
            }
            None => Err(RuleError::NothingToUndo),
        }
    }

    /// Re-apply the last undone move.
    pub fn redo(&mut self) -> Result<(), RuleError> {
        if self.state.deploy.is_some() {
            return Err(RuleError::DeployInProgress);
        }
        match self.history.redo() {
            Some(snapshot) => {
                self.state = snapshot;
                Ok(())
            }
            None => Err(RuleError::NothingToRedo),
        }
    }

    /// Whether the side to move is in check.
    pub fn is_check(&self) -> bool {
        let Some(cmd) = self.state.commanders[self.state.turn.index()] else {
            return false;
        };
        movegen::is_attacked(
            &self.state.board,
            cmd,
            self.state.turn.opponent(),
            &self.table,
            &self.air,
        )
    }

    /// Checked side with no legal moves. Computed on demand, not cached.
    pub fn is_checkmate(&self) -> bool {
        self.state.winner.is_none() && self.is_check() && self.legal_moves().is_empty()
    }

    /// Unchecked side with no legal moves.
    pub fn is_stalemate(&self) -> bool {
        self.state.winner.is_none() && !self.is_check() && self.legal_moves().is_empty()
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
