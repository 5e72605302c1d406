//! WASM bindings for cotulenh-core.
//!
//! Provides a JavaScript-friendly API over one game instance. Expected
//! rule violations surface as rejected promises carrying the reason
//! string, never as panics.

use wasm_bindgen::prelude::*;

use crate::game::Game;
use crate::types::{Role, Square};

fn parse_square(text: &str) -> Result<Square, JsValue> {
    text.parse()
        .map_err(|_| JsValue::from_str(&format!("invalid square: {text}")))
}

fn parse_role(text: &str) -> Result<Role, JsValue> {
    text.chars()
        .next()
        .and_then(|ch| Role::from_char(ch.to_ascii_uppercase()))
        .ok_or_else(|| JsValue::from_str(&format!("invalid role: {text}")))
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// WASM-friendly wrapper around a [`Game`].
#[wasm_bindgen]
pub struct WasmGame {
    inner: Game,
}

#[wasm_bindgen]
impl WasmGame {
    /// Start a game from the opening setup.
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmGame {
        WasmGame { inner: Game::new() }
    }

    /// Load a serialized position.
    #[wasm_bindgen(js_name = fromFen)]
    pub fn from_fen(fen: &str) -> Result<WasmGame, JsValue> {
        Game::from_fen(fen)
            .map(|inner| WasmGame { inner })
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Serialize the current position, deploy session included.
    pub fn fen(&self) -> String {
        self.inner.fen()
    }

    /// Side to move as "r" or "b".
    pub fn turn(&self) -> String {
        self.inner.turn().to_code().to_string()
    }

    /// Winner as "r"/"b", or null while the game is ongoing.
    pub fn winner(&self) -> Option<String> {
        self.inner.winner().map(|c| c.to_code().to_string())
    }

    /// Legal moves grouped by origin square, annotated with their kind.
    #[wasm_bindgen(js_name = legalMoves)]
    pub fn legal_moves(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.moves_by_origin())
    }

    /// Legal moves out of one square.
    #[wasm_bindgen(js_name = movesFrom)]
    pub fn moves_from(&self, square: &str) -> Result<JsValue, JsValue> {
        let sq = parse_square(square)?;
        to_js(&self.inner.moves_from(sq))
    }

    /// Apply the legal move from one square acting on another.
    pub fn apply(&mut self, from: &str, to: &str) -> Result<(), JsValue> {
        let from = parse_square(from)?;
        let to = parse_square(to)?;
        let mv = self
            .inner
            .legal_moves()
            .into_iter()
            .find(|m| m.from() == from && m.target() == to)
            .ok_or_else(|| JsValue::from_str("move is not legal in this position"))?;
        self.inner
            .apply(&mv)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn undo(&mut self) -> Result<(), JsValue> {
        self.inner.undo().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn redo(&mut self) -> Result<(), JsValue> {
        self.inner.redo().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.inner.can_redo()
    }

    /// Open a deploy session over the stack at a square.
    #[wasm_bindgen(js_name = deployStart)]
    pub fn deploy_start(&mut self, origin: &str) -> Result<(), JsValue> {
        let sq = parse_square(origin)?;
        self.inner
            .deploy_start(sq)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Take one deploy step, identified by role letter and destination.
    #[wasm_bindgen(js_name = deployStep)]
    pub fn deploy_step(&mut self, role: &str, to: &str) -> Result<(), JsValue> {
        let role = parse_role(role)?;
        let to = parse_square(to)?;
        let mv = self
            .inner
            .legal_moves()
            .into_iter()
            .find(|m| match m {
                crate::types::Move::DeployStep { piece, to: dest, .. } => {
                    piece.role == role && *dest == to
                }
                _ => false,
            })
            .ok_or_else(|| JsValue::from_str("deploy step is not legal"))?;
        self.inner
            .apply(&mv)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = deployStay)]
    pub fn deploy_stay(&mut self, role: &str) -> Result<(), JsValue> {
        let role = parse_role(role)?;
        self.inner
            .deploy_stay(role)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = deployCommit)]
    pub fn deploy_commit(&mut self) -> Result<(), JsValue> {
        self.inner
            .deploy_commit()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = deployCancel)]
    pub fn deploy_cancel(&mut self) -> Result<(), JsValue> {
        self.inner
            .deploy_cancel()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Re-attach a moved piece to another moved piece or the origin.
    pub fn recombine(&mut self, role: &str, target: &str) -> Result<(), JsValue> {
        let role = parse_role(role)?;
        let target = parse_square(target)?;
        self.inner
            .recombine(role, target)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// The active deploy session as a plain snapshot, or null.
    #[wasm_bindgen(js_name = deploySnapshot)]
    pub fn deploy_snapshot(&self) -> Result<JsValue, JsValue> {
        match self.inner.deploy_snapshot() {
            Some(snap) => to_js(&snap),
            None => Ok(JsValue::NULL),
        }
    }

    /// Per-color air-defense squares plus their overlap.
    #[wasm_bindgen(js_name = airDefense)]
    pub fn air_defense(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.air_defense())
    }

    #[wasm_bindgen(js_name = isCheck)]
    pub fn is_check(&self) -> bool {
        self.inner.is_check()
    }

    #[wasm_bindgen(js_name = isCheckmate)]
    pub fn is_checkmate(&self) -> bool {
        self.inner.is_checkmate()
    }

    #[wasm_bindgen(js_name = isStalemate)]
    pub fn is_stalemate(&self) -> bool {
        self.inner.is_stalemate()
    }
}

impl Default for WasmGame {
    fn default() -> Self {
        Self::new()
    }
}
