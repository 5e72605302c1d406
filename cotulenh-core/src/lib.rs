//! Commander-chess rules engine.
//!
//! The game is played on an 11-file x 12-rank grid with terrain (land,
//! water, river, bridges), stackable carrier pieces, multi-step deploy
//! moves and zone-based air-defense interactions. This crate owns the
//! rules: legal move generation, apply/undo, check and mate detection,
//! and the deploy session state machine. Rendering, persistence and
//! networking are left to embedding applications, which consume four
//! surfaces: the serialized position string, legal moves grouped by
//! origin, check/deploy status flags, and per-color air-defense zones.
//!
//! # Square addressing
//!
//! Squares index a 16x16 mailbox (`rank * 16 + file`); only the 11x12
//! subgrid is playable. The four guard files and ranks absorb off-board
//! ray arithmetic and let air-defense circles slide as plain bit shifts.
//!
//! # Stack encoding
//!
//! A stack's role set is a bitwise OR of power-of-two role flags; a
//! precomputed table maps each legal mask to a packed 64-bit state with
//! the carrier flag in the low 16 bits and carried slots above it. See
//! [`combine::CombineTable`].

pub mod airdefense;
pub mod board;
pub mod combine;
pub mod deploy;
pub mod fen;
pub mod game;
pub mod history;
pub mod movegen;
pub mod types;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use airdefense::{AirDefenseTable, Mask256, ZoneSets, Zones};
pub use board::{can_occupy, terrain, Board, Terrain};
pub use combine::CombineTable;
pub use deploy::{DeployPhase, DeploySession, DeploySnapshot};
pub use fen::{FenError, START_POSITION};
pub use game::{Game, GameState, RuleError};
pub use history::{History, HistoryEntry};
pub use types::{Color, Move, MoveKind, Piece, Role, Square, Stack};
