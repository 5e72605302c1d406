//! Core value types: colors, roles, pieces, squares, stacks and moves.

use std::fmt;
use std::str::FromStr;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

/// Side identifier. Red serializes as uppercase piece letters.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Color {
    Red = 0,
    Blue = 1,
}

impl Color {
    /// Get the opposing side.
    #[inline]
    pub fn opponent(self) -> Color {
        match self {
            Color::Red => Color::Blue,
            Color::Blue => Color::Red,
        }
    }

    pub const fn to_code(self) -> char {
        match self {
            Color::Red => 'r',
            Color::Blue => 'b',
        }
    }

    pub const fn from_code(code: char) -> Option<Color> {
        match code {
            'r' => Some(Color::Red),
            'b' => Some(Color::Blue),
            _ => None,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// The eleven piece roles.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    Commander = 0,
    Infantry = 1,
    Tank = 2,
    Militia = 3,
    Engineer = 4,
    Artillery = 5,
    AntiAir = 6,
    Missile = 7,
    AirForce = 8,
    Navy = 9,
    Headquarter = 10,
}

impl Role {
    pub const ALL: [Role; 11] = [
        Role::Commander,
        Role::Infantry,
        Role::Tank,
        Role::Militia,
        Role::Engineer,
        Role::Artillery,
        Role::AntiAir,
        Role::Missile,
        Role::AirForce,
        Role::Navy,
        Role::Headquarter,
    ];

    /// Distinct power-of-two flag used by the stack combination engine.
    #[inline]
    pub const fn flag(self) -> u16 {
        1 << (self as u8)
    }

    /// Recover a role from its flag. Returns None unless exactly one known
    /// bit is set.
    pub fn from_flag(flag: u16) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.flag() == flag)
    }

    /// Uppercase serialization letter.
    pub const fn to_char(self) -> char {
        match self {
            Role::Commander => 'C',
            Role::Infantry => 'I',
            Role::Tank => 'T',
            Role::Militia => 'M',
            Role::Engineer => 'E',
            Role::Artillery => 'A',
            Role::AntiAir => 'G',
            Role::Missile => 'S',
            Role::AirForce => 'F',
            Role::Navy => 'N',
            Role::Headquarter => 'H',
        }
    }

    /// Parse an uppercase serialization letter.
    pub const fn from_char(ch: char) -> Option<Role> {
        match ch {
            'C' => Some(Role::Commander),
            'I' => Some(Role::Infantry),
            'T' => Some(Role::Tank),
            'M' => Some(Role::Militia),
            'E' => Some(Role::Engineer),
            'A' => Some(Role::Artillery),
            'G' => Some(Role::AntiAir),
            'S' => Some(Role::Missile),
            'F' => Some(Role::AirForce),
            'N' => Some(Role::Navy),
            'H' => Some(Role::Headquarter),
            _ => None,
        }
    }

    /// Heavy land units cross the river only on bridges.
    #[inline]
    pub const fn is_heavy(self) -> bool {
        matches!(
            self,
            Role::Tank | Role::Artillery | Role::AntiAir | Role::Missile
        )
    }
}

/// Number of playable files (a..k).
pub const FILES: u8 = 11;
/// Number of playable ranks (1..12).
pub const RANKS: u8 = 12;
/// Mailbox stride: squares are indexed into a 16x16 addressing space.
pub const STRIDE: u8 = 16;
/// Total size of the addressing space.
pub const SQUARE_SPACE: usize = 256;

/// Square index into the 16x16 addressing space (`rank * 16 + file`).
///
/// Only files 0..11 and ranks 0..12 are playable; the rest is a guard band
/// that absorbs off-board arithmetic.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct Square(pub u8);

impl Square {
    #[inline]
    pub const fn new(file: u8, rank: u8) -> Square {
        Square(rank * STRIDE + file)
    }

    #[inline]
    pub const fn file(self) -> u8 {
        self.0 % STRIDE
    }

    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 / STRIDE
    }

    /// True for the 11x12 playable subgrid.
    #[inline]
    pub const fn is_playable(self) -> bool {
        self.file() < FILES && self.rank() < RANKS
    }

    /// Offset by a file/rank delta. Returns None when the result leaves the
    /// addressing space or the playable subgrid.
    pub fn offset(self, df: i8, dr: i8) -> Option<Square> {
        let file = self.file() as i16 + df as i16;
        let rank = self.rank() as i16 + dr as i16;
        if file < 0 || file >= FILES as i16 || rank < 0 || rank >= RANKS as i16 {
            return None;
        }
        Some(Square::new(file as u8, rank as u8))
    }

    /// Iterate over all playable squares.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..RANKS).flat_map(|rank| (0..FILES).map(move |file| Square::new(file, rank)))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file()) as char,
            self.rank() as u16 + 1
        )
    }
}

/// Error for malformed algebraic square notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseSquareError;

impl fmt::Display for ParseSquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid square notation")
    }
}

impl std::error::Error for ParseSquareError {}

impl FromStr for Square {
    type Err = ParseSquareError;

    fn from_str(s: &str) -> Result<Square, ParseSquareError> {
        let mut chars = s.chars();
        let file_ch = chars.next().ok_or(ParseSquareError)?;
        if !file_ch.is_ascii_lowercase() {
            return Err(ParseSquareError);
        }
        let file = file_ch as u8 - b'a';
        let rank: u16 = chars.as_str().parse().map_err(|_| ParseSquareError)?;
        if file >= FILES || rank == 0 || rank > RANKS as u16 {
            return Err(ParseSquareError);
        }
        Ok(Square::new(file, rank as u8 - 1))
    }
}

impl Serialize for Square {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Square {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Square, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single piece: color, role and heroic promotion flag.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub role: Role,
    pub heroic: bool,
}

impl Piece {
    #[inline]
    pub const fn new(color: Color, role: Role) -> Piece {
        Piece {
            color,
            role,
            heroic: false,
        }
    }
}

/// Maximum number of carried pieces under one carrier.
pub const MAX_CARRIED: usize = 3;

/// One square's occupant: a carrier plus up to three carried pieces.
///
/// A lone piece is a stack with an empty carried list. The carrier
/// determines the stack's movement profile and its rules-facing heroic
/// status; a role appears at most once per stack.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Stack {
    carrier: Piece,
    carried: ArrayVec<Piece, MAX_CARRIED>,
}

impl Stack {
    pub fn single(piece: Piece) -> Stack {
        Stack {
            carrier: piece,
            carried: ArrayVec::new(),
        }
    }

    pub fn with_carried(carrier: Piece, carried: ArrayVec<Piece, MAX_CARRIED>) -> Stack {
        Stack { carrier, carried }
    }

    #[inline]
    pub fn carrier(&self) -> Piece {
        self.carrier
    }

    #[inline]
    pub fn carried(&self) -> &[Piece] {
        &self.carried
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.carrier.color
    }

    /// Heroic status exposed to the rules: the carrier's flag.
    #[inline]
    pub fn heroic(&self) -> bool {
        self.carrier.heroic
    }

    pub fn promote(&mut self) {
        self.carrier.heroic = true;
    }

    #[inline]
    pub fn is_stack(&self) -> bool {
        !self.carried.is_empty()
    }

    /// Member count, carrier included. Never zero.
    #[inline]
    pub fn len(&self) -> usize {
        1 + self.carried.len()
    }

    /// All member pieces, carrier first.
    pub fn flatten(&self) -> ArrayVec<Piece, 4> {
        let mut out = ArrayVec::new();
        out.push(self.carrier);
        for p in &self.carried {
            out.push(*p);
        }
        out
    }

    /// Bitwise OR of all member role flags.
    pub fn role_mask(&self) -> u16 {
        self.flatten().iter().fold(0, |m, p| m | p.role.flag())
    }

    pub fn contains_role(&self, role: Role) -> bool {
        self.flatten().iter().any(|p| p.role == role)
    }

    pub fn find_role(&self, role: Role) -> Option<Piece> {
        self.flatten().into_iter().find(|p| p.role == role)
    }
}

/// Discriminant of a [`Move`], used to annotate the move-query surface.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Normal,
    Capture,
    StayCapture,
    SuicideCapture,
    Combine,
    DeployStep,
    DeployComplete,
}

/// A move, as a tagged sum carrying only the fields relevant to its kind.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Move {
    /// Relocation onto an empty square.
    Normal { from: Square, to: Square, piece: Piece },
    /// Relocation onto an enemy-held square, removing its occupant.
    Capture {
        from: Square,
        to: Square,
        piece: Piece,
        captured: Stack,
    },
    /// Long-range capture; the attacker does not relocate.
    StayCapture {
        from: Square,
        target: Square,
        piece: Piece,
        captured: Stack,
    },
    /// Capture inside enemy air defense; both sides are removed.
    SuicideCapture {
        from: Square,
        target: Square,
        piece: Piece,
        captured: Stack,
    },
    /// Relocation onto a friendly square, merging into one stack.
    Combine {
        from: Square,
        to: Square,
        piece: Piece,
        combined: Stack,
    },
    /// One piece leaves the deploying stack during an active session.
    DeployStep {
        origin: Square,
        to: Square,
        piece: Piece,
        captured: Option<Stack>,
        suicide: bool,
    },
    /// Commits the active deploy session and passes the turn.
    DeployComplete { origin: Square },
}

impl Move {
    /// Origin square of the acting piece.
    pub fn from(&self) -> Square {
        match self {
            Move::Normal { from, .. }
            | Move::Capture { from, .. }
            | Move::StayCapture { from, .. }
            | Move::SuicideCapture { from, .. }
            | Move::Combine { from, .. } => *from,
            Move::DeployStep { origin, .. } | Move::DeployComplete { origin } => *origin,
        }
    }

    /// Square the move acts on: destination or capture target.
    pub fn target(&self) -> Square {
        match self {
            Move::Normal { to, .. } | Move::Capture { to, .. } | Move::Combine { to, .. } => *to,
            Move::StayCapture { target, .. } | Move::SuicideCapture { target, .. } => *target,
            Move::DeployStep { to, .. } => *to,
            Move::DeployComplete { origin } => *origin,
        }
    }

    pub fn kind(&self) -> MoveKind {
        match self {
            Move::Normal { .. } => MoveKind::Normal,
            Move::Capture { .. } => MoveKind::Capture,
            Move::StayCapture { .. } => MoveKind::StayCapture,
            Move::SuicideCapture { .. } => MoveKind::SuicideCapture,
            Move::Combine { .. } => MoveKind::Combine,
            Move::DeployStep { .. } => MoveKind::DeployStep,
            Move::DeployComplete { .. } => MoveKind::DeployComplete,
        }
    }

    /// The stack removed from the board by this move, if any.
    pub fn captured(&self) -> Option<&Stack> {
        match self {
            Move::Capture { captured, .. }
            | Move::StayCapture { captured, .. }
            | Move::SuicideCapture { captured, .. } => Some(captured),
            Move::DeployStep { captured, .. } => captured.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_opponent() {
        assert_eq!(Color::Red.opponent(), Color::Blue);
        assert_eq!(Color::Blue.opponent(), Color::Red);
    }

    #[test]
    fn test_role_flags_distinct() {
        for a in Role::ALL {
            for b in Role::ALL {
                if a != b {
                    assert_ne!(a.flag(), b.flag());
                }
            }
            assert_eq!(Role::from_flag(a.flag()), Some(a));
        }
    }

    #[test]
    fn test_role_char_roundtrip() {
        for role in Role::ALL {
            assert_eq!(Role::from_char(role.to_char()), Some(role));
        }
        assert_eq!(Role::from_char('X'), None);
    }

    #[test]
    fn test_square_file_rank() {
        let sq = Square::new(4, 6);
        assert_eq!(sq.file(), 4);
        assert_eq!(sq.rank(), 6);
        assert!(sq.is_playable());
    }

    #[test]
    fn test_square_guard_band() {
        assert!(!Square::new(11, 0).is_playable());
        assert!(!Square::new(0, 12).is_playable());
        assert!(Square::new(10, 11).is_playable());
    }

    #[test]
    fn test_square_display_parse() {
        for sq in Square::all() {
            let text = sq.to_string();
            assert_eq!(text.parse::<Square>(), Ok(sq));
        }
        assert!("l1".parse::<Square>().is_err());
        assert!("a0".parse::<Square>().is_err());
        assert!("a13".parse::<Square>().is_err());
        assert!("".parse::<Square>().is_err());
    }

    #[test]
    fn test_square_offset_stays_on_board() {
        let sq = Square::new(0, 0);
        assert_eq!(sq.offset(-1, 0), None);
        assert_eq!(sq.offset(0, -1), None);
        assert_eq!(sq.offset(1, 1), Some(Square::new(1, 1)));
        let edge = Square::new(10, 11);
        assert_eq!(edge.offset(1, 0), None);
        assert_eq!(edge.offset(0, 1), None);
    }

    #[test]
    fn test_stack_flatten_and_mask() {
        let tank = Piece::new(Color::Red, Role::Tank);
        let inf = Piece::new(Color::Red, Role::Infantry);
        let mut carried = ArrayVec::new();
        carried.push(inf);
        let stack = Stack::with_carried(tank, carried);

        assert_eq!(stack.len(), 2);
        assert!(stack.is_stack());
        assert_eq!(stack.role_mask(), Role::Tank.flag() | Role::Infantry.flag());
        assert!(stack.contains_role(Role::Infantry));
        assert!(!stack.contains_role(Role::Navy));
    }

    #[test]
    fn test_move_accessors() {
        let piece = Piece::new(Color::Red, Role::Artillery);
        let victim = Stack::single(Piece::new(Color::Blue, Role::Infantry));
        let mv = Move::StayCapture {
            from: Square::new(3, 0),
            target: Square::new(3, 3),
            piece,
            captured: victim.clone(),
        };
        assert_eq!(mv.from(), Square::new(3, 0));
        assert_eq!(mv.target(), Square::new(3, 3));
        assert_eq!(mv.kind(), MoveKind::StayCapture);
        assert_eq!(mv.captured(), Some(&victim));
    }
}
