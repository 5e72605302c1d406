//! Mailbox board with terrain and per-color occupancy tracking.

use serde::{Deserialize, Serialize};

use crate::types::{Color, Role, Square, Stack, FILES, RANKS, SQUARE_SPACE};

/// Static terrain classification of a square.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Land,
    Water,
    River,
    Bridge,
}

/// Files a and b are the coastal sea.
const WATER_FILES: u8 = 2;
/// The river spans these two ranks on land files.
const RIVER_RANKS: [u8; 2] = [5, 6];
/// Bridge files crossing the river (d and h).
const BRIDGE_FILES: [u8; 2] = [3, 7];

/// Terrain of a playable square. Off-grid squares are land by convention;
/// they are never entered because playability is checked first.
pub const fn terrain(sq: Square) -> Terrain {
    let file = sq.file();
    let rank = sq.rank();
    if file < WATER_FILES {
        return Terrain::Water;
    }
    if rank == RIVER_RANKS[0] || rank == RIVER_RANKS[1] {
        if file == BRIDGE_FILES[0] || file == BRIDGE_FILES[1] {
            return Terrain::Bridge;
        }
        return Terrain::River;
    }
    Terrain::Land
}

/// Whether a role may occupy a square, given its terrain affinity.
///
/// Navy moves only on water; AirForce ignores terrain; heavy land units
/// cannot stand on river squares, which makes bridges their only crossing.
pub fn can_occupy(role: Role, sq: Square) -> bool {
    if !sq.is_playable() {
        return false;
    }
    match role {
        Role::AirForce => true,
        Role::Navy => terrain(sq) == Terrain::Water,
        _ => match terrain(sq) {
            Terrain::Water => false,
            Terrain::River => !role.is_heavy(),
            Terrain::Land | Terrain::Bridge => true,
        },
    }
}

/// Mailbox array of optional stacks plus derived per-color occupancy lists.
#[derive(Clone, Debug)]
pub struct Board {
    cells: Vec<Option<Stack>>,
    occupied: [Vec<Square>; 2],
}

impl Board {
    pub fn empty() -> Board {
        Board {
            cells: vec![None; SQUARE_SPACE],
            occupied: [Vec::new(), Vec::new()],
        }
    }

    #[inline]
    pub fn get(&self, sq: Square) -> Option<&Stack> {
        self.cells[sq.0 as usize].as_ref()
    }

    /// Mutable access for in-place promotion; occupancy is unaffected
    /// because the occupant's color cannot change through this.
    #[inline]
    pub fn get_mut(&mut self, sq: Square) -> Option<&mut Stack> {
        self.cells[sq.0 as usize].as_mut()
    }

    /// Place a stack, replacing whatever was there.
    pub fn put(&mut self, sq: Square, stack: Stack) {
        debug_assert!(sq.is_playable());
        let color = stack.color();
        if let Some(old) = self.cells[sq.0 as usize].take() {
            self.drop_occupancy(old.color(), sq);
        }
        self.cells[sq.0 as usize] = Some(stack);
        self.occupied[color.index()].push(sq);
    }

    /// Remove and return the stack at a square.
    pub fn take(&mut self, sq: Square) -> Option<Stack> {
        let stack = self.cells[sq.0 as usize].take()?;
        self.drop_occupancy(stack.color(), sq);
        Some(stack)
    }

    pub fn clear(&mut self, sq: Square) {
        self.take(sq);
    }

    fn drop_occupancy(&mut self, color: Color, sq: Square) {
        let list = &mut self.occupied[color.index()];
        if let Some(idx) = list.iter().position(|&s| s == sq) {
            list.swap_remove(idx);
        }
    }

    /// Squares occupied by one color, in no particular order.
    #[inline]
    pub fn occupied(&self, color: Color) -> &[Square] {
        &self.occupied[color.index()]
    }

    /// Iterate over all occupied squares of both colors.
    pub fn iter(&self) -> impl Iterator<Item = (Square, &Stack)> {
        Square::all().filter_map(move |sq| self.get(sq).map(|s| (sq, s)))
    }

    /// Locate the square whose stack contains the given color's commander.
    pub fn find_commander(&self, color: Color) -> Option<Square> {
        self.occupied(color)
            .iter()
            .copied()
            .find(|&sq| match self.get(sq) {
                Some(stack) => stack.contains_role(Role::Commander),
                None => false,
            })
    }
}

/// Boards are equal when their cells are; occupancy order is irrelevant.
impl PartialEq for Board {
    fn eq(&self, other: &Board) -> bool {
        self.cells == other.cells
    }
}

impl Eq for Board {}

/// Number of playable squares, for sanity checks.
pub const PLAYABLE_SQUARES: usize = FILES as usize * RANKS as usize;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Piece;

    #[test]
    fn test_terrain_layout() {
        // Sea columns.
        assert_eq!(terrain(Square::new(0, 0)), Terrain::Water);
        assert_eq!(terrain(Square::new(1, 11)), Terrain::Water);
        // River spans ranks 6-7 on land files.
        assert_eq!(terrain(Square::new(2, 5)), Terrain::River);
        assert_eq!(terrain(Square::new(10, 6)), Terrain::River);
        // Bridges at d and h.
        assert_eq!(terrain(Square::new(3, 5)), Terrain::Bridge);
        assert_eq!(terrain(Square::new(7, 6)), Terrain::Bridge);
        // Everything else is land.
        assert_eq!(terrain(Square::new(5, 0)), Terrain::Land);
        assert_eq!(terrain(Square::new(10, 11)), Terrain::Land);
    }

    #[test]
    fn test_can_occupy_affinities() {
        let water = Square::new(0, 4);
        let land = Square::new(5, 2);
        let river = Square::new(5, 5);
        let bridge = Square::new(3, 5);

        assert!(can_occupy(Role::Navy, water));
        assert!(!can_occupy(Role::Navy, land));

        assert!(can_occupy(Role::AirForce, water));
        assert!(can_occupy(Role::AirForce, river));

        assert!(can_occupy(Role::Infantry, land));
        assert!(can_occupy(Role::Infantry, river));
        assert!(!can_occupy(Role::Infantry, water));

        // Heavy units cross only on bridges.
        assert!(!can_occupy(Role::Tank, river));
        assert!(can_occupy(Role::Tank, bridge));
        assert!(!can_occupy(Role::Artillery, river));
        assert!(!can_occupy(Role::Missile, river));
    }

    #[test]
    fn test_put_take_occupancy() {
        let mut board = Board::empty();
        let sq = Square::new(4, 4);
        board.put(sq, Stack::single(Piece::new(Color::Red, Role::Tank)));

        assert_eq!(board.occupied(Color::Red), &[sq]);
        assert!(board.occupied(Color::Blue).is_empty());
        assert!(board.get(sq).is_some());

        let taken = board.take(sq).unwrap();
        assert_eq!(taken.carrier().role, Role::Tank);
        assert!(board.occupied(Color::Red).is_empty());
        assert!(board.get(sq).is_none());
    }

    #[test]
    fn test_put_replaces_enemy_occupancy() {
        let mut board = Board::empty();
        let sq = Square::new(6, 6);
        board.put(sq, Stack::single(Piece::new(Color::Blue, Role::Infantry)));
        board.put(sq, Stack::single(Piece::new(Color::Red, Role::Tank)));

        assert!(board.occupied(Color::Blue).is_empty());
        assert_eq!(board.occupied(Color::Red), &[sq]);
    }

    #[test]
    fn test_find_commander_inside_stack() {
        let mut board = Board::empty();
        let sq = Square::new(1, 3);
        let navy = Piece::new(Color::Red, Role::Navy);
        let commander = Piece::new(Color::Red, Role::Commander);
        let mut carried = arrayvec::ArrayVec::new();
        carried.push(commander);
        board.put(sq, Stack::with_carried(navy, carried));

        assert_eq!(board.find_commander(Color::Red), Some(sq));
        assert_eq!(board.find_commander(Color::Blue), None);
    }
}
