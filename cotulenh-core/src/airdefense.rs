//! Air-defense influence calculator.
//!
//! For each supported radius a circular bitmask over the 256-square
//! addressing space is precomputed once around a fixed reference square.
//! Projecting a circle onto an Anti-Air piece's square slides the mask by
//! the index delta (rank delta x 16 + file delta) and intersects it with
//! the playable-board mask, which discards any bit that slid off the grid
//! or wrapped into the guard files.

use serde::Serialize;

use crate::board::Board;
use crate::types::{Color, Role, Square, SQUARE_SPACE};

const WORDS: usize = SQUARE_SPACE / 64;

/// Bitset over the 16x16 square addressing space.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Mask256 {
    words: [u64; WORDS],
}

impl Mask256 {
    pub const EMPTY: Mask256 = Mask256 { words: [0; WORDS] };

    #[inline]
    pub fn set(&mut self, sq: Square) {
        let i = sq.0 as usize;
        self.words[i >> 6] |= 1u64 << (i & 63);
    }

    #[inline]
    pub fn get(&self, sq: Square) -> bool {
        let i = sq.0 as usize;
        (self.words[i >> 6] >> (i & 63)) & 1 == 1
    }

    pub fn union(&mut self, other: &Mask256) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= o;
        }
    }

    pub fn intersect(&mut self, other: &Mask256) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w &= o;
        }
    }

    pub fn intersection(mut self, other: &Mask256) -> Mask256 {
        self.intersect(other);
        self
    }

    pub fn is_clear(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Slide every set bit by a signed index offset; bits leaving the
    /// addressing space are dropped.
    pub fn shifted(&self, offset: i32) -> Mask256 {
        let mut out = Mask256::EMPTY;
        for i in 0..SQUARE_SPACE {
            if (self.words[i >> 6] >> (i & 63)) & 1 == 1 {
                let j = i as i32 + offset;
                if (0..SQUARE_SPACE as i32).contains(&j) {
                    out.words[(j as usize) >> 6] |= 1u64 << (j as usize & 63);
                }
            }
        }
        out
    }

    /// Set squares in index order.
    pub fn squares(&self) -> Vec<Square> {
        (0..SQUARE_SPACE as u16)
            .map(|i| Square(i as u8))
            .filter(|&sq| self.get(sq))
            .collect()
    }
}

/// Smallest supported projection radius.
pub const MIN_RADIUS: u8 = 1;
/// Largest supported projection radius.
pub const MAX_RADIUS: u8 = 3;

/// Reference square the circles are precomputed around. Central enough
/// that a radius-3 disc never leaves the addressing space.
const REFERENCE: Square = Square::new(5, 6);

/// Precomputed circle masks plus the playable-board mask.
///
/// Construction is explicit and owned by engine startup; there is no
/// self-initializing global. Querying a radius that was never precomputed
/// panics with a descriptive message so configuration bugs surface early.
#[derive(Clone, Debug)]
pub struct AirDefenseTable {
    circles: [Option<Mask256>; (MAX_RADIUS + 1) as usize],
    playable: Mask256,
}

impl AirDefenseTable {
    pub fn new() -> AirDefenseTable {
        let mut playable = Mask256::EMPTY;
        for sq in Square::all() {
            playable.set(sq);
        }
        let mut circles = [None; (MAX_RADIUS + 1) as usize];
        for radius in MIN_RADIUS..=MAX_RADIUS {
            let mut mask = Mask256::EMPTY;
            let r = radius as i32;
            for df in -r..=r {
                for dr in -r..=r {
                    if df * df + dr * dr > r * r {
                        continue;
                    }
                    let file = REFERENCE.file() as i32 + df;
                    let rank = REFERENCE.rank() as i32 + dr;
                    debug_assert!((0..16).contains(&file) && (0..16).contains(&rank));
                    mask.set(Square::new(file as u8, rank as u8));
                }
            }
            circles[radius as usize] = Some(mask);
        }
        AirDefenseTable { circles, playable }
    }

    /// The precomputed circle for a radius.
    ///
    /// # Panics
    ///
    /// Panics when the radius was never precomputed. Silently answering
    /// with an empty mask would hide configuration bugs.
    pub fn circle(&self, radius: u8) -> &Mask256 {
        self.circles
            .get(radius as usize)
            .and_then(|c| c.as_ref())
            .unwrap_or_else(|| {
                panic!("air-defense circle of radius {radius} was never precomputed")
            })
    }

    /// Project the radius-r circle onto a concrete square.
    pub fn project(&self, radius: u8, sq: Square) -> Mask256 {
        let offset = sq.0 as i32 - REFERENCE.0 as i32;
        self.circle(radius).shifted(offset).intersection(&self.playable)
    }

    /// Influence radius of an Anti-Air carrier.
    fn radius_of(heroic: bool) -> u8 {
        if heroic {
            2
        } else {
            1
        }
    }

    /// Union of all projected circles for one color's Anti-Air pieces.
    pub fn influence(&self, board: &Board, color: Color) -> Mask256 {
        let mut zone = Mask256::EMPTY;
        for &sq in board.occupied(color) {
            let Some(stack) = board.get(sq) else { continue };
            if stack.carrier().role == Role::AntiAir {
                zone.union(&self.project(Self::radius_of(stack.heroic()), sq));
            }
        }
        zone
    }

    /// Both colors' zones and their overlap, for UI highlighting and the
    /// flying-capture legality check.
    pub fn zones(&self, board: &Board) -> Zones {
        let red = self.influence(board, Color::Red);
        let blue = self.influence(board, Color::Blue);
        let overlap = red.intersection(&blue);
        Zones { red, blue, overlap }
    }
}

impl Default for AirDefenseTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-color influence masks plus their overlap.
#[derive(Clone, Copy, Debug)]
pub struct Zones {
    pub red: Mask256,
    pub blue: Mask256,
    pub overlap: Mask256,
}

impl Zones {
    pub fn of(&self, color: Color) -> &Mask256 {
        match color {
            Color::Red => &self.red,
            Color::Blue => &self.blue,
        }
    }

    pub fn snapshot(&self) -> ZoneSets {
        ZoneSets {
            red: self.red.squares(),
            blue: self.blue.squares(),
            overlap: self.overlap.squares(),
        }
    }
}

/// Serializable square lists for the air-defense query surface.
#[derive(Clone, Debug, Serialize)]
pub struct ZoneSets {
    pub red: Vec<Square>,
    pub blue: Vec<Square>,
    pub overlap: Vec<Square>,
}
