//! Stack combination engine.
//!
//! Decides which role sets may legally form a single square's occupant and
//! reconstructs carrier/carried structure from a validated set.
//!
//! # Packed state encoding (64-bit)
//!
//! ```text
//! Bits 0-15:  carrier role flag
//! Bits 16-31: slot 0 carried role flag (0 = empty)
//! Bits 32-47: slot 1 carried role flag
//! Bits 48-63: slot 2 carried role flag
//! ```
//!
//! The table maps every legal role mask (bitwise OR of member flags) to one
//! packed state. It is generated once from the carrier blueprint below;
//! generation order doubles as carrier priority because duplicate masks
//! keep the first-generated state.

use std::collections::HashMap;

use arrayvec::ArrayVec;
use tracing::warn;

use crate::types::{Piece, Role, Stack, MAX_CARRIED};

/// Allowed roles per slot, per carrier, in carrier-priority order.
const BLUEPRINT: [(Role, [&[Role]; MAX_CARRIED]); 3] = [
    (
        Role::Navy,
        [
            &[Role::AirForce],
            &[Role::Tank],
            &[Role::Commander, Role::Infantry, Role::Militia, Role::Engineer],
        ],
    ),
    (
        Role::AirForce,
        [
            &[Role::Tank],
            &[Role::Commander, Role::Infantry, Role::Militia, Role::Engineer],
            &[],
        ],
    ),
    (
        Role::Tank,
        [
            &[Role::Commander, Role::Infantry, Role::Militia, Role::Engineer],
            &[],
            &[],
        ],
    ),
];

const SLOT_SHIFTS: [u32; MAX_CARRIED] = [16, 32, 48];

/// Precomputed role-mask table. Built once at engine startup.
#[derive(Debug, Clone)]
pub struct CombineTable {
    states: HashMap<u16, u64>,
}

impl CombineTable {
    pub fn new() -> CombineTable {
        let mut states = HashMap::new();
        // Every role may exist alone; single-piece masks satisfy
        // `state == flag`.
        for role in Role::ALL {
            states.insert(role.flag(), role.flag() as u64);
        }
        for (carrier, slots) in BLUEPRINT {
            let mut slot_flags = [0u16; MAX_CARRIED];
            Self::enumerate(&mut states, carrier, &slots, 0, carrier.flag(), &mut slot_flags);
        }
        CombineTable { states }
    }

    /// Bounded backtracking over a carrier's slots: leave the slot empty,
    /// then try each allowed role not already used. Depth is at most
    /// `MAX_CARRIED`.
    fn enumerate(
        states: &mut HashMap<u16, u64>,
        carrier: Role,
        slots: &[&[Role]; MAX_CARRIED],
        slot: usize,
        used: u16,
        slot_flags: &mut [u16; MAX_CARRIED],
    ) {
        if slot == MAX_CARRIED {
            if used != carrier.flag() {
                let mut state = carrier.flag() as u64;
                for (i, &flag) in slot_flags.iter().enumerate() {
                    state |= (flag as u64) << SLOT_SHIFTS[i];
                }
                states.entry(used).or_insert(state);
            }
            return;
        }
        slot_flags[slot] = 0;
        Self::enumerate(states, carrier, slots, slot + 1, used, slot_flags);
        for &role in slots[slot] {
            if used & role.flag() == 0 {
                slot_flags[slot] = role.flag();
                Self::enumerate(states, carrier, slots, slot + 1, used | role.flag(), slot_flags);
                slot_flags[slot] = 0;
            }
        }
    }

    /// Whether a role mask identifies a legal stack shape.
    pub fn is_valid_mask(&self, mask: u16) -> bool {
        self.states.contains_key(&mask)
    }

    /// Number of distinct legal shapes, for diagnostics.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Try to merge the given occupants into a single stack.
    ///
    /// Inputs are flattened first, so already-stacked operands are legal.
    /// Returns `None` when the combined role set has no table entry, when a
    /// role repeats, or when colors differ — the caller decides whether
    /// that is an illegal move attempt or a no-op.
    pub fn combine(&self, inputs: &[&Stack]) -> Option<Stack> {
        let mut pieces: ArrayVec<Piece, 8> = ArrayVec::new();
        for stack in inputs {
            for piece in stack.flatten() {
                if pieces.try_push(piece).is_err() {
                    return None;
                }
            }
        }
        if pieces.is_empty() || pieces.len() > 1 + MAX_CARRIED {
            return None;
        }
        let color = pieces[0].color;
        if pieces.iter().any(|p| p.color != color) {
            return None;
        }
        let mask = pieces.iter().fold(0u16, |m, p| m | p.role.flag());
        if mask.count_ones() as usize != pieces.len() {
            return None;
        }
        let state = *self.states.get(&mask)?;
        Some(self.assemble(state, &pieces))
    }

    /// Remove one role from a stack.
    ///
    /// Returns `(remainder, removed piece)`. A lone piece returns
    /// `(None, piece)` on a role match and is otherwise unchanged. A true
    /// stack is flattened, the role dropped, and the remainder re-validated
    /// through the table; a single survivor is unwrapped. If the remainder
    /// shape is absent from the table the first remaining piece is promoted
    /// to carrier so nothing is silently dropped.
    pub fn remove(&self, stack: &Stack, role: Role) -> (Option<Stack>, Option<Piece>) {
        if !stack.is_stack() {
            if stack.carrier().role == role {
                return (None, Some(stack.carrier()));
            }
            return (Some(stack.clone()), None);
        }
        let mut removed = None;
        let mut rest: ArrayVec<Piece, 4> = ArrayVec::new();
        for piece in stack.flatten() {
            if removed.is_none() && piece.role == role {
                removed = Some(piece);
            } else {
                rest.push(piece);
            }
        }
        if removed.is_none() {
            return (Some(stack.clone()), None);
        }
        if rest.len() == 1 {
            return (Some(Stack::single(rest[0])), removed);
        }
        let mask = rest.iter().fold(0u16, |m, p| m | p.role.flag());
        let remainder = match self.states.get(&mask) {
            Some(&state) => self.assemble(state, &rest),
            None => {
                warn!(mask, "stack remainder has no blueprint shape, promoting first piece");
                Self::promote_first(&rest)
            }
        };
        (Some(remainder), removed)
    }

    /// Decode a packed state against concrete pieces, matching by role.
    ///
    /// A decoded flag referencing an absent role is an internal
    /// inconsistency: it is logged and answered with the promote-first
    /// fallback rather than corrupting the caller's state.
    fn assemble(&self, state: u64, pieces: &[Piece]) -> Stack {
        let find = |flag: u16| pieces.iter().copied().find(|p| p.role.flag() == flag);
        let carrier_flag = (state & 0xFFFF) as u16;
        let Some(carrier) = find(carrier_flag) else {
            warn!(state, "decoded carrier flag absent from supplied pieces");
            return Self::promote_first(pieces);
        };
        let mut carried: ArrayVec<Piece, MAX_CARRIED> = ArrayVec::new();
        for shift in SLOT_SHIFTS {
            let flag = ((state >> shift) & 0xFFFF) as u16;
            if flag == 0 {
                continue;
            }
            match find(flag) {
                Some(piece) => carried.push(piece),
                None => {
                    warn!(state, flag, "decoded slot flag absent from supplied pieces");
                    return Self::promote_first(pieces);
                }
            }
        }
        Stack::with_carried(carrier, carried)
    }

    fn promote_first(pieces: &[Piece]) -> Stack {
        let mut carried: ArrayVec<Piece, MAX_CARRIED> = ArrayVec::new();
        for &piece in &pieces[1..] {
            carried.push(piece);
        }
        Stack::with_carried(pieces[0], carried)
    }
}

impl Default for CombineTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    fn single(role: Role) -> Stack {
        Stack::single(Piece::new(Color::Red, role))
    }

    #[test]
    fn test_singles_are_their_own_flag() {
        let table = CombineTable::new();
        for role in Role::ALL {
            assert!(table.is_valid_mask(role.flag()));
        }
    }

    #[test]
    fn test_infantry_onto_tank_yields_tank_carrier() {
        let table = CombineTable::new();
        let combined = table
            .combine(&[&single(Role::Infantry), &single(Role::Tank)])
            .unwrap();
        assert_eq!(combined.carrier().role, Role::Tank);
        assert_eq!(combined.carried().len(), 1);
        assert_eq!(combined.carried()[0].role, Role::Infantry);
    }

    #[test]
    fn test_combine_is_commutative() {
        let table = CombineTable::new();
        let a = table
            .combine(&[&single(Role::Infantry), &single(Role::Tank)])
            .unwrap();
        let b = table
            .combine(&[&single(Role::Tank), &single(Role::Infantry)])
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_combine_flatten_roundtrip() {
        let table = CombineTable::new();
        let inputs = [
            single(Role::Navy),
            single(Role::AirForce),
            single(Role::Tank),
            single(Role::Infantry),
        ];
        let refs: Vec<&Stack> = inputs.iter().collect();
        let combined = table.combine(&refs).unwrap();
        assert_eq!(combined.carrier().role, Role::Navy);

        let mut roles: Vec<Role> = combined.flatten().iter().map(|p| p.role).collect();
        roles.sort();
        let mut expected = vec![Role::Navy, Role::AirForce, Role::Tank, Role::Infantry];
        expected.sort();
        assert_eq!(roles, expected);
    }

    #[test]
    fn test_carrier_priority_navy_over_airforce() {
        let table = CombineTable::new();
        let combined = table
            .combine(&[&single(Role::AirForce), &single(Role::Navy)])
            .unwrap();
        assert_eq!(combined.carrier().role, Role::Navy);
    }

    #[test]
    fn test_combine_rejects_unknown_shape() {
        let table = CombineTable::new();
        assert!(table
            .combine(&[&single(Role::Artillery), &single(Role::Tank)])
            .is_none());
        assert!(table
            .combine(&[&single(Role::Commander), &single(Role::Navy), &single(Role::Missile)])
            .is_none());
    }

    #[test]
    fn test_combine_rejects_duplicate_role() {
        let table = CombineTable::new();
        assert!(table
            .combine(&[&single(Role::Infantry), &single(Role::Infantry)])
            .is_none());
    }

    #[test]
    fn test_combine_rejects_mixed_colors() {
        let table = CombineTable::new();
        let red = Stack::single(Piece::new(Color::Red, Role::Tank));
        let blue = Stack::single(Piece::new(Color::Blue, Role::Infantry));
        assert!(table.combine(&[&red, &blue]).is_none());
    }

    #[test]
    fn test_combine_accepts_stacked_input() {
        let table = CombineTable::new();
        let tank_stack = table
            .combine(&[&single(Role::Tank), &single(Role::Militia)])
            .unwrap();
        let combined = table.combine(&[&tank_stack, &single(Role::Navy)]).unwrap();
        assert_eq!(combined.carrier().role, Role::Navy);
        assert_eq!(combined.len(), 3);
    }

    #[test]
    fn test_remove_lone_piece() {
        let table = CombineTable::new();
        let lone = single(Role::Militia);
        let (rest, removed) = table.remove(&lone, Role::Militia);
        assert!(rest.is_none());
        assert_eq!(removed.unwrap().role, Role::Militia);

        let (rest, removed) = table.remove(&lone, Role::Tank);
        assert_eq!(rest.unwrap(), lone);
        assert!(removed.is_none());
    }

    #[test]
    fn test_remove_unwraps_single_survivor() {
        let table = CombineTable::new();
        let stack = table
            .combine(&[&single(Role::Navy), &single(Role::Infantry)])
            .unwrap();
        let (rest, removed) = table.remove(&stack, Role::Infantry);
        let rest = rest.unwrap();
        assert!(!rest.is_stack());
        assert_eq!(rest.carrier().role, Role::Navy);
        assert_eq!(removed.unwrap().role, Role::Infantry);
    }

    #[test]
    fn test_remove_carrier_revalidates_remainder() {
        let table = CombineTable::new();
        let inputs = [single(Role::Navy), single(Role::Tank), single(Role::Infantry)];
        let refs: Vec<&Stack> = inputs.iter().collect();
        let stack = table.combine(&refs).unwrap();

        let (rest, removed) = table.remove(&stack, Role::Navy);
        let rest = rest.unwrap();
        assert_eq!(removed.unwrap().role, Role::Navy);
        // {Tank, Infantry} is a legal shape with Tank as carrier.
        assert_eq!(rest.carrier().role, Role::Tank);
        assert_eq!(rest.carried()[0].role, Role::Infantry);
    }

    #[test]
    fn test_no_mask_collisions() {
        // Rebuilding the table must yield one state per mask with the mask
        // equal to the OR of its decoded flags.
        let table = CombineTable::new();
        for (&mask, &state) in table.states.iter() {
            let mut decoded = (state & 0xFFFF) as u16;
            for shift in SLOT_SHIFTS {
                decoded |= ((state >> shift) & 0xFFFF) as u16;
            }
            assert_eq!(decoded, mask, "state {state:#x} does not re-encode its mask");
        }
    }
}
