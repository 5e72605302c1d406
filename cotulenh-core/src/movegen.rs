//! Pseudo-legal move enumeration.
//!
//! Each role has a movement profile (range, direction set, terrain
//! affinity). Sliding movement stops at the first occupied square; enemy
//! occupants yield captures, friendly occupants a combination consult.
//! Long-range support roles capture without relocating, and flying
//! captures inside enemy air defense resolve as suicide captures.

use crate::airdefense::{AirDefenseTable, Mask256};
use crate::board::{can_occupy, Board};
use crate::combine::CombineTable;
use crate::types::{Color, Move, Piece, Role, Square, Stack};

pub const ORTHOGONAL: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
pub const ALL_EIGHT: [(i8, i8); 8] = [
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, 0),
    (1, -1),
];

/// Direction set of a movement profile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DirSet {
    /// Immobile (Headquarter).
    None,
    Orthogonal,
    All,
    /// Single-step jump anywhere inside the Euclidean disc of the range.
    Circle,
}

/// Movement profile of a role.
#[derive(Clone, Copy, Debug)]
pub struct Profile {
    pub range: u8,
    pub dirs: DirSet,
    /// Captures without relocating (long-range support units).
    pub stay_capture: bool,
}

pub const fn base_profile(role: Role) -> Profile {
    match role {
        Role::Commander => Profile { range: 1, dirs: DirSet::All, stay_capture: false },
        Role::Infantry => Profile { range: 2, dirs: DirSet::Orthogonal, stay_capture: false },
        Role::Tank => Profile { range: 2, dirs: DirSet::Orthogonal, stay_capture: false },
        Role::Militia => Profile { range: 1, dirs: DirSet::All, stay_capture: false },
        Role::Engineer => Profile { range: 1, dirs: DirSet::Orthogonal, stay_capture: false },
        Role::Artillery => Profile { range: 3, dirs: DirSet::All, stay_capture: true },
        Role::AntiAir => Profile { range: 1, dirs: DirSet::Orthogonal, stay_capture: false },
        Role::Missile => Profile { range: 2, dirs: DirSet::Circle, stay_capture: true },
        Role::AirForce => Profile { range: 4, dirs: DirSet::All, stay_capture: false },
        Role::Navy => Profile { range: 4, dirs: DirSet::All, stay_capture: false },
        Role::Headquarter => Profile { range: 0, dirs: DirSet::None, stay_capture: false },
    }
}

/// Heroic promotion grants one extra step and the full direction set.
pub fn effective_profile(role: Role, heroic: bool) -> Profile {
    let mut profile = base_profile(role);
    if heroic {
        profile.range += 1;
        if matches!(profile.dirs, DirSet::None | DirSet::Orthogonal) {
            profile.dirs = DirSet::All;
        }
    }
    profile
}

/// Offsets inside the Euclidean disc of a radius, origin excluded.
fn disc_offsets(radius: u8) -> Vec<(i8, i8)> {
    let r = radius as i32;
    let mut out = Vec::new();
    for df in -r..=r {
        for dr in -r..=r {
            if (df != 0 || dr != 0) && df * df + dr * dr <= r * r {
                out.push((df as i8, dr as i8));
            }
        }
    }
    out
}

/// How a generated destination should be wrapped.
#[derive(Clone, Copy)]
enum Emit {
    Whole,
    Deploy,
}

struct Gen<'a> {
    board: &'a Board,
    table: &'a CombineTable,
    enemy_zone: &'a Mask256,
    emit: Emit,
    out: Vec<Move>,
}

impl<'a> Gen<'a> {
    fn push_quiet(&mut self, from: Square, to: Square, piece: Piece) {
        self.out.push(match self.emit {
            Emit::Whole => Move::Normal { from, to, piece },
            Emit::Deploy => Move::DeployStep {
                origin: from,
                to,
                piece,
                captured: None,
                suicide: false,
            },
        });
    }

    fn push_capture(&mut self, from: Square, to: Square, piece: Piece, victim: &Stack) {
        let suicide = piece.role == Role::AirForce && self.enemy_zone.get(to);
        self.out.push(match self.emit {
            Emit::Whole => {
                if suicide {
                    Move::SuicideCapture {
                        from,
                        target: to,
                        piece,
                        captured: victim.clone(),
                    }
                } else {
                    Move::Capture {
                        from,
                        to,
                        piece,
                        captured: victim.clone(),
                    }
                }
            }
            Emit::Deploy => Move::DeployStep {
                origin: from,
                to,
                piece,
                captured: Some(victim.clone()),
                suicide,
            },
        });
    }

    /// Consult the combination engine for a friendly destination. Only
    /// whole-stack moves may merge; deploy steps pass friendly squares by.
    fn push_combine(&mut self, from: Square, to: Square, moving: &Stack, dest: &Stack) {
        if matches!(self.emit, Emit::Deploy) {
            return;
        }
        if let Some(combined) = self.table.combine(&[moving, dest]) {
            self.out.push(Move::Combine {
                from,
                to,
                piece: moving.carrier(),
                combined,
            });
        }
    }

    /// Movement along sliding rays. Stops at the first occupied square.
    /// Stay-capture roles do not relocate onto enemies, so their rays
    /// only yield quiet and combine moves.
    fn slide(&mut self, from: Square, moving: &Stack, profile: Profile, dirs: &[(i8, i8)]) {
        let board = self.board;
        let piece = moving.carrier();
        for &(df, dr) in dirs {
            for step in 1..=profile.range as i8 {
                let Some(to) = from.offset(df * step, dr * step) else {
                    break;
                };
                if !can_occupy(piece.role, to) {
                    break;
                }
                match board.get(to) {
                    None => self.push_quiet(from, to, piece),
                    Some(occupant) if occupant.color() == piece.color => {
                        self.push_combine(from, to, moving, occupant);
                        break;
                    }
                    Some(enemy) => {
                        if !profile.stay_capture {
                            self.push_capture(from, to, piece, enemy);
                        }
                        break;
                    }
                }
            }
        }
    }

    /// Circle movement: direct jumps inside the disc, no path traversal.
    fn jump(&mut self, from: Square, moving: &Stack, profile: Profile) {
        let board = self.board;
        let piece = moving.carrier();
        for (df, dr) in disc_offsets(profile.range) {
            let Some(to) = from.offset(df, dr) else { continue };
            if !can_occupy(piece.role, to) {
                continue;
            }
            match board.get(to) {
                None => self.push_quiet(from, to, piece),
                Some(occupant) if occupant.color() == piece.color => {
                    self.push_combine(from, to, moving, occupant);
                }
                Some(enemy) => {
                    if !profile.stay_capture {
                        self.push_capture(from, to, piece, enemy);
                    }
                }
            }
        }
    }

    /// Stay-captures for long-range support roles. The attack ray ignores
    /// terrain (shells overfly water and river) but is blocked by the
    /// first piece it meets; the missile disc is unblocked.
    fn stay_attacks(&mut self, from: Square, moving: &Stack, profile: Profile) {
        let board = self.board;
        let piece = moving.carrier();
        match profile.dirs {
            DirSet::Circle => {
                for (df, dr) in disc_offsets(profile.range) {
                    let Some(target) = from.offset(df, dr) else { continue };
                    if let Some(enemy) = board.get(target) {
                        if enemy.color() != piece.color {
                            self.push_stay(from, target, piece, enemy);
                        }
                    }
                }
            }
            _ => {
                for &(df, dr) in &ALL_EIGHT {
                    for step in 1..=profile.range as i8 {
                        let Some(target) = from.offset(df * step, dr * step) else {
                            break;
                        };
                        match board.get(target) {
                            None => continue,
                            Some(occupant) => {
                                if occupant.color() != piece.color {
                                    self.push_stay(from, target, piece, occupant);
                                }
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    fn push_stay(&mut self, from: Square, target: Square, piece: Piece, victim: &Stack) {
        // A deployed support unit cannot arise from the carrier blueprint,
        // so stay-captures only occur for whole-stack movers.
        self.out.push(Move::StayCapture {
            from,
            target,
            piece,
            captured: victim.clone(),
        });
    }

    fn run(&mut self, from: Square, moving: &Stack) {
        let piece = moving.carrier();
        let profile = effective_profile(piece.role, piece.heroic);
        match profile.dirs {
            DirSet::None => {}
            DirSet::Orthogonal => self.slide(from, moving, profile, &ORTHOGONAL),
            DirSet::All => self.slide(from, moving, profile, &ALL_EIGHT),
            DirSet::Circle => self.jump(from, moving, profile),
        }
        if profile.stay_capture {
            self.stay_attacks(from, moving, profile);
        }
    }
}

/// Pseudo-legal moves of one whole stack from its square.
pub fn stack_moves(
    board: &Board,
    from: Square,
    stack: &Stack,
    table: &CombineTable,
    enemy_zone: &Mask256,
) -> Vec<Move> {
    let mut g = Gen {
        board,
        table,
        enemy_zone,
        emit: Emit::Whole,
        out: Vec::new(),
    };
    g.run(from, stack);
    g.out
}

/// Deploy-step moves for one piece leaving the session's stack.
///
/// `board` must be the session's virtual view (overlays applied, origin
/// holding the remaining pieces); legality therefore uses the remaining
/// set, not the literal board content.
pub fn deploy_piece_moves(
    board: &Board,
    origin: Square,
    piece: Piece,
    table: &CombineTable,
    enemy_zone: &Mask256,
) -> Vec<Move> {
    let mut g = Gen {
        board,
        table,
        enemy_zone,
        emit: Emit::Deploy,
        out: Vec::new(),
    };
    g.run(origin, &Stack::single(piece));
    g.out
}

/// All pseudo-legal whole-stack moves for one side. Deploy steps are
/// generated separately while a session is active.
pub fn pseudo_legal(
    board: &Board,
    turn: Color,
    table: &CombineTable,
    air: &AirDefenseTable,
) -> Vec<Move> {
    let enemy_zone = air.influence(board, turn.opponent());
    let mut moves = Vec::new();
    for &from in board.occupied(turn) {
        let Some(stack) = board.get(from) else { continue };
        moves.extend(stack_moves(board, from, stack, table, &enemy_zone));
    }
    moves
}

/// True iff some pseudo-legal move of `by` captures the given square.
pub fn is_attacked(
    board: &Board,
    sq: Square,
    by: Color,
    table: &CombineTable,
    air: &AirDefenseTable,
) -> bool {
    pseudo_legal(board, by, table, air)
        .iter()
        .any(|mv| mv.captured().is_some() && mv.target() == sq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MoveKind;

    fn setup() -> (Board, CombineTable, AirDefenseTable) {
        (Board::empty(), CombineTable::new(), AirDefenseTable::new())
    }

    fn put(board: &mut Board, sq: Square, color: Color, role: Role) {
        board.put(sq, Stack::single(Piece::new(color, role)));
    }

    #[test]
    fn test_infantry_slides_two_orthogonal() {
        let (mut board, table, air) = setup();
        let from = Square::new(5, 2);
        put(&mut board, from, Color::Red, Role::Infantry);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        let targets: Vec<Square> = moves.iter().map(|m| m.target()).collect();
        assert!(targets.contains(&Square::new(5, 4)));
        assert!(targets.contains(&Square::new(3, 2)));
        assert!(!targets.contains(&Square::new(6, 3)));
        assert_eq!(moves.len(), 8);
    }

    #[test]
    fn test_all_destinations_playable() {
        let (mut board, table, air) = setup();
        // Corner and edge placements push rays off the grid.
        put(&mut board, Square::new(10, 11), Color::Red, Role::AirForce);
        put(&mut board, Square::new(2, 0), Color::Red, Role::Artillery);
        put(&mut board, Square::new(0, 0), Color::Red, Role::Navy);

        for mv in pseudo_legal(&board, Color::Red, &table, &air) {
            assert!(mv.target().is_playable(), "off-grid target in {mv:?}");
        }
    }

    #[test]
    fn test_slide_blocked_by_first_occupied() {
        let (mut board, table, air) = setup();
        let from = Square::new(5, 2);
        put(&mut board, from, Color::Red, Role::Infantry);
        put(&mut board, Square::new(5, 3), Color::Blue, Role::Militia);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        // The enemy at 5,3 is capturable, the square behind it is not
        // reachable in that direction.
        assert!(moves.iter().any(|m| m.kind() == MoveKind::Capture
            && m.target() == Square::new(5, 3)));
        assert!(!moves.iter().any(|m| m.target() == Square::new(5, 4)));
    }

    #[test]
    fn test_tank_crosses_river_only_on_bridge() {
        let (mut board, table, air) = setup();
        // e5 (file 4, rank 4) faces river at e6; d5 (file 3) faces the
        // d-file bridge.
        put(&mut board, Square::new(4, 4), Color::Red, Role::Tank);
        put(&mut board, Square::new(3, 4), Color::Red, Role::Tank);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        assert!(!moves.iter().any(|m| m.target() == Square::new(4, 5)));
        assert!(moves.iter().any(|m| m.target() == Square::new(3, 5)));
        // Two steps across the bridge reaches the far river rank.
        assert!(moves.iter().any(|m| m.target() == Square::new(3, 6)));
    }

    #[test]
    fn test_navy_confined_to_water() {
        let (mut board, table, air) = setup();
        let from = Square::new(1, 4);
        put(&mut board, from, Color::Red, Role::Navy);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        assert!(!moves.is_empty());
        for mv in &moves {
            assert!(mv.target().file() < 2, "navy left the water: {mv:?}");
        }
    }

    #[test]
    fn test_artillery_stay_captures_within_range() {
        let (mut board, table, air) = setup();
        let from = Square::new(5, 2);
        put(&mut board, from, Color::Red, Role::Artillery);
        put(&mut board, Square::new(5, 5), Color::Blue, Role::Tank);
        put(&mut board, Square::new(8, 5), Color::Blue, Role::Infantry);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        let stays: Vec<&Move> = moves
            .iter()
            .filter(|m| m.kind() == MoveKind::StayCapture)
            .collect();
        // Tank three ranks up is hit; the diagonal infantry is in range.
        assert!(stays.iter().any(|m| m.target() == Square::new(5, 5)));
        assert!(stays.iter().any(|m| m.target() == Square::new(8, 5)));
        // The attacker never relocates on a capture.
        assert!(!moves
            .iter()
            .any(|m| m.kind() == MoveKind::Capture && m.from() == from));
    }

    #[test]
    fn test_artillery_attack_ray_blocked_by_piece() {
        let (mut board, table, air) = setup();
        put(&mut board, Square::new(5, 2), Color::Red, Role::Artillery);
        put(&mut board, Square::new(5, 3), Color::Red, Role::Militia);
        put(&mut board, Square::new(5, 4), Color::Blue, Role::Tank);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        assert!(!moves
            .iter()
            .any(|m| m.kind() == MoveKind::StayCapture && m.target() == Square::new(5, 4)));
    }

    #[test]
    fn test_missile_disc_attack_ignores_blockers() {
        let (mut board, table, air) = setup();
        put(&mut board, Square::new(5, 2), Color::Red, Role::Missile);
        put(&mut board, Square::new(5, 3), Color::Red, Role::Militia);
        put(&mut board, Square::new(5, 4), Color::Blue, Role::Tank);
        put(&mut board, Square::new(7, 4), Color::Blue, Role::Tank);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        // Two ranks straight up is inside the disc even with a blocker
        // between; (2,2) offset is outside the radius-2 disc.
        assert!(moves
            .iter()
            .any(|m| m.kind() == MoveKind::StayCapture && m.target() == Square::new(5, 4)));
        assert!(!moves.iter().any(|m| m.target() == Square::new(7, 4)));
    }

    #[test]
    fn test_airforce_suicide_capture_inside_zone() {
        let (mut board, table, air) = setup();
        let af = Square::new(5, 9);
        put(&mut board, af, Color::Red, Role::AirForce);
        // Blue anti-air at f9 (5,8) covers f10 (5,9)? No: radius 1 covers
        // f8..f10 ranks 7..9 on the f file. Put the victim inside.
        put(&mut board, Square::new(4, 8), Color::Blue, Role::AntiAir);
        put(&mut board, Square::new(4, 9), Color::Blue, Role::Infantry);
        put(&mut board, Square::new(8, 9), Color::Blue, Role::Infantry);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        // Adjacent infantry sits inside the blue zone: suicide capture.
        assert!(moves
            .iter()
            .any(|m| m.kind() == MoveKind::SuicideCapture && m.target() == Square::new(4, 9)));
        // The distant infantry is outside any zone: normal capture.
        assert!(moves
            .iter()
            .any(|m| m.kind() == MoveKind::Capture && m.target() == Square::new(8, 9)));
    }

    #[test]
    fn test_combine_move_emitted_for_valid_pair() {
        let (mut board, table, air) = setup();
        put(&mut board, Square::new(4, 4), Color::Red, Role::Infantry);
        put(&mut board, Square::new(4, 3), Color::Red, Role::Tank);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        let combine = moves
            .iter()
            .find(|m| m.kind() == MoveKind::Combine && m.from() == Square::new(4, 4))
            .expect("infantry should combine onto the tank");
        if let Move::Combine { combined, .. } = combine {
            assert_eq!(combined.carrier().role, Role::Tank);
        }
    }

    #[test]
    fn test_no_combine_for_invalid_pair() {
        let (mut board, table, air) = setup();
        put(&mut board, Square::new(4, 4), Color::Red, Role::Artillery);
        put(&mut board, Square::new(4, 3), Color::Red, Role::Tank);

        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        assert!(!moves.iter().any(|m| m.kind() == MoveKind::Combine));
    }

    #[test]
    fn test_headquarter_immobile_until_heroic() {
        let (mut board, table, air) = setup();
        put(&mut board, Square::new(6, 1), Color::Red, Role::Headquarter);
        assert!(pseudo_legal(&board, Color::Red, &table, &air).is_empty());

        let mut heroic = Piece::new(Color::Red, Role::Headquarter);
        heroic.heroic = true;
        board.put(Square::new(6, 1), Stack::single(heroic));
        let moves = pseudo_legal(&board, Color::Red, &table, &air);
        assert_eq!(moves.len(), 8);
    }

    #[test]
    fn test_is_attacked_sees_stay_capture() {
        let (mut board, table, air) = setup();
        put(&mut board, Square::new(5, 2), Color::Blue, Role::Artillery);
        put(&mut board, Square::new(5, 0), Color::Red, Role::Commander);

        assert!(is_attacked(&board, Square::new(5, 0), Color::Blue, &table, &air));
        assert!(!is_attacked(&board, Square::new(9, 9), Color::Blue, &table, &air));
    }

    #[test]
    fn test_deploy_piece_moves_use_origin() {
        let (mut board, table, air) = setup();
        // Virtual view: the navy remains at origin, infantry is leaving.
        let origin = Square::new(1, 2);
        put(&mut board, origin, Color::Red, Role::Navy);
        let infantry = Piece::new(Color::Red, Role::Infantry);

        let zone = Mask256::EMPTY;
        let moves = deploy_piece_moves(&board, origin, infantry, &table, &zone);
        assert!(!moves.is_empty());
        for mv in &moves {
            match mv {
                Move::DeployStep { origin: o, to, .. } => {
                    assert_eq!(*o, origin);
                    assert!(can_occupy(Role::Infantry, *to));
                }
                other => panic!("unexpected move kind: {other:?}"),
            }
        }
        // Two files inland is reachable for the two-step infantry.
        assert!(moves.iter().any(|m| m.target() == Square::new(3, 2)));
    }
}
