//! Serialized position parsing and formatting.
//!
//! The format is FEN-like: twelve `/`-separated ranks from rank 12 down to
//! rank 1, a turn code, the half-move clock and the move number, plus an
//! optional extension describing an active deploy session.
//!
//! ```text
//! 3ascah3/1n1tgfgt3/1neimfmi3/11/.../3ASCAH3 r 0 1 [deploy:b3:Id3,Tc3]
//! ```
//!
//! Red pieces are uppercase, blue lowercase. Consecutive digits accumulate
//! into one empty run (`11` is eleven squares). A stack is parenthesized
//! with the carrier first, e.g. `(NFI)`; a heroic piece is prefixed `+`.

use thiserror::Error;

use crate::board::{can_occupy, Board};
use crate::combine::CombineTable;
use crate::game::GameState;
use crate::types::{Color, Piece, Role, Square, Stack, FILES, RANKS};

/// Opening setup: three back ranks per side, navies on the b file.
pub const START_POSITION: &str =
    "3ascah3/1n1tgfgt3/1neimfmi3/11/11/11/11/11/11/1NEIMFMI3/1N1TGFGT3/3ASCAH3 r 0 1";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("expected 4 or 5 fields, received {0}")]
    FieldCount(usize),
    #[error("expected {RANKS} ranks, received {0}")]
    RankCount(usize),
    #[error("rank {rank} covers {count} files, expected {FILES}")]
    FileCount { rank: usize, count: usize },
    #[error("unknown piece letter '{0}'")]
    UnknownPiece(char),
    #[error("unbalanced stack parentheses")]
    UnbalancedStack,
    #[error("stack holds more than four pieces")]
    OversizedStack,
    #[error("invalid turn code")]
    InvalidTurn,
    #[error("invalid counter field")]
    InvalidCounter,
    #[error("invalid deploy extension")]
    InvalidDeploy,
    #[error("{0}")]
    Validation(String),
}

/// An active session as encoded in the deploy extension: the stack square
/// plus the already-deployed role/destination pairs, in step order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDeploy {
    pub origin: Square,
    pub steps: Vec<(Role, Square)>,
}

/// Parse result, before session re-play.
#[derive(Debug, Clone)]
pub struct ParsedPosition {
    pub board: Board,
    pub turn: Color,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
    pub deploy: Option<ParsedDeploy>,
}

fn piece_from_letter(ch: char, heroic: bool) -> Result<Piece, FenError> {
    let role = Role::from_char(ch.to_ascii_uppercase()).ok_or(FenError::UnknownPiece(ch))?;
    let color = if ch.is_ascii_uppercase() {
        Color::Red
    } else {
        Color::Blue
    };
    let mut piece = Piece::new(color, role);
    piece.heroic = heroic;
    Ok(piece)
}

fn parse_rank(
    text: &str,
    rank: u8,
    rank_label: usize,
    board: &mut Board,
    table: &CombineTable,
) -> Result<(), FenError> {
    let mut file: u32 = 0;
    let mut empty_run: u32 = 0;
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if let Some(d) = ch.to_digit(10) {
            empty_run = empty_run * 10 + d;
            continue;
        }
        file += empty_run;
        empty_run = 0;
        if file >= FILES as u32 {
            return Err(FenError::FileCount {
                rank: rank_label,
                count: file as usize + 1,
            });
        }
        let sq = Square::new(file as u8, rank);
        let stack = match ch {
            '(' => {
                let mut members: Vec<Piece> = Vec::new();
                let mut heroic = false;
                loop {
                    let Some(inner) = chars.next() else {
                        return Err(FenError::UnbalancedStack);
                    };
                    match inner {
                        ')' => break,
                        '+' => heroic = true,
                        '(' => return Err(FenError::UnbalancedStack),
                        _ => {
                            if members.len() >= 4 {
                                return Err(FenError::OversizedStack);
                            }
                            members.push(piece_from_letter(inner, heroic)?);
                            heroic = false;
                        }
                    }
                }
                if members.len() < 2 {
                    return Err(FenError::Validation(format!(
                        "stack at {sq} needs at least two pieces"
                    )));
                }
                let singles: Vec<Stack> = members.iter().map(|&p| Stack::single(p)).collect();
                let refs: Vec<&Stack> = singles.iter().collect();
                table.combine(&refs).ok_or_else(|| {
                    FenError::Validation(format!("illegal stack combination at {sq}"))
                })?
            }
            ')' => return Err(FenError::UnbalancedStack),
            '+' => {
                let Some(inner) = chars.next() else {
                    return Err(FenError::Validation("dangling heroic marker".into()));
                };
                Stack::single(piece_from_letter(inner, true)?)
            }
            _ => Stack::single(piece_from_letter(ch, false)?),
        };
        if !can_occupy(stack.carrier().role, sq) {
            return Err(FenError::Validation(format!(
                "{:?} cannot occupy {sq}",
                stack.carrier().role
            )));
        }
        board.put(sq, stack);
        file += 1;
    }
    file += empty_run;
    if file != FILES as u32 {
        return Err(FenError::FileCount {
            rank: rank_label,
            count: file as usize,
        });
    }
    Ok(())
}

fn parse_deploy(text: &str) -> Result<ParsedDeploy, FenError> {
    let rest = text.strip_prefix("deploy:").ok_or(FenError::InvalidDeploy)?;
    let (origin_text, steps_text) = rest.split_once(':').ok_or(FenError::InvalidDeploy)?;
    let origin: Square = origin_text.parse().map_err(|_| FenError::InvalidDeploy)?;
    let mut steps = Vec::new();
    if !steps_text.is_empty() {
        for part in steps_text.split(',') {
            let mut chars = part.chars();
            let role_ch = chars.next().ok_or(FenError::InvalidDeploy)?;
            let role = Role::from_char(role_ch).ok_or(FenError::InvalidDeploy)?;
            let sq: Square = chars
                .as_str()
                .parse()
                .map_err(|_| FenError::InvalidDeploy)?;
            steps.push((role, sq));
        }
    }
    Ok(ParsedDeploy { origin, steps })
}

/// Parse a serialized position. Malformed input fails fast here, before
/// any rules machinery runs.
pub fn parse(fen: &str, table: &CombineTable) -> Result<ParsedPosition, FenError> {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() != 4 && fields.len() != 5 {
        return Err(FenError::FieldCount(fields.len()));
    }

    let ranks: Vec<&str> = fields[0].split('/').collect();
    if ranks.len() != RANKS as usize {
        return Err(FenError::RankCount(ranks.len()));
    }
    let mut board = Board::empty();
    for (i, rank_text) in ranks.iter().enumerate() {
        let rank = RANKS - 1 - i as u8;
        parse_rank(rank_text, rank, rank as usize + 1, &mut board, table)?;
    }

    let turn = match fields[1] {
        code if code.len() == 1 => {
            Color::from_code(code.chars().next().unwrap_or(' ')).ok_or(FenError::InvalidTurn)?
        }
        _ => return Err(FenError::InvalidTurn),
    };
    let halfmove_clock: u32 = fields[2].parse().map_err(|_| FenError::InvalidCounter)?;
    let fullmove_number: u32 = fields[3].parse().map_err(|_| FenError::InvalidCounter)?;
    if fullmove_number == 0 {
        return Err(FenError::InvalidCounter);
    }

    let deploy = match fields.get(4) {
        Some(text) => Some(parse_deploy(text)?),
        None => None,
    };

    Ok(ParsedPosition {
        board,
        turn,
        halfmove_clock,
        fullmove_number,
        deploy,
    })
}

fn push_piece_letters(out: &mut String, piece: Piece) {
    if piece.heroic {
        out.push('+');
    }
    let ch = piece.role.to_char();
    out.push(match piece.color {
        Color::Red => ch,
        Color::Blue => ch.to_ascii_lowercase(),
    });
}

/// Format a game state back into its serialized form.
pub fn format(state: &GameState) -> String {
    let mut out = String::new();
    for i in 0..RANKS {
        let rank = RANKS - 1 - i;
        let mut empty_run = 0u32;
        for file in 0..FILES {
            let sq = Square::new(file, rank);
            match state.board.get(sq) {
                None => empty_run += 1,
                Some(stack) => {
                    if empty_run > 0 {
                        out.push_str(&empty_run.to_string());
                        empty_run = 0;
                    }
                    if stack.is_stack() {
                        out.push('(');
                        for piece in stack.flatten() {
                            push_piece_letters(&mut out, piece);
                        }
                        out.push(')');
                    } else {
                        push_piece_letters(&mut out, stack.carrier());
                    }
                }
            }
        }
        if empty_run > 0 {
            out.push_str(&empty_run.to_string());
        }
        if rank > 0 {
            out.push('/');
        }
    }

    out.push(' ');
    out.push(state.turn.to_code());
    out.push_str(&format!(
        " {} {}",
        state.halfmove_clock, state.fullmove_number
    ));

    if let Some(session) = &state.deploy {
        let snap = session.snapshot();
        out.push_str(&format!(" deploy:{}:", snap.origin));
        let steps: Vec<String> = snap
            .moved
            .iter()
            .map(|(role, sq)| format!("{}{}", role.to_char(), sq))
            .collect();
        out.push_str(&steps.join(","));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(fen: &str) -> ParsedPosition {
        parse(fen, &CombineTable::new()).expect("fen parses")
    }

    #[test]
    fn test_parse_start_position() {
        let pos = parse_ok(START_POSITION);
        assert_eq!(pos.turn, Color::Red);
        assert_eq!(pos.halfmove_clock, 0);
        assert_eq!(pos.fullmove_number, 1);
        assert!(pos.deploy.is_none());

        // Commanders on the f file, navies in the sea.
        let red_cmd = pos.board.get("f1".parse().unwrap()).unwrap();
        assert_eq!(red_cmd.carrier().role, Role::Commander);
        assert_eq!(red_cmd.carrier().color, Color::Red);
        let navy = pos.board.get("b2".parse().unwrap()).unwrap();
        assert_eq!(navy.carrier().role, Role::Navy);
        assert_eq!(pos.board.occupied(Color::Red).len(), 18);
        assert_eq!(pos.board.occupied(Color::Blue).len(), 18);
    }

    #[test]
    fn test_parse_rejects_bad_rank_count() {
        let err = parse("11/11 r 0 1", &CombineTable::new()).unwrap_err();
        assert_eq!(err, FenError::RankCount(2));
    }

    #[test]
    fn test_parse_rejects_bad_file_count() {
        let short = "3ascah3/1n1tgfgt3/1neimfmi3/11/11/11/11/11/11/10/11/11 r 0 1";
        assert!(matches!(
            parse(short, &CombineTable::new()).unwrap_err(),
            FenError::FileCount { .. }
        ));
        let long = "3ascah3/1n1tgfgt3/1neimfmi3/12/11/11/11/11/11/11/11/11 r 0 1";
        assert!(matches!(
            parse(long, &CombineTable::new()).unwrap_err(),
            FenError::FileCount { .. }
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_letter() {
        let fen = "3ascah3/11/11/11/11/11/11/11/11/11/11/5X5 r 0 1";
        assert_eq!(
            parse(fen, &CombineTable::new()).unwrap_err(),
            FenError::UnknownPiece('X')
        );
    }

    #[test]
    fn test_parse_rejects_unbalanced_parens() {
        let open = "3ascah3/11/11/11/11/11/11/11/11/11/11/5(TI4 r 0 1";
        assert_eq!(
            parse(open, &CombineTable::new()).unwrap_err(),
            FenError::UnbalancedStack
        );
        let close = "3ascah3/11/11/11/11/11/11/11/11/11/11/5)5 r 0 1";
        assert_eq!(
            parse(close, &CombineTable::new()).unwrap_err(),
            FenError::UnbalancedStack
        );
    }

    #[test]
    fn test_parse_rejects_illegal_stack() {
        // Artillery cannot be carried.
        let fen = "3ascah3/11/11/11/11/11/11/11/11/11/11/5(TA)5 r 0 1";
        assert!(matches!(
            parse(fen, &CombineTable::new()).unwrap_err(),
            FenError::Validation(_)
        ));
    }

    #[test]
    fn test_parse_rejects_terrain_violation() {
        // A tank in the sea.
        let fen = "11/11/11/11/11/11/11/11/11/11/11/T10 r 0 1";
        assert!(matches!(
            parse(fen, &CombineTable::new()).unwrap_err(),
            FenError::Validation(_)
        ));
    }

    #[test]
    fn test_parse_stack_and_heroic() {
        let fen = "11/11/11/11/11/11/11/11/11/11/11/(NFI)3+C6 r 4 9";
        let pos = parse_ok(fen);
        let stack = pos.board.get(Square::new(0, 0)).unwrap();
        assert_eq!(stack.carrier().role, Role::Navy);
        assert_eq!(stack.len(), 3);
        let cmd = pos.board.get(Square::new(4, 0)).unwrap();
        assert!(cmd.carrier().heroic);
        assert_eq!(pos.halfmove_clock, 4);
        assert_eq!(pos.fullmove_number, 9);
    }

    #[test]
    fn test_parse_deploy_extension() {
        let fen = "11/11/11/11/11/11/11/11/11/1(nti)9/11/11 b 0 3 deploy:b3:Id3,Tc3";
        let pos = parse_ok(fen);
        let deploy = pos.deploy.unwrap();
        assert_eq!(deploy.origin, "b3".parse().unwrap());
        assert_eq!(
            deploy.steps,
            vec![
                (Role::Infantry, "d3".parse().unwrap()),
                (Role::Tank, "c3".parse().unwrap()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_deploy() {
        let table = CombineTable::new();
        let base = "11/11/11/11/11/11/11/11/11/1(nti)9/11/11 b 0 3";
        for ext in ["deploy", "deploy:z9:Ia1", "deploy:b3:Qd3", "deploy:b3:I"] {
            let fen = format!("{base} {ext}");
            assert!(parse(&fen, &table).is_err(), "accepted {ext}");
        }
    }
}
