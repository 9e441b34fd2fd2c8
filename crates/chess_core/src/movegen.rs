//! Move generation using bitboards.
//!
//! Generation is staged: captures and quiets are produced separately so
//! the search can rank and consume captures before quiets are even
//! generated, and a dedicated evasion generator handles positions in
//! check. Pseudo-legal moves are filtered by a pin-aware legality test
//! that never has to play the move out.

use crate::attacks::{
    aligned, between, bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks,
    rook_attacks,
};
use crate::bitboard::Bitboard;
use crate::board::Position;
use crate::types::*;

/// Generate all legal moves, returning a freshly allocated vector.
pub fn legal_moves(pos: &Position) -> Vec<Move> {
    let mut out = Vec::with_capacity(64);
    legal_moves_into(pos, &mut out);
    out
}

/// Generate all legal moves into the provided buffer, reusing it across calls.
pub fn legal_moves_into(pos: &Position, out: &mut Vec<Move>) {
    out.clear();
    if pos.checkers().is_empty() {
        generate_captures(pos, out);
        generate_quiets(pos, out);
    } else {
        generate_evasions(pos, out);
    }

    let pinned = pos.pinned(pos.side_to_move());
    out.retain(|&mv| is_legal(pos, mv, pinned));
}

/// Pin-aware legality test for a pseudo-legal move of the side to move.
///
/// King moves are re-verified with the king removed from the occupancy
/// (a slider may attack through the departure square); en-passant
/// captures are re-verified on the post-capture occupancy; everything
/// else only needs the pin ray check.
pub fn is_legal(pos: &Position, mv: Move, pinned: Bitboard) -> bool {
    let us = pos.side_to_move();
    let them = us.other();
    let ksq = pos.king_sq(us);
    let from = mv.from();
    let to = mv.to();

    if mv.is_en_passant() {
        let cap_sq = if us == Color::White { to - 8 } else { to + 8 };
        let mut occ = pos.occupied();
        occ.clear(from);
        occ.clear(cap_sq);
        occ.set(to);

        let rq = pos.pieces(them, PieceKind::Rook) | pos.pieces(them, PieceKind::Queen);
        if !(rook_attacks(ksq, occ) & rq).is_empty() {
            return false;
        }
        let bq = pos.pieces(them, PieceKind::Bishop) | pos.pieces(them, PieceKind::Queen);
        if !(bishop_attacks(ksq, occ) & bq).is_empty() {
            return false;
        }
        // Knights and the king are unaffected by the occupancy change;
        // the captured pawn itself is the only pawn that disappears.
        if !(knight_attacks(ksq) & pos.pieces(them, PieceKind::Knight)).is_empty() {
            return false;
        }
        let pawn_checkers =
            pawn_attacks(us, ksq) & pos.pieces(them, PieceKind::Pawn) & !Bitboard::from_square(cap_sq);
        return pawn_checkers.is_empty();
    }

    if from == ksq {
        if mv.is_castle() {
            // The generator verified the king's path, including the
            // destination, against attack.
            return true;
        }
        let occ = pos.occupied() ^ Bitboard::from_square(from);
        return !pos.is_square_attacked_occ(to, them, occ);
    }

    // A pinned piece may only move along the king-pinner ray. This also
    // rejects pinned pieces trying to block or capture a checker on a
    // different line.
    if pinned.contains(from) && !aligned(from, to, ksq) {
        return false;
    }

    // When in check, the evasion generator only emits king moves,
    // captures of the checker, and interpositions, so nothing further
    // to verify here.
    true
}

/// Pseudo-legal captures for the side to move: all captures including
/// en passant, plus promotion-captures and queening pushes' capture
/// variants.
pub fn generate_captures(pos: &Position, out: &mut Vec<Move>) {
    let us = pos.side_to_move();
    let them = us.other();
    let targets = pos.color_occ(them);
    let occupied = pos.occupied();

    gen_pawn_captures(pos, us, out);
    gen_piece_moves(pos, us, targets, occupied, FLAG_CAPTURE, out);

    let king = pos.king_sq(us);
    let mut king_caps = king_attacks(king) & targets;
    while let Some(to) = king_caps.pop_lsb() {
        out.push(Move::new(king, to, FLAG_CAPTURE));
    }
}

/// Pseudo-legal quiet moves for the side to move: pushes, piece moves,
/// castles, and quiet promotions.
pub fn generate_quiets(pos: &Position, out: &mut Vec<Move>) {
    let us = pos.side_to_move();
    let occupied = pos.occupied();
    let empty = !occupied;

    gen_pawn_quiets(pos, us, Bitboard::ALL, out);
    gen_piece_moves(pos, us, empty, occupied, FLAG_QUIET, out);

    let king = pos.king_sq(us);
    let mut king_moves = king_attacks(king) & empty;
    while let Some(to) = king_moves.pop_lsb() {
        out.push(Move::new(king, to, FLAG_QUIET));
    }

    gen_castling_moves(pos, us, occupied, out);
}

/// Evasions from check: king retreats, captures of the checker, and
/// (against a single sliding check) interpositions.
pub fn generate_evasions(pos: &Position, out: &mut Vec<Move>) {
    let us = pos.side_to_move();
    let them = us.other();
    let ksq = pos.king_sq(us);
    let checkers = pos.checkers();
    let occupied = pos.occupied();

    // King steps, captures and quiets alike. Legality (moving into
    // another attack, or staying on the checker's ray) is the filter's
    // job.
    let mut king_moves = king_attacks(ksq) & !pos.color_occ(us);
    while let Some(to) = king_moves.pop_lsb() {
        let flags = if pos.piece_at(to).is_some() {
            FLAG_CAPTURE
        } else {
            FLAG_QUIET
        };
        out.push(Move::new(ksq, to, flags));
    }

    // Double check: only the king may move.
    if checkers.more_than_one() {
        return;
    }
    let checker_sq = checkers.lsb().expect("in check implies a checker");

    let capture_mask = checkers;
    let block_mask = between(ksq, checker_sq);

    gen_pawn_evasions(pos, us, capture_mask, block_mask, out);

    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        let mut movers = pos.pieces(us, kind);
        while let Some(from) = movers.pop_lsb() {
            let attacks = piece_attacks_from(kind, from, occupied);
            let mut caps = attacks & capture_mask;
            while let Some(to) = caps.pop_lsb() {
                out.push(Move::new(from, to, FLAG_CAPTURE));
            }
            let mut blocks = attacks & block_mask;
            while let Some(to) = blocks.pop_lsb() {
                out.push(Move::new(from, to, FLAG_QUIET));
            }
        }
    }

    // En passant can be the only way to remove a checking pawn.
    if let Some(ep) = pos.en_passant() {
        let cap_sq = if us == Color::White { ep - 8 } else { ep + 8 };
        if cap_sq == checker_sq {
            let mut attackers = pawn_attacks(them, ep) & pos.pieces(us, PieceKind::Pawn);
            while let Some(from) = attackers.pop_lsb() {
                out.push(Move::new(from, ep, FLAG_EN_PASSANT));
            }
        }
    }
}

/// Quiet moves that give direct check, for the first ply of quiescence.
/// Discovered checks are not chased here.
pub fn generate_quiet_checks(pos: &Position, out: &mut Vec<Move>) {
    let us = pos.side_to_move();
    let them = us.other();
    let enemy_king = pos.king_sq(them);
    let occupied = pos.occupied();
    let empty = !occupied;

    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        let check_from = piece_attacks_from(kind, enemy_king, occupied);
        let mut movers = pos.pieces(us, kind);
        while let Some(from) = movers.pop_lsb() {
            let mut tos = piece_attacks_from(kind, from, occupied) & empty & check_from;
            while let Some(to) = tos.pop_lsb() {
                out.push(Move::new(from, to, FLAG_QUIET));
            }
        }
    }

    // Pawn pushes that attack the enemy king square.
    let check_squares = pawn_attacks(them, enemy_king);
    let pawns = pos.pieces(us, PieceKind::Pawn);
    let (single, double_rank, back): (Bitboard, Bitboard, i8) = match us {
        Color::White => (pawns.north() & empty, Bitboard::RANK_4, -8),
        Color::Black => (pawns.south() & empty, Bitboard::RANK_5, 8),
    };
    let mut checking_pushes = single & check_squares & !Bitboard::RANK_1 & !Bitboard::RANK_8;
    while let Some(to) = checking_pushes.pop_lsb() {
        let from = (to as i8 + back) as u8;
        out.push(Move::new(from, to, FLAG_QUIET));
    }
    let second = match us {
        Color::White => (single & Bitboard::RANK_3).north() & empty,
        Color::Black => (single & Bitboard::RANK_6).south() & empty,
    };
    let mut checking_doubles = second & check_squares & double_rank;
    while let Some(to) = checking_doubles.pop_lsb() {
        let from = (to as i8 + 2 * back) as u8;
        out.push(Move::new(from, to, FLAG_DOUBLE_PUSH));
    }
}

#[inline]
fn piece_attacks_from(kind: PieceKind, sq: u8, occupied: Bitboard) -> Bitboard {
    match kind {
        PieceKind::Knight => knight_attacks(sq),
        PieceKind::Bishop => bishop_attacks(sq, occupied),
        PieceKind::Rook => rook_attacks(sq, occupied),
        _ => queen_attacks(sq, occupied),
    }
}

/// Knight through queen moves to the target mask. The flag is
/// `FLAG_CAPTURE` or `FLAG_QUIET`, matching the mask.
fn gen_piece_moves(
    pos: &Position,
    us: Color,
    targets: Bitboard,
    occupied: Bitboard,
    flags: u16,
    out: &mut Vec<Move>,
) {
    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        let mut movers = pos.pieces(us, kind);
        while let Some(from) = movers.pop_lsb() {
            let mut tos = piece_attacks_from(kind, from, occupied) & targets;
            while let Some(to) = tos.pop_lsb() {
                out.push(Move::new(from, to, flags));
            }
        }
    }
}

fn add_promotions(from: u8, to: u8, capture: bool, out: &mut Vec<Move>) {
    for kind in [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ] {
        out.push(Move::promotion(from, to, kind, capture));
    }
}

fn gen_pawn_captures(pos: &Position, us: Color, out: &mut Vec<Move>) {
    let them = us.other();
    let pawns = pos.pieces(us, PieceKind::Pawn);
    let enemies = pos.color_occ(them);

    let (promo_rank, left, right, back_left, back_right): (
        Bitboard,
        fn(Bitboard) -> Bitboard,
        fn(Bitboard) -> Bitboard,
        i8,
        i8,
    ) = match us {
        Color::White => (
            Bitboard::RANK_8,
            Bitboard::north_west,
            Bitboard::north_east,
            -7,
            -9,
        ),
        Color::Black => (
            Bitboard::RANK_1,
            Bitboard::south_west,
            Bitboard::south_east,
            9,
            7,
        ),
    };

    for (attack, back) in [(left, back_left), (right, back_right)] {
        let hits = attack(pawns) & enemies;
        let mut plain = hits & !promo_rank;
        while let Some(to) = plain.pop_lsb() {
            let from = (to as i8 + back) as u8;
            out.push(Move::new(from, to, FLAG_CAPTURE));
        }
        let mut promos = hits & promo_rank;
        while let Some(to) = promos.pop_lsb() {
            let from = (to as i8 + back) as u8;
            add_promotions(from, to, true, out);
        }
    }

    if let Some(ep) = pos.en_passant() {
        let mut attackers = pawn_attacks(them, ep) & pawns;
        while let Some(from) = attackers.pop_lsb() {
            out.push(Move::new(from, ep, FLAG_EN_PASSANT));
        }
    }
}

/// Pawn pushes (with promotions) restricted to `mask`.
fn gen_pawn_quiets(pos: &Position, us: Color, mask: Bitboard, out: &mut Vec<Move>) {
    let pawns = pos.pieces(us, PieceKind::Pawn);
    let empty = !pos.occupied();

    let (single_all, promo_rank, double_rank, back): (Bitboard, Bitboard, Bitboard, i8) = match us
    {
        Color::White => (pawns.north() & empty, Bitboard::RANK_8, Bitboard::RANK_4, -8),
        Color::Black => (pawns.south() & empty, Bitboard::RANK_1, Bitboard::RANK_5, 8),
    };

    let mut plain = single_all & !promo_rank & mask;
    while let Some(to) = plain.pop_lsb() {
        let from = (to as i8 + back) as u8;
        out.push(Move::new(from, to, FLAG_QUIET));
    }

    let mut promos = single_all & promo_rank & mask;
    while let Some(to) = promos.pop_lsb() {
        let from = (to as i8 + back) as u8;
        add_promotions(from, to, false, out);
    }

    let second = match us {
        Color::White => (single_all & Bitboard::RANK_3).north() & empty,
        Color::Black => (single_all & Bitboard::RANK_6).south() & empty,
    };
    let mut doubles = second & double_rank & mask;
    while let Some(to) = doubles.pop_lsb() {
        let from = (to as i8 + 2 * back) as u8;
        out.push(Move::new(from, to, FLAG_DOUBLE_PUSH));
    }
}

/// Pawn evasions: captures of the checker (with promotions) and pushes
/// into the block mask.
fn gen_pawn_evasions(
    pos: &Position,
    us: Color,
    capture_mask: Bitboard,
    block_mask: Bitboard,
    out: &mut Vec<Move>,
) {
    let them = us.other();
    let pawns = pos.pieces(us, PieceKind::Pawn);

    let promo_rank = match us {
        Color::White => Bitboard::RANK_8,
        Color::Black => Bitboard::RANK_1,
    };

    // Captures of the checker
    let mut target = capture_mask;
    while let Some(to) = target.pop_lsb() {
        let mut attackers = pawn_attacks(them, to) & pawns;
        while let Some(from) = attackers.pop_lsb() {
            if promo_rank.contains(to) {
                add_promotions(from, to, true, out);
            } else {
                out.push(Move::new(from, to, FLAG_CAPTURE));
            }
        }
    }

    // Interpositions
    gen_pawn_quiets(pos, us, block_mask, out);
}

/// Castling: both path emptiness and the attack state of the king's
/// transit squares are verified here, so a generated castle is legal.
fn gen_castling_moves(pos: &Position, us: Color, occupied: Bitboard, out: &mut Vec<Move>) {
    if !pos.checkers().is_empty() {
        return;
    }
    let enemy = us.other();

    let (king_from, rights_k, rights_q) = match us {
        Color::White => (4u8, pos.castling().king_side(us), pos.castling().queen_side(us)),
        Color::Black => (60u8, pos.castling().king_side(us), pos.castling().queen_side(us)),
    };

    if rights_k {
        let path = Bitboard::from_square(king_from + 1) | Bitboard::from_square(king_from + 2);
        if (occupied & path).is_empty()
            && !pos.is_square_attacked(king_from + 1, enemy)
            && !pos.is_square_attacked(king_from + 2, enemy)
        {
            out.push(Move::new(king_from, king_from + 2, FLAG_CASTLE_KING));
        }
    }
    if rights_q {
        let path = Bitboard::from_square(king_from - 1)
            | Bitboard::from_square(king_from - 2)
            | Bitboard::from_square(king_from - 3);
        if (occupied & path).is_empty()
            && !pos.is_square_attacked(king_from - 1, enemy)
            && !pos.is_square_attacked(king_from - 2, enemy)
        {
            out.push(Move::new(king_from, king_from - 2, FLAG_CASTLE_QUEEN));
        }
    }
}

#[cfg(test)]
#[path = "movegen_tests.rs"]
mod movegen_tests;
