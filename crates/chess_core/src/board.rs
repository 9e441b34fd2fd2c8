//! Position state and the make/unmake machinery.
//!
//! `Position` carries twelve piece bitboards, per-color occupancy, a
//! mailbox for O(1) piece lookup, castling rights, the en-passant
//! square, both clocks, and incrementally maintained Zobrist keys (full
//! and pawn-only). An append-only history stack records the
//! irreversible state per ply so unmake is O(1).

use thiserror::Error;

use crate::attacks::{
    bishop_attacks, between, king_attacks, knight_attacks, pawn_attacks, rook_attacks,
};
use crate::bitboard::Bitboard;
use crate::types::*;
use crate::zobrist::ZOBRIST;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Piece values used by static exchange evaluation, in centipawns.
pub const SEE_PIECE_VALUES: [i32; 6] = [100, 396, 438, 681, 1349, 30000];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("expected at least 4 FEN fields, found {0}")]
    MissingFields(usize),
    #[error("invalid board field: {0}")]
    BadBoard(String),
    #[error("invalid side to move: {0}")]
    BadSideToMove(String),
    #[error("invalid castling field: {0}")]
    BadCastling(String),
    #[error("invalid en-passant field: {0}")]
    BadEnPassant(String),
    #[error("invalid clock field: {0}")]
    BadClock(String),
    #[error("each side must have exactly one king")]
    BadKingCount,
}

/// Irreversible state saved per ply for O(1) unmake.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Undo {
    mv: Move,
    captured: Option<Piece>,
    castling: CastlingRights,
    en_passant: Option<u8>,
    halfmove_clock: u32,
    key: u64,
    pawn_key: u64,
}

/// Bits cleared from the castling-rights nibble when a square is moved
/// from or captured on.
static CASTLING_CLEAR: [u8; 64] = {
    let mut masks = [0u8; 64];
    masks[0] = CastlingRights::WHITE_QUEEN; // a1
    masks[4] = CastlingRights::WHITE_KING | CastlingRights::WHITE_QUEEN; // e1
    masks[7] = CastlingRights::WHITE_KING; // h1
    masks[56] = CastlingRights::BLACK_QUEEN; // a8
    masks[60] = CastlingRights::BLACK_KING | CastlingRights::BLACK_QUEEN; // e8
    masks[63] = CastlingRights::BLACK_KING; // h8
    masks
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    piece_bb: [[Bitboard; 6]; 2],
    color_bb: [Bitboard; 2],
    mailbox: [Option<Piece>; 64],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<u8>,
    halfmove_clock: u32,
    fullmove_number: u32,
    key: u64,
    pawn_key: u64,
    history: Vec<Undo>,
}

impl Position {
    pub fn startpos() -> Self {
        Self::from_fen(START_FEN).expect("start position FEN is valid")
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(FenError::MissingFields(parts.len()));
        }

        let mut pos = Position {
            piece_bb: [[Bitboard::EMPTY; 6]; 2],
            color_bb: [Bitboard::EMPTY; 2],
            mailbox: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            key: 0,
            pawn_key: 0,
            history: Vec::with_capacity(128),
        };

        let ranks: Vec<&str> = parts[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadBoard(parts[0].to_string()));
        }
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let mut file: u8 = 0;
            let rank = 7 - rank_idx as u8; // FEN lists rank 8 .. 1
            for ch in rank_str.chars() {
                if let Some(d) = ch.to_digit(10) {
                    file += d as u8;
                } else {
                    let color = if ch.is_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    let kind = match ch.to_ascii_lowercase() {
                        'p' => PieceKind::Pawn,
                        'n' => PieceKind::Knight,
                        'b' => PieceKind::Bishop,
                        'r' => PieceKind::Rook,
                        'q' => PieceKind::Queen,
                        'k' => PieceKind::King,
                        _ => return Err(FenError::BadBoard(parts[0].to_string())),
                    };
                    if file > 7 {
                        return Err(FenError::BadBoard(parts[0].to_string()));
                    }
                    let sq = sq_from_coords(file, rank);
                    pos.put_piece_raw(Piece { color, kind }, sq);
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::BadBoard(parts[0].to_string()));
                }
            }
            if file != 8 {
                return Err(FenError::BadBoard(parts[0].to_string()));
            }
        }

        if pos.pieces(Color::White, PieceKind::King).popcount() != 1
            || pos.pieces(Color::Black, PieceKind::King).popcount() != 1
        {
            return Err(FenError::BadKingCount);
        }

        pos.side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::BadSideToMove(other.to_string())),
        };

        if parts[2] != "-" {
            for c in parts[2].chars() {
                pos.castling.0 |= match c {
                    'K' => CastlingRights::WHITE_KING,
                    'Q' => CastlingRights::WHITE_QUEEN,
                    'k' => CastlingRights::BLACK_KING,
                    'q' => CastlingRights::BLACK_QUEEN,
                    _ => return Err(FenError::BadCastling(parts[2].to_string())),
                };
            }
        }

        pos.en_passant = if parts[3] == "-" {
            None
        } else {
            Some(
                coord_to_sq(parts[3])
                    .ok_or_else(|| FenError::BadEnPassant(parts[3].to_string()))?,
            )
        };

        if let Some(field) = parts.get(4) {
            pos.halfmove_clock = field
                .parse()
                .map_err(|_| FenError::BadClock(field.to_string()))?;
        }
        if let Some(field) = parts.get(5) {
            pos.fullmove_number = field
                .parse()
                .map_err(|_| FenError::BadClock(field.to_string()))?;
        }

        pos.key = pos.compute_key();
        pos.pawn_key = pos.compute_pawn_key();
        Ok(pos)
    }

    /// Emit the position in Forsyth-Edwards Notation.
    pub fn to_fen(&self) -> String {
        let mut out = String::new();
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.mailbox[sq_from_coords(file, rank) as usize] {
                    None => empty += 1,
                    Some(piece) => {
                        if empty > 0 {
                            out.push(char::from_digit(empty, 10).unwrap());
                            empty = 0;
                        }
                        let ch = match piece.kind {
                            PieceKind::Pawn => 'p',
                            PieceKind::Knight => 'n',
                            PieceKind::Bishop => 'b',
                            PieceKind::Rook => 'r',
                            PieceKind::Queen => 'q',
                            PieceKind::King => 'k',
                        };
                        out.push(if piece.color == Color::White {
                            ch.to_ascii_uppercase()
                        } else {
                            ch
                        });
                    }
                }
            }
            if empty > 0 {
                out.push(char::from_digit(empty, 10).unwrap());
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(if self.side_to_move == Color::White {
            'w'
        } else {
            'b'
        });

        out.push(' ');
        if self.castling == CastlingRights::NONE {
            out.push('-');
        } else {
            if self.castling.has(CastlingRights::WHITE_KING) {
                out.push('K');
            }
            if self.castling.has(CastlingRights::WHITE_QUEEN) {
                out.push('Q');
            }
            if self.castling.has(CastlingRights::BLACK_KING) {
                out.push('k');
            }
            if self.castling.has(CastlingRights::BLACK_QUEEN) {
                out.push('q');
            }
        }

        out.push(' ');
        match self.en_passant {
            None => out.push('-'),
            Some(sq) => out.push_str(&sq_to_coord(sq)),
        }

        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        out
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline(always)]
    pub fn pieces(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.piece_bb[color.idx()][kind.idx()]
    }

    #[inline(always)]
    pub fn color_occ(&self, color: Color) -> Bitboard {
        self.color_bb[color.idx()]
    }

    #[inline(always)]
    pub fn occupied(&self) -> Bitboard {
        self.color_bb[0] | self.color_bb[1]
    }

    #[inline(always)]
    pub fn piece_at(&self, sq: u8) -> Option<Piece> {
        self.mailbox[sq as usize]
    }

    #[inline(always)]
    pub fn king_sq(&self, color: Color) -> u8 {
        self.pieces(color, PieceKind::King)
            .lsb()
            .expect("position has a king per side")
    }

    #[inline(always)]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline(always)]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline(always)]
    pub fn en_passant(&self) -> Option<u8> {
        self.en_passant
    }

    #[inline(always)]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline(always)]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    #[inline(always)]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline(always)]
    pub fn pawn_key(&self) -> u64 {
        self.pawn_key
    }

    /// Plies played since this position was set up.
    #[inline(always)]
    pub fn ply_from_root(&self) -> usize {
        self.history.len()
    }

    /// Value of all non-pawn, non-king material for one side.
    pub fn non_pawn_material(&self, color: Color) -> i32 {
        let mut total = 0;
        for kind in [
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ] {
            total += self.pieces(color, kind).popcount() as i32 * SEE_PIECE_VALUES[kind.idx()];
        }
        total
    }

    // ------------------------------------------------------------------
    // Zobrist keys
    // ------------------------------------------------------------------

    /// Recompute the full key from scratch. Used at setup and by tests
    /// verifying the incremental updates.
    pub fn compute_key(&self) -> u64 {
        let mut key = 0u64;
        for sq in 0..64u8 {
            if let Some(piece) = self.mailbox[sq as usize] {
                key ^= ZOBRIST.piece_key(piece, sq);
            }
        }
        if self.side_to_move == Color::Black {
            key ^= ZOBRIST.side_to_move;
        }
        key ^= ZOBRIST.castling_key(self.castling);
        if let Some(ep) = self.en_passant {
            key ^= ZOBRIST.ep_key(file_of(ep));
        }
        key
    }

    /// Recompute the pawn-structure key from scratch.
    pub fn compute_pawn_key(&self) -> u64 {
        let mut key = 0u64;
        for color in [Color::White, Color::Black] {
            let mut pawns = self.pieces(color, PieceKind::Pawn);
            while let Some(sq) = pawns.pop_lsb() {
                key ^= ZOBRIST.piece_key(
                    Piece {
                        color,
                        kind: PieceKind::Pawn,
                    },
                    sq,
                );
            }
        }
        key
    }

    // ------------------------------------------------------------------
    // Piece movement primitives
    // ------------------------------------------------------------------

    /// Place a piece without touching the keys (setup / unmake).
    #[inline(always)]
    fn put_piece_raw(&mut self, piece: Piece, sq: u8) {
        self.piece_bb[piece.color.idx()][piece.kind.idx()].set(sq);
        self.color_bb[piece.color.idx()].set(sq);
        self.mailbox[sq as usize] = Some(piece);
    }

    /// Remove a piece without touching the keys (unmake).
    #[inline(always)]
    fn remove_piece_raw(&mut self, sq: u8) -> Piece {
        let piece = self.mailbox[sq as usize].expect("square is occupied");
        self.piece_bb[piece.color.idx()][piece.kind.idx()].clear(sq);
        self.color_bb[piece.color.idx()].clear(sq);
        self.mailbox[sq as usize] = None;
        piece
    }

    /// Place a piece and fold it into the keys.
    #[inline(always)]
    fn put_piece(&mut self, piece: Piece, sq: u8) {
        self.put_piece_raw(piece, sq);
        self.key ^= ZOBRIST.piece_key(piece, sq);
        if piece.kind == PieceKind::Pawn {
            self.pawn_key ^= ZOBRIST.piece_key(piece, sq);
        }
    }

    /// Remove a piece and fold it out of the keys.
    #[inline(always)]
    fn remove_piece(&mut self, sq: u8) -> Piece {
        let piece = self.remove_piece_raw(sq);
        self.key ^= ZOBRIST.piece_key(piece, sq);
        if piece.kind == PieceKind::Pawn {
            self.pawn_key ^= ZOBRIST.piece_key(piece, sq);
        }
        piece
    }

    #[inline(always)]
    fn move_piece(&mut self, from: u8, to: u8) {
        let piece = self.remove_piece(from);
        self.put_piece(piece, to);
    }

    #[inline(always)]
    fn move_piece_raw(&mut self, from: u8, to: u8) {
        let piece = self.remove_piece_raw(from);
        self.put_piece_raw(piece, to);
    }

    // ------------------------------------------------------------------
    // Make / unmake
    // ------------------------------------------------------------------

    /// Apply a pseudo-legal move. Legality is the caller's concern; an
    /// illegal move here is a programmer error.
    pub fn make_move(&mut self, mv: Move) {
        let us = self.side_to_move;
        let them = us.other();
        let from = mv.from();
        let to = mv.to();
        let moved = self.mailbox[from as usize].expect("no piece on from-square");
        debug_assert_eq!(moved.color, us);

        self.history.push(Undo {
            mv,
            captured: None,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            key: self.key,
            pawn_key: self.pawn_key,
        });

        if let Some(ep) = self.en_passant {
            self.key ^= ZOBRIST.ep_key(file_of(ep));
            self.en_passant = None;
        }
        self.halfmove_clock += 1;

        let mut captured = None;
        match mv.flags() {
            FLAG_QUIET => {
                self.move_piece(from, to);
                if moved.kind == PieceKind::Pawn {
                    self.halfmove_clock = 0;
                }
            }
            FLAG_DOUBLE_PUSH => {
                self.move_piece(from, to);
                self.halfmove_clock = 0;
                let ep = if us == Color::White { from + 8 } else { from - 8 };
                self.en_passant = Some(ep);
                self.key ^= ZOBRIST.ep_key(file_of(ep));
            }
            FLAG_CASTLE_KING => {
                self.move_piece(from, to);
                self.move_piece(from + 3, from + 1);
            }
            FLAG_CASTLE_QUEEN => {
                self.move_piece(from, to);
                self.move_piece(from - 4, from - 1);
            }
            FLAG_CAPTURE => {
                captured = Some(self.remove_piece(to));
                self.move_piece(from, to);
                self.halfmove_clock = 0;
            }
            FLAG_EN_PASSANT => {
                let cap_sq = if us == Color::White { to - 8 } else { to + 8 };
                captured = Some(self.remove_piece(cap_sq));
                self.move_piece(from, to);
                self.halfmove_clock = 0;
            }
            _ => {
                // Promotions, with or without capture
                debug_assert!(mv.is_promotion());
                if mv.is_capture() {
                    captured = Some(self.remove_piece(to));
                }
                self.remove_piece(from);
                self.put_piece(
                    Piece {
                        color: us,
                        kind: mv.promo().expect("promotion flag carries a piece"),
                    },
                    to,
                );
                self.halfmove_clock = 0;
            }
        }

        // Castling rights: clear bits for touched corner/king squares.
        // The table is zero almost everywhere, and castling_key(old) ==
        // castling_key(new) when nothing changed, so the XOR pair is a
        // no-op in the common case.
        let cleared = CASTLING_CLEAR[from as usize] | CASTLING_CLEAR[to as usize];
        if cleared != 0 {
            self.key ^= ZOBRIST.castling_key(self.castling);
            self.castling.0 &= !cleared;
            self.key ^= ZOBRIST.castling_key(self.castling);
        }

        if us == Color::Black {
            self.fullmove_number += 1;
        }
        self.side_to_move = them;
        self.key ^= ZOBRIST.side_to_move;

        if let Some(undo) = self.history.last_mut() {
            undo.captured = captured;
        }
    }

    /// Revert the most recent move. Keys and irreversible state come
    /// back from the history record; only the piece placement is undone
    /// by hand.
    pub fn unmake_move(&mut self) {
        let undo = self.history.pop().expect("unmake without a prior make");
        let mv = undo.mv;
        let from = mv.from();
        let to = mv.to();

        self.side_to_move = self.side_to_move.other();
        let us = self.side_to_move;
        if us == Color::Black {
            self.fullmove_number -= 1;
        }

        match mv.flags() {
            FLAG_QUIET | FLAG_DOUBLE_PUSH => self.move_piece_raw(to, from),
            FLAG_CASTLE_KING => {
                self.move_piece_raw(to, from);
                self.move_piece_raw(from + 1, from + 3);
            }
            FLAG_CASTLE_QUEEN => {
                self.move_piece_raw(to, from);
                self.move_piece_raw(from - 1, from - 4);
            }
            FLAG_CAPTURE => {
                self.move_piece_raw(to, from);
                self.put_piece_raw(undo.captured.expect("capture stored a piece"), to);
            }
            FLAG_EN_PASSANT => {
                self.move_piece_raw(to, from);
                let cap_sq = if us == Color::White { to - 8 } else { to + 8 };
                self.put_piece_raw(undo.captured.expect("capture stored a piece"), cap_sq);
            }
            _ => {
                self.remove_piece_raw(to);
                self.put_piece_raw(
                    Piece {
                        color: us,
                        kind: PieceKind::Pawn,
                    },
                    from,
                );
                if let Some(captured) = undo.captured {
                    self.put_piece_raw(captured, to);
                }
            }
        }

        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.key = undo.key;
        self.pawn_key = undo.pawn_key;
    }

    /// Pass the move: switch sides, clear en passant. Used by null-move
    /// pruning. Never call while in check.
    pub fn make_null_move(&mut self) {
        self.history.push(Undo {
            mv: Move::NONE,
            captured: None,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            key: self.key,
            pawn_key: self.pawn_key,
        });

        if let Some(ep) = self.en_passant {
            self.key ^= ZOBRIST.ep_key(file_of(ep));
            self.en_passant = None;
        }
        self.halfmove_clock += 1;
        if self.side_to_move == Color::Black {
            self.fullmove_number += 1;
        }
        self.side_to_move = self.side_to_move.other();
        self.key ^= ZOBRIST.side_to_move;
    }

    pub fn unmake_null_move(&mut self) {
        let undo = self.history.pop().expect("unmake without a prior make");
        debug_assert!(undo.mv.is_none());
        self.side_to_move = self.side_to_move.other();
        if self.side_to_move == Color::Black {
            self.fullmove_number -= 1;
        }
        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.key = undo.key;
        self.pawn_key = undo.pawn_key;
    }

    /// The move most recently applied, if any. `Move::NONE` for a null move.
    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|u| u.mv)
    }

    // ------------------------------------------------------------------
    // Attack queries
    // ------------------------------------------------------------------

    /// All pieces of both colors attacking `sq` under the given occupancy.
    pub fn attackers_to(&self, sq: u8, occupied: Bitboard) -> Bitboard {
        (pawn_attacks(Color::White, sq) & self.pieces(Color::Black, PieceKind::Pawn))
            | (pawn_attacks(Color::Black, sq) & self.pieces(Color::White, PieceKind::Pawn))
            | (knight_attacks(sq)
                & (self.pieces(Color::White, PieceKind::Knight)
                    | self.pieces(Color::Black, PieceKind::Knight)))
            | (king_attacks(sq)
                & (self.pieces(Color::White, PieceKind::King)
                    | self.pieces(Color::Black, PieceKind::King)))
            | (rook_attacks(sq, occupied) & self.major_sliders())
            | (bishop_attacks(sq, occupied) & self.diagonal_sliders())
    }

    #[inline(always)]
    fn major_sliders(&self) -> Bitboard {
        self.pieces(Color::White, PieceKind::Rook)
            | self.pieces(Color::Black, PieceKind::Rook)
            | self.pieces(Color::White, PieceKind::Queen)
            | self.pieces(Color::Black, PieceKind::Queen)
    }

    #[inline(always)]
    fn diagonal_sliders(&self) -> Bitboard {
        self.pieces(Color::White, PieceKind::Bishop)
            | self.pieces(Color::Black, PieceKind::Bishop)
            | self.pieces(Color::White, PieceKind::Queen)
            | self.pieces(Color::Black, PieceKind::Queen)
    }

    /// Is `sq` attacked by any piece of `by`, under an explicit occupancy?
    /// The occupancy parameter lets king-evasion checks look through the
    /// moving king.
    pub fn is_square_attacked_occ(&self, sq: u8, by: Color, occupied: Bitboard) -> bool {
        if !(pawn_attacks(by.other(), sq) & self.pieces(by, PieceKind::Pawn)).is_empty() {
            return true;
        }
        if !(knight_attacks(sq) & self.pieces(by, PieceKind::Knight)).is_empty() {
            return true;
        }
        if !(king_attacks(sq) & self.pieces(by, PieceKind::King)).is_empty() {
            return true;
        }
        let rq = self.pieces(by, PieceKind::Rook) | self.pieces(by, PieceKind::Queen);
        if !(rook_attacks(sq, occupied) & rq).is_empty() {
            return true;
        }
        let bq = self.pieces(by, PieceKind::Bishop) | self.pieces(by, PieceKind::Queen);
        !(bishop_attacks(sq, occupied) & bq).is_empty()
    }

    #[inline]
    pub fn is_square_attacked(&self, sq: u8, by: Color) -> bool {
        self.is_square_attacked_occ(sq, by, self.occupied())
    }

    #[inline]
    pub fn in_check(&self, color: Color) -> bool {
        self.is_square_attacked(self.king_sq(color), color.other())
    }

    /// Pieces of the opponent currently giving check to the side to move.
    pub fn checkers(&self) -> Bitboard {
        let ksq = self.king_sq(self.side_to_move);
        self.attackers_to(ksq, self.occupied()) & self.color_occ(self.side_to_move.other())
    }

    /// Own pieces of `color` that are absolutely pinned to their king.
    pub fn pinned(&self, color: Color) -> Bitboard {
        let ksq = self.king_sq(color);
        let them = color.other();
        let occ = self.occupied();
        let mut pinned = Bitboard::EMPTY;

        let snipers = (rook_attacks(ksq, Bitboard::EMPTY)
            & (self.pieces(them, PieceKind::Rook) | self.pieces(them, PieceKind::Queen)))
            | (bishop_attacks(ksq, Bitboard::EMPTY)
                & (self.pieces(them, PieceKind::Bishop) | self.pieces(them, PieceKind::Queen)));

        let mut candidates = snipers;
        while let Some(sniper) = candidates.pop_lsb() {
            let blockers = between(ksq, sniper) & occ;
            if !blockers.more_than_one() {
                pinned |= blockers & self.color_occ(color);
            }
        }
        pinned
    }

    // ------------------------------------------------------------------
    // Static exchange evaluation
    // ------------------------------------------------------------------

    /// Material balance of the exchange starting with `mv`, assuming both
    /// sides keep recapturing with their least valuable attacker while it
    /// pays to do so. Positive means the capture wins material.
    pub fn see(&self, mv: Move) -> i32 {
        let from = mv.from();
        let to = mv.to();
        let us = self.side_to_move;

        let mut gain = [0i32; 32];
        let mut occ = self.occupied();
        let mut attacker_kind = match self.mailbox[from as usize] {
            Some(piece) => piece.kind,
            None => return 0,
        };

        gain[0] = if mv.is_en_passant() {
            let cap_sq = if us == Color::White { to - 8 } else { to + 8 };
            occ.clear(cap_sq);
            SEE_PIECE_VALUES[PieceKind::Pawn.idx()]
        } else {
            self.mailbox[to as usize]
                .map(|p| SEE_PIECE_VALUES[p.kind.idx()])
                .unwrap_or(0)
        };

        occ.clear(from);
        let mut attackers = self.attackers_to(to, occ) & occ;
        let mut stm = us.other();
        let mut depth = 0usize;

        loop {
            // X-ray attackers uncovered by the last removal
            attackers |= (rook_attacks(to, occ) & self.major_sliders())
                | (bishop_attacks(to, occ) & self.diagonal_sliders());
            attackers &= occ;

            let Some((att_bb, kind)) = self.least_valuable_attacker(attackers, stm) else {
                break;
            };

            depth += 1;
            if depth >= gain.len() {
                break;
            }
            gain[depth] = SEE_PIECE_VALUES[attacker_kind.idx()] - gain[depth - 1];

            // Neither side continues a provably losing exchange
            if (-gain[depth - 1]).max(gain[depth]) < 0 {
                break;
            }

            occ ^= att_bb;
            attacker_kind = kind;
            stm = stm.other();
        }

        while depth > 0 {
            gain[depth - 1] = -(-gain[depth - 1]).max(gain[depth]);
            depth -= 1;
        }
        gain[0]
    }

    /// SEE threshold test, for ordering and pruning decisions.
    #[inline]
    pub fn see_ge(&self, mv: Move, threshold: i32) -> bool {
        self.see(mv) >= threshold
    }

    fn least_valuable_attacker(
        &self,
        attackers: Bitboard,
        color: Color,
    ) -> Option<(Bitboard, PieceKind)> {
        for kind in PieceKind::ALL {
            let subset = attackers & self.pieces(color, kind);
            if let Some(sq) = subset.lsb() {
                return Some((Bitboard::from_square(sq), kind));
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Draw detection
    // ------------------------------------------------------------------

    #[inline]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// Neither side can possibly deliver mate: bare kings, a lone minor,
    /// two knights against a bare king, or same-colored single bishops.
    pub fn is_insufficient_material(&self) -> bool {
        let pawns = self.pieces(Color::White, PieceKind::Pawn)
            | self.pieces(Color::Black, PieceKind::Pawn);
        let majors = self.pieces(Color::White, PieceKind::Rook)
            | self.pieces(Color::Black, PieceKind::Rook)
            | self.pieces(Color::White, PieceKind::Queen)
            | self.pieces(Color::Black, PieceKind::Queen);
        if !pawns.is_empty() || !majors.is_empty() {
            return false;
        }

        let knights = self.pieces(Color::White, PieceKind::Knight)
            | self.pieces(Color::Black, PieceKind::Knight);
        let bishops = self.pieces(Color::White, PieceKind::Bishop)
            | self.pieces(Color::Black, PieceKind::Bishop);
        let minors = knights | bishops;

        match minors.popcount() {
            0 | 1 => true,
            2 => {
                // Two knights cannot force mate; two bishops on the same
                // square color (one per side or both same side) cannot
                // either.
                if knights.popcount() == 2 {
                    true
                } else if bishops.popcount() == 2 {
                    let dark = (bishops & Bitboard::DARK_SQUARES).popcount();
                    dark == 0 || dark == 2
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Number of earlier positions in the history with the same key,
    /// scanning only as far back as the halfmove clock allows.
    pub fn repetition_count(&self) -> u32 {
        let mut count = 0;
        let n = self.history.len();
        let window = self.halfmove_clock as usize;
        // Equal keys imply an equal side to move, so scanning every entry
        // (not just every other) stays correct when null moves sit in the
        // history and shift the parity.
        let mut back = 2;
        while back <= n && back <= window {
            if self.history[n - back].key == self.key {
                count += 1;
            }
            back += 1;
        }
        count
    }

    /// True once the current position occurred at least once before.
    /// Sufficient for the search to score a repetition as a draw.
    #[inline]
    pub fn is_repetition(&self) -> bool {
        self.repetition_count() >= 1
    }

    /// Game-level draw: 50-move rule, threefold repetition, or
    /// insufficient material.
    pub fn is_draw(&self) -> bool {
        self.is_fifty_move_draw() || self.repetition_count() >= 2 || self.is_insufficient_material()
    }
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod board_tests;
