//! Tapered static evaluation.
//!
//! Scores are accumulated in a packed 32-bit word holding the midgame
//! half in the low 16 bits and the endgame half in the high 16 bits,
//! each biased by 2^15 so signed subtotals can ride on unsigned
//! wrapping adds. The final score interpolates the two halves by a
//! game-phase factor derived from non-pawn material, is scaled down in
//! drawish endgames, and is returned from the side to move's
//! perspective.
//!
//! All weight tables are data-only tuning inputs.

use chess_core::{
    bishop_attacks, distance, file_bb, king_attacks, knight_attacks, pawn_attacks, queen_attacks,
    rank_of, rook_attacks, Bitboard, Color, PieceKind, Position, ADJACENT_FILES, FORWARD_FILE,
    PASSED_PAWN_MASK, PAWN_ATTACK_SPAN,
};

/// Packed midgame/endgame score pair (the SWAR technique).
pub type Score = u32;

/// Bias point: zero in both halves.
pub const EVAL_ZERO: Score = 0x8000_8000;

/// Encode a midgame/endgame pair.
#[inline(always)]
pub const fn e(mg: i32, eg: i32) -> Score {
    ((eg as u32) << 16).wrapping_add(mg as u32)
}

/// Midgame half of a biased accumulator.
#[inline(always)]
pub const fn dec_mg(total: Score) -> i32 {
    (total & 0xFFFF) as i32 - 0x8000
}

/// Endgame half of a biased accumulator.
#[inline(always)]
pub const fn dec_eg(total: Score) -> i32 {
    (total >> 16) as i32 - 0x8000
}

// Unbiased decode of a single packed constant (not an accumulator).
// A negative midgame half borrowed one from the endgame half when the
// constant was packed, so give it back.
#[inline(always)]
const fn raw_mg(s: Score) -> i32 {
    (s & 0xFFFF) as u16 as i16 as i32
}

#[inline(always)]
const fn raw_eg(s: Score) -> i32 {
    let hi = (s >> 16) as u16 as i16 as i32;
    if raw_mg(s) < 0 { hi + 1 } else { hi }
}

/// Multiply a packed constant by a small count.
#[inline(always)]
fn scale(s: Score, n: i32) -> Score {
    e(raw_mg(s) * n, raw_eg(s) * n)
}

// ---------------------------------------------------------------------------
// Game phase
// ---------------------------------------------------------------------------

const EG_FACTOR_PIECE_VALS: [i32; 5] = [33, 370, 373, 675, 1574];
const EG_FACTOR_ALPHA: i32 = 2210;
const EG_FACTOR_BETA: i32 = 6350;
const EG_FACTOR_RES: i32 = 1000;

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

const MG: usize = 0;
const EG: usize = 1;

pub const PIECE_VALUES: [[i32; 5]; 2] = [
    [100, 396, 438, 681, 1349],
    [134, 407, 451, 746, 1441],
];

pub const KNOWN_WIN: i32 = PIECE_VALUES[EG][0] * 75;

const BISHOP_PAIR_VALUE: Score = e(56, 56);
const TEMPO_VALUE: i32 = 21;

// Material imbalance terms, own piece (row) vs opponent piece (column)
const OWN_OPP_IMBALANCE: [[[i32; 5]; 5]; 2] = [
    [
        [0, 0, 0, 0, 0],
        [2, 0, 0, 0, 0],
        [-1, -3, 0, 0, 0],
        [-5, -5, -16, 0, 0],
        [11, -10, -8, -17, 0],
    ],
    [
        [0, 0, 0, 0, 0],
        [6, 0, 0, 0, 0],
        [5, 6, 0, 0, 0],
        [1, -15, -21, 0, 0],
        [13, 0, 7, 27, 0],
    ],
];

// Bonus for knights in closed positions, per knight per rammed pawn pair
const KNIGHT_CLOSED_BONUS: [i32; 2] = [1, 4];

// ---------------------------------------------------------------------------
// Piece-square tables
// ---------------------------------------------------------------------------

// 32 entries per piece: rank 8 first, files a-d (mirrored for e-h),
// from White's point of view.
#[rustfmt::skip]
const PIECE_SQUARE_TABLE: [[[i32; 32]; 6]; 2] = [
// Midgame
[
[ // Pawns
  0,  0,  0,  0,
 18, 10, 28, 42,
  8, 15, 30, 35,
 -2,  5,  2, 16,
-12, -4,  2,  9,
-10, -1,  0,  2,
 -6,  6, -1,  0,
  0,  0,  0,  0
],
[ // Knights
-128,-44,-37,-32,
-26,-16, -1, 14,
 -5,  7, 17, 32,
 12, 10, 26, 30,
  5, 10, 18, 22,
-13,  6,  6, 16,
-17,-10, -6,  3,
-50,-16,-11, -8
],
[ // Bishops
-16,-20,-15,-15,
-20,-15,-10, -8,
 10,  5,  1,  2,
  0, 12,  5, 15,
  5,  6,  6, 16,
  1, 10, -3,  8,
  5,  3, 10,  2,
-10,  3, -5, -2
],
[ // Rooks
 -5,  0,  0,  0,
  5, 10, 10, 10,
 -5,  0,  0,  0,
 -5,  0,  0,  0,
 -5,  0,  0,  0,
 -5,  0,  0,  0,
 -5,  0,  0,  0,
 -5,  0,  0,  0
],
[ // Queens
-25,-21,-10, -5,
-13,-24, -9, -8,
 -8,  0,  0,  2,
 -5, -3, -3, -6,
 -3,  0, -3, -6,
 -6,  5, -1, -2,
-10,  2,  4,  2,
-16,-16,-10, -2
],
[ // Kings
-37,-32,-34,-45,
-34,-28,-32,-38,
-32,-24,-28,-30,
-31,-27,-30,-31,
-35,-20,-32,-32,
 -9, 20,-17,-23,
 35, 52,  9,-14,
 34, 59, 21,-10
]
],
// Endgame
[
[ // Pawns
  0,  0,  0,  0,
 28, 28, 30, 30,
 26, 26, 20, 20,
  8,  8,  2,  2,
 -5, -3, -2, -2,
-12, -3,  0,  0,
-12, -3,  2,  2,
  0,  0,  0,  0
],
[ // Knights
-65,-27,-18, -7,
-10,  0,  6, 10,
  0,  5, 13, 18,
  4, 11, 18, 25,
  0,  9, 16, 24,
 -7,  3,  7, 17,
-10,  0, -3,  6,
-31,-14, -8,  0
],
[ // Bishops
-12,-10, -7, -4,
 -8, -7,  0,  0,
 -2,  2,  0,  1,
 -3,  2,  3,  1,
 -3,  0,  2,  2,
 -5, -1,  0,  2,
 -8, -6, -3, -2,
-13,-12,  0, -2
],
[ // Rooks
  0,  0,  0,  0,
  0,  0,  0,  0,
  0,  0,  0,  0,
  0,  0,  0,  0,
  0,  0,  0,  0,
  0,  0,  0,  0,
  0,  0,  0,  0,
  0,  0,  0,  0
],
[ // Queens
-14, -5, -1, -1,
 -6,  5, 10, 16,
 -2, 13, 18, 22,
  0, 16, 20, 26,
  0, 16, 20, 24,
 -4,  4,  8, 10,
-19,-14,-12, -8,
-26,-23,-23,-18
],
[ // Kings
-68,-18,-14, -7,
-12, 20, 28, 28,
  7, 34, 40, 42,
 -8, 25, 34, 36,
-13, 14, 24, 27,
-20, -2, 10, 14,
-26, -7,  4,  6,
-64,-36,-20,-17
]
]
];

/// PST index for a piece of `color` on `sq`.
#[inline]
fn pst_index(color: Color, sq: u8) -> usize {
    let rank = match color {
        Color::White => 7 - rank_of(sq),
        Color::Black => rank_of(sq),
    } as usize;
    let file = (sq & 7) as usize;
    rank * 4 + file.min(7 - file)
}

// ---------------------------------------------------------------------------
// Mobility
// ---------------------------------------------------------------------------

#[rustfmt::skip]
const MOBILITY_TABLE: [[&[i32]; 5]; 2] = [
// Midgame
[
    &[-60, -9, 12, 23, 30, 34, 37, 40, 46],
    &[-46,-17,  0, 10, 18, 22, 25, 29, 31, 33, 39, 43, 49, 53],
    &[-97,-55,-18, -6, -2,  3,  7, 11, 15, 19, 22, 25, 27, 29, 32],
    &[-98,-80,-60,-37,-26,-17,-11, -8, -5, -3, -1,  2,  5,  7,
       10, 12, 15, 17, 19, 21, 23, 25, 26, 27, 29, 30, 31, 32],
    &[-20, 14, 25, 16, 11,  6, -2, -6, -5],
],
// Endgame
[
    &[-98,-49, -4,  8, 18, 26, 30, 32, 33],
    &[-98,-53,-20,  3, 12, 22, 26, 31, 35, 38, 42, 45, 47, 48],
    &[-102,-63, -4, 25, 36, 48, 55, 61, 67, 72, 77, 81, 86, 90, 94],
    &[-105,-82,-66,-44,-29,-20,-11, -2,  4, 10, 15, 18, 20, 23,
       25, 27, 29, 31, 33, 35, 37, 39, 41, 43, 45, 47, 49, 51],
    &[-50,-14,  0, 17, 18, 13, 18, 17,  6],
],
];

// Center control, per attacked square
const EXTENDED_CENTER_VAL: Score = e(2, 0);
const CENTER_BONUS: Score = e(4, 0);

// Space, midgame only: [behind own pawn | in front of opp pawn][center files]
const SPACE_BONUS: [[i32; 2]; 2] = [[12, 37], [0, 10]];

// ---------------------------------------------------------------------------
// King safety
// ---------------------------------------------------------------------------

const CASTLING_RIGHTS_VALUE: [i32; 3] = [0, 30, 70];

// Pawn shield, by file distance from the edge of the king's file
// neighborhood and rank of the shielding pawn. The rank-0 entry is the
// missing-pawn penalty.
const PAWN_SHIELD_VALUE: [[i32; 8]; 4] = [
    [-15, 22, 25, 11, 6, 7, 3, 0],   // open h file, h2, h3, ...
    [-20, 39, 24, 0, -6, 2, 2, 0],   // g/b file
    [-17, 38, 2, -6, -5, -3, 3, 0],  // f/c file
    [-6, 14, 8, 5, -5, -10, -5, 0],  // d/e file
];

// Pawn storm, by [status][file kind][storming pawn rank]. The rank-1
// entry of the open table is the no-opposing-pawn penalty.
const PAWN_STORM_VALUE: [[[i32; 8]; 4]; 3] = [
    // Open file
    [
        [14, -24, 35, 21, 15, 0, 0, 0],
        [17, -23, 56, 16, 9, 0, 0, 0],
        [10, 15, 53, 27, 19, 0, 0, 0],
        [11, 0, 30, 19, 14, 0, 0, 0],
    ],
    // Blocked pawn
    [
        [0, 0, 26, 1, 0, 0, 0, 0],
        [0, 0, 62, 3, 1, 0, 0, 0],
        [0, 0, 66, 4, 0, 0, 0, 0],
        [0, 0, 57, 11, 3, 0, 0, 0],
    ],
    // Non-blocked pawn
    [
        [0, -2, 26, 16, 3, 0, 0, 0],
        [0, -8, 28, 17, 12, 0, 0, 0],
        [0, -1, 37, 21, 11, 0, 0, 0],
        [0, -3, 10, 22, 7, 0, 0, 0],
    ],
];

const KS_ARRAY_FACTOR: i32 = 128;
const KING_THREAT_MULTIPLIER: [i32; 4] = [8, 5, 7, 3];
const KING_THREAT_SQUARE: [i32; 4] = [8, 10, 7, 10];
const KING_DEFENSELESS_SQUARE: i32 = 24;
const KS_PAWN_FACTOR: i32 = 10;
const KING_PRESSURE: i32 = 3;
const KS_NO_KNIGHT_DEFENDER: i32 = 15;
const KS_NO_BISHOP_DEFENDER: i32 = 15;
const KS_BISHOP_PRESSURE: i32 = 8;
const KS_NO_QUEEN: i32 = -44;
const KS_BASE: i32 = -18;
const SAFE_CHECK_BONUS: [i32; 4] = [56, 25, 65, 53];

// ---------------------------------------------------------------------------
// Minor pieces
// ---------------------------------------------------------------------------

const BISHOP_PAWN_COLOR_PENALTY: Score = e(-8, -6);
const BISHOP_RAMMED_PAWN_COLOR_PENALTY: Score = e(-3, -9);
const SHIELDED_MINOR_BONUS: Score = e(13, 0);
const KNIGHT_OUTPOST_BONUS: Score = e(29, 23);
const KNIGHT_OUTPOST_PAWN_DEF_BONUS: Score = e(23, 9);
const KNIGHT_POTENTIAL_OUTPOST_BONUS: Score = e(9, 14);
const KNIGHT_POTENTIAL_OUTPOST_PAWN_DEF_BONUS: Score = e(14, 12);
const BISHOP_OUTPOST_BONUS: Score = e(27, 18);
const BISHOP_OUTPOST_PAWN_DEF_BONUS: Score = e(26, 14);
const BISHOP_POTENTIAL_OUTPOST_BONUS: Score = e(6, 12);
const BISHOP_POTENTIAL_OUTPOST_PAWN_DEF_BONUS: Score = e(17, 7);
const BISHOP_FIANCHETTO_BONUS: Score = e(26, 0);

// ---------------------------------------------------------------------------
// Rooks
// ---------------------------------------------------------------------------

const ROOK_OPEN_FILE_BONUS: Score = e(37, 11);
const ROOK_SEMIOPEN_FILE_BONUS: Score = e(22, 1);
const ROOK_PAWN_RANK_THREAT: Score = e(7, 14);

// ---------------------------------------------------------------------------
// Threats
// ---------------------------------------------------------------------------

const UNDEFENDED_PAWN: Score = e(-1, -17);
const UNDEFENDED_MINOR: Score = e(-21, -40);
const PAWN_PIECE_THREAT: Score = e(-75, -31);
const MINOR_ROOK_THREAT: Score = e(-71, -20);
const MINOR_QUEEN_THREAT: Score = e(-71, -33);
const ROOK_QUEEN_THREAT: Score = e(-78, -34);
const LOOSE_PAWN: Score = e(-14, -2);
const LOOSE_MINOR: Score = e(-15, -6);

// ---------------------------------------------------------------------------
// Pawn structure
// ---------------------------------------------------------------------------

const PASSER_BONUS: [Score; 8] = [
    e(0, 0),
    e(1, 5),
    e(1, 5),
    e(10, 18),
    e(30, 27),
    e(60, 54),
    e(114, 118),
    e(0, 0),
];
const PASSER_FILE_BONUS: [Score; 8] = [
    e(15, 17),
    e(8, 11),
    e(-8, 1),
    e(-12, -7),
    e(-12, -7),
    e(-8, 1),
    e(8, 11),
    e(15, 17),
];
const FREE_PROMOTION_BONUS: Score = e(8, 24);
const FREE_STOP_BONUS: Score = e(6, 11);
const FULLY_DEFENDED_PASSER_BONUS: Score = e(10, 14);
const DEFENDED_PASSER_BONUS: Score = e(9, 9);
const OWN_KING_DIST: Score = e(0, 3);
const OPP_KING_DIST: Score = e(0, 7);

const DOUBLED_PENALTY: Score = e(-3, -20);
const ISOLATED_PENALTY: Score = e(-15, -8);
const ISOLATED_SEMIOPEN_PENALTY: Score = e(-8, -13);
const BACKWARD_PENALTY: Score = e(-9, -7);
const BACKWARD_SEMIOPEN_PENALTY: Score = e(-20, -12);
const UNDEFENDED_PAWN_PENALTY: Score = e(-6, -2);
const PAWN_PHALANX_BONUS: [Score; 8] = [
    e(0, 0),
    e(5, 2),
    e(5, 2),
    e(12, 9),
    e(29, 22),
    e(54, 44),
    e(75, 74),
    e(0, 0),
];
const PAWN_CONNECTED_BONUS: [Score; 8] = [
    e(0, 0),
    e(0, 0),
    e(14, 5),
    e(7, 6),
    e(16, 12),
    e(37, 32),
    e(68, 62),
    e(0, 0),
];

// ---------------------------------------------------------------------------
// Endgame scaling
// ---------------------------------------------------------------------------

const MAX_SCALE_FACTOR: i32 = 32;
const OPPOSITE_BISHOP_SCALING: [i32; 2] = [13, 29];
const PAWNLESS_SCALING: [i32; 4] = [1, 4, 8, 23];

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// Attack maps and shared sets computed once per evaluation.
struct EvalInfo {
    /// Squares attacked by pawns, per color.
    pawn_attacks: [Bitboard; 2],
    /// Squares attacked by each non-pawn piece kind, per color.
    attacked_by: [[Bitboard; 6]; 2],
    /// Union of everything a color attacks.
    attacked: [Bitboard; 2],
    /// Squares a color attacks at least twice.
    attacked2: [Bitboard; 2],
    /// Own pawns blocked head-on by an enemy pawn.
    rammed: [Bitboard; 2],
    mobility_area: [Bitboard; 2],
}

impl EvalInfo {
    fn compute(pos: &Position) -> EvalInfo {
        let occ = pos.occupied();
        let mut info = EvalInfo {
            pawn_attacks: [Bitboard::EMPTY; 2],
            attacked_by: [[Bitboard::EMPTY; 6]; 2],
            attacked: [Bitboard::EMPTY; 2],
            attacked2: [Bitboard::EMPTY; 2],
            rammed: [Bitboard::EMPTY; 2],
            mobility_area: [Bitboard::EMPTY; 2],
        };

        for color in [Color::White, Color::Black] {
            let c = color.idx();
            let pawns = pos.pieces(color, PieceKind::Pawn);
            info.pawn_attacks[c] = match color {
                Color::White => pawns.north_east() | pawns.north_west(),
                Color::Black => pawns.south_east() | pawns.south_west(),
            };
            let mut all = info.pawn_attacks[c];
            // Pawn attacks of two pawns onto one square count double,
            // but tracking that costs more than it is worth here.
            let mut twice = Bitboard::EMPTY;

            for kind in [
                PieceKind::Knight,
                PieceKind::Bishop,
                PieceKind::Rook,
                PieceKind::Queen,
                PieceKind::King,
            ] {
                let mut movers = pos.pieces(color, kind);
                let mut kind_attacks = Bitboard::EMPTY;
                while let Some(sq) = movers.pop_lsb() {
                    let attacks = match kind {
                        PieceKind::Knight => knight_attacks(sq),
                        PieceKind::Bishop => bishop_attacks(sq, occ),
                        PieceKind::Rook => rook_attacks(sq, occ),
                        PieceKind::Queen => queen_attacks(sq, occ),
                        _ => king_attacks(sq),
                    };
                    twice |= all & attacks;
                    all |= attacks;
                    kind_attacks |= attacks;
                }
                info.attacked_by[c][kind.idx()] = kind_attacks;
            }

            info.attacked[c] = all;
            info.attacked2[c] = twice;

            let enemy_pawns = pos.pieces(color.other(), PieceKind::Pawn);
            info.rammed[c] = match color {
                Color::White => pawns & enemy_pawns.south(),
                Color::Black => pawns & enemy_pawns.north(),
            };
        }

        for color in [Color::White, Color::Black] {
            let c = color.idx();
            info.mobility_area[c] = !(pos.pieces(color, PieceKind::Pawn)
                | pos.pieces(color, PieceKind::King)
                | info.pawn_attacks[color.other().idx()]);
        }

        info
    }
}

/// Per-feature (midgame, endgame) contributions per color, for
/// regression testing.
#[cfg(feature = "trace")]
#[derive(Debug, Default, Clone)]
pub struct EvalTrace {
    pub material: [(i32, i32); 2],
    pub pst: [(i32, i32); 2],
    pub imbalance: [(i32, i32); 2],
    pub mobility: [(i32, i32); 2],
    pub pawns: [(i32, i32); 2],
    pub king_safety: [(i32, i32); 2],
    pub minors: [(i32, i32); 2],
    pub rooks: [(i32, i32); 2],
    pub threats: [(i32, i32); 2],
    pub space: [(i32, i32); 2],
}

macro_rules! record {
    ($trace:expr, $field:ident, $c:expr, $score:expr) => {
        #[cfg(feature = "trace")]
        if let Some(t) = $trace.as_mut() {
            let biased = EVAL_ZERO.wrapping_add($score);
            t.$field[$c] = (dec_mg(biased), dec_eg(biased));
        }
        #[cfg(not(feature = "trace"))]
        {
            let _ = (&$trace, $c);
        }
    };
}

#[cfg(feature = "trace")]
type TraceArg = Option<EvalTrace>;
#[cfg(not(feature = "trace"))]
type TraceArg = Option<()>;

/// Static evaluation in centipawns, from the side to move's
/// perspective.
pub fn evaluate(pos: &Position) -> i32 {
    evaluate_inner(pos, &mut None)
}

/// Evaluation with a per-feature breakdown, for regression tests.
#[cfg(feature = "trace")]
pub fn evaluate_trace(pos: &Position) -> (i32, EvalTrace) {
    let mut trace = Some(EvalTrace::default());
    let score = evaluate_inner(pos, &mut trace);
    (score, trace.unwrap())
}

fn evaluate_inner(pos: &Position, trace: &mut TraceArg) -> i32 {
    if pos.is_insufficient_material() {
        return 0;
    }
    if let Some(score) = known_endgame(pos) {
        return if pos.side_to_move() == Color::White {
            score
        } else {
            -score
        };
    }

    let info = EvalInfo::compute(pos);
    let mut total: Score = EVAL_ZERO;

    for color in [Color::White, Color::Black] {
        let c = color.idx();
        let mut side: Score = 0;

        let material = material_score(pos, color);
        let pst = pst_score(pos, color);
        let imbalance = imbalance_score(pos, color);
        let mobility = mobility_score(pos, color, &info);
        let pawns = pawn_structure_score(pos, color);
        let king = king_safety_score(pos, color, &info);
        let minors = minor_piece_score(pos, color, &info);
        let rooks = rook_score(pos, color);
        let threats = threat_score(pos, color, &info);
        let space = space_score(pos, color, &info);

        record!(trace, material, c, material);
        record!(trace, pst, c, pst);
        record!(trace, imbalance, c, imbalance);
        record!(trace, mobility, c, mobility);
        record!(trace, pawns, c, pawns);
        record!(trace, king_safety, c, king);
        record!(trace, minors, c, minors);
        record!(trace, rooks, c, rooks);
        record!(trace, threats, c, threats);
        record!(trace, space, c, space);

        side = side
            .wrapping_add(material)
            .wrapping_add(pst)
            .wrapping_add(imbalance)
            .wrapping_add(mobility)
            .wrapping_add(pawns)
            .wrapping_add(king)
            .wrapping_add(minors)
            .wrapping_add(rooks)
            .wrapping_add(threats)
            .wrapping_add(space);

        total = match color {
            Color::White => total.wrapping_add(side),
            Color::Black => total.wrapping_sub(side),
        };
    }

    let mg = dec_mg(total);
    let eg = dec_eg(total);

    // Phase interpolation: 0 at full material, EG_FACTOR_RES at bare
    // kings, saturating at both tuned endpoints.
    let eg_factor = game_phase(pos);
    let mut score = (mg * (EG_FACTOR_RES - eg_factor) + eg * eg_factor) / EG_FACTOR_RES;

    // Drawish endgame damping
    let scale = endgame_scale(pos, score);
    score = score * scale / MAX_SCALE_FACTOR;

    let score = if pos.side_to_move() == Color::White {
        score
    } else {
        -score
    };
    score + TEMPO_VALUE
}

/// 0 = pure midgame, EG_FACTOR_RES = pure endgame.
fn game_phase(pos: &Position) -> i32 {
    let mut material = 0;
    for color in [Color::White, Color::Black] {
        for kind in [
            PieceKind::Pawn,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ] {
            material +=
                pos.pieces(color, kind).popcount() as i32 * EG_FACTOR_PIECE_VALS[kind.idx()];
        }
    }
    ((EG_FACTOR_BETA - material) * EG_FACTOR_RES / (EG_FACTOR_BETA - EG_FACTOR_ALPHA))
        .clamp(0, EG_FACTOR_RES)
}

fn material_score(pos: &Position, color: Color) -> Score {
    let mut mg = 0;
    let mut eg = 0;
    for kind in [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        let count = pos.pieces(color, kind).popcount() as i32;
        mg += PIECE_VALUES[MG][kind.idx()] * count;
        eg += PIECE_VALUES[EG][kind.idx()] * count;
    }
    let mut score = e(mg, eg);
    if pos.pieces(color, PieceKind::Bishop).popcount() >= 2 {
        score = score.wrapping_add(BISHOP_PAIR_VALUE);
    }
    score
}

fn pst_score(pos: &Position, color: Color) -> Score {
    let mut mg = 0;
    let mut eg = 0;
    for kind in PieceKind::ALL {
        let mut pieces = pos.pieces(color, kind);
        while let Some(sq) = pieces.pop_lsb() {
            let idx = pst_index(color, sq);
            mg += PIECE_SQUARE_TABLE[MG][kind.idx()][idx];
            eg += PIECE_SQUARE_TABLE[EG][kind.idx()][idx];
        }
    }
    e(mg, eg)
}

fn imbalance_score(pos: &Position, color: Color) -> Score {
    let mut us = [0i32; 5];
    let mut them = [0i32; 5];
    for k in 0..5 {
        us[k] = pos.pieces(color, PieceKind::from_idx(k)).popcount() as i32;
        them[k] = pos.pieces(color.other(), PieceKind::from_idx(k)).popcount() as i32;
    }

    let mut mg = 0;
    let mut eg = 0;
    for own in 0..5 {
        for opp in 0..=own {
            mg += OWN_OPP_IMBALANCE[MG][own][opp] * us[own] * them[opp];
            eg += OWN_OPP_IMBALANCE[EG][own][opp] * us[own] * them[opp];
        }
    }

    // Knights are worth a bit more in closed positions
    let own_pawns = pos.pieces(color, PieceKind::Pawn);
    let enemy_pawns = pos.pieces(color.other(), PieceKind::Pawn);
    let rammed = match color {
        Color::White => own_pawns & enemy_pawns.south(),
        Color::Black => own_pawns & enemy_pawns.north(),
    };
    let rammed_pairs = rammed.popcount() as i32;
    let knights = pos.pieces(color, PieceKind::Knight).popcount() as i32;
    mg += KNIGHT_CLOSED_BONUS[MG] * knights * rammed_pairs / 2;
    eg += KNIGHT_CLOSED_BONUS[EG] * knights * rammed_pairs / 2;

    e(mg, eg)
}

fn mobility_score(pos: &Position, color: Color, info: &EvalInfo) -> Score {
    let occ = pos.occupied();
    let area = info.mobility_area[color.idx()];
    let mut mg = 0;
    let mut eg = 0;

    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ] {
        let row = kind.idx() - 1;
        let mut movers = pos.pieces(color, kind);
        while let Some(sq) = movers.pop_lsb() {
            let attacks = match kind {
                PieceKind::Knight => knight_attacks(sq),
                PieceKind::Bishop => bishop_attacks(sq, occ),
                PieceKind::Rook => rook_attacks(sq, occ),
                PieceKind::Queen => queen_attacks(sq, occ),
                _ => king_attacks(sq),
            };
            let count = (attacks & area).popcount() as usize;
            let mg_row = MOBILITY_TABLE[MG][row];
            let eg_row = MOBILITY_TABLE[EG][row];
            mg += mg_row[count.min(mg_row.len() - 1)];
            eg += eg_row[count.min(eg_row.len() - 1)];
        }
    }

    // Center control rides with mobility: a small bonus per attacked
    // extended-center square, more for the four true center squares.
    let attacked = info.attacked[color.idx()];
    let extended = (attacked & Bitboard::EXTENDED_CENTER).popcount() as i32;
    let center = (attacked & Bitboard::CENTER).popcount() as i32;
    e(mg, eg)
        .wrapping_add(scale(EXTENDED_CENTER_VAL, extended))
        .wrapping_add(scale(CENTER_BONUS, center))
}

fn pawn_structure_score(pos: &Position, color: Color) -> Score {
    let us = color.idx();
    let them = color.other();
    let own_pawns = pos.pieces(color, PieceKind::Pawn);
    let enemy_pawns = pos.pieces(them, PieceKind::Pawn);
    let own_king = pos.king_sq(color);
    let enemy_king = pos.king_sq(them);

    let mut score: Score = 0;
    let mut pawns = own_pawns;
    while let Some(sq) = pawns.pop_lsb() {
        let file = sq & 7;
        let rel_rank = match color {
            Color::White => rank_of(sq),
            Color::Black => 7 - rank_of(sq),
        } as usize;
        let defended = !(pawn_attacks(them, sq) & own_pawns).is_empty();
        let neighbors = ADJACENT_FILES[file as usize] & own_pawns;
        let semiopen = (FORWARD_FILE[us][sq as usize] & enemy_pawns).is_empty();

        // Doubled: another own pawn ahead on the same file
        if !(FORWARD_FILE[us][sq as usize] & own_pawns).is_empty() {
            score = score.wrapping_add(DOUBLED_PENALTY);
        }

        if neighbors.is_empty() {
            score = score.wrapping_add(ISOLATED_PENALTY);
            if semiopen {
                score = score.wrapping_add(ISOLATED_SEMIOPEN_PENALTY);
            }
        } else {
            // Backward: no friendly pawn alongside or behind on the
            // adjacent files, and the stop square is contested by an
            // enemy pawn.
            let supported_later =
                !(neighbors & !chess_core::FORWARD_RANKS[us][sq as usize]).is_empty();
            let stop = match color {
                Color::White => sq + 8,
                Color::Black => sq - 8,
            };
            let stop_contested = !(pawn_attacks(them, stop) & enemy_pawns).is_empty();
            if !supported_later && stop_contested {
                score = score.wrapping_add(BACKWARD_PENALTY);
                if semiopen {
                    score = score.wrapping_add(BACKWARD_SEMIOPEN_PENALTY);
                }
            } else if !defended {
                score = score.wrapping_add(UNDEFENDED_PAWN_PENALTY);
            }

            // Phalanx: a neighbor on the same rank
            let phalanx = ADJACENT_FILES[file as usize]
                & chess_core::rank_bb(rank_of(sq))
                & own_pawns;
            if !phalanx.is_empty() {
                score = score.wrapping_add(PAWN_PHALANX_BONUS[rel_rank]);
            }
        }

        if defended {
            score = score.wrapping_add(PAWN_CONNECTED_BONUS[rel_rank]);
        }

        // Passed pawns
        if (PASSED_PAWN_MASK[us][sq as usize] & enemy_pawns).is_empty()
            && (FORWARD_FILE[us][sq as usize] & own_pawns).is_empty()
        {
            score = score.wrapping_add(PASSER_BONUS[rel_rank]);
            score = score.wrapping_add(PASSER_FILE_BONUS[file as usize]);

            let stop = match color {
                Color::White => sq + 8,
                Color::Black => sq - 8,
            };
            if (FORWARD_FILE[us][sq as usize] & pos.occupied()).is_empty() {
                score = score.wrapping_add(FREE_PROMOTION_BONUS);
            } else if pos.piece_at(stop).is_none() {
                score = score.wrapping_add(FREE_STOP_BONUS);
            }
            if defended {
                score = score.wrapping_add(DEFENDED_PASSER_BONUS);
                if !(pawn_attacks(them, stop) & own_pawns).is_empty() {
                    score = score.wrapping_add(FULLY_DEFENDED_PASSER_BONUS);
                }
            }
            // King proximity matters most in the endgame
            score = score.wrapping_sub(scale(OWN_KING_DIST, distance(own_king, stop) as i32));
            score = score.wrapping_add(scale(OPP_KING_DIST, distance(enemy_king, stop) as i32));
        }
    }
    score
}

fn king_safety_score(pos: &Position, color: Color, info: &EvalInfo) -> Score {
    let us = color.idx();
    let them = color.other();
    let ksq = pos.king_sq(color);
    let king_file = ksq & 7;
    let occ = pos.occupied();
    let own_pawns = pos.pieces(color, PieceKind::Pawn);
    let enemy_pawns = pos.pieces(them, PieceKind::Pawn);

    let mut mg = 0;

    // Castling rights retain the option of tucking the king away
    let rights = pos.castling();
    let right_count =
        (rights.king_side(color) as usize + rights.queen_side(color) as usize).min(2);
    mg += CASTLING_RIGHTS_VALUE[right_count];

    // Pawn shield and storm over the king's file neighborhood
    let lo = king_file.saturating_sub(1);
    let hi = (king_file + 1).min(7);
    let mut shield = 0;
    let mut storm = 0;
    for file in lo..=hi {
        let file_kind = (file.min(7 - file)).min(3) as usize;
        let own_on_file = own_pawns & file_bb(file);
        let enemy_on_file = enemy_pawns & file_bb(file);

        // Shield pawn: own pawn closest to our back rank
        let shield_rank = match color {
            Color::White => own_on_file.lsb().map(|s| rank_of(s)),
            Color::Black => own_on_file.msb().map(|s| 7 - rank_of(s)),
        };
        shield += PAWN_SHIELD_VALUE[file_kind][shield_rank.unwrap_or(0) as usize];

        // Storm pawn: enemy pawn closest to our king
        let storm_rank = match color {
            Color::White => enemy_on_file.lsb().map(|s| rank_of(s)),
            Color::Black => enemy_on_file.msb().map(|s| 7 - rank_of(s)),
        };
        let status = if own_on_file.is_empty() {
            0 // open
        } else if !(match color {
            Color::White => enemy_on_file.south(),
            Color::Black => enemy_on_file.north(),
        } & own_on_file)
            .is_empty()
        {
            1 // blocked
        } else {
            2 // non-blocked
        };
        storm += PAWN_STORM_VALUE[status][file_kind][storm_rank.unwrap_or(1) as usize];
    }
    mg += shield;
    mg -= storm;

    // Attack-unit danger
    let zone = king_attacks(ksq) | Bitboard::from_square(ksq);
    let mut danger = KS_BASE;

    for kind in [
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        let k = kind.idx() - 1;
        let mut attackers = 0;
        let mut zone_hits = 0;
        let mut movers = pos.pieces(them, kind);
        while let Some(sq) = movers.pop_lsb() {
            let attacks = match kind {
                PieceKind::Knight => knight_attacks(sq),
                PieceKind::Bishop => bishop_attacks(sq, occ),
                PieceKind::Rook => rook_attacks(sq, occ),
                _ => queen_attacks(sq, occ),
            };
            let hits = attacks & zone;
            if !hits.is_empty() {
                attackers += 1;
                zone_hits += hits.popcount() as i32;
            }
        }
        danger += KING_THREAT_MULTIPLIER[k] * attackers;
        danger += KING_THREAT_SQUARE[k] * zone_hits;

        // Safe checking squares for this piece kind
        let check_from = match kind {
            PieceKind::Knight => knight_attacks(ksq),
            PieceKind::Bishop => bishop_attacks(ksq, occ),
            PieceKind::Rook => rook_attacks(ksq, occ),
            _ => queen_attacks(ksq, occ),
        };
        let safe = check_from
            & info.attacked_by[them.idx()][kind.idx()]
            & !info.attacked[us]
            & !pos.color_occ(them);
        if !safe.is_empty() {
            danger += SAFE_CHECK_BONUS[k];
        }
    }

    // Zone squares we cannot answer on
    let defenseless = zone & info.attacked[them.idx()] & !info.attacked2[us];
    danger += KING_DEFENSELESS_SQUARE * defenseless.popcount() as i32;

    // General pressure on the zone
    danger += KING_PRESSURE * (zone & info.attacked[them.idx()]).popcount() as i32;

    // Enemy bishops eyeing the king's diagonals through traffic
    let diag = bishop_attacks(ksq, enemy_pawns | own_pawns);
    if !(diag & pos.pieces(them, PieceKind::Bishop)).is_empty() {
        danger += KS_BISHOP_PRESSURE;
    }

    if pos.pieces(them, PieceKind::Queen).is_empty() {
        danger += KS_NO_QUEEN;
    }
    if (info.attacked_by[us][PieceKind::Knight.idx()] & zone).is_empty() {
        danger += KS_NO_KNIGHT_DEFENDER;
    }
    if (info.attacked_by[us][PieceKind::Bishop.idx()] & zone).is_empty() {
        danger += KS_NO_BISHOP_DEFENDER;
    }

    // The pawn wall buys danger down
    danger -= shield / KS_PAWN_FACTOR;

    if danger > 0 {
        mg -= danger * danger / KS_ARRAY_FACTOR;
    }

    e(mg, 0)
}

fn minor_piece_score(pos: &Position, color: Color, info: &EvalInfo) -> Score {
    let us = color.idx();
    let them = color.other();
    let own_pawns = pos.pieces(color, PieceKind::Pawn);
    let enemy_pawns = pos.pieces(them, PieceKind::Pawn);
    let mut score: Score = 0;

    // Outpost home: our half's central ranks, shielded from enemy pawns
    let outpost_ranks = match color {
        Color::White => Bitboard::RANK_4 | Bitboard::RANK_5 | Bitboard::RANK_6,
        Color::Black => Bitboard::RANK_5 | Bitboard::RANK_4 | Bitboard::RANK_3,
    };

    let is_outpost = |sq: u8| -> bool {
        outpost_ranks.contains(sq)
            && (PAWN_ATTACK_SPAN[us][sq as usize] & enemy_pawns).is_empty()
    };
    let pawn_defended = |sq: u8| -> bool { !(pawn_attacks(them, sq) & own_pawns).is_empty() };

    for (kind, on, on_def, pot, pot_def) in [
        (
            PieceKind::Knight,
            KNIGHT_OUTPOST_BONUS,
            KNIGHT_OUTPOST_PAWN_DEF_BONUS,
            KNIGHT_POTENTIAL_OUTPOST_BONUS,
            KNIGHT_POTENTIAL_OUTPOST_PAWN_DEF_BONUS,
        ),
        (
            PieceKind::Bishop,
            BISHOP_OUTPOST_BONUS,
            BISHOP_OUTPOST_PAWN_DEF_BONUS,
            BISHOP_POTENTIAL_OUTPOST_BONUS,
            BISHOP_POTENTIAL_OUTPOST_PAWN_DEF_BONUS,
        ),
    ] {
        let mut minors = pos.pieces(color, kind);
        while let Some(sq) = minors.pop_lsb() {
            if is_outpost(sq) {
                score = score.wrapping_add(on);
                if pawn_defended(sq) {
                    score = score.wrapping_add(on_def);
                }
            } else {
                // A reachable outpost still shapes the position
                let reach = match kind {
                    PieceKind::Knight => knight_attacks(sq),
                    _ => bishop_attacks(sq, pos.occupied()),
                } & !pos.color_occ(color);
                let mut reachable = reach & outpost_ranks;
                while let Some(target) = reachable.pop_lsb() {
                    if is_outpost(target) {
                        score = score.wrapping_add(pot);
                        if pawn_defended(target) {
                            score = score.wrapping_add(pot_def);
                        }
                        break;
                    }
                }
            }

            // A pawn directly in front shelters the minor
            let front = match color {
                Color::White => sq + 8 <= 63 && own_pawns.contains(sq + 8),
                Color::Black => sq >= 8 && own_pawns.contains(sq - 8),
            };
            if front {
                score = score.wrapping_add(SHIELDED_MINOR_BONUS);
            }
        }
    }

    // Bishop-specific pawn interactions
    let mut bishops = pos.pieces(color, PieceKind::Bishop);
    while let Some(sq) = bishops.pop_lsb() {
        let my_color_squares = if Bitboard::DARK_SQUARES.contains(sq) {
            Bitboard::DARK_SQUARES
        } else {
            Bitboard::LIGHT_SQUARES
        };
        let same_color_pawns = (own_pawns & my_color_squares).popcount() as i32;
        score = score.wrapping_add(scale(BISHOP_PAWN_COLOR_PENALTY, same_color_pawns));
        let rammed_same =
            (info.rammed[us] & my_color_squares).popcount() as i32;
        score = score.wrapping_add(scale(BISHOP_RAMMED_PAWN_COLOR_PENALTY, rammed_same));

        // Fianchetto: the bishop sits in the castled king's pocket with
        // its supporting pawn advanced
        let fianchetto = match color {
            Color::White => {
                (sq == 9 && own_pawns.contains(17)) || (sq == 14 && own_pawns.contains(22))
            }
            Color::Black => {
                (sq == 49 && own_pawns.contains(41)) || (sq == 54 && own_pawns.contains(46))
            }
        };
        if fianchetto {
            score = score.wrapping_add(BISHOP_FIANCHETTO_BONUS);
        }
    }

    score
}

fn rook_score(pos: &Position, color: Color) -> Score {
    let them = color.other();
    let own_pawns = pos.pieces(color, PieceKind::Pawn);
    let enemy_pawns = pos.pieces(them, PieceKind::Pawn);
    let mut score: Score = 0;

    let mut rooks = pos.pieces(color, PieceKind::Rook);
    while let Some(sq) = rooks.pop_lsb() {
        let file = file_bb(sq & 7);
        if ((own_pawns | enemy_pawns) & file).is_empty() {
            score = score.wrapping_add(ROOK_OPEN_FILE_BONUS);
        } else if (own_pawns & file).is_empty() {
            score = score.wrapping_add(ROOK_SEMIOPEN_FILE_BONUS);
        }

        // A rook on the seventh feasts on the pawns still at home
        let rel_rank = match color {
            Color::White => rank_of(sq),
            Color::Black => 7 - rank_of(sq),
        };
        if rel_rank == 6 {
            let victims =
                (enemy_pawns & chess_core::rank_bb(rank_of(sq))).popcount() as i32;
            score = score.wrapping_add(scale(ROOK_PAWN_RANK_THREAT, victims));
        }
    }
    score
}

fn threat_score(pos: &Position, color: Color, info: &EvalInfo) -> Score {
    let us = color.idx();
    let them = color.other();
    let mut score: Score = 0;

    let own_pawns = pos.pieces(color, PieceKind::Pawn);
    let minors =
        pos.pieces(color, PieceKind::Knight) | pos.pieces(color, PieceKind::Bishop);
    let enemy_attacks = info.attacked[them.idx()];
    let our_attacks = info.attacked[us];
    let enemy_pawn_attacks = info.pawn_attacks[them.idx()];
    let enemy_minor_attacks = info.attacked_by[them.idx()][PieceKind::Knight.idx()]
        | info.attacked_by[them.idx()][PieceKind::Bishop.idx()];
    let enemy_rook_attacks = info.attacked_by[them.idx()][PieceKind::Rook.idx()];

    // Hanging and underdefended material
    let threatened_pawns = own_pawns & enemy_attacks & !our_attacks;
    score = score.wrapping_add(scale(UNDEFENDED_PAWN, threatened_pawns.popcount() as i32));
    let threatened_minors = minors & enemy_attacks & !our_attacks;
    score = score.wrapping_add(scale(UNDEFENDED_MINOR, threatened_minors.popcount() as i32));

    // Attacks up the value chain
    let pieces = pos.color_occ(color) & !own_pawns;
    let pawn_threatened = pieces & enemy_pawn_attacks;
    score = score.wrapping_add(scale(PAWN_PIECE_THREAT, pawn_threatened.popcount() as i32));

    let rooks_hit = pos.pieces(color, PieceKind::Rook) & enemy_minor_attacks;
    score = score.wrapping_add(scale(MINOR_ROOK_THREAT, rooks_hit.popcount() as i32));
    let queens_hit_minor = pos.pieces(color, PieceKind::Queen) & enemy_minor_attacks;
    score = score.wrapping_add(scale(MINOR_QUEEN_THREAT, queens_hit_minor.popcount() as i32));
    let queens_hit_rook = pos.pieces(color, PieceKind::Queen) & enemy_rook_attacks;
    score = score.wrapping_add(scale(ROOK_QUEEN_THREAT, queens_hit_rook.popcount() as i32));

    // Loose pieces: nobody minds them at all
    let loose_pawns = own_pawns & !our_attacks & !enemy_attacks;
    score = score.wrapping_add(scale(LOOSE_PAWN, loose_pawns.popcount() as i32));
    let loose_minors = minors & !our_attacks;
    score = score.wrapping_add(scale(LOOSE_MINOR, loose_minors.popcount() as i32));

    score
}

fn space_score(pos: &Position, color: Color, info: &EvalInfo) -> Score {
    let us = color.idx();
    let them = color.other();
    let own_pawns = pos.pieces(color, PieceKind::Pawn);
    let enemy_pawns = pos.pieces(them, PieceKind::Pawn);

    // Home-side ranks 2-4, relative to the mover
    let area = match color {
        Color::White => Bitboard::RANK_2 | Bitboard::RANK_3 | Bitboard::RANK_4,
        Color::Black => Bitboard::RANK_7 | Bitboard::RANK_6 | Bitboard::RANK_5,
    };
    let center_files =
        Bitboard::FILE_C | Bitboard::FILE_D | Bitboard::FILE_E | Bitboard::FILE_F;

    let mut mg = 0;
    let mut candidates = area & !own_pawns & !info.pawn_attacks[them.idx()];
    while let Some(sq) = candidates.pop_lsb() {
        let central = center_files.contains(sq) as usize;
        if !(FORWARD_FILE[us][sq as usize] & own_pawns).is_empty() {
            mg += SPACE_BONUS[0][central];
        } else if !(FORWARD_FILE[us][sq as usize] & enemy_pawns).is_empty() {
            mg += SPACE_BONUS[1][central];
        }
    }
    // The per-square table values are in eighths of a centipawn
    e(mg / 8, 0)
}

// ---------------------------------------------------------------------------
// Known endgames and scaling
// ---------------------------------------------------------------------------

/// Formulaic scores for trivially won endings: drive the bare king to
/// the edge (for KBN, to a corner the bishop controls) and walk our
/// king up.
fn known_endgame(pos: &Position) -> Option<i32> {
    for (winner, loser) in [(Color::White, Color::Black), (Color::Black, Color::White)] {
        let loser_material = pos.non_pawn_material(loser)
            + pos.pieces(loser, PieceKind::Pawn).popcount() as i32;
        if loser_material != 0 {
            continue;
        }
        if !pos.pieces(winner, PieceKind::Pawn).is_empty() {
            // Pawn endings are graded by the full evaluation
            return None;
        }

        let queens = pos.pieces(winner, PieceKind::Queen).popcount();
        let rooks = pos.pieces(winner, PieceKind::Rook).popcount();
        let bishops = pos.pieces(winner, PieceKind::Bishop).popcount();
        let knights = pos.pieces(winner, PieceKind::Knight).popcount();

        let kbn = queens == 0 && rooks == 0 && bishops == 1 && knights == 1;
        let winnable = queens > 0
            || rooks > 0
            || kbn
            || (bishops >= 2
                && !(pos.pieces(winner, PieceKind::Bishop) & Bitboard::DARK_SQUARES).is_empty()
                && !(pos.pieces(winner, PieceKind::Bishop) & Bitboard::LIGHT_SQUARES)
                    .is_empty())
            || knights + bishops >= 3;
        if !winnable {
            continue;
        }

        let wk = pos.king_sq(winner);
        let lk = pos.king_sq(loser);
        let mut score = KNOWN_WIN + pos.non_pawn_material(winner);

        if kbn {
            // Herd toward a corner of the bishop's color
            let corners: [u8; 2] = if (pos.pieces(winner, PieceKind::Bishop)
                & Bitboard::DARK_SQUARES)
                .is_empty()
            {
                [56, 7] // light corners a8, h1
            } else {
                [0, 63] // dark corners a1, h8
            };
            let corner_dist = corners
                .iter()
                .map(|&c| distance(lk, c))
                .min()
                .unwrap_or(7) as i32;
            score += 40 * (7 - corner_dist);
        } else {
            score += 25 * edge_distance_penalty(lk);
        }
        score += 15 * (7 - distance(wk, lk) as i32);

        return Some(if winner == Color::White { score } else { -score });
    }
    None
}

/// 0 at the center, growing toward the edge.
fn edge_distance_penalty(sq: u8) -> i32 {
    let file = (sq & 7) as i32;
    let rank = (sq >> 3) as i32;
    let f = file.min(7 - file);
    let r = rank.min(7 - rank);
    6 - (f + r)
}

/// Scale factor out of MAX_SCALE_FACTOR for drawish material setups.
fn endgame_scale(pos: &Position, score: i32) -> i32 {
    let winner = if score >= 0 { Color::White } else { Color::Black };
    let loser = winner.other();

    // A piece-up side without pawns often cannot convert
    if pos.pieces(winner, PieceKind::Pawn).is_empty() {
        let diff = pos.non_pawn_material(winner) - pos.non_pawn_material(loser);
        if diff <= PIECE_VALUES[MG][PieceKind::Bishop.idx()] {
            let pieces = (pos.color_occ(winner).popcount() as usize).saturating_sub(1);
            return PAWNLESS_SCALING[pieces.min(3)];
        }
    }

    // Opposite-colored bishops
    let wb = pos.pieces(Color::White, PieceKind::Bishop);
    let bb = pos.pieces(Color::Black, PieceKind::Bishop);
    if wb.popcount() == 1 && bb.popcount() == 1 {
        let opposite = (wb & Bitboard::DARK_SQUARES).is_empty()
            != (bb & Bitboard::DARK_SQUARES).is_empty();
        if opposite {
            let only_bishops = pos.non_pawn_material(Color::White)
                == PIECE_VALUES[MG][PieceKind::Bishop.idx()]
                && pos.non_pawn_material(Color::Black)
                    == PIECE_VALUES[MG][PieceKind::Bishop.idx()];
            return if only_bishops {
                OPPOSITE_BISHOP_SCALING[0]
            } else {
                OPPOSITE_BISHOP_SCALING[1]
            };
        }
    }

    MAX_SCALE_FACTOR
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod eval_tests;
