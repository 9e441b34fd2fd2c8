use super::*;

/// Reference slider attack used to cross-check the magic tables.
fn naive_slider(dirs: &[(i8, i8); 4], sq: u8, occupied: Bitboard) -> Bitboard {
    sliding_attack(dirs, sq, occupied)
}

#[test]
fn test_knight_attacks() {
    // Knight on e4 attacks 8 squares
    let e4 = 28;
    assert_eq!(knight_attacks(e4).popcount(), 8);
    // Knight in the corner attacks 2
    assert_eq!(knight_attacks(0).popcount(), 2);
    assert!(knight_attacks(0).contains(17)); // a1 -> b3
    assert!(knight_attacks(0).contains(10)); // a1 -> c2
}

#[test]
fn test_king_attacks() {
    assert_eq!(king_attacks(28).popcount(), 8);
    assert_eq!(king_attacks(0).popcount(), 3);
    assert_eq!(king_attacks(7).popcount(), 3);
}

#[test]
fn test_pawn_attacks() {
    use crate::types::Color;
    // White pawn on e4 attacks d5 and f5
    let att = pawn_attacks(Color::White, 28);
    assert!(att.contains(35) && att.contains(37));
    // Black pawn on e4 attacks d3 and f3
    let att = pawn_attacks(Color::Black, 28);
    assert!(att.contains(19) && att.contains(21));
    // Edge pawns attack one square
    assert_eq!(pawn_attacks(Color::White, 8).popcount(), 1);
    assert_eq!(pawn_attacks(Color::Black, 15).popcount(), 1);
}

#[test]
fn test_rook_attacks_empty_board() {
    // Rook on a1: full file + full rank minus its own square
    let att = rook_attacks(0, Bitboard::EMPTY);
    assert_eq!(att.popcount(), 14);
    assert_eq!(att, (Bitboard::FILE_A | Bitboard::RANK_1) & !Bitboard::from_square(0));
}

#[test]
fn test_rook_attacks_blocked() {
    // Rook on a1 with a blocker on a3: sees a2, a3, and the whole rank
    let occ = Bitboard::from_square(16);
    let att = rook_attacks(0, occ);
    assert!(att.contains(8) && att.contains(16));
    assert!(!att.contains(24));
}

#[test]
fn test_bishop_attacks_blocked() {
    // Bishop on c1 with a blocker on e3
    let occ = Bitboard::from_square(20);
    let att = bishop_attacks(2, occ);
    assert!(att.contains(11)); // d2
    assert!(att.contains(20)); // e3 (the blocker itself)
    assert!(!att.contains(29)); // f4 is shadowed
}

#[test]
fn test_magic_tables_match_naive() {
    // Cross-check the magic lookups against the naive ray walker on a
    // spread of occupancies derived from a cheap counter hash.
    let mut state = 0x9E3779B97F4A7C15u64;
    for sq in 0u8..64 {
        for _ in 0..64 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let occ = Bitboard(state & state.rotate_left(31));
            assert_eq!(
                rook_attacks(sq, occ),
                naive_slider(&ROOK_DIRS, sq, occ),
                "rook mismatch on sq {sq}"
            );
            assert_eq!(
                bishop_attacks(sq, occ),
                naive_slider(&BISHOP_DIRS, sq, occ),
                "bishop mismatch on sq {sq}"
            );
        }
    }
}

#[test]
fn test_between() {
    // a1 to a8: the six squares between
    assert_eq!(between(0, 56).popcount(), 6);
    // a1 to h8 diagonal
    assert_eq!(between(0, 63).popcount(), 6);
    // Adjacent squares have nothing between them
    assert_eq!(between(0, 1), Bitboard::EMPTY);
    // Unaligned squares have nothing between them
    assert_eq!(between(0, 12), Bitboard::EMPTY);
}

#[test]
fn test_line_and_aligned() {
    assert_eq!(line(0, 7), Bitboard::RANK_1);
    assert_eq!(line(0, 56), Bitboard::FILE_A);
    assert!(aligned(0, 9, 63)); // a1, b2, h8
    assert!(!aligned(0, 9, 62)); // a1, b2, g8
    assert_eq!(line(0, 10), Bitboard::EMPTY);
}
