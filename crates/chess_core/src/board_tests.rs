use super::*;
use crate::movegen::{generate_captures, is_legal, legal_moves};

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -";

#[test]
fn test_startpos_setup() {
    let pos = Position::startpos();
    assert_eq!(pos.side_to_move(), Color::White);
    assert_eq!(pos.castling(), CastlingRights::ALL);
    assert_eq!(pos.occupied().popcount(), 32);
    assert_eq!(pos.pieces(Color::White, PieceKind::Pawn).popcount(), 8);
    assert_eq!(pos.king_sq(Color::White), 4);
    assert_eq!(pos.king_sq(Color::Black), 60);
    assert_eq!(pos.key(), pos.compute_key());
    assert_eq!(pos.pawn_key(), pos.compute_pawn_key());
}

#[test]
fn test_fen_round_trip() {
    for fen in [
        START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
    ] {
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }
}

#[test]
fn test_fen_rejects_garbage() {
    assert!(matches!(
        Position::from_fen("only three fields here"),
        Err(FenError::MissingFields(_)) | Err(FenError::BadBoard(_))
    ));
    assert!(Position::from_fen("8/8/8/8/8/8/8/9 w - - 0 1").is_err());
    assert!(Position::from_fen("8/8/8/8/8/8/8/8 x - - 0 1").is_err());
    assert!(Position::from_fen(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq j9 0 1"
    )
    .is_err());
    // No kings
    assert!(matches!(
        Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1"),
        Err(FenError::BadKingCount)
    ));
}

#[test]
fn test_make_unmake_restores_state() {
    let mut pos = Position::from_fen(KIWIPETE).unwrap();
    let before = pos.clone();
    for mv in legal_moves(&pos) {
        pos.make_move(mv);
        assert_ne!(pos.key(), before.key());
        pos.unmake_move();
        assert_eq!(pos, before, "state differs after unmaking {mv:?}");
    }
}

#[test]
fn test_make_unmake_deep_walk() {
    // Every make/unmake pair down to depth 3 must restore the exact
    // state, and the incremental keys must match a fresh recomputation
    // at every node.
    fn walk(pos: &mut Position, depth: u8) {
        assert_eq!(pos.key(), pos.compute_key());
        assert_eq!(pos.pawn_key(), pos.compute_pawn_key());
        if depth == 0 {
            return;
        }
        for mv in legal_moves(pos) {
            let before = pos.clone();
            pos.make_move(mv);
            walk(pos, depth - 1);
            pos.unmake_move();
            assert_eq!(*pos, before);
        }
    }

    for fen in [START_FEN, KIWIPETE, "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - -"] {
        let mut pos = Position::from_fen(fen).unwrap();
        walk(&mut pos, 3);
    }
}

#[test]
fn test_castling_rights_revocation() {
    let mut pos = Position::from_fen(KIWIPETE).unwrap();
    // White castles king side: e1g1
    pos.make_move(Move::new(4, 6, FLAG_CASTLE_KING));
    assert!(!pos.castling().king_side(Color::White));
    assert!(!pos.castling().queen_side(Color::White));
    assert!(pos.castling().king_side(Color::Black));
    assert_eq!(pos.piece_at(5).map(|p| p.kind), Some(PieceKind::Rook));
    assert_eq!(pos.piece_at(6).map(|p| p.kind), Some(PieceKind::King));
    pos.unmake_move();
    assert_eq!(pos.castling(), CastlingRights::ALL);
}

#[test]
fn test_rook_capture_revokes_rights() {
    // Bishop takes the h8 rook; black loses king-side castling.
    let mut pos =
        Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    pos.make_move(Move::new(7, 63, FLAG_CAPTURE));
    assert!(!pos.castling().king_side(Color::Black));
    assert!(pos.castling().queen_side(Color::Black));
    assert!(!pos.castling().king_side(Color::White));
}

#[test]
fn test_en_passant_cycle() {
    let mut pos = Position::startpos();
    pos.make_move(Move::new(12, 28, FLAG_DOUBLE_PUSH)); // e2e4
    assert_eq!(pos.en_passant(), Some(20));
    pos.make_move(Move::new(50, 34, FLAG_DOUBLE_PUSH)); // c7c5
    assert_eq!(pos.en_passant(), Some(42));
    pos.make_move(Move::new(28, 36, FLAG_QUIET)); // e4e5
    pos.make_move(Move::new(51, 35, FLAG_DOUBLE_PUSH)); // d7d5
    let ep = Move::new(36, 43, FLAG_EN_PASSANT); // e5xd6 ep
    let before = pos.clone();
    pos.make_move(ep);
    assert_eq!(pos.piece_at(35), None); // the d5 pawn is gone
    assert_eq!(pos.piece_at(43).map(|p| p.kind), Some(PieceKind::Pawn));
    pos.unmake_move();
    assert_eq!(pos, before);
}

#[test]
fn test_promotion_cycle() {
    let mut pos = Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
    let mv = Move::promotion(48, 56, PieceKind::Queen, false);
    let before = pos.clone();
    pos.make_move(mv);
    assert_eq!(pos.piece_at(56).map(|p| p.kind), Some(PieceKind::Queen));
    assert!(pos.pieces(Color::White, PieceKind::Pawn).is_empty());
    pos.unmake_move();
    assert_eq!(pos, before);
}

#[test]
fn test_in_check_detection() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
    assert!(pos.in_check(Color::White));
    assert!(!pos.in_check(Color::Black));
    assert_eq!(pos.checkers().popcount(), 1);
}

#[test]
fn test_pinned_pieces() {
    // White knight on e2 is pinned against the king by the e8 rook.
    let pos = Position::from_fen("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1").unwrap();
    let pinned = pos.pinned(Color::White);
    assert_eq!(pinned.popcount(), 1);
    assert!(pinned.contains(12));
}

#[test]
fn test_see_simple_capture() {
    // Rook takes an undefended pawn: +100
    let pos = Position::from_fen("6k1/8/8/3p4/8/8/3R4/3K4 w - - 0 1").unwrap();
    let mv = Move::new(11, 35, FLAG_CAPTURE);
    assert_eq!(pos.see(mv), SEE_PIECE_VALUES[0]);
    assert!(pos.see_ge(mv, 0));
}

#[test]
fn test_see_losing_capture() {
    // Rook takes a pawn defended by a queen: 100 - 681
    let pos = Position::from_fen("3q2k1/8/8/3p4/8/8/3R4/3K4 w - - 0 1").unwrap();
    let mv = Move::new(11, 35, FLAG_CAPTURE);
    assert_eq!(pos.see(mv), SEE_PIECE_VALUES[0] - SEE_PIECE_VALUES[3]);
    assert!(!pos.see_ge(mv, 0));
}

#[test]
fn test_see_xray_recapture() {
    // Doubled rooks against a defended pawn: Rxc5 Rxc5 Rxc5 nets a pawn,
    // but only because the back rook x-rays through the front one.
    let pos = Position::from_fen("2r3k1/8/8/2p5/8/8/2R5/2R3K1 w - - 0 1").unwrap();
    let mv = Move::new(10, 34, FLAG_CAPTURE);
    assert_eq!(pos.see(mv), SEE_PIECE_VALUES[0]);

    // Remove the back rook and the same capture loses the exchange.
    let pos = Position::from_fen("2r3k1/8/8/2p5/8/8/2R5/6K1 w - - 0 1").unwrap();
    assert_eq!(pos.see(mv), SEE_PIECE_VALUES[0] - SEE_PIECE_VALUES[3]);
}

#[test]
fn test_see_losing_capture_has_recovering_recapture() {
    // Whenever an exchange loses material, the opponent must hold a
    // recapture on the same square that banks at least the amount lost.
    // Pseudo-legal recaptures mirror the exchange model, which does not
    // reason about pins either.
    for fen in [
        KIWIPETE,
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    ] {
        let mut pos = Position::from_fen(fen).unwrap();
        let pinned = pos.pinned(pos.side_to_move());
        let mut captures = Vec::new();
        generate_captures(&pos, &mut captures);

        for mv in captures {
            if mv.is_en_passant() || mv.is_promotion() || !is_legal(&pos, mv, pinned) {
                continue;
            }
            let v = pos.see(mv);
            if v >= 0 {
                continue;
            }
            pos.make_move(mv);
            let mut recaptures = Vec::new();
            generate_captures(&pos, &mut recaptures);
            let best = recaptures
                .iter()
                .filter(|r| r.to() == mv.to() && !r.is_en_passant())
                .map(|r| pos.see(*r))
                .max();
            pos.unmake_move();
            let best = best.expect("a losing exchange implies a recapture");
            assert!(
                best >= -v,
                "{fen}: {mv:?} loses {v} but best recapture only recovers {best}"
            );
        }
    }
}

#[test]
fn test_insufficient_material() {
    for fen in [
        "4k3/8/8/8/8/8/8/4K3 w - - 0 1",
        "4k3/8/8/8/8/8/8/2N1K3 w - - 0 1",
        "4k3/8/8/8/8/8/8/2B1K3 w - - 0 1",
        "4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1",
        // Same-colored bishops (both on dark squares)
        "2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1",
    ] {
        let pos = Position::from_fen(fen).unwrap();
        assert!(pos.is_insufficient_material(), "{fen}");
        assert!(pos.is_draw(), "{fen}");
    }

    for fen in [
        START_FEN,
        "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
        "4k3/8/8/8/8/8/8/3RK3 w - - 0 1",
        // Opposite-colored bishops can in principle mate
        "1b2k3/8/8/8/8/8/8/2B1K3 w - - 0 1",
    ] {
        let pos = Position::from_fen(fen).unwrap();
        assert!(!pos.is_insufficient_material(), "{fen}");
    }
}

#[test]
fn test_repetition_detection() {
    let mut pos = Position::startpos();
    assert!(!pos.is_repetition());
    // Shuffle knights back and forth twice: position repeats twice.
    for _ in 0..2 {
        pos.make_move(Move::new(6, 21, FLAG_QUIET)); // Ng1f3
        pos.make_move(Move::new(62, 45, FLAG_QUIET)); // Ng8f6
        pos.make_move(Move::new(21, 6, FLAG_QUIET)); // Nf3g1
        pos.make_move(Move::new(45, 62, FLAG_QUIET)); // Nf6g8
    }
    assert!(pos.is_repetition());
    assert_eq!(pos.repetition_count(), 2);
    assert!(pos.is_draw()); // threefold counting the root
}

#[test]
fn test_fifty_move_clock() {
    let mut pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 98 1").unwrap();
    assert!(!pos.is_fifty_move_draw());
    pos.make_move(Move::new(0, 8, FLAG_QUIET));
    pos.make_move(Move::new(60, 61, FLAG_QUIET));
    assert!(pos.is_fifty_move_draw());
    assert!(pos.is_draw());
}

#[test]
fn test_null_move_cycle() {
    let mut pos = Position::from_fen(KIWIPETE).unwrap();
    let before = pos.clone();
    pos.make_null_move();
    assert_eq!(pos.side_to_move(), Color::Black);
    assert_eq!(pos.en_passant(), None);
    assert_ne!(pos.key(), before.key());
    assert_eq!(pos.key(), pos.compute_key());
    pos.unmake_null_move();
    assert_eq!(pos, before);
}

#[test]
fn test_non_pawn_material() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
    assert_eq!(pos.non_pawn_material(Color::White), 0);
    let pos = Position::startpos();
    assert_eq!(
        pos.non_pawn_material(Color::White),
        pos.non_pawn_material(Color::Black)
    );
    assert!(pos.non_pawn_material(Color::White) > 0);
}
