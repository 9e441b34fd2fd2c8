//! Randomized make/unmake soak test.
//!
//! Plays seeded random games and checks, at every ply, that the
//! incrementally maintained keys match a from-scratch recomputation and
//! that unwinding the whole game restores the starting state exactly.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use chess_core::{legal_moves, Position};

fn playout(fen: &str, seed: u64, max_plies: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pos = Position::from_fen(fen).unwrap();
    let initial = pos.clone();

    let mut played = 0;
    for _ in 0..max_plies {
        let moves = legal_moves(&pos);
        let Some(&mv) = moves.choose(&mut rng) else {
            break; // mate or stalemate
        };
        pos.make_move(mv);
        played += 1;

        assert_eq!(pos.key(), pos.compute_key(), "key drift after {mv:?}");
        assert_eq!(
            pos.pawn_key(),
            pos.compute_pawn_key(),
            "pawn key drift after {mv:?}"
        );

        // Piece bitboards stay disjoint and consistent with occupancy.
        let mut union = 0u64;
        let mut total = 0;
        for color in [chess_core::Color::White, chess_core::Color::Black] {
            for kind in chess_core::PieceKind::ALL {
                let bb = pos.pieces(color, kind);
                assert_eq!(union & bb.0, 0, "piece sets overlap after {mv:?}");
                union |= bb.0;
                total += bb.popcount();
            }
        }
        assert_eq!(union, pos.occupied().0);
        assert_eq!(total, pos.occupied().popcount());
    }

    for _ in 0..played {
        pos.unmake_move();
    }
    assert_eq!(pos, initial, "unwinding did not restore the initial state");
}

#[test]
fn random_playouts_from_startpos() {
    for seed in 0..20 {
        playout(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            seed,
            200,
        );
    }
}

#[test]
fn random_playouts_from_tactical_positions() {
    for (i, fen) in [
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    ]
    .iter()
    .enumerate()
    {
        for seed in 0..5 {
            playout(fen, 1000 * i as u64 + seed, 120);
        }
    }
}
