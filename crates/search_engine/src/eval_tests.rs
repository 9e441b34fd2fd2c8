use super::*;
use chess_core::Position;

/// Mirror a FEN vertically and swap colors, producing the
/// color-reversed counterpart of the position.
fn color_flip_fen(fen: &str) -> String {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    let board: Vec<String> = parts[0]
        .split('/')
        .rev()
        .map(|rank| {
            rank.chars()
                .map(|c| {
                    if c.is_ascii_alphabetic() {
                        if c.is_ascii_uppercase() {
                            c.to_ascii_lowercase()
                        } else {
                            c.to_ascii_uppercase()
                        }
                    } else {
                        c
                    }
                })
                .collect()
        })
        .collect();

    let stm = if parts[1] == "w" { "b" } else { "w" };

    let castling = if parts[2] == "-" {
        "-".to_string()
    } else {
        let mut flipped: Vec<char> = parts[2]
            .chars()
            .map(|c| {
                if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            })
            .collect();
        flipped.sort_by_key(|c| match c {
            'K' => 0,
            'Q' => 1,
            'k' => 2,
            'q' => 3,
            _ => 4,
        });
        flipped.into_iter().collect()
    };

    let ep = if parts[3] == "-" {
        "-".to_string()
    } else {
        let bytes = parts[3].as_bytes();
        let rank = bytes[1] - b'0';
        format!("{}{}", bytes[0] as char, 9 - rank)
    };

    format!(
        "{} {} {} {} {} {}",
        board.join("/"),
        stm,
        castling,
        ep,
        parts.get(4).unwrap_or(&"0"),
        parts.get(5).unwrap_or(&"1"),
    )
}

#[test]
fn test_packed_score_encoding() {
    for (mg, eg) in [(0, 0), (5, -3), (-8, -6), (-8, 6), (114, 118), (-75, -31)] {
        let s = e(mg, eg);
        let biased = EVAL_ZERO.wrapping_add(s);
        assert_eq!(dec_mg(biased), mg, "mg of ({mg},{eg})");
        assert_eq!(dec_eg(biased), eg, "eg of ({mg},{eg})");
    }
}

#[test]
fn test_packed_accumulation() {
    // Sums and differences of packed terms decode like the ints would.
    let total = EVAL_ZERO
        .wrapping_add(e(10, 20))
        .wrapping_add(e(-4, -30))
        .wrapping_sub(e(7, -9))
        .wrapping_add(e(-100, 50));
    assert_eq!(dec_mg(total), 10 - 4 - 7 - 100);
    assert_eq!(dec_eg(total), 20 - 30 + 9 + 50);
}

#[test]
fn test_scale_matches_repeated_addition() {
    for s in [e(7, 14), e(-21, -40), e(0, 3), e(-1, -17)] {
        let mut repeated = EVAL_ZERO;
        for _ in 0..5 {
            repeated = repeated.wrapping_add(s);
        }
        let scaled = EVAL_ZERO.wrapping_add(scale(s, 5));
        assert_eq!(dec_mg(repeated), dec_mg(scaled));
        assert_eq!(dec_eg(repeated), dec_eg(scaled));
    }
}

#[test]
fn test_startpos_is_balanced() {
    let pos = Position::startpos();
    let score = evaluate(&pos);
    // Symmetric position: only the tempo bonus separates the sides.
    assert_eq!(score, TEMPO_VALUE);
}

#[test]
fn test_color_symmetry() {
    // A color-mirrored position must evaluate identically from the
    // mover's perspective.
    for fen in [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "2r2rk1/pp3ppp/3p1n2/3P4/2P5/2N1PP2/PP2Q1PP/3R1RK1 w - - 0 1",
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
        "6k1/5ppp/8/8/8/8/PPP5/1K6 w - - 0 1",
    ] {
        let pos = Position::from_fen(fen).unwrap();
        let flipped = Position::from_fen(&color_flip_fen(fen)).unwrap();
        assert_eq!(
            evaluate(&pos),
            evaluate(&flipped),
            "asymmetric evaluation for {fen}"
        );
    }
}

#[test]
fn test_material_advantage_dominates() {
    // A clean extra rook should evaluate way ahead of noise terms.
    let up_rook = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
    assert!(evaluate(&up_rook) > 300);

    // And from the losing side's perspective it is negative.
    let down_rook = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 b - - 0 1").unwrap();
    assert!(evaluate(&down_rook) < -300);
}

#[test]
fn test_insufficient_material_is_zero() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1").unwrap();
    assert_eq!(evaluate(&pos), 0);
}

#[test]
fn test_known_win_drives_king_to_edge() {
    // KQ vs K: the winning score grows as the bare king nears the edge.
    let center = Position::from_fen("8/8/8/3k4/8/3K4/3Q4/8 w - - 0 1").unwrap();
    let edge = Position::from_fen("3k4/8/3K4/8/8/8/3Q4/8 w - - 0 1").unwrap();
    let center_score = evaluate(&center);
    let edge_score = evaluate(&edge);
    assert!(center_score > KNOWN_WIN / 2);
    assert!(edge_score > center_score);
}

#[test]
fn test_known_win_is_symmetric() {
    let white_wins = Position::from_fen("8/8/8/3k4/8/3K4/3Q4/8 w - - 0 1").unwrap();
    let black_wins = Position::from_fen("8/3q4/3k4/8/3K4/8/8/8 b - - 0 1").unwrap();
    assert_eq!(evaluate(&white_wins), evaluate(&black_wins));
}

#[test]
fn test_passed_pawn_bonus_grows_with_rank() {
    let far = Position::from_fen("4k3/8/8/8/8/4P3/8/4K3 w - - 0 1").unwrap();
    let near = Position::from_fen("4k3/8/4P3/8/8/8/8/4K3 w - - 0 1").unwrap();
    assert!(evaluate(&near) > evaluate(&far));
}

#[test]
fn test_opposite_bishops_damped() {
    // Same material either way, but opposite-colored bishops with a
    // pawn up should be scaled toward the draw. The g1 bishop is on a
    // dark square; g8 is light (opposite), h8 is dark (same).
    let opposite = Position::from_fen("4k1b1/8/8/8/8/8/P7/4K1B1 w - - 0 1").unwrap();
    let same = Position::from_fen("4k2b/8/8/8/8/8/P7/4K1B1 w - - 0 1").unwrap();
    assert!(evaluate(&opposite).abs() < evaluate(&same).abs());
}

#[test]
fn test_phase_endpoints() {
    assert_eq!(game_phase(&Position::startpos()), 0);
    let bare = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
    assert_eq!(game_phase(&bare), EG_FACTOR_RES);
}

#[cfg(feature = "trace")]
#[test]
fn test_trace_components_sum_consistently() {
    let pos = Position::from_fen(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    )
    .unwrap();
    let (score, trace) = evaluate_trace(&pos);
    assert_eq!(score, evaluate(&pos));
    // Both sides carry full material in this position.
    assert!(trace.material[0].0 > 3000);
    assert!(trace.material[1].0 > 3000);
}
