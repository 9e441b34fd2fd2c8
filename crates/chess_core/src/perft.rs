use crate::{board::Position, movegen::legal_moves_into, types::Move};

/// Pure perft node count.
/// Counts all legal move sequences from the current position down to `depth`.
pub fn perft(pos: &mut Position, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }

    fn inner(pos: &mut Position, depth: u8, layers: &mut [Vec<Move>]) -> u64 {
        let (buf, rest) = layers
            .split_first_mut()
            .expect("perft requires one buffer per remaining ply");

        legal_moves_into(pos, buf);
        if depth == 1 {
            return buf.len() as u64;
        }

        let mut nodes = 0u64;
        for i in 0..buf.len() {
            let mv = buf[i];
            pos.make_move(mv);
            nodes += inner(pos, depth - 1, rest);
            pos.unmake_move();
        }
        nodes
    }

    let mut layers = vec![Vec::with_capacity(64); depth as usize];
    inner(pos, depth, &mut layers[..])
}

/// Perft with per-root-move subtotals, matching the `divide` output of
/// other engines. Useful when hunting a generator discrepancy.
pub fn perft_divide(pos: &mut Position, depth: u8) -> Vec<(Move, u64)> {
    let mut out = Vec::new();
    let mut moves = Vec::with_capacity(64);
    legal_moves_into(pos, &mut moves);
    for mv in moves {
        pos.make_move(mv);
        let nodes = if depth <= 1 {
            1
        } else {
            perft(pos, depth - 1)
        };
        pos.unmake_move();
        out.push((mv, nodes));
    }
    out
}
