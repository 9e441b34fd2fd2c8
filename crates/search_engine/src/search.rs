//! Principal-variation search.
//!
//! Iterative deepening with aspiration windows drives a PVS alpha-beta
//! over the shared transposition table, with null-move pruning (plus a
//! verification search at depth), razoring, reverse futility, internal
//! iterative deepening, check and singular extensions, late-move
//! reductions, and a capture/promotion/check quiescence at the leaves.
//!
//! Parallel search is Lazy SMP: every worker runs its own iterative
//! deepening on its own board and move-ordering state, diverging
//! through transposition-table traffic; a packed atomic summary
//! collects the deepest finished iteration across workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;
use std::time::Instant;

use chess_core::{
    is_legal, legal_moves, move_to_uci, Color, Move, PieceKind, Position, SearchLimits,
    SearchResult,
};

use crate::eval::evaluate;
use crate::history::{history_bonus, History};
use crate::movepick::MovePicker;
use crate::tt::{score_from_tt, score_to_tt, NodeKind, TranspositionTable};

pub const MAX_PLY: usize = 128;
pub const INFINITY: i32 = 32500;
pub const MATE: i32 = 32000;
/// Scores at or beyond this magnitude encode a mate distance.
pub const MATE_BOUND: i32 = MATE - 2 * MAX_PLY as i32;

const ASPIRATION_WINDOW: i32 = 16;
const RAZOR_MARGIN: i32 = 300;
const FUTILITY_MARGIN: i32 = 90;
const FUTILITY_MAX_DEPTH: i32 = 6;
const NULL_MOVE_MIN_DEPTH: i32 = 2;
const NULL_VERIFY_DEPTH: i32 = 12;
const IID_MIN_DEPTH: i32 = 6;
const SINGULAR_MIN_DEPTH: i32 = 8;
const LMR_MIN_DEPTH: i32 = 3;
const LMR_MIN_MOVES: usize = 4;
const QS_DELTA_MARGIN: i32 = 200;
const PANIC_DROP: i32 = 50;
const NODE_POLL_MASK: u64 = 4095;

/// Plug-in endgame oracle. The real prober lives outside the engine;
/// the search only needs this much of it.
pub trait TablebaseOracle: Send + Sync {
    /// Largest piece count the tables cover.
    fn max_pieces(&self) -> u32;
    /// Exact game-theoretic value from the side to move's perspective:
    /// negative for a loss, zero for a draw, positive for a win.
    fn probe(&self, pos: &Position) -> Option<i32>;
}

#[derive(Clone)]
pub struct SearchSettings {
    pub threads: usize,
    pub multipv: usize,
    pub contempt: i32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            threads: 1,
            multipv: 1,
            contempt: 0,
        }
    }
}

/// Log-log reduction table indexed by [depth][move number].
static LMR_TABLE: LazyLock<[[i32; 64]; 64]> = LazyLock::new(|| {
    let mut table = [[0i32; 64]; 64];
    for (depth, row) in table.iter_mut().enumerate().skip(1) {
        for (moves, entry) in row.iter_mut().enumerate().skip(1) {
            *entry = (0.5 + (depth as f64).ln() * (moves as f64).ln() / 2.25) as i32;
        }
    }
    table
});

/// Cross-worker state: the table plus the packed best-line summary.
struct Shared<'a> {
    tt: &'a TranspositionTable,
    /// depth (8 bits) | score (16 bits) | move (16 bits), written with
    /// a compare-and-swap so only deeper iterations replace it. A
    /// single aligned word, so readers can never see a torn summary.
    summary: AtomicU64,
    nodes: AtomicU64,
    tbhits: AtomicU64,
}

fn pack_summary(depth: u8, score: i32, mv: Move) -> u64 {
    ((depth as u64) << 32) | ((score as i16 as u16 as u64) << 16) | mv.raw() as u64
}

fn unpack_summary(packed: u64) -> (u8, i32, Move) {
    (
        (packed >> 32) as u8,
        (packed >> 16) as u16 as i16 as i32,
        Move::from_raw(packed as u16),
    )
}

impl Shared<'_> {
    fn publish(&self, depth: u8, score: i32, mv: Move) {
        let new = pack_summary(depth, score, mv);
        let mut current = self.summary.load(Ordering::Relaxed);
        loop {
            let (cur_depth, _, _) = unpack_summary(current);
            if depth < cur_depth {
                return;
            }
            match self.summary.compare_exchange_weak(
                current,
                new,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

struct Worker<'a> {
    pos: Position,
    shared: &'a Shared<'a>,
    limits: SearchLimits,
    settings: SearchSettings,
    oracle: Option<&'a dyn TablebaseOracle>,
    is_main: bool,

    history: History,
    killers: [[Move; 2]; MAX_PLY + 2],
    eval_stack: [i32; MAX_PLY + 2],
    pv_table: Box<[[Move; MAX_PLY + 1]; MAX_PLY + 1]>,
    pv_len: [usize; MAX_PLY + 1],

    root_color: Color,
    nodes: u64,
    flushed_nodes: u64,
    seldepth: usize,
    tbhits: u64,
    stopped: bool,
    start: Instant,
}

impl<'a> Worker<'a> {
    fn new(
        pos: &Position,
        shared: &'a Shared<'a>,
        limits: SearchLimits,
        settings: SearchSettings,
        oracle: Option<&'a dyn TablebaseOracle>,
        is_main: bool,
    ) -> Worker<'a> {
        Worker {
            root_color: pos.side_to_move(),
            pos: pos.clone(),
            shared,
            limits,
            settings,
            oracle,
            is_main,
            history: History::new(),
            killers: [[Move::NONE; 2]; MAX_PLY + 2],
            eval_stack: [0; MAX_PLY + 2],
            pv_table: Box::new([[Move::NONE; MAX_PLY + 1]; MAX_PLY + 1]),
            pv_len: [0; MAX_PLY + 1],
            nodes: 0,
            flushed_nodes: 0,
            seldepth: 0,
            tbhits: 0,
            stopped: false,
            start: Instant::now(),
        }
    }

    // ------------------------------------------------------------------
    // Iterative deepening
    // ------------------------------------------------------------------

    fn iterate(&mut self) -> SearchResult {
        let root_moves = self.root_moves();
        if root_moves.is_empty() {
            let score = if self.pos.in_check(self.pos.side_to_move()) {
                -MATE
            } else {
                0
            };
            return SearchResult {
                best_move: None,
                ponder_move: None,
                score,
                depth: 0,
                nodes: self.nodes,
                stopped: false,
            };
        }

        // Fallback so a hard stop before depth 1 completes still
        // produces a legal move.
        let mut best_move = root_moves[0];
        let mut best_score = -INFINITY;
        let mut completed_depth = 0u8;
        let mut ponder_move = Move::NONE;

        let max_depth = self.limits.depth.min(MAX_PLY as u8 - 1);
        let multipv = if self.is_main {
            self.settings.multipv.max(1)
        } else {
            1
        };

        for depth in 1..=max_depth {
            let mut excluded_roots: Vec<Move> = Vec::new();

            for pv_index in 1..=multipv.min(root_moves.len()) {
                let (score, mv) = if multipv == 1 {
                    self.aspiration(depth as i32, best_score, &excluded_roots)
                } else {
                    self.root_search(depth as i32, -INFINITY, INFINITY, &excluded_roots)
                };

                if self.stopped {
                    break;
                }

                if pv_index == 1 {
                    // Panic extension: buy time when the score collapses
                    if completed_depth > 0 && score < best_score - PANIC_DROP {
                        self.limits.time_control.extend_target();
                    }
                    best_score = score;
                    best_move = mv;
                    completed_depth = depth;
                    ponder_move = if self.pv_len[0] > 1 {
                        self.pv_table[0][1]
                    } else {
                        Move::NONE
                    };
                    self.shared.publish(depth, score, mv);
                }

                if self.is_main {
                    self.print_info(depth, pv_index, score);
                }
                excluded_roots.push(mv);
            }

            if self.stopped
                || self.limits.time_control.is_stopped()
                || self.limits.time_control.target_exceeded()
            {
                break;
            }
            // A forced mate found deeper than the remaining horizon
            // cannot be improved upon.
            if best_score.abs() >= MATE_BOUND && depth as i32 >= MATE - best_score.abs() {
                break;
            }
        }

        self.flush_nodes();
        SearchResult {
            best_move: Some(best_move),
            ponder_move: if ponder_move.is_none() {
                None
            } else {
                Some(ponder_move)
            },
            score: best_score,
            depth: completed_depth,
            nodes: self.nodes,
            stopped: self.stopped,
        }
    }

    fn root_moves(&self) -> Vec<Move> {
        let mut moves = legal_moves(&self.pos);
        if !self.limits.searchmoves.is_empty() {
            moves.retain(|m| self.limits.searchmoves.contains(m));
        }
        moves
    }

    /// Search with a window around the previous score, widening
    /// geometrically on fail-high or fail-low.
    fn aspiration(&mut self, depth: i32, prev_score: i32, excluded: &[Move]) -> (i32, Move) {
        if depth < 4 {
            return self.root_search(depth, -INFINITY, INFINITY, excluded);
        }

        let mut window = ASPIRATION_WINDOW;
        let mut alpha = (prev_score - window).max(-INFINITY);
        let mut beta = (prev_score + window).min(INFINITY);
        loop {
            let (score, mv) = self.root_search(depth, alpha, beta, excluded);
            if self.stopped {
                return (score, mv);
            }
            if score <= alpha {
                beta = (alpha + beta) / 2;
                alpha = (alpha - window).max(-INFINITY);
            } else if score >= beta {
                beta = (beta + window).min(INFINITY);
            } else {
                return (score, mv);
            }
            window *= 2;
        }
    }

    fn root_search(
        &mut self,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        excluded: &[Move],
    ) -> (i32, Move) {
        self.pv_len[0] = 0;
        let mut moves = self.root_moves();
        moves.retain(|m| !excluded.contains(m));
        if moves.is_empty() {
            return (alpha, Move::NONE);
        }

        let tt_move = self
            .shared
            .tt
            .probe(self.pos.key())
            .map(|e| e.mv)
            .unwrap_or(Move::NONE);
        let mut picker = MovePicker::new(
            &self.pos,
            moves,
            tt_move,
            self.killers[0],
            Move::NONE,
            &self.history,
            depth,
        );

        let mut best = -INFINITY;
        let mut best_move = Move::NONE;
        let mut move_count = 0usize;

        while let Some((mv, _)) = picker.next() {
            move_count += 1;
            self.pos.make_move(mv);
            self.nodes += 1;
            let gives_check = self.pos.in_check(self.pos.side_to_move());
            let extension = i32::from(gives_check);
            let new_depth = depth - 1 + extension;

            let score = if move_count == 1 {
                -self.search(1, new_depth, -beta, -alpha, true, Move::NONE, true)
            } else {
                let mut s =
                    -self.search(1, new_depth, -alpha - 1, -alpha, false, Move::NONE, true);
                if s > alpha && !self.stopped {
                    s = -self.search(1, new_depth, -beta, -alpha, true, Move::NONE, true);
                }
                s
            };
            self.pos.unmake_move();

            if self.stopped {
                // A partially searched move is only trusted if it
                // already beat everything else.
                if best_move.is_none() {
                    best_move = mv;
                    best = score;
                }
                break;
            }

            if score > best {
                best = score;
                best_move = mv;
                if score > alpha {
                    alpha = score;
                    self.update_pv(0, mv);
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        (best, best_move)
    }

    // ------------------------------------------------------------------
    // Main alpha-beta
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        ply: usize,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        is_pv: bool,
        excluded: Move,
        allow_null: bool,
    ) -> i32 {
        if depth <= 0 {
            return self.quiescence(ply, alpha, beta, 0);
        }

        self.pv_len[ply] = 0;
        if self.poll() {
            return 0;
        }
        if ply >= MAX_PLY {
            return evaluate(&self.pos);
        }

        // Draws, including a single repetition anywhere along the
        // search path or game history.
        if self.pos.is_fifty_move_draw()
            || self.pos.is_insufficient_material()
            || self.pos.is_repetition()
        {
            return self.draw_score();
        }

        // Mate distance pruning
        alpha = alpha.max(-MATE + ply as i32);
        beta = beta.min(MATE - ply as i32 - 1);
        if alpha >= beta {
            return alpha;
        }

        let in_check = !self.pos.checkers().is_empty();

        // Transposition table
        let mut tt_move = Move::NONE;
        let mut tt_entry = None;
        if excluded.is_none() {
            if let Some(entry) = self.shared.tt.probe(self.pos.key()) {
                tt_move = entry.mv;
                let tt_score = score_from_tt(entry.score, ply);
                if !is_pv && entry.depth as i32 >= depth {
                    match entry.kind {
                        NodeKind::Pv => return tt_score,
                        NodeKind::Cut if tt_score >= beta => return tt_score,
                        NodeKind::All if tt_score <= alpha => return tt_score,
                        _ => {}
                    }
                }
                tt_entry = Some(entry);
            }
        }

        // Endgame oracle
        if let Some(oracle) = self.oracle
            && excluded.is_none()
            && self.pos.occupied().popcount() <= oracle.max_pieces()
            && self.pos.halfmove_clock() == 0
            && let Some(tb_score) = oracle.probe(&self.pos)
        {
            self.tbhits += 1;
            if !is_pv {
                return tb_score;
            }
        }

        let static_eval = if in_check {
            -INFINITY
        } else {
            evaluate(&self.pos)
        };
        self.eval_stack[ply] = static_eval;
        // The position counts as improving when the static eval beats
        // the one two plies up the path; pruning backs off a notch.
        let improving = !in_check && ply >= 2 && static_eval >= self.eval_stack[ply - 2];

        if !is_pv && !in_check && excluded.is_none() {
            // Razoring: hopeless nodes drop straight to quiescence
            if depth <= 3 && static_eval + RAZOR_MARGIN * depth <= alpha {
                return self.quiescence(ply, alpha, beta, 0);
            }

            // Reverse futility: a big static surplus at shallow depth
            // will not evaporate
            if depth <= FUTILITY_MAX_DEPTH
                && static_eval - FUTILITY_MARGIN * (depth - i32::from(improving)) >= beta
                && static_eval.abs() < MATE_BOUND
            {
                return static_eval;
            }

            // Null move: hand over the move and see if beta survives.
            // Skipped without non-pawn material, where zugzwang rules.
            if allow_null
                && depth >= NULL_MOVE_MIN_DEPTH
                && static_eval >= beta
                && self.pos.non_pawn_material(self.pos.side_to_move()) > 0
            {
                let r = 3 + depth / 6;
                self.pos.make_null_move();
                let null_score =
                    -self.search(ply + 1, depth - 1 - r, -beta, -beta + 1, false, Move::NONE, false);
                self.pos.unmake_null_move();
                if self.stopped {
                    return 0;
                }
                if null_score >= beta {
                    let cutoff = if null_score >= MATE_BOUND {
                        beta
                    } else {
                        null_score
                    };
                    if depth < NULL_VERIFY_DEPTH {
                        return cutoff;
                    }
                    // Zugzwang guard: verify with the null move disabled
                    let verified = self.search(
                        ply,
                        depth - 1 - r,
                        beta - 1,
                        beta,
                        false,
                        Move::NONE,
                        false,
                    );
                    if verified >= beta {
                        return cutoff;
                    }
                }
            }
        }

        // Internal iterative deepening: a PV node with no hash move is
        // worth a shallow pre-search just to get one.
        if is_pv && tt_move.is_none() && depth >= IID_MIN_DEPTH && excluded.is_none() {
            self.search(ply, depth - 2, alpha, beta, true, Move::NONE, true);
            if let Some(entry) = self.shared.tt.probe(self.pos.key()) {
                tt_move = entry.mv;
            }
        }

        let legal = legal_moves(&self.pos);
        if legal.is_empty() {
            return if in_check {
                -MATE + ply as i32
            } else {
                self.draw_score()
            };
        }

        let us = self.pos.side_to_move();
        let counter = match self.pos.last_move() {
            Some(prev) if !prev.is_none() => self
                .pos
                .piece_at(prev.to())
                .map(|p| self.history.counter_move(us, p.kind, prev.to()))
                .unwrap_or(Move::NONE),
            _ => Move::NONE,
        };

        let mut picker = MovePicker::new(
            &self.pos,
            legal,
            tt_move,
            self.killers[ply],
            counter,
            &self.history,
            depth,
        );

        let alpha0 = alpha;
        let mut best = -INFINITY;
        let mut best_move = Move::NONE;
        let mut move_count = 0usize;
        let mut tried_quiets: Vec<Move> = Vec::new();
        let mut tried_captures: Vec<Move> = Vec::new();

        while let Some((mv, _)) = picker.next() {
            if mv == excluded {
                continue;
            }
            move_count += 1;

            // Singular extension: is the hash move uniquely best by a
            // margin? Search everything else at reduced depth against
            // a lowered target.
            let mut extension = 0;
            if depth >= SINGULAR_MIN_DEPTH
                && mv == tt_move
                && excluded.is_none()
                && let Some(entry) = tt_entry
                && entry.kind != NodeKind::All
                && entry.depth as i32 >= depth - 3
                && entry.score.abs() < MATE_BOUND as i16
            {
                let target = score_from_tt(entry.score, ply) - 2 * depth;
                let singular_score =
                    self.search(ply, (depth - 1) / 2, target - 1, target, false, mv, false);
                if self.stopped {
                    return 0;
                }
                if singular_score < target {
                    extension = 1;
                }
            }

            let quiet_score = self.history.quiet_score(us, mv);
            self.pos.make_move(mv);
            self.nodes += 1;
            let gives_check = self.pos.in_check(self.pos.side_to_move());
            if gives_check {
                extension = extension.max(1);
            }
            let new_depth = depth - 1 + extension;

            let score = if move_count == 1 {
                -self.search(ply + 1, new_depth, -beta, -alpha, is_pv, Move::NONE, true)
            } else {
                // Late-move reduction for unexciting quiets
                let mut reduction = 0;
                if depth >= LMR_MIN_DEPTH
                    && move_count >= LMR_MIN_MOVES
                    && !mv.is_capture()
                    && !mv.is_promotion()
                    && !in_check
                    && !gives_check
                {
                    reduction = LMR_TABLE[(depth as usize).min(63)][move_count.min(63)];
                    if is_pv {
                        reduction -= 1;
                    }
                    if quiet_score > 200 {
                        reduction -= 1;
                    }
                    reduction = reduction.clamp(0, new_depth - 1);
                }

                let mut s = -self.search(
                    ply + 1,
                    new_depth - reduction,
                    -alpha - 1,
                    -alpha,
                    false,
                    Move::NONE,
                    true,
                );
                if s > alpha && reduction > 0 && !self.stopped {
                    s = -self.search(
                        ply + 1,
                        new_depth,
                        -alpha - 1,
                        -alpha,
                        false,
                        Move::NONE,
                        true,
                    );
                }
                if s > alpha && is_pv && !self.stopped {
                    s = -self.search(ply + 1, new_depth, -beta, -alpha, true, Move::NONE, true);
                }
                s
            };
            self.pos.unmake_move();

            if self.stopped {
                return 0;
            }

            if score > best {
                best = score;
                best_move = mv;
                if score > alpha {
                    alpha = score;
                    if is_pv {
                        self.update_pv(ply, mv);
                    }
                    if alpha >= beta {
                        break;
                    }
                }
            }

            if mv.is_capture() {
                tried_captures.push(mv);
            } else {
                tried_quiets.push(mv);
            }
        }

        if move_count == 0 {
            // Every legal move was excluded (singular verification)
            return alpha;
        }

        if best >= beta {
            self.record_cutoff(ply, depth, best_move, &tried_quiets, &tried_captures);
        }

        if excluded.is_none() {
            let kind = if best >= beta {
                NodeKind::Cut
            } else if best > alpha0 {
                NodeKind::Pv
            } else {
                NodeKind::All
            };
            self.shared.tt.store(
                self.pos.key(),
                depth.max(0) as u8,
                score_to_tt(best, ply),
                kind,
                best_move,
            );
        }

        best
    }

    /// Killer, counter-move, and history bookkeeping for a beta cutoff.
    fn record_cutoff(
        &mut self,
        ply: usize,
        depth: i32,
        best_move: Move,
        tried_quiets: &[Move],
        tried_captures: &[Move],
    ) {
        let us = self.pos.side_to_move();
        let bonus = history_bonus(depth);

        if best_move.is_capture() {
            if let Some(victim) = self.capture_victim(best_move) {
                let piece = self
                    .pos
                    .piece_at(best_move.from())
                    .map(|p| p.kind)
                    .unwrap_or(PieceKind::Pawn);
                self.history
                    .update_capture(us, piece, victim, best_move.to(), bonus);
            }
        } else {
            if self.killers[ply][0] != best_move {
                self.killers[ply][1] = self.killers[ply][0];
                self.killers[ply][0] = best_move;
            }
            if let Some(prev) = self.pos.last_move()
                && !prev.is_none()
                && let Some(moved) = self.pos.piece_at(prev.to())
            {
                self.history
                    .set_counter_move(us, moved.kind, prev.to(), best_move);
            }
            self.history.update_quiet(us, best_move, bonus);
        }

        // Moves tried before the cutoff get pushed down
        for &mv in tried_quiets {
            if mv != best_move {
                self.history.update_quiet(us, mv, -bonus);
            }
        }
        for &mv in tried_captures {
            if mv != best_move
                && let Some(victim) = self.capture_victim(mv)
            {
                let piece = self
                    .pos
                    .piece_at(mv.from())
                    .map(|p| p.kind)
                    .unwrap_or(PieceKind::Pawn);
                self.history
                    .update_capture(us, piece, victim, mv.to(), -bonus);
            }
        }
    }

    fn capture_victim(&self, mv: Move) -> Option<PieceKind> {
        if mv.is_en_passant() {
            Some(PieceKind::Pawn)
        } else {
            self.pos.piece_at(mv.to()).map(|p| p.kind)
        }
    }

    // ------------------------------------------------------------------
    // Quiescence
    // ------------------------------------------------------------------

    fn quiescence(&mut self, ply: usize, mut alpha: i32, beta: i32, qs_ply: usize) -> i32 {
        self.pv_len[ply] = 0;
        if self.poll() {
            return 0;
        }
        self.seldepth = self.seldepth.max(ply);
        if ply >= MAX_PLY {
            return evaluate(&self.pos);
        }

        if self.pos.is_fifty_move_draw()
            || self.pos.is_insufficient_material()
            || self.pos.is_repetition()
        {
            return self.draw_score();
        }

        let in_check = !self.pos.checkers().is_empty();

        if in_check {
            // Full evasion search: there is no stand pat in check
            let moves = legal_moves(&self.pos);
            if moves.is_empty() {
                return -MATE + ply as i32;
            }
            let mut picker = MovePicker::new(
                &self.pos,
                moves,
                Move::NONE,
                [Move::NONE; 2],
                Move::NONE,
                &self.history,
                0,
            );
            let mut best = -INFINITY;
            while let Some((mv, _)) = picker.next() {
                self.pos.make_move(mv);
                self.nodes += 1;
                let score = -self.quiescence(ply + 1, -beta, -alpha, qs_ply + 1);
                self.pos.unmake_move();
                if self.stopped {
                    return 0;
                }
                best = best.max(score);
                alpha = alpha.max(score);
                if alpha >= beta {
                    break;
                }
            }
            return best;
        }

        let stand_pat = evaluate(&self.pos);
        if stand_pat >= beta {
            return stand_pat;
        }
        alpha = alpha.max(stand_pat);

        let pinned = self.pos.pinned(self.pos.side_to_move());
        let mut picker = MovePicker::new_quiescence(&self.pos, qs_ply == 0);
        let mut best = stand_pat;

        while let Some((mv, _)) = picker.next() {
            if !is_legal(&self.pos, mv, pinned) {
                continue;
            }

            // Losing exchanges are not worth chasing at the horizon
            if !self.pos.see_ge(mv, 0) {
                continue;
            }
            // Delta pruning: even winning the piece cannot lift alpha
            if mv.is_capture() && !mv.is_promotion() {
                let victim = self
                    .capture_victim(mv)
                    .map(|k| chess_core::SEE_PIECE_VALUES[k.idx()])
                    .unwrap_or(0);
                if stand_pat + victim + QS_DELTA_MARGIN < alpha {
                    continue;
                }
            }

            self.pos.make_move(mv);
            self.nodes += 1;
            let score = -self.quiescence(ply + 1, -beta, -alpha, qs_ply + 1);
            self.pos.unmake_move();
            if self.stopped {
                return 0;
            }

            if score > best {
                best = score;
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        best
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    /// Contempt-biased draw score from the side to move's perspective.
    fn draw_score(&self) -> i32 {
        if self.pos.side_to_move() == self.root_color {
            -self.settings.contempt
        } else {
            self.settings.contempt
        }
    }

    fn update_pv(&mut self, ply: usize, mv: Move) {
        self.pv_table[ply][0] = mv;
        let child_len = if ply + 1 <= MAX_PLY {
            self.pv_len[ply + 1]
        } else {
            0
        };
        for i in 0..child_len {
            self.pv_table[ply][i + 1] = self.pv_table[ply + 1][i];
        }
        self.pv_len[ply] = child_len + 1;
    }

    /// Node-count poll: flush counters, check the clock and node limit.
    fn poll(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.nodes & NODE_POLL_MASK == 0 {
            self.flush_nodes();
            if self.limits.time_control.check_time() {
                self.stopped = true;
                return true;
            }
            if let Some(limit) = self.limits.nodes
                && self.shared.nodes.load(Ordering::Relaxed) >= limit
            {
                self.limits.time_control.stop();
                self.stopped = true;
                return true;
            }
        }
        if self.limits.time_control.is_stopped() {
            self.stopped = true;
            return true;
        }
        false
    }

    fn flush_nodes(&mut self) {
        let delta = self.nodes - self.flushed_nodes;
        if delta > 0 {
            self.shared.nodes.fetch_add(delta, Ordering::Relaxed);
            self.flushed_nodes = self.nodes;
        }
        if self.tbhits > 0 {
            self.shared.tbhits.fetch_add(self.tbhits, Ordering::Relaxed);
            self.tbhits = 0;
        }
    }

    fn print_info(&mut self, depth: u8, pv_index: usize, score: i32) {
        self.flush_nodes();
        let elapsed = self.start.elapsed();
        let ms = elapsed.as_millis().max(1);
        let nodes = self.shared.nodes.load(Ordering::Relaxed);
        let nps = nodes as u128 * 1000 / ms;

        let score_str = if score.abs() >= MATE_BOUND {
            let plies = MATE - score.abs();
            let mate_moves = (plies + 1) / 2;
            if score > 0 {
                format!("mate {mate_moves}")
            } else {
                format!("mate -{mate_moves}")
            }
        } else {
            format!("cp {score}")
        };

        let pv: Vec<String> = self.pv_table[0][..self.pv_len[0]]
            .iter()
            .map(|&m| move_to_uci(m))
            .collect();

        let mut line = format!(
            "info depth {} seldepth {} multipv {} score {} nodes {} nps {} time {} hashfull {}",
            depth,
            self.seldepth.max(depth as usize),
            pv_index,
            score_str,
            nodes,
            nps,
            ms,
            self.shared.tt.hashfull(),
        );
        let tbhits = self.shared.tbhits.load(Ordering::Relaxed);
        if tbhits > 0 {
            line.push_str(&format!(" tbhits {tbhits}"));
        }
        if !pv.is_empty() {
            line.push_str(" pv ");
            line.push_str(&pv.join(" "));
        }
        println!("{line}");
    }
}

/// Run a search over `pos` within `limits`, coordinating `threads`
/// Lazy SMP workers over the shared table. Blocks until the search
/// finishes or is stopped.
pub fn go(
    pos: &Position,
    limits: SearchLimits,
    tt: &TranspositionTable,
    settings: &SearchSettings,
    oracle: Option<&dyn TablebaseOracle>,
) -> SearchResult {
    tt.new_search();
    limits.start();

    let shared = Shared {
        tt,
        summary: AtomicU64::new(0),
        nodes: AtomicU64::new(0),
        tbhits: AtomicU64::new(0),
    };

    let mut result = std::thread::scope(|s| {
        for _ in 1..settings.threads.max(1) {
            let limits = limits.clone();
            let shared_ref = &shared;
            let settings = settings.clone();
            s.spawn(move || {
                let mut helper = Worker::new(pos, shared_ref, limits, settings, oracle, false);
                helper.iterate();
            });
        }

        let mut main = Worker::new(pos, &shared, limits.clone(), settings.clone(), oracle, true);
        let result = main.iterate();
        // Main is done: release the helpers before the scope joins them
        limits.time_control.stop();
        result
    });

    // Adopt a helper's deeper iteration if one finished later
    let (depth, score, mv) = unpack_summary(shared.summary.load(Ordering::Relaxed));
    if depth > result.depth && !mv.is_none() {
        result.depth = depth;
        result.score = score;
        result.best_move = Some(mv);
        result.ponder_move = None;
    }
    result.nodes = shared.nodes.load(Ordering::Relaxed);

    result
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod search_tests;
