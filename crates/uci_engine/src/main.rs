//! UCI Chess Engine Binary
//!
//! This binary implements the Universal Chess Interface (UCI) protocol,
//! allowing the engine to be used with chess GUIs like Arena, Cute
//! Chess, etc. Searches run on a background thread so `stop` and
//! `ponderhit` stay responsive; protocol errors are reported as
//! `info string` diagnostics and never abort the process.
//!
//! A few non-UCI console helpers are accepted as well: `bench`, `d`,
//! `eval`, and `perft <depth>`.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use chess_core::{
    legal_moves, move_to_uci, parse_uci_move, perft, Engine, GoParams, Position, SearchLimits,
    TimeControl,
};
use search_engine::{eval::evaluate, SearchEngine};

/// Positions exercised by the `bench` command: a spread of openings,
/// middlegames, and endgames.
const BENCH_FENS: [&str; 8] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - -",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "2r2rk1/pp3ppp/3p1n2/3P4/2P5/2N1PP2/PP2Q1PP/3R1RK1 w - -",
    "4k3/8/8/8/8/8/4P3/4K3 w - -",
    "6k1/5ppp/8/8/8/8/5PPP/6K1 w - -",
];
const BENCH_DEPTH: u8 = 8;

struct Frontend {
    engine: Arc<Mutex<SearchEngine>>,
    pos: Position,
    /// Clock handle of the running (or last) search, for stop/ponderhit
    active_tc: Option<TimeControl>,
    searcher: Option<JoinHandle<()>>,
}

impl Frontend {
    fn new() -> Frontend {
        Frontend {
            engine: Arc::new(Mutex::new(SearchEngine::new())),
            pos: Position::startpos(),
            active_tc: None,
            searcher: None,
        }
    }

    /// Stop any running search and wait for its bestmove to go out.
    fn join_search(&mut self) {
        if let Some(handle) = self.searcher.take() {
            if let Some(tc) = &self.active_tc {
                tc.stop();
            }
            handle.join().ok();
        }
    }

    fn handle_uci(&self) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let engine = self.engine.lock().unwrap();
        writeln!(out, "id name {}", engine.name()).ok();
        writeln!(out, "id author {}", engine.author()).ok();
        writeln!(
            out,
            "option name Hash type spin default {} min 1 max 1048576",
            search_engine::DEFAULT_HASH_MB
        )
        .ok();
        writeln!(out, "option name Threads type spin default 1 min 1 max 256").ok();
        writeln!(out, "option name Ponder type check default false").ok();
        writeln!(out, "option name MultiPV type spin default 1 min 1 max 64").ok();
        writeln!(out, "option name SyzygyPath type string default <empty>").ok();
        writeln!(out, "option name Contempt type spin default 0 min -100 max 100").ok();
        writeln!(
            out,
            "option name MoveOverhead type spin default 10 min 0 max 5000"
        )
        .ok();
        writeln!(out, "uciok").ok();
        out.flush().ok();
    }

    fn handle_setoption(&mut self, parts: &[&str]) {
        let Some(name_at) = parts.iter().position(|&t| t == "name") else {
            println!("info string malformed setoption");
            return;
        };
        let value_at = parts.iter().position(|&t| t == "value");
        let name_end = value_at.unwrap_or(parts.len());
        if name_at + 1 > name_end {
            println!("info string malformed setoption");
            return;
        }
        let name = parts[name_at + 1..name_end].join(" ");
        let value = value_at
            .map(|at| parts[at + 1..].join(" "))
            .unwrap_or_default();
        if name.is_empty() {
            println!("info string malformed setoption");
            return;
        }

        self.join_search();
        let recognized = self.engine.lock().unwrap().set_option(&name, &value);
        if !recognized {
            println!("info string unknown option '{name}'");
        }
    }

    fn handle_position(&mut self, parts: &[&str]) {
        let mut idx = 1;
        let mut new_pos = match parts.get(idx) {
            Some(&"startpos") => {
                idx += 1;
                Position::startpos()
            }
            Some(&"fen") => {
                idx += 1;
                let end = parts[idx..]
                    .iter()
                    .position(|&t| t == "moves")
                    .map(|off| idx + off)
                    .unwrap_or(parts.len());
                let fen = parts[idx..end].join(" ");
                idx = end;
                match Position::from_fen(&fen) {
                    Ok(pos) => pos,
                    Err(err) => {
                        println!("info string bad fen: {err}");
                        return;
                    }
                }
            }
            _ => {
                println!("info string malformed position command");
                return;
            }
        };

        if parts.get(idx) == Some(&"moves") {
            for token in &parts[idx + 1..] {
                match parse_uci_move(&new_pos, token) {
                    Some(mv) => new_pos.make_move(mv),
                    None => {
                        // Keep the position at the last legal state
                        println!("info string illegal move '{token}' ignored");
                        break;
                    }
                }
            }
        }
        self.pos = new_pos;
    }

    fn parse_go(parts: &[&str], pos: &Position) -> GoParams {
        let mut params = GoParams::default();
        let mut iter = parts.iter().skip(1).peekable();
        while let Some(&token) = iter.next() {
            match token {
                "depth" => {
                    params.depth = iter.next().and_then(|t| t.parse().ok());
                }
                "nodes" => {
                    params.nodes = iter.next().and_then(|t| t.parse().ok());
                }
                "movetime" => {
                    params.movetime = iter.next().and_then(|t| t.parse().ok());
                }
                "wtime" => {
                    params.wtime = iter.next().and_then(|t| t.parse().ok());
                }
                "btime" => {
                    params.btime = iter.next().and_then(|t| t.parse().ok());
                }
                "winc" => {
                    params.winc = iter.next().and_then(|t| t.parse().ok());
                }
                "binc" => {
                    params.binc = iter.next().and_then(|t| t.parse().ok());
                }
                "movestogo" => {
                    params.movestogo = iter.next().and_then(|t| t.parse().ok());
                }
                "infinite" => params.infinite = true,
                "ponder" => params.ponder = true,
                "searchmoves" => {
                    while let Some(&&next) = iter.peek() {
                        match parse_uci_move(pos, next) {
                            Some(mv) => {
                                params.searchmoves.push(mv);
                                iter.next();
                            }
                            None => break,
                        }
                    }
                }
                _ => {
                    println!("info string unknown go token '{token}'");
                }
            }
        }
        params
    }

    fn handle_go(&mut self, parts: &[&str]) {
        self.join_search();

        let params = Self::parse_go(parts, &self.pos);
        let overhead = self.engine.lock().unwrap().options().move_overhead_ms;
        let limits = SearchLimits::from_go(&params, self.pos.side_to_move(), overhead);
        self.active_tc = Some(limits.time_control.clone());

        let engine = Arc::clone(&self.engine);
        let pos = self.pos.clone();
        self.searcher = Some(std::thread::spawn(move || {
            let result = engine.lock().unwrap().search(&pos, limits);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            match result.best_move {
                Some(mv) => match result.ponder_move {
                    Some(ponder) => {
                        writeln!(
                            out,
                            "bestmove {} ponder {}",
                            move_to_uci(mv),
                            move_to_uci(ponder)
                        )
                        .ok();
                    }
                    None => {
                        writeln!(out, "bestmove {}", move_to_uci(mv)).ok();
                    }
                },
                None => {
                    writeln!(out, "bestmove 0000").ok();
                }
            }
            out.flush().ok();
        }));
    }

    fn handle_stop(&mut self) {
        self.join_search();
    }

    fn handle_ponderhit(&self) {
        if let Some(tc) = &self.active_tc {
            tc.ponderhit();
        }
    }

    fn handle_bench(&mut self) {
        self.join_search();
        let mut engine = self.engine.lock().unwrap();
        engine.new_game();

        let start = Instant::now();
        let mut total_nodes = 0u64;
        for fen in BENCH_FENS {
            let pos = match Position::from_fen(fen) {
                Ok(pos) => pos,
                Err(_) => continue,
            };
            let result = engine.search(&pos, SearchLimits::depth(BENCH_DEPTH));
            total_nodes += result.nodes;
        }
        let elapsed = start.elapsed();
        let nps = total_nodes as u128 * 1000 / elapsed.as_millis().max(1);
        println!("info string bench complete");
        println!("Nodes searched  : {total_nodes}");
        println!("Nodes / second  : {nps}");
    }

    fn handle_display(&self) {
        let mut board = String::new();
        for rank in (0u8..8).rev() {
            board.push_str("  +---+---+---+---+---+---+---+---+\n");
            board.push_str(&format!("{} ", rank + 1));
            for file in 0u8..8 {
                let sq = rank * 8 + file;
                let glyph = match self.pos.piece_at(sq) {
                    None => ' ',
                    Some(piece) => {
                        let ch = match piece.kind {
                            chess_core::PieceKind::Pawn => 'p',
                            chess_core::PieceKind::Knight => 'n',
                            chess_core::PieceKind::Bishop => 'b',
                            chess_core::PieceKind::Rook => 'r',
                            chess_core::PieceKind::Queen => 'q',
                            chess_core::PieceKind::King => 'k',
                        };
                        if piece.color == chess_core::Color::White {
                            ch.to_ascii_uppercase()
                        } else {
                            ch
                        }
                    }
                };
                board.push_str(&format!("| {glyph} "));
            }
            board.push_str("|\n");
        }
        board.push_str("  +---+---+---+---+---+---+---+---+\n");
        board.push_str("    a   b   c   d   e   f   g   h\n");
        print!("{board}");
        println!("FEN: {}", self.pos.to_fen());
        println!("Key: {:016X}", self.pos.key());
    }

    fn handle_perft(&self, parts: &[&str]) {
        let depth: u8 = parts
            .get(1)
            .and_then(|t| t.parse().ok())
            .unwrap_or(5)
            .min(9);
        let mut pos = self.pos.clone();
        let start = Instant::now();
        let nodes = perft(&mut pos, depth);
        let elapsed = start.elapsed();
        println!(
            "perft({depth}) = {nodes} in {:.3}s ({:.1} Mnps)",
            elapsed.as_secs_f64(),
            nodes as f64 / 1_000_000.0 / elapsed.as_secs_f64().max(1e-9)
        );
    }
}

fn main() {
    let stdin = io::stdin();
    let mut frontend = Frontend::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "uci" => frontend.handle_uci(),
            "isready" => {
                println!("readyok");
                io::stdout().flush().ok();
            }
            "setoption" => frontend.handle_setoption(&parts),
            "ucinewgame" => {
                frontend.join_search();
                frontend.pos = Position::startpos();
                frontend.engine.lock().unwrap().new_game();
            }
            "position" => frontend.handle_position(&parts),
            "go" => frontend.handle_go(&parts),
            "stop" => frontend.handle_stop(),
            "ponderhit" => frontend.handle_ponderhit(),
            "quit" => {
                frontend.handle_stop();
                break;
            }
            // Console conveniences, not part of the UCI protocol
            "bench" => frontend.handle_bench(),
            "d" => frontend.handle_display(),
            "eval" => {
                println!("static eval: {} cp", evaluate(&frontend.pos));
            }
            "perft" => frontend.handle_perft(&parts),
            "moves" => {
                let list: Vec<String> = legal_moves(&frontend.pos)
                    .into_iter()
                    .map(move_to_uci)
                    .collect();
                println!("{}", list.join(" "));
            }
            other => {
                println!("info string unknown command '{other}'");
            }
        }
    }
}
