//! The Prism search backend.
//!
//! Principal-variation search over a shared transposition table, with a
//! tapered hand-crafted evaluation. The UCI front-end drives this crate
//! through the `chess_core::Engine` trait.

pub mod eval;
pub mod history;
pub mod movepick;
pub mod search;
pub mod tt;

use std::sync::Arc;

use chess_core::{Engine, Position, SearchLimits, SearchResult};

pub use search::{SearchSettings, TablebaseOracle, INFINITY, MATE, MATE_BOUND};
pub use tt::{TranspositionTable, DEFAULT_HASH_MB};

/// Runtime options settable over UCI.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub ponder: bool,
    pub multipv: usize,
    pub syzygy_path: Option<String>,
    pub contempt: i32,
    pub move_overhead_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mb: DEFAULT_HASH_MB,
            threads: 1,
            ponder: false,
            multipv: 1,
            syzygy_path: None,
            contempt: 0,
            move_overhead_ms: 10,
        }
    }
}

/// The complete engine: transposition table, options, and an optional
/// endgame oracle behind the plug-in seam.
pub struct SearchEngine {
    tt: Arc<TranspositionTable>,
    options: EngineOptions,
    oracle: Option<Box<dyn TablebaseOracle>>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    pub fn new() -> SearchEngine {
        let options = EngineOptions::default();
        SearchEngine {
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            options,
            oracle: None,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Install (or remove) the endgame oracle.
    pub fn set_oracle(&mut self, oracle: Option<Box<dyn TablebaseOracle>>) {
        self.oracle = oracle;
    }

    fn resize_hash(&mut self, mb: usize) {
        self.tt = Arc::new(TranspositionTable::new(mb));
        self.options.hash_mb = mb;
    }
}

impl Engine for SearchEngine {
    fn search(&mut self, pos: &Position, limits: SearchLimits) -> SearchResult {
        let settings = SearchSettings {
            threads: self.options.threads,
            multipv: self.options.multipv,
            contempt: self.options.contempt,
        };
        search::go(
            pos,
            limits,
            &self.tt,
            &settings,
            self.oracle.as_deref(),
        )
    }

    fn name(&self) -> &str {
        "Prism 1.0"
    }

    fn new_game(&mut self) {
        self.tt.clear();
    }

    fn set_option(&mut self, name: &str, value: &str) -> bool {
        match name.to_lowercase().as_str() {
            "hash" => {
                if let Ok(mb) = value.parse::<usize>() {
                    self.resize_hash(mb.clamp(1, 1 << 20));
                }
                true
            }
            "threads" => {
                if let Ok(threads) = value.parse::<usize>() {
                    self.options.threads = threads.clamp(1, 256);
                }
                true
            }
            "ponder" => {
                self.options.ponder = value.eq_ignore_ascii_case("true");
                true
            }
            "multipv" => {
                if let Ok(lines) = value.parse::<usize>() {
                    self.options.multipv = lines.clamp(1, 64);
                }
                true
            }
            "syzygypath" => {
                self.options.syzygy_path = if value.is_empty() || value == "<empty>" {
                    None
                } else {
                    Some(value.to_string())
                };
                true
            }
            "contempt" => {
                if let Ok(cp) = value.parse::<i32>() {
                    self.options.contempt = cp.clamp(-100, 100);
                }
                true
            }
            "moveoverhead" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.options.move_overhead_ms = ms.min(5000);
                }
                true
            }
            _ => false,
        }
    }
}
