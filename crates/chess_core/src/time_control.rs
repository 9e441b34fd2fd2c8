//! Time control and search limits for chess engines.
//!
//! This module provides shared time management functionality that any
//! engine implementation can use to respect its budget during search.
//! A search gets two deadlines: a soft *target* consulted between
//! iterations (and extendable when the score collapses), and a hard
//! *cutoff* polled inside the tree every few thousand nodes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::types::{Color, Move};

/// Raw `go` parameters as parsed from the UCI command line.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    pub depth: Option<u8>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u32>,
    pub infinite: bool,
    pub ponder: bool,
    pub searchmoves: Vec<Move>,
}

/// Search limits that control when an engine should stop searching.
///
/// Engines should respect depth, node, and time limits, stopping when
/// any is reached. The time limit takes precedence - if time runs out,
/// the engine must return immediately with the best move found so far.
#[derive(Debug, Clone)]
pub struct SearchLimits {
    /// Maximum search depth in plies (half-moves)
    pub depth: u8,
    /// Maximum nodes to search (None = unbounded)
    pub nodes: Option<u64>,
    /// Restrict the root to these moves (empty = all legal moves)
    pub searchmoves: Vec<Move>,
    /// True while pondering: no deadline applies until `ponderhit`
    pub ponder: bool,
    /// Time controller for checking if search should stop
    pub time_control: TimeControl,
}

impl SearchLimits {
    /// Create limits with only depth constraint (no time limit).
    pub fn depth(depth: u8) -> Self {
        Self {
            depth,
            nodes: None,
            searchmoves: Vec::new(),
            ponder: false,
            time_control: TimeControl::new(None, None),
        }
    }

    /// Create limits with a fixed time budget per move.
    pub fn move_time(ms: u64) -> Self {
        Self {
            depth: u8::MAX,
            nodes: None,
            searchmoves: Vec::new(),
            ponder: false,
            time_control: TimeControl::new(None, Some(Duration::from_millis(ms))),
        }
    }

    /// Translate `go` parameters into limits, computing the soft target
    /// and hard cutoff from the clock state.
    ///
    /// The allocation gives each move its share of the remaining clock
    /// plus most of the increment, spends a little extra while many
    /// moves remain, and never commits more than a fixed fraction of
    /// the clock to a single move.
    pub fn from_go(params: &GoParams, us: Color, move_overhead_ms: u64) -> Self {
        let mut depth = params.depth.unwrap_or(u8::MAX);
        if depth == 0 {
            depth = 1;
        }

        let overhead = Duration::from_millis(move_overhead_ms);

        let time_control = if let Some(ms) = params.movetime {
            let budget = Duration::from_millis(ms).saturating_sub(overhead);
            TimeControl::new(None, Some(budget))
        } else {
            let (clock, inc) = match us {
                Color::White => (params.wtime, params.winc.unwrap_or(0)),
                Color::Black => (params.btime, params.binc.unwrap_or(0)),
            };
            match clock {
                Some(remaining_ms) if !params.infinite => {
                    let remaining = Duration::from_millis(remaining_ms).saturating_sub(overhead);
                    let increment = Duration::from_millis(inc);

                    // With movestogo the clock refills; otherwise assume
                    // a long game remains.
                    let moves_left = params.movestogo.unwrap_or(30).max(2);

                    let base = remaining / moves_left + increment.mul_f64(0.8);
                    let target = base.min(remaining.mul_f64(0.33));
                    let cutoff = (base * 3).min(remaining.mul_f64(0.66));
                    TimeControl::new(Some(target), Some(cutoff))
                }
                _ => TimeControl::new(None, None),
            }
        };

        if params.ponder {
            time_control.set_pondering();
        }

        Self {
            depth,
            nodes: params.nodes,
            searchmoves: params.searchmoves.clone(),
            ponder: params.ponder,
            time_control,
        }
    }

    /// Check if search should stop due to the stop flag or hard cutoff.
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.time_control.is_stopped()
    }

    /// Start the time control clock. Call this when search begins.
    pub fn start(&self) {
        self.time_control.start();
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::depth(6)
    }
}

/// Thread-safe time controller that tracks whether search should stop.
///
/// This is designed to be cheaply cloneable and shareable across search
/// threads. The `is_stopped()` check is a fast atomic load, so it can
/// be called frequently during search without performance impact.
#[derive(Debug, Clone)]
pub struct TimeControl {
    /// Shared stop flag
    stopped: Arc<AtomicBool>,
    /// Start time of the search
    start_time: Arc<RwLock<Option<Instant>>>,
    /// Soft target in milliseconds (0 = none). Checked between
    /// iterations; doubled by the panic extension.
    target_ms: Arc<AtomicU64>,
    /// Hard deadline for this search (None = infinite)
    cutoff: Option<Duration>,
    /// While pondering no deadline applies; `ponderhit` clears this and
    /// restarts the clock.
    pondering: Arc<AtomicBool>,
    /// How often to check the clock (in nodes). Checking every node is wasteful.
    check_interval: u64,
}

impl TimeControl {
    /// Create a new time controller with a soft target and hard cutoff.
    pub fn new(target: Option<Duration>, cutoff: Option<Duration>) -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            start_time: Arc::new(RwLock::new(None)),
            target_ms: Arc::new(AtomicU64::new(
                target.map(|d| d.as_millis() as u64).unwrap_or(0),
            )),
            cutoff,
            pondering: Arc::new(AtomicBool::new(false)),
            check_interval: 4096,
        }
    }

    /// Suspend all deadlines until `ponderhit`.
    pub fn set_pondering(&self) {
        self.pondering.store(true, Ordering::SeqCst);
    }

    /// Start the clock. Should be called when search begins.
    pub fn start(&self) {
        *self.start_time.write().unwrap() = Some(Instant::now());
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Force stop the search immediately.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Check if search should stop.
    ///
    /// This is a fast atomic load, suitable for calling frequently.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Check the hard cutoff and update the stop flag if it passed.
    ///
    /// Call this periodically (e.g., every N nodes) rather than on
    /// every node to avoid performance overhead.
    pub fn check_time(&self) -> bool {
        if self.is_stopped() {
            return true;
        }
        if self.pondering.load(Ordering::Relaxed) {
            return false;
        }

        if let Some(limit) = self.cutoff
            && let Some(start) = *self.start_time.read().unwrap()
            && start.elapsed() >= limit
        {
            self.stop();
            return true;
        }

        false
    }

    /// Check if it's time to check the clock based on node count.
    ///
    /// Returns true every `check_interval` nodes.
    #[inline]
    pub fn should_check_time(&self, nodes: u64) -> bool {
        nodes % self.check_interval == 0
    }

    /// True once the soft target is spent. Consulted between
    /// iterations: starting another iteration that cannot finish is
    /// wasted work.
    pub fn target_exceeded(&self) -> bool {
        if self.pondering.load(Ordering::Relaxed) {
            return false;
        }
        let target = self.target_ms.load(Ordering::Relaxed);
        target != 0 && self.elapsed() >= Duration::from_millis(target)
    }

    /// Panic extension: double the soft target (bounded by the hard
    /// cutoff) when the iteration score drops sharply.
    pub fn extend_target(&self) {
        let target = self.target_ms.load(Ordering::Relaxed);
        if target == 0 {
            return;
        }
        let mut extended = target * 2;
        if let Some(cutoff) = self.cutoff {
            extended = extended.min(cutoff.as_millis() as u64);
        }
        self.target_ms.store(extended, Ordering::Relaxed);
    }

    /// Lift the deadline-free ponder state into a normal timed search.
    /// The clock is restarted so the budget counts from the hit.
    pub fn ponderhit(&self) {
        *self.start_time.write().unwrap() = Some(Instant::now());
        self.pondering.store(false, Ordering::SeqCst);
    }

    /// Get elapsed time since search started.
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .read()
            .unwrap()
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
#[path = "time_control_tests.rs"]
mod time_control_tests;
