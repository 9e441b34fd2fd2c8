//! Shared transposition table.
//!
//! A fixed, power-of-two array of two-entry buckets, read and written
//! without locks. Each 16-byte entry is a pair of 64-bit words: the
//! packed search data, and the full Zobrist key XORed with that data.
//! A torn read (words from different stores) then fails the key
//! comparison on probe and is treated as a miss, so no reader ever
//! consumes a half-written entry.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use chess_core::Move;

use crate::search::MATE_BOUND;

/// Bound classification of a stored score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    /// Exact score (PV node)
    Pv = 0,
    /// Lower bound (failed high)
    Cut = 1,
    /// Upper bound (failed low)
    All = 2,
    /// Empty slot marker
    None = 3,
}

impl NodeKind {
    #[inline(always)]
    fn from_bits(bits: u8) -> NodeKind {
        match bits & 3 {
            0 => NodeKind::Pv,
            1 => NodeKind::Cut,
            2 => NodeKind::All,
            _ => NodeKind::None,
        }
    }
}

/// Unpacked view of a table entry.
#[derive(Clone, Copy, Debug)]
pub struct TtEntry {
    pub score: i16,
    pub mv: Move,
    pub kind: NodeKind,
    pub age: u8,
    pub depth: u8,
}

#[inline(always)]
fn pack(entry: &TtEntry) -> u64 {
    (entry.score as u16 as u64)
        | ((entry.mv.raw() as u64) << 16)
        | ((entry.kind as u64) << 32)
        | ((entry.age as u64) << 40)
        | ((entry.depth as u64) << 48)
}

#[inline(always)]
fn unpack(data: u64) -> TtEntry {
    TtEntry {
        score: data as u16 as i16,
        mv: Move::from_raw((data >> 16) as u16),
        kind: NodeKind::from_bits((data >> 32) as u8),
        age: (data >> 40) as u8,
        depth: (data >> 48) as u8,
    }
}

/// One slot: data word plus key-xor-data word.
struct Slot {
    key_xor_data: AtomicU64,
    data: AtomicU64,
}

impl Default for Slot {
    fn default() -> Slot {
        Slot {
            key_xor_data: AtomicU64::new(0),
            data: AtomicU64::new(0),
        }
    }
}

/// Two slots per bucket, 32 bytes, cache-line friendly.
#[repr(align(32))]
struct Bucket {
    slots: [Slot; 2],
}

impl Default for Bucket {
    fn default() -> Bucket {
        Bucket {
            slots: [Slot::default(), Slot::default()],
        }
    }
}

pub struct TranspositionTable {
    buckets: Vec<Bucket>,
    age: AtomicU8,
}

/// Smallest table accepted, in megabytes.
pub const MIN_HASH_MB: usize = 1;
pub const DEFAULT_HASH_MB: usize = 64;

const BUCKET_BYTES: usize = std::mem::size_of::<Bucket>();

impl TranspositionTable {
    /// Allocate a table of at most `mb` megabytes, rounded down to a
    /// power-of-two bucket count. If the allocation fails, halve the
    /// request until it fits (minimum 1 MB).
    pub fn new(mb: usize) -> TranspositionTable {
        let mut mb = mb.max(MIN_HASH_MB);
        loop {
            let buckets = (mb * 1024 * 1024 / BUCKET_BYTES).next_power_of_two();
            let buckets = if buckets * BUCKET_BYTES > mb * 1024 * 1024 {
                buckets / 2
            } else {
                buckets
            };
            let mut vec: Vec<Bucket> = Vec::new();
            if vec.try_reserve_exact(buckets).is_ok() {
                vec.resize_with(buckets, Bucket::default);
                return TranspositionTable {
                    buckets: vec,
                    age: AtomicU8::new(0),
                };
            }
            if mb <= MIN_HASH_MB {
                // Even the minimum failed; fall back to a tiny table
                // rather than dying.
                let mut vec: Vec<Bucket> = Vec::new();
                vec.resize_with(1024, Bucket::default);
                return TranspositionTable {
                    buckets: vec,
                    age: AtomicU8::new(0),
                };
            }
            mb /= 2;
        }
    }

    /// Number of buckets (always a power of two).
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline(always)]
    fn bucket_for(&self, key: u64) -> &Bucket {
        let index = (key as usize) & (self.buckets.len() - 1);
        &self.buckets[index]
    }

    /// Look up a position. A hit requires the full 64-bit key to match
    /// after the two-word copy, which also rejects torn entries.
    pub fn probe(&self, key: u64) -> Option<TtEntry> {
        let bucket = self.bucket_for(key);
        for slot in &bucket.slots {
            let data = slot.data.load(Ordering::Relaxed);
            let stored_key = slot.key_xor_data.load(Ordering::Relaxed) ^ data;
            if stored_key == key && data != 0 {
                return Some(unpack(data));
            }
        }
        None
    }

    /// Store an entry, choosing a victim slot per the replacement
    /// policy: same-key entries are overwritten when the new data is at
    /// least as deep or exact; empty slots are filled first; otherwise
    /// the slot with the worse (depth - age distance) is sacrificed,
    /// preferring slots from older searches or shallower depths.
    pub fn store(&self, key: u64, depth: u8, score: i16, kind: NodeKind, mv: Move) {
        let age = self.age.load(Ordering::Relaxed);
        let entry = TtEntry {
            score,
            mv,
            kind,
            age,
            depth,
        };
        let bucket = self.bucket_for(key);

        // Same key: replace unless the stored entry is deeper and the
        // incoming one is not exact.
        for slot in &bucket.slots {
            let data = slot.data.load(Ordering::Relaxed);
            let stored_key = slot.key_xor_data.load(Ordering::Relaxed) ^ data;
            if data != 0 && stored_key == key {
                let existing = unpack(data);
                if depth >= existing.depth || kind == NodeKind::Pv {
                    // Keep the old move if the new entry has none.
                    let mv = if mv.is_none() { existing.mv } else { mv };
                    write_slot(slot, key, &TtEntry { mv, ..entry });
                }
                return;
            }
        }

        // Empty slot
        for slot in &bucket.slots {
            if slot.data.load(Ordering::Relaxed) == 0 {
                write_slot(slot, key, &entry);
                return;
            }
        }

        // Victim selection: lowest (depth - age distance) loses.
        let mut victim = &bucket.slots[0];
        let mut worst = i32::MAX;
        for slot in &bucket.slots {
            let existing = unpack(slot.data.load(Ordering::Relaxed));
            let age_distance = age.wrapping_sub(existing.age) as i32;
            let utility = existing.depth as i32 - age_distance;
            if utility < worst {
                worst = utility;
                victim = slot;
            }
        }
        write_slot(victim, key, &entry);
    }

    /// Wipe every entry.
    pub fn clear(&self) {
        for bucket in &self.buckets {
            for slot in &bucket.slots {
                slot.data.store(0, Ordering::Relaxed);
                slot.key_xor_data.store(0, Ordering::Relaxed);
            }
        }
        self.age.store(0, Ordering::Relaxed);
    }

    /// Bump the generation. Called once per `go`.
    pub fn new_search(&self) {
        self.age.fetch_add(1, Ordering::Relaxed);
    }

    pub fn age(&self) -> u8 {
        self.age.load(Ordering::Relaxed)
    }

    /// Approximate fill rate in permille, sampled over the first 1000
    /// buckets, counting entries touched by the current search.
    pub fn hashfull(&self) -> u32 {
        let age = self.age.load(Ordering::Relaxed);
        let samples = self.buckets.len().min(1000);
        let mut filled = 0u32;
        for bucket in &self.buckets[..samples] {
            for slot in &bucket.slots {
                let data = slot.data.load(Ordering::Relaxed);
                if data != 0 && unpack(data).age == age {
                    filled += 1;
                }
            }
        }
        filled * 1000 / (samples as u32 * 2)
    }
}

#[inline(always)]
fn write_slot(slot: &Slot, key: u64, entry: &TtEntry) {
    let data = pack(entry);
    slot.key_xor_data.store(key ^ data, Ordering::Relaxed);
    slot.data.store(data, Ordering::Relaxed);
}

/// Normalize a mate score to be relative to this node before storing,
/// so the entry stays valid when reached at a different root distance.
#[inline]
pub fn score_to_tt(score: i32, ply: usize) -> i16 {
    let adjusted = if score >= MATE_BOUND {
        score + ply as i32
    } else if score <= -MATE_BOUND {
        score - ply as i32
    } else {
        score
    };
    adjusted.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Undo [`score_to_tt`] when probing at `ply` from the root.
#[inline]
pub fn score_from_tt(score: i16, ply: usize) -> i32 {
    let score = score as i32;
    if score >= MATE_BOUND {
        score - ply as i32
    } else if score <= -MATE_BOUND {
        score + ply as i32
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MATE;

    fn entry_move(n: u16) -> Move {
        Move::from_raw(n)
    }

    #[test]
    fn test_store_probe_round_trip() {
        let tt = TranspositionTable::new(1);
        tt.store(0xDEADBEEF, 7, 123, NodeKind::Pv, entry_move(0x1234));
        let hit = tt.probe(0xDEADBEEF).expect("stored entry found");
        assert_eq!(hit.score, 123);
        assert_eq!(hit.depth, 7);
        assert_eq!(hit.kind, NodeKind::Pv);
        assert_eq!(hit.mv.raw(), 0x1234);
        assert!(tt.probe(0xDEADBEE0).is_none());
    }

    #[test]
    fn test_store_is_idempotent() {
        // Two identical stores are observationally the same as one.
        let tt = TranspositionTable::new(1);
        tt.store(42, 5, -77, NodeKind::Cut, entry_move(99));
        let first = tt.probe(42).unwrap();
        tt.store(42, 5, -77, NodeKind::Cut, entry_move(99));
        let second = tt.probe(42).unwrap();
        assert_eq!(first.score, second.score);
        assert_eq!(first.depth, second.depth);
        assert_eq!(first.kind, second.kind);
        assert_eq!(first.mv, second.mv);
        let fill = tt.hashfull();
        tt.store(42, 5, -77, NodeKind::Cut, entry_move(99));
        assert_eq!(tt.hashfull(), fill);
    }

    #[test]
    fn test_same_key_depth_preferred() {
        let tt = TranspositionTable::new(1);
        tt.store(7, 10, 50, NodeKind::Cut, entry_move(1));
        // Shallower non-exact store does not replace
        tt.store(7, 3, 60, NodeKind::Cut, entry_move(2));
        assert_eq!(tt.probe(7).unwrap().score, 50);
        // Shallower exact store does
        tt.store(7, 3, 70, NodeKind::Pv, entry_move(3));
        assert_eq!(tt.probe(7).unwrap().score, 70);
    }

    #[test]
    fn test_keeps_move_when_new_store_has_none() {
        let tt = TranspositionTable::new(1);
        tt.store(9, 4, 10, NodeKind::Cut, entry_move(0x42));
        tt.store(9, 6, 12, NodeKind::All, Move::NONE);
        let hit = tt.probe(9).unwrap();
        assert_eq!(hit.depth, 6);
        assert_eq!(hit.mv.raw(), 0x42);
    }

    #[test]
    fn test_bucket_holds_two_keys() {
        let tt = TranspositionTable::new(1);
        let cap = tt.capacity() as u64;
        // Two keys mapping to the same bucket
        tt.store(5, 4, 11, NodeKind::Cut, entry_move(1));
        tt.store(5 + cap, 9, 22, NodeKind::Cut, entry_move(2));
        assert_eq!(tt.probe(5).unwrap().score, 11);
        assert_eq!(tt.probe(5 + cap).unwrap().score, 22);

        // A third key evicts the shallower slot
        tt.store(5 + 2 * cap, 6, 33, NodeKind::Cut, entry_move(3));
        assert!(tt.probe(5).is_none());
        assert_eq!(tt.probe(5 + cap).unwrap().score, 22);
        assert_eq!(tt.probe(5 + 2 * cap).unwrap().score, 33);
    }

    #[test]
    fn test_aging_prefers_stale_victims() {
        let tt = TranspositionTable::new(1);
        let cap = tt.capacity() as u64;
        tt.store(3, 12, 1, NodeKind::Cut, entry_move(1)); // deep but old
        tt.new_search();
        tt.store(3 + cap, 2, 2, NodeKind::Cut, entry_move(2)); // shallow, current
        tt.store(3 + 2 * cap, 5, 3, NodeKind::Cut, entry_move(3));
        // Both extant slots qualify as victims (one is stale, one is
        // shallower); the lowest (depth - age distance) loses, which is
        // the shallow current entry here.
        let survivors = [tt.probe(3), tt.probe(3 + cap), tt.probe(3 + 2 * cap)];
        let alive = survivors.iter().filter(|p| p.is_some()).count();
        assert_eq!(alive, 2);
        assert!(tt.probe(3 + 2 * cap).is_some());
    }

    #[test]
    fn test_clear() {
        let tt = TranspositionTable::new(1);
        tt.store(1, 1, 1, NodeKind::Pv, entry_move(1));
        tt.clear();
        assert!(tt.probe(1).is_none());
        assert_eq!(tt.hashfull(), 0);
    }

    #[test]
    fn test_capacity_is_power_of_two_and_bounded() {
        for mb in [1, 2, 3, 7, 16, 64] {
            let tt = TranspositionTable::new(mb);
            assert!(tt.capacity().is_power_of_two());
            assert!(tt.capacity() * BUCKET_BYTES <= mb * 1024 * 1024);
        }
    }

    #[test]
    fn test_mate_score_normalization() {
        // Mate in 5 plies found at ply 2: stored relative to the node,
        // restored relative to any probing root distance.
        let root_score = MATE - 5;
        let stored = score_to_tt(root_score, 2);
        assert_eq!(stored as i32, MATE - 3);
        assert_eq!(score_from_tt(stored, 2), root_score);
        assert_eq!(score_from_tt(stored, 4), MATE - 7);

        let mated = -(MATE - 6);
        let stored = score_to_tt(mated, 3);
        assert_eq!(score_from_tt(stored, 3), mated);

        // Ordinary scores pass through untouched
        assert_eq!(score_from_tt(score_to_tt(137, 9), 9), 137);
    }

    #[test]
    fn test_hashfull_counts_current_age_only() {
        let tt = TranspositionTable::new(1);
        tt.store(11, 3, 5, NodeKind::Cut, entry_move(7));
        assert!(tt.hashfull() > 0);
        tt.new_search();
        assert_eq!(tt.hashfull(), 0);
    }
}
