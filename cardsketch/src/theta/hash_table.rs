// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::hash::Hash;

use crate::common::ResizeFactor;
use crate::hash::MurmurHash3X64128;
use crate::hash::compute_seed_hash;

/// Maximum theta value (the top bit of the hash space is unused)
pub const MAX_THETA: u64 = i64::MAX as u64;

/// Minimum log2 of K
pub const MIN_LG_K: u8 = 4;

/// Maximum log2 of K
pub const MAX_LG_K: u8 = 26;

/// Default log2 of K
pub const DEFAULT_LG_K: u8 = 12;

/// Smallest slot array ever allocated
const MIN_LG_TABLE_SIZE: u8 = 5;

/// High key bits feeding the probe stride
const STRIDE_MASK: u64 = 0x7F;

/// Fixed power-of-two array of 64-bit hash slots, probed with an odd
/// stride derived from high key bits.
///
/// Zero marks a free slot. The array only stores and locates keys; the
/// load policy (when to grow, when to downsample) belongs to the table
/// wrapping it.
#[derive(Debug)]
struct SlotArray {
    lg_size: u8,
    slots: Box<[u64]>,
}

/// Where a probe sequence ended.
enum Probe {
    /// The key occupies this index.
    Hit(usize),
    /// The key is absent; first free index on its probe path.
    Open(usize),
}

impl SlotArray {
    fn empty(lg_size: u8) -> Self {
        Self {
            lg_size,
            slots: vec![0u64; 1usize << lg_size].into_boxed_slice(),
        }
    }

    /// Builds an array of the given size holding `keys`, which must be
    /// distinct, non-zero, and fewer than the array size.
    fn rebuilt<I>(lg_size: u8, keys: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut array = Self::empty(lg_size);
        for key in keys {
            match array.probe(key) {
                Probe::Open(at) => array.slots[at] = key,
                Probe::Hit(_) => unreachable!("rebuilt from distinct keys"),
            }
        }
        array
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    /// Follows the probe path of `key` to its slot or to the free slot
    /// where it would be placed.
    ///
    /// The stride is odd and the size a power of two, so the path visits
    /// every slot once before wrapping; the load policy keeps at least one
    /// slot free, so the loop always ends.
    fn probe(&self, key: u64) -> Probe {
        let mask = self.slots.len() - 1;
        let stride = (((key >> self.lg_size) & STRIDE_MASK) as usize) * 2 + 1;
        let mut at = key as usize & mask;
        for _ in 0..self.slots.len() {
            match self.slots[at] {
                0 => return Probe::Open(at),
                occupant if occupant == key => return Probe::Hit(at),
                _ => at = (at + stride) & mask,
            }
        }
        unreachable!("slot array kept below capacity by the load policy");
    }

    fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots.iter().copied().filter(|&slot| slot != 0)
    }
}

/// Hash table backing the theta sketch.
///
/// Couples a [`SlotArray`] with the sampling state (theta, emptiness) and
/// the growth schedule. The array starts small and grows by the resize
/// factor as it fills; once it reaches `2^(lg_nom_size + 1)` slots,
/// overflow instead downsamples: the retained set is cut to the nominal
/// `2^lg_nom_size` smallest entries and theta drops to the next one.
#[derive(Debug)]
pub(crate) struct ThetaHashTable {
    slots: SlotArray,
    num_retained: usize,
    theta: u64,
    // Logical emptiness of the source set; can be false with zero
    // retained entries when every update was screened by theta.
    is_empty: bool,
    lg_nom_size: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    hash_seed: u64,
}

impl ThetaHashTable {
    pub fn new(
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        hash_seed: u64,
    ) -> Self {
        Self {
            slots: SlotArray::empty(initial_lg_size(
                lg_nom_size + 1,
                resize_factor.lg_value(),
            )),
            num_retained: 0,
            theta: theta_for_sampling(sampling_probability),
            is_empty: true,
            lg_nom_size,
            resize_factor,
            sampling_probability,
            hash_seed,
        }
    }

    /// Rebuilds an updatable table from the entries of a deserialized
    /// image. The slot array is sized directly for the entry count;
    /// entries at or above `theta` are dropped, matching the screening
    /// the producer applied.
    pub fn from_entries(lg_nom_size: u8, hash_seed: u64, theta: u64, entries: Vec<u64>) -> Self {
        let mut table = Self::new(lg_nom_size, ResizeFactor::X8, 1.0, hash_seed);
        table.theta = theta;
        table.slots = SlotArray::empty(
            lg_size_for_count(entries.len()).clamp(MIN_LG_TABLE_SIZE, lg_nom_size + 1),
        );
        for entry in entries {
            table.try_insert_hash(entry);
        }
        table
    }

    /// Hashes a value with the table seed.
    ///
    /// The top bit is discarded so every hash falls below `MAX_THETA`.
    pub fn hash<T: Hash>(&self, value: T) -> u64 {
        let mut hasher = MurmurHash3X64128::with_seed(self.hash_seed);
        value.hash(&mut hasher);
        hasher.finish128().0 >> 1
    }

    /// Hashes and inserts a value. Returns whether the value was new.
    pub fn try_insert<T: Hash>(&mut self, value: T) -> bool {
        let hash = self.hash(value);
        self.try_insert_hash(hash)
    }

    /// Inserts a pre-hashed value. Returns whether the hash was retained.
    ///
    /// Any update clears the empty flag, including one screened out by
    /// theta.
    pub fn try_insert_hash(&mut self, hash: u64) -> bool {
        self.is_empty = false;
        if hash == 0 || hash >= self.theta {
            return false;
        }

        let at = match self.slots.probe(hash) {
            Probe::Hit(_) => return false,
            Probe::Open(at) => at,
        };
        self.slots.slots[at] = hash;
        self.num_retained += 1;

        if self.num_retained > self.capacity() {
            if self.slots.lg_size <= self.lg_nom_size {
                self.grow();
            } else {
                self.downsample();
            }
        }
        true
    }

    /// Load limit before the table reorganizes: half full while it can
    /// still grow, 15/16 full once it reached its final size.
    fn capacity(&self) -> usize {
        let size = self.slots.size();
        if self.slots.lg_size <= self.lg_nom_size {
            size / 2
        } else {
            size * 15 / 16
        }
    }

    /// Extends the slot array one resize-factor step, capped at the final
    /// size `2^(lg_nom_size + 1)`.
    fn grow(&mut self) {
        let lg_limit = self.lg_nom_size + 1;
        let lg_step = self
            .resize_factor
            .lg_value()
            .max(1)
            .min(lg_limit - self.slots.lg_size);
        let live: Vec<u64> = self.slots.iter().collect();
        self.slots = SlotArray::rebuilt(self.slots.lg_size + lg_step, live);
    }

    /// Cuts the retained set to the nominal `k = 2^lg_nom_size` smallest
    /// entries and lowers theta to the (k+1)-th smallest.
    fn downsample(&mut self) {
        let k = 1usize << self.lg_nom_size;
        let mut live: Vec<u64> = self.slots.iter().collect();
        let (kept, pivot, _) = live.select_nth_unstable(k);
        self.theta = *pivot;
        self.slots = SlotArray::rebuilt(self.slots.lg_size, kept.iter().copied());
        self.num_retained = k;
    }

    /// Lowers theta and drops retained entries at or above it.
    ///
    /// No-op unless `new_theta` is strictly below the current theta.
    pub fn shrink_theta(&mut self, new_theta: u64) {
        if new_theta >= self.theta {
            return;
        }
        self.theta = new_theta;
        let survivors: Vec<u64> = self.slots.iter().filter(|&e| e < new_theta).collect();
        self.num_retained = survivors.len();
        self.slots = SlotArray::rebuilt(self.slots.lg_size, survivors);
    }

    /// Trims the retained set down to the nominal size k.
    pub fn trim(&mut self) {
        if self.num_retained > (1 << self.lg_nom_size) {
            self.downsample();
        }
    }

    /// Returns the table to its post-construction state.
    pub fn reset(&mut self) {
        self.slots = SlotArray::empty(initial_lg_size(
            self.lg_nom_size + 1,
            self.resize_factor.lg_value(),
        ));
        self.num_retained = 0;
        self.theta = theta_for_sampling(self.sampling_probability);
        self.is_empty = true;
    }

    pub fn num_retained(&self) -> usize {
        self.num_retained
    }

    pub fn theta(&self) -> u64 {
        self.theta
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Sets the logical emptiness of the source set.
    pub fn set_empty(&mut self, is_empty: bool) {
        self.is_empty = is_empty;
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots.iter()
    }

    pub fn lg_nom_size(&self) -> u8 {
        self.lg_nom_size
    }

    /// 16-bit digest of the hash seed, for compatibility checks.
    pub fn seed_hash(&self) -> u16 {
        compute_seed_hash(self.hash_seed)
    }
}

/// Smallest slot array whose 15/16 load limit accommodates `count`
/// entries.
fn lg_size_for_count(count: usize) -> u8 {
    let mut lg = 1u8;
    while count * 16 > (1usize << lg) * 15 {
        lg += 1;
    }
    lg
}

/// First size on the growth schedule: walks down from the full size in
/// resize-factor steps without passing the minimum, so that growth steps
/// land exactly on the full size.
fn initial_lg_size(lg_full: u8, lg_resize_factor: u8) -> u8 {
    let mut lg = lg_full.max(MIN_LG_TABLE_SIZE);
    if lg_resize_factor > 0 {
        while lg >= MIN_LG_TABLE_SIZE + lg_resize_factor {
            lg -= lg_resize_factor;
        }
    }
    lg
}

/// Initial theta implied by the sampling probability.
fn theta_for_sampling(p: f32) -> u64 {
    if p >= 1.0 {
        MAX_THETA
    } else {
        (MAX_THETA as f64 * p as f64) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DEFAULT_UPDATE_SEED;

    fn contains(table: &ThetaHashTable, hash: u64) -> bool {
        table.iter().any(|e| e == hash)
    }

    #[test]
    fn test_new_hash_table() {
        let table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        assert_eq!(
            table.slots.lg_size,
            initial_lg_size(8 + 1, ResizeFactor::X8.lg_value())
        );
        assert_eq!(table.theta(), MAX_THETA);
        assert_eq!(table.num_retained(), 0);
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn test_hash_and_theta_screen_behavior() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        // With MAX_THETA, hashes are computed normally.
        let hash1 = table.hash("test1");
        let hash2 = table.hash("test2");
        assert_ne!(hash1, 0);
        assert_ne!(hash2, 0);
        assert_ne!(hash1, hash2);
        assert!(hash1 < MAX_THETA && hash2 < MAX_THETA);

        // With low theta, updates are screened out but still clear the
        // empty flag.
        table.theta = 1;
        assert!(!table.try_insert("test3"));
        assert_eq!(table.num_retained(), 0);
        assert!(!table.is_empty());
    }

    #[test]
    fn test_try_insert() {
        let mut table = ThetaHashTable::new(5, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        assert!(table.try_insert("test_value"));
        assert_eq!(table.num_retained(), 1);
        assert!(!table.is_empty());

        // Inserting the same value again is a no-op
        assert!(!table.try_insert("test_value"));
        assert_eq!(table.num_retained(), 1);

        // A zero hash is reserved for free slots
        assert!(!table.try_insert_hash(0));
        assert_eq!(table.num_retained(), 1);
    }

    #[test]
    fn test_probe_finds_inserted_hashes() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        let hash = table.hash("present");
        assert!(!contains(&table, hash));
        table.try_insert_hash(hash);
        assert!(contains(&table, hash));
        assert!(!contains(&table, table.hash("absent")));
    }

    #[test]
    fn test_grow() {
        fn populate_values(table: &mut ThetaHashTable, count: usize) -> usize {
            (0..count)
                .filter(|i| table.try_insert(format!("value_{i}")))
                .count()
        }

        {
            let mut table = ThetaHashTable::new(8, ResizeFactor::X2, 1.0, DEFAULT_UPDATE_SEED);

            assert_eq!(table.slots.size(), 32);

            // Crossing the half-load limit (16 of 32) doubles the array
            let inserted = populate_values(&mut table, 20);

            assert_eq!(table.num_retained(), inserted);
            assert_eq!(table.slots.size(), 64);
        }

        // Larger resize factors grow in bigger steps
        {
            let mut table = ThetaHashTable::new(8, ResizeFactor::X4, 1.0, DEFAULT_UPDATE_SEED);

            assert_eq!(table.slots.size(), 32);

            let inserted = populate_values(&mut table, 20);

            assert_eq!(table.num_retained(), inserted);
            assert_eq!(table.slots.size(), 128);
        }

        // X1 tables start at full size so growth never runs
        {
            let table = ThetaHashTable::new(8, ResizeFactor::X1, 1.0, DEFAULT_UPDATE_SEED);
            assert_eq!(table.slots.size(), 1 << 9);
        }
    }

    #[test]
    fn test_grow_never_exceeds_final_size() {
        let mut table = ThetaHashTable::new(5, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);
        for i in 0..1000 {
            table.try_insert(i);
        }
        assert!(table.slots.lg_size <= table.lg_nom_size + 1);
    }

    #[test]
    fn test_downsample() {
        let mut table = ThetaHashTable::new(5, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        assert_eq!(table.slots.lg_size, 6);
        assert_eq!(table.theta(), MAX_THETA);

        // Insert enough values to overflow the full-size array
        for i in 0..100 {
            table.try_insert(format!("value_{i}"));
        }

        // Overflow at full size lowers theta instead of growing
        let theta_after_first = table.theta();
        assert!(theta_after_first < MAX_THETA);

        for i in 100..300 {
            table.try_insert(format!("value_{i}"));
        }

        assert_eq!(table.slots.lg_size, 6);
        assert!(table.theta() < theta_after_first);
    }

    #[test]
    fn test_downsample_keeps_entries_below_kth_smallest() {
        let mut table = ThetaHashTable::new(5, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);
        let k = 1usize << 5;

        let mut inserted_hashes = vec![];
        let mut i = 0;
        // Insert distinct values until the first downsample lowers theta
        while table.theta() == MAX_THETA {
            let hash = table.hash(i);
            if table.try_insert_hash(hash) {
                inserted_hashes.push(hash);
            }
            i += 1;
        }

        inserted_hashes.sort_unstable();
        let kth = inserted_hashes[k];
        assert_eq!(table.theta(), kth);
        assert!(table.iter().all(|e| e < kth));
        assert_eq!(table.num_retained(), k);
    }

    #[test]
    fn test_shrink_theta_drops_survivors_above() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);
        for i in 0..100 {
            table.try_insert(i);
        }
        let mut hashes: Vec<u64> = table.iter().collect();
        hashes.sort_unstable();
        let cut = hashes[50];

        table.shrink_theta(cut);
        assert_eq!(table.theta(), cut);
        assert_eq!(table.num_retained(), 50);
        assert!(table.iter().all(|e| e < cut));

        // Raising theta back is a no-op
        table.shrink_theta(MAX_THETA);
        assert_eq!(table.theta(), cut);
    }

    #[test]
    fn test_trim() {
        let mut table = ThetaHashTable::new(5, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        for i in 0..100 {
            table.try_insert(format!("value_{i}"));
        }

        let before_trim = table.num_retained();
        assert!(before_trim > 32);

        table.trim();
        assert!(table.num_retained() <= 32);
        assert!(table.theta() < MAX_THETA);
    }

    #[test]
    fn test_trim_when_not_needed() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        for i in 0..10 {
            table.try_insert(format!("value_{i}"));
        }

        let before_trim = table.num_retained();
        let before_theta = table.theta();
        table.trim();

        assert_eq!(before_trim, table.num_retained());
        assert_eq!(before_theta, table.theta());
    }

    #[test]
    fn test_reset() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);
        let init_theta = table.theta();
        let init_lg = table.slots.lg_size;

        for i in 0..10 {
            table.try_insert(format!("value_{i}"));
        }

        assert!(!table.is_empty());
        assert!(table.num_retained() > 0);

        table.reset();

        assert!(table.is_empty());
        assert_eq!(table.num_retained(), 0);
        assert_eq!(table.theta(), init_theta);
        assert_eq!(table.slots.lg_size, init_lg);
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn test_table_with_sampling() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 0.5, DEFAULT_UPDATE_SEED);
        assert_eq!(table.theta(), (MAX_THETA as f64 * 0.5) as u64);

        for i in 0..10 {
            table.try_insert(format!("value_{i}"));
        }

        table.reset();

        assert_eq!(table.theta(), (MAX_THETA as f64 * 0.5) as u64);
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_entries_round_trip() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);
        for i in 0..50 {
            table.try_insert(i);
        }
        let entries: Vec<u64> = table.iter().collect();

        let restored = ThetaHashTable::from_entries(
            table.lg_nom_size(),
            DEFAULT_UPDATE_SEED,
            table.theta(),
            entries.clone(),
        );
        assert_eq!(restored.num_retained(), entries.len());
        assert!(!restored.is_empty());
        for entry in entries {
            assert!(contains(&restored, entry));
        }
    }

    #[test]
    fn test_lg_size_for_count() {
        assert_eq!(lg_size_for_count(0), 1);
        assert_eq!(lg_size_for_count(1), 1);
        assert_eq!(lg_size_for_count(2), 2);
        assert_eq!(lg_size_for_count(15), 4);
        assert_eq!(lg_size_for_count(16), 5);
        // At the limit exactly: 15/16 of 32 slots holds 30 entries
        assert_eq!(lg_size_for_count(30), 5);
        assert_eq!(lg_size_for_count(31), 6);
    }

    #[test]
    fn test_initial_lg_size_lands_on_growth_schedule() {
        // Every start size must reach the full size in whole steps
        for lg_full in 5..=27u8 {
            for lg_rf in 0..=3u8 {
                let lg = initial_lg_size(lg_full, lg_rf);
                assert!(lg >= MIN_LG_TABLE_SIZE);
                if lg_rf > 0 && lg_full > MIN_LG_TABLE_SIZE {
                    assert_eq!((lg_full - lg) % lg_rf, 0, "full={lg_full} rf={lg_rf}");
                }
            }
        }
        assert_eq!(initial_lg_size(9, 3), 6);
        assert_eq!(initial_lg_size(9, 0), 9);
        assert_eq!(initial_lg_size(4, 2), MIN_LG_TABLE_SIZE);
    }

    #[test]
    fn test_iterator() {
        let mut table = ThetaHashTable::new(8, ResizeFactor::X8, 1.0, DEFAULT_UPDATE_SEED);

        let mut inserted_hashes = vec![];
        for i in 0..10 {
            let hash = table.hash(i);
            if table.try_insert(i) {
                inserted_hashes.push(hash);
            }
        }

        let iter_hashes: Vec<u64> = table.iter().collect();
        assert_eq!(iter_hashes.len(), table.num_retained());
        assert_eq!(iter_hashes.len(), inserted_hashes.len());

        for hash in &inserted_hashes {
            assert!(iter_hashes.contains(hash));
        }

        assert!(!iter_hashes.contains(&0));
    }
}
