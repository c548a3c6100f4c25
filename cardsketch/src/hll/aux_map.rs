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

//! Auxiliary map of HLL_4 register exceptions.
//!
//! Holds the exact value of every register whose value no longer fits the
//! 4-bit main array after the cur_min offset. Pairs are packed like
//! coupons and stored open-addressed.

use crate::hll::RESIZE_DENOMINATOR;
use crate::hll::RESIZE_NUMERATOR;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;

const ENTRY_EMPTY: u32 = 0;

/// lg of the initial aux table size for a sketch of the given lg_k.
pub(super) fn lg_aux_arr_ints(lg_k: u8) -> u8 {
    match lg_k {
        0..=6 => 2,
        7..=9 => 3,
        10..=11 => 4,
        12..=13 => 5,
        14 => 6,
        _ => lg_k - 8,
    }
}

/// Register-exception table: an open-addressed map from register index to
/// exact register value.
///
/// Each occupied cell packs `(value << 26) | slot_no`; an all-zero cell is
/// free. Lookup probes with an odd stride over the power-of-two table and
/// the table doubles before its load passes 3/4, so probe paths always
/// terminate.
#[derive(Debug, Clone)]
pub struct AuxMap {
    lg_size: u8,
    lg_k: u8,
    pairs: Box<[u32]>,
    len: usize,
}

impl PartialEq for AuxMap {
    fn eq(&self, other: &Self) -> bool {
        fn occupied_sorted(map: &AuxMap) -> Vec<u32> {
            let mut pairs: Vec<u32> = map
                .pairs
                .iter()
                .copied()
                .filter(|&pair| pair != ENTRY_EMPTY)
                .collect();
            pairs.sort_unstable();
            pairs
        }

        self.lg_k == other.lg_k
            && self.len == other.len
            && occupied_sorted(self) == occupied_sorted(other)
    }
}

impl AuxMap {
    /// Creates an empty map sized for a sketch of the given lg_k.
    pub fn new(lg_k: u8) -> Self {
        let lg_size = lg_aux_arr_ints(lg_k);
        Self {
            lg_size,
            lg_k,
            pairs: vec![ENTRY_EMPTY; 1 << lg_size].into_boxed_slice(),
            len: 0,
        }
    }

    /// Number of stored register exceptions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// lg of the current table size, persisted in the wire header.
    pub fn lg_size(&self) -> u8 {
        self.lg_size
    }

    /// The cell holding `slot`'s pair (`Ok`), or the free cell where it
    /// would be placed (`Err`).
    fn locate(&self, slot: u32) -> Result<usize, usize> {
        probe_from(
            &self.pairs,
            self.lg_size,
            slot,
            (1u32 << self.lg_k) - 1,
        )
    }

    /// Exact value of a register, if it has an exception entry.
    pub fn get(&self, slot: u32) -> Option<u8> {
        self.locate(slot)
            .ok()
            .map(|at| get_value(self.pairs[at]))
    }

    /// Records a new register exception.
    ///
    /// The caller (Array4) checks for an existing entry first; a second
    /// insert for the same slot is an invariant violation.
    pub fn insert(&mut self, slot: u32, value: u8) {
        let Err(open) = self.locate(slot) else {
            unreachable!("slot {slot} already has an aux entry");
        };
        self.pairs[open] = pack_coupon(slot, value);
        self.len += 1;
        if self.len * RESIZE_DENOMINATOR as usize > self.pairs.len() * RESIZE_NUMERATOR as usize {
            self.grow();
        }
    }

    /// Overwrites the value of an existing register exception.
    ///
    /// The caller (Array4) checks for the entry first; replacing a missing
    /// slot is an invariant violation.
    pub fn replace(&mut self, slot: u32, value: u8) {
        let Ok(at) = self.locate(slot) else {
            unreachable!("slot {slot} has no aux entry to replace");
        };
        self.pairs[at] = pack_coupon(slot, value);
    }

    /// Doubles the table and re-probes every pair into it.
    fn grow(&mut self) {
        let lg_wider = self.lg_size + 1;
        let mut wider = vec![ENTRY_EMPTY; 1usize << lg_wider].into_boxed_slice();
        let slot_mask = (1u32 << self.lg_k) - 1;
        for &pair in self.pairs.iter().filter(|&&pair| pair != ENTRY_EMPTY) {
            let slot = get_slot(pair) & slot_mask;
            let Err(open) = probe_from(&wider, lg_wider, slot, slot_mask) else {
                unreachable!("pairs are unique per slot");
            };
            wider[open] = pair;
        }
        self.pairs = wider;
        self.lg_size = lg_wider;
    }

    /// Iterates over `(slot, value)` pairs without consuming the map.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        let slot_mask = (1u32 << self.lg_k) - 1;
        self.pairs
            .iter()
            .filter(|&&pair| pair != ENTRY_EMPTY)
            .map(move |&pair| (get_slot(pair) & slot_mask, get_value(pair)))
    }

    /// Consumes the map, yielding its `(slot, value)` pairs.
    pub fn into_pairs(self) -> impl Iterator<Item = (u32, u8)> {
        let slot_mask = (1u32 << self.lg_k) - 1;
        self.pairs
            .into_vec()
            .into_iter()
            .filter(|&pair| pair != ENTRY_EMPTY)
            .map(move |pair| (get_slot(pair) & slot_mask, get_value(pair)))
    }
}

/// Follows `slot`'s probe path through `pairs` until its own pair (`Ok`)
/// or a free cell (`Err`) turns up.
fn probe_from(pairs: &[u32], lg_size: u8, slot: u32, slot_mask: u32) -> Result<usize, usize> {
    let mask = pairs.len() as u32 - 1;
    let stride = (slot >> lg_size) | 1;
    let mut at = slot & mask;
    for _ in 0..pairs.len() {
        let pair = pairs[at as usize];
        if pair == ENTRY_EMPTY {
            return Err(at as usize);
        }
        if get_slot(pair) & slot_mask == slot {
            return Ok(at as usize);
        }
        at = (at + stride) & mask;
    }
    unreachable!("aux map grows before filling");
}
