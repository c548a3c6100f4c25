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

//! HyperLogLog Array4 mode - 4-bit packed representation with exceptions
//!
//! Array4 stores register values as nibbles relative to a running minimum
//! `cur_min` (2 registers per byte). A nibble of 15 marks an exception
//! whose exact value lives in the auxiliary hash map.

use super::aux_map::AuxMap;
use super::aux_map::lg_aux_arr_ints;
use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;
use crate::hll::serialization::*;

const AUX_TOKEN: u8 = 15;

/// Core Array4 data structure - stores 4-bit values efficiently
#[derive(Debug, Clone, PartialEq)]
pub struct Array4 {
    lg_k: u8,
    /// Packed 4-bit values: 2 values per byte
    /// Even slots use low nibble, odd slots use high nibble
    bytes: Box<[u8]>,
    /// Offset shared by all stored nibbles; rises as the whole register
    /// array fills up
    cur_min: u8,
    /// Count of slots at exactly cur_min (when 0, cur_min rises)
    num_at_cur_min: u32,
    /// Exception table for values >= cur_min + 15
    aux_map: Option<AuxMap>,
    /// HIP estimator for cardinality estimation
    estimator: HipEstimator,
}

impl Array4 {
    pub fn new(lg_k: u8) -> Self {
        let num_bytes = 1 << (lg_k - 1);
        let num_at_cur_min = 1 << lg_k;
        Self {
            lg_k,
            bytes: vec![0u8; num_bytes].into_boxed_slice(),
            cur_min: 0,
            num_at_cur_min,
            aux_map: None,
            estimator: HipEstimator::new(lg_k),
        }
    }

    /// Get raw 4-bit value from slot (not adjusted for cur_min)
    ///
    /// Even slots occupy the low nibble of their byte, odd slots the high
    /// nibble; the shift is derived from the slot parity.
    #[inline]
    fn get_raw(&self, slot: u32) -> u8 {
        let byte = self.bytes[(slot >> 1) as usize];
        (byte >> ((slot & 1) * 4)) & 0x0F
    }

    /// Set raw 4-bit value in slot
    #[inline]
    fn put_raw(&mut self, slot: u32, value: u8) {
        debug_assert!(value <= AUX_TOKEN);

        let at = (slot >> 1) as usize;
        let shift = (slot & 1) * 4;
        self.bytes[at] = (self.bytes[at] & !(0x0Fu8 << shift)) | (value << shift);
    }

    /// Get the actual value at a slot (adjusted for cur_min and aux_map)
    ///
    /// Returns the true register value:
    /// - If raw < 15: value = cur_min + raw
    /// - If raw == 15 (AUX_TOKEN): value is in aux_map
    pub(super) fn get(&self, slot: u32) -> u8 {
        let raw = self.get_raw(slot);

        if raw < AUX_TOKEN {
            self.cur_min + raw
        } else {
            self.aux_map
                .as_ref()
                .and_then(|map| map.get(slot))
                .unwrap_or(self.cur_min)
        }
    }

    /// Get the number of registers (K = 2^lg_k)
    pub(super) fn num_registers(&self) -> usize {
        1 << self.lg_k
    }

    pub fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        // Quick rejection: if new value <= cur_min, no update needed
        if new_value <= self.cur_min {
            return;
        }

        let raw_stored = self.get_raw(slot);
        let lower_bound = raw_stored + self.cur_min;

        if new_value <= lower_bound {
            return;
        }

        // Get actual old value (might be in aux map)
        let old_value = if raw_stored < AUX_TOKEN {
            lower_bound
        } else {
            self.aux_map
                .as_ref()
                .expect("aux_map must exist while a slot holds AUX_TOKEN")
                .get(slot)
                .expect("slot must be in aux_map while it holds AUX_TOKEN")
        };

        if new_value <= old_value {
            return;
        }

        // HIP and KxQ must see the transition before the register changes
        self.estimator.update(self.lg_k, old_value, new_value);

        let shifted_new = new_value - self.cur_min;
        if raw_stored == AUX_TOKEN {
            // Once a slot escapes to the aux map it stays there until a
            // cur_min shift rescues it, so the new value lands there too
            debug_assert!(shifted_new >= AUX_TOKEN);
            self.aux_map
                .as_mut()
                .expect("aux_map must exist while a slot holds AUX_TOKEN")
                .replace(slot, new_value);
        } else if shifted_new >= AUX_TOKEN {
            // First escape for this slot
            self.put_raw(slot, AUX_TOKEN);
            self.aux_map
                .get_or_insert_with(|| AuxMap::new(self.lg_k))
                .insert(slot, new_value);
        } else {
            self.put_raw(slot, shifted_new);
        }

        if old_value == self.cur_min {
            self.num_at_cur_min -= 1;
            while self.num_at_cur_min == 0 {
                self.shift_to_bigger_cur_min();
            }
        }
    }

    /// Increment cur_min and adjust all values
    ///
    /// Called when no slot remains at the cur_min value. All stored
    /// nibbles drop by 1 and exceptions that fall back into the 4-bit
    /// range move out of the aux map.
    fn shift_to_bigger_cur_min(&mut self) {
        let new_cur_min = self.cur_min + 1;
        let k = 1 << self.lg_k;

        // Every non-exception nibble drops by one under the new offset
        let mut num_at_new = 0u32;
        for slot in 0..k {
            let raw = self.get_raw(slot);
            debug_assert_ne!(raw, 0, "no slot may sit at cur_min when shifting");
            if raw == AUX_TOKEN {
                continue;
            }
            self.put_raw(slot, raw - 1);
            num_at_new += u32::from(raw == 1);
        }

        // Exceptions whose value now fits a nibble leave the aux map
        if let Some(retiring) = self.aux_map.take() {
            let mut still_excepted = None;
            for (slot, exact) in retiring.into_pairs() {
                debug_assert_eq!(
                    self.get_raw(slot),
                    AUX_TOKEN,
                    "aux map entry without AUX_TOKEN in the array"
                );
                match exact - new_cur_min {
                    fits if fits < AUX_TOKEN => self.put_raw(slot, fits),
                    _ => still_excepted
                        .get_or_insert_with(|| AuxMap::new(self.lg_k))
                        .insert(slot, exact),
                }
            }
            self.aux_map = still_excepted;
        }

        self.cur_min = new_cur_min;
        self.num_at_cur_min = num_at_new;
    }

    /// Get the current cardinality estimate
    pub fn estimate(&self) -> f64 {
        self.estimator
            .estimate(self.lg_k, self.cur_min, self.num_at_cur_min)
    }

    /// Get upper bound for cardinality estimate
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .upper_bound(self.lg_k, self.cur_min, self.num_at_cur_min, num_std_dev)
    }

    /// Get lower bound for cardinality estimate
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .lower_bound(self.lg_k, self.cur_min, self.num_at_cur_min, num_std_dev)
    }

    /// Set the HIP accumulator value
    ///
    /// Used when promoting from coupon modes to carry the estimate forward
    pub fn set_hip_accum(&mut self, value: f64) {
        self.estimator.set_hip_accum(value);
    }

    /// Check if the sketch is empty (all slots are zero)
    pub fn is_empty(&self) -> bool {
        self.cur_min == 0 && self.num_at_cur_min == (1 << self.lg_k)
    }

    /// Deserialize Array4 from HLL mode bytes
    ///
    /// Expects the full HLL header followed by packed nibble data and the
    /// aux map: packed pairs in the compact form, a dense hash array in
    /// the updatable form.
    pub fn deserialize(bytes: &[u8], lg_k: u8, compact: bool, ooo: bool) -> Result<Self, Error> {
        let num_bytes = 1 << (lg_k - 1); // k/2 bytes for 4-bit packing

        if bytes.len() < HLL_HEADER_BYTES {
            return Err(Error::insufficient_data(format!(
                "expected at least {}, got {}",
                HLL_HEADER_BYTES,
                bytes.len()
            )));
        }

        let cur_min = bytes[offset::CUR_MIN];
        let lg_arr = bytes[offset::LG_ARR];
        let aux_count = get_u32(bytes, offset::AUX_COUNT) as usize;

        let aux_bytes = if compact {
            aux_count * BYTES_PER_COUPON
        } else if lg_arr > 0 {
            (1usize << lg_arr) * BYTES_PER_COUPON
        } else {
            0
        };
        let expected_len = HLL_HEADER_BYTES + num_bytes + aux_bytes;
        if bytes.len() < expected_len {
            return Err(Error::insufficient_data(format!(
                "expected {}, got {}",
                expected_len,
                bytes.len()
            )));
        }

        let mut data = vec![0u8; num_bytes];
        data.copy_from_slice(&bytes[offset::REGISTERS..offset::REGISTERS + num_bytes]);

        let aux_start = offset::REGISTERS + num_bytes;
        let slot_mask = (1u32 << lg_k) - 1;
        let mut aux_map = None;
        if aux_count > 0 {
            let mut aux = AuxMap::new(lg_k);
            if compact {
                // Packed pairs of exactly the occupied entries
                for i in 0..aux_count {
                    let pair = get_u32(bytes, aux_start + i * BYTES_PER_COUPON);
                    aux.insert(get_slot(pair) & slot_mask, get_value(pair));
                }
            } else {
                // Dense hash array; empty slots are zero
                for i in 0..(1usize << lg_arr) {
                    let pair = get_u32(bytes, aux_start + i * BYTES_PER_COUPON);
                    if pair != 0 {
                        aux.insert(get_slot(pair) & slot_mask, get_value(pair));
                    }
                }
                if aux.len() != aux_count {
                    return Err(Error::deserial(format!(
                        "aux count mismatch: expected {}, got {}",
                        aux_count,
                        aux.len()
                    )));
                }
            }
            aux_map = Some(aux);
        }

        Ok(Self {
            lg_k,
            bytes: data.into_boxed_slice(),
            cur_min,
            num_at_cur_min: get_u32(bytes, offset::NUM_AT_CUR_MIN),
            aux_map,
            estimator: HipEstimator::restored(
                get_f64(bytes, offset::HIP_ACCUM),
                get_f64(bytes, offset::KXQ0),
                get_f64(bytes, offset::KXQ1),
                ooo,
            ),
        })
    }

    /// Serialize Array4 to bytes
    ///
    /// Produces the full HLL header followed by packed nibble data and the
    /// aux map in compact form (packed pairs of occupied entries).
    pub fn serialize(&self, lg_k: u8) -> Vec<u8> {
        let num_bytes = 1 << (lg_k - 1); // k/2 bytes for 4-bit packing

        let aux_entries: Vec<(u32, u8)> = match &self.aux_map {
            Some(aux) => aux.iter().collect(),
            None => vec![],
        };

        let total_size = HLL_HEADER_BYTES + num_bytes + aux_entries.len() * BYTES_PER_COUPON;
        let mut image = vec![0u8; total_size];

        HllHeader {
            lg_k,
            lg_arr: match &self.aux_map {
                Some(aux) => aux.lg_size(),
                None => lg_aux_arr_ints(lg_k),
            },
            out_of_order: self.estimator.is_out_of_order(),
            cur_min: self.cur_min,
            tgt: tgt_type::HLL4,
            hip_accum: self.estimator.hip_accum(),
            kxq0: self.estimator.kxq0(),
            kxq1: self.estimator.kxq1(),
            num_at_cur_min: self.num_at_cur_min,
            aux_count: aux_entries.len() as u32,
        }
        .emit(&mut image);

        image[offset::REGISTERS..offset::REGISTERS + num_bytes].copy_from_slice(&self.bytes);

        let aux_start = offset::REGISTERS + num_bytes;
        for (i, (slot, value)) in aux_entries.iter().enumerate() {
            put_u32(
                &mut image,
                aux_start + i * BYTES_PER_COUPON,
                pack_coupon(*slot, *value),
            );
        }

        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DEFAULT_UPDATE_SEED;
    use crate::hll::coupon;

    #[test]
    fn test_get_set_raw() {
        let mut data = Array4::new(4); // 16 buckets

        // Even slot uses the low nibble
        data.put_raw(0, 5);
        assert_eq!(data.get_raw(0), 5);

        // Odd slot uses the high nibble
        data.put_raw(1, 7);
        assert_eq!(data.get_raw(1), 7);

        // Both values share one byte
        assert_eq!(data.bytes[0], 0x75);

        data.put_raw(2, 15);
        data.put_raw(3, 3);
        assert_eq!(data.get_raw(2), 15);
        assert_eq!(data.get_raw(3), 3);
    }

    #[test]
    fn test_hip_estimator_basic() {
        let mut arr = Array4::new(10); // 1024 buckets

        assert_eq!(arr.estimate(), 0.0);

        for i in 0..10_000u32 {
            arr.update(coupon(i, DEFAULT_UPDATE_SEED));
        }

        let estimate = arr.estimate();
        assert!(estimate.is_finite());
        assert!(
            (estimate - 10_000.0).abs() < 1_500.0,
            "estimate {estimate} too far from 10000"
        );
    }

    #[test]
    fn test_aux_escape_reads_exact_value() {
        let mut arr = Array4::new(7);

        // Value 40 exceeds cur_min + 14, so the nibble escapes to the aux map
        arr.update(pack_coupon(3, 40));
        assert_eq!(arr.get_raw(3), AUX_TOKEN);
        assert_eq!(arr.get(3), 40);

        // A larger value replaces the aux entry in place
        arr.update(pack_coupon(3, 50));
        assert_eq!(arr.get(3), 50);

        // A smaller value leaves it untouched
        arr.update(pack_coupon(3, 20));
        assert_eq!(arr.get(3), 50);
    }

    #[test]
    fn test_cur_min_rises_when_floor_is_exhausted() {
        let lg_k = 4;
        let k = 1u32 << lg_k;
        let mut arr = Array4::new(lg_k);

        // Drive every register to 2; the shared minimum must follow
        for slot in 0..k {
            arr.update(pack_coupon(slot, 2));
        }
        assert_eq!(arr.cur_min, 2);
        assert_eq!(arr.num_at_cur_min, k);
        for slot in 0..k {
            assert_eq!(arr.get(slot), 2);
        }
    }

    #[test]
    fn test_cur_min_shift_rescues_aux_entries() {
        let lg_k = 4;
        let k = 1u32 << lg_k;
        let mut arr = Array4::new(lg_k);

        // Slot 0 is an exception at 16 (= 0 + 15 overflow range)
        arr.update(pack_coupon(0, 16));
        assert_eq!(arr.get_raw(0), AUX_TOKEN);

        // Raise every other register to 2, lifting cur_min past the point
        // where 16 still needs the aux map
        for slot in 1..k {
            arr.update(pack_coupon(slot, 2));
        }
        assert_eq!(arr.cur_min, 2);
        assert_eq!(arr.get(0), 16);
        // 16 - 2 = 14 < 15 now fits in the nibble directly
        assert_eq!(arr.get_raw(0), 14);
        assert!(arr.aux_map.is_none());
    }

    #[test]
    fn test_serialize_deserialize_round_trip() {
        let mut arr = Array4::new(8);
        for i in 0..2_000u32 {
            arr.update(coupon(i, DEFAULT_UPDATE_SEED));
        }
        // Force at least one exception entry
        arr.update(pack_coupon(11, 55));
        assert!(arr.aux_map.is_some());

        let bytes = arr.serialize(8);
        let restored = Array4::deserialize(&bytes, 8, true, false).unwrap();

        assert_eq!(arr, restored);
        assert_eq!(restored.get(11), 55);
    }

    #[test]
    fn test_deserialize_truncated() {
        let arr = Array4::new(8);
        let bytes = arr.serialize(8);
        assert!(Array4::deserialize(&bytes[..bytes.len() - 1], 8, true, false).is_err());
    }
}
