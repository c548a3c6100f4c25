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

//! HyperLogLog Array6 mode - 6-bit packed representation
//!
//! Array6 stores register values using 6 bits per slot, covering the full
//! 0-62 value range without exception handling or the cur_min offset of
//! Array4.

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::serialization::*;

const SIX_BIT_MASK: u16 = 0x3F;

/// Core Array6 data structure - stores 6-bit values with cross-byte packing
#[derive(Debug, Clone, PartialEq)]
pub struct Array6 {
    lg_k: u8,
    /// Packed 6-bit values, may cross byte boundaries
    bytes: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
    /// HIP estimator for cardinality estimation
    estimator: HipEstimator,
}

impl Array6 {
    pub fn new(lg_k: u8) -> Self {
        let k = 1 << lg_k;

        Self {
            lg_k,
            bytes: vec![0u8; packed_bytes_for(k)].into_boxed_slice(),
            num_zeros: k,
            estimator: HipEstimator::new(lg_k),
        }
    }

    /// Get value from a slot (6-bit value)
    ///
    /// A 16-bit window over two adjacent bytes covers values crossing a
    /// byte boundary.
    #[inline]
    fn get_raw(&self, slot: u32) -> u8 {
        let bit = slot as usize * 6;
        let window = u16::from_le_bytes([self.bytes[bit / 8], self.bytes[bit / 8 + 1]]);
        (window >> (bit % 8)) as u8 & SIX_BIT_MASK as u8
    }

    /// Set value in a slot (6-bit value)
    ///
    /// Read-modify-write on the same 16-bit window preserves the
    /// neighboring slots' bits.
    #[inline]
    fn put_raw(&mut self, slot: u32, value: u8) {
        debug_assert!(value <= 63, "6-bit value must be 0-63");

        let bit = slot as usize * 6;
        let shift = bit % 8;
        let mut window = u16::from_le_bytes([self.bytes[bit / 8], self.bytes[bit / 8 + 1]]);
        window &= !(SIX_BIT_MASK << shift);
        window |= u16::from(value) << shift;
        [self.bytes[bit / 8], self.bytes[bit / 8 + 1]] = window.to_le_bytes();
    }

    /// Get the unpacked 6-bit value (0-62) at the given slot
    #[inline]
    pub(super) fn get(&self, slot: u32) -> u8 {
        self.get_raw(slot)
    }

    /// Get the number of registers (K = 2^lg_k)
    pub(super) fn num_registers(&self) -> usize {
        1 << self.lg_k
    }

    /// Update with a coupon
    pub fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.get_raw(slot);

        if new_value > old_value {
            // HIP and KxQ must see the transition before the register changes
            self.estimator.update(self.lg_k, old_value, new_value);

            self.put_raw(slot, new_value);

            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    /// Get the current cardinality estimate
    pub fn estimate(&self) -> f64 {
        // cur_min is always 0 for Array6, so num_at_cur_min = num_zeros
        self.estimator.estimate(self.lg_k, 0, self.num_zeros)
    }

    /// Get upper bound for cardinality estimate
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .upper_bound(self.lg_k, 0, self.num_zeros, num_std_dev)
    }

    /// Get lower bound for cardinality estimate
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.estimator
            .lower_bound(self.lg_k, 0, self.num_zeros, num_std_dev)
    }

    /// Set the HIP accumulator value
    ///
    /// Used when promoting from coupon modes to carry the estimate forward
    pub fn set_hip_accum(&mut self, value: f64) {
        self.estimator.set_hip_accum(value);
    }

    /// Check if the sketch is empty (all slots are zero)
    pub fn is_empty(&self) -> bool {
        self.num_zeros == (1 << self.lg_k)
    }

    /// Deserialize Array6 from HLL mode bytes
    ///
    /// Expects the full HLL header followed by packed 6-bit data.
    pub fn deserialize(bytes: &[u8], lg_k: u8, ooo: bool) -> Result<Self, Error> {
        let num_bytes = packed_bytes_for(1 << lg_k);
        let expected_len = HLL_HEADER_BYTES + num_bytes;

        if bytes.len() < expected_len {
            return Err(Error::insufficient_data(format!(
                "expected {}, got {}",
                expected_len,
                bytes.len()
            )));
        }

        let mut data = vec![0u8; num_bytes];
        data.copy_from_slice(&bytes[offset::REGISTERS..offset::REGISTERS + num_bytes]);

        Ok(Self {
            lg_k,
            bytes: data.into_boxed_slice(),
            // num_at_cur_min doubles as num_zeros since cur_min is always 0
            num_zeros: get_u32(bytes, offset::NUM_AT_CUR_MIN),
            estimator: HipEstimator::restored(
                get_f64(bytes, offset::HIP_ACCUM),
                get_f64(bytes, offset::KXQ0),
                get_f64(bytes, offset::KXQ1),
                ooo,
            ),
        })
    }

    /// Serialize Array6 to bytes
    ///
    /// Produces the full HLL header followed by packed 6-bit data.
    pub fn serialize(&self, lg_k: u8) -> Vec<u8> {
        let num_bytes = packed_bytes_for(1 << lg_k);
        let mut image = vec![0u8; HLL_HEADER_BYTES + num_bytes];

        HllHeader {
            lg_k,
            lg_arr: 0, // no aux array for Array6
            out_of_order: self.estimator.is_out_of_order(),
            cur_min: 0,
            tgt: tgt_type::HLL6,
            hip_accum: self.estimator.hip_accum(),
            kxq0: self.estimator.kxq0(),
            kxq1: self.estimator.kxq1(),
            num_at_cur_min: self.num_zeros,
            aux_count: 0,
        }
        .emit(&mut image);

        image[offset::REGISTERS..].copy_from_slice(&self.bytes);

        image
    }
}

/// Bytes needed for k slots of 6 bits each.
///
/// One extra byte keeps the 16-bit window of the last slot in bounds.
fn packed_bytes_for(k: u32) -> usize {
    (k as usize * 6).div_ceil(8) + 1
}
