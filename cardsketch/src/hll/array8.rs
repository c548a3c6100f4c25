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

//! HyperLogLog Array8 mode - one byte per register
//!
//! The simplest and fastest encoding. It also serves as the working
//! representation of [`HllUnion`](crate::hll::HllUnion): registers of any
//! source encoding fold in through [`Array8::absorb`], which takes the
//! per-register maximum and rebuilds the estimator.

use crate::common::NumStdDev;
use crate::error::Error;
use crate::hll::estimator::HipEstimator;
use crate::hll::estimator::inv_pow2;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::serialization::*;

/// Core Array8 data structure - one byte per register
#[derive(Debug, Clone, PartialEq)]
pub struct Array8 {
    lg_k: u8,
    /// One register per byte
    bytes: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
    /// HIP estimator for cardinality estimation
    estimator: HipEstimator,
}

impl Array8 {
    pub fn new(lg_k: u8) -> Self {
        let k = 1 << lg_k;
        Self {
            lg_k,
            bytes: vec![0u8; k as usize].into_boxed_slice(),
            num_zeros: k,
            estimator: HipEstimator::new(lg_k),
        }
    }

    /// Get the value at the given slot
    #[inline]
    pub(super) fn get(&self, slot: u32) -> u8 {
        self.bytes[slot as usize]
    }

    /// Get the number of registers (K = 2^lg_k)
    pub(super) fn num_registers(&self) -> usize {
        1 << self.lg_k
    }

    /// Non-zero registers as `(slot, value)` pairs.
    pub(super) fn registers(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.bytes
            .iter()
            .enumerate()
            .filter_map(|(slot, &value)| (value != 0).then_some((slot as u32, value)))
    }

    /// Update with a coupon
    pub fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.bytes[slot as usize];

        if new_value > old_value {
            // HIP and KxQ must see the transition before the register changes
            self.estimator.update(self.lg_k, old_value, new_value);

            self.bytes[slot as usize] = new_value;

            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    /// Folds `(slot, value)` pairs in, keeping the register maximum.
    ///
    /// Slots from a finer-grained array wrap onto this one by masking.
    /// The update interleaving is unknown afterwards, so the estimator is
    /// rebuilt in out-of-order mode.
    pub(super) fn absorb<I>(&mut self, registers: I)
    where
        I: IntoIterator<Item = (u32, u8)>,
    {
        let mask = (self.bytes.len() - 1) as u32;
        for (slot, value) in registers {
            let at = (slot & mask) as usize;
            if value > self.bytes[at] {
                self.bytes[at] = value;
            }
        }
        self.rebuild_estimator_from_registers();
    }

    /// Recompute the KxQ sums and zero count from the raw registers and
    /// mark the estimator out-of-order.
    fn rebuild_estimator_from_registers(&mut self) {
        let mut kxq0 = 0.0;
        let mut kxq1 = 0.0;
        let mut num_zeros = 0u32;
        for &v in self.bytes.iter() {
            if v == 0 {
                num_zeros += 1;
            }
            if v < 32 {
                kxq0 += inv_pow2(v);
            } else {
                kxq1 += inv_pow2(v);
            }
        }
        self.num_zeros = num_zeros;
        self.estimator.set_out_of_order(true);
        self.estimator.set_kxq0(kxq0);
        self.estimator.set_kxq1(kxq1);
    }

    /// Get the current cardinality estimate
    pub fn estimate(&self) -> f64 {
        // cur_min is always 0 for Array8, so num_at_cur_min = num_zeros
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

    /// Deserialize Array8 from HLL mode bytes
    ///
    /// Expects the full HLL header followed by one register byte per slot.
    pub fn deserialize(bytes: &[u8], lg_k: u8, ooo: bool) -> Result<Self, Error> {
        let num_bytes = 1usize << lg_k;
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

    /// Serialize Array8 to bytes
    ///
    /// Produces the full HLL header followed by one register byte per slot.
    pub fn serialize(&self, lg_k: u8) -> Vec<u8> {
        let num_bytes = 1usize << lg_k;
        let mut image = vec![0u8; HLL_HEADER_BYTES + num_bytes];

        HllHeader {
            lg_k,
            lg_arr: 0, // no aux array for Array8
            out_of_order: self.estimator.is_out_of_order(),
            cur_min: 0,
            tgt: tgt_type::HLL8,
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
