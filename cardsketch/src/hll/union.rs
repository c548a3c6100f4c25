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

//! HyperLogLog union for combining multiple HLL sketches
//!
//! The union runs on a single rule: every input reduces to a stream of
//! `(slot, value)` register pairs or coupons, and the internal Hll8
//! "gadget" takes the per-register maximum of everything it has seen.
//! Inputs may differ in lg_k (slots fold by masking), in mode (List, Set,
//! or any register array), and in target HLL type. The maximum rule makes
//! the union commutative, associative, and idempotent; array results are
//! always out-of-order and estimated with the composite estimator.

use std::hash::Hash;

use crate::common::NumStdDev;
use crate::hll::HllSketch;
use crate::hll::HllType;
use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::mode::Mode;
use crate::hll::pack_coupon;

/// An HLL union for combining multiple HLL sketches.
///
/// See the [hll module level documentation](crate::hll) for more.
#[derive(Debug, Clone)]
pub struct HllUnion {
    /// Precision ceiling; finer inputs are folded down to this
    lg_max_k: u8,
    /// Internal Hll8 sketch accumulating the union
    gadget: HllSketch,
}

impl HllUnion {
    /// Create a new HLL union
    ///
    /// # Arguments
    ///
    /// * `lg_max_k` - Maximum log2 of the number of registers. Must be in [4, 21]. Input
    ///   sketches with larger lg_k are down-sampled.
    ///
    /// # Panics
    ///
    /// Panics if `lg_max_k` is not in the range [4, 21].
    pub fn new(lg_max_k: u8) -> Self {
        assert!(
            (4..=21).contains(&lg_max_k),
            "lg_max_k must be in [4, 21], got {}",
            lg_max_k
        );

        Self {
            lg_max_k,
            gadget: HllSketch::new(lg_max_k, HllType::Hll8),
        }
    }

    /// Update the union's gadget with a value directly
    pub fn update_value<T: Hash>(&mut self, value: T) {
        self.gadget.update(value);
    }

    /// Update the union with another sketch
    ///
    /// # Panics
    ///
    /// Panics if the sketch was built with a hash seed different from the
    /// union's (the default seed); their coupons are not comparable.
    pub fn update(&mut self, sketch: &HllSketch) {
        assert_eq!(
            sketch.seed(),
            self.gadget.seed(),
            "cannot union sketches with different hash seeds"
        );

        if sketch.is_empty() {
            return;
        }

        if let Some(store) = sketch.mode().coupons() {
            // Coupon-mode input: replay through the gadget, which handles
            // its own promotions
            for coupon in store.iter() {
                self.gadget.update_with_coupon(coupon);
            }
        } else {
            self.fold_in_registers(sketch);
        }
    }

    /// Folds an array-mode input into the gadget, rebuilding the gadget as
    /// an Hll8 array of the common precision.
    fn fold_in_registers(&mut self, sketch: &HllSketch) {
        let src_lg_k = sketch.lg_k().min(self.lg_max_k);
        let dst_lg_k = match self.gadget.mode() {
            // An array gadget only ever gets coarser
            Mode::Array8(_) => self.gadget.lg_k().min(src_lg_k),
            _ => src_lg_k,
        };

        let mut merged = Array8::new(dst_lg_k);
        match self.gadget.mode() {
            Mode::Array8(resident) => merged.absorb(resident.registers()),
            _ => {
                if let Some(store) = self.gadget.mode().coupons() {
                    for coupon in store.iter() {
                        merged.update(coupon);
                    }
                }
            }
        }
        merged.absorb(registers_of(sketch.mode()));

        self.gadget = HllSketch::from_mode(dst_lg_k, Mode::Array8(merged));
    }

    /// Get the union result as a new sketch
    ///
    /// Returns a copy of the internal gadget sketch with the requested
    /// target HLL type, repacking the register encoding if needed.
    pub fn get_result(&self, hll_type: HllType) -> HllSketch {
        if hll_type == self.gadget.target_type() {
            return self.gadget.clone();
        }

        let lg_k = self.gadget.lg_k();
        match self.gadget.mode() {
            Mode::List { log, .. } => HllSketch::from_mode(
                lg_k,
                Mode::List {
                    log: log.clone(),
                    target: hll_type,
                },
            ),
            Mode::Set { coupons, .. } => HllSketch::from_mode(
                lg_k,
                Mode::Set {
                    coupons: coupons.clone(),
                    target: hll_type,
                },
            ),
            Mode::Array8(resident) => {
                let mode = match hll_type {
                    HllType::Hll8 => Mode::Array8(resident.clone()),
                    HllType::Hll6 => Mode::Array6(repack_as_hll6(resident, lg_k)),
                    HllType::Hll4 => Mode::Array4(repack_as_hll4(resident, lg_k)),
                };
                HllSketch::from_mode(lg_k, mode)
            }
            Mode::Array4(_) | Mode::Array6(_) => {
                unreachable!("union gadget stays Hll8 in array mode")
            }
        }
    }

    /// Get the current lg_k of the internal gadget
    pub fn lg_k(&self) -> u8 {
        self.gadget.lg_k()
    }

    /// Get the maximum lg_k this union can handle
    pub fn lg_max_k(&self) -> u8 {
        self.lg_max_k
    }

    /// Check if the union is empty
    pub fn is_empty(&self) -> bool {
        self.gadget.is_empty()
    }

    /// Reset the union to its initial empty state
    pub fn reset(&mut self) {
        self.gadget = HllSketch::new(self.lg_max_k, HllType::Hll8);
    }

    /// Get the current cardinality estimate of the union
    pub fn estimate(&self) -> f64 {
        self.gadget.estimate()
    }

    /// Get upper bound for cardinality estimate of the union
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.gadget.upper_bound(num_std_dev)
    }

    /// Get lower bound for cardinality estimate of the union
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.gadget.lower_bound(num_std_dev)
    }
}

/// Non-zero registers of any array encoding, as `(slot, value)` pairs.
fn registers_of(mode: &Mode) -> Box<dyn Iterator<Item = (u32, u8)> + '_> {
    fn occupied(
        num_registers: usize,
        read: impl Fn(u32) -> u8,
    ) -> impl Iterator<Item = (u32, u8)> {
        (0..num_registers as u32).filter_map(move |slot| {
            let value = read(slot);
            (value > 0).then_some((slot, value))
        })
    }

    match mode {
        Mode::Array8(arr) => Box::new(occupied(arr.num_registers(), move |slot| arr.get(slot))),
        Mode::Array6(arr) => Box::new(occupied(arr.num_registers(), move |slot| arr.get(slot))),
        Mode::Array4(arr) => Box::new(occupied(arr.num_registers(), move |slot| arr.get(slot))),
        Mode::List { .. } | Mode::Set { .. } => {
            unreachable!("coupon modes replay through the gadget")
        }
    }
}

/// Repacks an Hll8 gadget into the 6-bit encoding.
///
/// Registers replay as coupons; whichever of the two estimates is larger
/// is carried in the HIP accumulator.
fn repack_as_hll6(resident: &Array8, lg_k: u8) -> Array6 {
    let mut packed = Array6::new(lg_k);
    for (slot, value) in resident.registers() {
        packed.update(pack_coupon(slot, value.min(63)));
    }
    if resident.estimate() > packed.estimate() {
        packed.set_hip_accum(resident.estimate());
    }
    packed
}

/// Repacks an Hll8 gadget into the 4-bit encoding with aux exceptions.
fn repack_as_hll4(resident: &Array8, lg_k: u8) -> Array4 {
    let mut packed = Array4::new(lg_k);
    for (slot, value) in resident.registers() {
        packed.update(pack_coupon(slot, value));
    }
    if resident.estimate() > packed.estimate() {
        packed.set_hip_accum(resident.estimate());
    }
    packed
}
