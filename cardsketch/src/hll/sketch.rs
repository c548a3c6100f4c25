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

//! HyperLogLog sketch implementation
//!
//! This module provides the main [`HllSketch`] struct, which is the primary
//! interface for creating and using HLL sketches for cardinality estimation.

use std::hash::Hash;

use crate::codec::Family;
use crate::codec::SketchSlice;
use crate::common::NumStdDev;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hll::HllType;
use crate::hll::RESIZE_DENOMINATOR;
use crate::hll::RESIZE_NUMERATOR;
use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::container::Container;
use crate::hll::coupon;
use crate::hll::hash_set::HashSet;
use crate::hll::list::List;
use crate::hll::mode::Mode;
use crate::hll::serialization::*;

/// A HyperLogLog sketch.
///
/// See the [hll module level documentation](crate::hll) for more.
#[derive(Debug, Clone, PartialEq)]
pub struct HllSketch {
    lg_k: u8,
    seed: u64,
    mode: Mode,
}

impl HllSketch {
    /// Create a new HLL sketch with the default hash seed.
    ///
    /// # Arguments
    ///
    /// * `lg_k` - Log2 of the number of registers (K). Must be in [4, 21].
    ///   - lg_k=4: 16 registers, ~26% relative error
    ///   - lg_k=12: 4096 registers, ~1.6% relative error (common choice)
    ///   - lg_k=21: 2M registers, ~0.4% relative error
    /// * `hll_type` - Target HLL array type (Hll4, Hll6, or Hll8)
    ///
    /// # Panics
    ///
    /// If lg_k is not in range [4, 21]
    pub fn new(lg_k: u8, hll_type: HllType) -> Self {
        Self::new_with_seed(lg_k, hll_type, DEFAULT_UPDATE_SEED)
    }

    /// Create a new HLL sketch with an explicit hash seed.
    ///
    /// Sketches only produce meaningful unions when built from the same
    /// seed. The wire image does not carry the seed, so a deserialized
    /// sketch always reports the default seed; use distinct seeds only
    /// for in-process sketches.
    ///
    /// # Panics
    ///
    /// If lg_k is not in range [4, 21]
    pub fn new_with_seed(lg_k: u8, hll_type: HllType, seed: u64) -> Self {
        assert!(
            (4..=21).contains(&lg_k),
            "lg_k must be in [4, 21], got {}",
            lg_k
        );

        Self {
            lg_k,
            seed,
            mode: Mode::List {
                log: List::default(),
                target: hll_type,
            },
        }
    }

    /// Create an HLL sketch directly from a Mode
    ///
    /// This is used internally (e.g., by union operations) to construct
    /// sketches in specific modes without going through List mode first.
    pub(super) fn from_mode(lg_k: u8, mode: Mode) -> Self {
        Self {
            lg_k,
            seed: DEFAULT_UPDATE_SEED,
            mode,
        }
    }

    /// Get the current mode of the sketch
    pub(super) fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Check if the sketch is empty (no values have been added)
    pub fn is_empty(&self) -> bool {
        self.mode.is_empty()
    }

    /// Get the target HLL type for this sketch
    pub fn target_type(&self) -> HllType {
        self.mode.target_type()
    }

    /// Get the configured lg_k
    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    /// Get the hash seed this sketch updates with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Update the sketch with a value
    ///
    /// This accepts any type that implements `Hash`. The value is hashed
    /// and converted to a coupon, which is then inserted into the sketch.
    pub fn update<T: Hash>(&mut self, value: T) {
        let coupon = coupon(value, self.seed);
        self.update_with_coupon(coupon);
    }

    /// Update the sketch with a raw coupon value
    ///
    /// Maintains all sketch invariants including mode transitions and
    /// estimator updates.
    pub(super) fn update_with_coupon(&mut self, coupon: u32) {
        match &mut self.mode {
            Mode::List { log, .. } => log.update(coupon),
            Mode::Set { coupons, .. } => coupons.update(coupon),
            Mode::Array4(arr) => arr.update(coupon),
            Mode::Array6(arr) => arr.update(coupon),
            Mode::Array8(arr) => arr.update(coupon),
        }
        self.promote_if_needed();
    }

    /// Move to the next storage mode when the current one is outgrown.
    ///
    /// A full list promotes to set mode (or straight to an array when the
    /// sketch is small); a set past 3/4 load either grows or, once its
    /// table reaches `lg_k - 3`, promotes to the target array.
    fn promote_if_needed(&mut self) {
        let next = match &self.mode {
            Mode::List { log, target } if log.container().is_full() => {
                if self.lg_k < 8 {
                    Some(self.replayed_array(log.container(), *target))
                } else {
                    Some(Mode::Set {
                        coupons: replayed_set(log.container(), HashSet::default()),
                        target: *target,
                    })
                }
            }
            Mode::Set { coupons, target } => {
                let store = coupons.container();
                let overloaded = store.len() * RESIZE_DENOMINATOR as usize
                    > store.capacity() * RESIZE_NUMERATOR as usize;
                if !overloaded {
                    None
                } else if store.lg_size() == (self.lg_k - 3) as usize {
                    Some(self.replayed_array(store, *target))
                } else {
                    Some(Mode::Set {
                        coupons: replayed_set(store, HashSet::new(store.lg_size() + 1)),
                        target: *target,
                    })
                }
            }
            _ => None,
        };
        if let Some(mode) = next {
            self.mode = mode;
        }
    }

    /// Builds the target register array from a coupon store, carrying the
    /// coupon estimate forward in the HIP accumulator.
    fn replayed_array(&self, store: &Container, target: HllType) -> Mode {
        match target {
            HllType::Hll4 => {
                let mut array = Array4::new(self.lg_k);
                for coupon in store.iter() {
                    array.update(coupon);
                }
                array.set_hip_accum(store.estimate());
                Mode::Array4(array)
            }
            HllType::Hll6 => {
                let mut array = Array6::new(self.lg_k);
                for coupon in store.iter() {
                    array.update(coupon);
                }
                array.set_hip_accum(store.estimate());
                Mode::Array6(array)
            }
            HllType::Hll8 => {
                let mut array = Array8::new(self.lg_k);
                for coupon in store.iter() {
                    array.update(coupon);
                }
                array.set_hip_accum(store.estimate());
                Mode::Array8(array)
            }
        }
    }

    /// Get the current cardinality estimate
    pub fn estimate(&self) -> f64 {
        self.mode.estimate()
    }

    /// Get upper bound for cardinality estimate
    ///
    /// Returns the upper confidence bound for the cardinality estimate based on
    /// the number of standard deviations requested.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.upper_bound(num_std_dev)
    }

    /// Get lower bound for cardinality estimate
    ///
    /// Returns the lower confidence bound for the cardinality estimate based on
    /// the number of standard deviations requested.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.mode.lower_bound(num_std_dev)
    }

    /// Serializes the HLL sketch to bytes
    pub fn serialize(&self) -> Vec<u8> {
        match &self.mode {
            Mode::List { log, target } => log.serialize(self.lg_k, *target),
            Mode::Set { coupons, target } => coupons.serialize(self.lg_k, *target),
            Mode::Array4(arr) => arr.serialize(self.lg_k),
            Mode::Array6(arr) => arr.serialize(self.lg_k),
            Mode::Array8(arr) => arr.serialize(self.lg_k),
        }
    }

    /// Deserializes an HLL sketch from bytes
    ///
    /// The restored sketch reports the default seed; the wire image does
    /// not carry one.
    pub fn deserialize(bytes: &[u8]) -> Result<HllSketch, Error> {
        if bytes.len() < 8 {
            return Err(Error::insufficient_data(format!(
                "at least 8 bytes expected, actual {}",
                bytes.len()
            )));
        }

        Family::HLL.validate_id(bytes[offset::FAMILY])?;
        if bytes[offset::SER_VER] != SER_VER {
            return Err(Error::unsupported_serial_version(
                SER_VER,
                bytes[offset::SER_VER],
            ));
        }

        let lg_k = bytes[offset::LG_K];
        if !(4..=21).contains(&lg_k) {
            return Err(Error::deserial(format!(
                "lg_k must be in [4, 21], got {lg_k}"
            )));
        }

        let lg_arr = bytes[offset::LG_ARR];
        let flags = bytes[offset::FLAGS];
        let empty = flags & flag::EMPTY != 0;
        let compact = flags & flag::COMPACT != 0;
        let ooo = flags & flag::OUT_OF_ORDER != 0;

        let hll_type = match tgt_type_of(bytes[offset::MODE]) {
            tgt_type::HLL4 => HllType::Hll4,
            tgt_type::HLL6 => HllType::Hll6,
            tgt_type::HLL8 => HllType::Hll8,
            tgt => {
                return Err(Error::deserial(format!("invalid target HLL type: {tgt}")));
            }
        };

        let preamble_ints = bytes[offset::PRE_INTS];
        let require_pre_ints = |expected: u8, mode_name: &str| {
            if preamble_ints != expected {
                return Err(Error::deserial(format!(
                    "{mode_name} mode preamble: expected {expected}, got {preamble_ints}"
                )));
            }
            Ok(())
        };

        let mode = match cur_mode_of(bytes[offset::MODE]) {
            cur_mode::LIST => {
                require_pre_ints(pre_ints::LIST, "LIST")?;

                let coupon_count = bytes[offset::LIST_COUNT] as usize;
                let mut cursor = SketchSlice::new(bytes);
                cursor.advance(offset::LIST_COUPONS);
                let log = List::deserialize(cursor, lg_arr as usize, coupon_count, empty, compact)?;
                Mode::List {
                    log,
                    target: hll_type,
                }
            }
            cur_mode::SET => {
                require_pre_ints(pre_ints::SET, "SET")?;

                let mut cursor = SketchSlice::new(bytes);
                cursor.advance(offset::SET_COUNT);
                let coupons = HashSet::deserialize(cursor, lg_arr as usize, compact)?;
                Mode::Set {
                    coupons,
                    target: hll_type,
                }
            }
            cur_mode::HLL => {
                require_pre_ints(pre_ints::HLL, "HLL")?;

                match hll_type {
                    HllType::Hll4 => {
                        Array4::deserialize(bytes, lg_k, compact, ooo).map(Mode::Array4)?
                    }
                    HllType::Hll6 => Array6::deserialize(bytes, lg_k, ooo).map(Mode::Array6)?,
                    HllType::Hll8 => Array8::deserialize(bytes, lg_k, ooo).map(Mode::Array8)?,
                }
            }
            mode => return Err(Error::deserial(format!("invalid mode: {mode}"))),
        };

        Ok(HllSketch {
            lg_k,
            seed: DEFAULT_UPDATE_SEED,
            mode,
        })
    }
}

/// Re-probes every coupon of a store into a fresh set.
fn replayed_set(store: &Container, mut into: HashSet) -> HashSet {
    for coupon in store.iter() {
        into.update(coupon);
    }
    into
}
