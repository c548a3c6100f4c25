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

//! HyperLogLog sketches for distinct counting.
//!
//! An HLL sketch summarizes a stream into a fixed block of registers and
//! estimates the number of distinct items it has seen, trading a small,
//! configurable relative error for memory independent of the stream size.
//!
//! # Storage modes
//!
//! A sketch with `2^lg_k` registers adapts its storage to the cardinality
//! it has seen so far:
//!
//! - **List mode**: a small append-only coupon log for tiny cardinalities
//! - **Set mode**: an open-addressed coupon set for medium cardinalities
//! - **HLL mode**: a dense register array for large cardinalities, in one
//!   of three encodings ([`HllType::Hll4`], [`HllType::Hll6`],
//!   [`HllType::Hll8`])
//!
//! Mode transitions are automatic and transparent. Each promotion replays
//! all previously observed coupons and carries the running estimate
//! forward, so accuracy is preserved across transitions.
//!
//! # Estimation
//!
//! While a sketch only ever receives direct updates, the HIP (Historical
//! Inverse Probability) accumulator provides the estimate. After a merge
//! the sketch is marked out-of-order and estimation switches to a
//! composite of the raw HLL estimator and linear counting; the flag is
//! persisted across serialization.
//!
//! # Union
//!
//! [`HllUnion`] combines sketches of different precisions, modes, and
//! target encodings into one estimate:
//!
//! ```
//! # use cardsketch::hll::HllSketch;
//! # use cardsketch::hll::HllType;
//! # use cardsketch::hll::HllUnion;
//! let mut weekday = HllSketch::new(11, HllType::Hll4);
//! let mut weekend = HllSketch::new(11, HllType::Hll6);
//! weekday.update("alice");
//! weekday.update("bob");
//! weekend.update("bob");
//!
//! let mut combined = HllUnion::new(11);
//! combined.update(&weekday);
//! combined.update(&weekend);
//! assert!(combined.get_result(HllType::Hll8).estimate() >= 2.0);
//! ```
//!
//! # Serialization
//!
//! [`HllSketch::serialize`] and [`HllSketch::deserialize`] preserve the
//! mode, target encoding, register values, estimator state, and
//! out-of-order flag in a bit-exact little-endian image.

use std::hash::Hash;

use crate::hash::MurmurHash3X64128;

mod array4;
mod array6;
mod array8;
mod aux_map;
mod composite_interpolation;
mod container;
mod cubic_interpolation;
mod estimator;
mod harmonic_numbers;
mod hash_set;
mod list;
mod mode;
mod serialization;
mod sketch;
mod union;

pub use self::sketch::HllSketch;
pub use self::union::HllUnion;

/// Register encoding of an HLL sketch in dense mode.
///
/// See the [module level documentation](self) for the trade-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HllType {
    /// Four bits per register, the densest encoding at roughly K/2 bytes.
    /// Registers that outgrow the 4-bit range spill into a small
    /// auxiliary exception map (about 3% extra beyond lg_k 13), which
    /// also makes this the slowest encoding to update.
    Hll4,
    /// Six bits per register, covering the whole value range without
    /// exceptions at about 3K/4 bytes. The middle ground on speed.
    Hll6,
    /// One byte per register. The fastest updates and the simplest
    /// layout, paid for with the full K bytes of storage.
    Hll8,
}

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

/// Register values are capped so a coupon's 6-bit value field cannot wrap.
const MAX_COUPON_VALUE: u32 = 62;

const COUPON_RSE_FACTOR: f64 = 0.409; // At transition point not the asymptote
const COUPON_RSE: f64 = COUPON_RSE_FACTOR / (1 << 13) as f64;

const RESIZE_NUMERATOR: u32 = 3; // Resize at 3/4 = 75% load factor
const RESIZE_DENOMINATOR: u32 = 4;

/// The slot number in a coupon's low 26 bits.
#[inline]
fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// The register value in a coupon's upper 6 bits.
#[inline]
fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// A coupon: `[value (6 bits)] [slot (26 bits)]`.
#[inline]
fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

/// Generate a coupon from a hashable value.
///
/// The low hash half selects the register address; the value is the
/// leading-zero count of the high half plus one, capped at 62.
fn coupon<H: Hash>(v: H, seed: u64) -> u32 {
    let mut hasher = MurmurHash3X64128::with_seed(seed);
    v.hash(&mut hasher);
    let (lo, hi) = hasher.finish128();

    let value = (hi.leading_zeros() + 1).min(MAX_COUPON_VALUE) as u8;
    pack_coupon(lo as u32, value)
}
