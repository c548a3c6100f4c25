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

//! Open-addressed set of unique coupons
//!
//! Takes over from the list once linear duplicate search stops being
//! cheap. Collisions resolve by an odd stride over a power-of-two table,
//! so a probe path visits every slot before wrapping.

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hll::HllType;
use crate::hll::KEY_MASK_26;
use crate::hll::container::COUPON_EMPTY;
use crate::hll::container::Container;
use crate::hll::serialization::*;

/// Hash set for efficient coupon storage with collision handling
#[derive(Debug, Clone, PartialEq)]
pub struct HashSet {
    container: Container,
}

impl Default for HashSet {
    fn default() -> Self {
        const LG_INIT_SET_SIZE: usize = 5;
        Self::new(LG_INIT_SET_SIZE)
    }
}

impl HashSet {
    pub fn new(lg_size: usize) -> Self {
        Self {
            container: Container::new(lg_size),
        }
    }

    /// Inserts a coupon, ignoring duplicates.
    pub fn update(&mut self, coupon: u32) {
        let table_size = self.container.coupons.len();
        let mask = table_size as u32 - 1;
        let stride = ((coupon & KEY_MASK_26) >> self.container.lg_size()) | 1;
        let mut at = coupon & mask;

        // The owning sketch grows or promotes the set before it can fill,
        // so a full sweep always passes a free slot first.
        for _ in 0..table_size {
            match self.container.coupons[at as usize] {
                COUPON_EMPTY => {
                    self.container.coupons[at as usize] = coupon;
                    self.container.len += 1;
                    return;
                }
                occupant if occupant == coupon => return,
                _ => at = (at + stride) & mask,
            }
        }
        unreachable!("coupon set grows before filling");
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Deserialize a HashSet from the bytes following the preamble
    ///
    /// The cursor is expected to sit at the coupon count field.
    pub fn deserialize(mut cursor: SketchSlice, lg_arr: usize, compact: bool) -> Result<Self, Error> {
        let coupon_count = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("coupon_count"))? as usize;

        if compact {
            // Compact form stores only the occupied entries; rebuild the
            // table by re-probing each one
            let mut hash_set = HashSet::new(lg_arr);
            for i in 0..coupon_count {
                let coupon = cursor.read_u32_le().map_err(|_| {
                    Error::insufficient_data(format!(
                        "expected {coupon_count} coupons, failed at index {i}"
                    ))
                })?;
                hash_set.update(coupon);
            }
            Ok(hash_set)
        } else {
            // Updatable form stores the whole table including empty slots
            let array_size = 1 << lg_arr;
            if coupon_count > array_size {
                return Err(Error::deserial(format!(
                    "set count {coupon_count} exceeds array size {array_size}"
                )));
            }

            let mut coupons = vec![COUPON_EMPTY; array_size];
            for (i, coupon) in coupons.iter_mut().enumerate() {
                *coupon = cursor.read_u32_le().map_err(|_| {
                    Error::insufficient_data(format!(
                        "expected {array_size} coupons, failed at index {i}"
                    ))
                })?;
            }

            Ok(Self {
                container: Container::from_coupons(
                    lg_arr,
                    coupons.into_boxed_slice(),
                    coupon_count,
                ),
            })
        }
    }

    /// Serialize a HashSet to bytes (compact: sorted occupied entries)
    pub fn serialize(&self, lg_k: u8, hll_type: HllType) -> Vec<u8> {
        let coupon_count = self.container.len();

        let mut bytes =
            SketchBytes::with_capacity(offset::SET_COUPONS + coupon_count * BYTES_PER_COUPON);
        bytes.write_u8(pre_ints::SET);
        bytes.write_u8(SER_VER);
        bytes.write_u8(Family::HLL.id);
        bytes.write_u8(lg_k);
        bytes.write_u8(self.container.lg_size() as u8);
        bytes.write_u8(flag::COMPACT);
        bytes.write_u8(0);
        bytes.write_u8(mode_byte(cur_mode::SET, hll_type as u8));

        bytes.write_u32_le(coupon_count as u32);

        // Sort for deterministic output
        let mut coupons: Vec<u32> = self.container.iter().collect();
        coupons.sort_unstable();
        for coupon in coupons {
            bytes.write_u32_le(coupon);
        }

        bytes.into_bytes()
    }
}
