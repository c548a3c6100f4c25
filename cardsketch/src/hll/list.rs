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

//! Append-only log of unique coupons
//!
//! The first storage of every sketch: coupons append in arrival order and
//! duplicates are caught by a linear scan, which stays cheap for the
//! handful of coupons the list holds before set mode takes over.

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hll::HllType;
use crate::hll::container::COUPON_EMPTY;
use crate::hll::container::Container;
use crate::hll::serialization::*;

/// List for sequential coupon storage with duplicate detection
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    container: Container,
}

impl Default for List {
    fn default() -> Self {
        const LG_INIT_LIST_SIZE: usize = 3;
        Self::new(LG_INIT_LIST_SIZE)
    }
}

impl List {
    pub fn new(lg_size: usize) -> Self {
        Self {
            container: Container::new(lg_size),
        }
    }

    /// Appends a coupon unless it is already present.
    ///
    /// Occupied slots are always the leading ones, so the duplicate scan
    /// and the append both work on the prefix. A full list drops the
    /// coupon; promotion to set mode is the owning sketch's job.
    pub fn update(&mut self, coupon: u32) {
        let filled = self.container.len;
        if self.container.coupons[..filled].contains(&coupon) {
            return;
        }
        if let Some(open) = self.container.coupons.get_mut(filled) {
            *open = coupon;
            self.container.len += 1;
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Deserialize a List from the bytes following the preamble
    pub fn deserialize(
        mut cursor: SketchSlice,
        lg_arr: usize,
        coupon_count: usize,
        empty: bool,
        compact: bool,
    ) -> Result<Self, Error> {
        // Compact images carry only the occupied prefix; updatable images
        // carry the whole array.
        let stored = if compact { coupon_count } else { 1 << lg_arr };
        if stored > (1 << lg_arr) {
            return Err(Error::deserial(format!(
                "list count {coupon_count} exceeds array size {}",
                1usize << lg_arr
            )));
        }

        let mut coupons = vec![COUPON_EMPTY; 1 << lg_arr];
        if !empty {
            for (i, coupon) in coupons.iter_mut().take(stored).enumerate() {
                *coupon = cursor.read_u32_le().map_err(|_| {
                    Error::insufficient_data(format!(
                        "expected {stored} coupons, failed at index {i}"
                    ))
                })?;
            }
        }

        Ok(Self {
            container: Container::from_coupons(lg_arr, coupons.into_boxed_slice(), coupon_count),
        })
    }

    /// Serialize a List to bytes (compact: only occupied slots)
    pub fn serialize(&self, lg_k: u8, hll_type: HllType) -> Vec<u8> {
        let coupon_count = self.container.len();

        let mut bytes =
            SketchBytes::with_capacity(offset::LIST_COUPONS + coupon_count * BYTES_PER_COUPON);
        bytes.write_u8(pre_ints::LIST);
        bytes.write_u8(SER_VER);
        bytes.write_u8(Family::HLL.id);
        bytes.write_u8(lg_k);
        bytes.write_u8(self.container.lg_size() as u8);
        bytes.write_u8(if self.container.is_empty() {
            flag::COMPACT | flag::EMPTY
        } else {
            flag::COMPACT
        });
        bytes.write_u8(coupon_count as u8);
        bytes.write_u8(mode_byte(cur_mode::LIST, hll_type as u8));

        // Insertion order is preserved: the occupied slots are the
        // leading ones
        for coupon in self.container.iter() {
            bytes.write_u32_le(coupon);
        }

        bytes.into_bytes()
    }
}
