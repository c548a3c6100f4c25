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

//! Base container for coupon storage with cardinality estimation
//!
//! Provides a simple array-based storage for coupons (hash values) with
//! cubic interpolation-based cardinality estimation and confidence bounds.

use crate::common::NumStdDev;
use crate::hll::COUPON_RSE;
use crate::hll::cubic_interpolation::using_x_and_y_tables;

/// Sentinel value indicating an empty coupon slot
pub const COUPON_EMPTY: u32 = 0;

/// Birthday-paradox inversion for the coupon modes: a count of distinct
/// coupons observed (X) against the mean cardinality that produces that
/// count (Y). Coupons collide in a 2^26 space, so for counts in the
/// millions the cardinality runs measurably ahead of the count; cubic
/// interpolation over these 40 points recovers it. Sketches leave the
/// coupon modes long before the upper end of the curve matters.
#[rustfmt::skip]
static COUPON_COUNT_X: [f64; 40] = [
    0.0, 1.0, 20.0, 400.0, 8000.0, 160000.0, 300000.0, 600000.0,
    900000.0, 1200000.0, 1500000.0, 1800000.0, 2100000.0, 2400000.0,
    2700000.0, 3000000.0, 3300000.0, 3600000.0, 3900000.0, 4200000.0,
    4500000.0, 4800000.0, 5100000.0, 5400000.0, 5700000.0, 6000000.0,
    6300000.0, 6600000.0, 6900000.0, 7200000.0, 7500000.0, 7800000.0,
    8100000.0, 8400000.0, 8700000.0, 9000000.0, 9300000.0, 9600000.0,
    9900000.0, 10200000.0,
];

/// Mean cardinalities paired with [`COUPON_COUNT_X`]
#[rustfmt::skip]
static CARDINALITY_Y: [f64; 40] = [
    0.0,
    1.0,
    20.000_000_943_740_26,
    400.000_396_371_338_4,
    8_000.158_929_460_209,
    160_063.606_776_375_96,
    300_223.707_159_766_35,
    600_895.593_385_617,
    902_016.806_512_095_5,
    1_203_588.498_319_951,
    1_505_611.824_552_474_3,
    1_808_087.944_931_906_6,
    2_111_018.023_175_935_3,
    2_414_403.227_014_25,
    2_718_244.728_205_189,
    3_022_543.702_552_454,
    3_327_301.329_921_909,
    3_632_518.794_258_454,
    3_938_197.283_602_969,
    4_244_337.990_109_356,
    4_550_942.110_061_649,
    4_858_010.843_891_189,
    5_165_545.396_193_897,
    5_473_546.975_747_645,
    5_782_016.795_529_650_5,
    6_090_956.072_734_016,
    6_400_366.028_789_296,
    6_710_247.889_376_201,
    7_020_602.884_445_314,
    7_331_432.248_234_972,
    7_642_737.219_289_148,
    7_954_519.040_475_476_5,
    8_266_778.959_003_342,
    8_579_518.226_442_046,
    8_892_738.098_739_047,
    9_206_439.836_238_328,
    9_520_624.703_698_829,
    9_835_293.970_312_92,
    10_150_448.909_725_029,
    10_466_090.800_050_326,
];

/// Cardinality implied by a count of distinct coupons
fn coupon_estimate(len: f64) -> f64 {
    using_x_and_y_tables(&COUPON_COUNT_X, &CARDINALITY_Y, len)
}

/// Fixed-size coupon storage shared by the list and set modes, with the
/// coupon-count cardinality estimate.
#[derive(Debug, Clone)]
pub struct Container {
    lg_size: usize,
    /// Coupon cells; zero marks a free cell
    pub coupons: Box<[u32]>,
    /// Count of occupied cells
    pub len: usize,
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        // Storage order is an artifact of insertion order, so compare the
        // occupied coupons as sets
        fn occupied_sorted(container: &Container) -> Vec<u32> {
            let mut coupons: Vec<u32> = container.iter().collect();
            coupons.sort_unstable();
            coupons
        }

        self.len == other.len && occupied_sorted(self) == occupied_sorted(other)
    }
}

impl Container {
    pub fn new(lg_size: usize) -> Self {
        Self {
            lg_size,
            coupons: vec![COUPON_EMPTY; 1 << lg_size].into_boxed_slice(),
            len: 0,
        }
    }

    /// Wraps storage restored by deserialization.
    pub fn from_coupons(lg_size: usize, coupons: Box<[u32]>, len: usize) -> Self {
        Self {
            lg_size,
            coupons,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn lg_size(&self) -> usize {
        self.lg_size
    }

    pub fn is_full(&self) -> bool {
        self.len == self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.coupons.len()
    }

    /// Cardinality implied by the stored coupon count.
    pub fn estimate(&self) -> f64 {
        let count = self.len as f64;
        count.max(coupon_estimate(count))
    }

    /// Upper confidence bound on the estimate.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        // Negative RSE makes (1 + rse) < 1, so the bound exceeds the estimate
        let rse = -(num_std_dev.as_u8() as f64) * COUPON_RSE;
        self.bounded_estimate(rse)
    }

    /// Lower confidence bound on the estimate.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        let rse = (num_std_dev.as_u8() as f64) * COUPON_RSE;
        self.bounded_estimate(rse)
    }

    fn bounded_estimate(&self, rse: f64) -> f64 {
        let count = self.len as f64;
        count.max(coupon_estimate(count) / (1.0 + rse))
    }

    /// Iterates over the occupied cells.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.coupons.iter().filter(|&&c| c != COUPON_EMPTY).copied()
    }
}
