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

//! Harmonic numbers for the linear counting estimator.
//!
//! The collector estimate below needs `H(n)` for arbitrary register
//! counts: small arguments come from a directly summed table, large ones
//! from the Euler-Maclaurin expansion, which is accurate to f64 precision
//! from the table's end onward.

use std::sync::OnceLock;

const NUM_DIRECT: usize = 25;
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// H(0) through H(24), summed once on first use.
fn direct_table() -> &'static [f64; NUM_DIRECT] {
    static TABLE: OnceLock<[f64; NUM_DIRECT]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut h = [0.0; NUM_DIRECT];
        for n in 1..NUM_DIRECT {
            h[n] = h[n - 1] + 1.0 / n as f64;
        }
        h
    })
}

/// The n-th harmonic number H(n) = 1 + 1/2 + ... + 1/n.
fn harmonic_number(n: usize) -> f64 {
    if let Some(&h) = direct_table().get(n) {
        return h;
    }

    // ln n + gamma + 1/(2n) - 1/(12n^2) + 1/(120n^4) - 1/(252n^6) + 1/(240n^8),
    // with the correction terms folded Horner-style
    let x = n as f64;
    let x2 = x * x;
    let tail = 0.5 / x
        - (1.0 / 12.0 - (1.0 / 120.0 - (1.0 / 252.0 - 1.0 / (240.0 * x2)) / x2) / x2) / x2;
    x.ln() + EULER_GAMMA + tail
}

/// Coupon-collector estimate for flat random-access bit vectors.
///
/// This is the linear counting component of the HLL composite estimator:
/// with `num_bits_set` of `bit_vector_length` positions hit, the expected
/// number of throws that produced that occupancy is
/// `length * (H(length) - H(length - set))`.
pub fn bitmap_estimate(bit_vector_length: u32, num_bits_set: u32) -> f64 {
    let length = bit_vector_length as usize;
    let unhit = (bit_vector_length - num_bits_set) as usize;
    length as f64 * (harmonic_number(length) - harmonic_number(unhit))
}
