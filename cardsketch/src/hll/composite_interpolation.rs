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

//! Bias-correction curve for the composite estimator.
//!
//! The raw HLL estimator `alpha * k^2 / sum(2^-register)` is biased in the
//! sub-asymptotic regime. The composite estimator corrects it by mapping
//! the observed raw estimate back through the expected-raw-estimate curve:
//! `x_arr[i]` is the expected raw estimate when the true cardinality is
//! `i * y_stride`, so cubic interpolation of the (x_arr, i * y_stride)
//! pairs at the observed raw value recovers an unbiased cardinality.
//!
//! Each per-lg_k curve is tabulated once, on first use, from the
//! Poissonized register model: with true cardinality `n` each register
//! sees a Poisson(n/k) stream, so its value M satisfies
//! `P(M <= m) = exp(-(n/k) * 2^-m)` and the expected raw estimate is
//! `alpha * k / E[2^-M]`. The curve is strictly increasing, as the
//! straddle search in the interpolation requires.

use std::sync::OnceLock;

const MIN_LG_K: u8 = 4;
const MAX_LG_K: u8 = 21;
const NUM_LG_K: usize = (MAX_LG_K - MIN_LG_K + 1) as usize;

/// Number of points in each per-lg_k curve
const X_ARR_LENGTH: usize = 40;

static X_ARRS: [OnceLock<[f64; X_ARR_LENGTH]>; NUM_LG_K] = [const { OnceLock::new() }; NUM_LG_K];

/// Expected raw estimates at cardinalities `i * y_stride` for this lg_k.
pub fn get_x_arr(lg_k: u8) -> &'static [f64; X_ARR_LENGTH] {
    debug_assert!((MIN_LG_K..=MAX_LG_K).contains(&lg_k));
    X_ARRS[(lg_k - MIN_LG_K) as usize].get_or_init(|| build_x_arr(lg_k))
}

/// Number of points in each curve.
pub fn get_x_arr_length() -> usize {
    X_ARR_LENGTH
}

/// Cardinality step between consecutive curve points (k/8).
///
/// 40 points cover cardinalities up to 39k/8, past the 3k threshold where
/// the composite estimator stops consulting the curve.
pub fn get_y_stride(lg_k: u8) -> u32 {
    1 << (lg_k - 3)
}

/// Raw-estimate correction factor, empirically determined for small k.
pub fn alpha(lg_k: u8) -> f64 {
    let k = (1u64 << lg_k) as f64;
    match lg_k {
        4 => 0.673,
        5 => 0.697,
        6 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / k),
    }
}

fn build_x_arr(lg_k: u8) -> [f64; X_ARR_LENGTH] {
    let k = (1u64 << lg_k) as f64;
    let alpha = alpha(lg_k);
    let y_stride = get_y_stride(lg_k) as f64;

    let mut xs = [0.0; X_ARR_LENGTH];
    for (i, x) in xs.iter_mut().enumerate() {
        let lambda = i as f64 * y_stride / k;
        *x = alpha * k / expected_inv_pow2(lambda);
    }
    xs
}

/// E[2^-M] for one register fed by a Poisson(lambda) stream of items.
///
/// P(M <= m) = exp(-lambda * 2^-m); the tail beyond m = 63 is far below
/// f64 resolution.
fn expected_inv_pow2(lambda: f64) -> f64 {
    let mut prev_cdf = (-lambda).exp();
    let mut sum = prev_cdf; // m = 0 term with weight 2^0
    for m in 1..=63u32 {
        let weight = 1.0 / (1u64 << m) as f64;
        let cdf = (-lambda * weight).exp();
        sum += (cdf - prev_cdf) * weight;
        prev_cdf = cdf;
    }
    sum
}
