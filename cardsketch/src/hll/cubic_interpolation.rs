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

//! Cubic interpolation over estimation lookup curves.
//!
//! Both entry points share one core: pick the 4-point window around the
//! query, then evaluate the Lagrange cubic through those points. The Y
//! side is abstracted as a function of the point index, which covers both
//! an explicit Y table and a uniform stride.

/// Interpolates from an explicit (X, Y) table.
pub fn using_x_and_y_tables(x_arr: &[f64], y_arr: &[f64], x: f64) -> f64 {
    debug_assert!(x_arr.len() == y_arr.len());
    interpolate(x_arr, |i| y_arr[i], x)
}

/// Interpolates from an X table whose Y values are `i * y_stride`.
pub fn using_x_arr_and_y_stride(x_arr: &[f64], y_stride: f64, x: f64) -> f64 {
    interpolate(x_arr, |i| y_stride * i as f64, x)
}

fn interpolate(x_arr: &[f64], y_of: impl Fn(usize) -> f64, x: f64) -> f64 {
    debug_assert!(x_arr.len() >= 4);
    let last = x_arr.len() - 1;
    debug_assert!(x >= x_arr[0] && x <= x_arr[last]);

    if x == x_arr[last] {
        return y_of(last);
    }

    // Index i with x_arr[i] <= x < x_arr[i+1]; x is strictly below the
    // final point here, so i <= last - 1.
    let straddle = x_arr.partition_point(|&p| p <= x) - 1;

    // Center the 4-point window on the straddle, clamped to the table
    let window = if straddle == 0 {
        0
    } else if straddle + 2 == x_arr.len() {
        straddle - 2
    } else {
        straddle - 1
    };

    lagrange4(&x_arr[window..window + 4], window, y_of, x)
}

/// Evaluates the Lagrange cubic through four consecutive curve points.
fn lagrange4(xs: &[f64], base: usize, y_of: impl Fn(usize) -> f64, x: f64) -> f64 {
    let mut sum = 0.0;
    for i in 0..4 {
        let mut basis = y_of(base + i);
        for j in 0..4 {
            if i != j {
                basis *= (x - xs[j]) / (xs[i] - xs[j]);
            }
        }
        sum += basis;
    }
    sum
}
