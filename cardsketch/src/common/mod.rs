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

//! Data structures and functions that may be used across all the sketch families.

// public common components for the cardsketch crate
mod num_std_dev;
mod resize;
pub use self::num_std_dev::NumStdDev;
pub use self::resize::ResizeFactor;

// private to the cardsketch crate
pub(crate) mod binomial_bounds;

/// Canonicalize double value so that equal values hash identically
pub(crate) fn canonical_double(value: f64) -> u64 {
    if value.is_nan() {
        // every NaN payload collapses to the one quiet NaN pattern
        return 0x7ff8000000000000u64;
    }
    // Adding positive zero maps -0.0 onto +0.0 (IEEE 754 round-to-nearest,
    // which Rust guarantees) and leaves every other value untouched.
    (value + 0.0).to_bits()
}
