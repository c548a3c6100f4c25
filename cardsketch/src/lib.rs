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

//! Compact, mergeable sketches for cardinality estimation.
//!
//! This crate provides two families of probabilistic data structures that
//! summarize the number of distinct items in large data streams using a
//! fixed, small amount of memory:
//!
//! - [`theta`]: an open-addressed hash-table sketch with streaming
//!   updates, union via [`theta::ThetaSketch::merge`], a stateful
//!   [`theta::ThetaIntersection`] operator, and a bit-exact compact wire
//!   format consumable across process boundaries.
//! - [`hll`]: HyperLogLog sketches with three register encodings (4, 6,
//!   and 8 bits per register), small-cardinality coupon modes, and a
//!   composite estimator combining HIP, raw HLL, and linear counting.
//!
//! Sketches built with the same hash seed merge deterministically: merge
//! and intersection are commutative, associative, and idempotent over the
//! retained set.
//!
//! # Example
//!
//! ```
//! use cardsketch::theta::ThetaSketch;
//!
//! let mut a = ThetaSketch::builder().lg_k(12).build();
//! let mut b = ThetaSketch::builder().lg_k(12).build();
//! for i in 0..1000 {
//!     a.update(i);
//!     b.update(i + 500);
//! }
//! a.merge(&b).unwrap();
//! assert!((a.estimate() - 1500.0).abs() < 1.0);
//! ```

pub(crate) mod codec;
pub mod common;
pub mod error;
pub mod hash;
pub mod hll;
pub mod theta;
